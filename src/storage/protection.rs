use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305, Key, Nonce, Tag,
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fs;
use std::io::Write;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::common::{FaceAuthError, Result};

type HmacSha256 = Hmac<Sha256>;

pub const TEMPLATE_VERSION: u32 = 1;
pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KDF_LABEL: &[u8] = b"facegate-template-key-v1";
const AAD_LABEL: &[u8] = b"facegate-template-v1";

/// Enrolled biometric data sealed for exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedTemplate {
    pub version: u32,
    pub user_id: String,
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; 16],
    pub ciphertext: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Reads the key file, creating it (owner read/write only) on first use.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let data = Zeroizing::new(fs::read(path)?);
            if data.len() != KEY_LEN {
                return Err(FaceAuthError::Storage(format!(
                    "Key file {} has {} bytes, expected {}", path.display(), data.len(), KEY_LEN
                )));
            }
            let mut bytes = [0u8; KEY_LEN];
            bytes.copy_from_slice(&data);
            return Ok(Self(bytes));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let key = Self::generate();
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;
        file.write_all(&key.0)?;
        file.sync_all()?;

        tracing::info!("Created template master key at {}", path.display());
        Ok(key)
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Per-user authenticated encryption of templates.
///
/// The user identifier is mixed into the key (HMAC-SHA256 over the master key)
/// and into the associated data, so a template only opens for the user it was
/// sealed for. Holds no mutable state; share freely across threads.
#[derive(Debug, Clone)]
pub struct TemplateProtector {
    master_key: MasterKey,
}

impl TemplateProtector {
    pub fn new(master_key: MasterKey) -> Self {
        Self { master_key }
    }

    pub fn encrypt(&self, plaintext: &[u8], user_id: &str) -> Result<EncryptedTemplate> {
        let key = self.user_key(user_id)?;
        let aad = encode_aad(TEMPLATE_VERSION, user_id);

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut ciphertext = plaintext.to_vec();
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&nonce), &aad, &mut ciphertext)
            .map_err(|_| FaceAuthError::Storage("Template encryption failed".into()))?;

        Ok(EncryptedTemplate {
            version: TEMPLATE_VERSION,
            user_id: user_id.to_string(),
            nonce,
            tag: tag.into(),
            ciphertext,
            created_at: Utc::now(),
        })
    }

    /// Opens a template for `user_id`. Any mismatch (other user, other master
    /// key, modified bytes) is an integrity failure; nothing is returned.
    pub fn decrypt(&self, template: &EncryptedTemplate, user_id: &str) -> Result<Vec<u8>> {
        if template.version != TEMPLATE_VERSION {
            return Err(FaceAuthError::Integrity(format!(
                "Unsupported template version {}", template.version
            )));
        }

        let key = self.user_key(user_id)?;
        let aad = encode_aad(template.version, user_id);

        let mut plaintext = template.ciphertext.clone();
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
        let decrypted = cipher.decrypt_in_place_detached(
            Nonce::from_slice(&template.nonce),
            &aad,
            &mut plaintext,
            Tag::from_slice(&template.tag),
        );

        if decrypted.is_err() {
            plaintext.zeroize();
            return Err(FaceAuthError::Integrity(format!(
                "Template does not authenticate for user '{}'", user_id
            )));
        }
        Ok(plaintext)
    }

    fn user_key(&self, user_id: &str) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.master_key.0)
            .map_err(|_| FaceAuthError::Storage("Invalid master key length".into()))?;
        mac.update(KDF_LABEL);
        mac.update(&(user_id.len() as u32).to_le_bytes());
        mac.update(user_id.as_bytes());

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(&mac.finalize().into_bytes());
        Ok(key)
    }
}

fn encode_aad(version: u32, user_id: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(AAD_LABEL.len() + 8 + user_id.len());
    out.extend_from_slice(AAD_LABEL);
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(&(user_id.len() as u32).to_le_bytes());
    out.extend_from_slice(user_id.as_bytes());
    out
}
