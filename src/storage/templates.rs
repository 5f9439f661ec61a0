use crate::common::{FaceAuthError, Result};
use crate::core::face::Embedding;
use crate::core::similarity::average_embeddings;
use crate::storage::protection::TemplateProtector;
use crate::storage::user_store::TemplateStore;
use serde::{Deserialize, Serialize};

const RECORD_VERSION: u32 = 1;

/// Plaintext of one user's template. Exists only in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub version: u32,
    pub embeddings: Vec<Embedding>,
    #[serde(default)]
    pub averaged_embedding: Option<Embedding>,
    #[serde(default)]
    pub qualities: Vec<f32>,
}

impl TemplateRecord {
    pub fn new(embeddings: Vec<Embedding>, qualities: Vec<f32>, store_average: bool) -> Self {
        let averaged_embedding = if store_average && embeddings.len() > 1 {
            Some(average_embeddings(&embeddings))
        } else {
            None
        };
        Self { version: RECORD_VERSION, embeddings, averaged_embedding, qualities }
    }

    /// Every embedding a probe should be compared against.
    pub fn candidates(&self) -> impl Iterator<Item = &Embedding> {
        self.embeddings.iter().chain(self.averaged_embedding.iter())
    }
}

/// Seals records on the way into a [`TemplateStore`] and opens them on the way out.
pub struct ProtectedTemplates<S> {
    store: S,
    protector: TemplateProtector,
}

impl<S: TemplateStore> ProtectedTemplates<S> {
    pub fn new(store: S, protector: TemplateProtector) -> Self {
        Self { store, protector }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn commit(&self, user_id: &str, record: &TemplateRecord) -> Result<()> {
        let plaintext = zeroize::Zeroizing::new(
            bincode::serialize(record)
                .map_err(|e| FaceAuthError::Storage(format!("Failed to serialize template: {}", e)))?,
        );
        let sealed = self.protector.encrypt(&plaintext, user_id)?;
        self.store.save(&sealed)?;
        tracing::info!("Stored protected template for '{}' ({} embeddings)", user_id, record.embeddings.len());
        Ok(())
    }

    /// `Ok(None)` when the user has no template; `Integrity` when it exists but
    /// does not open for this user.
    pub fn load(&self, user_id: &str) -> Result<Option<TemplateRecord>> {
        let Some(sealed) = self.store.load(user_id)? else {
            return Ok(None);
        };

        let plaintext = zeroize::Zeroizing::new(self.protector.decrypt(&sealed, user_id)?);
        let record: TemplateRecord = bincode::deserialize(&plaintext)
            .map_err(|e| FaceAuthError::Storage(format!("Decrypted template is malformed: {}", e)))?;
        Ok(Some(record))
    }

    pub fn has_enrollment(&self) -> bool {
        self.store.has_enrollment()
    }

    pub fn is_enrolled(&self, user_id: &str) -> bool {
        self.store.is_enrolled(user_id)
    }

    pub fn enrolled_users(&self) -> Result<Vec<String>> {
        self.store.enrolled_users()
    }
}
