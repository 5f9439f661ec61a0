use crate::common::{FaceAuthError, Result};
use crate::storage::protection::EncryptedTemplate;
use std::fs;
use std::path::{Path, PathBuf};

const TEMPLATE_EXTENSION: &str = "tpl";

/// Persistence for sealed templates. Only ciphertext passes through here.
pub trait TemplateStore {
    fn save(&self, template: &EncryptedTemplate) -> Result<()>;

    fn load(&self, user_id: &str) -> Result<Option<EncryptedTemplate>>;

    fn remove(&self, user_id: &str) -> Result<bool>;

    fn enrolled_users(&self) -> Result<Vec<String>>;

    fn has_enrollment(&self) -> bool {
        match self.enrolled_users() {
            Ok(users) => !users.is_empty(),
            Err(e) => {
                tracing::warn!("Failed to list enrolled users: {}", e);
                false
            }
        }
    }

    fn is_enrolled(&self, user_id: &str) -> bool {
        matches!(self.load(user_id), Ok(Some(_)))
    }
}

/// One bincode file per user under a directory, owner read/write only.
pub struct FileTemplateStore {
    data_dir: PathBuf,
}

impl FileTemplateStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        tracing::debug!("Template store using {:?}", data_dir);
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn template_path(&self, user_id: &str) -> Result<PathBuf> {
        validate_user_id(user_id)?;
        Ok(self.data_dir.join(format!("{}.{}", user_id, TEMPLATE_EXTENSION)))
    }
}

impl TemplateStore for FileTemplateStore {
    fn save(&self, template: &EncryptedTemplate) -> Result<()> {
        let path = self.template_path(&template.user_id)?;
        let encoded = bincode::serialize(template)
            .map_err(|e| FaceAuthError::Storage(format!("Failed to serialize: {}", e)))?;

        // Write-then-rename so a crash never leaves a truncated template behind.
        let tmp_path = path.with_extension("tpl.tmp");
        fs::write(&tmp_path, encoded)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
        }
        fs::rename(&tmp_path, &path)?;

        tracing::debug!("Saved template for '{}'", template.user_id);
        Ok(())
    }

    fn load(&self, user_id: &str) -> Result<Option<EncryptedTemplate>> {
        let path = self.template_path(user_id)?;
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(&path)?;
        let template: EncryptedTemplate = bincode::deserialize(&data)
            .map_err(|e| FaceAuthError::Storage(format!("Failed to deserialize {:?}: {}", path, e)))?;

        if template.user_id != user_id {
            return Err(FaceAuthError::Storage(format!(
                "Template file for '{}' is labelled '{}'", user_id, template.user_id
            )));
        }

        Ok(Some(template))
    }

    fn remove(&self, user_id: &str) -> Result<bool> {
        let path = self.template_path(user_id)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    fn enrolled_users(&self) -> Result<Vec<String>> {
        let mut users = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_user_id(stem).is_err() {
                tracing::warn!("Ignoring template file with invalid user id: {:?}", path);
                continue;
            }
            users.push(stem.to_string());
        }
        users.sort();
        Ok(users)
    }
}

/// User ids become file names, so only a conservative character set is allowed.
pub fn validate_user_id(user_id: &str) -> Result<()> {
    let valid = !user_id.is_empty()
        && user_id.len() <= 64
        && !user_id.starts_with('.')
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@'));

    if !valid {
        return Err(FaceAuthError::Storage(format!("Invalid user id: {:?}", user_id)));
    }
    Ok(())
}
