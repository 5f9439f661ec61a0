use crate::common::{FaceAuthError, Result};
use crate::core::state::LockoutCounter;
use std::fs;
use std::path::{Path, PathBuf};

/// Keeps the lockout counter across process restarts, so quitting the app
/// does not clear a tripped lockout.
pub struct LockoutFile {
    path: PathBuf,
}

impl LockoutFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<LockoutCounter> {
        if !self.path.exists() {
            return Ok(LockoutCounter::default());
        }
        let data = fs::read(&self.path)?;
        serde_json::from_slice(&data)
            .map_err(|e| FaceAuthError::Storage(format!("Invalid lockout file {:?}: {}", self.path, e)))
    }

    pub fn save(&self, counter: &LockoutCounter) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(counter)
            .map_err(|e| FaceAuthError::Storage(format!("Failed to serialize lockout: {}", e)))?;
        fs::write(&self.path, data)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
