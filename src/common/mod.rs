pub mod config;
pub mod error;
pub mod paths;

pub use config::{Config, MatchPolicy};
pub use error::{FaceAuthError, PolicyRejection, Result};
