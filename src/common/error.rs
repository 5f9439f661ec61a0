use thiserror::Error;

/// Recoverable reasons a frame is not allowed to proceed to verification or
/// into an enrollment session. Each maps to one short corrective message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyRejection {
    NoFace,
    MultipleFaces,
    Unclear,
    TooClose,
    TooFar,
    OffCenter,
}

impl PolicyRejection {
    pub fn user_message(&self) -> &'static str {
        match self {
            PolicyRejection::NoFace => "Position your face in front of the camera",
            PolicyRejection::MultipleFaces => "Multiple faces detected - only one person should be in view",
            PolicyRejection::Unclear => "Face not clear - improve lighting or look at the camera",
            PolicyRejection::TooClose => "Move back from the camera",
            PolicyRejection::TooFar => "Move closer to the camera",
            PolicyRejection::OffCenter => "Center your face in the camera view",
        }
    }
}

impl std::fmt::Display for PolicyRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.user_message())
    }
}

#[derive(Error, Debug)]
pub enum FaceAuthError {
    #[error("Recognition service error: {0}")]
    Transport(String),

    /// Ciphertext failed authentication: wrong user, wrong key, or tampering.
    #[error("Template integrity check failed: {0}")]
    Integrity(String),

    #[error("Rejected: {0}")]
    Policy(PolicyRejection),

    #[error("Too many failed attempts - face authentication is locked")]
    LockedOut,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("No face enrolled")]
    NotEnrolled,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl FaceAuthError {
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, FaceAuthError::Integrity(_))
    }
}

pub type Result<T> = std::result::Result<T, FaceAuthError>;
