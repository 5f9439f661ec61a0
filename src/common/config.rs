use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::common::error::{FaceAuthError, Result};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub positioning: PositioningConfig,
    #[serde(default)]
    pub enrollment: EnrollmentConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_ms: u64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_socket_path() -> PathBuf { PathBuf::from("/run/facegate/engine.sock") }
fn default_request_timeout() -> u64 { 5000 }
fn default_ping_timeout() -> u64 { 300 }
fn default_jpeg_quality() -> u8 { 80 }

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            request_timeout_ms: default_request_timeout(),
            ping_timeout_ms: default_ping_timeout(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl BridgeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

/// Whose templates a live embedding is compared against.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Compare only against the configured expected user (the session owner).
    #[default]
    OneToOne,
    /// Compare against every enrolled identity and report the best match.
    OneToMany,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_success_delay")]
    pub success_delay_ms: u64,
    #[serde(default = "default_failure_delay")]
    pub failure_delay_ms: u64,
    #[serde(default)]
    pub match_policy: MatchPolicy,
    #[serde(default)]
    pub expected_user: Option<String>,
}

fn default_similarity_threshold() -> f32 { 0.6 }
fn default_max_failed_attempts() -> u32 { 5 }
fn default_tick_interval() -> u64 { 500 }
fn default_success_delay() -> u64 { 1500 }
fn default_failure_delay() -> u64 { 2000 }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_failed_attempts: default_max_failed_attempts(),
            tick_interval_ms: default_tick_interval(),
            success_delay_ms: default_success_delay(),
            failure_delay_ms: default_failure_delay(),
            match_policy: MatchPolicy::default(),
            expected_user: None,
        }
    }
}

impl AuthConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn success_delay(&self) -> Duration {
        Duration::from_millis(self.success_delay_ms)
    }

    pub fn failure_delay(&self) -> Duration {
        Duration::from_millis(self.failure_delay_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PositioningConfig {
    /// Enrollment captures whose face is below this confidence are rejected as unclear.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    #[serde(default = "default_good_confidence")]
    pub good_confidence: f32,
    #[serde(default = "default_min_face_width")]
    pub min_face_width: f32,
    #[serde(default = "default_max_face_width")]
    pub max_face_width: f32,
    /// Allowed distance of the face centre from the frame centre, as a
    /// fraction of the frame's half-width/half-height.
    #[serde(default = "default_center_tolerance")]
    pub center_tolerance: f32,
}

fn default_min_confidence() -> f32 { 0.5 }
fn default_good_confidence() -> f32 { 0.8 }
fn default_min_face_width() -> f32 { 120.0 }
fn default_max_face_width() -> f32 { 400.0 }
fn default_center_tolerance() -> f32 { 0.5 }

impl Default for PositioningConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            good_confidence: default_good_confidence(),
            min_face_width: default_min_face_width(),
            max_face_width: default_max_face_width(),
            center_tolerance: default_center_tolerance(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EnrollmentConfig {
    #[serde(default = "default_min_frames")]
    pub min_frames: usize,
    #[serde(default = "default_true")]
    pub store_averaged_embedding: bool,
}

fn default_min_frames() -> usize { 5 }
fn default_true() -> bool { true }

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            min_frames: default_min_frames(),
            store_averaged_embedding: default_true(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Overrides the per-user data directory when set.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

impl Config {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FaceAuthError::Config(format!(
                "Config file not found: {}", path.display()
            )));
        }

        tracing::debug!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| FaceAuthError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Thresholds
        if !(0.0..=1.0).contains(&self.auth.similarity_threshold) {
            return Err(FaceAuthError::Config(format!(
                "Similarity threshold must be between 0.0 and 1.0, got {}",
                self.auth.similarity_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.positioning.min_confidence)
            || !(0.0..=1.0).contains(&self.positioning.good_confidence)
        {
            return Err(FaceAuthError::Config(
                "Detection confidences must be between 0.0 and 1.0".into()
            ));
        }
        if self.positioning.min_confidence > self.positioning.good_confidence {
            return Err(FaceAuthError::Config(format!(
                "min_confidence ({}) must not exceed good_confidence ({})",
                self.positioning.min_confidence, self.positioning.good_confidence
            )));
        }

        // Face width band
        if self.positioning.min_face_width <= 0.0
            || self.positioning.min_face_width >= self.positioning.max_face_width
        {
            return Err(FaceAuthError::Config(format!(
                "Face width band must satisfy 0 < min < max, got [{}, {}]",
                self.positioning.min_face_width, self.positioning.max_face_width
            )));
        }
        if self.positioning.center_tolerance <= 0.0 || self.positioning.center_tolerance > 1.0 {
            return Err(FaceAuthError::Config(format!(
                "Center tolerance must be in (0, 1], got {}",
                self.positioning.center_tolerance
            )));
        }

        // Attempts and timing
        if self.auth.max_failed_attempts == 0 {
            return Err(FaceAuthError::Config("max_failed_attempts must be at least 1".into()));
        }
        if self.auth.tick_interval_ms == 0 {
            return Err(FaceAuthError::Config("tick_interval_ms must be positive".into()));
        }
        if self.bridge.ping_timeout_ms == 0 || self.bridge.request_timeout_ms == 0 {
            return Err(FaceAuthError::Config("Bridge timeouts must be positive".into()));
        }
        if self.bridge.jpeg_quality == 0 || self.bridge.jpeg_quality > 100 {
            return Err(FaceAuthError::Config(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.bridge.jpeg_quality
            )));
        }

        if self.enrollment.min_frames == 0 {
            return Err(FaceAuthError::Config("enrollment.min_frames must be at least 1".into()));
        }

        Ok(())
    }
}
