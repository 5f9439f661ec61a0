pub mod camera;
pub mod common;
pub mod core;
pub mod service;
pub mod storage;

pub use camera::{DirectoryFrameSource, FrameSource, SharedFrameSource};
pub use common::{Config, FaceAuthError, MatchPolicy, PolicyRejection, Result};
pub use core::{AuthOrchestrator, AuthenticationState, EnrollmentOrchestrator, LockoutCounter, StateChange};
pub use service::{BridgeClient, RecognitionEngine};
pub use storage::{FileTemplateStore, LockoutFile, MasterKey, ProtectedTemplates, TemplateProtector};
