pub mod auth;
pub mod enrollment;
pub mod face;
pub mod positioning;
pub mod quality;
pub mod similarity;
pub mod state;

pub use auth::{AuthOrchestrator, NoPause, Pause, ThreadSleep};
pub use enrollment::{CaptureReport, EnrollmentOrchestrator, EnrollmentSession, EnrollmentSink};
pub use face::{DetectedFace, DetectionResult, Embedding, FaceBox, FaceEmbedding};
pub use quality::QualityMetrics;
pub use similarity::{compare, cosine_similarity, ComparisonResult};
pub use state::{AuthenticationState, LockoutCounter, StateChange};
