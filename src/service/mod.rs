pub mod client;
pub mod codec;
pub mod protocol;

pub use client::BridgeClient;

use crate::core::face::{DetectionResult, FaceBox, FaceEmbedding};
use image::DynamicImage;
use std::sync::Arc;

/// The recognition engine as seen by the orchestrators.
///
/// Implementations never fail outright: an unreachable or misbehaving engine
/// shows up as `success == false` with an error message.
pub trait RecognitionEngine {
    fn detect_faces(&self, frame: &DynamicImage) -> DetectionResult;

    fn extract_embedding(&self, frame: &DynamicImage, face: Option<&FaceBox>) -> FaceEmbedding;

    /// Liveness probe, bounded by the short ping timeout.
    fn ping(&self) -> bool;

    fn is_service_available(&self) -> bool {
        self.ping()
    }
}

impl<T: RecognitionEngine + ?Sized> RecognitionEngine for Arc<T> {
    fn detect_faces(&self, frame: &DynamicImage) -> DetectionResult {
        (**self).detect_faces(frame)
    }

    fn extract_embedding(&self, frame: &DynamicImage, face: Option<&FaceBox>) -> FaceEmbedding {
        (**self).extract_embedding(frame, face)
    }

    fn ping(&self) -> bool {
        (**self).ping()
    }

    fn is_service_available(&self) -> bool {
        (**self).is_service_available()
    }
}
