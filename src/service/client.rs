use crate::common::config::BridgeConfig;
use crate::common::{FaceAuthError, Result};
use crate::core::face::{DetectedFace, DetectionResult, EnrollCapture, FaceBox, FaceEmbedding};
use crate::core::similarity::ComparisonResult;
use crate::service::codec::encode_frame;
use crate::service::protocol::{
    convert_landmarks, read_message, write_message, Command, CompareData, DetectData,
    EmbeddingData, EnrollCaptureData, RequestEnvelope, ResponseEnvelope,
};
use crate::service::RecognitionEngine;
use image::DynamicImage;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::io;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client for the out-of-process recognition engine.
///
/// Every call opens its own connection and carries exactly one request, so a
/// response is always correlated with the request sent on the same stream.
/// Failures of any kind come back as failure-shaped results.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    socket_path: PathBuf,
    request_timeout: Duration,
    ping_timeout: Duration,
    jpeg_quality: u8,
}

impl BridgeClient {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            socket_path: config.socket_path.clone(),
            request_timeout: config.request_timeout(),
            ping_timeout: config.ping_timeout(),
            jpeg_quality: config.jpeg_quality,
        }
    }

    pub fn with_socket(socket_path: impl AsRef<Path>) -> Self {
        Self::new(&BridgeConfig {
            socket_path: socket_path.as_ref().to_path_buf(),
            ..BridgeConfig::default()
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Engine-side comparison of the face in `frame` against `embedding`.
    pub fn compare_with(
        &self,
        frame: &DynamicImage,
        embedding: &[f32],
        threshold: f32,
    ) -> Result<ComparisonResult> {
        let request = RequestEnvelope::new(Command::Compare, Some(self.encode(frame)?))
            .with_parameter("embedding", json!(embedding))
            .with_parameter("threshold", json!(threshold));
        let data: CompareData = self.request_data(&request, self.request_timeout)?;
        Ok(ComparisonResult {
            similarity: data.similarity,
            is_match: data.is_match,
            threshold: data.threshold,
        })
    }

    /// Single-shot capture used by engine-assisted enrollment: the engine picks
    /// the largest face, extracts its embedding and scores the frame.
    pub fn enroll_capture(&self, frame: &DynamicImage) -> EnrollCapture {
        let outcome = self
            .encode(frame)
            .map(|data| RequestEnvelope::new(Command::EnrollCapture, Some(data)))
            .and_then(|request| self.request_data::<EnrollCaptureData>(&request, self.request_timeout));

        match outcome {
            Ok(data) => EnrollCapture {
                embedding: FaceEmbedding::ok(data.embedding, data.confidence),
                bbox: data.bbox.map(|[x, y, width, height]| FaceBox { x, y, width, height }),
                quality_score: data.quality_score,
                landmarks: convert_landmarks(data.landmarks),
            },
            Err(e) => EnrollCapture {
                embedding: FaceEmbedding::failed(failure_message(&e)),
                ..EnrollCapture::default()
            },
        }
    }

    fn encode(&self, frame: &DynamicImage) -> Result<String> {
        encode_frame(frame, self.jpeg_quality)
    }

    fn request_data<T: DeserializeOwned>(&self, request: &RequestEnvelope, timeout: Duration) -> Result<T> {
        let response = self.exchange(request, timeout)?;

        if !response.success {
            return Err(FaceAuthError::Transport(
                response.error.unwrap_or_else(|| "Engine reported failure".to_string()),
            ));
        }

        let data = response
            .data
            .ok_or_else(|| FaceAuthError::Transport("Response missing data".to_string()))?;
        serde_json::from_value(data)
            .map_err(|e| FaceAuthError::Transport(format!("Malformed response data: {}", e)))
    }

    fn exchange(&self, request: &RequestEnvelope, timeout: Duration) -> Result<ResponseEnvelope> {
        let mut stream = UnixStream::connect(&self.socket_path).map_err(|e| {
            FaceAuthError::Transport(format!(
                "Failed to connect to {}: {}", self.socket_path.display(), e
            ))
        })?;
        stream
            .set_read_timeout(Some(timeout))
            .and_then(|_| stream.set_write_timeout(Some(timeout)))
            .map_err(|e| io_failure("configure the connection", e))?;

        let payload = serde_json::to_vec(request)
            .map_err(|e| FaceAuthError::Transport(format!("Failed to serialize request: {}", e)))?;
        write_message(&mut stream, &payload).map_err(|e| io_failure("send", e))?;

        let body = read_message(&mut stream).map_err(|e| io_failure("receive", e))?;
        serde_json::from_slice(&body)
            .map_err(|e| FaceAuthError::Transport(format!("Malformed response: {}", e)))
    }
}

impl RecognitionEngine for BridgeClient {
    fn detect_faces(&self, frame: &DynamicImage) -> DetectionResult {
        let outcome = self
            .encode(frame)
            .map(|data| RequestEnvelope::new(Command::Detect, Some(data)))
            .and_then(|request| self.request_data::<DetectData>(&request, self.request_timeout));

        match outcome {
            Ok(data) => {
                let faces: Vec<DetectedFace> = data.faces.into_iter().map(Into::into).collect();
                tracing::debug!("Engine detected {} face(s)", faces.len());
                DetectionResult::ok(faces)
            }
            Err(e) => {
                tracing::warn!("Detection request failed: {}", e);
                DetectionResult::failed(failure_message(&e))
            }
        }
    }

    fn extract_embedding(&self, frame: &DynamicImage, face: Option<&FaceBox>) -> FaceEmbedding {
        let outcome = self
            .encode(frame)
            .map(|data| {
                let request = RequestEnvelope::new(Command::ExtractEmbedding, Some(data));
                match face {
                    Some(bbox) => request.with_parameter("bbox", json!(bbox.to_array())),
                    None => request,
                }
            })
            .and_then(|request| self.request_data::<EmbeddingData>(&request, self.request_timeout));

        match outcome {
            Ok(data) if data.embedding.is_empty() => FaceEmbedding::failed("Engine returned an empty embedding"),
            Ok(data) => FaceEmbedding::ok(data.embedding, data.confidence),
            Err(e) => {
                tracing::warn!("Embedding request failed: {}", e);
                FaceEmbedding::failed(failure_message(&e))
            }
        }
    }

    fn ping(&self) -> bool {
        let request = RequestEnvelope::new(Command::Ping, None);
        match self.exchange(&request, self.ping_timeout) {
            Ok(response) => response.success,
            Err(e) => {
                tracing::debug!("Ping failed: {}", e);
                false
            }
        }
    }
}

fn io_failure(stage: &str, e: io::Error) -> FaceAuthError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
            FaceAuthError::Transport(format!("Timed out waiting to {}", stage))
        }
        io::ErrorKind::UnexpectedEof => {
            FaceAuthError::Transport(format!("Engine closed the connection during {}", stage))
        }
        _ => FaceAuthError::Transport(format!("Failed to {}: {}", stage, e)),
    }
}

fn failure_message(e: &FaceAuthError) -> String {
    match e {
        FaceAuthError::Transport(msg) => msg.clone(),
        other => other.to_string(),
    }
}
