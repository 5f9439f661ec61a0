use crate::{
    camera::Frame,
    common::{
        config::{EnrollmentConfig, PositioningConfig},
        Config, FaceAuthError, PolicyRejection, Result,
    },
    core::{
        face::Embedding,
        positioning,
        quality::{embedding_consistency, QualityMetrics},
    },
    service::RecognitionEngine,
    storage::{ProtectedTemplates, TemplateRecord, TemplateStore},
};

/// Where a finished enrollment goes.
pub trait EnrollmentSink {
    fn commit(&self, user_id: &str, record: &TemplateRecord) -> Result<()>;
}

impl<S: TemplateStore> EnrollmentSink for ProtectedTemplates<S> {
    fn commit(&self, user_id: &str, record: &TemplateRecord) -> Result<()> {
        ProtectedTemplates::commit(self, user_id, record)
    }
}

/// Captures gathered so far for one candidate user. Never written anywhere
/// until it is committed as a whole.
#[derive(Debug, Clone)]
pub struct EnrollmentSession {
    user_id: String,
    embeddings: Vec<Embedding>,
    qualities: Vec<f32>,
}

impl EnrollmentSession {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Accepted capture, with the running total for progress display.
#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub captured: usize,
    pub required: usize,
    pub quality: QualityMetrics,
}

pub struct EnrollmentOrchestrator<E, K> {
    enrollment: EnrollmentConfig,
    positioning: PositioningConfig,
    engine: E,
    sink: K,
    session: Option<EnrollmentSession>,
}

impl<E: RecognitionEngine, K: EnrollmentSink> EnrollmentOrchestrator<E, K> {
    pub fn new(config: &Config, engine: E, sink: K) -> Self {
        Self {
            enrollment: config.enrollment.clone(),
            positioning: config.positioning.clone(),
            engine,
            sink,
            session: None,
        }
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn session(&self) -> Option<&EnrollmentSession> {
        self.session.as_ref()
    }

    /// Starts a fresh session, dropping any unfinished one.
    pub fn begin(&mut self, user_id: &str) {
        if let Some(previous) = self.session.take() {
            tracing::warn!("Discarding unfinished enrollment for '{}' ({} captures)", previous.user_id, previous.len());
        }
        tracing::info!("Enrollment started for '{}'", user_id);
        self.session = Some(EnrollmentSession {
            user_id: user_id.to_string(),
            embeddings: Vec::new(),
            qualities: Vec::new(),
        });
    }

    /// Adds one frame to the session. The frame must show exactly one
    /// sufficiently confident face; anything else is a `Policy` rejection.
    pub fn capture(&mut self, frame: &Frame) -> Result<CaptureReport> {
        if self.session.is_none() {
            return Err(no_session());
        }

        let detection = self.engine.detect_faces(frame);
        if !detection.success {
            return Err(FaceAuthError::Transport(
                detection.error.unwrap_or_else(|| "detection failed".to_string()),
            ));
        }

        let face = positioning::single_face(&detection.faces)
            .and_then(|face| {
                if face.confidence < self.positioning.min_confidence {
                    Err(PolicyRejection::Unclear)
                } else {
                    Ok(face.clone())
                }
            })
            .map_err(|rejection| {
                tracing::warn!("Enrollment capture rejected: {}", rejection.user_message());
                FaceAuthError::Policy(rejection)
            })?;

        let embedding = self.engine.extract_embedding(frame, Some(&face.bbox));
        if !embedding.is_usable() {
            return Err(FaceAuthError::Transport(
                embedding.error.unwrap_or_else(|| "empty embedding".to_string()),
            ));
        }

        let quality = QualityMetrics::calculate(frame, &face);
        let session = self.session.as_mut().ok_or_else(no_session)?;
        session.embeddings.push(embedding.values);
        session.qualities.push(quality.overall_score);

        tracing::debug!(
            "Capture {} for '{}': quality {:.2} ({})",
            session.len(),
            session.user_id,
            quality.overall_score,
            quality.assessment()
        );

        Ok(CaptureReport {
            captured: session.len(),
            required: self.enrollment.min_frames,
            quality,
        })
    }

    pub fn can_commit(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.len() >= self.enrollment.min_frames)
    }

    /// Hands the session to the sink and ends it. Too few captures leaves
    /// the session open.
    pub fn commit(&mut self) -> Result<()> {
        let session = self.session.as_ref().ok_or_else(no_session)?;
        if session.len() < self.enrollment.min_frames {
            return Err(FaceAuthError::Other(anyhow::anyhow!(
                "Need at least {} captures to enroll, have {}",
                self.enrollment.min_frames,
                session.len()
            )));
        }

        let consistency = embedding_consistency(&session.embeddings);
        if consistency < 0.5 {
            tracing::warn!("Low consistency across captures for '{}': {:.3}", session.user_id, consistency);
        }

        let record = TemplateRecord::new(
            session.embeddings.clone(),
            session.qualities.clone(),
            self.enrollment.store_averaged_embedding,
        );
        self.sink.commit(&session.user_id, &record)?;

        tracing::info!("Enrolled '{}' with {} captures (consistency {:.3})", session.user_id, session.len(), consistency);
        self.session = None;
        Ok(())
    }

    pub fn cancel(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!("Enrollment for '{}' cancelled after {} captures", session.user_id, session.len());
        }
    }
}

fn no_session() -> FaceAuthError {
    FaceAuthError::Other(anyhow::anyhow!("No enrollment session in progress"))
}
