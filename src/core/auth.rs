use crate::{
    camera::{Frame, FrameSource},
    common::{
        config::{AuthConfig, PositioningConfig},
        Config, FaceAuthError, MatchPolicy, Result,
    },
    core::{
        face::DetectedFace,
        positioning,
        similarity::{best_match, ComparisonResult},
        state::{AuthenticationState, LockoutCounter, StateChange, StateObservers},
    },
    service::RecognitionEngine,
    storage::{ProtectedTemplates, TemplateStore},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

const LOOKING_MESSAGE: &str = "Looking for your face";
const NO_CAMERA_MESSAGE: &str = "No camera feed";
const ENGINE_DOWN_MESSAGE: &str = "Face recognition is unavailable right now";
const HOLD_STILL_MESSAGE: &str = "Hold still";
const VERIFYING_MESSAGE: &str = "Verifying...";
const NOT_RECOGNIZED_MESSAGE: &str = "Face not recognized - try again";
const NOT_ENROLLED_MESSAGE: &str = "No face enrolled - set up face unlock first";
const LOCKED_OUT_MESSAGE: &str = "Too many failed attempts - use your password or PIN to unlock";

/// Blocking hold used for the success and failure delays.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Skips every hold. For driving the orchestrator tick by tick.
pub struct NoPause;

impl Pause for NoPause {
    fn pause(&self, _duration: Duration) {}
}

/// Drives one authentication session: pulls frames, asks the engine about
/// them, and walks the state machine one tick at a time.
pub struct AuthOrchestrator<E, S, F> {
    auth: AuthConfig,
    positioning: PositioningConfig,
    engine: E,
    templates: ProtectedTemplates<S>,
    frames: F,
    pause: Box<dyn Pause>,
    state: AuthenticationState,
    message: String,
    identity: Option<String>,
    lockout: LockoutCounter,
    halted: Arc<AtomicBool>,
    observers: StateObservers,
}

impl<E, S, F> AuthOrchestrator<E, S, F>
where
    E: RecognitionEngine,
    S: TemplateStore,
    F: FrameSource,
{
    /// `lockout` is the counter carried over from an earlier session; a
    /// tripped counter starts the orchestrator locked out.
    pub fn new(
        config: &Config,
        engine: E,
        templates: ProtectedTemplates<S>,
        frames: F,
        lockout: LockoutCounter,
    ) -> Self {
        let mut orchestrator = Self {
            auth: config.auth.clone(),
            positioning: config.positioning.clone(),
            engine,
            templates,
            frames,
            pause: Box::new(ThreadSleep),
            state: AuthenticationState::Searching,
            message: LOOKING_MESSAGE.to_string(),
            identity: None,
            lockout,
            halted: Arc::new(AtomicBool::new(false)),
            observers: StateObservers::default(),
        };

        if orchestrator.lockout.is_locked() {
            orchestrator.state = AuthenticationState::LockedOut;
            orchestrator.message = LOCKED_OUT_MESSAGE.to_string();
            orchestrator.halt();
        } else if !orchestrator.has_templates() {
            orchestrator.state = AuthenticationState::NotEnrolled;
            orchestrator.message = NOT_ENROLLED_MESSAGE.to_string();
        }
        tracing::debug!("Authentication starts in state {}", orchestrator.state);
        orchestrator
    }

    pub fn with_pause(mut self, pause: impl Pause + 'static) -> Self {
        self.pause = Box::new(pause);
        self
    }

    pub fn subscribe(&mut self) -> Receiver<StateChange> {
        self.observers.subscribe()
    }

    pub fn state(&self) -> AuthenticationState {
        self.state
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The user verified by the last successful attempt.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// The verified user, or why the session did not produce one.
    pub fn outcome(&self) -> Result<&str> {
        match (self.state, self.identity.as_deref()) {
            (AuthenticationState::Success, Some(user)) => Ok(user),
            (AuthenticationState::LockedOut, _) => Err(FaceAuthError::LockedOut),
            (AuthenticationState::NotEnrolled, _) => Err(FaceAuthError::NotEnrolled),
            (state, _) => Err(FaceAuthError::Other(anyhow::anyhow!(
                "Face not verified ({}): {}",
                state,
                self.message
            ))),
        }
    }

    pub fn lockout_counter(&self) -> LockoutCounter {
        self.lockout
    }

    pub fn is_ticking(&self) -> bool {
        !self.halted.load(Ordering::SeqCst)
    }

    /// Shared flag that stops the tick source. Setting it from another thread
    /// makes [`run`](Self::run) return after the current tick.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.halted)
    }

    /// Clears the lockout, re-checks enrollment and re-arms ticking.
    pub fn restart(&mut self) {
        self.lockout.reset();
        self.identity = None;
        self.halted.store(false, Ordering::SeqCst);

        if self.has_templates() {
            self.transition(AuthenticationState::Searching, LOOKING_MESSAGE, None);
        } else {
            self.transition(AuthenticationState::NotEnrolled, NOT_ENROLLED_MESSAGE, None);
        }
        tracing::info!("Authentication restarted");
    }

    /// Ticks at the configured interval until success, lockout, a stop
    /// request, or `timeout`. Returns the state it stopped in.
    pub fn run(&mut self, timeout: Option<Duration>) -> AuthenticationState {
        let started = Instant::now();
        let interval = self.auth.tick_interval();
        let mut ticks = 0u64;

        while self.is_ticking() {
            ticks += 1;
            let tick_start = Instant::now();
            self.tick();

            if self.state == AuthenticationState::Success || !self.is_ticking() {
                break;
            }
            if timeout.is_some_and(|limit| started.elapsed() >= limit) {
                tracing::info!("Authentication timed out after {} ticks", ticks);
                break;
            }

            if ticks % 10 == 1 {
                tracing::debug!("Tick {} took {:.1}ms", ticks, tick_start.elapsed().as_secs_f32() * 1000.0);
            }
            std::thread::sleep(interval.saturating_sub(tick_start.elapsed()));
        }
        self.state
    }

    pub fn tick(&mut self) {
        if self.lockout.is_locked() {
            if self.state != AuthenticationState::LockedOut {
                self.transition(AuthenticationState::LockedOut, LOCKED_OUT_MESSAGE, None);
            }
            self.halt();
            return;
        }

        if matches!(self.state, AuthenticationState::Success | AuthenticationState::Verifying) {
            tracing::debug!("Ignoring tick while {}", self.state);
            return;
        }

        if let Err(e) = self.try_tick() {
            tracing::error!("Authentication tick failed: {}", e);
            self.transition(AuthenticationState::Searching, LOOKING_MESSAGE, Some(e.to_string()));
        }
    }

    fn try_tick(&mut self) -> Result<()> {
        if !self.has_templates() {
            if self.state != AuthenticationState::NotEnrolled {
                self.transition(AuthenticationState::NotEnrolled, NOT_ENROLLED_MESSAGE, None);
            }
            return Ok(());
        }

        let Some(frame) = self.frames.current_frame() else {
            self.transition(AuthenticationState::Searching, NO_CAMERA_MESSAGE, None);
            return Ok(());
        };

        if !self.engine.is_service_available() {
            tracing::warn!("Recognition engine did not answer ping");
            self.transition(
                AuthenticationState::Searching,
                ENGINE_DOWN_MESSAGE,
                Some("recognition engine unreachable".to_string()),
            );
            return Ok(());
        }

        let detection = self.engine.detect_faces(&frame);
        if !detection.success {
            let detail = detection.error.unwrap_or_else(|| "detection failed".to_string());
            tracing::warn!("Detection failed: {}", detail);
            self.transition(AuthenticationState::Searching, LOOKING_MESSAGE, Some(detail));
            return Ok(());
        }

        tracing::debug!("{} face(s) detected", detection.faces.len());

        // Weak faces still count here; a weak single face is reported as unclear below.
        let face = match positioning::single_face(&detection.faces) {
            Ok(face) => face.clone(),
            Err(rejection) => {
                self.transition(AuthenticationState::Searching, rejection.user_message(), None);
                return Ok(());
            }
        };

        if let Err(rejection) = positioning::evaluate(&face, frame.width(), frame.height(), &self.positioning) {
            let detail = format!("confidence {:.2}, width {:.0}px", face.confidence, face.bbox.width);
            self.transition(AuthenticationState::Positioning, rejection.user_message(), Some(detail));
            return Ok(());
        }

        self.transition(AuthenticationState::Verifying, VERIFYING_MESSAGE, None);
        self.verify(&frame, &face)
    }

    fn verify(&mut self, frame: &Frame, face: &DetectedFace) -> Result<()> {
        let embedding = self.engine.extract_embedding(frame, Some(&face.bbox));
        if !embedding.is_usable() {
            let detail = embedding.error.unwrap_or_else(|| "empty embedding".to_string());
            tracing::warn!("Embedding extraction failed: {}", detail);
            self.transition(AuthenticationState::Searching, HOLD_STILL_MESSAGE, Some(detail));
            return Ok(());
        }

        match self.best_candidate(&embedding.values)? {
            Some((user, result)) if result.is_match => {
                self.on_success(user, result);
                Ok(())
            }
            Some((_, result)) => {
                self.on_failure(result);
                Ok(())
            }
            None => {
                self.transition(AuthenticationState::NotEnrolled, NOT_ENROLLED_MESSAGE, None);
                Ok(())
            }
        }
    }

    fn on_success(&mut self, user: String, result: ComparisonResult) {
        tracing::info!("Verified '{}' (similarity {:.3} > {:.3})", user, result.similarity, result.threshold);
        self.lockout.reset();
        let message = format!("Welcome, {}", user);
        self.identity = Some(user);
        self.transition(AuthenticationState::Success, message, None);
        self.pause.pause(self.auth.success_delay());
    }

    fn on_failure(&mut self, result: ComparisonResult) {
        let max_attempts = self.auth.max_failed_attempts;
        self.lockout.record_failure(max_attempts);
        tracing::warn!(
            "Face did not match (similarity {:.3}, threshold {:.3}), attempt {}/{}",
            result.similarity,
            result.threshold,
            self.lockout.failed_attempts(),
            max_attempts
        );

        if self.lockout.is_locked() {
            self.transition(AuthenticationState::LockedOut, LOCKED_OUT_MESSAGE, None);
            self.halt();
            return;
        }

        let detail = format!("attempt {} of {}", self.lockout.failed_attempts(), max_attempts);
        self.transition(AuthenticationState::Failure, NOT_RECOGNIZED_MESSAGE, Some(detail));
        self.pause.pause(self.auth.failure_delay());
        self.transition(AuthenticationState::Searching, LOOKING_MESSAGE, None);
    }

    /// Best comparison over every user the match policy allows.
    fn best_candidate(&self, probe: &[f32]) -> Result<Option<(String, ComparisonResult)>> {
        let threshold = self.auth.similarity_threshold;
        let mut best: Option<(String, ComparisonResult)> = None;

        for user in self.candidate_users()? {
            let Some(record) = self.templates.load(&user)? else {
                continue;
            };
            let Some(result) = best_match(probe, record.candidates(), threshold) else {
                continue;
            };
            tracing::debug!("Similarity against '{}': {:.3}", user, result.similarity);
            if best.as_ref().map_or(true, |(_, b)| result.similarity > b.similarity) {
                best = Some((user, result));
            }
        }
        Ok(best)
    }

    fn candidate_users(&self) -> Result<Vec<String>> {
        match (&self.auth.match_policy, &self.auth.expected_user) {
            (MatchPolicy::OneToOne, Some(user)) => Ok(vec![user.clone()]),
            (MatchPolicy::OneToOne, None) => {
                let users = self.templates.enrolled_users()?;
                if users.len() > 1 {
                    return Err(FaceAuthError::Config(
                        "one-to-one matching needs auth.expected_user when several users are enrolled".into(),
                    ));
                }
                Ok(users)
            }
            (MatchPolicy::OneToMany, _) => self.templates.enrolled_users(),
        }
    }

    fn has_templates(&self) -> bool {
        match (&self.auth.match_policy, &self.auth.expected_user) {
            (MatchPolicy::OneToOne, Some(user)) => self.templates.is_enrolled(user),
            _ => self.templates.has_enrollment(),
        }
    }

    fn halt(&self) {
        if !self.halted.swap(true, Ordering::SeqCst) {
            tracing::debug!("Tick source halted");
        }
    }

    fn transition(&mut self, next: AuthenticationState, message: impl Into<String>, detail: Option<String>) {
        let previous = self.state;
        self.state = next;
        self.message = message.into();

        if previous != next {
            tracing::info!("Auth state {} -> {}: {}", previous, next, self.message);
        } else {
            tracing::debug!("Auth state {}: {}", next, self.message);
        }

        let change = StateChange {
            previous,
            current: next,
            message: self.message.clone(),
            detail,
            scanning: matches!(next, AuthenticationState::Searching | AuthenticationState::Positioning),
        };
        self.observers.emit(&change);
    }
}
