mod common;

use common::*;
use facegate::core::NoPause;
use facegate::storage::{FileTemplateStore, ProtectedTemplates, TemplateStore};
use facegate::{
    AuthOrchestrator, AuthenticationState, Config, FaceAuthError, LockoutCounter, MatchPolicy,
    SharedFrameSource,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

type Orchestrator = AuthOrchestrator<Arc<FakeEngine>, FileTemplateStore, Arc<SharedFrameSource>>;

struct Harness {
    _dir: tempfile::TempDir,
    engine: Arc<FakeEngine>,
    frames: Arc<SharedFrameSource>,
}

impl Harness {
    fn new() -> (Self, ProtectedTemplates<FileTemplateStore>) {
        let dir = tempfile::tempdir().unwrap();
        let templates = templates(dir.path());
        let frames = Arc::new(SharedFrameSource::new());
        frames.publish(frame());
        let harness = Self { _dir: dir, engine: Arc::new(FakeEngine::new()), frames };
        (harness, templates)
    }

    fn orchestrator(
        &self,
        config: &Config,
        templates: ProtectedTemplates<FileTemplateStore>,
        prior: LockoutCounter,
    ) -> Orchestrator {
        AuthOrchestrator::new(config, Arc::clone(&self.engine), templates, Arc::clone(&self.frames), prior)
            .with_pause(NoPause)
    }
}

fn enrolled_orchestrator() -> (Harness, Orchestrator) {
    let (harness, templates) = Harness::new();
    enroll(&templates, "alice", reference());
    let orchestrator = harness.orchestrator(&Config::default(), templates, LockoutCounter::default());
    (harness, orchestrator)
}

#[test]
fn no_templates_means_not_enrolled_whatever_the_engine_does() {
    let (harness, templates) = Harness::new();
    harness.engine.set_faces(vec![good_face()]);
    harness.engine.set_embedding(Some(probe(0.99)));
    let mut auth = harness.orchestrator(&Config::default(), templates, LockoutCounter::default());

    assert_eq!(auth.state(), AuthenticationState::NotEnrolled);
    for _ in 0..3 {
        auth.tick();
        assert_eq!(auth.state(), AuthenticationState::NotEnrolled);
    }
    harness.engine.set_available(false);
    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::NotEnrolled);
    assert_eq!(harness.engine.detect_count(), 0);
}

#[test]
fn unreachable_engine_keeps_searching() {
    let (harness, mut auth) = enrolled_orchestrator();
    harness.engine.set_available(false);
    let changes = auth.subscribe();

    for _ in 0..20 {
        auth.tick();
        assert_eq!(auth.state(), AuthenticationState::Searching);
    }
    assert!(auth.is_ticking());
    assert_eq!(harness.engine.detect_count(), 0);

    let last = changes.try_iter().last().unwrap();
    assert!(last.detail.unwrap().contains("unreachable"));
    assert!(last.scanning);
}

#[test]
fn missing_frame_reports_no_camera_feed() {
    let (harness, mut auth) = enrolled_orchestrator();
    harness.frames.clear();

    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::Searching);
    assert_eq!(auth.message(), "No camera feed");
}

#[test]
fn two_faces_stay_searching_with_multiple_faces_message() {
    let (harness, mut auth) = enrolled_orchestrator();
    harness.engine.set_faces(vec![good_face(), centred_face(180.0, 0.95)]);
    harness.engine.set_embedding(Some(probe(0.99)));

    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::Searching);
    assert!(auth.message().contains("Multiple faces"));
    assert_eq!(harness.engine.extract_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn weak_second_face_still_blocks_verification() {
    let (harness, mut auth) = enrolled_orchestrator();
    harness.engine.set_faces(vec![good_face(), centred_face(150.0, 0.3)]);
    harness.engine.set_embedding(Some(probe(0.9)));
    let changes = auth.subscribe();

    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::Searching);
    assert!(auth.message().contains("Multiple faces"));
    assert!(changes.try_iter().all(|c| c.current != AuthenticationState::Verifying));
    assert_eq!(harness.engine.extract_calls.load(Ordering::SeqCst), 0);
    assert_eq!(auth.identity(), None);
}

#[test]
fn weak_single_face_is_unclear() {
    let (harness, mut auth) = enrolled_orchestrator();
    harness.engine.set_faces(vec![centred_face(200.0, 0.3)]);
    harness.engine.set_embedding(Some(probe(0.9)));

    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::Positioning);
    assert!(auth.message().starts_with("Face not clear"));
    assert_eq!(harness.engine.extract_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn badly_placed_face_asks_for_positioning() {
    let (harness, mut auth) = enrolled_orchestrator();

    harness.engine.set_faces(vec![centred_face(80.0, 0.95)]);
    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::Positioning);
    assert_eq!(auth.message(), "Move closer to the camera");

    harness.engine.set_faces(vec![centred_face(450.0, 0.95)]);
    auth.tick();
    assert_eq!(auth.message(), "Move back from the camera");

    // Unclear wins over size.
    harness.engine.set_faces(vec![centred_face(450.0, 0.7)]);
    auth.tick();
    assert!(auth.message().starts_with("Face not clear"));

    let mut corner = good_face();
    corner.bbox.x = 0.0;
    corner.bbox.y = 0.0;
    harness.engine.set_faces(vec![corner]);
    auth.tick();
    assert_eq!(auth.message(), "Center your face in the camera view");
    assert_eq!(harness.engine.extract_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn good_match_succeeds_and_resets_counter() {
    let (harness, mut auth) = enrolled_orchestrator();
    harness.engine.set_faces(vec![good_face()]);

    harness.engine.set_embedding(Some(probe(0.3)));
    auth.tick();
    auth.tick();
    assert_eq!(auth.lockout_counter().failed_attempts(), 2);
    assert_eq!(auth.state(), AuthenticationState::Searching);

    let changes = auth.subscribe();
    harness.engine.set_embedding(Some(probe(0.75)));
    auth.tick();

    assert_eq!(auth.state(), AuthenticationState::Success);
    assert_eq!(auth.identity(), Some("alice"));
    assert_eq!(auth.lockout_counter().failed_attempts(), 0);

    let states: Vec<_> = changes.try_iter().map(|c| (c.current, c.scanning)).collect();
    assert_eq!(
        states,
        vec![(AuthenticationState::Verifying, false), (AuthenticationState::Success, false)]
    );
}

#[test]
fn ticks_after_success_are_ignored() {
    let (harness, mut auth) = enrolled_orchestrator();
    harness.engine.set_faces(vec![good_face()]);
    harness.engine.set_embedding(Some(probe(0.9)));
    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::Success);

    let calls = harness.engine.detect_count();
    let changes = auth.subscribe();
    harness.engine.set_faces(vec![good_face(), good_face()]);
    harness.engine.set_available(false);
    for _ in 0..5 {
        auth.tick();
    }

    assert_eq!(auth.state(), AuthenticationState::Success);
    assert_eq!(harness.engine.detect_count(), calls);
    assert!(changes.try_recv().is_err());
}

#[test]
fn fifth_failure_locks_out_and_halts_ticking() {
    let (harness, mut auth) = enrolled_orchestrator();
    harness.engine.set_faces(vec![good_face()]);
    harness.engine.set_embedding(Some(probe(0.4)));
    let changes = auth.subscribe();

    for attempt in 1..=4 {
        auth.tick();
        assert_eq!(auth.state(), AuthenticationState::Searching);
        assert_eq!(auth.lockout_counter().failed_attempts(), attempt);
        assert!(auth.is_ticking());
    }
    auth.tick();

    assert_eq!(auth.state(), AuthenticationState::LockedOut);
    assert!(auth.lockout_counter().is_locked());
    assert!(!auth.is_ticking());
    assert!(auth.message().contains("password or PIN"));

    let failures = changes
        .try_iter()
        .filter(|c| c.current == AuthenticationState::Failure)
        .count();
    assert_eq!(failures, 4);

    // Even a perfect face cannot get through until restart.
    harness.engine.set_embedding(Some(probe(1.0)));
    let calls = harness.engine.detect_count();
    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::LockedOut);
    assert_eq!(harness.engine.detect_count(), calls);

    auth.restart();
    assert_eq!(auth.state(), AuthenticationState::Searching);
    assert_eq!(auth.lockout_counter(), LockoutCounter::default());
    assert!(auth.is_ticking());

    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::Success);
}

#[test]
fn carried_over_lockout_starts_locked() {
    let (harness, templates) = Harness::new();
    enroll(&templates, "alice", reference());
    let mut prior = LockoutCounter::default();
    while !prior.record_failure(5) {}

    let mut auth = harness.orchestrator(&Config::default(), templates, prior);
    assert_eq!(auth.state(), AuthenticationState::LockedOut);
    assert!(!auth.is_ticking());
    assert_eq!(auth.run(None), AuthenticationState::LockedOut);
}

#[test]
fn failed_embedding_extraction_is_not_a_failed_attempt() {
    let (harness, mut auth) = enrolled_orchestrator();
    harness.engine.set_faces(vec![good_face()]);
    harness.engine.set_embedding(None);

    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::Searching);
    assert_eq!(auth.lockout_counter().failed_attempts(), 0);
}

#[test]
fn one_to_one_only_compares_against_expected_user() {
    let (harness, templates) = Harness::new();
    enroll(&templates, "alice", reference());
    enroll(&templates, "bob", probe(0.0));
    harness.engine.set_faces(vec![good_face()]);
    harness.engine.set_embedding(Some(probe(0.0)));

    let mut config = Config::default();
    config.auth.expected_user = Some("alice".into());
    let mut auth = harness.orchestrator(&config, templates, LockoutCounter::default());

    auth.tick();
    assert_eq!(auth.lockout_counter().failed_attempts(), 1);
    assert_eq!(auth.identity(), None);
}

#[test]
fn one_to_many_reports_best_matching_user() {
    let (harness, templates) = Harness::new();
    enroll(&templates, "alice", reference());
    enroll(&templates, "bob", probe(0.0));
    harness.engine.set_faces(vec![good_face()]);
    harness.engine.set_embedding(Some(probe(0.1)));

    let mut config = Config::default();
    config.auth.match_policy = MatchPolicy::OneToMany;
    let mut auth = harness.orchestrator(&config, templates, LockoutCounter::default());

    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::Success);
    assert_eq!(auth.identity(), Some("bob"));
}

#[test]
fn expected_user_without_template_is_not_enrolled() {
    let (harness, templates) = Harness::new();
    enroll(&templates, "bob", reference());

    let mut config = Config::default();
    config.auth.expected_user = Some("alice".into());
    let auth = harness.orchestrator(&config, templates, LockoutCounter::default());
    assert_eq!(auth.state(), AuthenticationState::NotEnrolled);
}

#[test]
fn tampered_template_becomes_transient_searching() {
    let (harness, templates) = Harness::new();
    enroll(&templates, "alice", reference());
    let mut sealed = templates.store().load("alice").unwrap().unwrap();
    sealed.ciphertext[0] ^= 0xff;
    templates.store().save(&sealed).unwrap();

    harness.engine.set_faces(vec![good_face()]);
    harness.engine.set_embedding(Some(probe(1.0)));
    let mut auth = harness.orchestrator(&Config::default(), templates, LockoutCounter::default());
    let changes = auth.subscribe();

    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::Searching);
    assert_eq!(auth.lockout_counter().failed_attempts(), 0);
    assert!(changes.try_iter().last().unwrap().detail.is_some());

    // Not stuck in Verifying: the next tick is processed.
    let calls = harness.engine.detect_count();
    auth.tick();
    assert_eq!(harness.engine.detect_count(), calls + 1);
}

#[test]
fn run_returns_on_success() {
    let (harness, mut auth) = enrolled_orchestrator();
    harness.engine.set_faces(vec![good_face()]);
    harness.engine.set_embedding(Some(probe(0.95)));

    assert_eq!(auth.run(Some(std::time::Duration::from_secs(5))), AuthenticationState::Success);
}

#[test]
fn stop_handle_halts_run() {
    let (_harness, mut auth) = enrolled_orchestrator();
    auth.stop_handle().store(true, Ordering::SeqCst);

    assert!(!auth.is_ticking());
    assert_eq!(auth.run(None), AuthenticationState::Searching);
}

fn recorded_orchestrator(config: &Config) -> (Harness, Orchestrator, RecordingPause) {
    let (harness, templates) = Harness::new();
    enroll(&templates, "alice", reference());
    let pause = RecordingPause::default();
    let orchestrator = AuthOrchestrator::new(
        config,
        Arc::clone(&harness.engine),
        templates,
        Arc::clone(&harness.frames),
        LockoutCounter::default(),
    )
    .with_pause(pause.clone());
    (harness, orchestrator, pause)
}

#[test]
fn success_holds_for_success_delay() {
    let mut config = Config::default();
    config.auth.success_delay_ms = 1234;
    let (harness, mut auth, pause) = recorded_orchestrator(&config);
    harness.engine.set_faces(vec![good_face()]);
    harness.engine.set_embedding(Some(probe(0.9)));

    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::Success);
    assert_eq!(pause.take(), vec![Duration::from_millis(1234)]);

    auth.tick();
    assert!(pause.take().is_empty());
}

#[test]
fn failure_holds_for_failure_delay_but_lockout_does_not() {
    let mut config = Config::default();
    config.auth.failure_delay_ms = 2345;
    config.auth.max_failed_attempts = 2;
    let (harness, mut auth, pause) = recorded_orchestrator(&config);
    harness.engine.set_faces(vec![good_face()]);
    harness.engine.set_embedding(Some(probe(0.2)));
    let changes = auth.subscribe();

    auth.tick();
    assert_eq!(pause.take(), vec![Duration::from_millis(2345)]);
    let states: Vec<_> = changes.try_iter().map(|c| c.current).collect();
    assert_eq!(
        states,
        vec![
            AuthenticationState::Verifying,
            AuthenticationState::Failure,
            AuthenticationState::Searching
        ]
    );

    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::LockedOut);
    assert!(pause.take().is_empty());
}

#[test]
fn positioning_and_searching_never_hold() {
    let (harness, mut auth, pause) = recorded_orchestrator(&Config::default());
    harness.engine.set_faces(vec![centred_face(80.0, 0.95)]);
    auth.tick();
    harness.engine.set_faces(vec![]);
    auth.tick();
    assert!(pause.take().is_empty());
}

#[test]
fn outcome_names_the_verified_user_or_the_reason() {
    let (harness, mut auth) = enrolled_orchestrator();
    assert!(auth.outcome().is_err());

    harness.engine.set_faces(vec![good_face()]);
    harness.engine.set_embedding(Some(probe(0.2)));
    for _ in 0..5 {
        auth.tick();
    }
    assert!(matches!(auth.outcome(), Err(FaceAuthError::LockedOut)));

    auth.restart();
    harness.engine.set_embedding(Some(probe(0.9)));
    auth.tick();
    assert_eq!(auth.outcome().unwrap(), "alice");

    let (other, templates) = Harness::new();
    let empty = other.orchestrator(&Config::default(), templates, LockoutCounter::default());
    assert!(matches!(empty.outcome(), Err(FaceAuthError::NotEnrolled)));
}

#[test]
fn stray_template_file_does_not_break_one_to_many() {
    let (harness, templates) = Harness::new();
    enroll(&templates, "alice", reference());
    std::fs::write(harness._dir.path().join("templates/bad name.tpl"), b"junk").unwrap();
    harness.engine.set_faces(vec![good_face()]);
    harness.engine.set_embedding(Some(probe(0.9)));

    let mut config = Config::default();
    config.auth.match_policy = MatchPolicy::OneToMany;
    let mut auth = harness.orchestrator(&config, templates, LockoutCounter::default());

    auth.tick();
    assert_eq!(auth.state(), AuthenticationState::Success);
    assert_eq!(auth.identity(), Some("alice"));
}
