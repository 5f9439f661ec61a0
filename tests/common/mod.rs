#![allow(dead_code)]

use facegate::core::face::{DetectedFace, DetectionResult, Embedding, FaceBox, FaceEmbedding};
use facegate::storage::{FileTemplateStore, MasterKey, ProtectedTemplates, TemplateProtector, TemplateRecord};
use facegate::core::Pause;
use facegate::RecognitionEngine;
use image::{DynamicImage, RgbImage};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 480;

/// Engine whose answers the test sets up front and can change between ticks.
pub struct FakeEngine {
    available: AtomicBool,
    faces: Mutex<Vec<DetectedFace>>,
    embedding: Mutex<Option<Embedding>>,
    pub detect_calls: AtomicUsize,
    pub extract_calls: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            faces: Mutex::new(Vec::new()),
            embedding: Mutex::new(None),
            detect_calls: AtomicUsize::new(0),
            extract_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_faces(&self, faces: Vec<DetectedFace>) {
        *self.faces.lock().unwrap() = faces;
    }

    pub fn set_embedding(&self, embedding: Option<Embedding>) {
        *self.embedding.lock().unwrap() = embedding;
    }

    pub fn detect_count(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }
}

impl RecognitionEngine for FakeEngine {
    fn detect_faces(&self, _frame: &DynamicImage) -> DetectionResult {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        DetectionResult::ok(self.faces.lock().unwrap().clone())
    }

    fn extract_embedding(&self, _frame: &DynamicImage, _face: Option<&FaceBox>) -> FaceEmbedding {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        match self.embedding.lock().unwrap().clone() {
            Some(values) => FaceEmbedding::ok(values, 1.0),
            None => FaceEmbedding::failed("no face crop"),
        }
    }

    fn ping(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

/// Remembers every hold it is asked for instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingPause {
    holds: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingPause {
    pub fn take(&self) -> Vec<Duration> {
        std::mem::take(&mut *self.holds.lock().unwrap())
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        self.holds.lock().unwrap().push(duration);
    }
}

pub fn frame() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, image::Rgb([120, 120, 120])))
}

/// Face of the given width centred in a `frame()`.
pub fn centred_face(width: f32, confidence: f32) -> DetectedFace {
    let height = width * 1.2;
    DetectedFace {
        bbox: FaceBox {
            x: FRAME_WIDTH as f32 / 2.0 - width / 2.0,
            y: FRAME_HEIGHT as f32 / 2.0 - height / 2.0,
            width,
            height,
        },
        confidence,
        landmarks: None,
    }
}

pub fn good_face() -> DetectedFace {
    centred_face(200.0, 0.9)
}

/// Unit vector whose cosine similarity with `reference()` is `similarity`.
pub fn probe(similarity: f32) -> Embedding {
    vec![similarity, (1.0 - similarity * similarity).sqrt(), 0.0, 0.0]
}

pub fn reference() -> Embedding {
    vec![1.0, 0.0, 0.0, 0.0]
}

pub fn templates(dir: &Path) -> ProtectedTemplates<FileTemplateStore> {
    ProtectedTemplates::new(
        FileTemplateStore::new(dir.join("templates")).unwrap(),
        TemplateProtector::new(MasterKey::from_bytes([7; 32])),
    )
}

pub fn enroll(templates: &ProtectedTemplates<FileTemplateStore>, user: &str, embedding: Embedding) {
    templates
        .commit(user, &TemplateRecord::new(vec![embedding], vec![0.9], false))
        .unwrap();
}
