use serde::{Deserialize, Serialize};

pub type Embedding = Vec<f32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LandmarkKind {
    RightEye,
    LeftEye,
    NoseTip,
    MouthCenter,
    RightEar,
    LeftEar,
    Unknown,
}

impl LandmarkKind {
    /// Maps the engine's keypoint index to a landmark kind.
    pub fn from_index(index: u32) -> Self {
        match index {
            0 => LandmarkKind::RightEye,
            1 => LandmarkKind::LeftEye,
            2 => LandmarkKind::NoseTip,
            3 => LandmarkKind::MouthCenter,
            4 => LandmarkKind::RightEar,
            5 => LandmarkKind::LeftEar,
            _ => LandmarkKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub kind: LandmarkKind,
}

/// Bounding box in frame pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceBox {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub bbox: FaceBox,
    pub confidence: f32,
    pub landmarks: Option<Vec<Landmark>>,
}

impl DetectedFace {
    pub fn has_both_eyes(&self) -> bool {
        self.landmarks.as_ref().is_some_and(|points| {
            points.iter().any(|p| p.kind == LandmarkKind::RightEye)
                && points.iter().any(|p| p.kind == LandmarkKind::LeftEye)
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DetectionResult {
    pub faces: Vec<DetectedFace>,
    pub success: bool,
    pub error: Option<String>,
}

impl DetectionResult {
    pub fn ok(faces: Vec<DetectedFace>) -> Self {
        Self { faces, success: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { faces: Vec::new(), success: false, error: Some(error.into()) }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FaceEmbedding {
    pub values: Embedding,
    pub confidence: f32,
    pub success: bool,
    pub error: Option<String>,
}

impl FaceEmbedding {
    pub fn ok(values: Embedding, confidence: f32) -> Self {
        Self { values, confidence, success: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { values: Vec::new(), confidence: 0.0, success: false, error: Some(error.into()) }
    }

    pub fn is_usable(&self) -> bool {
        self.success && !self.values.is_empty()
    }
}

/// Outcome of the engine's `ENROLL_CAPTURE` command.
#[derive(Debug, Clone, Default)]
pub struct EnrollCapture {
    pub embedding: FaceEmbedding,
    pub bbox: Option<FaceBox>,
    pub quality_score: f32,
    pub landmarks: Vec<Landmark>,
}
