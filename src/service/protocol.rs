use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{self, Read, Write};

use crate::core::face::{DetectedFace, FaceBox, Landmark, LandmarkKind};

// Request types
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Detect,
    ExtractEmbedding,
    Compare,
    EnrollCapture,
    Ping,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RequestEnvelope {
    pub command: Command,
    /// Base64 JPEG. Absent for commands that carry no frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_data: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

impl RequestEnvelope {
    pub fn new(command: Command, frame_data: Option<String>) -> Self {
        Self { command, frame_data, parameters: Map::new() }
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

// Response types
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResponseEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn ok(data: Value) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()) }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WireLandmark {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type", default)]
    pub kind: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WireFace {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<Vec<WireLandmark>>,
}

impl From<WireFace> for DetectedFace {
    fn from(face: WireFace) -> Self {
        DetectedFace {
            bbox: FaceBox { x: face.x, y: face.y, width: face.width, height: face.height },
            confidence: face.confidence,
            landmarks: face.landmarks.map(convert_landmarks),
        }
    }
}

pub fn convert_landmarks(points: Vec<WireLandmark>) -> Vec<Landmark> {
    points
        .into_iter()
        .map(|p| Landmark { x: p.x, y: p.y, kind: LandmarkKind::from_index(p.kind) })
        .collect()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DetectData {
    pub faces: Vec<WireFace>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
    #[serde(default = "default_embedding_confidence")]
    pub confidence: f32,
}

fn default_embedding_confidence() -> f32 { 1.0 }

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CompareData {
    #[serde(rename = "match")]
    pub is_match: bool,
    pub similarity: f32,
    pub threshold: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EnrollCaptureData {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub bbox: Option<[f32; 4]>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub quality_score: f32,
    #[serde(default)]
    pub landmarks: Vec<WireLandmark>,
}

// Framing: u32 little-endian length prefix, then the JSON body.
pub const MAX_MESSAGE_LEN: usize = 4 * 1024 * 1024;

pub fn write_message<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    if payload.len() > MAX_MESSAGE_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "Message too large"));
    }
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

pub fn read_message<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;

    if len > MAX_MESSAGE_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "Message too large"));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_uses_engine_command_names() {
        let request = RequestEnvelope::new(Command::ExtractEmbedding, Some("AAAA".into()))
            .with_parameter("bbox", json!([1.0, 2.0, 3.0, 4.0]));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["command"], "EXTRACT_EMBEDDING");
        assert_eq!(value["frame_data"], "AAAA");
        assert_eq!(value["parameters"]["bbox"][2], 3.0);
    }

    #[test]
    fn ping_request_omits_frame_and_parameters() {
        let value = serde_json::to_value(RequestEnvelope::new(Command::Ping, None)).unwrap();
        assert_eq!(value, json!({ "command": "PING" }));
    }

    #[test]
    fn detect_data_accepts_integer_boxes_and_landmarks() {
        let data: DetectData = serde_json::from_value(json!({
            "faces": [{
                "x": 10, "y": 20, "width": 150, "height": 180, "confidence": 0.93,
                "landmarks": [
                    { "x": 40, "y": 60, "type": 0, "name": "right_eye" },
                    { "x": 90, "y": 60, "type": 1, "name": "left_eye" }
                ]
            }]
        }))
        .unwrap();
        let face: DetectedFace = data.faces.into_iter().next().unwrap().into();
        assert_eq!(face.bbox.width, 150.0);
        assert!(face.has_both_eyes());
    }

    #[test]
    fn embedding_confidence_defaults_to_one() {
        let data: EmbeddingData = serde_json::from_value(json!({ "embedding": [0.5, 0.5] })).unwrap();
        assert_eq!(data.confidence, 1.0);
    }

    #[test]
    fn framing_rejects_oversized_length_prefix() {
        let mut bytes = ((MAX_MESSAGE_LEN + 1) as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        let err = read_message(&mut bytes.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn framing_reads_back_what_was_written() {
        let mut wire = Vec::new();
        write_message(&mut wire, br#"{"success":true}"#).unwrap();
        assert_eq!(&wire[..4], &16u32.to_le_bytes());
        assert_eq!(read_message(&mut wire.as_slice()).unwrap(), br#"{"success":true}"#);
    }
}
