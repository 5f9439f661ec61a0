use crate::common::config::PositioningConfig;
use crate::common::error::PolicyRejection;
use crate::core::face::DetectedFace;

/// Checks whether a single detected face is placed well enough to verify.
///
/// Checks run in a fixed priority order (unclear, too close, too far,
/// off-center) and the first failing one is reported, so the user only ever
/// sees one corrective message at a time.
pub fn evaluate(
    face: &DetectedFace,
    frame_width: u32,
    frame_height: u32,
    config: &PositioningConfig,
) -> Result<(), PolicyRejection> {
    if face.confidence <= config.good_confidence {
        return Err(PolicyRejection::Unclear);
    }

    let width = face.bbox.width;
    if width > config.max_face_width {
        return Err(PolicyRejection::TooClose);
    }
    if width < config.min_face_width {
        return Err(PolicyRejection::TooFar);
    }

    if centering_offset(face, frame_width, frame_height) > config.center_tolerance {
        return Err(PolicyRejection::OffCenter);
    }

    Ok(())
}

/// Largest normalized offset of the face centre from the frame centre
/// (0.0 = centred, 1.0 = on the frame edge). Unknown frame size counts as centred.
pub fn centering_offset(face: &DetectedFace, frame_width: u32, frame_height: u32) -> f32 {
    if frame_width == 0 || frame_height == 0 {
        return 0.0;
    }

    let half_w = frame_width as f32 / 2.0;
    let half_h = frame_height as f32 / 2.0;
    let (cx, cy) = face.bbox.center();

    let x_offset = ((cx - half_w).abs() / half_w).min(1.0);
    let y_offset = ((cy - half_h).abs() / half_h).min(1.0);
    x_offset.max(y_offset)
}

/// Picks the one face a frame is about, or the rejection explaining why none
/// can be picked. Every reported face counts, however weak.
pub fn single_face(faces: &[DetectedFace]) -> Result<&DetectedFace, PolicyRejection> {
    match faces {
        [] => Err(PolicyRejection::NoFace),
        [face] => Ok(face),
        _ => Err(PolicyRejection::MultipleFaces),
    }
}
