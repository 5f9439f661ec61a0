use crate::core::face::{DetectedFace, Embedding};
use crate::core::similarity::cosine_similarity;
use image::DynamicImage;

/// Per-capture quality used to rank enrollment frames.
#[derive(Debug, Clone)]
pub struct QualityMetrics {
    pub detection_confidence: f32,
    pub face_size_ratio: f32,
    pub face_centering_score: f32,
    pub brightness_score: f32,
    pub contrast_score: f32,
    pub overall_score: f32,
}

impl QualityMetrics {
    pub fn calculate(image: &DynamicImage, face: &DetectedFace) -> Self {
        let detection_confidence = face.confidence;

        let img_width = image.width() as f32;
        let img_height = image.height() as f32;
        let image_area = (img_width * img_height).max(1.0);
        let face_size_ratio = (face.bbox.area() / image_area).min(1.0);

        let (face_center_x, face_center_y) = face.bbox.center();
        let img_center_x = (img_width / 2.0).max(1.0);
        let img_center_y = (img_height / 2.0).max(1.0);
        let x_offset = ((face_center_x - img_center_x).abs() / img_center_x).min(1.0);
        let y_offset = ((face_center_y - img_center_y).abs() / img_center_y).min(1.0);
        let face_centering_score = 1.0 - (x_offset + y_offset) / 2.0;

        let (brightness_score, contrast_score) = calculate_image_quality(image, face);

        let overall_score = detection_confidence * 0.3
            + face_size_ratio * 0.2
            + face_centering_score * 0.2
            + brightness_score * 0.15
            + contrast_score * 0.15;

        QualityMetrics {
            detection_confidence,
            face_size_ratio,
            face_centering_score,
            brightness_score,
            contrast_score,
            overall_score,
        }
    }

    pub fn assessment(&self) -> &'static str {
        if self.overall_score >= 0.8 {
            "Excellent"
        } else if self.overall_score >= 0.7 {
            "Good"
        } else if self.overall_score >= 0.6 {
            "Acceptable"
        } else if self.overall_score >= 0.5 {
            "Poor"
        } else {
            "Very Poor"
        }
    }
}

/// Mean pairwise similarity between captures. Low values mean the session
/// mixed lighting conditions or poses too aggressively.
pub fn embedding_consistency(embeddings: &[Embedding]) -> f32 {
    let mut total = 0.0f32;
    let mut pairs = 0usize;

    for i in 0..embeddings.len() {
        for j in i + 1..embeddings.len() {
            total += cosine_similarity(&embeddings[i], &embeddings[j]);
            pairs += 1;
        }
    }

    if pairs == 0 {
        return 1.0;
    }
    total / pairs as f32
}

fn calculate_image_quality(image: &DynamicImage, face: &DetectedFace) -> (f32, f32) {
    let gray = image.to_luma8();

    let x1 = face.bbox.x.max(0.0) as u32;
    let y1 = face.bbox.y.max(0.0) as u32;
    let x2 = (face.bbox.x + face.bbox.width).min(gray.width() as f32).max(0.0) as u32;
    let y2 = (face.bbox.y + face.bbox.height).min(gray.height() as f32).max(0.0) as u32;

    if x2 <= x1 || y2 <= y1 {
        return (0.5, 0.5);
    }

    let mut sum = 0u64;
    let mut sum_sq = 0u64;
    let mut count = 0u64;

    for y in y1..y2 {
        for x in x1..x2 {
            let pixel = gray.get_pixel(x, y)[0] as u64;
            sum += pixel;
            sum_sq += pixel * pixel;
            count += 1;
        }
    }

    let mean = sum as f32 / count as f32;
    let variance = ((sum_sq as f32 / count as f32) - (mean * mean)).max(0.0);
    let std_dev = variance.sqrt();

    // Ideal mean is mid-grey; std dev of 64 counts as full contrast.
    let brightness_score = 1.0 - ((mean - 127.5).abs() / 127.5).min(1.0);
    let contrast_score = (std_dev / 64.0).min(1.0);

    (brightness_score, contrast_score)
}
