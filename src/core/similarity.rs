use crate::core::face::Embedding;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonResult {
    pub similarity: f32,
    pub is_match: bool,
    pub threshold: f32,
}

/// Cosine similarity. Mismatched lengths and zero-norm vectors score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Scores two embeddings; a score equal to the threshold is not a match.
pub fn compare(a: &[f32], b: &[f32], threshold: f32) -> ComparisonResult {
    let similarity = cosine_similarity(a, b);
    ComparisonResult {
        similarity,
        is_match: similarity > threshold,
        threshold,
    }
}

/// Best comparison of `probe` against each candidate. `None` when there are
/// no candidates.
pub fn best_match<'a, I>(probe: &[f32], candidates: I, threshold: f32) -> Option<ComparisonResult>
where
    I: IntoIterator<Item = &'a Embedding>,
{
    candidates
        .into_iter()
        .map(|candidate| compare(probe, candidate, threshold))
        .fold(None, |best: Option<ComparisonResult>, current| match best {
            Some(b) if b.similarity >= current.similarity => Some(b),
            _ => Some(current),
        })
}

/// Element-wise mean. Embeddings whose length differs from the first are skipped.
pub fn average_embeddings(embeddings: &[Embedding]) -> Embedding {
    let Some(first) = embeddings.first() else {
        return vec![];
    };

    let embedding_size = first.len();
    let mut averaged = vec![0.0f32; embedding_size];
    let mut count = 0usize;

    for embedding in embeddings.iter().filter(|e| e.len() == embedding_size) {
        for (slot, &value) in averaged.iter_mut().zip(embedding) {
            *slot += value;
        }
        count += 1;
    }

    let count = count as f32;
    for value in &mut averaged {
        *value /= count;
    }

    averaged
}
