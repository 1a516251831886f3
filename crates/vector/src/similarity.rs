/// Added to the norm product so all-zero vectors score 0 instead of NaN
pub const COSINE_EPSILON: f64 = 1e-10;

/// Epsilon-stabilised cosine similarity: `dot(a, b) / (|a| * |b| + 1e-10)`
///
/// Accumulates in f64. Returns `None` when the vectors differ in length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    Some(dot / (norm_a.sqrt() * norm_b.sqrt() + COSINE_EPSILON))
}
