// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector BLOB serialization and cosine math for the related-links search.
//!
//! Embeddings are stored as little-endian f32 BLOBs. Similarity scores are
//! derived from cosine distance as `1 / (1 + distance)` and rounded to two
//! decimals, so they land in `(0, 1]` with 1.0 meaning identical direction.

/// Convert an f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a SQLite BLOB back to an f32 vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

/// Cosine similarity between two vectors of equal length.
///
/// Zero-norm inputs yield 0.0 rather than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

/// Cosine distance: `1 - similarity`, in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - cosine_similarity(a, b)
}

/// Convert a cosine distance to a relatedness score, rounded to two
/// decimals: `score = 1 / (1 + distance)`.
pub fn score_from_distance(distance: f64) -> f64 {
    let score = 1.0 / (1.0 + distance);
    (score * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_roundtrip() {
        let original = vec![0.1_f32, 0.2, 0.3, -0.5, 1.0];
        let blob = vec_to_blob(&original);
        assert_eq!(blob.len(), original.len() * 4);
        let recovered = blob_to_vec(&blob);
        assert_eq!(original.len(), recovered.len());
        for (a, b) in original.iter().zip(recovered.iter()) {
            assert!((a - b).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn identical_vectors_score_one() {
        let v = vec![0.3_f32, 0.4, 0.5];
        let d = cosine_distance(&v, &v);
        assert!(d.abs() < 1e-9);
        assert!((score_from_distance(d) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn orthogonal_vectors_score_half() {
        let a = vec![1.0_f32, 0.0];
        let b = vec![0.0_f32, 1.0];
        let d = cosine_distance(&a, &b);
        assert!((d - 1.0).abs() < 1e-9);
        // 1 / (1 + 1) = 0.5
        assert!((score_from_distance(d) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn opposite_vectors_score_third() {
        let a = vec![1.0_f32, 0.0];
        let b = vec![-1.0_f32, 0.0];
        let d = cosine_distance(&a, &b);
        assert!((d - 2.0).abs() < 1e-9);
        // 1 / (1 + 2) rounded to two decimals.
        assert!((score_from_distance(d) - 0.33).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_norm_is_not_nan() {
        let a = vec![0.0_f32, 0.0];
        let b = vec![1.0_f32, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn score_rounding_two_decimals() {
        // distance 0.25 -> score 0.8 exactly
        assert!((score_from_distance(0.25) - 0.8).abs() < f64::EPSILON);
        // an awkward distance still rounds to two decimals
        let s = score_from_distance(0.337);
        assert!((s * 100.0 - (s * 100.0).round()).abs() < 1e-9);
    }
}
