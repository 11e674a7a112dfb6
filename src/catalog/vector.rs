//! Shared vector helpers for embeddings and cluster centroids: cosine
//! similarity and L2 renormalization. Not a similarity-search engine —
//! just the small amount of math the catalog's storage contract (unit
//! vectors in, cluster membership out) requires of callers.

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Rescales `v` to unit L2 norm in place. A zero vector is left unchanged.
pub fn normalize(v: &mut [f32]) {
    let norm: f64 = v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm == 0.0 {
        return;
    }
    for x in v.iter_mut() {
        *x = (*x as f64 / norm) as f32;
    }
}

/// Mean of `vectors`, renormalized to unit length — the centroid update
/// rule used when merging clusters or adding a member.
pub fn mean_unit_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let dim = vectors.first()?.len();
    let mut mean = vec![0.0f64; dim];
    for v in vectors {
        for (i, x) in v.iter().enumerate() {
            mean[i] += *x as f64;
        }
    }
    let n = vectors.len() as f64;
    let mut result: Vec<f32> = mean.iter().map(|x| (x / n) as f32).collect();
    normalize(&mut result);
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-9);
    }

    #[test]
    fn normalize_produces_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        let norm: f64 = v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mean_unit_vector_renormalizes() {
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let mean = mean_unit_vector(&vectors).unwrap();
        let norm: f64 = mean.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }
}
