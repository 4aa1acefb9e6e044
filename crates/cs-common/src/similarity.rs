use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::reference::ReferenceEmbedding;

#[derive(Debug, Error, PartialEq)]
pub enum SimilarityError {
    #[error("embedding dimensions differ ({left} vs {right})")]
    DimensionMismatch { left: usize, right: usize },
    #[error("division by zero: cosine similarity is undefined for a zero-norm vector")]
    DivisionByZero,
    #[error("no reference embeddings available")]
    NoReferences,
}

/// Cosine similarity of two embeddings, in `[-1, 1]`.
///
/// Accumulates in `f64`; a zero-norm (or empty) vector is an error instead of NaN.
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f64, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold(
        (0.0_f64, 0.0_f64, 0.0_f64),
        |(dot, na, nb), (&x, &y)| {
            let (x, y) = (f64::from(x), f64::from(y));
            (dot + x * y, na + x * x, nb + y * y)
        },
    );

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(SimilarityError::DivisionByZero);
    }

    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub file: String,
    pub similarities: BTreeMap<String, f64>,
    pub average_similarity: f64,
}

/// Score every subject against every reference and sort by average, highest first.
///
/// Subjects with equal averages keep their input order.
pub fn rank(
    subjects: &[(String, Vec<f32>)],
    references: &[ReferenceEmbedding],
) -> Result<Vec<SimilarityResult>, SimilarityError> {
    if references.is_empty() {
        return Err(SimilarityError::NoReferences);
    }

    let mut results = subjects
        .iter()
        .map(|(file, vector)| {
            let similarities = references
                .iter()
                .map(|reference| Ok((reference.name.clone(), cosine(vector, &reference.vector)?)))
                .collect::<Result<BTreeMap<_, _>, SimilarityError>>()?;
            let average_similarity =
                similarities.values().sum::<f64>() / similarities.len() as f64;

            Ok(SimilarityResult {
                file: file.clone(),
                similarities,
                average_similarity,
            })
        })
        .collect::<Result<Vec<_>, SimilarityError>>()?;

    results.sort_by(|a, b| {
        b.average_similarity
            .partial_cmp(&a.average_similarity)
            .unwrap_or(Ordering::Equal)
    });

    Ok(results)
}
