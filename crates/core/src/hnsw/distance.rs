//! Distance metric implementations for HNSW search.
//!
//! Supports three distance functions: squared euclidean (L2²), inner product,
//! and cosine. All of them return a value where **lower is better**.
//!
//! Inputs must have equal length. That precondition is enforced once at the
//! [`HnswIndex`](crate::hnsw::HnswIndex) boundary, so the functions here only
//! `debug_assert!` it and stay branch-free on the hot path.

use crate::error::{HnswError, Result};
use serde::{Deserialize, Serialize};

/// Distance metric used for vector similarity computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Squared Euclidean distance (L2²). Range: \[0, ∞).
    #[default]
    Euclidean,
    /// Negative dot product: `-dot(a, b)`. Lower = higher similarity.
    InnerProduct,
    /// Cosine distance: `1 - cosine_similarity`. Range: \[0, 2\].
    Cosine,
}

impl DistanceMetric {
    /// Compute the distance between two equal-length vectors.
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Euclidean => l2_distance(a, b),
            DistanceMetric::InnerProduct => inner_product_distance(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
        }
    }

    /// Returns `true` if the metric cannot handle zero-norm vectors.
    #[inline]
    pub fn requires_nonzero_norm(&self) -> bool {
        matches!(self, DistanceMetric::Cosine)
    }
}

/// Squared L2 distance. No square root: ordering is preserved without it.
#[inline]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Negative dot product, so that higher similarity gives a lower distance.
#[inline]
pub fn inner_product_distance(a: &[f32], b: &[f32]) -> f32 {
    -dot(a, b)
}

/// Cosine distance for the search hot path.
///
/// A zero-norm input yields `1.0` (treated as orthogonal) rather than NaN.
/// The index rejects zero vectors up front when configured for cosine, so
/// this branch is only reachable through direct calls.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    try_cosine_distance(a, b).unwrap_or(1.0)
}

/// Cosine distance that reports a zero-norm input as [`HnswError::ZeroNorm`].
pub fn try_cosine_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    debug_assert_eq!(a.len(), b.len());
    let mut ab = 0.0f32;
    let mut aa = 0.0f32;
    let mut bb = 0.0f32;
    for (&x, &y) in a.iter().zip(b) {
        ab += x * y;
        aa += x * x;
        bb += y * y;
    }
    if aa == 0.0 || bb == 0.0 {
        return Err(HnswError::ZeroNorm);
    }
    Ok(1.0 - ab / (aa.sqrt() * bb.sqrt()))
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}
