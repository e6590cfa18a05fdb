//! Feature encoding: bounded continuous state → cosine Fourier features
//!
//! Each feature is `cos(π · c·x)` where `x` is the normalized state (truncated or
//! zero-padded to the basis dimension) and `c` is an integer coefficient vector
//! with entries in `0..=order`.

use std::f64::consts::PI;

use crate::config::{MAX_FEATURES, NORMALIZATION_EPSILON};
use crate::ObservationBounds;

/// Truncated Fourier basis over `dimension` normalized coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct FourierBasis {
    order: u32,
    dimension: usize,

    /// Coefficient vectors in enumeration order; index i feeds weight column i
    coefficients: Vec<Vec<u32>>,

    /// Bounds restricted to the first `dimension` coordinates
    bounds: Option<ObservationBounds>,
}

impl FourierBasis {
    /// Build the basis for an already clamped `(order, dimension)` pair.
    ///
    /// `bounds` may cover more coordinates than `dimension`; only the leading
    /// `dimension` entries are kept.
    pub fn new(order: u32, dimension: usize, bounds: Option<&ObservationBounds>) -> Self {
        assert!(dimension >= 1, "Fourier basis needs at least one dimension");
        Self {
            order,
            dimension,
            coefficients: generate_coefficients(order, dimension),
            bounds: bounds.map(|b| restrict_bounds(b, dimension)),
        }
    }

    /// Replace the generated coefficients with externally supplied ones
    /// (e.g. from a snapshot). The caller is responsible for validating them.
    pub(crate) fn with_coefficients(mut self, coefficients: Vec<Vec<u32>>) -> Self {
        self.coefficients = coefficients;
        self
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn coefficients(&self) -> &[Vec<u32>] {
        &self.coefficients
    }

    pub fn bounds(&self) -> Option<&ObservationBounds> {
        self.bounds.as_ref()
    }

    /// Realized number of features (`coefficients.len()`).
    pub fn feature_count(&self) -> usize {
        self.coefficients.len()
    }

    /// Map `state` to `[0, 1]^dimension`: truncate/pad, normalize, clamp.
    ///
    /// # Panics
    /// Panics if `state` is empty.
    pub fn normalize(&self, state: &[f64]) -> Vec<f64> {
        assert!(!state.is_empty(), "cannot encode an empty state vector");

        let mut x = vec![0.0; self.dimension];
        let n = state.len().min(self.dimension);
        x[..n].copy_from_slice(&state[..n]);

        if let Some(bounds) = &self.bounds {
            for ((v, &low), &high) in x.iter_mut().zip(&bounds.low).zip(&bounds.high) {
                *v = (*v - low) / (high - low + NORMALIZATION_EPSILON);
            }
        }

        for v in &mut x {
            // NaN coordinates collapse to 0 so the features stay finite
            *v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        }
        x
    }

    /// Encode `state` into `feature_count()` cosine features.
    ///
    /// Deterministic, no side effects; every output lies in [-1, 1].
    pub fn encode(&self, state: &[f64]) -> Vec<f64> {
        let x = self.normalize(state);
        self.coefficients
            .iter()
            .map(|c| {
                let dot: f64 = c.iter().zip(&x).map(|(&ci, &xi)| ci as f64 * xi).sum();
                (PI * dot).cos()
            })
            .collect()
    }
}

/// Number of coefficient vectors the basis will hold after capping.
pub fn capped_feature_count(order: u32, dimension: usize) -> usize {
    let per_dim = order as usize + 1;
    let mut total = 1usize;
    for _ in 0..dimension {
        total = total.saturating_mul(per_dim);
        if total >= MAX_FEATURES {
            return MAX_FEATURES;
        }
    }
    total
}

/// Enumerate `{0..=order}^dimension` lexicographically (last coordinate varies
/// fastest), stopping after `capped_feature_count` vectors.
pub fn generate_coefficients(order: u32, dimension: usize) -> Vec<Vec<u32>> {
    let limit = capped_feature_count(order, dimension);
    let mut out = Vec::with_capacity(limit);
    let mut current = vec![0u32; dimension];

    while out.len() < limit {
        out.push(current.clone());

        // Odometer increment from the right
        let mut pos = dimension;
        loop {
            if pos == 0 {
                return out;
            }
            pos -= 1;
            if current[pos] < order {
                current[pos] += 1;
                break;
            }
            current[pos] = 0;
        }
    }
    out
}

fn restrict_bounds(bounds: &ObservationBounds, dimension: usize) -> ObservationBounds {
    let n = dimension.min(bounds.low.len()).min(bounds.high.len());
    ObservationBounds {
        low: bounds.low[..n].to_vec(),
        high: bounds.high[..n].to_vec(),
    }
}
