use crate::ValidationError;
use serde::{Deserialize, Serialize};

/// Page weights across categories with a fixed total.
///
/// Invariant: every weight is finite and `>= 0`, and the weights sum to
/// `total` within [`Allocation::tolerance`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAllocation")]
pub struct Allocation {
    weights: Vec<f64>,
    total: f64,
}

#[derive(Deserialize)]
struct RawAllocation {
    weights: Vec<f64>,
    total: f64,
}

impl TryFrom<RawAllocation> for Allocation {
    type Error = ValidationError;

    fn try_from(raw: RawAllocation) -> Result<Self, Self::Error> {
        Allocation::new(raw.weights, raw.total)
    }
}

impl Allocation {
    /// Build an allocation, validating the sum and sign invariants.
    pub fn new(weights: Vec<f64>, total: f64) -> Result<Self, ValidationError> {
        let alloc = Allocation { weights, total };
        alloc.validate()?;
        Ok(alloc)
    }

    /// Allocation whose total is the sum of the given page counts.
    pub fn from_counts(counts: &[u32]) -> Result<Self, ValidationError> {
        let weights: Vec<f64> = counts.iter().map(|c| *c as f64).collect();
        let total = weights.iter().sum();
        Allocation::new(weights, total)
    }

    /// Equal weights over `categories` buckets.
    pub fn uniform(categories: usize, total: f64) -> Result<Self, ValidationError> {
        if categories == 0 {
            return Err(ValidationError::invalid(
                "categories",
                "at least one category is required",
            ));
        }
        let share = total / categories as f64;
        Allocation::new(vec![share; categories], total)
    }

    /// Rescale arbitrary non-negative weights so they sum to `total`.
    ///
    /// Negative entries are clamped to zero first. Returns `None` when nothing
    /// positive is left to scale, or when the input is not finite.
    pub fn rescaled(weights: Vec<f64>, total: f64) -> Option<Self> {
        let clamped: Vec<f64> = weights.into_iter().map(|w| w.max(0.0)).collect();
        let sum: f64 = clamped.iter().sum();
        if !sum.is_finite() || sum <= 0.0 || !total.is_finite() {
            return None;
        }
        let factor = total / sum;
        let mut scaled: Vec<f64> = clamped.iter().map(|w| w * factor).collect();
        // Push the floating point residue into the largest bucket.
        let residue = total - scaled.iter().sum::<f64>();
        if let Some(max_idx) = argmax(&scaled) {
            scaled[max_idx] = (scaled[max_idx] + residue).max(0.0);
        }
        Allocation::new(scaled, total).ok()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Absolute slack allowed between the weight sum and the total.
    pub fn tolerance(total: f64) -> f64 {
        1e-6 * total.abs().max(1.0)
    }

    /// Per-category shares in [0,1]; equal shares when the total is zero.
    pub fn probabilities(&self) -> Vec<f64> {
        if self.total <= 0.0 {
            let equal = 1.0 / self.weights.len().max(1) as f64;
            return vec![equal; self.weights.len()];
        }
        self.weights.iter().map(|w| w / self.total).collect()
    }

    /// Nearest whole page counts.
    pub fn rounded(&self) -> Vec<u32> {
        self.weights
            .iter()
            .map(|w| w.round().clamp(0.0, u32::MAX as f64) as u32)
            .collect()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.weights.is_empty() {
            return Err(ValidationError::invalid(
                "allocation",
                "at least one category is required",
            ));
        }
        if !self.total.is_finite() {
            return Err(ValidationError::NonFinite);
        }
        if self.total < 0.0 {
            return Err(ValidationError::invalid("total", "must be >= 0"));
        }
        for (index, w) in self.weights.iter().enumerate() {
            if !w.is_finite() {
                return Err(ValidationError::NonFinite);
            }
            if *w < 0.0 {
                return Err(ValidationError::NegativeWeight { index, value: *w });
            }
        }
        let actual: f64 = self.weights.iter().sum();
        if (actual - self.total).abs() > Allocation::tolerance(self.total) {
            return Err(ValidationError::TotalMismatch {
                expected: self.total,
                actual,
            });
        }
        Ok(())
    }
}

fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (idx, v)| match best {
            Some((_, b)) if b >= *v => best,
            _ => Some((idx, *v)),
        })
        .map(|(idx, _)| idx)
}
