#![deny(warnings)]

//! Core domain models and invariants for the Postscript planner.
//!
//! This crate defines the serializable types shared by the simulators and the
//! optimizer, with validation helpers that guarantee their basic invariants.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod allocation;
mod hunt;
pub mod reshape;

pub use allocation::Allocation;
pub use hunt::{target_hunts, CheeseCounts, HuntPlan};

/// Number of genres a chapter can be written in.
pub const GENRE_COUNT: usize = 5;
/// Notoriety gained per hunt for each cheese tier, lowest first.
pub const CHEESE_VALUES: [u32; 3] = [25, 50, 125];
/// Hunts available in a regular chapter.
pub const BASE_HUNTS: u32 = 10;
/// Extra hunts granted by the "extend hunts" option.
pub const EXTENDED_BONUS: u32 = 3;
/// Upper bound for any single genre's notoriety.
pub const NOTORIETY_CAP: u32 = 200;
/// A genre is ready once its notoriety reaches this value.
pub const READY_THRESHOLD: u32 = 80;
/// Breakpoints reported by batch histograms (strictly-greater comparisons).
pub const THRESHOLD_BREAKPOINTS: [u32; 3] = [80, 90, 93];

/// A chapter genre.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Genre {
    Romance,
    Adventure,
    Comedy,
    Tragedy,
    Suspense,
}

impl Genre {
    /// All genres in display order; indices into allocations follow this order.
    pub const ALL: [Genre; GENRE_COUNT] = [
        Genre::Romance,
        Genre::Adventure,
        Genre::Comedy,
        Genre::Tragedy,
        Genre::Suspense,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Genre::Romance => "Romance",
            Genre::Adventure => "Adventure",
            Genre::Comedy => "Comedy",
            Genre::Tragedy => "Tragedy",
            Genre::Suspense => "Suspense",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Case-insensitive lookup by name.
    pub fn parse(name: &str) -> Option<Genre> {
        Genre::ALL
            .into_iter()
            .find(|g| g.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A scalar input violates its stated constraint.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    /// Allocation weights do not add up to the fixed total.
    #[error("allocation sums to {actual}, expected {expected}")]
    TotalMismatch { expected: f64, actual: f64 },
    /// Weights must be >= 0.
    #[error("negative weight {value} at index {index}")]
    NegativeWeight { index: usize, value: f64 },
    /// Numeric field must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    /// Per-genre inputs must have one entry per category.
    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    /// Cheese counts must fill the chapter's hunts exactly.
    #[error("cheese counts sum to {actual}, should equal {expected} hunts")]
    CheeseMismatch { expected: u32, actual: u32 },
}

impl ValidationError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Clamp raw notoriety input to `[0, NOTORIETY_CAP]`.
pub fn clamp_notoriety(values: &[u32]) -> Vec<u32> {
    values.iter().map(|v| (*v).min(NOTORIETY_CAP)).collect()
}

/// Validate that per-genre input has exactly `expected` entries.
pub fn validate_len<T>(values: &[T], expected: usize) -> Result<(), ValidationError> {
    if values.len() != expected {
        return Err(ValidationError::LengthMismatch {
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

/// Format per-genre values as `Romance:1; Adventure:2; ...`.
pub fn genre_pairs<T: std::fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .enumerate()
        .map(|(idx, v)| match Genre::ALL.get(idx) {
            Some(g) => format!("{}:{}", g.name(), v),
            None => format!("#{}:{}", idx + 1, v),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
