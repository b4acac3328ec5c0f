//! Page distribution helpers: parsing, normalising, scaling and the
//! contingency start patch.

use crate::{Genre, ValidationError};
use serde::{Deserialize, Serialize};

/// Hunt length of the chapter used to patch a bad start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChapterLength {
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "20")]
    Twenty,
    #[serde(rename = "30")]
    Thirty,
}

impl ChapterLength {
    /// Pages the chapter adds to its genre.
    pub fn page_boost(self) -> u32 {
        match self {
            ChapterLength::Ten => 250,
            ChapterLength::Twenty => 500,
            ChapterLength::Thirty => 750,
        }
    }

    pub fn from_hunts(hunts: u32) -> Option<Self> {
        match hunts {
            10 => Some(ChapterLength::Ten),
            20 => Some(ChapterLength::Twenty),
            30 => Some(ChapterLength::Thirty),
            _ => None,
        }
    }
}

/// Extract exactly `expected` whole numbers from free-form text.
///
/// Any run of non-digits acts as a separator, so "500, 500;250 0 750" parses.
/// A number that does not fit in a `u32` is rejected.
pub fn parse_counts(text: &str, expected: usize) -> Result<Vec<u32>, ValidationError> {
    let numbers = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .map_err(|_| ValidationError::invalid("counts", format!("`{part}` is too large")))
        })
        .collect::<Result<Vec<u32>, _>>()?;
    if numbers.len() != expected {
        return Err(ValidationError::LengthMismatch {
            expected,
            actual: numbers.len(),
        });
    }
    Ok(numbers)
}

/// Normalised shares; equal shares when every count is zero.
pub fn weights_from_counts(counts: &[u32]) -> Vec<f64> {
    let total: u64 = counts.iter().map(|c| *c as u64).sum();
    if total == 0 {
        let equal = 1.0 / counts.len().max(1) as f64;
        return vec![equal; counts.len()];
    }
    counts.iter().map(|c| *c as f64 / total as f64).collect()
}

/// Scale a distribution to `percent` of its total while keeping the ratios.
pub fn scale_distribution(counts: &[u32], percent: f64) -> Result<Vec<f64>, ValidationError> {
    if !percent.is_finite() || percent < 0.0 {
        return Err(ValidationError::invalid("percent", "must be finite and >= 0"));
    }
    let base_total: f64 = counts.iter().map(|c| *c as f64).sum();
    if base_total <= 0.0 {
        return Err(ValidationError::invalid(
            "counts",
            "distribution is empty; provide pages first",
        ));
    }
    let target_total = (base_total * percent / 100.0).max(1.0);
    Ok(counts
        .iter()
        .map(|c| *c as f64 * target_total / base_total)
        .collect())
}

/// Result of a contingency start patch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartFix {
    pub pages: Vec<f64>,
    pub total: f64,
}

impl StartFix {
    /// Per-genre percentage of the new total.
    pub fn percentages(&self) -> Vec<f64> {
        self.pages
            .iter()
            .map(|p| if self.total > 0.0 { p / self.total * 100.0 } else { 0.0 })
            .collect()
    }
}

/// Add a chapter of `length` to `genre` and rebalance so that `genre` holds
/// `share_percent` of the pages, the rest keeping their relative ratios.
///
/// The share is clamped to [5%, 90%]; the total never shrinks below the
/// original pages plus the boost.
pub fn fix_start(
    counts: &[u32],
    genre: Genre,
    length: ChapterLength,
    share_percent: f64,
) -> Result<StartFix, ValidationError> {
    crate::validate_len(counts, crate::GENRE_COUNT)?;
    if !share_percent.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    let total_original: f64 = counts.iter().map(|c| *c as f64).sum();
    if total_original <= 0.0 {
        return Err(ValidationError::invalid(
            "counts",
            "distribution is empty; provide pages first",
        ));
    }
    let target = genre.index();
    let boost = length.page_boost() as f64;
    let share = (share_percent / 100.0).clamp(0.05, 0.9);

    let boosted_target = counts[target] as f64 + boost;
    let required_total = boosted_target / share;
    let fallback_total = total_original + boost;
    let final_total = required_total.max(fallback_total);
    let target_value = final_total * share;
    let remaining = final_total - target_value;

    let mut pages = vec![0.0; counts.len()];
    pages[target] = target_value;
    let others: Vec<usize> = (0..counts.len()).filter(|idx| *idx != target).collect();
    let others_sum: f64 = others.iter().map(|idx| counts[*idx] as f64).sum();
    for idx in &others {
        pages[*idx] = if others_sum <= 0.0 {
            remaining / others.len() as f64
        } else {
            remaining * counts[*idx] as f64 / others_sum
        };
    }
    Ok(StartFix {
        pages,
        total: final_total,
    })
}
