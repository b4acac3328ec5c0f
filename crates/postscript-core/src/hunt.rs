use crate::{ValidationError, BASE_HUNTS, CHEESE_VALUES, EXTENDED_BONUS};
use serde::{Deserialize, Serialize};

/// Number of hunts to run with each cheese tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheeseCounts {
    /// Hunts using the 25-point cheese.
    pub low: u32,
    /// Hunts using the 50-point cheese.
    pub mid: u32,
    /// Hunts using the 125-point cheese.
    pub high: u32,
}

impl CheeseCounts {
    pub fn total(&self) -> u32 {
        self.low.saturating_add(self.mid).saturating_add(self.high)
    }

    /// Counts in the same order as [`CHEESE_VALUES`].
    pub fn as_array(&self) -> [u32; 3] {
        [self.low, self.mid, self.high]
    }

    pub fn from_slice(counts: &[u32]) -> Result<Self, ValidationError> {
        crate::validate_len(counts, CHEESE_VALUES.len())?;
        Ok(CheeseCounts {
            low: counts[0],
            mid: counts[1],
            high: counts[2],
        })
    }
}

/// Cheese plan for one chapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HuntPlan {
    pub cheese: CheeseCounts,
    /// Whether the chapter was extended by [`EXTENDED_BONUS`] hunts.
    #[serde(default)]
    pub extend: bool,
}

impl Default for HuntPlan {
    fn default() -> Self {
        HuntPlan::all_mid(false)
    }
}

impl HuntPlan {
    /// Every available hunt on the 50-point cheese.
    pub fn all_mid(extend: bool) -> Self {
        HuntPlan {
            cheese: CheeseCounts {
                low: 0,
                mid: target_hunts(extend),
                high: 0,
            },
            extend,
        }
    }

    pub fn target_hunts(&self) -> u32 {
        target_hunts(self.extend)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let expected = self.target_hunts();
        let actual = self.cheese.total();
        if actual != expected {
            return Err(ValidationError::CheeseMismatch { expected, actual });
        }
        Ok(())
    }

    /// Per-hunt cheese values, highest value first.
    pub fn sequence(&self) -> Vec<u32> {
        let mut tiers: Vec<(u32, u32)> = CHEESE_VALUES
            .iter()
            .copied()
            .zip(self.cheese.as_array())
            .collect();
        tiers.sort_by(|a, b| b.0.cmp(&a.0));
        let mut seq = Vec::with_capacity(self.cheese.total() as usize);
        for (value, count) in tiers {
            seq.extend(std::iter::repeat(value).take(count as usize));
        }
        seq
    }
}

/// Hunts available in a chapter.
pub fn target_hunts(extend: bool) -> u32 {
    BASE_HUNTS + if extend { EXTENDED_BONUS } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_is_valid() {
        let plan = HuntPlan::default();
        assert!(plan.validate().is_ok());
        assert_eq!(plan.sequence(), vec![50; 10]);
        assert_eq!(HuntPlan::all_mid(true).target_hunts(), 13);
    }

    #[test]
    fn sequence_orders_high_first() {
        let plan = HuntPlan {
            cheese: CheeseCounts {
                low: 2,
                mid: 6,
                high: 2,
            },
            extend: false,
        };
        let seq = plan.sequence();
        assert_eq!(&seq[..2], &[125, 125]);
        assert_eq!(&seq[8..], &[25, 25]);
        assert_eq!(seq.len(), 10);
    }

    #[test]
    fn mismatched_counts_fail() {
        let plan = HuntPlan {
            cheese: CheeseCounts {
                low: 0,
                mid: 10,
                high: 0,
            },
            extend: true,
        };
        assert_eq!(
            plan.validate(),
            Err(ValidationError::CheeseMismatch {
                expected: 13,
                actual: 10
            })
        );
    }

    #[test]
    fn counts_from_slice() {
        let c = CheeseCounts::from_slice(&[1, 2, 3]).unwrap();
        assert_eq!(c.as_array(), [1, 2, 3]);
        assert!(CheeseCounts::from_slice(&[1, 2]).is_err());
    }

    #[test]
    fn huge_counts_are_a_mismatch() {
        let plan = HuntPlan {
            cheese: CheeseCounts::from_slice(&[u32::MAX, 1, 0]).unwrap(),
            extend: false,
        };
        assert_eq!(
            plan.validate(),
            Err(ValidationError::CheeseMismatch {
                expected: 10,
                actual: u32::MAX
            })
        );
    }
}
