//! Mallet cost of rerolling area options until a target shows up in five areas.

use postscript_core::ValidationError;
use rand::{seq::index, Rng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::SimError;

pub const MALLETS_PER_REROLL: u32 = 3;
pub const AREAS_PER_RUN: usize = 5;
pub const DEFAULT_ITERATIONS: u32 = 40_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AreaLength {
    Short,
    Medium,
    Long,
}

impl AreaLength {
    pub const ALL: [AreaLength; 3] = [AreaLength::Short, AreaLength::Medium, AreaLength::Long];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// The genre offered for each area length, indexed by [`AreaLength::index`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AreaOptions([usize; 3]);

impl AreaOptions {
    pub fn genre(&self, length: AreaLength) -> usize {
        self.0[length.index()]
    }

    pub fn offers(&self, genre: usize) -> bool {
        self.0.contains(&genre)
    }
}

fn check_genres(genres: usize) -> Result<(), ValidationError> {
    if genres == 0 {
        return Err(ValidationError::invalid("genres", "must be > 0"));
    }
    Ok(())
}

/// Draw one set of options. Genres are distinct when the pool has at least
/// three, otherwise repeats are allowed. An empty pool is rejected.
pub fn generate_options<R: Rng + ?Sized>(
    genres: usize,
    rng: &mut R,
) -> Result<AreaOptions, ValidationError> {
    check_genres(genres)?;
    Ok(draw_options(genres, rng))
}

fn draw_options<R: Rng + ?Sized>(genres: usize, rng: &mut R) -> AreaOptions {
    let slots = AreaLength::ALL.len();
    let mut picks = [0usize; 3];
    if genres < slots {
        for p in &mut picks {
            *p = rng.gen_range(0..genres);
        }
    } else {
        for (p, g) in picks.iter_mut().zip(index::sample(rng, genres, slots).iter()) {
            *p = g;
        }
    }
    AreaOptions(picks)
}

fn mallets_until<R, F>(genres: usize, rng: &mut R, accept: F) -> u32
where
    R: Rng + ?Sized,
    F: Fn(&AreaOptions) -> bool,
{
    let mut spent = 0;
    while !accept(&draw_options(genres, rng)) {
        spent += MALLETS_PER_REROLL;
    }
    spent
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RerollReport {
    pub genres: usize,
    pub iterations: u32,
    /// Mallets to see the target genre in any slot, five areas in a row.
    pub avg_mallets_genre: f64,
    /// Mallets to see the target genre on the target length, five areas in a row.
    pub avg_mallets_combo: f64,
}

impl RerollReport {
    pub fn summary(&self) -> String {
        format!(
            "{} genres, {} simulations\n\
             Avg. Mallets to match same Genre across five areas: {:.2}\n\
             Avg. Mallets to match same Length + Genre across five areas: {:.2}",
            self.genres, self.iterations, self.avg_mallets_genre, self.avg_mallets_combo
        )
    }
}

pub fn simulate_rerolls<R: Rng + ?Sized>(
    genres: usize,
    iterations: u32,
    rng: &mut R,
) -> Result<RerollReport, SimError> {
    check_genres(genres)?;
    if iterations == 0 {
        return Err(ValidationError::invalid("iterations", "must be > 0").into());
    }
    let mut genre_total = 0u64;
    let mut combo_total = 0u64;
    for _ in 0..iterations {
        let target = rng.gen_range(0..genres);
        let length = AreaLength::ALL[rng.gen_range(0..AreaLength::ALL.len())];
        for _ in 0..AREAS_PER_RUN {
            genre_total += mallets_until(genres, rng, |o| o.offers(target)) as u64;
            combo_total += mallets_until(genres, rng, |o| o.genre(length) == target) as u64;
        }
    }
    let n = iterations as f64;
    let report = RerollReport {
        genres,
        iterations,
        avg_mallets_genre: genre_total as f64 / n,
        avg_mallets_combo: combo_total as f64 / n,
    };
    debug!(
        genres,
        iterations,
        genre = report.avg_mallets_genre,
        combo = report.avg_mallets_combo,
        "reroll simulation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn options_are_distinct_for_large_pools() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..500 {
            let o = generate_options(5, &mut rng).unwrap();
            let [a, b, c] = o.0;
            assert!(a != b && b != c && a != c);
            assert!(o.0.iter().all(|g| *g < 5));
        }
    }

    #[test]
    fn small_pools_allow_repeats() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let o = generate_options(1, &mut rng).unwrap();
        assert_eq!(o.0, [0, 0, 0]);
        assert!(o.offers(0));
        assert_eq!(o.genre(AreaLength::Long), 0);
    }

    #[test]
    fn single_genre_costs_nothing() {
        let report = simulate_rerolls(1, 100, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        assert_eq!(report.avg_mallets_genre, 0.0);
        assert_eq!(report.avg_mallets_combo, 0.0);
    }

    #[test]
    fn three_genres_always_offer_the_target() {
        let report = simulate_rerolls(3, 200, &mut ChaCha8Rng::seed_from_u64(2)).unwrap();
        assert_eq!(report.avg_mallets_genre, 0.0);
        assert!(report.avg_mallets_combo > 0.0);
    }

    #[test]
    fn combo_costs_more_than_genre() {
        let report = simulate_rerolls(6, 2_000, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        assert!(report.avg_mallets_combo > report.avg_mallets_genre);
        assert!(report.summary().starts_with("6 genres, 2000 simulations"));
    }

    #[test]
    fn rejects_empty_inputs() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(simulate_rerolls(0, 10, &mut rng).is_err());
        assert!(simulate_rerolls(5, 0, &mut rng).is_err());
    }

    #[test]
    fn empty_pool_has_no_options() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            generate_options(0, &mut rng),
            Err(ValidationError::InvalidParameter { name: "genres", .. })
        ));
    }
}
