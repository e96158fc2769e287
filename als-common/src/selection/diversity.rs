//! Greedy diversity selection within one subscale

use crate::similarity::SimilarityMatrix;

/// Indices chosen from a subscale pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiversityOutcome {
    /// Chosen indices, ascending (original item order)
    pub indices: Vec<usize>,
    /// How many of them came from the farthest-point backfill
    pub backfilled: usize,
}

/// Pick `quota` mutually dissimilar items
///
/// Items are walked in order. The first is always accepted; each later item is
/// accepted only if its highest similarity to the accepted set is strictly below
/// `threshold`, until `quota` items are accepted. Remaining slots are filled one at a
/// time with the unaccepted item whose minimum dissimilarity (`1 - sim`) to the
/// accepted set is largest; equal scores go to the later item.
///
/// A pool no larger than `quota` is taken whole.
pub fn select_diverse(similarity: &SimilarityMatrix, quota: usize, threshold: f64) -> DiversityOutcome {
    let n = similarity.len();
    if n <= quota {
        return DiversityOutcome {
            indices: (0..n).collect(),
            backfilled: 0,
        };
    }

    let mut accepted: Vec<usize> = Vec::with_capacity(quota);
    for idx in 0..n {
        if accepted.len() >= quota {
            break;
        }
        if accepted.is_empty() {
            accepted.push(idx);
            continue;
        }
        let max_sim = accepted
            .iter()
            .map(|&j| similarity.get(idx, j))
            .fold(f64::NEG_INFINITY, f64::max);
        if max_sim < threshold {
            accepted.push(idx);
        }
    }

    let mut backfilled = 0;
    if accepted.len() < quota {
        // Scored once against the threshold-accepted set, best first
        let mut ranked: Vec<(f64, usize)> = (0..n)
            .filter(|i| !accepted.contains(i))
            .map(|i| {
                let score = accepted
                    .iter()
                    .map(|&j| 1.0 - similarity.get(i, j))
                    .fold(f64::INFINITY, f64::min);
                (score, i)
            })
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)));

        let missing = quota - accepted.len();
        for (_, i) in ranked.into_iter().take(missing) {
            accepted.push(i);
            backfilled += 1;
        }
    }

    accepted.truncate(quota);
    accepted.sort_unstable();
    DiversityOutcome {
        indices: accepted,
        backfilled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[f64]]) -> SimilarityMatrix {
        SimilarityMatrix::from_rows(rows.iter().map(|r| r.to_vec()).collect())
    }

    #[test]
    fn test_small_pool_taken_whole() {
        let sim = matrix(&[&[1.0, 0.9], &[0.9, 1.0]]);
        let outcome = select_diverse(&sim, 3, 0.8);
        assert_eq!(outcome.indices, vec![0, 1]);
        assert_eq!(outcome.backfilled, 0);
    }

    #[test]
    fn test_skips_near_duplicates() {
        // 1 duplicates 0; 2 and 3 are distinct
        let sim = matrix(&[
            &[1.0, 0.95, 0.1, 0.2],
            &[0.95, 1.0, 0.1, 0.2],
            &[0.1, 0.1, 1.0, 0.3],
            &[0.2, 0.2, 0.3, 1.0],
        ]);
        let outcome = select_diverse(&sim, 3, 0.8);
        assert_eq!(outcome.indices, vec![0, 2, 3]);
        assert_eq!(outcome.backfilled, 0);

        for (a, &i) in outcome.indices.iter().enumerate() {
            for &j in &outcome.indices[a + 1..] {
                assert!(sim.get(i, j) < 0.8);
            }
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        let sim = matrix(&[&[1.0, 0.8, 0.0], &[0.8, 1.0, 0.0], &[0.0, 0.0, 1.0]]);
        let outcome = select_diverse(&sim, 2, 0.8);
        assert_eq!(outcome.indices, vec![0, 2]);
    }

    #[test]
    fn test_stops_at_quota() {
        let sim = matrix(&[
            &[1.0, 0.0, 0.0, 0.0],
            &[0.0, 1.0, 0.0, 0.0],
            &[0.0, 0.0, 1.0, 0.0],
            &[0.0, 0.0, 0.0, 1.0],
        ]);
        let outcome = select_diverse(&sim, 2, 0.8);
        assert_eq!(outcome.indices, vec![0, 1]);
    }

    #[test]
    fn test_backfill_picks_farthest_item() {
        // Everything is similar to item 0; item 3 is the least similar
        let sim = matrix(&[
            &[1.0, 0.95, 0.90, 0.85],
            &[0.95, 1.0, 0.9, 0.9],
            &[0.90, 0.9, 1.0, 0.9],
            &[0.85, 0.9, 0.9, 1.0],
        ]);
        let outcome = select_diverse(&sim, 2, 0.8);
        assert_eq!(outcome.indices, vec![0, 3]);
        assert_eq!(outcome.backfilled, 1);
    }

    #[test]
    fn test_backfill_ranks_against_threshold_set_only() {
        // Scores against {0}: 1 -> 0.12, 2 -> 0.12, 3 -> 0.18. Item 3 wins, then the
        // 1/2 tie goes to 2 even though 2 is nearly a duplicate of 3.
        let sim = matrix(&[
            &[1.0, 0.88, 0.88, 0.82],
            &[0.88, 1.0, 0.9, 0.81],
            &[0.88, 0.9, 1.0, 0.99],
            &[0.82, 0.81, 0.99, 1.0],
        ]);
        let outcome = select_diverse(&sim, 3, 0.8);
        assert_eq!(outcome.indices, vec![0, 2, 3]);
        assert_eq!(outcome.backfilled, 2);
    }

    #[test]
    fn test_backfill_ties_go_to_later_item() {
        let sim = matrix(&[&[1.0, 0.9, 0.9], &[0.9, 1.0, 0.9], &[0.9, 0.9, 1.0]]);
        let outcome = select_diverse(&sim, 2, 0.8);
        assert_eq!(outcome.indices, vec![0, 2]);
    }
}
