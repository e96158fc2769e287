//! Greedy reliability repair for a short form

use tracing::debug;

use crate::items::Item;

/// Result of a repair search
#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    /// Best selection found, truncated to the target size
    pub selection: Vec<Item>,
    /// Alpha of `selection`
    pub alpha: f64,
    /// Best alpha after the start and after every adopted trial (non-decreasing)
    pub adopted_alphas: Vec<f64>,
    /// Candidates evaluated before stopping
    pub evaluated: usize,
}

/// Substitute outside candidates into `selected` while alpha improves
///
/// Candidates are visited in ascending item-number order (stable). Each trial is the
/// current best with its last item replaced by the candidate (or the candidate
/// appended when the best is still below `target`). A trial is adopted only if its
/// alpha is strictly higher than the best so far. The search stops as soon as the
/// best reaches `min_alpha` or the candidates run out.
pub fn repair_alpha<F>(
    selected: &[Item],
    mut candidates: Vec<Item>,
    target: usize,
    min_alpha: f64,
    alpha_of: F,
) -> RepairOutcome
where
    F: Fn(&[Item]) -> f64,
{
    candidates.sort_by_key(|item| item.item_number);

    let mut best: Vec<Item> = selected.to_vec();
    let mut best_alpha = alpha_of(&best);
    let mut adopted_alphas = vec![best_alpha];
    let mut evaluated = 0;

    for candidate in candidates {
        if best_alpha >= min_alpha {
            break;
        }
        evaluated += 1;

        let mut trial = best.clone();
        if trial.len() >= target && !trial.is_empty() {
            let last = trial.len() - 1;
            trial[last] = candidate;
        } else {
            trial.push(candidate);
        }

        let alpha = alpha_of(&trial);
        if alpha > best_alpha {
            debug!(
                alpha = alpha,
                previous = best_alpha,
                item = %trial[trial.len() - 1].question_id(),
                "Repair trial adopted"
            );
            best = trial;
            best_alpha = alpha;
            adopted_alphas.push(alpha);
        }
    }

    best.truncate(target);
    RepairOutcome {
        selection: best,
        alpha: best_alpha,
        adopted_alphas,
        evaluated,
    }
}
