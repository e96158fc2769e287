//! Proportional per-subscale quota allocation

/// Allocate a per-group quota summing to `target`
///
/// Each group starts at `round(size / total * target)` (round half to even), floored
/// to 1 and capped at the group size. The sum is then corrected in sweeps:
/// - short: visit groups largest first, adding one to every group with room left
/// - over: visit groups smallest first, removing one from every group above 1
///
/// Each sweep stops as soon as the sum matches. Size ties keep input order (the
/// "smallest first" order is the exact reverse of the "largest first" order). A sweep
/// that cannot change anything ends the correction, so an infeasible target (total
/// pool smaller than `target`) returns every group at full size.
pub fn allocate_quotas(group_sizes: &[usize], target: usize) -> Vec<usize> {
    let total: usize = group_sizes.iter().sum();

    let mut quotas: Vec<usize> = group_sizes
        .iter()
        .map(|&size| {
            let ratio = if total == 0 { 0.0 } else { size as f64 / total as f64 };
            let proportional = (ratio * target as f64).round_ties_even() as usize;
            proportional.max(1).min(size)
        })
        .collect();

    let mut largest_first: Vec<usize> = (0..group_sizes.len()).collect();
    largest_first.sort_by(|&a, &b| group_sizes[b].cmp(&group_sizes[a]));

    let mut current: usize = quotas.iter().sum();

    while current < target {
        let mut changed = false;
        for &g in &largest_first {
            if quotas[g] < group_sizes[g] {
                quotas[g] += 1;
                current += 1;
                changed = true;
                if current == target {
                    break;
                }
            }
        }
        if !changed {
            break;
        }
    }

    while current > target {
        let mut changed = false;
        for &g in largest_first.iter().rev() {
            if quotas[g] > 1 {
                quotas[g] -= 1;
                current -= 1;
                changed = true;
                if current == target {
                    break;
                }
            }
        }
        if !changed {
            break;
        }
    }

    quotas
}
