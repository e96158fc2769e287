//! Driver subscale → strategy subscale correlation table
//!
//! Built once from the historical matrices and the short-form selection, then shared
//! read-only. Per participant, a driver subscale score is the mean of that subscale's
//! selected items; a strategy subscale score is the mean of all its member items.
//! Each driver subscale keeps the strategy subscale it correlates with most strongly
//! (Pearson r over participants with both scores present).

use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

use crate::config::EngineParams;
use crate::history::{HistoricalMatrix, HistorySet};
use crate::items::{LikertRange, Scale, SubscaleMembership};
use crate::reliability::mean;
use crate::selection::SelectionResult;
use crate::{Error, Result};

/// Best strategy match for one driver subscale
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationChoice {
    pub driver: Scale,
    pub driver_subscale: String,
    pub strategy_subscale: String,
    pub correlation: f64,
}

/// Per-participant subscale scores of one scale, in subscale order
struct SubscaleScores {
    subscales: Vec<(String, Vec<Option<f64>>)>,
}

/// Pearson correlation of two equally long samples
///
/// `None` for fewer than two values or when either side has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx) * (a - mx);
        syy += (b - my) * (b - my);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    let r = sxy / (sxx * syy).sqrt();
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Row pairs `(driver_row, strategy_row)` of the same participant
///
/// Participant ids are matched when both matrices carry them; otherwise rows pair
/// by index up to the shorter matrix.
fn participant_pairs(driver: &HistoricalMatrix, strategy: &HistoricalMatrix) -> Vec<(usize, usize)> {
    match (&driver.participants, &strategy.participants) {
        (Some(driver_ids), Some(strategy_ids)) => {
            let strategy_rows: HashMap<&str, usize> = strategy_ids
                .iter()
                .enumerate()
                .map(|(row, id)| (id.as_str(), row))
                .collect();
            driver_ids
                .iter()
                .enumerate()
                .filter_map(|(row, id)| strategy_rows.get(id.as_str()).map(|&s| (row, s)))
                .collect()
        }
        _ => {
            let n = driver.row_count().min(strategy.row_count());
            (0..n).map(|row| (row, row)).collect()
        }
    }
}

/// Immutable correlation lookup, one entry per servable driver subscale
#[derive(Debug, Clone, Default)]
pub struct CorrelationModel {
    choices: BTreeMap<Scale, Vec<CorrelationChoice>>,
    missing: Vec<(Scale, String)>,
}

impl CorrelationModel {
    /// Build the table
    ///
    /// `memberships` must contain the strategy scale's membership; driver subscales
    /// come from the selection. Driver subscales without any strategy pair of at least
    /// `min_correlation_observations` participants are left out and reported by
    /// [`missing_subscales`](Self::missing_subscales), or fail the build when
    /// `strict_correlation` is set.
    pub fn build(
        selection: &SelectionResult,
        memberships: &BTreeMap<Scale, SubscaleMembership>,
        history: &HistorySet,
        params: &EngineParams,
    ) -> Result<Self> {
        let likert = params.likert();
        let strategy_membership = memberships
            .get(&Scale::Strategy)
            .ok_or_else(|| Error::Config("Strategy subscale membership is missing".to_string()))?;
        let strategy_history = history
            .get(&Scale::Strategy)
            .ok_or_else(|| Error::Config("Strategy history matrix is missing".to_string()))?;

        let strategy_scores = Self::strategy_scores(strategy_membership, strategy_history, likert);

        let mut model = CorrelationModel::default();
        for driver in Scale::DRIVERS {
            let Some(scale_selection) = selection.scale(driver) else {
                continue;
            };

            // Subscales in selection order, each with its selected (number, reverse) pairs
            let mut driver_items: Vec<(String, Vec<(u32, bool)>)> = Vec::new();
            for item in &scale_selection.selected {
                let entry = (item.item_number, item.reverse_coded);
                match driver_items.iter_mut().find(|(s, _)| *s == item.subscale) {
                    Some((_, items)) => items.push(entry),
                    None => driver_items.push((item.subscale.clone(), vec![entry])),
                }
            }

            let Some(matrix) = history.get(&driver) else {
                warn!(scale = %driver, "No history matrix; driver scale has no correlations");
                model
                    .missing
                    .extend(driver_items.into_iter().map(|(s, _)| (driver, s)));
                continue;
            };

            let pairs = participant_pairs(matrix, strategy_history);
            let mut choices = Vec::new();

            for (subscale, items) in driver_items {
                let columns = matrix.scored_columns(items);
                let driver_means = matrix.row_means(&columns, likert);

                let mut best: Option<(String, f64)> = None;
                for (strategy_subscale, strategy_means) in &strategy_scores.subscales {
                    let (xs, ys): (Vec<f64>, Vec<f64>) = pairs
                        .iter()
                        .filter_map(|&(d, s)| Some((driver_means[d]?, strategy_means[s]?)))
                        .unzip();
                    if xs.len() < params.min_correlation_observations {
                        continue;
                    }
                    let Some(r) = pearson(&xs, &ys) else {
                        continue;
                    };
                    if best.as_ref().map_or(true, |(_, b)| r > *b) {
                        best = Some((strategy_subscale.clone(), r));
                    }
                }

                match best {
                    Some((strategy_subscale, correlation)) => choices.push(CorrelationChoice {
                        driver,
                        driver_subscale: subscale,
                        strategy_subscale,
                        correlation,
                    }),
                    None => model.missing.push((driver, subscale)),
                }
            }

            model.choices.insert(driver, choices);
        }

        for (scale, subscale) in &model.missing {
            warn!(
                scale = %scale,
                subscale = %subscale,
                "No strategy subscale has enough paired observations"
            );
        }
        if params.strict_correlation {
            model.ensure_complete()?;
        }

        info!(
            entries = model.len(),
            missing = model.missing.len(),
            "Correlation model built"
        );
        Ok(model)
    }

    fn strategy_scores(
        membership: &SubscaleMembership,
        matrix: &HistoricalMatrix,
        likert: LikertRange,
    ) -> SubscaleScores {
        let subscales = membership
            .iter()
            .map(|(subscale, numbers)| {
                let columns = matrix.scored_columns(numbers.iter().map(|&n| (n, false)));
                (subscale.to_string(), matrix.row_means(&columns, likert))
            })
            .collect();
        SubscaleScores { subscales }
    }

    /// Correlation entry of a driver subscale
    pub fn lookup(&self, scale: Scale, subscale: &str) -> Result<&CorrelationChoice> {
        self.choices
            .get(&scale)
            .and_then(|choices| choices.iter().find(|c| c.driver_subscale == subscale))
            .ok_or_else(|| {
                Error::DataCompleteness(format!(
                    "No correlation entry for {} subscale '{}'",
                    scale, subscale
                ))
            })
    }

    /// Entries of one driver scale, in selection order
    pub fn choices(&self, scale: Scale) -> &[CorrelationChoice] {
        self.choices.get(&scale).map(|c| c.as_slice()).unwrap_or(&[])
    }

    /// Driver subscales that could not be matched to any strategy subscale
    pub fn missing_subscales(&self) -> &[(Scale, String)] {
        &self.missing
    }

    pub fn ensure_complete(&self) -> Result<()> {
        if self.missing.is_empty() {
            return Ok(());
        }
        let names: Vec<String> = self
            .missing
            .iter()
            .map(|(scale, subscale)| format!("{}:{}", scale, subscale))
            .collect();
        Err(Error::DataCompleteness(format!(
            "Driver subscales without correlation entries: {}",
            names.join(", ")
        )))
    }

    pub fn len(&self) -> usize {
        self.choices.values().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::Item;
    use crate::selection::ScaleSelection;

    fn item(scale: Scale, n: u32, sub: &str, reverse_coded: bool) -> Item {
        Item {
            scale,
            item_number: n,
            subscale: sub.to_string(),
            text: format!("{} item {}", sub, n),
            reverse_coded,
        }
    }

    fn selection(eq: Vec<Item>, fla: Vec<Item>) -> SelectionResult {
        let mut result = SelectionResult::default();
        for (scale, selected) in [(Scale::Eq, eq), (Scale::Fla, fla)] {
            result.scales.insert(
                scale,
                ScaleSelection {
                    selected,
                    removed_by_subscale: BTreeMap::new(),
                    alpha: 0.8,
                    diagnostics: None,
                },
            );
        }
        result
    }

    fn matrix(columns: Vec<u32>, rows: Vec<Vec<f64>>) -> HistoricalMatrix {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(Some).collect())
            .collect();
        HistoricalMatrix::new(columns, rows).unwrap()
    }

    fn strategy_membership() -> BTreeMap<Scale, SubscaleMembership> {
        let mut membership = SubscaleMembership::new();
        membership.extend("memory", [1]);
        membership.extend("social", [2]);
        let mut memberships = BTreeMap::new();
        memberships.insert(Scale::Strategy, membership);
        memberships
    }

    /// Strategy "memory" rises with participants; "social" falls
    fn history() -> HistorySet {
        let mut history = HistorySet::new();
        history.insert(
            Scale::Strategy,
            matrix(
                vec![1, 2],
                vec![
                    vec![1.0, 5.0],
                    vec![2.0, 4.0],
                    vec![3.0, 3.0],
                    vec![4.0, 1.0],
                    vec![5.0, 2.0],
                ],
            ),
        );
        history.insert(
            Scale::Eq,
            matrix(
                vec![1, 2],
                vec![
                    vec![1.0, 5.0],
                    vec![2.0, 4.0],
                    vec![3.0, 3.0],
                    vec![4.0, 2.0],
                    vec![5.0, 1.0],
                ],
            ),
        );
        history.insert(
            Scale::Fla,
            matrix(
                vec![1],
                vec![vec![5.0], vec![4.0], vec![3.0], vec![2.0], vec![1.0]],
            ),
        );
        history
    }

    #[test]
    fn test_pearson_known_values() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0], &[1.0]), None);
    }

    #[test]
    fn test_picks_highest_correlation_per_driver_subscale() {
        let selection = selection(
            vec![item(Scale::Eq, 1, "empathy", false), item(Scale::Eq, 2, "control", false)],
            vec![item(Scale::Fla, 1, "fear", false)],
        );
        let model = CorrelationModel::build(
            &selection,
            &strategy_membership(),
            &history(),
            &EngineParams::default(),
        )
        .unwrap();

        assert_eq!(model.lookup(Scale::Eq, "empathy").unwrap().strategy_subscale, "memory");
        assert_eq!(model.lookup(Scale::Eq, "control").unwrap().strategy_subscale, "social");
        assert_eq!(model.lookup(Scale::Fla, "fear").unwrap().strategy_subscale, "social");
        assert!(model.missing_subscales().is_empty());
        assert_eq!(model.len(), 3);
    }

    #[test]
    fn test_reverse_coding_flips_correlation_sign() {
        let selection = selection(
            vec![item(Scale::Eq, 2, "control", true)],
            vec![item(Scale::Fla, 1, "fear", false)],
        );
        let model = CorrelationModel::build(
            &selection,
            &strategy_membership(),
            &history(),
            &EngineParams::default(),
        )
        .unwrap();
        assert_eq!(model.lookup(Scale::Eq, "control").unwrap().strategy_subscale, "memory");
    }

    #[test]
    fn test_too_few_observations_leaves_subscale_missing() {
        let mut history = history();
        let sparse = HistoricalMatrix::new(
            vec![1],
            vec![vec![Some(1.0)], vec![Some(2.0)], vec![None], vec![None], vec![None]],
        )
        .unwrap();
        history.insert(Scale::Fla, sparse);

        let selection = selection(
            vec![item(Scale::Eq, 1, "empathy", false)],
            vec![item(Scale::Fla, 1, "fear", false)],
        );
        let model = CorrelationModel::build(
            &selection,
            &strategy_membership(),
            &history,
            &EngineParams::default(),
        )
        .unwrap();

        assert_eq!(model.missing_subscales(), &[(Scale::Fla, "fear".to_string())]);
        assert!(matches!(
            model.lookup(Scale::Fla, "fear"),
            Err(Error::DataCompleteness(_))
        ));
        assert!(model.ensure_complete().is_err());

        let strict = EngineParams {
            strict_correlation: true,
            ..EngineParams::default()
        };
        let result = CorrelationModel::build(&selection, &strategy_membership(), &history, &strict);
        assert!(matches!(result, Err(Error::DataCompleteness(_))));
    }

    #[test]
    fn test_pairs_by_participant_id() {
        let mut history = history();
        // Same strategy rows, listed in reverse participant order
        let strategy = matrix(
            vec![1, 2],
            vec![
                vec![5.0, 2.0],
                vec![4.0, 1.0],
                vec![3.0, 3.0],
                vec![2.0, 4.0],
                vec![1.0, 5.0],
            ],
        )
        .with_participants((1..=5).rev().map(|i| format!("p{}", i)).collect())
        .unwrap();
        history.insert(Scale::Strategy, strategy);
        let eq = history
            .remove(&Scale::Eq)
            .unwrap()
            .with_participants((1..=5).map(|i| format!("p{}", i)).collect())
            .unwrap();
        history.insert(Scale::Eq, eq);

        let selection = selection(
            vec![item(Scale::Eq, 1, "empathy", false)],
            vec![item(Scale::Fla, 1, "fear", false)],
        );
        let model = CorrelationModel::build(
            &selection,
            &strategy_membership(),
            &history,
            &EngineParams::default(),
        )
        .unwrap();
        let choice = model.lookup(Scale::Eq, "empathy").unwrap();
        assert_eq!(choice.strategy_subscale, "memory");
        assert!((choice.correlation - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_strategy_membership_is_config_error() {
        let selection = selection(vec![], vec![]);
        let result = CorrelationModel::build(
            &selection,
            &BTreeMap::new(),
            &history(),
            &EngineParams::default(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
