//! Short-form item selection
//!
//! Reduces each driver scale's item bank to a fixed-size short form:
//! 1. proportional per-subscale quotas ([`quota`])
//! 2. greedy text-diversity selection inside each subscale ([`diversity`])
//! 3. exact total enforcement
//! 4. Cronbach's alpha check with greedy repair ([`repair`])
//!
//! Every step is deterministic. The result can be exported as a [`SelectionPayload`]
//! and loaded back instead of recomputing.

pub mod diversity;
pub mod quota;
pub mod repair;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

use crate::config::EngineParams;
use crate::history::{HistoricalMatrix, HistorySet};
use crate::items::{Item, ItemBank, LikertRange, Scale, SubscaleGroup};
use crate::reliability::cronbach_alpha;
use crate::similarity::similarity_matrix;
use crate::{Error, Result};

pub use diversity::{select_diverse, DiversityOutcome};
pub use quota::allocate_quotas;
pub use repair::{repair_alpha, RepairOutcome};

/// How a scale's short form was produced (absent when loaded from a payload)
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionDiagnostics {
    /// Quota per subscale, in group order
    pub quotas: Vec<(String, usize)>,
    /// Items added by the farthest-point backfill across all subscales
    pub backfilled: usize,
    /// Alpha before repair
    pub initial_alpha: f64,
    /// Adopted alphas during repair (empty if repair did not run)
    pub repair_trace: Vec<f64>,
}

/// Short form of one scale
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleSelection {
    pub selected: Vec<Item>,
    /// Per subscale, items left out of the short form (replacement pool)
    pub removed_by_subscale: BTreeMap<String, Vec<String>>,
    pub alpha: f64,
    pub diagnostics: Option<SelectionDiagnostics>,
}

/// Short forms of all driver scales
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionResult {
    pub scales: BTreeMap<Scale, ScaleSelection>,
}

impl SelectionResult {
    pub fn scale(&self, scale: Scale) -> Option<&ScaleSelection> {
        self.scales.get(&scale)
    }

    /// Selected items of a scale (empty if the scale was not selected)
    pub fn selected(&self, scale: Scale) -> &[Item] {
        self.scales
            .get(&scale)
            .map(|s| s.selected.as_slice())
            .unwrap_or(&[])
    }

    pub fn alpha_report(&self) -> BTreeMap<Scale, f64> {
        self.scales.iter().map(|(scale, s)| (*scale, s.alpha)).collect()
    }

    /// Export in the cache artifact format
    pub fn to_payload(&self) -> SelectionPayload {
        SelectionPayload {
            selected_questions: self
                .scales
                .iter()
                .map(|(scale, s)| {
                    let records = s.selected.iter().cloned().map(QuestionRecord::from).collect();
                    (*scale, records)
                })
                .collect(),
            removed_by_subscale: self
                .scales
                .iter()
                .map(|(scale, s)| (*scale, s.removed_by_subscale.clone()))
                .collect(),
            alpha_report: self.alpha_report(),
        }
    }

    /// Rebuild from a cache artifact, checking every id against the item bank
    pub fn from_payload(payload: SelectionPayload, bank: &ItemBank) -> Result<Self> {
        let mut scales = BTreeMap::new();

        for (scale, records) in payload.selected_questions {
            let mut selected = Vec::with_capacity(records.len());
            for record in records {
                let id = record.item.question_id();
                if record.question_id != id || !bank.contains(&id) {
                    return Err(Error::Config(format!(
                        "Cached selection references unknown item {}",
                        record.question_id
                    )));
                }
                selected.push(record.item);
            }

            let removed_by_subscale = payload
                .removed_by_subscale
                .get(&scale)
                .cloned()
                .unwrap_or_default();
            for id in removed_by_subscale.values().flatten() {
                if !bank.contains(id) {
                    return Err(Error::Config(format!(
                        "Cached removed pool references unknown item {}",
                        id
                    )));
                }
            }

            let alpha = payload.alpha_report.get(&scale).copied().unwrap_or(0.0);
            scales.insert(
                scale,
                ScaleSelection {
                    selected,
                    removed_by_subscale,
                    alpha,
                    diagnostics: None,
                },
            );
        }

        Ok(Self { scales })
    }
}

/// Item record as stored in the cache artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question_id: String,
    #[serde(flatten)]
    pub item: Item,
}

impl From<Item> for QuestionRecord {
    fn from(item: Item) -> Self {
        Self {
            question_id: item.question_id(),
            item,
        }
    }
}

/// Serializable selection (cache artifact)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionPayload {
    pub selected_questions: BTreeMap<Scale, Vec<QuestionRecord>>,
    pub removed_by_subscale: BTreeMap<Scale, BTreeMap<String, Vec<String>>>,
    pub alpha_report: BTreeMap<Scale, f64>,
}

/// Cronbach's alpha of a short form against the historical matrix
///
/// Items the matrix does not record are ignored; fewer than two recorded items (or no
/// matrix at all) give 0.
pub fn short_form_alpha(matrix: Option<&HistoricalMatrix>, items: &[Item], likert: LikertRange) -> f64 {
    let Some(matrix) = matrix else {
        return 0.0;
    };
    let columns = matrix.scored_columns(items.iter().map(|i| (i.item_number, i.reverse_coded)));
    if columns.len() < 2 {
        return 0.0;
    }
    cronbach_alpha(&matrix.complete_rows(&columns, likert))
}

/// Top up or trim a selection to exactly `target` items
///
/// Missing slots are filled with unselected items in group order, then item order.
fn enforce_target(mut selected: Vec<Item>, groups: &[SubscaleGroup], target: usize) -> Vec<Item> {
    if selected.len() < target {
        let chosen: HashSet<String> = selected.iter().map(|i| i.question_id()).collect();
        let missing = target - selected.len();
        selected.extend(
            groups
                .iter()
                .flat_map(|g| g.items.iter())
                .filter(|item| !chosen.contains(&item.question_id()))
                .take(missing)
                .cloned(),
        );
    }
    selected.truncate(target);
    selected
}

/// Builds short forms from the item bank and historical matrices
pub struct ItemSelectionEngine<'a> {
    bank: &'a ItemBank,
    history: &'a HistorySet,
    params: &'a EngineParams,
}

impl<'a> ItemSelectionEngine<'a> {
    pub fn new(bank: &'a ItemBank, history: &'a HistorySet, params: &'a EngineParams) -> Self {
        Self {
            bank,
            history,
            params,
        }
    }

    /// Select short forms for both driver scales
    pub fn build(&self) -> SelectionResult {
        let scales = Scale::DRIVERS
            .iter()
            .map(|&scale| (scale, self.select_scale(scale, self.params.target_for(scale))))
            .collect();
        SelectionResult { scales }
    }

    /// Select the short form of one scale
    pub fn select_scale(&self, scale: Scale, target: usize) -> ScaleSelection {
        let likert = self.params.likert();
        let groups = self.bank.groups(scale);
        let sizes: Vec<usize> = groups.iter().map(|g| g.items.len()).collect();
        let quotas = allocate_quotas(&sizes, target);

        let pool_size: usize = sizes.iter().sum();
        if pool_size < target {
            warn!(
                scale = %scale,
                pool = pool_size,
                target = target,
                "Item pool smaller than short-form target"
            );
        }

        let mut selected = Vec::with_capacity(target);
        let mut backfilled = 0;
        for (group, &quota) in groups.iter().zip(&quotas) {
            let texts: Vec<&str> = group.items.iter().map(|i| i.text.as_str()).collect();
            let outcome = if texts.len() <= quota {
                DiversityOutcome {
                    indices: (0..texts.len()).collect(),
                    backfilled: 0,
                }
            } else {
                select_diverse(&similarity_matrix(&texts), quota, self.params.similarity_threshold)
            };
            backfilled += outcome.backfilled;
            selected.extend(outcome.indices.iter().map(|&i| group.items[i].clone()));
        }

        let selected = enforce_target(selected, &groups, target);

        let matrix = self.history.get(&scale);
        let initial_alpha = short_form_alpha(matrix, &selected, likert);

        let (selected, alpha, repair_trace) = if initial_alpha < self.params.min_alpha {
            let chosen: HashSet<String> = selected.iter().map(|i| i.question_id()).collect();
            let candidates: Vec<Item> = groups
                .iter()
                .flat_map(|g| g.items.iter())
                .filter(|item| !chosen.contains(&item.question_id()))
                .cloned()
                .collect();

            let outcome = repair_alpha(&selected, candidates, target, self.params.min_alpha, |items| {
                short_form_alpha(matrix, items, likert)
            });
            info!(
                scale = %scale,
                before = initial_alpha,
                after = outcome.alpha,
                evaluated = outcome.evaluated,
                "Reliability repair finished"
            );
            (outcome.selection, outcome.alpha, outcome.adopted_alphas)
        } else {
            (selected, initial_alpha, Vec::new())
        };

        let chosen: HashSet<String> = selected.iter().map(|i| i.question_id()).collect();
        let removed_by_subscale = groups
            .iter()
            .map(|g| {
                let removed = g
                    .items
                    .iter()
                    .map(|i| i.question_id())
                    .filter(|id| !chosen.contains(id))
                    .collect();
                (g.subscale.clone(), removed)
            })
            .collect();

        info!(
            scale = %scale,
            selected = selected.len(),
            target = target,
            alpha = alpha,
            "Short form selected"
        );

        ScaleSelection {
            selected,
            removed_by_subscale,
            alpha,
            diagnostics: Some(SelectionDiagnostics {
                quotas: groups.iter().map(|g| g.subscale.clone()).zip(quotas).collect(),
                backfilled,
                initial_alpha,
                repair_trace,
            }),
        }
    }
}
