//! Per-respondent strategy recommendation
//!
//! Scores a respondent's short-form answers per driver subscale, looks up each driver
//! scale's top subscale in the [`CorrelationModel`], and picks the driver scale with
//! the higher (bonus-adjusted) correlation. Pure with respect to its inputs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::EngineParams;
use crate::correlation::CorrelationModel;
use crate::items::{Item, LikertRange, Scale};
use crate::reliability::mean;
use crate::selection::SelectionResult;
use crate::{Error, Result};

/// One driver scale's candidate strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyCandidate {
    pub driver: Scale,
    pub driver_subscale: String,
    pub strategy_subscale: String,
    pub correlation: f64,
    pub user_subscale_score: f64,
    pub final_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStrategy {
    pub strategy_subscale: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub recommended_strategy: String,
    pub winning_driver: Scale,
    pub winning_subscale: String,
    pub tie_triggered: bool,
    /// `|final_EQ - final_FLA|`
    pub score_gap: f64,
    /// Gap between the two top user subscale scores
    pub user_score_gap: f64,
    pub summary: String,
    /// EQ candidate first, then FLA
    pub candidates: Vec<StrategyCandidate>,
    pub top_eq_subscale: String,
    pub top_fla_subscale: String,
    pub eq_scores: BTreeMap<String, f64>,
    pub fla_scores: BTreeMap<String, f64>,
    pub strategy_ranking: Vec<RankedStrategy>,
}

impl RecommendationResult {
    /// Distinct candidate strategies, sorted
    pub fn candidate_pool(&self) -> Vec<String> {
        let mut pool: Vec<String> = self
            .candidates
            .iter()
            .map(|c| c.strategy_subscale.clone())
            .collect();
        pool.sort();
        pool.dedup();
        pool
    }

    /// Candidate with the highest final score (first wins ties)
    pub fn best_candidate(&self) -> Option<&StrategyCandidate> {
        self.candidates.iter().fold(None, |best, c| match best {
            Some(b) if b.final_score >= c.final_score => Some(b),
            _ => Some(c),
        })
    }
}

/// Subscale means of one scale, in first-answered order
type ScaleScores = Vec<(String, f64)>;

pub struct RecommendationEngine {
    model: Arc<CorrelationModel>,
    /// Selected items per driver scale
    short_form: BTreeMap<Scale, Vec<Item>>,
    likert: LikertRange,
    tie_gap_threshold: f64,
    tie_bonus_weight: f64,
}

impl RecommendationEngine {
    pub fn new(model: Arc<CorrelationModel>, selection: &SelectionResult, params: &EngineParams) -> Self {
        let short_form = Scale::DRIVERS
            .iter()
            .map(|&scale| (scale, selection.selected(scale).to_vec()))
            .collect();
        Self {
            model,
            short_form,
            likert: params.likert(),
            tie_gap_threshold: params.tie_gap_threshold,
            tie_bonus_weight: params.tie_bonus_weight,
        }
    }

    pub fn model(&self) -> &CorrelationModel {
        &self.model
    }

    /// Mean answer per subscale for one driver scale, reverse coding applied
    ///
    /// Only selected items count. Subscales keep short-form order.
    pub fn subscale_scores(&self, scale: Scale, responses: &HashMap<String, f64>) -> Result<ScaleScores> {
        let mut grouped: Vec<(String, Vec<f64>)> = Vec::new();
        for item in self.short_form.get(&scale).into_iter().flatten() {
            let id = item.question_id();
            let Some(&raw) = responses.get(&id) else {
                continue;
            };
            if !self.likert.contains(raw) {
                return Err(Error::Validation(format!(
                    "Response for {} must be within {}..={}, got {}",
                    id, self.likert.min, self.likert.max, raw
                )));
            }
            let score = self.likert.score(raw, item.reverse_coded);
            match grouped.iter_mut().find(|(s, _)| *s == item.subscale) {
                Some((_, values)) => values.push(score),
                None => grouped.push((item.subscale.clone(), vec![score])),
            }
        }

        Ok(grouped
            .into_iter()
            .filter_map(|(subscale, values)| mean(&values).map(|m| (subscale, m)))
            .collect())
    }

    /// Bonus from supplementary answers: deviation of their mean from the Likert
    /// midpoint, scaled to at most `tie_bonus_weight`
    pub fn tie_break_bonus(&self, answers: Option<&[f64]>) -> f64 {
        match answers.and_then(mean) {
            Some(m) => (m - self.likert.midpoint()) / self.likert.half_span() * self.tie_bonus_weight,
            None => 0.0,
        }
    }

    pub fn recommend(
        &self,
        responses: &HashMap<String, f64>,
        tie_breaker_answers: Option<&BTreeMap<Scale, Vec<f64>>>,
    ) -> Result<RecommendationResult> {
        let eq_scores = self.subscale_scores(Scale::Eq, responses)?;
        let fla_scores = self.subscale_scores(Scale::Fla, responses)?;
        if eq_scores.is_empty() || fla_scores.is_empty() {
            return Err(Error::Validation(
                "Responses must include both EQ and FLA short-form items".to_string(),
            ));
        }

        if let Some(answers) = tie_breaker_answers {
            self.check_tie_breaker(answers)?;
        }

        let eq = self.candidate(Scale::Eq, &eq_scores, tie_breaker_answers)?;
        let fla = self.candidate(Scale::Fla, &fla_scores, tie_breaker_answers)?;

        let score_gap = (eq.final_score - fla.final_score).abs();
        let user_score_gap = (eq.user_subscale_score - fla.user_subscale_score).abs();
        let tie_triggered = score_gap < self.tie_gap_threshold || user_score_gap < self.tie_gap_threshold;

        // EQ keeps exact ties
        let winner = if eq.final_score >= fla.final_score { &eq } else { &fla };

        let mut strategy_ranking: Vec<RankedStrategy> = [&eq, &fla]
            .iter()
            .map(|c| RankedStrategy {
                strategy_subscale: c.strategy_subscale.clone(),
                score: c.final_score,
            })
            .collect();
        strategy_ranking.sort_by(|a, b| b.score.total_cmp(&a.score));

        Ok(RecommendationResult {
            recommended_strategy: winner.strategy_subscale.clone(),
            winning_driver: winner.driver,
            winning_subscale: winner.driver_subscale.clone(),
            tie_triggered,
            score_gap,
            user_score_gap,
            summary: format!(
                "{}-driven recommendation: {}",
                winner.driver_subscale, winner.strategy_subscale
            ),
            top_eq_subscale: eq.driver_subscale.clone(),
            top_fla_subscale: fla.driver_subscale.clone(),
            candidates: vec![eq, fla],
            eq_scores: eq_scores.into_iter().collect(),
            fla_scores: fla_scores.into_iter().collect(),
            strategy_ranking,
        })
    }

    fn check_tie_breaker(&self, answers: &BTreeMap<Scale, Vec<f64>>) -> Result<()> {
        for (scale, values) in answers {
            if let Some(&bad) = values.iter().find(|&&v| !self.likert.contains(v)) {
                return Err(Error::Validation(format!(
                    "Tie-breaker answer for {} must be within {}..={}, got {}",
                    scale, self.likert.min, self.likert.max, bad
                )));
            }
        }
        Ok(())
    }

    fn candidate(
        &self,
        scale: Scale,
        scores: &[(String, f64)],
        tie_breaker_answers: Option<&BTreeMap<Scale, Vec<f64>>>,
    ) -> Result<StrategyCandidate> {
        let (subscale, user_score) = top_subscale(scores)
            .ok_or_else(|| Error::Validation(format!("No {} subscale was answered", scale)))?;
        let choice = self.model.lookup(scale, subscale)?;
        let bonus = self.tie_break_bonus(
            tie_breaker_answers
                .and_then(|answers| answers.get(&scale))
                .map(|v| v.as_slice()),
        );

        Ok(StrategyCandidate {
            driver: scale,
            driver_subscale: subscale.to_string(),
            strategy_subscale: choice.strategy_subscale.clone(),
            correlation: choice.correlation,
            user_subscale_score: user_score,
            final_score: choice.correlation + bonus,
        })
    }
}

/// Highest-scoring subscale; the earliest wins ties
fn top_subscale(scores: &[(String, f64)]) -> Option<(&str, f64)> {
    scores.iter().fold(None, |best, (name, score)| match best {
        Some((_, b)) if b >= *score => best,
        _ => Some((name.as_str(), *score)),
    })
}
