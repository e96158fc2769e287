//! Strategy recommendation service
//!
//! Owns everything built at startup (item bank, short forms, correlation model,
//! replacement pools) and answers requests against it. All of it is read-only once
//! constructed, so handlers share one instance through an `Arc`.

use als_common::api::SurveyQuestion;
use als_common::arbitration::{arbitrate_tie, ArbitrationOutcome, TieArbitrator, UserProfile};
use als_common::config::EngineParams;
use als_common::correlation::CorrelationModel;
use als_common::items::{ItemBank, Scale};
use als_common::recommend::{RecommendationEngine, RecommendationResult};
use als_common::requestion::ReplacementPool;
use als_common::selection::SelectionResult;
use als_common::Result;
use rand::Rng;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::dataset::Dataset;

pub struct RecommendationService {
    bank: ItemBank,
    selection: SelectionResult,
    engine: RecommendationEngine,
    pool: ReplacementPool,
    params: EngineParams,
    arbitrator: Option<Arc<dyn TieArbitrator>>,
}

impl RecommendationService {
    /// Build the correlation model over `selection` and assemble the service
    pub fn new(
        dataset: Dataset,
        selection: SelectionResult,
        params: EngineParams,
        arbitrator: Option<Arc<dyn TieArbitrator>>,
    ) -> Result<Self> {
        for (scale, alpha) in selection.alpha_report() {
            if alpha < params.min_alpha {
                warn!(scale = %scale, alpha = alpha, "Short form below reliability threshold");
            } else {
                info!(scale = %scale, alpha = alpha, "Short form reliability");
            }
        }

        let model = CorrelationModel::build(&selection, &dataset.memberships, &dataset.history, &params)?;
        for (scale, subscale) in model.missing_subscales() {
            warn!(
                scale = %scale,
                subscale = %subscale,
                "Subscale excluded from recommendations (no correlation entry)"
            );
        }

        let engine = RecommendationEngine::new(Arc::new(model), &selection, &params);
        let pool = ReplacementPool::from_selection(&selection);

        Ok(Self {
            bank: dataset.bank,
            selection,
            engine,
            pool,
            params,
            arbitrator,
        })
    }

    pub fn selection(&self) -> &SelectionResult {
        &self.selection
    }

    pub fn model(&self) -> &CorrelationModel {
        self.engine.model()
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Short-form questions of both driver scales, sorted by scale, subscale, number
    pub fn short_questions(&self) -> Vec<SurveyQuestion> {
        let likert = self.params.likert();
        let mut questions: Vec<SurveyQuestion> = Scale::DRIVERS
            .iter()
            .flat_map(|&scale| self.selection.selected(scale))
            .map(|item| SurveyQuestion::from_item(item, likert))
            .collect();
        questions.sort_by(|a, b| {
            (a.scale, &a.subscale, a.item_number).cmp(&(b.scale, &b.subscale, b.item_number))
        });
        questions
    }

    pub fn recommend(
        &self,
        responses: &HashMap<String, f64>,
        tie_breaker_answers: Option<&BTreeMap<Scale, Vec<f64>>>,
    ) -> Result<RecommendationResult> {
        self.engine.recommend(responses, tie_breaker_answers)
    }

    /// Replacement questions for the given top subscales
    pub fn next_questions<R: Rng + ?Sized>(
        &self,
        eq_subscale: &str,
        fla_subscale: &str,
        used_question_ids: &[String],
        rng: &mut R,
    ) -> Vec<SurveyQuestion> {
        let used: HashSet<String> = used_question_ids.iter().cloned().collect();
        let likert = self.params.likert();
        self.pool
            .next_questions(&self.bank, eq_subscale, fla_subscale, &used, rng)
            .iter()
            .map(|item| SurveyQuestion::from_item(item, likert))
            .collect()
    }

    pub fn round_limit(&self) -> u32 {
        self.params.max_requestion_rounds
    }

    /// Rule-based recommendation, arbitrated when tied (or forced)
    pub async fn llm_fallback_recommend(
        &self,
        responses: &HashMap<String, f64>,
        tie_breaker_answers: Option<&BTreeMap<Scale, Vec<f64>>>,
        user_profile: Option<&UserProfile>,
        force: bool,
    ) -> Result<ArbitrationOutcome> {
        let base = self.recommend(responses, tie_breaker_answers)?;
        let empty = UserProfile::new();
        let profile = user_profile.unwrap_or(&empty);
        Ok(arbitrate_tie(self.arbitrator.as_deref(), &base, profile, force).await)
    }
}
