//! Tie arbitration
//!
//! When the rule-based recommendation is a near tie, an external arbitrator (an LLM
//! in production) may pick between the candidate strategies. Every arbitrator
//! failure is downgraded to the rule: the candidate with the higher final score.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::recommend::RecommendationResult;

/// Model name reported when no arbitrator decided
pub const RULE_BASED_MODEL: &str = "rule-based";

/// Free-form respondent profile passed to the arbitrator
pub type UserProfile = BTreeMap<String, String>;

/// Arbitrator answer before validation against the candidate pool
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrationVerdict {
    pub recommended_strategy: String,
    pub reason: String,
    pub confidence: f64,
}

#[derive(Error, Debug)]
pub enum ArbitrationError {
    #[error("arbitrator unavailable: {0}")]
    Unavailable(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("empty response")]
    EmptyResponse,

    #[error("unparseable response: {0}")]
    Parse(String),
}

/// External tie arbitrator
#[async_trait]
pub trait TieArbitrator: Send + Sync {
    /// Model identifier reported in outcomes
    fn model_name(&self) -> &str;

    async fn arbitrate(
        &self,
        base: &RecommendationResult,
        profile: &UserProfile,
    ) -> Result<ArbitrationVerdict, ArbitrationError>;
}

/// Final decision after arbitration (or after skipping it)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationOutcome {
    pub recommended_strategy: String,
    pub reason: String,
    pub confidence: f64,
    pub model: String,
    pub used_llm: bool,
    pub base_tie_triggered: bool,
    pub base_score_gap: f64,
}

/// Parse an arbitrator reply: the whole text as JSON, else the span between the
/// first `{` and the last `}`
pub fn parse_verdict(text: &str) -> Result<ArbitrationVerdict, ArbitrationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ArbitrationError::EmptyResponse);
    }

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
                return Err(ArbitrationError::Parse(err.to_string()));
            };
            if end <= start {
                return Err(ArbitrationError::Parse(err.to_string()));
            }
            serde_json::from_str(&text[start..=end])
                .map_err(|e| ArbitrationError::Parse(e.to_string()))?
        }
    };

    let object = value
        .as_object()
        .ok_or_else(|| ArbitrationError::Parse("reply is not a JSON object".to_string()))?;

    let recommended_strategy = object
        .get("recommended_strategy")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let reason = match object.get("reason") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "LLM fallback decision".to_string(),
        Some(other) => other.to_string(),
    };
    let confidence = match object.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.5),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| ArbitrationError::Parse(format!("confidence: {}", e)))?,
        _ => 0.5,
    };

    Ok(ArbitrationVerdict {
        recommended_strategy,
        reason,
        confidence: clamp_confidence(confidence),
    })
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

fn rule_fallback(base: &RecommendationResult, reason_prefix: &str) -> ArbitrationOutcome {
    let (strategy, reason, confidence) = match base.best_candidate() {
        Some(best) => (
            best.strategy_subscale.clone(),
            format!("{}: choose higher final_score", reason_prefix),
            0.55,
        ),
        None => (
            base.recommended_strategy.clone(),
            format!("{}: no candidates", reason_prefix),
            0.3,
        ),
    };
    ArbitrationOutcome {
        recommended_strategy: strategy,
        reason,
        confidence,
        model: RULE_BASED_MODEL.to_string(),
        used_llm: false,
        base_tie_triggered: base.tie_triggered,
        base_score_gap: base.score_gap,
    }
}

/// Resolve a recommendation, consulting `arbitrator` only for ties (or when forced)
pub async fn arbitrate_tie(
    arbitrator: Option<&dyn TieArbitrator>,
    base: &RecommendationResult,
    profile: &UserProfile,
    force: bool,
) -> ArbitrationOutcome {
    if !base.tie_triggered && !force {
        return ArbitrationOutcome {
            recommended_strategy: base.recommended_strategy.clone(),
            reason: "Rule-based result was not tied; LLM fallback skipped.".to_string(),
            confidence: 0.9,
            model: RULE_BASED_MODEL.to_string(),
            used_llm: false,
            base_tie_triggered: base.tie_triggered,
            base_score_gap: base.score_gap,
        };
    }

    let Some(arbitrator) = arbitrator else {
        return rule_fallback(base, "LLM client unavailable");
    };

    let verdict = match arbitrator.arbitrate(base, profile).await {
        Ok(verdict) => verdict,
        Err(err) => {
            warn!(model = arbitrator.model_name(), error = %err, "Tie arbitration failed");
            let prefix = match err {
                ArbitrationError::Unavailable(_) => "LLM client unavailable",
                ArbitrationError::EmptyResponse => "LLM returned empty response",
                ArbitrationError::Transport(_) | ArbitrationError::Parse(_) => "LLM request failed",
            };
            return rule_fallback(base, prefix);
        }
    };

    if !base.candidate_pool().contains(&verdict.recommended_strategy) {
        warn!(
            model = arbitrator.model_name(),
            strategy = %verdict.recommended_strategy,
            "Arbitrator picked a strategy outside the candidate pool"
        );
        return rule_fallback(base, "LLM returned invalid strategy");
    }

    info!(
        model = arbitrator.model_name(),
        strategy = %verdict.recommended_strategy,
        confidence = verdict.confidence,
        "Tie resolved by arbitrator"
    );
    ArbitrationOutcome {
        recommended_strategy: verdict.recommended_strategy,
        reason: verdict.reason,
        confidence: clamp_confidence(verdict.confidence),
        model: arbitrator.model_name().to_string(),
        used_llm: true,
        base_tie_triggered: base.tie_triggered,
        base_score_gap: base.score_gap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::Scale;
    use crate::recommend::StrategyCandidate;

    struct Scripted(Result<ArbitrationVerdict, fn() -> ArbitrationError>);

    #[async_trait]
    impl TieArbitrator for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn arbitrate(
            &self,
            _base: &RecommendationResult,
            _profile: &UserProfile,
        ) -> Result<ArbitrationVerdict, ArbitrationError> {
            match &self.0 {
                Ok(verdict) => Ok(verdict.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn verdict(strategy: &str, confidence: f64) -> ArbitrationVerdict {
        ArbitrationVerdict {
            recommended_strategy: strategy.to_string(),
            reason: "profile fits".to_string(),
            confidence,
        }
    }

    fn base(tie_triggered: bool) -> RecommendationResult {
        let candidate = |driver, strategy: &str, final_score| StrategyCandidate {
            driver,
            driver_subscale: "top".to_string(),
            strategy_subscale: strategy.to_string(),
            correlation: final_score,
            user_subscale_score: 3.0,
            final_score,
        };
        RecommendationResult {
            recommended_strategy: "memory".to_string(),
            winning_driver: Scale::Eq,
            winning_subscale: "top".to_string(),
            tie_triggered,
            score_gap: 0.04,
            user_score_gap: 0.5,
            summary: "top-driven recommendation: memory".to_string(),
            candidates: vec![
                candidate(Scale::Eq, "memory", 0.44),
                candidate(Scale::Fla, "social", 0.48),
            ],
            top_eq_subscale: "top".to_string(),
            top_fla_subscale: "top".to_string(),
            eq_scores: BTreeMap::new(),
            fla_scores: BTreeMap::new(),
            strategy_ranking: Vec::new(),
        }
    }

    #[test]
    fn test_parse_plain_json() {
        let v = parse_verdict(r#"{"recommended_strategy": "memory", "reason": "r", "confidence": 0.8}"#)
            .unwrap();
        assert_eq!(v, ArbitrationVerdict {
            recommended_strategy: "memory".to_string(),
            reason: "r".to_string(),
            confidence: 0.8,
        });
    }

    #[test]
    fn test_parse_json_wrapped_in_prose() {
        let text = "Sure! ```json\n{\"recommended_strategy\": \"social\", \"confidence\": 3}\n```";
        let v = parse_verdict(text).unwrap();
        assert_eq!(v.recommended_strategy, "social");
        assert_eq!(v.confidence, 1.0);
        assert_eq!(v.reason, "LLM fallback decision");
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_verdict("   "), Err(ArbitrationError::EmptyResponse)));
        assert!(matches!(parse_verdict("no json here"), Err(ArbitrationError::Parse(_))));
        assert!(matches!(parse_verdict("} {"), Err(ArbitrationError::Parse(_))));
        assert!(matches!(parse_verdict("[1, 2]"), Err(ArbitrationError::Parse(_))));
    }

    #[tokio::test]
    async fn test_not_tied_skips_arbitrator() {
        let arbitrator = Scripted(Ok(verdict("social", 0.9)));
        let outcome = arbitrate_tie(Some(&arbitrator), &base(false), &UserProfile::new(), false).await;
        assert_eq!(outcome.recommended_strategy, "memory");
        assert_eq!(outcome.confidence, 0.9);
        assert_eq!(outcome.model, RULE_BASED_MODEL);
        assert!(!outcome.used_llm);
    }

    #[tokio::test]
    async fn test_forced_arbitration_uses_verdict() {
        let arbitrator = Scripted(Ok(verdict("social", 0.7)));
        let outcome = arbitrate_tie(Some(&arbitrator), &base(false), &UserProfile::new(), true).await;
        assert_eq!(outcome.recommended_strategy, "social");
        assert_eq!(outcome.model, "scripted");
        assert!(outcome.used_llm);
        assert!(!outcome.base_tie_triggered);
    }

    #[tokio::test]
    async fn test_missing_arbitrator_falls_back_to_best_score() {
        let outcome = arbitrate_tie(None, &base(true), &UserProfile::new(), false).await;
        assert_eq!(outcome.recommended_strategy, "social");
        assert_eq!(outcome.reason, "LLM client unavailable: choose higher final_score");
        assert_eq!(outcome.confidence, 0.55);
        assert_eq!(outcome.base_score_gap, 0.04);
    }

    #[tokio::test]
    async fn test_out_of_pool_strategy_falls_back() {
        let arbitrator = Scripted(Ok(verdict("dance", 0.99)));
        let outcome = arbitrate_tie(Some(&arbitrator), &base(true), &UserProfile::new(), false).await;
        assert_eq!(outcome.recommended_strategy, "social");
        assert_eq!(outcome.reason, "LLM returned invalid strategy: choose higher final_score");
        assert!(!outcome.used_llm);
    }

    #[tokio::test]
    async fn test_arbitrator_errors_fall_back() {
        let cases: [(fn() -> ArbitrationError, &str); 3] = [
            (|| ArbitrationError::EmptyResponse, "LLM returned empty response"),
            (|| ArbitrationError::Transport("timeout".to_string()), "LLM request failed"),
            (|| ArbitrationError::Parse("bad".to_string()), "LLM request failed"),
        ];
        for (make, prefix) in cases {
            let arbitrator = Scripted(Err(make));
            let outcome = arbitrate_tie(Some(&arbitrator), &base(true), &UserProfile::new(), false).await;
            assert_eq!(outcome.recommended_strategy, "social");
            assert_eq!(outcome.reason, format!("{}: choose higher final_score", prefix));
            assert_eq!(outcome.model, RULE_BASED_MODEL);
        }
    }
}
