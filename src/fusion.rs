use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "SAFE")]
    Safe,
    #[serde(rename = "LOW DANGER")]
    Low,
    #[serde(rename = "MEDIUM DANGER")]
    Medium,
    #[serde(rename = "HIGH DANGER")]
    High,
    /// A rule score or probability was not supplied
    #[serde(rename = "UNKNOWN")]
    Unknown,
    /// A rule score or probability was supplied but unusable
    #[serde(rename = "ERROR")]
    Error,
}

impl RiskLevel {
    /// Inclusive bands: 0, 1-33, 34-66, 67-100
    pub fn from_score(score: u32) -> Self {
        match score {
            0 => RiskLevel::Safe,
            1..=33 => RiskLevel::Low,
            34..=66 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Low => "LOW DANGER",
            RiskLevel::Medium => "MEDIUM DANGER",
            RiskLevel::High => "HIGH DANGER",
            RiskLevel::Unknown => "UNKNOWN",
            RiskLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which weighting branch produced a fused score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FusionMethod {
    #[serde(rename = "ML-dominant")]
    MlDominant,
    #[serde(rename = "Rule-dominant (many problems)")]
    RuleManyProblems,
    #[serde(rename = "Rule-dominant (many keywords)")]
    RuleManyKeywords,
    #[serde(rename = "Rule-dominant (high rule score)")]
    RuleHighScore,
    #[serde(rename = "special low-signal rule")]
    LowSignal,
    #[serde(rename = "Balanced")]
    Balanced,
}

impl FusionMethod {
    /// (ml_weight, rule_weight)
    pub fn weights(&self) -> (f64, f64) {
        match self {
            FusionMethod::MlDominant => (0.65, 0.35),
            FusionMethod::RuleManyProblems => (0.35, 0.65),
            FusionMethod::RuleManyKeywords => (0.4, 0.6),
            FusionMethod::RuleHighScore => (0.45, 0.55),
            FusionMethod::LowSignal => (0.05, 0.95),
            FusionMethod::Balanced => (0.5, 0.5),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FusionMethod::MlDominant => "ML-dominant",
            FusionMethod::RuleManyProblems => "Rule-dominant (many problems)",
            FusionMethod::RuleManyKeywords => "Rule-dominant (many keywords)",
            FusionMethod::RuleHighScore => "Rule-dominant (high rule score)",
            FusionMethod::LowSignal => "special low-signal rule",
            FusionMethod::Balanced => "Balanced",
        }
    }
}

impl fmt::Display for FusionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    /// None when the inputs were absent or malformed
    pub method: Option<FusionMethod>,
}

impl FusionResult {
    fn without_score(risk_level: RiskLevel) -> Self {
        Self {
            risk_score: 0,
            risk_level,
            method: None,
        }
    }
}

/// Adaptive combination of the rule percentage with the model probability.
///
/// The more decisive signal gets the larger weight: a confident model
/// dominates, many rule hits shift weight to the rules, and a message with
/// almost no rule evidence leans almost entirely on the rule score.
#[derive(Debug, Clone, Default)]
pub struct FusionEngine;

impl FusionEngine {
    pub fn new() -> Self {
        FusionEngine
    }

    pub fn fuse(
        &self,
        rule_score: Option<f64>,
        probability: Option<f64>,
        keyword_count: u32,
    ) -> FusionResult {
        let (Some(rule_score), Some(probability)) = (rule_score, probability) else {
            return FusionResult::without_score(RiskLevel::Unknown);
        };
        if !rule_score.is_finite() || !probability.is_finite() {
            log::warn!("Non-numeric fusion input: rule_score={rule_score} probability={probability}");
            return FusionResult::without_score(RiskLevel::Error);
        }
        if !(0.0..=1.0).contains(&probability) {
            log::warn!("Probability {probability} outside [0, 1]");
            return FusionResult::without_score(RiskLevel::Error);
        }

        let ml_score = probability * 100.0;
        let method = Self::select_method(rule_score, ml_score, keyword_count);
        let (ml_weight, rule_weight) = method.weights();
        let risk_score = round_score(rule_score * rule_weight + ml_score * ml_weight);

        log::debug!(
            "Fused rule={rule_score:.2} ml={ml_score:.2} keywords={keyword_count} via {method} -> {risk_score}"
        );

        FusionResult {
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            method: Some(method),
        }
    }

    /// Same as [`FusionEngine::fuse`] for inputs that arrive as text, e.g.
    /// form fields or command-line arguments.
    pub fn fuse_raw(
        &self,
        rule_score: Option<&str>,
        probability: Option<&str>,
        keyword_count: u32,
    ) -> FusionResult {
        let (Some(rule_score), Some(probability)) = (rule_score, probability) else {
            return FusionResult::without_score(RiskLevel::Unknown);
        };
        match (rule_score.trim().parse::<f64>(), probability.trim().parse::<f64>()) {
            (Ok(rule_score), Ok(probability)) => {
                self.fuse(Some(rule_score), Some(probability), keyword_count)
            }
            _ => {
                log::warn!("Unparseable fusion input: rule_score={rule_score:?} probability={probability:?}");
                FusionResult::without_score(RiskLevel::Error)
            }
        }
    }

    fn select_method(rule_score: f64, ml_score: f64, keyword_count: u32) -> FusionMethod {
        let ml_confidence = (ml_score - 50.0).abs() / 50.0;
        let base_confidence = if rule_score > 50.0 {
            0.6
        } else if rule_score < 20.0 {
            0.3
        } else {
            0.5
        };
        let ruleset_confidence = if keyword_count > 0 {
            (keyword_count as f64 / 10.0).min(1.0)
        } else {
            base_confidence
        };

        if ml_confidence > 0.4 {
            FusionMethod::MlDominant
        } else if ruleset_confidence > 0.6 {
            FusionMethod::RuleManyProblems
        } else if keyword_count >= 5 {
            FusionMethod::RuleManyKeywords
        } else if rule_score > 70.0 {
            FusionMethod::RuleHighScore
        } else if keyword_count <= 2 {
            FusionMethod::LowSignal
        } else {
            FusionMethod::Balanced
        }
    }
}

/// Half-to-even rounding, clamped to 0..=100
fn round_score(value: f64) -> u32 {
    value.round_ties_even().clamp(0.0, 100.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_inputs_are_safe() {
        let result = FusionEngine::new().fuse(Some(0.0), Some(0.0), 0);
        assert_eq!(result.risk_score, 0);
        assert_eq!(result.risk_level, RiskLevel::Safe);
        assert_eq!(result.method, Some(FusionMethod::MlDominant));
    }

    #[test]
    fn test_missing_inputs_are_unknown() {
        let engine = FusionEngine::new();
        for (rule, prob) in [(None, None), (Some(10.0), None), (None, Some(0.5))] {
            let result = engine.fuse(rule, prob, 0);
            assert_eq!(result.risk_score, 0);
            assert_eq!(result.risk_level, RiskLevel::Unknown);
            assert_eq!(result.method, None);
        }
    }

    #[test]
    fn test_malformed_inputs_are_errors() {
        let engine = FusionEngine::new();
        assert_eq!(engine.fuse(Some(f64::NAN), Some(0.5), 0).risk_level, RiskLevel::Error);
        assert_eq!(engine.fuse(Some(10.0), Some(f64::INFINITY), 0).risk_level, RiskLevel::Error);
        assert_eq!(engine.fuse(Some(10.0), Some(1.5), 0).risk_level, RiskLevel::Error);
        assert_eq!(engine.fuse(Some(10.0), Some(-0.1), 0).risk_score, 0);
    }

    #[test]
    fn test_fuse_raw() {
        let engine = FusionEngine::new();
        assert_eq!(engine.fuse_raw(Some("abc"), Some("0.5"), 0).risk_level, RiskLevel::Error);
        assert_eq!(engine.fuse_raw(Some("10"), Some(""), 0).risk_level, RiskLevel::Error);
        assert_eq!(engine.fuse_raw(None, Some("0.5"), 0).risk_level, RiskLevel::Unknown);
        assert_eq!(
            engine.fuse_raw(Some(" 100 "), Some("1.0"), 0),
            engine.fuse(Some(100.0), Some(1.0), 0)
        );
    }

    #[test]
    fn test_ml_dominant() {
        let result = FusionEngine::new().fuse(Some(100.0), Some(1.0), 0);
        assert_eq!(result.method, Some(FusionMethod::MlDominant));
        assert_eq!(result.risk_score, 100);
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_rule_dominant_many_problems() {
        let result = FusionEngine::new().fuse(Some(60.0), Some(0.55), 7);
        assert_eq!(result.method, Some(FusionMethod::RuleManyProblems));
        assert_eq!(result.risk_score, 58);
        assert_eq!(result.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_rule_dominant_many_keywords() {
        let result = FusionEngine::new().fuse(Some(40.0), Some(0.5), 5);
        assert_eq!(result.method, Some(FusionMethod::RuleManyKeywords));
        assert_eq!(result.risk_score, 44);
    }

    #[test]
    fn test_rule_dominant_high_rule_score() {
        let result = FusionEngine::new().fuse(Some(80.0), Some(0.4), 3);
        assert_eq!(result.method, Some(FusionMethod::RuleHighScore));
        assert_eq!(result.risk_score, 62);
    }

    #[test]
    fn test_low_signal() {
        let result = FusionEngine::new().fuse(Some(20.0), Some(0.6), 1);
        assert_eq!(result.method, Some(FusionMethod::LowSignal));
        assert_eq!(result.risk_score, 22);
        assert_eq!(result.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_base_confidence_without_keywords() {
        // no keywords: a high rule score alone is not enough for the rule-dominant branch
        let result = FusionEngine::new().fuse(Some(60.0), Some(0.5), 0);
        assert_eq!(result.method, Some(FusionMethod::LowSignal));
    }

    #[test]
    fn test_balanced() {
        let result = FusionEngine::new().fuse(Some(40.0), Some(0.6), 3);
        assert_eq!(result.method, Some(FusionMethod::Balanced));
        assert_eq!(result.risk_score, 50);
    }

    #[test]
    fn test_risk_bands() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Safe);
        assert_eq!(RiskLevel::from_score(1), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(33), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(34), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(66), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(67), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::High);
    }

    #[test]
    fn test_round_score() {
        assert_eq!(round_score(2.5), 2);
        assert_eq!(round_score(3.5), 4);
        assert_eq!(round_score(-4.0), 0);
        assert_eq!(round_score(140.0), 100);
    }

    #[test]
    fn test_labels_serialize_as_display_text() {
        assert_eq!(serde_json::to_string(&RiskLevel::Medium).unwrap(), "\"MEDIUM DANGER\"");
        assert_eq!(
            serde_json::to_string(&FusionMethod::LowSignal).unwrap(),
            "\"special low-signal rule\""
        );
        assert_eq!(RiskLevel::High.to_string(), "HIGH DANGER");
    }
}
