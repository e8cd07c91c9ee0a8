//! Phishing-probability capability.
//!
//! The analyzer only relies on [`ProbabilityModel::predict`] returning a
//! probability in [0, 1]. Any error is treated as "probability unavailable".

use crate::config::ModelConfig;
use crate::error::ModelError;
use crate::normalization::ExtractedEntities;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub trait ProbabilityModel: Send + Sync {
    fn predict(&self, cleaned_text: &str, entities: &ExtractedEntities) -> Result<f64, ModelError>;

    fn name(&self) -> &str;
}

/// Build the model a configuration asks for. A fixed probability wins over a
/// model file; with neither, no probability is available.
pub fn model_from_config(config: &ModelConfig) -> Result<Box<dyn ProbabilityModel>, ModelError> {
    if let Some(probability) = config.fixed_probability {
        return Ok(Box::new(FixedProbability::new(probability)));
    }
    if let Some(path) = &config.linear_model_path {
        return Ok(Box::new(LinearTextModel::from_file(path)?));
    }
    Ok(Box::new(UnavailableModel))
}

#[derive(Debug, Clone, Default)]
pub struct UnavailableModel;

impl ProbabilityModel for UnavailableModel {
    fn predict(&self, _cleaned_text: &str, _entities: &ExtractedEntities) -> Result<f64, ModelError> {
        Err(ModelError::Unavailable)
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// A probability computed elsewhere and supplied as-is
#[derive(Debug, Clone)]
pub struct FixedProbability {
    probability: f64,
}

impl FixedProbability {
    pub fn new(probability: f64) -> Self {
        Self { probability }
    }
}

impl ProbabilityModel for FixedProbability {
    fn predict(&self, _cleaned_text: &str, _entities: &ExtractedEntities) -> Result<f64, ModelError> {
        check_probability(self.probability)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Logistic regression over whitespace-separated unigrams.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearTextModel {
    #[serde(default)]
    pub bias: f64,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
}

impl LinearTextModel {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let load = || -> anyhow::Result<Self> {
            let content = std::fs::read_to_string(path)?;
            Ok(Self::from_json(&content)?)
        };
        let model = load().map_err(|source| ModelError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!(
            "Loaded linear model with {} weights from {}",
            model.weights.len(),
            path.display()
        );
        Ok(model)
    }

    /// Cleaned text followed by every entity, space separated
    pub fn feature_text(cleaned_text: &str, entities: &ExtractedEntities) -> String {
        let mut parts = vec![cleaned_text.to_string()];
        parts.extend(entities.emails.iter().cloned());
        parts.extend(entities.domains.iter().cloned());
        parts.extend(entities.urls.iter().cloned());
        parts.extend(entities.ips.iter().cloned());
        parts.join(" ")
    }
}

impl ProbabilityModel for LinearTextModel {
    fn predict(&self, cleaned_text: &str, entities: &ExtractedEntities) -> Result<f64, ModelError> {
        let text = Self::feature_text(cleaned_text, entities);
        let logit = text
            .split_whitespace()
            .filter_map(|token| self.weights.get(token))
            .fold(self.bias, |acc, weight| acc + weight);
        check_probability(1.0 / (1.0 + (-logit).exp()))
    }

    fn name(&self) -> &str {
        "linear"
    }
}

fn check_probability(probability: f64) -> Result<f64, ModelError> {
    if probability.is_finite() && (0.0..=1.0).contains(&probability) {
        Ok(probability)
    } else {
        Err(ModelError::InvalidOutput(probability))
    }
}
