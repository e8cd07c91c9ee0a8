use crate::cache::{CacheStats, ResultCache};
use crate::config::Config;
use crate::config_loader::ConfigLoader;
use crate::error::ModelError;
use crate::fusion::{FusionEngine, FusionMethod, RiskLevel};
use crate::header_parser::{HeaderParser, ParsedEmail};
use crate::model::{model_from_config, ProbabilityModel};
use crate::normalization::MessageNormalizer;
use crate::rules::{RuleEngine, RuleScoreResult};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Everything a caller needs to present one assessment
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentReport {
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub method: Option<FusionMethod>,
    pub sus_keywords: u32,
    pub cleaned_text: String,
    pub emails: BTreeSet<String>,
    pub domains: BTreeSet<String>,
    pub urls: BTreeSet<String>,
    pub ips: BTreeSet<String>,
    pub rule_breakdown: RuleScoreResult,
    pub probability: Option<f64>,
    pub sender: String,
    pub subject: String,
}

pub struct PhishingAnalyzer {
    normalizer: MessageNormalizer,
    header_parser: HeaderParser,
    cache: Arc<ResultCache<ParsedEmail>>,
    rules: RuleEngine,
    fusion: FusionEngine,
    model: Box<dyn ProbabilityModel>,
}

impl PhishingAnalyzer {
    pub fn new(
        rules: RuleEngine,
        cache: Arc<ResultCache<ParsedEmail>>,
        model: Box<dyn ProbabilityModel>,
    ) -> Self {
        Self {
            normalizer: MessageNormalizer::new(),
            header_parser: HeaderParser::new(),
            cache,
            rules,
            fusion: FusionEngine::new(),
            model,
        }
    }

    /// Analyzer with rule lists and model resolved from `config`. The cache is
    /// supplied by the caller so it can be shared.
    pub fn from_config(config: &Config, cache: Arc<ResultCache<ParsedEmail>>) -> anyhow::Result<Self> {
        let lists = ConfigLoader::resolve_rule_lists(config)?;
        let rules = RuleEngine::new(&lists, config.scoring.clone());
        let model = model_from_config(&config.model)?;
        log::info!(
            "Analyzer ready: {} safe domains, {} keywords, model={}",
            lists.safe_domains.len(),
            lists.suspicious_keywords.len(),
            model.name()
        );
        Ok(Self::new(rules, cache, model))
    }

    /// Header-aware view of the message, served from the cache when possible
    pub fn parse_headers(&self, raw: &str) -> ParsedEmail {
        self.cache
            .get_or_compute(raw, || self.header_parser.parse(raw))
    }

    pub fn analyze(&self, raw: &str) -> AssessmentReport {
        let parsed = self.parse_headers(raw);
        let normalized = self.normalizer.normalize(raw);
        let entities = normalized.entities;

        // a From: line without an address still counts as an unlisted sender
        let sender = parsed
            .sender_address()
            .or_else(|| parsed.from.clone())
            .unwrap_or_default();
        let subject = parsed.subject.clone().unwrap_or_default();
        let url_or_ip_text = entities
            .urls
            .iter()
            .chain(entities.ips.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        let rule_breakdown =
            self.rules
                .score(&sender, &subject, &normalized.cleaned_text, &url_or_ip_text);

        let probability = match self.model.predict(&normalized.cleaned_text, &entities) {
            Ok(probability) => Some(probability),
            Err(ModelError::InvalidOutput(probability)) => {
                log::warn!("{} model returned invalid probability {}", self.model.name(), probability);
                Some(probability)
            }
            Err(e) => {
                log::warn!("Probability unavailable from {} model: {}", self.model.name(), e);
                None
            }
        };

        let fused = self.fusion.fuse(
            Some(rule_breakdown.rule_score),
            probability,
            rule_breakdown.keyword_count,
        );

        AssessmentReport {
            risk_score: fused.risk_score,
            risk_level: fused.risk_level,
            method: fused.method,
            sus_keywords: rule_breakdown.keyword_count,
            cleaned_text: normalized.cleaned_text,
            emails: entities.emails,
            domains: entities.domains,
            urls: entities.urls,
            ips: entities.ips,
            rule_breakdown,
            probability,
            sender,
            subject,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }
}
