pub mod analyzer;
pub mod cache;
pub mod config;
pub mod config_loader;
pub mod domain_utils;
pub mod error;
pub mod fusion;
pub mod header_parser;
pub mod model;
pub mod normalization;
pub mod rules;
pub mod stopwords;

pub use analyzer::{AssessmentReport, PhishingAnalyzer};
pub use cache::{CacheStats, ResultCache};
pub use config::Config;
pub use error::{ConfigError, ModelError};
pub use fusion::{FusionEngine, FusionMethod, FusionResult, RiskLevel};
pub use header_parser::{HeaderParser, ParsedEmail};
pub use model::{FixedProbability, LinearTextModel, ProbabilityModel, UnavailableModel};
pub use normalization::{ExtractedEntities, MessageNormalizer, NormalizedMessage};
pub use rules::{RuleEngine, RuleScoreResult};
