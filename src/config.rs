use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub lists: RuleLists,
    /// External YAML holding `safe_domains` / `suspicious_keywords`, replacing `lists`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lists_file: Option<PathBuf>,
    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Only this many leading characters feed the fingerprint
    #[serde(default = "default_key_prefix_chars")]
    pub key_prefix_chars: usize,
    /// Share of entries dropped when the cache is full
    #[serde(default = "default_eviction_fraction")]
    pub eviction_fraction: f64,
}

fn default_capacity() -> usize {
    100
}

fn default_ttl_seconds() -> u64 {
    3600
}

fn default_key_prefix_chars() -> usize {
    1000
}

fn default_eviction_fraction() -> f64 {
    0.2
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_seconds: default_ttl_seconds(),
            key_prefix_chars: default_key_prefix_chars(),
            eviction_fraction: default_eviction_fraction(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Heuristic constants of the rule engine. These are empirical values kept
/// for behavioural compatibility; the denominator is the nominal maximum total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub denominator: f64,
    pub domain_penalty: u32,
    pub keyword_cap: u32,
    pub position_cap: u32,
    pub position_window: usize,
    pub body_position_points: u32,
    pub subject_position_points: u32,
    pub lookalike_points: u32,
    pub lookalike_max_distance: usize,
    pub url_points: u32,
    pub url_cap: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            denominator: 50.0,
            domain_penalty: 2,
            keyword_cap: 15,
            position_cap: 15,
            position_window: 15,
            body_position_points: 1,
            subject_position_points: 2,
            lookalike_points: 3,
            lookalike_max_distance: 2,
            url_points: 2,
            url_cap: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleLists {
    pub safe_domains: Vec<String>,
    pub suspicious_keywords: Vec<String>,
}

pub const DEFAULT_SAFE_DOMAINS: &[&str] = &[
    // Government
    "gov.sg",
    "moh.gov.sg",
    "cpf.gov.sg",
    "singpass.gov.sg",
    // Banks
    "dbs.com.sg",
    "ocbc.com",
    "uobgroup.com",
    "hsbc.com.sg",
    "standardchartered.com.sg",
    // Universities
    "sit.edu.sg",
    "ntu.edu.sg",
    "nus.edu.sg",
    "smu.edu.sg",
    "suss.edu.sg",
    // Healthcare
    "singhealth.com.sg",
    "kkh.com.sg",
    "nhg.com.sg",
    "ttsh.com.sg",
    "nuhs.edu.sg",
    "nccs.com.sg",
    "sgmc.com.sg",
    "changi.sghealth.org",
    "cgh.com.sg",
    "sgh.com.sg",
    // Shopping
    "amazon.com",
    "amazon.sg",
    "shopee.sg",
    "lazada.sg",
    "qoo10.sg",
    "aliexpress.com",
    "ebay.com",
    "taobao.com",
    // International brands
    "microsoft.com",
    "google.com",
    "apple.com",
    "paypal.com",
];

pub const DEFAULT_SUSPICIOUS_KEYWORDS: &[&str] = &[
    "urgent",
    "immediately",
    "important",
    "verify",
    "account",
    "password",
    "login",
    "sign in",
    "credential",
    "security alert",
    "unusual activity",
    "suspended",
    "locked",
    "payment",
    "transaction",
    "banking",
    "refund",
    "credit card",
    "debit",
    "prize",
    "lottery",
    "winner",
    "reset",
    "free",
    "offer",
    "limited time",
    "attention",
    "click",
    "claim",
    "win",
    "money",
    "transfer",
    "fund",
    "cash",
    "bonus",
    "gift",
    "confirm",
    "expire",
    "congratulations",
];

impl Default for RuleLists {
    fn default() -> Self {
        Self {
            safe_domains: DEFAULT_SAFE_DOMAINS.iter().map(|d| d.to_string()).collect(),
            suspicious_keywords: DEFAULT_SUSPICIOUS_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear_model_path: Option<PathBuf>,
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Replace the model section with a command-line choice and re-validate.
    /// A fixed probability wins over a model file.
    pub fn override_model(
        &mut self,
        fixed_probability: Option<f64>,
        linear_model_path: Option<PathBuf>,
    ) -> Result<(), ConfigError> {
        if let Some(probability) = fixed_probability {
            self.model.fixed_probability = Some(probability);
            self.model.linear_model_path = None;
        } else if let Some(path) = linear_model_path {
            self.model.fixed_probability = None;
            self.model.linear_model_path = Some(path);
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache.capacity must be greater than zero".to_string(),
            ));
        }
        if !(self.cache.eviction_fraction > 0.0 && self.cache.eviction_fraction <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "cache.eviction_fraction must be in (0, 1], got {}",
                self.cache.eviction_fraction
            )));
        }
        if !(self.scoring.denominator.is_finite() && self.scoring.denominator > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "scoring.denominator must be positive, got {}",
                self.scoring.denominator
            )));
        }
        if let Some(p) = self.model.fixed_probability {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!(
                    "model.fixed_probability must be within [0, 1], got {p}"
                )));
            }
        }
        Ok(())
    }
}
