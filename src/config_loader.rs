use crate::config::{Config, RuleLists};
use crate::error::ConfigError;
use std::fs;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `safe_domains` / `suspicious_keywords` from a standalone YAML file
    pub fn load_rule_lists(path: &Path) -> Result<RuleLists, ConfigError> {
        let content = fs::read_to_string(path)?;
        let lists: RuleLists = serde_yaml::from_str(&content)?;
        Ok(Self::normalize_lists(lists))
    }

    /// Lists in effect for a configuration: the external file wins over inline lists
    pub fn resolve_rule_lists(config: &Config) -> Result<RuleLists, ConfigError> {
        match &config.lists_file {
            Some(path) => {
                let lists = Self::load_rule_lists(path)?;
                log::info!(
                    "Loaded {} safe domains and {} keywords from {}",
                    lists.safe_domains.len(),
                    lists.suspicious_keywords.len(),
                    path.display()
                );
                Ok(lists)
            }
            None => Ok(Self::normalize_lists(config.lists.clone())),
        }
    }

    fn normalize_lists(lists: RuleLists) -> RuleLists {
        let clean = |items: Vec<String>| -> Vec<String> {
            let mut out: Vec<String> = Vec::with_capacity(items.len());
            for item in items {
                let item = item.trim().to_lowercase();
                if !item.is_empty() && !out.contains(&item) {
                    out.push(item);
                }
            }
            out
        };

        RuleLists {
            safe_domains: clean(lists.safe_domains),
            suspicious_keywords: clean(lists.suspicious_keywords),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_lists_are_normalized() {
        let mut config = Config::default();
        config.lists = RuleLists {
            safe_domains: vec![" Example.COM ".to_string(), "example.com".to_string()],
            suspicious_keywords: vec!["URGENT".to_string(), "".to_string()],
        };

        let lists = ConfigLoader::resolve_rule_lists(&config).unwrap();
        assert_eq!(lists.safe_domains, vec!["example.com".to_string()]);
        assert_eq!(lists.suspicious_keywords, vec!["urgent".to_string()]);
    }

    #[test]
    fn test_missing_lists_file_is_an_error() {
        let mut config = Config::default();
        config.lists_file = Some("/nonexistent/phish-score/lists.yaml".into());
        assert!(matches!(
            ConfigLoader::resolve_rule_lists(&config),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_lists_file_is_loaded() {
        let path = std::env::temp_dir().join(format!(
            "phish-score-lists-{}.yaml",
            std::process::id()
        ));
        fs::write(
            &path,
            "safe_domains:\n  - corp.example\nsuspicious_keywords:\n  - invoice\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.lists_file = Some(path.clone());
        let lists = ConfigLoader::resolve_rule_lists(&config).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(lists.safe_domains, vec!["corp.example".to_string()]);
        assert_eq!(lists.suspicious_keywords, vec!["invoice".to_string()]);
    }
}
