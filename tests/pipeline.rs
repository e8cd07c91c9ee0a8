use phish_score::config::{CacheConfig, Config, RuleLists, ScoringConfig};
use phish_score::model::{FixedProbability, LinearTextModel, UnavailableModel};
use phish_score::{PhishingAnalyzer, ResultCache, RiskLevel, RuleEngine};
use std::sync::{Arc, Barrier};
use std::thread;

const PHISH: &str = "From: \"Bank Support\" <support@dbs-secure.com>\n\
Subject: Fwd: Account locked\n\
Reply-To: recover@evil.example\n\
\n\
Dear customer, your account is locked due to unusual activity.\n\
Verify your password immediately at https://dbs-secure.com/verify or 203.0.113.7:8080.\n";

const NEWSLETTER: &str = "From: news@ntu.edu.sg\n\
Subject: Campus newsletter\n\
\n\
Here are this week's events on campus. See you at the library.\n";

fn analyzer_with(model: Box<dyn phish_score::ProbabilityModel>) -> PhishingAnalyzer {
    PhishingAnalyzer::new(
        RuleEngine::new(&RuleLists::default(), ScoringConfig::default()),
        Arc::new(ResultCache::from_config(&CacheConfig::default())),
        model,
    )
}

#[test]
fn test_phishing_email_end_to_end() {
    let report = analyzer_with(Box::new(FixedProbability::new(0.95))).analyze(PHISH);

    assert_eq!(report.sender, "support@dbs-secure.com");
    assert_eq!(report.subject, "Account locked");
    assert!(report.emails.contains("support@dbs-secure.com"));
    assert!(report.emails.contains("recover@evil.example"));
    assert!(report.domains.contains("dbs-secure.com"));
    assert!(report.urls.contains("https://dbs-secure.com/verify"));
    assert!(report.ips.contains("203.0.113.7:8080"));

    assert!(report.sus_keywords >= 5);
    assert_eq!(report.rule_breakdown.domain_score, 2);
    assert_eq!(report.rule_breakdown.url_score, 4);
    assert_eq!(report.risk_level, RiskLevel::High);
}

#[test]
fn test_benign_email_end_to_end() {
    let report = analyzer_with(Box::new(FixedProbability::new(0.02))).analyze(NEWSLETTER);

    assert_eq!(report.sender, "news@ntu.edu.sg");
    assert_eq!(report.rule_breakdown.domain_score, 0);
    assert_eq!(report.rule_breakdown.lookalike_score, 0);
    assert_eq!(report.sus_keywords, 0);
    assert!(report.rule_breakdown.rule_score <= 10.0);
    assert!(matches!(report.risk_level, RiskLevel::Safe | RiskLevel::Low));
}

#[test]
fn test_without_model_the_level_is_unknown() {
    let report = analyzer_with(Box::new(UnavailableModel)).analyze(PHISH);
    assert_eq!(report.risk_level, RiskLevel::Unknown);
    assert_eq!(report.risk_score, 0);
    assert!(report.rule_breakdown.rule_score > 0.0);
}

#[test]
fn test_linear_model_drives_fusion() {
    let model = LinearTextModel::from_json(
        r#"{"bias": -2.0, "weights": {"verifi": 2.0, "lock": 2.0, "dbs-secure.com": 3.0}}"#,
    )
    .unwrap();
    let analyzer = analyzer_with(Box::new(model));

    let phish = analyzer.analyze(PHISH);
    let benign = analyzer.analyze(NEWSLETTER);
    assert!(phish.probability.unwrap() > 0.9);
    assert!(benign.probability.unwrap() < 0.2);
    assert!(phish.risk_score > benign.risk_score);
}

#[test]
fn test_analyzer_from_default_config() {
    let mut config = Config::default();
    config.model.fixed_probability = Some(0.5);
    let cache = Arc::new(ResultCache::from_config(&config.cache));
    let analyzer = PhishingAnalyzer::from_config(&config, Arc::clone(&cache)).unwrap();

    let report = analyzer.analyze(NEWSLETTER);
    assert_eq!(report.probability, Some(0.5));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_concurrent_requests_share_one_parse() {
    let cache = Arc::new(ResultCache::from_config(&CacheConfig::default()));
    let analyzer = Arc::new(PhishingAnalyzer::new(
        RuleEngine::new(&RuleLists::default(), ScoringConfig::default()),
        Arc::clone(&cache),
        Box::new(FixedProbability::new(0.7)),
    ));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let analyzer = Arc::clone(&analyzer);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                analyzer.analyze(PHISH)
            })
        })
        .collect();

    let reports: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for report in &reports {
        assert_eq!(report.risk_score, reports[0].risk_score);
        assert_eq!(report.urls, reports[0].urls);
    }

    let stats = analyzer.cache_stats();
    assert_eq!(stats.computations, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 7);
}
