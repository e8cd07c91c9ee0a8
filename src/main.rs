use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use phish_score::analyzer::{AssessmentReport, PhishingAnalyzer};
use phish_score::cache::{CacheStats, ResultCache};
use phish_score::config::Config;
use phish_score::config_loader::ConfigLoader;
use phish_score::model::model_from_config;
use std::io::Read;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

const DEFAULT_CONFIG_PATH: &str = "/etc/phish-score.yaml";

#[tokio::main]
async fn main() {
    let matches = Command::new("phish-score")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Phishing risk assessment for pasted emails and messages")
        .long_about(
            "Extracts emails, domains, URLs and IPs from a message, scores it with \
             rule-based heuristics and fuses the result with a phishing probability \
             into a 0-100 risk score.",
        )
        .arg(
            Arg::new("files")
                .value_name("FILE")
                .help("Message files to analyze (stdin when no FILE and no --text)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the configuration, rule lists and model, then exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("text")
                .long("text")
                .value_name("TEXT")
                .help("Analyze a literal message instead of files")
                .conflicts_with("files")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("probability")
                .long("probability")
                .value_name("P")
                .help("Use a fixed phishing probability in [0, 1]")
                .value_parser(clap::value_parser!(f64))
                .conflicts_with("model")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .value_name("FILE")
                .help("Load a linear text model (JSON)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print reports as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("headers")
                .long("headers")
                .help("Print the parsed header summary of each message")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .help("Print cache statistics after processing")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);

    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = config.override_model(
        matches.get_one::<f64>("probability").copied(),
        matches.get_one::<String>("model").map(PathBuf::from),
    ) {
        eprintln!("Error in command-line options: {e}");
        process::exit(1);
    }

    if matches.get_flag("test-config") {
        test_config(&config);
        return;
    }

    let cache = Arc::new(ResultCache::from_config(&config.cache));
    let analyzer = match PhishingAnalyzer::from_config(&config, cache) {
        Ok(analyzer) => Arc::new(analyzer),
        Err(e) => {
            eprintln!("Error initializing analyzer: {e}");
            process::exit(1);
        }
    };

    let inputs = match collect_inputs(
        matches.get_one::<String>("text"),
        matches.get_many::<String>("files"),
    ) {
        Ok(inputs) => inputs,
        Err(e) => {
            eprintln!("Error reading input: {e}");
            process::exit(1);
        }
    };

    let json = matches.get_flag("json");
    let show_headers = matches.get_flag("headers");

    let handles: Vec<_> = inputs
        .into_iter()
        .map(|(label, text)| {
            let analyzer = Arc::clone(&analyzer);
            tokio::task::spawn_blocking(move || {
                let report = analyzer.analyze(&text);
                let headers = show_headers.then(|| analyzer.parse_headers(&text).summary());
                (label, report, headers)
            })
        })
        .collect();

    for handle in handles {
        let (label, report, headers) = match handle.await {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Analysis task failed: {e}");
                process::exit(1);
            }
        };

        if json {
            match serde_json::to_string_pretty(&report) {
                Ok(output) => println!("{output}"),
                Err(e) => {
                    eprintln!("Error serializing report: {e}");
                    process::exit(1);
                }
            }
        } else {
            print_report(&label, &report);
        }

        if let Some(summary) = headers {
            println!("📨 Headers: {summary}");
            println!();
        }
    }

    if matches.get_flag("stats") {
        print_stats(&analyzer.cache_stats());
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn test_config(config: &Config) {
    println!("🔍 Testing configuration...");
    println!();

    if let Err(e) = config.validate() {
        println!("❌ {e}");
        process::exit(1);
    }

    match ConfigLoader::resolve_rule_lists(config) {
        Ok(lists) => {
            println!("Safe domains: {}", lists.safe_domains.len());
            println!("Suspicious keywords: {}", lists.suspicious_keywords.len());
        }
        Err(e) => {
            println!("❌ Failed to load rule lists: {e}");
            process::exit(1);
        }
    }

    match model_from_config(&config.model) {
        Ok(model) => println!("Probability model: {}", model.name()),
        Err(e) => {
            println!("❌ Failed to load probability model: {e}");
            process::exit(1);
        }
    }

    println!(
        "Cache: capacity {}, ttl {}s, fingerprint prefix {} chars",
        config.cache.capacity, config.cache.ttl_seconds, config.cache.key_prefix_chars
    );
    println!("✅ Configuration is valid");
}

/// (label, text) pairs in the order they were given
fn collect_inputs<'a>(
    text: Option<&String>,
    files: Option<impl Iterator<Item = &'a String>>,
) -> anyhow::Result<Vec<(String, String)>> {
    if let Some(text) = text {
        return Ok(vec![("<text>".to_string(), text.clone())]);
    }

    if let Some(files) = files {
        return files
            .map(|path| {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("{path}: {e}"))?;
                Ok((path.clone(), content))
            })
            .collect();
    }

    let mut content = String::new();
    std::io::stdin().read_to_string(&mut content)?;
    Ok(vec![("<stdin>".to_string(), content)])
}

fn print_report(label: &str, report: &AssessmentReport) {
    let icon = match report.risk_level {
        phish_score::RiskLevel::Safe => "✅",
        phish_score::RiskLevel::Low => "🟡",
        phish_score::RiskLevel::Medium => "🟠",
        phish_score::RiskLevel::High => "🚨",
        phish_score::RiskLevel::Unknown | phish_score::RiskLevel::Error => "❔",
    };

    println!("{icon} {label}: {} ({}/100)", report.risk_level, report.risk_score);
    if let Some(method) = report.method {
        println!("  Method: {method}");
    }
    let rules = &report.rule_breakdown;
    println!(
        "  Rule score: {:.2} (domain {}, keywords {}, position {}, lookalike {}, url {})",
        rules.rule_score,
        rules.domain_score,
        rules.keyword_score,
        rules.position_score,
        rules.lookalike_score,
        rules.url_score
    );
    match report.probability {
        Some(p) => println!("  Probability: {p:.3}"),
        None => println!("  Probability: unavailable"),
    }
    println!("  Suspicious keywords: {}", report.sus_keywords);
    if !report.sender.is_empty() {
        println!("  Sender: {}", report.sender);
    }
    if !report.subject.is_empty() {
        println!("  Subject: {}", report.subject);
    }
    print_set("Emails", &report.emails);
    print_set("Domains", &report.domains);
    print_set("URLs", &report.urls);
    print_set("IPs", &report.ips);
    println!();
}

fn print_set(title: &str, items: &std::collections::BTreeSet<String>) {
    if !items.is_empty() {
        let items: Vec<&str> = items.iter().map(String::as_str).collect();
        println!("  {title}: {}", items.join(", "));
    }
}

fn print_stats(stats: &CacheStats) {
    println!("📊 Cache Statistics");
    println!("═══════════════════════════════════════");
    println!("  Size: {}/{}", stats.size, stats.capacity);
    println!("  Hits: {}  Misses: {}", stats.hits, stats.misses);
    println!("  Hit rate: {:.1}%", stats.hit_rate * 100.0);
    println!(
        "  Computations: {} (failures: {}, avg {:.3} ms)",
        stats.computations, stats.failures, stats.average_compute_ms
    );
}
