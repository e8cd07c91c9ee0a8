//! Rule-based phishing heuristics.
//!
//! Each heuristic yields a bounded sub-score; the sum is expressed as a
//! percentage of `ScoringConfig::denominator`.

use crate::config::{RuleLists, ScoringConfig};
use crate::domain_utils::DomainUtils;
use crate::normalization::IpMatcher;
use crate::stopwords::english_stop_words;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleScoreResult {
    pub domain_score: u32,
    pub keyword_score: u32,
    pub position_score: u32,
    pub lookalike_score: u32,
    pub url_score: u32,
    /// Distinct suspicious keywords seen, uncapped
    pub keyword_count: u32,
    /// 0-100 percentage, two decimals
    pub rule_score: f64,
}

impl RuleScoreResult {
    pub fn total(&self) -> u32 {
        self.domain_score
            + self.keyword_score
            + self.position_score
            + self.lookalike_score
            + self.url_score
    }
}

#[derive(Debug, Clone)]
struct Keyword {
    raw: String,
    stemmed: String,
    raw_tokens: Vec<String>,
    stem_tokens: Vec<String>,
    /// Stems with stop words removed, as the keyword appears in cleaned text
    /// ("sign in" -> "sign"). Empty when no token survives.
    cleaned: String,
    cleaned_tokens: Vec<String>,
}

impl Keyword {
    fn found_in(&self, text: &str) -> bool {
        text.contains(&self.raw)
            || text.contains(&self.stemmed)
            || (!self.cleaned.is_empty() && text.contains(&self.cleaned))
    }
}

pub struct RuleEngine {
    safe_domains: Vec<String>,
    keywords: Vec<Keyword>,
    scoring: ScoringConfig,
    stemmer: Stemmer,
    ip_matcher: IpMatcher,
    http_url_regex: Regex,
}

impl RuleEngine {
    pub fn new(lists: &RuleLists, scoring: ScoringConfig) -> Self {
        let stemmer = Stemmer::create(Algorithm::English);
        let stop_words = english_stop_words();
        let keywords = lists
            .suspicious_keywords
            .iter()
            .map(|keyword| {
                let raw = keyword.trim().to_lowercase();
                let raw_tokens: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
                let stem_tokens: Vec<String> = raw_tokens
                    .iter()
                    .map(|token| stemmer.stem(token).into_owned())
                    .collect();
                let cleaned_tokens: Vec<String> = raw_tokens
                    .iter()
                    .filter(|token| !stop_words.contains(token.as_str()))
                    .map(|token| stemmer.stem(token).into_owned())
                    .collect();
                Keyword {
                    stemmed: stem_tokens.join(" "),
                    cleaned: cleaned_tokens.join(" "),
                    raw,
                    raw_tokens,
                    stem_tokens,
                    cleaned_tokens,
                }
            })
            .filter(|keyword| !keyword.raw.is_empty())
            .collect();

        Self {
            safe_domains: lists.safe_domains.iter().map(|d| d.to_lowercase()).collect(),
            keywords,
            scoring,
            stemmer,
            ip_matcher: IpMatcher::new(),
            http_url_regex: Regex::new(r#"(?i)https?://[^\s<>"',]+"#).unwrap(),
        }
    }

    pub fn score(&self, sender: &str, subject: &str, body: &str, url_or_ip_text: &str) -> RuleScoreResult {
        let sender_domain = sender_domain(sender);
        let keyword_count = self.keyword_count(subject, body);

        let mut result = RuleScoreResult {
            domain_score: self.domain_score(&sender_domain),
            keyword_score: keyword_count.min(self.scoring.keyword_cap),
            position_score: self.position_score(subject, body),
            lookalike_score: self.lookalike_score(&sender_domain),
            url_score: self.url_score(url_or_ip_text),
            keyword_count,
            rule_score: 0.0,
        };
        let percentage = 100.0 * result.total() as f64 / self.scoring.denominator;
        result.rule_score = (percentage * 100.0).round_ties_even() / 100.0;

        log::debug!(
            "Rule score {:.2} (domain={} keywords={} position={} lookalike={} url={})",
            result.rule_score,
            result.domain_score,
            result.keyword_score,
            result.position_score,
            result.lookalike_score,
            result.url_score
        );

        result
    }

    /// 0 for an allow-listed sender host, the configured penalty otherwise.
    /// A message without any sender carries no domain evidence.
    pub fn domain_score(&self, sender_domain: &str) -> u32 {
        if sender_domain.is_empty() || self.is_safe(sender_domain) {
            0
        } else {
            self.scoring.domain_penalty
        }
    }

    /// Distinct keywords present in `subject + " " + body`, each counted once
    pub fn keyword_count(&self, subject: &str, body: &str) -> u32 {
        let content = format!("{subject} {body}").to_lowercase();
        self.keywords
            .iter()
            .filter(|keyword| keyword.found_in(&content))
            .count() as u32
    }

    pub fn position_score(&self, subject: &str, body: &str) -> u32 {
        let subject = subject.to_lowercase();
        let window: Vec<String> = body
            .split_whitespace()
            .take(self.scoring.position_window)
            .map(|token| {
                token
                    .trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|token| !token.is_empty())
            .collect();
        let stemmed_window: Vec<String> = window
            .iter()
            .map(|token| self.stemmer.stem(token).into_owned())
            .collect();

        let mut score = 0;
        for keyword in &self.keywords {
            let in_opening = [&window, &stemmed_window].iter().any(|tokens| {
                contains_sequence(tokens, &keyword.raw_tokens)
                    || contains_sequence(tokens, &keyword.stem_tokens)
                    || contains_sequence(tokens, &keyword.cleaned_tokens)
            });
            if in_opening {
                score += self.scoring.body_position_points;
            }
            if keyword.found_in(&subject) {
                score += self.scoring.subject_position_points;
            }
        }
        score.min(self.scoring.position_cap)
    }

    /// Points when the sender host is within a small edit distance of a safe
    /// domain without being one
    pub fn lookalike_score(&self, sender_domain: &str) -> u32 {
        if sender_domain.is_empty() || self.is_safe(sender_domain) {
            return 0;
        }
        match DomainUtils::nearest(sender_domain, &self.safe_domains) {
            Some((safe, distance)) if distance <= self.scoring.lookalike_max_distance => {
                log::debug!("Sender domain {sender_domain} is {distance} edits from {safe}");
                self.scoring.lookalike_points
            }
            _ => 0,
        }
    }

    /// IPv4 literals (with or without scheme) plus `http(s)://` URLs
    pub fn url_score(&self, text: &str) -> u32 {
        let ip_count = self.ip_matcher.count(text);
        let http_count = self.http_url_regex.find_iter(text).count();
        let points = (ip_count + http_count) as u32 * self.scoring.url_points;
        points.min(self.scoring.url_cap)
    }

    fn is_safe(&self, domain: &str) -> bool {
        DomainUtils::is_listed(domain, &self.safe_domains)
    }
}

fn sender_domain(sender: &str) -> String {
    let sender = sender.trim();
    DomainUtils::extract_domain(sender).unwrap_or_else(|| sender.to_lowercase())
}

fn contains_sequence(tokens: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && tokens.windows(needle.len()).any(|window| window == needle)
}

/// Edit distance with unit cost for substitution, insertion and deletion
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
