//! Text normalization and entity extraction.
//!
//! Lower-cases a message body, pulls out emails, URLs and IPv4 addresses,
//! derives the set of referenced domains, and reduces the remaining prose to
//! stemmed, stop-word-free tokens. All patterns are compiled once per
//! normalizer.

use crate::domain_utils::DomainUtils;
use crate::stopwords::english_stop_words;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::ops::Range;
use url::{Host, Url};

const EMAIL_PATTERN: &str = r"[\w.-]+@[\w.-]+\.[a-z]{2,}";

const DOMAIN_PATTERN: &str = r"(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}";

const BARE_DOMAIN_PATTERN: &str = r"\b(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+(?:com|net|org|edu|gov|mil|int|info|biz|io|co|me|us|uk|sg|my|au|ca|de|fr|jp|cn|in|ru|xyz|online|site|top|app|dev)\b";

const IPV4_OCTET: &str = r"(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)";

const PUNCTUATION_PATTERN: &str = r"[^\w\s]";

/// Characters trimmed from the end of a URL match before it is recorded
const URL_TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')'];

fn ipv4_pattern() -> String {
    format!(r"(?:{o}\.){{3}}{o}", o = IPV4_OCTET)
}

fn url_pattern() -> String {
    format!(
        r#"(?:https?://(?:{domain}|{ip})|www\.{domain}|{bare})(?::\d{{1,5}})?(?:[/?#][^\s<>"'\[\](){{}}]*)?"#,
        domain = DOMAIN_PATTERN,
        ip = ipv4_pattern(),
        bare = BARE_DOMAIN_PATTERN,
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    pub emails: BTreeSet<String>,
    pub domains: BTreeSet<String>,
    pub urls: BTreeSet<String>,
    pub ips: BTreeSet<String>,
}

impl ExtractedEntities {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty() && self.domains.is_empty() && self.urls.is_empty() && self.ips.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub cleaned_text: String,
    pub entities: ExtractedEntities,
}

/// Dotted-quad matcher with octets bounded to 0-255 and an optional port.
///
/// The regex engine has no lookahead, so a match directly followed by another
/// digit is rejected here instead. When only the port runs long, the bare
/// address is kept.
#[derive(Debug, Clone)]
pub struct IpMatcher {
    regex: Regex,
}

impl IpMatcher {
    pub fn new() -> Self {
        Self {
            regex: Regex::new(&format!(r"\b(?P<ip>{})(?P<port>:\d{{1,5}})?", ipv4_pattern())).unwrap(),
        }
    }

    /// Byte ranges of every accepted address (with port when present)
    pub fn find_all(&self, text: &str) -> Vec<Range<usize>> {
        let mut spans = Vec::new();
        for caps in self.regex.captures_iter(text) {
            let (Some(whole), Some(ip)) = (caps.get(0), caps.name("ip")) else {
                continue;
            };
            if !followed_by_digit(text, whole.end()) {
                spans.push(whole.range());
            } else if caps.name("port").is_some() && !followed_by_digit(text, ip.end()) {
                spans.push(ip.range());
            }
        }
        spans
    }

    pub fn count(&self, text: &str) -> usize {
        self.find_all(text).len()
    }
}

impl Default for IpMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn followed_by_digit(text: &str, at: usize) -> bool {
    text[at..].chars().next().is_some_and(|c| c.is_ascii_digit())
}

pub struct MessageNormalizer {
    email_regex: Regex,
    url_regex: Regex,
    ip_matcher: IpMatcher,
    punctuation_regex: Regex,
    stop_words: HashSet<&'static str>,
    stemmer: Stemmer,
}

impl MessageNormalizer {
    pub fn new() -> Self {
        Self {
            email_regex: Regex::new(EMAIL_PATTERN).unwrap(),
            url_regex: Regex::new(&url_pattern()).unwrap(),
            ip_matcher: IpMatcher::new(),
            punctuation_regex: Regex::new(PUNCTUATION_PATTERN).unwrap(),
            stop_words: english_stop_words(),
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Normalize a message body. Total over all input, including the empty string.
    pub fn normalize(&self, body: &str) -> NormalizedMessage {
        let lowered = body.to_lowercase();

        let email_spans: Vec<Range<usize>> =
            self.email_regex.find_iter(&lowered).map(|m| m.range()).collect();
        let emails: BTreeSet<String> = email_spans
            .iter()
            .map(|span| lowered[span.clone()].trim_end_matches('.').to_string())
            .collect();
        let without_emails = remove_spans(&lowered, &email_spans);

        let url_spans: Vec<Range<usize>> = self
            .url_regex
            .find_iter(&without_emails)
            .map(|m| m.range())
            .collect();
        let urls: BTreeSet<String> = url_spans
            .iter()
            .map(|span| {
                without_emails[span.clone()]
                    .trim_end_matches(URL_TRAILING_PUNCTUATION)
                    .to_string()
            })
            .filter(|url| !url.is_empty())
            .collect();
        let without_urls = remove_spans(&without_emails, &url_spans);

        let ip_spans = self.ip_matcher.find_all(&without_urls);
        let ips: BTreeSet<String> = ip_spans
            .iter()
            .map(|span| without_urls[span.clone()].to_string())
            .collect();
        let remainder = remove_spans(&without_urls, &ip_spans);

        let mut domains: BTreeSet<String> = emails
            .iter()
            .filter_map(|email| DomainUtils::extract_domain(email))
            .collect();
        domains.extend(urls.iter().filter_map(|url| url_host(url)));

        let cleaned_text = self.clean_tokens(&remainder);

        log::debug!(
            "Normalized {} chars: {} emails, {} domains, {} urls, {} ips",
            body.len(),
            emails.len(),
            domains.len(),
            urls.len(),
            ips.len()
        );

        NormalizedMessage {
            cleaned_text,
            entities: ExtractedEntities {
                emails,
                domains,
                urls,
                ips,
            },
        }
    }

    pub fn stem(&self, word: &str) -> String {
        self.stemmer.stem(word).into_owned()
    }

    fn clean_tokens(&self, text: &str) -> String {
        let stripped = self.punctuation_regex.replace_all(text, "");
        stripped
            .split_whitespace()
            .filter(|word| !self.stop_words.contains(word))
            .map(|word| self.stem(word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for MessageNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace each span with a single space so neighbours never fuse into one token
fn remove_spans(text: &str, spans: &[Range<usize>]) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last = 0;
    for span in spans {
        result.push_str(&text[last..span.start]);
        result.push(' ');
        last = span.end;
    }
    result.push_str(&text[last..]);
    result
}

/// Host of a URL with any `www.` removed. Schemeless URLs get `https://`
/// only for parsing. IP-literal hosts are not domains.
fn url_host(url: &str) -> Option<String> {
    let candidate = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };

    match Url::parse(&candidate).ok()?.host()? {
        Host::Domain(host) => Some(DomainUtils::strip_www(host)),
        Host::Ipv4(_) | Host::Ipv6(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_input() {
        let normalizer = MessageNormalizer::new();
        let result = normalizer.normalize("");
        assert_eq!(result.cleaned_text, "");
        assert!(result.entities.is_empty());
    }

    #[test]
    fn test_emails_and_domains() {
        let normalizer = MessageNormalizer::new();
        let result = normalizer.normalize("my email is 1002@outlook.com or also zhang@gmail.com");

        assert_eq!(result.cleaned_text, "email also");
        assert_eq!(
            result.entities.emails,
            set(&["1002@outlook.com", "zhang@gmail.com"])
        );
        assert_eq!(result.entities.domains, set(&["outlook.com", "gmail.com"]));
        assert!(result.entities.urls.is_empty());
        assert!(result.entities.ips.is_empty());
    }

    #[test]
    fn test_email_trailing_dot_and_dedup() {
        let normalizer = MessageNormalizer::new();
        let result = normalizer.normalize("Write to Help@Bank.com. Again: help@bank.com");
        assert_eq!(result.entities.emails, set(&["help@bank.com"]));
        assert_eq!(result.entities.domains, set(&["bank.com"]));
    }

    #[test]
    fn test_urls_and_url_domains() {
        let normalizer = MessageNormalizer::new();
        let result = normalizer.normalize("my website is https://www.notscam.com and www.wow.co.uk");

        assert_eq!(result.cleaned_text, "websit");
        assert_eq!(
            result.entities.urls,
            set(&["https://www.notscam.com", "www.wow.co.uk"])
        );
        assert_eq!(result.entities.domains, set(&["notscam.com", "wow.co.uk"]));
        assert!(result.entities.emails.is_empty());
    }

    #[test]
    fn test_url_trailing_punctuation_and_path() {
        let normalizer = MessageNormalizer::new();
        let result = normalizer
            .normalize("Go to (https://login.example.com:8443/reset?id=7). Or paypal.com, fast!");

        assert_eq!(
            result.entities.urls,
            set(&["https://login.example.com:8443/reset?id=7", "paypal.com"])
        );
        assert_eq!(
            result.entities.domains,
            set(&["login.example.com", "paypal.com"])
        );
        assert_eq!(result.cleaned_text, "go fast");
    }

    #[test]
    fn test_ip_url_host_is_not_a_domain() {
        let normalizer = MessageNormalizer::new();
        let result = normalizer.normalize("Click http://192.168.1.100/verify now");
        assert_eq!(result.entities.urls, set(&["http://192.168.1.100/verify"]));
        assert!(result.entities.domains.is_empty());
        assert!(result.entities.ips.is_empty());
    }

    #[test]
    fn test_ips_with_port() {
        let normalizer = MessageNormalizer::new();
        let result = normalizer.normalize("input text here 192.168.12.1:8080 or 192.168.12.2.");

        assert_eq!(result.cleaned_text, "input text");
        assert_eq!(result.entities.ips, set(&["192.168.12.1:8080", "192.168.12.2"]));
        assert!(result.entities.urls.is_empty());
        assert!(result.entities.domains.is_empty());
    }

    #[test]
    fn test_out_of_range_octets_are_not_ips() {
        let normalizer = MessageNormalizer::new();

        let result = normalizer.normalize("Also 999.999.999.999. and 192.168.1.256");
        assert!(result.entities.ips.is_empty());
        assert_eq!(result.cleaned_text, "also 999999999999 1921681256");
    }

    #[test]
    fn test_invalid_entities_stay_in_text() {
        let normalizer = MessageNormalizer::new();
        let result = normalizer.normalize("test@.com fake.invalidtld");

        assert!(result.entities.is_empty());
        assert_eq!(result.cleaned_text, "testcom fakeinvalidtld");
    }

    #[test]
    fn test_ip_matcher_rejects_trailing_digit() {
        let matcher = IpMatcher::new();
        assert_eq!(matcher.count("10.0.0.1"), 1);
        assert_eq!(matcher.count("10.0.0.300"), 0);
        assert_eq!(matcher.count("1.2.3.4:123456"), 1);
        assert_eq!(matcher.count("192.168.22.22, 209.122.28.10"), 2);
    }

    #[test]
    fn test_cleaned_text_has_no_entities_or_punctuation() {
        let normalizer = MessageNormalizer::new();
        let text = "URGENT!!! Verify your account at http://evil.example.com/login, \
                    reply to boss@corp.example.com or call 10.1.2.3.";
        let result = normalizer.normalize(text);

        for forbidden in ["http", "evil", "boss@", "10123", "!", ",", "."] {
            assert!(
                !result.cleaned_text.contains(forbidden),
                "cleaned text {:?} contains {:?}",
                result.cleaned_text,
                forbidden
            );
        }
        assert_eq!(result.cleaned_text, "urgent verifi account repli call");
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let normalizer = MessageNormalizer::new();
        let text = "Dear user, visit www.shop.sg and mail a@b.com or 8.8.8.8 TODAY";
        assert_eq!(normalizer.normalize(text), normalizer.normalize(text));
    }
}
