//! Header-aware parsing of pasted email text.
//!
//! Pulls the headers that matter for phishing triage (subject, sender,
//! recipients, message id, date, reply-to) out of free text, strips routing
//! noise, and keeps the body readable. This is the comparatively expensive
//! path that `ResultCache` sits in front of.

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEmail {
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub message_id: Option<String>,
    pub date: Option<String>,
    pub reply_to: Option<String>,
    pub body: String,
}

impl ParsedEmail {
    /// Bare, lower-cased sender address (`"Name" <a@b.com>` -> `a@b.com`)
    pub fn sender_address(&self) -> Option<String> {
        self.from.as_deref().and_then(extract_address)
    }

    pub fn reply_to_address(&self) -> Option<String> {
        self.reply_to.as_deref().and_then(extract_address)
    }

    /// Structured, single-line rendering used for display
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(subject) = &self.subject {
            parts.push(format!("Subject: {subject}"));
        }
        if let Some(from) = &self.from {
            parts.push(format!("From: {from}"));
        }

        let recipients: Vec<String> = [("TO", &self.to), ("CC", &self.cc), ("BCC", &self.bcc)]
            .iter()
            .filter_map(|(label, value)| value.as_ref().map(|v| format!("{label}:{v}")))
            .collect();
        if !recipients.is_empty() {
            parts.push(format!("Recipients: {}", recipients.join(" | ")));
        }

        let mut forensic = Vec::new();
        if let Some(id) = &self.message_id {
            forensic.push(format!("ID:{id}"));
        }
        if let Some(date) = &self.date {
            forensic.push(format!("Date:{date}"));
        }
        if let Some(reply_to) = &self.reply_to {
            forensic.push(format!("ReplyTo:{reply_to}"));
        }
        if !forensic.is_empty() {
            parts.push(format!("Forensic: {}", forensic.join(" | ")));
        }

        if !self.body.is_empty() {
            parts.push("---".to_string());
            parts.push(self.body.clone());
        }

        parts
            .join("\n")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn extract_address(value: &str) -> Option<String> {
    let candidate = match (value.rfind('<'), value.rfind('>')) {
        (Some(start), Some(end)) if start < end => &value[start + 1..end],
        _ => value,
    };
    let candidate = candidate.trim().trim_matches(['"', '\'']);
    if candidate.contains('@') {
        Some(candidate.to_lowercase())
    } else {
        None
    }
}

fn header(name: &str) -> Regex {
    Regex::new(&format!(r"(?im)^[ \t]*{name}:[ \t]*(.+?)[ \t]*\r?$\n?")).unwrap()
}

pub struct HeaderParser {
    subject_patterns: Vec<Regex>,
    sender_patterns: Vec<Regex>,
    to_pattern: Regex,
    cc_pattern: Regex,
    bcc_pattern: Regex,
    message_id_pattern: Regex,
    date_pattern: Regex,
    reply_to_pattern: Regex,
    fallback_email: Regex,
    noise_headers: Vec<Regex>,
    quote_marker: Regex,
    mime_encoded_word: Regex,
    reply_prefix: Regex,
    angle_sender: Regex,
    surrounding_quotes: Regex,
}

impl HeaderParser {
    pub fn new() -> Self {
        Self {
            subject_patterns: vec![header("subject"), header("re"), header("fw"), header("fwd")],
            sender_patterns: vec![header("from"), header("sender")],
            to_pattern: header("to"),
            cc_pattern: header("cc"),
            bcc_pattern: header("bcc"),
            message_id_pattern: header("message-id"),
            date_pattern: header("date"),
            reply_to_pattern: header("reply-to"),
            fallback_email: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap(),
            noise_headers: [
                r"received",
                r"return-path",
                r"x-[a-z0-9-]+",
                r"content-type",
                r"content-transfer-encoding",
                r"mime-version",
                r"user-agent",
            ]
            .iter()
            .map(|name| Regex::new(&format!(r"(?im)^[ \t]*{name}:.*$\n?")).unwrap())
            .collect(),
            quote_marker: Regex::new(r"(?m)^[ \t]*>[ \t]*").unwrap(),
            mime_encoded_word: Regex::new(r"=\?.*?\?=").unwrap(),
            reply_prefix: Regex::new(r"(?i)^\s*(?:(?:re|fw|fwd):\s*)+").unwrap(),
            angle_sender: Regex::new(r"^(.*?)\s*<([^>]+)>\s*$").unwrap(),
            surrounding_quotes: Regex::new(r#"^["'](.*)["']$"#).unwrap(),
        }
    }

    /// Parse a pasted email. Never fails; absent headers are `None`.
    pub fn parse(&self, text: &str) -> ParsedEmail {
        let mut body = text.to_string();

        let subject = self
            .capture_first(&self.subject_patterns, text, &mut body)
            .map(|s| self.clean_subject(&s))
            .filter(|s| !s.is_empty());

        let from = self
            .capture_first(&self.sender_patterns, text, &mut body)
            .map(|s| self.clean_sender(&s))
            .filter(|s| !s.is_empty())
            .or_else(|| {
                self.fallback_email
                    .find(text)
                    .map(|m| m.as_str().to_string())
            });

        let to = self.capture(&self.to_pattern, text, &mut body);
        let cc = self.capture(&self.cc_pattern, text, &mut body);
        let bcc = self.capture(&self.bcc_pattern, text, &mut body);
        let message_id = self
            .capture(&self.message_id_pattern, text, &mut body)
            .map(|id| strip_non_printable(&id, ""));
        let date = self
            .capture(&self.date_pattern, text, &mut body)
            .map(|d| collapse_whitespace(&strip_non_printable(&d, " ")));
        let reply_to = self
            .capture(&self.reply_to_pattern, text, &mut body)
            .map(|r| self.clean_sender(&r));

        let parsed = ParsedEmail {
            subject,
            from,
            to: to.map(|v| self.clean_sender(&v)),
            cc: cc.map(|v| self.clean_sender(&v)),
            bcc: bcc.map(|v| self.clean_sender(&v)),
            message_id,
            date,
            reply_to,
            body: self.clean_body(&body),
        };

        log::debug!(
            "Parsed headers: subject={} from={} reply_to={} body={} chars",
            parsed.subject.is_some(),
            parsed.from.is_some(),
            parsed.reply_to.is_some(),
            parsed.body.len()
        );

        parsed
    }

    fn capture_first(&self, patterns: &[Regex], text: &str, body: &mut String) -> Option<String> {
        patterns
            .iter()
            .find_map(|pattern| self.capture(pattern, text, body))
    }

    /// First occurrence in the input text; the first occurrence is also
    /// removed from the working body
    fn capture(&self, pattern: &Regex, text: &str, body: &mut String) -> Option<String> {
        let value = pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())?;
        let remaining = pattern.replacen(body.as_str(), 1, "").into_owned();
        *body = remaining;
        Some(value)
    }

    fn clean_subject(&self, subject: &str) -> String {
        let subject = self.mime_encoded_word.replace_all(subject, "");
        let subject = self.reply_prefix.replace(&subject, "");
        collapse_whitespace(&strip_non_printable(&subject, " "))
    }

    fn clean_sender(&self, sender: &str) -> String {
        if let Some(caps) = self.angle_sender.captures(sender) {
            let name = caps.get(1).map_or("", |m| m.as_str()).trim();
            let email = caps.get(2).map_or("", |m| m.as_str()).trim();
            let name = self.surrounding_quotes.replace(name, "$1");
            let name = collapse_whitespace(&strip_non_printable(&name, " "));

            return match (name.is_empty(), email.is_empty()) {
                (false, false) => format!("{name} <{email}>"),
                (true, _) => email.to_string(),
                (false, true) => name,
            };
        }

        let sender = self.surrounding_quotes.replace(sender.trim(), "$1");
        collapse_whitespace(&strip_non_printable(&sender, " "))
    }

    fn clean_body(&self, body: &str) -> String {
        let mut body = body.to_string();
        for pattern in &self.noise_headers {
            body = pattern.replace_all(&body, "").into_owned();
        }
        let body = self.quote_marker.replace_all(&body, "");
        collapse_whitespace(&strip_non_printable(&body, " "))
    }
}

impl Default for HeaderParser {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_non_printable(text: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if (' '..='~').contains(&c) {
            out.push(c);
        } else {
            out.push_str(replacement);
        }
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
