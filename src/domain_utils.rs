use crate::rules::levenshtein;

/// Host-name helpers shared by extraction and scoring
pub struct DomainUtils;

impl DomainUtils {
    /// Lower-cased host part of an address; a trailing `>` is dropped
    pub fn extract_domain(address: &str) -> Option<String> {
        let (_, host) = address.rsplit_once('@')?;
        let host = host.trim_end_matches('>').trim();
        (!host.is_empty()).then(|| host.to_lowercase())
    }

    /// Exact, case-insensitive membership. `mail.gov.sg` is not covered by `gov.sg`.
    pub fn is_listed(domain: &str, listed: &[String]) -> bool {
        listed.iter().any(|entry| entry.eq_ignore_ascii_case(domain))
    }

    pub fn strip_www(host: &str) -> String {
        let host = host.to_lowercase();
        match host.strip_prefix("www.") {
            Some(rest) => rest.to_string(),
            None => host,
        }
    }

    /// Closest listed domain by edit distance; ties go to the earlier entry
    pub fn nearest<'a>(domain: &str, listed: &'a [String]) -> Option<(&'a str, usize)> {
        listed
            .iter()
            .map(|entry| (entry.as_str(), levenshtein(domain, entry)))
            .min_by_key(|(_, distance)| *distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed() -> Vec<String> {
        vec!["gov.sg".to_string(), "dbs.com.sg".to_string(), "paypal.com".to_string()]
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(DomainUtils::extract_domain("a@Gov.SG"), Some("gov.sg".to_string()));
        assert_eq!(DomainUtils::extract_domain("<Alerts@Bank.COM>"), Some("bank.com".to_string()));
        assert_eq!(DomainUtils::extract_domain("odd@user@evil.com"), Some("evil.com".to_string()));
        assert_eq!(DomainUtils::extract_domain("trailing@"), None);
        assert_eq!(DomainUtils::extract_domain("no-at-sign"), None);
    }

    #[test]
    fn test_is_listed() {
        let listed = listed();
        assert!(DomainUtils::is_listed("DBS.com.sg", &listed));
        assert!(!DomainUtils::is_listed("moh.gov.sg", &listed));
        assert!(!DomainUtils::is_listed("g0v.sg", &listed));
    }

    #[test]
    fn test_strip_www() {
        assert_eq!(DomainUtils::strip_www("WWW.Shopee.sg"), "shopee.sg");
        assert_eq!(DomainUtils::strip_www("wwwx.sg"), "wwwx.sg");
    }

    #[test]
    fn test_nearest() {
        let listed = listed();
        assert_eq!(DomainUtils::nearest("paypa1.com", &listed), Some(("paypal.com", 1)));
        assert_eq!(DomainUtils::nearest("gov.sg", &listed), Some(("gov.sg", 0)));
        assert_eq!(DomainUtils::nearest("x.sg", &[]), None);
    }
}
