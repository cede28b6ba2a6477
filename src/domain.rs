/// Hostname normalization and matching for domain rules, blacklist and exclusions
use url::Url;

/// Hosts whose feeds insert media while scrolling.
pub const INFINITE_SCROLL_HOSTS: [&str; 7] = [
    "reddit.com",
    "twitter.com",
    "x.com",
    "tiktok.com",
    "instagram.com",
    "facebook.com",
    "linkedin.com",
];

/// The page a speed is being resolved for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    /// Lower-cased hostname without port
    pub hostname: String,
    /// Lower-cased full URL, used for exclusion patterns
    pub url: String,
}

impl PageContext {
    pub fn parse(url: &str) -> Option<PageContext> {
        let parsed = Url::parse(url.trim()).ok()?;
        let hostname = parsed.host_str()?.to_lowercase();
        if hostname.is_empty() {
            return None;
        }
        Some(PageContext {
            hostname,
            url: url.trim().to_lowercase(),
        })
    }
}

/// Only http(s) pages get speed control.
pub fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

pub fn normalize_domain(domain: &str) -> String {
    domain.trim().to_lowercase()
}

pub fn strip_www(domain: &str) -> &str {
    domain.strip_prefix("www.").unwrap_or(domain)
}

/// Exact, case-insensitive equality.
pub fn matches_exactly(rule_domain: &str, hostname: &str) -> bool {
    normalize_domain(rule_domain) == normalize_domain(hostname)
}

/// `www.`-insensitive equality, or hostname is a subdomain of the rule.
pub fn matches_loosely(rule_domain: &str, hostname: &str) -> bool {
    let rule = normalize_domain(rule_domain);
    let host = normalize_domain(hostname);
    let rule_bare = strip_www(&rule);

    if rule_bare.is_empty() {
        return false;
    }

    strip_www(&host) == rule_bare || host.ends_with(&format!(".{}", rule_bare))
}

pub fn hostname_matches(rule_domain: &str, hostname: &str) -> bool {
    matches_exactly(rule_domain, hostname) || matches_loosely(rule_domain, hostname)
}

/// Find the first rule whose domain matches `hostname`.
///
/// All rules are tried for an exact match first; only then is the loose
/// (www / subdomain) comparison applied, again in stored order.
pub fn find_matching<'a, T>(
    rules: &'a [T],
    hostname: &str,
    domain_of: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    rules
        .iter()
        .find(|rule| matches_exactly(domain_of(rule), hostname))
        .or_else(|| {
            rules
                .iter()
                .find(|rule| matches_loosely(domain_of(rule), hostname))
        })
}

pub fn is_infinite_scroll_site(hostname: &str, hosts: &[String]) -> bool {
    hosts.iter().any(|site| hostname_matches(site, hostname))
}
