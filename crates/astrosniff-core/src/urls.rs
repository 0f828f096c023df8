//! URL normalization and the strict public-host validation applied to the
//! API route's query parameter.

use std::net::Ipv4Addr;
use url::{Host, Url};

/// Trims the input and assumes `https://` when no scheme is present.
pub fn normalize_target(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Whether `input` is an http(s) URL with a plausibly public host: either a
/// dotted domain with an alphabetic TLD, or a public IPv4 address.
/// Loopback, RFC1918, link-local, 0/8, and multicast/reserved ranges are
/// rejected so the scanner cannot be pointed at internal services.
pub fn is_valid_public_url(input: &str) -> bool {
    let Ok(url) = Url::parse(input) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    match url.host() {
        Some(Host::Ipv4(ip)) => is_public_ipv4(ip),
        Some(Host::Domain(domain)) => is_plausible_domain(domain),
        Some(Host::Ipv6(_)) | None => false,
    }
}

fn is_public_ipv4(ip: Ipv4Addr) -> bool {
    if ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
    {
        return false;
    }
    let first = ip.octets()[0];
    first != 0 && first < 224
}

fn is_plausible_domain(domain: &str) -> bool {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let tld = labels[labels.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_https_and_trims() {
        assert_eq!(normalize_target("  example.com "), "https://example.com");
        assert_eq!(normalize_target("http://example.com"), "http://example.com");
        assert_eq!(
            normalize_target("https://example.com/a"),
            "https://example.com/a"
        );
    }

    #[test]
    fn accepts_public_hosts() {
        assert!(is_valid_public_url("https://example.com"));
        assert!(is_valid_public_url("https://docs.astro.build/en/getting-started/"));
        assert!(is_valid_public_url("http://sub.domain.co.uk:8080/path?q=1"));
        assert!(is_valid_public_url("https://93.184.216.34/"));
        // IDNA hosts come out of the parser as punycode labels.
        assert!(is_valid_public_url("https://münchen.de"));
    }

    #[test]
    fn rejects_private_and_loopback_hosts() {
        assert!(!is_valid_public_url("https://127.0.0.1/"));
        assert!(!is_valid_public_url("http://10.0.0.8/"));
        assert!(!is_valid_public_url("http://172.20.1.1/"));
        assert!(!is_valid_public_url("http://192.168.1.1/"));
        assert!(!is_valid_public_url("http://169.254.0.5/"));
        assert!(!is_valid_public_url("http://0.0.0.0/"));
        assert!(!is_valid_public_url("http://224.0.0.1/"));
        assert!(!is_valid_public_url("http://localhost/"));
        assert!(!is_valid_public_url("http://[::1]/"));
    }

    #[test]
    fn rejects_non_http_schemes_and_garbage() {
        assert!(!is_valid_public_url("ftp://example.com/file"));
        assert!(!is_valid_public_url("not a url"));
        assert!(!is_valid_public_url("https://"));
        assert!(!is_valid_public_url("https://nodots"));
        assert!(!is_valid_public_url("https://example.123"));
        assert!(!is_valid_public_url("https://-bad-.example.com"));
    }
}
