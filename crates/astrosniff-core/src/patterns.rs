//! Fixed catalogue of Astro markup fingerprints plus the auxiliary page
//! controls the scanner reacts to (generator meta tag, meta refresh,
//! closing head tag, bot-challenge interstitials).
//!
//! Everything here is pure and idempotent on growing buffers: re-running a
//! check on a superset string can only add matches, never remove them.

use regex::Regex;
use std::sync::LazyLock;

/// `<meta name="generator" content="...">`, either attribute order.
static META_GENERATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?i)<meta\s[^>]*?"#,
        r#"(?:name\s*=\s*["']generator["'][^>]*?content\s*=\s*["']([^"']*)["']"#,
        r#"|content\s*=\s*["']([^"']*)["'][^>]*?name\s*=\s*["']generator["'])"#,
    ))
    .unwrap()
});

/// `<meta http-equiv="refresh" content="N; url=...">`. Any numeric delay is
/// accepted; the target may be bare or quoted inside the content value.
static META_REFRESH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?i)<meta\s[^>]*?http-equiv\s*=\s*["']refresh["'][^>]*?"#,
        r#"content\s*=\s*["']\s*\d+(?:\.\d+)?\s*;\s*url\s*=\s*['"]?([^"'>\s]+)"#,
    ))
    .unwrap()
});

/// Closing head tag, tolerant of whitespace before `>`.
static END_OF_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</head\s*>").unwrap());

/// Markup signatures of anti-bot interstitials (Cloudflare, DDoS-Guard,
/// Vercel, PerimeterX). Served instead of real content, so scanning past
/// them is pointless.
static BOT_CHALLENGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)(?:just a moment|checking your browser|cf-browser-verification",
        r"|challenge-platform|_cf_chl_opt|cf-turnstile|ddos-guard",
        r"|vercel security checkpoint|px-captcha)",
    ))
    .unwrap()
});

static DATA_ASTRO_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)data-astro-cid-[0-9a-z]").unwrap());

static ASTRO_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)class\s*=\s*["'][^"']*\bastro-cid-"#).unwrap());

static ASTRO_ASSET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/_astro/").unwrap());

static ASTRO_ISLAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<astro-island").unwrap());

static STYLE_WHERE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":where\(\s*\.astro-").unwrap());

static STYLE_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[data-astro-cid-").unwrap());

/// Which document region a marker check applies to. `Any` is the union used
/// by the end-of-stream fallback when the head never closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerScope {
    Head,
    Body,
    Any,
}

/// One entry of the marker catalogue: a pattern, its human-readable label
/// (used verbatim in verdict mechanism text), and its applicability.
pub struct MarkerCheck {
    pattern: &'static LazyLock<Regex>,
    pub label: &'static str,
    in_head: bool,
    in_body: bool,
}

impl MarkerCheck {
    pub fn matches(&self, fragment: &str) -> bool {
        self.pattern.is_match(fragment)
    }

    pub fn applies(&self, scope: MarkerScope) -> bool {
        match scope {
            MarkerScope::Head => self.in_head,
            MarkerScope::Body => self.in_body,
            MarkerScope::Any => true,
        }
    }
}

/// The ordered marker catalogue. Order is part of the contract: mechanism
/// text lists labels in this order.
pub static CATALOGUE: &[MarkerCheck] = &[
    MarkerCheck {
        pattern: &DATA_ASTRO_ATTR_RE,
        label: "data-astro-cid attribute",
        in_head: true,
        in_body: true,
    },
    MarkerCheck {
        pattern: &ASTRO_CLASS_RE,
        label: "astro-cid- class",
        in_head: false,
        in_body: true,
    },
    MarkerCheck {
        pattern: &ASTRO_ASSET_RE,
        label: "_astro/ asset reference",
        in_head: true,
        in_body: true,
    },
    MarkerCheck {
        pattern: &ASTRO_ISLAND_RE,
        label: "astro-island element",
        in_head: false,
        in_body: true,
    },
    MarkerCheck {
        pattern: &STYLE_WHERE_RE,
        label: ":where(.astro-...) usage",
        in_head: true,
        in_body: false,
    },
    MarkerCheck {
        pattern: &STYLE_ATTR_RE,
        label: "data-astro-cid- usage",
        in_head: true,
        in_body: false,
    },
];

/// All generator meta tag `content` values in the fragment, in order.
pub fn generator_tag_contents(fragment: &str) -> Vec<&str> {
    META_GENERATOR_RE
        .captures_iter(fragment)
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)))
        .map(|m| m.as_str())
        .collect()
}

/// Raw target of the first meta-refresh tag in the fragment, if any.
pub fn meta_refresh_target(fragment: &str) -> Option<&str> {
    META_REFRESH_RE
        .captures(fragment)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
}

/// Byte offset just past the closing head tag, if present.
pub fn end_of_head(fragment: &str) -> Option<usize> {
    END_OF_HEAD_RE.find(fragment).map(|m| m.end())
}

pub fn is_bot_challenge(fragment: &str) -> bool {
    BOT_CHALLENGE_RE.is_match(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_tag_both_attribute_orders() {
        let html = r#"<meta name="generator" content="Astro v4.2.0">"#;
        assert_eq!(generator_tag_contents(html), vec!["Astro v4.2.0"]);

        let reversed = r#"<meta content="Starlight v0.29.0" name="generator">"#;
        assert_eq!(generator_tag_contents(reversed), vec!["Starlight v0.29.0"]);
    }

    #[test]
    fn generator_tag_collects_multiple() {
        let html = concat!(
            r#"<meta name="generator" content="Astro 2.0">"#,
            "\n\t ",
            r#"<meta name="generator" content="Starlight 1.5">"#,
        );
        assert_eq!(generator_tag_contents(html), vec!["Astro 2.0", "Starlight 1.5"]);
    }

    #[test]
    fn generator_tag_ignores_other_meta() {
        let html = r#"<meta name="description" content="Astro is great">"#;
        assert!(generator_tag_contents(html).is_empty());
    }

    #[test]
    fn meta_refresh_accepts_any_delay_and_quoting() {
        assert_eq!(
            meta_refresh_target(r#"<meta http-equiv="refresh" content="0; url=/next">"#),
            Some("/next"),
        );
        assert_eq!(
            meta_refresh_target(r#"<meta http-equiv="REFRESH" content="5;URL='https://b.example/'">"#),
            Some("https://b.example/"),
        );
        assert_eq!(
            meta_refresh_target(r#"<meta http-equiv="refresh" content="1.5; url = /slow">"#),
            Some("/slow"),
        );
    }

    #[test]
    fn meta_refresh_requires_a_target() {
        // A plain page-reload refresh has no url= part and is not a redirect.
        assert_eq!(
            meta_refresh_target(r#"<meta http-equiv="refresh" content="30">"#),
            None,
        );
    }

    #[test]
    fn end_of_head_tolerates_whitespace_and_case() {
        let html = "<head><title>x</title></HEAD >leftover";
        let end = end_of_head(html).unwrap();
        assert_eq!(&html[end..], "leftover");
        assert_eq!(end_of_head("<head>never closed"), None);
    }

    #[test]
    fn bot_challenge_signatures() {
        assert!(is_bot_challenge("<title>Just a moment...</title>"));
        assert!(is_bot_challenge(r#"<div id="challenge-platform">"#));
        assert!(is_bot_challenge("window._cf_chl_opt = {}"));
        assert!(!is_bot_challenge("<h1>Welcome to my blog</h1>"));
    }

    #[test]
    fn catalogue_scopes_partition_as_documented() {
        let head: Vec<&str> = CATALOGUE
            .iter()
            .filter(|c| c.applies(MarkerScope::Head))
            .map(|c| c.label)
            .collect();
        assert_eq!(
            head,
            vec![
                "data-astro-cid attribute",
                "_astro/ asset reference",
                ":where(.astro-...) usage",
                "data-astro-cid- usage",
            ],
        );

        let body: Vec<&str> = CATALOGUE
            .iter()
            .filter(|c| c.applies(MarkerScope::Body))
            .map(|c| c.label)
            .collect();
        assert_eq!(
            body,
            vec![
                "data-astro-cid attribute",
                "astro-cid- class",
                "_astro/ asset reference",
                "astro-island element",
            ],
        );

        assert!(CATALOGUE.iter().all(|c| c.applies(MarkerScope::Any)));
    }

    #[test]
    fn marker_patterns_match_representative_markup() {
        assert!(DATA_ASTRO_ATTR_RE.is_match(r#"<div data-astro-cid-abcd1234>"#));
        assert!(ASTRO_CLASS_RE.is_match(r#"<div class="hero astro-cid-abcd1234">"#));
        assert!(ASTRO_ASSET_RE.is_match(r#"<script src="/_astro/main.Bx4.js"></script>"#));
        assert!(ASTRO_ISLAND_RE.is_match(r#"<astro-island component-url="/_astro/C.js">"#));
        assert!(STYLE_WHERE_RE.is_match("<style>:where(.astro-xyz){color:red}</style>"));
        assert!(STYLE_ATTR_RE.is_match("<style>[data-astro-cid-xyz]{margin:0}</style>"));

        assert!(!ASTRO_CLASS_RE.is_match(r#"<div class="astronomy">"#));
        assert!(!DATA_ASTRO_ATTR_RE.is_match("plain text about astro"));
    }
}
