//! Pure inspection of accumulated HTML fragments: generator version
//! extraction, marker discovery, and meta-refresh target resolution.
//!
//! Every function here is side-effect free and safe to re-run on the same
//! (or a grown) buffer; the caller owns all accumulation state.

use crate::patterns::{self, MarkerScope};
use crate::GeneratorVersions;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static ASTRO_CONTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^astro\b\s*(.*)$").unwrap());

static STARLIGHT_CONTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^starlight\b\s*(.*)$").unwrap());

/// Scans `fragment` for generator meta tags and records the first non-empty
/// Astro/Starlight version seen into `versions` (later tags for an already
/// recorded framework are ignored). Returns whether at least one generator
/// tag was present, regardless of whether it named a known framework.
///
/// `fragment` is the cumulative buffer, so a tag split across chunk
/// boundaries is picked up once the closing quote arrives.
pub fn extract_generator_versions(fragment: &str, versions: &mut GeneratorVersions) -> bool {
    let mut found_any = false;
    for content in patterns::generator_tag_contents(fragment) {
        found_any = true;
        let content = content.trim();
        debug!(content, "generator meta tag");

        if let Some(cap) = ASTRO_CONTENT_RE.captures(content) {
            let version = cap[1].trim();
            if versions.astro.is_none() && !version.is_empty() {
                versions.astro = Some(version.to_string());
            }
        } else if let Some(cap) = STARLIGHT_CONTENT_RE.captures(content) {
            let version = cap[1].trim();
            if versions.starlight.is_none() && !version.is_empty() {
                versions.starlight = Some(version.to_string());
            }
        }
    }
    found_any
}

/// Evaluates every catalogue check applicable in `scope` against `fragment`,
/// in catalogue order, without short-circuiting: simultaneous markers are
/// all reported.
pub fn find_markers(fragment: &str, scope: MarkerScope) -> Vec<&'static str> {
    let mut markers = Vec::new();
    for check in patterns::CATALOGUE {
        if check.applies(scope) && check.matches(fragment) {
            debug!(marker = check.label, ?scope, "marker matched");
            markers.push(check.label);
        }
    }
    markers
}

/// Resolves the first meta-refresh target in `fragment` against `base_url`.
/// Relative paths are joined; an unresolvable target is treated as absent.
pub fn extract_redirect_target(fragment: &str, base_url: &str) -> Option<String> {
    let raw = patterns::meta_refresh_target(fragment)?.trim();
    let base = match url::Url::parse(base_url) {
        Ok(base) => base,
        Err(err) => {
            warn!(%err, base_url, "meta refresh found but base url is unparseable");
            return None;
        }
    };
    match base.join(raw) {
        Ok(resolved) => {
            debug!(to = %resolved, "meta refresh target");
            Some(resolved.to_string())
        }
        Err(err) => {
            warn!(%err, raw, "unresolvable meta refresh target");
            None
        }
    }
}

/// English "and"-list join used for mechanism text: `a`, `a and b`,
/// `a, b, and c`.
pub fn format_list(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [only] => (*only).to_string(),
        [first, second] => format!("{first} and {second}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}
