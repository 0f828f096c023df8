use serde::Serialize;
use std::time::Duration;

pub mod inspect;
pub mod patterns;
pub mod scan;
pub mod urls;

/// Transport-level failure reported by a [`FetchBackend`] implementation.
///
/// Backends do not know the original target of a scan (redirect chains start
/// elsewhere); the scanner wraps these into [`ScanError`] with provenance.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Other(String),
}

/// Terminal failure of one scan. Every variant carries the originally
/// requested URL and, when the response headers were seen, the last
/// successfully fetched URL, so callers can report provenance on failure.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("Request timed out")]
    NetworkTimeout {
        original_url: String,
        last_fetched_url: Option<String>,
    },
    #[error("Server responded with status: {status}")]
    InvalidStatus {
        status: u16,
        original_url: String,
        last_fetched_url: Option<String>,
    },
    #[error("Invalid content type")]
    InvalidContentType {
        content_type: String,
        original_url: String,
        last_fetched_url: Option<String>,
    },
    #[error("Received response without body (status: {status})")]
    MissingBody {
        status: u16,
        original_url: String,
        last_fetched_url: Option<String>,
    },
    #[error("Bot challenge detected")]
    BotChallenge {
        original_url: String,
        last_fetched_url: Option<String>,
    },
    #[error("Fetch failed: {message}")]
    Fetch {
        message: String,
        original_url: String,
        last_fetched_url: Option<String>,
    },
}

impl ScanError {
    /// The URL the scan was originally asked to check.
    pub fn original_url(&self) -> &str {
        match self {
            Self::NetworkTimeout { original_url, .. }
            | Self::InvalidStatus { original_url, .. }
            | Self::InvalidContentType { original_url, .. }
            | Self::MissingBody { original_url, .. }
            | Self::BotChallenge { original_url, .. }
            | Self::Fetch { original_url, .. } => original_url,
        }
    }

    /// The last URL whose response headers were received, if any.
    pub fn last_fetched_url(&self) -> Option<&str> {
        match self {
            Self::NetworkTimeout {
                last_fetched_url, ..
            }
            | Self::InvalidStatus {
                last_fetched_url, ..
            }
            | Self::InvalidContentType {
                last_fetched_url, ..
            }
            | Self::MissingBody {
                last_fetched_url, ..
            }
            | Self::BotChallenge {
                last_fetched_url, ..
            }
            | Self::Fetch {
                last_fetched_url, ..
            } => last_fetched_url.as_deref(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// One HTTP attempt as the scanner sees it. The first attempt of a scan uses
/// manual redirect mode; the cookie-replay re-fetch sets `follow_redirects`.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub follow_redirects: bool,
    /// `Cookie` header value replayed from a prior response's `Set-Cookie`.
    pub cookie: Option<String>,
    /// Deadline for the whole attempt, including the body read.
    pub timeout_ms: u64,
}

impl FetchRequest {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Response surface the scanner consumes: status, the headers it cares
/// about, and a chunk-producing body. `body` is `None` when the transport
/// has no readable body to offer.
pub struct FetchedResponse {
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub set_cookie: Vec<String>,
    pub body: Option<Box<dyn BodyStream>>,
}

/// Chunk-by-chunk body reader. Dropping the stream cancels the underlying
/// read and releases the connection; the scanner relies on this on every
/// early-exit path.
#[async_trait::async_trait]
pub trait BodyStream: Send {
    /// Next raw chunk, or `None` at end of stream.
    async fn next_chunk(&mut self) -> std::result::Result<Option<Vec<u8>>, FetchError>;
}

#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> std::result::Result<FetchedResponse, FetchError>;
}

/// Terminal output of one scan; immutable once constructed. Serializes to
/// the wire shape callers expect (`url`, `lastFetchedUrl`, `isAstro`,
/// `mechanism`, optional `astroVersion`/`starlightVersion`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub url: String,
    pub last_fetched_url: String,
    pub is_astro: bool,
    pub mechanism: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub astro_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starlight_version: Option<String>,
}

/// Versions discovered from generator meta tags during one fetch attempt.
/// First non-empty version per framework wins; later tags are ignored.
#[derive(Debug, Clone, Default)]
pub struct GeneratorVersions {
    pub astro: Option<String>,
    pub starlight: Option<String>,
}

impl GeneratorVersions {
    pub fn any_found(&self) -> bool {
        self.astro.is_some() || self.starlight.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Per-attempt deadline in milliseconds (re-armed for the cookie-replay
    /// re-fetch and for every redirect hop).
    pub timeout_ms: u64,
    /// Maximum meta-refresh hops to follow; beyond this, refresh targets
    /// are ignored and the current page is scanned normally.
    pub max_redirects: u32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            max_redirects: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_serializes_to_camel_case_and_omits_unset_versions() {
        let v = Verdict {
            url: "https://example.com".to_string(),
            last_fetched_url: "https://example.com/".to_string(),
            is_astro: true,
            mechanism: "Found generator meta tag".to_string(),
            astro_version: Some("4.2.0".to_string()),
            starlight_version: None,
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["isAstro"], true);
        assert_eq!(json["lastFetchedUrl"], "https://example.com/");
        assert_eq!(json["astroVersion"], "4.2.0");
        assert!(json.get("starlightVersion").is_none());
    }

    #[test]
    fn scan_error_exposes_provenance() {
        let err = ScanError::InvalidStatus {
            status: 503,
            original_url: "https://a.example".to_string(),
            last_fetched_url: Some("https://b.example".to_string()),
        };
        assert_eq!(err.original_url(), "https://a.example");
        assert_eq!(err.last_fetched_url(), Some("https://b.example"));
        assert_eq!(err.to_string(), "Server responded with status: 503");
    }
}
