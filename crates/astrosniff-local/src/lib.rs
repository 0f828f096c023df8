//! reqwest-backed [`FetchBackend`] for astrosniff.
//!
//! Holds two prebuilt clients: one with redirects disabled for the manual
//! first attempt of every scan, and one that follows redirects for the
//! single cookie-replay re-fetch. The per-attempt deadline is applied as
//! the total request timeout, so it covers the body read as well.

use astrosniff_core::{
    scan, BodyStream, FetchBackend, FetchError, FetchRequest, FetchedResponse, Result,
    ScanOptions, Verdict,
};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, SET_COOKIE};
use std::time::Duration;
use tracing::debug;

/// Browser-like identity; several CDNs serve challenge pages to anything
/// that looks like a bot UA.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    manual: reqwest::Client,
    following: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> std::result::Result<Self, FetchError> {
        let manual = Self::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| FetchError::Other(e.to_string()))?;
        let following = Self::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Other(e.to_string()))?;
        Ok(Self { manual, following })
    }

    fn builder() -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .gzip(true)
            .brotli(true)
            .connect_timeout(Duration::from_secs(10))
    }

    /// Runs one full scan of `url` over this transport.
    pub async fn check(&self, url: &str, opts: &ScanOptions) -> Result<Verdict> {
        scan::check_website(self, url, opts).await
    }
}

struct ReqwestBody {
    stream: BoxStream<'static, std::result::Result<Vec<u8>, FetchError>>,
}

#[async_trait::async_trait]
impl BodyStream for ReqwestBody {
    async fn next_chunk(&mut self) -> std::result::Result<Option<Vec<u8>>, FetchError> {
        self.stream.next().await.transpose()
    }
}

fn map_reqwest_err(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Other(err.to_string())
    }
}

#[async_trait::async_trait]
impl FetchBackend for HttpFetcher {
    async fn fetch(&self, req: &FetchRequest) -> std::result::Result<FetchedResponse, FetchError> {
        let client = if req.follow_redirects {
            &self.following
        } else {
            &self.manual
        };

        let mut rb = client
            .get(&req.url)
            .timeout(req.timeout())
            .header(ACCEPT, "text/html")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5");
        if let Some(cookie) = &req.cookie {
            rb = rb.header(COOKIE, cookie.as_str());
        }

        let resp = rb.send().await.map_err(map_reqwest_err)?;
        let final_url = resp.url().to_string();
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let set_cookie = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        debug!(%final_url, status, "response headers received");

        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(map_reqwest_err))
            .boxed();

        Ok(FetchedResponse {
            final_url,
            status,
            content_type,
            set_cookie,
            body: Some(Box::new(ReqwestBody { stream })),
        })
    }
}
