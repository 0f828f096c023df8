//! The JSON API route: `GET /api/check?url=<target>`.
//!
//! Status mapping: 400 for a missing or invalid `url` parameter, 200 with
//! the verdict body on success, 500 with an error-shaped body on any scan
//! failure. Error bodies keep the verdict field names so clients can parse
//! one shape.

use astrosniff_core::{urls, ScanError, ScanOptions};
use astrosniff_local::HttpFetcher;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
struct AppState {
    fetcher: Arc<HttpFetcher>,
    opts: ScanOptions,
}

pub fn app(fetcher: HttpFetcher, opts: ScanOptions) -> Router {
    Router::new()
        .route("/api/check", get(check_route))
        .with_state(AppState {
            fetcher: Arc::new(fetcher),
            opts,
        })
}

pub async fn serve(addr: &str) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::new()?;
    let app = app(fetcher, ScanOptions::default());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn check_route(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(raw) = params.get("url") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing required query parameter: url" })),
        )
            .into_response();
    };

    let target = urls::normalize_target(raw);
    if !urls::is_valid_public_url(&target) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("URL: {target} is not a valid URL") })),
        )
            .into_response();
    }

    match state.fetcher.check(&target, &state.opts).await {
        Ok(verdict) => (StatusCode::OK, Json(verdict)).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(error_body(&err))).into_response(),
    }
}

/// Error-shaped JSON body for scan failures (also printed by `check` on
/// stdout so scripting against the CLI sees one shape).
pub fn error_body(err: &ScanError) -> serde_json::Value {
    json!({
        "isAstro": false,
        "mechanism": err.to_string(),
        "url": err.original_url(),
        "lastFetchedUrl": err.last_fetched_url(),
    })
}
