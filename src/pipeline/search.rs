//! Image search: ask SerpApi's `google_images` engine for the topic and keep
//! the first result.
//!
//! Only `images_results[0].original` is used; there is no ranking, paging or
//! fallback to thumbnails. A response without results is a normal outcome
//! (`Ok(None)`) unless the service attached an `error` message, which is then
//! surfaced as the issue detail.

use crate::error::ImageIssue;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// One candidate image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchResult {
    /// Full-resolution image URL.
    pub original: String,
}

/// The subset of the SerpApi response we read.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    images_results: Option<Vec<SearchResult>>,
    #[serde(default)]
    error: Option<String>,
}

/// Query the image-search endpoint and return the first result, if any.
pub async fn first_image(
    endpoint: &str,
    api_key: &str,
    query: &str,
    timeout_secs: u64,
) -> Result<Option<SearchResult>, ImageIssue> {
    info!("Searching images for: {}", query);

    let unavailable = |detail: String| ImageIssue::SearchUnavailable {
        query: query.to_string(),
        detail,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| unavailable(e.to_string()))?;

    let response = client
        .get(endpoint)
        .query(&[("engine", "google_images"), ("q", query), ("api_key", api_key)])
        .send()
        .await
        .map_err(|e| unavailable(e.to_string()))?;

    let status = response.status();
    let body: SearchResponse = response
        .json()
        .await
        .map_err(|e| unavailable(format!("HTTP {status}: unreadable response: {e}")))?;

    interpret(status, body).map_err(unavailable)
}

/// Turn a decoded response into the first hit. A service error message wins
/// whenever no result comes back, so the caller sees why.
fn interpret(status: StatusCode, body: SearchResponse) -> Result<Option<SearchResult>, String> {
    if let Some(ref err) = body.error {
        debug!("Search service reported: {}", err);
    }
    match (pick_first(body.images_results), body.error) {
        (Some(hit), _) if status.is_success() => Ok(Some(hit)),
        (_, Some(err)) => Err(err),
        (_, None) if !status.is_success() => Err(format!("HTTP {status}")),
        (hit, None) => Ok(hit),
    }
}

fn pick_first(results: Option<Vec<SearchResult>>) -> Option<SearchResult> {
    results.and_then(|r| r.into_iter().next())
}
