//! Leaderboard sample sources.
//!
//! A source delivers one validated raw sample per call. Anything that is not
//! a well-formed `{ "tops": [...] }` envelope with at least one gang is
//! rejected here, before it can reach the tracker.

use crate::config::SourceConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::models::{Leaderboard, RawGang};
use chrono::Utc;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Parse and validate a leaderboard response body.
pub fn parse_leaderboard(body: &str) -> TrackerResult<Vec<RawGang>> {
    let board: Leaderboard = serde_json::from_str(body)
        .map_err(|e| TrackerError::MalformedSample(format!("invalid leaderboard JSON: {}", e)))?;

    if board.tops.is_empty() {
        return Err(TrackerError::MalformedSample(
            "leaderboard contains no gangs".to_string(),
        ));
    }

    Ok(board.tops)
}

/// Whether a response is an HTML page rather than the JSON API.
fn looks_like_html(content_type: &str, body: &str) -> bool {
    let head = body.trim_start();
    content_type.contains("text/html")
        || head.starts_with("<!DOCTYPE html")
        || head.starts_with("<!doctype html")
        || head.starts_with("<html")
}

/// Fetches the leaderboard over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    client: reqwest::Client,
    timeout_seconds: u64,
    retries: usize,
    retry_delay: Duration,
}

impl HttpSource {
    pub fn new(config: &SourceConfig) -> TrackerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            url: config.url.clone(),
            client,
            timeout_seconds: config.timeout_seconds,
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch one sample, retrying while the site serves an HTML interstitial.
    pub async fn fetch(&self) -> TrackerResult<Vec<RawGang>> {
        for attempt in 0..=self.retries {
            if attempt > 0 {
                debug!("Retrying leaderboard fetch ({}/{})", attempt, self.retries);
                tokio::time::sleep(self.retry_delay).await;
            }

            let (content_type, body) = self.request().await?;

            if looks_like_html(&content_type, &body) {
                warn!("Leaderboard returned an HTML page instead of JSON");
                continue;
            }

            let gangs = parse_leaderboard(&body)?;
            info!("Fetched {} gangs from {}", gangs.len(), self.url);
            return Ok(gangs);
        }

        Err(TrackerError::Fetch(format!(
            "{} kept returning HTML after {} attempts",
            self.url,
            self.retries + 1
        )))
    }

    async fn request(&self) -> TrackerResult<(String, String)> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("_", Utc::now().timestamp_millis())])
            .header(ACCEPT, "application/json, text/plain, */*")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TrackerError::Fetch(format!(
                        "request timed out after {}s",
                        self.timeout_seconds
                    ))
                } else if e.is_connect() {
                    TrackerError::Fetch(format!("cannot connect to {}", self.url))
                } else {
                    TrackerError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(TrackerError::Fetch(format!(
                "leaderboard API error {}: {}",
                status, preview
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await?;

        Ok((content_type, body))
    }
}

/// Reads the leaderboard envelope from a local JSON file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn fetch(&self) -> TrackerResult<Vec<RawGang>> {
        let body = tokio::fs::read_to_string(&self.path).await?;
        let gangs = parse_leaderboard(&body)?;
        debug!("Read {} gangs from {}", gangs.len(), self.path.display());
        Ok(gangs)
    }
}

/// Where samples come from.
#[derive(Debug, Clone)]
pub enum SampleSource {
    Http(HttpSource),
    File(FileSource),
}

impl SampleSource {
    pub async fn fetch(&self) -> TrackerResult<Vec<RawGang>> {
        match self {
            SampleSource::Http(source) => source.fetch().await,
            SampleSource::File(source) => source.fetch().await,
        }
    }

    /// Human-readable origin, for logs.
    pub fn describe(&self) -> String {
        match self {
            SampleSource::Http(source) => source.url().to_string(),
            SampleSource::File(source) => source.path.display().to_string(),
        }
    }
}
