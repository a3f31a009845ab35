//! API client for the RESAS open-data REST API.
//!
//! This module provides the `ApiClient` struct for fetching the prefecture
//! directory and per-prefecture population composition series.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::HeaderValue;
use reqwest::{Client, Request};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, warn};

use crate::models::{CachedSeries, Category, CompositionResult, Region};
use crate::orchestrator::PopulationSource;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

const API_KEY_HEADER: &str = "X-API-KEY";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
/// Never shorter than the API's one-request-per-second allowance.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Every RESAS response is wrapped in this envelope. Failures may arrive
/// with HTTP 200 and a `statusCode` in the body instead of a `result`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "statusCode", default)]
    status_code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    result: Option<T>,
}

fn status_code_of(value: &serde_json::Value) -> Option<u16> {
    match value {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        _ => None,
    }
}

/// API client for RESAS.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    endpoint: String,
    api_key: Option<HeaderValue>,
}

impl ApiClient {
    /// Create a new API client. A missing key is allowed; every request
    /// will then fail with an authorization error from the server.
    pub fn new(endpoint: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        let api_key = match api_key {
            Some(key) => {
                let mut value = HeaderValue::from_str(key.trim())
                    .context("API key contains characters not allowed in a header")?;
                value.set_sensitive(true);
                Some(value)
            }
            None => None,
        };

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.get(format!("{}{}", self.endpoint, path));
        match self.api_key {
            Some(ref key) => builder.header(API_KEY_HEADER, key.clone()),
            None => builder,
        }
    }

    pub fn prefectures_request(&self) -> reqwest::Result<Request> {
        self.get("/prefectures").build()
    }

    pub fn composition_request(&self, pref_code: u32) -> reqwest::Result<Request> {
        self.get("/population/composition/perYear")
            .query(&[("prefCode", pref_code.to_string()), ("cityCode", "-".to_string())])
            .build()
    }

    /// Unwrap a RESAS envelope into its `result`, classifying embedded errors.
    fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
        let envelope: Envelope<T> = match serde_json::from_str(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Some error responses are a bare status string such as "400".
                if let Ok(code) = serde_json::from_str::<String>(body) {
                    if let Ok(code) = code.parse::<u16>() {
                        return Err(ApiError::from_code(code, body));
                    }
                }
                return Err(ApiError::InvalidResponse(format!("Failed to parse response: {}", e)));
            }
        };

        if let Some(result) = envelope.result {
            return Ok(result);
        }

        let message = envelope.message.unwrap_or_default();
        match envelope.status_code.as_ref().and_then(status_code_of) {
            Some(code) => Err(ApiError::from_code(code, &message)),
            None if message.is_empty() => Err(ApiError::InvalidResponse("Missing result".to_string())),
            None => Err(ApiError::InvalidResponse(message)),
        }
    }

    /// Send a GET built by `build`, retrying while the server reports
    /// rate limiting.
    async fn fetch_result<T, F>(&self, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::Result<Request>,
    {
        let build = &build;
        with_rate_limit_retry(|| async move {
            let request = build()?;
            debug!(path = request.url().path(), "GET");
            let response = self.client.execute(request).await?;
            let status = response.status();
            let body = response.text().await?;

            if status.is_success() {
                Self::parse_envelope::<T>(&body)
            } else {
                Err(ApiError::from_status(status, &body))
            }
        })
        .await
    }

    // ===== Data Fetching Methods =====

    /// Fetch the prefecture directory
    pub async fn try_fetch_prefectures(&self) -> Result<Vec<Region>, ApiError> {
        let regions: Vec<Region> = self.fetch_result(|| self.prefectures_request()).await?;
        debug!(count = regions.len(), "Prefectures fetched");
        Ok(regions)
    }

    /// Fetch all four composition series for one prefecture
    pub async fn try_fetch_composition(&self, pref_code: u32) -> Result<CompositionResult, ApiError> {
        self.fetch_result(|| self.composition_request(pref_code)).await
    }

    /// Fetch one category's series for one prefecture
    pub async fn try_fetch_population(
        &self,
        pref_code: u32,
        pref_name: &str,
        category: Category,
    ) -> Result<CachedSeries, ApiError> {
        let composition = self.try_fetch_composition(pref_code).await?;
        extract_series(&composition, pref_name, category)
    }

    /// Fetch the prefecture directory, logging and returning an empty list on failure.
    pub async fn fetch_prefectures(&self) -> Vec<Region> {
        match self.try_fetch_prefectures().await {
            Ok(regions) => regions,
            Err(e) => {
                warn!(error = %e, "Error fetching prefectures");
                Vec::new()
            }
        }
    }

    /// Fetch one series, logging and returning `None` on failure.
    pub async fn fetch_population(
        &self,
        pref_code: u32,
        pref_name: &str,
        category: Category,
    ) -> Option<CachedSeries> {
        match self.try_fetch_population(pref_code, pref_name, category).await {
            Ok(series) => Some(series),
            Err(e) => {
                warn!(pref_code, error = %e, "Error fetching population data");
                None
            }
        }
    }
}

/// Run `attempt` until it succeeds or fails with something other than rate
/// limiting. Retries up to `MAX_RATE_LIMIT_RETRIES` times, doubling the
/// backoff from `INITIAL_BACKOFF_MS`.
async fn with_rate_limit_retry<T, F, Fut>(mut attempt: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut retries = 0;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        match attempt().await {
            Err(e) if e.is_rate_limited() => {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(e);
                }
                warn!(retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2; // Exponential backoff
            }
            other => return other,
        }
    }
}

/// Pick the series for `category` out of a composition response.
pub fn extract_series(
    composition: &CompositionResult,
    pref_name: &str,
    category: Category,
) -> Result<CachedSeries, ApiError> {
    let series = composition.series(category).ok_or_else(|| {
        ApiError::InvalidResponse(format!("No series at index {} ({})", category.index(), category))
    })?;

    if !series.label.is_empty() && series.label != category.label() {
        warn!(
            expected = category.label(),
            actual = %series.label,
            "Composition label does not match category"
        );
    }

    Ok(CachedSeries {
        region_name: pref_name.to_string(),
        points: series.data.clone(),
        category,
        boundary_year: composition.boundary_year,
    })
}

impl PopulationSource for ApiClient {
    async fn prefectures(&self) -> Vec<Region> {
        self.fetch_prefectures().await
    }

    async fn population(&self, region: &Region, category: Category) -> Option<CachedSeries> {
        self.fetch_population(region.code, &region.name, category).await
    }
}

// ============================================================================
// Tests
// ============================================================================
