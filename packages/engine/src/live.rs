//! Live national grid-intensity feed client.
//!
//! One country (Great Britain) publishes a real-time intensity API. Calls
//! use a bounded timeout and fail open: any transport, timeout, or shape
//! error yields `None` and the prediction keeps the model's value. No
//! retries — a slow feed must not stall request handling.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// ISO-3 code of the country designated for live-feed overrides.
pub const LIVE_COUNTRY: &str = "GBR";

/// Default live API base URL.
pub const DEFAULT_LIVE_BASE_URL: &str = "https://api.carbonintensity.org.uk";

/// Default request timeout for live-feed calls.
pub const DEFAULT_LIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// One reading from the live intensity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveReading {
    /// Forecast intensity, gCO₂/kWh.
    pub forecast: Option<f64>,
    /// Measured intensity where published, gCO₂/kWh.
    pub actual: Option<f64>,
    /// Qualitative band (e.g. `"low"`, `"moderate"`).
    pub index: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    data: Vec<ApiEntry>,
}

#[derive(Debug, Deserialize)]
struct ApiEntry {
    intensity: LiveReading,
}

/// Client for the live intensity API.
#[derive(Debug, Clone)]
pub struct LiveFeed {
    client: reqwest::Client,
    base_url: String,
}

impl LiveFeed {
    /// Builds a client with the given base URL and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetches the current national reading, or `None` on any failure.
    pub async fn fetch(&self) -> Option<LiveReading> {
        let url = format!("{}/intensity", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Live intensity feed unreachable: {e}");
                return None;
            }
        };
        let envelope: ApiEnvelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) => {
                log::warn!("Live intensity feed returned an unexpected shape: {e}");
                return None;
            }
        };
        envelope.data.into_iter().next().map(|entry| entry.intensity)
    }
}
