//! Fetch collaborator for the day-ahead spot price feed

use crate::error::{HeliosError, Result};
use crate::logging::get_logger;
use chrono::NaiveDate;
use serde::Deserialize;

/// Prices as returned by the upstream feed, before any conversion
#[derive(Debug, Clone, Deserialize)]
pub struct FetchedPrices {
    pub unit: String,
    pub price: Vec<f64>,
    pub unix_seconds: Vec<i64>,
}

/// Source of day-ahead spot prices for a date window
#[async_trait::async_trait]
pub trait PriceFetcher: Send + Sync {
    /// Fetch prices for the inclusive `[start, end]` date window
    async fn fetch_window(&self, start: NaiveDate, end: NaiveDate) -> Result<FetchedPrices>;
}

const DEFAULT_BASE_URL: &str = "https://api.energy-charts.info";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Day-ahead price feed client
pub struct EnergyChartsClient {
    base_url: String,
    bidding_zone: String,
    http: reqwest::Client,
    logger: crate::logging::StructuredLogger,
}

impl EnergyChartsClient {
    /// Create a client for the given bidding zone
    pub fn new(bidding_zone: &str) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, bidding_zone)
    }

    /// Create a client against a non-default endpoint (tests, mirrors)
    pub fn with_base_url(base_url: &str, bidding_zone: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bidding_zone: bidding_zone.to_string(),
            http,
            logger: get_logger("prices"),
        })
    }
}

#[async_trait::async_trait]
impl PriceFetcher for EnergyChartsClient {
    async fn fetch_window(&self, start: NaiveDate, end: NaiveDate) -> Result<FetchedPrices> {
        let url = format!("{}/price", self.base_url);
        self.logger.debug(&format!(
            "Requesting spot prices for {}..{} ({})",
            start, end, self.bidding_zone
        ));

        let start_day = start.format("%Y-%m-%d").to_string();
        let end_day = end.format("%Y-%m-%d").to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("bzn", self.bidding_zone.as_str()),
                ("start", start_day.as_str()),
                ("end", end_day.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HeliosError::fetch(format!(
                "price feed returned {}: {}",
                status, body
            )));
        }
        if !status.is_success() {
            return Err(HeliosError::fetch_retriable(format!(
                "price feed returned {}",
                status
            )));
        }

        let fetched: FetchedPrices = resp
            .json()
            .await
            .map_err(|e| HeliosError::fetch(format!("invalid price feed payload: {}", e)))?;

        self.logger
            .debug(&format!("Got {} spot price samples", fetched.price.len()));
        Ok(fetched)
    }
}
