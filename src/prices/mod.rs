//! Cached, lazily-refreshed spot price dataset
//!
//! [`SpotPriceCache`] owns the persisted price series: it hydrates from the
//! store at startup, replaces the series wholesale on refresh (readers see
//! the old series or the new one, never a partially-built one), and answers
//! "price as of now" and "today's extremum" queries.

pub mod client;
pub mod series;
pub mod store;

pub use client::{EnergyChartsClient, FetchedPrices, PriceFetcher};
pub use series::{DISPLAY_UNIT, PricePoint, PriceSeries, SOURCE_UNIT};
pub use store::{FilePriceStore, PriceStore, RawPricePayload};

use crate::error::{HeliosError, Result};
use crate::logging::get_logger;
use chrono::{DateTime, Duration, Local, Utc};

/// Base delay between refresh attempts; the n-th retry waits n times this
const RETRY_BACKOFF_SECS: u64 = 30;

/// Cached spot price series with refresh-from-source logic
pub struct SpotPriceCache {
    fetcher: Box<dyn PriceFetcher>,
    store: Box<dyn PriceStore>,
    series: Option<PriceSeries>,
    logger: crate::logging::StructuredLogger,
}

impl SpotPriceCache {
    pub fn new(fetcher: Box<dyn PriceFetcher>, store: Box<dyn PriceStore>) -> Self {
        Self {
            fetcher,
            store,
            series: None,
            logger: get_logger("prices"),
        }
    }

    /// Best-effort initial load from the persisted store. A missing or
    /// invalid cache file just means no data yet.
    pub fn hydrate(&mut self) {
        match self.load_from_store() {
            Ok(Some(series)) => {
                self.logger.info(&format!(
                    "Hydrated {} price samples from cache (last refresh {})",
                    series.points().len(),
                    series.last_refresh()
                ));
                self.series = Some(series);
            }
            Ok(None) => self.logger.info("No cached prices found"),
            Err(e) => self
                .logger
                .warn(&format!("Ignoring unreadable price cache: {}", e)),
        }
    }

    /// True once a series has been loaded from cache or a fresh fetch
    pub fn has_data(&self) -> bool {
        self.series.is_some()
    }

    /// Direct access to the current series, if any
    pub fn series(&self) -> Option<&PriceSeries> {
        self.series.as_ref()
    }

    /// Fetch the `[start of local day - days_back, end of local day +
    /// days_forward]` window, persist the raw payload, and reload the
    /// in-memory series from the persisted copy (read-after-write). On any
    /// failure the previous state is left untouched and the error
    /// propagates.
    pub async fn refresh(&mut self, days_back: u32, days_forward: u32) -> Result<()> {
        let today = Local::now().date_naive();
        let start = today - Duration::days(days_back as i64);
        let end = today + Duration::days(days_forward as i64);

        let fetched = self.fetcher.fetch_window(start, end).await?;

        let payload = RawPricePayload {
            unit: fetched.unit,
            price: fetched.price,
            unix_seconds: fetched.unix_seconds,
            updated_at: Utc::now(),
        };
        self.store.save(&payload)?;

        // Re-read what was just written so the in-memory view is guaranteed
        // to match the on-disk document.
        let series = self.load_from_store()?.ok_or_else(|| {
            HeliosError::persistence("price cache empty immediately after save")
        })?;

        self.logger.info(&format!(
            "Refreshed spot prices: {} samples covering {}..{}",
            series.points().len(),
            series.min_timestamp(),
            series.max_timestamp()
        ));
        self.series = Some(series);
        Ok(())
    }

    /// Call [`refresh`](Self::refresh) up to `max_attempts` times with an
    /// increasing backoff between attempts. Returns true on the first
    /// success; never fails.
    pub async fn refresh_with_retry(
        &mut self,
        days_back: u32,
        days_forward: u32,
        max_attempts: u32,
    ) -> bool {
        for attempt in 1..=max_attempts {
            match self.refresh(days_back, days_forward).await {
                Ok(()) => return true,
                Err(e) => {
                    self.logger.warn(&format!(
                        "Price refresh attempt {}/{} failed: {}",
                        attempt, max_attempts, e
                    ));
                    if attempt < max_attempts {
                        let delay =
                            std::time::Duration::from_secs(RETRY_BACKOFF_SECS * attempt as u64);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        false
    }

    /// Price in effect right now (step-function semantics)
    pub fn current_value(&self) -> Result<f64> {
        self.series_ref()?.value_at(Local::now())
    }

    /// Timestamp of the sample in effect right now
    pub fn current_timestamp(&self) -> Result<DateTime<Utc>> {
        self.series_ref()?.timestamp_at(Local::now())
    }

    /// Whole-series minimum
    pub fn min_value(&self) -> Result<f64> {
        Ok(self.series_ref()?.min_value())
    }

    /// Whole-series maximum
    pub fn max_value(&self) -> Result<f64> {
        Ok(self.series_ref()?.max_value())
    }

    /// First sample timestamp of the series
    pub fn min_timestamp(&self) -> Result<DateTime<Utc>> {
        Ok(self.series_ref()?.min_timestamp())
    }

    /// Last sample timestamp of the series
    pub fn max_timestamp(&self) -> Result<DateTime<Utc>> {
        Ok(self.series_ref()?.max_timestamp())
    }

    /// Today's minimum and its timestamp
    pub fn min_value_today(&self) -> Result<(f64, DateTime<Utc>)> {
        self.series_ref()?.min_today(Local::now())
    }

    /// Today's maximum and its timestamp
    pub fn max_value_today(&self) -> Result<(f64, DateTime<Utc>)> {
        self.series_ref()?.max_today(Local::now())
    }

    /// Whether the cached series already covers the day after today
    pub fn has_future_day_data(&self) -> bool {
        self.series
            .as_ref()
            .map(|s| s.has_future_day_data(Local::now()))
            .unwrap_or(false)
    }

    fn series_ref(&self) -> Result<&PriceSeries> {
        self.series.as_ref().ok_or(HeliosError::NoCurrentData)
    }

    fn load_from_store(&self) -> Result<Option<PriceSeries>> {
        match self.store.load()? {
            Some(payload) => Ok(Some(PriceSeries::from_payload(&payload)?)),
            None => Ok(None),
        }
    }
}
