//! Validated, queryable spot price series
//!
//! A [`PriceSeries`] is built from a persisted raw payload and is never
//! empty. All queries that depend on "now" take the instant explicitly so
//! day-boundary behavior can be pinned in tests; the cache front-end passes
//! the real wall clock.

use crate::error::{HeliosError, Result};
use crate::prices::store::RawPricePayload;
use chrono::{DateTime, Local, TimeZone, Utc};

/// Unit the upstream feed and the persisted payload carry
pub const SOURCE_UNIT: &str = "EUR/MWh";

/// Unit the series exposes after the load-time conversion
pub const DISPLAY_UNIT: &str = "ct/kWh";

/// Single sample of the piecewise-constant price signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Ordered spot price samples with a display unit tag
#[derive(Debug, Clone)]
pub struct PriceSeries {
    unit: String,
    points: Vec<PricePoint>,
    last_refresh: DateTime<Utc>,
}

impl PriceSeries {
    /// Build a series from a persisted payload, converting EUR/MWh to
    /// ct/kWh. Fails hard on a unit label mismatch rather than silently
    /// reinterpreting the numbers.
    pub fn from_payload(payload: &RawPricePayload) -> Result<Self> {
        if payload.unit != SOURCE_UNIT {
            return Err(HeliosError::persistence(format!(
                "unexpected price unit '{}' (expected '{}')",
                payload.unit, SOURCE_UNIT
            )));
        }

        if payload.price.len() != payload.unix_seconds.len() {
            return Err(HeliosError::persistence(format!(
                "price/timestamp arrays are not aligned ({} vs {})",
                payload.price.len(),
                payload.unix_seconds.len()
            )));
        }

        if payload.price.is_empty() {
            return Err(HeliosError::persistence("price series is empty"));
        }

        let mut points = Vec::with_capacity(payload.price.len());
        for (&secs, &price) in payload.unix_seconds.iter().zip(payload.price.iter()) {
            let timestamp = Utc
                .timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| HeliosError::persistence(format!("invalid timestamp {}", secs)))?;
            points.push(PricePoint {
                timestamp,
                value: price.round() / 10.0,
            });
        }

        for pair in points.windows(2) {
            if pair[0].timestamp >= pair[1].timestamp {
                return Err(HeliosError::persistence(
                    "price timestamps are not strictly ascending",
                ));
            }
        }

        Ok(Self {
            unit: DISPLAY_UNIT.to_string(),
            points,
            last_refresh: payload.updated_at,
        })
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn last_refresh(&self) -> DateTime<Utc> {
        self.last_refresh
    }

    /// Price in effect at `now`: the latest sample at or before it
    pub fn value_at(&self, now: DateTime<Local>) -> Result<f64> {
        Ok(self.points[self.index_at(now)?].value)
    }

    /// Timestamp of the sample in effect at `now`
    pub fn timestamp_at(&self, now: DateTime<Local>) -> Result<DateTime<Utc>> {
        Ok(self.points[self.index_at(now)?].timestamp)
    }

    /// First sample timestamp
    pub fn min_timestamp(&self) -> DateTime<Utc> {
        self.points[0].timestamp
    }

    /// Last sample timestamp
    pub fn max_timestamp(&self) -> DateTime<Utc> {
        self.points[self.points.len() - 1].timestamp
    }

    /// Smallest value over the whole series (first occurrence wins)
    pub fn min_value(&self) -> f64 {
        self.points[self.min_value_index()].value
    }

    /// Largest value over the whole series (first occurrence wins)
    pub fn max_value(&self) -> f64 {
        self.points[self.max_value_index()].value
    }

    /// Timestamp of the whole-series minimum
    pub fn min_value_timestamp(&self) -> DateTime<Utc> {
        self.points[self.min_value_index()].timestamp
    }

    /// Timestamp of the whole-series maximum
    pub fn max_value_timestamp(&self) -> DateTime<Utc> {
        self.points[self.max_value_index()].timestamp
    }

    /// Smallest value and its timestamp among samples on `now`'s local
    /// calendar day
    pub fn min_today(&self, now: DateTime<Local>) -> Result<(f64, DateTime<Utc>)> {
        self.today_extremum(now, |candidate, best| candidate < best)
    }

    /// Largest value and its timestamp among samples on `now`'s local
    /// calendar day
    pub fn max_today(&self, now: DateTime<Local>) -> Result<(f64, DateTime<Utc>)> {
        self.today_extremum(now, |candidate, best| candidate > best)
    }

    /// Whether the series extends into the local day after `now`'s day,
    /// i.e. a scheduled refresh for tomorrow's prices is already covered.
    pub fn has_future_day_data(&self, now: DateTime<Local>) -> bool {
        match start_of_next_local_day(now) {
            Some(next_day) => self.max_timestamp() >= next_day.with_timezone(&Utc),
            None => false,
        }
    }

    fn index_at(&self, now: DateTime<Local>) -> Result<usize> {
        let now_utc = now.with_timezone(&Utc);
        self.points
            .iter()
            .rposition(|p| p.timestamp <= now_utc)
            .ok_or(HeliosError::NoCurrentData)
    }

    fn min_value_index(&self) -> usize {
        let mut best = 0;
        for (idx, p) in self.points.iter().enumerate() {
            if p.value < self.points[best].value {
                best = idx;
            }
        }
        best
    }

    fn max_value_index(&self) -> usize {
        let mut best = 0;
        for (idx, p) in self.points.iter().enumerate() {
            if p.value > self.points[best].value {
                best = idx;
            }
        }
        best
    }

    fn today_extremum<F>(&self, now: DateTime<Local>, better: F) -> Result<(f64, DateTime<Utc>)>
    where
        F: Fn(f64, f64) -> bool,
    {
        let today = now.date_naive();
        let mut best: Option<(f64, DateTime<Utc>)> = None;

        for p in &self.points {
            if p.timestamp.with_timezone(&Local).date_naive() != today {
                continue;
            }
            match best {
                None => best = Some((p.value, p.timestamp)),
                // Strict comparison: the first occurrence wins on ties
                Some((value, _)) if better(p.value, value) => best = Some((p.value, p.timestamp)),
                Some(_) => {}
            }
        }

        best.ok_or(HeliosError::NoTodayData)
    }
}

/// Midnight at the start of the local day after `now`'s day
fn start_of_next_local_day(now: DateTime<Local>) -> Option<DateTime<Local>> {
    now.date_naive()
        .succ_opt()?
        .and_hms_opt(0, 0, 0)?
        .and_local_timezone(Local)
        .earliest()
}
