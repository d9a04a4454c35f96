//! HTTP client for the monitoring API

use crate::config::SiteConfig;
use crate::error::{HeliosError, Result};
use crate::logging::get_logger;
use crate::solaredge::types::{DailyProduction, PowerFlow};
use chrono::{Duration, Local, NaiveDate};
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://monitoringapi.solaredge.com";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Monitoring API client for a single site
pub struct SolarEdgeClient {
    base_url: String,
    site_id: String,
    api_key: String,
    http: reqwest::Client,
    logger: crate::logging::StructuredLogger,
}

#[derive(Debug, Deserialize)]
struct PowerFlowReply {
    #[serde(rename = "siteCurrentPowerFlow")]
    site_current_power_flow: PowerFlow,
}

#[derive(Debug, Deserialize)]
struct EnergyReply {
    energy: EnergyBody,
}

#[derive(Debug, Deserialize)]
struct EnergyBody {
    unit: String,
    values: Vec<EnergyValue>,
}

#[derive(Debug, Deserialize)]
struct EnergyValue {
    date: String,
    value: Option<f64>,
}

impl SolarEdgeClient {
    pub fn new(site: &SiteConfig) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, site)
    }

    /// Create a client against a non-default endpoint (tests)
    pub fn with_base_url(base_url: &str, site: &SiteConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            site_id: site.site_id.clone(),
            api_key: site.api_key.clone(),
            http,
            logger: get_logger("solaredge"),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let mut params: Vec<(&str, &str)> = vec![
            ("format", "application/json"),
            ("api_key", self.api_key.as_str()),
        ];
        params.extend_from_slice(query);

        let resp = self.http.get(url).query(&params).send().await?;

        let status = resp.status();
        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HeliosError::fetch(format!(
                "monitoring API returned {}: {}",
                status, body
            )));
        }
        if !status.is_success() {
            return Err(HeliosError::fetch_retriable(format!(
                "monitoring API returned {}",
                status
            )));
        }

        resp.json()
            .await
            .map_err(|e| HeliosError::fetch(format!("invalid monitoring API payload: {}", e)))
    }

    fn production_for_day(day: &str, values: &[EnergyValue]) -> f64 {
        let mut prod = 0.0;
        for v in values {
            if v.date.starts_with(day) {
                prod = v.value.unwrap_or(0.0);
            }
        }
        prod
    }
}

#[async_trait::async_trait]
impl super::PowerFlowSource for SolarEdgeClient {
    async fn fetch_power_flow(&self) -> Result<PowerFlow> {
        let url = format!("{}/site/{}/currentPowerFlow", self.base_url, self.site_id);
        let reply: PowerFlowReply = self.get_json(&url, &[]).await?;
        self.logger.debug(&format!(
            "Got power flow: PV {:.2} {}",
            reply.site_current_power_flow.pv_power(),
            reply.site_current_power_flow.unit
        ));
        Ok(reply.site_current_power_flow)
    }
}

#[async_trait::async_trait]
impl super::ProductionSource for SolarEdgeClient {
    async fn fetch_production(&self) -> Result<DailyProduction> {
        let today: NaiveDate = Local::now().date_naive();
        let yesterday = today - Duration::days(1);
        let start = yesterday.format("%Y-%m-%d").to_string();
        let end = today.format("%Y-%m-%d").to_string();

        let url = format!("{}/site/{}/energy", self.base_url, self.site_id);
        let reply: EnergyReply = self
            .get_json(
                &url,
                &[
                    ("timeUnit", "DAY"),
                    ("startDate", start.as_str()),
                    ("endDate", end.as_str()),
                ],
            )
            .await?;

        let production = DailyProduction {
            unit: reply.energy.unit,
            today: Self::production_for_day(&end, &reply.energy.values),
            yesterday: Self::production_for_day(&start, &reply.energy.values),
        };
        self.logger.debug(&format!(
            "Got production: today {} {} / yesterday {} {}",
            production.today, production.unit, production.yesterday, production.unit
        ));
        Ok(production)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_lookup_matches_date_prefix() {
        let values = vec![
            EnergyValue {
                date: "2026-03-09 00:00:00".to_string(),
                value: Some(5280.0),
            },
            EnergyValue {
                date: "2026-03-10 00:00:00".to_string(),
                value: Some(2983.0),
            },
        ];

        assert_eq!(
            SolarEdgeClient::production_for_day("2026-03-09", &values),
            5280.0
        );
        assert_eq!(
            SolarEdgeClient::production_for_day("2026-03-10", &values),
            2983.0
        );
        // Unknown day or a null value reads as zero
        assert_eq!(
            SolarEdgeClient::production_for_day("2026-03-11", &values),
            0.0
        );
    }
}
