use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::model::{LocationQuery, WeatherCondition, WeatherSnapshot};

use super::{WeatherProvider, http_client, truncate_body, unix_to_utc};

const DEFAULT_BASE_URL: &str = "http://api.weatherapi.com/v1";

/// WeatherAPI.com current conditions. Supports IP-based automatic location.
#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self { api_key, base_url: DEFAULT_BASE_URL.to_string(), http: http_client()? })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn query_for(location: &LocationQuery) -> &str {
        match location {
            LocationQuery::Automatic => "auto:ip",
            LocationQuery::Manual(name) => name.as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    condition: WaCondition,
    last_updated_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    async fn current(&self, location: &LocationQuery) -> Result<WeatherSnapshot> {
        let url = format!("{}/current.json", self.base_url);
        let q = Self::query_for(location);
        debug!(%url, q, "requesting WeatherAPI current conditions");

        let res = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("q", q), ("aqi", "no")])
            .send()
            .await
            .context("Failed to send request to WeatherAPI.com (current)")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read WeatherAPI current response body")?;

        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "WeatherAPI current request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: WaResponse =
            serde_json::from_str(&body).context("Failed to parse WeatherAPI current JSON")?;

        let observed_at =
            parsed.current.last_updated_epoch.and_then(unix_to_utc).unwrap_or_else(Utc::now);
        let description = parsed.current.condition.text;

        Ok(WeatherSnapshot {
            location: parsed.location.name,
            temperature_celsius: parsed.current.temp_c,
            condition: WeatherCondition::from_description(&description),
            description,
            observed_at,
        })
    }
}
