use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::model::{LocationQuery, WeatherCondition, WeatherSnapshot};

use super::{WeatherProvider, http_client, truncate_body, unix_to_utc};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// OpenWeather current conditions. Needs an explicit place name.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self { api_key, base_url: DEFAULT_BASE_URL.to_string(), http: http_client()? })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(&self, location: &LocationQuery) -> Result<WeatherSnapshot> {
        let address = match location {
            LocationQuery::Manual(name) => name.as_str(),
            LocationQuery::Automatic => {
                return Err(anyhow!(
                    "OpenWeather cannot resolve an automatic location.\n\
                     Hint: run `granny settings set --location <city>` to pick one."
                ));
            }
        };

        let url = format!("{}/weather", self.base_url);
        debug!(%url, address, "requesting OpenWeather current conditions");

        let res = self
            .http
            .get(&url)
            .query(&[("q", address), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .context("Failed to send request to OpenWeather (current weather)")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read OpenWeather current response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather current request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: OwCurrentResponse =
            serde_json::from_str(&body).context("Failed to parse OpenWeather current JSON")?;

        let description = parsed
            .weather
            .first()
            .map(|w| w.description.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(WeatherSnapshot {
            location: parsed.name,
            temperature_celsius: parsed.main.temp,
            condition: WeatherCondition::from_description(&description),
            description,
            observed_at: unix_to_utc(parsed.dt).unwrap_or_else(Utc::now),
        })
    }
}
