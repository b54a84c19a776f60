//! OpenWeatherMap current-weather client.

use super::types::{Units, WeatherSnapshot, capitalize};
use crate::config::WeatherConfig;
use crate::error::{WeatherError, WeatherResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

/// Source of current weather for a city name.
#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    /// Look up current conditions for `city`.
    async fn fetch_weather(&self, city: &str) -> WeatherResult<WeatherSnapshot>;
}

/// Subset of the provider payload the bot reads.
#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    main: Option<MainSection>,
    weather: Option<Vec<ConditionEntry>>,
    wind: Option<WindSection>,
}

#[derive(Debug, Deserialize)]
struct MainSection {
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WindSection {
    speed: Option<f64>,
}

impl CurrentWeatherResponse {
    /// `main` and `weather` are required; every reading inside is optional.
    fn into_snapshot(self, units: Units) -> WeatherResult<WeatherSnapshot> {
        let main = self
            .main
            .ok_or_else(|| WeatherError::malformed("missing `main` section"))?;
        let conditions = self
            .weather
            .ok_or_else(|| WeatherError::malformed("missing `weather` section"))?;

        Ok(WeatherSnapshot {
            temperature: main.temp,
            humidity_percent: main.humidity,
            wind_speed: self.wind.and_then(|w| w.speed),
            condition: conditions
                .into_iter()
                .next()
                .and_then(|c| c.description)
                .map(|d| capitalize(&d)),
            units,
        })
    }
}

/// HTTP client for the OpenWeatherMap `/data/2.5/weather` endpoint.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    units: Units,
}

impl OpenWeatherClient {
    /// Build a client from the weather section of the configuration.
    pub fn new(config: &WeatherConfig) -> WeatherResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let endpoint = Url::parse(&config.base_url)?.join("data/2.5/weather")?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            units: config.units,
        })
    }

    fn request_url(&self, city: &str, api_key: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", city)
            .append_pair("appid", api_key)
            .append_pair("units", self.units.as_query());
        url
    }
}

#[async_trait]
impl WeatherFetcher for OpenWeatherClient {
    async fn fetch_weather(&self, city: &str) -> WeatherResult<WeatherSnapshot> {
        let api_key = self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)?;
        info!(city = %city, "fetching weather data");

        let response = self.client.get(self.request_url(city, api_key)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "weather provider returned an error");
            return Err(WeatherError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        debug!(city = %city, payload = %body, "weather provider response");

        let payload: CurrentWeatherResponse = serde_json::from_str(&body)
            .map_err(|e| WeatherError::malformed(e.to_string()))?;
        payload.into_snapshot(self.units)
    }
}
