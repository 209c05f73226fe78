use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::{
    config::{FetchRequest, UnitSystem},
    error::FetchError,
    model::{RawObservation, WeatherSnapshot},
};

use super::{DisplayZone, FetcherConfig, WeatherFetcher};

/// Current conditions from the OpenWeather "weather by city name" API.
#[derive(Debug, Clone)]
pub struct OpenWeatherFetcher {
    http: Client,
    config: FetcherConfig,
    zone: DisplayZone,
}

impl OpenWeatherFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| FetchError::Transport { endpoint: "client", source })?;

        Ok(Self { http, config, zone: DisplayZone::default() })
    }

    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(FetcherConfig::default())
    }

    /// Decompose timestamps in `zone` instead of the local time zone.
    pub fn with_zone(mut self, zone: DisplayZone) -> Self {
        self.zone = zone;
        self
    }

    async fn fetch_current(&self, request: &FetchRequest) -> Result<OwCurrentResponse, FetchError> {
        let res = self
            .http
            .get(&self.config.weather_url)
            .query(&[
                ("q", request.location.as_str()),
                ("appid", request.api_key.as_str()),
                ("units", request.units.as_str()),
            ])
            .send()
            .await
            .map_err(|source| FetchError::Transport { endpoint: "weather", source })?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|source| FetchError::Transport { endpoint: "weather", source })?;

        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: "weather",
                status,
                body: truncate_body(&body),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Follows redirects and returns the final image URL.
    ///
    /// Only a transport failure is an error; an unhappy status still yields
    /// the URL the request ended up at.
    async fn resolve_icon(&self, icon: &str) -> Result<String, FetchError> {
        let url = format!("{}/{icon}.png", self.config.icon_base_url.trim_end_matches('/'));

        let res = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Transport { endpoint: "icon", source })?;

        let status = res.status();
        if !status.is_success() {
            warn!(%status, url = %res.url(), "icon lookup did not succeed, keeping its URL");
        }

        Ok(res.url().to_string())
    }

    fn derive(&self, raw: &RawObservation, units: UnitSystem) -> Option<WeatherSnapshot> {
        match self.zone {
            DisplayZone::Local => WeatherSnapshot::derive(raw, units, &Local),
            DisplayZone::Fixed(offset) => WeatherSnapshot::derive(raw, units, &offset),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: Option<f64>,
    humidity: Option<f64>,
    sea_level: Option<f64>,
    grnd_level: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    deg: f64,
    gust: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    sys: OwSys,
    visibility: Option<f64>,
}

impl OwCurrentResponse {
    fn into_raw(self, icon_url: String) -> Result<RawObservation, FetchError> {
        let condition = self
            .weather
            .into_iter()
            .next()
            .ok_or(FetchError::MissingField("weather[0]"))?;

        Ok(RawObservation {
            description: condition.description,
            icon_url,
            temp: self.main.temp,
            feels_like: self.main.feels_like,
            temp_min: self.main.temp_min,
            temp_max: self.main.temp_max,
            pressure: self.main.pressure,
            humidity: self.main.humidity,
            sea_level: self.main.sea_level,
            ground_level: self.main.grnd_level,
            visibility: self.visibility,
            wind_speed: self.wind.speed,
            wind_deg: self.wind.deg,
            wind_gust: self.wind.gust,
            observed_at: self.dt,
            sunrise: self.sys.sunrise,
            sunset: self.sys.sunset,
            location_name: self.name,
        })
    }
}

#[async_trait]
impl WeatherFetcher for OpenWeatherFetcher {
    #[instrument(skip(self, request), fields(location = %request.location, units = %request.units))]
    async fn fetch(&self, request: &FetchRequest) -> Result<WeatherSnapshot, FetchError> {
        if request.location.is_empty() || request.api_key.is_empty() {
            return Err(FetchError::MissingCredentials);
        }

        let result = async {
            let current = self.fetch_current(request).await?;
            let icon = current
                .weather
                .first()
                .map(|w| w.icon.clone())
                .ok_or(FetchError::MissingField("weather[0]"))?;
            let icon_url = self.resolve_icon(&icon).await?;

            let raw = current.into_raw(icon_url)?;
            self.derive(&raw, request.units).ok_or(FetchError::InvalidTimestamp)
        }
        .await;

        match &result {
            Ok(snapshot) => debug!(location = %snapshot.location_name, "weather snapshot fetched"),
            Err(e) => warn!(error = %e, "error encountered getting weather, check your settings"),
        }

        result
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
