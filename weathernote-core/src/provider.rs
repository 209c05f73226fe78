use async_trait::async_trait;
use chrono::FixedOffset;
use std::fmt::Debug;

use crate::{config::FetchRequest, error::FetchError, model::WeatherSnapshot};

pub mod openweather;

pub use openweather::OpenWeatherFetcher;

/// Produces one snapshot per call. No retries, no caching.
#[async_trait]
pub trait WeatherFetcher: Send + Sync + Debug {
    async fn fetch(&self, request: &FetchRequest) -> Result<WeatherSnapshot, FetchError>;
}

/// Time zone used to decompose observation timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

/// Endpoints and transport settings for [`OpenWeatherFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Current-weather-by-name endpoint.
    pub weather_url: String,

    /// Base URL the `{icon}.png` condition images live under.
    pub icon_base_url: String,

    pub timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            weather_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            icon_base_url: "http://openweathermap.org/img/w".to_string(),
            timeout_secs: 30,
        }
    }
}
