use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    Config,
    error::FetchError,
    model::{HourlyForecast, WeatherSnapshot},
    provider::openweather::OpenWeatherClient,
};

pub mod openweather;

/// Boundary to the remote weather service.
///
/// Implementations never panic past this boundary: every failure, including a
/// missing API key, comes back as a [`FetchError`] value.
#[async_trait]
pub trait WeatherClient: Send + Sync + Debug {
    async fn fetch_current(&self, city_name: &str) -> Result<WeatherSnapshot, FetchError>;

    async fn fetch_hourly(&self, lat: f64, lon: f64) -> Result<HourlyForecast, FetchError>;
}

/// Construct the OpenWeather client from config.
///
/// A missing API key is not an error here; each call reports it instead, so the
/// dashboard keeps working and shows the problem on every card.
pub fn client_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherClient>> {
    if !config.is_configured() {
        tracing::warn!("No OpenWeather API key configured; every fetch will fail");
    }

    Ok(Arc::new(OpenWeatherClient::from_config(config)?))
}
