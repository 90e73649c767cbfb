//! Core library for the weather dashboard.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather client behind the `WeatherClient` trait
//! - Durable key-value storage for the tracked cities
//! - The city collection manager (add / remove / refresh, persistence)
//! - Forecast aggregation for the per-city detail view
//!
//! It is used by `weather-dashboard`, but can be reused by any other front end.

pub mod config;
pub mod detail;
pub mod error;
pub mod forecast;
pub mod manager;
pub mod model;
pub mod notice;
pub mod provider;
pub mod store;

pub use config::Config;
pub use detail::{load_detail, parse_coordinates};
pub use error::{AddCityError, DetailError, FetchError, StoreError};
pub use forecast::{DayGroup, ForecastEntry, ForecastView, Metric, kelvin_to_celsius};
pub use manager::{CITIES_KEY, CityManager};
pub use model::{City, CityId, Coordinates, ForecastSample, HourlyForecast, WeatherSnapshot};
pub use notice::{Notice, Severity};
pub use provider::{WeatherClient, client_from_config};
pub use store::{FileStore, KeyValueStore, MemoryStore};
