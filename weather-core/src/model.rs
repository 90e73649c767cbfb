use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::forecast::kelvin_to_celsius;

const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

/// Stable identity of a tracked city: the user-supplied name, trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityId(String);

impl CityId {
    pub fn from_name(name: &str) -> Self {
        Self(name.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Normalized current-weather reading. Temperatures are in Kelvin, as the API returns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city_name: String,
    pub country: String,
    pub coordinates: Coordinates,
    pub temperature_k: f64,
    pub feels_like_k: f64,
    pub humidity: u8,
    pub condition: String,
    pub description: String,
    pub icon: String,
    pub observed_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    pub fn temperature_c(&self) -> i32 {
        kelvin_to_celsius(self.temperature_k)
    }

    pub fn feels_like_c(&self) -> i32 {
        kelvin_to_celsius(self.feels_like_k)
    }

    pub fn icon_url(&self) -> String {
        icon_url(&self.icon)
    }
}

pub fn icon_url(icon: &str) -> String {
    format!("{ICON_BASE_URL}/{icon}@2x.png")
}

/// One raw 3-hour forecast sample, Kelvin temperatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub timestamp: DateTime<Utc>,
    pub temperature_k: f64,
    pub feels_like_k: f64,
    pub wind_speed: f64,
    pub humidity: u8,
    pub pressure: u32,
    pub icon: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub snapshot: WeatherSnapshot,
    pub samples: Vec<ForecastSample>,
}

/// One tracked city with its cached weather state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub display_name: String,
    #[serde(default)]
    pub snapshot: Option<WeatherSnapshot>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_loading: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl City {
    /// A city that has not been fetched yet.
    pub fn pending(name: &str) -> Self {
        Self {
            id: CityId::from_name(name),
            display_name: name.trim().to_string(),
            snapshot: None,
            last_updated: None,
            is_loading: false,
            error: None,
        }
    }

    /// Coordinates for the forecast detail view, known once a snapshot exists.
    pub fn detail_route(&self) -> Option<Coordinates> {
        self.snapshot.as_ref().map(|s| s.coordinates)
    }
}
