use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    Config,
    error::FetchError,
    model::{Coordinates, ForecastSample, HourlyForecast, WeatherSnapshot},
};

use super::WeatherClient;

const CURRENT_DEFAULT_MESSAGE: &str = "City not found or API error.";
const FORECAST_DEFAULT_MESSAGE: &str = "Error fetching hourly forecast.";

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: Option<String>,
    base_url: String,
    lang: Option<String>,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            lang: None,
            http: Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;

        let client = Self {
            api_key: config.api_key().map(str::to_owned),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            lang: None,
            http,
        };

        Ok(match &config.lang {
            Some(lang) => client.with_lang(lang.as_str()),
            None => client,
        })
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    fn api_key(&self) -> Result<&str, FetchError> {
        self.api_key.as_deref().ok_or(FetchError::MissingApiKey)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        default_message: &str,
    ) -> Result<T, FetchError> {
        let api_key = self.api_key()?;
        let url = format!("{}/{}", self.base_url, endpoint);

        let mut query: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        query.push(("appid", api_key));
        if let Some(lang) = &self.lang {
            query.push(("lang", lang.as_str()));
        }

        let res = self.http.get(&url).query(&query).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(FetchError::NotFound {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| default_message.to_string()),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            FetchError::InvalidResponse(format!("{e} (body: {})", truncate_body(&body)))
        })
    }
}

#[async_trait]
impl WeatherClient for OpenWeatherClient {
    async fn fetch_current(&self, city_name: &str) -> Result<WeatherSnapshot, FetchError> {
        tracing::debug!(city = city_name, "Fetching current weather");

        let parsed: OwCurrentResponse = self
            .get_json("weather", &[("q", city_name.to_string())], CURRENT_DEFAULT_MESSAGE)
            .await
            .inspect_err(|e| {
                tracing::warn!(city = city_name, error = %e, "Current weather request failed")
            })?;

        Ok(parsed.into_snapshot())
    }

    async fn fetch_hourly(&self, lat: f64, lon: f64) -> Result<HourlyForecast, FetchError> {
        tracing::debug!(lat, lon, "Fetching hourly forecast");

        let parsed: OwForecastResponse = self
            .get_json(
                "forecast",
                &[("lat", lat.to_string()), ("lon", lon.to_string())],
                FORECAST_DEFAULT_MESSAGE,
            )
            .await
            .inspect_err(|e| {
                tracing::warn!(lat, lon, error = %e, "Hourly forecast request failed")
            })?;

        parsed.into_hourly().inspect_err(|e| {
            tracing::warn!(lat, lon, error = %e, "Hourly forecast response unusable")
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
    #[serde(default)]
    pressure: u32,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    #[serde(default)]
    main: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: i64,
    coord: OwCoord,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    sys: OwSys,
}

impl OwCurrentResponse {
    fn into_snapshot(self) -> WeatherSnapshot {
        let weather = self.weather.into_iter().next();
        let (condition, description, icon) = match weather {
            Some(w) => (w.main, w.description, w.icon),
            None => ("Unknown".to_string(), String::new(), String::new()),
        };

        WeatherSnapshot {
            city_name: self.name,
            country: self.sys.country,
            coordinates: Coordinates {
                lat: self.coord.lat,
                lon: self.coord.lon,
            },
            temperature_k: self.main.temp,
            feels_like_k: self.main.feels_like,
            humidity: self.main.humidity,
            condition,
            description,
            icon,
            observed_at: unix_to_utc(self.dt).unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwCity {
    name: String,
    #[serde(default)]
    country: String,
    coord: OwCoord,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

impl OwForecastResponse {
    fn into_hourly(self) -> Result<HourlyForecast, FetchError> {
        let samples = self
            .list
            .into_iter()
            .map(|entry| {
                let timestamp = unix_to_utc(entry.dt).ok_or_else(|| {
                    FetchError::InvalidResponse(format!("timestamp out of range: {}", entry.dt))
                })?;
                let weather = entry.weather.into_iter().next();
                let (condition, description, icon) = match weather {
                    Some(w) => (w.main, w.description, w.icon),
                    None => (String::new(), String::new(), String::new()),
                };
                Ok((
                    condition,
                    ForecastSample {
                        timestamp,
                        temperature_k: entry.main.temp,
                        feels_like_k: entry.main.feels_like,
                        wind_speed: entry.wind.speed,
                        humidity: entry.main.humidity,
                        pressure: entry.main.pressure,
                        icon,
                        description,
                    },
                ))
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        let (condition, first) = samples.first().ok_or_else(|| {
            FetchError::InvalidResponse("OpenWeather forecast response contained no data".into())
        })?;

        let snapshot = WeatherSnapshot {
            city_name: self.city.name,
            country: self.city.country,
            coordinates: Coordinates {
                lat: self.city.coord.lat,
                lon: self.city.coord.lon,
            },
            temperature_k: first.temperature_k,
            feels_like_k: first.feels_like_k,
            humidity: first.humidity,
            condition: condition.clone(),
            description: first.description.clone(),
            icon: first.icon.clone(),
            observed_at: first.timestamp,
        };

        Ok(HourlyForecast {
            snapshot,
            samples: samples.into_iter().map(|(_, s)| s).collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwErrorBody {
    message: Option<String>,
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<OwErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn current_body() -> serde_json::Value {
        json!({
            "coord": { "lon": 30.5234, "lat": 50.4501 },
            "weather": [{ "id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d" }],
            "main": { "temp": 283.15, "feels_like": 281.6, "humidity": 71, "pressure": 1016 },
            "dt": 1736935200,
            "sys": { "country": "UA" },
            "name": "Kyiv"
        })
    }

    fn forecast_body() -> serde_json::Value {
        json!({
            "cod": "200",
            "list": [
                {
                    "dt": 1678881600,
                    "main": { "temp": 293.15, "feels_like": 291.15, "humidity": 60, "pressure": 1012 },
                    "weather": [{ "main": "Clear", "description": "clear sky", "icon": "01d" }],
                    "wind": { "speed": 5.5 }
                },
                {
                    "dt": 1678892400,
                    "main": { "temp": 295.15, "feels_like": 294.15, "humidity": 55, "pressure": 1010 },
                    "weather": [{ "main": "Clouds", "description": "few clouds", "icon": "02d" }],
                    "wind": { "speed": 6.0 }
                }
            ],
            "city": { "name": "Kyiv", "country": "UA", "coord": { "lat": 50.4501, "lon": 30.5234 } }
        })
    }

    #[tokio::test]
    async fn fetch_current_normalizes_payload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Kyiv"))
            .and(query_param("appid", "KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new(Some("KEY".into()), mock_server.uri());
        let snapshot = client.fetch_current("Kyiv").await.unwrap();

        assert_eq!(snapshot.city_name, "Kyiv");
        assert_eq!(snapshot.country, "UA");
        assert_eq!(snapshot.condition, "Clouds");
        assert_eq!(snapshot.icon, "04d");
        assert_eq!(snapshot.temperature_k, 283.15);
        assert_eq!(snapshot.temperature_c(), 10);
        assert_eq!(snapshot.coordinates, Coordinates { lat: 50.4501, lon: 30.5234 });
        assert_eq!(snapshot.observed_at.timestamp(), 1736935200);
    }

    #[tokio::test]
    async fn fetch_current_passes_language() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("lang", "ua"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut config = Config {
            base_url: mock_server.uri(),
            lang: Some("ua".into()),
            ..Config::default()
        };
        config.set_api_key("KEY".into());

        let client = OpenWeatherClient::from_config(&config).unwrap();
        assert!(client.fetch_current("Kyiv").await.is_ok());
    }

    #[tokio::test]
    async fn fetch_current_maps_error_status_with_service_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({ "cod": "404", "message": "city not found" })),
            )
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new(Some("KEY".into()), mock_server.uri());
        let err = client.fetch_current("Nowhere123").await.unwrap_err();

        assert_eq!(
            err,
            FetchError::NotFound {
                status: 404,
                message: "city not found".into()
            }
        );
    }

    #[tokio::test]
    async fn fetch_current_uses_default_message_without_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new(Some("KEY".into()), mock_server.uri());
        let err = client.fetch_current("Kyiv").await.unwrap_err();

        assert_eq!(
            err,
            FetchError::NotFound {
                status: 500,
                message: CURRENT_DEFAULT_MESSAGE.into()
            }
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_invalid_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "Kyiv" })))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new(Some("KEY".into()), mock_server.uri());
        let err = client.fetch_current("Kyiv").await.unwrap_err();

        assert!(matches!(err, FetchError::InvalidResponse(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_key_skips_network() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new(None, mock_server.uri());
        assert_eq!(
            client.fetch_current("Kyiv").await.unwrap_err(),
            FetchError::MissingApiKey
        );
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let client = OpenWeatherClient::new(Some("KEY".into()), "http://127.0.0.1:9");
        let err = client.fetch_current("Kyiv").await.unwrap_err();

        assert!(matches!(err, FetchError::Network(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn fetch_hourly_returns_raw_kelvin_samples() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("lat", "50.4501"))
            .and(query_param("lon", "30.5234"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new(Some("KEY".into()), mock_server.uri());
        let hourly = client.fetch_hourly(50.4501, 30.5234).await.unwrap();

        assert_eq!(hourly.samples.len(), 2);
        assert_eq!(hourly.samples[0].temperature_k, 293.15);
        assert_eq!(hourly.samples[1].description, "few clouds");
        assert_eq!(hourly.samples[1].pressure, 1010);
        assert_eq!(hourly.snapshot.city_name, "Kyiv");
        assert_eq!(hourly.snapshot.condition, "Clear");
        assert_eq!(hourly.snapshot.temperature_k, 293.15);
    }

    #[tokio::test]
    async fn fetch_hourly_error_uses_forecast_default_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "cod": 401 })))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new(Some("KEY".into()), mock_server.uri());
        let err = client.fetch_hourly(1.0, 2.0).await.unwrap_err();

        assert_eq!(
            err,
            FetchError::NotFound {
                status: 401,
                message: FORECAST_DEFAULT_MESSAGE.into()
            }
        );
    }

    #[tokio::test]
    async fn empty_forecast_is_rejected() {
        let mock_server = MockServer::start().await;

        let mut body = forecast_body();
        body["list"] = json!([]);
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let client = OpenWeatherClient::new(Some("KEY".into()), mock_server.uri());
        let err = client.fetch_hourly(1.0, 2.0).await.unwrap_err();

        assert!(matches!(err, FetchError::InvalidResponse(_)), "got {err:?}");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
