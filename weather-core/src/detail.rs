use crate::{
    error::DetailError,
    forecast::ForecastView,
    model::Coordinates,
    provider::WeatherClient,
};

/// Parse and range-check `lat`/`lon` route parameters.
pub fn parse_coordinates(lat: &str, lon: &str) -> Result<Coordinates, DetailError> {
    let invalid = || DetailError::InvalidCoordinates {
        lat: lat.to_string(),
        lon: lon.to_string(),
    };

    let lat_v: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lon_v: f64 = lon.trim().parse().map_err(|_| invalid())?;

    if !lat_v.is_finite() || !lon_v.is_finite() {
        return Err(invalid());
    }
    if !(-90.0..=90.0).contains(&lat_v) || !(-180.0..=180.0).contains(&lon_v) {
        return Err(invalid());
    }

    Ok(Coordinates {
        lat: lat_v,
        lon: lon_v,
    })
}

/// Fetch the hourly forecast for `coords` and group it by local day.
pub async fn load_detail(
    client: &dyn WeatherClient,
    coords: Coordinates,
) -> Result<ForecastView, DetailError> {
    let hourly = client.fetch_hourly(coords.lat, coords.lon).await?;
    tracing::debug!(
        city = %hourly.snapshot.city_name,
        samples = hourly.samples.len(),
        "Loaded forecast detail"
    );
    Ok(ForecastView::from_hourly(&hourly))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::model::{ForecastSample, HourlyForecast, WeatherSnapshot};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    #[derive(Debug)]
    struct StaticForecast(Result<HourlyForecast, FetchError>);

    #[async_trait]
    impl WeatherClient for StaticForecast {
        async fn fetch_current(&self, _city_name: &str) -> Result<WeatherSnapshot, FetchError> {
            Err(FetchError::Network("unused".into()))
        }

        async fn fetch_hourly(&self, _lat: f64, _lon: f64) -> Result<HourlyForecast, FetchError> {
            self.0.clone()
        }
    }

    fn hourly() -> HourlyForecast {
        let at = |h| Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap();
        let sample = |h| ForecastSample {
            timestamp: at(h),
            temperature_k: 293.15,
            feels_like_k: 292.15,
            wind_speed: 3.0,
            humidity: 50,
            pressure: 1015,
            icon: "01d".into(),
            description: "clear sky".into(),
        };
        HourlyForecast {
            snapshot: WeatherSnapshot {
                city_name: "Kyiv".into(),
                country: "UA".into(),
                coordinates: Coordinates { lat: 50.45, lon: 30.52 },
                temperature_k: 293.15,
                feels_like_k: 292.15,
                humidity: 50,
                condition: "Clear".into(),
                description: "clear sky".into(),
                icon: "01d".into(),
                observed_at: at(6),
            },
            samples: vec![sample(6), sample(9)],
        }
    }

    #[test]
    fn parses_valid_coordinates() {
        let coords = parse_coordinates("50.45", " 30.52 ").unwrap();
        assert_eq!(coords, Coordinates { lat: 50.45, lon: 30.52 });
    }

    #[test]
    fn rejects_bad_coordinates() {
        for (lat, lon) in [("abc", "1"), ("91", "0"), ("0", "-180.5"), ("NaN", "0"), ("", "")] {
            assert!(
                matches!(parse_coordinates(lat, lon), Err(DetailError::InvalidCoordinates { .. })),
                "{lat},{lon} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn load_detail_builds_view() {
        let client = StaticForecast(Ok(hourly()));
        let view = load_detail(&client, Coordinates { lat: 50.45, lon: 30.52 })
            .await
            .unwrap();

        assert_eq!(view.snapshot().city_name, "Kyiv");
        assert_eq!(view.groups().iter().map(|g| g.entries.len()).sum::<usize>(), 2);
        assert!(view.days_to_show() >= 1);
    }

    #[tokio::test]
    async fn load_detail_propagates_fetch_failure() {
        let client = StaticForecast(Err(FetchError::MissingApiKey));
        let err = load_detail(&client, Coordinates { lat: 0.0, lon: 0.0 })
            .await
            .unwrap_err();

        assert_eq!(err, DetailError::Fetch(FetchError::MissingApiKey));
    }
}
