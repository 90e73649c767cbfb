use thiserror::Error;

/// Failure of a single call to the weather service. Plain values, so they can
/// be recorded on a city.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("No OpenWeather API key configured. Hint: run `weather-dashboard configure`.")]
    MissingApiKey,

    #[error("HTTP error! Status: {status}. Message: {message}")]
    NotFound { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from weather service: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    pub fn is_config(&self) -> bool {
        matches!(self, FetchError::MissingApiKey)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::InvalidResponse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Reasons an `add` is rejected. The collection is never modified when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddCityError {
    #[error("City name is empty")]
    EmptyName,

    #[error("City \"{name}\" already exists")]
    Duplicate { name: String },

    #[error("Could not add city \"{name}\": {source}")]
    Fetch {
        name: String,
        #[source]
        source: FetchError,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O failed for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetailError {
    #[error("Invalid coordinates: lat={lat}, lon={lon}")]
    InvalidCoordinates { lat: String, lon: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
