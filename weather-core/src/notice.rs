use crate::{error::AddCityError, model::City};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

/// Short user-facing message about the outcome of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    /// Notice for an `add` attempt of the user-entered `name`.
    pub fn for_add(name: &str, outcome: &Result<Vec<City>, AddCityError>) -> Self {
        let name = name.trim();
        match outcome {
            Ok(_) => Self::success(format!("City \"{name}\" added successfully!")),
            Err(AddCityError::EmptyName) => Self::error("Please enter a city name."),
            Err(AddCityError::Duplicate { .. }) => {
                Self::error(format!("City \"{name}\" already exists."))
            }
            Err(AddCityError::Fetch { source, .. }) if source.is_config() => {
                Self::error(source.to_string())
            }
            Err(AddCityError::Fetch { .. }) => Self::error(format!(
                "Sorry, city \"{name}\" was not found. Please try again."
            )),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
