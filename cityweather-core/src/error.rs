//! Error taxonomy for a single city lookup.

use std::fmt;

use thiserror::Error;

/// Which remote call an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Geocoding,
    Weather,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Geocoding => "geocoding",
            Endpoint::Weather => "weather",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum WeatherError {
    /// Missing API key or otherwise unusable configuration. Fatal.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid city name: {0}")]
    InvalidQuery(String),

    /// Transport failure or a non-2xx status from either endpoint.
    #[error("{endpoint} request failed: {message}")]
    Network {
        endpoint: Endpoint,
        status: Option<u16>,
        message: String,
    },

    #[error("Failed to parse {endpoint} response: {message}")]
    Decode { endpoint: Endpoint, message: String },

    /// The response was well-formed but had nothing to pick from.
    #[error("Empty {endpoint} result: {message}")]
    EmptyResult { endpoint: Endpoint, message: String },

    #[error("Request cancelled")]
    Cancelled,
}

impl WeatherError {
    pub fn network<S: Into<String>>(endpoint: Endpoint, message: S) -> Self {
        Self::Network {
            endpoint,
            status: None,
            message: message.into(),
        }
    }

    pub fn decode<S: Into<String>>(endpoint: Endpoint, message: S) -> Self {
        Self::Decode {
            endpoint,
            message: message.into(),
        }
    }

    pub fn empty<S: Into<String>>(endpoint: Endpoint, message: S) -> Self {
        Self::EmptyResult {
            endpoint,
            message: message.into(),
        }
    }

    /// HTTP status attached to a `Network` error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. } => *status,
            _ => None,
        }
    }

    /// One-line diagnostic shown to the user for a failed city.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(message) => format!("Configuration error: {message}"),
            Self::InvalidQuery(message) => format!("Invalid city name: {message}"),
            Self::Network {
                endpoint,
                status: Some(code),
                ..
            } => format!("Error fetching {endpoint} data: server responded with HTTP {code}"),
            Self::Network { endpoint, message, .. } => {
                format!("Error fetching {endpoint} data: {message}")
            }
            Self::Decode { endpoint, .. } => {
                format!("Error reading {endpoint} response: unexpected data from the provider")
            }
            Self::EmptyResult { message, .. } => message.clone(),
            Self::Cancelled => "Lookup cancelled".to_string(),
        }
    }
}
