//! Core library for the `cityweather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The geocoding and current-weather seams and their OpenWeather implementation
//! - The city -> coordinates -> weather pipeline and its stdin session loop
//! - Shared domain models and output rendering
//!
//! It is used by `cityweather-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod lookup;
pub mod model;
pub mod provider;
pub mod render;
pub mod session;

pub use config::{Config, Endpoints, QueryMode};
pub use error::{Endpoint, WeatherError};
pub use lookup::lookup;
pub use model::{CityQuery, Coordinates, GeoMatch, WeatherReport, WeatherSummary};
pub use provider::{Geocoder, WeatherFetcher, client_from_config, openweather::OpenWeatherClient};
pub use render::{OutputFormat, display_city_name};
pub use session::{SessionOptions, SessionReport, run_session};
