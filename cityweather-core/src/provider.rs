use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    Config,
    error::WeatherError,
    model::{CityQuery, Coordinates, GeoMatch, WeatherSummary},
    provider::openweather::OpenWeatherClient,
};

pub mod openweather;

/// Resolves a free-text place name to a single location.
#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    async fn locate(&self, query: &CityQuery) -> Result<GeoMatch, WeatherError>;
}

/// Fetches current conditions at a point.
#[async_trait]
pub trait WeatherFetcher: Send + Sync + Debug {
    async fn current(&self, coordinates: Coordinates) -> Result<WeatherSummary, WeatherError>;
}

/// Construct the OpenWeather client from config.
pub fn client_from_config(config: &Config) -> Result<OpenWeatherClient, WeatherError> {
    config.validate()?;
    let api_key = config.api_key()?;
    OpenWeatherClient::new(
        api_key.to_owned(),
        config.endpoints.clone(),
        config.match_limit,
        config.timeout(),
    )
}
