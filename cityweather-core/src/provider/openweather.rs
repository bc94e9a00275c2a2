use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::{fmt, time::Duration};
use tracing::debug;

use crate::{
    config::Endpoints,
    error::{Endpoint, WeatherError},
    model::{CityQuery, Coordinates, GeoMatch, WeatherSummary},
};

use super::{Geocoder, WeatherFetcher};

/// OpenWeather client serving both the geocoding and the current weather call.
#[derive(Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    endpoints: Endpoints,
    match_limit: u8,
    http: Client,
}

impl fmt::Debug for OpenWeatherClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenWeatherClient")
            .field("api_key", &"<redacted>")
            .field("endpoints", &self.endpoints)
            .field("match_limit", &self.match_limit)
            .finish()
    }
}

impl OpenWeatherClient {
    pub fn new(
        api_key: String,
        endpoints: Endpoints,
        match_limit: u8,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WeatherError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            endpoints,
            match_limit,
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, WeatherError> {
        let res = self
            .http
            .get(url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| WeatherError::network(endpoint, describe_transport_error(&e)))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            WeatherError::network(endpoint, format!("failed to read response body: {e}"))
        })?;

        debug!(%endpoint, %status, bytes = body.len(), "received response");

        if !status.is_success() {
            return Err(WeatherError::Network {
                endpoint,
                status: Some(status.as_u16()),
                message: format!("status {}: {}", status, truncate_body(&body)),
            });
        }

        serde_json::from_str(&body).map_err(|e| WeatherError::decode(endpoint, e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct OwGeoMatch {
    name: String,
    lat: f64,
    lon: f64,
    country: Option<String>,
    state: Option<String>,
}

impl From<OwGeoMatch> for GeoMatch {
    fn from(m: OwGeoMatch) -> Self {
        GeoMatch {
            name: m.name,
            coordinates: Coordinates::new(m.lat, m.lon),
            country: m.country,
            state: m.state,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: Option<i64>,
    main: OwMain,
    weather: Vec<OwCondition>,
    wind: OwWind,
}

/// The provider ranks matches by its own relevance; we trust the first one.
/// Ambiguous names (Paris, FR vs Paris, US) resolve to whatever ranks highest.
fn select_first_match(matches: Vec<OwGeoMatch>) -> Option<OwGeoMatch> {
    matches.into_iter().next()
}

/// The first conditions entry is the primary one; the rest are ignored.
fn select_primary_condition(conditions: &[OwCondition]) -> Option<&OwCondition> {
    conditions.first()
}

#[async_trait]
impl Geocoder for OpenWeatherClient {
    async fn locate(&self, query: &CityQuery) -> Result<GeoMatch, WeatherError> {
        let city = query.trimmed();
        if city.is_empty() {
            return Err(WeatherError::InvalidQuery("city name is empty".to_string()));
        }

        debug!(city, limit = self.match_limit, "geocoding lookup");

        let limit = self.match_limit.to_string();
        let matches: Vec<OwGeoMatch> = self
            .get_json(
                Endpoint::Geocoding,
                &self.endpoints.geocoding_url,
                &[("q", city), ("limit", limit.as_str())],
            )
            .await?;

        let candidates = matches.len();
        let chosen = select_first_match(matches).ok_or_else(|| {
            WeatherError::empty(Endpoint::Geocoding, format!("No location found for '{city}'"))
        })?;

        debug!(
            candidates,
            name = %chosen.name,
            lat = chosen.lat,
            lon = chosen.lon,
            "selected first geocoding match"
        );

        Ok(chosen.into())
    }
}

#[async_trait]
impl WeatherFetcher for OpenWeatherClient {
    async fn current(&self, coordinates: Coordinates) -> Result<WeatherSummary, WeatherError> {
        debug!(%coordinates, "current weather lookup");

        let lat = coordinates.latitude.to_string();
        let lon = coordinates.longitude.to_string();
        let parsed: OwCurrentResponse = self
            .get_json(
                Endpoint::Weather,
                &self.endpoints.weather_url,
                &[("lat", lat.as_str()), ("lon", lon.as_str()), ("units", "metric")],
            )
            .await?;

        let condition = select_primary_condition(&parsed.weather).ok_or_else(|| {
            WeatherError::empty(
                Endpoint::Weather,
                format!("No weather conditions reported for {coordinates}"),
            )
        })?;

        let observation_time = parsed
            .dt
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);

        Ok(WeatherSummary {
            condition: condition.main.clone(),
            description: condition.description.clone(),
            temperature_c: parsed.main.temp,
            feels_like_c: parsed.main.feels_like,
            humidity_pct: parsed.main.humidity,
            wind_speed_mps: parsed.wind.speed,
            observation_time,
        })
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("could not connect: {err}")
    } else {
        err.to_string()
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
