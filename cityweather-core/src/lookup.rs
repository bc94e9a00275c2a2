//! City -> coordinates -> current weather.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    error::WeatherError,
    model::{CityQuery, WeatherReport},
    provider::{Geocoder, WeatherFetcher},
    render::display_city_name,
};

/// Run one city through the geocoder and then the weather fetcher.
///
/// Both calls race `cancel`; whichever finishes first wins. The first failing
/// step ends the lookup, nothing is retried.
pub async fn lookup(
    geocoder: &dyn Geocoder,
    fetcher: &dyn WeatherFetcher,
    query: &CityQuery,
    cancel: &CancellationToken,
) -> Result<WeatherReport, WeatherError> {
    if query.is_blank() {
        return Err(WeatherError::InvalidQuery("city name is empty".to_string()));
    }

    let location = cancellable(cancel, geocoder.locate(query)).await?;
    debug!(name = %location.name, coordinates = %location.coordinates, "resolved city");

    let weather = cancellable(cancel, fetcher.current(location.coordinates)).await?;
    info!(city = query.trimmed(), condition = %weather.condition, "lookup complete");

    Ok(WeatherReport {
        city: display_city_name(query.trimmed()),
        location,
        weather,
    })
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, WeatherError>>,
) -> Result<T, WeatherError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WeatherError::Cancelled),
        res = fut => res,
    }
}
