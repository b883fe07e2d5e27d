//! Google Maps Platform web services: directions, elevation and geocoding.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, de::DeserializeOwned};
use shared::{Coordinate, Directions, ElevationSample, RouteRequest, SelectedLocation, TravelMode};
use thiserror::Error;
use tracing::debug;

use crate::{
    collaborators::{ElevationService, Geocoder, RoutingService},
    config::GoogleMapsConfig,
    error::PlannerError,
    polyline::{self, PolylineError},
};

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

#[derive(Debug, Error)]
pub enum GoogleMapsError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("service answered {status}{}", detail(.message))]
    Status {
        status: String,
        message: Option<String>,
    },

    #[error("no results")]
    NoResults,

    #[error("invalid overview polyline: {0}")]
    Polyline(#[from] PolylineError),
}

pub struct GoogleMapsClient {
    config: GoogleMapsConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Deserialize)]
struct DirectionsRoute {
    overview_polyline: EncodedPolyline,
    #[serde(default)]
    legs: Vec<DirectionsLeg>,
}

#[derive(Deserialize)]
struct EncodedPolyline {
    points: String,
}

#[derive(Deserialize)]
struct DirectionsLeg {
    distance: Option<TextValue>,
    duration: Option<TextValue>,
}

#[derive(Deserialize)]
struct TextValue {
    text: String,
}

#[derive(Deserialize)]
struct ElevationResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<ElevationSample>,
}

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: GeocodeGeometry,
}

#[derive(Deserialize)]
struct GeocodeGeometry {
    location: Coordinate,
}

fn detail(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

fn mode_param(mode: TravelMode) -> &'static str {
    match mode {
        TravelMode::Bicycling => "bicycling",
        TravelMode::Walking => "walking",
        TravelMode::Driving => "driving",
    }
}

/// Map the `status` field every Maps web service returns.
fn check_status(status: &str, message: Option<String>) -> Result<(), GoogleMapsError> {
    match status {
        "OK" => Ok(()),
        "ZERO_RESULTS" | "NOT_FOUND" => Err(GoogleMapsError::NoResults),
        other => Err(GoogleMapsError::Status {
            status: other.to_string(),
            message,
        }),
    }
}

impl GoogleMapsClient {
    pub fn new(config: GoogleMapsConfig) -> Result<Self, GoogleMapsError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { config, client })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        service: &str,
        query: &[(&str, String)],
    ) -> Result<T, GoogleMapsError> {
        let url = format!("{}/{service}/json", self.config.base_url.trim_end_matches('/'));
        debug!("GoogleMaps: GET {url}");
        let response = self
            .client
            .get(url)
            .query(query)
            .query(&[("key", &self.config.api_key)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GoogleMapsError::Api { status, message });
        }

        Ok(response.json().await?)
    }

    pub async fn fetch_directions(
        &self,
        req: &RouteRequest,
    ) -> Result<Directions, GoogleMapsError> {
        let body: DirectionsResponse = self
            .get_json(
                "directions",
                &[
                    ("origin", req.origin.clone()),
                    ("destination", req.destination.clone()),
                    ("mode", mode_param(req.mode).to_string()),
                ],
            )
            .await?;
        check_status(&body.status, body.error_message)?;

        let route = body.routes.into_iter().next().ok_or(GoogleMapsError::NoResults)?;
        let path = polyline::decode(&route.overview_polyline.points)?;
        if path.is_empty() {
            return Err(GoogleMapsError::NoResults);
        }
        let leg = route.legs.into_iter().next();
        let (distance, duration) = match leg {
            Some(leg) => (leg.distance, leg.duration),
            None => (None, None),
        };

        Ok(Directions {
            path,
            distance_label: distance.map(|d| d.text).unwrap_or_default(),
            duration_label: duration.map(|d| d.text).unwrap_or_default(),
        })
    }

    pub async fn fetch_elevation(
        &self,
        path: &[Coordinate],
        samples: usize,
    ) -> Result<Vec<ElevationSample>, GoogleMapsError> {
        let body: ElevationResponse = self
            .get_json(
                "elevation",
                &[
                    ("path", format!("enc:{}", polyline::encode(path))),
                    ("samples", samples.to_string()),
                ],
            )
            .await?;
        check_status(&body.status, body.error_message)?;
        Ok(body.results)
    }

    async fn geocode_query(
        &self,
        query: (&str, String),
    ) -> Result<SelectedLocation, GoogleMapsError> {
        let body: GeocodeResponse = self.get_json("geocode", &[query]).await?;
        check_status(&body.status, body.error_message)?;
        let first = body.results.into_iter().next().ok_or(GoogleMapsError::NoResults)?;
        Ok(SelectedLocation {
            lat: first.geometry.location.lat,
            lon: first.geometry.location.lon,
            formatted_address: first.formatted_address,
        })
    }
}

#[async_trait]
impl RoutingService for GoogleMapsClient {
    async fn route(&self, req: &RouteRequest) -> Result<Directions, PlannerError> {
        self.fetch_directions(req).await.map_err(PlannerError::routing)
    }
}

#[async_trait]
impl ElevationService for GoogleMapsClient {
    async fn along_path(
        &self,
        path: &[Coordinate],
        samples: usize,
    ) -> Result<Vec<ElevationSample>, PlannerError> {
        self.fetch_elevation(path, samples)
            .await
            .map_err(PlannerError::elevation)
    }
}

#[async_trait]
impl Geocoder for GoogleMapsClient {
    async fn geocode(&self, address: &str) -> Result<SelectedLocation, PlannerError> {
        self.geocode_query(("address", address.to_string()))
            .await
            .map_err(PlannerError::geocoding)
    }

    async fn reverse_geocode(&self, coord: Coordinate) -> Result<SelectedLocation, PlannerError> {
        let mut location = self
            .geocode_query(("latlng", format!("{},{}", coord.lat, coord.lon)))
            .await
            .map_err(PlannerError::geocoding)?;
        // Keep the clicked point rather than the address centroid.
        location.lat = coord.lat;
        location.lon = coord.lon;
        Ok(location)
    }
}
