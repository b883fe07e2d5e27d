use std::fmt;

use serde::{Deserialize, Serialize};

pub mod advice;
pub mod gemini;
pub mod geo;
pub mod panel;
pub mod session;
pub mod simulation;
pub mod speed;

pub use session::{Completion, RequestTicket, RouteSession, SessionStatus};
pub use simulation::{ClockDirective, PlaybackState, Simulation, SimulationState, TickUpdate};
pub use speed::SpeedMapping;

/// Number of elevation samples requested along a route.
pub const DEFAULT_ELEVATION_SAMPLES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    #[serde(alias = "lng")]
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelMode {
    #[default]
    Bicycling,
    Walking,
    Driving,
}

impl TravelMode {
    pub const ALL: [TravelMode; 3] = [
        TravelMode::Bicycling,
        TravelMode::Walking,
        TravelMode::Driving,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TravelMode::Bicycling => "BICYCLING",
            TravelMode::Walking => "WALKING",
            TravelMode::Driving => "DRIVING",
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TravelMode {
    type Err = RouteInputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BICYCLING" | "BIKE" => Ok(TravelMode::Bicycling),
            "WALKING" | "FOOT" => Ok(TravelMode::Walking),
            "DRIVING" | "CAR" => Ok(TravelMode::Driving),
            _ => Err(RouteInputError::UnknownMode(s.to_string())),
        }
    }
}

/// Terrain height reported by the elevation collaborator. `resolution` is the
/// horizontal sampling resolution in metres and is only displayed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationSample {
    pub elevation: f64,
    pub location: Coordinate,
    pub resolution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub mode: TravelMode,
}

impl RouteRequest {
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        mode: TravelMode,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            mode,
        }
    }

    pub fn validate(&self) -> Result<(), RouteInputError> {
        if self.origin.trim().is_empty() {
            return Err(RouteInputError::MissingOrigin);
        }
        if self.destination.trim().is_empty() {
            return Err(RouteInputError::MissingDestination);
        }
        Ok(())
    }
}

/// What the routing collaborator hands back before elevation is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directions {
    pub path: Vec<Coordinate>,
    pub distance_label: String,
    pub duration_label: String,
}

/// A fully resolved route: the path and the elevation profile sampled along it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub origin: String,
    pub destination: String,
    pub distance_label: String,
    pub duration_label: String,
    path: Vec<Coordinate>,
    pub elevation: Vec<ElevationSample>,
}

impl Route {
    pub fn new(
        request: &RouteRequest,
        directions: Directions,
        elevation: Vec<ElevationSample>,
    ) -> Result<Self, RouteInputError> {
        if directions.path.is_empty() {
            return Err(RouteInputError::EmptyPath);
        }
        Ok(Self {
            origin: request.origin.clone(),
            destination: request.destination.clone(),
            distance_label: directions.distance_label,
            duration_label: directions.duration_label,
            path: directions.path,
            elevation,
        })
    }

    pub fn path(&self) -> &[Coordinate] {
        &self.path
    }

    /// Grade in percent between elevation sample `index` and the next one.
    pub fn grade_at(&self, index: usize) -> Option<f64> {
        let a = self.elevation.get(index)?;
        let b = self.elevation.get(index + 1)?;
        let run_m = geo::haversine_km(a.location, b.location) * 1000.0;
        if run_m < f64::EPSILON {
            return Some(0.0);
        }
        Some((b.elevation - a.elevation) / run_m * 100.0)
    }

    pub fn total_ascent(&self) -> f64 {
        self.elevation
            .windows(2)
            .map(|w| (w[1].elevation - w[0].elevation).max(0.0))
            .sum()
    }
}

/// A clicked or searched location, waiting to become origin or destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedLocation {
    pub lat: f64,
    #[serde(alias = "lng")]
    pub lon: f64,
    pub formatted_address: String,
}

impl SelectedLocation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteInputError {
    MissingOrigin,
    MissingDestination,
    UnknownMode(String),
    EmptyPath,
}

impl fmt::Display for RouteInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteInputError::MissingOrigin => f.write_str("origin is required"),
            RouteInputError::MissingDestination => f.write_str("destination is required"),
            RouteInputError::UnknownMode(mode) => write!(f, "unknown travel mode `{mode}`"),
            RouteInputError::EmptyPath => f.write_str("route has no path points"),
        }
    }
}

impl std::error::Error for RouteInputError {}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// `n` points heading due east along the equator, ~11 m apart.
    pub fn eastbound_path(n: usize) -> Vec<Coordinate> {
        (0..n)
            .map(|i| Coordinate {
                lat: 0.0,
                lon: i as f64 * 0.0001,
            })
            .collect()
    }

    pub fn route_with(path: Vec<Coordinate>, samples: usize) -> Route {
        let elevation = (0..samples)
            .map(|i| ElevationSample {
                elevation: 100.0 + i as f64,
                location: Coordinate {
                    lat: 0.0,
                    lon: i as f64 * 0.001,
                },
                resolution: 9.5,
            })
            .collect();
        Route::new(
            &RouteRequest::new("A", "B", TravelMode::Bicycling),
            Directions {
                path,
                distance_label: "1.2 km".into(),
                duration_label: "5 mins".into(),
            },
            elevation,
        )
        .expect("non-empty path")
    }
}
