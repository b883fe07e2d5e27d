use shared::RouteInputError;
use thiserror::Error;

use crate::{advice::GeminiError, google::GoogleMapsError};

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid route request: {0}")]
    InvalidRequest(#[from] RouteInputError),
    #[error("no route could be found: {0}")]
    RoutingFailed(String),
    #[error("location could not be resolved: {0}")]
    GeocodingFailed(String),
    #[error("elevation profile unavailable: {0}")]
    ElevationUnavailable(String),
    #[error("coaching tip unavailable: {0}")]
    AdviceGenerationFailed(String),
    #[error("request superseded by a newer one")]
    Superseded,
    #[error("planner session has shut down")]
    SessionClosed,
}

impl PlannerError {
    pub fn routing(err: GoogleMapsError) -> Self {
        Self::RoutingFailed(err.to_string())
    }

    pub fn geocoding(err: GoogleMapsError) -> Self {
        Self::GeocodingFailed(err.to_string())
    }

    pub fn elevation(err: GoogleMapsError) -> Self {
        Self::ElevationUnavailable(err.to_string())
    }

    /// Errors shown to the user as a dismissible notice.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_)
                | Self::RoutingFailed(_)
                | Self::GeocodingFailed(_)
                | Self::ElevationUnavailable(_)
        )
    }
}

impl From<GeminiError> for PlannerError {
    fn from(err: GeminiError) -> Self {
        Self::AdviceGenerationFailed(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("invalid value for {field}: {value}")]
    Invalid { field: &'static str, value: String },
}
