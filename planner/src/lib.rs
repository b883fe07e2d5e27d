pub mod advice;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod error;
pub mod google;
pub mod polyline;
pub mod render;
pub mod speech;

pub use collaborators::{Advisor, Collaborators, ElevationService, Geocoder, RoutingService};
pub use config::{PlannerConfig, SessionConfig};
pub use controller::{SessionController, SessionHandle, SessionSnapshot};
pub use error::{ConfigError, PlannerError};
