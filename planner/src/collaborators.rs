//! Seams to the external services the planner orchestrates.
//!
//! Each collaborator is a single-shot async operation returning a result or a
//! [`PlannerError`]. Production implementations live in [`crate::google`] and
//! [`crate::advice`]; tests plug in fakes.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{Coordinate, Directions, ElevationSample, RouteRequest, SelectedLocation};

use crate::error::PlannerError;

#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Resolve a path between two free-text places.
    ///
    /// Must fail with [`PlannerError::RoutingFailed`] when no route exists.
    async fn route(&self, req: &RouteRequest) -> Result<Directions, PlannerError>;
}

#[async_trait]
pub trait ElevationService: Send + Sync {
    /// Sample `samples` elevations evenly along `path`.
    async fn along_path(
        &self,
        path: &[Coordinate],
        samples: usize,
    ) -> Result<Vec<ElevationSample>, PlannerError>;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<SelectedLocation, PlannerError>;
    async fn reverse_geocode(&self, coord: Coordinate) -> Result<SelectedLocation, PlannerError>;
}

#[async_trait]
pub trait Advisor: Send + Sync {
    /// One short coaching sentence for an elevation profile.
    async fn advise(&self, elevation: &[ElevationSample]) -> Result<String, PlannerError>;
}

/// The collaborators a session controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub routing: Arc<dyn RoutingService>,
    pub elevation: Arc<dyn ElevationService>,
    /// `None` when no advice credential is configured.
    pub advisor: Option<Arc<dyn Advisor>>,
}
