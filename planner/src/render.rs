//! Rendering handles owned by the session controller for the active route.

use shared::{Coordinate, Route, geo};
use tracing::{debug, info};

/// Imperative map/panorama surface. Only the session controller holds one, so
/// the marker, panorama and route overlay have a single owner.
pub trait RenderSurface: Send {
    fn draw_route(&mut self, route: &Route);
    /// Remove the route overlay and every marker tied to it.
    fn clear_route(&mut self);
    fn move_marker(&mut self, position: Coordinate, heading: f64);
    fn show_progress(&mut self, sample_index: usize);
    fn panorama_visible(&self) -> bool;
    fn set_panorama_visible(&mut self, visible: bool);
    fn set_panorama_view(&mut self, position: Coordinate, heading: f64);
}

/// A headless surface that narrates marker movement into the log.
#[derive(Debug, Default)]
pub struct LogSurface {
    panorama: bool,
    marker: Option<Coordinate>,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker(&self) -> Option<Coordinate> {
        self.marker
    }
}

impl RenderSurface for LogSurface {
    fn draw_route(&mut self, route: &Route) {
        info!(
            "route {} -> {}: {} ({}), {} points over {:.1} km, {} elevation samples, ascent {:.0} m",
            route.origin,
            route.destination,
            route.distance_label,
            route.duration_label,
            route.path().len(),
            geo::path_length_km(route.path()),
            route.elevation.len(),
            route.total_ascent()
        );
    }

    fn clear_route(&mut self) {
        debug!("route overlay cleared");
        self.marker = None;
    }

    fn move_marker(&mut self, position: Coordinate, heading: f64) {
        self.marker = Some(position);
        info!(
            "marker at {:.5},{:.5} heading {:>5.1}° {}",
            position.lat,
            position.lon,
            heading,
            geo::cardinal(heading)
        );
    }

    fn show_progress(&mut self, sample_index: usize) {
        debug!("elevation progress at sample {sample_index}");
    }

    fn panorama_visible(&self) -> bool {
        self.panorama
    }

    fn set_panorama_visible(&mut self, visible: bool) {
        self.panorama = visible;
        debug!("panorama visible={visible}");
    }

    fn set_panorama_view(&mut self, position: Coordinate, heading: f64) {
        debug!(
            "panorama at {:.5},{:.5} facing {}",
            position.lat,
            position.lon,
            geo::cardinal(heading)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_follows_moves_until_cleared() {
        let mut surface = LogSurface::new();
        assert_eq!(surface.marker(), None);

        let position = Coordinate { lat: 45.1885, lon: 5.7245 };
        surface.move_marker(position, 90.0);
        assert_eq!(surface.marker(), Some(position));

        surface.clear_route();
        assert_eq!(surface.marker(), None);
    }

    #[test]
    fn test_panorama_visibility_is_remembered() {
        let mut surface = LogSurface::new();
        assert!(!surface.panorama_visible());
        surface.set_panorama_visible(true);
        assert!(surface.panorama_visible());
    }
}
