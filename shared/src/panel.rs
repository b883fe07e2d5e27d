use serde::{Deserialize, Serialize};

use crate::{RouteRequest, SelectedLocation, SpeedMapping, TravelMode};

/// Transient form state of the planner panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub origin: String,
    pub destination: String,
    pub search_term: String,
    pub mode: TravelMode,
    pub speed_kmh: f64,
    pub selection: Option<SelectedLocation>,
    pub open: bool,
    pub tip_visible: bool,
}

impl Default for Panel {
    fn default() -> Self {
        Self {
            origin: String::new(),
            destination: String::new(),
            search_term: String::new(),
            mode: TravelMode::default(),
            speed_kmh: SpeedMapping::DEFAULT_SPEED_KMH,
            selection: None,
            open: true,
            tip_visible: true,
        }
    }
}

impl Panel {
    pub fn on_select_location(&mut self, location: SelectedLocation) {
        self.selection = Some(location);
    }

    pub fn dismiss_selection(&mut self) -> Option<SelectedLocation> {
        self.selection.take()
    }

    /// Copy the selected address into the origin field and dismiss the popup.
    pub fn on_set_as_origin(&mut self) -> bool {
        match self.selection.take() {
            Some(location) => {
                self.origin = location.formatted_address;
                true
            }
            None => false,
        }
    }

    pub fn on_set_as_destination(&mut self) -> bool {
        match self.selection.take() {
            Some(location) => {
                self.destination = location.formatted_address;
                true
            }
            None => false,
        }
    }

    pub fn on_mode_change(&mut self, mode: TravelMode) {
        self.mode = mode;
    }

    /// Returns the new tick interval for `speed_kmh`.
    pub fn on_speed_change(&mut self, speed_kmh: f64, mapping: &SpeedMapping) -> u32 {
        self.speed_kmh = speed_kmh;
        mapping.interval_ms(speed_kmh)
    }

    pub fn can_plan(&self, loading: bool) -> bool {
        !loading && !self.origin.trim().is_empty() && !self.destination.trim().is_empty()
    }

    pub fn route_request(&self) -> RouteRequest {
        RouteRequest::new(self.origin.trim(), self.destination.trim(), self.mode)
    }

    pub fn toggle_open(&mut self) {
        self.open = !self.open;
    }
}
