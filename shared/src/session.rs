//! The single active route and the playback bound to it.

use serde::{Deserialize, Serialize};

use crate::{
    Coordinate, Route, RouteInputError, RouteRequest,
    simulation::{ClockDirective, PlaybackState, Simulation, TickUpdate},
};

/// Identifies one route request. Only the most recently issued ticket may
/// mutate the session; anything older is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestTicket(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Empty,
    Loading,
    Loaded,
    Cleared,
}

/// Result of handing a collaborator response back to the session.
#[derive(Debug)]
pub enum Completion<E> {
    /// The route replaced the held one; the driver must cancel its pending tick.
    Applied,
    /// The request failed; any previously held route is untouched.
    Failed(E),
    /// A newer request (or a clear) superseded this one; nothing changed.
    Stale,
}

/// What a tick did, with the elevation-chart index already resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionTick {
    pub update: TickUpdate,
    pub progress_sample: Option<usize>,
    pub next: ClockDirective,
}

#[derive(Debug, Clone)]
pub struct RouteSession {
    route: Option<Route>,
    simulation: Simulation,
    status: SessionStatus,
    latest_ticket: u64,
}

impl RouteSession {
    pub fn new(tick_interval_ms: u32) -> Self {
        Self {
            route: None,
            simulation: Simulation::new(tick_interval_ms),
            status: SessionStatus::Empty,
            latest_ticket: 0,
        }
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == SessionStatus::Loading
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.0 == self.latest_ticket && self.latest_ticket != 0
    }

    fn path(&self) -> &[Coordinate] {
        self.route.as_ref().map(Route::path).unwrap_or(&[])
    }

    /// Validate `request` and issue a ticket that supersedes every earlier one.
    /// The held route stays in place until the new one resolves.
    pub fn begin_request(
        &mut self,
        request: &RouteRequest,
    ) -> Result<RequestTicket, RouteInputError> {
        request.validate()?;
        self.latest_ticket += 1;
        self.status = SessionStatus::Loading;
        Ok(RequestTicket(self.latest_ticket))
    }

    pub fn complete<E>(
        &mut self,
        ticket: RequestTicket,
        result: Result<Route, E>,
    ) -> Completion<E> {
        if !self.is_current(ticket) || self.status != SessionStatus::Loading {
            return Completion::Stale;
        }
        match result {
            Ok(route) => {
                self.route = Some(route);
                self.simulation.rewind();
                self.status = SessionStatus::Loaded;
                Completion::Applied
            }
            Err(err) => {
                self.status = if self.route.is_some() {
                    SessionStatus::Loaded
                } else {
                    SessionStatus::Empty
                };
                Completion::Failed(err)
            }
        }
    }

    /// Drop the route, reset playback, and invalidate any pending request.
    pub fn clear(&mut self) -> ClockDirective {
        self.route = None;
        self.latest_ticket += 1;
        self.status = SessionStatus::Cleared;
        self.simulation.rewind()
    }

    pub fn play(&mut self) -> ClockDirective {
        let path = self.route.as_ref().map(Route::path).unwrap_or(&[]);
        self.simulation.play(path)
    }

    pub fn pause(&mut self) -> ClockDirective {
        self.simulation.pause()
    }

    pub fn toggle_playback(&mut self) -> ClockDirective {
        let path = self.route.as_ref().map(Route::path).unwrap_or(&[]);
        self.simulation.toggle(path)
    }

    pub fn reset(&mut self) -> ClockDirective {
        let path = self.route.as_ref().map(Route::path).unwrap_or(&[]);
        self.simulation.reset(path)
    }

    pub fn set_tick_interval(&mut self, tick_interval_ms: u32) -> ClockDirective {
        self.simulation.set_tick_interval(tick_interval_ms)
    }

    pub fn tick(&mut self) -> Option<SessionTick> {
        let route = self.route.as_ref()?;
        let outcome = self.simulation.tick(route.path())?;
        let progress_sample = self
            .simulation
            .progress_sample(route.path().len(), route.elevation.len());
        Some(SessionTick {
            update: outcome.update,
            progress_sample,
            next: outcome.next,
        })
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.simulation.state()
    }

    /// Where a panorama should open: the marker's point, or the start once the
    /// marker has run off the end.
    pub fn panorama_anchor(&self) -> Option<Coordinate> {
        let path = self.path();
        path.get(self.simulation.current_index())
            .or_else(|| path.first())
            .copied()
    }

    pub fn current_grade(&self) -> Option<f64> {
        let route = self.route.as_ref()?;
        if self.simulation.current_index() == 0 {
            return Some(0.0);
        }
        let sample = self
            .simulation
            .progress_sample(route.path().len(), route.elevation.len())?;
        route.grade_at(sample.min(route.elevation.len().saturating_sub(2)))
    }
}
