//! Playback of a route as a moving marker.
//!
//! [`Simulation`] is the state machine behind the play/pause/reset controls and
//! the step function of the playback clock. It never touches a timer itself:
//! every command and tick returns a [`ClockDirective`] telling the driver
//! (a tokio task natively, a Seed timeout command in the browser) whether to
//! arm, re-arm or cancel its single pending tick.

use serde::{Deserialize, Serialize};

use crate::{Coordinate, geo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No route, or a route that was loaded but never played.
    Idle,
    Playing,
    /// Paused mid-route; the index is retained.
    Stopped,
    /// `current_index == path.len()`.
    Finished,
}

/// Instruction for whoever owns the tick timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDirective {
    /// Replace any pending tick with a new one firing after this many ms.
    Schedule(u32),
    /// Drop the pending tick, if any.
    Cancel,
    /// Leave the pending tick alone.
    Keep,
}

/// Snapshot of the playback counters, as exposed to views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationState {
    pub is_active: bool,
    pub current_index: usize,
    pub tick_interval_ms: u32,
}

/// Position and heading produced by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickUpdate {
    /// Index of the path point the marker moved to.
    pub index: usize,
    pub position: Coordinate,
    pub heading: f64,
    /// `current_index` after the tick.
    pub current_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub update: TickUpdate,
    pub next: ClockDirective,
}

#[derive(Debug, Clone)]
pub struct Simulation {
    state: PlaybackState,
    current_index: usize,
    tick_interval_ms: u32,
    heading: f64,
}

impl Simulation {
    pub fn new(tick_interval_ms: u32) -> Self {
        Self {
            state: PlaybackState::Idle,
            current_index: 0,
            tick_interval_ms: tick_interval_ms.max(1),
            heading: 0.0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn tick_interval_ms(&self) -> u32 {
        self.tick_interval_ms
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn snapshot(&self) -> SimulationState {
        SimulationState {
            is_active: self.is_playing(),
            current_index: self.current_index,
            tick_interval_ms: self.tick_interval_ms,
        }
    }

    /// Back to `Idle` at index 0. The tick interval survives a reload.
    pub fn rewind(&mut self) -> ClockDirective {
        self.state = PlaybackState::Idle;
        self.current_index = 0;
        self.heading = 0.0;
        ClockDirective::Cancel
    }

    pub fn play(&mut self, path: &[Coordinate]) -> ClockDirective {
        match self.state {
            PlaybackState::Playing => return ClockDirective::Keep,
            PlaybackState::Idle if path.is_empty() => return ClockDirective::Keep,
            PlaybackState::Finished => {
                self.current_index = 0;
                self.heading = 0.0;
            }
            PlaybackState::Idle | PlaybackState::Stopped => {}
        }

        if path.len() <= 1 {
            self.current_index = path.len();
            self.state = PlaybackState::Finished;
            return ClockDirective::Cancel;
        }

        self.state = PlaybackState::Playing;
        ClockDirective::Schedule(self.tick_interval_ms)
    }

    pub fn pause(&mut self) -> ClockDirective {
        if self.state != PlaybackState::Playing {
            return ClockDirective::Keep;
        }
        self.state = PlaybackState::Stopped;
        ClockDirective::Cancel
    }

    /// Play when not playing, pause when playing.
    pub fn toggle(&mut self, path: &[Coordinate]) -> ClockDirective {
        if self.is_playing() {
            self.pause()
        } else {
            self.play(path)
        }
    }

    /// Restart from index 0. Playback keeps running if it was running.
    pub fn reset(&mut self, path: &[Coordinate]) -> ClockDirective {
        if path.is_empty() {
            return ClockDirective::Keep;
        }
        self.current_index = 0;
        self.heading = 0.0;
        if self.is_playing() {
            ClockDirective::Schedule(self.tick_interval_ms)
        } else {
            self.state = PlaybackState::Stopped;
            ClockDirective::Cancel
        }
    }

    /// Takes effect from the next scheduled tick; a pending tick keeps its delay.
    pub fn set_tick_interval(&mut self, tick_interval_ms: u32) -> ClockDirective {
        self.tick_interval_ms = tick_interval_ms.max(1);
        ClockDirective::Keep
    }

    /// Advance one point along `path`. Returns `None` when not playing, which is
    /// how a stray timer firing after a pause is absorbed.
    pub fn tick(&mut self, path: &[Coordinate]) -> Option<TickOutcome> {
        if self.state != PlaybackState::Playing {
            return None;
        }
        let Some(&position) = path.get(self.current_index) else {
            self.current_index = path.len();
            self.state = PlaybackState::Finished;
            return None;
        };

        if let Some(&next) = path.get(self.current_index + 1) {
            self.heading = geo::bearing(position, next);
        }

        let index = self.current_index;
        self.current_index += 1;

        let next = if self.current_index >= path.len() {
            self.state = PlaybackState::Finished;
            ClockDirective::Cancel
        } else {
            ClockDirective::Schedule(self.tick_interval_ms)
        };

        Some(TickOutcome {
            update: TickUpdate {
                index,
                position,
                heading: self.heading,
                current_index: self.current_index,
            },
            next,
        })
    }

    /// Elevation-chart index matching the current playback progress.
    pub fn progress_sample(&self, path_len: usize, sample_count: usize) -> Option<usize> {
        if path_len == 0 || sample_count == 0 {
            return None;
        }
        let fraction = self.current_index.min(path_len) as f64 / path_len as f64;
        Some((fraction * (sample_count - 1) as f64).floor() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::eastbound_path;

    fn run_to_end(sim: &mut Simulation, path: &[Coordinate]) -> Vec<TickUpdate> {
        let mut updates = Vec::new();
        while let Some(outcome) = sim.tick(path) {
            updates.push(outcome.update);
        }
        updates
    }

    #[test]
    fn test_play_to_completion_ticks_once_per_point() {
        let path = eastbound_path(7);
        let mut sim = Simulation::new(500);
        assert_eq!(sim.play(&path), ClockDirective::Schedule(500));

        let updates = run_to_end(&mut sim, &path);
        assert_eq!(updates.len(), 7);
        assert_eq!(sim.state(), PlaybackState::Finished);
        assert_eq!(sim.current_index(), 7);
        assert!(!sim.snapshot().is_active);
        let indices: Vec<usize> = updates.iter().map(|u| u.index).collect();
        assert_eq!(indices, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_last_tick_cancels_the_clock() {
        let path = eastbound_path(2);
        let mut sim = Simulation::new(100);
        sim.play(&path);
        assert_eq!(sim.tick(&path).unwrap().next, ClockDirective::Schedule(100));
        assert_eq!(sim.tick(&path).unwrap().next, ClockDirective::Cancel);
        assert!(sim.tick(&path).is_none());
    }

    #[test]
    fn test_short_paths_finish_immediately() {
        for len in [0usize, 1] {
            let path = eastbound_path(len);
            let mut sim = Simulation::new(500);
            // An empty path means nothing is loaded; play is ignored.
            if len == 0 {
                sim.reset(&path);
                assert_eq!(sim.play(&path), ClockDirective::Keep);
                assert_eq!(sim.state(), PlaybackState::Idle);
                continue;
            }
            assert_eq!(sim.play(&path), ClockDirective::Cancel);
            assert_eq!(sim.state(), PlaybackState::Finished);
            assert_eq!(sim.current_index(), 1);
            assert!(sim.tick(&path).is_none());
        }
    }

    #[test]
    fn test_eastbound_headings() {
        let path = eastbound_path(5);
        let mut sim = Simulation::new(500);
        sim.play(&path);
        let updates = run_to_end(&mut sim, &path);
        assert_eq!(updates.len(), 5);
        for update in &updates {
            assert!((update.heading - 90.0).abs() < 0.01, "heading {}", update.heading);
        }
        // The last point has no successor and reuses the previous bearing.
        assert_eq!(updates[4].heading, updates[3].heading);
    }

    #[test]
    fn test_pause_and_resume_continue_from_same_index() {
        let path = eastbound_path(6);
        let mut sim = Simulation::new(500);
        sim.play(&path);
        sim.tick(&path);
        sim.tick(&path);
        assert_eq!(sim.pause(), ClockDirective::Cancel);
        assert_eq!(sim.state(), PlaybackState::Stopped);
        assert!(sim.tick(&path).is_none(), "stray tick after pause");
        assert_eq!(sim.current_index(), 2);

        assert_eq!(sim.play(&path), ClockDirective::Schedule(500));
        assert_eq!(sim.tick(&path).unwrap().update.index, 2);
    }

    #[test]
    fn test_play_is_noop_while_playing() {
        let path = eastbound_path(3);
        let mut sim = Simulation::new(500);
        sim.play(&path);
        assert_eq!(sim.play(&path), ClockDirective::Keep);
    }

    #[test]
    fn test_reset_while_playing_keeps_playing() {
        let path = eastbound_path(4);
        let mut sim = Simulation::new(300);
        sim.play(&path);
        sim.tick(&path);
        sim.tick(&path);
        assert_eq!(sim.reset(&path), ClockDirective::Schedule(300));
        assert_eq!(sim.state(), PlaybackState::Playing);
        assert_eq!(sim.tick(&path).unwrap().update.index, 0);
    }

    #[test]
    fn test_reset_while_stopped_or_finished() {
        let path = eastbound_path(2);
        let mut sim = Simulation::new(300);
        sim.play(&path);
        run_to_end(&mut sim, &path);
        assert_eq!(sim.reset(&path), ClockDirective::Cancel);
        assert_eq!(sim.state(), PlaybackState::Stopped);
        assert_eq!(sim.current_index(), 0);
    }

    #[test]
    fn test_play_after_finish_restarts() {
        let path = eastbound_path(3);
        let mut sim = Simulation::new(300);
        sim.play(&path);
        run_to_end(&mut sim, &path);
        assert_eq!(sim.play(&path), ClockDirective::Schedule(300));
        assert_eq!(sim.current_index(), 0);
    }

    #[test]
    fn test_interval_change_does_not_touch_pending_tick() {
        let path = eastbound_path(3);
        let mut sim = Simulation::new(500);
        sim.play(&path);
        assert_eq!(sim.set_tick_interval(100), ClockDirective::Keep);
        assert_eq!(sim.tick(&path).unwrap().next, ClockDirective::Schedule(100));
    }

    #[test]
    fn test_progress_sample_maps_onto_elevation_domain() {
        let path = eastbound_path(10);
        let mut sim = Simulation::new(1);
        assert_eq!(sim.progress_sample(10, 100), Some(0));
        sim.play(&path);
        for _ in 0..5 {
            sim.tick(&path);
        }
        assert_eq!(sim.progress_sample(10, 100), Some(49));
        run_to_end(&mut sim, &path);
        assert_eq!(sim.progress_sample(10, 100), Some(99));
        assert_eq!(sim.progress_sample(10, 0), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_n_points_take_n_ticks(n in 2usize..200) {
                let path = eastbound_path(n);
                let mut sim = Simulation::new(10);
                sim.play(&path);
                let updates = run_to_end(&mut sim, &path);
                prop_assert_eq!(updates.len(), n);
                prop_assert_eq!(sim.current_index(), n);
                prop_assert_eq!(sim.state(), PlaybackState::Finished);
            }

            #[test]
            fn prop_pause_never_skips_or_repeats(n in 3usize..60, pause_at in 1usize..59) {
                prop_assume!(pause_at < n);
                let path = eastbound_path(n);
                let mut sim = Simulation::new(10);
                sim.play(&path);
                let mut seen = Vec::new();
                for _ in 0..pause_at {
                    seen.push(sim.tick(&path).unwrap().update.index);
                }
                sim.pause();
                sim.play(&path);
                seen.extend(run_to_end(&mut sim, &path).iter().map(|u| u.index));
                prop_assert_eq!(seen, (0..n).collect::<Vec<_>>());
            }
        }
    }
}
