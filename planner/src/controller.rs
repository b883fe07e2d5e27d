//! The session controller: one task that owns the route session, the playback
//! clock and the rendering handles.
//!
//! Everything that mutates session state runs on this task, one event at a
//! time: user commands from [`SessionHandle`], collaborator results coming back
//! from spawned request tasks, speech notifications, and tick timer fires.
//! The clock is a single pending `Sleep` that is armed, re-armed or dropped
//! according to the [`ClockDirective`] each state transition returns, so there
//! is never more than one tick in flight.

use std::{ops::ControlFlow, pin::Pin, time::Duration};

use serde::Serialize;
use shared::{
    ClockDirective, Completion, PlaybackState, RequestTicket, Route, RouteRequest, RouteSession,
    SessionStatus, SimulationState, geo,
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::Sleep,
};
use tracing::{debug, info, warn};

use crate::{
    advice::coaching_tip,
    collaborators::Collaborators,
    config::SessionConfig,
    error::PlannerError,
    render::RenderSurface,
    speech::{SpeechEvent, SpeechOutput, Utterance, UtteranceId},
};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug)]
enum Command {
    RequestRoute {
        request: RouteRequest,
        reply: oneshot::Sender<Result<Route, PlannerError>>,
    },
    Play,
    Pause,
    TogglePlayback,
    Reset,
    SetSpeed(f64),
    Clear,
    TogglePanorama,
    DismissTip,
    DismissError,
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

enum Internal {
    RouteResolved {
        ticket: RequestTicket,
        result: Result<Route, PlannerError>,
        reply: oneshot::Sender<Result<Route, PlannerError>>,
    },
    TipReady {
        ticket: RequestTicket,
        tip: String,
    },
}

/// Everything a view needs to render the planner.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub route: Option<Route>,
    pub simulation: SimulationState,
    pub playback: PlaybackState,
    pub status: SessionStatus,
    pub loading: bool,
    pub last_error: Option<String>,
    pub tip: Option<String>,
    pub tip_visible: bool,
    pub speaking: bool,
    pub heading: f64,
    pub cardinal: &'static str,
    pub panorama_visible: bool,
    pub speed_kmh: f64,
    pub grade_percent: Option<f64>,
}

/// Cheap, cloneable front door to a running [`SessionController`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    async fn send(&self, command: Command) -> Result<(), PlannerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PlannerError::SessionClosed)
    }

    /// Resolve a route and an elevation profile, then load it. Resolves to
    /// [`PlannerError::Superseded`] if another request was issued meanwhile.
    pub async fn request_route(&self, request: RouteRequest) -> Result<Route, PlannerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RequestRoute { request, reply }).await?;
        rx.await.map_err(|_| PlannerError::SessionClosed)?
    }

    pub async fn play(&self) -> Result<(), PlannerError> {
        self.send(Command::Play).await
    }

    pub async fn pause(&self) -> Result<(), PlannerError> {
        self.send(Command::Pause).await
    }

    pub async fn toggle_playback(&self) -> Result<(), PlannerError> {
        self.send(Command::TogglePlayback).await
    }

    pub async fn reset(&self) -> Result<(), PlannerError> {
        self.send(Command::Reset).await
    }

    pub async fn set_speed(&self, speed_kmh: f64) -> Result<(), PlannerError> {
        self.send(Command::SetSpeed(speed_kmh)).await
    }

    pub async fn clear(&self) -> Result<(), PlannerError> {
        self.send(Command::Clear).await
    }

    pub async fn toggle_panorama(&self) -> Result<(), PlannerError> {
        self.send(Command::TogglePanorama).await
    }

    pub async fn dismiss_tip(&self) -> Result<(), PlannerError> {
        self.send(Command::DismissTip).await
    }

    /// Hide the current error notice.
    pub async fn dismiss_error(&self) -> Result<(), PlannerError> {
        self.send(Command::DismissError).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, PlannerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        rx.await.map_err(|_| PlannerError::SessionClosed)
    }

    /// Stop the controller; pending ticks and speech are cancelled.
    pub async fn shutdown(&self) -> Result<(), PlannerError> {
        self.send(Command::Shutdown).await
    }
}

pub struct SessionController<S, V> {
    session: RouteSession,
    collaborators: Collaborators,
    surface: S,
    speech: V,
    config: SessionConfig,
    speed_kmh: f64,
    tip: Option<String>,
    tip_visible: bool,
    speaking: bool,
    next_utterance: u64,
    current_utterance: Option<UtteranceId>,
    last_error: Option<String>,
    commands: mpsc::Receiver<Command>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    speech_tx: mpsc::UnboundedSender<SpeechEvent>,
    speech_rx: mpsc::UnboundedReceiver<SpeechEvent>,
    pending_tick: Option<Pin<Box<Sleep>>>,
}

impl<S, V> SessionController<S, V>
where
    S: RenderSurface + 'static,
    V: SpeechOutput + 'static,
{
    pub fn new(
        collaborators: Collaborators,
        surface: S,
        speech: V,
        config: SessionConfig,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (speech_tx, speech_rx) = mpsc::unbounded_channel();
        let controller = Self {
            session: RouteSession::new(config.initial_interval_ms()),
            collaborators,
            surface,
            speech,
            speed_kmh: config.initial_speed_kmh,
            config,
            tip: None,
            tip_visible: true,
            speaking: false,
            next_utterance: 0,
            current_utterance: None,
            last_error: None,
            commands,
            internal_tx,
            internal_rx,
            speech_tx,
            speech_rx,
            pending_tick: None,
        };
        (
            controller,
            SessionHandle {
                commands: commands_tx,
            },
        )
    }

    /// Run the controller on the current tokio runtime.
    pub fn spawn(
        collaborators: Collaborators,
        surface: S,
        speech: V,
        config: SessionConfig,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (controller, handle) = Self::new(collaborators, surface, speech, config);
        (handle, tokio::spawn(controller.run()))
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    if self.handle_command(command).is_break() {
                        break;
                    }
                }
                Some(internal) = self.internal_rx.recv() => self.handle_internal(internal),
                Some(event) = self.speech_rx.recv() => self.on_speech(event),
                () = next_tick(&mut self.pending_tick) => {
                    self.pending_tick = None;
                    self.on_tick();
                }
            }
        }
        self.teardown();
    }

    fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::RequestRoute { request, reply } => self.request_route(request, reply),
            Command::Play => {
                let directive = self.session.play();
                self.apply(directive);
                info!(state = ?self.session.playback_state(), "play");
            }
            Command::Pause => self.pause(),
            Command::TogglePlayback => {
                let was_playing = self.session.simulation().is_playing();
                let directive = self.session.toggle_playback();
                self.apply(directive);
                if was_playing {
                    self.stop_speech();
                }
                info!(state = ?self.session.playback_state(), "playback toggled");
            }
            Command::Reset => {
                let directive = self.session.reset();
                self.apply(directive);
                info!(state = ?self.session.playback_state(), "playback reset");
            }
            Command::SetSpeed(speed_kmh) => {
                self.speed_kmh = speed_kmh;
                let interval = self.config.speed.interval_ms(speed_kmh);
                let directive = self.session.set_tick_interval(interval);
                self.apply(directive);
                debug!("speed {speed_kmh} km/h -> tick every {interval} ms");
            }
            Command::Clear => self.clear(),
            Command::TogglePanorama => self.toggle_panorama(),
            Command::DismissTip => self.tip_visible = false,
            Command::DismissError => self.last_error = None,
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn apply(&mut self, directive: ClockDirective) {
        match directive {
            ClockDirective::Schedule(ms) => {
                self.pending_tick = Some(Box::pin(tokio::time::sleep(Duration::from_millis(
                    u64::from(ms),
                ))));
            }
            ClockDirective::Cancel => self.pending_tick = None,
            ClockDirective::Keep => {}
        }
    }

    fn request_route(
        &mut self,
        request: RouteRequest,
        reply: oneshot::Sender<Result<Route, PlannerError>>,
    ) {
        let ticket = match self.session.begin_request(&request) {
            Ok(ticket) => ticket,
            Err(err) => {
                let err = PlannerError::from(err);
                self.last_error = Some(err.to_string());
                let _ = reply.send(Err(err));
                return;
            }
        };
        info!(
            ticket = ticket.0,
            "planning {} -> {} ({})",
            request.origin,
            request.destination,
            request.mode
        );

        self.last_error = None;
        self.tip = None;
        self.tip_visible = true;
        self.stop_speech();

        let collaborators = self.collaborators.clone();
        let samples = self.config.elevation_samples;
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = resolve_route(&collaborators, &request, samples).await;
            let _ = internal.send(Internal::RouteResolved {
                ticket,
                result,
                reply,
            });
        });
    }

    fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::RouteResolved {
                ticket,
                result,
                reply,
            } => self.on_route_resolved(ticket, result, reply),
            Internal::TipReady { ticket, tip } => self.on_tip(ticket, tip),
        }
    }

    fn on_route_resolved(
        &mut self,
        ticket: RequestTicket,
        result: Result<Route, PlannerError>,
        reply: oneshot::Sender<Result<Route, PlannerError>>,
    ) {
        match self.session.complete(ticket, result) {
            Completion::Applied => {
                self.apply(ClockDirective::Cancel);
                self.surface.clear_route();
                let Some(route) = self.session.route() else {
                    return;
                };
                self.surface.draw_route(route);
                info!(ticket = ticket.0, points = route.path().len(), "route loaded");

                let advisor = self.collaborators.advisor.clone();
                let elevation = route.elevation.clone();
                let internal = self.internal_tx.clone();
                tokio::spawn(async move {
                    let tip = coaching_tip(advisor.as_deref(), &elevation).await;
                    let _ = internal.send(Internal::TipReady { ticket, tip });
                });

                let _ = reply.send(Ok(route.clone()));
            }
            Completion::Failed(err) => {
                warn!(ticket = ticket.0, "route request failed: {err}");
                if err.is_user_visible() {
                    self.last_error = Some(err.to_string());
                }
                let _ = reply.send(Err(err));
            }
            Completion::Stale => {
                debug!(ticket = ticket.0, "ignoring superseded route response");
                let _ = reply.send(Err(PlannerError::Superseded));
            }
        }
    }

    fn on_tip(&mut self, ticket: RequestTicket, tip: String) {
        if !self.session.is_current(ticket) || self.session.route().is_none() {
            debug!(ticket = ticket.0, "dropping tip for a replaced route");
            return;
        }
        let id = UtteranceId(self.next_utterance);
        self.next_utterance += 1;
        let utterance = Utterance::new(id, tip.as_str(), &self.config.speech);
        self.tip = Some(tip);
        self.speaking = true;
        self.current_utterance = Some(id);
        self.speech.speak(utterance, self.speech_tx.clone());
    }

    fn on_speech(&mut self, event: SpeechEvent) {
        if self.current_utterance != Some(event.utterance()) {
            debug!(?event, "ignoring speech event for a cancelled utterance");
            return;
        }
        match event {
            SpeechEvent::Started(_) => self.speaking = true,
            SpeechEvent::Ended(_) => {
                self.speaking = false;
                self.current_utterance = None;
            }
        }
    }

    fn on_tick(&mut self) {
        let Some(tick) = self.session.tick() else {
            return;
        };
        let update = tick.update;
        self.surface.move_marker(update.position, update.heading);
        if self.surface.panorama_visible() {
            self.surface.set_panorama_view(update.position, update.heading);
        }
        if let Some(sample) = tick.progress_sample {
            self.surface.show_progress(sample);
        }
        debug!(index = update.index, heading = update.heading, "tick");
        if self.session.playback_state() == PlaybackState::Finished {
            info!("playback finished after {} points", update.current_index);
        }
        self.apply(tick.next);
    }

    fn pause(&mut self) {
        let directive = self.session.pause();
        self.apply(directive);
        self.stop_speech();
        info!(
            index = self.session.simulation().current_index(),
            "playback paused"
        );
    }

    fn clear(&mut self) {
        let directive = self.session.clear();
        self.apply(directive);
        self.surface.clear_route();
        self.stop_speech();
        self.tip = None;
        self.last_error = None;
        info!("route cleared");
    }

    fn toggle_panorama(&mut self) {
        let visible = self.surface.panorama_visible();
        if !visible {
            if let Some(anchor) = self.session.panorama_anchor() {
                let heading = self.session.simulation().heading();
                self.surface.set_panorama_view(anchor, heading);
            }
        }
        self.surface.set_panorama_visible(!visible);
    }

    fn stop_speech(&mut self) {
        self.speech.cancel();
        self.speaking = false;
        self.current_utterance = None;
    }

    fn snapshot(&self) -> SessionSnapshot {
        let simulation = self.session.simulation();
        SessionSnapshot {
            route: self.session.route().cloned(),
            simulation: simulation.snapshot(),
            playback: simulation.state(),
            status: self.session.status(),
            loading: self.session.is_loading(),
            last_error: self.last_error.clone(),
            tip: self.tip.clone(),
            tip_visible: self.tip_visible,
            speaking: self.speaking,
            heading: simulation.heading(),
            cardinal: geo::cardinal(simulation.heading()),
            panorama_visible: self.surface.panorama_visible(),
            speed_kmh: self.speed_kmh,
            grade_percent: self.session.current_grade(),
        }
    }

    fn teardown(&mut self) {
        self.pending_tick = None;
        self.stop_speech();
        self.surface.clear_route();
        debug!("session controller stopped");
    }
}

async fn next_tick(pending: &mut Option<Pin<Box<Sleep>>>) {
    match pending.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Directions first, then elevation along the resolved path.
async fn resolve_route(
    collaborators: &Collaborators,
    request: &RouteRequest,
    samples: usize,
) -> Result<Route, PlannerError> {
    let directions = collaborators.routing.route(request).await?;
    let elevation = collaborators
        .elevation
        .along_path(&directions.path, samples)
        .await?;
    Route::new(request, directions, elevation)
        .map_err(|err| PlannerError::RoutingFailed(err.to_string()))
}
