use seed::{prelude::*, virtual_dom::AtValue, *};
use serde::{Deserialize, de::DeserializeOwned};
use serde_wasm_bindgen::to_value;
use shared::{
    ClockDirective, Completion, Directions, ElevationSample, PlaybackState, RequestTicket, Route,
    RouteRequest, RouteSession, SelectedLocation, SpeedMapping, TravelMode,
    advice::{self, FALLBACK_TIP},
    gemini::{self, GenerateContentRequest, GenerateContentResponse},
    geo,
    panel::Panel,
};
use wasm_bindgen::{
    JsCast,
    prelude::{JsValue, wasm_bindgen},
};

#[wasm_bindgen(module = "/google_maps.js")]
extern "C" {
    #[wasm_bindgen(js_name = initMap)]
    fn init_map(api_key: &str);
    #[wasm_bindgen(js_name = geocodeAddress)]
    fn geocode_address(address: &str);
    #[wasm_bindgen(js_name = reverseGeocode)]
    fn reverse_geocode(lat: f64, lon: f64);
    #[wasm_bindgen(js_name = showTempMarker)]
    fn show_temp_marker(lat: f64, lon: f64, focus: bool);
    #[wasm_bindgen(js_name = clearTempMarker)]
    fn clear_temp_marker();
    #[wasm_bindgen(js_name = requestDirections)]
    fn request_directions(ticket: f64, origin: &str, destination: &str, mode: &str);
    #[wasm_bindgen(js_name = requestElevation)]
    fn request_elevation(ticket: f64, path: JsValue, samples: u32);
    #[wasm_bindgen(js_name = drawRoute)]
    fn draw_route(ticket: f64);
    #[wasm_bindgen(js_name = clearRoute)]
    fn clear_route();
    #[wasm_bindgen(js_name = moveMarker)]
    fn move_marker(lat: f64, lon: f64, heading: f64);
    #[wasm_bindgen(js_name = setPanoramaVisible)]
    fn set_panorama_visible(visible: bool);
    #[wasm_bindgen(js_name = setPanoramaView)]
    fn set_panorama_view(lat: f64, lon: f64, heading: f64);
    #[wasm_bindgen(js_name = speak)]
    fn speak_js(text: &str, locale: &str, rate: f64);
    #[wasm_bindgen(js_name = cancelSpeech)]
    fn cancel_speech();
}

const ELEVATION_SAMPLES: u32 = shared::DEFAULT_ELEVATION_SAMPLES as u32;
const CHART_WIDTH: f64 = 100.0;
const CHART_HEIGHT: f64 = 40.0;

fn maps_key() -> Option<&'static str> {
    option_env!("GOOGLE_MAPS_API_KEY").filter(|key| !key.trim().is_empty())
}

fn missing_maps_key(key: Option<&str>) -> Option<String> {
    key.is_none().then(|| "map unavailable: build with GOOGLE_MAPS_API_KEY set".to_string())
}

fn gemini_key() -> Option<&'static str> {
    option_env!("GEMINI_API_KEY")
        .or(option_env!("API_KEY"))
        .filter(|key| !key.trim().is_empty())
}

fn gemini_model() -> &'static str {
    option_env!("GEMINI_MODEL").unwrap_or(gemini::DEFAULT_MODEL)
}

fn speech_locale() -> &'static str {
    option_env!("SPEECH_LOCALE").unwrap_or("en-US")
}

fn debug(message: String) {
    web_sys::console::debug_1(&format!("[frontend] {message}").into());
}

pub struct Model {
    panel: Panel,
    session: RouteSession,
    mapping: SpeedMapping,
    pending: Option<PendingRoute>,
    tick: Option<CmdHandle>,
    tip: Option<String>,
    speaking: bool,
    panorama_visible: bool,
    hud: Hud,
    last_error: Option<String>,
}

/// A route request between its directions and elevation answers.
struct PendingRoute {
    ticket: RequestTicket,
    request: RouteRequest,
    directions: Option<Directions>,
}

#[derive(Debug, Clone, PartialEq)]
struct Hud {
    street: String,
    cardinal: &'static str,
}

impl Default for Hud {
    fn default() -> Self {
        Self {
            street: "Locating...".into(),
            cardinal: "N",
        }
    }
}

#[derive(Clone)]
pub enum Msg {
    OriginChanged(String),
    DestinationChanged(String),
    ClearOrigin,
    ClearDestination,
    SearchTermChanged(String),
    SearchSubmitted,
    MapClicked { lat: f64, lon: f64 },
    LocationResolved(Result<SelectedLocation, String>),
    DismissSelection,
    SetAsOrigin,
    SetAsDestination,
    ModeChanged(TravelMode),
    SpeedChanged(String),
    Plan,
    DirectionsResolved {
        ticket: RequestTicket,
        result: Result<Directions, String>,
    },
    ElevationResolved {
        ticket: RequestTicket,
        result: Result<Vec<ElevationSample>, String>,
    },
    TipReady { ticket: RequestTicket, tip: String },
    DismissTip,
    DismissError,
    TogglePlayback,
    Reset,
    Clear,
    Tick,
    TogglePanorama,
    PanoramaVisibility(bool),
    PanoramaStreet(String),
    PanoramaHeading(f64),
    SpeechStarted,
    SpeechEnded,
    TogglePanel,
    Unmount,
}

/// `{ticket?, value?, error?}` as posted by the map glue.
#[derive(Debug, Deserialize)]
struct Outcome<T> {
    #[serde(default)]
    ticket: u64,
    value: Option<T>,
    error: Option<String>,
}

impl<T> Outcome<T> {
    fn into_result(self) -> (RequestTicket, Result<T, String>) {
        let result = match (self.value, self.error) {
            (Some(value), None) => Ok(value),
            (_, Some(error)) => Err(error),
            (None, None) => Err("empty response".to_string()),
        };
        (RequestTicket(self.ticket), result)
    }
}

#[derive(Deserialize)]
struct MapClickPayload {
    lat: f64,
    #[serde(alias = "lng")]
    lon: f64,
}

#[derive(Deserialize)]
struct VisibilityPayload {
    visible: bool,
}

#[derive(Deserialize)]
struct StreetPayload {
    street: String,
}

#[derive(Deserialize)]
struct HeadingPayload {
    heading: f64,
}

fn detail<T: DeserializeOwned>(event: web_sys::Event) -> Option<T> {
    let event = event.dyn_into::<web_sys::CustomEvent>().ok()?;
    serde_wasm_bindgen::from_value(event.detail()).ok()
}

pub fn init(_: Url, orders: &mut impl Orders<Msg>) -> Model {
    orders
        .stream(streams::window_event(Ev::from("map-click"), |event| {
            let click: MapClickPayload = detail(event)?;
            debug(format!("map click lat={:.5} lon={:.5}", click.lat, click.lon));
            Some(Msg::MapClicked {
                lat: click.lat,
                lon: click.lon,
            })
        }))
        .stream(streams::window_event(Ev::from("geocode-result"), |event| {
            let outcome: Outcome<SelectedLocation> = detail(event)?;
            Some(Msg::LocationResolved(outcome.into_result().1))
        }))
        .stream(streams::window_event(Ev::from("directions-result"), |event| {
            let (ticket, result) = detail::<Outcome<Directions>>(event)?.into_result();
            Some(Msg::DirectionsResolved { ticket, result })
        }))
        .stream(streams::window_event(Ev::from("elevation-result"), |event| {
            let (ticket, result) = detail::<Outcome<Vec<ElevationSample>>>(event)?.into_result();
            Some(Msg::ElevationResolved { ticket, result })
        }))
        .stream(streams::window_event(Ev::from("panorama-visibility"), |event| {
            detail::<VisibilityPayload>(event).map(|p| Msg::PanoramaVisibility(p.visible))
        }))
        .stream(streams::window_event(Ev::from("panorama-street"), |event| {
            detail::<StreetPayload>(event).map(|p| Msg::PanoramaStreet(p.street))
        }))
        .stream(streams::window_event(Ev::from("panorama-heading"), |event| {
            detail::<HeadingPayload>(event).map(|p| Msg::PanoramaHeading(p.heading))
        }))
        .stream(streams::window_event(Ev::from("speech-start"), |_| Msg::SpeechStarted))
        .stream(streams::window_event(Ev::from("speech-end"), |_| Msg::SpeechEnded))
        .stream(streams::window_event(Ev::from("pagehide"), |_| Msg::Unmount));

    let mapping = SpeedMapping::default();
    Model {
        panel: Panel::default(),
        session: RouteSession::new(mapping.default_interval_ms()),
        mapping,
        pending: None,
        tick: None,
        tip: None,
        speaking: false,
        panorama_visible: false,
        hud: Hud::default(),
        last_error: missing_maps_key(maps_key()),
    }
}

pub fn update(msg: Msg, model: &mut Model, orders: &mut impl Orders<Msg>) {
    match msg {
        Msg::OriginChanged(val) => model.panel.origin = val,
        Msg::DestinationChanged(val) => model.panel.destination = val,
        Msg::ClearOrigin => {
            model.panel.origin.clear();
            clear_session(model);
        }
        Msg::ClearDestination => {
            model.panel.destination.clear();
            clear_session(model);
        }
        Msg::SearchTermChanged(val) => model.panel.search_term = val,
        Msg::SearchSubmitted => {
            let term = model.panel.search_term.trim();
            if !term.is_empty() {
                debug(format!("searching {term:?}"));
                geocode_address(term);
            }
        }
        Msg::MapClicked { lat, lon } => reverse_geocode(lat, lon),
        Msg::LocationResolved(Ok(location)) => {
            let at = location.coordinate();
            show_temp_marker(at.lat, at.lon, true);
            model.panel.on_select_location(location);
        }
        Msg::LocationResolved(Err(err)) => {
            model.last_error = Some(format!("location could not be resolved: {err}"));
        }
        Msg::DismissSelection => {
            model.panel.dismiss_selection();
            clear_temp_marker();
        }
        Msg::SetAsOrigin => {
            if model.panel.on_set_as_origin() {
                clear_temp_marker();
            }
        }
        Msg::SetAsDestination => {
            if model.panel.on_set_as_destination() {
                clear_temp_marker();
            }
        }
        Msg::ModeChanged(mode) => model.panel.on_mode_change(mode),
        Msg::SpeedChanged(val) => {
            if let Ok(speed_kmh) = val.trim().parse::<f64>() {
                let interval = model.panel.on_speed_change(speed_kmh, &model.mapping);
                let directive = model.session.set_tick_interval(interval);
                apply(model, orders, directive);
            }
        }
        Msg::Plan => plan(model),
        Msg::DirectionsResolved { ticket, result } => on_directions(model, ticket, result),
        Msg::ElevationResolved { ticket, result } => on_elevation(model, orders, ticket, result),
        Msg::TipReady { ticket, tip } => {
            if model.session.is_current(ticket) && model.session.route().is_some() {
                speak_js(&tip, speech_locale(), 1.0);
                model.speaking = true;
                model.tip = Some(tip);
            }
        }
        Msg::DismissTip => model.panel.tip_visible = false,
        Msg::DismissError => model.last_error = None,
        Msg::TogglePlayback => {
            let was_playing = model.session.simulation().is_playing();
            let directive = model.session.toggle_playback();
            apply(model, orders, directive);
            if was_playing {
                stop_speech(model);
            }
        }
        Msg::Reset => {
            let directive = model.session.reset();
            apply(model, orders, directive);
        }
        Msg::Clear => clear_session(model),
        Msg::Tick => {
            model.tick = None;
            if let Some(tick) = model.session.tick() {
                let update = tick.update;
                move_marker(update.position.lat, update.position.lon, update.heading);
                if model.panorama_visible {
                    set_panorama_view(update.position.lat, update.position.lon, update.heading);
                }
                apply(model, orders, tick.next);
            }
        }
        Msg::TogglePanorama => {
            let visible = !model.panorama_visible;
            if visible {
                if let Some(anchor) = model.session.panorama_anchor() {
                    let heading = model.session.simulation().heading();
                    set_panorama_view(anchor.lat, anchor.lon, heading);
                }
            }
            set_panorama_visible(visible);
        }
        Msg::PanoramaVisibility(visible) => model.panorama_visible = visible,
        Msg::PanoramaStreet(street) => model.hud.street = street,
        Msg::PanoramaHeading(heading) => model.hud.cardinal = geo::cardinal(heading),
        Msg::SpeechStarted => model.speaking = true,
        Msg::SpeechEnded => model.speaking = false,
        Msg::TogglePanel => model.panel.toggle_open(),
        Msg::Unmount => {
            model.tick = None;
            stop_speech(model);
        }
    }
}

fn apply(model: &mut Model, orders: &mut impl Orders<Msg>, directive: ClockDirective) {
    match directive {
        ClockDirective::Schedule(ms) => {
            model.tick = Some(orders.perform_cmd_with_handle(cmds::timeout(ms, || Msg::Tick)));
        }
        ClockDirective::Cancel => model.tick = None,
        ClockDirective::Keep => {}
    }
}

fn plan(model: &mut Model) {
    if !model.panel.can_plan(model.session.is_loading()) {
        return;
    }
    let request = model.panel.route_request();
    let ticket = match model.session.begin_request(&request) {
        Ok(ticket) => ticket,
        Err(err) => {
            model.last_error = Some(err.to_string());
            return;
        }
    };
    debug(format!(
        "planning #{} {} -> {} ({})",
        ticket.0, request.origin, request.destination, request.mode
    ));
    model.tip = None;
    model.panel.tip_visible = true;
    model.last_error = None;
    stop_speech(model);
    model.panel.dismiss_selection();
    clear_temp_marker();
    request_directions(
        ticket.0 as f64,
        &request.origin,
        &request.destination,
        request.mode.as_str(),
    );
    model.pending = Some(PendingRoute {
        ticket,
        request,
        directions: None,
    });
}

fn on_directions(
    model: &mut Model,
    ticket: RequestTicket,
    result: Result<Directions, String>,
) {
    let Some(pending) = pending_for(&mut model.pending, ticket) else {
        debug(format!("ignoring directions for superseded request #{}", ticket.0));
        return;
    };
    match result {
        Ok(directions) => match to_value(&directions.path) {
            Ok(path) => {
                request_elevation(ticket.0 as f64, path, ELEVATION_SAMPLES);
                pending.directions = Some(directions);
            }
            Err(err) => fail(model, ticket, format!("no route could be found: {err}")),
        },
        Err(err) => fail(model, ticket, format!("no route could be found: {err}")),
    }
}

fn on_elevation(
    model: &mut Model,
    orders: &mut impl Orders<Msg>,
    ticket: RequestTicket,
    result: Result<Vec<ElevationSample>, String>,
) {
    let Some(pending) = take_pending(&mut model.pending, ticket) else {
        debug(format!("ignoring elevation for superseded request #{}", ticket.0));
        return;
    };
    let Some(route) = assemble_route(pending, result) else {
        return;
    };
    match model.session.complete(ticket, route) {
        Completion::Applied => {
            model.tick = None;
            clear_route();
            draw_route(ticket.0 as f64);
            if let Some(route) = model.session.route() {
                debug(format!("route #{} loaded, {} points", ticket.0, route.path().len()));
                orders.perform_cmd(fetch_tip(ticket, route.elevation.clone()));
            }
        }
        Completion::Failed(err) => model.last_error = Some(err),
        Completion::Stale => {}
    }
}

/// The in-flight request, if `ticket` is the one it was issued under.
fn pending_for(
    pending: &mut Option<PendingRoute>,
    ticket: RequestTicket,
) -> Option<&mut PendingRoute> {
    pending.as_mut().filter(|p| p.ticket == ticket)
}

/// Like [`pending_for`], but removes the request. Answers for another ticket
/// leave the slot untouched.
fn take_pending(pending: &mut Option<PendingRoute>, ticket: RequestTicket) -> Option<PendingRoute> {
    match pending.take() {
        Some(current) if current.ticket == ticket => Some(current),
        other => {
            *pending = other;
            None
        }
    }
}

/// Joins directions and the elevation answer. `None` while directions are
/// still outstanding.
fn assemble_route(
    pending: PendingRoute,
    elevation: Result<Vec<ElevationSample>, String>,
) -> Option<Result<Route, String>> {
    let directions = pending.directions?;
    Some(match elevation {
        Ok(elevation) => Route::new(&pending.request, directions, elevation)
            .map_err(|err| format!("no route could be found: {err}")),
        Err(err) => Err(format!("elevation profile unavailable: {err}")),
    })
}

fn fail(model: &mut Model, ticket: RequestTicket, err: String) {
    model.pending = None;
    if let Completion::Failed(err) = model.session.complete::<String>(ticket, Err(err)) {
        model.last_error = Some(err);
    }
}

fn clear_session(model: &mut Model) {
    model.session.clear();
    model.pending = None;
    model.tick = None;
    model.tip = None;
    clear_route();
    stop_speech(model);
}

fn stop_speech(model: &mut Model) {
    cancel_speech();
    model.speaking = false;
}

async fn fetch_tip(ticket: RequestTicket, elevation: Vec<ElevationSample>) -> Msg {
    let tip = match gemini_key() {
        None => FALLBACK_TIP.to_string(),
        Some(key) => {
            let prompt = advice::build_prompt(&advice::condensed_profile(&elevation));
            match request_tip(key, prompt).await {
                Ok(answer) => advice::finalize_tip(answer.as_deref()),
                Err(err) => {
                    debug(format!("coaching tip failed: {err}"));
                    FALLBACK_TIP.to_string()
                }
            }
        }
    };
    Msg::TipReady { ticket, tip }
}

async fn request_tip(key: &str, prompt: String) -> Result<Option<String>, String> {
    let url = format!("{}?key={key}", gemini::endpoint(gemini_model()));
    let request = Request::new(url)
        .method(Method::Post)
        .json(&GenerateContentRequest::from_prompt(prompt))
        .map_err(|err| format!("{err:?}"))?;
    let response = request
        .fetch()
        .await
        .map_err(|err| format!("{err:?}"))?
        .check_status()
        .map_err(|err| format!("{err:?}"))?;
    let body: GenerateContentResponse = response.json().await.map_err(|err| format!("{err:?}"))?;
    Ok(body.text())
}

pub fn view(model: &Model) -> Node<Msg> {
    div![
        C!["app-overlay"],
        view_panorama_toggle(model),
        view_selection(model),
        IF!(model.panorama_visible => view_hud(&model.hud)),
        IF!(model.panorama_visible => button![
            C!["panorama-close"],
            "✕",
            ev(Ev::Click, |_| Msg::TogglePanorama),
        ]),
        IF!(!model.panorama_visible => view_header(model)),
        IF!(!model.panorama_visible => view_sheet(model)),
        view_error(model),
    ]
}

fn view_panorama_toggle(model: &Model) -> Node<Msg> {
    button![
        C!["pegman", IF!(model.panorama_visible => "active")],
        "🚶",
        ev(Ev::Click, |_| Msg::TogglePanorama),
    ]
}

fn view_selection(model: &Model) -> Node<Msg> {
    let Some(selection) = &model.panel.selection else {
        return empty![];
    };
    div![
        C!["address-popup"],
        button![C!["close"], "✕", ev(Ev::Click, |_| Msg::DismissSelection)],
        p![C!["address"], &selection.formatted_address],
        div![
            C!["popup-actions"],
            button!["Start Point", ev(Ev::Click, |_| Msg::SetAsOrigin)],
            button![C!["primary"], "End Point", ev(Ev::Click, |_| Msg::SetAsDestination)],
        ],
    ]
}

fn view_hud(hud: &Hud) -> Node<Msg> {
    div![
        C!["street-hud"],
        div![span![C!["label"], "STREET HUD"], h2![&hud.street]],
        div![C!["compass"], "🧭 ", hud.cardinal],
    ]
}

fn view_header(model: &Model) -> Node<Msg> {
    let search = IF!(model.panel.open && model.session.route().is_none() => div![
        C!["search"],
        input![
            attrs! {
                At::Type => "text",
                At::Placeholder => "Search...",
                At::Value => model.panel.search_term,
                At::AutoComplete => "off",
            },
            input_ev(Ev::Input, Msg::SearchTermChanged),
            keyboard_ev(Ev::KeyDown, |event| IF!(event.key() == "Enter" => Msg::SearchSubmitted)),
        ],
        button!["🔍", ev(Ev::Click, |_| Msg::SearchSubmitted)],
    ]);

    let tip = match (&model.tip, model.panel.tip_visible) {
        (Some(tip), true) => div![
            C!["coach-tip", IF!(model.speaking => "speaking")],
            span!["💬 "],
            p![tip],
            button!["✕", ev(Ev::Click, |_| Msg::DismissTip)],
        ],
        _ => empty![],
    };

    div![
        C!["header"],
        div![
            C!["title-bar"],
            h1!["Fitness Pro"],
            button![
                C!["panel-toggle", IF!(!model.panel.open => "collapsed")],
                "⌄",
                ev(Ev::Click, |_| Msg::TogglePanel),
            ],
        ],
        search,
        tip,
    ]
}

fn view_sheet(model: &Model) -> Node<Msg> {
    let body = match model.session.route() {
        None => view_planner(model),
        Some(route) => view_route(model, route),
    };
    div![
        C!["bottom-sheet", IF!(!model.panel.open => "collapsed")],
        div![C!["grip"], ev(Ev::Click, |_| Msg::TogglePanel)],
        body,
    ]
}

fn view_planner(model: &Model) -> Node<Msg> {
    let loading = model.session.is_loading();
    let has_selection = model.panel.selection.is_some();

    let place_input = |placeholder: &str,
                       value: &str,
                       on_input: fn(String) -> Msg,
                       on_clear: Msg,
                       on_pick: Msg| {
        div![
            C!["place-row"],
            div![
                C!["place-input"],
                input![
                    attrs! {
                        At::Type => "text",
                        At::Placeholder => placeholder,
                        At::Value => value,
                        At::AutoComplete => "off",
                        At::SpellCheck => "false",
                    },
                    input_ev(Ev::Input, on_input),
                ],
                IF!(!value.is_empty() => button![C!["clear"], "✕", ev(Ev::Click, move |_| on_clear)]),
            ],
            button![
                C!["pick", IF!(has_selection => "ready")],
                "◎",
                attrs! { At::Disabled => bool_attr(!has_selection) },
                ev(Ev::Click, move |_| on_pick),
            ],
        ]
    };

    div![
        C!["planner"],
        div![
            C!["mode-row"],
            div![
                C!["modes"],
                TravelMode::ALL.iter().map(|&mode| {
                    button![
                        C![IF!(model.panel.mode == mode => "selected")],
                        mode.as_str(),
                        ev(Ev::Click, move |_| Msg::ModeChanged(mode)),
                    ]
                }),
            ],
            button![
                C!["plan"],
                if loading { "..." } else { "➤ Plan" },
                attrs! { At::Disabled => bool_attr(!model.panel.can_plan(loading)) },
                ev(Ev::Click, |_| Msg::Plan),
            ],
        ],
        place_input(
            "Start Location...",
            &model.panel.origin,
            Msg::OriginChanged,
            Msg::ClearOrigin,
            Msg::SetAsOrigin,
        ),
        place_input(
            "End Location...",
            &model.panel.destination,
            Msg::DestinationChanged,
            Msg::ClearDestination,
            Msg::SetAsDestination,
        ),
    ]
}

fn view_route(model: &Model, route: &Route) -> Node<Msg> {
    let simulation = model.session.simulation();
    let playing = simulation.is_playing();
    let progress = simulation.progress_sample(route.path().len(), route.elevation.len());

    let card = |label: &str, content: String| {
        div![C!["metadata-card"], span![C!["label"], label], strong![content]]
    };

    div![
        C!["route"],
        div![
            C!["summary"],
            div![
                h2![&route.distance_label],
                p![format!("{} • {}", route.duration_label, model.panel.mode)],
            ],
            div![
                C!["playback"],
                button![
                    C![if playing { "stop" } else { "play" }],
                    if playing { "■" } else { "▶" },
                    ev(Ev::Click, |_| Msg::TogglePlayback),
                ],
                button![C!["reset"], "⟲", ev(Ev::Click, |_| Msg::Reset)],
                button![C!["clear"], "✕", ev(Ev::Click, |_| Msg::Clear)],
            ],
        ],
        view_elevation_chart(&route.elevation, progress),
        div![
            C!["metadata-grid"],
            card("Slope", grade_label(model.session.current_grade())),
            card("Ascent", format!("{:.0} m", route.total_ascent())),
            card(
                "Progress",
                progress_label(
                    model.session.playback_state(),
                    simulation.current_index(),
                    route.path().len()
                )
            ),
        ],
        div![
            C!["speed"],
            label![format!("Speed {:.0} km/h", model.panel.speed_kmh)],
            input![
                attrs! {
                    At::Type => "range",
                    At::Min => "5",
                    At::Max => "60",
                    At::Step => "1",
                    At::Value => format!("{:.0}", model.panel.speed_kmh),
                },
                input_ev(Ev::Input, Msg::SpeedChanged),
            ],
        ],
    ]
}

fn view_elevation_chart(samples: &[ElevationSample], progress: Option<usize>) -> Node<Msg> {
    let marker = progress.and_then(|index| chart_x(index, samples.len()));
    div![
        C!["elevation-chart"],
        svg![
            attrs! {
                At::ViewBox => format!("0 0 {CHART_WIDTH} {CHART_HEIGHT}"),
                At::from("preserveAspectRatio") => "none",
            },
            polyline![attrs! {
                At::from("points") => chart_points(samples),
                At::from("fill") => "none",
                At::from("stroke") => "#3b82f6",
                At::from("stroke-width") => "1.5",
            }],
            marker.map(|x| line_![attrs! {
                At::from("x1") => x,
                At::from("x2") => x,
                At::from("y1") => 0,
                At::from("y2") => CHART_HEIGHT,
                At::from("stroke") => "#ef4444",
                At::from("stroke-width") => "2",
            }]),
        ],
    ]
}

fn view_error(model: &Model) -> Node<Msg> {
    match &model.last_error {
        Some(error) => div![
            C!["error"],
            p![error],
            button!["✕", ev(Ev::Click, |_| Msg::DismissError)],
        ],
        None => empty![],
    }
}

#[wasm_bindgen(start)]
pub fn start() {
    init_map(maps_key().unwrap_or_default());
    App::start("app", init, update, view);
}

fn chart_x(index: usize, count: usize) -> Option<f64> {
    match count {
        0 => None,
        1 => Some(0.0),
        _ => Some(index.min(count - 1) as f64 / (count - 1) as f64 * CHART_WIDTH),
    }
}

/// SVG `points` for an elevation profile scaled into the chart box.
fn chart_points(samples: &[ElevationSample]) -> String {
    let (min, max) = samples.iter().fold((f64::MAX, f64::MIN), |(lo, hi), s| {
        (lo.min(s.elevation), hi.max(s.elevation))
    });
    let span = if max > min { max - min } else { 1.0 };
    samples
        .iter()
        .enumerate()
        .filter_map(|(i, sample)| {
            let x = chart_x(i, samples.len())?;
            let y = CHART_HEIGHT - 2.0 - (sample.elevation - min) / span * (CHART_HEIGHT - 4.0);
            Some(format!("{x:.2},{y:.2}"))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn grade_label(grade: Option<f64>) -> String {
    match grade {
        Some(grade) => format!("{grade:.1}%"),
        None => "0%".to_string(),
    }
}

fn progress_label(state: PlaybackState, index: usize, len: usize) -> String {
    match state {
        PlaybackState::Finished => "Arrived".to_string(),
        _ => format!("{}/{}", index.min(len), len),
    }
}

fn bool_attr(value: bool) -> AtValue {
    if value {
        AtValue::Some("true".into())
    } else {
        AtValue::Ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Coordinate;

    fn sample(elevation: f64) -> ElevationSample {
        ElevationSample {
            elevation,
            location: Coordinate { lat: 0.0, lon: 0.0 },
            resolution: 1.0,
        }
    }

    fn pending(ticket: RequestTicket, request: RouteRequest) -> Option<PendingRoute> {
        Some(PendingRoute {
            ticket,
            request,
            directions: None,
        })
    }

    fn directions(points: usize) -> Directions {
        Directions {
            path: (0..points)
                .map(|i| Coordinate {
                    lat: 37.5,
                    lon: 126.9 + i as f64 * 0.001,
                })
                .collect(),
            distance_label: "1.2 km".into(),
            duration_label: "4 mins".into(),
        }
    }

    #[test]
    fn test_answers_for_a_request_cleared_midflight_are_dropped() {
        let request = RouteRequest::new("Seoul Station", "Namsan", TravelMode::Bicycling);
        let mut session = RouteSession::new(500);

        let first = session.begin_request(&request).unwrap();
        session.clear();
        let second = session.begin_request(&request).unwrap();
        assert_eq!(second, RequestTicket(3));
        let mut slot = pending(second, request.clone());

        // The newer directions land first, then the stale ones.
        pending_for(&mut slot, second).unwrap().directions = Some(directions(4));
        assert!(pending_for(&mut slot, first).is_none());

        assert!(take_pending(&mut slot, first).is_none());
        assert_eq!(slot.as_ref().map(|p| p.ticket), Some(second));

        let current = take_pending(&mut slot, second).unwrap();
        assert!(slot.is_none());
        let route = assemble_route(current, Ok(vec![sample(30.0), sample(32.0)])).unwrap();
        assert!(matches!(session.complete(second, route), Completion::Applied));
        assert_eq!(session.route().unwrap().path().len(), 4);

        let late = Route::new(&request, directions(9), vec![]).map_err(|e| e.to_string());
        assert!(matches!(session.complete(first, late), Completion::Stale));
        assert_eq!(session.route().unwrap().path().len(), 4);
    }

    #[test]
    fn test_missing_maps_key_is_reported() {
        assert!(missing_maps_key(None).unwrap().contains("GOOGLE_MAPS_API_KEY"));
        assert_eq!(missing_maps_key(Some("AIza-test")), None);
    }

    #[test]
    fn test_elevation_before_directions_waits() {
        let request = RouteRequest::new("A", "B", TravelMode::Walking);
        let slot = pending(RequestTicket(1), request);
        assert!(assemble_route(slot.unwrap(), Ok(vec![sample(1.0)])).is_none());
    }

    #[test]
    fn test_elevation_failure_becomes_the_route_error() {
        let request = RouteRequest::new("A", "B", TravelMode::Bicycling);
        let mut slot = pending(RequestTicket(2), request);
        pending_for(&mut slot, RequestTicket(2)).unwrap().directions = Some(directions(2));
        let current = take_pending(&mut slot, RequestTicket(2)).unwrap();
        let err = assemble_route(current, Err("OVER_QUERY_LIMIT".into()))
            .unwrap()
            .unwrap_err();
        assert_eq!(err, "elevation profile unavailable: OVER_QUERY_LIMIT");
    }

    #[test]
    fn test_outcome_with_value_is_ok() {
        let outcome: Outcome<Directions> = serde_json::from_value(serde_json::json!({
            "ticket": 3,
            "value": {
                "path": [{"lat": 37.5, "lng": 126.9}, {"lat": 37.6, "lng": 127.0}],
                "distance_label": "12.1 km",
                "duration_label": "45 mins"
            }
        }))
        .unwrap();
        let (ticket, result) = outcome.into_result();
        assert_eq!(ticket, RequestTicket(3));
        let directions = result.unwrap();
        assert_eq!(directions.path.len(), 2);
        assert_eq!(directions.path[1].lon, 127.0);
    }

    #[test]
    fn test_outcome_with_error_is_err() {
        let outcome: Outcome<Vec<ElevationSample>> =
            serde_json::from_value(serde_json::json!({"ticket": 2, "error": "ZERO_RESULTS"}))
                .unwrap();
        assert_eq!(outcome.into_result(), (RequestTicket(2), Err("ZERO_RESULTS".to_string())));
    }

    #[test]
    fn test_outcome_without_payload_is_err() {
        let outcome: Outcome<SelectedLocation> =
            serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(outcome.into_result().1.is_err());
    }

    #[test]
    fn test_chart_points_span_the_box() {
        let points = chart_points(&[sample(100.0), sample(150.0), sample(200.0)]);
        assert_eq!(points, "0.00,38.00 50.00,20.00 100.00,2.00");
    }

    #[test]
    fn test_chart_points_flat_profile() {
        let points = chart_points(&[sample(5.0), sample(5.0)]);
        assert_eq!(points, "0.00,38.00 100.00,38.00");
        assert_eq!(chart_points(&[]), "");
    }

    #[test]
    fn test_chart_x_clamps_to_last_sample() {
        assert_eq!(chart_x(0, 0), None);
        assert_eq!(chart_x(7, 1), Some(0.0));
        assert_eq!(chart_x(99, 100), Some(100.0));
        assert_eq!(chart_x(250, 100), Some(100.0));
    }

    #[test]
    fn test_labels() {
        assert_eq!(grade_label(Some(3.456)), "3.5%");
        assert_eq!(grade_label(None), "0%");
        assert_eq!(progress_label(PlaybackState::Playing, 4, 10), "4/10");
        assert_eq!(progress_label(PlaybackState::Finished, 10, 10), "Arrived");
    }

    #[test]
    fn test_hud_defaults_to_north() {
        let hud = Hud::default();
        assert_eq!(hud.cardinal, "N");
        assert_eq!(hud.street, "Locating...");
    }
}
