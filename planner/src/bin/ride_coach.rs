use std::{sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use planner::{
    Advisor, Collaborators, Geocoder, PlannerConfig, SessionController,
    advice::GeminiAdvisor,
    google::GoogleMapsClient,
    render::LogSurface,
    speech::LogNarrator,
};
use shared::{Coordinate, PlaybackState, RouteRequest, TravelMode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Plan a ride, replay it point by point and hear a coaching tip"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plan a route between two places and play it back
    Plan {
        origin: String,
        destination: String,
        #[arg(long, default_value_t = TravelMode::Bicycling)]
        mode: TravelMode,
        /// Playback speed in km/h
        #[arg(long)]
        speed: Option<f64>,
        /// Follow the marker with the street-level panorama
        #[arg(long)]
        panorama: bool,
        /// Print the final session snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Look up a place by address
    Search { address: String },
    /// Describe the place at a coordinate
    Where {
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lon: f64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "planner=info,ride_coach=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = PlannerConfig::from_env()?;
    let maps = Arc::new(GoogleMapsClient::new(config.google.clone())?);

    match args.command {
        Command::Search { address } => {
            let place = maps.geocode(&address).await?;
            println!("{} ({:.6}, {:.6})", place.formatted_address, place.lat, place.lon);
        }
        Command::Where { lat, lon } => {
            let place = maps.reverse_geocode(Coordinate { lat, lon }).await?;
            println!("{}", place.formatted_address);
        }
        Command::Plan {
            origin,
            destination,
            mode,
            speed,
            panorama,
            json,
        } => {
            let advisor = config.gemini.clone().and_then(|gemini| {
                match GeminiAdvisor::new(gemini) {
                    Ok(advisor) => Some(Arc::new(advisor) as Arc<dyn Advisor>),
                    Err(err) => {
                        tracing::warn!("coaching disabled: {err}");
                        None
                    }
                }
            });
            let collaborators = Collaborators {
                routing: maps.clone(),
                elevation: maps,
                advisor,
            };
            let (handle, task) = SessionController::spawn(
                collaborators,
                LogSurface::new(),
                LogNarrator::new(),
                config.session.clone(),
            );

            if let Some(speed) = speed {
                handle.set_speed(speed).await?;
            }
            let route = handle
                .request_route(RouteRequest::new(origin, destination, mode))
                .await?;
            tracing::info!(
                "{} in {}, {:.0} m of climbing",
                route.distance_label,
                route.duration_label,
                route.total_ascent()
            );
            if panorama {
                handle.toggle_panorama().await?;
            }
            handle.play().await?;

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);
            loop {
                tokio::select! {
                    _ = &mut ctrl_c => {
                        handle.pause().await?;
                        tracing::info!("interrupted");
                        break;
                    }
                    () = tokio::time::sleep(POLL_INTERVAL) => {
                        let snapshot = handle.snapshot().await?;
                        let tip_done = snapshot.tip.is_some() && !snapshot.speaking;
                        if snapshot.playback == PlaybackState::Finished && tip_done {
                            break;
                        }
                    }
                }
            }

            let snapshot = handle.snapshot().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else if let Some(tip) = snapshot.tip {
                println!("{tip}");
            }
            handle.shutdown().await?;
            task.await?;
        }
    }

    Ok(())
}
