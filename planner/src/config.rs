use std::str::FromStr;

use shared::{DEFAULT_ELEVATION_SAMPLES, SpeedMapping, gemini};

use crate::error::ConfigError;

pub const DEFAULT_SPEECH_LOCALE: &str = "en-US";

#[derive(Debug, Clone)]
pub struct GoogleMapsConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechConfig {
    pub locale: String,
    pub rate: f64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            locale: DEFAULT_SPEECH_LOCALE.to_string(),
            rate: 1.0,
        }
    }
}

/// Everything the session controller needs besides its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub elevation_samples: usize,
    pub speed: SpeedMapping,
    pub initial_speed_kmh: f64,
    pub speech: SpeechConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            elevation_samples: DEFAULT_ELEVATION_SAMPLES,
            speed: SpeedMapping::default(),
            initial_speed_kmh: SpeedMapping::DEFAULT_SPEED_KMH,
            speech: SpeechConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn initial_interval_ms(&self) -> u32 {
        self.speed.interval_ms(self.initial_speed_kmh)
    }
}

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub google: GoogleMapsConfig,
    /// `None` when no credential is configured; tips then use the fallback.
    pub gemini: Option<GeminiConfig>,
    pub session: SessionConfig,
}

impl PlannerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("GOOGLE_MAPS_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("GOOGLE_MAPS_API_KEY"))?;
        let timeout_seconds = parse_or(&lookup, "HTTP_TIMEOUT_SECONDS", 15)?;

        let google = GoogleMapsConfig {
            api_key,
            base_url: lookup("GOOGLE_MAPS_BASE_URL")
                .unwrap_or_else(|| crate::google::DEFAULT_BASE_URL.to_string()),
            timeout_seconds,
        };

        let gemini = lookup("GEMINI_API_KEY")
            .or_else(|| lookup("API_KEY"))
            .filter(|key| !key.trim().is_empty())
            .map(|api_key| GeminiConfig {
                api_key,
                model: lookup("GEMINI_MODEL").unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string()),
                timeout_seconds,
            });

        let defaults = SessionConfig::default();
        let speed = SpeedMapping {
            base_interval_ms: parse_or(
                &lookup,
                "BASE_TICK_INTERVAL_MS",
                defaults.speed.base_interval_ms,
            )?,
            ms_per_kmh: parse_or(&lookup, "TICK_MS_PER_KMH", defaults.speed.ms_per_kmh)?,
            min_interval_ms: parse_or(
                &lookup,
                "MIN_TICK_INTERVAL_MS",
                defaults.speed.min_interval_ms,
            )?,
        };
        if speed.min_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "MIN_TICK_INTERVAL_MS",
                value: "0".into(),
            });
        }

        let session = SessionConfig {
            elevation_samples: parse_or(&lookup, "ELEVATION_SAMPLES", defaults.elevation_samples)?,
            speed,
            initial_speed_kmh: parse_or(&lookup, "PLAYBACK_SPEED_KMH", defaults.initial_speed_kmh)?,
            speech: SpeechConfig {
                locale: lookup("SPEECH_LOCALE").unwrap_or(defaults.speech.locale),
                rate: parse_or(&lookup, "SPEECH_RATE", defaults.speech.rate)?,
            },
        };

        Ok(Self {
            google,
            gemini,
            session,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    field: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(field) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { field, value }),
    }
}
