use serde::{Deserialize, Serialize};

/// Maps a playback speed in km/h to the delay between two playback ticks.
///
/// The mapping is linear and decreasing: `base_interval_ms - ms_per_kmh * kmh`,
/// clamped to `min_interval_ms` so the tick rate stays bounded. The constants
/// are presentation tuning, not physics; the defaults give the classic 500 ms
/// cadence at 25 km/h.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedMapping {
    pub base_interval_ms: u32,
    pub ms_per_kmh: f64,
    pub min_interval_ms: u32,
}

impl Default for SpeedMapping {
    fn default() -> Self {
        Self {
            base_interval_ms: 1_000,
            ms_per_kmh: 20.0,
            min_interval_ms: 50,
        }
    }
}

impl SpeedMapping {
    pub const DEFAULT_SPEED_KMH: f64 = 25.0;

    pub fn interval_ms(&self, speed_kmh: f64) -> u32 {
        let floor = self.min_interval_ms.max(1);
        let speed = if speed_kmh.is_finite() { speed_kmh.max(0.0) } else { 0.0 };
        let raw = f64::from(self.base_interval_ms) - self.ms_per_kmh.max(0.0) * speed;
        if raw <= f64::from(floor) {
            floor
        } else {
            raw.round() as u32
        }
    }

    pub fn default_interval_ms(&self) -> u32 {
        self.interval_ms(Self::DEFAULT_SPEED_KMH)
    }
}
