//! Speech output for coaching tips.

use std::time::Duration;

use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::info;

use crate::config::SpeechConfig;

/// Identifies one `speak` call so late events from a replaced utterance can
/// be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UtteranceId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub locale: String,
    pub rate: f64,
}

impl Utterance {
    pub fn new(id: UtteranceId, text: impl Into<String>, config: &SpeechConfig) -> Self {
        Self {
            id,
            text: text.into(),
            locale: config.locale.clone(),
            rate: config.rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEvent {
    Started(UtteranceId),
    Ended(UtteranceId),
}

impl SpeechEvent {
    pub fn utterance(self) -> UtteranceId {
        match self {
            Self::Started(id) | Self::Ended(id) => id,
        }
    }
}

/// Speaks one utterance at a time. Speaking again replaces the current
/// utterance; `cancel` is idempotent and no event fires after it.
pub trait SpeechOutput: Send {
    fn speak(&mut self, utterance: Utterance, events: mpsc::UnboundedSender<SpeechEvent>);
    fn cancel(&mut self);
}

/// Reads tips into the log at roughly spoken pace.
#[derive(Default)]
pub struct LogNarrator {
    current: Option<JoinHandle<()>>,
}

const WORDS_PER_SECOND: f64 = 2.5;

impl LogNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    fn speaking_time(utterance: &Utterance) -> Duration {
        let words = utterance.text.split_whitespace().count().max(1) as f64;
        let rate = if utterance.rate > 0.0 { utterance.rate } else { 1.0 };
        Duration::from_secs_f64(words / (WORDS_PER_SECOND * rate))
    }
}

impl SpeechOutput for LogNarrator {
    fn speak(&mut self, utterance: Utterance, events: mpsc::UnboundedSender<SpeechEvent>) {
        self.cancel();
        let duration = Self::speaking_time(&utterance);
        let id = utterance.id;
        self.current = Some(tokio::spawn(async move {
            let _ = events.send(SpeechEvent::Started(id));
            info!(locale = %utterance.locale, "coach says: {}", utterance.text);
            tokio::time::sleep(duration).await;
            let _ = events.send(SpeechEvent::Ended(id));
        }));
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.abort();
        }
    }
}

impl Drop for LogNarrator {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_narrator_emits_start_and_end() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut narrator = LogNarrator::new();
        let id = UtteranceId(7);
        narrator.speak(Utterance::new(id, "Spin easy", &SpeechConfig::default()), tx);
        assert_eq!(rx.recv().await, Some(SpeechEvent::Started(id)));
        assert_eq!(rx.recv().await, Some(SpeechEvent::Ended(id)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_end() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut narrator = LogNarrator::new();
        let id = UtteranceId(1);
        narrator.speak(Utterance::new(id, "one two three four", &SpeechConfig::default()), tx);
        assert_eq!(rx.recv().await, Some(SpeechEvent::Started(id)));
        narrator.cancel();
        narrator.cancel();
        // The aborted task drops its sender, closing the channel without `Ended`.
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_speaking_time_scales_with_rate() {
        let slow = Utterance {
            id: UtteranceId(0),
            text: "a b c d e".into(),
            locale: "en-US".into(),
            rate: 1.0,
        };
        let fast = Utterance { rate: 2.0, ..slow.clone() };
        assert_eq!(LogNarrator::speaking_time(&slow), Duration::from_secs(2));
        assert_eq!(LogNarrator::speaking_time(&fast), Duration::from_secs(1));
    }
}
