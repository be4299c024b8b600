//! Controller module - The playback queue state machine
//!
//! The controller owns the queue, cursor and loop flags and decides what
//! plays next. It is organized into submodules by responsibility:
//!
//! - `playback`: Commands issued by the command router
//! - `player_events`: Status listener and the play-attempt loop

mod playback;
mod player_events;


use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::audio::PlaybackSession;
use crate::error::{QueueError, ResolutionError};
use crate::model::{QueueEvent, QueueState};
use crate::resolver::TrackResolver;

pub use playback::AdvanceOutcome;

const EVENT_BUFFER: usize = 64;

/// Every mutation of `state` happens while holding its lock; lookups run
/// outside it and re-check their attempt token before writing back.
#[derive(Clone)]
pub struct QueueController {
    pub(crate) state: Arc<Mutex<QueueState>>,
    pub(crate) resolver: Arc<TrackResolver>,
    pub(crate) session: Arc<PlaybackSession>,
    events: broadcast::Sender<QueueEvent>,
}

impl QueueController {
    pub fn new(resolver: TrackResolver, session: PlaybackSession) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            state: Arc::new(Mutex::new(QueueState::new())),
            resolver: Arc::new(resolver),
            session: Arc::new(session),
            events,
        }
    }

    /// Informational events (now playing, skipped tracks, end of queue)
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: QueueEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    #[cfg(test)]
    pub async fn player_state(&self) -> crate::model::PlayerState {
        self.state.lock().await.state()
    }

    #[cfg(test)]
    pub async fn cursor(&self) -> Option<usize> {
        self.state.lock().await.cursor()
    }

    pub(crate) fn format_error(error: &QueueError) -> String {
        match error {
            QueueError::Resolution(ResolutionError::NoMatch(_)) => "No results found.".to_string(),
            QueueError::Resolution(ResolutionError::RateLimited) => {
                "Rate limited. Please wait a moment.".to_string()
            }
            QueueError::Resolution(ResolutionError::Unauthenticated) => {
                "Spotify lookups are unavailable. Check the Spotify credentials.".to_string()
            }
            QueueError::Resolution(ResolutionError::Timeout(_)) => {
                "The lookup took too long. Try again.".to_string()
            }
            QueueError::Connection(e) => format!("Could not join the voice channel: {}", e),
            QueueError::Superseded => {
                "Playback was stopped before the request finished.".to_string()
            }
            other => format!("Error: {}", other),
        }
    }
}
