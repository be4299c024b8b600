//! Error taxonomy for resolution, transport and playback failures

use std::time::Duration;
use thiserror::Error;

/// A query or track could not be turned into something playable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("No match found for '{0}'")]
    NoMatch(String),

    #[error("Invalid catalog reference: {0}")]
    InvalidReference(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider rate limited")]
    RateLimited,

    #[error("Provider rejected credentials")]
    Unauthenticated,

    #[error("Lookup timed out after {0:?}")]
    Timeout(Duration),
}

impl ResolutionError {
    /// Classify a provider failure message the way HTTP status codes show up in it
    pub fn from_provider_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains("429") {
            Self::RateLimited
        } else if message.contains("401") || message.contains("403") {
            Self::Unauthenticated
        } else {
            Self::Unavailable(message)
        }
    }
}

/// The voice transport could not be joined or was lost
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Failed to join channel '{channel}': {reason}")]
    JoinFailed { channel: String, reason: String },

    #[error("Joining the channel timed out after {0:?}")]
    Timeout(Duration),

    #[error("Not connected to a channel")]
    NotConnected,
}

/// The output device failed while starting or playing a stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackFault {
    #[error("Failed to start player: {0}")]
    Spawn(String),

    #[error("Player exited with status {0:?}")]
    Exited(Option<i32>),

    #[error("Output device error: {0}")]
    Device(String),
}

/// Status returned to the command router for a failed operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Playback(#[from] PlaybackFault),

    #[error("Request was superseded by a stop")]
    Superseded,
}

pub type Result<T> = std::result::Result<T, QueueError>;
