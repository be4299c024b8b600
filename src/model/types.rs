//! Core type definitions for the queue controller

/// Loop flags; both may be set, `loop_track` wins
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackMode {
    pub loop_track: bool,
    pub loop_queue: bool,
}

/// Where the controller is in its lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayerState {
    /// No tracks queued
    #[default]
    Empty,
    /// The cursor track is being materialized or is audible
    Playing,
    Paused,
    /// Reached the end of the queue with nothing left to play
    Idle,
    /// Cleared by an explicit stop; the next enqueue starts over
    Stopped,
}

/// Manual navigation direction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Status transitions reported by the output device
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Idle,
    Errored(crate::error::PlaybackFault),
}

/// A status transition tagged with the play attempt that produced it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusEvent {
    pub attempt: u64,
    pub status: PlaybackStatus,
}

/// Informational events relayed to whoever issued the commands
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueueEvent {
    NowPlaying {
        index: usize,
        query: String,
        title: String,
    },
    Skipped {
        index: usize,
        query: String,
        reason: String,
    },
    /// Playback ran off the end of the queue
    Finished,
    Stopped,
}
