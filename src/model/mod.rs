//! Model module - Queue state and data types
//!
//! - `types`: Playback mode, controller state, status and informational events
//! - `content`: Track descriptors and provider lookup results
//! - `playback`: The queue and its transition rules

mod types;
mod content;
mod playback;

pub use types::{
    Direction, PlaybackStatus, PlayerState, QueueEvent, StatusEvent,
};

pub use content::{CatalogTrack, SearchHit, StreamRef, Track, TrackSource};

pub use playback::{Attempt, QueueState};
