//! Queue state and the transition rules that decide what plays next
//!
//! Everything here is synchronous and side-effect free: the controller holds a
//! `QueueState` behind its mutex, asks it what to do, and performs the I/O.

use super::content::Track;
use super::types::{Direction, PlaybackMode, PlayerState};

/// A single play attempt for the track at `index`.
///
/// The token identifies the attempt; results carrying an older token are stale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attempt {
    pub token: u64,
    pub index: usize,
    pub track: Track,
}

#[derive(Debug, Default)]
pub struct QueueState {
    tracks: Vec<Track>,
    cursor: usize,
    mode: PlaybackMode,
    state: PlayerState,
    attempt: u64,
    generation: u64,
    now_playing: Option<String>,
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Cursor position, meaningless (and hidden) while the queue is empty
    pub fn cursor(&self) -> Option<usize> {
        if self.tracks.is_empty() {
            None
        } else {
            Some(self.cursor)
        }
    }

    #[cfg(test)]
    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.attempt == token
    }

    pub fn now_playing(&self) -> Option<&str> {
        self.now_playing.as_deref()
    }

    fn is_last(&self) -> bool {
        self.cursor + 1 >= self.tracks.len()
    }

    fn begin_attempt(&mut self) -> Option<Attempt> {
        let track = self.tracks.get(self.cursor)?.clone();
        self.attempt += 1;
        self.state = PlayerState::Playing;
        self.now_playing = None;
        Some(Attempt {
            token: self.attempt,
            index: self.cursor,
            track,
        })
    }

    /// Append tracks at the tail. Starts from the first new track only if the
    /// queue held nothing before.
    pub fn append(&mut self, tracks: Vec<Track>) -> Option<Attempt> {
        if tracks.is_empty() {
            return None;
        }

        let was_empty = self.tracks.is_empty();
        self.tracks.extend(tracks);

        if was_empty {
            self.cursor = 0;
            self.begin_attempt()
        } else {
            None
        }
    }

    /// Manual navigation; `None` at either boundary leaves everything untouched
    pub fn advance(&mut self, direction: Direction) -> Option<Attempt> {
        if self.tracks.is_empty() {
            return None;
        }

        match direction {
            Direction::Next if !self.is_last() => self.cursor += 1,
            Direction::Previous if self.cursor > 0 => self.cursor -= 1,
            _ => return None,
        }

        self.begin_attempt()
    }

    /// Natural end of the current track
    pub fn after_idle(&mut self) -> Option<Attempt> {
        if self.tracks.is_empty() {
            return None;
        }

        if self.mode.loop_track {
            return self.begin_attempt();
        }

        if self.is_last() {
            if self.mode.loop_queue {
                self.cursor = 0;
                return self.begin_attempt();
            }
            self.settle();
            return None;
        }

        self.cursor += 1;
        self.begin_attempt()
    }

    /// The current track failed to materialize or play.
    ///
    /// Moves forward at most once and never wraps, so a run of failures ends
    /// at the last track regardless of loop flags.
    pub fn after_failure(&mut self) -> Option<Attempt> {
        if self.tracks.is_empty() || self.is_last() {
            self.settle();
            return None;
        }

        self.cursor += 1;
        self.begin_attempt()
    }

    fn settle(&mut self) {
        self.now_playing = None;
        if self.state != PlayerState::Stopped {
            self.state = if self.tracks.is_empty() {
                PlayerState::Empty
            } else {
                PlayerState::Idle
            };
        }
    }

    pub fn mark_playing(&mut self, title: impl Into<String>) {
        self.state = PlayerState::Playing;
        self.now_playing = Some(title.into());
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.state = if paused {
            PlayerState::Paused
        } else {
            PlayerState::Playing
        };
    }

    pub fn toggle_loop_track(&mut self) -> bool {
        self.mode.loop_track = !self.mode.loop_track;
        self.mode.loop_track
    }

    pub fn toggle_loop_queue(&mut self) -> bool {
        self.mode.loop_queue = !self.mode.loop_queue;
        self.mode.loop_queue
    }

    /// Drop every track and invalidate in-flight attempts and enqueues
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.cursor = 0;
        self.attempt += 1;
        self.generation += 1;
        self.now_playing = None;
        self.state = PlayerState::Stopped;
    }
}
