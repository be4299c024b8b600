//! Queue commands

use futures::StreamExt;

use crate::audio::ChannelRef;
use crate::error::{QueueError, ResolutionError, Result};
use crate::model::{Direction, PlayerState, QueueEvent, Track};

use super::QueueController;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnqueueOutcome {
    pub added: usize,
    /// Query of the first appended track
    pub first: String,
    /// Playback was started by this request
    pub started: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Moved(usize),
    AtBoundary,
}

impl QueueController {
    /// Resolve `query`, append the results and start playing if the queue was empty.
    ///
    /// A connection failure aborts before the queue is touched.
    pub async fn enqueue_and_maybe_start(
        &self,
        channel: &ChannelRef,
        query: &str,
    ) -> Result<EnqueueOutcome> {
        let generation = self.state.lock().await.generation();

        self.session.ensure_connected(channel).await?;

        let tracks: Vec<Track> = self.resolver.resolve(query).await?.collect().await;
        let Some(first) = tracks.first().map(|t| t.query.clone()) else {
            tracing::info!(query, "Nothing resolved");
            return Err(ResolutionError::NoMatch(query.to_string()).into());
        };
        let added = tracks.len();

        let attempt = {
            let mut state = self.state.lock().await;
            if state.generation() != generation {
                tracing::info!(query, "Queue was stopped while resolving, discarding tracks");
                return Err(QueueError::Superseded);
            }
            state.append(tracks)
        };

        tracing::info!(query, added, starts_playback = attempt.is_some(), "Tracks queued");

        let started = match attempt {
            Some(attempt) => self.run_attempt(attempt).await,
            None => false,
        };

        Ok(EnqueueOutcome {
            added,
            first,
            started,
        })
    }

    pub async fn advance(&self, direction: Direction) -> AdvanceOutcome {
        let attempt = self.state.lock().await.advance(direction);

        match attempt {
            Some(attempt) => {
                let index = attempt.index;
                tracing::info!(?direction, index, "Moving cursor");
                self.run_attempt(attempt).await;
                AdvanceOutcome::Moved(index)
            }
            None => {
                tracing::debug!(?direction, "Already at queue boundary");
                AdvanceOutcome::AtBoundary
            }
        }
    }

    /// `Ok(false)` when nothing was playing; the state only changes once the
    /// device confirms
    pub async fn pause_current(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.state() != PlayerState::Playing || !self.session.pause().await? {
            return Ok(false);
        }
        state.set_paused(true);
        tracing::info!("Playback paused");
        Ok(true)
    }

    /// `Ok(false)` when nothing was paused
    pub async fn resume_current(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.state() != PlayerState::Paused || !self.session.resume().await? {
            return Ok(false);
        }
        state.set_paused(false);
        tracing::info!("Playback resumed");
        Ok(true)
    }

    /// Titles of the free-text search results; the queue is not touched
    pub async fn search_titles(&self, query: &str) -> Result<Vec<String>> {
        let hits = self.resolver.search(query).await?;
        tracing::debug!(query, results = hits.len(), "Search finished");
        Ok(hits.into_iter().map(|hit| hit.title).collect())
    }

    pub async fn list_queue(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .tracks()
            .iter()
            .map(|t| t.query.clone())
            .collect()
    }

    pub async fn toggle_loop_track(&self) -> bool {
        let enabled = self.state.lock().await.toggle_loop_track();
        tracing::info!(enabled, "Loop track toggled");
        enabled
    }

    pub async fn toggle_loop_queue(&self) -> bool {
        let enabled = self.state.lock().await.toggle_loop_queue();
        tracing::info!(enabled, "Loop queue toggled");
        enabled
    }

    /// Clear the queue, halt output and leave the channel.
    ///
    /// Attempts and enqueues still in flight are invalidated and discard
    /// their results when they come back.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        state.clear();
        self.session.stop().await;
        drop(state);

        tracing::info!("Playback stopped and queue cleared");
        self.emit(QueueEvent::Stopped);
    }
}
