//! Playback status listener and the play-attempt loop

use tokio::task::JoinHandle;

use crate::audio::StatusReceiver;
use crate::error::QueueError;
use crate::model::{Attempt, PlaybackStatus, QueueEvent, StatusEvent};

use super::QueueController;

impl QueueController {
    /// Feed status events into the controller one at a time.
    ///
    /// The next event is not read until the previous one, including any play
    /// attempt it triggered, has been handled.
    pub fn start_status_listener(&self, mut status_rx: StatusReceiver) -> JoinHandle<()> {
        let controller = self.clone();
        tracing::info!("Starting playback status listener");

        tokio::spawn(async move {
            while let Some(event) = status_rx.recv().await {
                controller.handle_status(event).await;
            }
            tracing::debug!("Status channel closed, listener shutting down");
        })
    }

    pub(crate) async fn handle_status(&self, event: StatusEvent) {
        let next = {
            let mut state = self.state.lock().await;

            if !state.is_current(event.attempt) {
                tracing::debug!(attempt = event.attempt, status = ?event.status, "Ignoring status from superseded attempt");
                return;
            }

            let Some(index) = state.cursor() else {
                return;
            };
            let query = state.tracks()[index].query.clone();

            match event.status {
                PlaybackStatus::Playing => {
                    let title = state.now_playing().unwrap_or(query.as_str()).to_string();
                    tracing::info!(index, query = %query, title = %title, "Now playing");
                    self.emit(QueueEvent::NowPlaying { index, query, title });
                    return;
                }
                PlaybackStatus::Idle => {
                    tracing::debug!(index, "Track finished");
                    self.session.track_finished().await;
                    let next = state.after_idle();
                    if next.is_none() {
                        tracing::info!("Reached end of queue");
                        self.emit(QueueEvent::Finished);
                    }
                    next
                }
                PlaybackStatus::Errored(fault) => {
                    tracing::warn!(index, query = %query, error = %fault, "Playback failed, skipping forward");
                    self.session.track_finished().await;
                    self.emit(QueueEvent::Skipped {
                        index,
                        query,
                        reason: fault.to_string(),
                    });
                    let next = state.after_failure();
                    if next.is_none() {
                        self.emit(QueueEvent::Finished);
                    }
                    next
                }
            }
        };

        if let Some(attempt) = next {
            self.run_attempt(attempt).await;
        }
    }

    /// Materialize and play `attempt`, skipping forward past failures.
    ///
    /// Each failure moves the cursor at most once, so the loop ends by the
    /// last track. Returns whether a stream reached the output device.
    pub(crate) async fn run_attempt(&self, mut attempt: Attempt) -> bool {
        loop {
            tracing::debug!(
                attempt = attempt.token,
                index = attempt.index,
                query = %attempt.track.query,
                "Starting play attempt"
            );

            let materialized = self.resolver.materialize(&attempt.track).await;

            let mut state = self.state.lock().await;
            if !state.is_current(attempt.token) {
                tracing::debug!(attempt = attempt.token, "Play attempt superseded, discarding result");
                return false;
            }

            let failure: QueueError = match materialized {
                Ok(stream) => match self.session.play(&stream, attempt.token).await {
                    Ok(()) => {
                        tracing::info!(index = attempt.index, title = %stream.title, "Playback started");
                        state.mark_playing(stream.title);
                        return true;
                    }
                    Err(fault) => fault.into(),
                },
                Err(e) => e.into(),
            };

            tracing::warn!(
                index = attempt.index,
                query = %attempt.track.query,
                error = %failure,
                "Skipping unplayable track"
            );
            self.emit(QueueEvent::Skipped {
                index: attempt.index,
                query: attempt.track.query.clone(),
                reason: failure.to_string(),
            });

            match state.after_failure() {
                Some(next) => attempt = next,
                None => {
                    tracing::info!("No playable tracks left");
                    self.emit(QueueEvent::Finished);
                    return false;
                }
            }
        }
    }
}
