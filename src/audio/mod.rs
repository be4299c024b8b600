//! Audio output session: one transport connection plus one output device
//!
//! The session owns the connection handle and forwards every status
//! transition of the device, tagged with the play attempt that caused it,
//! into a single channel read by the queue controller.

mod mpv;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::{ConnectionError, PlaybackFault};
use crate::model::{PlaybackStatus, StatusEvent, StreamRef};

pub use mpv::{LocalTransport, MpvOutput, DEFAULT_CHANNEL};

/// Names the channel (or local audio device) to play into
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelRef(pub String);

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub id: u64,
    pub channel: ChannelRef,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn join(&self, channel: &ChannelRef) -> Result<ConnectionHandle, ConnectionError>;

    async fn leave(&self, connection: &ConnectionHandle);
}

#[async_trait]
pub trait OutputDevice: Send + Sync {
    /// Start `stream`, replacing nothing; the session stops the previous one.
    ///
    /// The device reports through `sink`: `playing` once audio flows, then one
    /// of `idle`/`errored`. A stream that fails before producing audio reports
    /// only `errored`. A stream halted by `stop` reports nothing further.
    async fn play_stream(
        &self,
        connection: &ConnectionHandle,
        stream: &StreamRef,
        sink: StatusSink,
    ) -> Result<(), PlaybackFault>;

    async fn pause(&self) -> Result<(), PlaybackFault>;

    async fn resume(&self) -> Result<(), PlaybackFault>;

    async fn stop(&self);
}

/// Reporting handle for one play attempt.
///
/// The terminal methods consume the sink, so a stream can end only once.
#[derive(Debug)]
pub struct StatusSink {
    attempt: u64,
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl StatusSink {
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    fn send(&self, status: PlaybackStatus) {
        let event = StatusEvent {
            attempt: self.attempt,
            status,
        };
        if self.tx.send(event).is_err() {
            tracing::debug!(attempt = self.attempt, "Status listener gone, dropping event");
        }
    }

    pub fn playing(&self) {
        self.send(PlaybackStatus::Playing);
    }

    pub fn idle(self) {
        self.send(PlaybackStatus::Idle);
    }

    pub fn errored(self, fault: PlaybackFault) {
        self.send(PlaybackStatus::Errored(fault));
    }
}

pub type StatusReceiver = mpsc::UnboundedReceiver<StatusEvent>;

#[derive(Default)]
struct SessionInner {
    connection: Option<ConnectionHandle>,
    track_active: bool,
}

pub struct PlaybackSession {
    transport: Arc<dyn Transport>,
    device: Arc<dyn OutputDevice>,
    status_tx: mpsc::UnboundedSender<StatusEvent>,
    connect_timeout: Duration,
    inner: Mutex<SessionInner>,
}

impl PlaybackSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        device: Arc<dyn OutputDevice>,
        connect_timeout: Duration,
    ) -> (Self, StatusReceiver) {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let session = Self {
            transport,
            device,
            status_tx,
            connect_timeout,
            inner: Mutex::new(SessionInner::default()),
        };
        (session, status_rx)
    }

    /// Join `channel` unless a connection is already up
    pub async fn ensure_connected(
        &self,
        channel: &ChannelRef,
    ) -> Result<ConnectionHandle, ConnectionError> {
        let mut inner = self.inner.lock().await;
        if let Some(connection) = &inner.connection {
            return Ok(connection.clone());
        }

        tracing::info!(channel = %channel, "Joining channel");
        let connection = tokio::time::timeout(self.connect_timeout, self.transport.join(channel))
            .await
            .map_err(|_| ConnectionError::Timeout(self.connect_timeout))??;

        tracing::info!(channel = %channel, connection = connection.id, "Connected");
        inner.connection = Some(connection.clone());
        Ok(connection)
    }

    #[cfg(test)]
    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.connection.is_some()
    }

    /// Replace whatever is playing with `stream`, reporting under `attempt`
    pub async fn play(&self, stream: &StreamRef, attempt: u64) -> Result<(), PlaybackFault> {
        let mut inner = self.inner.lock().await;
        let connection = inner
            .connection
            .clone()
            .ok_or_else(|| PlaybackFault::Device(ConnectionError::NotConnected.to_string()))?;

        if inner.track_active {
            self.device.stop().await;
            inner.track_active = false;
        }

        let sink = StatusSink {
            attempt,
            tx: self.status_tx.clone(),
        };
        self.device.play_stream(&connection, stream, sink).await?;
        inner.track_active = true;

        tracing::debug!(attempt, title = %stream.title, "Stream handed to output device");
        Ok(())
    }

    /// The device reported the end of the current stream
    pub async fn track_finished(&self) {
        self.inner.lock().await.track_active = false;
    }

    /// `Ok(false)` when nothing was active
    pub async fn pause(&self) -> Result<bool, PlaybackFault> {
        let inner = self.inner.lock().await;
        if !inner.track_active {
            return Ok(false);
        }
        self.device.pause().await?;
        Ok(true)
    }

    pub async fn resume(&self) -> Result<bool, PlaybackFault> {
        let inner = self.inner.lock().await;
        if !inner.track_active {
            return Ok(false);
        }
        self.device.resume().await?;
        Ok(true)
    }

    /// Halt output and leave the channel; the next play needs a new connection
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if inner.track_active {
            self.device.stop().await;
            inner.track_active = false;
        }
        if let Some(connection) = inner.connection.take() {
            self.transport.leave(&connection).await;
            tracing::info!(channel = %connection.channel, "Left channel");
        }
    }
}
