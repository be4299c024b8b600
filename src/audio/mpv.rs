//! Local playback through an `mpv` child process

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use tokio::sync::{oneshot, Mutex};

use super::{ChannelRef, ConnectionHandle, OutputDevice, StatusSink, Transport};
use crate::error::{ConnectionError, PlaybackFault};
use crate::model::StreamRef;

/// Channel name that leaves device selection to the player
pub const DEFAULT_CHANNEL: &str = "auto";

const IPC_CONNECT_RETRIES: u32 = 20;
const IPC_RETRY_DELAY: Duration = Duration::from_millis(50);

/// "Joins" a local audio device by checking the player is usable
pub struct LocalTransport {
    player_path: PathBuf,
    next_id: AtomicU64,
}

impl LocalTransport {
    pub fn new(player_path: impl Into<PathBuf>) -> Self {
        Self {
            player_path: player_path.into(),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn join(&self, channel: &ChannelRef) -> Result<ConnectionHandle, ConnectionError> {
        let join_failed = |reason: String| ConnectionError::JoinFailed {
            channel: channel.to_string(),
            reason,
        };

        let output = Command::new(&self.player_path)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| join_failed(format!("{}: {}", self.player_path.display(), e)))?;

        if !output.status.success() {
            return Err(join_failed(format!("player exited with {}", output.status)));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        tracing::debug!(
            player = %version.lines().next().unwrap_or_default(),
            channel = %channel,
            "Player available"
        );

        Ok(ConnectionHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            channel: channel.clone(),
        })
    }

    async fn leave(&self, connection: &ConnectionHandle) {
        tracing::debug!(connection = connection.id, channel = %connection.channel, "Released audio device");
    }
}

struct Running {
    kill: oneshot::Sender<()>,
    socket: PathBuf,
}

/// Plays one stream at a time in a headless `mpv`, controlled over its IPC socket
pub struct MpvOutput {
    player_path: PathBuf,
    current: Mutex<Option<Running>>,
}

impl MpvOutput {
    pub fn new(player_path: impl Into<PathBuf>) -> Self {
        Self {
            player_path: player_path.into(),
            current: Mutex::new(None),
        }
    }

    async fn set_pause(&self, paused: bool) -> Result<(), PlaybackFault> {
        let socket = match self.current.lock().await.as_ref() {
            Some(running) => running.socket.clone(),
            None => return Err(PlaybackFault::Device("no stream is playing".to_string())),
        };

        let command = json!({ "command": ["set_property", "pause", paused] });
        send_ipc(&socket, &command).await.map_err(|e| {
            tracing::warn!(error = %e, paused, "Failed to send pause command to player");
            PlaybackFault::Device(format!("player IPC: {}", e))
        })
    }
}

fn player_args(connection: &ConnectionHandle, stream: &StreamRef, socket: &Path) -> Vec<String> {
    let mut args = vec![
        "--no-video".to_string(),
        "--no-terminal".to_string(),
        format!("--input-ipc-server={}", socket.display()),
    ];
    if connection.channel.0 != DEFAULT_CHANNEL {
        args.push(format!("--audio-device={}", connection.channel));
    }
    args.push(stream.url.clone());
    args
}

#[async_trait]
impl OutputDevice for MpvOutput {
    async fn play_stream(
        &self,
        connection: &ConnectionHandle,
        stream: &StreamRef,
        sink: StatusSink,
    ) -> Result<(), PlaybackFault> {
        let attempt = sink.attempt();
        let socket = std::env::temp_dir().join(format!(
            "jukebox-mpv-{}-{}.sock",
            std::process::id(),
            attempt
        ));

        let mut child = Command::new(&self.player_path)
            .args(player_args(connection, stream, &socket))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlaybackFault::Spawn(e.to_string()))?;

        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();

        let task_socket = socket.clone();
        tokio::spawn(async move {
            let audio_started = wait_for_audio(&task_socket);
            tokio::pin!(audio_started);
            let mut reported = false;

            let exited = loop {
                tokio::select! {
                    status = child.wait() => break Some(status),
                    _ = &mut kill_rx => break None,
                    observed = &mut audio_started, if !reported => {
                        reported = true;
                        match observed {
                            AudioStart::Started => sink.playing(),
                            AudioStart::Unobservable => {
                                tracing::debug!(attempt, "No playback events from player, treating spawn as start");
                                sink.playing();
                            }
                            // The exit itself is reported by the wait branch
                            AudioStart::Closed => {}
                        }
                    }
                }
            };

            match exited {
                Some(Ok(status)) if status.success() => {
                    tracing::debug!(attempt, "Player finished stream");
                    sink.idle();
                }
                Some(Ok(status)) => {
                    tracing::warn!(attempt, status = %status, "Player exited with failure");
                    sink.errored(PlaybackFault::Exited(status.code()));
                }
                Some(Err(e)) => sink.errored(PlaybackFault::Device(e.to_string())),
                None => {
                    if let Err(e) = child.kill().await {
                        tracing::debug!(attempt, error = %e, "Player already gone on stop");
                    }
                }
            }

            let _ = tokio::fs::remove_file(&task_socket).await;
        });

        // A replaced handle drops its sender, which kills the old player
        *self.current.lock().await = Some(Running {
            kill: kill_tx,
            socket,
        });
        Ok(())
    }

    async fn pause(&self) -> Result<(), PlaybackFault> {
        self.set_pause(true).await
    }

    async fn resume(&self) -> Result<(), PlaybackFault> {
        self.set_pause(false).await
    }

    async fn stop(&self) {
        if let Some(running) = self.current.lock().await.take() {
            let _ = running.kill.send(());
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum AudioStart {
    Started,
    /// The IPC socket never came up
    Unobservable,
    /// The player closed the socket before any audio
    Closed,
}

/// mpv announces that decoded audio reaches the output
fn is_audio_start(line: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(line)
        .map(|message| message["event"] == "playback-restart")
        .unwrap_or(false)
}

/// mpv creates its socket a moment after spawning
#[cfg(unix)]
async fn connect_ipc(socket: &Path) -> std::io::Result<tokio::net::UnixStream> {
    let mut tries = 0;
    loop {
        match tokio::net::UnixStream::connect(socket).await {
            Ok(stream) => return Ok(stream),
            Err(e) if tries < IPC_CONNECT_RETRIES => {
                tracing::trace!(error = %e, tries, "Player socket not ready");
                tries += 1;
                tokio::time::sleep(IPC_RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(unix)]
async fn send_ipc(socket: &Path, command: &serde_json::Value) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut line = serde_json::to_vec(command)?;
    line.push(b'\n');

    let mut stream = connect_ipc(socket).await?;
    stream.write_all(&line).await
}

/// Resolves on the first `playback-restart` event
#[cfg(unix)]
async fn wait_for_audio(socket: &Path) -> AudioStart {
    use tokio::io::{AsyncBufReadExt, BufReader};

    let stream = match connect_ipc(socket).await {
        Ok(stream) => stream,
        Err(_) => return AudioStart::Unobservable,
    };

    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_audio_start(&line) {
            return AudioStart::Started;
        }
    }
    AudioStart::Closed
}

#[cfg(not(unix))]
async fn send_ipc(_socket: &Path, _command: &serde_json::Value) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "player IPC requires unix domain sockets",
    ))
}

#[cfg(not(unix))]
async fn wait_for_audio(_socket: &Path) -> AudioStart {
    AudioStart::Unobservable
}
