//! Console command router
//!
//! Maps `!command` lines onto queue controller operations and relays queue
//! events back to the console.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use crate::audio::ChannelRef;
use crate::controller::{AdvanceOutcome, QueueController};
use crate::model::{Direction, QueueEvent};

const HELP: &str = "\
**Music Bot Commands:**
`!play [query]` - Adds a song to the playlist and plays it if it's the only song. Supports YouTube and Spotify queries.
`!pause` - Pauses the current song.
`!resume` - Resumes the paused song.
`!next` - Skips to the next song in the playlist.
`!previous` - Goes back to the previous song in the playlist.
`!playlist` - Lists the current playlist.
`!search [query]` - Searches YouTube for the query and displays the results.
`!loop` - Toggles looping the current song.
`!loopplaylist` - Toggles looping the entire playlist.
`!stop` - Stops playback and clears the playlist.
`!help` - Shows this help message.
`!quit` - Stops playback and exits.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Play(String),
    Pause,
    Resume,
    Next,
    Previous,
    Playlist,
    Search(String),
    Loop,
    LoopPlaylist,
    Stop,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    /// `None` for blank lines
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let command = parts.next()?.to_lowercase();
        let query = parts.collect::<Vec<_>>().join(" ");

        let command = match command.as_str() {
            "!play" => Command::Play(query),
            "!pause" => Command::Pause,
            "!resume" => Command::Resume,
            "!next" => Command::Next,
            "!previous" => Command::Previous,
            "!playlist" => Command::Playlist,
            "!search" => Command::Search(query),
            "!loop" => Command::Loop,
            "!loopplaylist" => Command::LoopPlaylist,
            "!stop" => Command::Stop,
            "!help" => Command::Help,
            "!quit" => Command::Quit,
            _ => Command::Unknown(command),
        };
        Some(command)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit(String),
}

impl Reply {
    fn text(message: impl Into<String>) -> Self {
        Reply::Text(message.into())
    }
}

#[derive(Clone)]
pub struct CommandRouter {
    controller: QueueController,
    channel: ChannelRef,
}

impl CommandRouter {
    pub fn new(controller: QueueController, channel: ChannelRef) -> Self {
        Self {
            controller,
            channel,
        }
    }

    pub async fn dispatch(&self, command: Command) -> Reply {
        tracing::debug!(?command, "Dispatching command");

        match command {
            Command::Play(query) => self.play(&query).await,
            Command::Pause => match self.controller.pause_current().await {
                Ok(true) => Reply::text("Paused."),
                Ok(false) => Reply::text("Nothing is playing."),
                Err(e) => {
                    tracing::warn!(error = %e, "Pause failed");
                    Reply::Text(QueueController::format_error(&e))
                }
            },
            Command::Resume => match self.controller.resume_current().await {
                Ok(true) => Reply::text("Resumed."),
                Ok(false) => Reply::text("Nothing is paused."),
                Err(e) => {
                    tracing::warn!(error = %e, "Resume failed");
                    Reply::Text(QueueController::format_error(&e))
                }
            },
            Command::Next => match self.controller.advance(Direction::Next).await {
                AdvanceOutcome::Moved(_) => Reply::text("Skipping to the next song."),
                AdvanceOutcome::AtBoundary => Reply::text("This is the last song in the playlist."),
            },
            Command::Previous => match self.controller.advance(Direction::Previous).await {
                AdvanceOutcome::Moved(_) => Reply::text("Going back to the previous song."),
                AdvanceOutcome::AtBoundary => {
                    Reply::text("This is the first song in the playlist.")
                }
            },
            Command::Playlist => {
                let tracks = self.controller.list_queue().await;
                if tracks.is_empty() {
                    Reply::text("The playlist is empty.")
                } else {
                    Reply::Text(format!("Current playlist: {}", tracks.join(", ")))
                }
            }
            Command::Search(query) => self.search(&query).await,
            Command::Loop => {
                let enabled = self.controller.toggle_loop_track().await;
                Reply::Text(format!("Loop song is now {}.", on_off(enabled)))
            }
            Command::LoopPlaylist => {
                let enabled = self.controller.toggle_loop_queue().await;
                Reply::Text(format!("Loop playlist is now {}.", on_off(enabled)))
            }
            Command::Stop => {
                self.controller.stop().await;
                Reply::text("Playback stopped and playlist cleared.")
            }
            Command::Help => Reply::text(HELP),
            Command::Quit => {
                self.controller.stop().await;
                Reply::Quit("Bye.".to_string())
            }
            Command::Unknown(name) => {
                tracing::debug!(command = %name, "Unknown command");
                Reply::text("Unknown command. Type `!help` to see the list of commands.")
            }
        }
    }

    async fn play(&self, query: &str) -> Reply {
        if query.is_empty() {
            return Reply::text("Usage: `!play [query]`");
        }

        match self
            .controller
            .enqueue_and_maybe_start(&self.channel, query)
            .await
        {
            Ok(outcome) if outcome.added > 1 => {
                Reply::Text(format!("Added {} songs to the playlist.", outcome.added))
            }
            Ok(outcome) if outcome.started => Reply::Text(format!("Playing: {}", outcome.first)),
            Ok(outcome) => Reply::Text(format!("Added to the playlist: {}", outcome.first)),
            Err(e) => {
                tracing::warn!(query, error = %e, "Play request failed");
                Reply::Text(QueueController::format_error(&e))
            }
        }
    }

    async fn search(&self, query: &str) -> Reply {
        if query.is_empty() {
            return Reply::text("Usage: `!search [query]`");
        }

        match self.controller.search_titles(query).await {
            Ok(titles) if titles.is_empty() => Reply::text("No results found."),
            Ok(titles) => {
                let listing: Vec<String> = titles
                    .iter()
                    .enumerate()
                    .map(|(i, title)| format!("{}. {}", i + 1, title))
                    .collect();
                Reply::Text(format!("Search results:\n{}", listing.join("\n")))
            }
            Err(e) => {
                tracing::warn!(query, error = %e, "Search failed");
                Reply::Text(QueueController::format_error(&e))
            }
        }
    }

    /// Read commands from `input` until it ends or `!quit`, writing replies
    /// and queue events to `output`.
    ///
    /// Commands run one after another on a worker task, so a slow `!play`
    /// never blocks reading input. `!stop` and `!quit` bypass the worker and
    /// take effect while earlier commands are still pending. When the input
    /// ends, queued commands are finished before returning.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut events = self.controller.subscribe();
        let mut relay_events = true;

        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<Command>();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Reply>();
        let mut command_tx = Some(command_tx);

        let worker = {
            let router = self.clone();
            tokio::spawn(async move {
                while let Some(command) = command_rx.recv().await {
                    if reply_tx.send(router.dispatch(command).await).is_err() {
                        break;
                    }
                }
            })
        };

        loop {
            tokio::select! {
                line = lines.next_line(), if command_tx.is_some() => match line? {
                    None => {
                        tracing::info!("Input closed, finishing queued commands");
                        command_tx = None;
                    }
                    Some(line) => match Command::parse(&line) {
                        Some(command @ (Command::Stop | Command::Quit)) => {
                            match self.dispatch(command).await {
                                Reply::Text(text) => write_line(&mut output, &text).await?,
                                Reply::Quit(text) => {
                                    write_line(&mut output, &text).await?;
                                    break;
                                }
                            }
                        }
                        Some(command) => {
                            if let Some(tx) = &command_tx {
                                let _ = tx.send(command);
                            }
                        }
                        None => {}
                    },
                },
                reply = reply_rx.recv() => match reply {
                    Some(Reply::Text(text)) | Some(Reply::Quit(text)) => {
                        write_line(&mut output, &text).await?
                    }
                    // Worker drained the queue after the input closed
                    None => break,
                },
                event = events.recv(), if relay_events => match event {
                    Ok(event) => write_line(&mut output, &describe_event(&event)).await?,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!(missed, "Event relay fell behind");
                    }
                    Err(RecvError::Closed) => relay_events = false,
                },
            }
        }

        worker.abort();
        output.flush().await
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> std::io::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

pub fn describe_event(event: &QueueEvent) -> String {
    match event {
        QueueEvent::NowPlaying { index, title, .. } => {
            format!("Now playing #{}: {}", index + 1, title)
        }
        QueueEvent::Skipped { index, query, reason } => {
            format!("Skipped #{} ({}): {}", index + 1, query, reason)
        }
        QueueEvent::Finished => "Reached the end of the playlist.".to_string(),
        QueueEvent::Stopped => "Playback stopped.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, BufReader};

    use super::*;
    use crate::audio::PlaybackSession;
    use crate::model::PlayerState;
    use crate::resolver::TrackResolver;
    use crate::testing::{FakeOutput, FakeSearch, FakeTransport};

    fn router(search: FakeSearch) -> (CommandRouter, Arc<FakeOutput>) {
        let output = Arc::new(FakeOutput::new());
        let resolver = TrackResolver::new(Arc::new(search), None, Duration::from_secs(5));
        let (session, _status_rx) = PlaybackSession::new(
            Arc::new(FakeTransport::new()),
            output.clone(),
            Duration::from_secs(5),
        );
        let controller = QueueController::new(resolver, session);
        (CommandRouter::new(controller, "music".into()), output)
    }

    async fn send(router: &CommandRouter, line: &str) -> Reply {
        router.dispatch(Command::parse(line).unwrap()).await
    }

    #[test]
    fn parse_splits_command_and_query() {
        assert_eq!(
            Command::parse("!PLAY never  gonna give"),
            Some(Command::Play("never gonna give".to_string()))
        );
        assert_eq!(Command::parse("!loopplaylist"), Some(Command::LoopPlaylist));
        assert_eq!(
            Command::parse("hello"),
            Some(Command::Unknown("hello".to_string()))
        );
        assert_eq!(Command::parse("   "), None);
    }

    #[tokio::test]
    async fn play_starts_then_queues() {
        let (router, output) = router(FakeSearch::new());

        assert_eq!(send(&router, "!play a").await, Reply::text("Playing: a"));
        assert_eq!(
            send(&router, "!play b").await,
            Reply::text("Added to the playlist: b")
        );
        assert_eq!(
            send(&router, "!playlist").await,
            Reply::text("Current playlist: a, b")
        );
        assert_eq!(output.played(), vec!["stream://a"]);
    }

    #[tokio::test]
    async fn play_without_query_shows_usage() {
        let (router, output) = router(FakeSearch::new());
        assert_eq!(send(&router, "!play").await, Reply::text("Usage: `!play [query]`"));
        assert!(output.played().is_empty());
    }

    #[tokio::test]
    async fn play_reports_missing_results() {
        let (router, _output) = router(FakeSearch::new().missing("zzz"));
        assert_eq!(send(&router, "!play zzz").await, Reply::text("No results found."));
    }

    #[tokio::test]
    async fn catalog_query_without_credentials_is_explained() {
        let (router, _output) = router(FakeSearch::new());
        assert_eq!(
            send(&router, "!play spotify bohemian rhapsody").await,
            Reply::text("Spotify lookups are unavailable. Check the Spotify credentials.")
        );
    }

    #[tokio::test]
    async fn search_lists_numbered_titles() {
        let (router, output) = router(FakeSearch::new());
        assert_eq!(
            send(&router, "!search lofi").await,
            Reply::text("Search results:\n1. lofi")
        );
        assert!(output.played().is_empty());
        assert_eq!(send(&router, "!playlist").await, Reply::text("The playlist is empty."));
    }

    #[tokio::test]
    async fn toggles_report_new_state() {
        let (router, _output) = router(FakeSearch::new());
        assert_eq!(send(&router, "!loop").await, Reply::text("Loop song is now enabled."));
        assert_eq!(send(&router, "!loop").await, Reply::text("Loop song is now disabled."));
        assert_eq!(
            send(&router, "!loopplaylist").await,
            Reply::text("Loop playlist is now enabled.")
        );
    }

    #[tokio::test]
    async fn navigation_and_stop() {
        let (router, output) = router(FakeSearch::new());
        send(&router, "!play a").await;
        send(&router, "!play b").await;

        assert_eq!(
            send(&router, "!previous").await,
            Reply::text("This is the first song in the playlist.")
        );
        assert_eq!(send(&router, "!next").await, Reply::text("Skipping to the next song."));
        assert_eq!(
            send(&router, "!stop").await,
            Reply::text("Playback stopped and playlist cleared.")
        );
        assert_eq!(send(&router, "!playlist").await, Reply::text("The playlist is empty."));
        assert_eq!(output.played(), vec!["stream://a", "stream://b"]);
    }

    #[tokio::test]
    async fn unknown_command_points_to_help() {
        let (router, _output) = router(FakeSearch::new());
        assert_eq!(
            send(&router, "!dance").await,
            Reply::text("Unknown command. Type `!help` to see the list of commands.")
        );
        assert!(matches!(send(&router, "!help").await, Reply::Text(t) if t.contains("!loopplaylist")));
    }

    #[tokio::test]
    async fn run_finishes_queued_commands_when_input_ends() {
        let (router, output) = router(FakeSearch::new());
        let input: &[u8] = b"!play a\n\n!play b\n!playlist\n";
        let mut written = Vec::new();

        router.run(input, &mut written).await.unwrap();

        let written = String::from_utf8(written).unwrap();
        assert!(written.contains("Playing: a"));
        assert!(written.contains("Added to the playlist: b"));
        assert!(written.contains("Current playlist: a, b"));
        assert_eq!(output.played(), vec!["stream://a"]);
    }

    #[tokio::test]
    async fn quit_ends_the_session() {
        let (router, output) = router(FakeSearch::new());
        let input: &[u8] = b"!quit\n!play b\n";
        let mut written = Vec::new();

        router.run(input, &mut written).await.unwrap();

        let written = String::from_utf8(written).unwrap();
        assert!(written.contains("Bye."));
        assert!(!written.contains("Playing: b"));
        assert!(output.played().is_empty());
    }

    #[tokio::test]
    async fn stop_takes_effect_while_play_is_pending() {
        let (search, gate) = FakeSearch::new().gated("slow");
        let (router, output) = router(search);
        let controller = router.controller.clone();

        let (mut console, host) = tokio::io::duplex(64 * 1024);
        let (host_in, host_out) = tokio::io::split(host);
        let running =
            tokio::spawn(async move { router.run(BufReader::new(host_in), host_out).await });

        console.write_all(b"!play slow\n").await.unwrap();
        gate.wait_entered().await;
        console.write_all(b"!stop\n").await.unwrap();

        let stopped = async {
            while controller.player_state().await != PlayerState::Stopped {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), stopped)
            .await
            .expect("stop waited behind the pending play");

        gate.release();
        console.write_all(b"!quit\n").await.unwrap();
        running.await.unwrap().unwrap();

        let mut written = String::new();
        console.read_to_string(&mut written).await.unwrap();
        assert!(written.contains("Playback stopped and playlist cleared."));
        assert!(output.played().is_empty());
        assert!(controller.list_queue().await.is_empty());
    }

    #[test]
    fn events_are_described_with_one_based_positions() {
        assert_eq!(
            describe_event(&QueueEvent::NowPlaying {
                index: 0,
                query: "a".to_string(),
                title: "A".to_string(),
            }),
            "Now playing #1: A"
        );
        assert_eq!(describe_event(&QueueEvent::Finished), "Reached the end of the playlist.");
    }
}
