//! In-memory providers, transport and output device for unit tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::audio::{ChannelRef, ConnectionHandle, OutputDevice, StatusSink, Transport};
use crate::error::{ConnectionError, PlaybackFault, ResolutionError};
use crate::model::{CatalogTrack, SearchHit, StreamRef};
use crate::resolver::{CatalogProvider, SearchProvider};

/// Holds a lookup until the test releases it
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

/// Every query matches a hit titled after it, unless configured otherwise
#[derive(Default)]
pub struct FakeSearch {
    missing: HashSet<String>,
    failing: HashSet<String>,
    unplayable: HashSet<String>,
    gates: HashMap<String, Arc<Gate>>,
    search_gates: HashMap<String, Arc<Gate>>,
    stream_calls: AtomicUsize,
}

impl FakeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search for `query` returns no hits
    pub fn missing(mut self, query: &str) -> Self {
        self.missing.insert(query.to_string());
        self
    }

    /// Search for `query` errors
    pub fn failing(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    /// Search succeeds but no stream can be extracted
    pub fn unplayable(mut self, query: &str) -> Self {
        self.unplayable.insert(query.to_string());
        self
    }

    /// Stream extraction for `query` blocks on the returned gate
    pub fn gated(mut self, query: &str) -> (Self, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        self.gates.insert(query.to_string(), gate.clone());
        (self, gate)
    }

    /// Search for `query` blocks on the returned gate
    pub fn gated_search(mut self, query: &str) -> (Self, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        self.search_gates.insert(query.to_string(), gate.clone());
        (self, gate)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, text: &str) -> Result<Vec<SearchHit>, ResolutionError> {
        if let Some(gate) = self.search_gates.get(text) {
            gate.pass().await;
        }
        if self.failing.contains(text) {
            return Err(ResolutionError::Unavailable(format!("search down for {}", text)));
        }
        if self.missing.contains(text) {
            return Ok(Vec::new());
        }
        Ok(vec![SearchHit {
            title: text.to_string(),
            play_url: format!("play://{}", text),
        }])
    }

    async fn audio_stream(&self, play_url: &str) -> Result<String, ResolutionError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let query = play_url.trim_start_matches("play://");

        if let Some(gate) = self.gates.get(query) {
            gate.pass().await;
        }
        if self.unplayable.contains(query) {
            return Err(ResolutionError::NoMatch(query.to_string()));
        }
        Ok(format!("stream://{}", query))
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    playlists: HashMap<String, Vec<CatalogTrack>>,
    top: Option<CatalogTrack>,
}

fn catalog_track(name: &str, artist: &str) -> CatalogTrack {
    CatalogTrack {
        name: name.to_string(),
        primary_artist: artist.to_string(),
    }
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_playlist(id: &str, items: &[(&str, &str)]) -> Self {
        let mut catalog = Self::new();
        catalog.playlists.insert(
            id.to_string(),
            items.iter().map(|(n, a)| catalog_track(n, a)).collect(),
        );
        catalog
    }

    pub fn with_top_track(mut self, name: &str, artist: &str) -> Self {
        self.top = Some(catalog_track(name, artist));
        self
    }
}

#[async_trait]
impl CatalogProvider for FakeCatalog {
    async fn search_top_track(&self, _text: &str) -> Result<Option<CatalogTrack>, ResolutionError> {
        Ok(self.top.clone())
    }

    async fn expand_playlist(&self, id: &str) -> Result<Vec<CatalogTrack>, ResolutionError> {
        self.playlists
            .get(id)
            .cloned()
            .ok_or_else(|| ResolutionError::InvalidReference(id.to_string()))
    }
}

#[derive(Default)]
pub struct FakeTransport {
    joins: AtomicUsize,
    leaves: AtomicUsize,
    fail: AtomicBool,
    hang: AtomicBool,
    next_id: AtomicU64,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_joins(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Joins never complete
    pub fn hang_joins(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub fn joins(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    pub fn leaves(&self) -> usize {
        self.leaves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn join(&self, channel: &ChannelRef) -> Result<ConnectionHandle, ConnectionError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ConnectionError::JoinFailed {
                channel: channel.to_string(),
                reason: "refused".to_string(),
            });
        }
        self.joins.fetch_add(1, Ordering::SeqCst);
        Ok(ConnectionHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            channel: channel.clone(),
        })
    }

    async fn leave(&self, _connection: &ConnectionHandle) {
        self.leaves.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records streams and reports `Playing` immediately; the test ends them
#[derive(Default)]
pub struct FakeOutput {
    played: Mutex<Vec<String>>,
    current: Mutex<Option<StatusSink>>,
    stops: AtomicUsize,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    fail_controls: AtomicBool,
}

impl FakeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }

    /// Pause and resume fail as if the player stopped answering
    pub fn fail_controls(&self, fail: bool) {
        self.fail_controls.store(fail, Ordering::SeqCst);
    }

    fn control(&self, counter: &AtomicUsize) -> Result<(), PlaybackFault> {
        if self.fail_controls.load(Ordering::SeqCst) {
            return Err(PlaybackFault::Device("player not responding".to_string()));
        }
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    fn take_current(&self) -> StatusSink {
        self.current
            .lock()
            .unwrap()
            .take()
            .expect("no stream is playing")
    }

    /// The current stream ends naturally
    pub fn finish_idle(&self) {
        self.take_current().idle();
    }

    /// The current stream fails mid-playback
    pub fn finish_errored(&self) {
        self.take_current()
            .errored(PlaybackFault::Device("decoder crashed".to_string()));
    }
}

#[async_trait]
impl OutputDevice for FakeOutput {
    async fn play_stream(
        &self,
        _connection: &ConnectionHandle,
        stream: &StreamRef,
        sink: StatusSink,
    ) -> Result<(), PlaybackFault> {
        self.played.lock().unwrap().push(stream.url.clone());
        sink.playing();
        *self.current.lock().unwrap() = Some(sink);
        Ok(())
    }

    async fn pause(&self) -> Result<(), PlaybackFault> {
        self.control(&self.pauses)
    }

    async fn resume(&self) -> Result<(), PlaybackFault> {
        self.control(&self.resumes)
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.current.lock().unwrap().take();
    }
}
