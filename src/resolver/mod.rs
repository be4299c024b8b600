//! Resolver module - Turning requests into queueable tracks
//!
//! - `query`: Routing of raw requests to a lookup strategy
//! - `spotify_client`: Catalog lookups against the Spotify Web API
//! - `youtube`: Free-text search and stream extraction through yt-dlp

mod query;
mod spotify_client;
mod youtube;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::ResolutionError;
use crate::model::{CatalogTrack, SearchHit, StreamRef, Track, TrackSource};

pub use query::QueryKind;
pub use spotify_client::SpotifyCatalog;
pub use youtube::YtDlpSearch;

/// Free-text lookup on a video/audio index
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Ranked results, best first; empty when nothing matched
    async fn search(&self, text: &str) -> Result<Vec<SearchHit>, ResolutionError>;

    /// Direct media URL for a search hit
    async fn audio_stream(&self, play_url: &str) -> Result<String, ResolutionError>;
}

/// Music catalog lookup
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn search_top_track(&self, text: &str) -> Result<Option<CatalogTrack>, ResolutionError>;

    async fn expand_playlist(&self, id: &str) -> Result<Vec<CatalogTrack>, ResolutionError>;
}

/// Tracks produced by one `resolve` call, in playback order
pub type TrackStream = BoxStream<'static, Track>;

async fn with_timeout<T>(
    limit: Duration,
    lookup: impl Future<Output = Result<T, ResolutionError>>,
) -> Result<T, ResolutionError> {
    tokio::time::timeout(limit, lookup)
        .await
        .map_err(|_| ResolutionError::Timeout(limit))?
}

#[derive(Clone)]
pub struct TrackResolver {
    search: Arc<dyn SearchProvider>,
    catalog: Option<Arc<dyn CatalogProvider>>,
    timeout: Duration,
}

impl TrackResolver {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        catalog: Option<Arc<dyn CatalogProvider>>,
        timeout: Duration,
    ) -> Self {
        Self {
            search,
            catalog,
            timeout,
        }
    }

    fn catalog(&self) -> Result<&Arc<dyn CatalogProvider>, ResolutionError> {
        self.catalog.as_ref().ok_or(ResolutionError::Unauthenticated)
    }

    /// Ranked free-text results without queueing anything
    pub async fn search(&self, text: &str) -> Result<Vec<SearchHit>, ResolutionError> {
        with_timeout(self.timeout, self.search.search(text)).await
    }

    /// Resolve a request into tracks.
    ///
    /// The top-level lookup happens here and its failure is returned; playlist
    /// items are searched lazily as the stream is polled, and items that fail
    /// are left out.
    pub async fn resolve(&self, query: &str) -> Result<TrackStream, ResolutionError> {
        match QueryKind::parse(query) {
            QueryKind::CatalogPlaylist(id) => {
                let catalog = self.catalog()?;
                crate::log_lookup_request!("expand_playlist", playlist = %id);
                let items = with_timeout(self.timeout, catalog.expand_playlist(&id)).await;
                crate::log_lookup_result!("expand_playlist", items);
                let items = items?;

                tracing::info!(playlist = %id, items = items.len(), "Expanding catalog playlist");

                let search = self.search.clone();
                let timeout = self.timeout;
                let tracks = stream::iter(items).filter_map(move |item| {
                    let search = search.clone();
                    async move {
                        let query = item.search_query();
                        match with_timeout(timeout, search.search(&query)).await {
                            Ok(hits) if !hits.is_empty() => {
                                Some(Track::new(query, TrackSource::Spotify))
                            }
                            Ok(_) => {
                                tracing::debug!(query = %query, "Playlist item has no match, skipping");
                                None
                            }
                            Err(e) => {
                                tracing::debug!(query = %query, error = %e, "Playlist item lookup failed, skipping");
                                None
                            }
                        }
                    }
                });

                Ok(tracks.boxed())
            }
            QueryKind::CatalogSearch(text) => {
                let catalog = self.catalog()?;
                crate::log_lookup_request!("catalog_search", text = %text);
                let top = with_timeout(self.timeout, catalog.search_top_track(&text)).await;
                crate::log_lookup_result!("catalog_search", top);

                let track = top?.map(|t| Track::new(t.search_query(), TrackSource::Spotify));
                Ok(stream::iter(track).boxed())
            }
            QueryKind::FreeText(text) => {
                crate::log_lookup_request!("search", text = %text);
                let hits = self.search(&text).await;
                crate::log_lookup_result!("search", hits);

                let track = hits?
                    .into_iter()
                    .next()
                    .map(|_| Track::new(text, TrackSource::YouTube));
                Ok(stream::iter(track).boxed())
            }
        }
    }

    /// Fresh stream reference for a track, fetched right before playback
    pub async fn materialize(&self, track: &Track) -> Result<StreamRef, ResolutionError> {
        let hit = self
            .search(&track.query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ResolutionError::NoMatch(track.query.clone()))?;

        let url = with_timeout(self.timeout, self.search.audio_stream(&hit.play_url)).await?;

        tracing::debug!(query = %track.query, title = %hit.title, source = %track.source, "Track materialized");

        Ok(StreamRef {
            title: hit.title,
            url,
        })
    }
}
