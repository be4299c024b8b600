//! Spotify catalog lookups with client-credential token refresh

use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use rspotify::{
    model::{FullTrack, Market, PlayableItem, PlaylistId, SearchResult, SearchType},
    prelude::*,
    ClientCredsSpotify,
};

use super::CatalogProvider;
use crate::error::ResolutionError;
use crate::model::CatalogTrack;

/// Refresh when fewer than this many seconds of validity remain
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// Spotify catalog client
#[derive(Clone)]
pub struct SpotifyCatalog {
    client: Arc<ClientCredsSpotify>,
}

impl SpotifyCatalog {
    const MAX_PLAYLIST_ITEMS: usize = 500;

    pub fn new(client: ClientCredsSpotify) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub async fn token_needs_refresh(&self) -> bool {
        let token = match self.client.token.lock().await {
            Ok(token) => token,
            Err(_) => return false,
        };

        match token.as_ref() {
            None => true,
            Some(token) => token
                .expires_at
                .map(|exp| (exp - chrono::Utc::now()).num_seconds() < TOKEN_REFRESH_MARGIN_SECS)
                .unwrap_or(false),
        }
    }

    pub async fn refresh_token_if_needed(&self) -> anyhow::Result<bool> {
        if !self.token_needs_refresh().await {
            return Ok(false);
        }

        tracing::info!("Catalog token expiring soon, refreshing...");

        match self.client.request_token().await {
            Ok(()) => {
                tracing::info!("Catalog token refreshed successfully");
                Ok(true)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to refresh catalog token");
                Err(e.into())
            }
        }
    }
}

fn classify(error: rspotify::ClientError) -> ResolutionError {
    ResolutionError::from_provider_message(error.to_string())
}

fn catalog_track(track: &FullTrack) -> Option<CatalogTrack> {
    let artist = track.artists.first()?;
    Some(CatalogTrack {
        name: track.name.clone(),
        primary_artist: artist.name.clone(),
    })
}

#[async_trait]
impl CatalogProvider for SpotifyCatalog {
    async fn search_top_track(&self, text: &str) -> Result<Option<CatalogTrack>, ResolutionError> {
        // None lets Spotify use the market of the credentials
        let market: Option<Market> = None;
        let result = self
            .client
            .search(text, SearchType::Track, market, None, Some(1), None)
            .await
            .map_err(classify)?;

        match result {
            SearchResult::Tracks(page) => Ok(page.items.first().and_then(catalog_track)),
            _ => Ok(None),
        }
    }

    async fn expand_playlist(&self, id: &str) -> Result<Vec<CatalogTrack>, ResolutionError> {
        let playlist_id = PlaylistId::from_id(id)
            .map_err(|e| ResolutionError::InvalidReference(format!("{}: {}", id, e)))?;

        let items: Vec<_> = self
            .client
            .playlist_items(playlist_id, None, None)
            .take(Self::MAX_PLAYLIST_ITEMS)
            .try_collect()
            .await
            .map_err(classify)?;

        let total = items.len();
        let tracks: Vec<CatalogTrack> = items
            .iter()
            .filter_map(|item| match &item.track {
                Some(PlayableItem::Track(track)) => catalog_track(track),
                _ => None,
            })
            .collect();

        if tracks.len() < total {
            tracing::debug!(
                playlist = id,
                dropped = total - tracks.len(),
                "Ignoring playlist entries that are not artist tracks"
            );
        }

        Ok(tracks)
    }
}
