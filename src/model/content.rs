//! Track descriptors and the lookup results they are built from

use std::fmt;

/// Which provider a track request came through
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackSource {
    YouTube,
    Spotify,
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackSource::YouTube => write!(f, "YouTube"),
            TrackSource::Spotify => write!(f, "Spotify"),
        }
    }
}

/// A queued playback request.
///
/// Holds no stream reference: those expire, so one is materialized for every
/// play attempt and dropped when the attempt ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub query: String,
    pub source: TrackSource,
}

impl Track {
    pub fn new(query: impl Into<String>, source: TrackSource) -> Self {
        Self {
            query: query.into(),
            source,
        }
    }
}

/// A playable media reference produced right before playback
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRef {
    pub title: String,
    pub url: String,
}

/// One ranked entry from the free-text search index
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub play_url: String,
}

/// A catalog track reduced to what a secondary search needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogTrack {
    pub name: String,
    pub primary_artist: String,
}

impl CatalogTrack {
    /// Query used to find this track on the search index
    pub fn search_query(&self) -> String {
        format!("{} {}", self.name, self.primary_artist)
    }
}
