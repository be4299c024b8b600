//! Classifies a raw request into the lookup strategy that serves it

const PLAYLIST_URI_PREFIX: &str = "spotify:playlist:";
const PLAYLIST_URL_MARKER: &str = "open.spotify.com/playlist/";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryKind {
    /// A catalog playlist id to expand item by item
    CatalogPlaylist(String),
    /// Text searched on the catalog, top result wins
    CatalogSearch(String),
    /// Text searched on the video index, top result wins
    FreeText(String),
}

impl QueryKind {
    pub fn parse(query: &str) -> Self {
        let query = query.trim();

        if let Some(id) = playlist_id(query) {
            return QueryKind::CatalogPlaylist(id);
        }

        if query.to_lowercase().contains("spotify") {
            return QueryKind::CatalogSearch(strip_catalog_keyword(query));
        }

        QueryKind::FreeText(query.to_string())
    }
}

fn playlist_id(query: &str) -> Option<String> {
    let rest = if let Some(pos) = query.find(PLAYLIST_URI_PREFIX) {
        &query[pos + PLAYLIST_URI_PREFIX.len()..]
    } else if let Some(pos) = query.find(PLAYLIST_URL_MARKER) {
        &query[pos + PLAYLIST_URL_MARKER.len()..]
    } else {
        return None;
    };

    let id: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();

    if id.is_empty() { None } else { Some(id) }
}

/// Drops the routing keyword so it does not skew the catalog ranking
fn strip_catalog_keyword(query: &str) -> String {
    let cleaned: Vec<&str> = query
        .split_whitespace()
        .filter(|word| !word.trim_end_matches(':').eq_ignore_ascii_case("spotify"))
        .collect();

    if cleaned.is_empty() {
        query.to_string()
    } else {
        cleaned.join(" ")
    }
}
