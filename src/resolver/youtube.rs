//! YouTube search and stream extraction through the `yt-dlp` CLI

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::SearchProvider;
use crate::error::ResolutionError;
use crate::model::SearchHit;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// One line of `yt-dlp --dump-json --flat-playlist` output
#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
}

impl FlatEntry {
    fn into_hit(self) -> Option<SearchHit> {
        let play_url = self
            .webpage_url
            .or(self.url)
            .or_else(|| self.id.as_ref().map(|id| format!("{}{}", WATCH_URL, id)))?;

        Some(SearchHit {
            title: self.title.unwrap_or_else(|| play_url.clone()),
            play_url,
        })
    }
}

fn parse_search_output(stdout: &str) -> Vec<SearchHit> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<FlatEntry>(line) {
            Ok(entry) => entry.into_hit(),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unparsable yt-dlp line");
                None
            }
        })
        .collect()
}

pub struct YtDlpSearch {
    binary: PathBuf,
    max_results: u32,
}

impl YtDlpSearch {
    pub fn new(binary: impl Into<PathBuf>, max_results: u32) -> Self {
        Self {
            binary: binary.into(),
            max_results: max_results.max(1),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, ResolutionError> {
        let output = Command::new(&self.binary)
            .args(args)
            .arg("--no-warnings")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ResolutionError::Unavailable(format!("{}: {}", self.binary.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(status = %output.status, stderr = %stderr.trim(), "yt-dlp failed");
            return Err(ResolutionError::from_provider_message(stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl SearchProvider for YtDlpSearch {
    async fn search(&self, text: &str) -> Result<Vec<SearchHit>, ResolutionError> {
        let target = format!("ytsearch{}:{}", self.max_results, text);
        let stdout = self
            .run(&["--flat-playlist", "--dump-json", &target])
            .await?;

        let hits = parse_search_output(&stdout);
        tracing::debug!(text, results = hits.len(), "YouTube search finished");
        Ok(hits)
    }

    async fn audio_stream(&self, play_url: &str) -> Result<String, ResolutionError> {
        let stdout = self
            .run(&["-f", "bestaudio/best", "--no-playlist", "-g", play_url])
            .await?;

        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ResolutionError::NoMatch(play_url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_output_is_parsed_in_rank_order() {
        let stdout = r#"{"id": "abc", "title": "First", "url": "https://www.youtube.com/watch?v=abc"}
{"id": "def", "title": "Second"}

not json
{"title": "No link"}"#;

        let hits = parse_search_output(stdout);
        assert_eq!(
            hits,
            vec![
                SearchHit {
                    title: "First".to_string(),
                    play_url: "https://www.youtube.com/watch?v=abc".to_string(),
                },
                SearchHit {
                    title: "Second".to_string(),
                    play_url: "https://www.youtube.com/watch?v=def".to_string(),
                },
            ]
        );
    }

    #[test]
    fn webpage_url_is_preferred() {
        let hits = parse_search_output(
            r#"{"id": "x", "url": "x", "webpage_url": "https://www.youtube.com/watch?v=x"}"#,
        );
        assert_eq!(hits[0].play_url, "https://www.youtube.com/watch?v=x");
        assert_eq!(hits[0].title, "https://www.youtube.com/watch?v=x");
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let search = YtDlpSearch::new("/nonexistent/yt-dlp", 3);
        assert!(matches!(
            search.search("anything").await,
            Err(ResolutionError::Unavailable(_))
        ));
    }
}
