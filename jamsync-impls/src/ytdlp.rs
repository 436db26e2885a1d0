use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use tokio::process::Command;

use jamsync_hub::search::{SearchError, SearchProvider, SearchResult};

/// Catalog search backed by the `yt-dlp` command line tool.
///
/// Runs a flat playlist search and parses one JSON object per output
/// line. A non-zero exit fails the whole search, there are no partial
/// results.
pub struct YtDlpSearch {
    binary: String,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct FlatVideo {
    id: String,
    title: String,
    duration: Option<f64>,
    channel: Option<String>,
    thumbnails: Option<Vec<Thumbnail>>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl YtDlpSearch {
    pub fn new(binary: impl Into<String>, limit: usize) -> Self {
        Self {
            binary: binary.into(),
            limit,
        }
    }
}

impl Default for YtDlpSearch {
    fn default() -> Self {
        Self::new("yt-dlp", 5)
    }
}

#[async_trait]
impl SearchProvider for YtDlpSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        debug!("Running {} search for {:?}", self.binary, query);

        let output = Command::new(&self.binary)
            .arg("--quiet")
            .arg("--flat-playlist")
            .arg("--dump-json")
            .arg(format!("ytsearch{}:{}", self.limit, query))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SearchError::Provider(stderr.trim().to_string()));
        }

        parse_results(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_results(output: &str) -> Result<Vec<SearchResult>, SearchError> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let video: FlatVideo =
                serde_json::from_str(line).map_err(|e| SearchError::Parse(e.to_string()))?;

            Ok(SearchResult {
                id: video.id.clone(),
                video_id: video.id,
                title: video.title,
                duration: video.duration.unwrap_or(0.0),
                thumbnail: video
                    .thumbnails
                    .and_then(|mut t| t.pop())
                    .map(|t| t.url),
                channel: video.channel,
            })
        })
        .collect()
}
