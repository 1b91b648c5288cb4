// Raw game event sources: a local JSON export or the statistics API.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rescore_core::PlayEvent;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{SourceConfig, SourceKind};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse events from {origin}: {source}")]
    Parse {
        origin: String,
        source: serde_json::Error,
    },

    #[error("request for game {game_id} failed: {source}")]
    Http {
        game_id: String,
        source: reqwest::Error,
    },
}

// ---------------------------------------------------------------------------
// EventSource trait
// ---------------------------------------------------------------------------

/// Something that can hand over every recorded event of one game.
///
/// An unknown game yields an empty list rather than an error.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_game(&self, game_id: &str) -> Result<Vec<PlayEvent>, SourceError>;
}

/// Build the source selected in the config.
pub fn from_config(config: &SourceConfig) -> Result<Box<dyn EventSource>, SourceError> {
    match config.kind {
        SourceKind::File => Ok(Box::new(FileEventSource::open(&config.events_path)?)),
        SourceKind::Api => Ok(Box::new(ApiEventSource::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )?)),
    }
}

// ---------------------------------------------------------------------------
// FileEventSource
// ---------------------------------------------------------------------------

/// Events for many games loaded up front from one JSON array.
#[derive(Debug, Default)]
pub struct FileEventSource {
    games: HashMap<String, Vec<PlayEvent>>,
}

impl FileEventSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SourceError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let source = Self::from_json(&text).map_err(|e| SourceError::Parse {
            origin: path.display().to_string(),
            source: e,
        })?;
        info!(
            "loaded {} games from {}",
            source.games.len(),
            path.display()
        );
        Ok(source)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let events: Vec<PlayEvent> = serde_json::from_str(text)?;
        Ok(Self::from_events(events))
    }

    pub fn from_events(events: Vec<PlayEvent>) -> Self {
        let mut games: HashMap<String, Vec<PlayEvent>> = HashMap::new();
        for event in events {
            games.entry(event.game_id.clone()).or_default().push(event);
        }
        for events in games.values_mut() {
            events.sort_by_key(|event| event.event_index);
        }
        FileEventSource { games }
    }

    pub fn game_ids(&self) -> impl Iterator<Item = &str> {
        self.games.keys().map(String::as_str)
    }
}

#[async_trait]
impl EventSource for FileEventSource {
    async fn fetch_game(&self, game_id: &str) -> Result<Vec<PlayEvent>, SourceError> {
        Ok(self.games.get(game_id).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// ApiEventSource
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    results: Vec<PlayEvent>,
}

/// Per-game fetches from the statistics service's `events` endpoint.
pub struct ApiEventSource {
    http: reqwest::Client,
    base_url: String,
}

impl ApiEventSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Http {
                game_id: String::new(),
                source: e,
            })?;
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        Ok(ApiEventSource { http, base_url })
    }

    fn events_url(&self) -> String {
        format!("{}events", self.base_url)
    }
}

#[async_trait]
impl EventSource for ApiEventSource {
    async fn fetch_game(&self, game_id: &str) -> Result<Vec<PlayEvent>, SourceError> {
        let http_err = |e| SourceError::Http {
            game_id: game_id.to_string(),
            source: e,
        };

        let response = self
            .http
            .get(self.events_url())
            .query(&[("gameId", game_id), ("baseRunners", "true")])
            .send()
            .await
            .map_err(http_err)?;

        let status = response.status();
        if !status.is_success() {
            warn!(game_id, %status, "events request failed; treating game as empty");
            return Ok(Vec::new());
        }

        let body = response.text().await.map_err(http_err)?;
        let parsed: EventsResponse =
            serde_json::from_str(&body).map_err(|e| SourceError::Parse {
                origin: format!("events for game {game_id}"),
                source: e,
            })?;
        let mut events = parsed.results;
        events.sort_by_key(|event| event.event_index);
        debug!(game_id, count = events.len(), "fetched events");
        Ok(events)
    }
}

// ---------------------------------------------------------------------------
// Game list
// ---------------------------------------------------------------------------

/// Game ids to process, one per line. Blank lines and `#` comments are
/// ignored.
pub fn parse_game_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn load_game_list(path: impl AsRef<Path>) -> Result<Vec<String>, SourceError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| SourceError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(parse_game_list(&text))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const TWO_GAMES: &str = r#"[
        {"game_id": "g2", "event_index": 1, "event_type": "OUT"},
        {"game_id": "g1", "event_index": 1, "event_type": "SINGLE"},
        {"game_id": "g1", "event_index": 0, "event_type": "OUT"}
    ]"#;

    #[test]
    fn game_list_skips_comments_and_blanks() {
        let ids = parse_game_list("# season 11\n\n g1 \ng2\n   \n#g3\n");
        assert_eq!(ids, vec!["g1".to_string(), "g2".to_string()]);
    }

    #[tokio::test]
    async fn file_source_groups_and_orders_games() {
        let source = FileEventSource::from_json(TWO_GAMES).unwrap();
        let mut ids: Vec<&str> = source.game_ids().collect();
        ids.sort();
        assert_eq!(ids, vec!["g1", "g2"]);

        let g1 = source.fetch_game("g1").await.unwrap();
        let indices: Vec<u32> = g1.iter().map(|e| e.event_index).collect();
        assert_eq!(indices, vec![0, 1]);

        assert!(source.fetch_game("missing").await.unwrap().is_empty());
    }

    #[test]
    fn file_source_reports_missing_file() {
        let err = FileEventSource::open("/nonexistent/rescore/events.json").unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }

    /// Serve exactly one HTTP response and hand back the request line.
    async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}/v1"), handle)
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[tokio::test]
    async fn api_source_fetches_and_sorts_results() {
        let body = r#"{"results": [
            {"game_id": "g1", "event_index": 1, "event_type": "WALK"},
            {"game_id": "g1", "event_index": 0, "event_type": "OUT"}
        ]}"#;
        let (base, server) = serve_once(http_response("200 OK", body)).await;

        let source = ApiEventSource::new(&base, Duration::from_secs(5)).unwrap();
        let events = source.fetch_game("g1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_index, 0);

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /v1/events?"));
        assert!(request_line.contains("gameId=g1"));
        assert!(request_line.contains("baseRunners=true"));
    }

    #[tokio::test]
    async fn api_source_treats_error_status_as_empty_game() {
        let (base, server) = serve_once(http_response("404 Not Found", "{}")).await;
        let source = ApiEventSource::new(&base, Duration::from_secs(5)).unwrap();
        assert!(source.fetch_game("g404").await.unwrap().is_empty());
        server.await.unwrap();
    }
}
