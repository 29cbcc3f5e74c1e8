//! Remote event source
//!
//! The server publishes an ordered log of update events. The engine consumes
//! it through [`EventSource`], fetches entity records for created/updated
//! content, and checks reachability through [`ConnectivityProbe`].
//!
//! [`HttpEventSource`] implements both over HTTP:
//!
//! ```text
//! GET {server}v3/update-events/{checkpoint}   -> [UpdateEvent]
//! GET {server}v3/{sound|song|author}/{id}     -> record
//! GET {server}v3/status-check                 -> 2xx when reachable
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::types::{Checkpoint, ContentId, ContentRecord, MediaKind, UpdateEvent};

/// Source of update events and entity records.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Events that occurred after `since`, ordered by `occurred_at`.
    ///
    /// An empty list means nothing changed. Transport failures are errors,
    /// never an empty list.
    async fn fetch_events(&self, since: &Checkpoint) -> SyncResult<Vec<UpdateEvent>>;

    /// Current metadata record for a piece of content.
    async fn fetch_content(&self, kind: MediaKind, id: &ContentId) -> SyncResult<ContentRecord>;
}

/// Network reachability check.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn has_connectivity(&self) -> bool;
}

/// Append `segments` to `base`, percent-encoding each one.
///
/// Segments that would be dropped or resolved by URL normalization (empty,
/// `.`, `..`) are refused.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<String, String> {
    if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
        return Err(format!("invalid path segment {bad:?}"));
    }
    let mut url = Url::parse(base).map_err(|e| format!("invalid server URL {base}: {e}"))?;
    url.path_segments_mut()
        .map_err(|_| format!("server URL cannot take a path: {base}"))?
        .pop_if_empty()
        .extend(segments.iter().copied());
    Ok(url.to_string())
}

/// HTTP client for the content server
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    client: Client,
    base_url: String,
    probe_timeout: Duration,
}

impl HttpEventSource {
    /// Build a client from the sync configuration.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.server_base(),
            probe_timeout: Duration::from_secs(config.connectivity_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn events_url(&self, since: &Checkpoint) -> String {
        format!("{}v3/update-events/{}", self.base_url, since)
    }

    fn content_url(&self, kind: MediaKind, id: &ContentId) -> SyncResult<String> {
        endpoint(&self.base_url, &["v3", kind.as_str(), id.as_str()])
            .map_err(SyncError::RemoteFetch)
    }

    async fn get_bytes(&self, url: &str) -> SyncResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::RemoteFetch(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::RemoteFetch(format!("GET {url}: HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::RemoteFetch(format!("GET {url}: {e}")))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn fetch_events(&self, since: &Checkpoint) -> SyncResult<Vec<UpdateEvent>> {
        let url = self.events_url(since);
        debug!(%url, "Fetching update events");
        let body = self.get_bytes(&url).await?;
        let events: Vec<UpdateEvent> = serde_json::from_slice(&body)
            .map_err(|e| SyncError::RemoteFetch(format!("malformed event list: {e}")))?;
        Ok(events)
    }

    async fn fetch_content(&self, kind: MediaKind, id: &ContentId) -> SyncResult<ContentRecord> {
        let url = self.content_url(kind, id)?;
        let body = self.get_bytes(&url).await?;
        ContentRecord::from_json(kind, &body)
            .map_err(|e| SyncError::RemoteFetch(format!("malformed {kind} {id}: {e}")))
    }
}

#[async_trait]
impl ConnectivityProbe for HttpEventSource {
    async fn has_connectivity(&self) -> bool {
        let url = format!("{}v3/status-check", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(%url, error = %e, "Server unreachable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChangeKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> HttpEventSource {
        let config = SyncConfig {
            server_url: server.uri(),
            ..SyncConfig::default()
        };
        HttpEventSource::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_events_since_checkpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/update-events/2023-07-29T19:58:30Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "id": "e1",
                    "contentId": "123",
                    "mediaType": "sound",
                    "eventType": "created",
                    "dateTime": "2023-07-30T10:00:00.250Z"
                },
                {
                    "id": "e2",
                    "contentId": "a9",
                    "mediaType": "author",
                    "eventType": "deleted",
                    "dateTime": "2023-07-31T10:00:00Z"
                }
            ])))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let since: Checkpoint = "2023-07-29T19:58:30Z".parse().unwrap();
        let events = source.fetch_events(&since).await.unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, ChangeKind::Created);
        assert_eq!(events[1].media_type, MediaKind::Author);
    }

    #[tokio::test]
    async fn test_empty_list_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/update-events/all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let events = source_for(&server)
            .fetch_events(&Checkpoint::All)
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_remote_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = source_for(&server)
            .fetch_events(&Checkpoint::All)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RemoteFetch(_)));
    }

    #[tokio::test]
    async fn test_fetch_content_decodes_by_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/song/s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "s1",
                "title": "Song title",
                "duration": 120.0
            })))
            .mount(&server)
            .await;

        let record = source_for(&server)
            .fetch_content(MediaKind::Song, &ContentId::new("s1"))
            .await
            .unwrap();
        assert_eq!(record.kind(), MediaKind::Song);
        assert_eq!(record.title(), "Song title");
    }

    #[tokio::test]
    async fn test_fetch_content_encodes_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/sound/x%2Fy%3Fz%23w"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "x/y?z#w",
                "title": "Odd id",
                "authorId": "a1"
            })))
            .mount(&server)
            .await;

        let record = source_for(&server)
            .fetch_content(MediaKind::Sound, &ContentId::new("x/y?z#w"))
            .await
            .unwrap();
        assert_eq!(record.id().as_str(), "x/y?z#w");
    }

    #[tokio::test]
    async fn test_fetch_content_refuses_dot_segments() {
        let server = MockServer::start().await;
        let source = source_for(&server);

        for id in ["..", ".", ""] {
            let err = source
                .fetch_content(MediaKind::Author, &ContentId::new(id))
                .await
                .unwrap_err();
            assert!(matches!(err, SyncError::RemoteFetch(_)), "{id:?}: {err}");
        }
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_remote_fetch() {
        let source = HttpEventSource::new(&SyncConfig {
            server_url: "http://127.0.0.1:9/".to_string(),
            request_timeout_secs: 2,
            ..SyncConfig::default()
        })
        .unwrap();

        let err = source.fetch_events(&Checkpoint::All).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteFetch(_)));
    }

    #[test]
    fn test_endpoint_joins_under_base_path() {
        assert_eq!(
            endpoint("http://host/api/", &["v3", "song", "s1"]).unwrap(),
            "http://host/api/v3/song/s1"
        );
        assert_eq!(
            endpoint("http://host/api/", &["sounds", "a b.mp3"]).unwrap(),
            "http://host/api/sounds/a%20b.mp3"
        );
        assert!(endpoint("http://host/", &["v3", ".."]).is_err());
    }

    #[tokio::test]
    async fn test_connectivity_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/status-check"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(source_for(&server).has_connectivity().await);

        let offline = HttpEventSource::new(&SyncConfig {
            server_url: "http://127.0.0.1:9/".to_string(),
            connectivity_timeout_secs: 1,
            ..SyncConfig::default()
        })
        .unwrap();
        assert!(!offline.has_connectivity().await);
    }
}
