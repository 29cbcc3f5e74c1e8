//! Media file manager
//!
//! Sounds and songs each have one audio file. [`FsFileManager`] keeps them
//! under the media directory:
//!
//! ```text
//! media/
//! ├── sounds/<id>.mp3
//! └── songs/<id>.mp3
//! ```
//!
//! Authors have no files; asking for one is an error. So is an id that is
//! not a single file-name component.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::endpoint;
use crate::types::{ContentId, MediaKind};

/// Downloads and removes media blobs by content id.
#[async_trait]
pub trait FileManager: Send + Sync {
    /// Fetch the file and store it, replacing any previous copy.
    async fn download_file(&self, kind: MediaKind, id: &ContentId) -> SyncResult<()>;

    /// Delete the local copy. Removing a missing file succeeds.
    async fn remove_file(&self, kind: MediaKind, id: &ContentId) -> SyncResult<()>;
}

fn ensure_has_file(kind: MediaKind) -> SyncResult<()> {
    if kind.has_file() {
        Ok(())
    } else {
        Err(SyncError::Download(format!("{kind} entities have no file")))
    }
}

fn file_stem(id: &ContentId) -> SyncResult<&str> {
    id.as_file_stem().ok_or_else(|| {
        SyncError::Download(format!("content id {id:?} is not a valid file name"))
    })
}

/// Filesystem-backed file manager downloading over HTTP
#[derive(Debug, Clone)]
pub struct FsFileManager {
    client: Client,
    base_url: String,
    media_dir: PathBuf,
}

impl FsFileManager {
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.server_base(),
            media_dir: config.media_dir(),
        })
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Where the file for this content lives locally.
    pub fn file_path(&self, kind: MediaKind, id: &ContentId) -> SyncResult<PathBuf> {
        let stem = file_stem(id)?;
        Ok(self.media_dir.join(kind.plural()).join(format!("{stem}.mp3")))
    }

    pub fn has_file(&self, kind: MediaKind, id: &ContentId) -> bool {
        kind.has_file() && self.file_path(kind, id).map_or(false, |path| path.exists())
    }

    fn download_url(&self, kind: MediaKind, id: &ContentId) -> SyncResult<String> {
        let name = format!("{}.mp3", file_stem(id)?);
        endpoint(&self.base_url, &[kind.plural(), &name]).map_err(SyncError::Download)
    }
}

#[async_trait]
impl FileManager for FsFileManager {
    async fn download_file(&self, kind: MediaKind, id: &ContentId) -> SyncResult<()> {
        ensure_has_file(kind)?;

        let url = self.download_url(kind, id)?;
        let dest = self.file_path(kind, id)?;
        debug!(%url, "Downloading media file");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::Download(format!("GET {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Download(format!("GET {url}: HTTP {status}")));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::Download(format!("GET {url}: {e}")))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = dest.with_extension("mp3.part");
        tokio::fs::write(&partial, &body).await?;
        tokio::fs::rename(&partial, &dest).await?;

        debug!(path = %dest.display(), bytes = body.len(), "Stored media file");
        Ok(())
    }

    async fn remove_file(&self, kind: MediaKind, id: &ContentId) -> SyncResult<()> {
        ensure_has_file(kind)?;

        let path = self.file_path(kind, id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager_in(server: &MockServer, data_dir: PathBuf) -> FsFileManager {
        let config = SyncConfig {
            server_url: server.uri(),
            data_dir,
            ..SyncConfig::default()
        };
        FsFileManager::new(&config).unwrap()
    }

    fn manager_for(server: &MockServer, temp: &TempDir) -> FsFileManager {
        manager_in(server, temp.path().to_path_buf())
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sounds/123.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3audio".to_vec()))
            .mount(&server)
            .await;
        let temp = TempDir::new().unwrap();
        let files = manager_for(&server, &temp);
        let id = ContentId::new("123");

        files.download_file(MediaKind::Sound, &id).await.unwrap();

        let stored = std::fs::read(files.file_path(MediaKind::Sound, &id).unwrap()).unwrap();
        assert_eq!(stored, b"ID3audio");
        assert!(files.has_file(MediaKind::Sound, &id));
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let temp = TempDir::new().unwrap();
        let files = manager_for(&server, &temp);
        let id = ContentId::new("404");

        let err = files.download_file(MediaKind::Song, &id).await.unwrap_err();
        assert!(matches!(err, SyncError::Download(_)));
        assert!(!files.has_file(MediaKind::Song, &id));
    }

    #[tokio::test]
    async fn test_remove_missing_file_succeeds() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();
        let files = manager_for(&server, &temp);

        files
            .remove_file(MediaKind::Sound, &ContentId::new("gone"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_authors_have_no_files() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();
        let files = manager_for(&server, &temp);

        let err = files
            .download_file(MediaKind::Author, &ContentId::new("a1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Download(_)));
    }

    #[tokio::test]
    async fn test_unsafe_ids_never_leave_media_dir() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio".to_vec()))
            .mount(&server)
            .await;
        let temp = TempDir::new().unwrap();
        // media/sounds sits three levels below `outer`
        let outer = temp.path().join("outer");
        let files = manager_in(&server, outer.join("data"));

        for id in ["../../../escaped", "..", "nested/name", "back\\slash"] {
            let err = files
                .download_file(MediaKind::Sound, &ContentId::new(id))
                .await
                .unwrap_err();
            assert!(matches!(err, SyncError::Download(_)), "{id:?}: {err}");
        }

        assert!(!outer.join("escaped.mp3").exists());
        assert!(!temp.path().join("escaped.mp3").exists());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_refuses_unsafe_id() {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();
        let outer = temp.path().join("outer");
        let files = manager_in(&server, outer.join("data"));
        std::fs::create_dir_all(&outer).unwrap();
        let victim = outer.join("victim.mp3");
        std::fs::write(&victim, b"keep").unwrap();

        let err = files
            .remove_file(MediaKind::Song, &ContentId::new("../../../victim"))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Download(_)));
        assert!(victim.exists());
    }

    #[tokio::test]
    async fn test_download_url_encodes_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/songs/a%3Fb%23c.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"song".to_vec()))
            .mount(&server)
            .await;
        let temp = TempDir::new().unwrap();
        let files = manager_for(&server, &temp);
        let id = ContentId::new("a?b#c");

        files.download_file(MediaKind::Song, &id).await.unwrap();

        let stored = files.file_path(MediaKind::Song, &id).unwrap();
        assert!(stored.starts_with(files.media_dir()));
        assert_eq!(std::fs::read(stored).unwrap(), b"song");
    }
}
