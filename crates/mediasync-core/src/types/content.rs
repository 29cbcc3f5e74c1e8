//! Catalog records mirrored from the server

use serde::{Deserialize, Serialize};

use super::{ContentId, MediaKind};
use crate::error::SyncResult;

/// A sound clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sound {
    pub id: ContentId,
    pub title: String,
    pub author_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub date_added: Option<String>,
    /// Length in seconds
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub is_offensive: bool,
}

/// A song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: ContentId,
    pub title: String,
    #[serde(default)]
    pub genre_id: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub date_added: Option<String>,
    /// Length in seconds
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub is_offensive: bool,
}

/// An author of sounds. Metadata only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: ContentId,
    pub name: String,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One metadata row of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum ContentRecord {
    Sound(Sound),
    Song(Song),
    Author(Author),
}

impl ContentRecord {
    pub fn kind(&self) -> MediaKind {
        match self {
            ContentRecord::Sound(_) => MediaKind::Sound,
            ContentRecord::Song(_) => MediaKind::Song,
            ContentRecord::Author(_) => MediaKind::Author,
        }
    }

    pub fn id(&self) -> &ContentId {
        match self {
            ContentRecord::Sound(s) => &s.id,
            ContentRecord::Song(s) => &s.id,
            ContentRecord::Author(a) => &a.id,
        }
    }

    /// Display title (sound/song title or author name).
    pub fn title(&self) -> &str {
        match self {
            ContentRecord::Sound(s) => &s.title,
            ContentRecord::Song(s) => &s.title,
            ContentRecord::Author(a) => &a.name,
        }
    }

    pub fn to_json(&self) -> SyncResult<Vec<u8>> {
        let bytes = match self {
            ContentRecord::Sound(s) => serde_json::to_vec(s)?,
            ContentRecord::Song(s) => serde_json::to_vec(s)?,
            ContentRecord::Author(a) => serde_json::to_vec(a)?,
        };
        Ok(bytes)
    }

    /// Decode a record of the given kind.
    pub fn from_json(kind: MediaKind, bytes: &[u8]) -> SyncResult<Self> {
        let record = match kind {
            MediaKind::Sound => ContentRecord::Sound(serde_json::from_slice(bytes)?),
            MediaKind::Song => ContentRecord::Song(serde_json::from_slice(bytes)?),
            MediaKind::Author => ContentRecord::Author(serde_json::from_slice(bytes)?),
        };
        Ok(record)
    }
}
