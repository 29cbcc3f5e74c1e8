//! Core types for the media sync engine

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub mod content;

pub use content::{Author, ContentRecord, Song, Sound};

use crate::error::SyncError;

/// Server-assigned unique identifier of an update event
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a sound, song or author
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as a single file-name component, or `None` when it could
    /// name a location outside its directory.
    pub fn as_file_stem(&self) -> Option<&str> {
        let id = self.0.as_str();
        let safe = !matches!(id, "" | "." | "..") && !id.contains(['/', '\\', '\0']);
        safe.then_some(id)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of catalog entity an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    Sound,
    Song,
    Author,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Sound, MediaKind::Song, MediaKind::Author];

    /// Whether entities of this kind have an associated media file.
    pub fn has_file(self) -> bool {
        match self {
            MediaKind::Sound | MediaKind::Song => true,
            MediaKind::Author => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Sound => "sound",
            MediaKind::Song => "song",
            MediaKind::Author => "author",
        }
    }

    /// Plural form, used for table names and file directories.
    pub fn plural(self) -> &'static str {
        match self {
            MediaKind::Sound => "sounds",
            MediaKind::Song => "songs",
            MediaKind::Author => "authors",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sound" | "sounds" => Ok(MediaKind::Sound),
            "song" | "songs" => Ok(MediaKind::Song),
            "author" | "authors" => Ok(MediaKind::Author),
            other => Err(SyncError::Config(format!("unknown media kind: {other}"))),
        }
    }
}

/// What happened to the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Created,
    MetadataUpdated,
    FileUpdated,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Created => "created",
            ChangeKind::MetadataUpdated => "metadataUpdated",
            ChangeKind::FileUpdated => "fileUpdated",
            ChangeKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// A single change published by the server.
///
/// `succeeded` is local bookkeeping; it is absent on the wire and defaults
/// to `false` when an event is decoded from a server response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvent {
    pub id: EventId,
    pub content_id: ContentId,
    pub media_type: MediaKind,
    pub event_type: ChangeKind,
    #[serde(rename = "dateTime")]
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub succeeded: bool,
}

impl UpdateEvent {
    pub fn new(
        id: impl Into<String>,
        content_id: impl Into<String>,
        media_type: MediaKind,
        event_type: ChangeKind,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::new(id),
            content_id: ContentId::new(content_id),
            media_type,
            event_type,
            occurred_at,
            succeeded: false,
        }
    }
}

/// The resume point for the next fetch.
///
/// Ordered so that `All` (nothing absorbed yet) sorts before every timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Checkpoint {
    /// No update has been absorbed yet; fetch everything.
    #[default]
    All,
    /// `occurred_at` of the most recent fully absorbed event.
    At(DateTime<Utc>),
}

impl Checkpoint {
    pub const SENTINEL: &'static str = "all";

    pub fn is_initial(&self) -> bool {
        matches!(self, Checkpoint::All)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checkpoint::All => f.write_str(Self::SENTINEL),
            Checkpoint::At(ts) => f.write_str(&format_timestamp(ts)),
        }
    }
}

impl FromStr for Checkpoint {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::SENTINEL {
            return Ok(Checkpoint::All);
        }
        DateTime::parse_from_rfc3339(s)
            .map(|ts| Checkpoint::At(ts.with_timezone(&Utc)))
            .map_err(|e| SyncError::Serialization(format!("invalid checkpoint '{s}': {e}")))
    }
}

/// ISO-8601 with `Z`, keeping fractional seconds only when present.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
