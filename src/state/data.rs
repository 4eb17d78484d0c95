/// Shared data structures for the attachment catalog
///
/// These structs represent the data model that flows between
/// the in-memory index, the SQLite snapshot and the command line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::CatalogError;
use crate::ids::EntityId;

/// Kinds of records an attachment can be linked to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Piece,
    Student,
    Lesson,
    PracticeSession,
}

impl EntityType {
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityType::Piece => "piece",
            EntityType::Student => "student",
            EntityType::Lesson => "lesson",
            EntityType::PracticeSession => "practice_session",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "piece" => Ok(EntityType::Piece),
            "student" => Ok(EntityType::Student),
            "lesson" => Ok(EntityType::Lesson),
            "practice_session" => Ok(EntityType::PracticeSession),
            other => Err(CatalogError::parse(format!("unknown entity type '{}'", other))),
        }
    }
}

/// Classification of a link attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Youtube,
    Article,
    Other,
}

const YOUTUBE_HOSTS: [&str; 4] = ["youtube.com", "www.youtube.com", "m.youtube.com", "youtu.be"];

impl LinkType {
    pub const fn as_str(self) -> &'static str {
        match self {
            LinkType::Youtube => "youtube",
            LinkType::Article => "article",
            LinkType::Other => "other",
        }
    }

    /// Guess the link type from its URL
    ///
    /// - YouTube hosts are `Youtube`
    /// - any other http(s) URL is an `Article`
    /// - everything else (unparseable, mailto:, ...) is `Other`
    pub fn classify(url: &str) -> Self {
        let Ok(parsed) = Url::parse(url) else {
            return LinkType::Other;
        };

        match parsed.host_str() {
            Some(host) if YOUTUBE_HOSTS.contains(&host) => LinkType::Youtube,
            Some(_) if matches!(parsed.scheme(), "http" | "https") => LinkType::Article,
            _ => LinkType::Other,
        }
    }
}

impl FromStr for LinkType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "youtube" => Ok(LinkType::Youtube),
            "article" => Ok(LinkType::Article),
            "other" => Ok(LinkType::Other),
            other => Err(CatalogError::parse(format!("unknown link type '{}'", other))),
        }
    }
}

/// Extract the video id from a YouTube watch, embed, shorts or youtu.be URL
pub fn youtube_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    if !YOUTUBE_HOSTS.contains(&host) {
        return None;
    }

    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());
    let video_id = if host == "youtu.be" {
        segments.next().map(str::to_string)
    } else {
        match segments.next() {
            Some("watch") => parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("embed") | Some("shorts") | Some("v") => segments.next().map(str::to_string),
            _ => None,
        }
    };

    video_id.filter(|id| !id.is_empty())
}

/// Default thumbnail served by YouTube for a video link
pub fn youtube_thumbnail_url(url: &str) -> Option<String> {
    youtube_video_id(url).map(|id| format!("https://img.youtube.com/vi/{}/hqdefault.jpg", id))
}

/// Attributes shared by files and links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub id: EntityId,
    /// Display name (e.g. "Clair de Lune - score.pdf")
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub description: Option<String>,
    /// Internal id of whoever added it
    pub created_by: Option<String>,
    pub tags: Vec<String>,
}

/// An uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttachment {
    #[serde(flatten)]
    pub info: AttachmentInfo,
    /// MIME-like type string (e.g. "application/pdf")
    pub mime_type: String,
    /// Size in bytes
    pub size: u64,
    /// Where the file can be fetched from
    pub url: String,
    pub thumbnail_url: Option<String>,
}

/// A pasted link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkAttachment {
    #[serde(flatten)]
    pub info: AttachmentInfo,
    pub url: String,
    pub link_type: LinkType,
    pub thumbnail_url: Option<String>,
}

/// Attachment content: either a file or a link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AttachmentContent {
    File(FileAttachment),
    Link(LinkAttachment),
}

impl AttachmentContent {
    pub fn info(&self) -> &AttachmentInfo {
        match self {
            AttachmentContent::File(file) => &file.info,
            AttachmentContent::Link(link) => &link.info,
        }
    }

    pub fn info_mut(&mut self) -> &mut AttachmentInfo {
        match self {
            AttachmentContent::File(file) => &mut file.info,
            AttachmentContent::Link(link) => &mut link.info,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.info().id
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn is_link(&self) -> bool {
        matches!(self, AttachmentContent::Link(_))
    }

    /// The file URL or link target
    pub fn url(&self) -> &str {
        match self {
            AttachmentContent::File(file) => &file.url,
            AttachmentContent::Link(link) => &link.url,
        }
    }
}

impl From<FileAttachment> for AttachmentContent {
    fn from(file: FileAttachment) -> Self {
        AttachmentContent::File(file)
    }
}

impl From<LinkAttachment> for AttachmentContent {
    fn from(link: LinkAttachment) -> Self {
        AttachmentContent::Link(link)
    }
}

/// Links one attachment to one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentAssociation {
    pub attachment_id: EntityId,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    /// Marks the main owner when the attachment is shared
    pub is_primary: bool,
}

impl AttachmentAssociation {
    pub fn entity(&self) -> EntityRef {
        EntityRef {
            entity_type: self.entity_type,
            entity_id: self.entity_id.clone(),
        }
    }
}

/// An (entity type, entity id) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
}

/// What the caller knows about a file right after upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileDescriptor {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub tags: Vec<String>,
}

/// What the caller knows about a pasted link
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkDescriptor {
    pub name: String,
    pub url: String,
    /// Classified from the URL when absent
    pub link_type: Option<LinkType>,
    pub thumbnail_url: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub tags: Vec<String>,
}
