use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::data::{
    AttachmentAssociation, AttachmentContent, AttachmentInfo, EntityType, FileAttachment,
    LinkAttachment, LinkType,
};
use super::index::AttachmentIndex;
use crate::error::{CatalogError, CatalogResult};
use crate::ids::EntityId;

/// The Library manages the SQLite snapshot of an attachment index.
/// It stores attachment content and the associations that reference it.
///
/// The in-memory `AttachmentIndex` is the working copy. A snapshot is
/// written back as a whole with `save_index` after mutations.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
}

impl Library {
    /// Open or create the database at `db_path`, creating parent
    /// directories as needed.
    pub fn open(db_path: impl AsRef<Path>) -> CatalogResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        info!(path = %db_path.display(), "database opened");

        let mut library = Library { conn, db_path };
        library.init_schema()?;
        Ok(library)
    }

    /// A throwaway database, mostly for tests
    pub fn open_in_memory() -> CatalogResult<Self> {
        let conn = Connection::open_in_memory()?;
        let mut library = Library {
            conn,
            db_path: PathBuf::from(":memory:"),
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&mut self) -> CatalogResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS attachments (
                id              TEXT PRIMARY KEY,
                kind            TEXT NOT NULL,
                name            TEXT NOT NULL,
                created_at      INTEGER NOT NULL,
                description     TEXT,
                created_by      TEXT,
                tags_json       TEXT NOT NULL DEFAULT '[]',
                mime_type       TEXT,
                size            INTEGER,
                url             TEXT NOT NULL,
                link_type       TEXT,
                thumbnail_url   TEXT
            )",
            [],
        )?;

        // Row order is insertion order. No foreign key: an association may
        // outlive its attachment in the index and is stored as-is.
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS attachment_associations (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                attachment_id   TEXT NOT NULL,
                entity_type     TEXT NOT NULL,
                entity_id       TEXT NOT NULL,
                created_at      INTEGER NOT NULL,
                created_by      TEXT,
                is_primary      INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_associations_entity
             ON attachment_associations(entity_type, entity_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_associations_attachment
             ON attachment_associations(attachment_id)",
            [],
        )?;

        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Get a count of stored attachments
    pub fn attachment_count(&self) -> CatalogResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM attachments", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Replace the stored snapshot with the contents of `index`.
    /// Runs in one transaction, so readers see the old or the new snapshot.
    pub fn save_index(&mut self, index: &AttachmentIndex) -> CatalogResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM attachment_associations", [])?;
        tx.execute("DELETE FROM attachments", [])?;

        {
            let mut insert_attachment = tx.prepare(
                "INSERT INTO attachments
                 (id, kind, name, created_at, description, created_by, tags_json,
                  mime_type, size, url, link_type, thumbnail_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;

            for content in index.attachments() {
                let info = content.info();
                let tags_json = serde_json::to_string(&info.tags)?;
                let (kind, mime_type, size, link_type, thumbnail_url) = match content {
                    AttachmentContent::File(file) => (
                        "file",
                        Some(file.mime_type.as_str()),
                        Some(i64::try_from(file.size).map_err(|_| {
                            CatalogError::validation(format!(
                                "attachment {} is too large to store: {} bytes",
                                info.id, file.size
                            ))
                        })?),
                        None,
                        file.thumbnail_url.as_deref(),
                    ),
                    AttachmentContent::Link(link) => (
                        "link",
                        None,
                        None,
                        Some(link.link_type.as_str()),
                        link.thumbnail_url.as_deref(),
                    ),
                };

                insert_attachment.execute(params![
                    info.id.to_string(),
                    kind,
                    info.name,
                    info.created_at.timestamp_millis(),
                    info.description,
                    info.created_by,
                    tags_json,
                    mime_type,
                    size,
                    content.url(),
                    link_type,
                    thumbnail_url,
                ])?;
            }

            let mut insert_association = tx.prepare(
                "INSERT INTO attachment_associations
                 (attachment_id, entity_type, entity_id, created_at, created_by, is_primary)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for association in index.associations() {
                insert_association.execute(params![
                    association.attachment_id.to_string(),
                    association.entity_type.as_str(),
                    association.entity_id.to_string(),
                    association.created_at.timestamp_millis(),
                    association.created_by,
                    association.is_primary,
                ])?;
            }
        }

        tx.commit()?;
        info!(
            attachments = index.len(),
            associations = index.associations().len(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Rebuild an index from the stored snapshot.
    ///
    /// Associations come back in the order they were saved.
    pub fn load_index(&self) -> CatalogResult<AttachmentIndex> {
        let mut index = AttachmentIndex::new();

        let mut stmt = self.conn.prepare(
            "SELECT id, kind, name, created_at, description, created_by, tags_json,
                    mime_type, size, url, link_type, thumbnail_url
             FROM attachments",
        )?;
        let rows = stmt.query_map([], StoredAttachment::from_row)?;
        for row in rows {
            index.insert_attachment(row?.into_content()?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT attachment_id, entity_type, entity_id, created_at, created_by, is_primary
             FROM attachment_associations ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, bool>(5)?,
            ))
        })?;

        for row in rows {
            let (attachment_id, entity_type, entity_id, created_at, created_by, is_primary) = row?;
            let entity_type = match entity_type.parse::<EntityType>() {
                Ok(entity_type) => entity_type,
                Err(e) => {
                    warn!(attachment = %attachment_id, "skipping stored association: {}", e);
                    continue;
                }
            };

            index.restore_association(AttachmentAssociation {
                attachment_id: EntityId::parse(attachment_id),
                entity_type,
                entity_id: EntityId::parse(entity_id),
                created_at: from_millis(created_at)?,
                created_by,
                is_primary,
            });
        }

        info!(
            attachments = index.len(),
            associations = index.associations().len(),
            "snapshot loaded"
        );
        Ok(index)
    }
}

/// A row of the attachments table before it is checked
struct StoredAttachment {
    id: String,
    kind: String,
    name: String,
    created_at: i64,
    description: Option<String>,
    created_by: Option<String>,
    tags_json: String,
    mime_type: Option<String>,
    size: Option<i64>,
    url: String,
    link_type: Option<String>,
    thumbnail_url: Option<String>,
}

impl StoredAttachment {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
            description: row.get(4)?,
            created_by: row.get(5)?,
            tags_json: row.get(6)?,
            mime_type: row.get(7)?,
            size: row.get(8)?,
            url: row.get(9)?,
            link_type: row.get(10)?,
            thumbnail_url: row.get(11)?,
        })
    }

    fn into_content(self) -> CatalogResult<AttachmentContent> {
        let info = AttachmentInfo {
            id: EntityId::parse(&self.id),
            name: self.name,
            created_at: from_millis(self.created_at)?,
            description: self.description,
            created_by: self.created_by,
            tags: serde_json::from_str(&self.tags_json)?,
        };

        match self.kind.as_str() {
            "file" => Ok(AttachmentContent::File(FileAttachment {
                size: u64::try_from(self.size.unwrap_or(0)).map_err(|_| {
                    CatalogError::parse(format!("attachment {} has a negative size", self.id))
                })?,
                info,
                mime_type: self.mime_type.unwrap_or_default(),
                url: self.url,
                thumbnail_url: self.thumbnail_url,
            })),
            "link" => {
                let link_type = match self.link_type.as_deref() {
                    Some(link_type) => link_type.parse()?,
                    None => LinkType::classify(&self.url),
                };
                Ok(AttachmentContent::Link(LinkAttachment {
                    info,
                    url: self.url,
                    link_type,
                    thumbnail_url: self.thumbnail_url,
                }))
            }
            other => Err(CatalogError::parse(format!(
                "attachment {} has unknown kind '{}'",
                self.id, other
            ))),
        }
    }
}

fn from_millis(millis: i64) -> CatalogResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| CatalogError::parse(format!("timestamp out of range: {}", millis)))
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::{FileDescriptor, LinkDescriptor};

    fn populated_index() -> AttachmentIndex {
        let mut index = AttachmentIndex::new();
        let file = index.add_file_attachment(
            EntityType::Piece,
            "p-5",
            FileDescriptor {
                name: "score.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                size: 1024,
                url: "https://files.example.com/score.pdf".to_string(),
                tags: vec!["score".to_string(), "henle".to_string()],
                created_by: Some("t-1".to_string()),
                ..FileDescriptor::default()
            },
        );
        index.associate(&file.info.id.to_string(), EntityType::Student, "s-1", false);
        index.add_link_attachment(
            EntityType::Lesson,
            "l-3",
            LinkDescriptor {
                name: "Warm-up".to_string(),
                url: "https://youtu.be/warm".to_string(),
                ..LinkDescriptor::default()
            },
        );
        index
    }

    #[test]
    fn test_empty_library() {
        let library = Library::open_in_memory().unwrap();
        assert_eq!(library.attachment_count().unwrap(), 0);
        assert!(library.load_index().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_snapshot() {
        let mut library = Library::open_in_memory().unwrap();
        let index = populated_index();
        library.save_index(&index).unwrap();
        assert_eq!(library.attachment_count().unwrap(), 2);

        let loaded = library.load_index().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.associations().len(), 3);

        for original in index.attachments() {
            let restored = loaded.attachment(&original.id().to_string()).unwrap();
            assert_eq!(restored.name(), original.name());
            assert_eq!(restored.url(), original.url());
            assert_eq!(restored.info().tags, original.info().tags);
            assert_eq!(
                restored.info().created_at.timestamp_millis(),
                original.info().created_at.timestamp_millis()
            );
        }

        let order: Vec<String> = loaded
            .associations()
            .iter()
            .map(|a| a.entity_id.to_string())
            .collect();
        assert_eq!(order, vec!["p-5", "s-1", "l-3"]);
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let mut library = Library::open_in_memory().unwrap();
        let mut index = populated_index();
        library.save_index(&index).unwrap();

        let ids: Vec<String> = index.attachments().map(|c| c.id().to_string()).collect();
        for id in &ids {
            assert!(index.delete_attachment(id));
        }
        library.save_index(&index).unwrap();

        assert_eq!(library.attachment_count().unwrap(), 0);
        assert!(library.load_index().unwrap().associations().is_empty());
    }

    #[test]
    fn test_unknown_kind_is_a_parse_error() {
        let library = Library::open_in_memory().unwrap();
        library
            .conn
            .execute(
                "INSERT INTO attachments (id, kind, name, created_at, url)
                 VALUES ('file-1', 'scan', 'x', 0, 'u')",
                [],
            )
            .unwrap();

        let err = library.load_index().unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }

    #[test]
    fn test_file_size_round_trips() {
        let mut library = Library::open_in_memory().unwrap();
        let mut index = AttachmentIndex::new();
        let file = index.add_file_attachment(
            EntityType::Piece,
            "p-5",
            FileDescriptor {
                name: "recital.wav".to_string(),
                size: i64::MAX as u64,
                url: "https://files.example.com/recital.wav".to_string(),
                ..FileDescriptor::default()
            },
        );
        library.save_index(&index).unwrap();

        let loaded = library.load_index().unwrap();
        match loaded.attachment(&file.info.id.to_string()).unwrap() {
            AttachmentContent::File(stored) => assert_eq!(stored.size, i64::MAX as u64),
            other => panic!("expected a file, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_file_is_rejected_and_snapshot_kept() {
        let mut library = Library::open_in_memory().unwrap();
        library.save_index(&populated_index()).unwrap();

        let mut index = AttachmentIndex::new();
        index.add_file_attachment(
            EntityType::Piece,
            "p-5",
            FileDescriptor {
                name: "huge.bin".to_string(),
                size: u64::MAX,
                url: "https://files.example.com/huge.bin".to_string(),
                ..FileDescriptor::default()
            },
        );

        let err = library.save_index(&index).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert_eq!(library.attachment_count().unwrap(), 2);
    }

    #[test]
    fn test_negative_stored_size_is_a_parse_error() {
        let library = Library::open_in_memory().unwrap();
        library
            .conn
            .execute(
                "INSERT INTO attachments (id, kind, name, created_at, size, url)
                 VALUES ('file-1', 'file', 'x', 0, -1, 'u')",
                [],
            )
            .unwrap();

        assert!(matches!(library.load_index().unwrap_err(), CatalogError::Parse(_)));
    }
}
