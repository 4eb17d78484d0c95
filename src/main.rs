use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lesson_catalog::ids::{self, IdTag};
use lesson_catalog::state::{AttachmentEdit, EntityType, FileDescriptor, LinkDescriptor, LinkType};
use lesson_catalog::{AttachmentIndex, CatalogConfig, CatalogError, CatalogResult, Library};

/// Manage attachments for students, pieces, lessons and practice sessions
#[derive(Parser, Debug)]
#[command(name = "lesson-catalog", version, about)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, env = "LESSON_CATALOG_CONFIG")]
    config: Option<PathBuf>,

    /// Override the database path from the config
    #[arg(long, global = true, env = "LESSON_CATALOG_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Attach an uploaded file to an entity
    AttachFile {
        /// piece, student, lesson or practice_session
        entity_type: EntityType,
        entity_id: String,
        /// Display name
        name: String,
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "application/octet-stream")]
        mime_type: String,
        #[arg(long, default_value_t = 0)]
        size: u64,
        #[arg(long)]
        thumbnail: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        created_by: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Attach a link to an entity
    AttachLink {
        entity_type: EntityType,
        entity_id: String,
        name: String,
        url: String,
        /// youtube, article or other (guessed from the URL if omitted)
        #[arg(long)]
        link_type: Option<LinkType>,
        #[arg(long)]
        thumbnail: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        created_by: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Link an existing attachment to another entity
    Associate {
        attachment_id: String,
        entity_type: EntityType,
        entity_id: String,
        #[arg(long)]
        primary: bool,
    },

    /// List attachments of an entity
    List {
        entity_type: EntityType,
        entity_id: String,
        /// Fall back to matching ids with tags stripped
        #[arg(long)]
        tolerant: bool,
    },

    /// List the entities an attachment is linked to
    Entities { attachment_id: String },

    /// Delete an attachment and all its associations
    Delete { attachment_id: String },

    /// Unlink an attachment from one entity, keeping the attachment
    Detach {
        attachment_id: String,
        entity_type: EntityType,
        entity_id: String,
    },

    /// Change an attachment's name or description
    Rename {
        attachment_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
    },

    /// Inspect an identifier
    Id {
        id: String,
        /// Tag to coerce to, e.g. STUDENT or PIECE
        #[arg(long, value_parser = parse_tag)]
        tag: Option<IdTag>,
    },
}

fn parse_tag(name: &str) -> Result<IdTag, String> {
    IdTag::from_name(&name.to_ascii_uppercase().replace('-', "_"))
        .ok_or_else(|| format!("unknown tag '{}'", name))
}

#[derive(Serialize)]
struct IdReport {
    id: String,
    tag: Option<&'static str>,
    stripped: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    coerced: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("lesson-catalog: {}", e);
            std::process::exit(2);
        }
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli, &config) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>) -> CatalogResult<CatalogConfig> {
    match path {
        Some(path) => CatalogConfig::load(path),
        None => CatalogConfig::load(CatalogConfig::default_path()?),
    }
}

fn run(cli: Cli, config: &CatalogConfig) -> CatalogResult<()> {
    if let Command::Id { id, tag } = &cli.command {
        let report = IdReport {
            id: id.clone(),
            tag: ids::identify_tag_type(id),
            stripped: ids::strip_tag(id).to_string(),
            coerced: tag.map(|tag| ids::coerce_tag(id, tag)),
        };
        return print_json(&report);
    }

    let db_path = match cli.db {
        Some(path) => path,
        None => config.database_path()?,
    };
    let mut library = Library::open(&db_path)?;
    let mut index = library.load_index()?;

    let changed = match cli.command {
        Command::AttachFile {
            entity_type,
            entity_id,
            name,
            url,
            mime_type,
            size,
            thumbnail,
            description,
            created_by,
            tags,
        } => {
            let file = index.add_file_attachment(
                entity_type,
                &entity_id,
                FileDescriptor {
                    name,
                    mime_type,
                    size,
                    url,
                    thumbnail_url: thumbnail,
                    description,
                    created_by,
                    tags,
                },
            );
            info!(attachment = %file.info.id, "file attached");
            print_json(&file)?;
            true
        }
        Command::AttachLink {
            entity_type,
            entity_id,
            name,
            url,
            link_type,
            thumbnail,
            description,
            created_by,
            tags,
        } => {
            let link = index.add_link_attachment(
                entity_type,
                &entity_id,
                LinkDescriptor {
                    name,
                    url,
                    link_type,
                    thumbnail_url: thumbnail,
                    description,
                    created_by,
                    tags,
                },
            );
            info!(attachment = %link.info.id, "link attached");
            print_json(&link)?;
            true
        }
        Command::Associate {
            attachment_id,
            entity_type,
            entity_id,
            primary,
        } => {
            require_attachment(&index, &attachment_id)?;
            let association = index.associate(&attachment_id, entity_type, &entity_id, primary);
            print_json(&association)?;
            true
        }
        Command::List {
            entity_type,
            entity_id,
            tolerant,
        } => {
            let found = if tolerant {
                index.resolve_tolerant(&entity_id, entity_type)
            } else {
                index.attachments_for_entity(entity_type, &entity_id)
            };
            print_json(&found)?;
            false
        }
        Command::Entities { attachment_id } => {
            print_json(&index.entities_for_attachment(&attachment_id))?;
            false
        }
        Command::Delete { attachment_id } => {
            if !index.delete_attachment(&attachment_id) {
                return Err(CatalogError::not_found(format!("attachment {}", attachment_id)));
            }
            info!(attachment = %attachment_id, "attachment deleted");
            true
        }
        Command::Detach {
            attachment_id,
            entity_type,
            entity_id,
        } => {
            let removed = index.remove_association(&attachment_id, entity_type, &entity_id);
            if removed == 0 {
                return Err(CatalogError::not_found(format!(
                    "association {} -> {} {}",
                    attachment_id, entity_type, entity_id
                )));
            }
            info!(attachment = %attachment_id, removed, "association removed");
            true
        }
        Command::Rename {
            attachment_id,
            name,
            description,
            clear_description,
        } => {
            let edit = AttachmentEdit {
                name,
                description: if clear_description { Some(None) } else { description.map(Some) },
            };
            if edit.is_empty() {
                return Err(CatalogError::validation("nothing to change"));
            }
            if !index.update_attachment(&attachment_id, &edit) {
                return Err(CatalogError::not_found(format!("attachment {}", attachment_id)));
            }
            true
        }
        Command::Id { .. } => false,
    };

    if changed {
        library.save_index(&index)?;
    }
    Ok(())
}

fn require_attachment(index: &AttachmentIndex, attachment_id: &str) -> CatalogResult<()> {
    match index.attachment(attachment_id) {
        Some(_) => Ok(()),
        None => Err(CatalogError::not_found(format!("attachment {}", attachment_id))),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CatalogResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_attach_file() {
        let cli = Cli::try_parse_from([
            "lesson-catalog",
            "attach-file",
            "piece",
            "p-5",
            "score.pdf",
            "--url",
            "https://files.example.com/score.pdf",
            "--tag",
            "score",
            "--tag",
            "henle",
        ])
        .unwrap();

        match cli.command {
            Command::AttachFile { entity_type, tags, mime_type, .. } => {
                assert_eq!(entity_type, EntityType::Piece);
                assert_eq!(tags, vec!["score", "henle"]);
                assert_eq!(mime_type, "application/octet-stream");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_tag_names() {
        assert_eq!(parse_tag("student").unwrap(), IdTag::Student);
        assert_eq!(parse_tag("student-piece").unwrap(), IdTag::StudentPiece);
        assert!(parse_tag("teacher").is_err());
    }

    #[test]
    fn test_unknown_entity_type_is_rejected() {
        assert!(Cli::try_parse_from(["lesson-catalog", "list", "teacher", "t-1"]).is_err());
    }

    fn run_with_db(db: &std::path::Path, args: &[&str]) -> CatalogResult<()> {
        let db = db.to_str().unwrap();
        let mut argv = vec!["lesson-catalog", "--db", db];
        argv.extend_from_slice(args);
        run(Cli::try_parse_from(argv).unwrap(), &CatalogConfig::default())
    }

    fn stored_index(db: &std::path::Path) -> AttachmentIndex {
        Library::open(db).unwrap().load_index().unwrap()
    }

    fn attach_score(db: &std::path::Path) -> String {
        run_with_db(
            db,
            &[
                "attach-file",
                "piece",
                "p-5",
                "score.pdf",
                "--url",
                "https://files.example.com/score.pdf",
                "--mime-type",
                "application/pdf",
                "--size",
                "2048",
                "--tag",
                "score",
            ],
        )
        .unwrap();

        let index = stored_index(db);
        let ids: Vec<String> = index.attachments().map(|c| c.id().to_string()).collect();
        assert_eq!(ids.len(), 1);
        ids[0].clone()
    }

    #[test]
    fn test_attach_file_is_saved_and_listed() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("catalog.db");
        let id = attach_score(&db);

        let index = stored_index(&db);
        let found = index.attachments_for_entity(EntityType::Piece, "p-5");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id().to_string(), id);
        assert_eq!(found[0].name(), "score.pdf");
        assert_eq!(found[0].info().tags, vec!["score"]);
        let owner = index.primary_entity(&id).unwrap();
        assert_eq!(owner.entity_id.to_string(), "p-5");

        run_with_db(&db, &["list", "piece", "p-5"]).unwrap();
        run_with_db(&db, &["list", "piece", "5", "--tolerant"]).unwrap();
        run_with_db(&db, &["entities", &id]).unwrap();
        assert_eq!(stored_index(&db).associations().len(), 1);
    }

    #[test]
    fn test_attach_link_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("catalog.db");
        run_with_db(
            &db,
            &["attach-link", "lesson", "l-2", "Warm-up", "https://youtu.be/warm"],
        )
        .unwrap();

        let index = stored_index(&db);
        let found = index.attachments_for_entity(EntityType::Lesson, "l-2");
        assert_eq!(found.len(), 1);
        assert!(found[0].is_link());
    }

    #[test]
    fn test_delete_missing_attachment_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("catalog.db");
        let id = attach_score(&db);

        let err = run_with_db(&db, &["delete", "file-does-not-exist"]).unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
        assert!(stored_index(&db).attachment(&id).is_some());

        run_with_db(&db, &["delete", &id]).unwrap();
        let index = stored_index(&db);
        assert!(index.is_empty());
        assert!(index.associations().is_empty());
    }

    #[test]
    fn test_detach_without_match_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("catalog.db");
        let id = attach_score(&db);

        let err = run_with_db(&db, &["detach", &id, "student", "s-1"]).unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
        assert_eq!(stored_index(&db).associations().len(), 1);

        run_with_db(&db, &["detach", &id, "piece", "p-5"]).unwrap();
        let index = stored_index(&db);
        assert!(index.associations().is_empty());
        assert!(index.attachment(&id).is_some());
    }

    #[test]
    fn test_associate_requires_existing_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("catalog.db");
        let id = attach_score(&db);

        let err = run_with_db(&db, &["associate", "file-missing", "student", "s-1"]).unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
        assert_eq!(stored_index(&db).associations().len(), 1);

        run_with_db(&db, &["associate", &id, "student", "s-1"]).unwrap();
        let index = stored_index(&db);
        assert_eq!(index.attachments_for_entity(EntityType::Student, "s-1").len(), 1);
        assert_eq!(index.entities_for_attachment(&id).len(), 2);
    }

    #[test]
    fn test_rename_rejects_empty_edit_and_saves_changes() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("catalog.db");
        let id = attach_score(&db);

        let err = run_with_db(&db, &["rename", &id]).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));

        let err = run_with_db(&db, &["rename", "file-missing", "--name", "x"]).unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));

        run_with_db(&db, &["rename", &id, "--name", "full score.pdf", "--description", "Henle"])
            .unwrap();
        let index = stored_index(&db);
        let stored = index.attachment(&id).unwrap();
        assert_eq!(stored.name(), "full score.pdf");
        assert_eq!(stored.info().description.as_deref(), Some("Henle"));
    }

    #[test]
    fn test_id_report_does_not_touch_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("never").join("catalog.db");

        run_with_db(&db, &["id", "s-9", "--tag", "piece"]).unwrap();
        assert!(!db.exists());
    }
}
