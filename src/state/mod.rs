/// Attachment state
///
/// This module handles attachments and the entities they belong to:
/// - Records shared between layers (data.rs)
/// - The in-memory association index (index.rs)
/// - In-place metadata edits (edit.rs)
/// - The SQLite snapshot store (library.rs)

pub mod data;
pub mod edit;
pub mod index;
pub mod library;

pub use data::{
    AttachmentAssociation, AttachmentContent, AttachmentInfo, EntityRef, EntityType,
    FileAttachment, FileDescriptor, LinkAttachment, LinkDescriptor, LinkType,
};
pub use edit::AttachmentEdit;
pub use index::AttachmentIndex;
pub use library::Library;
