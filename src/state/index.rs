use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::data::{
    youtube_thumbnail_url, AttachmentAssociation, AttachmentContent, AttachmentInfo, EntityRef,
    EntityType, FileAttachment, FileDescriptor, LinkAttachment, LinkDescriptor, LinkType,
};
use super::edit::AttachmentEdit;
use crate::ids::{apply_tag, EntityId, IdTag};

/// The AttachmentIndex owns every attachment and association for a session.
///
/// Attachments are keyed by id. Associations are kept in insertion order,
/// which is also the order lookups return results in. Nothing here does
/// I/O: the caller loads and saves snapshots through `Library`.
///
/// Mutation is not synchronized. Share an index between threads only
/// behind a lock.
#[derive(Debug, Default, Clone)]
pub struct AttachmentIndex {
    attachments: HashMap<EntityId, AttachmentContent>,
    associations: Vec<AttachmentAssociation>,
    /// Last timestamp handed out by `create_attachment_id`
    last_generated: i64,
}

impl AttachmentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new `file-` or `link-` identifier.
    ///
    /// Without a `base_id` the suffix is the current time in epoch
    /// milliseconds, bumped past the last generated value so ids stay
    /// unique within this index. Other indexes may still pick the same id.
    /// Once the counter reaches `i64::MAX` a `-<n>` suffix keeps ids apart
    /// from stored ones.
    pub fn create_attachment_id(&mut self, is_link: bool, base_id: Option<&str>) -> EntityId {
        let tag = if is_link { IdTag::Link } else { IdTag::File };

        let raw = match base_id {
            Some(base) => base.to_string(),
            None => {
                let next = self.last_generated.saturating_add(1);
                let now = Utc::now().timestamp_millis().max(next);
                self.last_generated = now;

                let mut raw = now.to_string();
                let mut suffix = 1u64;
                while self.attachments.contains_key(&EntityId::tagged(tag, raw.as_str())) {
                    raw = format!("{}-{}", now, suffix);
                    suffix += 1;
                }
                raw
            }
        };

        EntityId::parse(apply_tag(tag, raw))
    }

    /// Link an attachment to an entity.
    ///
    /// Associations are an append-only log: linking the same pair twice
    /// stores two records. Callers dedupe if they need to.
    pub fn associate(
        &mut self,
        attachment_id: &str,
        entity_type: EntityType,
        entity_id: &str,
        is_primary: bool,
    ) -> AttachmentAssociation {
        self.push_association(
            EntityId::parse(attachment_id),
            entity_type,
            EntityId::parse(entity_id),
            is_primary,
            None,
        )
    }

    fn push_association(
        &mut self,
        attachment_id: EntityId,
        entity_type: EntityType,
        entity_id: EntityId,
        is_primary: bool,
        created_by: Option<String>,
    ) -> AttachmentAssociation {
        let association = AttachmentAssociation {
            attachment_id,
            entity_type,
            entity_id,
            created_at: Utc::now(),
            created_by,
            is_primary,
        };

        debug!(
            attachment = %association.attachment_id,
            entity_type = %association.entity_type,
            entity = %association.entity_id,
            primary = association.is_primary,
            "associated attachment"
        );

        self.associations.push(association.clone());
        association
    }

    /// Everything attached to exactly `(entity_type, entity_id)`.
    ///
    /// Associations whose attachment no longer exists are skipped.
    pub fn attachments_for_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Vec<&AttachmentContent> {
        let entity_id = EntityId::parse(entity_id);
        let ids = self
            .associations
            .iter()
            .filter(|a| a.entity_type == entity_type && a.entity_id == entity_id)
            .map(|a| &a.attachment_id);

        self.contents(ids)
    }

    /// Every entity an attachment is linked to, one entry per association
    pub fn entities_for_attachment(&self, attachment_id: &str) -> Vec<EntityRef> {
        let attachment_id = EntityId::parse(attachment_id);
        self.associations
            .iter()
            .filter(|a| a.attachment_id == attachment_id)
            .map(AttachmentAssociation::entity)
            .collect()
    }

    /// Lookup that survives identifier format drift.
    ///
    /// Tries the exact match first. If that finds nothing, every
    /// association of `entity_type` whose id matches `candidate_id` after
    /// stripping tags contributes, each attachment once. This is a full
    /// scan over the associations.
    pub fn resolve_tolerant(
        &self,
        candidate_id: &str,
        entity_type: EntityType,
    ) -> Vec<&AttachmentContent> {
        let exact = self.attachments_for_entity(entity_type, candidate_id);
        if !exact.is_empty() {
            return exact;
        }

        let candidate = EntityId::parse(candidate_id);
        let mut seen = HashSet::new();
        let ids = self
            .associations
            .iter()
            .filter(|a| a.entity_type == entity_type && a.entity_id.matches(&candidate))
            .map(|a| &a.attachment_id)
            .filter(|id| seen.insert(*id));

        let found = self.contents(ids);
        if !found.is_empty() {
            debug!(
                candidate = candidate_id,
                %entity_type,
                count = found.len(),
                "resolved through tolerant match"
            );
        }
        found
    }

    fn contents<'a>(
        &'a self,
        ids: impl Iterator<Item = &'a EntityId>,
    ) -> Vec<&'a AttachmentContent> {
        ids.filter_map(|id| {
            let content = self.attachments.get(id);
            if content.is_none() {
                debug!(attachment = %id, "skipping dangling association");
            }
            content
        })
        .collect()
    }

    /// Store a new file and make `(entity_type, entity_id)` its primary owner
    pub fn add_file_attachment(
        &mut self,
        entity_type: EntityType,
        entity_id: &str,
        file: FileDescriptor,
    ) -> FileAttachment {
        let id = self.create_attachment_id(false, None);
        let attachment = FileAttachment {
            info: AttachmentInfo {
                id: id.clone(),
                name: file.name,
                created_at: Utc::now(),
                description: file.description,
                created_by: file.created_by.clone(),
                tags: file.tags,
            },
            mime_type: file.mime_type,
            size: file.size,
            url: file.url,
            thumbnail_url: file.thumbnail_url,
        };

        self.attachments.insert(id.clone(), attachment.clone().into());
        self.push_association(id, entity_type, EntityId::parse(entity_id), true, file.created_by);
        attachment
    }

    /// Store a new link and make `(entity_type, entity_id)` its primary owner.
    ///
    /// The link type is classified from the URL when not given, and YouTube
    /// links get the video's default thumbnail.
    pub fn add_link_attachment(
        &mut self,
        entity_type: EntityType,
        entity_id: &str,
        link: LinkDescriptor,
    ) -> LinkAttachment {
        let id = self.create_attachment_id(true, None);
        let link_type = link.link_type.unwrap_or_else(|| LinkType::classify(&link.url));
        let thumbnail_url = match (link.thumbnail_url, link_type) {
            (Some(thumbnail), _) => Some(thumbnail),
            (None, LinkType::Youtube) => youtube_thumbnail_url(&link.url),
            (None, _) => None,
        };

        let attachment = LinkAttachment {
            info: AttachmentInfo {
                id: id.clone(),
                name: link.name,
                created_at: Utc::now(),
                description: link.description,
                created_by: link.created_by.clone(),
                tags: link.tags,
            },
            url: link.url,
            link_type,
            thumbnail_url,
        };

        self.attachments.insert(id.clone(), attachment.clone().into());
        self.push_association(id, entity_type, EntityId::parse(entity_id), true, link.created_by);
        attachment
    }

    /// Delete an attachment and every association pointing at it.
    ///
    /// Returns `false` if there was no such attachment.
    pub fn delete_attachment(&mut self, attachment_id: &str) -> bool {
        let attachment_id = EntityId::parse(attachment_id);
        if !self.attachments.contains_key(&attachment_id) {
            return false;
        }

        let before = self.associations.len();
        self.associations.retain(|a| a.attachment_id != attachment_id);
        self.attachments.remove(&attachment_id);

        debug!(
            attachment = %attachment_id,
            associations = before - self.associations.len(),
            "deleted attachment"
        );
        true
    }

    /// Change name and/or description in place.
    ///
    /// Returns `false` if there was no such attachment.
    pub fn update_attachment(&mut self, attachment_id: &str, edit: &AttachmentEdit) -> bool {
        let attachment_id = EntityId::parse(attachment_id);
        match self.attachments.get_mut(&attachment_id) {
            Some(content) => {
                if edit.apply(content.info_mut()) {
                    debug!(attachment = %attachment_id, "updated attachment metadata");
                }
                true
            }
            None => false,
        }
    }

    /// Remove every association between an attachment and one entity.
    ///
    /// The attachment itself is kept, even when nothing references it
    /// anymore. Returns how many records were removed.
    pub fn remove_association(
        &mut self,
        attachment_id: &str,
        entity_type: EntityType,
        entity_id: &str,
    ) -> usize {
        let attachment_id = EntityId::parse(attachment_id);
        let entity_id = EntityId::parse(entity_id);

        let before = self.associations.len();
        self.associations.retain(|a| {
            !(a.attachment_id == attachment_id
                && a.entity_type == entity_type
                && a.entity_id == entity_id)
        });
        let removed = before - self.associations.len();

        if removed > 0 {
            debug!(
                attachment = %attachment_id,
                %entity_type,
                entity = %entity_id,
                removed,
                "removed association"
            );
        }
        removed
    }

    /// The first association marked primary for this attachment
    pub fn primary_entity(&self, attachment_id: &str) -> Option<EntityRef> {
        let attachment_id = EntityId::parse(attachment_id);
        self.associations
            .iter()
            .find(|a| a.attachment_id == attachment_id && a.is_primary)
            .map(AttachmentAssociation::entity)
    }

    pub fn attachment(&self, attachment_id: &str) -> Option<&AttachmentContent> {
        self.attachments.get(&EntityId::parse(attachment_id))
    }

    pub fn attachments(&self) -> impl Iterator<Item = &AttachmentContent> {
        self.attachments.values()
    }

    pub fn associations(&self) -> &[AttachmentAssociation] {
        &self.associations
    }

    /// Put an existing record back, e.g. when loading a snapshot.
    /// Returns the record previously stored under the same id.
    pub fn insert_attachment(&mut self, content: AttachmentContent) -> Option<AttachmentContent> {
        // Keep generated ids ahead of any timestamp id already stored
        if let Ok(stamp) = content.id().raw().parse::<i64>() {
            self.last_generated = self.last_generated.max(stamp);
        }
        self.attachments.insert(content.id().clone(), content)
    }

    /// Append an existing association record unchanged
    pub fn restore_association(&mut self, association: AttachmentAssociation) {
        self.associations.push(association);
    }

    /// Number of stored attachments
    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }
}
