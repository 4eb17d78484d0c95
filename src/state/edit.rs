/// In-place metadata edits for attachments
///
/// Attachment content is immutable once created. Only the display name
/// and the description can be changed afterwards.

use serde::{Deserialize, Serialize};

use super::data::AttachmentInfo;

/// A partial update of attachment metadata
///
/// `None` leaves a field untouched. For the description,
/// `Some(None)` clears it and `Some(Some(text))` replaces it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AttachmentEdit {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl AttachmentEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    /// Check if this edit would change nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to the given metadata, returning whether anything changed
    pub fn apply(&self, info: &mut AttachmentInfo) -> bool {
        let mut changed = false;

        if let Some(name) = &self.name {
            if info.name != *name {
                info.name = name.clone();
                changed = true;
            }
        }

        if let Some(description) = &self.description {
            if info.description != *description {
                info.description = description.clone();
                changed = true;
            }
        }

        changed
    }
}
