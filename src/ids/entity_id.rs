use serde::{Deserialize, Serialize};
use std::fmt;

use super::tag::IdTag;

/// An identifier split into its tag and raw suffix.
///
/// Identifiers are parsed once when they enter the catalog so the rest of
/// the code never re-scans prefixes. Rendering gives back the exact string
/// that was parsed, so two `EntityId`s are equal iff their strings are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EntityId {
    tag: Option<IdTag>,
    raw: String,
}

impl EntityId {
    /// Parse an identifier, recognizing at most one leading tag
    pub fn parse(id: impl AsRef<str>) -> Self {
        let id = id.as_ref();
        match IdTag::detect(id) {
            Some(tag) => Self {
                tag: Some(tag),
                raw: id[tag.prefix().len()..].to_string(),
            },
            None => Self {
                tag: None,
                raw: id.to_string(),
            },
        }
    }

    /// Build a tagged identifier from an already-stripped suffix
    pub fn tagged(tag: IdTag, raw: impl Into<String>) -> Self {
        Self {
            tag: Some(tag),
            raw: raw.into(),
        }
    }

    pub fn tag(&self) -> Option<IdTag> {
        self.tag
    }

    /// The suffix with any recognized tag removed
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn has_tag(&self, tag: IdTag) -> bool {
        self.tag == Some(tag)
    }

    /// Same suffix under `tag`, replacing whatever tag was there
    pub fn with_tag(&self, tag: IdTag) -> Self {
        Self::tagged(tag, self.raw.clone())
    }

    /// Tolerant equality: suffixes equal, tags ignored
    pub fn matches(&self, other: &EntityId) -> bool {
        self.raw == other.raw
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = self.tag {
            f.write_str(tag.prefix())?;
        }
        f.write_str(&self.raw)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self::parse(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::parse(id)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged() {
        let id = EntityId::parse("p-42");
        assert_eq!(id.tag(), Some(IdTag::Piece));
        assert_eq!(id.raw(), "42");
        assert_eq!(id.to_string(), "p-42");
    }

    #[test]
    fn test_parse_untagged() {
        let id = EntityId::parse("42");
        assert_eq!(id.tag(), None);
        assert_eq!(id.raw(), "42");
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_only_one_tag_is_stripped() {
        let id = EntityId::parse("s-p-3");
        assert_eq!(id.tag(), Some(IdTag::Student));
        assert_eq!(id.raw(), "p-3");
    }

    #[test]
    fn test_equality_is_exact_but_matches_is_tolerant() {
        let tagged = EntityId::parse("p-5");
        let legacy = EntityId::parse("5");
        let student = EntityId::parse("s-5");

        assert_ne!(tagged, legacy);
        assert!(tagged.matches(&legacy));
        assert!(tagged.matches(&student));
        assert!(!tagged.matches(&EntityId::parse("p-6")));
    }

    #[test]
    fn test_with_tag_replaces_existing_tag() {
        let id = EntityId::parse("s-9").with_tag(IdTag::Piece);
        assert_eq!(id.to_string(), "p-9");
        assert!(id.has_tag(IdTag::Piece));
    }

    #[test]
    fn test_serde_as_plain_string() {
        let id = EntityId::parse("l-7");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"l-7\"");

        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tag(), Some(IdTag::Lesson));
    }
}
