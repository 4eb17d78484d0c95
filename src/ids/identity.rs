/// Mapping from identity-provider user ids to internal record ids
///
/// The identity provider hands out a stable external identifier per user.
/// Records inside the catalog are keyed by internal tagged ids instead, so
/// the surrounding application keeps one `IdentityMap` per session.

use std::collections::HashMap;
use tracing::debug;

use super::entity_id::EntityId;

#[derive(Debug, Default, Clone)]
pub struct IdentityMap {
    by_external: HashMap<String, EntityId>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `external -> internal`, returning the previous internal id
    pub fn link(
        &mut self,
        external: impl Into<String>,
        internal: impl Into<EntityId>,
    ) -> Option<EntityId> {
        let external = external.into();
        let internal = internal.into();
        debug!(external = %external, internal = %internal, "linking external identity");
        self.by_external.insert(external, internal)
    }

    pub fn resolve(&self, external: &str) -> Option<&EntityId> {
        self.by_external.get(external)
    }

    pub fn unlink(&mut self, external: &str) -> bool {
        self.by_external.remove(external).is_some()
    }

    /// Reverse lookup, tolerant of tagged/untagged internal ids
    pub fn external_for(&self, internal: &str) -> Option<&str> {
        let internal = EntityId::parse(internal);
        self.by_external
            .iter()
            .find(|(_, id)| id.matches(&internal))
            .map(|(external, _)| external.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_external.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdTag;

    #[test]
    fn test_link_and_resolve() {
        let mut map = IdentityMap::new();
        assert!(map.link("auth0|abc", "s-1").is_none());

        let id = map.resolve("auth0|abc").unwrap();
        assert!(id.has_tag(IdTag::Student));
        assert_eq!(id.raw(), "1");
        assert!(map.resolve("auth0|missing").is_none());
    }

    #[test]
    fn test_relink_returns_previous() {
        let mut map = IdentityMap::new();
        map.link("user-1", "s-1");
        let previous = map.link("user-1", "s-2").unwrap();
        assert_eq!(previous.to_string(), "s-1");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_reverse_lookup_is_tolerant() {
        let mut map = IdentityMap::new();
        map.link("user-1", "s-7");
        assert_eq!(map.external_for("7"), Some("user-1"));
        assert_eq!(map.external_for("s-7"), Some("user-1"));
        assert_eq!(map.external_for("8"), None);
    }

    #[test]
    fn test_unlink() {
        let mut map = IdentityMap::new();
        map.link("user-1", "s-7");
        assert!(map.unlink("user-1"));
        assert!(!map.unlink("user-1"));
        assert!(map.is_empty());
    }
}
