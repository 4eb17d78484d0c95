/// Identifier normalization
///
/// Records are addressed by type-tagged identifiers (`s-1`, `p-42`,
/// `sp-1-42`). Older data was created without tags, so two identifiers are
/// treated as the same record whenever their suffixes match once any
/// recognized tag is stripped.
///
/// This module provides:
/// - The tag set and typed identifiers (tag.rs, entity_id.rs)
/// - String helpers for call sites that hold plain strings (this file)
/// - Mapping of identity-provider user ids onto internal ids (identity.rs)

pub mod entity_id;
pub mod identity;
pub mod tag;

use std::fmt::Display;

pub use entity_id::EntityId;
pub use identity::IdentityMap;
pub use tag::IdTag;

/// Prefix `raw_id` with `tag` unless it already starts with it.
///
/// Integers and other `Display` values are rendered in decimal first.
pub fn apply_tag(tag: IdTag, raw_id: impl Display) -> String {
    let raw_id = raw_id.to_string();
    if raw_id.starts_with(tag.prefix()) {
        raw_id
    } else {
        format!("{}{}", tag.prefix(), raw_id)
    }
}

/// Remove the first recognized tag, or return the id unchanged
pub fn strip_tag(tagged_id: &str) -> &str {
    match IdTag::detect(tagged_id) {
        Some(tag) => &tagged_id[tag.prefix().len()..],
        None => tagged_id,
    }
}

/// Combine a student and a piece into a student-piece identifier.
///
/// Both inputs are stripped first so tagged and untagged forms give the
/// same result: `make_composite_id("s-1", "2") == "sp-1-2"`.
pub fn make_composite_id(student_id: impl Display, piece_id: impl Display) -> String {
    let student_id = student_id.to_string();
    let piece_id = piece_id.to_string();
    format!(
        "{}{}-{}",
        IdTag::StudentPiece.prefix(),
        strip_tag(&student_id),
        strip_tag(&piece_id)
    )
}

pub fn has_tag(id: &str, tag: IdTag) -> bool {
    id.starts_with(tag.prefix())
}

/// Name of the tag `id` carries (e.g. "STUDENT"), or `None` if untagged
pub fn identify_tag_type(id: &str) -> Option<&'static str> {
    IdTag::detect(id).map(IdTag::name)
}

/// Make `id` carry exactly `tag`, replacing any other recognized tag
pub fn coerce_tag(id: &str, tag: IdTag) -> String {
    apply_tag(tag, strip_tag(id))
}

/// Tolerant equality over tagged and untagged forms
pub fn ids_match(a: &str, b: &str) -> bool {
    strip_tag(a) == strip_tag(b)
}

pub fn student_id(raw_id: impl Display) -> String {
    apply_tag(IdTag::Student, raw_id)
}

pub fn piece_id(raw_id: impl Display) -> String {
    apply_tag(IdTag::Piece, raw_id)
}

pub fn lesson_id(raw_id: impl Display) -> String {
    apply_tag(IdTag::Lesson, raw_id)
}

pub fn student_piece_id(student_id: impl Display, piece_id: impl Display) -> String {
    make_composite_id(student_id, piece_id)
}
