/// Entity identifier tags
///
/// A tag is the short prefix in front of an identifier that says what kind
/// of record it points at (`s-1` is a student, `p-42` a piece).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every recognized identifier tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdTag {
    Student,
    Piece,
    StudentPiece,
    Lesson,
    File,
    Message,
    Link,
}

impl IdTag {
    /// All tags in the fixed order used when stripping or identifying.
    /// The first tag whose prefix matches wins.
    pub const ALL: [IdTag; 7] = [
        IdTag::Student,
        IdTag::Piece,
        IdTag::StudentPiece,
        IdTag::Lesson,
        IdTag::File,
        IdTag::Message,
        IdTag::Link,
    ];

    /// The literal prefix written in front of the raw identifier
    pub const fn prefix(self) -> &'static str {
        match self {
            IdTag::Student => "s-",
            IdTag::Piece => "p-",
            IdTag::StudentPiece => "sp-",
            IdTag::Lesson => "l-",
            IdTag::File => "file-",
            IdTag::Message => "m-",
            IdTag::Link => "link-",
        }
    }

    /// Human-readable tag name (e.g. "STUDENT")
    pub const fn name(self) -> &'static str {
        match self {
            IdTag::Student => "STUDENT",
            IdTag::Piece => "PIECE",
            IdTag::StudentPiece => "STUDENT_PIECE",
            IdTag::Lesson => "LESSON",
            IdTag::File => "FILE",
            IdTag::Message => "MESSAGE",
            IdTag::Link => "LINK",
        }
    }

    /// Look up a tag by its human-readable name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.name() == name)
    }

    /// Find the tag an identifier starts with, if any
    pub fn detect(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| id.starts_with(tag.prefix()))
    }
}

impl fmt::Display for IdTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
