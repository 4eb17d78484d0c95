//! Identifier normalization and attachment catalog for a music-lesson studio.
//!
//! - [`ids`] tags, strips and compares entity identifiers (`s-1`, `p-42`)
//! - [`state`] keeps attachments and the entities they are linked to
//! - [`config`] and [`error`] are shared by the library and the CLI

pub mod config;
pub mod error;
pub mod ids;
pub mod state;

pub use config::CatalogConfig;
pub use error::{CatalogError, CatalogResult};
pub use ids::{EntityId, IdTag, IdentityMap};
pub use state::{AttachmentIndex, Library};
