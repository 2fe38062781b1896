//! Shared MIME-info database engine with async file lookup.
//!
//! This crate classifies filenames, byte buffers and files into MIME types
//! the way the freedesktop.org shared-mime-info database does:
//! - Weighted filename globs, longest literal first (`*.tar.bz2` over `*.bz2`)
//! - Byte-signature ("magic") rules with priorities
//! - A multi-parent type hierarchy with aliases, probed most specific first
//! - A combined name and content decision, with the name winning ties
//! - Readers for `mime-info` XML and `globs2` files
//!
//! File I/O is async, using tokio.
//!
//! ```
//! use tokio_mimedb::{GlobRule, MimeDatabase, TypeRecord};
//!
//! let db = MimeDatabase::new();
//! db.add_type(TypeRecord::new("application/octet-stream"));
//! db.add_type(TypeRecord::new("text/plain").with_glob(GlobRule::new("*.txt")));
//!
//! assert_eq!(db.mime_type_for_file_name("notes.TXT").name(), "text/plain");
//! assert_eq!(db.mime_type_for_file_name("mystery").name(), "application/octet-stream");
//! ```

pub mod error;
pub mod grammar;
pub mod glob;
pub mod magic;
pub mod mime_type;
mod hierarchy;
pub mod registry;
pub mod database;
pub mod file_context;
pub mod parser;
pub mod globs2;

// Re-export commonly used types
pub use error::{Error, Result};
pub use glob::{GlobMatch, GlobPatternIndex, GlobRule, DEFAULT_WEIGHT, MAX_WEIGHT};
pub use magic::{MagicRule, MagicRuleGroup, MAX_PRIORITY};
pub use mime_type::{TypeRecord, DEFAULT_TYPE};
pub use registry::MimeRegistry;
pub use database::{MatchMode, MimeDatabase, MIN_MATCH_WEIGHT};
pub use file_context::{FileMatchContext, MAX_DATA};
pub use parser::parse_mime_info;
pub use globs2::load_globs2;
