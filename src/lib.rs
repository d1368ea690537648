//! voxdeck - multilingual voice command dispatch for presentations
//!
//! Transcripts are classified by language, matched against a catalog of
//! presentation commands (exact patterns first, fuzzy anchors second),
//! paced through a bounded input buffer and handed to an executor. Every
//! accepted decision can be logged for later training exports.

pub mod buffer;
pub mod catalog;
pub mod config;
pub mod detect;
pub mod error;
pub mod executor;
pub mod fuzzy;
pub mod language;
pub mod logger;
pub mod matcher;
pub mod session;
pub mod speech;
pub mod state;
pub mod stats;

pub use catalog::{Catalog, CommandId};
pub use config::Config;
pub use error::{Error, Result};
pub use language::Language;
pub use matcher::{CommandMatcher, MatchMethod, MatchResult};
pub use session::{DispatchEvent, Session, SessionReport};
