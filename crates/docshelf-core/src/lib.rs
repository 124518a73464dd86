//! Core types for docshelf.
//!
//! This crate provides the data structures shared by the scanner, the
//! document index and the HTTP layer: document records, immutable index
//! snapshots, query results and configuration.

mod config;
mod error;
mod record;
mod snapshot;

pub use config::{IndexConfig, IndexConfigBuilder};
pub use error::{IndexError, ScanError, ScanWarning, WarningKind};
pub use record::{DocumentId, DocumentRecord};
pub use snapshot::{DocumentSnapshot, IndexStats, SearchResult};
