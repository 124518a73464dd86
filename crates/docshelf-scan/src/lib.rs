//! Filesystem scanning for docshelf.
//!
//! This crate walks a directory tree and turns every non-directory entry
//! into a [`DocumentRecord`], grouped by identifier into a
//! [`DocumentSnapshot`] ready to be installed in an index.
//!
//! # Overview
//!
//! - **Parallel traversal** via jwalk
//! - **Per-entry error containment**: unreadable entries become
//!   [`ScanWarning`]s and the walk continues
//! - **Progress updates** via broadcast channels
//! - **Configurable** depth limits, hidden files, ignore patterns
//!
//! # Example
//!
//! ```rust,no_run
//! use docshelf_scan::{DocumentScanner, JwalkScanner};
//!
//! let scanner = JwalkScanner::new();
//! let snapshot = scanner.scan("/srv/docs".as_ref()).unwrap();
//!
//! println!("{} files under {} names", snapshot.total_files(), snapshot.unique_ids());
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use docshelf_scan::JwalkScanner;
//!
//! let scanner = JwalkScanner::new();
//! let mut progress_rx = scanner.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("Indexed {} files", progress.files_indexed);
//!     }
//! });
//! ```

mod progress;
mod scanner;

pub use progress::ScanProgress;
pub use scanner::{DocumentScanner, JwalkScanner};

// Re-export core types for convenience
pub use docshelf_core::{
    DocumentRecord, DocumentSnapshot, IndexConfig, ScanError, ScanWarning, WarningKind,
};
