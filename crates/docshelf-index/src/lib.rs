//! The docshelf document index.
//!
//! [`DocumentIndex`] owns the current [`DocumentSnapshot`] and answers
//! identifier lookups against it while refreshes rebuild the next one in
//! the background. [`Refresher`] drives periodic refreshes on the tokio
//! runtime.
//!
//! # Consistency
//!
//! Snapshots are immutable and installed by swapping an `Arc`, so a search
//! always runs against exactly one complete snapshot. The directory walk
//! runs on a blocking thread without holding any lock readers need; only
//! the swap itself takes the write lock. Refreshes are serialized, and a
//! refresh requested while another is in flight is satisfied by that one.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docshelf_index::{DocumentIndex, Refresher};
//! use docshelf_scan::JwalkScanner;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let index = Arc::new(DocumentIndex::new(JwalkScanner::new()));
//! let refresher = Refresher::spawn(
//!     Arc::clone(&index),
//!     "/srv/docs".into(),
//!     std::time::Duration::from_secs(600),
//! );
//!
//! let result = index.search("report");
//! println!("{} matches", result.count);
//!
//! refresher.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod index;
mod refresher;

pub use index::{DocumentIndex, RefreshOutcome, RefreshState};
pub use refresher::Refresher;

pub use docshelf_core::{
    DocumentRecord, DocumentSnapshot, IndexError, IndexStats, ScanError, SearchResult,
};
