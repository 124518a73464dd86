//! Scan progress reporting.

use std::path::PathBuf;
use std::time::Duration;

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Number of files recorded so far.
    pub files_indexed: u64,
    /// Number of directories walked so far.
    pub dirs_walked: u64,
    /// Total bytes of the recorded files.
    pub bytes_indexed: u64,
    /// Last path visited.
    pub current_path: PathBuf,
    /// Number of entries skipped with a warning.
    pub warnings_count: u64,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
    /// Set on the final update of a walk.
    pub finished: bool,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            files_indexed: 0,
            dirs_walked: 0,
            bytes_indexed: 0,
            current_path: PathBuf::new(),
            warnings_count: 0,
            elapsed: Duration::ZERO,
            finished: false,
        }
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_indexed as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Get total entries visited (files + dirs + skipped).
    pub fn total_items(&self) -> u64 {
        self.files_indexed + self.dirs_walked + self.warnings_count
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}
