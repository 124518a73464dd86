//! Snapshot ownership, refresh serialization and queries.

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use docshelf_core::{
    DocumentRecord, DocumentSnapshot, IndexConfig, IndexError, IndexStats, ScanError,
    SearchResult,
};
use docshelf_scan::{DocumentScanner, JwalkScanner};

/// Phase of the refresh state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    /// No refresh running.
    Idle,
    /// Walking the filesystem.
    Scanning,
    /// Swapping in the new snapshot.
    Installing,
}

impl RefreshState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Scanning,
            2 => Self::Installing,
            _ => Self::Idle,
        }
    }
}

/// What a call to [`DocumentIndex::refresh`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// This call walked the tree and installed a new snapshot.
    Scanned {
        generation: u64,
        unique_ids: usize,
        total_files: usize,
        warnings: usize,
        scan_duration: Duration,
    },
    /// Another refresh finished while this one waited; no walk was done.
    Coalesced { generation: u64 },
}

impl RefreshOutcome {
    /// Generation of the snapshot installed when the call returned.
    pub fn generation(&self) -> u64 {
        match self {
            Self::Scanned { generation, .. } | Self::Coalesced { generation } => *generation,
        }
    }
}

/// In-memory index from file names to document records.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct DocumentIndex {
    scanner: Arc<dyn DocumentScanner>,
    current: RwLock<Arc<DocumentSnapshot>>,
    refresh_lock: Mutex<()>,
    generation: AtomicU64,
    state: AtomicU8,
}

impl DocumentIndex {
    /// Create an empty index that refreshes with `scanner`.
    pub fn new(scanner: impl DocumentScanner + 'static) -> Self {
        Self::with_scanner(Arc::new(scanner))
    }

    /// Create an empty index sharing an existing scanner.
    pub fn with_scanner(scanner: Arc<dyn DocumentScanner>) -> Self {
        Self {
            scanner,
            current: RwLock::new(Arc::new(DocumentSnapshot::empty())),
            refresh_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            state: AtomicU8::new(RefreshState::Idle as u8),
        }
    }

    /// Create an empty index backed by a [`JwalkScanner`] built from `config`.
    pub fn from_config(config: &IndexConfig) -> Result<Self, ScanError> {
        Ok(Self::new(JwalkScanner::with_config(config.clone())?))
    }

    /// The currently installed snapshot.
    ///
    /// The returned snapshot stays valid after later refreshes replace it.
    pub fn snapshot(&self) -> Arc<DocumentSnapshot> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    /// Prefix search over identifiers. See [`DocumentSnapshot::search`].
    pub fn search(&self, query: &str) -> SearchResult {
        self.snapshot().search(query)
    }

    /// Records stored under exactly `id`.
    pub fn get(&self, id: &str) -> Vec<DocumentRecord> {
        self.snapshot()
            .get(id)
            .map(<[DocumentRecord]>::to_vec)
            .unwrap_or_default()
    }

    /// Statistics about the installed snapshot.
    pub fn stats(&self) -> IndexStats {
        self.snapshot().stats_at(Utc::now())
    }

    /// Current phase of the refresh state machine.
    pub fn refresh_state(&self) -> RefreshState {
        RefreshState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Generation of the installed snapshot (0 before the first scan).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Scan `root` and install the result.
    ///
    /// Only one refresh runs at a time. A caller that had to wait for
    /// another refresh to finish gets [`RefreshOutcome::Coalesced`] if that
    /// refresh installed a snapshot. If the root cannot be walked the
    /// previous snapshot stays installed and the error is returned.
    pub async fn refresh(&self, root: impl AsRef<Path>) -> Result<RefreshOutcome, IndexError> {
        let root = root.as_ref().to_path_buf();
        let seen = self.generation.load(Ordering::Acquire);

        let _serial = self.refresh_lock.lock().await;

        let installed = self.generation.load(Ordering::Acquire);
        if installed != seen {
            debug!(generation = installed, "refresh satisfied by in-flight scan");
            return Ok(RefreshOutcome::Coalesced {
                generation: installed,
            });
        }

        let phase = PhaseGuard::enter(&self.state, RefreshState::Scanning);

        let scanner = Arc::clone(&self.scanner);
        let scan_root = root.clone();
        let result = tokio::task::spawn_blocking(move || scanner.scan(&scan_root))
            .await
            .unwrap_or_else(|e| {
                Err(ScanError::Interrupted {
                    message: e.to_string(),
                })
            });

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!(
                    root = %root.display(),
                    error = %err,
                    "document scan failed, keeping previous snapshot"
                );
                return Err(err.into());
            }
        };

        phase.set(RefreshState::Installing);
        let generation = installed + 1;
        let snapshot = Arc::new(snapshot.with_generation(generation));
        let unique_ids = snapshot.unique_ids();
        let total_files = snapshot.total_files();
        let warnings = snapshot.warnings().len();
        let scan_duration = snapshot.scan_duration();

        let previous = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, snapshot)
        };
        self.generation.store(generation, Ordering::Release);
        drop(phase);
        drop(previous);

        info!(
            root = %root.display(),
            generation,
            unique_ids,
            total_files,
            warnings,
            elapsed_ms = scan_duration.as_millis() as u64,
            "document index refreshed"
        );

        Ok(RefreshOutcome::Scanned {
            generation,
            unique_ids,
            total_files,
            warnings,
            scan_duration,
        })
    }

    /// Refresh on request from an operator; waits for completion.
    pub async fn force_refresh(&self, root: impl AsRef<Path>) -> Result<RefreshOutcome, IndexError> {
        info!(root = %root.as_ref().display(), "forcing document index refresh");
        self.refresh(root).await
    }
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("generation", &self.generation())
            .field("state", &self.refresh_state())
            .finish_non_exhaustive()
    }
}

/// Keeps the state machine accurate even if a refresh future is dropped
/// mid-scan.
struct PhaseGuard<'a> {
    state: &'a AtomicU8,
}

impl<'a> PhaseGuard<'a> {
    fn enter(state: &'a AtomicU8, phase: RefreshState) -> Self {
        state.store(phase as u8, Ordering::Release);
        Self { state }
    }

    fn set(&self, phase: RefreshState) {
        self.state.store(phase as u8, Ordering::Release);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.state.store(RefreshState::Idle as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir_all(root.join("a")).unwrap();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::create_dir_all(root.join("c")).unwrap();
        fs::write(root.join("a/report.txt"), "first").unwrap();
        fs::write(root.join("b/report.txt"), "second").unwrap();
        fs::write(root.join("c/notes.md"), "notes").unwrap();

        temp
    }

    fn record_set(index: &DocumentIndex) -> HashSet<(PathBuf, u64)> {
        index
            .snapshot()
            .groups()
            .flat_map(|(_, records)| records.iter().map(|r| (r.path().to_path_buf(), r.size())))
            .collect()
    }

    #[tokio::test]
    async fn test_new_index_is_empty() {
        let index = DocumentIndex::new(JwalkScanner::new());
        let stats = index.stats();

        assert_eq!(stats.unique_ids, 0);
        assert_eq!(stats.total_files, 0);
        assert!(stats.last_scan.is_none());
        assert_eq!(index.search("anything").count, 0);
        assert_eq!(index.refresh_state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_report_scenario() {
        let temp = create_test_tree();
        let index = DocumentIndex::new(JwalkScanner::new());
        index.refresh(temp.path()).await.unwrap();

        let result = index.search("report");
        assert_eq!(result.count, 2);
        let paths: HashSet<_> = result.results.iter().map(|r| r.path().to_path_buf()).collect();
        assert!(paths.contains(Path::new("a/report.txt")));
        assert!(paths.contains(Path::new("b/report.txt")));
        assert!(result.results.iter().all(|r| r.id() == "report.txt"));

        assert_eq!(index.search("notes").count, 1);
        assert_eq!(index.search("zzz").count, 0);
        assert_eq!(index.get("report.txt").len(), 2);
        assert!(index.get("report").is_empty());
    }

    #[tokio::test]
    async fn test_blank_queries_return_nothing() {
        let temp = create_test_tree();
        let index = DocumentIndex::new(JwalkScanner::new());
        index.refresh(temp.path()).await.unwrap();

        for query in ["", "   ", "\t", "\n \n"] {
            assert_eq!(index.search(query).count, 0, "query {query:?}");
        }
    }

    #[tokio::test]
    async fn test_refresh_updates_last_scan() {
        let temp = create_test_tree();
        let index = DocumentIndex::new(JwalkScanner::new());

        let before = Utc::now();
        let outcome = index.refresh(temp.path()).await.unwrap();
        let stats = index.stats();

        assert!(matches!(outcome, RefreshOutcome::Scanned { generation: 1, total_files: 3, .. }));
        assert!(stats.last_scan.unwrap() >= before);
        assert!(stats.index_age.unwrap() < Duration::from_secs(5));
        assert_eq!(stats.unique_ids, 2);
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.generation, 1);
        assert_eq!(index.refresh_state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let temp = create_test_tree();
        let index = DocumentIndex::new(JwalkScanner::new());

        index.refresh(temp.path()).await.unwrap();
        let first = record_set(&index);
        index.refresh(temp.path()).await.unwrap();
        let second = record_set(&index);

        assert_eq!(first, second);
        assert_eq!(index.generation(), 2);
    }

    #[tokio::test]
    async fn test_refresh_picks_up_changes() {
        let temp = create_test_tree();
        let index = DocumentIndex::new(JwalkScanner::new());
        index.refresh(temp.path()).await.unwrap();

        fs::write(temp.path().join("c/report.txt"), "third").unwrap();
        fs::remove_file(temp.path().join("c/notes.md")).unwrap();
        index.force_refresh(temp.path()).await.unwrap();

        assert_eq!(index.search("report").count, 3);
        assert_eq!(index.search("notes").count, 0);
    }

    #[tokio::test]
    async fn test_root_failure_keeps_previous_snapshot() {
        let temp = create_test_tree();
        let index = DocumentIndex::new(JwalkScanner::new());
        index.refresh(temp.path()).await.unwrap();
        let last_scan = index.stats().last_scan;

        let err = index
            .refresh(temp.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Scan(ScanError::RootInaccessible { .. })));

        assert_eq!(index.search("report").count, 2);
        assert_eq!(index.stats().last_scan, last_scan);
        assert_eq!(index.generation(), 1);
        assert_eq!(index.refresh_state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_old_snapshot_outlives_refresh() {
        let temp = create_test_tree();
        let index = DocumentIndex::new(JwalkScanner::new());
        index.refresh(temp.path()).await.unwrap();

        let held = index.snapshot();
        fs::write(temp.path().join("a/extra.txt"), "x").unwrap();
        index.refresh(temp.path()).await.unwrap();

        assert_eq!(held.total_files(), 3);
        assert_eq!(held.search("report").count, 2);
        assert_eq!(index.snapshot().total_files(), 4);
    }

    #[tokio::test]
    async fn test_from_config_applies_ignore_patterns() {
        let temp = create_test_tree();
        let config = IndexConfig::builder()
            .root(temp.path())
            .ignore_patterns(vec!["*.md".to_string()])
            .build()
            .unwrap();

        let index = DocumentIndex::from_config(&config).unwrap();
        index.refresh(&config.root).await.unwrap();
        assert_eq!(index.search("notes").count, 0);
        assert_eq!(index.search("report").count, 2);
    }
}
