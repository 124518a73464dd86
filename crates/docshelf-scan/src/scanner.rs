//! JWalk-based document scanner.

use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, UNIX_EPOCH};

use globset::GlobSet;
use jwalk::{Parallelism, WalkDir};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use docshelf_core::{
    DocumentRecord, DocumentSnapshot, IndexConfig, ScanError, ScanWarning, WarningKind,
};

use crate::progress::ScanProgress;

/// How often (in files) a progress update is broadcast.
const PROGRESS_EVERY: u64 = 1000;

/// Produces a fresh snapshot of everything below a root.
///
/// Implementations run synchronously and may block on filesystem I/O;
/// callers on an async runtime should move them to a blocking thread.
pub trait DocumentScanner: Send + Sync {
    /// Walk `root` and return the records found.
    ///
    /// Errors below the root are collected as warnings on the returned
    /// snapshot. Only a root that cannot be walked at all is an error.
    fn scan(&self, root: &Path) -> Result<DocumentSnapshot, ScanError>;
}

/// Parallel scanner using jwalk for traversal.
pub struct JwalkScanner {
    config: IndexConfig,
    ignore: Arc<GlobSet>,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl JwalkScanner {
    /// Create a scanner with default settings.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            config: IndexConfig::default(),
            ignore: Arc::new(GlobSet::empty()),
            progress_tx,
        }
    }

    /// Create a scanner using the walk settings of `config`.
    ///
    /// The config's root is not used; the root is passed to each scan.
    pub fn with_config(config: IndexConfig) -> Result<Self, ScanError> {
        let ignore = Arc::new(config.ignore_matcher()?);
        let (progress_tx, _) = broadcast::channel(100);
        Ok(Self {
            config,
            ignore,
            progress_tx,
        })
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Resolve and check the root before walking it.
    fn open_root(&self, root: &Path) -> Result<PathBuf, ScanError> {
        let root_path = root.canonicalize().map_err(|e| ScanError::root(root, e))?;
        let metadata = fs::metadata(&root_path).map_err(|e| ScanError::root(&root_path, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::not_a_directory(root_path));
        }
        // A directory we can stat but not list is as good as missing.
        fs::read_dir(&root_path).map_err(|e| ScanError::root(&root_path, e))?;
        Ok(root_path)
    }

    fn walker(&self, root_path: &Path) -> WalkDir {
        let parallelism = match self.config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            },
            n => Parallelism::RayonNewPool(n),
        };

        let ignore = Arc::clone(&self.ignore);
        WalkDir::new(root_path)
            .parallelism(parallelism)
            .skip_hidden(!self.config.include_hidden)
            .follow_links(self.config.follow_symlinks)
            .sort(true)
            .min_depth(1)
            .max_depth(
                self.config
                    .max_depth
                    .map(|d| d as usize)
                    .unwrap_or(usize::MAX),
            )
            .process_read_dir(move |_depth, _path, _state, children| {
                // Dropping an ignored directory here also prunes its subtree.
                children.retain(|child| match child {
                    Ok(entry) => !ignore.is_match(entry.file_name()),
                    Err(_) => true,
                });
            })
    }

    fn send_progress(&self, progress: &ScanProgress, start: Instant) {
        let mut progress = progress.clone();
        progress.elapsed = start.elapsed();
        let _ = self.progress_tx.send(progress);
    }
}

impl DocumentScanner for JwalkScanner {
    fn scan(&self, root: &Path) -> Result<DocumentSnapshot, ScanError> {
        let start = Instant::now();
        let root_path = self.open_root(root)?;

        let mut records = Vec::new();
        let mut warnings = Vec::new();
        let mut progress = ScanProgress::new();

        for entry_result in self.walker(&root_path) {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    skip(&mut warnings, walk_warning(path, &err, WarningKind::ReadError));
                    progress.warnings_count += 1;
                    continue;
                }
            };

            let path = entry.path();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                progress.dirs_walked += 1;
                // jwalk yields unreadable directories as entries, not errors.
                if let Some(err) = &entry.read_children_error {
                    skip(&mut warnings, walk_warning(&path, err, WarningKind::ReadError));
                    progress.warnings_count += 1;
                }
                continue;
            }

            let metadata = if file_type.is_symlink() {
                match symlink_target(&path) {
                    Ok(Some(m)) => m,
                    // Link to a directory; not descended, not a document.
                    Ok(None) => continue,
                    Err(warning) => {
                        skip(&mut warnings, warning);
                        progress.warnings_count += 1;
                        continue;
                    }
                }
            } else {
                match entry.metadata() {
                    Ok(m) => m,
                    Err(err) => {
                        skip(&mut warnings, walk_warning(&path, &err, WarningKind::MetadataError));
                        progress.warnings_count += 1;
                        continue;
                    }
                }
            };

            let size = metadata.len();
            let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
            records.push(DocumentRecord::new(&root_path, &path, size, modified));

            progress.files_indexed += 1;
            progress.bytes_indexed += size;
            if progress.files_indexed % PROGRESS_EVERY == 0 {
                progress.current_path = path;
                self.send_progress(&progress, start);
            }
        }

        progress.finished = true;
        self.send_progress(&progress, start);

        let scan_duration = start.elapsed();
        debug!(
            root = %root_path.display(),
            files = progress.files_indexed,
            dirs = progress.dirs_walked,
            skipped = warnings.len(),
            elapsed_ms = scan_duration.as_millis() as u64,
            "walk finished"
        );

        Ok(DocumentSnapshot::new(
            root_path,
            DocumentSnapshot::group(records),
            scan_duration,
            warnings,
        ))
    }
}

impl Default for JwalkScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Log a skipped entry and keep it on the snapshot.
fn skip(warnings: &mut Vec<ScanWarning>, warning: ScanWarning) {
    warn!(path = %warning.path.display(), kind = ?warning.kind, "skipping entry: {}", warning.message);
    warnings.push(warning);
}

fn walk_warning(path: impl Into<PathBuf>, err: &jwalk::Error, kind: WarningKind) -> ScanWarning {
    match err.io_error() {
        Some(io) => ScanWarning::from_io(path, io, kind),
        None => ScanWarning::new(path, err.to_string(), kind),
    }
}

/// Metadata of a symlink's target, `None` when it points at a directory.
fn symlink_target(path: &Path) -> Result<Option<Metadata>, ScanWarning> {
    match fs::metadata(path) {
        Ok(m) if m.is_dir() => Ok(None),
        Ok(m) => Ok(Some(m)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let target = fs::read_link(path)
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default();
            Err(ScanWarning::broken_symlink(path, &target))
        }
        Err(err) => Err(ScanWarning::from_io(path, &err, WarningKind::MetadataError)),
    }
}
