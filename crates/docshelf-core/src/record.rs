//! Document record types.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Lookup key of a document: its base file name, exactly as stored.
///
/// Not unique across a tree; the same name may appear in several
/// directories.
pub type DocumentId = CompactString;

/// A single indexed file.
///
/// Records are immutable once built; a rescan produces new records rather
/// than updating existing ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRecord {
    id: DocumentId,
    path: PathBuf,
    name: CompactString,
    size: u64,
    #[serde(rename = "mod_time")]
    modified: DateTime<Utc>,
    full_path: PathBuf,
}

impl DocumentRecord {
    /// Build a record for `full_path`, found under `root`.
    ///
    /// The identifier and display name are the final path component. The
    /// relative path is computed component-wise against `root`; a path that
    /// is not below `root` keeps its full form.
    pub fn new(
        root: &Path,
        full_path: impl Into<PathBuf>,
        size: u64,
        modified: SystemTime,
    ) -> Self {
        let full_path = full_path.into();
        let name: CompactString = full_path
            .file_name()
            .map(|n| CompactString::new(n.to_string_lossy()))
            .unwrap_or_default();
        let path = full_path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| full_path.clone());

        Self {
            id: name.clone(),
            path,
            name,
            size,
            modified: DateTime::<Utc>::from(modified),
            full_path,
        }
    }

    /// Lookup identifier (the base file name).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Path relative to the index root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Last modification time.
    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// Absolute path used for serving the file.
    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    /// Relative path rendered with `/` separators, for URLs.
    pub fn url_path(&self) -> String {
        self.path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}
