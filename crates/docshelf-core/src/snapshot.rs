//! Immutable index snapshots, query results and statistics.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScanWarning;
use crate::record::{DocumentId, DocumentRecord};

/// One complete result of a scan.
///
/// A snapshot is never mutated after it has been installed in an index.
/// Records sharing an identifier are kept in walk order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    documents: HashMap<DocumentId, Vec<DocumentRecord>>,
    root: PathBuf,
    generation: u64,
    scanned_at: Option<DateTime<Utc>>,
    scan_duration: Duration,
    warnings: Vec<ScanWarning>,
}

impl DocumentSnapshot {
    /// The snapshot an index starts with: no records, never scanned.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from a finished scan, stamped with the current time.
    pub fn new(
        root: impl Into<PathBuf>,
        documents: HashMap<DocumentId, Vec<DocumentRecord>>,
        scan_duration: Duration,
        warnings: Vec<ScanWarning>,
    ) -> Self {
        Self {
            documents,
            root: root.into(),
            generation: 0,
            scanned_at: Some(Utc::now()),
            scan_duration,
            warnings,
        }
    }

    /// Group a flat list of records by identifier, preserving order.
    pub fn group(records: impl IntoIterator<Item = DocumentRecord>) -> HashMap<DocumentId, Vec<DocumentRecord>> {
        let mut documents: HashMap<DocumentId, Vec<DocumentRecord>> = HashMap::new();
        for record in records {
            documents
                .entry(record.id().into())
                .or_default()
                .push(record);
        }
        documents
    }

    /// Set the generation number this snapshot is installed under.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// All records matching `query` as a prefix of their identifier.
    ///
    /// The query is trimmed first; a blank query matches nothing.
    /// Matching is case-sensitive and byte-exact. Result order is
    /// unspecified.
    pub fn search(&self, query: &str) -> SearchResult {
        let query = query.trim();
        if query.is_empty() {
            return SearchResult::new(query, Vec::new());
        }

        let results = self
            .documents
            .iter()
            .filter(|(id, _)| id.starts_with(query))
            .flat_map(|(_, records)| records.iter().cloned())
            .collect();

        SearchResult::new(query, results)
    }

    /// Records stored under exactly this identifier.
    pub fn get(&self, id: &str) -> Option<&[DocumentRecord]> {
        self.documents.get(id).map(Vec::as_slice)
    }

    /// Iterate over identifier groups.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[DocumentRecord])> {
        self.documents
            .iter()
            .map(|(id, records)| (id.as_str(), records.as_slice()))
    }

    /// Number of distinct identifiers.
    pub fn unique_ids(&self) -> usize {
        self.documents.len()
    }

    /// Total number of records.
    pub fn total_files(&self) -> usize {
        self.documents.values().map(Vec::len).sum()
    }

    /// Check if the snapshot holds no records.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Root the snapshot was scanned from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Generation number (0 for the initial empty snapshot).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the scan completed, if one ever did.
    pub fn scanned_at(&self) -> Option<DateTime<Utc>> {
        self.scanned_at
    }

    /// How long the walk took.
    pub fn scan_duration(&self) -> Duration {
        self.scan_duration
    }

    /// Warnings collected during the walk.
    pub fn warnings(&self) -> &[ScanWarning] {
        &self.warnings
    }

    /// Summary statistics as of `now`.
    pub fn stats_at(&self, now: DateTime<Utc>) -> IndexStats {
        IndexStats {
            unique_ids: self.unique_ids(),
            total_files: self.total_files(),
            last_scan: self.scanned_at,
            index_age: self
                .scanned_at
                .map(|at| (now - at).to_std().unwrap_or(Duration::ZERO)),
            generation: self.generation,
            scan_duration: self.scan_duration,
            warnings: self.warnings.len(),
        }
    }
}

/// Result of a prefix search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The (trimmed) query that was run.
    pub query: String,
    /// Matching records, in no particular order.
    pub results: Vec<DocumentRecord>,
    /// Number of matching records.
    pub count: usize,
    /// When the search was executed.
    pub search_time: DateTime<Utc>,
}

impl SearchResult {
    /// Create a result, stamping the current time.
    pub fn new(query: impl Into<String>, results: Vec<DocumentRecord>) -> Self {
        Self {
            query: query.into(),
            count: results.len(),
            results,
            search_time: Utc::now(),
        }
    }

    /// Check if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Statistics about the installed snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of distinct identifiers.
    pub unique_ids: usize,
    /// Total number of indexed files.
    pub total_files: usize,
    /// Completion time of the last successful scan.
    pub last_scan: Option<DateTime<Utc>>,
    /// Time since the last successful scan.
    pub index_age: Option<Duration>,
    /// Generation of the installed snapshot.
    pub generation: u64,
    /// Duration of the last successful scan.
    pub scan_duration: Duration,
    /// Number of entries skipped during the last successful scan.
    pub warnings: usize,
}
