use docshelf_core::{DocumentRecord, DocumentSnapshot, ScanError};
use docshelf_index::{DocumentIndex, RefreshOutcome, Refresher};
use docshelf_scan::DocumentScanner;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

/// Scanner that records overlapping calls and tags every record of a scan
/// with the scan's sequence number (stored as the record size).
struct InstrumentedScanner {
    active: AtomicBool,
    overlaps: AtomicUsize,
    scans: AtomicUsize,
    delay: Duration,
    group_size: usize,
}

impl InstrumentedScanner {
    fn new(delay: Duration) -> Self {
        Self {
            active: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
            scans: AtomicUsize::new(0),
            delay,
            group_size: 3,
        }
    }
}

impl DocumentScanner for InstrumentedScanner {
    fn scan(&self, root: &Path) -> Result<DocumentSnapshot, ScanError> {
        if self.active.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::sleep(self.delay);
        let tag = self.scans.fetch_add(1, Ordering::SeqCst) as u64 + 1;

        let records = (0..self.group_size).map(|i| {
            DocumentRecord::new(
                root,
                root.join(format!("dir{i}")).join("doc.txt"),
                tag,
                SystemTime::now(),
            )
        });
        let snapshot = DocumentSnapshot::new(
            root,
            DocumentSnapshot::group(records),
            self.delay,
            Vec::new(),
        );

        self.active.store(false, Ordering::SeqCst);
        Ok(snapshot)
    }
}

fn root() -> PathBuf {
    PathBuf::from("/virtual/root")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_refreshes_never_walk_concurrently() {
    let scanner = Arc::new(InstrumentedScanner::new(Duration::from_millis(30)));
    let index = Arc::new(DocumentIndex::with_scanner(Arc::clone(&scanner) as Arc<dyn DocumentScanner>));

    let mut tasks = Vec::new();
    for round in 0..4 {
        for _ in 0..4 {
            let index = Arc::clone(&index);
            tasks.push(tokio::spawn(async move { index.refresh(root()).await }));
        }
        if round % 2 == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(scanner.overlaps.load(Ordering::SeqCst), 0);
    assert!(scanner.scans.load(Ordering::SeqCst) >= 1);
    assert_eq!(index.generation(), scanner.scans.load(Ordering::SeqCst) as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_waiting_refreshes_are_coalesced() {
    let scanner = Arc::new(InstrumentedScanner::new(Duration::from_millis(200)));
    let index = Arc::new(DocumentIndex::with_scanner(Arc::clone(&scanner) as Arc<dyn DocumentScanner>));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let index = Arc::clone(&index);
            tokio::spawn(async move { index.refresh(root()).await })
        })
        .collect();

    let mut scanned = 0;
    let mut coalesced = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            RefreshOutcome::Scanned { .. } => scanned += 1,
            RefreshOutcome::Coalesced { generation } => {
                assert!(generation >= 1);
                coalesced += 1;
            }
        }
    }

    assert_eq!(scanned + coalesced, 8);
    assert!(scanned >= 1);
    assert!(coalesced >= 1);
    assert_eq!(scanned, scanner.scans.load(Ordering::SeqCst));
    assert_eq!(scanner.overlaps.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_searches_never_see_torn_snapshot() {
    let scanner = Arc::new(InstrumentedScanner::new(Duration::from_millis(5)));
    let index = Arc::new(DocumentIndex::with_scanner(Arc::clone(&scanner) as Arc<dyn DocumentScanner>));
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let index = Arc::clone(&index);
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                let mut observed = 0usize;
                while !done.load(Ordering::SeqCst) {
                    let result = index.search("doc");
                    // Either the initial empty snapshot or one complete scan.
                    assert!(result.count == 0 || result.count == 3, "count {}", result.count);
                    if let Some(first) = result.results.first() {
                        let tag = first.size();
                        assert!(result.results.iter().all(|r| r.size() == tag));
                    }
                    observed += 1;
                    tokio::task::yield_now().await;
                }
                observed
            })
        })
        .collect();

    for _ in 0..20 {
        index.refresh(root()).await.unwrap();
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_search_after_refresh_sees_its_results() {
    let scanner = Arc::new(InstrumentedScanner::new(Duration::from_millis(1)));
    let index = DocumentIndex::with_scanner(Arc::clone(&scanner) as Arc<dyn DocumentScanner>);

    for _ in 0..5 {
        let outcome = index.refresh(root()).await.unwrap();
        let result = index.search("doc.txt");

        assert_eq!(result.count, 3);
        assert!(result.results.iter().all(|r| r.size() >= outcome.generation()));
        assert!(index.stats().generation >= outcome.generation());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_refresher_runs_periodically_until_shutdown() {
    let scanner = Arc::new(InstrumentedScanner::new(Duration::ZERO));
    let index = Arc::new(DocumentIndex::with_scanner(Arc::clone(&scanner) as Arc<dyn DocumentScanner>));

    let refresher = Refresher::spawn(Arc::clone(&index), root(), Duration::from_millis(50));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while scanner.scans.load(Ordering::SeqCst) < 3 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(scanner.scans.load(Ordering::SeqCst) >= 3);

    refresher.shutdown().await;
    let after_shutdown = scanner.scans.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(scanner.scans.load(Ordering::SeqCst), after_shutdown);
    assert_eq!(index.search("doc").count, 3);
}
