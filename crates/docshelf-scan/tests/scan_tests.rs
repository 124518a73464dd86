use docshelf_core::IndexConfig;
use docshelf_scan::{DocumentScanner, JwalkScanner};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn create_shelf() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir_all(root.join("2023/q4")).unwrap();
    fs::create_dir_all(root.join("2024")).unwrap();
    fs::create_dir_all(root.join("drafts")).unwrap();
    fs::write(root.join("2023/q4/report.pdf"), "old").unwrap();
    fs::write(root.join("2024/report.pdf"), "new report").unwrap();
    fs::write(root.join("2024/summary.txt"), "summary").unwrap();
    fs::write(root.join("drafts/report.pdf.swp"), "swap").unwrap();
    fs::write(root.join("index.md"), "# shelf").unwrap();

    temp
}

#[test]
fn test_same_name_in_different_directories_is_grouped() {
    let temp = create_shelf();
    let snapshot = JwalkScanner::new().scan(temp.path()).unwrap();

    assert_eq!(snapshot.total_files(), 5);
    assert_eq!(snapshot.unique_ids(), 4);

    let reports = snapshot.get("report.pdf").unwrap();
    assert_eq!(reports.len(), 2);
    let mut paths: Vec<_> = reports.iter().map(|r| r.url_path()).collect();
    paths.sort();
    assert_eq!(paths, ["2023/q4/report.pdf", "2024/report.pdf"]);
    assert!(reports.iter().all(|r| r.full_path().starts_with(snapshot.root())));
}

#[test]
fn test_prefix_search_over_scan() {
    let temp = create_shelf();
    let snapshot = JwalkScanner::new().scan(temp.path()).unwrap();

    assert_eq!(snapshot.search("report").count, 3);
    assert_eq!(snapshot.search("report.pdf").count, 3);
    assert_eq!(snapshot.search("Report").count, 0);
    assert_eq!(snapshot.search("sum").count, 1);
    assert!(snapshot.search("2024").is_empty());
}

#[test]
fn test_ignore_patterns_from_config() {
    let temp = create_shelf();
    let config = IndexConfig::builder()
        .root(temp.path())
        .ignore_patterns(vec!["*.swp".to_string(), "2023".to_string()])
        .build()
        .unwrap();
    let snapshot = JwalkScanner::with_config(config).unwrap().scan(temp.path()).unwrap();

    assert_eq!(snapshot.total_files(), 3);
    assert_eq!(snapshot.get("report.pdf").map(|r| r.len()), Some(1));
    assert!(snapshot.get("report.pdf.swp").is_none());
}

#[test]
fn test_record_metadata_matches_file() {
    let temp = create_shelf();
    let snapshot = JwalkScanner::new().scan(temp.path()).unwrap();

    let summary = &snapshot.get("summary.txt").unwrap()[0];
    assert_eq!(summary.size(), 7);
    assert_eq!(summary.name(), "summary.txt");
    assert_eq!(summary.path(), Path::new("2024/summary.txt"));

    let on_disk = fs::metadata(summary.full_path()).unwrap().modified().unwrap();
    let on_disk = chrono::DateTime::<chrono::Utc>::from(on_disk);
    assert_eq!(summary.modified().timestamp(), on_disk.timestamp());
}

#[test]
fn test_rescan_reflects_changes() {
    let temp = create_shelf();
    let scanner = JwalkScanner::new();

    let before = scanner.scan(temp.path()).unwrap();
    fs::remove_file(temp.path().join("index.md")).unwrap();
    fs::write(temp.path().join("2024/index.md"), "moved").unwrap();
    let after = scanner.scan(temp.path()).unwrap();

    assert_eq!(before.get("index.md").unwrap()[0].url_path(), "index.md");
    assert_eq!(after.get("index.md").unwrap()[0].url_path(), "2024/index.md");
    assert_eq!(before.total_files(), after.total_files());
}
