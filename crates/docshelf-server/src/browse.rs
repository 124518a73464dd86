//! Directory listings and file serving.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::AppState;
use crate::error::ServeError;

/// Extensions a browser can display inline.
const VIEWABLE_EXTENSIONS: &[&str] = &[".pdf", ".txt", ".md", ".html", ".htm"];

/// One entry of a directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryInfo {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    /// Lowercased extension including the dot; empty for directories.
    pub extension: String,
    /// Path relative to the served root, `/`-separated.
    pub relative_path: String,
    pub can_view: bool,
}

/// A breadcrumb link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crumb {
    pub name: String,
    pub path: String,
}

/// Contents of one directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryListing {
    /// Relative path of the directory, `"Root"` for the served root.
    pub path: String,
    pub files: Vec<EntryInfo>,
    pub directories: Vec<EntryInfo>,
    pub total_files: usize,
    pub total_dirs: usize,
    pub scan_time: DateTime<Utc>,
    pub breadcrumb: Vec<Crumb>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FileParams {
    #[serde(default)]
    download: bool,
}

pub(crate) async fn browse_root(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FileParams>,
) -> Result<Response, ServeError> {
    respond(&state, "", params).await
}

pub(crate) async fn browse(
    State(state): State<Arc<AppState>>,
    UrlPath(requested): UrlPath<String>,
    Query(params): Query<FileParams>,
) -> Result<Response, ServeError> {
    respond(&state, &requested, params).await
}

async fn respond(state: &AppState, requested: &str, params: FileParams) -> Result<Response, ServeError> {
    let full_path = resolve(state.root(), requested)?;
    let metadata = tokio::fs::metadata(&full_path)
        .await
        .map_err(|e| ServeError::io(&full_path, e))?;

    if metadata.is_dir() {
        let listing = list_directory(state.root(), &full_path).await?;
        Ok(Json(listing).into_response())
    } else {
        serve_file(&full_path, params.download).await
    }
}

/// Map a request path onto the filesystem, refusing anything outside `root`.
fn resolve(root: &Path, requested: &str) -> Result<PathBuf, ServeError> {
    let relative = Path::new(requested.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(ServeError::Forbidden);
    }

    let joined = root.join(relative);
    let resolved = joined.canonicalize().map_err(|e| ServeError::io(&joined, e))?;
    // Symlinks may still point outside the root.
    if !resolved.starts_with(root) {
        return Err(ServeError::Forbidden);
    }
    Ok(resolved)
}

async fn list_directory(root: &Path, dir: &Path) -> Result<DirectoryListing, ServeError> {
    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ServeError::io(dir, e))?;

    let mut files = Vec::new();
    let mut directories = Vec::new();

    while let Some(entry) = reader.next_entry().await.map_err(|e| ServeError::io(dir, e))? {
        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().to_string();
        let is_dir = metadata.is_dir();
        let extension = if is_dir {
            String::new()
        } else {
            extension_of(&path)
        };
        let info = EntryInfo {
            can_view: !is_dir && VIEWABLE_EXTENSIONS.contains(&extension.as_str()),
            relative_path: url_path(path.strip_prefix(root).unwrap_or(&path)),
            size: metadata.len(),
            mod_time: metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_default(),
            name,
            path,
            is_dir,
            extension,
        };

        if is_dir {
            directories.push(info);
        } else {
            files.push(info);
        }
    }

    directories.sort_by(|a, b| a.name.cmp(&b.name));
    files.sort_by(|a, b| a.name.cmp(&b.name));

    let relative = url_path(dir.strip_prefix(root).unwrap_or(dir));
    Ok(DirectoryListing {
        breadcrumb: breadcrumb(&relative),
        path: if relative.is_empty() {
            "Root".to_string()
        } else {
            relative
        },
        total_files: files.len(),
        total_dirs: directories.len(),
        files,
        directories,
        scan_time: Utc::now(),
    })
}

async fn serve_file(path: &Path, download: bool) -> Result<Response, ServeError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| ServeError::io(path, e))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| ServeError::io(path, e))?
        .len();

    let content_type = mime_guess::from_path(path).first_or_octet_stream().to_string();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().replace('"', ""))
        .unwrap_or_default();

    let disposition = if download {
        Some(format!("attachment; filename=\"{file_name}\""))
    } else if extension_of(path) == ".pdf" {
        Some(format!("inline; filename=\"{file_name}\""))
    } else {
        None
    };

    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, length);
    if let Some(disposition) = disposition {
        response = response.header(header::CONTENT_DISPOSITION, disposition);
    }

    response
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ServeError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })
}

/// Lowercased extension with its leading dot, or empty.
fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn url_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Crumbs from the root down to `relative` (a `/`-separated path).
fn breadcrumb(relative: &str) -> Vec<Crumb> {
    let mut crumbs = vec![Crumb {
        name: "Home".to_string(),
        path: "/".to_string(),
    }];

    let mut current = String::new();
    for part in relative.split('/').filter(|p| !p.is_empty()) {
        current.push('/');
        current.push_str(part);
        crumbs.push(Crumb {
            name: part.to_string(),
            path: current.clone(),
        });
    }
    crumbs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breadcrumb() {
        assert_eq!(breadcrumb(""), vec![Crumb { name: "Home".into(), path: "/".into() }]);

        let crumbs = breadcrumb("reports/2024");
        assert_eq!(crumbs.len(), 3);
        assert_eq!(crumbs[1], Crumb { name: "reports".into(), path: "/reports".into() });
        assert_eq!(crumbs[2], Crumb { name: "2024".into(), path: "/reports/2024".into() });
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("a/Report.PDF")), ".pdf");
        assert_eq!(extension_of(Path::new("Makefile")), "");
    }

    #[test]
    fn test_resolve_rejects_parent_components() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();

        assert!(matches!(resolve(&root, "../etc"), Err(ServeError::Forbidden)));
        assert!(matches!(resolve(&root, "a/../../etc"), Err(ServeError::Forbidden)));
        assert!(matches!(resolve(&root, "missing"), Err(ServeError::NotFound { .. })));
        assert_eq!(resolve(&root, "").unwrap(), root);
        assert_eq!(resolve(&root, "/").unwrap(), root);
    }
}
