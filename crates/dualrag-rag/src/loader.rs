//! Loading documents from a directory tree

use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use dualrag_core::{Document, Error, Result};

/// File extensions treated as documents
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "rst"];

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Files under `root` that `load_documents` would consider, skipping hidden
/// entries
fn candidate_files(root: &Path) -> impl Iterator<Item = Result<DirEntry>> {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() && is_supported(entry.path()) => Some(Ok(entry)),
            Ok(_) => None,
            Err(e) => Some(Err(Error::from(std::io::Error::from(e)))),
        })
}

/// Whether `root` holds at least one supported document
pub fn has_documents(root: impl AsRef<Path>) -> Result<bool> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Ok(false);
    }
    candidate_files(root).next().transpose().map(|first| first.is_some())
}

/// Read every supported file under `root`, in path order.
///
/// Sources are paths relative to `root` with `/` separators. Files that are
/// not valid UTF-8 are skipped.
pub fn load_documents(root: impl AsRef<Path>) -> Result<Vec<Document>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::InvalidConfiguration(format!(
            "document directory '{}' does not exist",
            root.display()
        )));
    }

    let mut documents = Vec::new();
    for entry in candidate_files(root) {
        let entry = entry?;
        let path = entry.path();

        let bytes = std::fs::read(path)?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                tracing::warn!(path = %path.display(), "skipping file that is not valid UTF-8");
                continue;
            }
        };

        let relative = path.strip_prefix(root).unwrap_or(path);
        let source = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        documents.push(Document::new(source, text));
    }

    tracing::debug!(root = %root.display(), count = documents.len(), "loaded documents");
    Ok(documents)
}
