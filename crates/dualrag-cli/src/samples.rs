//! Bundled sample corpus

use std::path::Path;

use dualrag_core::Result;
use dualrag_rag::has_documents;

/// File name and contents of each sample document
pub const SAMPLE_DOCUMENTS: &[(&str, &str)] = &[
    ("ollama_guide.md", include_str!("../samples/ollama_guide.md")),
    ("rag_explained.md", include_str!("../samples/rag_explained.md")),
    ("local_vs_cloud.md", include_str!("../samples/local_vs_cloud.md")),
];

/// Write the sample documents into `dir`, creating it if needed
pub fn write_sample_documents(dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dir)?;
    for (name, contents) in SAMPLE_DOCUMENTS {
        std::fs::write(dir.join(name), contents)?;
    }
    tracing::info!(dir = %dir.display(), count = SAMPLE_DOCUMENTS.len(), "wrote sample documents");
    Ok(SAMPLE_DOCUMENTS.len())
}

/// Populate `dir` with the sample corpus when it is missing or empty.
///
/// Returns whether samples were written.
pub fn ensure_documents(dir: &Path) -> Result<bool> {
    if has_documents(dir)? {
        return Ok(false);
    }
    write_sample_documents(dir)?;
    Ok(true)
}
