//! PDFs from a directory on disk.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use tracing::info;
use unitplan_core::{FileRef, PdfSource, SourceError};
use walkdir::WalkDir;

/// A local folder, walked recursively.
///
/// File ids are paths relative to the root with `/` separators; the
/// modification stamp is the mtime in epoch milliseconds.
pub struct LocalFolder {
    root: PathBuf,
}

impl LocalFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan(&self) -> Result<Vec<FileRef>, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::NotFound(self.root.display().to_string()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() || !is_pdf(entry.path()) {
                continue;
            }
            let Some(id) = relative_id(entry.path(), &self.root) else {
                continue;
            };
            let metadata = entry.metadata().map_err(|e| SourceError::Io(e.into()))?;
            files.push(FileRef {
                id,
                name: entry.file_name().to_string_lossy().into_owned(),
                updated_at: modified_ms(&metadata),
            });
        }
        files.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(files)
    }
}

#[async_trait]
impl PdfSource for LocalFolder {
    async fn list_pdfs(&self) -> Result<Vec<FileRef>, SourceError> {
        let files = self.scan()?;
        info!(root = %self.root.display(), count = files.len(), "listed local PDFs");
        Ok(files)
    }

    async fn fetch(&self, file: &FileRef) -> Result<Vec<u8>, SourceError> {
        Ok(tokio::fs::read(self.root.join(&file.id)).await?)
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn relative_id(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

fn modified_ms(metadata: &std::fs::Metadata) -> String {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis())
        .unwrap_or(0)
        .to_string()
}
