//! Run driver: list → cache check → extract → cache write, one file at a time.

use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};
use unitplan_ai::{Extracted, Extractor, Tier};
use unitplan_core::{ExtractionPayload, PdfSource};
use unitplan_store::{CacheEntry, CacheMap, CacheStore, lookup};

/// Failures that abort a run before any file is processed.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("missing credential: pass {flag} or set {env}")]
    MissingCredential {
        flag: &'static str,
        env: &'static str,
    },
    #[error("no folder given: pass --folder or set UNITPLAN_FOLDER")]
    MissingFolderRef,
    #[error("could not find a folder id in {0:?}; expected a local directory, a Drive folder URL or a folder id")]
    UnparseableFolderRef(String),
    #[error("no PDF files found under the target folder")]
    NoInputFiles,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub discovered: usize,
    pub cached: usize,
    pub extracted: usize,
    /// Fresh extractions that needed the OCR fallback.
    pub via_ocr: usize,
    pub skipped: usize,
}

pub struct RunOutput {
    /// Payloads in file order, cached and fresh alike.
    pub payloads: Vec<ExtractionPayload>,
    pub stats: RunStats,
    pub elapsed_secs: f64,
}

/// Process every PDF the source lists.
///
/// Per-file failures are logged and skipped. Only an empty listing, a
/// listing failure or a failed cache save ends the run with an error. An
/// unreadable cache is treated as empty and replaced at the end. The cache
/// is read once before the first file and rewritten once after the last;
/// `delay` follows each fresh extraction and nothing else.
pub async fn run_extraction(
    source: &dyn PdfSource,
    extractor: &Extractor,
    store: &CacheStore,
    delay: Duration,
) -> anyhow::Result<RunOutput> {
    let start = Instant::now();

    // 1. Discover.
    let files = source.list_pdfs().await.context("listing PDF files")?;
    if files.is_empty() {
        return Err(PreconditionError::NoInputFiles.into());
    }
    info!(count = files.len(), "discovered PDF files");

    // 2. Read the cache once.
    let mut cache = match store.load() {
        Ok(cache) => cache,
        Err(e) => {
            warn!(path = %store.path().display(), error = %e, "processing cache unreadable, starting empty");
            CacheMap::new()
        }
    };

    let mut stats = RunStats {
        discovered: files.len(),
        ..RunStats::default()
    };
    let mut payloads = Vec::with_capacity(files.len());

    // 3. One file at a time.
    for file in &files {
        if let Some(payload) = lookup(&cache, file) {
            debug!(file = %file.name, file_id = %file.id, "cache hit");
            stats.cached += 1;
            payloads.push(payload);
            continue;
        }

        let pdf = match source.fetch(file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %file.name, file_id = %file.id, error = %e, "could not fetch PDF, skipping");
                stats.skipped += 1;
                continue;
            }
        };

        let Extracted { payload, tier } = match extractor.extract(file, &pdf).await {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!(file = %file.name, file_id = %file.id, error = %e, "extraction failed, skipping");
                stats.skipped += 1;
                continue;
            }
        };

        match CacheEntry::new(file, &payload, Utc::now()) {
            Ok(entry) => {
                cache.insert(file.id.clone(), entry);
            }
            Err(e) => warn!(file = %file.name, error = %e, "could not serialise payload for cache"),
        }
        info!(file = %file.name, tier = %tier, items = payload.items.len(), "extracted");
        stats.extracted += 1;
        if tier == Tier::Ocr {
            stats.via_ocr += 1;
        }
        payloads.push(payload);

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    // 4. Rewrite the cache once.
    store
        .save(&cache)
        .with_context(|| format!("saving processing cache {}", store.path().display()))?;

    Ok(RunOutput {
        payloads,
        stats,
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}
