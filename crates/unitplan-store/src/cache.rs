//! Processing cache: file id → last successful extraction.
//!
//! The whole cache lives in one Parquet file whose schema is the header
//! descriptor. It is read once at the start of a run and replaced wholesale
//! at the end; there is no incremental append. A crash mid-run therefore
//! loses that run's new entries but never leaves a half-written file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, SecondsFormat, Utc};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{debug, info};
use unitplan_core::schema::cache;
use unitplan_core::{ExtractionPayload, FileRef};

use crate::StoreError;

/// One persisted cache row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub file_id: String,
    pub file_name: String,
    /// Modification stamp of the file when it was extracted.
    pub updated_ms: String,
    pub subject: String,
    /// Serialized [`ExtractionPayload`].
    pub payload_json: String,
    /// RFC 3339, UTC, millisecond precision.
    pub processed_at: String,
}

/// Cache rows keyed by file id. Iteration order is the on-disk row order.
pub type CacheMap = BTreeMap<String, CacheEntry>;

impl CacheEntry {
    /// Record a fresh extraction of `file`.
    pub fn new(
        file: &FileRef,
        payload: &ExtractionPayload,
        processed_at: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            file_id: file.id.clone(),
            file_name: file.name.clone(),
            updated_ms: file.updated_at.clone(),
            subject: payload.subject.clone(),
            payload_json: payload.to_json()?,
            processed_at: processed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

/// Return the cached payload for `file` if the entry is still fresh.
///
/// Fresh means: the stored stamp equals the file's stamp exactly, the
/// payload decodes, and it has at least one item. Anything else is a miss.
/// Missing provenance fields are filled from `file`.
pub fn lookup(cache: &CacheMap, file: &FileRef) -> Option<ExtractionPayload> {
    let entry = cache.get(&file.id)?;
    if entry.updated_ms != file.updated_at || entry.payload_json.is_empty() {
        return None;
    }

    let mut payload = match ExtractionPayload::from_json_str(&entry.payload_json) {
        Ok(p) => p,
        Err(e) => {
            debug!(file_id = %file.id, error = %e, "cached payload unreadable, treating as miss");
            return None;
        }
    };
    if payload.items.is_empty() {
        return None;
    }
    payload.backfill_provenance(file);
    Some(payload)
}

/// The cache file on disk.
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry. A missing file is created empty (schema only).
    ///
    /// Rows with an empty `fileId` are skipped.
    pub fn load(&self) -> Result<CacheMap, StoreError> {
        if !self.path.exists() {
            self.clear()?;
            return Ok(CacheMap::new());
        }

        let file = std::fs::File::open(&self.path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        check_schema(builder.schema().fields().iter().map(|f| f.name().as_str()))?;

        let mut map = CacheMap::new();
        for batch in builder.build()? {
            let batch = batch?;
            let columns = cache::COLUMNS
                .iter()
                .map(|name| string_column(&batch, name))
                .collect::<Result<Vec<_>, _>>()?;
            for row in 0..batch.num_rows() {
                let value = |col: usize| -> String {
                    let arr = columns[col];
                    if arr.is_null(row) {
                        String::new()
                    } else {
                        arr.value(row).to_string()
                    }
                };
                let file_id = value(0);
                if file_id.is_empty() {
                    continue;
                }
                map.insert(
                    file_id.clone(),
                    CacheEntry {
                        file_id,
                        file_name: value(1),
                        updated_ms: value(2),
                        subject: value(3),
                        payload_json: value(4),
                        processed_at: value(5),
                    },
                );
            }
        }

        info!(path = %self.path.display(), entries = map.len(), "loaded processing cache");
        Ok(map)
    }

    /// Replace the file with exactly `entries`, sorted by file id.
    pub fn save(&self, entries: &CacheMap) -> Result<(), StoreError> {
        let rows: Vec<&CacheEntry> = entries.values().collect();
        let column = |f: fn(&CacheEntry) -> &str| -> ArrayRef {
            Arc::new(StringArray::from_iter_values(rows.iter().map(|e| f(e))))
        };
        let batch = RecordBatch::try_new(
            Arc::new(cache::cache_schema()),
            vec![
                column(|e| e.file_id.as_str()),
                column(|e| e.file_name.as_str()),
                column(|e| e.updated_ms.as_str()),
                column(|e| e.subject.as_str()),
                column(|e| e.payload_json.as_str()),
                column(|e| e.processed_at.as_str()),
            ],
        )?;

        self.write_batch(Some(&batch))?;
        info!(path = %self.path.display(), entries = rows.len(), "saved processing cache");
        Ok(())
    }

    /// Reset to an empty, schema-only file.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.write_batch(None)?;
        info!(path = %self.path.display(), "cleared processing cache");
        Ok(())
    }

    /// Write to a sibling temp file, then rename over the cache file.
    fn write_batch(&self, batch: Option<&RecordBatch>) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = ArrowWriter::try_new(&mut tmp, Arc::new(cache::cache_schema()), None)?;
            if let Some(batch) = batch
                && batch.num_rows() > 0
            {
                writer.write(batch)?;
            }
            writer.close()?;
        }
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

fn check_schema<'a>(found: impl Iterator<Item = &'a str>) -> Result<(), StoreError> {
    let found: Vec<String> = found.map(str::to_string).collect();
    if found.iter().map(String::as_str).eq(cache::COLUMNS) {
        return Ok(());
    }
    Err(StoreError::SchemaMismatch {
        expected: cache::COLUMNS.iter().map(|s| s.to_string()).collect(),
        found,
    })
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| StoreError::Other(format!("cache column `{name}` is not Utf8")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{DataType, Field, Schema};
    use tempfile::TempDir;

    fn file(id: &str, updated: &str) -> FileRef {
        FileRef {
            id: id.into(),
            name: format!("{id}.pdf"),
            updated_at: updated.into(),
        }
    }

    fn payload(json: &str) -> ExtractionPayload {
        ExtractionPayload::from_json_str(json).unwrap()
    }

    fn sample_payload() -> ExtractionPayload {
        payload(r#"{"subject":"算数","items":[{"period":"4月","months":["4月"],"unit":"大きな数","hours":8}]}"#)
    }

    fn entry(id: &str, updated: &str) -> CacheEntry {
        CacheEntry::new(&file(id, updated), &sample_payload(), Utc::now()).unwrap()
    }

    #[test]
    fn load_missing_creates_schema_only_file() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("nested").join("cache.parquet"));
        assert!(!store.path().exists());

        let map = store.load().unwrap();
        assert!(map.is_empty());
        assert!(store.path().exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_reproduces_entries() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("cache.parquet"));

        let mut map = CacheMap::new();
        for (id, updated) in [("b", "200"), ("a", "100"), ("c", "300")] {
            map.insert(id.into(), entry(id, updated));
        }
        store.save(&map).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, map);

        // A second cycle with no change leaves the same state.
        store.save(&loaded).unwrap();
        assert_eq!(store.load().unwrap(), map);
    }

    #[test]
    fn rows_are_written_sorted_by_file_id() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("cache.parquet"));
        let mut map = CacheMap::new();
        for id in ["zeta", "alpha", "mid"] {
            map.insert(id.into(), entry(id, "1"));
        }
        store.save(&map).unwrap();

        let file = std::fs::File::open(store.path()).unwrap();
        let batches: Vec<RecordBatch> = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let ids = string_column(&batches[0], cache::FILE_ID).unwrap();
        let ids: Vec<&str> = (0..ids.len()).map(|i| ids.value(i)).collect();
        assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn save_overwrites_rather_than_appends() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("cache.parquet"));

        let mut first = CacheMap::new();
        first.insert("a".into(), entry("a", "1"));
        first.insert("b".into(), entry("b", "1"));
        store.save(&first).unwrap();

        let mut second = CacheMap::new();
        second.insert("c".into(), entry("c", "1"));
        store.save(&second).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn clear_empties_the_cache() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("cache.parquet"));
        let mut map = CacheMap::new();
        map.insert("a".into(), entry("a", "1"));
        store.save(&map).unwrap();

        store.clear().unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn foreign_schema_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.parquet");
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Utf8, false)]));
        let out = std::fs::File::create(&path).unwrap();
        let writer = ArrowWriter::try_new(out, schema, None).unwrap();
        writer.close().unwrap();

        let result = CacheStore::new(&path).load();
        assert!(matches!(result, Err(StoreError::SchemaMismatch { .. })));
    }

    #[test]
    fn processed_at_is_iso_millis() {
        let at = DateTime::parse_from_rfc3339("2026-04-01T09:30:00.123Z")
            .unwrap()
            .with_timezone(&Utc);
        let e = CacheEntry::new(&file("a", "1"), &sample_payload(), at).unwrap();
        assert_eq!(e.processed_at, "2026-04-01T09:30:00.123Z");
        assert_eq!(e.subject, "算数");
        assert_eq!(e.updated_ms, "1");
    }

    #[test]
    fn lookup_hit_backfills_provenance() {
        let mut map = CacheMap::new();
        map.insert("a".into(), entry("a", "1718000000000"));

        let hit = lookup(&map, &file("a", "1718000000000")).unwrap();
        assert_eq!(hit.items.len(), 1);
        assert_eq!(hit.source_file.as_deref(), Some("a.pdf"));
        assert_eq!(hit.file_id.as_deref(), Some("a"));
        assert_eq!(hit.file_updated_ms.as_deref(), Some("1718000000000"));
    }

    #[test]
    fn lookup_keeps_stored_provenance() {
        let mut stored = sample_payload();
        stored.attach_provenance(&FileRef {
            id: "a".into(),
            name: "original-name.pdf".into(),
            updated_at: "1".into(),
        });
        let mut map = CacheMap::new();
        map.insert("a".into(), CacheEntry::new(&file("a", "1"), &stored, Utc::now()).unwrap());

        let hit = lookup(&map, &file("a", "1")).unwrap();
        assert_eq!(hit.source_file.as_deref(), Some("original-name.pdf"));
    }

    #[test]
    fn lookup_requires_exact_stamp() {
        let mut map = CacheMap::new();
        map.insert("a".into(), entry("a", "1718000000000"));

        assert!(lookup(&map, &file("a", "1718000000001")).is_none());
        assert!(lookup(&map, &file("a", "1718000000000 ")).is_none());
        // Newer-looking stamps are still a miss; freshness is equality, not recency.
        assert!(lookup(&map, &file("a", "9999999999999")).is_none());
        assert!(lookup(&map, &file("b", "1718000000000")).is_none());
    }

    #[test]
    fn lookup_treats_bad_payloads_as_miss() {
        let f = file("a", "1");
        let mut bad = entry("a", "1");

        bad.payload_json = "{not json".into();
        let map = CacheMap::from([("a".to_string(), bad.clone())]);
        assert!(lookup(&map, &f).is_none());

        bad.payload_json = r#"{"subject":"算数","items":[]}"#.into();
        let map = CacheMap::from([("a".to_string(), bad.clone())]);
        assert!(lookup(&map, &f).is_none());

        bad.payload_json = r#"{"subject":"算数","items":"none"}"#.into();
        let map = CacheMap::from([("a".to_string(), bad.clone())]);
        assert!(lookup(&map, &f).is_none());

        bad.payload_json = String::new();
        let map = CacheMap::from([("a".to_string(), bad)]);
        assert!(lookup(&map, &f).is_none());
    }
}
