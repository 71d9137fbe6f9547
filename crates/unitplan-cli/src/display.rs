//! Output surfaces: CSV files for each table, plus a terminal preview.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use arrow::csv::WriterBuilder;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use unitplan_core::tables::{main_table, raw_export, subject_tables};
use unitplan_core::{ExtractionPayload, PlanConfig, Row};

use crate::pipeline::RunStats;

/// Write the main, per-subject and raw tables as CSV under `out_dir`.
///
/// Existing files with the same names are replaced. Returns the written
/// paths, main table first.
pub fn write_tables(
    out_dir: &Path,
    rows: &[Row],
    payloads: &[ExtractionPayload],
    config: &PlanConfig,
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let mut written = Vec::new();
    let mut write = |name: &str, batch: &RecordBatch| -> anyhow::Result<()> {
        let path = out_dir.join(format!("{}.csv", file_stem(name)));
        write_csv(&path, batch)?;
        written.push(path);
        Ok(())
    };

    write(&config.main_table_name, &main_table(rows)?)?;
    for table in subject_tables(rows, config)? {
        write(&table.name, &table.batch)?;
    }
    write(&config.raw_table_name, &raw_export(payloads)?)?;

    Ok(written)
}

fn write_csv(path: &Path, batch: &RecordBatch) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer
        .write(batch)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Table names come from model output; keep them to a single path component.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}

/// Print the main table to stdout.
pub fn print_main_table(rows: &[Row]) -> anyhow::Result<()> {
    let batch = main_table(rows)?;
    println!("{}", pretty_format_batches(&[batch])?);
    Ok(())
}

pub fn print_summary(stats: &RunStats, written: &[PathBuf], elapsed_secs: f64) {
    println!(
        "Files: {} found, {} from cache, {} extracted ({} via OCR), {} skipped  [{elapsed_secs:.1}s]",
        stats.discovered, stats.cached, stats.extracted, stats.via_ocr, stats.skipped
    );
    for path in written {
        println!("  wrote {}", path.display());
    }
}
