//! Table builders for the output surfaces.
//!
//! Each table is a single `RecordBatch` of string columns. Writing and
//! styling are left to the caller.

use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::Schema;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::aggregate::{Row, subject_groups};
use crate::config::PlanConfig;
use crate::months::Month;
use crate::plan::{ExtractionPayload, format_hours};
use crate::schema::table;

/// A per-subject table and the name it should be written under.
pub struct SubjectTable {
    pub subject: String,
    pub name: String,
    pub batch: RecordBatch,
}

/// Cross-subject table: subject, file name, 12 months.
pub fn main_table(rows: &[Row]) -> Result<RecordBatch, ArrowError> {
    let mut columns = vec![
        rows.iter().map(|r| r.subject.clone()).collect::<Vec<_>>(),
        rows.iter().map(|r| r.file_name.clone()).collect(),
    ];
    columns.extend(month_columns(rows.iter()));
    to_batch(table::main_table_schema(), columns)
}

/// One table per distinct subject, in first-seen order.
pub fn subject_tables(rows: &[Row], config: &PlanConfig) -> Result<Vec<SubjectTable>, ArrowError> {
    subject_groups(rows)
        .into_iter()
        .map(|subject| -> Result<SubjectTable, ArrowError> {
            let filtered: Vec<&Row> = rows.iter().filter(|r| r.subject == subject).collect();
            let mut columns = vec![filtered.iter().map(|r| r.file_name.clone()).collect::<Vec<_>>()];
            columns.extend(month_columns(filtered.iter().copied()));
            Ok(SubjectTable {
                subject: subject.to_string(),
                name: config.subject_table_name(subject),
                batch: to_batch(table::subject_table_schema(), columns)?,
            })
        })
        .collect()
}

/// Flat export: one row per retained unit item.
pub fn raw_export(payloads: &[ExtractionPayload]) -> Result<RecordBatch, ArrowError> {
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); table::RAW_COLUMNS.len()];
    for payload in payloads {
        for item in &payload.items {
            if item.unit.trim().is_empty() {
                continue;
            }
            let cells = [
                payload.source_file_name().to_string(),
                payload.subject.clone(),
                item.period.clone(),
                item.months.join(","),
                item.unit.clone(),
                item.hours.map(format_hours).unwrap_or_default(),
            ];
            for (column, cell) in columns.iter_mut().zip(cells) {
                column.push(cell);
            }
        }
    }
    to_batch(table::raw_export_schema(), columns)
}

fn month_columns<'a>(rows: impl Iterator<Item = &'a Row> + Clone) -> Vec<Vec<String>> {
    Month::school_year()
        .map(|m| rows.clone().map(|r| r.months.cell(m)).collect())
        .collect()
}

fn to_batch(schema: Schema, columns: Vec<Vec<String>>) -> Result<RecordBatch, ArrowError> {
    let arrays: Vec<ArrayRef> = columns
        .into_iter()
        .map(|c| Arc::new(StringArray::from(c)) as ArrayRef)
        .collect();
    RecordBatch::try_new(Arc::new(schema), arrays)
}
