/// Arrow schema for the processing cache.
///
/// Every column is a non-null `Utf8`; the schema doubles as the header row
/// written ahead of (or instead of) any data.
pub mod cache {
    use arrow::datatypes::{DataType, Field, Schema};

    pub const FILE_ID: &str = "fileId";
    pub const FILE_NAME: &str = "fileName";
    pub const UPDATED_MS: &str = "updatedMs";
    pub const SUBJECT: &str = "subject";
    pub const PAYLOAD_JSON: &str = "payloadJson";
    pub const PROCESSED_AT: &str = "processedAt";

    pub const COLUMNS: [&str; 6] = [
        FILE_ID,
        FILE_NAME,
        UPDATED_MS,
        SUBJECT,
        PAYLOAD_JSON,
        PROCESSED_AT,
    ];

    pub fn cache_schema() -> Schema {
        Schema::new(
            COLUMNS
                .iter()
                .map(|name| Field::new(*name, DataType::Utf8, false))
                .collect::<Vec<_>>(),
        )
    }
}

/// Arrow schemas for the rendered tables.
pub mod table {
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::months::MONTH_LABELS;

    pub const SUBJECT: &str = "教科";
    pub const FILE: &str = "PDFファイル";

    pub const RAW_COLUMNS: [&str; 6] = ["sourceFile", "subject", "period", "months", "unit", "hours"];

    fn utf8_fields<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<Field> {
        names
            .into_iter()
            .map(|name| Field::new(name, DataType::Utf8, false))
            .collect()
    }

    /// Subject, file name, then one column per month.
    pub fn main_table_schema() -> Schema {
        Schema::new(utf8_fields([SUBJECT, FILE].into_iter().chain(MONTH_LABELS)))
    }

    /// File name, then one column per month.
    pub fn subject_table_schema() -> Schema {
        Schema::new(utf8_fields(std::iter::once(FILE).chain(MONTH_LABELS)))
    }

    /// One row per extracted unit.
    pub fn raw_export_schema() -> Schema {
        Schema::new(utf8_fields(RAW_COLUMNS))
    }
}
