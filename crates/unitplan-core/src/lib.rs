pub mod aggregate;
pub mod config;
pub mod folder;
pub mod months;
pub mod plan;
pub mod schema;
pub mod source;
pub mod tables;

pub use aggregate::{MonthBuckets, Row, build_rows};
pub use config::{PlanConfig, SubjectKeyword};
pub use folder::extract_folder_id;
pub use months::{MONTH_LABELS, Month, normalize_months};
pub use plan::{ExtractionPayload, FileRef, PayloadError, UnitItem};
pub use source::{OcrEngine, PdfSource, SourceError};
