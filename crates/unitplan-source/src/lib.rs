//! Concrete collaborators: where PDFs come from and how they are OCR'd.

pub mod local;
pub mod ocr;

#[cfg(feature = "drive")]
pub mod drive;

#[cfg(feature = "drive")]
pub use drive::DriveFolder;
pub use local::LocalFolder;
pub use ocr::{CommandOcr, DEFAULT_OCR_COMMAND};
