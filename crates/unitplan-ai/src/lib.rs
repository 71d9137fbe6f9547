//! Model layer: the Gemini `generateContent` client, the extraction prompt,
//! response repair, and the direct-then-OCR extraction strategy.

pub mod extract;
pub mod gemini;
pub mod parse;
pub mod prompt;

pub use extract::{Extracted, ExtractionError, Extractor, Tier};
pub use gemini::{Attachment, GeminiClient, ModelError, TextGenerator};
pub use parse::parse_json_safe;
pub use prompt::ExtractionPrompt;
