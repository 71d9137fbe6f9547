//! Two-tier extraction: hand the PDF to the model directly, and if that
//! fails for any reason, OCR it and send the text instead.

use std::fmt;

use thiserror::Error;
use tracing::{info, warn};
use unitplan_core::{ExtractionPayload, FileRef, OcrEngine, PayloadError, SourceError};

use crate::gemini::{Attachment, ModelError, TextGenerator};
use crate::parse::parse_json_safe;
use crate::prompt::ExtractionPrompt;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("model response is not JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unexpected payload shape: {0}")]
    Shape(#[from] PayloadError),
    #[error("OCR failed: {0}")]
    Ocr(#[from] SourceError),
    #[error("OCR produced no text")]
    EmptyOcrText,
}

/// Which tier produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Direct,
    Ocr,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Direct => write!(f, "direct"),
            Tier::Ocr => write!(f, "ocr"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Extracted {
    pub payload: ExtractionPayload,
    pub tier: Tier,
}

pub struct Extractor {
    generator: Box<dyn TextGenerator>,
    ocr: Box<dyn OcrEngine>,
    prompt: ExtractionPrompt,
}

impl Extractor {
    pub fn new(
        generator: Box<dyn TextGenerator>,
        ocr: Box<dyn OcrEngine>,
        prompt: ExtractionPrompt,
    ) -> Self {
        Self {
            generator,
            ocr,
            prompt,
        }
    }

    /// Extract one file. Fails only when both tiers fail.
    ///
    /// A direct-tier failure is logged and never returned; the error that
    /// surfaces is always the OCR tier's.
    pub async fn extract(&self, file: &FileRef, pdf: &[u8]) -> Result<Extracted, ExtractionError> {
        match self.direct(file, pdf).await {
            Ok(payload) => {
                return Ok(Extracted {
                    payload,
                    tier: Tier::Direct,
                });
            }
            Err(e) => {
                warn!(file = %file.name, file_id = %file.id, error = %e, "direct extraction failed, falling back to OCR");
            }
        }

        let payload = self.via_ocr(file, pdf).await?;
        Ok(Extracted {
            payload,
            tier: Tier::Ocr,
        })
    }

    async fn direct(&self, file: &FileRef, pdf: &[u8]) -> Result<ExtractionPayload, ExtractionError> {
        let prompt = self.prompt.direct(&file.name);
        self.request(file, &prompt, Some(Attachment::pdf(pdf))).await
    }

    async fn via_ocr(&self, file: &FileRef, pdf: &[u8]) -> Result<ExtractionPayload, ExtractionError> {
        let text = self.ocr.extract_text(file, pdf).await?;
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyOcrText);
        }
        info!(file = %file.name, chars = text.chars().count(), "OCR text ready");

        let prompt = self.prompt.with_text(&file.name, &text);
        self.request(file, &prompt, None).await
    }

    async fn request(
        &self,
        file: &FileRef,
        prompt: &str,
        attachment: Option<Attachment<'_>>,
    ) -> Result<ExtractionPayload, ExtractionError> {
        let text = self.generator.generate(prompt, attachment).await?;
        let value = parse_json_safe(&text)?;
        let mut payload = ExtractionPayload::from_value(&value)?;
        payload.attach_provenance(file);
        Ok(payload)
    }
}
