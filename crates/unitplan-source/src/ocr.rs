//! OCR by shelling out to an external program.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::debug;
use unitplan_core::{FileRef, OcrEngine, SourceError};

/// `ocrmypdf` writing recognised text to a sidecar file.
pub const DEFAULT_OCR_COMMAND: &str =
    "ocrmypdf -l {lang} --force-ocr --sidecar {output} {input} {scratch}";

const INPUT_NAME: &str = "input.pdf";
const OUTPUT_NAME: &str = "output.txt";
const SCRATCH_NAME: &str = "scratch.pdf";

/// Runs a command template in a throwaway directory.
///
/// Placeholders: `{input}` (the PDF, written by us), `{output}` (text file
/// the command must produce), `{scratch}` (free path for other artifacts),
/// `{lang}`. The directory is removed when the call returns.
#[derive(Debug, Clone)]
pub struct CommandOcr {
    program: String,
    args: Vec<String>,
    language: String,
    temp_root: Option<PathBuf>,
}

impl CommandOcr {
    /// Split a whitespace-separated template. `None` if it is empty.
    pub fn from_template(template: &str, language: impl Into<String>) -> Option<Self> {
        let mut words = template.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
            language: language.into(),
            temp_root: None,
        })
    }

    /// Create working directories under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    fn work_dir(&self) -> std::io::Result<TempDir> {
        match &self.temp_root {
            Some(root) => TempDir::new_in(root),
            None => TempDir::new(),
        }
    }

    fn expand_args(&self, dir: &Path) -> Vec<String> {
        let path = |name: &str| dir.join(name).to_string_lossy().into_owned();
        let (input, output, scratch) = (path(INPUT_NAME), path(OUTPUT_NAME), path(SCRATCH_NAME));
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input)
                    .replace("{output}", &output)
                    .replace("{scratch}", &scratch)
                    .replace("{lang}", &self.language)
            })
            .collect()
    }
}

#[async_trait]
impl OcrEngine for CommandOcr {
    async fn extract_text(&self, file: &FileRef, pdf: &[u8]) -> Result<String, SourceError> {
        let dir = self.work_dir()?;
        tokio::fs::write(dir.path().join(INPUT_NAME), pdf).await?;

        let args = self.expand_args(dir.path());
        debug!(file = %file.name, program = %self.program, "running OCR command");
        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| SourceError::Ocr(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Ocr(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let text = tokio::fs::read(dir.path().join(OUTPUT_NAME))
            .await
            .map_err(|e| SourceError::Ocr(format!("no OCR output for {}: {e}", file.name)))?;
        Ok(String::from_utf8_lossy(&text).into_owned())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file() -> FileRef {
        FileRef {
            id: "a.pdf".into(),
            name: "a.pdf".into(),
            updated_at: "1".into(),
        }
    }

    #[test]
    fn template_placeholders_expand() {
        let ocr = CommandOcr::from_template(DEFAULT_OCR_COMMAND, "jpn").unwrap();
        let args = ocr.expand_args(Path::new("/tmp/w"));
        assert_eq!(ocr.program, "ocrmypdf");
        assert_eq!(
            args,
            vec![
                "-l",
                "jpn",
                "--force-ocr",
                "--sidecar",
                "/tmp/w/output.txt",
                "/tmp/w/input.pdf",
                "/tmp/w/scratch.pdf"
            ]
        );
        assert!(CommandOcr::from_template("   ", "jpn").is_none());
    }

    #[tokio::test]
    async fn reads_sidecar_and_cleans_up() {
        let root = TempDir::new().unwrap();
        let ocr = CommandOcr::from_template("cp {input} {output}", "jpn")
            .unwrap()
            .with_temp_root(root.path());

        let text = ocr.extract_text(&file(), "4月 大きな数".as_bytes()).await.unwrap();
        assert_eq!(text, "4月 大きな数");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failing_command_is_an_ocr_error_and_still_cleans_up() {
        let root = TempDir::new().unwrap();
        let ocr = CommandOcr::from_template("false {input}", "jpn")
            .unwrap()
            .with_temp_root(root.path());

        let err = ocr.extract_text(&file(), b"%PDF").await.unwrap_err();
        assert!(matches!(err, SourceError::Ocr(_)));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_sidecar_is_an_ocr_error() {
        let ocr = CommandOcr::from_template("true", "jpn").unwrap();
        let err = ocr.extract_text(&file(), b"%PDF").await.unwrap_err();
        assert!(matches!(err, SourceError::Ocr(_)));
    }

    #[tokio::test]
    async fn unknown_program_is_an_ocr_error() {
        let ocr = CommandOcr::from_template("unitplan-no-such-ocr {input}", "jpn").unwrap();
        let err = ocr.extract_text(&file(), b"%PDF").await.unwrap_err();
        assert!(matches!(err, SourceError::Ocr(_)));
    }
}
