mod display;
mod pipeline;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use unitplan_ai::{ExtractionPrompt, Extractor, GeminiClient};
use unitplan_core::{PdfSource, PlanConfig, SubjectKeyword, build_rows, extract_folder_id};
use unitplan_source::{CommandOcr, DEFAULT_OCR_COMMAND, DriveFolder, LocalFolder};
use unitplan_store::CacheStore;

use pipeline::PreconditionError;

#[derive(Parser)]
#[command(name = "unitplan")]
#[command(about = "Build month-by-month unit plan tables from a folder of curriculum PDFs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every PDF in the folder and write the plan tables
    Build(BuildArgs),
    /// Reset the processing cache to an empty file
    ClearCache(OutputArgs),
}

#[derive(Args)]
struct OutputArgs {
    /// Directory the tables (and, by default, the cache) are written to
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    /// Processing cache file [default: <out-dir>/処理キャッシュ.parquet]
    #[arg(long)]
    cache: Option<PathBuf>,
}

impl OutputArgs {
    fn cache_path(&self, config: &PlanConfig) -> PathBuf {
        self.cache
            .clone()
            .unwrap_or_else(|| self.out_dir.join(format!("{}.parquet", config.cache_name)))
    }
}

#[derive(Args)]
struct BuildArgs {
    /// Local directory, Drive folder URL, or Drive folder id
    #[arg(long, env = "UNITPLAN_FOLDER")]
    folder: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OAuth access token for Google Drive folders
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    drive_token: Option<String>,

    /// Gemini model name
    #[arg(long)]
    model: Option<String>,

    /// Pause after each fresh extraction, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// OCR language code passed as {lang}
    #[arg(long)]
    ocr_lang: Option<String>,

    /// OCR command template ({input}, {output}, {scratch}, {lang})
    #[arg(long, default_value = DEFAULT_OCR_COMMAND)]
    ocr_command: String,

    /// Extra subject keyword: `理科` or `science=理科` (repeatable)
    #[arg(long = "subject")]
    subjects: Vec<String>,

    /// Do not print the main table
    #[arg(long)]
    quiet: bool,

    #[command(flatten)]
    output: OutputArgs,
}

impl BuildArgs {
    fn config(&self) -> anyhow::Result<PlanConfig> {
        let mut config = PlanConfig::default();
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(ms) = self.delay_ms {
            config.request_delay = Duration::from_millis(ms);
        }
        if let Some(lang) = &self.ocr_lang {
            config.ocr_language = lang.clone();
        }
        for spec in &self.subjects {
            let subject = SubjectKeyword::parse(spec)
                .with_context(|| format!("invalid --subject {spec:?}"))?;
            config = config.with_subject(subject);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => build(args).await,
        Commands::ClearCache(output) => {
            let store = CacheStore::new(output.cache_path(&PlanConfig::default()));
            store.clear().context("clearing processing cache")?;
            println!("Cleared {}", store.path().display());
            Ok(())
        }
    }
}

async fn build(args: BuildArgs) -> anyhow::Result<()> {
    let config = args.config()?;
    info!("unitplan v{}", env!("CARGO_PKG_VERSION"));

    // Preconditions, in order: credential, folder, files (checked by the run).
    let api_key = non_empty(args.api_key.as_deref()).ok_or(PreconditionError::MissingCredential {
        flag: "--api-key",
        env: "GEMINI_API_KEY",
    })?;
    let source = resolve_source(args.folder.as_deref(), args.drive_token.as_deref())?;

    let ocr = CommandOcr::from_template(&args.ocr_command, config.ocr_language.clone())
        .context("--ocr-command is empty")?;
    let extractor = Extractor::new(
        Box::new(GeminiClient::new(api_key, &config)),
        Box::new(ocr),
        ExtractionPrompt::new(&config),
    );
    let store = CacheStore::new(args.output.cache_path(&config));

    let run = pipeline::run_extraction(&*source, &extractor, &store, config.request_delay).await?;

    let rows = build_rows(&run.payloads, &config);
    let written = display::write_tables(&args.output.out_dir, &rows, &run.payloads, &config)?;
    if !args.quiet {
        display::print_main_table(&rows)?;
    }
    display::print_summary(&run.stats, &written, run.elapsed_secs);
    Ok(())
}

/// A local directory wins; otherwise the argument must name a Drive folder.
fn resolve_source(
    folder: Option<&str>,
    drive_token: Option<&str>,
) -> Result<Box<dyn PdfSource>, PreconditionError> {
    let folder = non_empty(folder).ok_or(PreconditionError::MissingFolderRef)?;

    let path = Path::new(folder);
    if path.is_dir() {
        info!(root = %path.display(), "using local folder");
        return Ok(Box::new(LocalFolder::new(path)));
    }

    let id = extract_folder_id(folder)
        .ok_or_else(|| PreconditionError::UnparseableFolderRef(folder.to_string()))?;
    let token = non_empty(drive_token).ok_or(PreconditionError::MissingCredential {
        flag: "--drive-token",
        env: "GOOGLE_ACCESS_TOKEN",
    })?;
    info!(folder_id = %id, "using Drive folder");
    Ok(Box::new(DriveFolder::new(id, token)))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
