//! CLI binary for edgequake-docmerge.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConsolidationConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docmerge::{
    consolidate, consolidate_files, ConsolidationConfig, ConsolidationOutput,
    ConsolidationProgressCallback, FileOutcome, InputFile, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the file list plus a log line
/// per file.
struct CliProgressCallback {
    bar: ProgressBar,
    pages: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_consolidation_start
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&TICKS),
        );
        bar.set_prefix("Merging");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            pages: AtomicUsize::new(0),
        })
    }
}

impl ConsolidationProgressCallback for CliProgressCallback {
    fn on_consolidation_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Merging {total_files} files…"))
        ));
    }

    fn on_file_start(&self, _file_num: usize, _total: usize, file_name: &str) {
        self.bar.set_message(file_name.to_string());
    }

    fn on_file_complete(&self, file_num: usize, total: usize, file_name: &str, pages: usize) {
        let first = self.pages.fetch_add(pages, Ordering::SeqCst) + 1;
        let span = if pages == 1 {
            format!("p. {first}")
        } else {
            format!("pp. {first}–{}", first + pages - 1)
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            file_num,
            total,
            file_name,
            dim(&span),
        ));
        self.bar.inc(1);
    }

    fn on_file_skipped(&self, file_num: usize, total: usize, file_name: &str, reason: &str) {
        // Truncate very long messages to keep output tidy.
        let msg = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        let name = if file_name.is_empty() { "<unnamed>" } else { file_name };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            file_num,
            total,
            name,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_consolidation_complete(&self, total_files: usize, added_files: usize, total_pages: usize) {
        self.bar.finish_and_clear();
        let skipped = total_files.saturating_sub(added_files);
        if skipped == 0 {
            eprintln!(
                "{} {} files → {} pages",
                green("✔"),
                bold(&added_files.to_string()),
                bold(&total_pages.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files → {} pages  ({} skipped)",
                if added_files == 0 { red("✘") } else { cyan("⚠") },
                bold(&added_files.to_string()),
                total_files,
                bold(&total_pages.to_string()),
                red(&skipped.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge local files in the order given
  docmerge scan.png statement.pdf receipt.jpg -o merged.pdf

  # Merge a task manifest: [{"fileName": "...", "fileData": "<base64>"}, ...]
  docmerge --manifest task.json -o out/claim-4711.pdf --title "Claim 4711"

  # Machine-readable summary
  docmerge --manifest task.json -o merged.pdf --json > report.json

SUPPORTED INPUTS:
  .png              embedded as one page, 1 px = 1 pt
  .jpg / .jpeg      embedded as one page; stored verbatim unless --no-jpeg-passthrough
  .pdf              every page copied in order, content untouched
  anything else     skipped with a warning

  Files that fail to decode are skipped; the run only fails when no page
  at all could be produced.

ENVIRONMENT VARIABLES:
  DOCMERGE_OUTPUT, DOCMERGE_MANIFEST, DOCMERGE_TITLE, DOCMERGE_NO_COMPRESS,
  DOCMERGE_NO_JPEG_PASSTHROUGH, DOCMERGE_JSON, DOCMERGE_NO_PROGRESS,
  DOCMERGE_VERBOSE, DOCMERGE_QUIET
  RUST_LOG          overrides the log filter chosen by -v / -q
"#;

/// Merge images and PDFs into one PDF.
#[derive(Parser, Debug)]
#[command(
    name = "docmerge",
    version,
    about = "Merge PNG, JPEG and PDF files into one multi-page PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local files to merge, in order.
    #[arg(conflicts_with = "manifest", required_unless_present = "manifest")]
    files: Vec<PathBuf>,

    /// JSON manifest holding the `{fileName, fileData}` list.
    #[arg(short, long, env = "DOCMERGE_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Write the merged PDF here. Missing directories are created.
    #[arg(short, long, env = "DOCMERGE_OUTPUT")]
    output: PathBuf,

    /// Document title stored in the PDF metadata.
    #[arg(long, env = "DOCMERGE_TITLE")]
    title: Option<String>,

    /// Leave content streams uncompressed.
    #[arg(long, env = "DOCMERGE_NO_COMPRESS")]
    no_compress: bool,

    /// Re-encode JPEG pixels instead of storing the file verbatim.
    #[arg(long, env = "DOCMERGE_NO_JPEG_PASSTHROUGH")]
    no_jpeg_passthrough: bool,

    /// Print a JSON summary (ConsolidationOutput) on stdout.
    #[arg(long, env = "DOCMERGE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCMERGE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCMERGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCMERGE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already reports every skipped file, so library
    // warnings are only shown when it is off.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConsolidationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run consolidation ────────────────────────────────────────────────
    let output = match cli.manifest {
        Some(ref manifest) => {
            let text = tokio::fs::read_to_string(manifest)
                .await
                .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
            let raw: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("Manifest {} is not valid JSON", manifest.display()))?;
            consolidate(&raw, &cli.output, &config).await
        }
        None => {
            let files = read_inputs(&cli.files).await?;
            consolidate_files(files, &cli.output, &config).await
        }
    }
    .context("Consolidation failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output, show_progress);
    }

    Ok(())
}

/// Map CLI args to `ConsolidationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConsolidationConfig> {
    let mut builder = ConsolidationConfig::builder()
        .compress(!cli.no_compress)
        .jpeg_passthrough(!cli.no_jpeg_passthrough);

    if let Some(ref title) = cli.title {
        builder = builder.title(title.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Read local files and wrap them the way the task layer would.
async fn read_inputs(paths: &[PathBuf]) -> Result<Vec<InputFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push(InputFile::from_bytes(name, &bytes));
    }
    Ok(files)
}

fn print_summary(output: &ConsolidationOutput, show_progress: bool) {
    let stats = &output.stats;
    // The callback already printed the per-file log.
    if !show_progress {
        for report in &output.files {
            if let FileOutcome::Skipped { ref reason } = report.outcome {
                eprintln!("  skipped {}: {}", report.file_name, reason);
            }
        }
    }
    eprintln!(
        "{}  {} pages from {}/{} files  {}ms  →  {}",
        if stats.skipped_files == 0 { green("✔") } else { cyan("⚠") },
        stats.total_pages,
        stats.added_files,
        stats.total_files,
        stats.total_duration_ms,
        bold(&output.path.display().to_string()),
    );
    eprintln!("   {}", dim(&format!("{} bytes", stats.output_bytes)));
}
