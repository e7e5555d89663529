//! CLI binary for edgequake-notes.
//!
//! Prompts for a topic and a length preference, runs the note pipeline and
//! opens the resulting PDF.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_notes::{
    generate_notes, open_in_viewer, ImageIssue, NotesConfig, NotesProgressCallback, Preference,
    ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Topic used when the binary is started with a positional marker argument.
const MARKER_TOPIC: &str = "docker";

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one spinner whose prefix follows the current stage,
/// plus a log line per finished agent task.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl NotesProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message(match stage {
            Stage::Notes => "agents at work…",
            Stage::Image => "searching…",
            Stage::Normalize => "checking format…",
            Stage::Assemble => "laying out pages…",
        });
    }

    fn on_task_complete(&self, task: &str, index: usize, total: usize, output_len: usize) {
        self.bar.println(format!(
            "  {} Task {}/{}  {:<18}  {}",
            green("✓"),
            index + 1,
            total,
            task,
            dim(&format!("{output_len:>6} chars")),
        ));
    }

    fn on_image_issue(&self, issue: &ImageIssue) {
        let msg = issue.to_string();
        let msg = if msg.chars().count() > 100 {
            format!("{}\u{2026}", msg.chars().take(99).collect::<String>())
        } else {
            msg
        };
        self.bar.println(format!("  {} {}", yellow("⚠"), msg));
    }

    fn on_stage_complete(&self, stage: Stage) {
        if stage == Stage::Assemble {
            self.bar.finish_and_clear();
        }
    }
}

const BANNER: &str = r#"
  _   _       _              ____    ____  ____  _____
 | \ | | ___ | |_ ___  ___  |___ \  |  _ \|  _ \|  ___|
 |  \| |/ _ \| __/ _ \/ __|   __) | | |_) | | | | |_
 | |\  | (_) | ||  __/\__ \  / __/  |  __/| |_| |  _|
 |_| \_|\___/ \__\___||___/ |_____| |_|   |____/|_|
"#;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Interactive: prompts for topic and length
  notes2pdf

  # Non-interactive smoke run on the topic "docker"
  notes2pdf go --preference short

  # Pick the model, keep the PDF closed, print the notes
  notes2pdf --provider openai --model gpt-4.1 --no-open --print-notes

  # Machine-readable result
  notes2pdf go --preference long --json > run.json

OUTPUT:
  images/<first five topic words>.<ext>     downloaded image
  images/<stem>_converted.jpg               re-encoded copy when not JPEG
  pdf/notes_<topic>.pdf                     the notes document

ENVIRONMENT VARIABLES:
  SERPAPI_API_KEY         SerpApi key for the image search (without it the PDF is text-only)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID

  A `.env` file in the working directory is loaded first.
"#;

/// Generate illustrated study notes as a PDF with a pipeline of LLM agents.
#[derive(Parser, Debug)]
#[command(
    name = "notes2pdf",
    version,
    about = "Generate illustrated study notes as a PDF with a pipeline of LLM agents",
    long_about = "Asks for a topic and a preferred length, lets four LLM agents write, \
structure and format notes, fetches one illustrative image, and lays everything out \
into pdf/notes_<topic>.pdf.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Any value skips the topic prompt and uses "docker".
    marker: Option<String>,

    /// Preferred length (short, long, or free text). Prompted when absent.
    #[arg(short, long, env = "NOTES_PREFERENCE")]
    preference: Option<String>,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Directory for downloaded images.
    #[arg(long, env = "NOTES_IMAGES_DIR", default_value = "images")]
    images_dir: PathBuf,

    /// Directory for the generated PDF.
    #[arg(long, env = "NOTES_PDF_DIR", default_value = "pdf")]
    pdf_dir: PathBuf,

    /// Create images world-writable (0777 dir / 0666 file).
    #[arg(long, env = "NOTES_SHARED_PERMISSIONS")]
    shared_permissions: bool,

    /// Do not open the PDF when done.
    #[arg(long, env = "NOTES_NO_OPEN")]
    no_open: bool,

    /// Print the generated notes to stdout.
    #[arg(long)]
    print_notes: bool,

    /// Output structured JSON (NotesOutput) on stdout.
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "NOTES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "NOTES_QUIET")]
    quiet: bool,

    /// Retries per agent task on LLM failure.
    #[arg(long, env = "NOTES_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Image download timeout in seconds.
    #[arg(long, env = "NOTES_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-task LLM call timeout in seconds.
    #[arg(long, env = "NOTES_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Variables from .env must be visible before clap reads `env = ...`.
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if !cli.quiet && !cli.json {
        eprintln!("{}", cyan(BANNER));
        eprintln!("{}", cyan("-------------------------------"));
    }

    // ── Topic + preference ───────────────────────────────────────────────
    let topic = match cli.marker {
        Some(_) => MARKER_TOPIC.to_string(),
        None => prompt("Enter the topic for which you want to generate notes: ")?,
    };
    if topic.is_empty() {
        anyhow::bail!("A topic is required");
    }
    let preference: Preference = match cli.preference {
        Some(ref p) => p.parse()?,
        None => prompt("Enter the preferred length of notes (short or long): ")?.parse()?,
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn NotesProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = generate_notes(&topic, &preference, &config)
        .await
        .context("Note generation failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.print_notes {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.notes.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.notes.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        if !show_progress {
            for issue in &output.image_issues {
                eprintln!("{} {}", yellow("⚠"), issue);
            }
        }
        eprintln!(
            "{}  {} page(s), image {}  {}ms  →  {}",
            green("✔"),
            output.page_count,
            if output.image_placed {
                green("placed")
            } else {
                yellow("skipped")
            },
            output.stats.total_duration_ms,
            bold(&output.pdf_path.display().to_string()),
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&output.stats.total_input_tokens.to_string()),
            dim(&output.stats.total_output_tokens.to_string()),
        );
    }

    if !cli.no_open && !open_in_viewer(&output.pdf_path) && !cli.quiet {
        eprintln!("{} could not open {}", red("✗"), output.pdf_path.display());
    }

    Ok(())
}

/// Map CLI args to `NotesConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<NotesConfig> {
    let mut builder = NotesConfig::builder()
        .images_dir(&cli.images_dir)
        .pdf_dir(&cli.pdf_dir)
        .shared_permissions(cli.shared_permissions)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Ok(key) = std::env::var("SERPAPI_API_KEY") {
        if !key.trim().is_empty() {
            builder = builder.serpapi_api_key(key.trim());
        }
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Ask on stderr and read one trimmed line from stdin.
fn prompt(question: &str) -> Result<String> {
    eprint!("{}", yellow(question));
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}
