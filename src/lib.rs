//! # edgequake-notes
//!
//! Generate illustrated study notes on any topic with a small pipeline of
//! LLM agents, and assemble them into a PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! topic + preference
//!  │
//!  ├─ 1. Notes      four agent tasks: write → suggest image → structure → format
//!  ├─ 2. Image      SerpApi google_images, first result, saved under images/
//!  ├─ 3. Normalise  anything that is not JPEG → <stem>_converted.jpg (q=95)
//!  └─ 4. Assemble   paragraphs → A4 pages → image below the text → pdf/notes_<topic>.pdf
//! ```
//!
//! Only stage 1 can fail the run. A missing search key, an empty result, a
//! broken download or an undecodable image all degrade to a text-only PDF
//! and are reported in [`NotesOutput::image_issues`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_notes::{generate_notes, NotesConfig, Preference};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = NotesConfig::builder()
//!         .serpapi_api_key(std::env::var("SERPAPI_API_KEY")?)
//!         .build()?;
//!     let output = generate_notes("docker", &Preference::Short, &config).await?;
//!     println!("{}", output.pdf_path.display());
//!     eprintln!("tokens: {} in / {} out",
//!         output.stats.total_input_tokens,
//!         output.stats.total_output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `notes2pdf` binary (clap + anyhow + tracing-subscriber + indicatif + dotenv) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-notes = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod crew;
pub mod document;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod viewer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{NotesConfig, NotesConfigBuilder, Preference};
pub use crew::{note_crew, Crew, CrewOutput, TaskKind, TaskOutput, TaskRuntime};
pub use document::{pdf_file_name, EmptyDocument, ImageOutcome, PersistedDocument};
pub use error::{ImageIssue, NotesError};
pub use generate::{generate_notes, generate_notes_sync};
pub use output::{NotesOutput, RunStats};
pub use pipeline::llm::LlmRuntime;
pub use pipeline::normalize::ensure_pdf_compatible;
pub use pipeline::resolve::{ImageResolver, LocalImage};
pub use progress::{NoopProgressCallback, NotesProgressCallback, ProgressCallback, Stage};
pub use viewer::open_in_viewer;
