//! End-to-end run: notes → image → normalised image → PDF.
//!
//! Stages run strictly one after another. Only the agent pipeline can fail
//! the run; every image problem is recorded in
//! [`NotesOutput::image_issues`] and the document is written without it.

use crate::config::{NotesConfig, Preference};
use crate::crew::{note_crew, TaskRuntime};
use crate::document::EmptyDocument;
use crate::error::{ImageIssue, NotesError};
use crate::output::{NotesOutput, RunStats};
use crate::pipeline::llm::LlmRuntime;
use crate::pipeline::normalize::ensure_pdf_compatible;
use crate::pipeline::resolve::ImageResolver;
use crate::progress::Stage;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Generate notes on `topic` and write them to `<pdf_dir>/notes_<topic>.pdf`.
///
/// # Errors
/// Returns `Err(NotesError)` only for fatal errors:
/// - no LLM provider could be resolved
/// - an agent task failed after all retries
/// - the PDF could not be rendered or written
pub async fn generate_notes(
    topic: impl AsRef<str>,
    preference: &Preference,
    config: &NotesConfig,
) -> Result<NotesOutput, NotesError> {
    let total_start = Instant::now();
    let topic = topic.as_ref().trim().to_string();
    info!("Generating {} notes on: {}", preference, topic);

    let mut issues: Vec<ImageIssue> = Vec::new();
    let report = |issue: &ImageIssue| {
        if let Some(ref cb) = config.progress_callback {
            cb.on_image_issue(issue);
        }
    };

    // ── Step 1: Agent pipeline ───────────────────────────────────────────
    stage_start(config, Stage::Notes);
    let runtime: Arc<dyn TaskRuntime> = match config.runtime {
        Some(ref runtime) => Arc::clone(runtime),
        None => Arc::new(LlmRuntime::from_config(config)?),
    };
    let crew = note_crew(&topic, preference);
    let llm_start = Instant::now();
    let crew_output = runtime.kickoff(&crew).await?;
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;
    info!(
        "Notes ready: {} chars from {} task(s) in {}ms",
        crew_output.final_text.len(),
        crew_output.tasks.len(),
        llm_duration_ms
    );
    stage_complete(config, Stage::Notes);

    // ── Step 2: Image search + download ──────────────────────────────────
    let image_start = Instant::now();
    stage_start(config, Stage::Image);
    let (local, issue) = ImageResolver::new(config).resolve_or_skip(&topic).await;
    if let Some(issue) = issue {
        report(&issue);
        issues.push(issue);
    }
    stage_complete(config, Stage::Image);

    // ── Step 3: Normalise ────────────────────────────────────────────────
    stage_start(config, Stage::Normalize);
    let source = local.map(|img| img.path);
    let (jpeg, issue) =
        tokio::task::spawn_blocking(move || ensure_pdf_compatible(source.as_deref()))
            .await
            .map_err(|e| NotesError::Internal(format!("Normalise task panicked: {e}")))?;
    if let Some(issue) = issue {
        report(&issue);
        issues.push(issue);
    }
    let image_duration_ms = image_start.elapsed().as_millis() as u64;
    stage_complete(config, Stage::Normalize);

    // ── Step 4: Lay out, render, persist ─────────────────────────────────
    stage_start(config, Stage::Assemble);
    let persisted = {
        let topic = topic.clone();
        let notes = crew_output.final_text.clone();
        let image = jpeg.clone();
        let pdf_dir = config.pdf_dir.clone();
        tokio::task::spawn_blocking(move || {
            EmptyDocument::new(topic)
                .lay_out(&notes)
                .place_image(image.as_deref())
                .persist(&pdf_dir)
        })
        .await
        .map_err(|e| NotesError::Internal(format!("Assemble task panicked: {e}")))??
    };
    if let Some(ref issue) = persisted.image_issue {
        report(issue);
        issues.push(issue.clone());
    }
    stage_complete(config, Stage::Assemble);

    let stats = RunStats {
        llm_duration_ms,
        image_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        ..Default::default()
    }
    .with_tokens(&crew_output.tasks);

    info!(
        "Done: {} ({} page(s), image {}) in {}ms",
        persisted.path.display(),
        persisted.page_count,
        if persisted.image_placed { "placed" } else { "skipped" },
        stats.total_duration_ms
    );

    Ok(NotesOutput {
        topic,
        preference: preference.clone(),
        notes: crew_output.final_text,
        image: jpeg,
        image_issues: issues,
        pdf_path: persisted.path,
        page_count: persisted.page_count,
        image_placed: persisted.image_placed,
        tasks: crew_output.tasks,
        stats,
    })
}

/// Synchronous wrapper around [`generate_notes`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_notes_sync(
    topic: impl AsRef<str>,
    preference: &Preference,
    config: &NotesConfig,
) -> Result<NotesOutput, NotesError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| NotesError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_notes(topic, preference, config))
}

fn stage_start(config: &NotesConfig, stage: Stage) {
    info!("{}…", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
}

fn stage_complete(config: &NotesConfig, stage: Stage) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage);
    }
}
