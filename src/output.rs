//! Result types returned by [`crate::generate_notes`].

use crate::config::Preference;
use crate::crew::TaskOutput;
use crate::error::ImageIssue;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesOutput {
    pub topic: String,
    pub preference: Preference,
    /// Final text of the agent pipeline, as laid out in the PDF.
    pub notes: String,
    /// The JPEG that was handed to the document, if any.
    pub image: Option<PathBuf>,
    /// Recoverable problems met while fetching or embedding the image.
    pub image_issues: Vec<ImageIssue>,
    pub pdf_path: PathBuf,
    pub page_count: usize,
    pub image_placed: bool,
    /// Per-task outputs of the agent pipeline.
    pub tasks: Vec<TaskOutput>,
    pub stats: RunStats,
}

/// Token and timing totals for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// Wall-clock time spent in the agent pipeline.
    pub llm_duration_ms: u64,
    /// Search, download and normalisation.
    pub image_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl RunStats {
    /// Sum token counts over the task outputs.
    pub fn with_tokens(mut self, tasks: &[TaskOutput]) -> Self {
        self.total_input_tokens = tasks.iter().map(|t| t.input_tokens as u64).sum();
        self.total_output_tokens = tasks.iter().map(|t| t.output_tokens as u64).sum();
        self
    }
}
