//! Error types for the edgequake-notes library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`NotesError`] — **Fatal**: the run cannot produce a document at all
//!   (the agent runtime failed, no provider configured, the PDF could not be
//!   written). Returned as `Err(NotesError)` from [`crate::generate_notes`].
//!
//! * [`ImageIssue`] — **Non-fatal**: the illustrative image could not be
//!   found, downloaded, decoded or embedded. The document is still written
//!   without it and the issue is reported in
//!   [`crate::output::NotesOutput::image_issues`].
//!
//! Without generated text there is nothing to put in the PDF, so the agent
//! runtime is the only stage whose failure aborts a run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-notes library.
///
/// Image-level failures use [`ImageIssue`] and never surface here.
#[derive(Debug, Error)]
pub enum NotesError {
    // ── Orchestration errors ──────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The task graph handed to the runtime is malformed.
    #[error("Invalid task graph: {0}")]
    InvalidCrew(String),

    /// A task failed inside the agent runtime after all attempts.
    #[error("Agent task '{task}' failed after {attempts} attempt(s): {detail}")]
    Orchestration {
        task: String,
        attempts: u32,
        detail: String,
    },

    // ── Document errors ───────────────────────────────────────────────────
    /// The PDF writer rejected the laid-out document.
    #[error("PDF rendering failed: {0}")]
    PdfRender(String),

    /// Could not create the output directory or write the PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A recoverable problem with the illustrative image.
///
/// Every variant degrades the run to a text-only document.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ImageIssue {
    /// The search service returned no usable result (or is not configured).
    #[error("No image found for '{query}': {detail}")]
    SearchUnavailable { query: String, detail: String },

    /// The image URL answered with a non-success status or the transfer failed.
    #[error("Failed to download image '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The downloaded file could not be opened, decoded or re-encoded.
    #[error("Could not process image '{path}': {detail}")]
    DecodeFailed { path: PathBuf, detail: String },

    /// The images directory or file could not be written.
    #[error("Could not store image at '{path}': {detail}")]
    Filesystem { path: PathBuf, detail: String },

    /// The normalised image could not be placed into the document.
    #[error("Could not embed image '{path}' in the PDF: {detail}")]
    EmbedFailed { path: PathBuf, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orchestration_display() {
        let e = NotesError::Orchestration {
            task: "generate_notes".into(),
            attempts: 4,
            detail: "503 Service Unavailable".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("generate_notes"), "got: {msg}");
        assert!(msg.contains("4 attempt"), "got: {msg}");
    }

    #[test]
    fn provider_not_configured_display() {
        let e = NotesError::ProviderNotConfigured {
            provider: "auto".into(),
            hint: "Set OPENAI_API_KEY".into(),
        };
        assert!(e.to_string().contains("auto"));
        assert!(e.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn download_failed_display() {
        let e = ImageIssue::DownloadFailed {
            url: "https://example.com/a.png".into(),
            reason: "HTTP 404 Not Found".into(),
        };
        assert!(e.to_string().contains("404"));
        assert!(e.to_string().contains("example.com"));
    }

    #[test]
    fn image_issue_serialises() {
        let e = ImageIssue::SearchUnavailable {
            query: "docker".into(),
            detail: "no images_results".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("SearchUnavailable"));
        let back: ImageIssue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
