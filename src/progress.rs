//! Progress-callback trait for stage-level run events.
//!
//! Inject an [`Arc<dyn NotesProgressCallback>`] via
//! [`crate::config::NotesConfigBuilder::progress_callback`] to receive events
//! as the run moves through its stages.
//!
//! # Example
//!
//! ```rust
//! use edgequake_notes::{NotesConfig, NotesProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     tasks: Arc<AtomicUsize>,
//! }
//!
//! impl NotesProgressCallback for CountingCallback {
//!     fn on_task_complete(&self, task: &str, index: usize, total: usize, output_len: usize) {
//!         self.tasks.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{task} {}/{} done ({} bytes)", index + 1, total, output_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     tasks: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = NotesConfig::builder()
//!     .progress_callback(counter as Arc<dyn NotesProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ImageIssue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The four sequential stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Agent runtime executes the task graph.
    Notes,
    /// Image search and download.
    Image,
    /// Image re-encoding for the PDF.
    Normalize,
    /// Layout, rendering and persisting the PDF.
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Notes => "Writing notes",
            Stage::Image => "Fetching image",
            Stage::Normalize => "Preparing image",
            Stage::Assemble => "Building PDF",
        };
        f.write_str(s)
    }
}

/// Called by the run as it moves through each stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait NotesProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called after each agent task completes.
    ///
    /// # Arguments
    /// * `task`       — task identifier, e.g. `generate_notes`
    /// * `index`      — 0-based position in the task graph
    /// * `total`      — number of tasks in the graph
    /// * `output_len` — byte length of the task output
    fn on_task_complete(&self, task: &str, index: usize, total: usize, output_len: usize) {
        let _ = (task, index, total, output_len);
    }

    /// Called when the image stage hits a recoverable problem.
    fn on_image_issue(&self, issue: &ImageIssue) {
        let _ = issue;
    }

    /// Called when a stage finishes.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl NotesProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::NotesConfig`].
pub type ProgressCallback = Arc<dyn NotesProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        stages: Mutex<Vec<Stage>>,
        tasks: AtomicUsize,
        issues: AtomicUsize,
    }

    impl NotesProgressCallback for TrackingCallback {
        fn on_stage_start(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_task_complete(&self, _task: &str, _index: usize, _total: usize, _len: usize) {
            self.tasks.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_issue(&self, _issue: &ImageIssue) {
            self.issues.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Notes);
        cb.on_task_complete("generate_notes", 0, 4, 42);
        cb.on_image_issue(&ImageIssue::SearchUnavailable {
            query: "x".into(),
            detail: "none".into(),
        });
        cb.on_stage_complete(Stage::Assemble);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_stage_start(Stage::Notes);
        tracker.on_task_complete("generate_notes", 0, 4, 100);
        tracker.on_task_complete("search_images", 1, 4, 10);
        tracker.on_stage_start(Stage::Image);
        tracker.on_image_issue(&ImageIssue::DownloadFailed {
            url: "u".into(),
            reason: "HTTP 500".into(),
        });

        assert_eq!(*tracker.stages.lock().unwrap(), vec![Stage::Notes, Stage::Image]);
        assert_eq!(tracker.tasks.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.issues.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stage_labels() {
        assert_eq!(Stage::Assemble.to_string(), "Building PDF");
    }
}
