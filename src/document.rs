//! The notes document, modelled as a chain of consuming states.
//!
//! ```text
//! EmptyDocument ──lay_out──▶ LaidOutDocument ──place_image──▶ FinishedDocument ──persist──▶ PersistedDocument
//!                                                  │
//!                                                  └─ ImageOutcome::Placed | ImageOutcome::Skipped
//! ```
//!
//! Each transition takes `self` by value, so a document cannot be written
//! before its text is laid out, and an image cannot be added after the file
//! exists.

use crate::error::{ImageIssue, NotesError};
use crate::pipeline::layout::{lay_out_text, printable_text, ImagePlacement, Layout, PageGeometry};
use crate::pipeline::render::{render_pdf, EmbeddedImage};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// `notes_<topic>.pdf`, with spaces and path separators replaced by `_`.
pub fn pdf_file_name(topic: &str) -> String {
    let safe: String = topic
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    format!("notes_{safe}.pdf")
}

/// A document with a topic and nothing else.
#[derive(Debug, Clone)]
pub struct EmptyDocument {
    topic: String,
    geometry: PageGeometry,
}

impl EmptyDocument {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            geometry: PageGeometry::default(),
        }
    }

    pub fn with_geometry(mut self, geometry: PageGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Split `text` into paragraphs and paginate it.
    pub fn lay_out(self, text: &str) -> LaidOutDocument {
        let layout = lay_out_text(&printable_text(text), self.geometry);
        info!(
            "Laid out {} paragraph(s) on {} page(s)",
            layout.paragraph_count,
            layout.page_count()
        );
        LaidOutDocument {
            topic: self.topic,
            layout,
        }
    }
}

/// Text is placed; the image slot is still open.
#[derive(Debug, Clone)]
pub struct LaidOutDocument {
    topic: String,
    layout: Layout,
}

/// What happened to the image slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    Placed(ImagePlacement),
    /// No image was supplied, or it could not be embedded.
    Skipped(Option<ImageIssue>),
}

impl LaidOutDocument {
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Place the JPEG at `image` below the text, or skip it.
    ///
    /// An unreadable image never fails the document; it becomes
    /// [`ImageOutcome::Skipped`] carrying the issue.
    pub fn place_image(mut self, image: Option<&Path>) -> FinishedDocument {
        let Some(path) = image else {
            debug!("No image to place");
            return FinishedDocument {
                topic: self.topic,
                layout: self.layout,
                image: None,
                outcome: ImageOutcome::Skipped(None),
            };
        };

        match EmbeddedImage::from_jpeg_file(path) {
            Ok(embedded) => {
                let placement = self.layout.place_image(embedded.px_width, embedded.px_height);
                debug!(
                    "Image {}x{}px placed on page {} at {:.1}mm ({:.1}x{:.1}mm)",
                    embedded.px_width,
                    embedded.px_height,
                    placement.page + 1,
                    placement.top_mm,
                    placement.width_mm,
                    placement.height_mm
                );
                FinishedDocument {
                    topic: self.topic,
                    layout: self.layout,
                    image: Some(embedded),
                    outcome: ImageOutcome::Placed(placement),
                }
            }
            Err(issue) => {
                warn!("{}", issue);
                FinishedDocument {
                    topic: self.topic,
                    layout: self.layout,
                    image: None,
                    outcome: ImageOutcome::Skipped(Some(issue)),
                }
            }
        }
    }
}

/// Text and image are final; only writing remains.
#[derive(Debug)]
pub struct FinishedDocument {
    topic: String,
    layout: Layout,
    image: Option<EmbeddedImage>,
    outcome: ImageOutcome,
}

impl FinishedDocument {
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn outcome(&self) -> &ImageOutcome {
        &self.outcome
    }

    /// Render to PDF bytes without touching the filesystem.
    pub fn to_bytes(self) -> Result<Vec<u8>, NotesError> {
        let title = format!("Notes: {}", self.topic);
        let image = match (self.image, &self.outcome) {
            (Some(embedded), ImageOutcome::Placed(placement)) => Some((embedded, *placement)),
            _ => None,
        };
        render_pdf(&self.layout, &title, image)
    }

    /// Render and write to `<pdf_dir>/notes_<topic>.pdf`.
    ///
    /// The bytes go to a temporary file in `pdf_dir` first and are renamed
    /// into place, so an existing PDF is never left half-written.
    pub fn persist(self, pdf_dir: &Path) -> Result<PersistedDocument, NotesError> {
        let path = pdf_dir.join(pdf_file_name(&self.topic));
        let page_count = self.layout.page_count();
        let image_placed = matches!(self.outcome, ImageOutcome::Placed(_));
        let image_issue = match &self.outcome {
            ImageOutcome::Skipped(issue) => issue.clone(),
            ImageOutcome::Placed(_) => None,
        };

        let bytes = self.to_bytes()?;
        write_atomically(&path, &bytes)?;

        info!(
            "PDF written: {} ({} page(s), {} bytes)",
            path.display(),
            page_count,
            bytes.len()
        );
        Ok(PersistedDocument {
            path,
            page_count,
            image_placed,
            image_issue,
        })
    }
}

/// A PDF on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedDocument {
    pub path: PathBuf,
    pub page_count: usize,
    pub image_placed: bool,
    /// Why the image was left out, if one was supplied and could not be used.
    pub image_issue: Option<ImageIssue>,
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), NotesError> {
    let write_failed = |source: std::io::Error| NotesError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(write_failed)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_failed)?;
    tmp.write_all(bytes).map_err(write_failed)?;
    tmp.flush().map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    Ok(())
}
