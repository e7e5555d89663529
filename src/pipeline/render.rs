//! PDF rendering: turn a [`Layout`] (and optionally one JPEG) into PDF bytes.
//!
//! Layout positions are measured from the top edge; PDF user space has its
//! origin at the bottom-left, so every y coordinate is flipped here:
//!
//! ```text
//! pdf_y = page_height - top_y            (text baselines)
//! pdf_y = page_height - top - height     (image lower-left corner)
//! ```
//!
//! Text uses the built-in Helvetica, so no font file is embedded. Rendering
//! is CPU-bound and synchronous; async callers run it in `spawn_blocking`.

use crate::error::{ImageIssue, NotesError};
use crate::pipeline::layout::{ImagePlacement, Layout};
use printpdf::image_crate::codecs::jpeg::JpegDecoder;
use printpdf::image_crate::ImageDecoder;
use printpdf::{BuiltinFont, Image, ImageTransform, Mm, PdfDocument, PdfLayerReference};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A decoded JPEG ready to be placed on a page.
pub struct EmbeddedImage {
    pub path: PathBuf,
    pub px_width: u32,
    pub px_height: u32,
    image: Image,
}

impl std::fmt::Debug for EmbeddedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedImage")
            .field("path", &self.path)
            .field("px_width", &self.px_width)
            .field("px_height", &self.px_height)
            .finish_non_exhaustive()
    }
}

impl EmbeddedImage {
    /// Read and decode a JPEG file for embedding.
    pub fn from_jpeg_file(path: &Path) -> Result<Self, ImageIssue> {
        let embed_failed = |detail: String| ImageIssue::EmbedFailed {
            path: path.to_path_buf(),
            detail,
        };

        let bytes = std::fs::read(path).map_err(|e| embed_failed(e.to_string()))?;
        let decoder =
            JpegDecoder::new(Cursor::new(bytes.as_slice())).map_err(|e| embed_failed(e.to_string()))?;
        let (px_width, px_height) = decoder.dimensions();
        if px_width == 0 || px_height == 0 {
            return Err(embed_failed("image has no pixels".into()));
        }
        let image = Image::try_from(decoder).map_err(|e| embed_failed(e.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            px_width,
            px_height,
            image,
        })
    }
}

/// Render every page of `layout`, plus the image at `placement` if given.
pub fn render_pdf(
    layout: &Layout,
    title: &str,
    image: Option<(EmbeddedImage, ImagePlacement)>,
) -> Result<Vec<u8>, NotesError> {
    let g = layout.geometry;
    let page_w = Mm(g.width_mm);
    let page_h = Mm(g.height_mm);

    let (doc, first_page, first_layer) = PdfDocument::new(title, page_w, page_h, "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| NotesError::PdfRender(format!("font: {e:?}")))?;

    let page_count = layout.page_count().max(1);
    let mut layers: Vec<PdfLayerReference> = Vec::with_capacity(page_count);
    layers.push(doc.get_page(first_page).get_layer(first_layer));
    for n in 1..page_count {
        let (page, layer) = doc.add_page(page_w, page_h, format!("Layer {}", n + 1));
        layers.push(doc.get_page(page).get_layer(layer));
    }

    for (page, layer) in layout.pages.iter().zip(&layers) {
        for line in &page.lines {
            if line.text.is_empty() {
                continue;
            }
            layer.use_text(
                line.text.as_str(),
                g.font_size_pt,
                Mm(line.x_mm),
                Mm(g.height_mm - line.baseline_mm),
                &font,
            );
        }
    }

    if let Some((embedded, placement)) = image {
        let layer = layers.get(placement.page).cloned().ok_or_else(|| {
            NotesError::Internal(format!(
                "image placed on page {} of {}",
                placement.page + 1,
                layers.len()
            ))
        })?;
        let dpi = embedded.px_width as f32 * 25.4 / placement.width_mm;
        debug!(
            "Embedding {} on page {} at {:.1}mm, {:.0} dpi",
            embedded.path.display(),
            placement.page + 1,
            placement.top_mm,
            dpi
        );
        embedded.image.add_to_layer(
            layer,
            ImageTransform {
                translate_x: Some(Mm(placement.x_mm)),
                translate_y: Some(Mm(g.height_mm - placement.top_mm - placement.height_mm)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
    }

    doc.save_to_bytes()
        .map_err(|e| NotesError::PdfRender(format!("serialise: {e:?}")))
}
