//! Image normalisation: make a downloaded image safe to embed in the PDF.
//!
//! The document embeds baseline JPEG only. Anything else (PNG, GIF, a PNG
//! served with a `.jpg` name) is decoded, flattened onto white if it carries
//! an alpha channel, and re-encoded at quality 95 as `<stem>_converted.jpg`
//! next to the original. The original file is kept.
//!
//! The format is sniffed from the file content, not the extension, because
//! image hosts routinely serve WebP or PNG behind `.jpg` URLs.

use crate::error::ImageIssue;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// JPEG quality used for re-encoded images.
pub const JPEG_QUALITY: u8 = 95;

const CONVERTED_SUFFIX: &str = "_converted";

/// Return a JPEG path for `path`, converting when needed.
///
/// `None` in gives `(None, None)`. A decode or encode failure is logged and
/// returned as the issue alongside `None`; it is never raised.
pub fn ensure_pdf_compatible(path: Option<&Path>) -> (Option<PathBuf>, Option<ImageIssue>) {
    let Some(path) = path else {
        return (None, None);
    };
    match normalize_image(path) {
        Ok(p) => (Some(p), None),
        Err(issue) => {
            warn!("{}", issue);
            (None, Some(issue))
        }
    }
}

/// Fallible core of [`ensure_pdf_compatible`].
pub fn normalize_image(path: &Path) -> Result<PathBuf, ImageIssue> {
    let decode_failed = |detail: String| ImageIssue::DecodeFailed {
        path: path.to_path_buf(),
        detail,
    };

    let reader = ImageReader::open(path)
        .map_err(|e| decode_failed(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| decode_failed(e.to_string()))?;
    let format = reader.format();
    let img = reader.decode().map_err(|e| decode_failed(e.to_string()))?;

    if format == Some(ImageFormat::Jpeg) {
        debug!("{} is already JPEG", path.display());
        return Ok(path.to_path_buf());
    }

    let rgb = if img.color().has_alpha() {
        flatten_on_white(&img)
    } else {
        img.to_rgb8()
    };

    let out_path = converted_path(path);
    let file = std::fs::File::create(&out_path).map_err(|e| decode_failed(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| decode_failed(e.to_string()))?;

    info!(
        "Converted {:?} image {} → {}",
        format,
        path.display(),
        out_path.display()
    );
    Ok(out_path)
}

/// `<dir>/<stem>_converted.jpg` for a source path.
pub fn converted_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    path.with_file_name(format!("{stem}{CONVERTED_SUFFIX}.jpg"))
}

/// Composite every pixel over opaque white using its alpha.
fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u16;
        let blend = |c: u8| ((c as u16 * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}
