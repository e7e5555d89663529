//! Text layout: paragraphs → wrapped lines → pages.
//!
//! Layout is pure geometry with no PDF types, so pagination and image
//! placement are unit-tested without rendering anything. All vertical
//! positions are millimetres measured **down from the top edge** of the
//! page; [`crate::pipeline::render`] flips them to PDF's bottom-left origin.
//!
//! ## Geometry
//!
//! ```text
//!  ┌──────────────── 210 mm ────────────────┐
//!  │ 10 ┌──────── 190 mm text box ───────┐ 10│  top margin 10 mm
//!  │    │ paragraph lines, 10 mm each    │   │
//!  │    │ 10 mm gap between paragraphs   │   │
//!  │    │ image: x=10, w=130, below text │   │
//!  │    └────────────────────────────────┘   │  break trigger at 277 mm
//!  └─────────────────────────────────────────┘  297 mm
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

const PT_TO_MM: f32 = 25.4 / 72.0;

/// Page and typography constants for the notes document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_left_mm: f32,
    pub margin_right_mm: f32,
    pub margin_top_mm: f32,
    /// Distance from the bottom edge at which content breaks to a new page.
    pub margin_bottom_mm: f32,
    pub font_size_pt: f32,
    pub line_height_mm: f32,
    pub paragraph_gap_mm: f32,
    /// Horizontal padding inside the text box on each side.
    pub cell_padding_mm: f32,
    pub image_x_mm: f32,
    pub image_width_mm: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            margin_left_mm: 10.0,
            margin_right_mm: 10.0,
            margin_top_mm: 10.0,
            margin_bottom_mm: 20.0,
            font_size_pt: 12.0,
            line_height_mm: 10.0,
            paragraph_gap_mm: 10.0,
            cell_padding_mm: 1.0,
            image_x_mm: 10.0,
            image_width_mm: 130.0,
        }
    }
}

impl PageGeometry {
    pub fn font_size_mm(&self) -> f32 {
        self.font_size_pt * PT_TO_MM
    }

    /// Usable line width inside the margins and cell padding.
    pub fn text_width_mm(&self) -> f32 {
        self.width_mm - self.margin_left_mm - self.margin_right_mm - 2.0 * self.cell_padding_mm
    }

    /// Y position past which content moves to the next page.
    pub fn break_trigger_mm(&self) -> f32 {
        self.height_mm - self.margin_bottom_mm
    }
}

/// One line of text fixed on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedLine {
    pub text: String,
    pub x_mm: f32,
    /// Baseline, from the top edge.
    pub baseline_mm: f32,
    /// Index of the source paragraph.
    pub paragraph: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub lines: Vec<PlacedLine>,
}

/// Where the writing cursor sits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub page: usize,
    pub y_mm: f32,
}

/// Position and size of the image on its page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImagePlacement {
    pub page: usize,
    pub x_mm: f32,
    /// Top edge, from the top of the page.
    pub top_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

/// A fully paginated document body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
    /// Cursor immediately after the last paragraph.
    pub end_of_text: Cursor,
    pub paragraph_count: usize,
}

static RE_BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

/// Split text on blank lines; paragraphs are trimmed and empty ones dropped.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let normalised = text.replace("\r\n", "\n").replace('\r', "\n");
    RE_BLANK_LINE
        .split(&normalised)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Replace characters the built-in PDF fonts cannot show.
///
/// Typographic punctuation is folded to ASCII; Latin-1 letters are kept;
/// anything else becomes `?`.
pub fn printable_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' => ' ',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => '"',
            '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
            '\u{2022}' | '\u{25CF}' | '\u{25AA}' => '*',
            '\u{2026}' => '.',
            '\u{00A0}' | '\u{2002}'..='\u{200A}' => ' ',
            '\u{200B}' | '\u{FEFF}' => '\0',
            '\n' | ' '..='~' | '\u{00A1}'..='\u{00FF}' => c,
            _ => '?',
        })
        .filter(|&c| c != '\0')
        .collect()
}

/// Helvetica advance width in 1/1000 em for a character.
fn helvetica_width(c: char) -> u16 {
    const ASCII: [u16; 95] = [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
        278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
        667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
        722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
        278, 278, 278, 469, 556, 333, // '['..'`'
        556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
        556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
        334, 260, 334, 584, // '{'..'~'
    ];
    match c as u32 {
        n @ 32..=126 => ASCII[(n - 32) as usize],
        _ => 556,
    }
}

/// Rendered width of `s` in millimetres at `font_size_pt`.
pub fn text_width_mm(s: &str, font_size_pt: f32) -> f32 {
    let units: u32 = s.chars().map(|c| helvetica_width(c) as u32).sum();
    units as f32 / 1000.0 * font_size_pt * PT_TO_MM
}

/// Greedy word wrap; explicit newlines are kept and words wider than the
/// line are broken between characters.
pub fn wrap_paragraph(text: &str, max_width_mm: f32, font_size_pt: f32) -> Vec<String> {
    let fits = |s: &str| text_width_mm(s, font_size_pt) <= max_width_mm;
    let mut lines = Vec::new();

    for source_line in text.split('\n') {
        let mut current = String::new();
        for word in source_line.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if fits(&candidate) {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if fits(word) {
                current = word.to_string();
            } else {
                for ch in word.chars() {
                    current.push(ch);
                    if !fits(&current) {
                        current.pop();
                        lines.push(std::mem::take(&mut current));
                        current.push(ch);
                    }
                }
            }
        }
        lines.push(current);
    }

    lines
}

/// Lay paragraphs out onto as many pages as they need.
pub fn lay_out_text(text: &str, geometry: PageGeometry) -> Layout {
    let paragraphs = split_paragraphs(text);
    let g = geometry;
    let trigger = g.break_trigger_mm();
    let x = g.margin_left_mm + g.cell_padding_mm;
    let baseline_offset = g.line_height_mm / 2.0 + 0.3 * g.font_size_mm();

    let mut pages = vec![Page::default()];
    let mut y = g.margin_top_mm;
    let mut end_of_text = Cursor {
        page: 0,
        y_mm: y,
    };

    for (idx, paragraph) in paragraphs.iter().enumerate() {
        if idx > 0 {
            if y + g.paragraph_gap_mm > trigger {
                pages.push(Page::default());
                y = g.margin_top_mm;
            }
            y += g.paragraph_gap_mm;
        }

        for line in wrap_paragraph(paragraph, g.text_width_mm(), g.font_size_pt) {
            if y + g.line_height_mm > trigger && y > g.margin_top_mm {
                pages.push(Page::default());
                y = g.margin_top_mm;
            }
            let page = pages.len() - 1;
            pages[page].lines.push(PlacedLine {
                text: line,
                x_mm: x,
                baseline_mm: y + baseline_offset,
                paragraph: idx,
            });
            y += g.line_height_mm;
        }

        end_of_text = Cursor {
            page: pages.len() - 1,
            y_mm: y,
        };
    }

    debug!(
        "Laid out {} paragraphs on {} page(s)",
        paragraphs.len(),
        pages.len()
    );

    Layout {
        geometry: g,
        pages,
        end_of_text,
        paragraph_count: paragraphs.len(),
    }
}

impl Layout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Reserve space for an image of `px_width × px_height` below the text.
    ///
    /// The image goes at the fixed x offset and width, `1.2 × font size`
    /// below the last paragraph. If it would cross the break trigger it moves
    /// to the top of a new page; if it is taller than a whole page it is
    /// scaled down to fit.
    pub fn place_image(&mut self, px_width: u32, px_height: u32) -> ImagePlacement {
        let g = self.geometry;
        let aspect = px_height.max(1) as f32 / px_width.max(1) as f32;
        let mut width = g.image_width_mm;
        let mut height = width * aspect;

        let max_height = g.break_trigger_mm() - g.margin_top_mm;
        if height > max_height {
            height = max_height;
            width = height / aspect;
        }

        let mut page = self.end_of_text.page;
        let mut top = self.end_of_text.y_mm + 1.2 * g.font_size_mm();
        if top + height > g.break_trigger_mm() {
            self.pages.push(Page::default());
            page = self.pages.len() - 1;
            top = g.margin_top_mm;
        }

        ImagePlacement {
            page,
            x_mm: g.image_x_mm,
            top_mm: top,
            width_mm: width,
            height_mm: height,
        }
    }
}
