//! Pipeline stages behind [`crate::generate_notes`].
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! llm ──▶ search ──▶ resolve ──▶ normalize ──▶ layout ──▶ render
//! (notes)  (SerpApi)  (download)  (→ JPEG)      (pages)    (printpdf)
//! ```
//!
//! 1. [`llm`]       — run the agent task graph against an `edgequake-llm`
//!    provider with retry/backoff
//! 2. [`search`]    — query the image-search endpoint, keep the first result
//! 3. [`resolve`]   — derive the local filename and download the image
//! 4. [`normalize`] — decode and re-encode non-JPEG images for embedding
//! 5. [`layout`]    — split, wrap and paginate the text; place the image
//! 6. [`render`]    — write the laid-out pages as PDF bytes

pub mod layout;
pub mod llm;
pub mod normalize;
pub mod render;
pub mod resolve;
pub mod search;
