//! Pipeline stages for renaming one certificate.
//!
//! Each submodule implements exactly one step, so each is independently
//! testable and the rasterisation or extraction backend can be swapped
//! without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ extract ──▶ postprocess ──▶ naming ──▶ mover
//! (pdfium)   (HTTPS)     (JSON fields)   (name)     (rename)
//! ```
//!
//! 1. [`render`] : rasterise the leading pages to PNG ([`encode`] does the
//!    PNG and base64 work)
//! 2. [`extract`]: one Messages API call per document; the only stage with
//!    network I/O
//! 3. [`postprocess`]: strip code fences from the answer and coerce it into
//!    an [`crate::output::ExtractionRecord`]
//! 4. [`naming`] : pure, total filename builder
//! 5. [`mover`]  : collision-safe relocation

pub mod encode;
pub mod extract;
pub mod mover;
pub mod naming;
pub mod postprocess;
pub mod render;
