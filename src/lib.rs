//! # millsheet-renamer
//!
//! Rename steel mill certificate PDFs ("mill sheets") from fields a vision
//! language model reads off the first pages.
//!
//! ## Why this crate?
//!
//! Mill certificates arrive as scans named `scan0042.pdf`. The information a
//! site office files them by (issue date, grade, size, charge number,
//! project, mill) is printed on the page in a different layout for every
//! mill. This crate renders the leading pages to PNG, asks a VLM for those
//! six fields as JSON, and moves each file to a canonical name such as
//! `251125_SS400_19.00x1540xCOIL_AE4652_ほぼゼロ_東京製鉄.pdf`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Render   first N pages via pdfium (blocking, spawn_blocking)
//!  ├─ 2. Extract  images + instruction → Messages API → JSON fields
//!  ├─ 3. Name     fields → sanitised `a_b_c_d_e_f.pdf`
//!  └─ 4. Move     collision-safe rename into the target directory
//! ```
//!
//! A [`Batch`] runs that per file, sequentially, isolating failures: one bad
//! PDF or one rejected request never stops the rest.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use millsheet_renamer::{Batch, NoopProgressCallback, Pipeline, RenameConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RenameConfig::builder().output_dir("renamed").build()?;
//!     let pipeline = Pipeline::anthropic(std::env::var("ANTHROPIC_API_KEY")?, config)?;
//!
//!     let mut batch = Batch::new();
//!     batch.add_paths(["inbox/"]);
//!
//!     let report = pipeline.run(batch, &NoopProgressCallback).await;
//!     for item in &report.items {
//!         match (item.final_path(), item.error()) {
//!             (Some(p), _) => println!("{} → {}", item.source.display(), p.display()),
//!             (_, Some(e)) => eprintln!("{}: {e}", item.source.display()),
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `millsheet-rename` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod settings;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{process_file, Batch, Pipeline};
pub use config::{RenameConfig, RenameConfigBuilder};
pub use error::{ItemError, RenamerError};
pub use output::{BatchItem, BatchReport, ExtractionRecord, ItemId, ItemStatus};
pub use pipeline::extract::{AnthropicExtractor, ExtractionRequest, Extractor};
pub use pipeline::naming::{build_filename, sanitize_filename, RenamePlan, PLACEHOLDER};
pub use pipeline::render::{
    render_document, DocumentRenderer, ImageEncoding, PageImage, PageRenderer, PdfiumRenderer,
};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use settings::{KeySource, Settings};
pub use stream::{spawn_batch, BatchEvent, BatchEventStream};
