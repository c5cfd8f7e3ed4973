//! PDF rasterisation: render the leading pages of a document to PNG, or pass
//! the document through untouched ([`DocumentRenderer`]).
//!
//! ## Why a trait?
//!
//! The rest of the pipeline only needs "path in, ordered page images out".
//! [`PageRenderer`] is that seam: [`PdfiumRenderer`] is the production
//! backend, [`DocumentRenderer`] skips pdfium altogether, and tests drive the
//! orchestrator with an in-memory fake.
//!
//! ## Blocking
//!
//! pdfium is a synchronous C++ library. [`PageRenderer::render`] is a plain
//! blocking call; the orchestrator runs it on `spawn_blocking`.

use crate::error::ItemError;
use crate::pipeline::encode;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable pointing at an existing pdfium shared library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Format of a [`PageImage`] payload.
///
/// `Png` is a rasterised page. `Pdf` is the untouched source document, sent
/// as a single `document` block when rasterisation is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageEncoding {
    #[default]
    Png,
    Pdf,
}

impl ImageEncoding {
    pub fn media_type(self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
            ImageEncoding::Pdf => "application/pdf",
        }
    }
}

/// One rendered page, ready to ship to the extraction service.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 0-based page index.
    pub index: usize,
    /// Encoded payload: one PNG page, or the whole PDF.
    pub data: Vec<u8>,
    pub encoding: ImageEncoding,
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("index", &self.index)
            .field("bytes", &self.data.len())
            .field("encoding", &self.encoding)
            .finish()
    }
}

/// Turns a PDF path into an ordered sequence of page images.
pub trait PageRenderer: Send + Sync {
    /// Render up to `max_pages` leading pages at `scale` × native size.
    fn render(&self, path: &Path, max_pages: usize, scale: f32)
        -> Result<Vec<PageImage>, ItemError>;
}

/// pdfium-backed renderer.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    max_rendered_pixels: u32,
}

impl PdfiumRenderer {
    pub fn new(max_rendered_pixels: u32) -> Self {
        Self {
            max_rendered_pixels,
        }
    }
}

impl Default for PdfiumRenderer {
    fn default() -> Self {
        Self::new(4000)
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render(
        &self,
        path: &Path,
        max_pages: usize,
        scale: f32,
    ) -> Result<Vec<PageImage>, ItemError> {
        check_pdf_magic(path)?;
        let pdfium = bind_pdfium()?;
        render_with(&pdfium, path, max_pages, scale, self.max_rendered_pixels)
    }
}

// ── Document mode ────────────────────────────────────────────────────────────

/// Largest PDF the Messages API accepts as a `document` block.
pub const MAX_DOCUMENT_BYTES: u64 = 32 * 1024 * 1024;

/// Skips rasterisation: hands the whole PDF over as one [`ImageEncoding::Pdf`]
/// part and lets the service read every page itself.
///
/// Needs no pdfium library. `max_pages` and `scale` are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentRenderer;

impl PageRenderer for DocumentRenderer {
    fn render(
        &self,
        path: &Path,
        _max_pages: usize,
        _scale: f32,
    ) -> Result<Vec<PageImage>, ItemError> {
        check_pdf_magic(path)?;

        let open_err = |detail: String| ItemError::DocumentOpen {
            path: path.to_path_buf(),
            detail,
        };
        let size = std::fs::metadata(path)
            .map_err(|e| open_err(e.to_string()))?
            .len();
        if size > MAX_DOCUMENT_BYTES {
            return Err(open_err(format!(
                "{size} bytes exceeds the {MAX_DOCUMENT_BYTES}-byte document limit"
            )));
        }

        let data = std::fs::read(path).map_err(|e| open_err(e.to_string()))?;
        info!("Sending {} as a whole document ({} bytes)", path.display(), data.len());
        Ok(vec![PageImage {
            index: 0,
            data,
            encoding: ImageEncoding::Pdf,
        }])
    }
}

/// Render with the default [`PdfiumRenderer`].
pub fn render_document(
    path: &Path,
    max_pages: usize,
    scale: f32,
) -> Result<Vec<PageImage>, ItemError> {
    PdfiumRenderer::default().render(path, max_pages, scale)
}

/// Number of pages to render: `min(max_pages, page_count)`.
pub fn pages_to_render(max_pages: usize, page_count: usize) -> usize {
    max_pages.min(page_count)
}

/// How far into the file the `%PDF-` header may start (a BOM or a scanner
/// preamble can precede it).
const HEADER_SEARCH_WINDOW: u64 = 1024;

/// Reject files that are missing, unreadable, or carry no `%PDF-` header in
/// their first [`HEADER_SEARCH_WINDOW`] bytes.
fn check_pdf_magic(path: &Path) -> Result<(), ItemError> {
    let open_err = |detail: String| ItemError::DocumentOpen {
        path: path.to_path_buf(),
        detail,
    };

    let file = std::fs::File::open(path).map_err(|e| open_err(e.to_string()))?;
    let mut head = Vec::with_capacity(HEADER_SEARCH_WINDOW as usize);
    file.take(HEADER_SEARCH_WINDOW)
        .read_to_end(&mut head)
        .map_err(|e| open_err(e.to_string()))?;

    if head.is_empty() {
        return Err(open_err("file is empty".into()));
    }
    if !head.windows(5).any(|w| w == b"%PDF-") {
        let shown = &head[..head.len().min(4)];
        return Err(open_err(format!("not a PDF (first bytes {shown:?})")));
    }
    Ok(())
}

/// Bind pdfium from `PDFIUM_LIB_PATH`, the working directory, or the system.
fn bind_pdfium() -> Result<Pdfium, ItemError> {
    let bindings = match std::env::var_os(PDFIUM_LIB_PATH_ENV) {
        Some(lib) => Pdfium::bind_to_library(&lib)
            .map_err(|e| ItemError::RendererUnavailable(format!("{lib:?}: {e:?}")))?,
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| ItemError::RendererUnavailable(format!("{e:?}")))?,
    };
    Ok(Pdfium::new(bindings))
}

fn render_with(
    pdfium: &Pdfium,
    path: &Path,
    max_pages: usize,
    scale: f32,
    max_pixels: u32,
) -> Result<Vec<PageImage>, ItemError> {
    // `document` is dropped (and closed in pdfium) on every return path.
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| ItemError::DocumentOpen {
            path: path.to_path_buf(),
            detail: format!("{e:?}"),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let count = pages_to_render(max_pages, total_pages);
    info!(
        "PDF loaded: {} pages, rendering {} from {}",
        total_pages,
        count,
        path.display()
    );

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut images = Vec::with_capacity(count);
    for idx in 0..count {
        let page = pages
            .get(idx as u16)
            .map_err(|e| ItemError::RenderFailed {
                page: idx + 1,
                detail: format!("{e:?}"),
            })?;

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| ItemError::RenderFailed {
                page: idx + 1,
                detail: format!("{e:?}"),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        let data = encode::encode_png(&image).map_err(|e| ItemError::RenderFailed {
            page: idx + 1,
            detail: format!("PNG encoding failed: {e}"),
        })?;

        images.push(PageImage {
            index: idx,
            data,
            encoding: ImageEncoding::Png,
        });
    }

    Ok(images)
}
