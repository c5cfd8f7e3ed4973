//! Batch orchestration: drive every file through render → extract → rename.
//!
//! Items are processed one at a time, in the order they were added. Each
//! item's failure is recorded on that item only; the batch always attempts
//! every file and always ends with a completion callback.
//!
//! ```text
//! Queued ─▶ Rendering ─▶ Extracting ─▶ Renaming ─▶ Done(path)
//!              │             │             │
//!              └─────────────┴─────────────┴──────▶ Failed(error)
//! ```

use crate::config::RenameConfig;
use crate::error::{ItemError, RenamerError};
use crate::output::{BatchItem, BatchReport, ItemId, ItemStatus};
use crate::pipeline::extract::{AnthropicExtractor, Extractor};
use crate::pipeline::mover;
use crate::pipeline::naming::RenamePlan;
use crate::pipeline::render::{DocumentRenderer, PageImage, PageRenderer, PdfiumRenderer};
use crate::progress::{BatchProgressCallback, NoopProgressCallback};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

// ── Batch ────────────────────────────────────────────────────────────────────

/// An ordered, de-duplicated set of files to process in one run.
#[derive(Debug, Default)]
pub struct Batch {
    items: Vec<BatchItem>,
    seen: HashSet<PathBuf>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one file. Returns `None` when the same absolute path is already
    /// queued.
    pub fn add(&mut self, path: impl AsRef<Path>) -> Option<ItemId> {
        let path = path.as_ref();
        let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        if !self.seen.insert(abs.clone()) {
            debug!("Skipping duplicate {}", abs.display());
            return None;
        }
        let id = self.items.len();
        self.items.push(BatchItem::new(id, abs));
        Some(id)
    }

    /// Queue PDF files, expanding directories recursively.
    ///
    /// Only `*.pdf` (any case) is kept. Files inside a directory are queued
    /// in sorted order. Returns how many new items were queued.
    pub fn add_paths<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut found = Vec::new();
        for p in paths {
            let p = p.as_ref();
            if p.is_dir() {
                collect_pdfs(p, &mut found);
            } else if is_pdf(p) {
                found.push(p.to_path_buf());
            } else {
                warn!("Ignoring non-PDF input {}", p.display());
            }
        }
        found.into_iter().filter_map(|p| self.add(p)).count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub(crate) fn into_items(self) -> Vec<BatchItem> {
        self.items
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Walk `dir` without following directory symlinks.
fn collect_pdfs(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read directory {}: {}", dir.display(), e);
            return;
        }
    };

    let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => collect_pdfs(&path, out),
            Ok(_) if is_pdf(&path) && path.is_file() => out.push(path),
            _ => {}
        }
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// The four stages wired together, reusable across batches.
pub struct Pipeline {
    renderer: Arc<dyn PageRenderer>,
    extractor: Arc<dyn Extractor>,
    config: RenameConfig,
}

impl Pipeline {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        extractor: Arc<dyn Extractor>,
        config: RenameConfig,
    ) -> Self {
        Self {
            renderer,
            extractor,
            config,
        }
    }

    /// The Anthropic extraction client fed by pdfium rendering, or by the
    /// whole document when [`RenameConfig::send_pdf`] is set.
    pub fn anthropic(api_key: impl Into<String>, config: RenameConfig) -> Result<Self, RenamerError> {
        let extractor = AnthropicExtractor::new(api_key, &config)?;
        let renderer: Arc<dyn PageRenderer> = if config.send_pdf {
            Arc::new(DocumentRenderer)
        } else {
            Arc::new(PdfiumRenderer::new(config.max_rendered_pixels))
        };
        Ok(Self::new(renderer, Arc::new(extractor), config))
    }

    pub fn config(&self) -> &RenameConfig {
        &self.config
    }

    /// Process every item of `batch` in order and report the outcome.
    pub async fn run(&self, batch: Batch, progress: &dyn BatchProgressCallback) -> BatchReport {
        let start = Instant::now();
        let mut items = batch.into_items();
        info!("Starting batch of {} file(s)", items.len());
        progress.on_batch_start(items.len());

        for item in items.iter_mut() {
            self.process_item(item, progress).await;
        }

        let report = BatchReport::from_items(items, start.elapsed().as_millis() as u64);
        info!(
            "Batch complete: {} renamed, {} failed, {}ms",
            report.succeeded, report.failed, report.duration_ms
        );
        progress.on_batch_complete(report.succeeded, report.failed);
        report
    }

    /// Drive one item to a terminal state.
    async fn process_item(&self, item: &mut BatchItem, progress: &dyn BatchProgressCallback) {
        let terminal = match self.execute(item, progress).await {
            Ok(path) => ItemStatus::Done(path),
            Err(e) => {
                warn!("{}: {}", item.source.display(), e);
                ItemStatus::Failed(e)
            }
        };
        transition(item, terminal, progress);
    }

    async fn execute(
        &self,
        item: &mut BatchItem,
        progress: &dyn BatchProgressCallback,
    ) -> Result<PathBuf, ItemError> {
        let source = item.source.clone();

        transition(item, ItemStatus::Rendering, progress);
        let pages = self.render(&source).await?;

        transition(item, ItemStatus::Extracting, progress);
        let record = self.extractor.extract(&pages).await?;
        drop(pages);
        debug!("{}: {:?}", source.display(), record);

        transition(item, ItemStatus::Renaming, progress);
        let plan = RenamePlan::new(&source, &record, self.config.output_dir.as_deref());
        mover::relocate(&plan.source, &plan.target_dir, &plan.filename)
    }

    async fn render(&self, path: &Path) -> Result<Vec<PageImage>, ItemError> {
        let renderer = Arc::clone(&self.renderer);
        let path = path.to_path_buf();
        let (max_pages, scale) = (self.config.max_pages, self.config.scale);

        tokio::task::spawn_blocking(move || renderer.render(&path, max_pages, scale))
            .await
            .map_err(|e| ItemError::RenderFailed {
                page: 0,
                detail: format!("render task panicked: {e}"),
            })?
    }
}

fn transition(item: &mut BatchItem, next: ItemStatus, progress: &dyn BatchProgressCallback) {
    if item.advance(next) {
        debug!("Item {} → {}", item.id, item.status.label());
        progress.on_status(item);
    }
}

/// Rename a single document outside of a batch.
pub async fn process_file(pipeline: &Pipeline, path: impl AsRef<Path>) -> Result<PathBuf, ItemError> {
    let path = path.as_ref();
    let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut item = BatchItem::new(0, abs);
    pipeline.execute(&mut item, &NoopProgressCallback).await
}
