//! Run configuration for a rename batch.
//!
//! Every knob that affects how a document is rendered, sent to the extraction
//! service, and where it lands lives in [`RenameConfig`], built via its
//! [`RenameConfigBuilder`]. The credential is not part of it:
//! it is passed to [`crate::pipeline::extract::AnthropicExtractor::new`]
//! explicitly so a config can be logged or serialised without leaking it.

use crate::error::RenamerError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Messages endpoint of the extraction service.
pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Protocol version sent in the `anthropic-version` header.
pub const API_VERSION: &str = "2023-06-01";

/// Vision model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Configuration for a rename batch.
///
/// Built via [`RenameConfig::builder()`] or using [`RenameConfig::default()`].
///
/// # Example
/// ```rust
/// use millsheet_renamer::RenameConfig;
///
/// let config = RenameConfig::builder()
///     .max_pages(1)
///     .scale(1.5)
///     .output_dir("/tmp/renamed")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_pages, 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameConfig {
    /// Render at most this many leading pages per document. Default: 2.
    ///
    /// Mill certificates carry every field on the first page; the second page
    /// catches multi-page sheets where the charge table continues.
    pub max_pages: usize,

    /// Zoom factor relative to the page's native size. Default: 2.0.
    pub scale: f32,

    /// Longest-edge cap for a rendered page in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// Send the whole PDF as a `document` block instead of rendered pages.
    /// Default: false.
    ///
    /// No pdfium library is needed; `max_pages`, `scale` and
    /// `max_rendered_pixels` are then unused.
    pub send_pdf: bool,

    /// Where renamed files go. `None` keeps each file in its own directory.
    pub output_dir: Option<PathBuf>,

    /// Extraction model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Output token bound for the extraction answer. Default: 1000.
    pub max_tokens: u32,

    /// Timeout for one extraction round-trip in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Extraction endpoint URL. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            max_pages: 2,
            scale: 2.0,
            max_rendered_pixels: 4000,
            send_pdf: false,
            output_dir: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1000,
            api_timeout_secs: 120,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl RenameConfig {
    /// Create a new builder for `RenameConfig`.
    pub fn builder() -> RenameConfigBuilder {
        RenameConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RenameConfig`].
#[derive(Debug)]
pub struct RenameConfigBuilder {
    config: RenameConfig,
}

impl RenameConfigBuilder {
    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n.max(1);
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = scale.clamp(0.25, 8.0);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn send_pdf(mut self, enabled: bool) -> Self {
        self.config.send_pdf = enabled;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenameConfig, RenamerError> {
        let c = &self.config;
        if !c.scale.is_finite() {
            return Err(RenamerError::InvalidConfig(format!(
                "Scale must be a finite number, got {}",
                c.scale
            )));
        }
        if c.model.trim().is_empty() {
            return Err(RenamerError::InvalidConfig("Model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(RenamerError::InvalidConfig("Max tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(RenamerError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if !(c.endpoint.starts_with("https://") || c.endpoint.starts_with("http://")) {
            return Err(RenamerError::InvalidConfig(format!(
                "Endpoint must be an HTTP(S) URL, got '{}'",
                c.endpoint
            )));
        }
        Ok(self.config)
    }
}
