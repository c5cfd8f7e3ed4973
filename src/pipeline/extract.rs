//! Extraction client: page images + fixed instruction → [`ExtractionRecord`].
//!
//! [`Extractor`] is the seam the orchestrator talks to. [`AnthropicExtractor`]
//! is the production implementation: one authenticated HTTPS POST to the
//! Messages endpoint per document, no retries (the caller decides what a
//! failure means).
//!
//! ## Message Layout
//!
//! A single user message whose content is every page image, in page order,
//! followed by one text part carrying [`EXTRACTION_PROMPT`]. Images first,
//! instruction last, so the instruction refers to what the model has just
//! seen. A part encoded as [`ImageEncoding::Pdf`] goes out as a `document`
//! block instead of an `image` block.

use crate::config::{RenameConfig, API_VERSION};
use crate::error::{ItemError, RenamerError};
use crate::output::ExtractionRecord;
use crate::pipeline::encode::to_base64;
use crate::pipeline::postprocess::parse_answer;
use crate::pipeline::render::{ImageEncoding, PageImage};
use crate::prompts::EXTRACTION_PROMPT;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sends rendered pages to an extraction backend.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, pages: &[PageImage]) -> Result<ExtractionRecord, ItemError>;
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct WireMessage<'a> {
    pub role: &'static str,
    pub content: Vec<RequestPart<'a>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum RequestPart<'a> {
    Image { source: ImageSource },
    Document { source: ImageSource },
    Text { text: &'a str },
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ImageSource {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub media_type: &'static str,
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ResponseBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ResponseBlock::Text { text } => Some(text.as_str()),
            ResponseBlock::Other => None,
        })
    }
}

// ── Request / response mapping ───────────────────────────────────────────────

/// The transient request for one document: its pages plus the instruction.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub pages: &'a [PageImage],
    pub instruction: &'a str,
}

impl<'a> ExtractionRequest<'a> {
    pub fn new(pages: &'a [PageImage]) -> Self {
        Self {
            pages,
            instruction: EXTRACTION_PROMPT,
        }
    }

    pub(crate) fn to_wire(self, model: &'a str, max_tokens: u32) -> MessagesRequest<'a> {
        let mut content: Vec<RequestPart<'a>> = self
            .pages
            .iter()
            .map(|page| {
                let source = ImageSource {
                    kind: "base64",
                    media_type: page.encoding.media_type(),
                    data: to_base64(&page.data),
                };
                match page.encoding {
                    ImageEncoding::Png => RequestPart::Image { source },
                    ImageEncoding::Pdf => RequestPart::Document { source },
                }
            })
            .collect();
        content.push(RequestPart::Text {
            text: self.instruction,
        });

        MessagesRequest {
            model,
            max_tokens,
            messages: vec![WireMessage {
                role: "user",
                content,
            }],
        }
    }
}

/// Pull the record out of a 2xx response body.
pub(crate) fn parse_response_body(body: &str) -> Result<ExtractionRecord, ItemError> {
    let response: MessagesResponse =
        serde_json::from_str(body).map_err(|e| ItemError::MalformedResponse {
            detail: format!("response body is not a Messages object: {e}"),
        })?;

    let text = response
        .first_text()
        .ok_or_else(|| ItemError::MalformedResponse {
            detail: "response has no text content block".into(),
        })?;

    debug!("Extraction answer: {} chars", text.len());
    parse_answer(text)
}

// ── Production client ────────────────────────────────────────────────────────

/// HTTP client for the Anthropic Messages API.
pub struct AnthropicExtractor {
    http: reqwest::Client,
    api_key: HeaderValue,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

impl fmt::Debug for AnthropicExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicExtractor")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AnthropicExtractor {
    /// Build a client holding `api_key` for the lifetime of the run.
    pub fn new(api_key: impl Into<String>, config: &RenameConfig) -> Result<Self, RenamerError> {
        let api_key: String = api_key.into();
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(RenamerError::MissingCredential);
        }
        let mut api_key =
            HeaderValue::from_str(api_key).map_err(|_| RenamerError::InvalidCredential)?;
        api_key.set_sensitive(true);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| RenamerError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", self.api_key.clone());
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }
}

#[async_trait]
impl Extractor for AnthropicExtractor {
    async fn extract(&self, pages: &[PageImage]) -> Result<ExtractionRecord, ItemError> {
        let start = Instant::now();
        let request = ExtractionRequest::new(pages).to_wire(&self.model, self.max_tokens);
        debug!(model = %self.model, pages = pages.len(), "Sending extraction request");

        let response = self
            .http
            .post(&self.endpoint)
            .headers(self.headers())
            .json(&request)
            .send()
            .await
            .map_err(|e| ItemError::Transport {
                detail: if e.is_timeout() {
                    format!("timed out: {e}")
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ItemError::Transport {
            detail: format!("reading response body: {e}"),
        })?;

        if !status.is_success() {
            warn!("Extraction service returned HTTP {}", status.as_u16());
            return Err(ItemError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let record = parse_response_body(&body)?;
        info!(
            "Extracted fields from {} page(s) in {}ms",
            pages.len(),
            start.elapsed().as_millis()
        );
        Ok(record)
    }
}
