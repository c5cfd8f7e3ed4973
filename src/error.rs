//! Error types for the millsheet-renamer library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`RenamerError`]: **Fatal**: the batch cannot start at all (no
//!   credential, invalid configuration, HTTP client could not be built).
//!   Returned as `Err(RenamerError)` before any file is touched.
//!
//! * [`ItemError`]: **Per document**: one file could not be renamed (corrupt
//!   PDF, service rejected the request, destination not writable) but every
//!   other file in the batch is still attempted. Stored inside
//!   [`crate::output::ItemStatus::Failed`] so callers can report each file
//!   individually.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that prevent a batch from starting.
///
/// Per-document failures use [`ItemError`] and never surface here.
#[derive(Debug, Error)]
pub enum RenamerError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No API key was supplied and none is saved.
    #[error(
        "No API key configured.\n\
Pass --api-key <KEY>, set ANTHROPIC_API_KEY, or save one with a previous run."
    )]
    MissingCredential,

    /// The API key cannot be sent as an HTTP header value.
    #[error("API key contains characters not allowed in an HTTP header")]
    InvalidCredential,

    /// The saved settings file could not be written.
    #[error("Failed to write settings file '{path}': {source}")]
    SettingsWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Setup errors ──────────────────────────────────────────────────────
    /// The HTTP client for the extraction service could not be built.
    #[error("Failed to initialise HTTP client: {0}")]
    HttpClient(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single document failed.
///
/// Every variant leaves the source file where it was, except that a
/// [`ItemError::Move`] happens after a successful (billed) extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ItemError {
    // ── Render errors ─────────────────────────────────────────────────────
    /// The file is missing, unreadable, or not a decodable PDF.
    #[error("Cannot open PDF '{path}': {detail}")]
    DocumentOpen { path: PathBuf, detail: String },

    /// pdfium opened the document but a page failed to rasterise.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// No pdfium library could be bound.
    #[error(
        "PDF renderer unavailable: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    RendererUnavailable(String),

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The extraction service answered with a non-success HTTP status.
    #[error("Extraction service error: HTTP {status}: {body}")]
    Service { status: u16, body: String },

    /// The request never produced an HTTP response (DNS, TLS, timeout).
    #[error("Extraction request failed: {detail}")]
    Transport { detail: String },

    /// The service answered 2xx but without a usable text block.
    #[error("Malformed extraction response: {detail}")]
    MalformedResponse { detail: String },

    /// The answer text was not a JSON object.
    #[error("Could not parse extracted fields as JSON: {cause}")]
    ResponseParse { cause: String },

    // ── Filesystem errors ─────────────────────────────────────────────────
    /// The file could not be moved to its new name.
    #[error("Failed to move '{from}' to '{to}': {cause}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        cause: String,
    },
}

impl ItemError {
    /// `true` when extraction already succeeded before the failure, so
    /// re-running this file would repeat a paid service call.
    pub fn extraction_completed(&self) -> bool {
        matches!(self, ItemError::Move { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_display() {
        let e = ItemError::Service {
            status: 401,
            body: "invalid x-api-key".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("401"), "got: {msg}");
        assert!(msg.contains("invalid x-api-key"), "got: {msg}");
    }

    #[test]
    fn document_open_display() {
        let e = ItemError::DocumentOpen {
            path: PathBuf::from("/tmp/a.pdf"),
            detail: "not a PDF".into(),
        };
        assert!(e.to_string().contains("/tmp/a.pdf"));
    }

    #[test]
    fn only_move_errors_follow_extraction() {
        let moved = ItemError::Move {
            from: "a.pdf".into(),
            to: "b.pdf".into(),
            cause: "permission denied".into(),
        };
        assert!(moved.extraction_completed());
        assert!(!ItemError::ResponseParse { cause: "eof".into() }.extraction_completed());
        assert!(!ItemError::Service {
            status: 500,
            body: String::new()
        }
        .extraction_completed());
    }

    #[test]
    fn missing_credential_mentions_flag() {
        assert!(RenamerError::MissingCredential
            .to_string()
            .contains("--api-key"));
    }

    #[test]
    fn item_error_serialises() {
        let e = ItemError::ResponseParse {
            cause: "expected value".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("ResponseParse"));
    }
}
