//! Filename building: [`ExtractionRecord`] → canonical, filesystem-safe name.
//!
//! The name is the six fields joined with `_` in a fixed order, with
//! [`PLACEHOLDER`] standing in for anything missing, then sanitised. The
//! function is pure and total: bad model output degrades to placeholders,
//! never to an error.

use crate::output::ExtractionRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Stand-in for an absent or empty field ("unknown").
pub const PLACEHOLDER: &str = "不明";

/// Joins the fields.
pub const SEPARATOR: &str = "_";

pub const EXTENSION: &str = ".pdf";

/// Build the filename for `record`.
///
/// ```rust
/// use millsheet_renamer::{build_filename, ExtractionRecord};
///
/// let record = ExtractionRecord {
///     date: Some("251125".into()),
///     spec: Some("SS400".into()),
///     ..Default::default()
/// };
/// assert_eq!(build_filename(&record), "251125_SS400_不明_不明_不明_不明.pdf");
/// ```
pub fn build_filename(record: &ExtractionRecord) -> String {
    let parts: Vec<&str> = record
        .fields()
        .into_iter()
        .map(|f| match f {
            Some(v) if !v.trim().is_empty() => v,
            _ => PLACEHOLDER,
        })
        .collect();

    sanitize_filename(&format!("{}{}", parts.join(SEPARATOR), EXTENSION))
}

static RE_ILLEGAL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"|?*]"#).unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Make `name` safe as a single path component.
///
/// Rules, in order: path separators become `_`; `< > : " | ? *` are removed;
/// whitespace runs collapse to one space; the ends are trimmed.
pub fn sanitize_filename(name: &str) -> String {
    let s = name.replace(['/', '\\'], "_");
    let s = RE_ILLEGAL.replace_all(&s, "");
    let s = RE_WHITESPACE.replace_all(&s, " ");
    s.trim().to_string()
}

/// A document paired with the name and directory it should end up in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub source: PathBuf,
    pub filename: String,
    pub target_dir: PathBuf,
}

impl RenamePlan {
    /// Plan the rename of `source`; without `output_dir` the file stays in
    /// its own directory.
    pub fn new(source: &Path, record: &ExtractionRecord, output_dir: Option<&Path>) -> Self {
        let target_dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => source
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        Self {
            source: source.to_path_buf(),
            filename: build_filename(record),
            target_dir,
        }
    }
}
