//! Data model shared by the pipeline stages and the batch orchestrator.

use crate::error::ItemError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Fields extracted from one certificate.
///
/// Each field is optional: the model may omit a key, return `null`, or return
/// an empty string, and all three are treated the same way when the filename
/// is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// Issue date, `YYMMDD`.
    pub date: Option<String>,
    /// Steel grade, e.g. `SS400`.
    pub spec: Option<String>,
    /// Dimensions, e.g. `19.00x1540xCOIL`.
    pub size: Option<String>,
    /// Heat / charge number.
    pub charge_no: Option<String>,
    /// Project name.
    pub project: Option<String>,
    /// Mill name.
    pub maker: Option<String>,
}

impl ExtractionRecord {
    /// Field values in filename order.
    pub fn fields(&self) -> [Option<&str>; 6] {
        [
            self.date.as_deref(),
            self.spec.as_deref(),
            self.size.as_deref(),
            self.charge_no.as_deref(),
            self.project.as_deref(),
            self.maker.as_deref(),
        ]
    }
}

/// Position of an item in its batch (insertion order, 0-based).
pub type ItemId = usize;

/// Where an item is in the pipeline.
///
/// Transitions only move forward: `Queued → Rendering → Extracting →
/// Renaming → Done`, with `Failed` reachable from any non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum ItemStatus {
    Queued,
    Rendering,
    Extracting,
    Renaming,
    Done(PathBuf),
    Failed(ItemError),
}

impl ItemStatus {
    fn rank(&self) -> u8 {
        match self {
            ItemStatus::Queued => 0,
            ItemStatus::Rendering => 1,
            ItemStatus::Extracting => 2,
            ItemStatus::Renaming => 3,
            ItemStatus::Done(_) | ItemStatus::Failed(_) => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Done(_) | ItemStatus::Failed(_))
    }

    /// Whether moving from `self` to `next` respects the forward-only order.
    pub fn can_transition_to(&self, next: &ItemStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Short label for progress displays.
    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::Rendering => "rendering",
            ItemStatus::Extracting => "extracting",
            ItemStatus::Renaming => "renaming",
            ItemStatus::Done(_) => "done",
            ItemStatus::Failed(_) => "failed",
        }
    }
}

/// One file in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: ItemId,
    pub source: PathBuf,
    pub status: ItemStatus,
}

impl BatchItem {
    pub(crate) fn new(id: ItemId, source: PathBuf) -> Self {
        Self {
            id,
            source,
            status: ItemStatus::Queued,
        }
    }

    /// Apply `next` if it is a forward transition; returns whether it applied.
    pub(crate) fn advance(&mut self, next: ItemStatus) -> bool {
        if self.status.can_transition_to(&next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Final path when the item finished successfully.
    pub fn final_path(&self) -> Option<&Path> {
        match &self.status {
            ItemStatus::Done(p) => Some(p),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ItemError> {
        match &self.status {
            ItemStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Outcome of a finished batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl BatchReport {
    pub(crate) fn from_items(items: Vec<BatchItem>, duration_ms: u64) -> Self {
        let succeeded = items.iter().filter(|i| i.final_path().is_some()).count();
        let failed = items.iter().filter(|i| i.error().is_some()).count();
        Self {
            items,
            succeeded,
            failed,
            duration_ms,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_path_is_accepted_in_order() {
        let mut item = BatchItem::new(0, "/a.pdf".into());
        assert!(item.advance(ItemStatus::Rendering));
        assert!(item.advance(ItemStatus::Extracting));
        assert!(item.advance(ItemStatus::Renaming));
        assert!(item.advance(ItemStatus::Done("/b.pdf".into())));
        assert_eq!(item.final_path(), Some(Path::new("/b.pdf")));
    }

    #[test]
    fn back_transitions_are_rejected() {
        let mut item = BatchItem::new(0, "/a.pdf".into());
        item.advance(ItemStatus::Extracting);
        assert!(!item.advance(ItemStatus::Rendering));
        assert_eq!(item.status, ItemStatus::Extracting);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut item = BatchItem::new(0, "/a.pdf".into());
        let err = ItemError::Transport {
            detail: "timed out".into(),
        };
        assert!(item.advance(ItemStatus::Failed(err)));
        assert!(!item.advance(ItemStatus::Done("/b.pdf".into())));
        assert!(item.error().is_some());
    }

    #[test]
    fn failure_is_reachable_from_queued() {
        assert!(ItemStatus::Queued.can_transition_to(&ItemStatus::Failed(
            ItemError::MalformedResponse {
                detail: String::new()
            }
        )));
    }

    #[test]
    fn report_counts_outcomes() {
        let mut ok = BatchItem::new(0, "/a.pdf".into());
        ok.advance(ItemStatus::Done("/x.pdf".into()));
        let mut bad = BatchItem::new(1, "/b.pdf".into());
        bad.advance(ItemStatus::Failed(ItemError::ResponseParse {
            cause: "eof".into(),
        }));
        let report = BatchReport::from_items(vec![ok, bad], 5);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert!(!report.all_succeeded());
    }

    #[test]
    fn record_fields_follow_filename_order() {
        let r = ExtractionRecord {
            date: Some("d".into()),
            maker: Some("m".into()),
            ..Default::default()
        };
        let f = r.fields();
        assert_eq!(f[0], Some("d"));
        assert_eq!(f[1], None);
        assert_eq!(f[5], Some("m"));
    }
}
