//! Streaming batch API: run the batch on its own task, consume events.
//!
//! [`spawn_batch`] moves the whole run onto a dedicated tokio task so a
//! caller driving a terminal or GUI never blocks on rendering or network
//! round-trips. Status updates arrive as an ordered [`BatchEvent`] stream:
//! every transition of one item is delivered before the next item starts,
//! and the stream ends with exactly one [`BatchEvent::Completed`].

use crate::batch::{Batch, Pipeline};
use crate::output::{BatchItem, BatchReport, ItemId, ItemStatus};
use crate::progress::BatchProgressCallback;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// One notification from a running batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    Started {
        total: usize,
    },
    Status {
        item_id: ItemId,
        source: PathBuf,
        status: ItemStatus,
    },
    Completed {
        succeeded: usize,
        failed: usize,
    },
}

/// Events of a spawned batch, in emission order.
pub type BatchEventStream = UnboundedReceiverStream<BatchEvent>;

/// Forwards callback events into a channel.
struct ChannelProgress {
    tx: UnboundedSender<BatchEvent>,
}

impl ChannelProgress {
    fn send(&self, event: BatchEvent) {
        // A dropped receiver only means nobody is watching; the batch goes on.
        let _ = self.tx.send(event);
    }
}

impl BatchProgressCallback for ChannelProgress {
    fn on_batch_start(&self, total_items: usize) {
        self.send(BatchEvent::Started { total: total_items });
    }

    fn on_status(&self, item: &BatchItem) {
        self.send(BatchEvent::Status {
            item_id: item.id,
            source: item.source.clone(),
            status: item.status.clone(),
        });
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        self.send(BatchEvent::Completed { succeeded, failed });
    }
}

/// Run `batch` on a dedicated task.
///
/// Returns the task handle (resolving to the final [`BatchReport`]) and the
/// event stream. Dropping the stream does not stop the batch.
///
/// # Example
/// ```rust,no_run
/// use millsheet_renamer::{spawn_batch, Batch, BatchEvent, Pipeline, RenameConfig};
/// use std::sync::Arc;
/// use tokio_stream::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = Arc::new(Pipeline::anthropic("sk-ant-...", RenameConfig::default())?);
/// let mut batch = Batch::new();
/// batch.add_paths(["scans/"]);
///
/// let (handle, mut events) = spawn_batch(pipeline, batch);
/// while let Some(event) = events.next().await {
///     if let BatchEvent::Status { item_id, status, .. } = event {
///         println!("#{item_id}: {}", status.label());
///     }
/// }
/// let report = handle.await?;
/// println!("{} renamed, {} failed", report.succeeded, report.failed);
/// # Ok(())
/// # }
/// ```
pub fn spawn_batch(
    pipeline: Arc<Pipeline>,
    batch: Batch,
) -> (JoinHandle<BatchReport>, BatchEventStream) {
    let (tx, rx) = unbounded_channel();
    let handle = tokio::spawn(async move {
        let progress = ChannelProgress { tx };
        pipeline.run(batch, &progress).await
    });
    (handle, UnboundedReceiverStream::new(rx))
}
