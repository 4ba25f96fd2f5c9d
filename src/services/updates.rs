//! Update Channel
//!
//! Bounded FIFO conduit carrying [`CellUpdate`] events from concurrent
//! workers to a single observer. Enqueue is non-blocking by default and
//! drops events when the observer falls behind (counting the drops); a
//! blocking variant is available when backpressure is wanted instead. The
//! channel never owns cell state: the workbook stays the authority and
//! events are notifications only.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use veritab_core::CellUpdate;

/// Default channel capacity, sized for bursts from a full worker pool.
pub const DEFAULT_UPDATE_CAPACITY: usize = 256;

/// Create a bounded update channel.
///
/// The sender half is cloned into every worker; exactly one consumer holds
/// the receiver and drains it on its own schedule.
pub fn update_channel(capacity: usize) -> (UpdateSender, UpdateReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        UpdateSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        UpdateReceiver { rx },
    )
}

/// Create an update channel with [`DEFAULT_UPDATE_CAPACITY`].
pub fn default_update_channel() -> (UpdateSender, UpdateReceiver) {
    update_channel(DEFAULT_UPDATE_CAPACITY)
}

/// Producer half of the update channel.
#[derive(Clone)]
pub struct UpdateSender {
    tx: mpsc::Sender<CellUpdate>,
    dropped: Arc<AtomicU64>,
}

impl UpdateSender {
    /// Enqueue without blocking. Returns `false` and counts the event as
    /// dropped when the channel is full or the observer is gone.
    pub fn emit(&self, update: CellUpdate) -> bool {
        match self.tx.try_send(update) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(update)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(cell = %update.cell(), "update channel full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Enqueue, waiting for capacity when the channel is full. Returns
    /// `false` only when the observer is gone.
    pub async fn emit_blocking(&self, update: CellUpdate) -> bool {
        self.tx.send(update).await.is_ok()
    }

    /// Number of events dropped by non-blocking enqueue so far.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half of the update channel.
pub struct UpdateReceiver {
    rx: mpsc::Receiver<CellUpdate>,
}

impl UpdateReceiver {
    /// Wait for the next event; `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<CellUpdate> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<CellUpdate> {
        self.rx.try_recv().ok()
    }

    /// Drain everything already queued, without waiting.
    pub fn collect_ready(&mut self) -> Vec<CellUpdate> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Adapt the receiver into a `Stream` for combinator-style observers.
    pub fn into_stream(self) -> ReceiverStream<CellUpdate> {
        ReceiverStream::new(self.rx)
    }
}
