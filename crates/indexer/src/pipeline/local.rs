//! In-process queued delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, error};

use crate::error::{IndexerResult, PipelineError};

use super::delivery::IndexEventHandler;
use super::event::IndexEvent;
use super::sync::SynchronousHandler;

#[derive(Debug, Default)]
struct ConsumerStats {
    processed: AtomicU64,
    failed: AtomicU64,
    pending: AtomicUsize,
    idle: Notify,
}

/// Queues events to a single consumer task that applies them in order.
///
/// The consumer is spawned on the first event. A failed event is logged and
/// counted; the consumer moves on to the next one. Events are not retried.
#[derive(Debug)]
pub struct LocalHandler {
    writer: SynchronousHandler,
    sender: mpsc::UnboundedSender<IndexEvent>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<IndexEvent>>>,
    started: AtomicBool,
    stats: Arc<ConsumerStats>,
}

impl LocalHandler {
    /// Creates a handler; the consumer starts with the first event.
    pub fn new(writer: SynchronousHandler) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            writer,
            sender,
            receiver: Mutex::new(Some(receiver)),
            started: AtomicBool::new(false),
            stats: Arc::new(ConsumerStats::default()),
        }
    }

    /// Spawns the consumer task. Later calls do nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let Some(mut receiver) = self.receiver.lock().take() else {
            return;
        };

        let writer = self.writer.clone();
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            debug!("Local index consumer started");
            while let Some(event) = receiver.recv().await {
                let operation = event.operation;
                match writer.handle(event).await {
                    Ok(()) => {
                        stats.processed.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        stats.failed.fetch_add(1, Ordering::SeqCst);
                        error!(operation = %operation, error = %e, "Failed to apply queued index event");
                    }
                }
                if stats.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                    stats.idle.notify_waiters();
                }
            }
            debug!("Local index consumer stopped");
        });
    }

    /// Returns true once the consumer has been spawned.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Events applied successfully.
    pub fn processed(&self) -> u64 {
        self.stats.processed.load(Ordering::SeqCst)
    }

    /// Events whose application failed.
    pub fn failed(&self) -> u64 {
        self.stats.failed.load(Ordering::SeqCst)
    }

    /// Events queued but not yet applied.
    pub fn pending(&self) -> usize {
        self.stats.pending.load(Ordering::SeqCst)
    }

    /// Waits until every queued event has been applied.
    pub async fn drain(&self) {
        loop {
            let idle = self.stats.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            idle.await;
        }
    }
}

#[async_trait]
impl IndexEventHandler for LocalHandler {
    async fn handle(&self, event: IndexEvent) -> IndexerResult<()> {
        self.start();
        self.stats.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(event).is_err() {
            self.stats.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(PipelineError::QueueClosed.into());
        }
        Ok(())
    }
}
