//! Message-broker delivery.
//!
//! The producer side ([`BrokerHandler`]) encodes each event as an
//! [`IndexMessage`] and publishes it to a queue. The consumer side
//! ([`BrokerConsumer`]) receives messages, resolves the host type through the
//! registry's reverse lookup, rebuilds the instance and applies it inline.
//! Ordering across producers and durability are whatever the transport
//! provides.

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{IndexerResult, PipelineError};
use crate::mapping::MappingRegistry;

use super::delivery::IndexEventHandler;
use super::event::{IndexEvent, IndexOperation};
use super::sync::SynchronousHandler;

/// Queue used when none is configured.
pub const DEFAULT_QUEUE: &str = "elasticSearchQueue";

/// Pause after a failed receive when none is configured.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Byte-level access to a message broker.
#[async_trait]
pub trait BrokerTransport: Send + Sync + Debug {
    /// Publishes one message.
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), PipelineError>;

    /// Waits for the next message. `None` means the queue was closed.
    async fn receive(&self, queue: &str) -> Result<Option<Vec<u8>>, PipelineError>;
}

/// Wire form of an index event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMessage {
    /// Document type of the instance.
    pub doc_type: String,
    /// Document id of the instance.
    pub id: String,
    /// What to do.
    pub operation: IndexOperation,
    /// The instance's host value tree.
    pub value: Value,
}

impl IndexMessage {
    /// Encodes to JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>, PipelineError> {
        serde_json::to_vec(self).map_err(|e| PipelineError::Decode {
            message: format!("cannot encode index message: {}", e),
        })
    }

    /// Decodes from JSON bytes.
    pub fn decode(payload: &[u8]) -> Result<Self, PipelineError> {
        serde_json::from_slice(payload).map_err(|e| PipelineError::Decode {
            message: e.to_string(),
        })
    }
}

/// Publishes events to the broker.
#[derive(Debug, Clone)]
pub struct BrokerHandler {
    transport: Arc<dyn BrokerTransport>,
    registry: Arc<MappingRegistry>,
    queue: String,
}

impl BrokerHandler {
    /// Creates a producer for `queue`.
    pub fn new(
        transport: Arc<dyn BrokerTransport>,
        registry: Arc<MappingRegistry>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            registry,
            queue: queue.into(),
        }
    }

    /// Target queue.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Builds the wire message for an event.
    pub fn message_for(&self, event: &IndexEvent) -> IndexerResult<IndexMessage> {
        let mapper = self.registry.get_mapper_for(event.model_type())?;
        let value = event.object.to_value()?;
        Ok(IndexMessage {
            doc_type: mapper.document_type().to_string(),
            id: mapper.document_id_of(&value)?,
            operation: event.operation,
            value,
        })
    }
}

#[async_trait]
impl IndexEventHandler for BrokerHandler {
    async fn handle(&self, event: IndexEvent) -> IndexerResult<()> {
        let message = self.message_for(&event)?;
        debug!(
            queue = %self.queue,
            doc_type = %message.doc_type,
            id = %message.id,
            operation = %message.operation,
            "Publishing index message"
        );
        self.transport.publish(&self.queue, message.encode()?).await?;
        Ok(())
    }
}

/// Consumes index messages and applies them inline.
#[derive(Debug, Clone)]
pub struct BrokerConsumer {
    transport: Arc<dyn BrokerTransport>,
    registry: Arc<MappingRegistry>,
    writer: SynchronousHandler,
    queue: String,
    reconnect_delay: Duration,
}

impl BrokerConsumer {
    /// Creates a consumer for `queue`.
    pub fn new(
        transport: Arc<dyn BrokerTransport>,
        registry: Arc<MappingRegistry>,
        writer: SynchronousHandler,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            registry,
            writer,
            queue: queue.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    /// Sets the pause between receive attempts after a transport failure.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Pause after a failed receive.
    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Decodes and applies one message.
    pub async fn apply(&self, payload: &[u8]) -> IndexerResult<()> {
        let message = IndexMessage::decode(payload)?;
        let model_type = self
            .registry
            .lookup_type(&message.doc_type)
            .ok_or_else(|| PipelineError::Decode {
                message: format!("unknown document type '{}'", message.doc_type),
            })?;
        let object = model_type
            .instantiate(message.value)
            .map_err(|e| PipelineError::Decode {
                message: format!("cannot rebuild {} {}: {}", message.doc_type, message.id, e),
            })?;
        self.writer
            .handle(IndexEvent::new(Arc::from(object), message.operation))
            .await
    }

    /// Receives and applies the next message.
    ///
    /// Returns `Ok(false)` once the queue is closed. Failures applying the
    /// message are logged, not returned.
    pub async fn process_next(&self) -> IndexerResult<bool> {
        let Some(payload) = self.transport.receive(&self.queue).await? else {
            return Ok(false);
        };
        if let Err(e) = self.apply(&payload).await {
            error!(queue = %self.queue, error = %e, "Failed to apply index message");
        }
        Ok(true)
    }

    /// Consumes until the queue closes.
    pub async fn run(self) {
        debug!(queue = %self.queue, "Broker consumer started");
        loop {
            match self.process_next().await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    warn!(
                        queue = %self.queue,
                        error = %e,
                        retry_in = ?self.reconnect_delay,
                        "Broker receive failed"
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
        debug!(queue = %self.queue, "Broker consumer stopped");
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// In-memory broker transport.
#[derive(Debug, Default)]
pub struct InProcessBroker {
    queues: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    available: Notify,
    closed: AtomicBool,
}

impl InProcessBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages waiting on `queue`.
    pub fn depth(&self, queue: &str) -> usize {
        self.queues.lock().get(queue).map(VecDeque::len).unwrap_or(0)
    }

    /// Closes every queue; receivers get `None` once drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.available.notify_waiters();
    }

    fn pop(&self, queue: &str) -> Option<Vec<u8>> {
        self.queues.lock().get_mut(queue).and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl BrokerTransport for InProcessBroker {
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), PipelineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PipelineError::Transport {
                queue: queue.to_string(),
                message: "broker is closed".to_string(),
            });
        }
        self.queues
            .lock()
            .entry(queue.to_string())
            .or_default()
            .push_back(payload);
        self.available.notify_waiters();
        Ok(())
    }

    async fn receive(&self, queue: &str) -> Result<Option<Vec<u8>>, PipelineError> {
        loop {
            let available = self.available.notified();
            tokio::pin!(available);
            available.as_mut().enable();

            if let Some(payload) = self.pop(queue) {
                return Ok(Some(payload));
            }
            if self.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }
            available.await;
        }
    }
}
