//! Delivery strategies.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::IndexerResult;

use super::event::IndexEvent;

/// Applies or forwards index events.
#[async_trait]
pub trait IndexEventHandler: Send + Sync + Debug {
    /// Handles one event.
    async fn handle(&self, event: IndexEvent) -> IndexerResult<()>;
}

/// How index events are delivered to the engine.
#[derive(Debug, Clone, Default)]
pub enum DeliveryMode {
    /// Applied inline before the caller continues.
    Synchronous,
    /// Queued to the in-process consumer task.
    #[default]
    Local,
    /// Published to the message broker.
    Broker,
    /// Dropped.
    Discard,
    /// Handed to an injected handler.
    Custom(Arc<dyn IndexEventHandler>),
}

impl DeliveryMode {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            DeliveryMode::Synchronous => "synchronous",
            DeliveryMode::Local => "local",
            DeliveryMode::Broker => "broker",
            DeliveryMode::Discard => "discard",
            DeliveryMode::Custom(_) => "custom",
        }
    }
}
