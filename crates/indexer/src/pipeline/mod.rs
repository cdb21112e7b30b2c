//! Index event pipeline.
//!
//! Lifecycle notifications from the primary store (`*.objectPersisted`,
//! `*.objectUpdated`, `*.objectDeleted`) become [`IndexEvent`]s for searchable
//! types and are delivered according to the active [`DeliveryMode`]:
//!
//! | Mode | Behavior |
//! |------|----------|
//! | `Synchronous` | written inline before the caller continues |
//! | `Local` | queued to a single in-process consumer task (default) |
//! | `Broker` | published to a message broker queue |
//! | `Discard` | dropped |
//! | `Custom` | handed to an injected [`IndexEventHandler`] |
//!
//! Batch blocking overrides the mode: events are held in two FIFO queues
//! until [`IndexEventPipeline::flush`] applies them inline.

mod batch;
mod broker;
mod delivery;
mod dispatch;
mod event;
mod local;
mod sync;

pub use broker::{
    BrokerConsumer, BrokerHandler, BrokerTransport, DEFAULT_QUEUE, DEFAULT_RECONNECT_DELAY,
    InProcessBroker, IndexMessage,
};
pub use delivery::{DeliveryMode, IndexEventHandler};
pub use dispatch::{FlushSummary, IndexEventPipeline};
pub use event::{IndexEvent, IndexOperation};
pub use local::LocalHandler;
pub use sync::SynchronousHandler;
