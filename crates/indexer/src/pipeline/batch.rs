//! Batch-blocking queues.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::model::IndexableObject;

use super::event::{IndexEvent, IndexOperation};

/// Two FIFO queues, one per operation, filled while batch blocking is on.
#[derive(Debug, Default)]
pub(crate) struct BatchQueues {
    index: Mutex<VecDeque<Arc<dyn IndexableObject>>>,
    delete: Mutex<VecDeque<Arc<dyn IndexableObject>>>,
}

impl BatchQueues {
    pub(crate) fn push(&self, event: IndexEvent) {
        match event.operation {
            IndexOperation::Index => self.index.lock().push_back(event.object),
            IndexOperation::Delete => self.delete.lock().push_back(event.object),
        }
    }

    pub(crate) fn take_index(&self) -> VecDeque<Arc<dyn IndexableObject>> {
        std::mem::take(&mut *self.index.lock())
    }

    pub(crate) fn take_delete(&self) -> VecDeque<Arc<dyn IndexableObject>> {
        std::mem::take(&mut *self.delete.lock())
    }

    pub(crate) fn len(&self) -> (usize, usize) {
        (self.index.lock().len(), self.delete.lock().len())
    }
}
