//! Index events and lifecycle notification classification.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::{IndexableObject, Model, ModelType};

const PERSISTED_SUFFIX: &str = ".objectPersisted";
const UPDATED_SUFFIX: &str = ".objectUpdated";
const DELETED_SUFFIX: &str = ".objectDeleted";

/// What an event does to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOperation {
    /// Upsert the object's document.
    Index,
    /// Remove the object's document.
    Delete,
}

impl IndexOperation {
    /// Classifies a lifecycle notification name.
    ///
    /// Create and update notifications index, delete notifications delete,
    /// and everything else is ignored.
    pub fn from_notification(event_name: &str) -> Option<Self> {
        if event_name.ends_with(PERSISTED_SUFFIX) || event_name.ends_with(UPDATED_SUFFIX) {
            Some(IndexOperation::Index)
        } else if event_name.ends_with(DELETED_SUFFIX) {
            Some(IndexOperation::Delete)
        } else {
            None
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexOperation::Index => "index",
            IndexOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for IndexOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending change to the index.
#[derive(Debug, Clone)]
pub struct IndexEvent {
    /// The instance the event is about.
    pub object: Arc<dyn IndexableObject>,
    /// What to do with it.
    pub operation: IndexOperation,
}

impl IndexEvent {
    /// Creates an event for an erased instance.
    pub fn new(object: Arc<dyn IndexableObject>, operation: IndexOperation) -> Self {
        Self { object, operation }
    }

    /// An index event for `instance`.
    pub fn index<T: Model>(instance: T) -> Self {
        Self::new(Arc::new(instance), IndexOperation::Index)
    }

    /// A delete event for `instance`.
    pub fn delete<T: Model>(instance: T) -> Self {
        Self::new(Arc::new(instance), IndexOperation::Delete)
    }

    /// The instance's type.
    pub fn model_type(&self) -> ModelType {
        self.object.model_type()
    }
}
