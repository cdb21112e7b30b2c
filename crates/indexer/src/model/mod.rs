//! Host types and their type-erased handles.
//!
//! Application types become indexable by implementing [`Model`], which ties
//! serde (used to read and write instances as value trees) to a static
//! [`ModelDescriptor`]. Events, broker messages and heterogeneous results
//! carry instances as [`IndexableObject`] trait objects and types as
//! [`ModelType`] handles.
//!
//! # Example
//!
//! ```
//! use helios_indexer::model::{
//!     FieldDescriptor, HostType, Model, ModelDescriptor, Searchable,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Post {
//!     id: i64,
//!     title: String,
//! }
//!
//! impl Model for Post {
//!     fn descriptor() -> ModelDescriptor {
//!         ModelDescriptor::of::<Self>()
//!             .named("models.Post")
//!             .searchable(Searchable::new())
//!             .field(FieldDescriptor::new("id", HostType::I64))
//!             .field(FieldDescriptor::new("title", HostType::String))
//!     }
//! }
//!
//! assert!(Post::descriptor().is_searchable());
//! ```

mod descriptor;

use std::any::{Any, TypeId};
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use descriptor::{
    AnalysisSettings, Analyzer, DescriptorFn, EmbedDeclaration, EmbedMode, FieldDescriptor,
    FieldMapping, HostType, IndexHint, ModelDescriptor, Searchable, StoreHint, TemplateFn,
    TokenFilter, derive_type_name,
};

/// A host type that can be mapped to and from documents.
///
/// Embedded child types implement this trait too; only types whose descriptor
/// carries a [`Searchable`] declaration get their own index.
pub trait Model:
    Serialize + DeserializeOwned + Default + fmt::Debug + Send + Sync + 'static
{
    /// Returns the static field-descriptor table.
    fn descriptor() -> ModelDescriptor;
}

/// Type-erased handle to a [`Model`] type.
#[derive(Clone, Copy)]
pub struct ModelType {
    type_id: TypeId,
    descriptor: DescriptorFn,
    from_value: fn(Value) -> Result<Box<dyn IndexableObject>, serde_json::Error>,
}

fn erased_from_value<T: Model>(value: Value) -> Result<Box<dyn IndexableObject>, serde_json::Error> {
    let model: T = serde_json::from_value(value)?;
    Ok(Box::new(model))
}

impl ModelType {
    /// Returns the handle for `T`.
    pub fn of<T: Model>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            descriptor: T::descriptor,
            from_value: erased_from_value::<T>,
        }
    }

    /// Rust type id.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Builds the descriptor.
    pub fn descriptor(&self) -> ModelDescriptor {
        (self.descriptor)()
    }

    /// Rebuilds an instance from its value tree.
    pub fn instantiate(&self, value: Value) -> Result<Box<dyn IndexableObject>, serde_json::Error> {
        (self.from_value)(value)
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ModelType {}

impl std::hash::Hash for ModelType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModelType")
            .field(&self.descriptor().type_name())
            .finish()
    }
}

/// Object-safe view of a model instance.
pub trait IndexableObject: fmt::Debug + Send + Sync + 'static {
    /// The instance's type handle.
    fn model_type(&self) -> ModelType;

    /// Serializes the instance into its value tree.
    fn to_value(&self) -> Result<Value, serde_json::Error>;

    /// Borrows the instance as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Converts the boxed instance into a boxed [`Any`].
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<T: Model> IndexableObject for T {
    fn model_type(&self) -> ModelType {
        ModelType::of::<T>()
    }

    fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

/// A materialized hit of any registered type.
#[derive(Debug)]
pub struct AnyModel(Box<dyn IndexableObject>);

impl AnyModel {
    /// Wraps an erased instance.
    pub fn new(object: Box<dyn IndexableObject>) -> Self {
        Self(object)
    }

    /// The wrapped instance's type handle.
    pub fn model_type(&self) -> ModelType {
        self.0.model_type()
    }

    /// Returns true if the instance is a `T`.
    pub fn is<T: Model>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// Borrows the instance as `T`.
    pub fn downcast_ref<T: Model>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Takes the instance as `T`; `None` if it is some other type.
    pub fn downcast<T: Model>(self) -> Option<T> {
        self.0.into_any().downcast::<T>().ok().map(|model| *model)
    }

    /// Borrows the erased instance.
    pub fn as_object(&self) -> &dyn IndexableObject {
        self.0.as_ref()
    }
}
