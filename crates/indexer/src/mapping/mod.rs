//! Object-document mapping.
//!
//! A [`MappingRegistry`] turns a type's static descriptor into a
//! [`ModelMapper`], whose [`FieldMapper`] tree generates the schema,
//! serializes instances into documents and inflates documents back.

pub mod conversion;
mod field;
mod model;
mod registry;

pub use conversion::{CanonicalType, convert, detect};
pub use field::{
    CollectionFieldMapper, DEFAULT_MAX_EMBED_DEPTH, EmbeddedFieldMapper, FieldMapper,
    MappingContext, SimpleFieldMapper,
};
pub use model::ModelMapper;
pub use registry::MappingRegistry;
