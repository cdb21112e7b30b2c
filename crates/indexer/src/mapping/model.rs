//! Per-type mapping descriptor.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::MappingError;
use crate::model::{
    AnalysisSettings, IndexableObject, Model, ModelDescriptor, ModelType, TemplateFn,
    derive_type_name,
};

use super::field::{FieldMapper, MappingContext};

/// Mapping between one searchable host type and its documents.
///
/// Built once per type by the [`MappingRegistry`](super::MappingRegistry)
/// and shared as `Arc<ModelMapper>`.
#[derive(Debug)]
pub struct ModelMapper {
    model_type: ModelType,
    type_name: String,
    index_name: String,
    document_type: String,
    key_field: String,
    ttl: Option<String>,
    analysis: Option<AnalysisSettings>,
    fields: Vec<FieldMapper>,
    template: TemplateFn,
}

impl ModelMapper {
    /// Builds the mapper for `T`.
    pub fn build<T: Model>(ctx: &MappingContext) -> Result<Self, MappingError> {
        Self::build_for(ModelType::of::<T>(), ctx)
    }

    /// Builds the mapper for an erased type handle.
    pub fn build_for(model_type: ModelType, ctx: &MappingContext) -> Result<Self, MappingError> {
        let descriptor = model_type.descriptor();
        let type_name = descriptor.type_name().to_string();

        let Some(searchable) = descriptor.searchable_declaration().cloned() else {
            return Err(MappingError::NotSearchable { type_name });
        };

        if let Some(ttl) = &searchable.ttl {
            humantime::parse_duration(ttl).map_err(|e| MappingError::InvalidTtl {
                type_name: type_name.clone(),
                ttl: ttl.clone(),
                message: e.to_string(),
            })?;
        }

        let fields = build_fields(&descriptor, ctx)?;
        let derived = derive_type_name(&type_name);

        debug!(
            type_name = %type_name,
            fields = fields.len(),
            "Built model mapper"
        );

        Ok(Self {
            model_type,
            index_name: searchable.index_name.unwrap_or_else(|| derived.clone()),
            document_type: searchable.type_name.unwrap_or(derived),
            key_field: descriptor.key_field().to_string(),
            ttl: searchable.ttl,
            analysis: searchable.analysis.filter(|a| !a.is_empty()),
            template: descriptor.template_fn(),
            type_name,
            fields,
        })
    }

    /// Erased handle of the mapped type.
    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    /// Fully-qualified host type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Index the type's documents live in.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Document type name.
    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    /// Primary-key field name.
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Default document time-to-live, if declared.
    pub fn ttl(&self) -> Option<&str> {
        self.ttl.as_deref()
    }

    /// Field mappers in declaration order.
    pub fn fields(&self) -> &[FieldMapper] {
        &self.fields
    }

    /// Looks up the mapper of a top-level field.
    pub fn field(&self, name: &str) -> Option<&FieldMapper> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Returns the document id of `instance`.
    pub fn document_id(&self, instance: &dyn IndexableObject) -> Result<String, MappingError> {
        let value = instance.to_value()?;
        self.document_id_of(&value)
    }

    /// Returns the document id held in a serialized instance.
    pub fn document_id_of(&self, value: &Value) -> Result<String, MappingError> {
        match value.get(&self.key_field) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            _ => Err(MappingError::MissingDocumentId {
                type_name: self.type_name.clone(),
                key: self.key_field.clone(),
            }),
        }
    }

    /// Builds the document-type schema.
    ///
    /// ```text
    /// {<document_type>: {"_ttl": {...}?, "properties": {...}}}
    /// ```
    pub fn build_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            field.contribute_schema(&mut properties);
        }

        let mut body = Map::new();
        if let Some(ttl) = &self.ttl {
            let mut entry = Map::new();
            entry.insert("enabled".to_string(), Value::Bool(true));
            entry.insert("default".to_string(), Value::String(ttl.clone()));
            body.insert("_ttl".to_string(), Value::Object(entry));
        }
        body.insert("properties".to_string(), Value::Object(properties));

        let mut schema = Map::new();
        schema.insert(self.document_type.clone(), Value::Object(body));
        Value::Object(schema)
    }

    /// Builds the index-level analysis settings, if any are declared.
    pub fn build_settings(&self) -> Option<Value> {
        let analysis = self.analysis.as_ref()?;

        let mut analyzers = Map::new();
        for analyzer in &analysis.analyzers {
            let mut entry = Map::new();
            if let Some(tokenizer) = &analyzer.tokenizer {
                entry.insert("tokenizer".to_string(), Value::String(tokenizer.clone()));
            }
            entry.insert(
                "filter".to_string(),
                Value::Array(analyzer.filters.iter().cloned().map(Value::String).collect()),
            );
            analyzers.insert(analyzer.name.clone(), Value::Object(entry));
        }

        let mut filters = Map::new();
        for filter in &analysis.filters {
            let mut entry = Map::new();
            entry.insert("type".to_string(), Value::String(filter.type_name.clone()));
            for (key, value) in &filter.settings {
                entry.insert(key.clone(), Value::String(value.clone()));
            }
            filters.insert(filter.name.clone(), Value::Object(entry));
        }

        let mut body = Map::new();
        if !analyzers.is_empty() {
            body.insert("analyzer".to_string(), Value::Object(analyzers));
        }
        if !filters.is_empty() {
            body.insert("filter".to_string(), Value::Object(filters));
        }

        let mut settings = Map::new();
        settings.insert("analysis".to_string(), Value::Object(body));
        Some(Value::Object(settings))
    }

    /// Serializes a full snapshot of `instance`.
    pub fn serialize(&self, instance: &dyn IndexableObject) -> Result<Value, MappingError> {
        let value = instance.to_value()?;
        Ok(self.serialize_value(&value))
    }

    /// Serializes a full snapshot from an instance's value tree.
    pub fn serialize_value(&self, value: &Value) -> Value {
        let mut document = Map::new();
        if let Value::Object(instance) = value {
            for field in &self.fields {
                field.contribute_document(instance, &mut document);
            }
        }
        Value::Object(document)
    }

    /// Inflates a document into the value tree of a fresh instance.
    ///
    /// Fields missing from the document keep their default values.
    pub fn deserialize_value(&self, document: &Map<String, Value>) -> Value {
        let mut instance = match (self.template)() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for field in &self.fields {
            field.inflate(&mut instance, document);
        }
        Value::Object(instance)
    }

    /// Rebuilds an erased instance from a document.
    pub fn instantiate(
        &self,
        document: &Map<String, Value>,
    ) -> Result<Box<dyn IndexableObject>, MappingError> {
        let value = self.deserialize_value(document);
        self.model_type
            .instantiate(value)
            .map_err(|e| MappingError::Hydration {
                type_name: self.type_name.clone(),
                message: e.to_string(),
            })
    }

    /// Rebuilds a `T` from a document.
    pub fn deserialize<T: Model>(&self, document: &Map<String, Value>) -> Result<T, MappingError> {
        serde_json::from_value(self.deserialize_value(document)).map_err(|e| {
            MappingError::Hydration {
                type_name: self.type_name.clone(),
                message: e.to_string(),
            }
        })
    }
}

fn build_fields(
    descriptor: &ModelDescriptor,
    ctx: &MappingContext,
) -> Result<Vec<FieldMapper>, MappingError> {
    descriptor
        .fields()
        .iter()
        .filter(|f| !f.excluded_by_default())
        .map(|f| FieldMapper::build(descriptor.type_name(), f, None, 0, ctx))
        .collect()
}
