//! Field mappers.
//!
//! Every indexed field of a model is handled by one [`FieldMapper`]. A mapper
//! knows the key it writes under (its prefix is fixed when it is built), and
//! implements the three halves of the mapping contract: schema contribution,
//! document contribution and inflation back into the host value tree.
//!
//! | Variant | Host type | Document shape |
//! |---------|-----------|----------------|
//! | Simple | scalar | `key: value` |
//! | Collection (flat) | `Vec<scalar>` | `key: [v, ..]` |
//! | Collection (nested) | `Vec<Model>` | `key: [{..}, ..]` |
//! | Embedded (embedded) | `Model` | `prefix.child: value` |
//! | Embedded (object/nested) | `Model` | `key: {child: value}` |

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::MappingError;
use crate::model::{
    EmbedDeclaration, EmbedMode, FieldDescriptor, FieldMapping, HostType, IndexHint,
    ModelDescriptor, TemplateFn,
};

use super::conversion::{self, CanonicalType};

/// Default bound on nested embedding depth.
pub const DEFAULT_MAX_EMBED_DEPTH: usize = 3;

/// Build-time settings shared by every mapper of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingContext {
    /// Embedding levels below which no further descent happens.
    pub max_depth: usize,
}

impl Default for MappingContext {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_EMBED_DEPTH,
        }
    }
}

/// Mapper for one field, classified at build time.
#[derive(Debug, Clone)]
pub enum FieldMapper {
    /// Single scalar value.
    Simple(SimpleFieldMapper),
    /// Multi-valued field.
    Collection(CollectionFieldMapper),
    /// Single structured value.
    Embedded(EmbeddedFieldMapper),
}

impl FieldMapper {
    /// Classifies and builds the mapper for `field`.
    ///
    /// Multi-valued fields become collections, fields with an embed
    /// declaration become embedded, everything else is simple.
    pub fn build(
        owner: &str,
        field: &FieldDescriptor,
        prefix: Option<&str>,
        depth: usize,
        ctx: &MappingContext,
    ) -> Result<Self, MappingError> {
        if let HostType::List(element) = &field.host_type {
            return CollectionFieldMapper::build(owner, field, element, prefix, depth, ctx)
                .map(FieldMapper::Collection);
        }
        if let Some(embed) = &field.embed {
            return EmbeddedFieldMapper::build(owner, field, embed, prefix, depth, ctx)
                .map(FieldMapper::Embedded);
        }
        SimpleFieldMapper::build(owner, field, prefix).map(FieldMapper::Simple)
    }

    /// Host field name.
    pub fn name(&self) -> &str {
        match self {
            FieldMapper::Simple(m) => &m.name,
            FieldMapper::Collection(m) => &m.name,
            FieldMapper::Embedded(m) => &m.name,
        }
    }

    /// Document key (prefix included).
    pub fn key(&self) -> &str {
        match self {
            FieldMapper::Simple(m) => &m.key,
            FieldMapper::Collection(m) => &m.key,
            FieldMapper::Embedded(m) => &m.key,
        }
    }

    /// Adds this field's schema entries to `properties`.
    pub fn contribute_schema(&self, properties: &mut Map<String, Value>) {
        match self {
            FieldMapper::Simple(m) => m.contribute_schema(properties),
            FieldMapper::Collection(m) => m.contribute_schema(properties),
            FieldMapper::Embedded(m) => m.contribute_schema(properties),
        }
    }

    /// Adds this field's value from `instance` to `document`.
    pub fn contribute_document(&self, instance: &Map<String, Value>, document: &mut Map<String, Value>) {
        match self {
            FieldMapper::Simple(m) => m.contribute_document(instance, document),
            FieldMapper::Collection(m) => m.contribute_document(instance, document),
            FieldMapper::Embedded(m) => m.contribute_document(instance, document),
        }
    }

    /// Sets this field on `instance` from `document`.
    ///
    /// Returns true if the document held a usable value.
    pub fn inflate(&self, instance: &mut Map<String, Value>, document: &Map<String, Value>) -> bool {
        match self {
            FieldMapper::Simple(m) => m.inflate(instance, document),
            FieldMapper::Collection(m) => m.inflate(instance, document),
            FieldMapper::Embedded(m) => m.inflate(instance, document),
        }
    }
}

fn prefixed(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}{name}"),
        None => name.to_string(),
    }
}

/// Schema entry holding `type`, then `index`, then `store`.
fn field_entry(field_type: &str, mapping: Option<&FieldMapping>) -> Value {
    let mut entry = Map::new();
    entry.insert("type".to_string(), Value::String(field_type.to_string()));
    if let Some(mapping) = mapping {
        if let Some(index) = mapping.index {
            entry.insert("index".to_string(), Value::String(index.as_str().to_string()));
        }
        if let Some(store) = mapping.store {
            entry.insert("store".to_string(), Value::String(store.as_str().to_string()));
        }
    }
    Value::Object(entry)
}

fn resolved_type(host_type: &HostType, mapping: Option<&FieldMapping>) -> String {
    mapping
        .and_then(|m| m.field_type.clone())
        .unwrap_or_else(|| conversion::detect(host_type).as_str().to_string())
}

/// Picks the child fields an embed declaration selects.
///
/// An explicit field list wins over "ignore" tags; naming a field the child
/// does not have is an error.
fn select_fields<'a>(
    owner: &str,
    owner_field: &str,
    child: &'a ModelDescriptor,
    embed: &EmbedDeclaration,
) -> Result<Vec<&'a FieldDescriptor>, MappingError> {
    if embed.fields.is_empty() {
        return Ok(child
            .fields()
            .iter()
            .filter(|f| !f.excluded_by_default())
            .collect());
    }

    if let Some(unknown) = embed.fields.iter().find(|name| child.find_field(name).is_none()) {
        return Err(MappingError::UnknownEmbeddedField {
            owner: owner.to_string(),
            owner_field: owner_field.to_string(),
            child_type: child.type_name().to_string(),
            field: unknown.clone(),
        });
    }

    Ok(child
        .fields()
        .iter()
        .filter(|f| !f.internal && embed.fields.iter().any(|name| *name == f.name))
        .collect())
}

/// Builds the child mappers of an embedded value, honouring the depth bound.
fn build_children(
    owner: &str,
    field: &FieldDescriptor,
    child: &ModelDescriptor,
    embed: &EmbedDeclaration,
    prefix: Option<&str>,
    depth: usize,
    ctx: &MappingContext,
) -> Result<Vec<FieldMapper>, MappingError> {
    let selected = select_fields(owner, &field.name, child, embed)?;

    if depth >= ctx.max_depth {
        warn!(
            owner = %owner,
            field = %field.name,
            depth,
            max_depth = ctx.max_depth,
            "Embedding depth bound reached, not descending further"
        );
        return Ok(Vec::new());
    }

    selected
        .into_iter()
        .map(|f| FieldMapper::build(child.type_name(), f, prefix, depth + 1, ctx))
        .collect()
}

fn inflate_children(
    children: &[FieldMapper],
    template: TemplateFn,
    document: &Map<String, Value>,
) -> (Map<String, Value>, bool) {
    let mut child = match template() {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let mut present = false;
    for mapper in children {
        present |= mapper.inflate(&mut child, document);
    }
    (child, present)
}

fn empty_template() -> Value {
    Value::Object(Map::new())
}

/// Mapper for one scalar value.
#[derive(Debug, Clone)]
pub struct SimpleFieldMapper {
    name: String,
    key: String,
    host_type: HostType,
    field_type: String,
    mapping: Option<FieldMapping>,
    representations: Vec<(String, FieldMapping)>,
}

impl SimpleFieldMapper {
    fn build(owner: &str, field: &FieldDescriptor, prefix: Option<&str>) -> Result<Self, MappingError> {
        let mut seen = HashSet::new();
        let mut representations = Vec::with_capacity(field.multi.len());
        for rep in &field.multi {
            let name = match &rep.name {
                Some(name) => name.clone(),
                None if rep.index == Some(IndexHint::NotAnalyzed) => "untouched".to_string(),
                None => field.name.clone(),
            };
            if !seen.insert(name.clone()) {
                return Err(MappingError::DuplicateMultiField {
                    type_name: owner.to_string(),
                    field: field.name.clone(),
                    name,
                });
            }
            representations.push((name, rep.clone()));
        }

        Ok(Self {
            name: field.name.clone(),
            key: prefixed(prefix, &field.name),
            host_type: field.host_type.clone(),
            field_type: resolved_type(&field.host_type, field.mapping.as_ref()),
            mapping: field.mapping.clone(),
            representations,
        })
    }

    /// Document field type (detected or overridden).
    pub fn field_type(&self) -> &str {
        &self.field_type
    }

    /// Returns true if the field is indexed under several representations.
    pub fn is_multi_field(&self) -> bool {
        !self.representations.is_empty()
    }

    fn contribute_schema(&self, properties: &mut Map<String, Value>) {
        if self.representations.is_empty() {
            properties.insert(self.key.clone(), field_entry(&self.field_type, self.mapping.as_ref()));
            return;
        }

        let mut fields = Map::new();
        for (name, rep) in &self.representations {
            let rep_type = rep.field_type.as_deref().unwrap_or(&self.field_type);
            fields.insert(name.clone(), field_entry(rep_type, Some(rep)));
        }
        let mut entry = Map::new();
        entry.insert("type".to_string(), Value::String("multi_field".to_string()));
        entry.insert("fields".to_string(), Value::Object(fields));
        properties.insert(self.key.clone(), Value::Object(entry));
    }

    fn contribute_document(&self, instance: &Map<String, Value>, document: &mut Map<String, Value>) {
        match instance.get(&self.name) {
            None | Some(Value::Null) => {}
            Some(value) => {
                document.insert(self.key.clone(), value.clone());
            }
        }
    }

    fn inflate(&self, instance: &mut Map<String, Value>, document: &Map<String, Value>) -> bool {
        let Some(raw) = document.get(&self.key) else {
            return false;
        };
        match conversion::convert(raw, &self.host_type) {
            Some(value) => {
                instance.insert(self.name.clone(), value);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
enum CollectionShape {
    Flat {
        field_type: String,
        mapping: Option<FieldMapping>,
    },
    Nested {
        mode: EmbedMode,
        children: Vec<FieldMapper>,
        template: TemplateFn,
    },
}

/// Mapper for a multi-valued field.
#[derive(Debug, Clone)]
pub struct CollectionFieldMapper {
    name: String,
    key: String,
    element: HostType,
    shape: CollectionShape,
}

impl CollectionFieldMapper {
    fn build(
        owner: &str,
        field: &FieldDescriptor,
        element: &HostType,
        prefix: Option<&str>,
        depth: usize,
        ctx: &MappingContext,
    ) -> Result<Self, MappingError> {
        let shape = match (&field.embed, element) {
            (Some(embed), HostType::Object(child)) => {
                let child = child();
                CollectionShape::Nested {
                    mode: embed.mode,
                    children: build_children(owner, field, &child, embed, None, depth, ctx)?,
                    template: child.template_fn(),
                }
            }
            (embed, _) => {
                if embed.is_some() {
                    warn!(
                        owner = %owner,
                        field = %field.name,
                        element = %element.name(),
                        "Embed declaration on a collection of scalars, mapping it flat"
                    );
                }
                CollectionShape::Flat {
                    field_type: resolved_type(element, field.mapping.as_ref()),
                    mapping: field.mapping.clone(),
                }
            }
        };

        Ok(Self {
            name: field.name.clone(),
            key: prefixed(prefix, &field.name),
            element: element.clone(),
            shape,
        })
    }

    /// Returns true when elements are structured sub-documents.
    pub fn is_nested(&self) -> bool {
        matches!(self.shape, CollectionShape::Nested { .. })
    }

    fn contribute_schema(&self, properties: &mut Map<String, Value>) {
        match &self.shape {
            CollectionShape::Flat { field_type, mapping } => {
                properties.insert(self.key.clone(), field_entry(field_type, mapping.as_ref()));
            }
            CollectionShape::Nested { mode, children, .. } => {
                let mut sub = Map::new();
                for child in children {
                    child.contribute_schema(&mut sub);
                }
                let mut entry = Map::new();
                if *mode == EmbedMode::Nested {
                    entry.insert("type".to_string(), Value::String("nested".to_string()));
                }
                entry.insert("properties".to_string(), Value::Object(sub));
                properties.insert(self.key.clone(), Value::Object(entry));
            }
        }
    }

    fn contribute_document(&self, instance: &Map<String, Value>, document: &mut Map<String, Value>) {
        let Some(Value::Array(items)) = instance.get(&self.name) else {
            return;
        };

        let values = match &self.shape {
            CollectionShape::Flat { field_type, .. } => {
                let as_text = field_type == CanonicalType::String.as_str();
                items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(|item| if as_text { textual(item) } else { item.clone() })
                    .collect()
            }
            CollectionShape::Nested { children, .. } => items
                .iter()
                .filter_map(Value::as_object)
                .map(|item| {
                    let mut sub = Map::new();
                    for child in children {
                        child.contribute_document(item, &mut sub);
                    }
                    Value::Object(sub)
                })
                .collect(),
        };
        document.insert(self.key.clone(), Value::Array(values));
    }

    fn inflate(&self, instance: &mut Map<String, Value>, document: &Map<String, Value>) -> bool {
        let raw_items = match document.get(&self.key) {
            None | Some(Value::Null) => return false,
            Some(Value::Array(items)) => items.clone(),
            Some(single) => vec![single.clone()],
        };

        let items: Vec<Value> = match &self.shape {
            CollectionShape::Flat { .. } => raw_items
                .iter()
                .filter_map(|raw| conversion::convert(raw, &self.element))
                .collect(),
            CollectionShape::Nested {
                children, template, ..
            } => raw_items
                .iter()
                .filter_map(Value::as_object)
                .map(|sub| Value::Object(inflate_children(children, *template, sub).0))
                .collect(),
        };

        instance.insert(self.name.clone(), Value::Array(items));
        true
    }
}

/// Textual representation of a collection element.
fn textual(item: &Value) -> Value {
    match item {
        Value::String(_) => item.clone(),
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        other => Value::String(other.to_string()),
    }
}

/// Mapper for one structured value.
#[derive(Debug, Clone)]
pub struct EmbeddedFieldMapper {
    name: String,
    key: String,
    mode: EmbedMode,
    children: Vec<FieldMapper>,
    template: TemplateFn,
}

impl EmbeddedFieldMapper {
    fn build(
        owner: &str,
        field: &FieldDescriptor,
        embed: &EmbedDeclaration,
        prefix: Option<&str>,
        depth: usize,
        ctx: &MappingContext,
    ) -> Result<Self, MappingError> {
        let key = prefixed(prefix, &field.name);

        let HostType::Object(child) = &field.host_type else {
            warn!(
                owner = %owner,
                field = %field.name,
                host_type = %field.host_type.name(),
                "Embed declaration on a non-structured field, nothing to embed"
            );
            return Ok(Self {
                name: field.name.clone(),
                key,
                mode: embed.mode,
                children: Vec::new(),
                template: empty_template,
            });
        };
        let child = child();

        let children = match embed.mode {
            EmbedMode::Embedded => {
                let own_prefix = embed
                    .prefix
                    .clone()
                    .unwrap_or_else(|| format!("{}.", field.name));
                let combined = prefixed(prefix, &own_prefix);
                build_children(owner, field, &child, embed, Some(&combined), depth, ctx)?
            }
            EmbedMode::Object | EmbedMode::Nested => {
                build_children(owner, field, &child, embed, None, depth, ctx)?
            }
        };

        Ok(Self {
            name: field.name.clone(),
            key,
            mode: embed.mode,
            children,
            template: child.template_fn(),
        })
    }

    /// Layout mode.
    pub fn mode(&self) -> EmbedMode {
        self.mode
    }

    /// Child mappers.
    pub fn children(&self) -> &[FieldMapper] {
        &self.children
    }

    fn contribute_schema(&self, properties: &mut Map<String, Value>) {
        match self.mode {
            EmbedMode::Embedded => {
                for child in &self.children {
                    child.contribute_schema(properties);
                }
            }
            EmbedMode::Object | EmbedMode::Nested => {
                let mut sub = Map::new();
                for child in &self.children {
                    child.contribute_schema(&mut sub);
                }
                let mut entry = Map::new();
                entry.insert("type".to_string(), Value::String(self.mode.as_str().to_string()));
                entry.insert("properties".to_string(), Value::Object(sub));
                properties.insert(self.key.clone(), Value::Object(entry));
            }
        }
    }

    fn contribute_document(&self, instance: &Map<String, Value>, document: &mut Map<String, Value>) {
        let Some(Value::Object(value)) = instance.get(&self.name) else {
            return;
        };
        match self.mode {
            EmbedMode::Embedded => {
                for child in &self.children {
                    child.contribute_document(value, document);
                }
            }
            EmbedMode::Object | EmbedMode::Nested => {
                let mut sub = Map::new();
                for child in &self.children {
                    child.contribute_document(value, &mut sub);
                }
                document.insert(self.key.clone(), Value::Object(sub));
            }
        }
    }

    fn inflate(&self, instance: &mut Map<String, Value>, document: &Map<String, Value>) -> bool {
        let (child, present) = match self.mode {
            EmbedMode::Embedded => inflate_children(&self.children, self.template, document),
            EmbedMode::Object | EmbedMode::Nested => match document.get(&self.key) {
                Some(Value::Object(sub)) => {
                    let (child, _) = inflate_children(&self.children, self.template, sub);
                    (child, true)
                }
                _ => return false,
            },
        };

        if present {
            instance.insert(self.name.clone(), Value::Object(child));
        }
        present
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use crate::model::{Model, StoreHint};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Address {
        street: String,
        city: String,
        internal_code: String,
    }

    impl Model for Address {
        fn descriptor() -> ModelDescriptor {
            ModelDescriptor::of::<Self>()
                .named("models.Address")
                .field(FieldDescriptor::new("street", HostType::String))
                .field(FieldDescriptor::new("city", HostType::String).ignore())
                .field(FieldDescriptor::new("internal_code", HostType::String).internal())
        }
    }

    fn build(field: FieldDescriptor) -> Result<FieldMapper, MappingError> {
        FieldMapper::build("models.Owner", &field, None, 0, &MappingContext::default())
    }

    fn schema_of(mapper: &FieldMapper) -> Value {
        let mut props = Map::new();
        mapper.contribute_schema(&mut props);
        Value::Object(props)
    }

    #[test]
    fn test_classification() {
        let simple = build(FieldDescriptor::new("title", HostType::String)).unwrap();
        assert!(matches!(simple, FieldMapper::Simple(_)));

        let list = build(FieldDescriptor::new("tags", HostType::list(HostType::String))).unwrap();
        assert!(matches!(list, FieldMapper::Collection(_)));

        let embedded = build(
            FieldDescriptor::new("address", HostType::object::<Address>())
                .embed(EmbedDeclaration::embedded()),
        )
        .unwrap();
        assert!(matches!(embedded, FieldMapper::Embedded(_)));

        // collections win over embed declarations
        let nested = build(
            FieldDescriptor::new("addresses", HostType::list(HostType::object::<Address>()))
                .embed(EmbedDeclaration::nested()),
        )
        .unwrap();
        assert!(matches!(nested, FieldMapper::Collection(ref c) if c.is_nested()));
    }

    #[test]
    fn test_simple_schema_field_order() {
        let mapper = build(
            FieldDescriptor::new("title", HostType::String).mapping(
                FieldMapping::new()
                    .store(StoreHint::Yes)
                    .index(IndexHint::NotAnalyzed),
            ),
        )
        .unwrap();
        let schema = schema_of(&mapper);
        let keys: Vec<&String> = schema["title"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["type", "index", "store"]);
        assert_eq!(
            serde_json::to_string(&schema).unwrap(),
            r#"{"title":{"type":"string","index":"not_analyzed","store":"yes"}}"#
        );
    }

    #[test]
    fn test_simple_type_override() {
        let mapper = build(
            FieldDescriptor::new("code", HostType::I64)
                .mapping(FieldMapping::new().field_type("keyword")),
        )
        .unwrap();
        assert_eq!(schema_of(&mapper), json!({"code": {"type": "keyword"}}));
    }

    #[test]
    fn test_simple_null_is_omitted() {
        let mapper = build(FieldDescriptor::new("title", HostType::String)).unwrap();
        let mut doc = Map::new();
        mapper.contribute_document(json!({"title": null}).as_object().unwrap(), &mut doc);
        assert!(doc.is_empty());
        mapper.contribute_document(json!({}).as_object().unwrap(), &mut doc);
        assert!(!doc.contains_key("title"));
    }

    #[test]
    fn test_multi_field_naming() {
        let mapper = build(FieldDescriptor::new("name", HostType::String).multi_field([
            FieldMapping::new()
                .index(IndexHint::NotAnalyzed)
                .store(StoreHint::Yes)
                .field_type("string"),
            FieldMapping::new()
                .index(IndexHint::Analyzed)
                .store(StoreHint::No)
                .field_type("string"),
        ]))
        .unwrap();
        assert_eq!(
            serde_json::to_string(&schema_of(&mapper)).unwrap(),
            concat!(
                r#"{"name":{"type":"multi_field","fields":{"#,
                r#""untouched":{"type":"string","index":"not_analyzed","store":"yes"},"#,
                r#""name":{"type":"string","index":"analyzed","store":"no"}}}}"#
            )
        );
    }

    #[test]
    fn test_multi_field_duplicate_names_fail() {
        let err = build(FieldDescriptor::new("name", HostType::String).multi_field([
            FieldMapping::new().named("raw"),
            FieldMapping::new().named("raw"),
        ]))
        .unwrap_err();
        assert!(matches!(err, MappingError::DuplicateMultiField { ref name, .. } if name == "raw"));
    }

    #[test]
    fn test_flat_collection_stringifies_elements() {
        let mapper = build(FieldDescriptor::new("labels", HostType::list(HostType::Other("Label")))).unwrap();
        let mut doc = Map::new();
        mapper.contribute_document(json!({"labels": ["a", 1, true, null]}).as_object().unwrap(), &mut doc);
        assert_eq!(Value::Object(doc), json!({"labels": ["a", "1", "true"]}));
    }

    #[test]
    fn test_flat_collection_inflate_skips_unconvertible() {
        let mapper = build(FieldDescriptor::new("scores", HostType::list(HostType::I32))).unwrap();
        let mut instance = Map::new();
        let doc = json!({"scores": [1, "2", "three", 4.0]});
        assert!(mapper.inflate(&mut instance, doc.as_object().unwrap()));
        assert_eq!(instance["scores"], json!([1, 2, 4]));
    }

    #[test]
    fn test_embedded_default_selection_and_prefix() {
        let mapper = build(
            FieldDescriptor::new("address", HostType::object::<Address>())
                .embed(EmbedDeclaration::embedded()),
        )
        .unwrap();
        assert_eq!(schema_of(&mapper), json!({"address.street": {"type": "string"}}));

        let mut doc = Map::new();
        let instance = json!({"address": {"street": "Main", "city": "Springfield", "internal_code": "x"}});
        mapper.contribute_document(instance.as_object().unwrap(), &mut doc);
        assert_eq!(Value::Object(doc), json!({"address.street": "Main"}));
    }

    #[test]
    fn test_embedded_explicit_fields_override_ignore() {
        let mapper = build(
            FieldDescriptor::new("address", HostType::object::<Address>())
                .embed(EmbedDeclaration::embedded().prefix("addr_").fields(["city"])),
        )
        .unwrap();
        assert_eq!(schema_of(&mapper), json!({"addr_city": {"type": "string"}}));
    }

    #[test]
    fn test_embedded_unknown_field_fails_at_build() {
        let err = build(
            FieldDescriptor::new("address", HostType::object::<Address>())
                .embed(EmbedDeclaration::embedded().fields(["zip"])),
        )
        .unwrap_err();
        match err {
            MappingError::UnknownEmbeddedField { field, child_type, owner_field, .. } => {
                assert_eq!(field, "zip");
                assert_eq!(child_type, "models.Address");
                assert_eq!(owner_field, "address");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_object_mode_structure() {
        let mapper = build(
            FieldDescriptor::new("address", HostType::object::<Address>())
                .embed(EmbedDeclaration::object()),
        )
        .unwrap();
        assert_eq!(
            schema_of(&mapper),
            json!({"address": {"type": "object", "properties": {"street": {"type": "string"}}}})
        );

        let mut doc = Map::new();
        let instance = json!({"address": {"street": "Main", "city": "x", "internal_code": "y"}});
        mapper.contribute_document(instance.as_object().unwrap(), &mut doc);
        assert_eq!(Value::Object(doc.clone()), json!({"address": {"street": "Main"}}));

        let mut back = Map::new();
        assert!(mapper.inflate(&mut back, &doc));
        assert_eq!(back["address"]["street"], "Main");
        // unselected fields keep their template defaults
        assert_eq!(back["address"]["city"], "");
    }

    #[test]
    fn test_embedded_inflate_absent_is_false() {
        let mapper = build(
            FieldDescriptor::new("address", HostType::object::<Address>())
                .embed(EmbedDeclaration::embedded()),
        )
        .unwrap();
        let mut instance = Map::new();
        assert!(!mapper.inflate(&mut instance, &Map::new()));
        assert!(!instance.contains_key("address"));
    }

    #[test]
    fn test_depth_bound_stops_descent() {
        let ctx = MappingContext { max_depth: 0 };
        let field = FieldDescriptor::new("address", HostType::object::<Address>())
            .embed(EmbedDeclaration::embedded());
        let mapper = FieldMapper::build("models.Owner", &field, None, 0, &ctx).unwrap();
        match mapper {
            FieldMapper::Embedded(ref e) => assert!(e.children().is_empty()),
            _ => panic!("expected embedded mapper"),
        }
        assert_eq!(schema_of(&mapper), json!({}));
    }
}
