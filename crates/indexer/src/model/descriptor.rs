//! Static field-descriptor tables.
//!
//! A [`ModelDescriptor`] is the ahead-of-time description of a host type: its
//! name, primary-key field, optional searchable declaration and the ordered
//! list of [`FieldDescriptor`]s. Mappers are built from these tables once per
//! type; no per-operation type inspection happens afterwards.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use super::Model;

/// Function returning the descriptor of a (child) type.
pub type DescriptorFn = fn() -> ModelDescriptor;

/// Function producing the value tree of a freshly allocated instance.
pub type TemplateFn = fn() -> Value;

/// Declared host type of a field.
#[derive(Clone)]
pub enum HostType {
    /// UTF-8 string.
    String,
    /// Single character.
    Char,
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// Boolean.
    Bool,
    /// `chrono::DateTime<Utc>`.
    Date,
    /// Any other scalar-like type, named for diagnostics.
    Other(&'static str),
    /// A structured value described by its own descriptor.
    Object(DescriptorFn),
    /// A multi-valued field.
    List(Box<HostType>),
}

impl HostType {
    /// Structured value of model type `T`.
    pub fn object<T: Model>() -> Self {
        HostType::Object(T::descriptor)
    }

    /// Multi-valued field with the given element type.
    pub fn list(element: HostType) -> Self {
        HostType::List(Box::new(element))
    }

    /// Returns true for multi-valued types.
    pub fn is_collection(&self) -> bool {
        matches!(self, HostType::List(_))
    }

    /// Returns a short name for diagnostics.
    pub fn name(&self) -> String {
        match self {
            HostType::String => "String".to_string(),
            HostType::Char => "char".to_string(),
            HostType::I8 => "i8".to_string(),
            HostType::I16 => "i16".to_string(),
            HostType::I32 => "i32".to_string(),
            HostType::I64 => "i64".to_string(),
            HostType::F32 => "f32".to_string(),
            HostType::F64 => "f64".to_string(),
            HostType::Bool => "bool".to_string(),
            HostType::Date => "DateTime<Utc>".to_string(),
            HostType::Other(name) => (*name).to_string(),
            HostType::Object(descriptor) => descriptor().type_name().to_string(),
            HostType::List(element) => format!("Vec<{}>", element.name()),
        }
    }
}

impl fmt::Debug for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostType::Object(_) => write!(f, "Object({})", self.name()),
            HostType::List(element) => f.debug_tuple("List").field(element).finish(),
            _ => f.write_str(&self.name()),
        }
    }
}

/// Index hint for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexHint {
    /// Tokenized for full-text search.
    Analyzed,
    /// Indexed as a single exact term.
    NotAnalyzed,
    /// Not searchable.
    No,
}

impl IndexHint {
    /// Returns the schema representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexHint::Analyzed => "analyzed",
            IndexHint::NotAnalyzed => "not_analyzed",
            IndexHint::No => "no",
        }
    }
}

/// Store hint for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreHint {
    /// Stored separately from the source document.
    Yes,
    /// Only kept in the source document.
    No,
}

impl StoreHint {
    /// Returns the schema representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreHint::Yes => "yes",
            StoreHint::No => "no",
        }
    }
}

/// Explicit per-field mapping settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    /// Representation name, used only inside a multi-field list.
    pub name: Option<String>,
    /// Document type override (otherwise detected).
    pub field_type: Option<String>,
    /// Index hint.
    pub index: Option<IndexHint>,
    /// Store hint.
    pub store: Option<StoreHint>,
}

impl FieldMapping {
    /// Creates empty mapping settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the representation name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Overrides the detected document type.
    pub fn field_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = Some(field_type.into());
        self
    }

    /// Sets the index hint.
    pub fn index(mut self, index: IndexHint) -> Self {
        self.index = Some(index);
        self
    }

    /// Sets the store hint.
    pub fn store(mut self, store: StoreHint) -> Self {
        self.store = Some(store);
        self
    }
}

/// How an embedded value is laid out in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    /// Child fields flattened into the parent namespace under a prefix.
    #[default]
    Embedded,
    /// Structural sub-object.
    Object,
    /// Structural sub-object matched independently by the engine.
    Nested,
}

impl EmbedMode {
    /// Returns the schema representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedMode::Embedded => "embedded",
            EmbedMode::Object => "object",
            EmbedMode::Nested => "nested",
        }
    }
}

/// Embed declaration on a field holding a structured value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedDeclaration {
    /// Layout mode.
    pub mode: EmbedMode,
    /// Explicit key prefix for [`EmbedMode::Embedded`].
    pub prefix: Option<String>,
    /// Allow-list of child fields; empty means standard exclusion rules.
    pub fields: Vec<String>,
}

impl EmbedDeclaration {
    /// Creates a declaration with the given mode.
    pub fn new(mode: EmbedMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Flattened embedding (the default).
    pub fn embedded() -> Self {
        Self::new(EmbedMode::Embedded)
    }

    /// Structural object embedding.
    pub fn object() -> Self {
        Self::new(EmbedMode::Object)
    }

    /// Structural nested embedding.
    pub fn nested() -> Self {
        Self::new(EmbedMode::Nested)
    }

    /// Overrides the key prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Restricts the embedded fields to the given names.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// One field of a host type.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name, as it appears in the serialized value tree.
    pub name: String,
    /// Declared host type.
    pub host_type: HostType,
    /// Explicitly excluded from indexing.
    pub ignore: bool,
    /// Internal bookkeeping field, never indexed.
    pub internal: bool,
    /// Explicit mapping settings.
    pub mapping: Option<FieldMapping>,
    /// Additional representations (multi-field).
    pub multi: Vec<FieldMapping>,
    /// Embed declaration.
    pub embed: Option<EmbedDeclaration>,
}

impl FieldDescriptor {
    /// Creates a descriptor for a field of the given type.
    pub fn new(name: impl Into<String>, host_type: HostType) -> Self {
        Self {
            name: name.into(),
            host_type,
            ignore: false,
            internal: false,
            mapping: None,
            multi: Vec::new(),
            embed: None,
        }
    }

    /// Tags the field "ignore".
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Marks the field as internal bookkeeping.
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Sets explicit mapping settings.
    pub fn mapping(mut self, mapping: FieldMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    /// Indexes the field once per representation.
    pub fn multi_field<I>(mut self, representations: I) -> Self
    where
        I: IntoIterator<Item = FieldMapping>,
    {
        self.multi = representations.into_iter().collect();
        self
    }

    /// Attaches an embed declaration.
    pub fn embed(mut self, embed: EmbedDeclaration) -> Self {
        self.embed = Some(embed);
        self
    }

    /// Returns true when standard exclusion rules drop this field.
    pub fn excluded_by_default(&self) -> bool {
        self.name.trim().is_empty() || self.internal || self.ignore
    }
}

/// Named analyzer in the index settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analyzer {
    /// Analyzer name.
    pub name: String,
    /// Tokenizer name.
    pub tokenizer: Option<String>,
    /// Token filter names, applied in order.
    pub filters: Vec<String>,
}

/// Named token filter in the index settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFilter {
    /// Filter name.
    pub name: String,
    /// Filter type.
    pub type_name: String,
    /// Extra settings in declaration order.
    pub settings: Vec<(String, String)>,
}

/// Index-level analysis settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisSettings {
    /// Custom analyzers.
    pub analyzers: Vec<Analyzer>,
    /// Custom token filters.
    pub filters: Vec<TokenFilter>,
}

impl AnalysisSettings {
    /// Adds an analyzer.
    pub fn analyzer<I, S>(mut self, name: impl Into<String>, tokenizer: impl Into<String>, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.analyzers.push(Analyzer {
            name: name.into(),
            tokenizer: Some(tokenizer.into()),
            filters: filters.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Adds a token filter.
    pub fn filter<I, K, V>(mut self, name: impl Into<String>, type_name: impl Into<String>, settings: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.filters.push(TokenFilter {
            name: name.into(),
            type_name: type_name.into(),
            settings: settings
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        });
        self
    }

    /// Returns true when nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty() && self.filters.is_empty()
    }
}

/// Marks a type as searchable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Searchable {
    /// Index name override.
    pub index_name: Option<String>,
    /// Document type override.
    pub type_name: Option<String>,
    /// Default document time-to-live, e.g. `"10s"`.
    pub ttl: Option<String>,
    /// Analysis settings for the index.
    pub analysis: Option<AnalysisSettings>,
}

impl Searchable {
    /// Creates a plain searchable declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the index name.
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    /// Overrides the document type name.
    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.type_name = Some(name.into());
        self
    }

    /// Sets the default document time-to-live.
    pub fn ttl(mut self, ttl: impl Into<String>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    /// Sets the analysis settings.
    pub fn analysis(mut self, analysis: AnalysisSettings) -> Self {
        self.analysis = Some(analysis);
        self
    }
}

/// Static description of a host type.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    type_name: String,
    key: String,
    searchable: Option<Searchable>,
    fields: Vec<FieldDescriptor>,
    template: TemplateFn,
}

fn template_of<T: Model>() -> Value {
    serde_json::to_value(T::default()).unwrap_or_else(|_| Value::Object(Map::new()))
}

impl ModelDescriptor {
    /// Starts a descriptor for `T`, named after its Rust type path.
    pub fn of<T: Model>() -> Self {
        Self {
            type_name: std::any::type_name::<T>().to_string(),
            key: "id".to_string(),
            searchable: None,
            fields: Vec::new(),
            template: template_of::<T>,
        }
    }

    /// Overrides the fully-qualified type name.
    pub fn named(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Sets the primary-key field (default `id`).
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Attaches a searchable declaration.
    pub fn searchable(mut self, searchable: Searchable) -> Self {
        self.searchable = Some(searchable);
        self
    }

    /// Appends a field.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Fully-qualified type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Primary-key field name.
    pub fn key_field(&self) -> &str {
        &self.key
    }

    /// Searchable declaration, if any.
    pub fn searchable_declaration(&self) -> Option<&Searchable> {
        self.searchable.as_ref()
    }

    /// Returns true when the type carries a searchable declaration.
    pub fn is_searchable(&self) -> bool {
        self.searchable.is_some()
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn find_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Value tree of a freshly allocated instance.
    pub fn template(&self) -> Value {
        (self.template)()
    }

    /// The template constructor itself.
    pub fn template_fn(&self) -> TemplateFn {
        self.template
    }
}

/// Derives an index or document-type name from a fully-qualified type name.
///
/// `models.Post` becomes `models_post`; Rust paths (`app::models::Post`) are
/// normalized the same way.
pub fn derive_type_name(type_name: &str) -> String {
    type_name
        .trim()
        .to_lowercase()
        .replace("::", "_")
        .replace('.', "_")
}
