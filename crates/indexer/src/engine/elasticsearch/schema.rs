//! Elasticsearch index creation and schema translation.
//!
//! Mappers emit the classic schema dialect (`string` fields with
//! `analyzed`/`not_analyzed` hints, `multi_field`, `_ttl`). Elasticsearch 8
//! understands none of these, so schemas are translated before they are sent:
//!
//! | Classic | Elasticsearch 8 |
//! |---------|-----------------|
//! | `string` + `not_analyzed` | `keyword` |
//! | `string` (analyzed or no hint) | `text` |
//! | `index: "no"` | `index: false` |
//! | `store: "yes"` | `store: true` |
//! | `multi_field` | main field plus `fields` |
//! | `_ttl` | dropped |

use elasticsearch::indices::{IndicesCreateParts, IndicesExistsParts, IndicesPutMappingParts};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::engine::{EngineResult, SchemaStatus};

use super::backend::{ElasticsearchConfig, ElasticsearchEngine, MODEL_TYPE_FIELD, internal_error};

/// Translates one document-type schema into an Elasticsearch 8 `mappings` body.
pub fn translate_schema(doc_type: &str, schema: &Value) -> Value {
    let body = schema.get(doc_type).unwrap_or(schema);

    if body.get("_ttl").is_some() {
        debug!(
            doc_type = %doc_type,
            "Dropping _ttl from schema, not supported by Elasticsearch 8"
        );
    }

    let mut properties = Map::new();
    properties.insert(MODEL_TYPE_FIELD.to_string(), json!({ "type": "keyword" }));
    if let Some(Value::Object(source)) = body.get("properties") {
        for (name, entry) in source {
            properties.insert(name.clone(), translate_field(name, entry));
        }
    }

    json!({ "properties": properties })
}

fn translate_field(name: &str, entry: &Value) -> Value {
    let Some(entry) = entry.as_object() else {
        return entry.clone();
    };

    match entry.get("type").and_then(Value::as_str) {
        Some("multi_field") => translate_multi_field(name, entry),
        Some("object") | Some("nested") | None if entry.contains_key("properties") => {
            let mut out = Map::new();
            if let Some(kind) = entry.get("type") {
                out.insert("type".to_string(), kind.clone());
            }
            let mut properties = Map::new();
            if let Some(Value::Object(children)) = entry.get("properties") {
                for (child, child_entry) in children {
                    properties.insert(child.clone(), translate_field(child, child_entry));
                }
            }
            out.insert("properties".to_string(), Value::Object(properties));
            Value::Object(out)
        }
        _ => Value::Object(translate_scalar(entry)),
    }
}

fn translate_scalar(entry: &Map<String, Value>) -> Map<String, Value> {
    let kind = entry.get("type").and_then(Value::as_str).unwrap_or("string");
    let index = entry.get("index").and_then(Value::as_str);

    let es_type = match (kind, index) {
        ("string", Some("not_analyzed")) | ("string", Some("no")) => "keyword",
        ("string", _) => "text",
        (other, _) => other,
    };

    let mut out = Map::new();
    out.insert("type".to_string(), Value::String(es_type.to_string()));
    if index == Some("no") {
        out.insert("index".to_string(), Value::Bool(false));
    }
    if entry.get("store").and_then(Value::as_str) == Some("yes") {
        out.insert("store".to_string(), Value::Bool(true));
    }
    for key in ["analyzer", "search_analyzer", "format"] {
        if let Some(value) = entry.get(key) {
            out.insert(key.to_string(), value.clone());
        }
    }
    out
}

fn translate_multi_field(name: &str, entry: &Map<String, Value>) -> Value {
    let Some(Value::Object(representations)) = entry.get("fields") else {
        return json!({ "type": "text" });
    };

    // the representation named after the field is the main one
    let main_name = if representations.contains_key(name) {
        Some(name.to_string())
    } else {
        representations.keys().next().cloned()
    };

    let mut main = main_name
        .as_ref()
        .and_then(|n| representations.get(n))
        .and_then(Value::as_object)
        .map(translate_scalar)
        .unwrap_or_default();

    let mut fields = Map::new();
    for (rep_name, rep) in representations {
        if Some(rep_name) == main_name.as_ref() {
            continue;
        }
        if let Some(rep) = rep.as_object() {
            fields.insert(rep_name.clone(), Value::Object(translate_scalar(rep)));
        }
    }
    if !fields.is_empty() {
        main.insert("fields".to_string(), Value::Object(fields));
    }
    Value::Object(main)
}

/// Builds the index-creation body: settings plus mappings.
pub fn create_index_body(config: &ElasticsearchConfig, mappings: Value, settings: Option<&Value>) -> Value {
    let mut index_settings = json!({
        "number_of_shards": config.number_of_shards,
        "number_of_replicas": config.number_of_replicas,
        "refresh_interval": config.refresh_interval,
    });
    if let Some(analysis) = settings.and_then(|s| s.get("analysis")) {
        index_settings["analysis"] = analysis.clone();
    }

    json!({
        "settings": index_settings,
        "mappings": mappings,
    })
}

/// Creates the index for a document type, or merges its mapping into an
/// existing index.
pub async fn ensure_schema(
    engine: &ElasticsearchEngine,
    index: &str,
    doc_type: &str,
    schema: &Value,
    settings: Option<&Value>,
) -> EngineResult<SchemaStatus> {
    let physical = engine.index_name(index);
    let mappings = translate_schema(doc_type, schema);

    let exists_response = engine
        .client()
        .indices()
        .exists(IndicesExistsParts::Index(&[&physical]))
        .send()
        .await
        .map_err(|e| internal_error(format!("Failed to check index existence: {}", e)))?;

    if exists_response.status_code().is_success() {
        put_mapping(engine, &physical, mappings).await?;
        return Ok(SchemaStatus::AlreadyExists);
    }

    let body = create_index_body(engine.config(), mappings.clone(), settings);

    let response = engine
        .client()
        .indices()
        .create(IndicesCreateParts::Index(&physical))
        .body(body)
        .send()
        .await
        .map_err(|e| internal_error(format!("Failed to create index {}: {}", physical, e)))?;

    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        // 400 with "resource_already_exists_exception" is OK (race condition)
        if body.contains("resource_already_exists_exception") {
            put_mapping(engine, &physical, mappings).await?;
            return Ok(SchemaStatus::AlreadyExists);
        }
        return Err(internal_error(format!(
            "Failed to create index {} (status {}): {}",
            physical, status, body
        )));
    }

    tracing::info!(
        "Created Elasticsearch index '{}' for document type '{}'",
        physical,
        doc_type
    );
    Ok(SchemaStatus::Created)
}

async fn put_mapping(engine: &ElasticsearchEngine, physical: &str, mappings: Value) -> EngineResult<()> {
    let response = engine
        .client()
        .indices()
        .put_mapping(IndicesPutMappingParts::Index(&[physical]))
        .body(mappings)
        .send()
        .await
        .map_err(|e| internal_error(format!("Failed to update mapping of {}: {}", physical, e)))?;

    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(internal_error(format!(
            "Failed to update mapping of {} (status {}): {}",
            physical, status, body
        )));
    }
    Ok(())
}
