//! Document writes and point lookups.

use elasticsearch::params::Refresh;
use elasticsearch::{DeleteParts, GetParts, IndexParts};
use serde_json::{Map, Value};

use crate::engine::{DocumentKey, EngineResult};
use crate::error::EngineError;

use super::backend::{ElasticsearchEngine, MODEL_TYPE_FIELD, internal_error};

fn refresh_mode(engine: &ElasticsearchEngine) -> Refresh {
    if engine.config().refresh_on_write {
        Refresh::True
    } else {
        Refresh::False
    }
}

/// Removes the metadata field from a stored source.
pub(crate) fn strip_metadata(source: &mut Map<String, Value>) -> Option<String> {
    match source.remove(MODEL_TYPE_FIELD) {
        Some(Value::String(doc_type)) => Some(doc_type),
        _ => None,
    }
}

pub(crate) async fn put_document(
    engine: &ElasticsearchEngine,
    key: &DocumentKey,
    document: Value,
) -> EngineResult<()> {
    let Value::Object(mut doc) = document else {
        return Err(EngineError::Serialization {
            message: format!("document {} is not a JSON object", key),
        });
    };
    doc.insert(
        MODEL_TYPE_FIELD.to_string(),
        Value::String(key.doc_type.clone()),
    );

    let index = engine.index_name(&key.index);
    let doc_id = ElasticsearchEngine::document_id(&key.doc_type, &key.id);

    let response = engine
        .client()
        .index(IndexParts::IndexId(&index, &doc_id))
        .refresh(refresh_mode(engine))
        .body(Value::Object(doc))
        .send()
        .await
        .map_err(|e| internal_error(format!("Failed to index document: {}", e)))?;

    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(EngineError::Rejected {
            engine: super::backend::ENGINE_NAME.to_string(),
            index,
            message: format!("Failed to index document (status {}): {}", status, body),
        });
    }

    tracing::debug!(index = %index, id = %doc_id, "Indexed document");
    Ok(())
}

pub(crate) async fn get_document(
    engine: &ElasticsearchEngine,
    key: &DocumentKey,
) -> EngineResult<Option<Map<String, Value>>> {
    let index = engine.index_name(&key.index);
    let doc_id = ElasticsearchEngine::document_id(&key.doc_type, &key.id);

    let response = engine
        .client()
        .get(GetParts::IndexId(&index, &doc_id))
        .send()
        .await
        .map_err(|e| internal_error(format!("Failed to read document: {}", e)))?;

    let status = response.status_code();
    if status.as_u16() == 404 {
        return Ok(None);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(internal_error(format!(
            "Failed to read document (status {}): {}",
            status, body
        )));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| internal_error(format!("Failed to parse ES response: {}", e)))?;

    let mut source = match body.get("_source") {
        Some(Value::Object(s)) => s.clone(),
        _ => return Ok(None),
    };
    strip_metadata(&mut source);
    Ok(Some(source))
}

pub(crate) async fn delete_document(engine: &ElasticsearchEngine, key: &DocumentKey) -> EngineResult<bool> {
    let index = engine.index_name(&key.index);
    let doc_id = ElasticsearchEngine::document_id(&key.doc_type, &key.id);

    let response = engine
        .client()
        .delete(DeleteParts::IndexId(&index, &doc_id))
        .refresh(refresh_mode(engine))
        .send()
        .await
        .map_err(|e| internal_error(format!("Failed to delete document: {}", e)))?;

    let status = response.status_code();
    // 404 covers both a missing document and a missing index
    if status.as_u16() == 404 {
        return Ok(false);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(internal_error(format!(
            "Failed to delete document (status {}): {}",
            status, body
        )));
    }

    let body: Value = response.json().await.unwrap_or_default();
    Ok(body.get("result").and_then(Value::as_str) == Some("deleted"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_strip_metadata() {
        let mut source = json!({"title": "x", "model_type": "models_post"})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(strip_metadata(&mut source).as_deref(), Some("models_post"));
        assert!(!source.contains_key(MODEL_TYPE_FIELD));
        assert_eq!(strip_metadata(&mut source), None);
    }
}
