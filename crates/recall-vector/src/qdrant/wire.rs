//! Request and response bodies of the Qdrant REST API.

use recall_core::model::{ChunkRecord, SearchResult, Vector};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

/// Payload keys with a keyword index.
pub const INDEXED_FIELDS: [&str; 2] = ["knowledge_base_id", "document_id"];

/// Envelope wrapping every Qdrant response.
#[derive(Debug, Deserialize)]
pub struct Response<T> {
    pub result: T,
}

/// Chunk data stored alongside each point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub knowledge_base_id: Uuid,
    pub document_id: Uuid,
    pub tenant_id: Uuid,
    pub chunk_index: i32,
    pub content: String,
    pub content_hash: String,
    #[serde(default)]
    pub token_count: i32,
    #[serde(default)]
    pub start_offset: i32,
    #[serde(default)]
    pub end_offset: i32,
    #[serde(default)]
    pub embedding_model: String,
    #[serde(default)]
    pub embedding_provider: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Serialize)]
pub struct Point {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

impl From<Vector> for Point {
    fn from(vector: Vector) -> Self {
        Self {
            id: vector.id,
            payload: PointPayload {
                knowledge_base_id: vector.knowledge_base_id,
                document_id: vector.document_id,
                tenant_id: vector.tenant_id,
                chunk_index: vector.chunk_index,
                content: vector.content,
                content_hash: vector.content_hash,
                token_count: vector.token_count,
                start_offset: vector.start_offset,
                end_offset: vector.end_offset,
                embedding_model: vector.embedding_model,
                embedding_provider: vector.embedding_provider,
                metadata: vector.metadata,
            },
            vector: vector.embedding,
        }
    }
}

/// A search hit.
#[derive(Debug, Deserialize)]
pub struct ScoredPoint {
    pub id: Uuid,
    pub score: f32,
    pub payload: Option<PointPayload>,
}

impl ScoredPoint {
    /// Converts the hit into a search result; hits without payload are dropped.
    pub fn into_search_result(self) -> Option<SearchResult> {
        let payload = self.payload?;
        Some(
            SearchResult::new(
                self.id,
                payload.document_id,
                payload.knowledge_base_id,
                payload.content,
                self.score,
            )
            .with_chunk_index(payload.chunk_index)
            .with_metadata(payload.metadata),
        )
    }
}

/// A point returned by scroll.
#[derive(Debug, Deserialize)]
pub struct RecordPoint {
    pub id: Uuid,
    pub payload: Option<Value>,
}

impl RecordPoint {
    pub fn document_id(&self) -> Option<Uuid> {
        let value = self.payload.as_ref()?.get("document_id")?.as_str()?;
        value.parse().ok()
    }

    pub fn into_record(self) -> Option<ChunkRecord> {
        let payload: PointPayload = serde_json::from_value(self.payload?).ok()?;
        Some(ChunkRecord {
            id: self.id,
            document_id: payload.document_id,
            chunk_index: payload.chunk_index,
            content_hash: payload.content_hash,
            content: payload.content,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ScrollPage {
    pub points: Vec<RecordPoint>,
    pub next_page_offset: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CountResult {
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub struct CollectionInfo {
    pub config: CollectionConfig,
}

#[derive(Debug, Deserialize)]
pub struct CollectionConfig {
    pub params: CollectionParams,
}

#[derive(Debug, Deserialize)]
pub struct CollectionParams {
    pub vectors: VectorParams,
}

#[derive(Debug, Deserialize)]
pub struct VectorParams {
    pub size: usize,
}

/// `must` filter on exact payload values.
pub fn must_match(conditions: &[(&str, Uuid)]) -> Value {
    let must: Vec<Value> = conditions
        .iter()
        .map(|(key, value)| json!({ "key": key, "match": { "value": value } }))
        .collect();
    json!({ "must": must })
}

pub fn knowledge_base_filter(knowledge_base_id: Uuid) -> Value {
    must_match(&[("knowledge_base_id", knowledge_base_id)])
}

pub fn document_filter(knowledge_base_id: Uuid, document_id: Uuid) -> Value {
    must_match(&[
        ("knowledge_base_id", knowledge_base_id),
        ("document_id", document_id),
    ])
}

pub fn create_collection_body(size: usize) -> Value {
    json!({ "vectors": { "size": size, "distance": "Cosine" } })
}

pub fn create_index_body(field: &str) -> Value {
    json!({ "field_name": field, "field_schema": "keyword" })
}

pub fn upsert_body(points: Vec<Point>) -> Value {
    json!({ "points": points })
}

pub fn search_body(knowledge_base_id: Uuid, vector: &[f32], limit: usize) -> Value {
    json!({
        "vector": vector,
        "limit": limit,
        "with_payload": true,
        "filter": knowledge_base_filter(knowledge_base_id),
    })
}

pub fn delete_points_body(ids: &[Uuid]) -> Value {
    json!({ "points": ids })
}

pub fn delete_filter_body(filter: Value) -> Value {
    json!({ "filter": filter })
}

/// Batch of `set_payload` operations moving each point to a new chunk index.
pub fn renumber_body(updates: &[(Uuid, i32)]) -> Value {
    let operations: Vec<Value> = updates
        .iter()
        .map(|(id, chunk_index)| {
            json!({
                "set_payload": {
                    "payload": { "chunk_index": chunk_index },
                    "points": [id],
                }
            })
        })
        .collect();
    json!({ "operations": operations })
}

pub fn count_body(filter: Value) -> Value {
    json!({ "filter": filter, "exact": true })
}

/// Scroll request; `with_payload` may be `true` or a list of keys.
pub fn scroll_body(filter: Value, limit: usize, with_payload: Value, offset: Option<Value>) -> Value {
    let mut body = json!({
        "filter": filter,
        "limit": limit,
        "with_payload": with_payload,
        "with_vector": false,
    });
    if let Some(offset) = offset {
        body["offset"] = offset;
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector() -> Vector {
        Vector {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            knowledge_base_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            chunk_index: 2,
            content: "Ownership moves values.".to_owned(),
            content_hash: "abc".to_owned(),
            token_count: 4,
            start_offset: 10,
            end_offset: 33,
            embedding: vec![0.1, 0.2],
            embedding_model: "text-embedding-3-small".to_owned(),
            embedding_provider: "openai".to_owned(),
            metadata: json!({ "title": "Rust" }),
        }
    }

    #[test]
    fn test_create_collection_body() {
        assert_eq!(
            create_collection_body(1536),
            json!({ "vectors": { "size": 1536, "distance": "Cosine" } })
        );
    }

    #[test]
    fn test_search_body_filters_by_knowledge_base() {
        let kb = Uuid::new_v4();
        let body = search_body(kb, &[0.5, 0.25], 5);

        assert_eq!(body["limit"], 5);
        assert_eq!(body["with_payload"], true);
        assert_eq!(body["vector"], json!([0.5, 0.25]));
        assert_eq!(
            body["filter"],
            json!({ "must": [{ "key": "knowledge_base_id", "match": { "value": kb.to_string() } }] })
        );
    }

    #[test]
    fn test_upsert_body_carries_payload() {
        let v = vector();
        let (id, kb) = (v.id, v.knowledge_base_id);
        let body = upsert_body(vec![Point::from(v)]);

        let point = &body["points"][0];
        assert_eq!(point["id"], id.to_string());
        assert_eq!(point["vector"], json!([0.1f32, 0.2f32]));
        assert_eq!(point["payload"]["knowledge_base_id"], kb.to_string());
        assert_eq!(point["payload"]["chunk_index"], 2);
        assert_eq!(point["payload"]["metadata"]["title"], "Rust");
    }

    #[test]
    fn test_document_filter_has_both_keys() {
        let filter = document_filter(Uuid::nil(), Uuid::new_v4());
        let must = filter["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
        assert_eq!(must[1]["key"], "document_id");
    }

    #[test]
    fn test_renumber_body() {
        let id = Uuid::new_v4();
        let body = renumber_body(&[(id, 4)]);
        assert_eq!(
            body,
            json!({
                "operations": [{
                    "set_payload": { "payload": { "chunk_index": 4 }, "points": [id.to_string()] }
                }]
            })
        );
    }

    #[test]
    fn test_scroll_body_offset() {
        let body = scroll_body(json!({}), 100, json!(["document_id"]), None);
        assert!(body.get("offset").is_none());

        let body = scroll_body(json!({}), 100, json!(true), Some(json!("next")));
        assert_eq!(body["offset"], "next");
        assert_eq!(body["with_vector"], false);
    }

    #[test]
    fn test_parse_search_response() {
        let v = vector();
        let payload = serde_json::to_value(Point::from(v.clone()).payload).unwrap();
        let raw = json!({
            "result": [
                { "id": v.id, "version": 3, "score": 0.91, "payload": payload },
                { "id": Uuid::new_v4(), "version": 1, "score": 0.2, "payload": null }
            ],
            "status": "ok",
            "time": 0.001
        });

        let response: Response<Vec<ScoredPoint>> = serde_json::from_value(raw).unwrap();
        let results: Vec<SearchResult> = response
            .result
            .into_iter()
            .filter_map(ScoredPoint::into_search_result)
            .collect();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, v.id);
        assert_eq!(results[0].document_id, v.document_id);
        assert!((results[0].similarity - 0.91).abs() < 1e-6);
    }

    #[test]
    fn test_parse_scroll_page() {
        let v = vector();
        let payload = serde_json::to_value(Point::from(v.clone()).payload).unwrap();
        let raw = json!({
            "result": { "points": [{ "id": v.id, "payload": payload }], "next_page_offset": null },
            "status": "ok"
        });

        let page: Response<ScrollPage> = serde_json::from_value(raw).unwrap();
        assert!(page.result.next_page_offset.is_none());

        let point = page.result.points.into_iter().next().unwrap();
        assert_eq!(point.document_id(), Some(v.document_id));

        let record = point.into_record().unwrap();
        assert_eq!(record.chunk_index, 2);
        assert_eq!(record.content_hash, "abc");
    }

    #[test]
    fn test_parse_collection_size() {
        let raw = json!({
            "result": {
                "status": "green",
                "config": { "params": { "vectors": { "size": 768, "distance": "Cosine" } } }
            }
        });

        let info: Response<CollectionInfo> = serde_json::from_value(raw).unwrap();
        assert_eq!(info.result.config.params.vectors.size, 768);
    }
}
