//! Qdrant backend over the REST API.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use recall_core::model::{ChunkRecord, SearchResult, Vector, VectorStats};
use recall_core::store::VectorStore;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::QdrantConfig;
use super::wire::{self, CollectionInfo, CountResult, Point, Response, ScoredPoint, ScrollPage};
use crate::{TRACING_TARGET_QDRANT, VectorError, VectorResult};

/// Maximum points per upsert request.
const UPSERT_BATCH_SIZE: usize = 256;

/// Points fetched per scroll page.
const SCROLL_PAGE_SIZE: usize = 1_000;

struct QdrantInner {
    http: Client,
    config: QdrantConfig,
    /// Vector size of the collection once it is known to exist.
    ///
    /// Cleared when a write finds the collection gone, so the next write
    /// recreates it.
    collection_size: Mutex<Option<usize>>,
}

/// [`VectorStore`] backed by a Qdrant collection, one point per chunk.
///
/// The collection is created on first write with cosine distance and keyword
/// indexes on `knowledge_base_id` and `document_id`. Deletes are physical.
#[derive(Clone)]
pub struct QdrantVectorStore {
    inner: Arc<QdrantInner>,
}

impl QdrantVectorStore {
    /// Creates a store for the configured collection.
    ///
    /// No request is made until the first operation.
    pub fn new(config: QdrantConfig) -> VectorResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("recall/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VectorError::connection(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(
            target: TRACING_TARGET_QDRANT,
            url = %config.base_url(),
            collection = %config.qdrant_collection,
            "Qdrant store configured"
        );

        Ok(Self {
            inner: Arc::new(QdrantInner {
                http,
                config,
                collection_size: Mutex::new(None),
            }),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &QdrantConfig {
        &self.inner.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.inner.config.collection_url());
        let request = self.inner.http.request(method, url);
        match &self.inner.config.qdrant_api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    /// Sends a request, returning `None` when the collection does not exist.
    ///
    /// Only reads and deletes may treat a missing collection as empty.
    async fn send_optional<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> VectorResult<Option<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| VectorError::backend(format!("qdrant {operation} failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorError::backend(format!(
                "qdrant {operation} failed: {status}: {body}"
            )));
        }

        let body: Response<T> = response
            .json()
            .await
            .map_err(|e| VectorError::backend(format!("qdrant {operation} failed: {e}")))?;
        Ok(Some(body.result))
    }

    /// Sends a request that must reach an existing collection.
    async fn send<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> VectorResult<T> {
        self.send_optional(operation, request)
            .await?
            .ok_or_else(|| VectorError::backend(format!("qdrant {operation} failed: collection missing")))
    }

    /// Sends a write into the collection, forgetting its cached size when the
    /// collection turns out to be missing.
    async fn write(&self, operation: &str, request: RequestBuilder) -> VectorResult<()> {
        match self.send_optional::<Value>(operation, request).await? {
            Some(_) => Ok(()),
            None => {
                *self.inner.collection_size.lock().await = None;
                tracing::warn!(
                    target: TRACING_TARGET_QDRANT,
                    collection = %self.inner.config.qdrant_collection,
                    operation,
                    "Collection missing on write"
                );
                Err(VectorError::backend(format!(
                    "qdrant {operation} failed: collection missing"
                )))
            }
        }
    }

    /// Makes sure the collection exists with vectors of `dimensions`.
    async fn ensure_collection(&self, dimensions: usize) -> VectorResult<()> {
        let mut cached = self.inner.collection_size.lock().await;
        let size = match *cached {
            Some(size) => size,
            None => {
                let size = self.open_or_create_collection(dimensions).await?;
                *cached = Some(size);
                size
            }
        };

        if size != dimensions {
            return Err(VectorError::dimension_mismatch(size, dimensions));
        }
        Ok(())
    }

    async fn open_or_create_collection(&self, dimensions: usize) -> VectorResult<usize> {
        let existing: Option<CollectionInfo> = self
            .send_optional("get collection", self.request(Method::GET, ""))
            .await?;

        if let Some(info) = existing {
            let size = info.config.params.vectors.size;
            tracing::debug!(target: TRACING_TARGET_QDRANT, size, "Using existing collection");
            return Ok(size);
        }

        let size = self.inner.config.qdrant_dimensions.unwrap_or(dimensions);
        self.send::<Value>(
            "create collection",
            self.request(Method::PUT, "").json(&wire::create_collection_body(size)),
        )
        .await?;

        for field in wire::INDEXED_FIELDS {
            self.send::<Value>(
                "create index",
                self.request(Method::PUT, "/index?wait=true")
                    .json(&wire::create_index_body(field)),
            )
            .await?;
        }

        tracing::info!(
            target: TRACING_TARGET_QDRANT,
            collection = %self.inner.config.qdrant_collection,
            size,
            "Created collection"
        );
        Ok(size)
    }

    async fn check_query(&self, query: &[f32]) -> VectorResult<()> {
        let cached = *self.inner.collection_size.lock().await;
        let expected = cached.or(self.inner.config.qdrant_dimensions);

        match expected {
            Some(expected) if expected != query.len() => {
                Err(VectorError::dimension_mismatch(expected, query.len()))
            }
            _ => Ok(()),
        }
    }

    /// Deletes matching points; a missing collection holds nothing to delete.
    async fn delete_by_filter(&self, filter: Value) -> VectorResult<()> {
        self.send_optional::<Value>(
            "delete",
            self.request(Method::POST, "/points/delete?wait=true")
                .json(&wire::delete_filter_body(filter)),
        )
        .await?;
        Ok(())
    }

    /// Walks every page of a scroll, handing each point to `visit`.
    async fn scroll(
        &self,
        filter: Value,
        with_payload: Value,
        mut visit: impl FnMut(wire::RecordPoint) + Send,
    ) -> VectorResult<()> {
        let mut offset = None;
        loop {
            let body = wire::scroll_body(filter.clone(), SCROLL_PAGE_SIZE, with_payload.clone(), offset);
            let page: Option<ScrollPage> = self
                .send_optional("scroll", self.request(Method::POST, "/points/scroll").json(&body))
                .await?;

            let Some(page) = page else {
                return Ok(());
            };

            page.points.into_iter().for_each(&mut visit);
            match page.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => return Ok(()),
            }
        }
    }
}

impl std::fmt::Debug for QdrantVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantVectorStore")
            .field("config", &self.inner.config)
            .field(
                "collection_size",
                &self.inner.collection_size.try_lock().ok().and_then(|size| *size),
            )
            .finish()
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    #[tracing::instrument(skip_all, target = TRACING_TARGET_QDRANT, fields(count = vectors.len()))]
    async fn add_vectors(&self, vectors: Vec<Vector>) -> recall_core::Result<()> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };

        let dimensions = first.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.dimensions() != dimensions) {
            return Err(VectorError::dimension_mismatch(dimensions, bad.dimensions()).into());
        }
        self.ensure_collection(dimensions).await?;

        let points: Vec<Point> = vectors.into_iter().map(Point::from).collect();
        let total = points.len();
        let mut points = points.into_iter().peekable();
        while points.peek().is_some() {
            let batch: Vec<Point> = points.by_ref().take(UPSERT_BATCH_SIZE).collect();
            self.write(
                "upsert",
                self.request(Method::PUT, "/points?wait=true")
                    .json(&wire::upsert_body(batch)),
            )
            .await?;
        }

        tracing::debug!(target: TRACING_TARGET_QDRANT, total, "Upserted points");
        Ok(())
    }

    #[tracing::instrument(skip(self, query), target = TRACING_TARGET_QDRANT)]
    async fn search(
        &self,
        knowledge_base_id: Uuid,
        query: &[f32],
        top_k: usize,
    ) -> recall_core::Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(vec![]);
        }
        self.check_query(query).await?;

        let body = wire::search_body(knowledge_base_id, query, top_k);
        let hits: Option<Vec<ScoredPoint>> = self
            .send_optional("search", self.request(Method::POST, "/points/search").json(&body))
            .await?;

        let results: Vec<SearchResult> = hits
            .unwrap_or_default()
            .into_iter()
            .filter_map(ScoredPoint::into_search_result)
            .collect();

        tracing::debug!(target: TRACING_TARGET_QDRANT, results = results.len(), "Vector search completed");
        Ok(results)
    }

    async fn renumber_chunks(&self, knowledge_base_id: Uuid, updates: &[(Uuid, i32)]) -> recall_core::Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        self.write(
            "renumber",
            self.request(Method::POST, "/points/batch?wait=true")
                .json(&wire::renumber_body(updates)),
        )
        .await?;

        tracing::debug!(
            target: TRACING_TARGET_QDRANT,
            knowledge_base_id = %knowledge_base_id,
            count = updates.len(),
            "Renumbered points"
        );
        Ok(())
    }

    async fn delete_vectors(&self, chunk_ids: &[Uuid]) -> recall_core::Result<()> {
        if chunk_ids.is_empty() {
            return Ok(());
        }

        self.send_optional::<Value>(
            "delete",
            self.request(Method::POST, "/points/delete?wait=true")
                .json(&wire::delete_points_body(chunk_ids)),
        )
        .await?;

        tracing::debug!(target: TRACING_TARGET_QDRANT, count = chunk_ids.len(), "Deleted points by id");
        Ok(())
    }

    async fn delete_by_document(&self, knowledge_base_id: Uuid, document_id: Uuid) -> recall_core::Result<()> {
        self.delete_by_filter(wire::document_filter(knowledge_base_id, document_id))
            .await?;

        tracing::debug!(target: TRACING_TARGET_QDRANT, document_id = %document_id, "Deleted document points");
        Ok(())
    }

    async fn delete_by_knowledge_base(&self, knowledge_base_id: Uuid) -> recall_core::Result<()> {
        self.delete_by_filter(wire::knowledge_base_filter(knowledge_base_id))
            .await?;

        tracing::info!(
            target: TRACING_TARGET_QDRANT,
            knowledge_base_id = %knowledge_base_id,
            "Deleted knowledge base points"
        );
        Ok(())
    }

    async fn get_stats(&self, knowledge_base_id: Uuid) -> recall_core::Result<VectorStats> {
        let filter = wire::knowledge_base_filter(knowledge_base_id);
        let count: Option<CountResult> = self
            .send_optional(
                "count",
                self.request(Method::POST, "/points/count")
                    .json(&wire::count_body(filter.clone())),
            )
            .await?;

        let Some(count) = count else {
            return Ok(VectorStats::default());
        };

        let mut documents = HashSet::new();
        self.scroll(filter, json!(["document_id"]), |point| {
            if let Some(id) = point.document_id() {
                documents.insert(id);
            }
        })
        .await?;

        Ok(VectorStats {
            total_vectors: count.count,
            total_documents: documents.len() as u64,
        })
    }

    async fn list_document_chunks(
        &self,
        knowledge_base_id: Uuid,
        document_id: Uuid,
    ) -> recall_core::Result<Vec<ChunkRecord>> {
        let mut records = Vec::new();
        self.scroll(
            wire::document_filter(knowledge_base_id, document_id),
            json!(true),
            |point| records.extend(point.into_record()),
        )
        .await?;

        records.sort_by_key(|r| r.chunk_index);
        Ok(records)
    }

    fn backend_name(&self) -> &str {
        "qdrant"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::Uri;
    use axum::response::Json;

    use super::*;

    const COLLECTION: &str = "/collections/chunks";

    type Responder = dyn Fn(&Method, &str) -> (StatusCode, Value) + Send + Sync;

    /// In-process stand-in for the Qdrant REST API.
    #[derive(Clone)]
    struct MockQdrant {
        requests: Arc<std::sync::Mutex<Vec<(Method, String, Value)>>>,
        respond: Arc<Responder>,
    }

    impl MockQdrant {
        fn requests(&self) -> Vec<(Method, String, Value)> {
            self.requests.lock().unwrap().clone()
        }

        fn count(&self, method: Method, path: &str) -> usize {
            self.requests()
                .iter()
                .filter(|(m, p, _)| *m == method && p == path)
                .count()
        }
    }

    async fn handle(
        State(mock): State<MockQdrant>,
        method: Method,
        uri: Uri,
        body: Bytes,
    ) -> (StatusCode, Json<Value>) {
        let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
        let path = uri.path().to_owned();
        let (status, value) = (mock.respond)(&method, &path);
        mock.requests.lock().unwrap().push((method, path, body));
        (status, Json(value))
    }

    async fn serve(
        respond: impl Fn(&Method, &str) -> (StatusCode, Value) + Send + Sync + 'static,
    ) -> (QdrantVectorStore, MockQdrant) {
        let mock = MockQdrant {
            requests: Arc::default(),
            respond: Arc::new(respond),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(handle).with_state(mock.clone());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = QdrantConfig::new(format!("http://{addr}")).with_collection("chunks");
        (QdrantVectorStore::new(config).unwrap(), mock)
    }

    fn ok(result: Value) -> (StatusCode, Value) {
        (StatusCode::OK, json!({ "result": result, "status": "ok" }))
    }

    fn not_found() -> (StatusCode, Value) {
        (StatusCode::NOT_FOUND, json!({ "status": { "error": "Not found" } }))
    }

    fn collection_info(size: usize) -> (StatusCode, Value) {
        ok(json!({ "config": { "params": { "vectors": { "size": size, "distance": "Cosine" } } } }))
    }

    fn vector(knowledge_base_id: Uuid, embedding: Vec<f32>) -> Vector {
        Vector {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            knowledge_base_id,
            tenant_id: Uuid::new_v4(),
            chunk_index: 0,
            content: "Ownership moves values.".to_owned(),
            content_hash: "abc".to_owned(),
            token_count: 4,
            start_offset: 0,
            end_offset: 23,
            embedding,
            embedding_model: "test".to_owned(),
            embedding_provider: "test".to_owned(),
            metadata: json!({}),
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        assert!(QdrantVectorStore::new(QdrantConfig::new("qdrant:6333")).is_err());
    }

    #[tokio::test]
    async fn test_check_query_uses_configured_dimensions() {
        let store =
            QdrantVectorStore::new(QdrantConfig::new("http://localhost:6333").with_dimensions(3))
                .unwrap();

        assert!(store.check_query(&[0.1, 0.2, 0.3]).await.is_ok());
        assert!(matches!(
            store.check_query(&[0.1, 0.2]).await,
            Err(VectorError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_debug_masks_api_key() {
        let store =
            QdrantVectorStore::new(QdrantConfig::new("http://localhost:6333").with_api_key("k-123"))
                .unwrap();
        assert!(!format!("{store:?}").contains("k-123"));
    }

    #[tokio::test]
    async fn test_empty_writes_make_no_requests() {
        let store = QdrantVectorStore::new(QdrantConfig::new("http://127.0.0.1:9")).unwrap();
        assert!(store.add_vectors(vec![]).await.is_ok());
        assert!(store.delete_vectors(&[]).await.is_ok());
        assert!(store.renumber_chunks(Uuid::new_v4(), &[]).await.is_ok());
        assert!(store.search(Uuid::new_v4(), &[1.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collection_is_created_on_first_write() {
        let created = Arc::new(AtomicBool::new(false));
        let flag = created.clone();
        let (store, mock) = serve(move |method, path| match (method.as_str(), path) {
            ("GET", COLLECTION) if !flag.load(Ordering::SeqCst) => not_found(),
            ("GET", COLLECTION) => collection_info(2),
            ("PUT", COLLECTION) => {
                flag.store(true, Ordering::SeqCst);
                ok(json!(true))
            }
            _ => ok(json!({ "operation_id": 1, "status": "completed" })),
        })
        .await;

        let kb = Uuid::new_v4();
        store.add_vectors(vec![vector(kb, vec![0.6, 0.8])]).await.unwrap();
        store.add_vectors(vec![vector(kb, vec![1.0, 0.0])]).await.unwrap();
        assert!(created.load(Ordering::SeqCst));

        let requests = mock.requests();
        let create = requests
            .iter()
            .find(|(m, p, _)| *m == Method::PUT && p == COLLECTION)
            .unwrap();
        assert_eq!(create.2, json!({ "vectors": { "size": 2, "distance": "Cosine" } }));

        let indexed: Vec<&str> = requests
            .iter()
            .filter(|(_, p, _)| p.ends_with("/index"))
            .filter_map(|(_, _, body)| body["field_name"].as_str())
            .collect();
        assert_eq!(indexed, vec!["knowledge_base_id", "document_id"]);

        // The collection is looked up once, then cached.
        assert_eq!(mock.count(Method::GET, COLLECTION), 1);
        assert_eq!(mock.count(Method::PUT, "/collections/chunks/points"), 2);
    }

    #[tokio::test]
    async fn test_upsert_into_missing_collection_fails() {
        let (store, mock) = serve(|method, path| match (method.as_str(), path) {
            ("GET", COLLECTION) => collection_info(2),
            _ => not_found(),
        })
        .await;

        let kb = Uuid::new_v4();
        let err = store.add_vectors(vec![vector(kb, vec![1.0, 0.0])]).await.unwrap_err();
        assert!(matches!(err, recall_core::Error::VectorStore(_)));
        assert!(err.to_string().contains("collection missing"));

        // The cached size was dropped, so the next write looks the collection up again.
        assert!(store.add_vectors(vec![vector(kb, vec![1.0, 0.0])]).await.is_err());
        assert_eq!(mock.count(Method::GET, COLLECTION), 2);

        assert!(store.renumber_chunks(kb, &[(Uuid::new_v4(), 1)]).await.is_err());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_fatal() {
        let (store, mock) = serve(|method, path| match (method.as_str(), path) {
            ("GET", COLLECTION) => collection_info(3),
            _ => ok(json!({})),
        })
        .await;

        let err = store
            .add_vectors(vec![vector(Uuid::new_v4(), vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, recall_core::Error::DimensionMismatch { expected: 3, actual: 2 }));
        assert!(!err.is_retryable());
        assert_eq!(mock.count(Method::PUT, "/collections/chunks/points"), 0);

        let err = store.search(Uuid::new_v4(), &[1.0, 0.0], 5).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_search_filters_by_knowledge_base() {
        let kb = Uuid::new_v4();
        let hit = vector(kb, vec![1.0, 0.0]);
        let payload = serde_json::to_value(Point::from(hit.clone()).payload).unwrap();
        let hit_id = hit.id;
        let (store, mock) = serve(move |_, _| {
            ok(json!([{ "id": hit_id, "version": 1, "score": 0.87, "payload": payload.clone() }]))
        })
        .await;

        let results = store.search(kb, &[1.0, 0.0], 4).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, hit_id);
        assert_eq!(results[0].knowledge_base_id, kb);
        assert!((results[0].score - 0.87).abs() < 1e-6);

        let (method, path, body) = mock.requests().remove(0);
        assert_eq!(method, Method::POST);
        assert_eq!(path, "/collections/chunks/points/search");
        assert_eq!(body["limit"], 4);
        assert_eq!(body["filter"], wire::knowledge_base_filter(kb));
    }

    #[tokio::test]
    async fn test_reads_and_deletes_on_missing_collection_are_empty() {
        let (store, _mock) = serve(|_, _| not_found()).await;
        let kb = Uuid::new_v4();

        assert!(store.search(kb, &[1.0], 5).await.unwrap().is_empty());
        assert_eq!(store.get_stats(kb).await.unwrap(), VectorStats::default());
        assert!(store.list_document_chunks(kb, Uuid::new_v4()).await.unwrap().is_empty());
        assert!(store.delete_by_document(kb, Uuid::new_v4()).await.is_ok());
        assert!(store.delete_vectors(&[Uuid::new_v4()]).await.is_ok());
    }

    #[tokio::test]
    async fn test_deletes_use_ids_and_filters() {
        let (store, mock) = serve(|_, _| ok(json!({ "operation_id": 2, "status": "completed" }))).await;
        let (kb, document, chunk) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        store.delete_vectors(&[chunk]).await.unwrap();
        store.delete_by_document(kb, document).await.unwrap();
        store.delete_by_knowledge_base(kb).await.unwrap();

        let requests = mock.requests();
        assert!(
            requests
                .iter()
                .all(|(m, p, _)| *m == Method::POST && p == "/collections/chunks/points/delete")
        );
        assert_eq!(requests[0].2, json!({ "points": [chunk] }));
        assert_eq!(requests[1].2, json!({ "filter": wire::document_filter(kb, document) }));
        assert_eq!(requests[2].2, json!({ "filter": wire::knowledge_base_filter(kb) }));
    }

    #[tokio::test]
    async fn test_renumber_sets_chunk_index_payload() {
        let (store, mock) = serve(|_, _| ok(json!([{ "operation_id": 3, "status": "completed" }]))).await;
        let chunk = Uuid::new_v4();

        store.renumber_chunks(Uuid::new_v4(), &[(chunk, 7)]).await.unwrap();

        let (method, path, body) = mock.requests().remove(0);
        assert_eq!(method, Method::POST);
        assert_eq!(path, "/collections/chunks/points/batch");
        assert_eq!(body, wire::renumber_body(&[(chunk, 7)]));
    }
}
