//! Concurrent search across several knowledge bases.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use uuid::Uuid;

use super::{DEFAULT_TOP_K, RetrievalService, SearchRequest, SearchResponse};
use crate::model::{SearchResult, sort_by_score_desc};
use crate::{Error, Result, TRACING_TARGET_RETRIEVAL};

/// One knowledge base to search, with a score multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseTarget {
    pub knowledge_base_id: Uuid,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

impl KnowledgeBaseTarget {
    /// Targets a knowledge base with weight 1.0.
    pub fn new(knowledge_base_id: Uuid) -> Self {
        Self {
            knowledge_base_id,
            weight: 1.0,
        }
    }

    #[must_use]
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }
}

/// A search fanned out over several knowledge bases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSearchRequest {
    pub targets: Vec<KnowledgeBaseTarget>,
    pub query: String,
    pub top_k: usize,
    pub hybrid: bool,
    /// Rerank the merged list once.
    pub rerank: bool,
    pub rerank_top_k: Option<usize>,
    pub score_threshold: Option<f32>,
}

impl MultiSearchRequest {
    /// Creates a request over `targets` with default options.
    pub fn new(targets: Vec<KnowledgeBaseTarget>, query: impl Into<String>) -> Self {
        Self {
            targets,
            query: query.into(),
            top_k: DEFAULT_TOP_K,
            hybrid: false,
            rerank: false,
            rerank_top_k: None,
            score_threshold: None,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_hybrid(mut self, hybrid: bool) -> Self {
        self.hybrid = hybrid;
        self
    }

    #[must_use]
    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }

    #[must_use]
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    fn per_knowledge_base(&self, knowledge_base_id: Uuid) -> SearchRequest {
        SearchRequest::new(knowledge_base_id, self.query.clone())
            .with_top_k(self.top_k)
            .with_hybrid(self.hybrid)
    }
}

/// A knowledge base whose search failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedKnowledgeBase {
    pub knowledge_base_id: Uuid,
    pub error: String,
}

/// Merged results of a multi-knowledge-base search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSearchResponse {
    pub query: String,
    pub top_k: usize,
    pub results: Vec<SearchResult>,
    pub failed_knowledge_bases: Vec<FailedKnowledgeBase>,
}

/// Runs one single-knowledge-base search per target concurrently.
///
/// Each target gets its own task; every task yields exactly one outcome, so
/// collection always terminates. A failing knowledge base is reported in
/// [`MultiSearchResponse::failed_knowledge_bases`] and never fails the call.
#[derive(Debug, Clone)]
pub struct MultiKbSearcher {
    service: RetrievalService,
}

impl MultiKbSearcher {
    /// Creates a searcher over the given service.
    pub fn new(service: RetrievalService) -> Self {
        Self { service }
    }

    /// Merges per-knowledge-base results by weighted score.
    #[tracing::instrument(
        skip_all,
        target = TRACING_TARGET_RETRIEVAL,
        fields(targets = request.targets.len(), top_k = request.top_k)
    )]
    pub async fn search(&self, request: &MultiSearchRequest) -> Result<MultiSearchResponse> {
        let (lists, failed) = self.fan_out(request).await?;

        let mut results: Vec<SearchResult> = lists.into_iter().flatten().collect();
        sort_by_score_desc(&mut results);

        let reranked = self.rerank_merged(request, &mut results).await;
        if let Some(threshold) = request.score_threshold {
            results.retain(|r| r.score >= threshold);
        }
        if !reranked {
            results.truncate(request.top_k);
        }

        Ok(MultiSearchResponse {
            query: request.query.clone(),
            top_k: request.top_k,
            results,
            failed_knowledge_bases: failed,
        })
    }

    /// Merges per-knowledge-base result lists by Reciprocal Rank Fusion.
    ///
    /// The score threshold applies to each list before fusion, since fused
    /// scores are on a different scale.
    #[tracing::instrument(
        skip_all,
        target = TRACING_TARGET_RETRIEVAL,
        fields(targets = request.targets.len(), top_k = request.top_k)
    )]
    pub async fn search_with_fusion(
        &self,
        request: &MultiSearchRequest,
    ) -> Result<MultiSearchResponse> {
        let (mut lists, failed) = self.fan_out(request).await?;
        if let Some(threshold) = request.score_threshold {
            for list in &mut lists {
                list.retain(|r| r.score >= threshold);
            }
        }

        let mut results = self.service.deps().rrf.fuse(&lists);
        let reranked = self.rerank_merged(request, &mut results).await;
        if !reranked {
            results.truncate(request.top_k);
        }

        Ok(MultiSearchResponse {
            query: request.query.clone(),
            top_k: request.top_k,
            results,
            failed_knowledge_bases: failed,
        })
    }

    /// Returns weighted result lists in target order plus the failed targets.
    async fn fan_out(
        &self,
        request: &MultiSearchRequest,
    ) -> Result<(Vec<Vec<SearchResult>>, Vec<FailedKnowledgeBase>)> {
        if request.query.trim().is_empty() {
            return Err(Error::EmptyContent);
        }

        let mut tasks = JoinSet::new();
        let mut positions = HashMap::with_capacity(request.targets.len());
        for (position, target) in request.targets.iter().enumerate() {
            let service = self.service.clone();
            let single = request.per_knowledge_base(target.knowledge_base_id);
            let handle = tasks.spawn(async move { service.search(&single).await });
            positions.insert(handle.id(), position);
        }

        let mut outcomes: Vec<Option<Result<SearchResponse>>> =
            (0..request.targets.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(err) => (
                    err.id(),
                    Err(Error::vector_store(format!("search task failed: {err}"))),
                ),
            };
            if let Some(&position) = positions.get(&id) {
                outcomes[position] = Some(outcome);
            }
        }

        let mut lists = Vec::with_capacity(outcomes.len());
        let mut failed = Vec::new();
        for (target, outcome) in request.targets.iter().zip(outcomes) {
            match outcome {
                Some(Ok(response)) => {
                    let mut list = response.results;
                    for result in &mut list {
                        result.score *= target.weight;
                    }
                    lists.push(list);
                }
                Some(Err(err)) => {
                    tracing::warn!(
                        target: TRACING_TARGET_RETRIEVAL,
                        knowledge_base_id = %target.knowledge_base_id,
                        error = %err,
                        "Knowledge base search failed"
                    );
                    failed.push(FailedKnowledgeBase {
                        knowledge_base_id: target.knowledge_base_id,
                        error: err.to_string(),
                    });
                }
                None => failed.push(FailedKnowledgeBase {
                    knowledge_base_id: target.knowledge_base_id,
                    error: "search task produced no result".to_owned(),
                }),
            }
        }

        tracing::debug!(
            target: TRACING_TARGET_RETRIEVAL,
            succeeded = lists.len(),
            failed = failed.len(),
            "Fan-out completed"
        );
        Ok((lists, failed))
    }

    /// Reranks the merged list once; returns whether it was reranked.
    async fn rerank_merged(&self, request: &MultiSearchRequest, results: &mut Vec<SearchResult>) -> bool {
        if !request.rerank {
            return false;
        }
        let Some(reranker) = &self.service.deps().reranker else {
            return false;
        };

        let top_k = request.rerank_top_k.unwrap_or(request.top_k);
        match reranker.rerank(&request.query, results.clone(), top_k).await {
            Ok(ordered) => {
                *results = ordered;
                true
            }
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET_RETRIEVAL,
                    reranker = reranker.name(),
                    error = %err,
                    "Rerank of merged results failed, keeping weighted order"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KnowledgeBase;
    use crate::retrieval::service::tests::{SENTENCES, fixture, ingest, ingest_into};

    #[tokio::test]
    async fn test_failing_knowledge_base_is_isolated() {
        let mut fx = fixture().await;
        ingest(&mut fx, "rust.txt", SENTENCES).await;

        let second = KnowledgeBase::new(fx.kb.tenant_id, "runtime", "hashing-256");
        fx.repo.insert_knowledge_base(second.clone()).await;
        ingest_into(&mut fx, &second, "tokio.txt", "Tokio schedules async tasks.").await;

        let missing = Uuid::new_v4();
        let request = MultiSearchRequest::new(
            vec![
                KnowledgeBaseTarget::new(fx.kb.id),
                KnowledgeBaseTarget::new(missing),
                KnowledgeBaseTarget::new(second.id),
            ],
            "borrow checker tokio",
        )
        .with_top_k(10);

        let searcher = MultiKbSearcher::new(fx.service.clone());
        let response = searcher.search(&request).await.unwrap();

        assert_eq!(response.failed_knowledge_bases.len(), 1);
        assert_eq!(response.failed_knowledge_bases[0].knowledge_base_id, missing);
        let sources: Vec<Uuid> = response.results.iter().map(|r| r.knowledge_base_id).collect();
        assert!(sources.contains(&fx.kb.id));
        assert!(sources.contains(&second.id));
        assert!(
            response
                .results
                .windows(2)
                .all(|w| w[0].score >= w[1].score)
        );
    }

    #[tokio::test]
    async fn test_weights_scale_scores() {
        let mut fx = fixture().await;
        ingest(&mut fx, "rust.txt", SENTENCES).await;
        let searcher = MultiKbSearcher::new(fx.service.clone());

        let plain = searcher
            .search(&MultiSearchRequest::new(vec![KnowledgeBaseTarget::new(fx.kb.id)], "borrow checker"))
            .await
            .unwrap();
        let weighted = searcher
            .search(&MultiSearchRequest::new(
                vec![KnowledgeBaseTarget::new(fx.kb.id).with_weight(0.5)],
                "borrow checker",
            ))
            .await
            .unwrap();

        let expected = plain.results[0].score * 0.5;
        assert!((weighted.results[0].score - expected).abs() < 1e-6);
        assert_eq!(weighted.results[0].knowledge_base_name.as_deref(), Some("handbook"));
    }

    #[tokio::test]
    async fn test_search_with_fusion() {
        let mut fx = fixture().await;
        ingest(&mut fx, "rust.txt", SENTENCES).await;
        let second = KnowledgeBase::new(fx.kb.tenant_id, "runtime", "hashing-256");
        fx.repo.insert_knowledge_base(second.clone()).await;
        ingest_into(&mut fx, &second, "tokio.txt", "Tokio schedules async tasks.").await;

        let request = MultiSearchRequest::new(
            vec![KnowledgeBaseTarget::new(fx.kb.id), KnowledgeBaseTarget::new(second.id)],
            "tokio",
        )
        .with_top_k(2);
        let response = MultiKbSearcher::new(fx.service.clone())
            .search_with_fusion(&request)
            .await
            .unwrap();

        assert!(response.failed_knowledge_bases.is_empty());
        assert_eq!(response.results.len(), 2);
        // Both lists contribute their top item with the same RRF score.
        assert!((response.results[0].score - 1.0 / 61.0).abs() < 1e-6);
        assert!((response.results[1].score - 1.0 / 61.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let fx = fixture().await;
        let request = MultiSearchRequest::new(vec![KnowledgeBaseTarget::new(fx.kb.id)], " ");
        assert!(matches!(
            MultiKbSearcher::new(fx.service.clone()).search(&request).await,
            Err(Error::EmptyContent)
        ));
    }
}
