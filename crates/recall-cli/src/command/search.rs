//! `recall search`.

use anyhow::Context;
use clap::Args;
use recall_core::retrieval::{
    DEFAULT_TOP_K, KnowledgeBaseTarget, MultiKbSearcher, MultiSearchRequest, SearchRequest,
};
use uuid::Uuid;

use super::print_json;
use crate::TRACING_TARGET_COMMAND;
use crate::config::{Cli, QueueMode, create_services};

#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    /// Knowledge base to search; repeat to search several
    #[arg(long = "kb", required = true)]
    pub knowledge_base_ids: Vec<Uuid>,

    /// Score multiplier per `--kb`, in the same order
    #[arg(long = "weight")]
    pub weights: Vec<f32>,

    /// Query text
    #[arg(long, short)]
    pub query: String,

    /// Number of results
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Fuse vector and keyword results
    #[arg(long, default_value_t = false)]
    pub hybrid: bool,

    /// Rerank the results
    #[arg(long, default_value_t = false)]
    pub rerank: bool,

    /// Candidates passed to the reranker
    #[arg(long)]
    pub rerank_top_k: Option<usize>,

    /// Minimum score a result must reach
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Merge several knowledge bases by reciprocal rank fusion instead of weighted score
    #[arg(long, default_value_t = false)]
    pub fusion: bool,
}

impl SearchArgs {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        self.validate()?;
        let services = create_services(cli, QueueMode::Inline).await?;

        if let Some(request) = self.single_request() {
            let response = services
                .retrieval
                .search(&request)
                .await
                .context("search failed")?;
            tracing::info!(
                target: TRACING_TARGET_COMMAND,
                knowledge_base_id = %response.knowledge_base_id,
                results = response.results.len(),
                "Search complete"
            );
            return print_json(&response);
        }

        let request = self.multi_request();
        let searcher = MultiKbSearcher::new(services.retrieval.clone());
        let response = if self.fusion {
            searcher.search_with_fusion(&request).await
        } else {
            searcher.search(&request).await
        }
        .context("multi knowledge base search failed")?;

        tracing::info!(
            target: TRACING_TARGET_COMMAND,
            knowledge_bases = request.targets.len(),
            failed = response.failed_knowledge_bases.len(),
            results = response.results.len(),
            fusion = self.fusion,
            "Search complete"
        );
        print_json(&response)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.query.trim().is_empty() {
            anyhow::bail!("query must not be empty");
        }
        if self.top_k == 0 {
            anyhow::bail!("top-k must be positive");
        }
        if !self.weights.is_empty() && self.weights.len() != self.knowledge_base_ids.len() {
            anyhow::bail!(
                "expected {} weights, one per --kb, got {}",
                self.knowledge_base_ids.len(),
                self.weights.len()
            );
        }
        if self.weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            anyhow::bail!("weights must be finite and non-negative");
        }
        Ok(())
    }

    /// Returns the request for a plain single knowledge-base search.
    ///
    /// A weight or `--fusion` on one knowledge base goes through the
    /// multi-search path so the options are honoured.
    fn single_request(&self) -> Option<SearchRequest> {
        let [knowledge_base_id] = self.knowledge_base_ids.as_slice() else {
            return None;
        };
        if self.fusion || !self.weights.is_empty() {
            return None;
        }

        let mut request = SearchRequest::new(*knowledge_base_id, self.query.clone())
            .with_top_k(self.top_k)
            .with_hybrid(self.hybrid)
            .with_rerank(self.rerank);
        if let Some(rerank_top_k) = self.rerank_top_k {
            request = request.with_rerank_top_k(rerank_top_k);
        }
        if let Some(threshold) = self.threshold {
            request = request.with_score_threshold(threshold);
        }
        Some(request)
    }

    fn multi_request(&self) -> MultiSearchRequest {
        let targets = self
            .knowledge_base_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let target = KnowledgeBaseTarget::new(*id);
                match self.weights.get(i) {
                    Some(weight) => target.with_weight(*weight),
                    None => target,
                }
            })
            .collect();

        let mut request = MultiSearchRequest::new(targets, self.query.clone())
            .with_top_k(self.top_k)
            .with_hybrid(self.hybrid)
            .with_rerank(self.rerank);
        request.rerank_top_k = self.rerank_top_k;
        if let Some(threshold) = self.threshold {
            request = request.with_score_threshold(threshold);
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::command::Command;

    const KB_A: &str = "0191c1a8-7a3e-7cc2-9c4e-0b8a4f2d1e10";
    const KB_B: &str = "0191c1a8-7a3e-7cc2-9c4e-0b8a4f2d1e12";

    fn parse(args: &[&str]) -> SearchArgs {
        let mut argv = vec!["recall", "--postgres-url", "postgresql://localhost/recall", "search"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Search(args) => args,
            other => panic!("expected search command, got {other:?}"),
        }
    }

    #[test]
    fn test_single_knowledge_base() {
        let args = parse(&["--kb", KB_A, "-q", "rust ownership", "--hybrid", "--threshold", "0.3"]);
        assert!(args.validate().is_ok());

        let request = args.single_request().unwrap();
        assert_eq!(request.knowledge_base_id, KB_A.parse::<Uuid>().unwrap());
        assert_eq!(request.top_k, DEFAULT_TOP_K);
        assert!(request.hybrid);
        assert!(!request.rerank);
        assert_eq!(request.score_threshold, Some(0.3));
    }

    #[test]
    fn test_several_knowledge_bases_with_weights() {
        let args = parse(&[
            "--kb", KB_A, "--kb", KB_B, "--weight", "1.0", "--weight", "0.5", "--query", "q",
            "--top-k", "8", "--rerank",
        ]);
        assert!(args.validate().is_ok());
        assert!(args.single_request().is_none());

        let request = args.multi_request();
        assert_eq!(request.targets.len(), 2);
        assert_eq!(request.targets[1].weight, 0.5);
        assert_eq!(request.top_k, 8);
        assert!(request.rerank);
    }

    #[test]
    fn test_fusion_on_one_knowledge_base_uses_multi_search() {
        let args = parse(&["--kb", KB_A, "--query", "q", "--fusion"]);
        assert!(args.single_request().is_none());
        assert_eq!(args.multi_request().targets[0].weight, 1.0);
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(parse(&["--kb", KB_A, "--kb", KB_B, "--weight", "1.0", "--query", "q"])
            .validate()
            .is_err());
        assert!(parse(&["--kb", KB_A, "--query", "  "]).validate().is_err());
        assert!(parse(&["--kb", KB_A, "--query", "q", "--top-k", "0"]).validate().is_err());
    }

    #[test]
    fn test_knowledge_base_is_required() {
        let result = Cli::try_parse_from([
            "recall",
            "--postgres-url",
            "postgresql://localhost/recall",
            "search",
            "--query",
            "q",
        ]);
        assert!(result.is_err());
    }
}
