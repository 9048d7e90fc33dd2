//! Upload, processing and search pipelines.

mod multi;
mod request;
pub(crate) mod service;

pub use multi::{
    FailedKnowledgeBase, KnowledgeBaseTarget, MultiKbSearcher, MultiSearchRequest,
    MultiSearchResponse,
};
pub use request::{DEFAULT_TOP_K, SearchRequest, SearchResponse, UploadRequest};
pub use service::{RetrievalDeps, RetrievalService};
