//! Backend selection.

#[cfg(feature = "config")]
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which vector store backend to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[cfg_attr(feature = "config", derive(ValueEnum))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VectorBackend {
    /// `document_chunks` table with the pgvector extension.
    #[default]
    Pgvector,
    /// Qdrant over its REST API.
    Qdrant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!(VectorBackend::Pgvector.to_string(), "pgvector");
        assert_eq!("qdrant".parse::<VectorBackend>().ok(), Some(VectorBackend::Qdrant));
    }
}
