//! Document processing status enumeration.

use diesel_derive_enum::DbEnum;
use recall_core::model::DocumentStatus as CoreDocumentStatus;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Processing status of a document.
///
/// Corresponds to the `DOCUMENT_STATUS` PostgreSQL enum.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
#[derive(Serialize, Deserialize, DbEnum, Display, EnumIter, EnumString)]
#[ExistingTypePath = "crate::schema::sql_types::DocumentStatus"]
pub enum DocumentStatus {
    /// Uploaded and waiting in the queue
    #[db_rename = "pending"]
    #[serde(rename = "pending")]
    #[strum(serialize = "pending")]
    #[default]
    Pending,

    /// Chunking and embedding in flight
    #[db_rename = "processing"]
    #[serde(rename = "processing")]
    #[strum(serialize = "processing")]
    Processing,

    /// Vectors written and statistics recorded
    #[db_rename = "completed"]
    #[serde(rename = "completed")]
    #[strum(serialize = "completed")]
    Completed,

    /// Processing aborted with an error message
    #[db_rename = "failed"]
    #[serde(rename = "failed")]
    #[strum(serialize = "failed")]
    Failed,
}

impl From<CoreDocumentStatus> for DocumentStatus {
    fn from(status: CoreDocumentStatus) -> Self {
        match status {
            CoreDocumentStatus::Pending => Self::Pending,
            CoreDocumentStatus::Processing => Self::Processing,
            CoreDocumentStatus::Completed => Self::Completed,
            CoreDocumentStatus::Failed => Self::Failed,
        }
    }
}

impl From<DocumentStatus> for CoreDocumentStatus {
    fn from(status: DocumentStatus) -> Self {
        match status {
            DocumentStatus::Pending => Self::Pending,
            DocumentStatus::Processing => Self::Processing,
            DocumentStatus::Completed => Self::Completed,
            DocumentStatus::Failed => Self::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_round_trips_through_core_status() {
        for status in DocumentStatus::iter() {
            let core: CoreDocumentStatus = status.into();
            assert_eq!(DocumentStatus::from(core), status);
            assert_eq!(core.to_string(), status.to_string());
        }
    }
}
