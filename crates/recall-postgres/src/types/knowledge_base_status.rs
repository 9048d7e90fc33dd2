//! Knowledge base status enumeration.

use diesel_derive_enum::DbEnum;
use recall_core::model::KnowledgeBaseStatus as CoreKnowledgeBaseStatus;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Corresponds to the `KNOWLEDGE_BASE_STATUS` PostgreSQL enum.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
#[derive(Serialize, Deserialize, DbEnum, Display, EnumIter, EnumString)]
#[ExistingTypePath = "crate::schema::sql_types::KnowledgeBaseStatus"]
pub enum KnowledgeBaseStatus {
    #[db_rename = "active"]
    #[serde(rename = "active")]
    #[strum(serialize = "active")]
    #[default]
    Active,

    #[db_rename = "disabled"]
    #[serde(rename = "disabled")]
    #[strum(serialize = "disabled")]
    Disabled,
}

impl From<CoreKnowledgeBaseStatus> for KnowledgeBaseStatus {
    fn from(status: CoreKnowledgeBaseStatus) -> Self {
        match status {
            CoreKnowledgeBaseStatus::Active => Self::Active,
            CoreKnowledgeBaseStatus::Disabled => Self::Disabled,
        }
    }
}

impl From<KnowledgeBaseStatus> for CoreKnowledgeBaseStatus {
    fn from(status: KnowledgeBaseStatus) -> Self {
        match status {
            KnowledgeBaseStatus::Active => Self::Active,
            KnowledgeBaseStatus::Disabled => Self::Disabled,
        }
    }
}
