//! Review entity
//!
//! Unique on (paper_id, reviewer_id, paper_version).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub paper_id: Uuid,

    pub reviewer_id: Uuid,

    pub paper_version: i32,

    #[sea_orm(column_type = "JsonBinary")]
    pub ratings: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub answers: serde_json::Value,

    #[sea_orm(column_type = "Text")]
    pub recommendation: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub confidential_comments: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub comments_to_author: Option<String>,

    /// Artifact references as a JSON array
    #[sea_orm(column_type = "JsonBinary")]
    pub attachments: serde_json::Value,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::paper::Entity",
        from = "Column::PaperId",
        to = "super::paper::Column::Id"
    )]
    Paper,
}

impl Related<super::paper::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Paper.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
