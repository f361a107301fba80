//! Paper entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-readable identifier, `RPMS{YY}-{NNN}`
    #[sea_orm(column_type = "Text", unique)]
    pub code: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub abstract_text: String,

    /// Status display name
    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub author_id: Uuid,

    pub editor_id: Option<Uuid>,

    /// Assigned reviewer ids in assignment order, as a JSON array
    #[sea_orm(column_type = "JsonBinary")]
    pub reviewer_ids: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub final_decision: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub current_artifact: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub final_artifact: Option<String>,

    /// Optimistic concurrency token
    pub revision: i64,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::paper_version::Entity", on_delete = "Cascade")]
    Versions,

    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,

    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::paper_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Versions.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
