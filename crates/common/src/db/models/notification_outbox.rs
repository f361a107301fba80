//! Notification outbox entity

use crate::notify::DeliveryStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_outbox")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub recipient: String,

    #[sea_orm(column_type = "Text")]
    pub subject: String,

    #[sea_orm(column_type = "Text")]
    pub html: String,

    /// pending, sent or failed
    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub attempts: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    /// Earliest time the row may be claimed; doubles as the claim lease
    pub next_attempt_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,

    pub sent_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Get the delivery status as an enum
    pub fn delivery_status(&self) -> DeliveryStatus {
        DeliveryStatus::from(self.status.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
