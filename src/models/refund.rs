use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::refunds;

/// A refund request, scoped to a single item when `order_item_id` is set,
/// otherwise to the whole order.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = refunds)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Refund {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_item_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub amount: BigDecimal,
    pub status: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refunds)]
pub struct NewRefund {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_item_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub amount: BigDecimal,
    pub status: String,
    pub reason: Option<String>,
}

pub const REFUND_REQUESTED: &str = "REQUESTED";
pub const REFUND_APPROVED: &str = "APPROVED";
pub const REFUND_REJECTED: &str = "REJECTED";
