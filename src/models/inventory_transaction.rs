use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::inventory_transactions;

/// One append-only stock movement. The running sum per listing reconciles
/// against `product_listings.available_qty`.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = inventory_transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InventoryTransaction {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub order_id: Option<Uuid>,
    pub delta: i32,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = inventory_transactions)]
pub struct NewInventoryTransaction {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub order_id: Option<Uuid>,
    pub delta: i32,
    pub reason: String,
}

pub const REASON_ORDER_RESERVE: &str = "ORDER_RESERVE";
pub const REASON_ORDER_CANCEL: &str = "ORDER_CANCEL";
pub const REASON_REFUND: &str = "REFUND";
pub const REASON_RESTOCK: &str = "RESTOCK";
