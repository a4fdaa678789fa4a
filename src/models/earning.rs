use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::earnings;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = earnings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Earning {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub order_id: Uuid,
    pub order_item_id: Uuid,
    pub amount: BigDecimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = earnings)]
pub struct NewEarning {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub order_id: Uuid,
    pub order_item_id: Uuid,
    pub amount: BigDecimal,
    pub status: String,
}

pub const EARNING_PENDING: &str = "PENDING";
pub const EARNING_PAID: &str = "PAID";
pub const EARNING_CANCELLED: &str = "CANCELLED";
