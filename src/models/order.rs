use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::orders;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub total_amount: BigDecimal,
    pub discount_amount: BigDecimal,
    pub coupon_code: Option<String>,
    pub cash_collected: bool,
    pub gateway_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrder {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub total_amount: BigDecimal,
    pub discount_amount: BigDecimal,
    pub coupon_code: Option<String>,
}
