use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::coupons;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = coupons)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_percent: BigDecimal,
    pub max_discount: BigDecimal,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = coupons)]
pub struct NewCoupon {
    pub id: Uuid,
    pub code: String,
    pub discount_percent: BigDecimal,
    pub max_discount: BigDecimal,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}
