use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::payouts;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = payouts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Payout {
    pub id: Uuid,
    pub beneficiary_type: String,
    pub beneficiary_id: Uuid,
    pub amount: BigDecimal,
    pub status: String,
    pub request_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payouts)]
pub struct NewPayout {
    pub id: Uuid,
    pub beneficiary_type: String,
    pub beneficiary_id: Uuid,
    pub amount: BigDecimal,
    pub status: String,
    pub request_type: String,
}

pub const PAYOUT_PENDING: &str = "PENDING";
pub const PAYOUT_SCHEDULED: &str = "SCHEDULED";
pub const PAYOUT_PAID: &str = "PAID";
pub const PAYOUT_REJECTED: &str = "REJECTED";

pub const BENEFICIARY_FARMER: &str = "FARMER";
pub const BENEFICIARY_CR: &str = "CR";
pub const BENEFICIARY_PICKUP_AGENT: &str = "PICKUP_AGENT";

pub const REQUEST_ON_DEMAND: &str = "ON_DEMAND";
pub const REQUEST_WEEKLY: &str = "WEEKLY";
