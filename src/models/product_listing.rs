use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::product_listings;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = product_listings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductListing {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: BigDecimal,
    pub farmer_price: BigDecimal,
    pub available_qty: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = product_listings)]
pub struct NewProductListing {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: BigDecimal,
    pub farmer_price: BigDecimal,
    pub available_qty: i32,
    pub status: String,
}

pub const LISTING_PENDING: &str = "PENDING";
pub const LISTING_APPROVED: &str = "APPROVED";
pub const LISTING_REJECTED: &str = "REJECTED";
