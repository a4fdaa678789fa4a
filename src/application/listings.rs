use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::models::inventory_transaction::{NewInventoryTransaction, REASON_RESTOCK};
use crate::models::product_listing::{
    NewProductListing, ProductListing, LISTING_APPROVED, LISTING_PENDING,
};
use crate::models::user::User;
use crate::schema::{inventory_transactions, product_listings, users};

#[derive(Debug)]
pub struct ListingInput {
    pub name: String,
    pub description: Option<String>,
    pub unit_price: BigDecimal,
    pub farmer_price: BigDecimal,
    pub available_qty: i32,
}

/// A farmer lists produce. The listing waits for admin approval; initial
/// stock is logged as a RESTOCK movement so the ledger starts reconciled.
pub fn create_listing(
    conn: &mut PgConnection,
    farmer_id: Uuid,
    input: ListingInput,
) -> Result<ProductListing, DomainError> {
    if input.name.trim().is_empty() {
        return Err(DomainError::Validation(
            "a listing needs a name".to_string(),
        ));
    }
    if input.unit_price <= BigDecimal::zero() || input.farmer_price <= BigDecimal::zero() {
        return Err(DomainError::Validation(
            "prices must be positive".to_string(),
        ));
    }
    if input.farmer_price > input.unit_price {
        return Err(DomainError::Validation(
            "farmer price cannot exceed the listed price".to_string(),
        ));
    }
    if input.available_qty < 0 {
        return Err(DomainError::Validation(
            "stock cannot be negative".to_string(),
        ));
    }

    conn.transaction::<_, DomainError, _>(|conn| {
        let farmer: User = users::table
            .find(farmer_id)
            .select(User::as_select())
            .first(conn)?;
        if !farmer.approved {
            return Err(DomainError::Forbidden(
                "account is still pending approval".to_string(),
            ));
        }

        let listing: ProductListing = diesel::insert_into(product_listings::table)
            .values(&NewProductListing {
                id: Uuid::new_v4(),
                farmer_id,
                name: input.name.trim().to_string(),
                description: input.description,
                unit_price: input.unit_price,
                farmer_price: input.farmer_price,
                available_qty: input.available_qty,
                status: LISTING_PENDING.to_string(),
            })
            .get_result(conn)?;

        if listing.available_qty > 0 {
            diesel::insert_into(inventory_transactions::table)
                .values(&NewInventoryTransaction {
                    id: Uuid::new_v4(),
                    listing_id: listing.id,
                    order_id: None,
                    delta: listing.available_qty,
                    reason: REASON_RESTOCK.to_string(),
                })
                .execute(conn)?;
        }
        Ok(listing)
    })
}

pub fn approve_listing(
    conn: &mut PgConnection,
    listing_id: Uuid,
) -> Result<ProductListing, DomainError> {
    conn.transaction::<_, DomainError, _>(|conn| {
        let listing: ProductListing = product_listings::table
            .find(listing_id)
            .select(ProductListing::as_select())
            .first(conn)
            .optional()?
            .ok_or(DomainError::NotFound)?;
        if listing.status != LISTING_PENDING {
            return Err(DomainError::Conflict(format!(
                "listing is already {}",
                listing.status
            )));
        }

        let approved = diesel::update(product_listings::table.find(listing.id))
            .set((
                product_listings::status.eq(LISTING_APPROVED),
                product_listings::updated_at.eq(Utc::now()),
            ))
            .get_result(conn)?;
        Ok(approved)
    })
}

/// Owner-only stock top-up, logged as a RESTOCK movement.
pub fn restock_listing(
    conn: &mut PgConnection,
    farmer_id: Uuid,
    listing_id: Uuid,
    quantity: i32,
) -> Result<ProductListing, DomainError> {
    if quantity <= 0 {
        return Err(DomainError::Validation(
            "restock quantity must be positive".to_string(),
        ));
    }

    conn.transaction::<_, DomainError, _>(|conn| {
        let listing: ProductListing = product_listings::table
            .find(listing_id)
            .select(ProductListing::as_select())
            .first(conn)
            .optional()?
            .ok_or(DomainError::NotFound)?;
        if listing.farmer_id != farmer_id {
            return Err(DomainError::Forbidden(
                "listing belongs to another farmer".to_string(),
            ));
        }

        let updated: ProductListing = diesel::update(product_listings::table.find(listing.id))
            .set((
                product_listings::available_qty
                    .eq(product_listings::available_qty + quantity),
                product_listings::updated_at.eq(Utc::now()),
            ))
            .get_result(conn)?;

        diesel::insert_into(inventory_transactions::table)
            .values(&NewInventoryTransaction {
                id: Uuid::new_v4(),
                listing_id: listing.id,
                order_id: None,
                delta: quantity,
                reason: REASON_RESTOCK.to_string(),
            })
            .execute(conn)?;
        Ok(updated)
    })
}
