use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::assignment;
use crate::application::listings::{self, ListingInput};
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::domain::roles::Action;
use crate::errors::AppError;
use crate::models::product_listing::ProductListing;
use crate::services::geocoding::GeocodingClient;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateListingRequest {
    pub name: String,
    pub description: Option<String>,
    /// Decimal price as a string to avoid floating-point issues, e.g. "9.99"
    pub unit_price: String,
    /// The farmer's share per unit, as a decimal string.
    pub farmer_price: String,
    #[serde(default)]
    pub available_qty: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RestockRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListingResponse {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: String,
    pub farmer_price: String,
    pub available_qty: i32,
    pub status: String,
    /// Distance from the caller, only on the browse endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl ListingResponse {
    fn from_listing(l: ProductListing, distance_km: Option<f64>) -> Self {
        Self {
            id: l.id,
            farmer_id: l.farmer_id,
            name: l.name,
            description: l.description,
            unit_price: l.unit_price.to_string(),
            farmer_price: l.farmer_price.to_string(),
            available_qty: l.available_qty,
            status: l.status,
            distance_km,
        }
    }
}

fn parse_price(field: &str, value: &str) -> Result<BigDecimal, AppError> {
    BigDecimal::from_str(value)
        .map_err(|e| AppError::BadRequest(format!("invalid {field} '{value}': {e}")))
}

/// POST /listings — a farmer lists produce, pending admin approval.
#[utoipa::path(
    post,
    path = "/listings",
    request_body = CreateListingRequest,
    responses(
        (status = 201, description = "Listing created", body = ListingResponse),
        (status = 403, description = "Not a farmer, or account pending approval"),
    ),
    tag = "listings"
)]
pub async fn create_listing(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<CreateListingRequest>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::CreateListing) {
        return Err(AppError::Forbidden("only farmers create listings".into()));
    }
    let body = body.into_inner();
    let unit_price = parse_price("unit_price", &body.unit_price)?;
    let farmer_price = parse_price("farmer_price", &body.farmer_price)?;

    let listing = web::block(move || {
        let mut conn = pool.get()?;
        listings::create_listing(
            &mut conn,
            auth.id,
            ListingInput {
                name: body.name,
                description: body.description,
                unit_price,
                farmer_price,
                available_qty: body.available_qty,
            },
        )
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(ListingResponse::from_listing(listing, None)))
}

/// POST /listings/{id}/approve — ADMIN.
#[utoipa::path(
    post,
    path = "/listings/{id}/approve",
    params(("id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Listing approved", body = ListingResponse),
        (status = 409, description = "Listing already reviewed"),
    ),
    tag = "listings"
)]
pub async fn approve_listing(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::ApproveListing) {
        return Err(AppError::Forbidden("only admins approve listings".into()));
    }
    let listing_id = path.into_inner();

    let listing = web::block(move || {
        let mut conn = pool.get()?;
        listings::approve_listing(&mut conn, listing_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(ListingResponse::from_listing(listing, None)))
}

/// POST /listings/{id}/restock — owning farmer tops up stock.
#[utoipa::path(
    post,
    path = "/listings/{id}/restock",
    params(("id" = Uuid, Path, description = "Listing id")),
    request_body = RestockRequest,
    responses(
        (status = 200, description = "Stock updated", body = ListingResponse),
        (status = 403, description = "Someone else's listing"),
    ),
    tag = "listings"
)]
pub async fn restock_listing(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<RestockRequest>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::RestockListing) {
        return Err(AppError::Forbidden("only farmers restock listings".into()));
    }
    let listing_id = path.into_inner();
    let quantity = body.into_inner().quantity;

    let listing = web::block(move || {
        let mut conn = pool.get()?;
        listings::restock_listing(&mut conn, auth.id, listing_id, quantity)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(ListingResponse::from_listing(listing, None)))
}

/// GET /listings
///
/// The caller's visible catalog: approved, in-stock listings from
/// farmers within the visibility radius, nearest first.
#[utoipa::path(
    get,
    path = "/listings",
    responses(
        (status = 200, description = "Visible listings", body = [ListingResponse]),
        (status = 400, description = "Caller's postal code cannot be resolved"),
    ),
    tag = "listings"
)]
pub async fn browse_listings(
    pool: web::Data<DbPool>,
    geocoder: web::Data<GeocodingClient>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::BrowseListings) {
        return Err(AppError::Forbidden("browsing is for customers".into()));
    }

    let visible = web::block(move || {
        let mut conn = pool.get()?;
        assignment::visible_listings(&mut conn, &geocoder, auth.id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    let items: Vec<ListingResponse> = visible
        .into_iter()
        .map(|v| ListingResponse::from_listing(v.listing, Some(v.distance_km)))
        .collect();
    Ok(HttpResponse::Ok().json(items))
}
