use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::assignment;
use crate::application::orders::{self, OrderItemRequest};
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::domain::roles::Action;
use crate::domain::status::{OrderStatus, PaymentStatus, UnknownStatus};
use crate::errors::AppError;
use crate::models::order::Order;
use crate::models::order_item::OrderItem;
use crate::models::pickup_job::PickupJob;
use crate::services::geocoding::GeocodingClient;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderItemRequest {
    pub listing_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub items: Vec<CreateOrderItemRequest>,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub farmer_id: Uuid,
    pub quantity: i32,
    /// Decimal amount as a string to avoid floating-point issues, e.g. "9.99"
    pub unit_price: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: String,
    pub discount_amount: String,
    /// `total_amount - discount_amount`, the sum actually charged.
    pub final_amount: String,
    pub coupon_code: Option<String>,
    pub cash_collected: bool,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    pub fn from_rows(order: Order, items: Vec<OrderItem>) -> Result<Self, AppError> {
        let status: OrderStatus = order
            .status
            .parse()
            .map_err(|e: UnknownStatus| AppError::Internal(e.to_string()))?;
        let payment_status: PaymentStatus = order
            .payment_status
            .parse()
            .map_err(|e: UnknownStatus| AppError::Internal(e.to_string()))?;
        let final_amount = &order.total_amount - &order.discount_amount;
        Ok(Self {
            id: order.id,
            customer_id: order.customer_id,
            status,
            payment_status,
            total_amount: order.total_amount.to_string(),
            discount_amount: order.discount_amount.to_string(),
            final_amount: final_amount.to_string(),
            coupon_code: order.coupon_code,
            cash_collected: order.cash_collected,
            created_at: order.created_at.to_rfc3339(),
            items: items
                .into_iter()
                .map(|i| OrderItemResponse {
                    id: i.id,
                    listing_id: i.listing_id,
                    farmer_id: i.farmer_id,
                    quantity: i.quantity,
                    unit_price: i.unit_price.to_string(),
                })
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignAgentResponse {
    pub job_id: Uuid,
    pub agent_id: Uuid,
    pub order: OrderResponse,
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Places an order: price snapshots, stock reservation, reservation log
/// entries and an optional coupon, all in one database transaction.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Empty order, bad quantity or bad coupon"),
        (status = 409, description = "Insufficient stock"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::PlaceOrder) {
        return Err(AppError::Forbidden("only customers place orders".into()));
    }
    let body = body.into_inner();

    let (order, items) = web::block(move || {
        let mut conn = pool.get()?;
        let items: Vec<OrderItemRequest> = body
            .items
            .iter()
            .map(|i| OrderItemRequest {
                listing_id: i.listing_id,
                quantity: i.quantity,
            })
            .collect();
        orders::create_order(&mut conn, auth.id, &items, body.coupon_code.as_deref())
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(OrderResponse::from_rows(order, items)?))
}

/// GET /orders/{id}
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 403, description = "Not yours"),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let (order, items) = web::block(move || {
        let mut conn = pool.get()?;
        orders::get_order_for(&mut conn, auth.id, auth.role, order_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from_rows(order, items)?))
}

/// GET /orders
///
/// Paginated list, scoped to the caller: customers see their own orders,
/// farmers the orders containing their produce, agents their deliveries,
/// admins and CRs everything.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses((status = 200, description = "Orders visible to the caller", body = ListOrdersResponse)),
    tag = "orders"
)]
pub async fn list_orders(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);

    let result = web::block(move || {
        let mut conn = pool.get()?;
        orders::list_orders_for(&mut conn, auth.id, auth.role, page, limit)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    let items: Result<Vec<OrderResponse>, AppError> = result
        .items
        .into_iter()
        .map(|o| OrderResponse::from_rows(o, vec![]))
        .collect();
    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: items?,
        total: result.total,
        page,
        limit,
    }))
}

/// PATCH /orders/{id}/status
///
/// Applies one state-machine transition. Side effects (stock release,
/// earnings cancellation) ride the same transaction.
#[utoipa::path(
    patch,
    path = "/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Transition applied", body = OrderResponse),
        (status = 403, description = "Caller may not move this order"),
        (status = 404, description = "Order not found"),
        (status = 422, description = "Transition not allowed"),
    ),
    tag = "orders"
)]
pub async fn update_status(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::UpdateOrderStatus) {
        return Err(AppError::Forbidden(
            "this role cannot move orders".into(),
        ));
    }
    let order_id = path.into_inner();
    let requested = body.into_inner().status;

    let order = web::block(move || {
        let mut conn = pool.get()?;
        orders::apply_transition(&mut conn, auth.id, auth.role, order_id, requested)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from_rows(order, vec![])?))
}

/// POST /orders/{id}/assign-agent
///
/// Picks the nearest free pickup agent within the delivery radius of the
/// customer and opens the pickup job.
#[utoipa::path(
    post,
    path = "/orders/{id}/assign-agent",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Agent assigned", body = AssignAgentResponse),
        (status = 400, description = "No agent in range"),
        (status = 422, description = "Order is not ready for pickup"),
    ),
    tag = "orders"
)]
pub async fn assign_agent(
    pool: web::Data<DbPool>,
    geocoder: web::Data<GeocodingClient>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::AssignAgent) {
        return Err(AppError::Forbidden(
            "only admins and CRs assign agents".into(),
        ));
    }
    let order_id = path.into_inner();

    let (job, order): (PickupJob, Order) = web::block(move || {
        let mut conn = pool.get()?;
        assignment::assign_pickup_agent(&mut conn, &geocoder, order_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(AssignAgentResponse {
        job_id: job.id,
        agent_id: job.agent_id,
        order: OrderResponse::from_rows(order, vec![])?,
    }))
}
