use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::refunds::{self, RefundScope};
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::domain::roles::Action;
use crate::errors::AppError;
use crate::models::refund::Refund;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestRefundBody {
    /// Omit to refund the whole order.
    pub order_item_id: Option<Uuid>,
    /// Partial quantity for an item refund; defaults to the full line.
    pub quantity: Option<i32>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefundResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_item_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub amount: String,
    pub status: String,
    pub reason: Option<String>,
    pub created_at: String,
}

impl From<Refund> for RefundResponse {
    fn from(r: Refund) -> Self {
        Self {
            id: r.id,
            order_id: r.order_id,
            order_item_id: r.order_item_id,
            quantity: r.quantity,
            amount: r.amount.to_string(),
            status: r.status,
            reason: r.reason,
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

/// POST /orders/{id}/refunds
#[utoipa::path(
    post,
    path = "/orders/{id}/refunds",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = RequestRefundBody,
    responses(
        (status = 201, description = "Refund requested", body = RefundResponse),
        (status = 400, description = "Order not refundable or bad quantity"),
        (status = 409, description = "A refund for this scope is already open"),
    ),
    tag = "refunds"
)]
pub async fn request_refund(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<RequestRefundBody>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::RequestRefund) {
        return Err(AppError::Forbidden(
            "only customers request refunds".into(),
        ));
    }
    let order_id = path.into_inner();
    let body = body.into_inner();

    let refund = web::block(move || {
        let mut conn = pool.get()?;
        refunds::request_refund(
            &mut conn,
            auth.id,
            order_id,
            RefundScope {
                order_item_id: body.order_item_id,
                quantity: body.quantity,
            },
            body.reason,
        )
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(RefundResponse::from(refund)))
}

/// POST /refunds/{id}/approve
///
/// Applies the refund: earnings cancellation, stock restoration and the
/// payment-status flip happen in one transaction.
#[utoipa::path(
    post,
    path = "/refunds/{id}/approve",
    params(("id" = Uuid, Path, description = "Refund id")),
    responses(
        (status = 200, description = "Refund applied", body = RefundResponse),
        (status = 409, description = "Refund already reviewed"),
    ),
    tag = "refunds"
)]
pub async fn approve_refund(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::ReviewRefund) {
        return Err(AppError::Forbidden("only admins review refunds".into()));
    }
    let refund_id = path.into_inner();

    let refund = web::block(move || {
        let mut conn = pool.get()?;
        refunds::approve_refund(&mut conn, refund_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(RefundResponse::from(refund)))
}

/// POST /refunds/{id}/reject
#[utoipa::path(
    post,
    path = "/refunds/{id}/reject",
    params(("id" = Uuid, Path, description = "Refund id")),
    responses(
        (status = 200, description = "Refund rejected", body = RefundResponse),
        (status = 409, description = "Refund already reviewed"),
    ),
    tag = "refunds"
)]
pub async fn reject_refund(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::ReviewRefund) {
        return Err(AppError::Forbidden("only admins review refunds".into()));
    }
    let refund_id = path.into_inner();

    let refund = web::block(move || {
        let mut conn = pool.get()?;
        refunds::reject_refund(&mut conn, refund_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(RefundResponse::from(refund)))
}
