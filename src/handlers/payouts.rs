use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::payouts;
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::domain::roles::Action;
use crate::errors::AppError;
use crate::models::payout::Payout;

#[derive(Debug, Serialize, ToSchema)]
pub struct PayoutResponse {
    pub id: Uuid,
    pub beneficiary_type: String,
    pub beneficiary_id: Uuid,
    pub amount: String,
    pub status: String,
    pub request_type: String,
    pub created_at: String,
}

impl From<Payout> for PayoutResponse {
    fn from(p: Payout) -> Self {
        Self {
            id: p.id,
            beneficiary_type: p.beneficiary_type,
            beneficiary_id: p.beneficiary_id,
            amount: p.amount.to_string(),
            status: p.status,
            request_type: p.request_type,
            created_at: p.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListPayoutsParams {
    #[serde(default = "default_page")]
    pub page: i64,
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
pub struct ListPayoutsResponse {
    pub items: Vec<PayoutResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// POST /payouts
///
/// Farmer-initiated payout over all current PENDING earnings. Rejected
/// while another payout is awaiting settlement.
#[utoipa::path(
    post,
    path = "/payouts",
    responses(
        (status = 201, description = "Payout requested", body = PayoutResponse),
        (status = 400, description = "Nothing to pay out"),
        (status = 409, description = "A payout is already open"),
    ),
    tag = "payouts"
)]
pub async fn request_payout(
    pool: web::Data<DbPool>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::RequestPayout) {
        return Err(AppError::Forbidden("only farmers request payouts".into()));
    }

    let payout = web::block(move || {
        let mut conn = pool.get()?;
        payouts::request_payout(&mut conn, auth.id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(PayoutResponse::from(payout)))
}

/// GET /payouts — admins see everything, beneficiaries their own.
#[utoipa::path(
    get,
    path = "/payouts",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses((status = 200, description = "Payouts visible to the caller", body = ListPayoutsResponse)),
    tag = "payouts"
)]
pub async fn list_payouts(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    query: web::Query<ListPayoutsParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);

    let result = web::block(move || {
        let mut conn = pool.get()?;
        payouts::list_payouts_for(&mut conn, auth.id, auth.role, page, limit)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(ListPayoutsResponse {
        items: result.items.into_iter().map(PayoutResponse::from).collect(),
        total: result.total,
        page,
        limit,
    }))
}

/// POST /payouts/{id}/approve
#[utoipa::path(
    post,
    path = "/payouts/{id}/approve",
    params(("id" = Uuid, Path, description = "Payout id")),
    responses(
        (status = 200, description = "Payout settled", body = PayoutResponse),
        (status = 409, description = "Payout already closed"),
    ),
    tag = "payouts"
)]
pub async fn approve_payout(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::ReviewPayout) {
        return Err(AppError::Forbidden("only admins settle payouts".into()));
    }
    let payout_id = path.into_inner();

    let payout = web::block(move || {
        let mut conn = pool.get()?;
        payouts::approve_payout(&mut conn, payout_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(PayoutResponse::from(payout)))
}

/// POST /payouts/{id}/reject
#[utoipa::path(
    post,
    path = "/payouts/{id}/reject",
    params(("id" = Uuid, Path, description = "Payout id")),
    responses(
        (status = 200, description = "Payout rejected", body = PayoutResponse),
        (status = 409, description = "Payout already closed"),
    ),
    tag = "payouts"
)]
pub async fn reject_payout(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::ReviewPayout) {
        return Err(AppError::Forbidden("only admins settle payouts".into()));
    }
    let payout_id = path.into_inner();

    let payout = web::block(move || {
        let mut conn = pool.get()?;
        payouts::reject_payout(&mut conn, payout_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(PayoutResponse::from(payout)))
}
