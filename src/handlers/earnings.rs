use actix_web::{web, HttpResponse};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::roles::Action;
use crate::errors::AppError;
use crate::models::earning::Earning;
use crate::schema::earnings;

#[derive(Debug, Serialize, ToSchema)]
pub struct EarningResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_item_id: Uuid,
    pub amount: String,
    pub status: String,
    pub created_at: String,
}

/// GET /earnings — the calling farmer's ledger, newest first.
#[utoipa::path(
    get,
    path = "/earnings",
    responses((status = 200, description = "The caller's earnings", body = [EarningResponse])),
    tag = "earnings"
)]
pub async fn list_earnings(
    pool: web::Data<DbPool>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::ViewEarnings) {
        return Err(AppError::Forbidden("earnings belong to farmers".into()));
    }

    let rows: Vec<Earning> = web::block(move || {
        let mut conn = pool.get()?;
        let rows = earnings::table
            .filter(earnings::farmer_id.eq(auth.id))
            .select(Earning::as_select())
            .order(earnings::created_at.desc())
            .load(&mut conn)?;
        Ok::<_, DomainError>(rows)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    let items: Vec<EarningResponse> = rows
        .into_iter()
        .map(|e| EarningResponse {
            id: e.id,
            order_id: e.order_id,
            order_item_id: e.order_item_id,
            amount: e.amount.to_string(),
            status: e.status,
            created_at: e.created_at.to_rfc3339(),
        })
        .collect();
    Ok(HttpResponse::Ok().json(items))
}
