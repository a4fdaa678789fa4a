use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::application::orders;
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::errors::AppError;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateCouponRequest {
    pub code: String,
    /// Decimal order total as a string, e.g. "1000.00"
    pub order_total: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateCouponResponse {
    pub code: String,
    pub discount: String,
    pub final_amount: String,
}

/// POST /coupons/validate
///
/// Quotes the discount a code would give on a total, without touching
/// any order.
#[utoipa::path(
    post,
    path = "/coupons/validate",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Coupon quote", body = ValidateCouponResponse),
        (status = 400, description = "Unknown, inactive or expired code"),
    ),
    tag = "coupons"
)]
pub async fn validate_coupon(
    pool: web::Data<DbPool>,
    _auth: AuthUser,
    body: web::Json<ValidateCouponRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let order_total = BigDecimal::from_str(&body.order_total)
        .map_err(|e| AppError::BadRequest(format!("invalid order_total: {e}")))?;

    let code = body.code.clone();
    let (discount, total) = web::block(move || {
        let mut conn = pool.get()?;
        let discount = orders::coupon_discount_for(&mut conn, &body.code, &order_total)?;
        Ok::<_, crate::domain::errors::DomainError>((discount, order_total))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    let final_amount = &total - &discount;
    Ok(HttpResponse::Ok().json(ValidateCouponResponse {
        code,
        discount: discount.to_string(),
        final_amount: final_amount.to_string(),
    }))
}
