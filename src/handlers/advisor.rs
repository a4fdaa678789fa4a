use actix_web::{web, HttpResponse};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::services::advisor::AdvisorClient;

/// POST /advisor/chat — authenticated passthrough to the ML service.
#[utoipa::path(
    post,
    path = "/advisor/chat",
    responses(
        (status = 200, description = "Chatbot reply"),
        (status = 502, description = "ML service unavailable"),
    ),
    tag = "advisor"
)]
pub async fn chat(
    advisor: web::Data<AdvisorClient>,
    _auth: AuthUser,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let payload = body.into_inner();
    let reply = web::block(move || advisor.chat(&payload))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(HttpResponse::Ok().json(reply))
}

/// POST /advisor/price-suggestion — dynamic-pricing prediction proxy.
#[utoipa::path(
    post,
    path = "/advisor/price-suggestion",
    responses(
        (status = 200, description = "Suggested pricing"),
        (status = 502, description = "ML service unavailable"),
    ),
    tag = "advisor"
)]
pub async fn price_suggestion(
    advisor: web::Data<AdvisorClient>,
    _auth: AuthUser,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let payload = body.into_inner();
    let suggestion = web::block(move || advisor.price_suggestion(&payload))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(HttpResponse::Ok().json(suggestion))
}
