use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::payments::{self, PaymentRecordOutcome};
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::domain::roles::Action;
use crate::errors::AppError;
use crate::services::gateway::PaymentGateway;

pub const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

// ── DTOs ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyCheckoutRequest {
    pub order_id: Uuid,
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentRecordedResponse {
    pub order_id: Uuid,
    pub earnings_created: usize,
    pub already_recorded: bool,
}

impl PaymentRecordedResponse {
    fn new(order_id: Uuid, outcome: PaymentRecordOutcome) -> Self {
        match outcome {
            PaymentRecordOutcome::Recorded { earnings_created } => Self {
                order_id,
                earnings_created,
                already_recorded: false,
            },
            PaymentRecordOutcome::AlreadyRecorded => Self {
                order_id,
                earnings_created: 0,
                already_recorded: true,
            },
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /payments/webhook
///
/// Gateway webhook. Authenticates by HMAC-SHA256 over the raw body; the
/// session header is neither present nor consulted. Unknown event types
/// are acknowledged so the gateway stops retrying them.
#[utoipa::path(
    post,
    path = "/payments/webhook",
    request_body = Vec<u8>,
    responses(
        (status = 200, description = "Event processed or acknowledged"),
        (status = 401, description = "Bad signature"),
    ),
    tag = "payments"
)]
pub async fn webhook(
    pool: web::Data<DbPool>,
    gateway: web::Data<PaymentGateway>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;
    if !gateway.verify_webhook_signature(&body, signature) {
        log::warn!("webhook rejected: signature mismatch");
        return Err(AppError::Unauthorized);
    }

    let event = gateway
        .parse_webhook_event(&body)
        .map_err(|e| AppError::BadRequest(format!("unparseable webhook body: {e}")))?;

    let Some(payment) = event.payload.payment else {
        log::info!("ignoring webhook event {} without payment", event.event);
        return Ok(HttpResponse::Ok().json(json!({ "status": "ignored" })));
    };
    let entity = payment.entity;

    match event.event.as_str() {
        "payment.captured" => {
            let response = web::block(move || {
                let mut conn = pool.get()?;
                let order_id = payments::find_order_for_webhook(&mut conn, &entity)?;
                let outcome = payments::record_payment_success(
                    &mut conn,
                    order_id,
                    entity.order_id.as_deref(),
                )?;
                Ok::<_, crate::domain::errors::DomainError>(PaymentRecordedResponse::new(
                    order_id, outcome,
                ))
            })
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;
            Ok(HttpResponse::Ok().json(response))
        }
        "payment.failed" => {
            let status = web::block(move || {
                let mut conn = pool.get()?;
                let order_id = payments::find_order_for_webhook(&mut conn, &entity)?;
                payments::record_payment_failure(&mut conn, order_id)
            })
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;
            Ok(HttpResponse::Ok().json(json!({ "payment_status": status })))
        }
        other => {
            log::info!("ignoring webhook event {other}");
            Ok(HttpResponse::Ok().json(json!({ "status": "ignored" })))
        }
    }
}

/// POST /payments/verify
///
/// Checkout callback: the customer's browser reports the gateway
/// payment; the signature over `gateway_order_id|payment_id` proves it.
#[utoipa::path(
    post,
    path = "/payments/verify",
    request_body = VerifyCheckoutRequest,
    responses(
        (status = 200, description = "Payment recorded", body = PaymentRecordedResponse),
        (status = 401, description = "Bad signature"),
        (status = 404, description = "Order not found"),
    ),
    tag = "payments"
)]
pub async fn verify_checkout(
    pool: web::Data<DbPool>,
    gateway: web::Data<PaymentGateway>,
    auth: AuthUser,
    body: web::Json<VerifyCheckoutRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    if !gateway.verify_checkout_signature(
        &body.gateway_order_id,
        &body.gateway_payment_id,
        &body.signature,
    ) {
        log::warn!(
            "checkout verification failed for order {} by user {}",
            body.order_id,
            auth.id
        );
        return Err(AppError::Unauthorized);
    }

    let order_id = body.order_id;
    let outcome = web::block(move || {
        let mut conn = pool.get()?;
        payments::record_payment_success(&mut conn, order_id, Some(&body.gateway_order_id))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(PaymentRecordedResponse::new(order_id, outcome)))
}

/// POST /orders/{id}/cash-collected
///
/// COD confirmation by the assigned pickup agent; books the payment the
/// same way a gateway capture would.
#[utoipa::path(
    post,
    path = "/orders/{id}/cash-collected",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Cash receipt recorded"),
        (status = 403, description = "Not the assigned agent"),
    ),
    tag = "payments"
)]
pub async fn cash_collected(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::ConfirmCashCollected) {
        return Err(AppError::Forbidden(
            "only pickup agents confirm cash".into(),
        ));
    }
    let order_id = path.into_inner();

    let order = web::block(move || {
        let mut conn = pool.get()?;
        payments::confirm_cash_collected(&mut conn, auth.id, order_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(json!({
        "order_id": order.id,
        "cash_collected": order.cash_collected,
        "payment_status": order.payment_status,
    })))
}
