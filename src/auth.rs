//! Session-token authentication. Every protected handler takes an
//! `AuthUser` extractor; issuing sessions is out of band (seeded or done
//! by an upstream identity service).

use std::future::Future;
use std::pin::Pin;

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::roles::Role;
use crate::errors::AppError;
use crate::schema::{sessions, users};

pub const SESSION_HEADER: &str = "X-Session-Token";

#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<AuthUser, AppError>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = req
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let pool = req.app_data::<web::Data<DbPool>>().cloned();

        Box::pin(async move {
            let token = token.ok_or(AppError::Unauthorized)?;
            let pool =
                pool.ok_or_else(|| AppError::Internal("database pool not configured".into()))?;

            let user = web::block(move || {
                let mut conn = pool
                    .get()
                    .map_err(|e| AppError::Internal(e.to_string()))?;

                let row: Option<(Uuid, String)> = sessions::table
                    .inner_join(users::table)
                    .filter(sessions::token.eq(&token))
                    .filter(sessions::expires_at.gt(Utc::now()))
                    .select((users::id, users::role))
                    .first(&mut conn)
                    .optional()
                    .map_err(|e| AppError::Internal(e.to_string()))?;

                let (id, role) = row.ok_or(AppError::Unauthorized)?;
                let role: Role = role
                    .parse()
                    .map_err(|_| AppError::Internal(format!("user {id} has an unknown role")))?;
                Ok::<AuthUser, AppError>(AuthUser { id, role })
            })
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

            Ok(user)
        })
    }
}
