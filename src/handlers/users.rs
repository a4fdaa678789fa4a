use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::users::{self, RegistrationInput};
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::domain::roles::{Action, Role};
use crate::errors::AppError;
use crate::models::user::User;
use crate::services::geocoding::GeocodingClient;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub postal_code: String,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub approved: bool,
    pub assigned_cr_id: Option<Uuid>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name,
            email: u.email,
            role: u.role,
            approved: u.approved,
            assigned_cr_id: u.assigned_cr_id,
        }
    }
}

/// POST /users
///
/// Public signup. CR registrations are rejected when another approved CR
/// already operates within the exclusion radius.
#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, pending approval", body = UserResponse),
        (status = 409, description = "Email taken, or CR territory occupied"),
    ),
    tag = "users"
)]
pub async fn register(
    pool: web::Data<DbPool>,
    geocoder: web::Data<GeocodingClient>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    let (user, _address) = web::block(move || {
        let mut conn = pool.get()?;
        users::register_user(
            &mut conn,
            &geocoder,
            RegistrationInput {
                full_name: body.full_name,
                email: body.email,
                role: body.role,
                postal_code: body.postal_code,
                city: body.city,
                state: body.state,
            },
        )
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// POST /users/{id}/approve
///
/// ADMIN. Approving a farmer also attaches them to the nearest CR; the
/// approval fails when no CR covers their area.
#[utoipa::path(
    post,
    path = "/users/{id}/approve",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Account approved", body = UserResponse),
        (status = 400, description = "No CR covers the farmer's area"),
        (status = 404, description = "User not found"),
    ),
    tag = "users"
)]
pub async fn approve_user(
    pool: web::Data<DbPool>,
    geocoder: web::Data<GeocodingClient>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.permits(Action::ApproveUser) {
        return Err(AppError::Forbidden("only admins approve accounts".into()));
    }
    let user_id = path.into_inner();

    let user = web::block(move || {
        let mut conn = pool.get()?;
        users::approve_user(&mut conn, &geocoder, user_id)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}
