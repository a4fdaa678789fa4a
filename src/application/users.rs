use chrono::Utc;
use diesel::dsl::{exists, select};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::roles::Role;
use crate::models::address::{Address, NewAddress};
use crate::models::user::{NewUser, User};
use crate::schema::{addresses, users};
use crate::services::geocoding::{GeocodingClient, ResolvedLocation};

use super::assignment::{assign_nearest_cr, ensure_cr_territory_is_free, resolve_user_point};

#[derive(Debug)]
pub struct RegistrationInput {
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub postal_code: String,
    pub city: Option<String>,
    pub state: Option<String>,
}

/// Public signup. CR registrations must pass the territory exclusion
/// check, so their postal code has to geocode; for everyone else a
/// geocoding failure only delays the cache fill.
pub fn register_user(
    conn: &mut PgConnection,
    geocoder: &GeocodingClient,
    input: RegistrationInput,
) -> Result<(User, Address), DomainError> {
    if input.full_name.trim().is_empty() {
        return Err(DomainError::Validation("a name is required".to_string()));
    }
    if !input.email.contains('@') {
        return Err(DomainError::Validation(format!(
            "{} is not an email address",
            input.email
        )));
    }
    if input.postal_code.trim().is_empty() {
        return Err(DomainError::Validation(
            "a postal code is required".to_string(),
        ));
    }
    if input.role == Role::Admin {
        return Err(DomainError::Forbidden(
            "administrator accounts cannot self-register".to_string(),
        ));
    }

    let location: Option<ResolvedLocation> = match geocoder.resolve(&input.postal_code) {
        Ok(location) => Some(location),
        Err(e) if input.role == Role::Cr => return Err(e),
        Err(e) => {
            log::warn!(
                "could not geocode {} at signup, caching later: {e}",
                input.postal_code
            );
            None
        }
    };

    conn.transaction::<_, DomainError, _>(|conn| {
        let taken = select(exists(
            users::table.filter(users::email.eq(&input.email)),
        ))
        .get_result(conn)?;
        if taken {
            return Err(DomainError::Conflict(format!(
                "{} is already registered",
                input.email
            )));
        }

        if input.role == Role::Cr {
            // Always Some here: a CR signup bails out above on geocoding
            // failure.
            if let Some(location) = &location {
                ensure_cr_territory_is_free(conn, location.point)?;
            }
        }

        let user: User = diesel::insert_into(users::table)
            .values(&NewUser {
                id: Uuid::new_v4(),
                full_name: input.full_name.trim().to_string(),
                email: input.email.clone(),
                role: input.role.as_str().to_string(),
                approved: false,
            })
            .get_result(conn)?;

        let address: Address = diesel::insert_into(addresses::table)
            .values(&NewAddress {
                id: Uuid::new_v4(),
                user_id: user.id,
                postal_code: input.postal_code.clone(),
                city: input
                    .city
                    .clone()
                    .or_else(|| location.as_ref().and_then(|l| l.city.clone())),
                state: input
                    .state
                    .clone()
                    .or_else(|| location.as_ref().and_then(|l| l.state.clone())),
                latitude: location.as_ref().map(|l| l.point.latitude),
                longitude: location.as_ref().map(|l| l.point.longitude),
            })
            .get_result(conn)?;

        log::info!("{} registered as {}", user.email, user.role);
        Ok((user, address))
    })
}

/// Admin approval. Approving a farmer also attaches them to the nearest
/// CR; without one in range the approval fails and the account stays
/// pending.
pub fn approve_user(
    conn: &mut PgConnection,
    geocoder: &GeocodingClient,
    user_id: Uuid,
) -> Result<User, DomainError> {
    conn.transaction::<_, DomainError, _>(|conn| {
        let user: User = users::table
            .find(user_id)
            .select(User::as_select())
            .first(conn)
            .optional()?
            .ok_or(DomainError::NotFound)?;
        if user.approved {
            return Ok(user);
        }

        if user.role == Role::Farmer.as_str() {
            let point = resolve_user_point(conn, geocoder, user.id)?;
            assign_nearest_cr(conn, user.id, point)?;
        }

        let approved: User = diesel::update(users::table.find(user.id))
            .set((users::approved.eq(true), users::updated_at.eq(Utc::now())))
            .get_result(conn)?;
        Ok(approved)
    })
}
