//! Transactional orchestration over `&mut PgConnection`. Handlers call
//! these from inside `web::block`; the cron binaries call them directly.

pub mod assignment;
pub mod listings;
pub mod orders;
pub mod payments;
pub mod payouts;
pub mod refunds;
pub mod users;

use crate::domain::errors::DomainError;
use crate::domain::status::UnknownStatus;

// ── Error conversions (persistence concern only) ─────────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => DomainError::NotFound,
            other => DomainError::Internal(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

// A status column holding an unknown token means the row predates this
// build or was written by hand; surface it as a server fault.
impl From<UnknownStatus> for DomainError {
    fn from(e: UnknownStatus) -> Self {
        DomainError::Internal(e.to_string())
    }
}
