use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use diesel::dsl::{exists, select, sum};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::roles::Role;
use crate::models::earning::{EARNING_PAID, EARNING_PENDING};
use crate::models::payout::{
    NewPayout, Payout, BENEFICIARY_FARMER, PAYOUT_PAID, PAYOUT_PENDING, PAYOUT_REJECTED,
    PAYOUT_SCHEDULED, REQUEST_ON_DEMAND, REQUEST_WEEKLY,
};
use crate::schema::{earnings, payouts};

/// On-demand payout request by a farmer over their current PENDING
/// earnings.
pub fn request_payout(conn: &mut PgConnection, farmer_id: Uuid) -> Result<Payout, DomainError> {
    conn.transaction::<_, DomainError, _>(|conn| {
        create_payout(conn, farmer_id, PAYOUT_PENDING, REQUEST_ON_DEMAND)
    })
}

fn open_payout_exists(
    conn: &mut PgConnection,
    beneficiary_id: Uuid,
) -> Result<bool, DomainError> {
    let open = select(exists(
        payouts::table
            .filter(payouts::beneficiary_id.eq(beneficiary_id))
            .filter(payouts::status.eq_any([PAYOUT_PENDING, PAYOUT_SCHEDULED])),
    ))
    .get_result(conn)?;
    Ok(open)
}

/// Aggregate the beneficiary's PENDING earnings into one payout row.
/// At most one PENDING/SCHEDULED payout may exist per beneficiary.
pub(crate) fn create_payout(
    conn: &mut PgConnection,
    farmer_id: Uuid,
    status: &str,
    request_type: &str,
) -> Result<Payout, DomainError> {
    if open_payout_exists(conn, farmer_id)? {
        return Err(DomainError::Conflict(
            "a payout is already awaiting settlement".to_string(),
        ));
    }

    let total: Option<BigDecimal> = earnings::table
        .filter(earnings::farmer_id.eq(farmer_id))
        .filter(earnings::status.eq(EARNING_PENDING))
        .select(sum(earnings::amount))
        .first(conn)?;
    let total = total.unwrap_or_else(BigDecimal::zero);
    if total <= BigDecimal::zero() {
        return Err(DomainError::Validation(
            "no pending earnings to pay out".to_string(),
        ));
    }

    let payout: Payout = diesel::insert_into(payouts::table)
        .values(&NewPayout {
            id: Uuid::new_v4(),
            beneficiary_type: BENEFICIARY_FARMER.to_string(),
            beneficiary_id: farmer_id,
            amount: total,
            status: status.to_string(),
            request_type: request_type.to_string(),
        })
        .get_result(conn)?;

    log::info!(
        "payout {} ({}) of {} opened for farmer {}",
        payout.id,
        payout.request_type,
        payout.amount,
        farmer_id
    );
    Ok(payout)
}

/// Admin approval: the payout is PAID and every PENDING earning of the
/// beneficiary is marked PAID along with it.
pub fn approve_payout(conn: &mut PgConnection, payout_id: Uuid) -> Result<Payout, DomainError> {
    conn.transaction::<_, DomainError, _>(|conn| {
        let payout = load_open_payout(conn, payout_id)?;

        let updated: Payout = diesel::update(payouts::table.find(payout.id))
            .set((
                payouts::status.eq(PAYOUT_PAID),
                payouts::updated_at.eq(Utc::now()),
            ))
            .get_result(conn)?;

        let settled = diesel::update(
            earnings::table
                .filter(earnings::farmer_id.eq(payout.beneficiary_id))
                .filter(earnings::status.eq(EARNING_PENDING)),
        )
        .set((
            earnings::status.eq(EARNING_PAID),
            earnings::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;

        log::info!(
            "payout {} approved, {settled} earnings settled for beneficiary {}",
            payout.id,
            payout.beneficiary_id
        );
        Ok(updated)
    })
}

/// Admin rejection: the payout closes, the earnings stay PENDING and can
/// be re-requested.
pub fn reject_payout(conn: &mut PgConnection, payout_id: Uuid) -> Result<Payout, DomainError> {
    conn.transaction::<_, DomainError, _>(|conn| {
        let payout = load_open_payout(conn, payout_id)?;
        let updated = diesel::update(payouts::table.find(payout.id))
            .set((
                payouts::status.eq(PAYOUT_REJECTED),
                payouts::updated_at.eq(Utc::now()),
            ))
            .get_result(conn)?;
        Ok(updated)
    })
}

fn load_open_payout(conn: &mut PgConnection, payout_id: Uuid) -> Result<Payout, DomainError> {
    let payout: Payout = payouts::table
        .find(payout_id)
        .select(Payout::as_select())
        .first(conn)
        .optional()?
        .ok_or(DomainError::NotFound)?;
    if payout.status != PAYOUT_PENDING && payout.status != PAYOUT_SCHEDULED {
        return Err(DomainError::Conflict(format!(
            "payout is already {}",
            payout.status
        )));
    }
    Ok(payout)
}

/// The weekly batch: one SCHEDULED payout per farmer holding PENDING
/// earnings, skipping anyone with an open payout.
pub fn run_weekly_batch(conn: &mut PgConnection) -> Result<Vec<Payout>, DomainError> {
    let farmer_ids: Vec<Uuid> = earnings::table
        .filter(earnings::status.eq(EARNING_PENDING))
        .select(earnings::farmer_id)
        .distinct()
        .load(conn)?;

    let mut created = Vec::new();
    for farmer_id in farmer_ids {
        let result = conn.transaction::<_, DomainError, _>(|conn| {
            create_payout(conn, farmer_id, PAYOUT_SCHEDULED, REQUEST_WEEKLY)
        });
        match result {
            Ok(payout) => created.push(payout),
            Err(DomainError::Conflict(_)) => {
                log::info!("farmer {farmer_id} already has an open payout, skipping");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}

#[derive(Debug)]
pub struct PayoutPage {
    pub items: Vec<Payout>,
    pub total: i64,
}

pub fn list_payouts_for(
    conn: &mut PgConnection,
    actor_id: Uuid,
    actor_role: Role,
    page: i64,
    limit: i64,
) -> Result<PayoutPage, DomainError> {
    let offset = (page - 1) * limit;
    let (total, items) = match actor_role {
        Role::Admin => {
            let total: i64 = payouts::table.count().get_result(conn)?;
            let items = payouts::table
                .select(Payout::as_select())
                .order(payouts::created_at.desc())
                .limit(limit)
                .offset(offset)
                .load(conn)?;
            (total, items)
        }
        _ => {
            let total: i64 = payouts::table
                .filter(payouts::beneficiary_id.eq(actor_id))
                .count()
                .get_result(conn)?;
            let items = payouts::table
                .filter(payouts::beneficiary_id.eq(actor_id))
                .select(Payout::as_select())
                .order(payouts::created_at.desc())
                .limit(limit)
                .offset(offset)
                .load(conn)?;
            (total, items)
        }
    };
    Ok(PayoutPage { items, total })
}
