use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::pricing;
use crate::domain::status::{OrderStatus, PaymentStatus};
use crate::models::earning::{NewEarning, EARNING_PENDING};
use crate::models::order::Order;
use crate::models::order_item::OrderItem;
use crate::models::pickup_job::PickupJob;
use crate::schema::{earnings, order_items, orders, pickup_jobs};
use crate::services::gateway::PaymentEntity;

#[derive(Debug, PartialEq, Eq)]
pub enum PaymentRecordOutcome {
    /// Payment booked and earnings created.
    Recorded { earnings_created: usize },
    /// The order was already marked paid; gateways retry webhooks, so
    /// this is acknowledged without booking anything twice.
    AlreadyRecorded,
}

/// Book a successful payment: payment status SUCCESS, CREATED orders
/// advance to PAID, and one PENDING earning per order item is written —
/// all in one transaction.
pub fn record_payment_success(
    conn: &mut PgConnection,
    order_id: Uuid,
    gateway_order_id: Option<&str>,
) -> Result<PaymentRecordOutcome, DomainError> {
    conn.transaction::<_, DomainError, _>(|conn| {
        mark_payment_success(conn, order_id, gateway_order_id)
    })
}

pub(crate) fn mark_payment_success(
    conn: &mut PgConnection,
    order_id: Uuid,
    gateway_order_id: Option<&str>,
) -> Result<PaymentRecordOutcome, DomainError> {
    let order: Order = orders::table
        .find(order_id)
        .select(Order::as_select())
        .first(conn)
        .optional()?
        .ok_or(DomainError::NotFound)?;

    let payment: PaymentStatus = order.payment_status.parse()?;
    match payment {
        PaymentStatus::Success => return Ok(PaymentRecordOutcome::AlreadyRecorded),
        PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded => {
            return Err(DomainError::Conflict(format!(
                "order {order_id} has already been refunded"
            )))
        }
        PaymentStatus::Pending | PaymentStatus::Failed => {}
    }

    let current: OrderStatus = order.status.parse()?;
    if current == OrderStatus::Cancelled {
        return Err(DomainError::Conflict(format!(
            "order {order_id} is cancelled"
        )));
    }
    let new_status = if current == OrderStatus::Created {
        OrderStatus::Paid
    } else {
        current
    };

    diesel::update(orders::table.find(order.id))
        .set((
            orders::payment_status.eq(PaymentStatus::Success.as_str()),
            orders::status.eq(new_status.as_str()),
            orders::gateway_order_id.eq(gateway_order_id
                .map(String::from)
                .or(order.gateway_order_id.clone())),
            orders::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;

    let items: Vec<OrderItem> = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .select(OrderItem::as_select())
        .load(conn)?;

    let new_earnings: Vec<NewEarning> = items
        .iter()
        .map(|item| NewEarning {
            id: Uuid::new_v4(),
            farmer_id: item.farmer_id,
            order_id: order.id,
            order_item_id: item.id,
            amount: pricing::earning_amount(&item.farmer_price, item.quantity),
            status: EARNING_PENDING.to_string(),
        })
        .collect();
    diesel::insert_into(earnings::table)
        .values(&new_earnings)
        .execute(conn)?;

    log::info!(
        "payment recorded for order {}: {} earnings created",
        order.id,
        new_earnings.len()
    );
    Ok(PaymentRecordOutcome::Recorded {
        earnings_created: new_earnings.len(),
    })
}

/// Book a failed payment attempt. Only a PENDING payment moves to
/// FAILED; anything later is left alone (gateways may deliver events
/// out of order).
pub fn record_payment_failure(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<PaymentStatus, DomainError> {
    conn.transaction::<_, DomainError, _>(|conn| {
        let order: Order = orders::table
            .find(order_id)
            .select(Order::as_select())
            .first(conn)
            .optional()?
            .ok_or(DomainError::NotFound)?;

        let payment: PaymentStatus = order.payment_status.parse()?;
        if payment != PaymentStatus::Pending {
            log::warn!("ignoring failure report for order {order_id} with payment {payment}");
            return Ok(payment);
        }

        diesel::update(orders::table.find(order.id))
            .set((
                orders::payment_status.eq(PaymentStatus::Failed.as_str()),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        Ok(PaymentStatus::Failed)
    })
}

/// COD confirmation by the assigned pickup agent: flag the cash as
/// collected and book the payment like a gateway success.
pub fn confirm_cash_collected(
    conn: &mut PgConnection,
    agent_id: Uuid,
    order_id: Uuid,
) -> Result<Order, DomainError> {
    conn.transaction::<_, DomainError, _>(|conn| {
        let job: PickupJob = pickup_jobs::table
            .filter(pickup_jobs::order_id.eq(order_id))
            .select(PickupJob::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| {
                DomainError::Validation(format!("order {order_id} has no pickup job"))
            })?;
        if job.agent_id != agent_id {
            return Err(DomainError::Forbidden(
                "order is assigned to a different agent".to_string(),
            ));
        }

        diesel::update(orders::table.find(order_id))
            .set((
                orders::cash_collected.eq(true),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        mark_payment_success(conn, order_id, None)?;

        let order = orders::table
            .find(order_id)
            .select(Order::as_select())
            .first(conn)?;
        Ok(order)
    })
}

/// Map a webhook payment entity back to a marketplace order: the order
/// id from the checkout notes when present, otherwise the stored
/// gateway order id.
pub fn find_order_for_webhook(
    conn: &mut PgConnection,
    entity: &PaymentEntity,
) -> Result<Uuid, DomainError> {
    if let Some(order_id) = entity.noted_order_id() {
        return Ok(order_id);
    }
    if let Some(gateway_order_id) = &entity.order_id {
        let id: Option<Uuid> = orders::table
            .filter(orders::gateway_order_id.eq(gateway_order_id))
            .select(orders::id)
            .first(conn)
            .optional()?;
        return id.ok_or(DomainError::NotFound);
    }
    Err(DomainError::Validation(
        "webhook payment carries no order reference".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    use crate::application::orders::{create_order, OrderItemRequest};
    use crate::domain::roles::Role;
    use crate::models::earning::Earning;
    use crate::models::pickup_job::{NewPickupJob, JOB_ASSIGNED};
    use crate::models::product_listing::LISTING_APPROVED;
    use crate::test_support::{dec, seed_listing, seed_user, setup_db};

    fn order_earnings(conn: &mut PgConnection, order_id: Uuid) -> Vec<Earning> {
        earnings::table
            .filter(earnings::order_id.eq(order_id))
            .select(Earning::as_select())
            .load(conn)
            .expect("earnings query failed")
    }

    #[tokio::test]
    async fn success_creates_one_pending_earning_per_item() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let farmer = seed_user(&mut conn, Role::Farmer, true, None);
        let customer = seed_user(&mut conn, Role::Customer, true, None);
        let tomatoes = seed_listing(&mut conn, farmer, "Tomatoes", "25.00", "18.00", 10, LISTING_APPROVED);
        let honey = seed_listing(&mut conn, farmer, "Honey", "60.00", "45.00", 5, LISTING_APPROVED);

        let (order, _) = create_order(
            &mut conn,
            customer,
            &[
                OrderItemRequest { listing_id: tomatoes, quantity: 2 },
                OrderItemRequest { listing_id: honey, quantity: 1 },
            ],
            None,
        )
        .unwrap();

        let outcome = record_payment_success(&mut conn, order.id, Some("order_G9")).unwrap();
        assert_eq!(outcome, PaymentRecordOutcome::Recorded { earnings_created: 2 });

        let rows = order_earnings(&mut conn, order.id);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|e| e.status == EARNING_PENDING));
        let total: BigDecimal = rows.iter().map(|e| e.amount.clone()).sum();
        // 2 x 18.00 + 1 x 45.00
        assert_eq!(total, dec("81.00"));

        let updated: crate::models::order::Order = orders::table
            .find(order.id)
            .select(crate::models::order::Order::as_select())
            .first(&mut conn)
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Paid.as_str());
        assert_eq!(updated.payment_status, PaymentStatus::Success.as_str());
        assert_eq!(updated.gateway_order_id.as_deref(), Some("order_G9"));
    }

    #[tokio::test]
    async fn duplicate_success_reports_are_acknowledged_without_new_earnings() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let farmer = seed_user(&mut conn, Role::Farmer, true, None);
        let customer = seed_user(&mut conn, Role::Customer, true, None);
        let listing = seed_listing(&mut conn, farmer, "Rice", "100.00", "80.00", 20, LISTING_APPROVED);

        let (order, _) = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 4 }],
            None,
        )
        .unwrap();

        record_payment_success(&mut conn, order.id, None).unwrap();
        let second = record_payment_success(&mut conn, order.id, None).unwrap();

        assert_eq!(second, PaymentRecordOutcome::AlreadyRecorded);
        assert_eq!(order_earnings(&mut conn, order.id).len(), 1);
    }

    #[tokio::test]
    async fn failure_only_moves_a_pending_payment() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let farmer = seed_user(&mut conn, Role::Farmer, true, None);
        let customer = seed_user(&mut conn, Role::Customer, true, None);
        let listing = seed_listing(&mut conn, farmer, "Eggs", "6.00", "5.00", 60, LISTING_APPROVED);

        let (order, _) = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 12 }],
            None,
        )
        .unwrap();

        assert_eq!(
            record_payment_failure(&mut conn, order.id).unwrap(),
            PaymentStatus::Failed
        );
        // A capture after a failed attempt is a retry and must win.
        record_payment_success(&mut conn, order.id, None).unwrap();
        // A late failure event for the same order changes nothing.
        assert_eq!(
            record_payment_failure(&mut conn, order.id).unwrap(),
            PaymentStatus::Success
        );
    }

    #[tokio::test]
    async fn cash_confirmation_requires_the_assigned_agent() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let farmer = seed_user(&mut conn, Role::Farmer, true, None);
        let customer = seed_user(&mut conn, Role::Customer, true, None);
        let agent = seed_user(&mut conn, Role::PickupAgent, true, None);
        let other_agent = seed_user(&mut conn, Role::PickupAgent, true, None);
        let listing = seed_listing(&mut conn, farmer, "Paneer", "120.00", "95.00", 6, LISTING_APPROVED);

        let (order, _) = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 1 }],
            None,
        )
        .unwrap();
        diesel::insert_into(pickup_jobs::table)
            .values(&NewPickupJob {
                id: Uuid::new_v4(),
                order_id: order.id,
                agent_id: agent,
                status: JOB_ASSIGNED.to_string(),
            })
            .execute(&mut conn)
            .unwrap();

        let wrong = confirm_cash_collected(&mut conn, other_agent, order.id);
        assert!(matches!(wrong, Err(DomainError::Forbidden(_))));

        let confirmed = confirm_cash_collected(&mut conn, agent, order.id).unwrap();
        assert!(confirmed.cash_collected);
        assert_eq!(confirmed.payment_status, PaymentStatus::Success.as_str());
        assert_eq!(order_earnings(&mut conn, order.id).len(), 1);
    }

    #[tokio::test]
    async fn webhook_resolution_prefers_notes_then_gateway_order_id() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let farmer = seed_user(&mut conn, Role::Farmer, true, None);
        let customer = seed_user(&mut conn, Role::Customer, true, None);
        let listing = seed_listing(&mut conn, farmer, "Jaggery", "50.00", "40.00", 10, LISTING_APPROVED);

        let (order, _) = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 1 }],
            None,
        )
        .unwrap();
        record_payment_success(&mut conn, order.id, Some("order_G9")).unwrap();

        let noted: PaymentEntity = serde_json::from_value(serde_json::json!({
            "id": "pay_1",
            "order_id": null,
            "amount": 5000,
            "status": "captured",
            "notes": { "order_id": order.id.to_string() }
        }))
        .unwrap();
        assert_eq!(find_order_for_webhook(&mut conn, &noted).unwrap(), order.id);

        let by_gateway: PaymentEntity = serde_json::from_value(serde_json::json!({
            "id": "pay_2",
            "order_id": "order_G9",
            "amount": 5000,
            "status": "captured"
        }))
        .unwrap();
        assert_eq!(
            find_order_for_webhook(&mut conn, &by_gateway).unwrap(),
            order.id
        );

        let unresolvable: PaymentEntity = serde_json::from_value(serde_json::json!({
            "id": "pay_3",
            "order_id": null,
            "amount": 5000,
            "status": "captured"
        }))
        .unwrap();
        assert!(find_order_for_webhook(&mut conn, &unresolvable).is_err());
    }
}
