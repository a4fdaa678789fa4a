use chrono::Utc;
use diesel::dsl::{exists, select};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::pricing;
use crate::domain::status::PaymentStatus;
use crate::models::earning::{EARNING_CANCELLED, EARNING_PENDING};
use crate::models::inventory_transaction::REASON_REFUND;
use crate::models::order::Order;
use crate::models::order_item::OrderItem;
use crate::models::refund::{
    NewRefund, Refund, REFUND_APPROVED, REFUND_REJECTED, REFUND_REQUESTED,
};
use crate::schema::{earnings, order_items, orders, refunds};

use super::orders::{cancel_pending_earnings, release_order_inventory, restore_item_stock};

/// Scope of a refund request: the whole order, or one item (optionally a
/// partial quantity of it).
#[derive(Debug, Clone, Copy, Default)]
pub struct RefundScope {
    pub order_item_id: Option<Uuid>,
    pub quantity: Option<i32>,
}

/// File a refund request against a paid order.
pub fn request_refund(
    conn: &mut PgConnection,
    customer_id: Uuid,
    order_id: Uuid,
    scope: RefundScope,
    reason: Option<String>,
) -> Result<Refund, DomainError> {
    conn.transaction::<_, DomainError, _>(|conn| {
        let order: Order = orders::table
            .find(order_id)
            .select(Order::as_select())
            .first(conn)
            .optional()?
            .ok_or(DomainError::NotFound)?;
        if order.customer_id != customer_id {
            return Err(DomainError::Forbidden(
                "order belongs to someone else".to_string(),
            ));
        }

        let payment: PaymentStatus = order.payment_status.parse()?;
        if !matches!(
            payment,
            PaymentStatus::Success | PaymentStatus::PartiallyRefunded
        ) {
            return Err(DomainError::Validation(format!(
                "orders with payment {payment} cannot be refunded"
            )));
        }

        let (amount, quantity) = match scope.order_item_id {
            None => (&order.total_amount - &order.discount_amount, None),
            Some(item_id) => {
                let item: OrderItem = order_items::table
                    .find(item_id)
                    .select(OrderItem::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or(DomainError::NotFound)?;
                if item.order_id != order.id {
                    return Err(DomainError::Validation(
                        "item does not belong to this order".to_string(),
                    ));
                }
                let quantity = scope.quantity.unwrap_or(item.quantity);
                if quantity <= 0 || quantity > item.quantity {
                    return Err(DomainError::Validation(format!(
                        "refund quantity must be between 1 and {}",
                        item.quantity
                    )));
                }
                (pricing::line_total(&item.unit_price, quantity), Some(quantity))
            }
        };

        let duplicate = select(exists(
            refunds::table
                .filter(refunds::order_id.eq(order.id))
                .filter(refunds::status.eq(REFUND_REQUESTED))
                .filter(refunds::order_item_id.is_not_distinct_from(scope.order_item_id)),
        ))
        .get_result(conn)?;
        if duplicate {
            return Err(DomainError::Conflict(
                "a refund for this scope is already under review".to_string(),
            ));
        }

        let refund: Refund = diesel::insert_into(refunds::table)
            .values(&NewRefund {
                id: Uuid::new_v4(),
                order_id: order.id,
                order_item_id: scope.order_item_id,
                quantity,
                amount,
                status: REFUND_REQUESTED.to_string(),
                reason,
            })
            .get_result(conn)?;
        Ok(refund)
    })
}

/// Admin approval: cancel the covered PENDING earnings, restore the
/// covered stock, and move the order's payment status. PAID earnings are
/// never touched.
pub fn approve_refund(conn: &mut PgConnection, refund_id: Uuid) -> Result<Refund, DomainError> {
    conn.transaction::<_, DomainError, _>(|conn| {
        let refund = load_requested_refund(conn, refund_id)?;
        let order: Order = orders::table
            .find(refund.order_id)
            .select(Order::as_select())
            .first(conn)?;

        let approved: Refund = diesel::update(refunds::table.find(refund.id))
            .set((
                refunds::status.eq(REFUND_APPROVED),
                refunds::updated_at.eq(Utc::now()),
            ))
            .get_result(conn)?;

        match refund.order_item_id {
            None => {
                // Items already refunded one-by-one keep their restored
                // stock; everything else comes back now.
                let already_refunded: Vec<Uuid> = refunds::table
                    .filter(refunds::order_id.eq(order.id))
                    .filter(refunds::status.eq(REFUND_APPROVED))
                    .filter(refunds::order_item_id.is_not_null())
                    .select(refunds::order_item_id.assume_not_null())
                    .load(conn)?;
                release_order_inventory(conn, order.id, REASON_REFUND, &already_refunded)?;
                cancel_pending_earnings(conn, order.id)?;
                set_payment_status(conn, order.id, PaymentStatus::Refunded)?;
            }
            Some(item_id) => {
                let item: OrderItem = order_items::table
                    .find(item_id)
                    .select(OrderItem::as_select())
                    .first(conn)?;
                let quantity = refund.quantity.unwrap_or(item.quantity);
                restore_item_stock(conn, &item, quantity, REASON_REFUND)?;

                diesel::update(
                    earnings::table
                        .filter(earnings::order_item_id.eq(item.id))
                        .filter(earnings::status.eq(EARNING_PENDING)),
                )
                .set((
                    earnings::status.eq(EARNING_CANCELLED),
                    earnings::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

                let item_ids: Vec<Uuid> = order_items::table
                    .filter(order_items::order_id.eq(order.id))
                    .select(order_items::id)
                    .load(conn)?;
                let refunded: Vec<Option<Uuid>> = refunds::table
                    .filter(refunds::order_id.eq(order.id))
                    .filter(refunds::status.eq(REFUND_APPROVED))
                    .select(refunds::order_item_id)
                    .load(conn)?;
                let fully_refunded = item_ids
                    .iter()
                    .all(|id| refunded.contains(&Some(*id)));
                let next = if fully_refunded {
                    PaymentStatus::Refunded
                } else {
                    PaymentStatus::PartiallyRefunded
                };
                set_payment_status(conn, order.id, next)?;
            }
        }

        log::info!("refund {} approved for order {}", refund.id, order.id);
        Ok(approved)
    })
}

pub fn reject_refund(conn: &mut PgConnection, refund_id: Uuid) -> Result<Refund, DomainError> {
    conn.transaction::<_, DomainError, _>(|conn| {
        let refund = load_requested_refund(conn, refund_id)?;
        let updated = diesel::update(refunds::table.find(refund.id))
            .set((
                refunds::status.eq(REFUND_REJECTED),
                refunds::updated_at.eq(Utc::now()),
            ))
            .get_result(conn)?;
        Ok(updated)
    })
}

fn load_requested_refund(
    conn: &mut PgConnection,
    refund_id: Uuid,
) -> Result<Refund, DomainError> {
    let refund: Refund = refunds::table
        .find(refund_id)
        .select(Refund::as_select())
        .first(conn)
        .optional()?
        .ok_or(DomainError::NotFound)?;
    if refund.status != REFUND_REQUESTED {
        return Err(DomainError::Conflict(format!(
            "refund is already {}",
            refund.status
        )));
    }
    Ok(refund)
}

fn set_payment_status(
    conn: &mut PgConnection,
    order_id: Uuid,
    status: PaymentStatus,
) -> Result<(), DomainError> {
    diesel::update(orders::table.find(order_id))
        .set((
            orders::payment_status.eq(status.as_str()),
            orders::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::orders::{create_order, OrderItemRequest};
    use crate::application::payments::record_payment_success;
    use crate::domain::roles::Role;
    use crate::models::earning::Earning;
    use crate::models::inventory_transaction::InventoryTransaction;
    use crate::models::product_listing::LISTING_APPROVED;
    use crate::schema::{inventory_transactions, product_listings};
    use crate::test_support::{dec, seed_listing, seed_user, setup_db};

    struct PaidOrder {
        order_id: Uuid,
        customer: Uuid,
        tomatoes: Uuid,
        honey: Uuid,
        items: Vec<OrderItem>,
    }

    /// Two listings, one paid order: 2 units at 12.50 and 1 unit at 60.00,
    /// total 85.00.
    fn paid_two_line_order(conn: &mut PgConnection) -> PaidOrder {
        let farmer = seed_user(conn, Role::Farmer, true, None);
        let customer = seed_user(conn, Role::Customer, true, None);
        let tomatoes = seed_listing(conn, farmer, "Tomatoes", "12.50", "9.00", 10, LISTING_APPROVED);
        let honey = seed_listing(conn, farmer, "Honey", "60.00", "45.00", 4, LISTING_APPROVED);

        let (order, items) = create_order(
            conn,
            customer,
            &[
                OrderItemRequest { listing_id: tomatoes, quantity: 2 },
                OrderItemRequest { listing_id: honey, quantity: 1 },
            ],
            None,
        )
        .unwrap();
        assert_eq!(order.total_amount, dec("85.00"));
        record_payment_success(conn, order.id, None).unwrap();
        PaidOrder {
            order_id: order.id,
            customer,
            tomatoes,
            honey,
            items,
        }
    }

    fn listing_qty(conn: &mut PgConnection, listing_id: Uuid) -> i32 {
        product_listings::table
            .find(listing_id)
            .select(product_listings::available_qty)
            .first(conn)
            .unwrap()
    }

    fn order_payment_status(conn: &mut PgConnection, order_id: Uuid) -> String {
        orders::table
            .find(order_id)
            .select(orders::payment_status)
            .first(conn)
            .unwrap()
    }

    #[tokio::test]
    async fn full_refund_restores_stock_and_cancels_every_pending_earning() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let paid = paid_two_line_order(&mut conn);

        let refund = request_refund(
            &mut conn,
            paid.customer,
            paid.order_id,
            RefundScope::default(),
            Some("wilted on arrival".to_string()),
        )
        .unwrap();
        assert_eq!(refund.amount, dec("85.00"));

        approve_refund(&mut conn, refund.id).unwrap();

        assert_eq!(
            order_payment_status(&mut conn, paid.order_id),
            PaymentStatus::Refunded.as_str()
        );
        assert_eq!(listing_qty(&mut conn, paid.tomatoes), 10);
        assert_eq!(listing_qty(&mut conn, paid.honey), 4);

        let refund_movements: Vec<InventoryTransaction> = inventory_transactions::table
            .filter(inventory_transactions::order_id.eq(paid.order_id))
            .filter(inventory_transactions::reason.eq(REASON_REFUND))
            .select(InventoryTransaction::as_select())
            .load(&mut conn)
            .unwrap();
        let mut deltas: Vec<i32> = refund_movements.iter().map(|t| t.delta).collect();
        deltas.sort_unstable();
        assert_eq!(deltas, vec![1, 2]);

        let rows: Vec<Earning> = earnings::table
            .filter(earnings::order_id.eq(paid.order_id))
            .select(Earning::as_select())
            .load(&mut conn)
            .unwrap();
        assert!(rows.iter().all(|e| e.status == EARNING_CANCELLED));
    }

    #[tokio::test]
    async fn item_refund_is_scoped_and_marks_partial() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let paid = paid_two_line_order(&mut conn);
        let honey_item = paid
            .items
            .iter()
            .find(|i| i.listing_id == paid.honey)
            .unwrap();

        let refund = request_refund(
            &mut conn,
            paid.customer,
            paid.order_id,
            RefundScope {
                order_item_id: Some(honey_item.id),
                quantity: None,
            },
            None,
        )
        .unwrap();
        assert_eq!(refund.amount, dec("60.00"));

        approve_refund(&mut conn, refund.id).unwrap();

        assert_eq!(
            order_payment_status(&mut conn, paid.order_id),
            PaymentStatus::PartiallyRefunded.as_str()
        );
        assert_eq!(listing_qty(&mut conn, paid.honey), 4);
        // The other line keeps its reservation and its earning.
        assert_eq!(listing_qty(&mut conn, paid.tomatoes), 8);
        let pending: i64 = earnings::table
            .filter(earnings::order_id.eq(paid.order_id))
            .filter(earnings::status.eq(EARNING_PENDING))
            .count()
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(pending, 1);
    }

    #[tokio::test]
    async fn refunding_every_item_converges_to_refunded() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let paid = paid_two_line_order(&mut conn);

        for item in &paid.items {
            let refund = request_refund(
                &mut conn,
                paid.customer,
                paid.order_id,
                RefundScope {
                    order_item_id: Some(item.id),
                    quantity: None,
                },
                None,
            )
            .unwrap();
            approve_refund(&mut conn, refund.id).unwrap();
        }

        assert_eq!(
            order_payment_status(&mut conn, paid.order_id),
            PaymentStatus::Refunded.as_str()
        );
        assert_eq!(listing_qty(&mut conn, paid.tomatoes), 10);
        assert_eq!(listing_qty(&mut conn, paid.honey), 4);
    }

    #[tokio::test]
    async fn unpaid_orders_cannot_be_refunded() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let farmer = seed_user(&mut conn, Role::Farmer, true, None);
        let customer = seed_user(&mut conn, Role::Customer, true, None);
        let listing = seed_listing(&mut conn, farmer, "Corn", "15.00", "11.00", 10, LISTING_APPROVED);
        let (order, _) = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 1 }],
            None,
        )
        .unwrap();

        let result = request_refund(
            &mut conn,
            customer,
            order.id,
            RefundScope::default(),
            None,
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn rejection_has_no_side_effects() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let paid = paid_two_line_order(&mut conn);

        let refund = request_refund(
            &mut conn,
            paid.customer,
            paid.order_id,
            RefundScope::default(),
            None,
        )
        .unwrap();
        reject_refund(&mut conn, refund.id).unwrap();

        assert_eq!(
            order_payment_status(&mut conn, paid.order_id),
            PaymentStatus::Success.as_str()
        );
        assert_eq!(listing_qty(&mut conn, paid.tomatoes), 8);
        let pending: i64 = earnings::table
            .filter(earnings::order_id.eq(paid.order_id))
            .filter(earnings::status.eq(EARNING_PENDING))
            .count()
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(pending, 2);
    }
}
