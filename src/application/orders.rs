use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use diesel::dsl::{exists, select};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::pricing;
use crate::domain::roles::{may_update_order, Role};
use crate::domain::status::{validate_transition, OrderStatus, PaymentStatus};
use crate::models::coupon::Coupon;
use crate::models::earning::{EARNING_CANCELLED, EARNING_PENDING};
use crate::models::inventory_transaction::{
    NewInventoryTransaction, REASON_ORDER_CANCEL, REASON_ORDER_RESERVE,
};
use crate::models::order::{NewOrder, Order};
use crate::models::order_item::{NewOrderItem, OrderItem};
use crate::models::pickup_job::JOB_COMPLETED;
use crate::models::product_listing::{ProductListing, LISTING_APPROVED};
use crate::schema::{
    coupons, earnings, inventory_transactions, order_items, orders, pickup_jobs, product_listings,
};

#[derive(Debug)]
pub struct OrderItemRequest {
    pub listing_id: Uuid,
    pub quantity: i32,
}

/// Create an order for `customer_id`: snapshot prices, reserve stock and
/// log the reservation, apply an optional coupon. One transaction; any
/// failure releases everything.
pub fn create_order(
    conn: &mut PgConnection,
    customer_id: Uuid,
    items: &[OrderItemRequest],
    coupon_code: Option<&str>,
) -> Result<(Order, Vec<OrderItem>), DomainError> {
    if items.is_empty() {
        return Err(DomainError::Validation(
            "an order needs at least one item".to_string(),
        ));
    }
    if items.iter().any(|i| i.quantity <= 0) {
        return Err(DomainError::Validation(
            "item quantities must be positive".to_string(),
        ));
    }

    conn.transaction::<_, DomainError, _>(|conn| {
        let order_id = Uuid::new_v4();
        let mut total = BigDecimal::zero();
        let mut new_items = Vec::with_capacity(items.len());

        for request in items {
            let listing: ProductListing = product_listings::table
                .find(request.listing_id)
                .select(ProductListing::as_select())
                .first(conn)
                .optional()?
                .ok_or(DomainError::NotFound)?;

            if listing.status != LISTING_APPROVED {
                return Err(DomainError::Validation(format!(
                    "listing {} is not open for orders",
                    listing.name
                )));
            }
            if listing.available_qty < request.quantity {
                return Err(DomainError::Conflict(format!(
                    "insufficient stock for {}: {} left",
                    listing.name, listing.available_qty
                )));
            }

            diesel::update(product_listings::table.find(listing.id))
                .set((
                    product_listings::available_qty
                        .eq(product_listings::available_qty - request.quantity),
                    product_listings::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

            diesel::insert_into(inventory_transactions::table)
                .values(&NewInventoryTransaction {
                    id: Uuid::new_v4(),
                    listing_id: listing.id,
                    order_id: Some(order_id),
                    delta: -request.quantity,
                    reason: REASON_ORDER_RESERVE.to_string(),
                })
                .execute(conn)?;

            total += pricing::line_total(&listing.unit_price, request.quantity);
            new_items.push(NewOrderItem {
                id: Uuid::new_v4(),
                order_id,
                listing_id: listing.id,
                farmer_id: listing.farmer_id,
                quantity: request.quantity,
                unit_price: listing.unit_price,
                farmer_price: listing.farmer_price,
            });
        }

        let discount = match coupon_code {
            Some(code) => coupon_discount_for(conn, code, &total)?,
            None => BigDecimal::zero(),
        };

        let order: Order = diesel::insert_into(orders::table)
            .values(&NewOrder {
                id: order_id,
                customer_id,
                status: OrderStatus::Created.as_str().to_string(),
                payment_status: PaymentStatus::Pending.as_str().to_string(),
                total_amount: total,
                discount_amount: discount,
                coupon_code: coupon_code.map(String::from),
            })
            .get_result(conn)?;

        let rows: Vec<OrderItem> = diesel::insert_into(order_items::table)
            .values(&new_items)
            .get_results(conn)?;

        log::info!(
            "order {} created for customer {} with {} items, total {}",
            order.id,
            customer_id,
            rows.len(),
            order.total_amount
        );
        Ok((order, rows))
    })
}

/// Discount for a coupon code against an order total, rejecting unknown,
/// inactive and expired codes.
pub fn coupon_discount_for(
    conn: &mut PgConnection,
    code: &str,
    order_total: &BigDecimal,
) -> Result<BigDecimal, DomainError> {
    let coupon: Coupon = coupons::table
        .filter(coupons::code.eq(code))
        .select(Coupon::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| DomainError::Validation(format!("unknown coupon code {code}")))?;

    if !coupon.active {
        return Err(DomainError::Validation(format!(
            "coupon {code} is no longer active"
        )));
    }
    if let Some(expires_at) = coupon.expires_at {
        if expires_at < Utc::now() {
            return Err(DomainError::Validation(format!("coupon {code} has expired")));
        }
    }

    Ok(pricing::coupon_discount(
        order_total,
        &coupon.discount_percent,
        &coupon.max_discount,
    ))
}

/// What a given user is to a given order, for authorization.
#[derive(Debug, Clone, Copy)]
pub struct OrderAccess {
    pub is_owner: bool,
    pub sells_in_order: bool,
    pub is_assigned_agent: bool,
}

pub fn load_access(
    conn: &mut PgConnection,
    order: &Order,
    user_id: Uuid,
) -> Result<OrderAccess, DomainError> {
    let sells_in_order = select(exists(
        order_items::table
            .filter(order_items::order_id.eq(order.id))
            .filter(order_items::farmer_id.eq(user_id)),
    ))
    .get_result(conn)?;
    let is_assigned_agent = select(exists(
        pickup_jobs::table
            .filter(pickup_jobs::order_id.eq(order.id))
            .filter(pickup_jobs::agent_id.eq(user_id)),
    ))
    .get_result(conn)?;

    Ok(OrderAccess {
        is_owner: order.customer_id == user_id,
        sells_in_order,
        is_assigned_agent,
    })
}

/// Validate and apply one status transition on behalf of a caller,
/// including the cancellation side effects.
pub fn apply_transition(
    conn: &mut PgConnection,
    actor_id: Uuid,
    actor_role: Role,
    order_id: Uuid,
    requested: OrderStatus,
) -> Result<Order, DomainError> {
    conn.transaction::<_, DomainError, _>(|conn| {
        let order: Order = orders::table
            .find(order_id)
            .select(Order::as_select())
            .first(conn)
            .optional()?
            .ok_or(DomainError::NotFound)?;

        let current: OrderStatus = order.status.parse()?;
        let payment: PaymentStatus = order.payment_status.parse()?;

        let access = load_access(conn, &order, actor_id)?;
        if !may_update_order(
            actor_role,
            requested,
            access.is_owner,
            access.sells_in_order,
            access.is_assigned_agent,
        ) {
            return Err(DomainError::Forbidden(format!(
                "{actor_role} may not move order {order_id} to {requested}"
            )));
        }

        validate_transition(current, requested, payment)?;
        apply_transition_effects(conn, &order, requested)
    })
}

/// Flip the status and run the side effects tied to the target state.
/// Callers have already validated the transition and must hold a
/// transaction.
pub(crate) fn apply_transition_effects(
    conn: &mut PgConnection,
    order: &Order,
    requested: OrderStatus,
) -> Result<Order, DomainError> {
    let updated: Order = diesel::update(orders::table.find(order.id))
        .set((
            orders::status.eq(requested.as_str()),
            orders::updated_at.eq(Utc::now()),
        ))
        .get_result(conn)?;

    match requested {
        OrderStatus::Cancelled => {
            let released = release_order_inventory(conn, order.id, REASON_ORDER_CANCEL, &[])?;
            let cancelled = cancel_pending_earnings(conn, order.id)?;
            log::info!(
                "order {} cancelled: {released} items released, {cancelled} earnings cancelled",
                order.id
            );
        }
        OrderStatus::Delivered => {
            diesel::update(pickup_jobs::table.filter(pickup_jobs::order_id.eq(order.id)))
                .set((
                    pickup_jobs::status.eq(JOB_COMPLETED),
                    pickup_jobs::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
        }
        _ => {}
    }

    Ok(updated)
}

/// Put one item's reserved units back on the shelf and log the movement.
pub(crate) fn restore_item_stock(
    conn: &mut PgConnection,
    item: &OrderItem,
    quantity: i32,
    reason: &str,
) -> Result<(), DomainError> {
    diesel::update(product_listings::table.find(item.listing_id))
        .set((
            product_listings::available_qty.eq(product_listings::available_qty + quantity),
            product_listings::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    diesel::insert_into(inventory_transactions::table)
        .values(&NewInventoryTransaction {
            id: Uuid::new_v4(),
            listing_id: item.listing_id,
            order_id: Some(item.order_id),
            delta: quantity,
            reason: reason.to_string(),
        })
        .execute(conn)?;
    Ok(())
}

/// Restore every item of an order except those in `skip_items`.
pub(crate) fn release_order_inventory(
    conn: &mut PgConnection,
    order_id: Uuid,
    reason: &str,
    skip_items: &[Uuid],
) -> Result<usize, DomainError> {
    let items: Vec<OrderItem> = order_items::table
        .filter(order_items::order_id.eq(order_id))
        .select(OrderItem::as_select())
        .load(conn)?;

    let mut released = 0;
    for item in &items {
        if skip_items.contains(&item.id) {
            continue;
        }
        restore_item_stock(conn, item, item.quantity, reason)?;
        released += 1;
    }
    Ok(released)
}

pub(crate) fn cancel_pending_earnings(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<usize, DomainError> {
    let cancelled = diesel::update(
        earnings::table
            .filter(earnings::order_id.eq(order_id))
            .filter(earnings::status.eq(EARNING_PENDING)),
    )
    .set((
        earnings::status.eq(EARNING_CANCELLED),
        earnings::updated_at.eq(Utc::now()),
    ))
    .execute(conn)?;
    Ok(cancelled)
}

/// Auto-complete deliveries that have sat OUT_FOR_DELIVERY for more than
/// 24 hours without a confirmation. One transaction per order so a bad
/// row does not hold the rest of the batch back.
pub fn sweep_stale_deliveries(conn: &mut PgConnection) -> Result<Vec<Uuid>, DomainError> {
    let cutoff = Utc::now() - chrono::Duration::hours(24);
    let stale: Vec<Order> = orders::table
        .filter(orders::status.eq(OrderStatus::OutForDelivery.as_str()))
        .filter(orders::updated_at.lt(cutoff))
        .select(Order::as_select())
        .load(conn)?;

    let mut completed = Vec::with_capacity(stale.len());
    for order in &stale {
        let result = conn.transaction::<_, DomainError, _>(|conn| {
            apply_transition_effects(conn, order, OrderStatus::Delivered)
        });
        match result {
            Ok(_) => {
                log::info!("order {} auto-completed after 24h out for delivery", order.id);
                completed.push(order.id);
            }
            Err(e) => log::error!("could not auto-complete order {}: {e}", order.id),
        }
    }
    Ok(completed)
}

pub fn get_order_for(
    conn: &mut PgConnection,
    actor_id: Uuid,
    actor_role: Role,
    order_id: Uuid,
) -> Result<(Order, Vec<OrderItem>), DomainError> {
    let order: Order = orders::table
        .find(order_id)
        .select(Order::as_select())
        .first(conn)
        .optional()?
        .ok_or(DomainError::NotFound)?;

    let allowed = match actor_role {
        Role::Admin | Role::Cr => true,
        _ => {
            let access = load_access(conn, &order, actor_id)?;
            access.is_owner || access.sells_in_order || access.is_assigned_agent
        }
    };
    if !allowed {
        return Err(DomainError::Forbidden(
            "order belongs to someone else".to_string(),
        ));
    }

    let items = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .select(OrderItem::as_select())
        .load(conn)?;
    Ok((order, items))
}

#[derive(Debug)]
pub struct OrderPage {
    pub items: Vec<Order>,
    pub total: i64,
}

/// Paginated, newest-first order listing scoped to what the caller may
/// see.
pub fn list_orders_for(
    conn: &mut PgConnection,
    actor_id: Uuid,
    actor_role: Role,
    page: i64,
    limit: i64,
) -> Result<OrderPage, DomainError> {
    let offset = (page - 1) * limit;

    let (total, items) = match actor_role {
        Role::Admin | Role::Cr => {
            let total: i64 = orders::table.count().get_result(conn)?;
            let items = orders::table
                .select(Order::as_select())
                .order(orders::created_at.desc())
                .limit(limit)
                .offset(offset)
                .load(conn)?;
            (total, items)
        }
        Role::Customer => {
            let total: i64 = orders::table
                .filter(orders::customer_id.eq(actor_id))
                .count()
                .get_result(conn)?;
            let items = orders::table
                .filter(orders::customer_id.eq(actor_id))
                .select(Order::as_select())
                .order(orders::created_at.desc())
                .limit(limit)
                .offset(offset)
                .load(conn)?;
            (total, items)
        }
        Role::Farmer => {
            let sold = || {
                order_items::table
                    .filter(order_items::farmer_id.eq(actor_id))
                    .select(order_items::order_id)
            };
            let total: i64 = orders::table
                .filter(orders::id.eq_any(sold()))
                .count()
                .get_result(conn)?;
            let items = orders::table
                .filter(orders::id.eq_any(sold()))
                .select(Order::as_select())
                .order(orders::created_at.desc())
                .limit(limit)
                .offset(offset)
                .load(conn)?;
            (total, items)
        }
        Role::PickupAgent => {
            let carried = || {
                pickup_jobs::table
                    .filter(pickup_jobs::agent_id.eq(actor_id))
                    .select(pickup_jobs::order_id)
            };
            let total: i64 = orders::table
                .filter(orders::id.eq_any(carried()))
                .count()
                .get_result(conn)?;
            let items = orders::table
                .filter(orders::id.eq_any(carried()))
                .select(Order::as_select())
                .order(orders::created_at.desc())
                .limit(limit)
                .offset(offset)
                .load(conn)?;
            (total, items)
        }
    };

    Ok(OrderPage { items, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::payments::record_payment_success;
    use crate::models::earning::{Earning, EARNING_PAID};
    use crate::models::inventory_transaction::InventoryTransaction;
    use crate::models::product_listing::{LISTING_APPROVED, LISTING_PENDING};
    use crate::test_support::{dec, seed_coupon, seed_listing, seed_user, setup_db};

    fn listing_qty(conn: &mut PgConnection, listing_id: Uuid) -> i32 {
        product_listings::table
            .find(listing_id)
            .select(product_listings::available_qty)
            .first(conn)
            .expect("listing missing")
    }

    #[tokio::test]
    async fn create_order_reserves_stock_and_logs_the_reservation() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let farmer = seed_user(&mut conn, Role::Farmer, true, None);
        let customer = seed_user(&mut conn, Role::Customer, true, None);
        let listing = seed_listing(&mut conn, farmer, "Tomatoes", "25.00", "18.00", 10, LISTING_APPROVED);

        let (order, items) = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 3 }],
            None,
        )
        .expect("create failed");

        assert_eq!(order.status, OrderStatus::Created.as_str());
        assert_eq!(order.payment_status, PaymentStatus::Pending.as_str());
        assert_eq!(order.total_amount, dec("75.00"));
        assert_eq!(items.len(), 1);
        assert_eq!(listing_qty(&mut conn, listing), 7);

        let logged: Vec<InventoryTransaction> = inventory_transactions::table
            .filter(inventory_transactions::order_id.eq(order.id))
            .select(InventoryTransaction::as_select())
            .load(&mut conn)
            .unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].delta, -3);
        assert_eq!(logged[0].reason, REASON_ORDER_RESERVE);
    }

    #[tokio::test]
    async fn create_order_rejects_insufficient_stock() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let farmer = seed_user(&mut conn, Role::Farmer, true, None);
        let customer = seed_user(&mut conn, Role::Customer, true, None);
        let listing = seed_listing(&mut conn, farmer, "Okra", "10.00", "7.00", 2, LISTING_APPROVED);

        let result = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 5 }],
            None,
        );

        assert!(matches!(result, Err(DomainError::Conflict(_))));
        // The whole transaction rolled back; nothing was reserved.
        assert_eq!(listing_qty(&mut conn, listing), 2);
    }

    #[tokio::test]
    async fn create_order_refuses_unapproved_listings() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let farmer = seed_user(&mut conn, Role::Farmer, true, None);
        let customer = seed_user(&mut conn, Role::Customer, true, None);
        let listing = seed_listing(&mut conn, farmer, "Mangoes", "90.00", "70.00", 5, LISTING_PENDING);

        let result = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 1 }],
            None,
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn coupon_discount_is_capped() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let farmer = seed_user(&mut conn, Role::Farmer, true, None);
        let customer = seed_user(&mut conn, Role::Customer, true, None);
        let listing = seed_listing(&mut conn, farmer, "Rice", "100.00", "80.00", 50, LISTING_APPROVED);
        seed_coupon(&mut conn, "HARVEST20", "20", "100");

        let (order, _) = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 10 }],
            Some("HARVEST20"),
        )
        .expect("create failed");

        // 20% of 1000 is 200, capped at 100.
        assert_eq!(order.total_amount, dec("1000.00"));
        assert_eq!(order.discount_amount, dec("100"));
    }

    #[tokio::test]
    async fn cancelling_a_paid_order_restores_stock_and_cancels_pending_earnings() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let farmer = seed_user(&mut conn, Role::Farmer, true, None);
        let customer = seed_user(&mut conn, Role::Customer, true, None);
        let admin = seed_user(&mut conn, Role::Admin, true, None);
        let tomatoes = seed_listing(&mut conn, farmer, "Tomatoes", "25.00", "18.00", 10, LISTING_APPROVED);
        let honey = seed_listing(&mut conn, farmer, "Honey", "60.00", "45.00", 4, LISTING_APPROVED);

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
        record_payment_success(&mut conn, order.id, None).unwrap();

        let cancelled = apply_transition(&mut conn, admin, Role::Admin, order.id, OrderStatus::Cancelled)
            .expect("cancel failed");

        assert_eq!(cancelled.status, OrderStatus::Cancelled.as_str());
        assert_eq!(listing_qty(&mut conn, tomatoes), 10);
        assert_eq!(listing_qty(&mut conn, honey), 4);

        let rows: Vec<Earning> = earnings::table
            .filter(earnings::order_id.eq(order.id))
            .select(Earning::as_select())
            .load(&mut conn)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|e| e.status == EARNING_CANCELLED));
    }

    #[tokio::test]
    async fn cancellation_leaves_paid_earnings_untouched() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let farmer = seed_user(&mut conn, Role::Farmer, true, None);
        let customer = seed_user(&mut conn, Role::Customer, true, None);
        let admin = seed_user(&mut conn, Role::Admin, true, None);
        let listing = seed_listing(&mut conn, farmer, "Milk", "30.00", "24.00", 8, LISTING_APPROVED);

        let (order, _) = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 2 }],
            None,
        )
        .unwrap();
        record_payment_success(&mut conn, order.id, None).unwrap();
        diesel::update(earnings::table.filter(earnings::order_id.eq(order.id)))
            .set(earnings::status.eq(EARNING_PAID))
            .execute(&mut conn)
            .unwrap();

        apply_transition(&mut conn, admin, Role::Admin, order.id, OrderStatus::Cancelled).unwrap();

        let statuses: Vec<String> = earnings::table
            .filter(earnings::order_id.eq(order.id))
            .select(earnings::status)
            .load(&mut conn)
            .unwrap();
        assert_eq!(statuses, vec![EARNING_PAID.to_string()]);
    }

    #[tokio::test]
    async fn customers_cannot_move_orders_forward() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let farmer = seed_user(&mut conn, Role::Farmer, true, None);
        let customer = seed_user(&mut conn, Role::Customer, true, None);
        let listing = seed_listing(&mut conn, farmer, "Eggs", "6.00", "5.00", 30, LISTING_APPROVED);

        let (order, _) = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 6 }],
            None,
        )
        .unwrap();

        let forward = apply_transition(&mut conn, customer, Role::Customer, order.id, OrderStatus::Paid);
        assert!(matches!(forward, Err(DomainError::Forbidden(_))));

        let cancel = apply_transition(&mut conn, customer, Role::Customer, order.id, OrderStatus::Cancelled);
        assert!(cancel.is_ok());
    }

    #[tokio::test]
    async fn step_skipping_is_rejected_with_a_transition_error() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let farmer = seed_user(&mut conn, Role::Farmer, true, None);
        let customer = seed_user(&mut conn, Role::Customer, true, None);
        let admin = seed_user(&mut conn, Role::Admin, true, None);
        let listing = seed_listing(&mut conn, farmer, "Ghee", "200.00", "160.00", 3, LISTING_APPROVED);

        let (order, _) = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 1 }],
            None,
        )
        .unwrap();

        let result = apply_transition(&mut conn, admin, Role::Admin, order.id, OrderStatus::Delivered);
        assert!(matches!(result, Err(DomainError::InvalidTransition(_))));
    }
}
