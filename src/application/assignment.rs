//! Geography-driven matching: who can see whom, and who serves whom.
//! Candidate sets are whole user-role slices; the scans are linear on
//! purpose (see `domain::geo`).

use std::collections::HashMap;

use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::geo::{
    filter_within, nearest_within, GeoPoint, AGENT_DELIVERY_RADIUS_KM, CR_EXCLUSION_RADIUS_KM,
    CUSTOMER_FARMER_RADIUS_KM, FARMER_CR_RADIUS_KM,
};
use crate::domain::roles::Role;
use crate::domain::status::OrderStatus;
use crate::models::address::Address;
use crate::models::order::Order;
use crate::models::pickup_job::{NewPickupJob, PickupJob, JOB_ASSIGNED, JOB_DROPPED, JOB_PICKED_UP};
use crate::models::product_listing::{ProductListing, LISTING_APPROVED};
use crate::schema::{addresses, orders, pickup_jobs, product_listings, users};
use crate::services::geocoding::GeocodingClient;

use super::orders::apply_transition_effects;

/// Coordinates for a user, from the cached address row or a fresh
/// geocoding call whose result is written back to the cache.
pub fn resolve_user_point(
    conn: &mut PgConnection,
    geocoder: &GeocodingClient,
    user_id: Uuid,
) -> Result<GeoPoint, DomainError> {
    let address: Address = addresses::table
        .filter(addresses::user_id.eq(user_id))
        .select(Address::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| DomainError::Validation("user has no address on file".to_string()))?;

    if let (Some(latitude), Some(longitude)) = (address.latitude, address.longitude) {
        return Ok(GeoPoint {
            latitude,
            longitude,
        });
    }

    let resolved = geocoder.resolve(&address.postal_code)?;
    diesel::update(addresses::table.find(address.id))
        .set((
            addresses::latitude.eq(Some(resolved.point.latitude)),
            addresses::longitude.eq(Some(resolved.point.longitude)),
            addresses::city.eq(address.city.clone().or(resolved.city.clone())),
            addresses::state.eq(address.state.clone().or(resolved.state.clone())),
            addresses::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    Ok(resolved.point)
}

/// Approved users of a role with cached coordinates. Users whose address
/// was never geocoded are invisible to matching until it is.
fn located_users_with_role(
    conn: &mut PgConnection,
    role: Role,
) -> Result<Vec<(Uuid, GeoPoint)>, DomainError> {
    let rows: Vec<(Uuid, Option<f64>, Option<f64>)> = users::table
        .inner_join(addresses::table)
        .filter(users::role.eq(role.as_str()))
        .filter(users::approved.eq(true))
        .select((users::id, addresses::latitude, addresses::longitude))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, lat, lon)| {
            Some((
                id,
                GeoPoint {
                    latitude: lat?,
                    longitude: lon?,
                },
            ))
        })
        .collect())
}

/// Registration-time conflict check: no approved CR may already operate
/// within the exclusion radius.
pub fn ensure_cr_territory_is_free(
    conn: &mut PgConnection,
    point: GeoPoint,
) -> Result<(), DomainError> {
    let crs = located_users_with_role(conn, Role::Cr)?;
    if let Some((_, distance)) = nearest_within(point, &crs, CR_EXCLUSION_RADIUS_KM) {
        return Err(DomainError::Conflict(format!(
            "another community representative already operates {distance:.1} km away"
        )));
    }
    Ok(())
}

/// Attach a farmer to the minimum-distance CR in range. Fails when no CR
/// covers the farmer's location.
pub fn assign_nearest_cr(
    conn: &mut PgConnection,
    farmer_id: Uuid,
    farmer_point: GeoPoint,
) -> Result<Uuid, DomainError> {
    let crs = located_users_with_role(conn, Role::Cr)?;
    let (cr_id, distance) = nearest_within(farmer_point, &crs, FARMER_CR_RADIUS_KM)
        .ok_or_else(|| {
            DomainError::Validation(
                "no community representative covers this farmer's area".to_string(),
            )
        })?;

    diesel::update(users::table.find(farmer_id))
        .set((
            users::assigned_cr_id.eq(Some(cr_id)),
            users::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    log::info!("farmer {farmer_id} attached to CR {cr_id} at {distance:.1} km");
    Ok(cr_id)
}

/// Pick the nearest free agent inside the delivery radius of the
/// customer, open a pickup job and advance the order to PICKUP_ASSIGNED.
pub fn assign_pickup_agent(
    conn: &mut PgConnection,
    geocoder: &GeocodingClient,
    order_id: Uuid,
) -> Result<(PickupJob, Order), DomainError> {
    conn.transaction::<_, DomainError, _>(|conn| {
        let order: Order = orders::table
            .find(order_id)
            .select(Order::as_select())
            .first(conn)
            .optional()?
            .ok_or(DomainError::NotFound)?;

        let current: OrderStatus = order.status.parse()?;
        let payment = order.payment_status.parse()?;
        crate::domain::status::validate_transition(
            current,
            OrderStatus::PickupAssigned,
            payment,
        )?;

        let customer_point = resolve_user_point(conn, geocoder, order.customer_id)?;

        let busy_ids: Vec<Uuid> = pickup_jobs::table
            .filter(pickup_jobs::status.eq_any([JOB_ASSIGNED, JOB_PICKED_UP, JOB_DROPPED]))
            .select(pickup_jobs::agent_id)
            .load(conn)?;
        let free: Vec<(Uuid, GeoPoint)> = located_users_with_role(conn, Role::PickupAgent)?
            .into_iter()
            .filter(|(id, _)| !busy_ids.contains(id))
            .collect();

        let (agent_id, distance) =
            nearest_within(customer_point, &free, AGENT_DELIVERY_RADIUS_KM).ok_or_else(|| {
                DomainError::Validation(
                    "no pickup agent available within delivery range".to_string(),
                )
            })?;

        let job: PickupJob = diesel::insert_into(pickup_jobs::table)
            .values(&NewPickupJob {
                id: Uuid::new_v4(),
                order_id: order.id,
                agent_id,
                status: JOB_ASSIGNED.to_string(),
            })
            .get_result(conn)?;

        let updated = apply_transition_effects(conn, &order, OrderStatus::PickupAssigned)?;
        log::info!(
            "order {} assigned to agent {agent_id} at {distance:.1} km",
            order.id
        );
        Ok((job, updated))
    })
}

#[derive(Debug)]
pub struct VisibleListing {
    pub listing: ProductListing,
    pub distance_km: f64,
}

/// The catalog a customer may order from: APPROVED, in-stock listings
/// whose farmer is within the visibility radius. Sorted nearest first.
pub fn visible_listings(
    conn: &mut PgConnection,
    geocoder: &GeocodingClient,
    customer_id: Uuid,
) -> Result<Vec<VisibleListing>, DomainError> {
    let origin = resolve_user_point(conn, geocoder, customer_id)?;
    let farmers = located_users_with_role(conn, Role::Farmer)?;
    let in_range = filter_within(origin, &farmers, CUSTOMER_FARMER_RADIUS_KM);
    if in_range.is_empty() {
        return Ok(Vec::new());
    }

    let distances: HashMap<Uuid, f64> = in_range.into_iter().collect();
    let farmer_ids: Vec<Uuid> = distances.keys().copied().collect();

    let listings: Vec<ProductListing> = product_listings::table
        .filter(product_listings::farmer_id.eq_any(&farmer_ids))
        .filter(product_listings::status.eq(LISTING_APPROVED))
        .filter(product_listings::available_qty.gt(0))
        .select(ProductListing::as_select())
        .load(conn)?;

    let mut visible: Vec<VisibleListing> = listings
        .into_iter()
        .map(|listing| VisibleListing {
            distance_km: distances[&listing.farmer_id],
            listing,
        })
        .collect();
    visible.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(visible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::orders::{create_order, OrderItemRequest};
    use crate::application::payments::record_payment_success;
    use crate::domain::errors::DomainError;
    use crate::models::product_listing::LISTING_APPROVED;
    use crate::test_support::{offline_geocoder, seed_listing, seed_user, setup_db};

    // Bangalore and neighbours; Mysore is ~128 km out.
    const BANGALORE: (f64, f64) = (12.9716, 77.5946);
    const WHITEFIELD: (f64, f64) = (12.9698, 77.7500);
    const DODDABALLAPUR: (f64, f64) = (13.2959, 77.5413);
    const MYSORE: (f64, f64) = (12.2958, 76.6394);

    #[tokio::test]
    async fn customers_only_see_listings_from_farmers_in_range() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let geocoder = offline_geocoder();
        let customer = seed_user(&mut conn, Role::Customer, true, Some(BANGALORE));
        let near_farmer = seed_user(&mut conn, Role::Farmer, true, Some(WHITEFIELD));
        let far_farmer = seed_user(&mut conn, Role::Farmer, true, Some(MYSORE));
        let near_listing =
            seed_listing(&mut conn, near_farmer, "Spinach", "20.00", "15.00", 10, LISTING_APPROVED);
        seed_listing(&mut conn, far_farmer, "Coconuts", "35.00", "28.00", 10, LISTING_APPROVED);

        let visible = visible_listings(&mut conn, &geocoder, customer).unwrap();

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].listing.id, near_listing);
        assert!(visible[0].distance_km < CUSTOMER_FARMER_RADIUS_KM);
    }

    #[tokio::test]
    async fn out_of_stock_and_unapproved_listings_stay_hidden() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let geocoder = offline_geocoder();
        let customer = seed_user(&mut conn, Role::Customer, true, Some(BANGALORE));
        let farmer = seed_user(&mut conn, Role::Farmer, true, Some(WHITEFIELD));
        seed_listing(&mut conn, farmer, "Sold out", "20.00", "15.00", 0, LISTING_APPROVED);
        seed_listing(&mut conn, farmer, "Unreviewed", "20.00", "15.00", 10, "PENDING");

        let visible = visible_listings(&mut conn, &geocoder, customer).unwrap();
        assert!(visible.is_empty());
    }

    #[tokio::test]
    async fn cr_territory_check_blocks_nearby_registrations() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        seed_user(&mut conn, Role::Cr, true, Some(BANGALORE));

        let nearby = ensure_cr_territory_is_free(
            &mut conn,
            GeoPoint { latitude: WHITEFIELD.0, longitude: WHITEFIELD.1 },
        );
        assert!(matches!(nearby, Err(DomainError::Conflict(_))));

        let far = ensure_cr_territory_is_free(
            &mut conn,
            GeoPoint { latitude: MYSORE.0, longitude: MYSORE.1 },
        );
        assert!(far.is_ok());
    }

    #[tokio::test]
    async fn farmers_get_the_nearest_cr_or_none() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let near_cr = seed_user(&mut conn, Role::Cr, true, Some(BANGALORE));
        seed_user(&mut conn, Role::Cr, true, Some(MYSORE));
        let farmer = seed_user(&mut conn, Role::Farmer, false, Some(WHITEFIELD));

        let assigned = assign_nearest_cr(
            &mut conn,
            farmer,
            GeoPoint { latitude: WHITEFIELD.0, longitude: WHITEFIELD.1 },
        )
        .unwrap();
        assert_eq!(assigned, near_cr);

        // Nobody within 50 km of this point.
        let stranded = assign_nearest_cr(
            &mut conn,
            farmer,
            GeoPoint { latitude: 15.35, longitude: 75.13 },
        );
        assert!(matches!(stranded, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn agent_assignment_picks_the_nearest_free_agent() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let geocoder = offline_geocoder();
        let customer = seed_user(&mut conn, Role::Customer, true, Some(BANGALORE));
        let farmer = seed_user(&mut conn, Role::Farmer, true, Some(WHITEFIELD));
        let near_agent = seed_user(&mut conn, Role::PickupAgent, true, Some(WHITEFIELD));
        seed_user(&mut conn, Role::PickupAgent, true, Some(DODDABALLAPUR));
        let listing = seed_listing(&mut conn, farmer, "Beans", "40.00", "32.00", 10, LISTING_APPROVED);

        let (order, _) = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 2 }],
            None,
        )
        .unwrap();
        record_payment_success(&mut conn, order.id, None).unwrap();

        let (job, updated) = assign_pickup_agent(&mut conn, &geocoder, order.id).unwrap();
        assert_eq!(job.agent_id, near_agent);
        assert_eq!(updated.status, OrderStatus::PickupAssigned.as_str());

        // The same agent now has an open job; a second paid order in the
        // same spot must go to the other agent or fail the radius check.
        let (order2, _) = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 1 }],
            None,
        )
        .unwrap();
        record_payment_success(&mut conn, order2.id, None).unwrap();
        let second = assign_pickup_agent(&mut conn, &geocoder, order2.id);
        match second {
            Ok((job2, _)) => assert_ne!(job2.agent_id, near_agent),
            Err(DomainError::Validation(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[tokio::test]
    async fn unpaid_orders_cannot_be_assigned() {
        let (_container, pool) = setup_db().await;
        let mut conn = pool.get().unwrap();
        let geocoder = offline_geocoder();
        let customer = seed_user(&mut conn, Role::Customer, true, Some(BANGALORE));
        let farmer = seed_user(&mut conn, Role::Farmer, true, Some(WHITEFIELD));
        seed_user(&mut conn, Role::PickupAgent, true, Some(BANGALORE));
        let listing = seed_listing(&mut conn, farmer, "Carrots", "18.00", "14.00", 10, LISTING_APPROVED);

        let (order, _) = create_order(
            &mut conn,
            customer,
            &[OrderItemRequest { listing_id: listing, quantity: 1 }],
            None,
        )
        .unwrap();

        let result = assign_pickup_agent(&mut conn, &geocoder, order.id);
        assert!(matches!(result, Err(DomainError::InvalidTransition(_))));
    }
}
