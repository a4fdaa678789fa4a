use uuid::Uuid;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// CRs must not operate within this distance of each other.
pub const CR_EXCLUSION_RADIUS_KM: f64 = 50.0;
/// A farmer is attached to the nearest CR inside this radius.
pub const FARMER_CR_RADIUS_KM: f64 = 50.0;
/// Customers only see farmers inside this radius.
pub const CUSTOMER_FARMER_RADIUS_KM: f64 = 50.0;
/// Pickup agents only serve customers inside this radius.
pub const AGENT_DELIVERY_RADIUS_KM: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Great-circle distance in kilometres between two points.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

pub fn within_km(a: GeoPoint, b: GeoPoint, radius_km: f64) -> bool {
    haversine_km(a, b) <= radius_km
}

/// All candidates inside `radius_km` of `origin`, with their distance.
/// A linear scan; candidate sets are bounded by registered users.
pub fn filter_within(
    origin: GeoPoint,
    candidates: &[(Uuid, GeoPoint)],
    radius_km: f64,
) -> Vec<(Uuid, f64)> {
    candidates
        .iter()
        .map(|(id, point)| (*id, haversine_km(origin, *point)))
        .filter(|(_, distance)| *distance <= radius_km)
        .collect()
}

/// The closest candidate inside `radius_km`, if any.
pub fn nearest_within(
    origin: GeoPoint,
    candidates: &[(Uuid, GeoPoint)],
    radius_km: f64,
) -> Option<(Uuid, f64)> {
    filter_within(origin, candidates, radius_km)
        .into_iter()
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
