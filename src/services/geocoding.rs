//! Postal-code geocoding against a primary provider with an open-data
//! fallback. Results are cached on the caller's address row, so these
//! calls only happen on cache misses.

use serde::Deserialize;

use crate::domain::errors::DomainError;
use crate::domain::geo::GeoPoint;

#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    pub point: GeoPoint,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Clone)]
pub struct GeocodingClient {
    http: reqwest::blocking::Client,
    primary_url: String,
    primary_key: String,
    fallback_url: String,
    country_code: String,
}

// ── Primary provider (OpenCage-shaped) ───────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PrimaryResponse {
    results: Vec<PrimaryResult>,
}

#[derive(Debug, Deserialize)]
struct PrimaryResult {
    geometry: PrimaryGeometry,
    #[serde(default)]
    components: PrimaryComponents,
}

#[derive(Debug, Deserialize)]
struct PrimaryGeometry {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Default, Deserialize)]
struct PrimaryComponents {
    city: Option<String>,
    town: Option<String>,
    state: Option<String>,
}

// ── Fallback provider (Nominatim-shaped) ─────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FallbackResult {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

impl GeocodingClient {
    pub fn from_env() -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            primary_url: std::env::var("GEOCODER_URL")
                .unwrap_or_else(|_| "https://api.opencagedata.com/geocode/v1/json".to_string()),
            primary_key: std::env::var("GEOCODER_API_KEY").unwrap_or_default(),
            fallback_url: std::env::var("GEOCODER_FALLBACK_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org/search".to_string()),
            country_code: std::env::var("GEOCODER_COUNTRY").unwrap_or_else(|_| "in".to_string()),
        }
    }

    /// Resolve a postal code to coordinates, trying the primary provider
    /// first and the fallback on any miss or failure.
    pub fn resolve(&self, postal_code: &str) -> Result<ResolvedLocation, DomainError> {
        match self.resolve_primary(postal_code) {
            Ok(Some(location)) => return Ok(location),
            Ok(None) => {
                log::info!("primary geocoder had no result for {postal_code}, trying fallback")
            }
            Err(e) => log::warn!("primary geocoder failed for {postal_code}: {e}"),
        }

        match self.resolve_fallback(postal_code) {
            Ok(Some(location)) => Ok(location),
            Ok(None) => Err(DomainError::Validation(format!(
                "postal code {postal_code} could not be resolved"
            ))),
            Err(e) => Err(DomainError::External(format!(
                "geocoding failed for {postal_code}: {e}"
            ))),
        }
    }

    fn resolve_primary(&self, postal_code: &str) -> Result<Option<ResolvedLocation>, String> {
        if self.primary_key.is_empty() {
            return Ok(None);
        }

        let response = self
            .http
            .get(&self.primary_url)
            .query(&[
                ("q", postal_code),
                ("countrycode", self.country_code.as_str()),
                ("key", self.primary_key.as_str()),
                ("limit", "1"),
            ])
            .send()
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("primary geocoder returned {status}"));
        }

        let body: PrimaryResponse = response.json().map_err(|e| e.to_string())?;
        Ok(body.results.into_iter().next().map(|r| ResolvedLocation {
            point: GeoPoint {
                latitude: r.geometry.lat,
                longitude: r.geometry.lng,
            },
            city: r.components.city.or(r.components.town),
            state: r.components.state,
        }))
    }

    fn resolve_fallback(&self, postal_code: &str) -> Result<Option<ResolvedLocation>, String> {
        let response = self
            .http
            .get(&self.fallback_url)
            .query(&[
                ("postalcode", postal_code),
                ("countrycodes", self.country_code.as_str()),
                ("format", "json"),
                ("limit", "1"),
            ])
            .header("User-Agent", "farmlink")
            .send()
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("fallback geocoder returned {status}"));
        }

        let body: Vec<FallbackResult> = response.json().map_err(|e| e.to_string())?;
        let Some(hit) = body.into_iter().next() else {
            return Ok(None);
        };

        let latitude: f64 = hit.lat.parse().map_err(|_| "unparseable latitude")?;
        let longitude: f64 = hit.lon.parse().map_err(|_| "unparseable longitude")?;
        Ok(Some(ResolvedLocation {
            point: GeoPoint {
                latitude,
                longitude,
            },
            city: hit
                .display_name
                .and_then(|n| n.split(',').next().map(|p| p.trim().to_string())),
            state: None,
        }))
    }
}
