use crate::errors::AppError;
use crate::location::GeoAddress;
use crate::lookup_models::Position;
use crate::services::Geocoder;
use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use std::f64::consts::PI;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two positions in kilometers.
pub fn haversine_km(a: Position, b: Position) -> f64 {
    let to_rad = |deg: f64| deg * PI / 180.0;

    let dlat = to_rad(b.latitude - a.latitude);
    let dlng = to_rad(b.longitude - a.longitude);

    let h = (dlat / 2.0).sin().powi(2)
        + to_rad(a.latitude).cos() * to_rad(b.latitude).cos() * (dlng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Round coordinates to 4 decimal places (~11m precision) for cache keys.
fn cache_key(position: Position) -> String {
    format!(
        "{:.4},{:.4}",
        (position.latitude * 10_000.0).round() / 10_000.0,
        (position.longitude * 10_000.0).round() / 10_000.0
    )
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
}

impl From<NominatimAddress> for GeoAddress {
    fn from(a: NominatimAddress) -> Self {
        GeoAddress {
            town: a.city.or(a.town).or(a.village).or(a.municipality),
            postcode: a.postcode,
            country: a.country,
        }
    }
}

/// Reverse geocoder backed by a Nominatim-compatible service.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
    cache: Cache<String, Option<GeoAddress>>,
    min_interval: Duration,
    /// Earliest instant the next upstream request may leave.
    next_slot: Mutex<Instant>,
}

impl NominatimGeocoder {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create geocoding client: {}", e))
            })?;

        // 24 hour TTL, places do not move
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(86400))
            .max_capacity(50_000)
            .build();

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
            cache,
            min_interval: Duration::ZERO,
            next_slot: Mutex::new(Instant::now()),
        })
    }

    /// Space uncached requests at least `interval` apart. Cache hits are not delayed.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    async fn wait_for_slot(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        // Lock held across the sleep, one caller per slot
        let mut next = self.next_slot.lock().await;
        if *next > Instant::now() {
            tokio::time::sleep_until(*next).await;
        }
        *next = Instant::now() + self.min_interval;
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, position: Position) -> Result<Option<GeoAddress>, AppError> {
        let key = cache_key(position);
        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!("Geocoding cache hit for {}", key);
            return Ok(cached);
        }

        let url = reqwest::Url::parse_with_params(
            &format!("{}/reverse", self.base_url),
            &[
                ("format", "jsonv2".to_string()),
                ("lat", position.latitude.to_string()),
                ("lon", position.longitude.to_string()),
                ("zoom", "18".to_string()),
                ("addressdetails", "1".to_string()),
            ],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        self.wait_for_slot().await;
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Geocoding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Geocoding returned {}: {}",
                status, error_text
            )));
        }

        let body: NominatimResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse geocoding response: {}", e))
        })?;

        let address = match (body.error, body.address) {
            (Some(reason), _) => {
                tracing::debug!("No geocoding result for {}: {}", key, reason);
                None
            }
            (None, address) => address.map(GeoAddress::from),
        };

        self.cache.insert(key, address.clone()).await;
        Ok(address)
    }
}
