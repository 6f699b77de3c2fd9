//! Collaborator seams.
//!
//! Every external capability the tool depends on sits behind one of these traits so the
//! host can swap transports, and tests can substitute in-process fakes.

use crate::credentials::Credentials;
use crate::errors::AppError;
use crate::location::{GeoAddress, LocationEstimate};
use crate::lookup_models::{CalendarData, MapsActivity, ParamsTemplate, PersonRecord, Position};
use crate::models::Profile;
use crate::session::Session;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Source of the GHunt session credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load credentials. Absent credentials are returned empty, not as an error.
    async fn load(&self) -> Result<Credentials, AppError>;
}

/// Checks whether loaded session cookies are still accepted.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn check_cookies(&self, session: &Session) -> Result<bool, AppError>;
}

/// Resolves an email address to a person record.
#[async_trait]
pub trait PeopleLookup: Send + Sync {
    /// Returns `Ok(None)` when no account matches.
    async fn people_lookup(
        &self,
        session: &Session,
        email: &str,
        template: ParamsTemplate,
    ) -> Result<Option<PersonRecord>, AppError>;
}

/// Fetches map reviews and photos published by a person.
#[async_trait]
pub trait MapsFetcher: Send + Sync {
    async fn get_reviews(&self, session: &Session, person_id: &str)
        -> Result<MapsActivity, AppError>;
}

/// Fetches the public calendar tied to an email address.
#[async_trait]
pub trait CalendarFetcher: Send + Sync {
    /// Returns `Ok(None)` when no public calendar exists.
    async fn fetch_all(&self, session: &Session, email: &str)
        -> Result<Option<CalendarData>, AppError>;
}

/// Reverse geocoding of a single coordinate.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, position: Position) -> Result<Option<GeoAddress>, AppError>;
}

/// Turns review and photo coordinates into ranked location guesses.
#[async_trait]
pub trait LocationEstimator: Send + Sync {
    async fn estimate(
        &self,
        maps: &MapsActivity,
        radius_km: f64,
    ) -> Result<LocationEstimate, AppError>;
}

/// Host-side destination for assembled profiles.
#[async_trait]
pub trait ProfileSink: Send + Sync {
    async fn append_profile(&self, profile: &Profile) -> Result<(), AppError>;
}

/// Keeps appended profiles in memory.
#[derive(Default)]
pub struct MemoryProfileSink {
    profiles: Mutex<Vec<Profile>>,
}

impl MemoryProfileSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn profiles(&self) -> Vec<Profile> {
        self.profiles.lock().await.clone()
    }
}

#[async_trait]
impl ProfileSink for MemoryProfileSink {
    async fn append_profile(&self, profile: &Profile) -> Result<(), AppError> {
        self.profiles.lock().await.push(profile.clone());
        tracing::debug!("Profile appended to in-memory sink");
        Ok(())
    }
}
