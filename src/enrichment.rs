/// GHunt enrichment workflow
///
/// For every email of a profile:
/// 1. Open a validated session and hunt the Google account (profile, maps, calendar)
/// 2. Harvest names and linked accounts, each field independently
/// 3. Estimate the probable location in its own session
/// 4. Merge everything into a clone of the profile and hand it to the sink
use crate::config::Config;
use crate::credentials::{CredentialContext, FileCredentialStore};
use crate::errors::{AppError, ResultExt};
use crate::extraction::{self, Field, FieldFailure, Harvest};
use crate::gateway_client::GhuntGatewayClient;
use crate::geocoding::NominatimGeocoder;
use crate::location::{LocationEstimate, RadiusClusterEstimator};
use crate::lookup_models::{HuntResult, ParamsTemplate, PersonRecord, PROFILE_CONTAINER};
use crate::models::{OpseAddress, OpseStr, Profile, WebsiteAccount};
use crate::services::{
    CalendarFetcher, CredentialStore, LocationEstimator, MapsFetcher, PeopleLookup, ProfileSink,
    SessionValidator,
};
use crate::session::Session;
use crate::tool::{DataTypeInput, DataTypeOutput, Tool, ToolConfig};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Where a single email ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LookupState {
    Found,
    NotFound,
    Unsupported { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailOutcome {
    pub email: String,
    #[serde(flatten)]
    pub state: LookupState,
}

/// Result of one `execute` run.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentReport {
    pub profile: Profile,
    pub emails: Vec<EmailOutcome>,
    pub failures: Vec<FieldFailure>,
}

/// Values gathered across all emails of a batch.
#[derive(Debug, Default)]
pub struct Accumulators {
    pub first_names: Vec<OpseStr>,
    pub last_names: Vec<OpseStr>,
    pub middle_names: Vec<OpseStr>,
    pub accounts: Vec<WebsiteAccount>,
    pub addresses: Vec<OpseAddress>,
}

impl Accumulators {
    /// Harvest the name and account fields of one person record.
    pub fn harvest_record(&mut self, harvest: &mut Harvest, record: &PersonRecord, email: &str) {
        if let Some(name) = harvest.attempt(Field::FirstName, email, || extraction::first_name(record)) {
            self.first_names.push(name);
        }
        if let Some(name) = harvest.attempt(Field::LastName, email, || extraction::last_name(record)) {
            self.last_names.push(name);
        }
        if let Some(names) =
            harvest.attempt(Field::MiddleName, email, || extraction::middle_names(record))
        {
            self.middle_names.extend(names);
        }
        if let Some(accounts) = harvest.attempt(Field::Accounts, email, || {
            extraction::linked_accounts(record, email)
        }) {
            self.accounts.extend(accounts);
        }
    }

    /// Merge into a clone of `base`. When several names were found the first one wins.
    pub fn assemble(self, base: &Profile) -> Profile {
        let mut profile = base.clone();
        profile.extend_accounts(self.accounts);
        if let Some(first) = self.first_names.into_iter().next() {
            profile.set_firstname(first);
        }
        if let Some(last) = self.last_names.into_iter().next() {
            profile.set_lastname(last);
        }
        profile.extend_middlenames(self.middle_names);
        profile.extend_addresses(self.addresses);
        profile
    }
}

/// External capabilities the tool is wired to.
pub struct Collaborators {
    pub credentials: Arc<dyn CredentialStore>,
    pub validator: Arc<dyn SessionValidator>,
    pub people: Arc<dyn PeopleLookup>,
    pub maps: Arc<dyn MapsFetcher>,
    pub calendar: Arc<dyn CalendarFetcher>,
    pub locator: Arc<dyn LocationEstimator>,
    pub sink: Arc<dyn ProfileSink>,
}

#[derive(Debug, Clone, Copy)]
pub struct HuntSettings {
    pub radius_km: f64,
    pub http_timeout: Duration,
}

/// GHunt tool: resolves emails to Google accounts and enriches OPSE profiles.
pub struct GhuntTool {
    credentials: CredentialContext,
    people: Arc<dyn PeopleLookup>,
    maps: Arc<dyn MapsFetcher>,
    calendar: Arc<dyn CalendarFetcher>,
    locator: Arc<dyn LocationEstimator>,
    sink: Arc<dyn ProfileSink>,
    radius_km: f64,
}

impl GhuntTool {
    pub fn new(collaborators: Collaborators, settings: HuntSettings) -> Self {
        Self {
            credentials: CredentialContext::new(
                collaborators.credentials,
                collaborators.validator,
                settings.http_timeout,
            ),
            people: collaborators.people,
            maps: collaborators.maps,
            calendar: collaborators.calendar,
            locator: collaborators.locator,
            sink: collaborators.sink,
            radius_km: settings.radius_km,
        }
    }

    /// Wire the tool to the GHunt gateway, the creds file and Nominatim.
    pub fn from_config(config: &Config, sink: Arc<dyn ProfileSink>) -> Result<Self, AppError> {
        let http_timeout = Duration::from_secs(config.http_timeout_secs);
        let gateway = Arc::new(GhuntGatewayClient::new(config.ghunt_gateway_url.clone()));
        let geocoder = Arc::new(
            NominatimGeocoder::new(
                config.nominatim_base_url.clone(),
                config.nominatim_user_agent.clone(),
                http_timeout,
            )?
            .with_min_interval(Duration::from_millis(config.nominatim_min_interval_ms)),
        );

        Ok(Self::new(
            Collaborators {
                credentials: Arc::new(FileCredentialStore::new(config.ghunt_creds_path.clone())),
                validator: gateway.clone(),
                people: gateway.clone(),
                maps: gateway.clone(),
                calendar: gateway,
                locator: Arc::new(RadiusClusterEstimator::new(geocoder)),
                sink,
            },
            HuntSettings {
                radius_km: config.gmaps_radius_km,
                http_timeout,
            },
        ))
    }

    /// Resolve an email to its Google account profile, maps activity and calendar.
    ///
    /// Returns `Ok(None)` when no account matches. Fails with `UnsupportedAccountType`
    /// when the account has no public profile container.
    pub async fn hunt(&self, email: &str) -> Result<Option<HuntResult>, AppError> {
        let session = self.credentials.open_session().await?;
        let result = self.hunt_in(&session, email).await;
        session.close();
        result
    }

    async fn hunt_in(&self, session: &Session, email: &str) -> Result<Option<HuntResult>, AppError> {
        let Some(target) = self
            .people
            .people_lookup(session, email, ParamsTemplate::MaxDetails)
            .await
            .context("people lookup")?
        else {
            tracing::debug!("No Google account found for {}", email);
            return Ok(None);
        };

        if !target.has_container(PROFILE_CONTAINER) {
            return Err(AppError::UnsupportedAccountType(
                "Given information does not match a public Google Account".to_string(),
            ));
        }

        let person_id = person_id(&target)?;
        let maps = self
            .maps
            .get_reviews(session, &person_id)
            .await
            .context("maps reviews")?;
        let calendar = self
            .calendar
            .fetch_all(session, email)
            .await
            .context("calendar")?;

        tracing::info!(
            "Hunted {}: {} review(s), {} photo(s), calendar {}",
            email,
            maps.reviews.len(),
            maps.photos.len(),
            if calendar.is_some() { "found" } else { "not found" }
        );

        Ok(Some(HuntResult {
            profile: target,
            maps,
            calendar,
        }))
    }

    /// Estimate where the account owner lives from their map reviews and photos.
    ///
    /// Returns `Ok(None)` when the account is unknown, its reviews are private or
    /// there is nothing to cluster.
    pub async fn probable_location(
        &self,
        email: &str,
    ) -> Result<Option<LocationEstimate>, AppError> {
        let session = self.credentials.open_session().await?;
        let result = self.locate_in(&session, email).await;
        session.close();
        result
    }

    async fn locate_in(
        &self,
        session: &Session,
        email: &str,
    ) -> Result<Option<LocationEstimate>, AppError> {
        let Some(target) = self
            .people
            .people_lookup(session, email, ParamsTemplate::MaxDetails)
            .await
            .context("people lookup")?
        else {
            return Ok(None);
        };

        let person_id = person_id(&target)?;
        let maps = self
            .maps
            .get_reviews(session, &person_id)
            .await
            .context("maps reviews")?;

        if !maps.is_locatable() {
            tracing::debug!("Maps activity of {} is private or empty ({:?})", email, maps.status);
            return Ok(None);
        }

        let estimate = self.locator.estimate(&maps, self.radius_km).await?;
        if estimate.locations.is_empty() {
            return Ok(None);
        }

        tracing::info!(
            "Located {} in {} area(s), confidence {:.2}",
            email,
            estimate.locations.len(),
            estimate.confidence.score
        );
        Ok(Some(estimate))
    }

    /// Enrich a clone of `base` from every email it carries.
    ///
    /// A failing email is logged and skipped; only a sink failure aborts the run.
    pub async fn execute(&self, base: &Profile) -> Result<EnrichmentReport, AppError> {
        let mut harvest = Harvest::new();
        let mut acc = Accumulators::default();
        let mut outcomes = Vec::with_capacity(base.emails().len());

        for email in base.emails() {
            if !is_valid_email(email) {
                outcomes.push(EmailOutcome {
                    email: email.clone(),
                    state: LookupState::Failed {
                        reason: format!("Malformed email address: {}", email),
                    },
                });
                continue;
            }

            let state = match self.hunt(email).await {
                Ok(Some(result)) => {
                    acc.harvest_record(&mut harvest, &result.profile, email);

                    let located = self.probable_location(email).await;
                    if let Some(Some(estimate)) = harvest.attempt(Field::Location, email, || located) {
                        acc.addresses.extend(extraction::addresses(&estimate));
                    }
                    LookupState::Found
                }
                Ok(None) => {
                    tracing::info!("No Google account for {}", email);
                    LookupState::NotFound
                }
                Err(e) if e.is_benign() => {
                    tracing::info!("Skipping {}: {}", email, e);
                    LookupState::Unsupported {
                        reason: e.to_string(),
                    }
                }
                Err(e) => {
                    // Might be an error during the request
                    tracing::error!("GHunt lookup failed for {}: {}", email, e);
                    LookupState::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            outcomes.push(EmailOutcome {
                email: email.clone(),
                state,
            });
        }

        let profile = acc.assemble(base);
        self.sink
            .append_profile(&profile)
            .await
            .context("append profile")?;

        Ok(EnrichmentReport {
            profile,
            emails: outcomes,
            failures: harvest.into_failures(),
        })
    }
}

fn person_id(record: &PersonRecord) -> Result<String, AppError> {
    record
        .person_id()
        .map(str::to_string)
        .map_err(|e| AppError::ExternalApiError(format!("Person record has no usable id: {}", e)))
}

#[async_trait]
impl Tool for GhuntTool {
    fn name(&self) -> &'static str {
        "GHunt"
    }

    fn config(&self) -> ToolConfig {
        ToolConfig {
            active: true,
            deprecated: false,
        }
    }

    fn input_data_types(&self) -> BTreeMap<DataTypeInput, bool> {
        BTreeMap::from([(DataTypeInput::Email, true)])
    }

    fn output_data_types(&self) -> Vec<DataTypeOutput> {
        vec![
            DataTypeOutput::Account,
            DataTypeOutput::Firstname,
            DataTypeOutput::Middlename,
            DataTypeOutput::Lastname,
        ]
    }

    async fn execute(&self, profile: &Profile) -> Result<EnrichmentReport, AppError> {
        GhuntTool::execute(self, profile).await
    }
}

/// Validate email format
pub fn is_valid_email(email: &str) -> bool {
    // Basic checks
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    // RFC 5322 simplified email regex
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let email_regex = EMAIL_RE.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .expect("email regex is valid")
    });

    if !email_regex.is_match(email) {
        tracing::warn!("Invalid email format: {}", email);
        return false;
    }

    true
}
