use crate::errors::AppError;
use crate::lookup_models::{
    CalendarData, CalendarDetails, CalendarEvent, MapsActivity, ParamsTemplate, PersonRecord,
};
use crate::services::{CalendarFetcher, MapsFetcher, PeopleLookup, SessionValidator};
use crate::session::Session;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

/// Client for the GHunt sidecar, which exposes the lookup library over HTTP.
///
/// Each call travels on the caller's [`Session`] and carries its credentials in the
/// request body.
#[derive(Clone)]
pub struct GhuntGatewayClient {
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct AuthCheckResponse {
    valid: bool,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    found: bool,
    #[serde(default)]
    person: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    found: bool,
    #[serde(default)]
    details: CalendarDetails,
    #[serde(default)]
    events: Vec<CalendarEvent>,
}

impl GhuntGatewayClient {
    /// Creates a new `GhuntGatewayClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the GHunt sidecar.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
        body: Value,
        what: &str,
    ) -> Result<T, AppError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GHunt gateway {} -> {}", what, url);

        let response = session
            .http()
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("GHunt {} request failed: {}", what, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("GHunt gateway returned error {} for {}: {}", status, what, error_text);
            return Err(AppError::ExternalApiError(format!(
                "GHunt {} returned {}: {}",
                what, status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse GHunt {} response: {}", what, e))
        })
    }
}

#[async_trait]
impl SessionValidator for GhuntGatewayClient {
    async fn check_cookies(&self, session: &Session) -> Result<bool, AppError> {
        let body = json!({ "cookies": session.credentials().cookies });
        let result: AuthCheckResponse = self
            .post_json(session, "/auth/check", body, "cookie check")
            .await?;
        Ok(result.valid)
    }
}

#[async_trait]
impl PeopleLookup for GhuntGatewayClient {
    async fn people_lookup(
        &self,
        session: &Session,
        email: &str,
        template: ParamsTemplate,
    ) -> Result<Option<PersonRecord>, AppError> {
        let body = json!({
            "creds": session.credentials(),
            "email": email,
            "params_template": template,
        });
        let result: LookupResponse = self
            .post_json(session, "/people/lookup", body, "people lookup")
            .await?;

        match (result.found, result.person) {
            (true, Some(person)) => Ok(Some(PersonRecord::new(person))),
            (true, None) => Err(AppError::ExternalApiError(
                "GHunt people lookup reported a match without a person record".to_string(),
            )),
            (false, _) => Ok(None),
        }
    }
}

#[async_trait]
impl MapsFetcher for GhuntGatewayClient {
    async fn get_reviews(
        &self,
        session: &Session,
        person_id: &str,
    ) -> Result<MapsActivity, AppError> {
        let body = json!({
            "creds": session.credentials(),
            "person_id": person_id,
        });
        self.post_json(session, "/maps/reviews", body, "maps reviews")
            .await
    }
}

#[async_trait]
impl CalendarFetcher for GhuntGatewayClient {
    async fn fetch_all(
        &self,
        session: &Session,
        email: &str,
    ) -> Result<Option<CalendarData>, AppError> {
        let body = json!({
            "creds": session.credentials(),
            "email": email,
        });
        let result: CalendarResponse = self
            .post_json(session, "/calendar", body, "calendar")
            .await?;

        if !result.found {
            return Ok(None);
        }
        Ok(Some(CalendarData {
            details: result.details,
            events: result.events,
        }))
    }
}
