use crate::credentials::Credentials;
use crate::errors::AppError;
use std::time::Duration;

/// Network session used for one lookup operation.
///
/// Owns the HTTP connection pool and the credentials it was opened with. Dropping the
/// session closes its connections, so a session scoped to an operation is released on
/// every exit path.
pub struct Session {
    http: reqwest::Client,
    creds: Credentials,
}

impl Session {
    pub fn open(creds: Credentials, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ExternalApiError(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!("GHunt session opened");
        Ok(Self { http, creds })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn credentials(&self) -> &Credentials {
        &self.creds
    }

    /// Explicitly end the session.
    pub fn close(self) {}
}

impl Drop for Session {
    fn drop(&mut self) {
        tracing::debug!("GHunt session closed");
    }
}
