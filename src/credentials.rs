//! GHunt session credentials and their load/validate lifecycle.

use crate::errors::AppError;
use crate::services::{CredentialStore, SessionValidator};
use crate::session::Session;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Cookies that must all be present for the session to be usable.
pub const REQUIRED_COOKIES: [&str; 7] = [
    "SID",
    "SSID",
    "APISID",
    "SAPISID",
    "HSID",
    "LSID",
    "__Secure-3PSID",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AndroidCreds {
    #[serde(default)]
    pub master_token: Option<String>,
    #[serde(default)]
    pub authorization_tokens: HashMap<String, Value>,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub cookies: HashMap<String, String>,
    #[serde(default)]
    pub osids: HashMap<String, String>,
    #[serde(default)]
    pub android: AndroidCreds,
}

// Cookie values never end up in logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.cookies.keys().collect();
        names.sort();
        f.debug_struct("Credentials")
            .field("cookies", &names)
            .field("osids", &self.osids.len())
            .field("has_master_token", &self.android.master_token.is_some())
            .finish()
    }
}

impl Credentials {
    pub fn are_loaded(&self) -> bool {
        let cookies_ok = REQUIRED_COOKIES.iter().all(|name| {
            self.cookies
                .get(*name)
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false)
        });
        let token_ok = self
            .android
            .master_token
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false);
        cookies_ok && token_ok
    }
}

/// Reads the creds file written by `ghunt login` (base64-encoded JSON).
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Credentials, AppError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("No GHunt creds found at {}", self.path.display());
                return Ok(Credentials::default());
            }
            Err(e) => {
                return Err(AppError::Unauthenticated(format!(
                    "Failed to read creds file {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(raw.trim())
            .map_err(|e| AppError::Unauthenticated(format!("Creds file is not base64: {}", e)))?;

        let creds: Credentials = serde_json::from_slice(&decoded)
            .map_err(|e| AppError::Unauthenticated(format!("Creds file is malformed: {}", e)))?;

        tracing::debug!("Loaded GHunt creds from {}", self.path.display());
        Ok(creds)
    }
}

/// Credential lifecycle passed explicitly to every lookup.
///
/// Credentials are loaded fresh for each session, checked for completeness, then
/// validated against the cookie checker before the session is handed out.
#[derive(Clone)]
pub struct CredentialContext {
    store: Arc<dyn CredentialStore>,
    validator: Arc<dyn SessionValidator>,
    http_timeout: Duration,
}

impl CredentialContext {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        validator: Arc<dyn SessionValidator>,
        http_timeout: Duration,
    ) -> Self {
        Self {
            store,
            validator,
            http_timeout,
        }
    }

    /// Load credentials, fail with `Unauthenticated` if they are incomplete.
    pub async fn load(&self) -> Result<Credentials, AppError> {
        let creds = self.store.load().await?;
        if !creds.are_loaded() {
            return Err(AppError::Unauthenticated(
                "Creds aren't loaded. Are you logged in?".to_string(),
            ));
        }
        Ok(creds)
    }

    /// Load, open and validate a session. The session is released when dropped.
    pub async fn open_session(&self) -> Result<Session, AppError> {
        let creds = self.load().await?;
        let session = Session::open(creds, self.http_timeout)?;

        if !self.validator.check_cookies(&session).await? {
            return Err(AppError::StaleSession(
                "Seems like the cookies are invalid".to_string(),
            ));
        }

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn complete_creds() -> Credentials {
        Credentials {
            cookies: REQUIRED_COOKIES
                .iter()
                .map(|name| (name.to_string(), "value".to_string()))
                .collect(),
            osids: HashMap::new(),
            android: AndroidCreds {
                master_token: Some("aas_et/token".to_string()),
                authorization_tokens: HashMap::new(),
            },
        }
    }

    #[test]
    fn test_are_loaded_requires_every_cookie_and_token() {
        assert!(complete_creds().are_loaded());
        assert!(!Credentials::default().are_loaded());

        let mut creds = complete_creds();
        creds.cookies.remove("SAPISID");
        assert!(!creds.are_loaded());

        let mut creds = complete_creds();
        creds.android.master_token = Some("  ".to_string());
        assert!(!creds.are_loaded());
    }

    #[test]
    fn test_debug_hides_cookie_values() {
        let rendered = format!("{:?}", complete_creds());
        assert!(rendered.contains("SID"));
        assert!(!rendered.contains("value"));
        assert!(!rendered.contains("aas_et"));
    }

    #[tokio::test]
    async fn test_file_store_reads_base64_json() {
        let creds = complete_creds();
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(serde_json::to_vec(&creds).unwrap());
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", encoded).unwrap();

        let loaded = FileCredentialStore::new(file.path()).load().await.unwrap();
        assert_eq!(loaded, creds);
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = FileCredentialStore::new(dir.path().join("creds.m"))
            .load()
            .await
            .unwrap();
        assert!(!loaded.are_loaded());
    }

    #[tokio::test]
    async fn test_file_store_garbage_is_unauthenticated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not base64 at all!").unwrap();

        let err = FileCredentialStore::new(file.path()).load().await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }
}
