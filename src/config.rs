use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_NOMINATIM_USER_AGENT: &str = "nominatim";
pub const DEFAULT_GMAPS_RADIUS_KM: f64 = 30.0;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
/// Public Nominatim usage policy: at most one request per second.
pub const PUBLIC_NOMINATIM_MIN_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub ghunt_gateway_url: String,
    pub ghunt_creds_path: PathBuf,
    pub nominatim_base_url: String,
    pub nominatim_user_agent: String,
    /// Minimum spacing between uncached reverse-geocoding requests.
    pub nominatim_min_interval_ms: u64,
    pub gmaps_radius_km: f64,
    pub http_timeout_secs: u64,
    pub database_url: Option<String>, // Profiles are kept in memory when unset
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let nominatim_base_url = validate_http_url(
            "NOMINATIM_BASE_URL",
            std::env::var("NOMINATIM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_NOMINATIM_BASE_URL.to_string()),
        )?;

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            ghunt_gateway_url: std::env::var("GHUNT_GATEWAY_URL")
                .map_err(|_| anyhow::anyhow!("GHUNT_GATEWAY_URL environment variable required"))
                .and_then(|url| validate_http_url("GHUNT_GATEWAY_URL", url))?,
            ghunt_creds_path: match std::env::var("GHUNT_CREDS_PATH") {
                Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
                _ => default_creds_path()?,
            },
            nominatim_min_interval_ms: match std::env::var("NOMINATIM_MIN_INTERVAL_MS") {
                Ok(raw) => raw.parse().map_err(|_| {
                    anyhow::anyhow!("NOMINATIM_MIN_INTERVAL_MS must be a whole number")
                })?,
                Err(_) => default_nominatim_interval_ms(&nominatim_base_url),
            },
            nominatim_base_url,
            nominatim_user_agent: std::env::var("NOMINATIM_USER_AGENT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_NOMINATIM_USER_AGENT.to_string()),
            gmaps_radius_km: match std::env::var("GMAPS_RADIUS_KM") {
                Ok(raw) => {
                    let radius: f64 = raw
                        .parse()
                        .map_err(|_| anyhow::anyhow!("GMAPS_RADIUS_KM must be a number"))?;
                    if !radius.is_finite() || radius <= 0.0 {
                        anyhow::bail!("GMAPS_RADIUS_KM must be greater than 0");
                    }
                    radius
                }
                Err(_) => DEFAULT_GMAPS_RADIUS_KM,
            },
            http_timeout_secs: match std::env::var("HTTP_TIMEOUT_SECS") {
                Ok(raw) => {
                    let secs: u64 = raw
                        .parse()
                        .map_err(|_| anyhow::anyhow!("HTTP_TIMEOUT_SECS must be a whole number"))?;
                    if secs == 0 {
                        anyhow::bail!("HTTP_TIMEOUT_SECS must be greater than 0");
                    }
                    secs
                }
                Err(_) => DEFAULT_HTTP_TIMEOUT_SECS,
            },
            database_url: match std::env::var("DATABASE_URL") {
                Ok(url) if !url.trim().is_empty() => {
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Some(url)
                }
                _ => None,
            },
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("GHunt gateway URL: {}", config.ghunt_gateway_url);
        tracing::debug!("GHunt creds path: {}", config.ghunt_creds_path.display());
        tracing::debug!("Nominatim base URL: {}", config.nominatim_base_url);
        tracing::debug!(
            "Nominatim request spacing: {} ms",
            config.nominatim_min_interval_ms
        );
        tracing::debug!("Maps clustering radius: {} km", config.gmaps_radius_km);
        if config.database_url.is_some() {
            tracing::info!("Postgres profile sink configured");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

/// Location of the creds file written by `ghunt login`.
fn default_creds_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        anyhow::anyhow!("GHUNT_CREDS_PATH not set and home directory could not be resolved")
    })?;
    Ok(home.join(".malfrats").join("ghunt").join("creds.m"))
}

/// The public instance is throttled; self-hosted instances are not by default.
fn default_nominatim_interval_ms(base_url: &str) -> u64 {
    if base_url == DEFAULT_NOMINATIM_BASE_URL {
        PUBLIC_NOMINATIM_MIN_INTERVAL_MS
    } else {
        0
    }
}

fn validate_http_url(name: &str, url: String) -> anyhow::Result<String> {
    if url.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    url::Url::parse(&url).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    Ok(url.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_url_trims_trailing_slash() {
        let url = validate_http_url("X", "https://ghunt.local/".to_string()).unwrap();
        assert_eq!(url, "https://ghunt.local");
    }

    #[test]
    fn test_public_nominatim_is_throttled_by_default() {
        assert_eq!(
            default_nominatim_interval_ms(DEFAULT_NOMINATIM_BASE_URL),
            PUBLIC_NOMINATIM_MIN_INTERVAL_MS
        );
        assert_eq!(default_nominatim_interval_ms("http://localhost:8080"), 0);
    }

    #[test]
    fn test_validate_http_url_rejects_other_schemes() {
        assert!(validate_http_url("X", "ftp://ghunt.local".to_string()).is_err());
        assert!(validate_http_url("X", "   ".to_string()).is_err());
    }
}
