//! Records returned by the GHunt lookup capability.
//!
//! The person record comes from an externally defined, weakly typed schema, so it is
//! kept as decoded JSON and read through named accessors that report *why* a field is
//! unavailable instead of failing the whole record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Container holding data of a public consumer Google account.
pub const PROFILE_CONTAINER: &str = "PROFILE";

/// Why a field could not be read from a [`PersonRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// A key along the path is absent (or null).
    Missing(String),
    /// The value at the path has an unexpected JSON type.
    WrongType { path: String, expected: &'static str },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Missing(path) => write!(f, "missing key '{}'", path),
            FieldError::WrongType { path, expected } => {
                write!(f, "'{}' is not {}", path, expected)
            }
        }
    }
}

impl std::error::Error for FieldError {}

/// Person record as encoded by the lookup library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonRecord(Value);

impl PersonRecord {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn person_id(&self) -> Result<&str, FieldError> {
        self.str_at(&["personId"])
    }

    /// Names of the containers this record was assembled from.
    pub fn source_ids(&self) -> Result<Vec<&str>, FieldError> {
        let path = ["sourceIds"];
        let items = self.value_at(&path)?.as_array().ok_or_else(|| FieldError::WrongType {
            path: join(&path),
            expected: "an array",
        })?;
        items
            .iter()
            .map(|item| {
                item.as_str().ok_or_else(|| FieldError::WrongType {
                    path: join(&path),
                    expected: "an array of strings",
                })
            })
            .collect()
    }

    /// Whether the record carries the given container. Unreadable `sourceIds` count as absent.
    pub fn has_container(&self, container: &str) -> bool {
        self.source_ids()
            .map(|ids| ids.contains(&container))
            .unwrap_or(false)
    }

    pub fn first_name(&self) -> Result<&str, FieldError> {
        self.str_at(&["names", PROFILE_CONTAINER, "firstName"])
    }

    pub fn last_name(&self) -> Result<&str, FieldError> {
        self.str_at(&["names", PROFILE_CONTAINER, "lastName"])
    }

    pub fn full_name(&self) -> Result<&str, FieldError> {
        self.str_at(&["names", PROFILE_CONTAINER, "fullname"])
    }

    /// Apps through which the account can be reached (e.g. "Maps", "Photos").
    pub fn in_app_apps(&self) -> Result<Vec<&str>, FieldError> {
        let path = ["inAppReachability", PROFILE_CONTAINER, "apps"];
        let items = self.value_at(&path)?.as_array().ok_or_else(|| FieldError::WrongType {
            path: join(&path),
            expected: "an array",
        })?;
        items
            .iter()
            .map(|item| {
                item.as_str().ok_or_else(|| FieldError::WrongType {
                    path: join(&path),
                    expected: "an array of strings",
                })
            })
            .collect()
    }

    fn value_at(&self, path: &[&str]) -> Result<&Value, FieldError> {
        let mut current = &self.0;
        for (depth, key) in path.iter().enumerate() {
            let object = current.as_object().ok_or_else(|| FieldError::WrongType {
                path: join(&path[..depth]),
                expected: "an object",
            })?;
            current = match object.get(*key) {
                Some(Value::Null) | None => {
                    return Err(FieldError::Missing(join(&path[..=depth])))
                }
                Some(value) => value,
            };
        }
        Ok(current)
    }

    fn str_at(&self, path: &[&str]) -> Result<&str, FieldError> {
        self.value_at(path)?
            .as_str()
            .ok_or_else(|| FieldError::WrongType {
                path: join(path),
                expected: "a string",
            })
    }
}

fn join(path: &[&str]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}

/// Parameter template forwarded to the people lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamsTemplate {
    JustGaiaId,
    MaxDetails,
}

// ============ Maps ============

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    /// Finite and within WGS84 latitude/longitude bounds.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapsLocation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapsReview {
    pub id: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<MapsLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapsPhoto {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<MapsLocation>,
}

/// Outcome flag reported alongside the reviews fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewsStatus {
    #[default]
    Ok,
    Empty,
    Private,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapsActivity {
    #[serde(default)]
    pub status: ReviewsStatus,
    #[serde(default)]
    pub stats: HashMap<String, u64>,
    #[serde(default)]
    pub reviews: Vec<MapsReview>,
    #[serde(default)]
    pub photos: Vec<MapsPhoto>,
}

impl MapsActivity {
    /// Whether there is anything a location could be inferred from.
    pub fn is_locatable(&self) -> bool {
        !matches!(self.status, ReviewsStatus::Private | ReviewsStatus::Empty)
            && !(self.reviews.is_empty() && self.photos.is_empty())
    }

    /// Valid positions of every review and photo that has one.
    pub fn positions(&self) -> Vec<Position> {
        self.reviews
            .iter()
            .filter_map(|r| r.location.as_ref())
            .chain(self.photos.iter().filter_map(|p| p.location.as_ref()))
            .filter_map(|l| l.position)
            .filter(Position::is_valid)
            .collect()
    }
}

// ============ Calendar ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarDetails {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarData {
    pub details: CalendarDetails,
    pub events: Vec<CalendarEvent>,
}

// ============ Hunt ============

/// Everything `hunt` learned about one email address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuntResult {
    pub profile: PersonRecord,
    pub maps: MapsActivity,
    /// Present only when a public calendar was found.
    pub calendar: Option<CalendarData>,
}
