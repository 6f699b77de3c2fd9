//! Best-effort field extraction from lookup results.
//!
//! Each field is read through [`Harvest::attempt`]: a failing rule yields `None`, logs a
//! warning tagged with the field, and is recorded so sibling fields keep going.

use crate::lookup_models::{FieldError, PersonRecord};
use crate::models::{OpseAddress, OpseStr, WebsiteAccount, GHUNT_DATA_SOURCE};
use crate::location::LocationEstimate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    FirstName,
    LastName,
    MiddleName,
    Accounts,
    Location,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Field::FirstName => "firstname",
            Field::LastName => "lastname",
            Field::MiddleName => "middlename",
            Field::Accounts => "accounts",
            Field::Location => "location",
        };
        f.write_str(tag)
    }
}

/// A field that could not be extracted for one email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFailure {
    pub email: String,
    pub field: Field,
    pub reason: String,
}

/// Collects extraction failures across a batch.
#[derive(Debug, Default)]
pub struct Harvest {
    failures: Vec<FieldFailure>,
}

impl Harvest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one extraction rule, turning its failure into a logged, recorded event.
    pub fn attempt<T, E, F>(&mut self, field: Field, email: &str, rule: F) -> Option<T>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        match rule() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("{} extraction failed for {}: {}", field, email, e);
                self.failures.push(FieldFailure {
                    email: email.to_string(),
                    field,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    pub fn failures(&self) -> &[FieldFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<FieldFailure> {
        self.failures
    }
}

pub fn first_name(record: &PersonRecord) -> Result<OpseStr, FieldError> {
    record
        .first_name()
        .map(|name| OpseStr::new(GHUNT_DATA_SOURCE, name))
}

pub fn last_name(record: &PersonRecord) -> Result<OpseStr, FieldError> {
    record
        .last_name()
        .map(|name| OpseStr::new(GHUNT_DATA_SOURCE, name))
}

/// Tokens of a full name between the first and the last one.
///
/// Whitespace heuristic: wrong for particles ("van der") and multi-word surnames.
pub fn split_middle_names(full_name: &str) -> Vec<&str> {
    let tokens: Vec<&str> = full_name.split_whitespace().collect();
    if tokens.len() <= 2 {
        return Vec::new();
    }
    tokens[1..tokens.len() - 1].to_vec()
}

pub fn middle_names(record: &PersonRecord) -> Result<Vec<OpseStr>, FieldError> {
    let full_name = record.full_name()?;
    Ok(split_middle_names(full_name)
        .into_iter()
        .map(|name| OpseStr::new(GHUNT_DATA_SOURCE, name))
        .collect())
}

/// One "Google <app>" account per in-app reachability entry, logged in as `email`.
pub fn linked_accounts(record: &PersonRecord, email: &str) -> Result<Vec<WebsiteAccount>, FieldError> {
    Ok(record
        .in_app_apps()?
        .into_iter()
        .map(|app| {
            let name = format!("Google {}", app);
            WebsiteAccount {
                website_url: name.clone(),
                website_name: name,
                login: email.to_string(),
            }
        })
        .collect())
}

/// Each probable location becomes a (possibly partial) address.
pub fn addresses(estimate: &LocationEstimate) -> Vec<OpseAddress> {
    estimate
        .locations
        .iter()
        .map(|loc| OpseAddress {
            data_source: GHUNT_DATA_SOURCE.to_string(),
            state_code: loc.avg.postcode.clone(),
            city: loc.avg.town.clone(),
            country: loc.avg.country.clone(),
        })
        .collect()
}
