use serde::{Deserialize, Serialize};

/// Provenance tag attached to every value this tool produces.
pub const GHUNT_DATA_SOURCE: &str = "GHunt";

// ============ Host Framework Models ============

/// A string value tagged with the system that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpseStr {
    /// Source system (e.g., "GHunt").
    pub data_source: String,
    /// The value itself.
    pub str_value: String,
}

impl OpseStr {
    pub fn new(data_source: impl Into<String>, str_value: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            str_value: str_value.into(),
        }
    }
}

/// A tagged, possibly partial, postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpseAddress {
    /// Source system (e.g., "GHunt").
    pub data_source: String,
    /// State or region code.
    pub state_code: Option<String>,
    /// City or town.
    pub city: Option<String>,
    /// Country name.
    pub country: Option<String>,
}

/// An account on an external website or app linked to the profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteAccount {
    /// URL (or label) of the website.
    pub website_url: String,
    /// Display name of the website.
    pub website_name: String,
    /// Login used on the website.
    pub login: String,
}

/// Aggregated identity record enriched by OPSE tools.
///
/// Tools work on a clone and only ever add to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// First name, if known.
    #[serde(default)]
    pub firstname: Option<OpseStr>,
    /// Last name, if known.
    #[serde(default)]
    pub lastname: Option<OpseStr>,
    /// Middle names.
    #[serde(default)]
    pub middlenames: Vec<OpseStr>,
    /// Email addresses known for the target.
    #[serde(default)]
    pub emails: Vec<String>,
    /// Linked website accounts.
    #[serde(default)]
    pub accounts: Vec<WebsiteAccount>,
    /// Known or inferred addresses.
    #[serde(default)]
    pub addresses: Vec<OpseAddress>,
}

impl Profile {
    pub fn with_emails<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            emails: emails.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn emails(&self) -> &[String] {
        &self.emails
    }

    pub fn set_firstname(&mut self, firstname: OpseStr) {
        self.firstname = Some(firstname);
    }

    pub fn set_lastname(&mut self, lastname: OpseStr) {
        self.lastname = Some(lastname);
    }

    pub fn extend_middlenames(&mut self, middlenames: impl IntoIterator<Item = OpseStr>) {
        self.middlenames.extend(middlenames);
    }

    pub fn extend_accounts(&mut self, accounts: impl IntoIterator<Item = WebsiteAccount>) {
        self.accounts.extend(accounts);
    }

    pub fn extend_addresses(&mut self, addresses: impl IntoIterator<Item = OpseAddress>) {
        self.addresses.extend(addresses);
    }
}

// ============ API Request/Response Models ============

/// Request payload carrying a single email address.
#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Request payload for enriching a whole profile.
#[derive(Debug, Deserialize)]
pub struct EnrichRequest {
    pub profile: Profile,
}
