//! OPSE tool descriptor.

use crate::enrichment::EnrichmentReport;
use crate::errors::AppError;
use crate::models::Profile;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

/// Kinds of data a tool consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataTypeInput {
    Email,
}

/// Kinds of data a tool may add to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataTypeOutput {
    Account,
    Firstname,
    Middlename,
    Lastname,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolConfig {
    pub active: bool,
    pub deprecated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub config: ToolConfig,
    /// Input type -> whether it is required.
    pub inputs: BTreeMap<DataTypeInput, bool>,
    pub outputs: Vec<DataTypeOutput>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn config(&self) -> ToolConfig;

    fn input_data_types(&self) -> BTreeMap<DataTypeInput, bool>;

    fn output_data_types(&self) -> Vec<DataTypeOutput>;

    /// Enrich a copy of `profile` and hand it to the tool's sink.
    async fn execute(&self, profile: &Profile) -> Result<EnrichmentReport, AppError>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name(),
            config: self.config(),
            inputs: self.input_data_types(),
            outputs: self.output_data_types(),
        }
    }
}
