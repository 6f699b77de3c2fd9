//! GHunt tool for OPSE
//!
//! This library resolves email addresses to Google accounts through the GHunt lookup
//! capability and folds what it finds (names, linked app accounts, a probable home
//! location) into OPSE profiles.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `config`: Configuration management.
//! - `credentials`: GHunt credentials and their load/validate lifecycle.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Postgres profile sink.
//! - `enrichment`: Hunt, location estimation and profile assembly.
//! - `errors`: Error handling types.
//! - `extraction`: Best-effort per-field extraction.
//! - `gateway_client`: GHunt sidecar client.
//! - `geocoding`: Reverse geocoding and distances.
//! - `handlers`: HTTP request handlers.
//! - `location`: Probable-location clustering.
//! - `lookup_models`: Records returned by the lookup capability.
//! - `models`: OPSE profile models.
//! - `services`: Collaborator traits.
//! - `session`: Scoped network sessions.
//! - `tool`: OPSE tool descriptor.

pub mod api;
pub mod core;
pub mod integrations;

pub mod config;
pub mod credentials;
pub mod db;
pub mod db_storage;
pub mod enrichment;
pub mod errors;
pub mod extraction;
pub mod gateway_client;
pub mod geocoding;
pub mod handlers;
pub mod location;
pub mod lookup_models;
pub mod models;
pub mod services;
pub mod session;
pub mod tool;
