//! mirrorsync — an active/standby replicator between two logically
//! identical document-store databases, plus their associated
//! authentication-directory user sets.
//!
//! The [`coordinator::Coordinator`] is the entry point: it composes a
//! [`document_replicator`], an [`auth_replicator`], a [`health::HealthMonitor`]
//! and a [`reconciler`] behind one serialized run lock, gated by the health
//! snapshot, and persists its watermarks and counters to a stats file.

pub mod auth_replicator;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod document_replicator;
pub mod error;
pub mod events;
pub mod gateway;
pub mod health;
pub mod http_server;
pub mod observability;
pub mod reconciler;
pub mod schema_tracker;
