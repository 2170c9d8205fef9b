//! # where-its-at
//!
//! Service layer around the [`wia_search`] federated search core.
//!
//! This crate owns the pieces an application needs on top of the core:
//! a TOML configuration file with `WHEREITS_*` environment overrides,
//! tracing setup, and [`SearchService`], which validates requests before
//! they reach the [`wia_search::Aggregator`].
//!
//! Provider adapters are registered by the embedding application through
//! [`wia_search::SourceRegistry`].

pub mod config;
pub mod error;
pub mod logging;
pub mod service;

pub use config::{AppConfig, LoggingConfig, ServiceConfig};
pub use error::{AppError, Result};
pub use service::{AggregatorService, SearchService};
