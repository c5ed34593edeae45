//! Error types for the harrier orchestration core.

use std::io;

use thiserror::Error;

use crate::dns::ResolveError;
use crate::feed::FeedError;
use crate::graph::StoreError;
use crate::source::{RegistryError, SourceError};

/// Main error type for harrier operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pool composition produced no usable resolvers, not even a fallback tier.
    #[error("the system was unable to build the pool of resolvers")]
    EmptyResolverPool,

    #[error("IP range feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("graph store error: {0}")]
    Store(#[from] StoreError),

    #[error("data source registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("data source error: {0}")]
    Source(#[from] SourceError),

    #[error("resolver error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("metrics error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("validation failed: {0}")]
    Validation(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
