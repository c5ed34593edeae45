//! Pluggable data-source services and their registry.

pub mod registry;

use async_trait::async_trait;

pub use registry::{RegistryError, RegistryHandle};

/// Error type for data-source lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("data source {name} failed to start: {reason}")]
    Start { name: String, reason: String },

    #[error("data source {name} failed to stop: {reason}")]
    Stop { name: String, reason: String },
}

/// A pluggable data-source service.
///
/// Sources are created externally, registered with the system, started on
/// registration or in bulk, and stopped at system shutdown. The trait is
/// object-safe so heterogeneous sources can share the registry.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Start the service. Called at most once before `stop`.
    async fn start(&self) -> Result<(), SourceError>;

    /// Stop the service. Errors are discarded during shutdown.
    async fn stop(&self) -> Result<(), SourceError>;

    /// Service name; the registry keeps its list sorted by this.
    fn name(&self) -> &str;
}
