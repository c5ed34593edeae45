//! harrier - orchestration core of a network-reconnaissance engine.
//!
//! harrier builds and supervises a pool of DNS resolvers, a bulk IP → ASN
//! lookup cache, a registry of pluggable data-source services, and one or
//! more graph storage backends, behind a single construct/run/shutdown
//! lifecycle.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`config`]: Configuration loading and validation
//! - [`dns`]: Resolver handles, capability probing, and pool composition
//! - [`net`]: CIDR math and the IP → ASN cache
//! - [`feed`]: The IP-range dataset feed
//! - [`graph`]: Graph storage backends
//! - [`source`]: Data-source services and their registry actor
//! - [`system`]: The orchestrator tying everything together
//! - [`error`]: Error types
//!
//! # Testing
//!
//! The seams between components are traits, so everything composes with
//! mock implementations and never needs the real network:
//!
//! ```rust
//! use harrier::source::RegistryHandle;
//!
//! // The registry actor serializes all access to the source list.
//! # async fn example() {
//! let registry = RegistryHandle::spawn();
//! assert!(registry.sources().await.is_empty());
//! # }
//! ```

pub mod config;
pub mod dns;
pub mod error;
pub mod feed;
pub mod graph;
pub mod limits;
pub mod metrics;
pub mod net;
pub mod source;
pub mod system;

pub use config::Config;
pub use error::{Error, Result};
pub use system::System;
