//! PDS Backends
//!
//! Storage backends for the personal data store and the registry that maps
//! backend type names to backend handles.
//!
//! ## Architecture
//!
//! Every backend implements [`StorageBackend`]. The registry is populated
//! once at startup; the agent then resolves backends by type name at call
//! time:
//!
//! - **local**: In-memory, content-addressed, supports every optional capability
//! - **data_vault**: Remote vault over HTTP, mints its own identifiers
//!
//! ## Usage
//!
//! ```ignore
//! use pds_backends::{BackendRegistryBuilder, backends::*};
//!
//! let registry = BackendRegistryBuilder::new()
//!     .with_backend(LocalBackend::new())
//!     .with_backend(DataVaultBackend::new().with_api_url("https://vault.example"))
//!     .build();
//!
//! let backend = registry.get("local")?;
//! let dri = backend.save(r#"{"name":"alice"}"#, None).await?;
//! ```
//!
//! ## Optional capabilities
//!
//! Callers must probe [`StorageBackend::capabilities`] before calling an
//! optional operation and degrade gracefully when it is missing.

pub mod backend;
pub mod backends;
pub mod error;
pub mod registry;

pub use backend::{Capability, CapabilitySet, StorageBackend};
pub use error::{BackendError, Result};
pub use registry::{BackendRegistry, BackendRegistryBuilder};
