//! Bundled storage backends

pub mod data_vault;
pub mod local;

pub use data_vault::{DataVaultBackend, DATA_VAULT_BACKEND_TYPE};
pub use local::{LocalBackend, LOCAL_BACKEND_TYPE};
