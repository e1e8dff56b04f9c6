//! # PDS Core
//!
//! Core types for the personal data store and the exchange protocols built
//! on top of it. No I/O happens in this crate.
//!
//! ## Key Concepts
//!
//! - **DRI**: Content-derived identifier of a stored payload
//! - **Routing Entry**: Which backend type holds the payload behind a DRI
//! - **Exchange Record**: Persisted state of one protocol run, correlated by thread id
//! - **Protocol Message**: Typed agent-to-agent message carried in an envelope
//!
//! ## Invariants
//!
//! 1. **Content addressing**: A DRI is a pure function of the payload bytes
//! 2. **Closed transitions**: Exchange states only move along their protocol's table
//! 3. **Guard before mutate**: A rejected transition never changes a record

pub mod dri;
pub mod error;
pub mod exchange;
pub mod issuance;
pub mod message;
pub mod presentation;
pub mod types;

pub use dri::{Dri, REFERENCE_TAG};
pub use error::{PdsError, Result};
pub use exchange::{ExchangeQuery, ExchangeRecord, ExchangeRole, ExchangeState, Initiator, Protocol};
pub use issuance::{CredentialExchange, CredentialRequest, Issuance, IssuancePayload, IssuanceRole, IssuanceState};
pub use message::{Envelope, ProtocolMessage};
pub use presentation::{
    Presentation, PresentationExchange, PresentationPayload, PresentationRequest, PresentationRole,
    PresentationState,
};
pub use types::{decode_lenient, BackendSettings, LoadedRecord, RawRecord, RoutingEntry, StoredRecord};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the library version
pub fn version() -> &'static str {
    VERSION
}
