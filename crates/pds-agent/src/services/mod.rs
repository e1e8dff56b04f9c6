//! Collaborators of the exchange protocols
//!
//! The protocols never talk to the network, sign anything or pick a
//! storage location themselves. They go through these traits:
//!
//! - [`Transport`]: connection lookup and outbound delivery
//! - [`Issuer`]: credential creation
//! - [`Holder`]: credential storage and presentation creation
//! - [`UsagePolicyMatcher`]: usage-policy compatibility checks

pub mod holder;
pub mod issuer;
pub mod policy;
pub mod transport;

pub use holder::{Holder, PdsHolder, CREDENTIALS_TABLE};
pub use issuer::{Issuer, PlainIssuer};
pub use policy::{HttpPolicyMatcher, PolicyVerdict, UsagePolicyMatcher, DEFAULT_POLICY_MATCH_URL};
pub use transport::{require_connection, Connection, OutboundMessage, OutboxTransport, Transport};
