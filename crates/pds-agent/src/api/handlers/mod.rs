//! API request handlers

pub mod inbound;
pub mod issue;
pub mod pds;
pub mod present;

pub use crate::agent::Agent as AppState;

pub use inbound::{add_connection, deliver_inbound, drain_outbox, list_connections, InboundRequest};
pub use issue::{issue_credential, request_credential, IssueCredentialRequest, RequestCredentialRequest};
pub use pds::{
    activate_backend, delete_payload, get_backends, get_from, get_settings, link_payloads, load_multiple,
    load_payload, save_keyed, save_payload, update_settings,
};
pub use present::{
    acknowledge_proof, list_exchanges, present_proof, request_presentation, AcknowledgeProofRequest,
    PresentProofRequest, RequestPresentationRequest,
};
