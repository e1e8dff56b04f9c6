//! Proof presentation protocol types
//!
//! A verifier asks a prover to present a credential, then acknowledges the
//! presentation with a signed acknowledgment credential. Protocol order:
//!
//! ```text
//! request_sent → request_received → presentation_sent → presentation_received → acknowledged
//! ```
//!
//! Each agent only walks its own side of that chain:
//!
//! ```text
//! verifier: request_sent ──▶ presentation_received ──▶ acknowledged
//! prover:   request_received ──▶ presentation_sent ──▶ acknowledged
//! ```

use serde::{Deserialize, Serialize};

use crate::dri::Dri;
use crate::exchange::{ExchangeRecord, ExchangeRole, ExchangeState, Protocol};

/// Schema DRI stamped on acknowledgment credentials
pub const ACKNOWLEDGMENT_SCHEMA_DRI: &str = "bCN4tzZssT4sDDFFTh5AmoesdQeeTSyjNrQ6gxnCerkn";

/// Credential type of acknowledgment credentials
pub const ACKNOWLEDGMENT_CREDENTIAL_TYPE: &str = "ProofAcknowledgment";

/// Presentation exchange state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationState {
    RequestSent,
    RequestReceived,
    PresentationSent,
    PresentationReceived,
    Acknowledged,
}

impl ExchangeState for PresentationState {
    fn can_transition_to(&self, next: &Self) -> bool {
        use PresentationState::*;
        matches!(
            (self, next),
            (RequestSent, PresentationReceived)
                | (RequestReceived, PresentationSent)
                | (PresentationSent, Acknowledged)
                | (PresentationReceived, Acknowledged)
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, PresentationState::Acknowledged)
    }

    fn as_str(&self) -> &'static str {
        match self {
            PresentationState::RequestSent => "request_sent",
            PresentationState::RequestReceived => "request_received",
            PresentationState::PresentationSent => "presentation_sent",
            PresentationState::PresentationReceived => "presentation_received",
            PresentationState::Acknowledged => "acknowledged",
        }
    }

    fn all() -> &'static [Self] {
        &[
            PresentationState::RequestSent,
            PresentationState::RequestReceived,
            PresentationState::PresentationSent,
            PresentationState::PresentationReceived,
            PresentationState::Acknowledged,
        ]
    }
}

/// Role of this agent in a presentation exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationRole {
    /// Sends the request and later acknowledges
    Verifier,
    /// Receives the request and sends the presentation
    Prover,
}

impl ExchangeRole for PresentationRole {
    fn as_str(&self) -> &'static str {
        match self {
            PresentationRole::Verifier => "verifier",
            PresentationRole::Prover => "prover",
        }
    }
}

/// What the verifier asks the prover to present
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationRequest {
    /// Attribute names the presentation must disclose
    #[serde(default)]
    pub requested_attributes: Vec<String>,

    /// Schema the presented credential must conform to
    pub schema_base_dri: String,

    /// Optional required issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_did: Option<String>,
}

/// Presentation record payload
///
/// Large artifacts live in the PDS; only their DRIs are kept here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_request: Option<PresentationRequest>,

    /// Usage policy the verifier attached to its request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_usage_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_dri: Option<Dri>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prover_public_did: Option<String>,

    /// Usage policy the prover attached to its presentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prover_usage_policy: Option<String>,

    /// Result of matching the two usage policies, when both were known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_policies_match: Option<bool>,

    /// Verifier's verdict, recorded on acknowledgment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledgment_credential_dri: Option<Dri>,
}

/// Proof presentation protocol marker
#[derive(Debug, Clone, Copy)]
pub struct Presentation;

impl Protocol for Presentation {
    const NAME: &'static str = "present-proof";

    type State = PresentationState;
    type Role = PresentationRole;
    type Payload = PresentationPayload;
}

/// Persisted presentation exchange
pub type PresentationExchange = ExchangeRecord<Presentation>;
