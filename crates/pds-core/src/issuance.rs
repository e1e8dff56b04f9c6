//! Credential issuance protocol types
//!
//! Two agents, a holder who asks for a credential and an issuer who signs
//! it. Each side keeps its own record for the same thread:
//!
//! ```text
//! holder:  request_sent ──(credential-issue received)──▶ issued
//! issuer:  request_sent ──(issue_credential)───────────▶ issued
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dri::Dri;
use crate::exchange::{ExchangeRecord, ExchangeRole, ExchangeState, Protocol};

/// Issuance exchange state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuanceState {
    /// Request sent (holder) or received and pending (issuer)
    RequestSent,
    /// Credential produced and delivered
    Issued,
}

impl ExchangeState for IssuanceState {
    fn can_transition_to(&self, next: &Self) -> bool {
        matches!((self, next), (IssuanceState::RequestSent, IssuanceState::Issued))
    }

    fn is_terminal(&self) -> bool {
        matches!(self, IssuanceState::Issued)
    }

    fn as_str(&self) -> &'static str {
        match self {
            IssuanceState::RequestSent => "request_sent",
            IssuanceState::Issued => "issued",
        }
    }

    fn all() -> &'static [Self] {
        &[IssuanceState::RequestSent, IssuanceState::Issued]
    }
}

/// Role of this agent in an issuance exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuanceRole {
    /// Requests and stores the credential
    Holder,
    /// Signs and sends the credential
    Issuer,
}

impl ExchangeRole for IssuanceRole {
    fn as_str(&self) -> &'static str {
        match self {
            IssuanceRole::Holder => "holder",
            IssuanceRole::Issuer => "issuer",
        }
    }
}

/// What the holder asks the issuer to sign
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialRequest {
    /// Credential type name
    pub credential_type: String,

    /// Claims to place in the credential subject
    #[serde(default)]
    pub credential_values: Map<String, Value>,
}

impl CredentialRequest {
    pub fn new(credential_type: impl Into<String>) -> Self {
        Self {
            credential_type: credential_type.into(),
            credential_values: Map::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.credential_values.insert(key.into(), value.into());
        self
    }
}

/// Issuance record payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssuancePayload {
    /// The original request, kept inline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_request: Option<CredentialRequest>,

    /// Where the credential was stored in the PDS once issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_dri: Option<Dri>,
}

/// Credential issuance protocol marker
#[derive(Debug, Clone, Copy)]
pub struct Issuance;

impl Protocol for Issuance {
    const NAME: &'static str = "issue-credential";

    type State = IssuanceState;
    type Role = IssuanceRole;
    type Payload = IssuancePayload;
}

/// Persisted issuance exchange
pub type CredentialExchange = ExchangeRecord<Issuance>;
