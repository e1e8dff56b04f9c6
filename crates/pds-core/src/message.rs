//! Agent-to-agent protocol messages
//!
//! Messages are tagged on the wire by their `@type` URI. Every message
//! travels inside an [`Envelope`] that carries the thread id used to
//! correlate it with an exchange record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dri::Dri;
use crate::issuance::CredentialRequest;
use crate::presentation::PresentationRequest;

pub const ISSUE_CREDENTIAL_URI: &str = "https://didcomm.org/issue-credential/1.1";
pub const PRESENT_PROOF_URI: &str = "https://didcomm.org/present-proof/1.1";
pub const PDS_EXCHANGE_URI: &str = "https://didcomm.org/personal-data-storage/1.0";

pub const CREDENTIAL_REQUEST: &str = "https://didcomm.org/issue-credential/1.1/request-credential";
pub const CREDENTIAL_ISSUE: &str = "https://didcomm.org/issue-credential/1.1/issue-credential";
pub const REQUEST_PROOF: &str = "https://didcomm.org/present-proof/1.1/request-proof";
pub const PRESENT_PROOF: &str = "https://didcomm.org/present-proof/1.1/present-proof";
pub const ACKNOWLEDGE_PROOF: &str = "https://didcomm.org/present-proof/1.1/acknowledge-proof";
pub const EXCHANGE_DATA_A: &str = "https://didcomm.org/personal-data-storage/1.0/exchange-data-a";
pub const EXCHANGE_DATA_B: &str = "https://didcomm.org/personal-data-storage/1.0/exchange-data-b";

/// Protocol message body, tagged by `@type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ProtocolMessage {
    /// Holder asks an issuer for a credential; opens an issuer-side exchange
    #[serde(rename = "https://didcomm.org/issue-credential/1.1/request-credential")]
    CredentialRequest { credential: CredentialRequest },

    /// Issuer delivers the signed credential
    #[serde(rename = "https://didcomm.org/issue-credential/1.1/issue-credential")]
    CredentialIssue { credential: Value },

    /// Verifier asks for a presentation; opens a prover-side exchange
    #[serde(rename = "https://didcomm.org/present-proof/1.1/request-proof")]
    RequestProof {
        presentation_request: PresentationRequest,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage_policy: Option<String>,
    },

    /// Prover delivers the presentation
    #[serde(rename = "https://didcomm.org/present-proof/1.1/present-proof")]
    PresentProof {
        credential_presentation: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prover_public_did: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage_policy: Option<String>,
    },

    /// Verifier delivers the acknowledgment credential
    #[serde(rename = "https://didcomm.org/present-proof/1.1/acknowledge-proof")]
    AcknowledgeProof { credential: Value },

    /// Ask the counterpart for the payload behind a DRI
    #[serde(rename = "https://didcomm.org/personal-data-storage/1.0/exchange-data-a")]
    ExchangeDataA { payload_dri: Dri },

    /// Reply carrying the requested payload
    #[serde(rename = "https://didcomm.org/personal-data-storage/1.0/exchange-data-b")]
    ExchangeDataB { payload_dri: Dri, payload: String },
}

impl ProtocolMessage {
    /// The `@type` URI of this message
    pub fn message_type(&self) -> &'static str {
        match self {
            ProtocolMessage::CredentialRequest { .. } => CREDENTIAL_REQUEST,
            ProtocolMessage::CredentialIssue { .. } => CREDENTIAL_ISSUE,
            ProtocolMessage::RequestProof { .. } => REQUEST_PROOF,
            ProtocolMessage::PresentProof { .. } => PRESENT_PROOF,
            ProtocolMessage::AcknowledgeProof { .. } => ACKNOWLEDGE_PROOF,
            ProtocolMessage::ExchangeDataA { .. } => EXCHANGE_DATA_A,
            ProtocolMessage::ExchangeDataB { .. } => EXCHANGE_DATA_B,
        }
    }

    /// Whether this message legitimately opens a new exchange
    pub fn opens_exchange(&self) -> bool {
        matches!(
            self,
            ProtocolMessage::CredentialRequest { .. }
                | ProtocolMessage::RequestProof { .. }
                | ProtocolMessage::ExchangeDataA { .. }
        )
    }
}

/// A message plus its correlation metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message id (uuid v4)
    pub id: String,

    /// Thread id; equals `id` for the first message of a thread
    pub thread_id: String,

    pub message: ProtocolMessage,
}

impl Envelope {
    /// Start a new thread with this message
    pub fn new(message: ProtocolMessage) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self {
            thread_id: id.clone(),
            id,
            message,
        }
    }

    /// Send a message on an existing thread
    pub fn on_thread(thread_id: impl Into<String>, message: ProtocolMessage) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            message,
        }
    }

    /// The `@type` URI of the carried message
    pub fn message_type(&self) -> &'static str {
        self.message.message_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_uri_on_the_wire() {
        let msg = ProtocolMessage::CredentialIssue { credential: json!({"id": "cred-1"}) };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["@type"], CREDENTIAL_ISSUE);
        assert_eq!(json["credential"]["id"], "cred-1");
        assert_eq!(msg.message_type(), CREDENTIAL_ISSUE);
    }

    #[test]
    fn test_uris_share_protocol_prefix() {
        assert!(CREDENTIAL_REQUEST.starts_with(ISSUE_CREDENTIAL_URI));
        assert!(CREDENTIAL_ISSUE.starts_with(ISSUE_CREDENTIAL_URI));
        assert!(REQUEST_PROOF.starts_with(PRESENT_PROOF_URI));
        assert!(ACKNOWLEDGE_PROOF.starts_with(PRESENT_PROOF_URI));
        assert!(EXCHANGE_DATA_B.starts_with(PDS_EXCHANGE_URI));
    }

    #[test]
    fn test_decode_request_proof() {
        let raw = json!({
            "@type": REQUEST_PROOF,
            "presentation_request": {"requested_attributes": ["age"], "schema_base_dri": "s1"}
        });
        let msg: ProtocolMessage = serde_json::from_value(raw).unwrap();
        match msg {
            ProtocolMessage::RequestProof { presentation_request, usage_policy } => {
                assert_eq!(presentation_request.schema_base_dri, "s1");
                assert_eq!(usage_policy, None);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let raw = json!({"@type": "https://didcomm.org/unknown/1.0/x"});
        assert!(serde_json::from_value::<ProtocolMessage>(raw).is_err());
    }

    #[test]
    fn test_envelope_threading() {
        let first = Envelope::new(ProtocolMessage::CredentialRequest {
            credential: CredentialRequest::new("Diploma"),
        });
        assert_eq!(first.id, first.thread_id);
        assert!(first.message.opens_exchange());

        let reply = Envelope::on_thread(
            &first.thread_id,
            ProtocolMessage::CredentialIssue { credential: json!({}) },
        );
        assert_eq!(reply.thread_id, first.thread_id);
        assert_ne!(reply.id, first.id);
        assert!(!reply.message.opens_exchange());
    }
}
