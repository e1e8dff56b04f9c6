//! Inbound message dispatch

use pds_core::{Dri, Envelope, ExchangeRecord, ExchangeState, Protocol, ProtocolMessage, Result};
use serde::Serialize;
use tracing::{debug, info};

use super::{DataExchangeService, IssuanceService, Opened, PresentationService};

/// What handling an inbound envelope did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InboundOutcome {
    /// A new exchange record was opened
    ExchangeOpened { protocol: String, exchange_id: String },
    /// An existing exchange moved to a new state
    ExchangeAdvanced {
        protocol: String,
        exchange_id: String,
        state: String,
    },
    /// The thread already had an exchange; nothing changed
    Duplicate { protocol: String, exchange_id: String },
    /// Requested data was sent back
    DataSent { dri: Dri },
    /// Requested data is not held here; no reply was sent
    DataUnavailable { dri: Dri },
    /// Data requested earlier has arrived
    DataReceived { dri: Dri, payload: String },
}

impl InboundOutcome {
    fn opened<P: Protocol>(opened: Opened<P>) -> Self {
        match opened {
            Opened::Created(record) => InboundOutcome::ExchangeOpened {
                protocol: P::NAME.to_string(),
                exchange_id: record.id,
            },
            Opened::Duplicate(record) => InboundOutcome::Duplicate {
                protocol: P::NAME.to_string(),
                exchange_id: record.id,
            },
        }
    }

    fn advanced<P: Protocol>(record: ExchangeRecord<P>) -> Self {
        InboundOutcome::ExchangeAdvanced {
            protocol: P::NAME.to_string(),
            state: record.state.as_str().to_string(),
            exchange_id: record.id,
        }
    }
}

/// Routes inbound envelopes to the protocol services by message type
#[derive(Clone)]
pub struct InboundDispatcher {
    issuance: IssuanceService,
    presentation: PresentationService,
    data: DataExchangeService,
}

impl InboundDispatcher {
    pub fn new(issuance: IssuanceService, presentation: PresentationService, data: DataExchangeService) -> Self {
        Self {
            issuance,
            presentation,
            data,
        }
    }

    /// Handle one envelope received on `connection_id`
    pub async fn handle(&self, connection_id: &str, envelope: Envelope) -> Result<InboundOutcome> {
        debug!(
            connection_id = %connection_id,
            message_type = envelope.message_type(),
            thread_id = %envelope.thread_id,
            "Dispatching inbound message"
        );
        let thread_id = envelope.thread_id;

        let outcome = match envelope.message {
            ProtocolMessage::CredentialRequest { credential } => InboundOutcome::opened(
                self.issuance
                    .handle_request(connection_id, &thread_id, credential)
                    .await?,
            ),
            ProtocolMessage::CredentialIssue { credential } => InboundOutcome::advanced(
                self.issuance
                    .handle_issue(connection_id, &thread_id, credential)
                    .await?,
            ),
            ProtocolMessage::RequestProof {
                presentation_request,
                usage_policy,
            } => InboundOutcome::opened(
                self.presentation
                    .handle_request_proof(connection_id, &thread_id, presentation_request, usage_policy)
                    .await?,
            ),
            ProtocolMessage::PresentProof {
                credential_presentation,
                prover_public_did,
                usage_policy,
            } => InboundOutcome::advanced(
                self.presentation
                    .handle_present_proof(
                        connection_id,
                        &thread_id,
                        credential_presentation,
                        prover_public_did,
                        usage_policy,
                    )
                    .await?,
            ),
            ProtocolMessage::AcknowledgeProof { credential } => InboundOutcome::advanced(
                self.presentation
                    .handle_acknowledge(connection_id, &thread_id, credential)
                    .await?,
            ),
            ProtocolMessage::ExchangeDataA { payload_dri } => {
                if self
                    .data
                    .handle_data_request(connection_id, &thread_id, payload_dri.clone())
                    .await?
                {
                    InboundOutcome::DataSent { dri: payload_dri }
                } else {
                    InboundOutcome::DataUnavailable { dri: payload_dri }
                }
            }
            ProtocolMessage::ExchangeDataB { payload_dri, payload } => {
                info!(connection_id = %connection_id, dri = %payload_dri, "Received requested data");
                InboundOutcome::DataReceived {
                    dri: payload_dri,
                    payload,
                }
            }
        };

        Ok(outcome)
    }
}
