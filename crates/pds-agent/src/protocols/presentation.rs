//! Proof presentation protocol
//!
//! Verifier                              Prover
//!   | -- request-proof -------------------> |  opens {External, Prover, RequestReceived}
//!   |    {Local, Verifier, RequestSent}     |
//!   | <-------------------- present-proof - |  present_proof: -> PresentationSent
//!   |    -> PresentationReceived            |
//!   | -- acknowledge-proof ---------------> |  store ack credential, -> Acknowledged
//!   |    acknowledge_proof: -> Acknowledged |
//!
//! Each side only ever walks its own half of the state enumeration.

use pds_core::presentation::{ACKNOWLEDGMENT_CREDENTIAL_TYPE, ACKNOWLEDGMENT_SCHEMA_DRI};
use pds_core::{
    Dri, Envelope, ExchangeQuery, ExchangeRecord, Initiator, PdsError, Presentation,
    PresentationExchange, PresentationPayload, PresentationRequest, PresentationRole,
    PresentationState, ProtocolMessage, Result,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::issuance::ISSUED_CREDENTIALS_TABLE;
use super::{Opened, ProtocolContext};
use crate::core::attempt_transition;
use crate::services::{require_connection, CREDENTIALS_TABLE};

/// PDS table presentations are stored in, on both sides
pub const PRESENTATIONS_TABLE: &str = "presentations";

/// A presentation exchange as listed by [`PresentationService::list_exchanges`]
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeSummary {
    #[serde(flatten)]
    pub record: PresentationExchange,

    /// Presentation content, resolved from the PDS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation: Option<Value>,

    /// Whether the requester's usage policy matches ours
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_policies_match: Option<bool>,

    /// Held credentials whose schema matches the request
    pub list_of_matching_credentials: Vec<Dri>,
}

#[derive(Clone)]
pub struct PresentationService {
    ctx: ProtocolContext,
}

impl PresentationService {
    pub fn new(ctx: ProtocolContext) -> Self {
        Self { ctx }
    }

    // =========================================================================
    // Verifier side
    // =========================================================================

    /// Ask the counterpart on `connection_id` for a presentation
    pub async fn request_presentation(
        &self,
        connection_id: &str,
        request: PresentationRequest,
    ) -> Result<PresentationExchange> {
        require_connection(self.ctx.transport.as_ref(), connection_id).await?;

        let usage_policy = self.ctx.pds.usage_policy_if_supported().await;
        let envelope = Envelope::new(ProtocolMessage::RequestProof {
            presentation_request: request.clone(),
            usage_policy,
        });
        let thread_id = envelope.thread_id.clone();
        self.ctx.transport.send(connection_id, envelope).await?;

        let record: PresentationExchange = ExchangeRecord::new(
            connection_id,
            thread_id,
            Initiator::Local,
            PresentationRole::Verifier,
            PresentationState::RequestSent,
            PresentationPayload {
                presentation_request: Some(request),
                ..Default::default()
            },
        );
        self.ctx.exchanges.save(&record).await?;

        info!(exchange_id = %record.id, connection_id = %connection_id, "Presentation requested");
        Ok(record)
    }

    /// Record a presentation delivered on a verifier-side exchange
    pub async fn handle_present_proof(
        &self,
        connection_id: &str,
        thread_id: &str,
        presentation: Value,
        prover_public_did: Option<String>,
        usage_policy: Option<String>,
    ) -> Result<PresentationExchange> {
        let record = self
            .thread_record(connection_id, thread_id, PresentationRole::Verifier)
            .await?;

        attempt_transition(
            &self.ctx.exchanges,
            record,
            PresentationState::RequestSent,
            PresentationRole::Verifier,
            PresentationState::PresentationReceived,
            |record| async move {
                let dri = self
                    .ctx
                    .pds
                    .save_in_table(&presentation, PRESENTATIONS_TABLE, None)
                    .await?;
                Ok(PresentationPayload {
                    presentation_dri: Some(dri),
                    prover_public_did,
                    prover_usage_policy: usage_policy,
                    ..record.payload
                })
            },
        )
        .await
    }

    /// Send the acknowledgment credential for a received presentation
    pub async fn acknowledge_proof(&self, exchange_id: &str, verified: bool) -> Result<PresentationExchange> {
        let record: PresentationExchange = self.ctx.exchanges.get(exchange_id).await?;

        attempt_transition(
            &self.ctx.exchanges,
            record,
            PresentationState::PresentationReceived,
            PresentationRole::Verifier,
            PresentationState::Acknowledged,
            |record| async move {
                require_connection(self.ctx.transport.as_ref(), &record.connection_id).await?;

                let own_policy = self.ctx.pds.usage_policy_if_supported().await;
                let usage_policies_match = self
                    .match_policies(own_policy.as_deref(), record.payload.prover_usage_policy.as_deref())
                    .await;

                let mut oca_data = Map::new();
                oca_data.insert("verified".into(), json!(verified));
                oca_data.insert("presentation_dri".into(), json!(record.payload.presentation_dri));
                oca_data.insert("issuer_name".into(), json!(self.ctx.label));
                if let Some(matched) = usage_policies_match {
                    oca_data.insert("usage_policies_match".into(), json!(matched));
                }
                let mut values = Map::new();
                values.insert("oca_data".into(), Value::Object(oca_data));
                values.insert("oca_schema_dri".into(), json!(ACKNOWLEDGMENT_SCHEMA_DRI));

                let credential = self
                    .ctx
                    .issuer
                    .create_credential(
                        ACKNOWLEDGMENT_CREDENTIAL_TYPE,
                        &values,
                        record.payload.prover_public_did.as_deref(),
                    )
                    .await?;

                self.ctx
                    .transport
                    .send(
                        &record.connection_id,
                        Envelope::on_thread(
                            record.thread_id.clone(),
                            ProtocolMessage::AcknowledgeProof {
                                credential: credential.clone(),
                            },
                        ),
                    )
                    .await?;

                let dri = self
                    .ctx
                    .pds
                    .save_in_table(&credential, ISSUED_CREDENTIALS_TABLE, Some(ACKNOWLEDGMENT_SCHEMA_DRI))
                    .await?;

                Ok(PresentationPayload {
                    verified: Some(verified),
                    usage_policies_match,
                    acknowledgment_credential_dri: Some(dri),
                    ..record.payload
                })
            },
        )
        .await
    }

    // =========================================================================
    // Prover side
    // =========================================================================

    /// Open a prover-side exchange for an inbound proof request
    pub async fn handle_request_proof(
        &self,
        connection_id: &str,
        thread_id: &str,
        request: PresentationRequest,
        usage_policy: Option<String>,
    ) -> Result<Opened<Presentation>> {
        let _lock = self.ctx.exchanges.lock_thread::<Presentation>(thread_id, PresentationRole::Prover).await;
        if let Some(existing) = self
            .ctx
            .exchanges
            .find_by_thread::<Presentation>(thread_id, PresentationRole::Prover)
            .await?
        {
            info!(thread_id = %thread_id, exchange_id = %existing.id, "Duplicate proof request ignored");
            return Ok(Opened::Duplicate(existing));
        }

        let record: PresentationExchange = ExchangeRecord::new(
            connection_id,
            thread_id,
            Initiator::External,
            PresentationRole::Prover,
            PresentationState::RequestReceived,
            PresentationPayload {
                presentation_request: Some(request),
                requester_usage_policy: usage_policy,
                ..Default::default()
            },
        );
        self.ctx.exchanges.save(&record).await?;

        info!(exchange_id = %record.id, thread_id = %thread_id, "Proof request received");
        Ok(Opened::Created(record))
    }

    /// Present a held credential in answer to an open proof request
    pub async fn present_proof(&self, exchange_id: &str, credential_id: &str) -> Result<PresentationExchange> {
        let record: PresentationExchange = self.ctx.exchanges.get(exchange_id).await?;

        attempt_transition(
            &self.ctx.exchanges,
            record,
            PresentationState::RequestReceived,
            PresentationRole::Prover,
            PresentationState::PresentationSent,
            |record| async move {
                require_connection(self.ctx.transport.as_ref(), &record.connection_id).await?;
                let request = record.payload.presentation_request.clone().ok_or_else(|| {
                    PdsError::MalformedInput(format!("Exchange {} has no presentation request", record.id))
                })?;

                let presentation = self.ctx.holder.create_presentation(&request, credential_id).await?;
                let usage_policy = self.ctx.pds.usage_policy_if_supported().await;

                self.ctx
                    .transport
                    .send(
                        &record.connection_id,
                        Envelope::on_thread(
                            record.thread_id.clone(),
                            ProtocolMessage::PresentProof {
                                credential_presentation: presentation.clone(),
                                prover_public_did: self.ctx.public_did.clone(),
                                usage_policy,
                            },
                        ),
                    )
                    .await?;

                let dri = self
                    .ctx
                    .pds
                    .save_in_table(&presentation, PRESENTATIONS_TABLE, None)
                    .await?;

                Ok(PresentationPayload {
                    presentation_dri: Some(dri),
                    prover_public_did: self.ctx.public_did.clone(),
                    ..record.payload
                })
            },
        )
        .await
    }

    /// Store the acknowledgment credential on a prover-side exchange
    pub async fn handle_acknowledge(
        &self,
        connection_id: &str,
        thread_id: &str,
        credential: Value,
    ) -> Result<PresentationExchange> {
        let record = self
            .thread_record(connection_id, thread_id, PresentationRole::Prover)
            .await?;

        attempt_transition(
            &self.ctx.exchanges,
            record,
            PresentationState::PresentationSent,
            PresentationRole::Prover,
            PresentationState::Acknowledged,
            |record| async move {
                let dri = self.ctx.holder.store_credential(&credential).await?;
                let verified = credential
                    .pointer("/credentialSubject/oca_data/verified")
                    .and_then(Value::as_bool);
                Ok(PresentationPayload {
                    verified,
                    acknowledgment_credential_dri: Some(dri),
                    ..record.payload
                })
            },
        )
        .await
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Presentation exchanges matching `query`, with resolved presentations,
    /// usage-policy verdicts and matching held credentials
    pub async fn list_exchanges(&self, query: &ExchangeQuery) -> Result<Vec<ExchangeSummary>> {
        let records = self.ctx.exchanges.query::<Presentation>(query).await?;
        let own_policy = self.ctx.pds.usage_policy_if_supported().await;

        let credentials = match self.ctx.pds.load_table(CREDENTIALS_TABLE).await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(error = %e, "Could not load held credentials");
                Vec::new()
            }
        };

        let mut summaries = Vec::with_capacity(records.len());
        for record in records {
            let presentation = match &record.payload.presentation_dri {
                Some(dri) => match self.ctx.pds.load(dri).await {
                    Ok(loaded) => Some(loaded.content),
                    Err(e) => {
                        warn!(exchange_id = %record.id, dri = %dri, error = %e, "Presentation not loadable");
                        None
                    }
                },
                None => None,
            };

            let usage_policies_match = self
                .match_policies(record.payload.requester_usage_policy.as_deref(), own_policy.as_deref())
                .await;

            let list_of_matching_credentials = match &record.payload.presentation_request {
                Some(request) => credentials
                    .iter()
                    .filter(|credential| {
                        credential
                            .content
                            .pointer("/credentialSubject/oca_schema_dri")
                            .and_then(Value::as_str)
                            == Some(request.schema_base_dri.as_str())
                    })
                    .map(|credential| credential.dri.clone())
                    .collect(),
                None => Vec::new(),
            };

            summaries.push(ExchangeSummary {
                record,
                presentation,
                usage_policies_match,
                list_of_matching_credentials,
            });
        }

        Ok(summaries)
    }

    /// Match a controller's policy against a subject's
    ///
    /// `None` when either policy or the matcher is missing. A failed check
    /// counts as no match.
    async fn match_policies(&self, controller: Option<&str>, subject: Option<&str>) -> Option<bool> {
        let (controller, subject) = (controller?, subject?);
        let matcher = self.ctx.policy_matcher.as_ref()?;

        match matcher.matches(controller, subject).await {
            Ok(verdict) => {
                info!(matched = verdict.matched, message = %verdict.message, "Usage policies compared");
                Some(verdict.matched)
            }
            Err(e) => {
                warn!(error = %e, "Usage policy match failed; treating as no match");
                Some(false)
            }
        }
    }

    async fn thread_record(
        &self,
        connection_id: &str,
        thread_id: &str,
        role: PresentationRole,
    ) -> Result<PresentationExchange> {
        self.ctx
            .exchanges
            .find_by_thread::<Presentation>(thread_id, role)
            .await?
            .filter(|record| record.connection_id == connection_id)
            .ok_or_else(|| PdsError::not_found(format!("present-proof exchange on thread {}", thread_id)))
    }
}
