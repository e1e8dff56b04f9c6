//! Credential issuance protocol
//!
//! Holder                              Issuer
//!   | -- request-credential ------------> |  opens {External, Issuer, RequestSent}
//!   |    {Local, Holder, RequestSent}     |
//!   | <----------- issue-credential ----- |  issue_credential: -> Issued
//!   |    store credential, -> Issued      |

use pds_core::{
    CredentialExchange, CredentialRequest, Envelope, ExchangeRecord, Initiator, Issuance,
    IssuancePayload, IssuanceRole, IssuanceState, PdsError, ProtocolMessage, Result,
};
use serde_json::Value;
use tracing::info;

use super::{Opened, ProtocolContext};
use crate::core::attempt_transition;
use crate::services::require_connection;

/// PDS table the issuer keeps copies of issued credentials in
pub const ISSUED_CREDENTIALS_TABLE: &str = "issued_credentials";

#[derive(Clone)]
pub struct IssuanceService {
    ctx: ProtocolContext,
}

impl IssuanceService {
    pub fn new(ctx: ProtocolContext) -> Self {
        Self { ctx }
    }

    /// Ask the counterpart on `connection_id` for a credential
    pub async fn request_credential(
        &self,
        connection_id: &str,
        request: CredentialRequest,
    ) -> Result<CredentialExchange> {
        require_connection(self.ctx.transport.as_ref(), connection_id).await?;

        let envelope = Envelope::new(ProtocolMessage::CredentialRequest {
            credential: request.clone(),
        });
        let thread_id = envelope.thread_id.clone();
        self.ctx.transport.send(connection_id, envelope).await?;

        let record: CredentialExchange = ExchangeRecord::new(
            connection_id,
            thread_id,
            Initiator::Local,
            IssuanceRole::Holder,
            IssuanceState::RequestSent,
            IssuancePayload {
                credential_request: Some(request),
                credential_dri: None,
            },
        );
        self.ctx.exchanges.save(&record).await?;

        info!(
            exchange_id = %record.id,
            connection_id = %connection_id,
            credential_type = ?record.payload.credential_request.as_ref().map(|r| &r.credential_type),
            "Credential requested"
        );
        Ok(record)
    }

    /// Open an issuer-side exchange for an inbound request
    pub async fn handle_request(
        &self,
        connection_id: &str,
        thread_id: &str,
        request: CredentialRequest,
    ) -> Result<Opened<Issuance>> {
        let _lock = self.ctx.exchanges.lock_thread::<Issuance>(thread_id, IssuanceRole::Issuer).await;
        if let Some(existing) = self
            .ctx
            .exchanges
            .find_by_thread::<Issuance>(thread_id, IssuanceRole::Issuer)
            .await?
        {
            info!(thread_id = %thread_id, exchange_id = %existing.id, "Duplicate credential request ignored");
            return Ok(Opened::Duplicate(existing));
        }

        let record: CredentialExchange = ExchangeRecord::new(
            connection_id,
            thread_id,
            Initiator::External,
            IssuanceRole::Issuer,
            IssuanceState::RequestSent,
            IssuancePayload {
                credential_request: Some(request),
                credential_dri: None,
            },
        );
        self.ctx.exchanges.save(&record).await?;

        info!(exchange_id = %record.id, thread_id = %thread_id, "Credential request received");
        Ok(Opened::Created(record))
    }

    /// Create, send and keep the credential for an open issuer-side exchange
    ///
    /// Returns the updated record and the credential that was sent.
    pub async fn issue_credential(&self, exchange_id: &str) -> Result<(CredentialExchange, Value)> {
        let record: CredentialExchange = self.ctx.exchanges.get(exchange_id).await?;

        let issued = attempt_transition(
            &self.ctx.exchanges,
            record,
            IssuanceState::RequestSent,
            IssuanceRole::Issuer,
            IssuanceState::Issued,
            |record| async move {
                let connection =
                    require_connection(self.ctx.transport.as_ref(), &record.connection_id).await?;
                let request = record.payload.credential_request.clone().ok_or_else(|| {
                    PdsError::MalformedInput(format!("Exchange {} has no credential request", record.id))
                })?;

                let credential = self
                    .ctx
                    .issuer
                    .create_credential(
                        &request.credential_type,
                        &request.credential_values,
                        connection.their_did.as_deref(),
                    )
                    .await?;

                self.ctx
                    .transport
                    .send(
                        &record.connection_id,
                        Envelope::on_thread(
                            record.thread_id.clone(),
                            ProtocolMessage::CredentialIssue {
                                credential: credential.clone(),
                            },
                        ),
                    )
                    .await?;

                let schema = credential
                    .pointer("/credentialSubject/oca_schema_dri")
                    .and_then(Value::as_str);
                let dri = self
                    .ctx
                    .pds
                    .save_in_table(&credential, ISSUED_CREDENTIALS_TABLE, schema)
                    .await?;

                Ok(IssuancePayload {
                    credential_dri: Some(dri),
                    ..record.payload
                })
            },
        )
        .await?;

        let credential = match &issued.payload.credential_dri {
            Some(dri) => self.ctx.pds.load(dri).await?.content,
            None => Value::Null,
        };
        Ok((issued, credential))
    }

    /// Store a credential delivered on a holder-side exchange
    pub async fn handle_issue(
        &self,
        connection_id: &str,
        thread_id: &str,
        credential: Value,
    ) -> Result<CredentialExchange> {
        let record = self
            .ctx
            .exchanges
            .find_by_thread::<Issuance>(thread_id, IssuanceRole::Holder)
            .await?
            .filter(|record| record.connection_id == connection_id)
            .ok_or_else(|| PdsError::not_found(format!("issue-credential exchange on thread {}", thread_id)))?;

        attempt_transition(
            &self.ctx.exchanges,
            record,
            IssuanceState::RequestSent,
            IssuanceRole::Holder,
            IssuanceState::Issued,
            |record| async move {
                let dri = self.ctx.holder.store_credential(&credential).await?;
                Ok(IssuancePayload {
                    credential_dri: Some(dri),
                    ..record.payload
                })
            },
        )
        .await
    }
}
