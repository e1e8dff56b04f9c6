//! Credential storage and presentation creation

use async_trait::async_trait;
use pds_core::{Dri, PdsError, PresentationRequest, Result};
use serde_json::{json, Value};
use tracing::info;

use crate::pds::PersonalDataStore;

/// PDS table credentials are stored in
pub const CREDENTIALS_TABLE: &str = "credentials";

/// Holds credentials on behalf of this agent
#[async_trait]
pub trait Holder: Send + Sync {
    /// Store a received credential; returns where it was stored
    async fn store_credential(&self, credential: &Value) -> Result<Dri>;

    /// Build a presentation of a held credential for `request`
    async fn create_presentation(&self, request: &PresentationRequest, credential_id: &str) -> Result<Value>;
}

/// Holder keeping credentials in the personal data store
#[derive(Clone)]
pub struct PdsHolder {
    pds: PersonalDataStore,
}

impl PdsHolder {
    pub fn new(pds: PersonalDataStore) -> Self {
        Self { pds }
    }
}

#[async_trait]
impl Holder for PdsHolder {
    async fn store_credential(&self, credential: &Value) -> Result<Dri> {
        let schema = credential
            .pointer("/credentialSubject/oca_schema_dri")
            .and_then(Value::as_str);

        let dri = self.pds.save_in_table(credential, CREDENTIALS_TABLE, schema).await?;
        info!(dri = %dri, schema = ?schema, "Stored credential");
        Ok(dri)
    }

    async fn create_presentation(&self, request: &PresentationRequest, credential_id: &str) -> Result<Value> {
        let credential = self
            .pds
            .load(&Dri::from_backend(credential_id))
            .await
            .map_err(|e| match e {
                PdsError::NotFound(_) => PdsError::not_found(format!("credential {}", credential_id)),
                other => other,
            })?
            .content;

        if !credential.is_object() {
            return Err(PdsError::Collaborator(format!(
                "Stored record {} is not a credential",
                credential_id
            )));
        }

        Ok(json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": ["VerifiablePresentation"],
            "presentation_request": request,
            "verifiableCredential": [credential],
        }))
    }
}
