//! Credential creation

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use pds_core::Result;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Creates credentials on behalf of this agent
#[async_trait]
pub trait Issuer: Send + Sync {
    /// Create a credential of `credential_type` carrying `values`
    ///
    /// `subject_did`, when given, becomes the credential subject's id.
    async fn create_credential(
        &self,
        credential_type: &str,
        values: &Map<String, Value>,
        subject_did: Option<&str>,
    ) -> Result<Value>;
}

/// Issuer producing unsigned credential documents
#[derive(Debug, Clone, Default)]
pub struct PlainIssuer {
    issuer_did: Option<String>,
}

impl PlainIssuer {
    pub fn new(issuer_did: Option<String>) -> Self {
        Self { issuer_did }
    }
}

#[async_trait]
impl Issuer for PlainIssuer {
    async fn create_credential(
        &self,
        credential_type: &str,
        values: &Map<String, Value>,
        subject_did: Option<&str>,
    ) -> Result<Value> {
        let mut subject = values.clone();
        if let Some(did) = subject_did {
            subject.insert("id".to_string(), json!(did));
        }

        debug!(credential_type = %credential_type, "Creating credential");
        Ok(json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": ["VerifiableCredential", credential_type],
            "issuer": self.issuer_did,
            "issuanceDate": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            "credentialSubject": subject,
        }))
    }
}
