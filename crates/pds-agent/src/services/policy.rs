//! Usage-policy matching
//!
//! A verifier attaches its usage policy to a proof request; the prover's
//! data carries its own. Whether the two are compatible is decided by an
//! external governance service.

use async_trait::async_trait;
use pds_core::{PdsError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Public matching endpoint used when none is configured
pub const DEFAULT_POLICY_MATCH_URL: &str = "https://governance.ownyourdata.eu/api/usage-policy/match";

const MATCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of a policy match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub matched: bool,
    pub message: String,
}

/// Decides whether a data controller's policy satisfies a data subject's
#[async_trait]
pub trait UsagePolicyMatcher: Send + Sync {
    async fn matches(&self, controller_policy: &str, subject_policy: &str) -> Result<PolicyVerdict>;
}

#[derive(Serialize)]
struct MatchRequest<'a> {
    #[serde(rename = "data-subject")]
    data_subject: &'a str,
    #[serde(rename = "data-controller")]
    data_controller: &'a str,
}

#[derive(Deserialize)]
struct MatchResponse {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Matcher backed by an HTTP governance service
///
/// The service answers `{"code": 0, ...}` for a match.
#[derive(Debug, Clone)]
pub struct HttpPolicyMatcher {
    url: String,
    client: reqwest::Client,
}

impl HttpPolicyMatcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for HttpPolicyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_POLICY_MATCH_URL)
    }
}

#[async_trait]
impl UsagePolicyMatcher for HttpPolicyMatcher {
    async fn matches(&self, controller_policy: &str, subject_policy: &str) -> Result<PolicyVerdict> {
        let response = self
            .client
            .post(&self.url)
            .timeout(MATCH_TIMEOUT)
            .json(&MatchRequest {
                data_subject: subject_policy,
                data_controller: controller_policy,
            })
            .send()
            .await
            .map_err(|e| {
                warn!(url = %self.url, error = %e, "Usage policy service unreachable");
                PdsError::Collaborator(format!("Usage policy service unreachable: {}", e))
            })?;

        let body: MatchResponse = response
            .json()
            .await
            .map_err(|e| PdsError::Collaborator(format!("Invalid usage policy response: {}", e)))?;

        debug!(code = body.code, "Usage policy match answered");
        Ok(PolicyVerdict {
            matched: body.code == 0,
            message: body.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_match_sends_both_policies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/match"))
            .and(body_json(json!({"data-subject": "subject", "data-controller": "controller"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": "ok"})))
            .mount(&server)
            .await;

        let matcher = HttpPolicyMatcher::new(format!("{}/match", server.uri()));
        let verdict = matcher.matches("controller", "subject").await.unwrap();
        assert_eq!(verdict, PolicyVerdict { matched: true, message: "ok".into() });
    }

    #[tokio::test]
    async fn test_nonzero_code_is_no_match() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"code": 1, "message": "purpose mismatch"})),
            )
            .mount(&server)
            .await;

        let matcher = HttpPolicyMatcher::new(server.uri());
        assert!(!matcher.matches("a", "b").await.unwrap().matched);
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let matcher = HttpPolicyMatcher::new("http://127.0.0.1:9/match");
        assert!(matches!(
            matcher.matches("a", "b").await.unwrap_err(),
            PdsError::Collaborator(_)
        ));
    }
}
