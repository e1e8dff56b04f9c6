//! Agent configuration
//!
//! Read from `PDS_AGENT_*` environment variables at startup.

use std::env;

use pds_backends::backends::LOCAL_BACKEND_TYPE;

use crate::pds::DEFAULT_ROUTE_CACHE_TTL;

/// Agent configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// HTTP port of the admin API
    pub port: u16,
    /// Log level for the tracing subscriber
    pub log_level: String,
    /// Human-readable agent label, used as issuer name on acknowledgments
    pub label: String,
    /// Public DID of this agent, if it has one
    pub public_did: Option<String>,
    /// Backend type selected at startup
    pub active_backend: String,
    /// Data vault endpoint; the data_vault backend is configured when set
    pub data_vault_url: Option<String>,
    /// Usage-policy matching endpoint, e.g.
    /// [`DEFAULT_POLICY_MATCH_URL`](crate::services::DEFAULT_POLICY_MATCH_URL);
    /// matching is skipped and no policy leaves the agent when unset
    pub policy_match_url: Option<String>,
    /// PostgreSQL connection string for the agent store
    pub database_url: Option<String>,
    /// Lifetime of cached routes in seconds; 0 disables the cache, which
    /// agents sharing one store need to see each other's routes
    pub route_cache_ttl_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            log_level: "info".into(),
            label: "pds-agent".into(),
            public_did: None,
            active_backend: LOCAL_BACKEND_TYPE.into(),
            data_vault_url: None,
            policy_match_url: None,
            database_url: None,
            route_cache_ttl_secs: DEFAULT_ROUTE_CACHE_TTL.as_secs(),
        }
    }
}

impl AgentConfig {
    /// Load from the environment, falling back to defaults
    ///
    /// Fails only when a set variable cannot be parsed.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from any key/value source, falling back to defaults
    ///
    /// Optional values set to an empty string count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match lookup("PDS_AGENT_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| format!("PDS_AGENT_PORT must be a valid port number, got '{}'", raw))?,
            None => defaults.port,
        };

        let route_cache_ttl_secs = match lookup("PDS_AGENT_ROUTE_CACHE_TTL_SECS") {
            Some(raw) => raw.parse().map_err(|_| {
                format!("PDS_AGENT_ROUTE_CACHE_TTL_SECS must be a number of seconds, got '{}'", raw)
            })?,
            None => defaults.route_cache_ttl_secs,
        };

        Ok(Self {
            port,
            log_level: lookup("PDS_AGENT_LOG_LEVEL").unwrap_or(defaults.log_level),
            label: lookup("PDS_AGENT_LABEL").unwrap_or(defaults.label),
            public_did: non_empty("PDS_AGENT_PUBLIC_DID"),
            active_backend: lookup("PDS_AGENT_ACTIVE_BACKEND").unwrap_or(defaults.active_backend),
            data_vault_url: non_empty("PDS_AGENT_DATA_VAULT_URL"),
            policy_match_url: non_empty("PDS_AGENT_POLICY_MATCH_URL"),
            database_url: non_empty("PDS_AGENT_DATABASE_URL"),
            route_cache_ttl_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.active_backend, "local");
        assert!(config.policy_match_url.is_none());
    }

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn test_empty_environment_matches_defaults() {
        assert_eq!(AgentConfig::from_lookup(lookup(&[])).unwrap(), AgentConfig::default());
    }

    #[test]
    fn test_policy_matching_is_opt_in() {
        let enabled = AgentConfig::from_lookup(lookup(&[(
            "PDS_AGENT_POLICY_MATCH_URL",
            "https://policy.example/match",
        )]))
        .unwrap();
        assert_eq!(enabled.policy_match_url.as_deref(), Some("https://policy.example/match"));

        let disabled = AgentConfig::from_lookup(lookup(&[("PDS_AGENT_POLICY_MATCH_URL", "")])).unwrap();
        assert!(disabled.policy_match_url.is_none());
    }

    #[test]
    fn test_route_cache_ttl() {
        assert_eq!(AgentConfig::default().route_cache_ttl_secs, 600);
        let shared = AgentConfig::from_lookup(lookup(&[("PDS_AGENT_ROUTE_CACHE_TTL_SECS", "0")])).unwrap();
        assert_eq!(shared.route_cache_ttl_secs, 0);
    }

    #[test]
    fn test_bad_port_rejected() {
        let err = AgentConfig::from_lookup(lookup(&[("PDS_AGENT_PORT", "http")])).unwrap_err();
        assert!(err.contains("PDS_AGENT_PORT"));
    }
}
