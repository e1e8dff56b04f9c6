//! Agent wiring
//!
//! Builds the personal data store, the protocol services and the inbound
//! dispatcher over one registry and one agent store.

use pds_backends::backends::{DataVaultBackend, LocalBackend};
use pds_backends::{BackendRegistry, BackendRegistryBuilder};
use pds_core::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::AgentConfig;
use crate::core::ExchangeRepository;
use crate::pds::PersonalDataStore;
use crate::protocols::{
    DataExchangeService, InboundDispatcher, IssuanceService, PresentationService, ProtocolContext,
};
use crate::services::{HttpPolicyMatcher, OutboxTransport, PdsHolder, PlainIssuer, UsagePolicyMatcher};
use crate::storage::AgentStore;

/// Registry with the bundled backends
///
/// The data vault is always registered so it can be configured at runtime;
/// it is only usable once it has an API URL.
pub fn default_registry(config: &AgentConfig) -> BackendRegistry {
    let vault = match &config.data_vault_url {
        Some(url) => DataVaultBackend::new().with_api_url(url.clone()),
        None => DataVaultBackend::new(),
    };

    BackendRegistryBuilder::new()
        .with_backend(LocalBackend::new())
        .with_backend(vault)
        .build()
}

/// A fully wired agent; shared as the API state
pub struct Agent {
    pub config: AgentConfig,
    pub pds: PersonalDataStore,
    pub transport: Arc<OutboxTransport>,
    pub issuance: IssuanceService,
    pub presentation: PresentationService,
    pub data: DataExchangeService,
    pub dispatcher: InboundDispatcher,
}

impl Agent {
    /// Wire an agent and select the configured active backend
    pub async fn new(config: AgentConfig, registry: BackendRegistry, store: Arc<dyn AgentStore>) -> Result<Self> {
        let pds = PersonalDataStore::with_route_cache_ttl(
            Arc::new(registry),
            store.clone(),
            Duration::from_secs(config.route_cache_ttl_secs),
        );
        pds.selector().set_active(&config.active_backend).await?;

        let transport = Arc::new(OutboxTransport::new());
        let policy_matcher = config
            .policy_match_url
            .as_ref()
            .map(|url| Arc::new(HttpPolicyMatcher::new(url.clone())) as Arc<dyn UsagePolicyMatcher>);

        let ctx = ProtocolContext {
            pds: pds.clone(),
            exchanges: ExchangeRepository::new(store),
            transport: transport.clone(),
            issuer: Arc::new(PlainIssuer::new(config.public_did.clone())),
            holder: Arc::new(PdsHolder::new(pds.clone())),
            policy_matcher,
            label: config.label.clone(),
            public_did: config.public_did.clone(),
        };

        let issuance = IssuanceService::new(ctx.clone());
        let presentation = PresentationService::new(ctx.clone());
        let data = DataExchangeService::new(ctx);
        let dispatcher = InboundDispatcher::new(issuance.clone(), presentation.clone(), data.clone());

        info!(
            label = %config.label,
            active_backend = %config.active_backend,
            policy_matching = config.policy_match_url.is_some(),
            "Agent initialized"
        );

        Ok(Self {
            config,
            pds,
            transport,
            issuance,
            presentation,
            data,
            dispatcher,
        })
    }
}
