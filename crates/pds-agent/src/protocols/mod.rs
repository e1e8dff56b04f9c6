//! Exchange protocols
//!
//! Each service drives one protocol: API-triggered steps on this agent's
//! side and handlers for the counterpart's messages. Every state change
//! goes through [`attempt_transition`](crate::core::attempt_transition).

pub mod data_exchange;
pub mod dispatcher;
pub mod issuance;
pub mod presentation;

pub use data_exchange::DataExchangeService;
pub use dispatcher::{InboundDispatcher, InboundOutcome};
pub use issuance::{IssuanceService, ISSUED_CREDENTIALS_TABLE};
pub use presentation::{ExchangeSummary, PresentationService, PRESENTATIONS_TABLE};

use pds_core::{ExchangeRecord, Protocol};
use std::sync::Arc;

use crate::core::ExchangeRepository;
use crate::pds::PersonalDataStore;
use crate::services::{Holder, Issuer, Transport, UsagePolicyMatcher};

/// Everything a protocol step may touch
#[derive(Clone)]
pub struct ProtocolContext {
    pub pds: PersonalDataStore,
    pub exchanges: ExchangeRepository,
    pub transport: Arc<dyn Transport>,
    pub issuer: Arc<dyn Issuer>,
    pub holder: Arc<dyn Holder>,
    pub policy_matcher: Option<Arc<dyn UsagePolicyMatcher>>,
    /// Agent label, used as the issuer name on acknowledgments
    pub label: String,
    pub public_did: Option<String>,
}

/// Result of handling a message that opens an exchange
#[derive(Debug)]
pub enum Opened<P: Protocol> {
    /// A new record was created
    Created(ExchangeRecord<P>),
    /// A record already existed for the thread; nothing changed
    Duplicate(ExchangeRecord<P>),
}

impl<P: Protocol> Opened<P> {
    pub fn record(&self) -> &ExchangeRecord<P> {
        match self {
            Opened::Created(record) | Opened::Duplicate(record) => record,
        }
    }

    pub fn into_record(self) -> ExchangeRecord<P> {
        match self {
            Opened::Created(record) | Opened::Duplicate(record) => record,
        }
    }
}
