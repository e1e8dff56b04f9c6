//! Generic exchange state machine
//!
//! An exchange is one run of a multi-step protocol between two agents,
//! correlated by a thread id. Each protocol supplies a closed state
//! enumeration with a static transition table, a role enumeration and a
//! payload type. The record itself enforces two rules:
//!
//! 1. **Guard before mutate**: `ensure` checks state and role before any
//!    side effect runs, so a rejected call leaves the record untouched.
//! 2. **Closed transitions**: `advance` refuses any edge that is not in the
//!    protocol's transition table.
//!
//! Duplicate or out-of-order deliveries are tolerated because they fail
//! the guard, not because messages are deduplicated.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

use crate::error::{PdsError, Result};

/// State enumeration of one protocol
pub trait ExchangeState:
    Copy + Eq + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Whether `next` is a legal successor of `self`
    fn can_transition_to(&self, next: &Self) -> bool;

    /// Whether no further transitions are possible
    fn is_terminal(&self) -> bool;

    /// Wire label of the state
    fn as_str(&self) -> &'static str;

    /// Every state, in protocol order
    fn all() -> &'static [Self];
}

/// Role enumeration of one protocol
pub trait ExchangeRole:
    Copy + Eq + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Wire label of the role
    fn as_str(&self) -> &'static str;
}

/// A protocol: its name plus state, role and payload types
pub trait Protocol: Send + Sync + 'static {
    /// Protocol name, used as the persistence namespace
    const NAME: &'static str;

    type State: ExchangeState;
    type Role: ExchangeRole;
    type Payload: Clone + Debug + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;
}

/// Which side opened the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Initiator {
    /// This agent opened the exchange
    #[serde(rename = "self")]
    Local,
    /// The counterpart opened the exchange
    External,
}

impl Initiator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Initiator::Local => "self",
            Initiator::External => "external",
        }
    }
}

impl fmt::Display for Initiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of one protocol run
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ExchangeRecord<P: Protocol> {
    /// Record id (uuid v4)
    pub id: String,

    /// Connection the exchange runs over
    pub connection_id: String,

    /// Correlation key shared by both agents
    pub thread_id: String,

    /// Which side opened the exchange
    pub initiator: Initiator,

    /// This agent's role in the exchange
    pub role: P::Role,

    /// Current protocol state
    pub state: P::State,

    /// Protocol payload snapshots (inline values or DRIs)
    pub payload: P::Payload,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<P: Protocol> ExchangeRecord<P> {
    /// Create a new record with a fresh id
    pub fn new(
        connection_id: impl Into<String>,
        thread_id: impl Into<String>,
        initiator: Initiator,
        role: P::Role,
        state: P::State,
        payload: P::Payload,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            connection_id: connection_id.into(),
            thread_id: thread_id.into(),
            initiator,
            role,
            state,
            payload,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the record is in `expected_state` and held in `expected_role`
    ///
    /// State is checked first, then role. Never mutates.
    pub fn ensure(&self, expected_state: P::State, expected_role: P::Role) -> Result<()> {
        if self.state != expected_state {
            return Err(PdsError::InvalidState {
                expected: expected_state.as_str().to_string(),
                actual: self.state.as_str().to_string(),
            });
        }
        if self.role != expected_role {
            return Err(PdsError::InvalidRole {
                expected: expected_role.as_str().to_string(),
                actual: self.role.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Move to `next` if the transition table allows it
    pub fn advance(&mut self, next: P::State) -> Result<()> {
        if !self.state.can_transition_to(&next) {
            return Err(PdsError::InvalidTransition {
                from: self.state.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether the exchange has reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.state.is_terminal()
    }
}

impl<P: Protocol> Clone for ExchangeRecord<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            connection_id: self.connection_id.clone(),
            thread_id: self.thread_id.clone(),
            initiator: self.initiator,
            role: self.role,
            state: self.state,
            payload: self.payload.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl<P: Protocol> PartialEq for ExchangeRecord<P> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.connection_id == other.connection_id
            && self.thread_id == other.thread_id
            && self.initiator == other.initiator
            && self.role == other.role
            && self.state == other.state
            && self.payload == other.payload
            && self.created_at == other.created_at
            && self.updated_at == other.updated_at
    }
}

impl<P: Protocol> Debug for ExchangeRecord<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeRecord")
            .field("protocol", &P::NAME)
            .field("id", &self.id)
            .field("connection_id", &self.connection_id)
            .field("thread_id", &self.thread_id)
            .field("initiator", &self.initiator)
            .field("role", &self.role)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Query over exchange records; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl ExchangeQuery {
    /// Whether a record satisfies every set field
    pub fn matches<P: Protocol>(&self, record: &ExchangeRecord<P>) -> bool {
        fn field_ok(filter: &Option<String>, actual: &str) -> bool {
            filter.as_deref().map_or(true, |wanted| wanted == actual)
        }

        field_ok(&self.connection_id, &record.connection_id)
            && field_ok(&self.thread_id, &record.thread_id)
            && field_ok(&self.initiator, record.initiator.as_str())
            && field_ok(&self.role, record.role.as_str())
            && field_ok(&self.state, record.state.as_str())
    }
}
