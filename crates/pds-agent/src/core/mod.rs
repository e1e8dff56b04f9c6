//! Core exchange logic for the agent

mod guard;

pub use guard::{attempt_transition, ExchangeRepository};
