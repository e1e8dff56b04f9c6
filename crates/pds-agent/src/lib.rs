//! PDS Agent
//!
//! An agent that keeps its data in a content-addressed personal data store
//! and exchanges credentials and presentations with peer agents:
//! - Saves payloads to the active storage backend and routes every read back
//!   to the backend that holds the payload
//! - Issues and stores credentials (issue-credential protocol)
//! - Requests, presents and acknowledges proofs (present-proof protocol)
//! - Serves stored payloads to connected peers on request
//!
//! ## API Endpoints
//!
//! ### PDS Endpoints
//! - `GET /pds` - Active, registered and configured backends
//! - `POST /pds/activate` - Select the active backend
//! - `GET|POST /pds/settings` - Read or update backend settings
//! - `POST /pds/save` - Save a payload, returns its DRI
//! - `GET /pds/{dri}` - Load a payload (`?meta=true`, `?resolve=true`)
//! - `DELETE /pds/{dri}` - Delete a payload
//! - `POST /pds/oca_data` - Save one payload per schema key
//! - `POST /pds/load_multiple` - Load by table and schema filter
//! - `POST /pds/link` - Link a payload to others
//! - `POST /pds/get_from` - Ask a peer for a payload
//!
//! ### Exchange Endpoints
//! - `POST /issue-credential/request` - Request a credential
//! - `POST /issue-credential/send` - Issue the requested credential
//! - `POST /present-proof/request` - Request a presentation
//! - `POST /present-proof/present` - Present a held credential
//! - `POST /present-proof/acknowledge` - Acknowledge a received presentation
//! - `GET /present-proof/exchange/record` - List presentation exchanges
//!
//! ### Transport Endpoints
//! - `GET|POST /connections` - List or add peer connections
//! - `POST /inbound` - Deliver a peer's envelope
//! - `GET /outbox` - Drain queued outbound envelopes

pub mod agent;
pub mod api;
pub mod config;
pub mod core;
pub mod pds;
pub mod protocols;
pub mod services;
pub mod storage;

pub use agent::{default_registry, Agent};
pub use api::create_router;
pub use config::AgentConfig;
pub use pds::PersonalDataStore;
pub use storage::{AgentStore, MemoryStore};
