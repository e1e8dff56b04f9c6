//! Agent-to-agent data exchange
//!
//! One agent asks another for the payload behind a DRI
//! (`exchange-data-a`); the other loads it from its own PDS and answers on
//! the same thread (`exchange-data-b`). No exchange record is kept.

use pds_core::{Dri, Envelope, PdsError, ProtocolMessage, Result};
use tracing::{info, warn};

use super::ProtocolContext;
use crate::services::require_connection;

#[derive(Clone)]
pub struct DataExchangeService {
    ctx: ProtocolContext,
}

impl DataExchangeService {
    pub fn new(ctx: ProtocolContext) -> Self {
        Self { ctx }
    }

    /// Ask the counterpart on `connection_id` for the payload behind `dri`
    ///
    /// Returns the thread id the answer will arrive on.
    pub async fn request_data(&self, connection_id: &str, dri: Dri) -> Result<String> {
        require_connection(self.ctx.transport.as_ref(), connection_id).await?;

        let envelope = Envelope::new(ProtocolMessage::ExchangeDataA { payload_dri: dri.clone() });
        let thread_id = envelope.thread_id.clone();
        self.ctx.transport.send(connection_id, envelope).await?;

        info!(connection_id = %connection_id, dri = %dri, thread_id = %thread_id, "Requested data");
        Ok(thread_id)
    }

    /// Answer a data request from our own PDS
    ///
    /// Returns `false` without replying when the payload is not held here.
    pub async fn handle_data_request(&self, connection_id: &str, thread_id: &str, dri: Dri) -> Result<bool> {
        let record = match self.ctx.pds.load_raw(&dri).await {
            Ok(record) => record,
            Err(PdsError::NotFound(what)) => {
                warn!(connection_id = %connection_id, dri = %dri, what = %what, "Requested data not held here");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        self.ctx
            .transport
            .send(
                connection_id,
                Envelope::on_thread(
                    thread_id,
                    ProtocolMessage::ExchangeDataB {
                        payload_dri: dri.clone(),
                        payload: record.content,
                    },
                ),
            )
            .await?;

        info!(connection_id = %connection_id, dri = %dri, "Sent requested data");
        Ok(true)
    }
}
