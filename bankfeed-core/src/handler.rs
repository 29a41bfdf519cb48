//! The driving step shared by live delivery and backfill: ingest, then mark on success.

use tracing::debug;

use crate::chat::{ChatError, ChatMessage, MARKER};
use crate::guard::InFlight;
use crate::ledger::LedgerClient;
use crate::pipeline::{IngestOutcome, IngestionPipeline};

#[derive(Debug)]
pub enum Handled {
    /// The pipeline ran; marked if the outcome is `Ingested`.
    Outcome(IngestOutcome),
    /// Another task in this process is handling the same message.
    Busy,
    /// The bot's own message; never a notification.
    Ignored,
}

impl Handled {
    pub fn is_ingested(&self) -> bool {
        matches!(self, Handled::Outcome(o) if o.is_ingested())
    }
}

pub struct MessageHandler<L: LedgerClient> {
    pipeline: IngestionPipeline<L>,
    in_flight: InFlight,
}

impl<L: LedgerClient> MessageHandler<L> {
    pub fn new(pipeline: IngestionPipeline<L>) -> Self {
        Self {
            pipeline,
            in_flight: InFlight::new(),
        }
    }

    pub fn pipeline(&self) -> &IngestionPipeline<L> {
        &self.pipeline
    }

    /// Ingest `message` and attach [`MARKER`] when the ledger accepted it.
    ///
    /// Only a failure to place the marker is an error: the transaction is
    /// already in the ledger at that point and the operator needs to know.
    pub async fn handle<M: ChatMessage + ?Sized>(&self, message: &M) -> Result<Handled, ChatError> {
        let Some(_claim) = self.in_flight.claim(message.id()) else {
            debug!(message_id = %message.id(), "message already in flight, skipping");
            return Ok(Handled::Busy);
        };

        let outcome = self.pipeline.ingest(message).await;
        if outcome.is_ingested() {
            message.add_reaction(MARKER).await?;
        }
        Ok(Handled::Outcome(outcome))
    }
}
