//! parse -> ledger for a single message, with every expected failure folded into the outcome.

use bankfeed_ingest::{NotificationParser, ParseError};
use tracing::{info, warn};

use crate::chat::ChatMessage;
use crate::ledger::{LedgerClient, LedgerError, LedgerReceipt};

#[derive(Debug)]
pub enum IngestOutcome {
    /// Stored in the ledger; the message may be marked.
    Ingested(LedgerReceipt),
    /// Not a notification this grammar understands. Common and harmless.
    Rejected(ParseError),
    /// Parsed, but the ledger refused or could not be reached. Retried only by a later backfill.
    LedgerFailed(LedgerError),
}

impl IngestOutcome {
    pub fn is_ingested(&self) -> bool {
        matches!(self, IngestOutcome::Ingested(_))
    }
}

pub struct IngestionPipeline<L: LedgerClient> {
    parser: Box<dyn NotificationParser>,
    ledger: L,
}

impl<L: LedgerClient> IngestionPipeline<L> {
    pub fn new(parser: Box<dyn NotificationParser>, ledger: L) -> Self {
        Self { parser, ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Run one message through the parser and into the ledger.
    ///
    /// Never marks the message; that is the driving loop's job.
    pub async fn ingest<M: ChatMessage + ?Sized>(&self, message: &M) -> IngestOutcome {
        let record = match self.parser.parse(message.content()) {
            Ok(r) => r,
            Err(e) => {
                info!(
                    message_id = %message.id(),
                    content = message.content(),
                    bank = self.parser.bank(),
                    "could not parse message: {e}"
                );
                return IngestOutcome::Rejected(e);
            }
        };

        match self.ledger.save_transaction(&record).await {
            Ok(receipt) => {
                info!(
                    message_id = %message.id(),
                    date = %record.date,
                    amount = %record.amount,
                    account = %record.account,
                    payee = %record.imported_payee,
                    "transaction saved"
                );
                IngestOutcome::Ingested(receipt)
            }
            Err(e) => {
                warn!(
                    message_id = %message.id(),
                    content = message.content(),
                    "error saving transaction: {e}"
                );
                IngestOutcome::LedgerFailed(e)
            }
        }
    }

    /// Boolean form of [`ingest`](Self::ingest): true when the message may be marked.
    pub async fn ingest_ok<M: ChatMessage + ?Sized>(&self, message: &M) -> bool {
        self.ingest(message).await.is_ingested()
    }
}
