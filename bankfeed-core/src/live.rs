//! Live delivery: each new message in the watched channel is seen once.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::chat::{is_marked, ChatError, ChatMessage, MessageId};
use crate::handler::{Handled, MessageHandler};
use crate::ledger::LedgerClient;

/// Tally of one polled batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Highest message id seen; the next poll starts after it.
    pub last_seen: MessageId,
    pub ingested: usize,
    /// Already marked (a catch-up got there first), in flight, or our own.
    pub skipped: usize,
    /// Ingested but the marker could not be placed.
    pub unmarked: usize,
}

/// Entry point for messages arriving as they are posted.
///
/// No marker check in `on_message`: a live message has not been seen before.
/// The marker it leaves is what keeps a later backfill from ingesting it again.
pub struct LiveFeed<L: LedgerClient> {
    handler: Arc<MessageHandler<L>>,
}

impl<L: LedgerClient> LiveFeed<L> {
    pub fn new(handler: Arc<MessageHandler<L>>) -> Self {
        Self { handler }
    }

    pub async fn on_message<M: ChatMessage + ?Sized>(&self, message: &M) -> Result<Handled, ChatError> {
        if message.is_own() {
            return Ok(Handled::Ignored);
        }
        self.handler.handle(message).await
    }

    /// Handle one poll's worth of messages newer than `last_seen`, oldest first.
    ///
    /// Messages already carrying the marker are skipped. A marker that cannot be
    /// placed is logged and the batch carries on; polling never stops on it.
    pub async fn on_batch<M: ChatMessage>(&self, last_seen: MessageId, batch: &[M]) -> BatchReport {
        let mut report = BatchReport {
            last_seen,
            ..BatchReport::default()
        };

        for message in batch {
            report.last_seen = report.last_seen.max(message.id());
            if is_marked(message.reactions()) {
                debug!(message_id = %message.id(), "already ingested");
                report.skipped += 1;
                continue;
            }
            match self.on_message(message).await {
                Ok(handled) if handled.is_ingested() => report.ingested += 1,
                Ok(Handled::Busy | Handled::Ignored) => report.skipped += 1,
                Ok(Handled::Outcome(_)) => {}
                Err(e) => {
                    warn!(message_id = %message.id(), "could not mark message: {e}");
                    report.unmarked += 1;
                }
            }
        }
        report
    }
}
