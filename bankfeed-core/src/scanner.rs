//! Backfill ("catch-up"): walk a channel's history and ingest every unmarked message.

use std::sync::Arc;

use futures_util::TryStreamExt;
use thiserror::Error;
use tracing::{debug, info};

use crate::chat::{is_marked, ChatChannel, ChatError, ChatMessage};
use crate::handler::{Handled, MessageHandler};
use crate::ledger::LedgerClient;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The configured channel was not resolved at startup.
    #[error("Channel '{0}' not found.")]
    ChannelNotFound(String),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Messages the pipeline ran on, whatever the result.
    pub processed: usize,
    /// Messages already carrying our marker, or in flight elsewhere.
    pub skipped: usize,
    /// Subset of `processed` that reached the ledger.
    pub ingested: usize,
}

impl ScanReport {
    /// Operator-facing summary line.
    pub fn summary(&self) -> String {
        format!("Catch-up complete. Processed {} messages.", self.processed)
    }
}

pub struct Scanner<L: LedgerClient> {
    handler: Arc<MessageHandler<L>>,
    channel_name: String,
}

impl<L: LedgerClient> Scanner<L> {
    pub fn new(handler: Arc<MessageHandler<L>>, channel_name: impl Into<String>) -> Self {
        Self {
            handler,
            channel_name: channel_name.into(),
        }
    }

    /// Scan `channel` one message at a time (parse -> ledger -> mark before moving on).
    ///
    /// `None` means the channel could not be resolved, which is reported rather
    /// than treated as an empty scan.
    pub async fn scan<C: ChatChannel>(&self, channel: Option<&C>) -> Result<ScanReport, ScanError> {
        let channel = channel.ok_or_else(|| ScanError::ChannelNotFound(self.channel_name.clone()))?;

        info!(channel = channel.name(), "catch-up started");
        let mut report = ScanReport::default();
        let mut history = channel.history();

        while let Some(message) = history.try_next().await? {
            if is_marked(message.reactions()) {
                debug!(message_id = %message.id(), "already ingested");
                report.skipped += 1;
                continue;
            }

            match self.handler.handle(&message).await? {
                Handled::Busy | Handled::Ignored => report.skipped += 1,
                handled => {
                    report.processed += 1;
                    if handled.is_ingested() {
                        report.ingested += 1;
                    }
                }
            }
        }

        info!(
            channel = channel.name(),
            processed = report.processed,
            ingested = report.ingested,
            skipped = report.skipped,
            "catch-up finished"
        );
        Ok(report)
    }
}
