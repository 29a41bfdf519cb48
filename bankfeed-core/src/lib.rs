//! bankfeed-core: idempotent notification ingestion (live and backfill) over chat and ledger ports.

pub mod chat;
pub mod guard;
pub mod handler;
pub mod ledger;
pub mod live;
pub mod pipeline;
pub mod scanner;

pub use chat::{is_marked, ChatChannel, ChatError, ChatMessage, MessageId, Reaction, MARKER};
pub use guard::{InFlight, InFlightClaim};
pub use handler::{Handled, MessageHandler};
pub use ledger::{to_minor_units, LedgerClient, LedgerError, LedgerReceipt};
pub use live::{BatchReport, LiveFeed};
pub use pipeline::{IngestOutcome, IngestionPipeline};
pub use scanner::{ScanError, ScanReport, Scanner};
