//! bankfeed-ingest: bank notification grammars and the normalized transaction record.

pub mod error;
pub mod parsers;
pub mod time;
pub mod types;

pub use error::ParseError;
pub use parsers::{parser_for, NotificationParser, KNOWN_BANKS};
pub use parsers::pekao::{PekaoNotification, PekaoParser};
pub use types::TransactionRecord;
