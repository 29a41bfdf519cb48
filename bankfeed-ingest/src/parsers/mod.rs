//! Bank-specific notification grammars behind one parsing contract.

pub mod pekao;

use crate::error::ParseError;
use crate::types::TransactionRecord;

/// Banks with a notification grammar, by config name.
pub const KNOWN_BANKS: &[&str] = &["pekao"];

/// Turns the raw text of one notification into a transaction record.
///
/// Implementations are pure: the same text always yields the same result.
pub trait NotificationParser: Send + Sync {
    /// Config name of the bank this grammar belongs to.
    fn bank(&self) -> &str;

    fn parse(&self, text: &str) -> Result<TransactionRecord, ParseError>;
}

/// Build the parser for `bank`, binding its records to ledger `account`.
pub fn parser_for(bank: &str, account: &str) -> Result<Box<dyn NotificationParser>, ParseError> {
    match bank.trim().to_ascii_lowercase().as_str() {
        "pekao" => Ok(Box::new(pekao::PekaoParser::new(account))),
        _ => Err(ParseError::UnknownBank(bank.to_string())),
    }
}
