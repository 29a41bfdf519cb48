use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalized output of notification parsers (bank-agnostic), ready for the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub date: NaiveDate,
    /// Ledger account label the notification source is bound to.
    pub account: String,
    /// Major currency units, exactly as written in the notification.
    pub amount: Decimal,
    /// Merchant text, verbatim.
    pub imported_payee: String,
}
