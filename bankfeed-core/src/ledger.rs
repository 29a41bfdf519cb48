//! Budget ledger contract. The ledger is an external collaborator with one write.

use async_trait::async_trait;
use bankfeed_ingest::TransactionRecord;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

/// What the ledger hands back for a stored transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReceipt {
    /// Ledger-assigned transaction id, when the ledger reports one.
    pub id: Option<String>,
    /// Amount as stored by the ledger (hundredths of the major unit).
    pub amount_minor: i64,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger request failed: {0}")]
    Request(String),

    #[error("ledger rejected transaction ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("no ledger account named {0:?}")]
    UnknownAccount(String),

    #[error("amount {0} does not fit the ledger's integer representation")]
    InvalidAmount(Decimal),
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn save_transaction(&self, record: &TransactionRecord) -> Result<LedgerReceipt, LedgerError>;
}

/// Major units -> hundredths, the ledger's storage unit. Rounds half to even.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount.checked_mul(Decimal::ONE_HUNDRED)?.round().to_i64()
}
