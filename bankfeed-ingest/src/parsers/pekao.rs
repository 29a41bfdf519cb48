//! Bank Pekao card payment notifications (forwarded phone push notifications).
//!
//! Expected layout, exactly three lines:
//!   Title: Transakcja kartą
//!   Text: Zapłacono kwotę 90,45 PLN kartą *1000 dnia 23-09-2024 godz. 19:12:27 w TEST. Bank Pekao S.A.
//!   Timestamp: 1.727111551661E9

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use regex::Regex;
use rust_decimal::Decimal;

use super::NotificationParser;
use crate::error::{excerpt, ParseError};
use crate::time::{local_to_utc, parse_epoch_seconds};
use crate::types::TransactionRecord;

/// Wall clock used by the bank for dates and times in the text.
pub const BANK_TZ: Tz = chrono_tz::Europe::Warsaw;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Title:\s*(?P<title>\S.*)$").expect("title pattern"));

static TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^Text:\s*Zapłacono kwotę\s+(?P<amount>-?\d+(?:,\d+)?)\s+",
        r"(?P<currency>[A-Z]{3})\s+",
        r"kartą\s+\*(?P<card>\d+)\s+",
        r"dnia\s+(?P<date>\d{2}-\d{2}-\d{4})\s+",
        r"godz\.\s+(?P<time>\d{2}:\d{2}:\d{2})\s+",
        r"w\s+(?P<payee>\S.*)$"
    ))
    .expect("text pattern")
});

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Timestamp:\s*(?P<ts>\S+)$").expect("timestamp pattern"));

/// Everything a Pekao notification carries, before it is reduced to a ledger record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PekaoNotification {
    pub title: String,
    pub amount: Decimal,
    pub currency: String,
    /// Masked card digits after the `*`.
    pub card_suffix: String,
    pub payee: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// When the phone received the push notification.
    pub notified_at: DateTime<Utc>,
}

impl PekaoNotification {
    /// Parse a whole notification. Either every line matches or nothing is extracted.
    pub fn from_message(text: &str) -> Result<Self, ParseError> {
        let lines: Vec<&str> = text.trim().lines().map(str::trim_end).collect();
        let [title_line, text_line, ts_line] = lines.as_slice() else {
            return Err(ParseError::Layout {
                lines: lines.len(),
                text: excerpt(text),
            });
        };

        let title = TITLE_RE
            .captures(title_line)
            .ok_or_else(|| ParseError::Title(title_line.to_string()))?;

        let caps = TEXT_RE
            .captures(text_line)
            .ok_or_else(|| ParseError::Body(text_line.to_string()))?;

        let ts = TIMESTAMP_RE
            .captures(ts_line)
            .ok_or_else(|| ParseError::Timestamp(ts_line.to_string()))?;
        let notified_at =
            parse_epoch_seconds(&ts["ts"]).ok_or_else(|| ParseError::Timestamp(ts_line.to_string()))?;

        Ok(Self {
            title: title["title"].trim().to_string(),
            amount: parse_amount(&caps["amount"])?,
            currency: caps["currency"].to_string(),
            card_suffix: caps["card"].to_string(),
            payee: caps["payee"].trim().to_string(),
            date: parse_dd_mm_yyyy(&caps["date"])?,
            time: parse_hh_mm_ss(&caps["time"])?,
            notified_at,
        })
    }

    /// Moment of the payment according to the bank's own clock.
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        local_to_utc(self.date, self.time, BANK_TZ)
    }

    pub fn to_transaction(&self, account: &str) -> TransactionRecord {
        TransactionRecord {
            date: self.date,
            account: account.to_string(),
            amount: self.amount,
            imported_payee: self.payee.clone(),
        }
    }
}

/// `90,45` -> 90.45, exact. Anything that would need rounding is rejected.
fn parse_amount(s: &str) -> Result<Decimal, ParseError> {
    Decimal::from_str_exact(&s.replace(',', ".")).map_err(|_| ParseError::Amount(s.to_string()))
}

fn parse_dd_mm_yyyy(s: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(s, "%d-%m-%Y").map_err(|_| ParseError::Date(s.to_string()))
}

fn parse_hh_mm_ss(s: &str) -> Result<NaiveTime, ParseError> {
    NaiveTime::parse_from_str(s, "%H:%M:%S").map_err(|_| ParseError::Time(s.to_string()))
}

/// Pekao grammar bound to one ledger account.
#[derive(Debug, Clone)]
pub struct PekaoParser {
    account: String,
}

impl PekaoParser {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

impl NotificationParser for PekaoParser {
    fn bank(&self) -> &str {
        "pekao"
    }

    fn parse(&self, text: &str) -> Result<TransactionRecord, ParseError> {
        Ok(PekaoNotification::from_message(text)?.to_transaction(&self.account))
    }
}
