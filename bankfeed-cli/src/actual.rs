//! Actual budget ledger over actual-http-api.
//!
//! Actual keeps amounts as integer hundredths; the record's decimal amount is
//! scaled here and nowhere else.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bankfeed_core::{to_minor_units, LedgerClient, LedgerError, LedgerReceipt};
use bankfeed_ingest::TransactionRecord;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::ActualSection;

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    data: Vec<WireAccount>,
}

#[derive(Debug, Deserialize)]
struct WireAccount {
    id: String,
    name: String,
    #[serde(default)]
    closed: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct NewTransaction<'a> {
    account: &'a str,
    date: String,
    amount: i64,
    imported_payee: &'a str,
    cleared: bool,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct NewTransactionRequest<'a> {
    learn_categories: bool,
    run_transfers: bool,
    transaction: NewTransaction<'a>,
}

fn transaction_request<'a>(
    record: &'a TransactionRecord,
    account_id: &'a str,
    amount: i64,
) -> NewTransactionRequest<'a> {
    NewTransactionRequest {
        learn_categories: false,
        run_transfers: false,
        transaction: NewTransaction {
            account: account_id,
            date: record.date.format("%Y-%m-%d").to_string(),
            amount,
            imported_payee: &record.imported_payee,
            cleared: false,
        },
    }
}

/// Open accounts by name. An account id is accepted in place of a name too.
fn index_accounts(accounts: Vec<WireAccount>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for a in accounts.into_iter().filter(|a| !a.closed) {
        out.insert(a.id.clone(), a.id.clone());
        out.insert(a.name, a.id);
    }
    out
}

fn request_error(e: reqwest::Error) -> LedgerError {
    LedgerError::Request(e.to_string())
}

pub struct ActualClient {
    http: reqwest::Client,
    base: Url,
    budget_sync_id: String,
    accounts: OnceCell<HashMap<String, String>>,
}

impl ActualClient {
    pub fn new(cfg: &ActualSection) -> Result<Self> {
        let base = Url::parse(&cfg.url).with_context(|| format!("invalid actual.url {:?}", cfg.url))?;

        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(&cfg.api_key).context("actual.api_key is not a valid header value")?;
        key.set_sensitive(true);
        headers.insert(HeaderName::from_static("x-api-key"), key);
        if let Some(pw) = &cfg.encryption_password {
            let mut pw = HeaderValue::from_str(pw).context("actual.encryption_password is not a valid header value")?;
            pw.set_sensitive(true);
            headers.insert(HeaderName::from_static("budget-encryption-password"), pw);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .context("build http client")?;

        Ok(Self {
            http,
            base,
            budget_sync_id: cfg.budget_sync_id.clone(),
            accounts: OnceCell::new(),
        })
    }

    fn endpoint(&self, tail: &[&str]) -> Result<Url, LedgerError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| LedgerError::Request(format!("{} cannot be a base url", self.base)))?
            .pop_if_empty()
            .extend(["v1", "budgets", self.budget_sync_id.as_str()])
            .extend(tail);
        Ok(url)
    }

    async fn fetch_accounts(&self) -> Result<HashMap<String, String>, LedgerError> {
        let resp = self
            .http
            .get(self.endpoint(&["accounts"])?)
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let out: AccountsResponse = resp.json().await.map_err(request_error)?;
        debug!(accounts = out.data.len(), "loaded ledger accounts");
        Ok(index_accounts(out.data))
    }

    async fn account_id(&self, account: &str) -> Result<String, LedgerError> {
        let accounts = self.accounts.get_or_try_init(|| self.fetch_accounts()).await?;
        accounts
            .get(account)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownAccount(account.to_string()))
    }
}

#[async_trait]
impl LedgerClient for ActualClient {
    async fn save_transaction(&self, record: &TransactionRecord) -> Result<LedgerReceipt, LedgerError> {
        let amount = to_minor_units(record.amount).ok_or(LedgerError::InvalidAmount(record.amount))?;
        let account_id = self.account_id(&record.account).await?;
        let body = transaction_request(record, &account_id, amount);

        let resp = self
            .http
            .post(self.endpoint(&["accounts", &account_id, "transactions"])?)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(LedgerReceipt {
            id: None,
            amount_minor: amount,
        })
    }
}
