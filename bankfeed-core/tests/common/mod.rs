//! In-memory chat channel and ledger used by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bankfeed_core::{
    to_minor_units, ChatChannel, ChatError, ChatMessage, IngestionPipeline, LedgerClient,
    LedgerError, LedgerReceipt, MessageHandler, MessageId, Reaction, MARKER,
};
use bankfeed_ingest::{PekaoParser, TransactionRecord};
use futures_util::stream::{self, BoxStream, StreamExt};

pub const VALID: &str = "Title: Transakcja kartą
Text: Zapłacono kwotę 90,45 PLN kartą *1000 dnia 23-09-2024 godz. 19:12:27 w TEST. Bank Pekao S.A.
Timestamp: 1.727111551661E9";

pub const ACCOUNT: &str = "Pekao";

#[derive(Debug, Clone)]
struct Stored {
    id: MessageId,
    content: String,
    reactions: Vec<Reaction>,
    own: bool,
}

/// A channel whose messages live in shared memory, so reactions added through
/// one history walk are visible to the next.
#[derive(Debug, Clone, Default)]
pub struct FakeChannel {
    name: String,
    messages: Arc<Mutex<Vec<Stored>>>,
    next_id: Arc<Mutex<u64>>,
    deny_reactions: Arc<AtomicBool>,
}

impl FakeChannel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// From now on every `add_reaction` fails as if the bot lacked permission.
    pub fn deny_reactions(&self) {
        self.deny_reactions.store(true, Ordering::SeqCst);
    }

    pub fn post(&self, content: &str) -> MessageId {
        self.push(content, Vec::new(), false)
    }

    pub fn post_with_reactions(&self, content: &str, reactions: Vec<Reaction>) -> MessageId {
        self.push(content, reactions, false)
    }

    pub fn post_own(&self, content: &str) -> MessageId {
        self.push(content, Vec::new(), true)
    }

    fn push(&self, content: &str, reactions: Vec<Reaction>, own: bool) -> MessageId {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let id = MessageId(*next);
        self.messages.lock().unwrap().push(Stored {
            id,
            content: content.to_string(),
            reactions,
            own,
        });
        id
    }

    /// Fresh snapshot of one message, as a platform fetch would return it.
    pub fn message(&self, id: MessageId) -> FakeMessage {
        let messages = self.messages.lock().unwrap();
        let stored = messages.iter().find(|m| m.id == id).unwrap();
        self.snapshot(stored)
    }

    pub fn reactions_of(&self, id: MessageId) -> Vec<Reaction> {
        let messages = self.messages.lock().unwrap();
        messages.iter().find(|m| m.id == id).unwrap().reactions.clone()
    }

    pub fn marked(&self) -> Vec<MessageId> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.reactions.iter().any(|r| r.emoji == MARKER && r.me))
            .map(|m| m.id)
            .collect()
    }

    fn snapshot(&self, stored: &Stored) -> FakeMessage {
        FakeMessage {
            id: stored.id,
            content: stored.content.clone(),
            reactions: stored.reactions.clone(),
            own: stored.own,
            store: Arc::clone(&self.messages),
            deny_reactions: Arc::clone(&self.deny_reactions),
        }
    }
}

impl ChatChannel for FakeChannel {
    type Message = FakeMessage;

    fn name(&self) -> &str {
        &self.name
    }

    fn history(&self) -> BoxStream<'_, Result<FakeMessage, ChatError>> {
        // newest first, like Discord
        let snapshot: Vec<FakeMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .rev()
            .map(|m| self.snapshot(m))
            .collect();
        stream::iter(snapshot.into_iter().map(Ok)).boxed()
    }
}

#[derive(Debug, Clone)]
pub struct FakeMessage {
    id: MessageId,
    content: String,
    reactions: Vec<Reaction>,
    own: bool,
    store: Arc<Mutex<Vec<Stored>>>,
    deny_reactions: Arc<AtomicBool>,
}

#[async_trait]
impl ChatMessage for FakeMessage {
    fn id(&self) -> MessageId {
        self.id
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    fn is_own(&self) -> bool {
        self.own
    }

    async fn add_reaction(&self, emoji: &str) -> Result<(), ChatError> {
        if self.deny_reactions.load(Ordering::SeqCst) {
            return Err(ChatError::Status {
                status: 403,
                body: "Missing Permissions".to_string(),
            });
        }
        let mut messages = self.store.lock().unwrap();
        let stored = messages
            .iter_mut()
            .find(|m| m.id == self.id)
            .ok_or_else(|| ChatError::Status {
                status: 404,
                body: "Unknown Message".to_string(),
            })?;
        if !stored.reactions.iter().any(|r| r.emoji == emoji && r.me) {
            stored.reactions.push(Reaction::new(emoji, true));
        }
        Ok(())
    }
}

/// Ledger that records what it was asked to save, or fails every call.
#[derive(Debug, Clone, Default)]
pub struct FakeLedger {
    saved: Arc<Mutex<Vec<TransactionRecord>>>,
    fail: bool,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<TransactionRecord> {
        self.saved.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn save_transaction(&self, record: &TransactionRecord) -> Result<LedgerReceipt, LedgerError> {
        if self.fail {
            return Err(LedgerError::Request("Database error".to_string()));
        }
        let mut saved = self.saved.lock().unwrap();
        saved.push(record.clone());
        Ok(LedgerReceipt {
            id: Some(format!("txn-{}", saved.len())),
            amount_minor: to_minor_units(record.amount).unwrap(),
        })
    }
}

pub fn pipeline<L: LedgerClient>(ledger: L) -> IngestionPipeline<L> {
    IngestionPipeline::new(Box::new(PekaoParser::new(ACCOUNT)), ledger)
}

pub fn handler<L: LedgerClient>(ledger: L) -> Arc<MessageHandler<L>> {
    Arc::new(MessageHandler::new(pipeline(ledger)))
}
