//! Discord REST adapter: resolves the notification channel, walks its history,
//! polls for new messages and places reactions.
//!
//! Only the HTTP API is used, so the bot needs the Message Content intent
//! enabled in the developer portal to see message text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bankfeed_core::{ChatChannel, ChatError, ChatMessage, MessageId, Reaction};
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_LENGTH};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Discord's maximum page size for message history.
const PAGE_SIZE: usize = 100;
const MAX_ATTEMPTS: u32 = 3;
const GUILD_TEXT: u8 = 0;
/// Discord's maximum page size for `/users/@me/guilds`.
const GUILD_PAGE_SIZE: usize = 200;

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireGuild {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    #[serde(default)]
    content: String,
    author: WireUser,
    #[serde(default)]
    reactions: Vec<WireReaction>,
}

#[derive(Debug, Deserialize)]
struct WireReaction {
    me: bool,
    emoji: WireEmoji,
}

#[derive(Debug, Deserialize)]
struct WireEmoji {
    id: Option<String>,
    name: Option<String>,
}

impl WireEmoji {
    /// Unicode emoji are their own name; custom emoji are `name:id`, as the reaction API expects.
    fn as_reaction_key(&self) -> String {
        match (&self.name, &self.id) {
            (Some(name), None) => name.clone(),
            (Some(name), Some(id)) => format!("{name}:{id}"),
            (None, Some(id)) => id.clone(),
            (None, None) => String::new(),
        }
    }
}

fn request_error(e: reqwest::Error) -> ChatError {
    ChatError::Request(e.to_string())
}

#[derive(Debug)]
struct Inner {
    http: reqwest::Client,
    base: Url,
    /// The bot's own user id.
    user_id: String,
}

impl Inner {
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ChatError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ChatError::Request(format!("{} cannot be a base url", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, ChatError> {
        let url = self.endpoint(segments)?;
        let mut attempt = 1;
        loop {
            let mut req = self.http.request(method.clone(), url.clone()).query(query);
            if method == Method::PUT {
                req = req.header(CONTENT_LENGTH, "0");
            }
            let resp = req.send().await.map_err(request_error)?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_ATTEMPTS {
                let wait = retry_after(resp).await;
                warn!(attempt, wait_ms = wait.as_millis() as u64, path = url.path(), "rate limited by discord");
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ChatError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            return Ok(resp);
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ChatError> {
        let resp = self.send(Method::GET, segments, query).await?;
        resp.json().await.map_err(|e| ChatError::Decode(e.to_string()))
    }
}

async fn retry_after(resp: reqwest::Response) -> Duration {
    #[derive(Deserialize)]
    struct RateLimited {
        retry_after: f64,
    }

    let secs = resp
        .json::<RateLimited>()
        .await
        .map(|r| r.retry_after)
        .unwrap_or(1.0);
    Duration::from_secs_f64(secs.clamp(0.0, 60.0))
}

/// Authenticated bot session.
#[derive(Debug, Clone)]
pub struct DiscordClient {
    inner: Arc<Inner>,
}

impl DiscordClient {
    /// Authenticate and learn the bot's own user id (needed to recognize its reactions and messages).
    pub async fn connect(token: &str, api_base: &str) -> Result<Self, ChatError> {
        let base = Url::parse(api_base)
            .map_err(|e| ChatError::Request(format!("invalid api base {api_base:?}: {e}")))?;

        let mut auth = HeaderValue::from_str(&format!("Bot {token}"))
            .map_err(|_| ChatError::Request("token is not a valid header value".to_string()))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("DiscordBot (bankfeed, ", env!("CARGO_PKG_VERSION"), ")"))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(request_error)?;

        let mut inner = Inner {
            http,
            base,
            user_id: String::new(),
        };
        let me: WireUser = inner.get_json(&["users", "@me"], &[]).await?;
        inner.user_id = me.id;
        debug!(user_id = %inner.user_id, "authenticated with discord");

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// First text channel called `name` in any guild the bot belongs to.
    pub async fn find_channel(&self, name: &str) -> Result<Option<DiscordChannel>, ChatError> {
        for guild in self.guilds().await? {
            let channels: Vec<WireChannel> = self
                .inner
                .get_json(&["guilds", &guild.id, "channels"], &[])
                .await?;
            let found = channels
                .into_iter()
                .find(|c| c.kind == GUILD_TEXT && c.name.as_deref() == Some(name));
            if let Some(channel) = found {
                debug!(guild = %guild.name, channel_id = %channel.id, "resolved channel");
                return Ok(Some(DiscordChannel {
                    inner: Arc::clone(&self.inner),
                    id: channel.id,
                    name: name.to_string(),
                }));
            }
        }
        Ok(None)
    }

    /// Every guild the bot belongs to, following `after=` pages.
    async fn guilds(&self) -> Result<Vec<WireGuild>, ChatError> {
        let mut all = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut query = vec![("limit", GUILD_PAGE_SIZE.to_string())];
            if let Some(id) = &after {
                query.push(("after", id.clone()));
            }
            let page: Vec<WireGuild> = self.inner.get_json(&["users", "@me", "guilds"], &query).await?;
            after = next_guild_cursor(&page);
            all.extend(page);
            if after.is_none() {
                return Ok(all);
            }
        }
    }
}

/// Where the next guild page starts, or `None` when `page` was the last one.
fn next_guild_cursor(page: &[WireGuild]) -> Option<String> {
    if page.len() < GUILD_PAGE_SIZE {
        return None;
    }
    page.iter()
        .filter_map(|g| g.id.parse::<u64>().ok())
        .max()
        .map(|id| id.to_string())
}

#[derive(Debug, Clone, Copy)]
enum Cursor {
    Start,
    Before(MessageId),
    Done,
}

#[derive(Debug, Clone)]
pub struct DiscordChannel {
    inner: Arc<Inner>,
    id: String,
    name: String,
}

impl DiscordChannel {
    async fn fetch(&self, query: &[(&str, String)]) -> Result<Vec<DiscordMessage>, ChatError> {
        let wire: Vec<WireMessage> = self
            .inner
            .get_json(&["channels", &self.id, "messages"], query)
            .await?;
        wire.into_iter()
            .map(|m| DiscordMessage::from_wire(&self.inner, &self.id, m))
            .collect()
    }

    /// Newest message id, the starting point for polling.
    pub async fn latest_message_id(&self) -> Result<Option<MessageId>, ChatError> {
        let newest = self.fetch(&[("limit", "1".to_string())]).await?;
        Ok(newest.first().map(|m| m.id))
    }

    /// Up to one page of messages newer than `after`, oldest first.
    pub async fn messages_after(&self, after: MessageId) -> Result<Vec<DiscordMessage>, ChatError> {
        let mut page = self
            .fetch(&[("after", after.to_string()), ("limit", PAGE_SIZE.to_string())])
            .await?;
        page.sort_by_key(|m| m.id);
        Ok(page)
    }

    async fn next_page(
        &self,
        cursor: Cursor,
    ) -> Result<Option<(Vec<DiscordMessage>, Cursor)>, ChatError> {
        let mut query = vec![("limit", PAGE_SIZE.to_string())];
        match cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start => {}
            Cursor::Before(id) => query.push(("before", id.to_string())),
        }

        let page = self.fetch(&query).await?;
        let next = match page.iter().map(|m| m.id).min() {
            Some(oldest) if page.len() == PAGE_SIZE => Cursor::Before(oldest),
            Some(_) => Cursor::Done,
            None => return Ok(None),
        };
        Ok(Some((page, next)))
    }
}

impl ChatChannel for DiscordChannel {
    type Message = DiscordMessage;

    fn name(&self) -> &str {
        &self.name
    }

    /// Newest to oldest, one page at a time.
    fn history(&self) -> BoxStream<'_, Result<DiscordMessage, ChatError>> {
        stream::try_unfold(Cursor::Start, move |cursor| self.next_page(cursor))
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, ChatError>)))
            .try_flatten()
            .boxed()
    }
}

#[derive(Debug, Clone)]
pub struct DiscordMessage {
    inner: Arc<Inner>,
    channel_id: String,
    id: MessageId,
    content: String,
    reactions: Vec<Reaction>,
    own: bool,
}

impl DiscordMessage {
    fn from_wire(inner: &Arc<Inner>, channel_id: &str, m: WireMessage) -> Result<Self, ChatError> {
        let id = m
            .id
            .parse()
            .map(MessageId)
            .map_err(|_| ChatError::Decode(format!("message id {:?}", m.id)))?;
        Ok(Self {
            inner: Arc::clone(inner),
            channel_id: channel_id.to_string(),
            id,
            own: m.author.id == inner.user_id,
            reactions: m
                .reactions
                .iter()
                .map(|r| Reaction::new(r.emoji.as_reaction_key(), r.me))
                .collect(),
            content: m.content,
        })
    }
}

#[async_trait]
impl ChatMessage for DiscordMessage {
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
        let id = self.id.to_string();
        self.inner
            .send(
                Method::PUT,
                &["channels", &self.channel_id, "messages", &id, "reactions", emoji, "@me"],
                &[],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankfeed_core::{is_marked, MARKER};

    fn inner() -> Arc<Inner> {
        Arc::new(Inner {
            http: reqwest::Client::new(),
            base: Url::parse(DEFAULT_API_BASE).unwrap(),
            user_id: "42".to_string(),
        })
    }

    #[test]
    fn test_reaction_endpoint_is_percent_encoded() {
        let url = inner()
            .endpoint(&["channels", "1", "messages", "2", "reactions", MARKER, "@me"])
            .unwrap();
        assert!(url.as_str().starts_with("https://discord.com/api/v10/channels/1/messages/2/reactions/"));
        assert!(url.path().contains("%E2%9C%85"), "{url}");
        assert!(url.path().ends_with("/@me"), "{url}");
    }

    #[test]
    fn test_trailing_slash_in_base() {
        let inner = Inner {
            http: reqwest::Client::new(),
            base: Url::parse("http://localhost:8080/api/").unwrap(),
            user_id: String::new(),
        };
        let url = inner.endpoint(&["users", "@me"]).unwrap();
        assert_eq!(url.path(), "/api/users/@me");
    }

    #[test]
    fn test_decodes_message_with_reactions() {
        let wire: WireMessage = serde_json::from_str(
            r#"{
                "id": "1287849200000000000",
                "content": "Title: Transakcja kartą",
                "author": {"id": "7", "username": "phone"},
                "reactions": [
                    {"count": 1, "me": true, "emoji": {"id": null, "name": "✅"}},
                    {"count": 2, "me": false, "emoji": {"id": "99", "name": "pekao"}}
                ]
            }"#,
        )
        .unwrap();

        let msg = DiscordMessage::from_wire(&inner(), "5", wire).unwrap();
        assert_eq!(msg.id(), MessageId(1_287_849_200_000_000_000));
        assert!(!msg.is_own());
        assert_eq!(msg.reactions()[1].emoji, "pekao:99");
        assert!(is_marked(msg.reactions()));
    }

    #[test]
    fn test_own_message_and_missing_reactions() {
        let wire: WireMessage =
            serde_json::from_str(r#"{"id": "10", "content": "", "author": {"id": "42"}}"#).unwrap();

        let msg = DiscordMessage::from_wire(&inner(), "5", wire).unwrap();
        assert!(msg.is_own());
        assert!(msg.reactions().is_empty());
    }

    fn guild_page(first: u64, len: usize) -> Vec<WireGuild> {
        (first..first + len as u64)
            .map(|id| WireGuild {
                id: id.to_string(),
                name: format!("guild {id}"),
            })
            .collect()
    }

    #[test]
    fn test_full_guild_page_continues_after_highest_id() {
        let page = guild_page(1_000, GUILD_PAGE_SIZE);
        assert_eq!(next_guild_cursor(&page).as_deref(), Some("1199"));
    }

    #[test]
    fn test_short_guild_page_is_last() {
        assert_eq!(next_guild_cursor(&guild_page(1, 3)), None);
        assert_eq!(next_guild_cursor(&[]), None);
    }

    #[test]
    fn test_rejects_non_numeric_id() {
        let wire: WireMessage =
            serde_json::from_str(r#"{"id": "abc", "author": {"id": "1"}}"#).unwrap();
        assert!(matches!(
            DiscordMessage::from_wire(&inner(), "5", wire),
            Err(ChatError::Decode(_))
        ));
    }
}
