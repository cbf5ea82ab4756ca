//! Slack Web API transport.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use super::{ChatTarget, ChatTransport};
use crate::errors::TransportError;

const SLACK_API_URL: &str = "https://slack.com/api";
const CHANNEL_TYPES: &str = "public_channel,private_channel";

/// Every Web API response carries `ok` and, on failure, `error`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: Option<T>,
}

#[derive(Debug, Deserialize)]
struct OpenedConversation {
    channel: ChannelRef,
}

#[derive(Debug, Deserialize)]
struct ChannelRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChannelList {
    #[serde(default)]
    channels: Vec<ListedChannel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ListedChannel {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct Empty {}

pub struct SlackTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl SlackTransport {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(SLACK_API_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        target: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, TransportError> {
        let request_error = |source| TransportError::Request {
            target: target.to_string(),
            source,
        };
        let envelope: Envelope<T> = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(request_error)?
            .error_for_status()
            .map_err(request_error)?
            .json()
            .await
            .map_err(request_error)?;

        match (envelope.ok, envelope.body) {
            (true, Some(body)) => Ok(body),
            (_, _) => Err(TransportError::Api {
                target: target.to_string(),
                error: envelope
                    .error
                    .unwrap_or_else(|| "unknown_error".to_string()),
            }),
        }
    }

    async fn post_message(&self, channel: &str, text: &str) -> Result<(), TransportError> {
        let url = format!("{}/chat.postMessage", self.base_url);
        self.call::<Empty>(
            channel,
            self.client
                .post(url)
                .json(&json!({ "channel": channel, "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn open_direct(&self, user: &str) -> Result<String, TransportError> {
        let url = format!("{}/conversations.open", self.base_url);
        let opened: OpenedConversation = self
            .call(user, self.client.post(url).json(&json!({ "users": user })))
            .await?;
        Ok(opened.channel.id)
    }

    /// Look a channel id up by name, following pagination.
    async fn find_channel(&self, name: &str) -> Result<Option<String>, TransportError> {
        let url = format!("{}/conversations.list", self.base_url);
        let mut cursor = String::new();
        loop {
            let mut request = self
                .client
                .get(&url)
                .query(&[("types", CHANNEL_TYPES), ("limit", "200")]);
            if !cursor.is_empty() {
                request = request.query(&[("cursor", &cursor)]);
            }
            let page: ChannelList = self.call(name, request).await?;
            if let Some(channel) = page.channels.into_iter().find(|c| c.name == name) {
                return Ok(Some(channel.id));
            }
            cursor = page
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                return Ok(None);
            }
        }
    }

    async fn post_to_channel(&self, channel: &str, text: &str) -> Result<(), TransportError> {
        let name = channel.trim_start_matches('#');
        match self.post_message(name, text).await {
            Err(TransportError::Api { error, .. }) if error == "channel_not_found" => {
                debug!(channel = name, "Channel not found by name, listing channels");
                let Some(id) = self.find_channel(name).await? else {
                    return Err(TransportError::Api {
                        target: channel.to_string(),
                        error,
                    });
                };
                self.post_message(&id, text).await?;
                info!(channel = name, id = %id, "Posted to channel by id");
                Ok(())
            }
            other => other,
        }
    }
}

#[async_trait]
impl ChatTransport for SlackTransport {
    async fn send(&self, target: &ChatTarget, text: &str) -> Result<(), TransportError> {
        match target {
            ChatTarget::User(user) => {
                let channel = self.open_direct(user).await?;
                self.post_message(&channel, text).await
            }
            ChatTarget::Channel(channel) => self.post_to_channel(channel, text).await,
        }
    }
}
