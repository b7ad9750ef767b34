//! Telegram Bot channel — long polling plus text/photo sending via the Bot API.

use std::pin::Pin;
use std::task::{Context, Poll};

use apodbot_core::config::TelegramChannelConfig;
use apodbot_core::error::{ApodError, Result};
use apodbot_core::traits::Messenger;
use apodbot_core::types::{
    IncomingMessage, OutgoingMessage, Segment, SentReceipt, Target, ThreadType,
};
use async_trait::async_trait;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};

/// Telegram caps photo captions at 1024 characters.
const CAPTION_LIMIT: usize = 1024;

/// A connected Telegram bot account.
#[derive(Clone)]
pub struct TelegramChannel {
    config: TelegramChannelConfig,
    client: reqwest::Client,
    self_id: String,
}

impl TelegramChannel {
    /// Resolve the bot identity with `getMe` and return a ready channel.
    pub async fn connect(config: TelegramChannelConfig) -> Result<Self> {
        let mut channel = Self {
            config,
            client: reqwest::Client::new(),
            self_id: String::new(),
        };
        let me = channel.get_me().await?;
        tracing::info!(
            "🤖 Telegram bot: @{} ({})",
            me.username.as_deref().unwrap_or("unknown"),
            me.first_name
        );
        channel.self_id = me.id.to_string();
        Ok(channel)
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{}",
            self.config.bot_token, method
        )
    }

    /// Get updates after `offset` using long polling.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", (offset + 1).to_string()),
                ("timeout", "30".into()),
                ("allowed_updates", "[\"message\"]".into()),
            ])
            .send()
            .await
            .map_err(|e| ApodError::Channel(format!("Telegram getUpdates failed: {e}")))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| ApodError::Channel(format!("Invalid Telegram response: {e}")))?;
        body.into_result("getUpdates")
    }

    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ApodError::Channel(format!("getMe failed: {e}")))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| ApodError::Channel(format!("Invalid getMe response: {e}")))?;
        body.into_result("getMe")
    }

    /// Send a plain text message.
    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<TelegramMessage> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(id) = reply_to {
            body["reply_to_message_id"] = serde_json::Value::String(id.to_string());
        }

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApodError::Channel(format!("sendMessage failed: {e}")))?;
        let result: TelegramApiResponse<TelegramMessage> = response
            .json()
            .await
            .map_err(|e| ApodError::Channel(format!("Invalid send response: {e}")))?;
        result.into_result("sendMessage")
    }

    /// Send a photo by URL or as uploaded bytes.
    pub async fn send_photo(
        &self,
        chat_id: &str,
        photo: &Segment,
        caption: Option<&str>,
        reply_to: Option<&str>,
    ) -> Result<TelegramMessage> {
        let request = self.client.post(self.api_url("sendPhoto"));
        let request = match photo {
            Segment::ImageUrl(url) => {
                let mut body = serde_json::json!({ "chat_id": chat_id, "photo": url });
                if let Some(caption) = caption {
                    body["caption"] = caption.into();
                }
                if let Some(id) = reply_to {
                    body["reply_to_message_id"] = id.into();
                }
                request.json(&body)
            }
            Segment::ImageBytes(bytes) => {
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name("apod.png")
                    .mime_str("image/png")
                    .map_err(|e| ApodError::Channel(format!("Invalid photo part: {e}")))?;
                let mut form = reqwest::multipart::Form::new()
                    .text("chat_id", chat_id.to_string())
                    .part("photo", part);
                if let Some(caption) = caption {
                    form = form.text("caption", caption.to_string());
                }
                if let Some(id) = reply_to {
                    form = form.text("reply_to_message_id", id.to_string());
                }
                request.multipart(form)
            }
            Segment::Text(_) => {
                return Err(ApodError::Channel("sendPhoto called with a text segment".into()));
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| ApodError::Channel(format!("sendPhoto failed: {e}")))?;
        let result: TelegramApiResponse<TelegramMessage> = response
            .json()
            .await
            .map_err(|e| ApodError::Channel(format!("Invalid sendPhoto response: {e}")))?;
        result.into_result("sendPhoto")
    }

    /// Spawn the polling loop and return its stream of incoming messages.
    pub fn start_polling(&self) -> TelegramPollingStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let channel = self.clone();

        tokio::spawn(async move {
            let mut offset = 0;
            tracing::info!("📡 Telegram polling loop started");

            loop {
                match channel.get_updates(offset).await {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id);
                            if let Some(msg) = update.to_incoming(&channel.self_id)
                                && tx.send(msg).is_err()
                            {
                                tracing::info!("Telegram polling stopped (receiver dropped)");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Telegram polling error: {e}");
                        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                    }
                }

                tokio::time::sleep(tokio::time::Duration::from_secs(
                    channel.config.poll_interval,
                ))
                .await;
            }
        });

        TelegramPollingStream { rx }
    }
}

/// Stream of incoming Telegram messages from polling.
pub struct TelegramPollingStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<IncomingMessage>,
}

impl Stream for TelegramPollingStream {
    type Item = IncomingMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// One Bot API call planned from an [`OutgoingMessage`].
#[derive(Debug, PartialEq)]
enum Call<'a> {
    Text(String),
    Photo {
        photo: &'a Segment,
        caption: Option<String>,
    },
}

/// Text before an image becomes its caption when it fits; otherwise it is
/// sent as its own message first.
fn plan_calls(message: &OutgoingMessage) -> Vec<Call<'_>> {
    let mut calls = Vec::new();
    let mut pending = String::new();

    for segment in &message.segments {
        match segment {
            Segment::Text(text) => pending.push_str(text),
            image => {
                let caption = if pending.is_empty() {
                    None
                } else if pending.chars().count() <= CAPTION_LIMIT {
                    Some(std::mem::take(&mut pending))
                } else {
                    calls.push(Call::Text(std::mem::take(&mut pending)));
                    None
                };
                calls.push(Call::Photo {
                    photo: image,
                    caption,
                });
            }
        }
    }
    if !pending.is_empty() {
        calls.push(Call::Text(pending));
    }
    calls
}

#[async_trait]
impl Messenger for TelegramChannel {
    fn platform(&self) -> &str {
        "telegram"
    }

    fn self_id(&self) -> &str {
        &self.self_id
    }

    async fn send(&self, target: &Target, message: OutgoingMessage) -> Result<SentReceipt> {
        let mut reply_to = message.reply_to.clone();
        let mut last = None;

        for call in plan_calls(&message) {
            let sent = match call {
                Call::Text(text) => {
                    self.send_message(&target.id, &text, reply_to.as_deref())
                        .await?
                }
                Call::Photo { photo, caption } => {
                    self.send_photo(&target.id, photo, caption.as_deref(), reply_to.as_deref())
                        .await?
                }
            };
            reply_to = None;
            last = Some(sent.message_id);
        }

        last.map(|id| SentReceipt {
            message_id: id.to_string(),
        })
        .ok_or_else(|| ApodError::Channel("Refusing to send an empty message".into()))
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

impl<T> TelegramApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        if !self.ok {
            return Err(ApodError::Channel(format!(
                "Telegram {method} error: {}",
                self.description.unwrap_or_default()
            )));
        }
        self.result
            .ok_or_else(|| ApodError::Channel(format!("Telegram {method} returned no result")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub date: i64,
    pub reply_to_message: Option<Box<TelegramMessage>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
}

impl TelegramUpdate {
    /// Convert to an [`IncomingMessage`] received by bot `bot_id`.
    pub fn to_incoming(&self, bot_id: &str) -> Option<IncomingMessage> {
        let msg = self.message.as_ref()?;
        let text = msg.text.as_ref()?;
        let from = msg.from.as_ref()?;

        if from.is_bot {
            return None;
        }

        Some(IncomingMessage {
            channel: "telegram".into(),
            thread_id: msg.chat.id.to_string(),
            message_id: msg.message_id.to_string(),
            sender_id: from.id.to_string(),
            sender_name: Some(format!(
                "{}{}",
                from.first_name,
                from.last_name
                    .as_deref()
                    .map(|l| format!(" {l}"))
                    .unwrap_or_default()
            )),
            content: text.clone(),
            thread_type: match msg.chat.chat_type.as_str() {
                "private" => ThreadType::Direct,
                _ => ThreadType::Group,
            },
            timestamp: chrono::DateTime::from_timestamp(msg.date, 0)
                .unwrap_or_else(chrono::Utc::now),
            reply_to: msg
                .reply_to_message
                .as_ref()
                .map(|r| r.message_id.to_string()),
            bot_id: (!bot_id.is_empty()).then(|| bot_id.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> TelegramUpdate {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_update_to_incoming_group_reply() {
        let upd = update(
            r#"{"update_id": 7, "message": {
                "message_id": 42,
                "from": {"id": 100, "is_bot": false, "first_name": "Ada", "last_name": "L"},
                "chat": {"id": -5001, "type": "supergroup", "title": "Stars"},
                "text": "explain",
                "date": 1700000000,
                "reply_to_message": {
                    "message_id": 41,
                    "chat": {"id": -5001, "type": "supergroup"},
                    "date": 1699999990
                }
            }}"#,
        );
        let msg = upd.to_incoming("999").unwrap();
        assert_eq!(msg.thread_id, "-5001");
        assert_eq!(msg.message_id, "42");
        assert_eq!(msg.sender_name.as_deref(), Some("Ada L"));
        assert_eq!(msg.thread_type, ThreadType::Group);
        assert_eq!(msg.reply_to.as_deref(), Some("41"));
        assert_eq!(msg.bot_id.as_deref(), Some("999"));
        assert_eq!(msg.timestamp.timestamp(), 1700000000);

        let target = msg.target();
        assert_eq!(target.id, "-5001");
        assert_eq!(target.self_id.as_deref(), Some("999"));
        assert!(!target.private);
    }

    #[test]
    fn test_bot_and_non_text_updates_skipped() {
        let from_bot = update(
            r#"{"update_id": 1, "message": {
                "message_id": 1,
                "from": {"id": 1, "is_bot": true, "first_name": "B"},
                "chat": {"id": 1, "type": "private"},
                "text": "hi", "date": 0
            }}"#,
        );
        assert!(from_bot.to_incoming("9").is_none());

        let sticker = update(
            r#"{"update_id": 2, "message": {
                "message_id": 2,
                "from": {"id": 1, "is_bot": false, "first_name": "U"},
                "chat": {"id": 1, "type": "private"},
                "date": 0
            }}"#,
        );
        assert!(sticker.to_incoming("9").is_none());
    }

    #[test]
    fn test_plan_caption_fits() {
        let msg = OutgoingMessage::text("Title\n")
            .push(Segment::ImageUrl("https://x/y.jpg".into()));
        let calls = plan_calls(&msg);
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            &calls[0],
            Call::Photo { caption: Some(c), .. } if c == "Title\n"
        ));
    }

    #[test]
    fn test_plan_long_text_goes_first() {
        let long = "x".repeat(CAPTION_LIMIT + 1);
        let msg = OutgoingMessage::text(long.clone())
            .push(Segment::ImageBytes(vec![1, 2, 3]))
            .push(Segment::Text("tail".into()));
        let calls = plan_calls(&msg);
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], Call::Text(long));
        assert!(matches!(&calls[1], Call::Photo { caption: None, .. }));
        assert_eq!(calls[2], Call::Text("tail".into()));
    }

    #[test]
    fn test_api_error_maps_to_channel() {
        let resp: TelegramApiResponse<TelegramMessage> =
            serde_json::from_str(r#"{"ok": false, "description": "chat not found"}"#).unwrap();
        let err = resp.into_result("sendMessage").unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }
}
