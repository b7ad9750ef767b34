//! Core data types shared across crates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Where a message should be delivered.
///
/// The scheduler treats a target as opaque: it only ever encodes it
/// canonically (see `apodbot_scheduler::codec`) and compares encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Messaging platform, e.g. "telegram".
    pub platform: String,
    /// Chat / channel / user id on that platform.
    pub id: String,
    /// Parent container (guild, group) when the platform has one.
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub channel: bool,
    #[serde(default)]
    pub private: bool,
    /// Identity of the bot account that owns the conversation.
    #[serde(default)]
    pub self_id: Option<String>,
    /// Platform-specific extras.
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Target {
    pub fn new(platform: &str, id: &str) -> Self {
        Self {
            platform: platform.to_string(),
            id: id.to_string(),
            parent_id: String::new(),
            channel: false,
            private: false,
            self_id: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_self_id(mut self, self_id: &str) -> Self {
        self.self_id = Some(self_id.to_string());
        self
    }

    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.self_id {
            Some(bot) => write!(f, "{}:{}@{}", self.platform, self.id, bot),
            None => write!(f, "{}:{}", self.platform, self.id),
        }
    }
}

/// Media kind of an APOD entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    #[serde(other)]
    Other,
}

/// A NASA Astronomy Picture of the Day record.
///
/// Unknown fields are kept in `extra` so the cache file stays a faithful copy
/// of what the API returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PictureOfDay {
    pub title: String,
    pub explanation: String,
    pub date: String,
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdurl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PictureOfDay {
    /// The still-image URL, or `None` when the entry is a video or has no url.
    pub fn image_url(&self) -> Option<&str> {
        match (&self.media_type, &self.url) {
            (MediaType::Image, Some(url)) => Some(url.as_str()),
            _ => None,
        }
    }

    /// HD url when requested and present, otherwise the regular url.
    pub fn preferred_url(&self, hd: bool) -> Option<&str> {
        if hd && let Some(hd_url) = self.hdurl.as_deref() {
            return Some(hd_url);
        }
        self.url.as_deref()
    }
}

/// One piece of an outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    ImageUrl(String),
    ImageBytes(Vec<u8>),
}

/// A message to send to a [`Target`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutgoingMessage {
    pub segments: Vec<Segment>,
    /// Platform message id this message replies to.
    pub reply_to: Option<String>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Text(text.into())],
            reply_to: None,
        }
    }

    pub fn push(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn replying_to(mut self, message_id: Option<String>) -> Self {
        self.reply_to = message_id;
        self
    }

    /// Whether the message carries any image segment.
    pub fn has_image(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::ImageUrl(_) | Segment::ImageBytes(_)))
    }
}

/// Receipt of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReceipt {
    pub message_id: String,
}

/// Chat type of an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadType {
    Direct,
    Group,
}

/// A message received from a messaging platform.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub channel: String,
    pub thread_id: String,
    pub message_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub content: String,
    pub thread_type: ThreadType,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Id of the message this one replies to.
    pub reply_to: Option<String>,
    /// Bot account that received the message.
    pub bot_id: Option<String>,
}

impl IncomingMessage {
    /// The conversation this message came from, as a delivery target.
    pub fn target(&self) -> Target {
        let mut target = Target::new(&self.channel, &self.thread_id)
            .private(self.thread_type == ThreadType::Direct);
        target.self_id = self.bot_id.clone();
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "title": "M31",
            "explanation": "Andromeda.",
            "date": "2024-01-02",
            "media_type": "image",
            "url": "https://apod.nasa.gov/a.jpg",
            "hdurl": "https://apod.nasa.gov/a_hd.jpg",
            "service_version": "v1"
        }"#
    }

    #[test]
    fn test_picture_keeps_unknown_fields() {
        let pic: PictureOfDay = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(pic.media_type, MediaType::Image);
        assert_eq!(pic.extra["service_version"], "v1");
        let back = serde_json::to_value(&pic).unwrap();
        assert_eq!(back["service_version"], "v1");
        assert!(back.get("copyright").is_none());
    }

    #[test]
    fn test_video_has_no_image_url() {
        let mut pic: PictureOfDay = serde_json::from_str(sample_json()).unwrap();
        assert!(pic.image_url().is_some());
        pic.media_type = MediaType::Video;
        assert!(pic.image_url().is_none());
    }

    #[test]
    fn test_unknown_media_type() {
        let json = sample_json().replace("\"image\"", "\"interactive\"");
        let pic: PictureOfDay = serde_json::from_str(&json).unwrap();
        assert_eq!(pic.media_type, MediaType::Other);
    }

    #[test]
    fn test_preferred_url() {
        let mut pic: PictureOfDay = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(pic.preferred_url(true), Some("https://apod.nasa.gov/a_hd.jpg"));
        assert_eq!(pic.preferred_url(false), Some("https://apod.nasa.gov/a.jpg"));
        pic.hdurl = None;
        assert_eq!(pic.preferred_url(true), Some("https://apod.nasa.gov/a.jpg"));
    }

    #[test]
    fn test_incoming_target() {
        let msg = IncomingMessage {
            channel: "telegram".into(),
            thread_id: "42".into(),
            message_id: "7".into(),
            sender_id: "1".into(),
            sender_name: None,
            content: "/apod_today".into(),
            thread_type: ThreadType::Direct,
            timestamp: chrono::Utc::now(),
            reply_to: None,
            bot_id: Some("999".into()),
        };
        let target = msg.target();
        assert_eq!(target.to_string(), "telegram:42@999");
        assert!(target.private);
    }
}
