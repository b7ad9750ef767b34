//! Reply metadata ("argot") — extra content attached to a sent message and
//! handed out when someone replies to that message with the keyword.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use apodbot_core::types::{Segment, Target};
use parking_lot::Mutex;

/// Keyword that retrieves the translated explanation.
pub const EXPLAIN: &str = "explain";
/// Keyword that retrieves the original image.
pub const ORIGINAL: &str = "original";

/// Map a reply text to an argot keyword. Accepts the Chinese aliases.
pub fn keyword_for(text: &str) -> Option<&'static str> {
    match text.trim() {
        "explain" | "简介" => Some(EXPLAIN),
        "original" | "原图" => Some(ORIGINAL),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Argot {
    pub name: String,
    pub keyword: String,
    pub segment: Segment,
    pub expires_at: Instant,
}

type ArgotKey = (String, String, String);

/// Argots keyed by `(conversation, message id, keyword)`.
#[derive(Default)]
pub struct ArgotStore {
    entries: Mutex<HashMap<ArgotKey, Argot>>,
}

impl ArgotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(target: &Target, message_id: &str, keyword: &str) -> ArgotKey {
        (target.to_string(), message_id.to_string(), keyword.to_string())
    }

    /// Attach `segment` to a sent message for `ttl`.
    pub fn attach(
        &self,
        target: &Target,
        message_id: &str,
        name: &str,
        keyword: &str,
        segment: Segment,
        ttl: Duration,
    ) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, argot| argot.expires_at > now);
        entries.insert(
            Self::key(target, message_id, keyword),
            Argot {
                name: name.to_string(),
                keyword: keyword.to_string(),
                segment,
                expires_at: now + ttl,
            },
        );
    }

    pub fn lookup(&self, target: &Target, message_id: &str, keyword: &str) -> Option<Argot> {
        self.lookup_at(target, message_id, keyword, Instant::now())
    }

    /// Lookup as of `now`. Expired entries are removed and never returned.
    pub fn lookup_at(
        &self,
        target: &Target,
        message_id: &str,
        keyword: &str,
        now: Instant,
    ) -> Option<Argot> {
        let key = Self::key(target, message_id, keyword);
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(argot) if argot.expires_at > now => Some(argot.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
