//! Bot registry: maps a target's sending identity to a live messenger.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::traits::Messenger;
use crate::types::Target;

/// Live bot connections keyed by `(platform, self_id)`.
#[derive(Default)]
pub struct BotRegistry {
    bots: RwLock<HashMap<(String, String), Arc<dyn Messenger>>>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a connected bot.
    pub async fn register(&self, bot: Arc<dyn Messenger>) {
        let key = (bot.platform().to_string(), bot.self_id().to_string());
        tracing::info!("🤖 Bot online: {}:{}", key.0, key.1);
        self.bots.write().await.insert(key, bot);
    }

    /// Drop a bot that went offline.
    pub async fn unregister(&self, platform: &str, self_id: &str) {
        let key = (platform.to_string(), self_id.to_string());
        if self.bots.write().await.remove(&key).is_some() {
            tracing::info!("🔌 Bot offline: {platform}:{self_id}");
        }
    }

    /// Find the bot that should deliver to `target`.
    ///
    /// Targets without a `self_id` fall back to any bot on the same platform.
    pub async fn resolve(&self, target: &Target) -> Option<Arc<dyn Messenger>> {
        let bots = self.bots.read().await;
        match &target.self_id {
            Some(self_id) => bots
                .get(&(target.platform.clone(), self_id.clone()))
                .cloned(),
            None => bots
                .iter()
                .find(|((platform, _), _)| *platform == target.platform)
                .map(|(_, bot)| Arc::clone(bot)),
        }
    }

    pub async fn len(&self) -> usize {
        self.bots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bots.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::types::{OutgoingMessage, SentReceipt};
    use async_trait::async_trait;

    struct FakeBot(&'static str);

    #[async_trait]
    impl Messenger for FakeBot {
        fn platform(&self) -> &str {
            "telegram"
        }
        fn self_id(&self) -> &str {
            self.0
        }
        async fn send(&self, _target: &Target, _message: OutgoingMessage) -> Result<SentReceipt> {
            Ok(SentReceipt { message_id: "1".into() })
        }
    }

    #[tokio::test]
    async fn test_resolve_by_self_id() {
        let registry = BotRegistry::new();
        registry.register(Arc::new(FakeBot("100"))).await;
        registry.register(Arc::new(FakeBot("200"))).await;

        let target = Target::new("telegram", "42").with_self_id("200");
        let bot = registry.resolve(&target).await.unwrap();
        assert_eq!(bot.self_id(), "200");

        let missing = Target::new("telegram", "42").with_self_id("300");
        assert!(registry.resolve(&missing).await.is_none());

        let other_platform = Target::new("discord", "42").with_self_id("100");
        assert!(registry.resolve(&other_platform).await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_without_self_id_and_unregister() {
        let registry = BotRegistry::new();
        registry.register(Arc::new(FakeBot("100"))).await;
        let target = Target::new("telegram", "42");
        assert!(registry.resolve(&target).await.is_some());

        registry.unregister("telegram", "100").await;
        assert!(registry.is_empty().await);
        assert!(registry.resolve(&target).await.is_none());
    }
}
