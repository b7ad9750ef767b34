//! Messenger trait — a live bot connection that can deliver messages.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{OutgoingMessage, SentReceipt, Target};

/// A connected bot account on some platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Platform name, matched against [`Target::platform`].
    fn platform(&self) -> &str;

    /// Bot account identity, matched against [`Target::self_id`].
    fn self_id(&self) -> &str;

    /// Deliver a message and return the platform id of the last message sent.
    async fn send(&self, target: &Target, message: OutgoingMessage) -> Result<SentReceipt>;
}
