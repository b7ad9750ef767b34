//! # apodbot channels
//!
//! Messaging platform adapters. Each adapter implements
//! [`Messenger`](apodbot_core::traits::Messenger) for outbound delivery and
//! exposes a stream of [`IncomingMessage`](apodbot_core::types::IncomingMessage)
//! for the command front-end.

pub mod telegram;

pub use telegram::{TelegramChannel, TelegramPollingStream};
