//! # apodbot core
//!
//! Shared building blocks for the apodbot workspace: configuration, the
//! error taxonomy, data types, and the collaborator traits that keep the
//! scheduler and delivery pipeline independent of concrete services.

pub mod config;
pub mod error;
pub mod registry;
pub mod time;
pub mod traits;
pub mod types;

pub use config::ApodConfig;
pub use error::{ApodError, Result};
pub use registry::BotRegistry;
pub use time::{SendTime, is_valid_date_format, is_valid_time_format, parse_apod_date};
pub use types::{
    IncomingMessage, MediaType, OutgoingMessage, PictureOfDay, Segment, SentReceipt, Target,
    ThreadType,
};
