//! # apodbot delivery
//!
//! Turns "send today's picture to this target" into messages: the daily
//! caches, puzzle-mode composition, reply metadata and the
//! [`DeliveryPipeline`] that the scheduler and chat commands both drive.

pub mod argot;
pub mod cache;
pub mod compose;
pub mod pipeline;

pub use argot::{ArgotStore, EXPLAIN, ORIGINAL, keyword_for};
pub use cache::{ComposedImageCache, PictureCache};
pub use compose::Composer;
pub use pipeline::{DeliveryOutcome, DeliveryPipeline, PictureCommand, Trigger};
