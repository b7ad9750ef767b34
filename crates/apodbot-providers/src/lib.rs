//! # apodbot providers
//!
//! Concrete collaborators: the NASA APOD client, translation backends and the
//! HTML render service client.

pub mod nasa;
pub mod render;
pub mod translate;

pub use nasa::ApodClient;
pub use render::{HtmlRenderClient, stylesheet};
pub use translate::{BaiduTranslator, DeepLTranslator, IdentityTranslator, build_translator};
