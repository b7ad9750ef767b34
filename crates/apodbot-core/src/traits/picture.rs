//! Picture source, translation and rendering collaborators.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::types::PictureOfDay;

/// Remote Astronomy Picture of the Day archive.
#[async_trait]
pub trait PictureSource: Send + Sync {
    /// Today's entry.
    async fn fetch_today(&self) -> Result<PictureOfDay>;

    /// The entry for a given date; `Ok(None)` when the archive has nothing for it.
    async fn fetch_by_date(&self, date: NaiveDate) -> Result<Option<PictureOfDay>>;

    /// One random entry; `Ok(None)` when the archive returned nothing.
    async fn fetch_random(&self) -> Result<Option<PictureOfDay>>;
}

/// Text translation backend.
#[async_trait]
pub trait Translator: Send + Sync {
    fn name(&self) -> &str;

    async fn translate(&self, text: &str) -> Result<String>;
}

/// Turns an HTML document plus stylesheet into PNG bytes.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, html: &str, css: &str, width: u32) -> Result<Vec<u8>>;
}
