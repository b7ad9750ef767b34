//! Day-scoped caches: today's APOD record on disk and the composed card in memory.
//!
//! Both are cleared by the cache janitor. Each has its own lock so eviction
//! never interleaves with a read or refill.

use std::path::{Path, PathBuf};

use apodbot_core::error::Result;
use apodbot_core::traits::PictureSource;
use apodbot_core::types::PictureOfDay;
use tokio::sync::Mutex;

/// Cache file name inside the cache directory.
pub const PICTURE_CACHE_FILE: &str = "apod.json";

/// Today's APOD record, persisted as `apod.json`.
pub struct PictureCache {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PictureCache {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(PICTURE_CACHE_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached record, if any. An unreadable file counts as a miss.
    pub async fn get(&self) -> Option<PictureOfDay> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    /// Return the cached record, fetching today's entry on a miss.
    ///
    /// A failed cache write is logged; the fetched record is still returned.
    pub async fn ensure(&self, source: &dyn PictureSource) -> Result<PictureOfDay> {
        let _guard = self.lock.lock().await;
        if let Some(picture) = self.read().await {
            return Ok(picture);
        }

        let picture = source.fetch_today().await?;
        if let Err(e) = self.write(&picture).await {
            tracing::warn!("Failed to cache today's APOD: {e}");
        }
        Ok(picture)
    }

    /// Delete the cache file. Returns whether there was anything to delete.
    pub async fn evict(&self) -> bool {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!("Failed to remove {}: {e}", self.path.display());
                false
            }
        }
    }

    async fn read(&self) -> Option<PictureOfDay> {
        let content = tokio::fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(picture) => Some(picture),
            Err(e) => {
                tracing::warn!("Ignoring unreadable APOD cache: {e}");
                None
            }
        }
    }

    async fn write(&self, picture: &PictureOfDay) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(picture)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Rendered PNG of today's card, tagged with the APOD date it was rendered
/// from. At most one entry.
#[derive(Default)]
pub struct ComposedImageCache {
    slot: Mutex<Option<ComposedCard>>,
}

struct ComposedCard {
    date: String,
    bytes: Vec<u8>,
}

impl ComposedImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The card rendered from the entry dated `date`. A card for any other
    /// date is a miss.
    pub async fn get(&self, date: &str) -> Option<Vec<u8>> {
        self.slot
            .lock()
            .await
            .as_ref()
            .filter(|card| card.date == date)
            .map(|card| card.bytes.clone())
    }

    pub async fn set(&self, date: &str, bytes: Vec<u8>) {
        *self.slot.lock().await = Some(ComposedCard {
            date: date.to_string(),
            bytes,
        });
    }

    pub async fn evict(&self) -> bool {
        self.slot.lock().await.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apodbot_core::error::ApodError;
    use apodbot_core::types::MediaType;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl PictureSource for CountingSource {
        async fn fetch_today(&self) -> Result<PictureOfDay> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApodError::Fetch("offline".into()));
            }
            Ok(PictureOfDay {
                title: "M31".into(),
                explanation: "Andromeda.".into(),
                date: "2024-01-01".into(),
                media_type: MediaType::Image,
                url: Some("https://apod/m31.jpg".into()),
                hdurl: None,
                copyright: None,
                extra: serde_json::Map::new(),
            })
        }

        async fn fetch_by_date(&self, _: NaiveDate) -> Result<Option<PictureOfDay>> {
            Ok(None)
        }

        async fn fetch_random(&self) -> Result<Option<PictureOfDay>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_ensure_fetches_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PictureCache::new(dir.path());
        let source = CountingSource::default();

        assert!(cache.get().await.is_none());
        let first = cache.ensure(&source).await.unwrap();
        let second = cache.ensure(&source).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(cache.path().exists());
    }

    #[tokio::test]
    async fn test_evict_forces_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PictureCache::new(dir.path());
        let source = CountingSource::default();

        cache.ensure(&source).await.unwrap();
        assert!(cache.evict().await);
        assert!(!cache.evict().await);
        cache.ensure(&source).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_cache_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PictureCache::new(dir.path());
        let source = CountingSource {
            fail: true,
            ..Default::default()
        };
        assert!(matches!(cache.ensure(&source).await, Err(ApodError::Fetch(_))));
        assert!(!cache.path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PictureCache::new(dir.path());
        std::fs::write(cache.path(), "{ nope").unwrap();
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_composed_cache() {
        let cache = ComposedImageCache::new();
        assert!(cache.get("2024-01-01").await.is_none());
        cache.set("2024-01-01", vec![1, 2]).await;
        assert_eq!(cache.get("2024-01-01").await, Some(vec![1, 2]));
        assert!(cache.evict().await);
        assert!(cache.get("2024-01-01").await.is_none());
    }

    #[tokio::test]
    async fn test_composed_cache_misses_on_other_date() {
        let cache = ComposedImageCache::new();
        cache.set("2024-01-01", vec![1]).await;
        assert!(cache.get("2024-01-02").await.is_none());

        cache.set("2024-01-02", vec![2]).await;
        assert!(cache.get("2024-01-01").await.is_none());
        assert_eq!(cache.get("2024-01-02").await, Some(vec![2]));
    }
}
