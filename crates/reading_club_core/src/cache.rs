//! crates/reading_club_core/src/cache.rs
//!
//! The per-subject content cache. Entries are permanent memos: created on the
//! first successful generation for a key and never overwritten or expired.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{CachedContent, ContentKind};
use crate::ports::{ContentCacheRepository, PortResult, PutOutcome};

#[derive(Clone)]
pub struct ContentCache {
    repo: Arc<dyn ContentCacheRepository>,
}

impl ContentCache {
    pub fn new(repo: Arc<dyn ContentCacheRepository>) -> Self {
        Self { repo }
    }

    pub async fn get(&self, subject_id: Uuid, kind: ContentKind) -> PortResult<Option<String>> {
        let cached = self.repo.find_cached_content(subject_id, kind).await?;
        Ok(cached.map(|c| c.text))
    }

    /// Stores `text` unless another writer already stored content for the key.
    pub async fn put(
        &self,
        subject_id: Uuid,
        kind: ContentKind,
        text: &str,
        model_id: &str,
    ) -> PortResult<PutOutcome> {
        self.repo
            .insert_cached_content(CachedContent {
                subject_id,
                kind,
                text: text.to_string(),
                model_id: model_id.to_string(),
                created_at: Utc::now(),
            })
            .await
    }

    /// Returns the cached text for `(subject_id, kind)` or runs `generate` and
    /// memoises its output.
    ///
    /// Without a subject there is nothing to key on, so every call generates.
    /// Cache read and write failures are logged and never fail the call: the
    /// generated text is the primary result. Concurrent misses all generate;
    /// only the first write persists.
    pub async fn get_or_generate<F, Fut>(
        &self,
        subject_id: Option<Uuid>,
        kind: ContentKind,
        model_id: &str,
        generate: F,
    ) -> PortResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PortResult<String>>,
    {
        let Some(subject_id) = subject_id else {
            return generate().await;
        };

        match self.get(subject_id, kind).await {
            Ok(Some(text)) => {
                info!("Cache hit for {} of subject {}.", kind.as_str(), subject_id);
                return Ok(text);
            }
            Ok(None) => {}
            Err(e) => error!(
                "Cache lookup failed for {} of subject {}: {}",
                kind.as_str(),
                subject_id,
                e
            ),
        }

        let text = generate().await?;
        if text.is_empty() {
            return Ok(text);
        }

        match self.put(subject_id, kind, &text, model_id).await {
            Ok(PutOutcome::Stored) => {
                info!("Cached {} for subject {}.", kind.as_str(), subject_id)
            }
            Ok(PutOutcome::AlreadyExists) => info!(
                "{} for subject {} was cached concurrently; keeping the stored copy.",
                kind.as_str(),
                subject_id
            ),
            Err(e) => error!(
                "Failed to cache {} for subject {}: {}",
                kind.as_str(),
                subject_id,
                e
            ),
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapRepo {
        rows: Mutex<HashMap<(Uuid, ContentKind), CachedContent>>,
        fail_reads: bool,
    }

    #[async_trait]
    impl ContentCacheRepository for MapRepo {
        async fn find_cached_content(
            &self,
            subject_id: Uuid,
            kind: ContentKind,
        ) -> PortResult<Option<CachedContent>> {
            if self.fail_reads {
                return Err(PortError::Unexpected("read failed".to_string()));
            }
            Ok(self.rows.lock().unwrap().get(&(subject_id, kind)).cloned())
        }

        async fn insert_cached_content(&self, content: CachedContent) -> PortResult<PutOutcome> {
            let mut rows = self.rows.lock().unwrap();
            let key = (content.subject_id, content.kind);
            if rows.contains_key(&key) {
                return Ok(PutOutcome::AlreadyExists);
            }
            rows.insert(key, content);
            Ok(PutOutcome::Stored)
        }
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let cache = ContentCache::new(Arc::new(MapRepo::default()));
        let subject = Uuid::new_v4();
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let generate = || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("analysis #{n}"))
        };
        let first = cache
            .get_or_generate(Some(subject), ContentKind::Analysis, "model-a", generate)
            .await
            .unwrap();
        let second = cache
            .get_or_generate(Some(subject), ContentKind::Analysis, "model-a", generate)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, "analysis #0");
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn no_subject_always_generates() {
        let cache = ContentCache::new(Arc::new(MapRepo::default()));
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let generate = || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("fresh".to_string())
        };

        cache
            .get_or_generate(None, ContentKind::Analysis, "m", generate)
            .await
            .unwrap();
        cache
            .get_or_generate(None, ContentKind::Analysis, "m", generate)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_put_never_overwrites_the_stored_copy() {
        let cache = ContentCache::new(Arc::new(MapRepo::default()));
        let subject = Uuid::new_v4();

        let first = cache.put(subject, ContentKind::Topics, "first", "m").await.unwrap();
        let second = cache.put(subject, ContentKind::Topics, "second", "m").await.unwrap();

        assert_eq!(first, PutOutcome::Stored);
        assert_eq!(second, PutOutcome::AlreadyExists);
        assert_eq!(
            cache.get(subject, ContentKind::Topics).await.unwrap().as_deref(),
            Some("first")
        );
        // Kinds are keyed separately.
        assert_eq!(cache.get(subject, ContentKind::Draft).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_lookup_falls_through_to_generation() {
        let repo = MapRepo {
            fail_reads: true,
            ..Default::default()
        };
        let cache = ContentCache::new(Arc::new(repo));

        let text = cache
            .get_or_generate(Some(Uuid::new_v4()), ContentKind::Analysis, "m", || async {
                Ok("generated".to_string())
            })
            .await
            .unwrap();

        assert_eq!(text, "generated");
    }

    #[tokio::test]
    async fn generation_failure_is_not_cached() {
        let cache = ContentCache::new(Arc::new(MapRepo::default()));
        let subject = Uuid::new_v4();

        let result = cache
            .get_or_generate(Some(subject), ContentKind::Analysis, "m", || async {
                Err(PortError::GenerationUnavailable("backend down".to_string()))
            })
            .await;

        assert!(matches!(result, Err(PortError::GenerationUnavailable(_))));
        assert_eq!(cache.get(subject, ContentKind::Analysis).await.unwrap(), None);
    }
}
