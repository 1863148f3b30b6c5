use moka::future::Cache;
use std::time::Duration;

const CACHE_CAPACITY: u64 = 500_000;
const CACHE_TTL: Duration = Duration::from_secs(86400);

/// Positive cache of usernames known to be taken.
pub struct UsernameCache {
    taken: Cache<String, ()>,
}

impl Default for UsernameCache {
    fn default() -> Self {
        Self {
            taken: Cache::builder()
                .max_capacity(CACHE_CAPACITY) // tune based on memory
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }
}

impl UsernameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mark_taken(&self, username: &str) {
        self.taken.insert(username.to_lowercase(), ()).await;
    }

    pub async fn is_taken(&self, username: &str) -> bool {
        self.taken.get(&username.to_lowercase()).await.is_some()
    }

    /// Mark a batch of usernames concurrently
    pub async fn mark_batch(&self, usernames: &[String]) {
        let futures: Vec<_> = usernames
            .iter()
            .map(|u| self.taken.insert(u.to_lowercase(), ()))
            .collect();

        futures::future::join_all(futures).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn marked_names_are_taken() {
        let cache = UsernameCache::new();
        assert!(!cache.is_taken("dave").await);
        cache.mark_taken("Dave").await;
        assert!(cache.is_taken("dave").await);
    }

    #[actix_web::test]
    async fn batch_marks_all() {
        let cache = UsernameCache::new();
        cache
            .mark_batch(&["erin".to_string(), "frank".to_string()])
            .await;
        assert!(cache.is_taken("erin").await);
        assert!(cache.is_taken("Frank").await);
    }
}
