use std::sync::Arc;

use tracing::info;

use crate::{
    guard::{AttendanceGuard, LeaveTransitionGuard},
    services::{AttendanceService, EmployeeService, LeaveService},
    store::{Store, StoreResult},
    utils::{username_cache::UsernameCache, username_filter::UsernameFilter},
};

/// How many of the newest usernames are pre-loaded into the cache.
const CACHE_WARMUP_LIMIT: u32 = 10_000;

/// Everything the handlers share, built once at startup.
pub struct AppContext {
    pub store: Arc<dyn Store>,
    pub employees: EmployeeService,
    pub attendance: AttendanceService,
    pub leaves: LeaveService,
    pub username_filter: UsernameFilter,
    pub username_cache: UsernameCache,
}

impl AppContext {
    pub fn new<S>(store: S) -> Self
    where
        S: Store + Clone + 'static,
    {
        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let attendance_guard = AttendanceGuard::new(Arc::new(store.clone()));
        let leave_guard = LeaveTransitionGuard::new(Arc::new(store));

        Self {
            employees: EmployeeService::new(shared.clone()),
            attendance: AttendanceService::new(shared.clone(), attendance_guard),
            leaves: LeaveService::new(shared.clone(), leave_guard),
            store: shared,
            username_filter: UsernameFilter::new(),
            username_cache: UsernameCache::new(),
        }
    }

    /// Loads every known username into the cuckoo filter.
    pub async fn warmup_username_filter(&self) -> StoreResult<()> {
        let usernames = self.store.list_usernames().await?;
        self.username_filter.insert_batch(&usernames);
        info!(count = usernames.len(), "Username filter warmed up");
        Ok(())
    }

    /// Pre-marks the most recently registered usernames as taken.
    pub async fn warmup_username_cache(&self) -> StoreResult<()> {
        let usernames = self.store.recent_usernames(CACHE_WARMUP_LIMIT).await?;
        self.username_cache.mark_batch(&usernames).await;
        info!(count = usernames.len(), "Username cache warmed up");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{role::Role, user::NewUser};
    use crate::store::MemoryStore;

    #[actix_web::test]
    async fn warmups_load_existing_usernames() {
        let store = MemoryStore::new();
        store
            .create_user(NewUser {
                username: "Existing".into(),
                password_hash: "x".into(),
                role: Role::Hr,
            })
            .await
            .unwrap();

        let ctx = AppContext::new(store);
        ctx.warmup_username_filter().await.unwrap();
        ctx.warmup_username_cache().await.unwrap();

        assert!(ctx.username_filter.might_exist("existing"));
        assert!(ctx.username_cache.is_taken("existing").await);
    }
}
