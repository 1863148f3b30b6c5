use autoscale_cuckoo_filter::CuckooFilter;
use std::sync::{PoisonError, RwLock};

/// Expected capacity and false-positive rate.
/// Tune these based on real user counts.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

#[inline]
fn normalize(username: &str) -> String {
    username.to_lowercase()
}

/// Probabilistic set of taken usernames. A miss means the name is free; a
/// hit has to be confirmed by the cache or the database.
pub struct UsernameFilter {
    filter: RwLock<CuckooFilter<String>>,
}

impl Default for UsernameFilter {
    fn default() -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
        }
    }
}

impl UsernameFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a username might exist (false positives possible)
    pub fn might_exist(&self, username: &str) -> bool {
        let username = normalize(username);
        self.filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&username)
    }

    pub fn insert(&self, username: &str) {
        let username = normalize(username);
        self.filter
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(&username);
    }

    /// Insert a batch of usernames under one write lock
    pub fn insert_batch(&self, usernames: &[String]) {
        let mut filter = self.filter.write().unwrap_or_else(PoisonError::into_inner);
        for username in usernames {
            filter.add(&normalize(username));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_names_are_reported_ignoring_case() {
        let filter = UsernameFilter::new();
        assert!(!filter.might_exist("alice"));
        filter.insert("Alice");
        assert!(filter.might_exist("alice"));
        assert!(filter.might_exist("ALICE"));
    }

    #[test]
    fn batch_insert_covers_every_name() {
        let filter = UsernameFilter::new();
        filter.insert_batch(&["bob".to_string(), "carol".to_string()]);
        assert!(filter.might_exist("bob"));
        assert!(filter.might_exist("carol"));
    }
}
