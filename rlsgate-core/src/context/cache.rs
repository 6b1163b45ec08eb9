//! User → organization lookup cache

use crate::domain::{OrganizationId, UserId};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Entries older than this are never served
pub const ORGANIZATION_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
/// Memory ceiling; expiry is still driven by the TTL
pub const ORGANIZATION_CACHE_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    organization_id: OrganizationId,
    inserted_at: Instant,
}

/// Advisory cache: a miss or expiry always falls back to the backend
pub struct OrganizationCache {
    entries: Mutex<LruCache<UserId, CacheEntry>>,
    ttl: Duration,
}

impl Default for OrganizationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OrganizationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrganizationCache")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl OrganizationCache {
    pub fn new() -> Self {
        Self::with_ttl(ORGANIZATION_CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let capacity =
            NonZeroUsize::new(ORGANIZATION_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<UserId, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fresh entry for `user_id`; expired entries are evicted on the way
    pub fn get(&self, user_id: &UserId) -> Option<OrganizationId> {
        let mut entries = self.lock();
        let entry = *entries.get(user_id)?;

        if entry.inserted_at.elapsed() < self.ttl {
            metrics::counter!("rlsgate_org_cache_total", "result" => "hit").increment(1);
            Some(entry.organization_id)
        } else {
            entries.pop(user_id);
            metrics::counter!("rlsgate_org_cache_total", "result" => "expired").increment(1);
            None
        }
    }

    pub fn insert(&self, user_id: UserId, organization_id: OrganizationId) {
        self.lock().put(
            user_id,
            CacheEntry {
                organization_id,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn clear_user(&self, user_id: &UserId) {
        self.lock().pop(user_id);
    }

    pub fn clear_all(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_ttl() {
        let cache = OrganizationCache::new();
        let user = UserId::new_v4();
        let org = OrganizationId::new_v4();

        assert_eq!(cache.get(&user), None);
        cache.insert(user, org);
        assert_eq!(cache.get(&user), Some(org));
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let cache = OrganizationCache::with_ttl(Duration::ZERO);
        let user = UserId::new_v4();
        cache.insert(user, OrganizationId::new_v4());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&user), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_user_and_all() {
        let cache = OrganizationCache::new();
        let a = UserId::new_v4();
        let b = UserId::new_v4();
        cache.insert(a, OrganizationId::new_v4());
        cache.insert(b, OrganizationId::new_v4());

        cache.clear_user(&a);
        assert_eq!(cache.get(&a), None);
        assert!(cache.get(&b).is_some());

        cache.clear_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_default_ttl_is_five_minutes() {
        assert_eq!(ORGANIZATION_CACHE_TTL, Duration::from_secs(300));
    }
}
