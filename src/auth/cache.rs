use std::collections::HashMap;

use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::users::repo::Identity;

struct Entry {
    identity: Identity,
    expires_at: OffsetDateTime,
}

/// Verified identities keyed by the access token that proved them. An entry
/// lives exactly as long as its token.
#[derive(Default)]
pub struct IdentityCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, token: &str) -> Option<Identity> {
        let now = OffsetDateTime::now_utc();
        {
            let entries = self.entries.read().await;
            match entries.get(token) {
                Some(e) if e.expires_at > now => return Some(e.identity.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // expired; drop it so the map does not keep dead tokens
        self.entries.write().await.remove(token);
        None
    }

    pub async fn insert(&self, token: &str, identity: Identity, expires_at: OffsetDateTime) {
        let now = OffsetDateTime::now_utc();
        if expires_at <= now {
            return;
        }
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            token.to_string(),
            Entry {
                identity,
                expires_at,
            },
        );
    }

    /// Forgets every cached token of `user_id`.
    pub async fn evict_user(&self, user_id: Uuid) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.identity.id != user_id);
        debug!(%user_id, evicted = before - entries.len(), "identity cache eviction");
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            username: "debik".into(),
            email: "debik228@gmail.com".into(),
            confirmed: true,
            avatar_key: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn hit_until_expiry() {
        let cache = IdentityCache::new();
        let id = identity();
        cache
            .insert("tok", id.clone(), OffsetDateTime::now_utc() + Duration::minutes(5))
            .await;
        assert_eq!(cache.get("tok").await, Some(id));
        assert_eq!(cache.get("other").await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = IdentityCache::new();
        cache
            .insert("late", identity(), OffsetDateTime::now_utc() - Duration::seconds(1))
            .await;
        assert_eq!(cache.get("late").await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn evict_user_drops_only_that_user() {
        let cache = IdentityCache::new();
        let exp = OffsetDateTime::now_utc() + Duration::minutes(5);
        let a = identity();
        let b = identity();
        cache.insert("a1", a.clone(), exp).await;
        cache.insert("a2", a.clone(), exp).await;
        cache.insert("b1", b.clone(), exp).await;
        cache.evict_user(a.id).await;
        assert_eq!(cache.get("a1").await, None);
        assert_eq!(cache.get("a2").await, None);
        assert_eq!(cache.get("b1").await, Some(b));
        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }
}
