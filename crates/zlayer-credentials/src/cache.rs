//! Read-optimized credential cache
//!
//! The cache holds an immutable snapshot behind a short-lived lock. Readers
//! clone the snapshot `Arc` and work on it without holding the lock, so a
//! reader always sees either the state before or after a write, never a
//! partially built map. `replace_all` swaps the snapshot wholesale;
//! `upsert`/`remove` copy-on-write when readers still hold the old snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::{Credential, CredentialType};

type Snapshot = HashMap<String, Arc<Credential>>;

/// Synchronous read API handed to credential consumers
///
/// Implementations never block on network I/O and always return whatever was
/// last successfully applied, which may be stale during an outage.
pub trait CredentialsProvider: Send + Sync {
    /// All credentials of the given runtime type (`None` = every type), sorted by id
    fn credentials(&self, filter: Option<CredentialType>) -> Vec<Arc<Credential>>;

    /// A single credential by id
    fn credential(&self, id: &str) -> Option<Arc<Credential>>;
}

/// Map of credential id to credential record
///
/// Exactly one record exists per id; inserting an existing id replaces it.
/// `replace_all`, `upsert` and `remove` are meant for the single writer
/// (the watch controller).
#[derive(Debug, Default)]
pub struct CredentialCache {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl CredentialCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current immutable snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<HashMap<String, Arc<Credential>>> {
        Arc::clone(&self.snapshot.read())
    }

    /// Snapshot-consistent list of records matching `filter`, sorted by id
    #[must_use]
    pub fn get_all(&self, filter: Option<CredentialType>) -> Vec<Arc<Credential>> {
        let snapshot = self.snapshot();
        let mut credentials: Vec<Arc<Credential>> = snapshot
            .values()
            .filter(|c| filter.is_none_or(|t| c.credential_type() == t))
            .cloned()
            .collect();
        credentials.sort_by(|a, b| a.id.cmp(&b.id));
        credentials
    }

    /// Look up a record by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Credential>> {
        self.snapshot.read().get(id).cloned()
    }

    /// Whether a record exists for `id`
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.snapshot.read().contains_key(id)
    }

    /// Ids of all records, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.snapshot().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot.read().is_empty()
    }

    /// Atomically replace the whole cache
    ///
    /// The new map is fully built before the swap. Later records win on
    /// duplicate ids.
    pub fn replace_all<I>(&self, credentials: I)
    where
        I: IntoIterator<Item = Credential>,
    {
        let next: Snapshot = credentials
            .into_iter()
            .map(|c| (c.id.clone(), Arc::new(c)))
            .collect();
        *self.snapshot.write() = Arc::new(next);
    }

    /// Insert or replace the record for `credential.id`, returning the previous one
    pub fn upsert(&self, credential: Credential) -> Option<Arc<Credential>> {
        let mut guard = self.snapshot.write();
        Arc::make_mut(&mut guard).insert(credential.id.clone(), Arc::new(credential))
    }

    /// Remove the record for `id`, returning it
    pub fn remove(&self, id: &str) -> Option<Arc<Credential>> {
        let mut guard = self.snapshot.write();
        if !guard.contains_key(id) {
            return None;
        }
        Arc::make_mut(&mut guard).remove(id)
    }
}

impl CredentialsProvider for CredentialCache {
    fn credentials(&self, filter: Option<CredentialType>) -> Vec<Arc<Credential>> {
        self.get_all(filter)
    }

    fn credential(&self, id: &str) -> Option<Arc<Credential>> {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CredentialKind, Secret};

    fn text(id: &str) -> Credential {
        Credential::new(
            id,
            CredentialKind::SecretText {
                text: Secret::new(format!("token-{id}")),
            },
        )
    }

    fn login(id: &str) -> Credential {
        Credential::new(
            id,
            CredentialKind::UsernamePassword {
                username: id.to_string(),
                password: Secret::new("pw"),
            },
        )
    }

    #[test]
    fn test_replace_all_drops_missing_ids() {
        let cache = CredentialCache::new();
        cache.replace_all([text("s1"), text("s2"), text("s3")]);
        assert_eq!(cache.ids(), vec!["s1", "s2", "s3"]);

        cache.replace_all([text("s1"), text("s3")]);
        assert_eq!(cache.ids(), vec!["s1", "s3"]);
        assert!(!cache.contains("s2"));
    }

    #[test]
    fn test_upsert_replaces_same_id() {
        let cache = CredentialCache::new();
        assert!(cache.upsert(text("a")).is_none());

        let previous = cache.upsert(login("a")).unwrap();
        assert_eq!(previous.credential_type(), CredentialType::SecretText);
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get("a").unwrap().credential_type(),
            CredentialType::UsernamePassword
        );
    }

    #[test]
    fn test_remove() {
        let cache = CredentialCache::new();
        cache.upsert(text("a"));
        assert!(cache.remove("missing").is_none());
        assert!(cache.remove("a").is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_all_filters_by_type() {
        let cache = CredentialCache::new();
        cache.replace_all([text("t2"), login("u1"), text("t1")]);

        let texts = cache.get_all(Some(CredentialType::SecretText));
        let ids: Vec<&str> = texts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);

        assert_eq!(cache.get_all(Some(CredentialType::UsernamePassword)).len(), 1);
        assert_eq!(cache.get_all(Some(CredentialType::Aws)).len(), 0);
        assert_eq!(cache.get_all(None).len(), 3);
    }

    #[test]
    fn test_held_snapshot_is_unaffected_by_writes() {
        let cache = CredentialCache::new();
        cache.replace_all([text("a"), text("b")]);

        let before = cache.snapshot();
        cache.upsert(text("c"));
        cache.remove("a");

        assert_eq!(before.len(), 2);
        assert!(before.contains_key("a"));
        assert_eq!(cache.ids(), vec!["b", "c"]);
    }

    #[test]
    fn test_readers_never_see_partial_replacement() {
        let cache = Arc::new(CredentialCache::new());
        let old: Vec<String> = (0..50).map(|i| format!("old-{i}")).collect();
        let new: Vec<String> = (0..80).map(|i| format!("new-{i}")).collect();
        cache.replace_all(old.iter().map(|id| text(id)));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    for _ in 0..500 {
                        let seen = cache.get_all(None);
                        let olds = seen.iter().filter(|c| c.id.starts_with("old-")).count();
                        let news = seen.iter().filter(|c| c.id.starts_with("new-")).count();
                        assert!(
                            (olds == 50 && news == 0) || (olds == 0 && news == 80),
                            "partial snapshot: {olds} old, {news} new"
                        );
                    }
                });
            }

            for round in 0..200 {
                if round % 2 == 0 {
                    cache.replace_all(new.iter().map(|id| text(id)));
                } else {
                    cache.replace_all(old.iter().map(|id| text(id)));
                }
            }
        });
    }

    #[test]
    fn test_provider_trait() {
        let cache = CredentialCache::new();
        cache.upsert(login("u"));
        let provider: &dyn CredentialsProvider = &cache;
        assert_eq!(provider.credentials(None).len(), 1);
        assert!(provider.credential("u").is_some());
        assert!(provider.credential("x").is_none());
    }
}
