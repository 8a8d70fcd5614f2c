//! Lock stores and keys.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use secrecy::SecretString;
use uuid::Uuid;

use super::client::{MongoCollection, PdoHandle, ZookeeperHandle};
use super::memcached::MemcachedTarget;
use super::redis::RedisTarget;
use crate::errors::{FrameworkError, FrameworkResult};

/// A lockable resource plus the token proving who owns it.
#[derive(Debug, Clone)]
pub struct Key {
    resource: String,
    token: String,
    expiring_at: Option<Instant>,
}

impl Key {
    /// Creates a key with a fresh owner token.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            token: Uuid::new_v4().simple().to_string(),
            expiring_at: None,
        }
    }

    /// Returns the resource name.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Returns the owner token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Shortens the lifetime to at most `ttl` from now.
    pub fn reduce_lifetime(&mut self, ttl: Duration) {
        let candidate = Instant::now() + ttl;
        self.expiring_at = Some(match self.expiring_at {
            Some(current) if current < candidate => current,
            _ => candidate,
        });
    }

    /// Forgets any lifetime.
    pub fn reset_lifetime(&mut self) {
        self.expiring_at = None;
    }

    /// Returns the time left, `None` when the key never expires.
    pub fn remaining_lifetime(&self) -> Option<Duration> {
        self.expiring_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Returns true once the lifetime has run out.
    pub fn is_expired(&self) -> bool {
        self.remaining_lifetime().is_some_and(|left| left.is_zero())
    }
}

/// A store that can hold locks.
pub trait PersistingStore: Send + Sync {
    /// Acquires the lock, or refreshes it when the key already owns it.
    fn save(&self, key: &mut Key) -> FrameworkResult<()>;

    /// Extends a held lock to `ttl` from now.
    fn put_off_expiration(&self, key: &mut Key, ttl: Duration) -> FrameworkResult<()>;

    /// Releases the lock if the key owns it.
    fn delete(&self, key: &mut Key) -> FrameworkResult<()>;

    /// Returns true if the key currently owns the lock.
    fn exists(&self, key: &Key) -> bool;
}

#[derive(Debug)]
struct LockEntry {
    token: String,
    expires_at: Instant,
}

/// Process-local store with time-based expiry. Clones share their locks.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    locks: Arc<Mutex<HashMap<String, LockEntry>>>,
    ttl: Duration,
}

impl InMemoryStore {
    /// Creates a store whose locks live for `ttl` unless extended.
    pub fn new(ttl: Duration) -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Returns the lifetime given to new locks.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the number of unexpired locks.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.values().filter(|entry| entry.expires_at > now).count()
    }

    /// Returns true if no lock is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn hold(&self, key: &mut Key, ttl: Duration) -> FrameworkResult<()> {
        let now = Instant::now();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = locks.get(key.resource()) {
            if entry.expires_at > now && entry.token != key.token() {
                #[cfg(feature = "tracing")]
                tracing::debug!(resource = key.resource(), "Lock is held by another owner");
                return Err(FrameworkError::lock_conflicted(format!(
                    "Lock \"{}\" is already acquired by another owner.",
                    key.resource()
                )));
            }
        }

        locks.insert(
            key.resource().to_string(),
            LockEntry {
                token: key.token().to_string(),
                expires_at: now + ttl,
            },
        );
        key.reduce_lifetime(ttl);
        Ok(())
    }
}

impl PersistingStore for InMemoryStore {
    fn save(&self, key: &mut Key) -> FrameworkResult<()> {
        self.hold(key, self.ttl)
    }

    fn put_off_expiration(&self, key: &mut Key, ttl: Duration) -> FrameworkResult<()> {
        if ttl.is_zero() {
            return Err(FrameworkError::invalid_argument(format!(
                "Cannot put off the expiration of lock \"{}\": the TTL must be positive.",
                key.resource()
            )));
        }
        if !self.exists(key) {
            return Err(FrameworkError::lock_expired(format!(
                "Failed to put off the expiration of the \"{}\" lock within the specified time.",
                key.resource()
            )));
        }
        key.reset_lifetime();
        self.hold(key, ttl)
    }

    fn delete(&self, key: &mut Key) -> FrameworkResult<()> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(key.resource())
            .is_some_and(|entry| entry.token == key.token())
        {
            locks.remove(key.resource());
        }
        key.reset_lifetime();
        Ok(())
    }

    fn exists(&self, key: &Key) -> bool {
        let now = Instant::now();
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .get(key.resource())
            .is_some_and(|entry| entry.token == key.token() && entry.expires_at > now)
    }
}

/// Store that grants every lock and remembers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl PersistingStore for NullStore {
    fn save(&self, _key: &mut Key) -> FrameworkResult<()> {
        Ok(())
    }

    fn put_off_expiration(&self, _key: &mut Key, _ttl: Duration) -> FrameworkResult<()> {
        Ok(())
    }

    fn delete(&self, _key: &mut Key) -> FrameworkResult<()> {
        Ok(())
    }

    fn exists(&self, _key: &Key) -> bool {
        false
    }
}

/// A MongoDB collection to keep locks in.
#[derive(Debug, Clone)]
pub enum MongoDbTarget {
    /// Pre-built collection handle.
    Collection(MongoCollection),
    /// Connection string naming database and collection.
    Uri {
        /// Full connection string.
        uri: SecretString,
        /// Database name.
        database: String,
        /// Collection name.
        collection: String,
    },
}

/// A PDO-style database.
#[derive(Debug, Clone)]
pub enum PdoTarget {
    /// Pre-built handle.
    Handle(PdoHandle),
    /// Connection string with its normalized driver.
    Dsn {
        /// Full connection string.
        dsn: SecretString,
        /// Normalized driver name.
        driver: String,
    },
}

impl PdoTarget {
    /// Returns the driver name.
    pub fn driver(&self) -> &str {
        match self {
            PdoTarget::Handle(handle) => &handle.driver,
            PdoTarget::Dsn { driver, .. } => driver,
        }
    }
}

/// A Zookeeper ensemble.
#[derive(Debug, Clone)]
pub enum ZookeeperTarget {
    /// Pre-built handle.
    Handle(ZookeeperHandle),
    /// Hosts parsed from a connection string.
    Hosts(Vec<(String, u16)>),
}

/// A resolved lock store.
#[derive(Debug, Clone)]
pub enum Store {
    /// Process-local locks.
    InMemory(InMemoryStore),
    /// No-op locks.
    Null(NullStore),
    /// System V semaphores.
    Semaphore,
    /// Lock files in a directory.
    Flock {
        /// Directory holding the lock files.
        directory: PathBuf,
    },
    /// Redis-backed locks.
    Redis(RedisTarget),
    /// Memcached-backed locks.
    Memcached(MemcachedTarget),
    /// MongoDB-backed locks.
    MongoDb(MongoDbTarget),
    /// Table-backed locks.
    Pdo(PdoTarget),
    /// PostgreSQL advisory locks.
    PostgreSql {
        /// Connection string without the `+advisory` marker.
        dsn: SecretString,
    },
    /// Zookeeper ephemeral nodes.
    Zookeeper(ZookeeperTarget),
}

impl Store {
    /// Returns the store's type name.
    pub fn name(&self) -> &'static str {
        match self {
            Store::InMemory(_) => "InMemoryStore",
            Store::Null(_) => "NullStore",
            Store::Semaphore => "SemaphoreStore",
            Store::Flock { .. } => "FlockStore",
            Store::Redis(_) => "RedisStore",
            Store::Memcached(_) => "MemcachedStore",
            Store::MongoDb(_) => "MongoDbStore",
            Store::Pdo(_) => "PdoStore",
            Store::PostgreSql { .. } => "PostgreSqlStore",
            Store::Zookeeper(_) => "ZookeeperStore",
        }
    }

    /// Returns the store as a [`PersistingStore`] when it runs in process.
    pub fn as_persisting(&self) -> Option<&dyn PersistingStore> {
        match self {
            Store::InMemory(store) => Some(store),
            Store::Null(store) => Some(store),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_save_conflicts_with_other_owner() {
        let store = InMemoryStore::new(Duration::from_secs(60));
        let mut mine = Key::new("report");
        let mut theirs = Key::new("report");

        store.save(&mut mine).unwrap();
        store.save(&mut mine).unwrap();
        let err = store.save(&mut theirs).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LockConflicted);
        assert!(store.exists(&mine));
        assert!(!store.exists(&theirs));
        assert!(mine.remaining_lifetime().unwrap() <= Duration::from_secs(60));
    }

    #[test]
    fn test_expired_lock_can_be_taken() {
        let store = InMemoryStore::new(Duration::from_millis(10));
        let mut first = Key::new("job");
        store.save(&mut first).unwrap();

        std::thread::sleep(Duration::from_millis(30));

        let mut second = Key::new("job");
        store.save(&mut second).unwrap();
        assert!(first.is_expired());
        assert!(!store.exists(&first));
        assert!(store.exists(&second));
    }

    #[test]
    fn test_put_off_and_delete() {
        let store = InMemoryStore::new(Duration::from_secs(1));
        let mut key = Key::new("a");

        let err = store.put_off_expiration(&mut key, Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockExpired);

        store.save(&mut key).unwrap();
        store.put_off_expiration(&mut key, Duration::from_secs(30)).unwrap();
        assert!(key.remaining_lifetime().unwrap() > Duration::from_secs(1));
        assert!(store.put_off_expiration(&mut key, Duration::ZERO).is_err());

        let mut other = Key::new("a");
        store.delete(&mut other).unwrap();
        assert!(store.exists(&key));

        store.delete(&mut key).unwrap();
        assert!(!store.exists(&key));
        assert!(store.is_empty());
    }

    #[test]
    fn test_clones_share_locks() {
        let store = InMemoryStore::new(Duration::from_secs(60));
        let clone = store.clone();
        let mut key = Key::new("shared");
        store.save(&mut key).unwrap();
        assert!(clone.exists(&key));
        assert_eq!(clone.len(), 1);
    }

    #[test]
    fn test_store_names() {
        assert_eq!(Store::Semaphore.name(), "SemaphoreStore");
        assert!(Store::Null(NullStore).as_persisting().is_some());
        assert!(Store::Semaphore.as_persisting().is_none());
    }
}
