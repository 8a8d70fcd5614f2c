//! Cache-adapter selection.
//!
//! Uses the same connection layer as lock stores: Redis and Memcached
//! strings are parsed into connection descriptions, table-backed strings
//! keep their driver, and `array:` selects a process-local adapter.

use std::collections::BTreeMap;
use std::time::Duration;

use secrecy::SecretString;

use crate::config::BackendConfig;
use crate::errors::{FrameworkError, FrameworkResult};
use crate::store::client::{BackendClient, Connection};
use crate::store::dsn;
use crate::store::lock::PdoTarget;
use crate::store::memcached::{MemcachedConnection, MemcachedTarget};
use crate::store::redis::{RedisConnection, RedisTarget};

/// Separator between namespace and key.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Longest key Memcached accepts.
const MEMCACHED_MAX_ID_LENGTH: usize = 250;

/// A parsed cache connection.
#[derive(Debug, Clone)]
pub enum CacheConnection {
    /// Redis family.
    Redis(RedisConnection),
    /// Memcached.
    Memcached(MemcachedConnection),
}

/// Parses a `redis:`, `rediss:` or `memcached:` connection string.
pub fn create_connection(
    dsn: &str,
    options: &BTreeMap<String, String>,
    config: &BackendConfig,
) -> FrameworkResult<CacheConnection> {
    if dsn.starts_with("redis:") || dsn.starts_with("rediss:") {
        return RedisConnection::parse(dsn, options, config).map(CacheConnection::Redis);
    }
    if dsn.starts_with("memcached:") {
        return MemcachedConnection::parse(dsn, options, config).map(CacheConnection::Memcached);
    }

    Err(FrameworkError::configuration(format!(
        "Unsupported DSN: \"{}\".",
        dsn::redact(dsn)
    )))
}

/// Where an adapter keeps its items.
#[derive(Debug, Clone)]
pub enum AdapterBackend {
    /// Process-local array.
    Array,
    /// Redis family.
    Redis(RedisTarget),
    /// Memcached.
    Memcached(MemcachedTarget),
    /// Table in a database.
    Pdo(PdoTarget),
}

/// A resolved cache adapter.
#[derive(Debug, Clone)]
pub struct CacheAdapter {
    backend: AdapterBackend,
    namespace: String,
    default_lifetime: Duration,
}

impl CacheAdapter {
    /// Returns the adapter's type name.
    pub fn name(&self) -> &'static str {
        match self.backend {
            AdapterBackend::Array => "ArrayAdapter",
            AdapterBackend::Redis(_) => "RedisAdapter",
            AdapterBackend::Memcached(_) => "MemcachedAdapter",
            AdapterBackend::Pdo(_) => "PdoAdapter",
        }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &AdapterBackend {
        &self.backend
    }

    /// Returns the namespace, without separator.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the lifetime of items saved without one (zero means forever).
    pub fn default_lifetime(&self) -> Duration {
        self.default_lifetime
    }

    /// Returns the storage id of `key`: `namespace:key`, or `key` alone
    /// when the namespace is empty.
    pub fn item_id(&self, key: &str) -> String {
        if self.namespace.is_empty() {
            key.to_string()
        } else {
            format!("{}{}{}", self.namespace, NAMESPACE_SEPARATOR, key)
        }
    }
}

/// Selects the cache adapter for a connection.
pub fn create_adapter(
    connection: impl Into<Connection>,
    namespace: &str,
    default_lifetime: Duration,
    config: &BackendConfig,
) -> FrameworkResult<CacheAdapter> {
    validate_namespace(namespace)?;

    let backend = match connection.into() {
        Connection::Client(BackendClient::Redis(client)) => AdapterBackend::Redis(RedisTarget::Client(client)),
        Connection::Client(BackendClient::Memcached(client)) => {
            AdapterBackend::Memcached(MemcachedTarget::Client(client))
        }
        Connection::Client(BackendClient::Pdo(handle)) => AdapterBackend::Pdo(PdoTarget::Handle(handle)),
        Connection::Client(other) => {
            return Err(FrameworkError::unsupported_backend(format!(
                "Cannot use a \"{}\" client as a cache adapter.",
                other.type_name()
            )));
        }
        Connection::Dsn(dsn) => backend_for_dsn(&dsn, config)?,
    };

    if matches!(backend, AdapterBackend::Memcached(_)) {
        let max = MEMCACHED_MAX_ID_LENGTH - 24;
        if namespace.len() > max {
            return Err(FrameworkError::invalid_argument(format!(
                "Namespace must be {} chars max, {} given (\"{}\").",
                max,
                namespace.len(),
                namespace
            )));
        }
    }

    let adapter = CacheAdapter {
        backend,
        namespace: namespace.to_string(),
        default_lifetime,
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        adapter = adapter.name(),
        namespace = adapter.namespace(),
        default_lifetime_secs = adapter.default_lifetime.as_secs(),
        "Selected cache adapter"
    );

    Ok(adapter)
}

fn backend_for_dsn(dsn: &str, config: &BackendConfig) -> FrameworkResult<AdapterBackend> {
    if dsn == "array" || dsn.starts_with("array:") {
        return Ok(AdapterBackend::Array);
    }

    if let Some(driver) = pdo_driver(dsn) {
        return Ok(AdapterBackend::Pdo(PdoTarget::Dsn {
            dsn: SecretString::new(dsn.to_string()),
            driver: driver.to_string(),
        }));
    }

    Ok(match create_connection(dsn, &BTreeMap::new(), config)? {
        CacheConnection::Redis(conn) => AdapterBackend::Redis(RedisTarget::Connection(conn)),
        CacheConnection::Memcached(conn) => AdapterBackend::Memcached(MemcachedTarget::Connection(conn)),
    })
}

fn pdo_driver(dsn: &str) -> Option<&'static str> {
    let scheme = dsn.split_once(':')?.0;
    Some(match scheme {
        "mysql" | "mysql2" => "mysql",
        "pgsql" | "postgres" | "postgresql" => "pgsql",
        "sqlite" | "sqlite3" => "sqlite",
        "sqlsrv" | "mssql" => "sqlsrv",
        "oci" | "oci8" | "pdo_oci" => "oci",
        _ => return None,
    })
}

fn validate_namespace(namespace: &str) -> FrameworkResult<()> {
    match namespace
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.')))
    {
        Some(c) => Err(FrameworkError::invalid_argument(format!(
            "Namespace contains \"{}\" but only characters in [-+.A-Za-z0-9] are allowed.",
            c
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::store::client::{MongoCollection, RedisClient, RedisClientKind};

    fn adapter(dsn: &str, namespace: &str) -> FrameworkResult<CacheAdapter> {
        create_adapter(dsn, namespace, Duration::ZERO, &BackendConfig::default())
    }

    #[test]
    fn test_adapter_selection() {
        assert_eq!(adapter("array:", "app").unwrap().name(), "ArrayAdapter");
        assert_eq!(adapter("redis://localhost", "app").unwrap().name(), "RedisAdapter");
        assert_eq!(adapter("memcached://localhost", "app").unwrap().name(), "MemcachedAdapter");
        assert_eq!(adapter("sqlite:///var/cache.db", "app").unwrap().name(), "PdoAdapter");
    }

    #[test]
    fn test_namespace_validation() {
        let err = adapter("array:", "bad/ns").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            err.message(),
            "Namespace contains \"/\" but only characters in [-+.A-Za-z0-9] are allowed."
        );

        let long = "a".repeat(227);
        assert!(adapter("memcached://localhost", &long).is_err());
        assert!(adapter("redis://localhost", &long).is_ok());
    }

    #[test]
    fn test_item_id() {
        let with_ns = adapter("array:", "app.v1").unwrap();
        assert_eq!(with_ns.item_id("user"), "app.v1:user");
        assert_eq!(adapter("array:", "").unwrap().item_id("user"), "user");
    }

    #[test]
    fn test_clients() {
        let redis = BackendClient::Redis(RedisClient {
            kind: RedisClientKind::Predis,
            endpoint: "tcp://localhost:6379".to_string(),
        });
        let adapter = create_adapter(redis, "", Duration::from_secs(60), &BackendConfig::default()).unwrap();
        assert_eq!(adapter.name(), "RedisAdapter");
        assert_eq!(adapter.default_lifetime(), Duration::from_secs(60));

        let mongo = BackendClient::MongoCollection(MongoCollection {
            database: "app".to_string(),
            collection: "cache".to_string(),
        });
        let err = create_adapter(mongo, "", Duration::ZERO, &BackendConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedBackend);
    }

    #[test]
    fn test_create_connection_schemes() {
        let options = BTreeMap::new();
        let config = BackendConfig::default();
        assert!(matches!(
            create_connection("rediss://localhost", &options, &config).unwrap(),
            CacheConnection::Redis(_)
        ));
        let err = create_connection("couchbase://localhost", &options, &config).unwrap_err();
        assert_eq!(err.message(), "Unsupported DSN: \"couchbase://localhost\".");
    }
}
