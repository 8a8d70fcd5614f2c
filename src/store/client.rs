//! Pre-built backend client handles and the libraries available to build
//! new ones.
//!
//! Handles are descriptors of clients the caller already owns; selection
//! only needs their family and capabilities, never their protocol.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// What a client can do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Capabilities: u32 {
        /// Talks to a single Redis node.
        const SINGLE_NODE = 1 << 0;
        /// Shards over several nodes client-side.
        const MULTI_HOST = 1 << 1;
        /// Speaks the Redis Cluster protocol.
        const CLUSTER = 1 << 2;
        /// Discovers the master through Redis Sentinel.
        const SENTINEL = 1 << 3;
        /// Supports TLS connections.
        const TLS = 1 << 4;
        /// Connects on first use.
        const LAZY = 1 << 5;
    }
}

/// Client libraries installed in the running application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientLibraries {
    /// The native Redis client.
    #[serde(default = "default_true")]
    pub redis_ext: bool,
    /// Sentinel support in the native Redis client.
    #[serde(default = "default_true")]
    pub redis_sentinel: bool,
    /// The Relay client.
    #[serde(default)]
    pub relay: bool,
    /// The pure Predis client.
    #[serde(default)]
    pub predis: bool,
    /// The Memcached client.
    #[serde(default = "default_true")]
    pub memcached: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ClientLibraries {
    fn default() -> Self {
        Self {
            redis_ext: true,
            redis_sentinel: true,
            relay: false,
            predis: false,
            memcached: true,
        }
    }
}

impl ClientLibraries {
    /// Nothing installed.
    pub fn none() -> Self {
        Self {
            redis_ext: false,
            redis_sentinel: false,
            relay: false,
            predis: false,
            memcached: false,
        }
    }

    /// Returns true if any Redis client is installed.
    pub fn has_redis_client(&self) -> bool {
        self.redis_ext || self.relay || self.predis
    }

    /// Returns true if some installed client can use Sentinel.
    pub fn supports_sentinel(&self) -> bool {
        self.predis || self.relay || (self.redis_ext && self.redis_sentinel)
    }

    /// Returns true if `kind` can be instantiated.
    pub fn provides(&self, kind: RedisClientKind) -> bool {
        match kind.family() {
            RedisClientKind::Redis | RedisClientKind::RedisArray | RedisClientKind::RedisCluster => self.redis_ext,
            RedisClientKind::Relay => self.relay,
            _ => self.predis,
        }
    }
}

/// Concrete Redis client classes, including lazy proxies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RedisClientKind {
    /// Native single-node client.
    Redis,
    /// Relay client.
    Relay,
    /// Native client-side sharding.
    RedisArray,
    /// Native cluster client.
    RedisCluster,
    /// Predis client.
    Predis,
    /// Predis configured for a cluster.
    PredisCluster,
    /// Lazy proxy over [`RedisClientKind::Redis`].
    RedisProxy,
    /// Lazy proxy over [`RedisClientKind::RedisCluster`].
    RedisClusterProxy,
    /// Lazy proxy over [`RedisClientKind::Relay`].
    RelayProxy,
}

impl RedisClientKind {
    /// Parses a `class` option value.
    pub fn from_class_name(name: &str) -> Option<Self> {
        let name = name.trim_start_matches('\\');
        let kind = match name {
            "Redis" => RedisClientKind::Redis,
            "Relay" | "Relay\\Relay" => RedisClientKind::Relay,
            "RedisArray" => RedisClientKind::RedisArray,
            "RedisCluster" => RedisClientKind::RedisCluster,
            "Predis" | "Predis\\Client" => RedisClientKind::Predis,
            "PredisCluster" => RedisClientKind::PredisCluster,
            "RedisProxy" => RedisClientKind::RedisProxy,
            "RedisClusterProxy" => RedisClientKind::RedisClusterProxy,
            "RelayProxy" => RedisClientKind::RelayProxy,
            _ => return None,
        };
        Some(kind)
    }

    /// Returns the concrete family a proxy stands in for.
    pub fn family(&self) -> RedisClientKind {
        match self {
            RedisClientKind::RedisProxy => RedisClientKind::Redis,
            RedisClientKind::RedisClusterProxy => RedisClientKind::RedisCluster,
            RedisClientKind::RelayProxy => RedisClientKind::Relay,
            RedisClientKind::PredisCluster => RedisClientKind::Predis,
            other => *other,
        }
    }

    /// Returns true for lazy proxies.
    pub fn is_proxy(&self) -> bool {
        matches!(
            self,
            RedisClientKind::RedisProxy | RedisClientKind::RedisClusterProxy | RedisClientKind::RelayProxy
        )
    }

    /// Returns what the client can do, given the installed libraries.
    pub fn capabilities(&self, libraries: &ClientLibraries) -> Capabilities {
        let mut caps = match self.family() {
            RedisClientKind::Redis => {
                let mut caps = Capabilities::SINGLE_NODE | Capabilities::TLS;
                if libraries.redis_sentinel {
                    caps |= Capabilities::SENTINEL;
                }
                caps
            }
            RedisClientKind::Relay => Capabilities::SINGLE_NODE | Capabilities::TLS | Capabilities::SENTINEL,
            RedisClientKind::RedisArray => Capabilities::MULTI_HOST,
            RedisClientKind::RedisCluster => Capabilities::MULTI_HOST | Capabilities::CLUSTER | Capabilities::TLS,
            _ => {
                Capabilities::SINGLE_NODE
                    | Capabilities::MULTI_HOST
                    | Capabilities::CLUSTER
                    | Capabilities::SENTINEL
                    | Capabilities::TLS
                    | Capabilities::LAZY
            }
        };
        if self.is_proxy() {
            caps |= Capabilities::LAZY;
        }
        caps
    }
}

/// A Redis client the caller already built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisClient {
    /// Concrete class.
    pub kind: RedisClientKind,
    /// Endpoint description, for diagnostics.
    pub endpoint: String,
}

/// A Memcached client the caller already built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemcachedClient {
    /// Server list, for diagnostics.
    pub servers: Vec<String>,
}

/// A MongoDB collection handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoCollection {
    /// Database name.
    pub database: String,
    /// Collection name.
    pub collection: String,
}

/// A PDO-style database handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdoHandle {
    /// Driver name (mysql, pgsql, sqlite, ...).
    pub driver: String,
}

/// A Zookeeper client handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZookeeperHandle {
    /// Ensemble, for diagnostics.
    pub hosts: String,
}

/// Any pre-built client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendClient {
    /// Redis family.
    Redis(RedisClient),
    /// Memcached.
    Memcached(MemcachedClient),
    /// MongoDB collection.
    MongoCollection(MongoCollection),
    /// PDO-style database.
    Pdo(PdoHandle),
    /// Zookeeper.
    Zookeeper(ZookeeperHandle),
}

impl BackendClient {
    /// Returns a short type name for error messages.
    pub fn type_name(&self) -> String {
        match self {
            BackendClient::Redis(client) => format!("{:?}", client.kind),
            BackendClient::Memcached(_) => "Memcached".to_string(),
            BackendClient::MongoCollection(_) => "MongoDB\\Collection".to_string(),
            BackendClient::Pdo(_) => "PDO".to_string(),
            BackendClient::Zookeeper(_) => "Zookeeper".to_string(),
        }
    }
}

/// What backend selection starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    /// A client the caller already built.
    Client(BackendClient),
    /// A connection string.
    Dsn(String),
}

impl From<BackendClient> for Connection {
    fn from(client: BackendClient) -> Self {
        Connection::Client(client)
    }
}

impl From<&str> for Connection {
    fn from(dsn: &str) -> Self {
        Connection::Dsn(dsn.to_string())
    }
}

impl From<String> for Connection {
    fn from(dsn: String) -> Self {
        Connection::Dsn(dsn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxies_map_to_their_family() {
        assert_eq!(RedisClientKind::RedisProxy.family(), RedisClientKind::Redis);
        assert_eq!(RedisClientKind::RedisClusterProxy.family(), RedisClientKind::RedisCluster);
        assert_eq!(RedisClientKind::RelayProxy.family(), RedisClientKind::Relay);
        assert_eq!(RedisClientKind::Redis.family(), RedisClientKind::Redis);
    }

    #[test]
    fn test_capabilities() {
        let libs = ClientLibraries::default();
        let cluster = RedisClientKind::RedisClusterProxy.capabilities(&libs);
        assert!(cluster.contains(Capabilities::CLUSTER | Capabilities::LAZY));
        assert!(!RedisClientKind::RedisArray.capabilities(&libs).contains(Capabilities::SENTINEL));

        let no_sentinel = ClientLibraries { redis_sentinel: false, ..libs };
        assert!(!RedisClientKind::Redis.capabilities(&no_sentinel).contains(Capabilities::SENTINEL));
    }

    #[test]
    fn test_class_names() {
        assert_eq!(RedisClientKind::from_class_name("\\Redis"), Some(RedisClientKind::Redis));
        assert_eq!(RedisClientKind::from_class_name("Predis\\Client"), Some(RedisClientKind::Predis));
        assert_eq!(RedisClientKind::from_class_name("Nope"), None);
    }

    #[test]
    fn test_libraries_from_json_default_fields() {
        let libs: ClientLibraries = serde_json::from_str(r#"{"predis": true}"#).unwrap();
        assert!(libs.redis_ext && libs.predis && !libs.relay);
        assert!(ClientLibraries::none().supports_sentinel() == false);
    }
}
