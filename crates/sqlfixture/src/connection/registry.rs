//! Connection cache for one test run.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::Connection;
use crate::config::ConnectionConfig;
use crate::error::Result;

type Key = (String, String);

/// Hands out one shared connection per `(url, user)`.
///
/// Construct one per test run and call [`close_all`](Self::close_all) when
/// done. Connections are wrapped in a mutex so callers sharing one never use
/// it concurrently.
pub struct ConnectionRegistry<C: Connection> {
    connections: Mutex<HashMap<Key, Arc<Mutex<C>>>>,
}

impl<C: Connection> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connection> ConnectionRegistry<C> {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn key(config: &ConnectionConfig) -> Key {
        (config.url.clone(), config.user.clone())
    }

    /// Cached connection for `config`, opening one with `connect` on a miss.
    ///
    /// The registry lock is held while connecting, so concurrent callers for
    /// the same key never open two connections.
    pub fn get_or_connect<F>(&self, config: &ConnectionConfig, connect: F) -> Result<Arc<Mutex<C>>>
    where
        F: FnOnce(&ConnectionConfig) -> Result<C>,
    {
        let mut connections = self.connections.lock();
        let key = Self::key(config);
        if let Some(conn) = connections.get(&key) {
            debug!("Reusing connection for {} as {}", config.url, config.user);
            return Ok(Arc::clone(conn));
        }
        let conn = Arc::new(Mutex::new(connect(config)?));
        info!("Opened connection for {} as {}", config.url, config.user);
        connections.insert(key, Arc::clone(&conn));
        Ok(conn)
    }

    /// Cached connection for `config`, if any.
    pub fn get(&self, config: &ConnectionConfig) -> Option<Arc<Mutex<C>>> {
        self.connections.lock().get(&Self::key(config)).cloned()
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// Close and forget every cached connection. Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let drained: Vec<(Key, Arc<Mutex<C>>)> = self.connections.lock().drain().collect();
        let count = drained.len();
        for ((url, user), conn) in drained {
            if let Err(e) = conn.lock().close() {
                warn!("Failed to close connection for {} as {}: {}", url, user, e);
            }
        }
        info!("Closed {} connection(s)", count);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ColumnInfo, PreparedStatement, ResultSet};
    use crate::error::FixtureError;

    #[derive(Default)]
    struct StubConnection {
        closed: Arc<Mutex<usize>>,
    }

    impl Connection for StubConnection {
        fn execute(&mut self, _sql: &str) -> Result<u64> {
            Ok(0)
        }

        fn prepare(&mut self, _sql: &str) -> Result<Box<dyn PreparedStatement + '_>> {
            Err(FixtureError::database("not supported"))
        }

        fn query(&mut self, _sql: &str) -> Result<ResultSet> {
            Ok(ResultSet::default())
        }

        fn auto_commit(&self) -> Result<bool> {
            Ok(true)
        }

        fn set_auto_commit(&mut self, _auto_commit: bool) -> Result<()> {
            Ok(())
        }

        fn commit(&mut self) -> Result<()> {
            Ok(())
        }

        fn rollback(&mut self) -> Result<()> {
            Ok(())
        }

        fn table_names(&mut self, _schema: Option<&str>) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn columns(&mut self, _schema: Option<&str>, _table: &str) -> Result<Vec<ColumnInfo>> {
            Ok(Vec::new())
        }

        fn primary_keys(&mut self, _schema: Option<&str>, _table: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn product_name(&self) -> &str {
            "Stub"
        }

        fn product_version(&self) -> &str {
            "1"
        }

        fn close(&mut self) -> Result<()> {
            *self.closed.lock() += 1;
            Ok(())
        }
    }

    fn make_test_config(url: &str, user: &str) -> ConnectionConfig {
        ConnectionConfig {
            url: url.to_string(),
            user: user.to_string(),
            password: String::new(),
        }
    }

    #[test]
    fn test_connections_cached_per_url_and_user() {
        let registry = ConnectionRegistry::new();
        let mut opened = 0;
        let a = make_test_config("db://one", "sa");

        let first = registry
            .get_or_connect(&a, |_| {
                opened += 1;
                Ok(StubConnection::default())
            })
            .unwrap();
        let second = registry
            .get_or_connect(&a, |_| {
                opened += 1;
                Ok(StubConnection::default())
            })
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        registry
            .get_or_connect(&make_test_config("db://one", "other"), |_| {
                opened += 1;
                Ok(StubConnection::default())
            })
            .unwrap();
        assert_eq!(opened, 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_connect_failure_is_not_cached() {
        let registry: ConnectionRegistry<StubConnection> = ConnectionRegistry::new();
        let config = make_test_config("db://down", "sa");
        assert!(registry
            .get_or_connect(&config, |_| Err(FixtureError::database("refused")))
            .is_err());
        assert!(registry.get(&config).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_close_all() {
        let closed = Arc::new(Mutex::new(0));
        let registry = ConnectionRegistry::new();
        for url in ["db://a", "db://b"] {
            let closed = Arc::clone(&closed);
            registry
                .get_or_connect(&make_test_config(url, "sa"), move |_| {
                    Ok(StubConnection { closed })
                })
                .unwrap();
        }
        assert_eq!(registry.close_all(), 2);
        assert_eq!(*closed.lock(), 2);
        assert!(registry.is_empty());
    }
}
