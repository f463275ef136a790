//! MariaDB connection management.
//!
//! Provides a connection pool for the SQL-vector backend. The pool is
//! created lazily by [`MariaDbStore`](crate::mariadb_store::MariaDbStore)
//! on first use, so constructing a store never touches the network.
//!
//! # Connection Pool
//!
//! Uses `sqlx::MySqlPool` (MariaDB speaks the MySQL wire protocol) with up
//! to `max_connections` connections. Before the pool is built, a single
//! connection attempt bounded by [`CONNECT_TIMEOUT`] checks the server:
//! the pool itself retries refused connections until [`ACQUIRE_TIMEOUT`],
//! which would stall every call of a degraded factory.

use std::io;
use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::{ConnectOptions, Connection};

use crate::config::MariaDbConfig;

/// How long to wait for a pooled connection before giving up.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on the first connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Create a connection pool to the configured MariaDB server.
///
/// # Errors
///
/// Returns the driver error if the server is unreachable or rejects the
/// credentials.
pub async fn connect(config: &MariaDbConfig) -> Result<MySqlPool, sqlx::Error> {
    let options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database);

    let first = match tokio::time::timeout(CONNECT_TIMEOUT, options.connect()).await {
        Ok(conn) => conn?,
        Err(_) => {
            return Err(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect timed out after {}s", CONNECT_TIMEOUT.as_secs()),
            )))
        }
    };
    first.close().await?;

    MySqlPoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await
}
