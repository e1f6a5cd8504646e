//! Database driver implementations.
//!
//! - [`postgres`]: PostgreSQL dialect, executor, pool and row transfer
//! - [`common`]: shared utilities (TLS)

pub mod common;
pub mod postgres;

pub use common::{SslMode, TlsBuilder};
pub use postgres::{PgExecutor, PgPool, PostgresDialect};
