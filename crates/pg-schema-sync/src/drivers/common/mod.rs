//! Shared driver utilities.

pub mod tls;

pub use tls::{SslMode, TlsBuilder};
