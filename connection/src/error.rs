//! Re-exports the shared error taxonomy at this crate's root, so callers depend on
//! `mysqlx_connection::{Error, XResult}` without reaching into the `common` crate directly.

pub use common::err::{AuthError, Error, ProtocolError, Severity, TransportError, TransportKind, XResult};
