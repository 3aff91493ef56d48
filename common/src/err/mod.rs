pub mod error;

pub use error::{AuthError, Error, ProtocolError, Severity, TransportError, TransportKind};

/// Crate-wide result alias. Every fallible public operation in this lineage returns this.
pub type XResult<T> = Result<T, Error>;
