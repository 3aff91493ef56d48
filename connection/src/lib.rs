//! MySQL X Protocol session implementation: wire framing, capability negotiation, TLS
//! upgrade, authentication, and result decoding, behind a single [`Session`] handle.

pub mod auth;
pub mod codec;
pub mod collation;
pub mod config;
pub mod cursor;
pub mod decimal;
pub mod error;
pub mod message_type;
pub mod notice;
pub mod proto;
pub mod result;
pub mod session;
pub mod statement;
pub mod transport;
pub mod value;

pub use config::{Address, AuthMechanism, ConnectConfig};
pub use cursor::Cursor;
pub use decimal::Decimal;
pub use error::{Error, XResult};
pub use result::{ColumnMetaData, Row, ServerCapabilities, StatementResult};
pub use session::Session;
pub use statement::{Arg, Prepared};
pub use value::{ColumnType, Value};
