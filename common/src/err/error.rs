use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::string::FromUtf8Error;

/// Canonical client-side error codes. The distilled spec left two codes (2005, 2007) doing
/// double duty for "wrong protocol"; this lineage picks one canonical mapping per case (see
/// DESIGN.md) instead of reusing BadTcpSocket for it.
pub const CODE_BAD_UNIX_SOCKET: u32 = 2002;
pub const CODE_BAD_TCP_SOCKET: u32 = 2005;
pub const CODE_WRONG_PROTOCOL: u32 = 2007;
pub const CODE_PACKET_TOO_LARGE: u32 = 2020;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    Unix,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Tcp => write!(f, "TCP"),
            TransportKind::Unix => write!(f, "Unix"),
        }
    }
}

/// Errors below the session layer: dialing, reading, writing the raw byte stream.
/// Every variant here is terminal for the `Session` that produced it.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("bad {kind} socket: {message}")]
    Connect {
        kind: TransportKind,
        message: String,
    },

    #[error("bad connection: {0}")]
    BadConnection(String),

    #[error("packet too large: {len} bytes exceeds mysqlx_max_allowed_packet of {max} bytes")]
    PacketTooLarge { len: usize, max: usize },

    #[error("tls error: {0}")]
    Tls(String),
}

impl TransportError {
    pub fn code(&self) -> u32 {
        match self {
            TransportError::Connect {
                kind: TransportKind::Tcp,
                ..
            } => CODE_BAD_TCP_SOCKET,
            TransportError::Connect {
                kind: TransportKind::Unix,
                ..
            } => CODE_BAD_UNIX_SOCKET,
            TransportError::BadConnection(_) => CODE_BAD_TCP_SOCKET,
            TransportError::PacketTooLarge { .. } => CODE_PACKET_TOO_LARGE,
            TransportError::Tls(_) => CODE_BAD_TCP_SOCKET,
        }
    }
}

/// Errors in interpreting the frame stream itself, as opposed to the bytes underneath it.
#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    /// A server message type byte that is reserved or past the known maximum: the classic
    /// cheap diagnosis for "client pointed at the wrong port".
    #[error("wrong protocol (unexpected message type {message_type:#04x})")]
    WrongProtocol { message_type: u8 },

    #[error("malformed payload: {0}")]
    Decode(String),

    #[error("unexpected message: expected {expected}, got {got}")]
    UnexpectedMessage { expected: &'static str, got: String },
}

impl ProtocolError {
    pub fn code(&self) -> u32 {
        match self {
            ProtocolError::WrongProtocol { .. } => CODE_WRONG_PROTOCOL,
            _ => CODE_WRONG_PROTOCOL,
        }
    }
}

/// Authentication-specific failures. `Retryable` moves the AUTO policy to the next
/// mechanism; every other variant aborts the handshake outright.
#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("authentication failed: {0}")]
    Retryable(String),

    #[error("authentication failed: {0}")]
    Fatal(String),

    #[error("auth challenge has length {got}, expected 20 bytes")]
    BadChallengeLength { got: usize },

    #[error("plain text authentication only supported over TLS")]
    PlainRequiresTls,

    #[error("no supported authentication mechanism remained")]
    Exhausted,
}

/// Severity of a server-reported error or warning, as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "NOTE"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// The crate-wide error type. Every public, fallible operation returns `XResult<T>` = `Result<T, Error>`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// An `Error` frame received during steady state: code, SQL state and message preserved
    /// verbatim from the server.
    #[error("server error {code} ({sql_state}): {message}")]
    Server {
        code: u32,
        sql_state: String,
        severity: Severity,
        message: String,
    },

    /// A local, synchronous mistake made by the caller: wrong argument count, unsupported
    /// argument type, an invalid time zone name, and the like.
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("operation timed out")]
    Timeout,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Utf8(#[from] Utf8Error),

    #[error(transparent)]
    FromUtf8(#[from] FromUtf8Error),
}

impl Error {
    /// True for errors that leave the underlying `Session` unusable; the caller must treat
    /// these as "bad connection" and open a new session rather than retry the same one.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Protocol(_) | Error::Timeout | Error::Io(_)
        )
    }

    /// The canonical client/server error code for this error, where one is defined.
    pub fn code(&self) -> Option<u32> {
        match self {
            Error::Transport(e) => Some(e.code()),
            Error::Protocol(e) => Some(e.code()),
            Error::Server { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn argument(message: impl Into<String>) -> Error {
        Error::Argument(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Error {
        Error::Protocol(ProtocolError::Decode(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_fatal() {
        let err = Error::Transport(TransportError::BadConnection("eof".into()));
        assert!(err.is_fatal());
        assert_eq!(err.code(), Some(CODE_BAD_TCP_SOCKET));
    }

    #[test]
    fn server_errors_are_not_fatal() {
        let err = Error::Server {
            code: 1146,
            sql_state: "42S02".into(),
            severity: Severity::Error,
            message: "Table doesn't exist".into(),
        };
        assert!(!err.is_fatal());
        assert_eq!(err.code(), Some(1146));
    }

    #[test]
    fn wrong_protocol_uses_canonical_code() {
        let err = ProtocolError::WrongProtocol { message_type: 0x0A };
        assert_eq!(err.code(), CODE_WRONG_PROTOCOL);
    }
}
