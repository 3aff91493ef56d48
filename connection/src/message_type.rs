//! The fixed mapping from concrete message to wire type byte (§6 of the X Protocol docs).
//! Kept as plain Rust enums rather than a `.proto` enum: proto3 requires a zero-valued first
//! variant, which these non-contiguous tables don't have.

use common::err::{Error, ProtocolError};

/// Highest server message type byte this core recognizes. Anything greater (or `0x0A`) is
/// diagnosed as "wrong protocol" by the codec.
pub const MAX_SERVER_MESSAGE_TYPE: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessageType {
    CapabilitiesGet = 1,
    CapabilitiesSet = 2,
    ConnectionClose = 3,
    AuthenticateStart = 4,
    AuthenticateContinue = 5,
    SessionReset = 6,
    SessionClose = 7,
    StmtExecute = 12,
    Prepare = 40,
    PrepareExecute = 41,
    PrepareDeallocate = 42,
}

impl ClientMessageType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMessageType {
    Ok = 0,
    Error = 1,
    CapabilitiesResponse = 2,
    AuthenticateContinue = 3,
    AuthenticateOk = 4,
    Notice = 11,
    ColumnMetaData = 12,
    Row = 13,
    FetchDone = 14,
    FetchDoneMoreResultsets = 16,
    StmtExecuteOk = 17,
    FetchDoneMoreOutParams = 18,
}

impl ServerMessageType {
    pub fn from_u8(byte: u8) -> Result<Self, Error> {
        if byte == 0x0A || byte > MAX_SERVER_MESSAGE_TYPE {
            return Err(ProtocolError::WrongProtocol { message_type: byte }.into());
        }
        let kind = match byte {
            0 => ServerMessageType::Ok,
            1 => ServerMessageType::Error,
            2 => ServerMessageType::CapabilitiesResponse,
            3 => ServerMessageType::AuthenticateContinue,
            4 => ServerMessageType::AuthenticateOk,
            11 => ServerMessageType::Notice,
            12 => ServerMessageType::ColumnMetaData,
            13 => ServerMessageType::Row,
            14 => ServerMessageType::FetchDone,
            16 => ServerMessageType::FetchDoneMoreResultsets,
            17 => ServerMessageType::StmtExecuteOk,
            18 => ServerMessageType::FetchDoneMoreOutParams,
            _ => return Err(ProtocolError::WrongProtocol { message_type: byte }.into()),
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_protocol_handshake_byte_is_rejected() {
        // 0x0A is the classic protocol's initial handshake packet's protocol-version byte.
        assert!(ServerMessageType::from_u8(0x0A).is_err());
    }

    #[test]
    fn unknown_high_byte_is_rejected() {
        assert!(ServerMessageType::from_u8(200).is_err());
    }

    #[test]
    fn known_bytes_round_trip() {
        assert_eq!(ServerMessageType::from_u8(17).unwrap(), ServerMessageType::StmtExecuteOk);
        assert_eq!(ClientMessageType::StmtExecute.as_u8(), 12);
    }
}
