//! Frame-level codec: `u32` little-endian length (covering the type byte and payload),
//! `u8` message type, then the protobuf payload. Grounded on the teacher's
//! `packet_channel.rs` read/write pair, generalized from its u24+seq framing to this
//! protocol's u32+type framing.

use std::io::{self, IoSlice, Read, Write};
use std::time::Duration;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use common::err::{Error, TransportError, XResult};
use prost::Message;

use crate::message_type::ServerMessageType;

/// Frame header size: 4-byte length + 1-byte message type.
pub const FRAME_HEADER_SIZE: usize = 5;

/// Applied to reads when the caller supplies no explicit deadline.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// One decoded frame: the wire message type and its still-encoded protobuf payload.
#[derive(Debug)]
pub struct Frame {
    pub message_type: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn decode<M: Message + Default>(&self) -> XResult<M> {
        M::decode(self.payload.as_slice()).map_err(|e| Error::decode(e.to_string()))
    }
}

/// Reads exactly one frame. A short read (including EOF before the 5th header byte)
/// surfaces as `TransportError::BadConnection`; a type byte that looks like the classic
/// protocol, or any byte past the known maximum, surfaces as `ProtocolError::WrongProtocol`.
pub fn read_frame<R: Read>(reader: &mut R) -> XResult<Frame> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut header).map_err(bad_connection)?;

    let len = (&header[0..4]).read_u32::<LittleEndian>().map_err(bad_connection)? as usize;
    let message_type = header[4];
    ServerMessageType::from_u8(message_type)?;

    let payload_len = len.checked_sub(1).ok_or_else(|| {
        Error::from(TransportError::BadConnection("frame length underflows type byte".into()))
    })?;

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).map_err(bad_connection)?;

    Ok(Frame { message_type, payload })
}

/// Writes one frame as a single scatter-gather call where the platform supports it.
/// Rejects payloads over `max_allowed_packet` (when nonzero) before writing anything, since
/// the server does not reliably error on oversize input for this protocol.
pub fn write_frame<W: Write>(
    writer: &mut W,
    message_type: u8,
    payload: &[u8],
    max_allowed_packet: usize,
) -> XResult<()> {
    if max_allowed_packet > 0 && payload.len() > max_allowed_packet {
        return Err(TransportError::PacketTooLarge {
            len: payload.len(),
            max: max_allowed_packet,
        }
        .into());
    }

    let mut header = [0u8; FRAME_HEADER_SIZE];
    (&mut header[0..4])
        .write_u32::<LittleEndian>((payload.len() + 1) as u32)
        .expect("fixed-size buffer write cannot fail");
    header[4] = message_type;

    write_vectored_all(writer, &header, payload).map_err(bad_connection)?;
    writer.flush().map_err(bad_connection)
}

pub fn encode_message<M: Message>(msg: &M) -> Vec<u8> {
    msg.encode_to_vec()
}

/// Writes the header and payload as one `write_vectored` call, falling back to two
/// ordinary writes for writers (or platforms) that don't actually scatter.
fn write_vectored_all<W: Write>(writer: &mut W, header: &[u8], payload: &[u8]) -> io::Result<()> {
    let slices = [IoSlice::new(header), IoSlice::new(payload)];
    let total = header.len() + payload.len();
    let written = writer.write_vectored(&slices)?;
    if written == total {
        return Ok(());
    }
    if written >= header.len() {
        writer.write_all(&payload[written - header.len()..])
    } else {
        writer.write_all(&header[written..])?;
        writer.write_all(payload)
    }
}

fn bad_connection(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::TimedOut || err.kind() == io::ErrorKind::WouldBlock {
        return Error::Timeout;
    }
    Error::from(TransportError::BadConnection(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_a_frame() {
        let payload = b"hello".to_vec();
        let mut buf = Vec::new();
        write_frame(&mut buf, 17, &payload, 0).unwrap();

        let mut cursor = Cursor::new(buf);
        let frame = read_frame(&mut cursor).unwrap();
        assert_eq!(frame.message_type, 17);
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn short_header_is_bad_connection() {
        let mut cursor = Cursor::new(vec![1, 2, 3]);
        let err = read_frame(&mut cursor).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn classic_protocol_byte_is_wrong_protocol() {
        let mut buf = vec![5, 0, 0, 0, 0x0A];
        buf.extend_from_slice(&[0u8; 4]);
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.code(), Some(2007));
    }

    #[test]
    fn oversize_payload_is_rejected_before_writing() {
        let mut buf = Vec::new();
        let err = write_frame(&mut buf, 12, &[0u8; 100], 10).unwrap_err();
        assert_eq!(err.code(), Some(2020));
        assert!(buf.is_empty());
    }
}
