//! Per-column value decoding: interprets a raw field byte string against its column's wire
//! type tag. This is the largest single piece of the decoder — every MySQL scalar type the
//! X Protocol carries is handled here.

use std::io::Read;

use chrono::TimeZone;
use chrono_tz::Tz;
use common::err::{Error, XResult};

use crate::collation::is_binary_collation;
use crate::decimal::Decimal;

/// Column wire-type tag, mirroring `mysqlx.resultset.ColumnMetaData.FieldType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    SInt,
    UInt,
    Double,
    Float,
    Bytes,
    Time,
    DateTime,
    Set,
    Enum,
    Bit,
    Decimal,
}

/// Set on `ColumnMetaData.flags` when the column cannot hold SQL NULL.
pub const FLAG_NOT_NULL: u32 = 0x0010;

/// A decoded column value. `NULL` is represented at the call site as `Option<Value>`, not
/// as a variant here — see [`decode_field`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    SInt(i64),
    UInt(u64),
    Double(f64),
    Float(f32),
    Str(String),
    Bytes(Vec<u8>),
    /// Signed duration in nanoseconds; MySQL's `TIME` range (±838:59:59) comfortably fits.
    Time(i64),
    DateTime(chrono::DateTime<Tz>),
    Set(Vec<String>),
    Bit(u64),
    Decimal(Decimal),
}

/// Decodes one field's raw bytes per `column_type`. Returns `None` for a zero-length raw
/// field, i.e. SQL NULL, for every column type.
pub fn decode_field(column_type: ColumnType, collation_id: u64, raw: &[u8], tz: Tz) -> XResult<Option<Value>> {
    if raw.is_empty() {
        return Ok(None);
    }

    let value = match column_type {
        ColumnType::SInt => Value::SInt(decode_zigzag(raw)?),
        ColumnType::UInt => Value::UInt(decode_varint(raw)?),
        ColumnType::Bit => Value::UInt(decode_varint(raw)?),
        ColumnType::Double => Value::Double(f64::from_le_bytes(
            raw.try_into().map_err(|_| Error::decode("DOUBLE field is not 8 bytes"))?,
        )),
        ColumnType::Float => Value::Float(f32::from_le_bytes(
            raw.try_into().map_err(|_| Error::decode("FLOAT field is not 4 bytes"))?,
        )),
        ColumnType::Bytes | ColumnType::Enum => {
            let stripped = raw
                .strip_suffix(&[0u8])
                .ok_or_else(|| Error::decode("BYTES/ENUM field missing trailing NUL sentinel"))?;
            if is_binary_collation(collation_id) {
                Value::Bytes(stripped.to_vec())
            } else {
                Value::Str(String::from_utf8(stripped.to_vec())?)
            }
        }
        ColumnType::Time => Value::Time(decode_time(raw)?),
        ColumnType::DateTime => Value::DateTime(decode_datetime(raw, tz)?),
        ColumnType::Set => Value::Set(decode_set(raw)?),
        ColumnType::Decimal => Value::Decimal(Decimal::decode_bcd(raw)?),
    };

    Ok(Some(value))
}

/// Unsigned LEB128 varint, as used by protobuf (and this protocol's scalar row fields).
fn decode_varint(raw: &[u8]) -> XResult<u64> {
    let mut cursor = raw;
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        cursor
            .read_exact(&mut byte)
            .map_err(|_| Error::decode("truncated varint"))?;
        let byte = byte[0];
        result |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 64 {
            return Err(Error::decode("varint too long"));
        }
    }
}

fn decode_zigzag(raw: &[u8]) -> XResult<i64> {
    let encoded = decode_varint(raw)?;
    Ok(((encoded >> 1) as i64) ^ -((encoded & 1) as i64))
}

fn decode_time(raw: &[u8]) -> XResult<i64> {
    let mut cursor = raw;
    let mut sign_byte = [0u8; 1];
    cursor
        .read_exact(&mut sign_byte)
        .map_err(|_| Error::decode("TIME field missing sign byte"))?;
    let negative = match sign_byte[0] {
        0 => false,
        1 => true,
        other => return Err(Error::decode(format!("invalid TIME sign byte {other}"))),
    };

    let hours = decode_varint(cursor)?;
    cursor = advance_past_varint(cursor)?;

    let (minutes, cursor) = take_byte(cursor)?;
    let (seconds, cursor) = take_byte(cursor)?;

    let micros = if cursor.is_empty() { 0 } else { decode_varint(cursor)? };

    let total_nanos: i128 = (hours as i128 * 3600 + minutes as i128 * 60 + seconds as i128) * 1_000_000_000
        + micros as i128 * 1000;
    let total_nanos = i64::try_from(total_nanos).map_err(|_| Error::decode("TIME value out of range"))?;

    Ok(if negative { -total_nanos } else { total_nanos })
}

fn decode_datetime(raw: &[u8], tz: Tz) -> XResult<chrono::DateTime<Tz>> {
    let mut cursor = raw;
    let year = decode_varint(cursor)? as i32;
    cursor = advance_past_varint(cursor)?;

    let (month, cursor) = take_byte(cursor)?;
    let (day, cursor) = take_byte(cursor)?;

    let (hour, minute, second, micros) = if cursor.is_empty() {
        (0u8, 0u8, 0u8, 0u32)
    } else {
        let (hour, cursor) = take_byte(cursor)?;
        if cursor.is_empty() {
            (hour, 0, 0, 0)
        } else {
            let (minute, cursor) = take_byte(cursor)?;
            if cursor.is_empty() {
                (hour, minute, 0, 0)
            } else {
                let (second, cursor) = take_byte(cursor)?;
                let micros = if cursor.is_empty() { 0 } else { decode_varint(cursor)? as u32 };
                (hour, minute, second, micros)
            }
        }
    };

    let naive_date = chrono::NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .ok_or_else(|| Error::decode("invalid DATETIME calendar date"))?;
    let naive_time = chrono::NaiveTime::from_hms_micro_opt(hour as u32, minute as u32, second as u32, micros)
        .ok_or_else(|| Error::decode("invalid DATETIME time of day"))?;
    let naive = naive_date.and_time(naive_time);

    tz.from_local_datetime(&naive)
        .single()
        .ok_or_else(|| Error::decode("ambiguous or nonexistent local DATETIME"))
}

fn decode_set(raw: &[u8]) -> XResult<Vec<String>> {
    if raw == [0x01] {
        return Ok(Vec::new());
    }
    let mut cursor = raw;
    let mut items = Vec::new();
    while !cursor.is_empty() {
        let len = decode_varint(cursor)? as usize;
        cursor = advance_past_varint(cursor)?;
        if cursor.len() < len {
            return Err(Error::decode("SET field item length exceeds remaining payload"));
        }
        let (item, rest) = cursor.split_at(len);
        items.push(String::from_utf8(item.to_vec())?);
        cursor = rest;
    }
    Ok(items)
}

fn take_byte(cursor: &[u8]) -> XResult<(u8, &[u8])> {
    cursor
        .split_first()
        .map(|(&b, rest)| (b, rest))
        .ok_or_else(|| Error::decode("field ended before expected byte"))
}

fn advance_past_varint(raw: &[u8]) -> XResult<&[u8]> {
    let mut cursor = raw;
    loop {
        let (byte, rest) = take_byte(cursor)?;
        cursor = rest;
        if byte & 0x80 == 0 {
            return Ok(cursor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_raw_is_null() {
        assert_eq!(decode_field(ColumnType::UInt, 45, &[], Tz::UTC).unwrap(), None);
    }

    #[test]
    fn uint_decodes_varint() {
        let value = decode_field(ColumnType::UInt, 45, &[0xAC, 0x02], Tz::UTC).unwrap();
        assert_eq!(value, Some(Value::UInt(300)));
    }

    #[test]
    fn sint_decodes_zigzag_negative() {
        let value = decode_field(ColumnType::SInt, 45, &[0x01], Tz::UTC).unwrap();
        assert_eq!(value, Some(Value::SInt(-1)));
    }

    #[test]
    fn bytes_strips_trailing_sentinel_and_decodes_as_text() {
        let raw = b"hello\0";
        let value = decode_field(ColumnType::Bytes, 45, raw, Tz::UTC).unwrap();
        assert_eq!(value, Some(Value::Str("hello".into())));
    }

    #[test]
    fn bytes_with_binary_collation_stays_bytes() {
        let raw = [1, 2, 3, 0];
        let value = decode_field(ColumnType::Bytes, 63, &raw, Tz::UTC).unwrap();
        assert_eq!(value, Some(Value::Bytes(vec![1, 2, 3])));
    }

    #[test]
    fn empty_string_is_just_the_sentinel() {
        let value = decode_field(ColumnType::Bytes, 45, &[0], Tz::UTC).unwrap();
        assert_eq!(value, Some(Value::Str(String::new())));
    }

    #[test]
    fn set_empty_byte_is_empty_set_not_null() {
        let value = decode_field(ColumnType::Set, 45, &[0x01], Tz::UTC).unwrap();
        assert_eq!(value, Some(Value::Set(Vec::new())));
    }

    #[test]
    fn set_decodes_length_prefixed_items() {
        let mut raw = vec![3];
        raw.extend_from_slice(b"foo");
        raw.push(3);
        raw.extend_from_slice(b"bar");
        let value = decode_field(ColumnType::Set, 45, &raw, Tz::UTC).unwrap();
        assert_eq!(value, Some(Value::Set(vec!["foo".into(), "bar".into()])));
    }

    #[test]
    fn time_decodes_negative_duration() {
        // sign=1, hours=2 (varint), min=30, sec=0, no micros
        let raw = [1, 2, 30, 0];
        let value = decode_field(ColumnType::Time, 45, &raw, Tz::UTC).unwrap();
        let expected = -((2 * 3600 + 30 * 60) * 1_000_000_000i64);
        assert_eq!(value, Some(Value::Time(expected)));
    }
}
