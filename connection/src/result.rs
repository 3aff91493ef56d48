//! Result assembly: the shared frame-dispatch loop that both buffered execution and the
//! streaming [`crate::cursor::Cursor`] build on, per §4.7.

use chrono_tz::Tz;
use common::err::{Error, Severity, XResult};
use tracing::{debug, trace};

use crate::codec::{read_frame, Frame as WireFrame};
use crate::message_type::ServerMessageType;
use crate::notice::{self, Notice, Scope, StateChanges};
use crate::proto::mysqlx::connection::Capabilities as ProtoCapabilities;
use crate::proto::mysqlx::datatypes::{Any, Scalar};
use crate::proto::mysqlx::resultset::{ColumnMetaData as ProtoColumnMetaData, Row as ProtoRow};
use crate::proto::mysqlx::Error as ProtoError;
use crate::value::{decode_field, ColumnType, Value, FLAG_NOT_NULL};
use std::io::Read;

/// Resolved column description, frozen once the header phase of a result set completes.
#[derive(Debug, Clone)]
pub struct ColumnMetaData {
    pub column_type: ColumnType,
    pub name: String,
    pub original_name: String,
    pub table: String,
    pub original_table: String,
    pub schema: String,
    pub catalog: String,
    pub collation: u64,
    pub fractional_digits: u8,
    pub length: u32,
    pub flags: u32,
    pub content_type: u32,
}

impl ColumnMetaData {
    pub fn not_null(&self) -> bool {
        self.flags & FLAG_NOT_NULL != 0
    }
}

/// One row: a decoded value per column, in column order. `None` means SQL NULL.
#[derive(Debug, Clone)]
pub struct Row {
    pub values: Vec<Option<Value>>,
}

impl Row {
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(|v| v.as_ref())
    }
}

/// Server-advertised capabilities, as returned by the capability-get exchange.
#[derive(Debug, Clone, Default)]
pub struct ServerCapabilities {
    pub tls: bool,
    pub auth_mechanisms: Vec<String>,
}

fn capability_bool(any: &Any) -> bool {
    any.scalar.as_ref().and_then(|s| s.v_bool).unwrap_or(false)
}

fn scalar_string(scalar: &Scalar) -> Option<String> {
    scalar.v_string.as_ref().map(|s| String::from_utf8_lossy(&s.value).into_owned())
}

fn capability_string_list(any: &Any) -> Vec<String> {
    if let Some(array) = &any.array {
        array.value.iter().filter_map(|item| item.scalar.as_ref().and_then(scalar_string)).collect()
    } else if let Some(scalar) = &any.scalar {
        scalar_string(scalar).into_iter().collect()
    } else {
        Vec::new()
    }
}

/// Aggregate outcome of driving the frame loop to completion, per §3's `Result` type.
#[derive(Debug, Clone, Default)]
pub struct StatementResult {
    pub ok: bool,
    pub auth_ok: bool,
    pub stmt_ok: bool,
    pub fetch_done: bool,
    pub fetch_done_more_resultsets: bool,
    pub fetch_done_more_out_params: bool,
    pub columns: Vec<ColumnMetaData>,
    pub rows: Vec<Row>,
    pub state_changes: StateChanges,
    pub warnings: Vec<notice::Warning>,
    pub stmt_id: Option<u32>,
    pub challenge: Option<Vec<u8>>,
    pub server_capabilities: Option<ServerCapabilities>,
    pub unhandled: Vec<u8>,
}

fn column_type_from_wire(code: i32) -> XResult<ColumnType> {
    match code {
        1 => Ok(ColumnType::SInt),
        2 => Ok(ColumnType::UInt),
        5 => Ok(ColumnType::Double),
        6 => Ok(ColumnType::Float),
        7 => Ok(ColumnType::Bytes),
        10 => Ok(ColumnType::Time),
        12 => Ok(ColumnType::DateTime),
        15 => Ok(ColumnType::Set),
        16 => Ok(ColumnType::Enum),
        17 => Ok(ColumnType::Bit),
        18 => Ok(ColumnType::Decimal),
        other => Err(Error::decode(format!("unknown column type code {other}"))),
    }
}

fn convert_column(proto: ProtoColumnMetaData) -> XResult<ColumnMetaData> {
    Ok(ColumnMetaData {
        column_type: column_type_from_wire(proto.r#type)?,
        name: bytes_to_string(proto.name),
        original_name: bytes_to_string(proto.original_name),
        table: bytes_to_string(proto.table),
        original_table: bytes_to_string(proto.original_table),
        schema: bytes_to_string(proto.schema),
        catalog: bytes_to_string(proto.catalog),
        collation: proto.collation.unwrap_or(0),
        fractional_digits: proto.fractional_digits.unwrap_or(0) as u8,
        length: proto.length.unwrap_or(0),
        flags: proto.flags.unwrap_or(0),
        content_type: proto.content_type.unwrap_or(0),
    })
}

fn bytes_to_string(raw: Option<Vec<u8>>) -> String {
    raw.map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default()
}

fn decode_row(proto: ProtoRow, columns: &[ColumnMetaData], tz: Tz) -> XResult<Row> {
    if proto.field.len() != columns.len() {
        return Err(Error::decode(format!(
            "row has {} fields but {} columns were announced",
            proto.field.len(),
            columns.len()
        )));
    }
    let mut values = Vec::with_capacity(columns.len());
    for (field, column) in proto.field.iter().zip(columns) {
        let decoded = decode_field(column.column_type, column.collation, field, tz)?;
        if decoded.is_none() && column.not_null() {
            return Err(Error::decode(format!(
                "column {:?} is NOT NULL but field was empty",
                column.name
            )));
        }
        values.push(decoded);
    }
    Ok(Row { values })
}

/// Drives the shared frame loop until `is_done` reports true on the accumulated result, or
/// a terminal `Error` frame / transport failure ends it early. Used directly by buffered
/// execution; the streaming [`crate::cursor::Cursor`] reads one frame at a time instead but
/// shares every branch of this dispatch.
pub fn run_frame_loop<R: Read>(
    reader: &mut R,
    tz: Tz,
    is_done: impl Fn(&StatementResult) -> bool,
) -> XResult<StatementResult> {
    let mut result = StatementResult::default();
    loop {
        let frame = read_frame(reader)?;
        dispatch_frame(&frame, &mut result, tz)?;
        if is_done(&result) {
            return Ok(result);
        }
    }
}

/// Applies one wire frame's effect to `result`, per the dispatch table in §4.7.
pub fn dispatch_frame(frame: &WireFrame, result: &mut StatementResult, tz: Tz) -> XResult<()> {
    let message_type = ServerMessageType::from_u8(frame.message_type)?;
    trace!(?message_type, len = frame.payload.len(), "dispatching frame");

    match message_type {
        ServerMessageType::Ok => {
            result.ok = true;
        }
        ServerMessageType::Error => {
            let err: ProtoError = frame.decode()?;
            // The wire distinguishes ERROR/FATAL severity; this core folds both into one
            // tier since every `Error` frame here is already a hard stop for the request.
            return Err(Error::Server {
                code: err.code,
                sql_state: err.sql_state,
                severity: Severity::Error,
                message: err.msg,
            });
        }
        ServerMessageType::CapabilitiesResponse => {
            let caps: ProtoCapabilities = frame.decode()?;
            let mut tls = false;
            let mut auth_mechanisms = Vec::new();
            for capability in &caps.capabilities {
                match capability.name.as_str() {
                    "tls" => tls = capability.value.as_ref().map(capability_bool).unwrap_or(false),
                    "authentication.mechanisms" => {
                        auth_mechanisms = capability.value.as_ref().map(capability_string_list).unwrap_or_default();
                    }
                    _ => {}
                }
            }
            debug!(tls, mechanisms = ?auth_mechanisms, "received server capabilities");
            result.server_capabilities = Some(ServerCapabilities { tls, auth_mechanisms });
        }
        ServerMessageType::AuthenticateContinue => {
            let continue_msg: crate::proto::mysqlx::session::AuthenticateContinue = frame.decode()?;
            result.challenge = Some(continue_msg.auth_data);
        }
        ServerMessageType::AuthenticateOk => {
            result.auth_ok = true;
        }
        ServerMessageType::Notice => {
            let notice_frame: crate::proto::mysqlx::notice::Frame = frame.decode()?;
            if notice::frame_scope(&notice_frame) == Scope::Local {
                trace!("ignoring LOCAL notice outside a message sequence boundary");
                return Ok(());
            }
            match notice::decode_notice(&notice_frame)? {
                Notice::Warning(warning) => result.warnings.push(warning),
                Notice::SessionStateChanged { param, values } => {
                    result.state_changes.apply(&param, &values);
                }
                Notice::SessionVariableChanged { .. } => {}
                Notice::GroupReplicationStateChanged { .. } => {}
                Notice::ServerHello => {}
                Notice::Unhandled { notice_type } => {
                    result.unhandled.push(notice_type as u8);
                }
            }
        }
        ServerMessageType::ColumnMetaData => {
            let proto: ProtoColumnMetaData = frame.decode()?;
            result.columns.push(convert_column(proto)?);
        }
        ServerMessageType::Row => {
            let proto: ProtoRow = frame.decode()?;
            result.rows.push(decode_row(proto, &result.columns, tz)?);
        }
        ServerMessageType::FetchDone => {
            result.fetch_done = true;
        }
        ServerMessageType::FetchDoneMoreResultsets => {
            result.fetch_done_more_resultsets = true;
        }
        ServerMessageType::FetchDoneMoreOutParams => {
            result.fetch_done_more_out_params = true;
        }
        ServerMessageType::StmtExecuteOk => {
            result.stmt_ok = true;
        }
    }

    Ok(())
}
