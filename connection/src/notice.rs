//! Out-of-band notice frames: warnings, session-variable/session-state changes, group
//! replication events, and the server hello sent right after the transport connects.

use common::err::{Error, XResult, Severity};
use tracing::warn;

use crate::proto::mysqlx::datatypes::scalar::Type as ScalarType;
use crate::proto::mysqlx::datatypes::Scalar;
use crate::proto::mysqlx::notice::{
    Frame, GroupReplicationStateChanged as ProtoGroupReplicationStateChanged, SessionStateChanged as ProtoSessionStateChanged,
    SessionVariableChanged as ProtoSessionVariableChanged, Warning as ProtoWarning,
};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub severity: Severity,
    pub code: u32,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum Notice {
    Warning(Warning),
    SessionVariableChanged { param: String, value: Option<Value> },
    SessionStateChanged { param: String, values: Vec<Value> },
    GroupReplicationStateChanged { kind: u32, view_id: Option<String> },
    ServerHello,
    /// A recognized notice type whose payload this core doesn't further decode, or a type
    /// byte outside the known table. Never fatal.
    Unhandled { notice_type: u32 },
}

/// Tracks effects of `SessionStateChanged` notices across one request's response, per §4.4.
#[derive(Debug, Clone, Default)]
pub struct StateChanges {
    pub last_insert_id: Option<u64>,
    pub rows_affected: Option<u64>,
    pub current_schema: Option<String>,
    pub produced_message: Option<String>,
    pub client_id: Option<u64>,
}

impl StateChanges {
    pub fn apply(&mut self, param: &str, values: &[Value]) {
        match param {
            "GENERATED_INSERT_ID" => self.last_insert_id = values.first().and_then(value_as_u64),
            "ROWS_AFFECTED" => self.rows_affected = values.first().and_then(value_as_u64),
            "CURRENT_SCHEMA" => self.current_schema = values.first().and_then(value_as_string),
            "PRODUCED_MESSAGE" => self.produced_message = values.first().and_then(value_as_string),
            "CLIENT_ID_ASSIGNED" => self.client_id = values.first().and_then(value_as_u64),
            _ => {}
        }
    }
}

fn value_as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::UInt(n) => Some(*n),
        Value::SInt(n) => u64::try_from(*n).ok(),
        _ => None,
    }
}

fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::Str(s) => Some(s.clone()),
        _ => None,
    }
}

const NOTICE_WARNING: u32 = 1;
const NOTICE_SESSION_VARIABLE_CHANGED: u32 = 2;
const NOTICE_SESSION_STATE_CHANGED: u32 = 3;
const NOTICE_GROUP_REPLICATION_STATE_CHANGED: u32 = 4;
const NOTICE_SERVER_HELLO: u32 = 5;

/// `GLOBAL` unless the frame explicitly says otherwise.
pub fn frame_scope(frame: &Frame) -> Scope {
    match frame.scope {
        Some(2) => Scope::Local,
        _ => Scope::Global,
    }
}

pub fn decode_notice(frame: &Frame) -> XResult<Notice> {
    let payload = frame.payload.as_deref().unwrap_or(&[]);

    let notice = match frame.r#type {
        NOTICE_WARNING => {
            let w: ProtoWarning = prost::Message::decode(payload).map_err(|e| Error::decode(e.to_string()))?;
            Notice::Warning(Warning {
                severity: warning_severity(w.level),
                code: w.code,
                message: w.msg,
            })
        }
        NOTICE_SESSION_VARIABLE_CHANGED => {
            let v: ProtoSessionVariableChanged =
                prost::Message::decode(payload).map_err(|e| Error::decode(e.to_string()))?;
            Notice::SessionVariableChanged {
                param: v.param,
                value: v.value.as_ref().map(scalar_to_value).transpose()?,
            }
        }
        NOTICE_SESSION_STATE_CHANGED => {
            let v: ProtoSessionStateChanged =
                prost::Message::decode(payload).map_err(|e| Error::decode(e.to_string()))?;
            let values = v
                .value
                .iter()
                .map(scalar_to_value)
                .collect::<XResult<Vec<_>>>()?;
            Notice::SessionStateChanged { param: v.param, values }
        }
        NOTICE_GROUP_REPLICATION_STATE_CHANGED => {
            let v: ProtoGroupReplicationStateChanged =
                prost::Message::decode(payload).map_err(|e| Error::decode(e.to_string()))?;
            Notice::GroupReplicationStateChanged { kind: v.r#type, view_id: v.view_id }
        }
        NOTICE_SERVER_HELLO => Notice::ServerHello,
        other => {
            warn!(notice_type = other, "unhandled notice type");
            Notice::Unhandled { notice_type: other }
        }
    };

    Ok(notice)
}

fn warning_severity(level: Option<i32>) -> Severity {
    match level {
        Some(1) => Severity::Note,
        Some(3) => Severity::Error,
        _ => Severity::Warning,
    }
}

/// Converts a scalar notice payload into this crate's `Value`. Only the variants that
/// actually appear in session-state/session-variable notices are handled; anything else
/// decodes to a best-effort string.
fn scalar_to_value(scalar: &Scalar) -> XResult<Value> {
    let value = match ScalarType::try_from(scalar.r#type).unwrap_or(ScalarType::VString) {
        ScalarType::VSint => Value::SInt(scalar.v_signed_int.unwrap_or(0)),
        ScalarType::VUint => Value::UInt(scalar.v_unsigned_int.unwrap_or(0)),
        ScalarType::VBool => Value::UInt(u64::from(scalar.v_bool.unwrap_or(false))),
        ScalarType::VDouble => Value::Double(scalar.v_double.unwrap_or(0.0)),
        ScalarType::VFloat => Value::Float(scalar.v_float.unwrap_or(0.0)),
        ScalarType::VString => {
            let bytes = scalar.v_string.as_ref().map(|s| s.value.clone()).unwrap_or_default();
            Value::Str(String::from_utf8(bytes)?)
        }
        ScalarType::VOctets => {
            let bytes = scalar.v_octets.as_ref().map(|o| o.value.clone()).unwrap_or_default();
            Value::Bytes(bytes)
        }
        ScalarType::VNull => Value::Str(String::new()),
    };
    Ok(value)
}
