//! The session state machine: dial → hello → capability negotiation → optional TLS upgrade
//! → authentication → meta-info probe → steady state, per §4.5.

use chrono_tz::Tz;
use common::err::{Error, ProtocolError, XResult};
use tracing::instrument;

use crate::auth;
use crate::codec::{encode_message, read_frame, write_frame, DEFAULT_READ_TIMEOUT};
use crate::config::{Address, ConnectConfig};
use crate::cursor::Cursor;
use crate::message_type::{ClientMessageType, ServerMessageType};
use crate::proto::mysqlx::sql::StmtExecute as ProtoStmtExecute;
use crate::proto::mysqlx::prepare::{Execute as ProtoExecute, Deallocate as ProtoDeallocate, Prepare as ProtoPrepare};
use crate::proto::mysqlx::prepare::prepare::OneOfMessage;
use crate::result::{run_frame_loop, ServerCapabilities, StatementResult};
use crate::statement::{arg_to_any, count_placeholders, substitute_placeholders, Arg, Prepared};
use crate::transport::{TlsOptions, Transport};

/// Mutable, single-threaded logical connection. See module docs and §3 for the full
/// lifecycle and invariants.
pub struct Session {
    transport: Transport,
    schema: String,
    tz: Tz,
    capabilities: ServerCapabilities,
    auth_mechanism_used: Option<String>,
    server_version: String,
    connection_id: u64,
    max_allowed_packet: usize,
    next_stmt_id: u32,
}

impl Session {
    /// Performs the full handshake: dial, hello, capability negotiation, optional TLS
    /// upgrade, authentication, and the meta-information probe. Returns an `Idle` session.
    #[instrument(skip(config), fields(address = ?config.address()))]
    pub fn open(config: &ConnectConfig) -> XResult<Session> {
        config.validate()?;
        let tz = config.time_zone()?;

        let mut transport = match config.address() {
            Address::Tcp(addr) => Transport::connect_tcp(addr, DEFAULT_READ_TIMEOUT)?,
            Address::Unix(path) => Transport::connect_unix(path, DEFAULT_READ_TIMEOUT)?,
        };

        await_hello(&mut transport, tz)?;

        write_frame(&mut transport, ClientMessageType::CapabilitiesGet.as_u8(), &[], 0)?;
        let negotiated = run_frame_loop(&mut transport, tz, |r| r.server_capabilities.is_some())?;
        let capabilities = negotiated.server_capabilities.unwrap_or_default();

        if config.use_tls() {
            if !capabilities.tls {
                return Err(Error::Argument("server does not advertise TLS support".into()));
            }
            set_tls_capability(&mut transport)?;
            transport = transport.upgrade_tls(TlsOptions {
                server_ca_cert_path: config.tls_server_ca_cert_path().as_deref(),
                server_name: config.tls_server_name(),
            })?;
        }

        let auth_result = auth::authenticate(&mut transport, config, transport.is_tls())?;
        if !auth_result.auth_ok {
            return Err(Error::from(common::err::AuthError::Exhausted));
        }

        let mut session = Session {
            transport,
            schema: config.schema().unwrap_or("").to_string(),
            tz,
            capabilities,
            auth_mechanism_used: Some(config.auth_mechanism().to_string()),
            server_version: String::new(),
            connection_id: 0,
            max_allowed_packet: 0,
            next_stmt_id: 1,
        };

        session.probe_meta_info()?;
        Ok(session)
    }

    fn probe_meta_info(&mut self) -> XResult<()> {
        let result = self.execute("SELECT VERSION(), CONNECTION_ID(), @@mysqlx_max_allowed_packet", &[])?;
        if let Some(row) = result.rows.first() {
            if let Some(crate::value::Value::Str(v)) = row.get(0) {
                self.server_version = v.clone();
            }
            if let Some(id) = row.get(1) {
                self.connection_id = value_as_u64(id).unwrap_or(0);
            }
            if let Some(limit) = row.get(2) {
                self.max_allowed_packet = value_as_u64(limit).unwrap_or(0) as usize;
            }
        }
        Ok(())
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn max_allowed_packet(&self) -> usize {
        self.max_allowed_packet
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    pub fn auth_mechanism_used(&self) -> Option<&str> {
        self.auth_mechanism_used.as_deref()
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn time_zone(&self) -> Tz {
        self.tz
    }

    /// Buffered execution: substitutes `args` into `sql` (see [`crate::statement`]) and runs
    /// the frame loop to completion, collecting every row.
    #[instrument(skip(self, args), fields(stmt_len = sql.len()))]
    pub fn execute(&mut self, sql: &str, args: &[Arg]) -> XResult<StatementResult> {
        let text = substitute_placeholders(sql, args)?;
        let exec = ProtoStmtExecute {
            namespace: Some("sql".to_string()),
            stmt: text.into_bytes(),
            args: Vec::new(),
            compact_metadata: None,
        };
        self.send(ClientMessageType::StmtExecute, &exec)?;
        run_frame_loop(&mut self.transport, self.tz, |r| r.stmt_ok)
    }

    /// Streaming execution: returns a [`Cursor`] that reads one row at a time instead of
    /// buffering the whole result set.
    #[instrument(skip(self, args), fields(stmt_len = sql.len()))]
    pub fn execute_streaming(&mut self, sql: &str, args: &[Arg]) -> XResult<Cursor<'_, Transport>> {
        let text = substitute_placeholders(sql, args)?;
        let exec = ProtoStmtExecute {
            namespace: Some("sql".to_string()),
            stmt: text.into_bytes(),
            args: Vec::new(),
            compact_metadata: None,
        };
        self.send(ClientMessageType::StmtExecute, &exec)?;
        Cursor::open(&mut self.transport, self.tz)
    }

    /// Registers `sql` under a fresh session-unique statement id.
    #[instrument(skip(self), fields(stmt_len = sql.len()))]
    pub fn prepare(&mut self, sql: &str) -> XResult<Prepared> {
        let stmt_id = self.next_stmt_id;
        self.next_stmt_id = self.next_stmt_id.wrapping_add(1);

        let placeholder_count = count_placeholders(sql);
        let inner = ProtoStmtExecute {
            namespace: Some("sql".to_string()),
            stmt: sql.as_bytes().to_vec(),
            args: Vec::new(),
            compact_metadata: None,
        };
        let prepare_msg = ProtoPrepare {
            stmt_id,
            stmt: Some(OneOfMessage {
                r#type: 0,
                stmt_execute: Some(inner),
            }),
        };
        self.send(ClientMessageType::Prepare, &prepare_msg)?;
        let result = run_frame_loop(&mut self.transport, self.tz, |r| r.ok)?;
        if !result.ok {
            return Err(Error::from(ProtocolError::UnexpectedMessage {
                expected: "Ok",
                got: "other".to_string(),
            }));
        }
        Ok(Prepared { stmt_id, placeholder_count })
    }

    pub fn execute_prepared(&mut self, prepared: &Prepared, args: &[Arg]) -> XResult<StatementResult> {
        if args.len() != prepared.placeholder_count {
            return Err(Error::argument(format!(
                "prepared statement has {} placeholders but {} arguments were given",
                prepared.placeholder_count,
                args.len()
            )));
        }
        let execute_msg = ProtoExecute {
            stmt_id: prepared.stmt_id,
            args: args.iter().map(arg_to_any).collect(),
            compact_metadata: None,
        };
        self.send(ClientMessageType::PrepareExecute, &execute_msg)?;
        run_frame_loop(&mut self.transport, self.tz, |r| r.stmt_ok)
    }

    pub fn deallocate(&mut self, prepared: Prepared) -> XResult<()> {
        let msg = ProtoDeallocate { stmt_id: prepared.stmt_id };
        self.send(ClientMessageType::PrepareDeallocate, &msg)?;
        run_frame_loop(&mut self.transport, self.tz, |r| r.ok)?;
        Ok(())
    }

    /// Best-effort `SessionClose` then `ConnectionClose`, regardless of intermediate errors,
    /// per §5.
    pub fn close(mut self) {
        let _ = write_frame(&mut self.transport, ClientMessageType::SessionClose.as_u8(), &[], 0);
        let _ = write_frame(&mut self.transport, ClientMessageType::ConnectionClose.as_u8(), &[], 0);
    }

    fn send<M: prost::Message>(&mut self, message_type: ClientMessageType, msg: &M) -> XResult<()> {
        let payload = encode_message(msg);
        write_frame(&mut self.transport, message_type.as_u8(), &payload, self.max_allowed_packet)
    }
}

fn value_as_u64(v: &crate::value::Value) -> Option<u64> {
    match v {
        crate::value::Value::UInt(n) => Some(*n),
        crate::value::Value::SInt(n) => u64::try_from(*n).ok(),
        _ => None,
    }
}

fn set_tls_capability(transport: &mut Transport) -> XResult<()> {
    use crate::proto::mysqlx::connection::{Capabilities, Capability, CapabilitiesSet as ProtoCapabilitiesSet};
    use crate::proto::mysqlx::datatypes::{scalar::Type as ScalarType, Any};
    use crate::proto::mysqlx::datatypes::Scalar;

    let capability = Capability {
        name: "tls".to_string(),
        value: Some(Any {
            r#type: crate::proto::mysqlx::datatypes::any::Type::Scalar as i32,
            scalar: Some(Scalar {
                r#type: ScalarType::VBool as i32,
                v_bool: Some(true),
                ..Default::default()
            }),
            obj: None,
            array: None,
        }),
    };
    let set_msg = ProtoCapabilitiesSet {
        capabilities: Some(Capabilities { capabilities: vec![capability] }),
    };
    let payload = encode_message(&set_msg);
    write_frame(transport, ClientMessageType::CapabilitiesSet.as_u8(), &payload, 0)?;

    let result = run_frame_loop(transport, Tz::UTC, |r| r.ok)?;
    if !result.ok {
        return Err(Error::from(ProtocolError::UnexpectedMessage {
            expected: "Ok",
            got: "other".to_string(),
        }));
    }
    Ok(())
}

/// Waits for the server's hello notice. Any other frame here is a protocol violation: the
/// server should speak first with nothing else.
fn await_hello<T: std::io::Read + std::io::Write>(transport: &mut T, tz: Tz) -> XResult<()> {
    let frame = read_frame(transport)?;
    if ServerMessageType::from_u8(frame.message_type)? != ServerMessageType::Notice {
        return Err(Error::from(ProtocolError::UnexpectedMessage {
            expected: "Notice(ServerHello)",
            got: format!("{:?}", frame.message_type),
        }));
    }
    let mut result = StatementResult::default();
    crate::result::dispatch_frame(&frame, &mut result, tz)?;
    Ok(())
}
