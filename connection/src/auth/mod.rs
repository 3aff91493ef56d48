pub mod scramble;

use std::io::{Read, Write};

use common::err::{AuthError, Error, XResult};
use tracing::{info, warn};

use crate::codec::{encode_message, write_frame};
use crate::config::{AuthMechanism, ConnectConfig};
use crate::message_type::ClientMessageType;
use crate::proto::mysqlx::session::AuthenticateContinue as ProtoAuthenticateContinue;
use crate::proto::mysqlx::session::AuthenticateStart;
use crate::result::{run_frame_loop, StatementResult};

/// Order in which `AUTO` tries mechanisms: PLAIN first once TLS is active (so the server
/// populates its SHA-256 cache), otherwise straight to the challenge-response mechanisms.
fn mechanism_order(preferred: AuthMechanism, tls_active: bool) -> Vec<AuthMechanism> {
    match preferred {
        AuthMechanism::Auto if tls_active => {
            vec![AuthMechanism::Plain, AuthMechanism::Mysql41, AuthMechanism::Sha256Memory]
        }
        AuthMechanism::Auto => vec![AuthMechanism::Mysql41, AuthMechanism::Sha256Memory],
        explicit => vec![explicit],
    }
}

fn is_retryable(err: &Error) -> bool {
    matches!(err, Error::Server { .. } | Error::Auth(AuthError::Retryable(_)))
}

/// Runs the configured authentication policy against an already-connected, already
/// capability-negotiated transport. Returns the `AuthenticateOk` result (which may carry a
/// server-supplied `auth_data` payload) on success.
pub fn authenticate<T: Read + Write>(
    transport: &mut T,
    config: &ConnectConfig,
    tls_active: bool,
) -> XResult<StatementResult> {
    let mechanisms = mechanism_order(config.auth_mechanism(), tls_active);
    let mut last_err: Option<Error> = None;

    for mechanism in mechanisms {
        match try_mechanism(transport, mechanism, tls_active, config) {
            Ok(result) => return Ok(result),
            Err(err) if is_retryable(&err) => {
                warn!(%mechanism, error = %err, "authentication mechanism failed, trying next");
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_err.unwrap_or_else(|| AuthError::Exhausted.into()))
}

fn try_mechanism<T: Read + Write>(
    transport: &mut T,
    mechanism: AuthMechanism,
    tls_active: bool,
    config: &ConnectConfig,
) -> XResult<StatementResult> {
    if mechanism == AuthMechanism::Plain && !tls_active {
        return Err(AuthError::PlainRequiresTls.into());
    }

    info!(%mechanism, "starting authentication");

    let schema = config.schema().unwrap_or("");
    let username = config.username();
    let password = config.password().unwrap_or("");

    match mechanism {
        AuthMechanism::Plain => {
            let auth_data = format!("{schema}\0{username}\0{password}").into_bytes();
            send_start(transport, "PLAIN", auth_data)?;
            let result = run_frame_loop(transport, config.time_zone()?, |r| r.auth_ok)?;
            Ok(result)
        }
        AuthMechanism::Mysql41 => {
            run_challenge_response(transport, config, "MYSQL41", scramble::mysql41_scramble)
        }
        AuthMechanism::Sha256Memory => {
            run_challenge_response(transport, config, "SHA256_MEMORY", scramble::sha256_memory_scramble)
        }
        AuthMechanism::Auto => unreachable!("mechanism_order never yields Auto"),
    }
}

fn run_challenge_response<T: Read + Write>(
    transport: &mut T,
    config: &ConnectConfig,
    mech_name: &str,
    compute_scramble: impl Fn(&str, &[u8]) -> XResult<String>,
) -> XResult<StatementResult> {
    send_start(transport, mech_name, Vec::new())?;
    let tz = config.time_zone()?;
    let first = run_frame_loop(transport, tz, |r| r.auth_ok || r.challenge.is_some())?;
    let nonce = first
        .challenge
        .ok_or_else(|| Error::from(AuthError::Fatal(format!("{mech_name} server never sent a challenge"))))?;

    let scramble = compute_scramble(config.password().unwrap_or(""), &nonce)?;
    let schema = config.schema().unwrap_or("");
    let auth_data = format!("{schema}\0{}\0{scramble}", config.username()).into_bytes();

    let continue_msg = ProtoAuthenticateContinue { auth_data };
    let payload = encode_message(&continue_msg);
    write_frame(transport, ClientMessageType::AuthenticateContinue.as_u8(), &payload, 0)?;

    run_frame_loop(transport, tz, |r| r.auth_ok)
}

fn send_start<T: Write>(transport: &mut T, mech_name: &str, auth_data: Vec<u8>) -> XResult<()> {
    let start = AuthenticateStart {
        mech_name: mech_name.to_string(),
        auth_data: if auth_data.is_empty() { None } else { Some(auth_data) },
        initial_response: None,
    };
    let payload = encode_message(&start);
    write_frame(transport, ClientMessageType::AuthenticateStart.as_u8(), &payload, 0)
}
