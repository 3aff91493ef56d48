//! TCP/Unix transport with deadlines and in-place TLS upgrade.
//!
//! Grounded on the teacher's `packet_channel.rs` `ChannelStream` enum, generalized to add a
//! Unix-domain variant and TLS variants for both.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use common::err::{Error, TransportError, TransportKind, XResult};
use native_tls::{Certificate, TlsConnector, TlsStream};
use socket2::{Socket, TcpKeepalive};

enum Stream {
    Tcp(TcpStream),
    Unix(UnixStream),
    TlsTcp(Box<TlsStream<TcpStream>>),
    TlsUnix(Box<TlsStream<UnixStream>>),
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            Stream::Unix(s) => s.read(buf),
            Stream::TlsTcp(s) => s.read(buf),
            Stream::TlsUnix(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            Stream::Unix(s) => s.write(buf),
            Stream::TlsTcp(s) => s.write(buf),
            Stream::TlsUnix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            Stream::Unix(s) => s.flush(),
            Stream::TlsTcp(s) => s.flush(),
            Stream::TlsUnix(s) => s.flush(),
        }
    }
}

/// Options controlling a TLS upgrade, resolved from `ConnectConfig` by the session layer.
pub struct TlsOptions<'a> {
    pub server_ca_cert_path: Option<&'a Path>,
    pub server_name: Option<&'a str>,
}

/// How long the TCP stack waits without traffic before probing, per `open()`'s keep-alive
/// requirement.
const TCP_KEEPALIVE_IDLE: Duration = Duration::from_secs(60);

pub struct Transport {
    stream: Stream,
}

impl Transport {
    pub fn connect_tcp(address: &str, timeout: Duration) -> XResult<Self> {
        let stream = TcpStream::connect(address).map_err(|e| connect_error(TransportKind::Tcp, e))?;
        stream.set_nodelay(true).ok();
        stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| connect_error(TransportKind::Tcp, e))?;

        let socket = Socket::from(stream);
        socket
            .set_tcp_keepalive(&TcpKeepalive::new().with_time(TCP_KEEPALIVE_IDLE))
            .map_err(|e| connect_error(TransportKind::Tcp, e))?;
        let stream = TcpStream::from(socket);

        Ok(Transport { stream: Stream::Tcp(stream) })
    }

    pub fn connect_unix(path: &Path, timeout: Duration) -> XResult<Self> {
        let stream = UnixStream::connect(path).map_err(|e| connect_error(TransportKind::Unix, e))?;
        stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| connect_error(TransportKind::Unix, e))?;
        Ok(Transport { stream: Stream::Unix(stream) })
    }

    pub fn set_read_timeout(&self, timeout: Duration) -> XResult<()> {
        let result = match &self.stream {
            Stream::Tcp(s) => s.set_read_timeout(Some(timeout)),
            Stream::Unix(s) => s.set_read_timeout(Some(timeout)),
            Stream::TlsTcp(s) => s.get_ref().set_read_timeout(Some(timeout)),
            Stream::TlsUnix(s) => s.get_ref().set_read_timeout(Some(timeout)),
        };
        result.map_err(|e| Error::from(TransportError::BadConnection(e.to_string())))
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.stream, Stream::TlsTcp(_) | Stream::TlsUnix(_))
    }

    /// Replaces the transport in place with a TLS-wrapped one. Called after the initial
    /// capability exchange and before authentication.
    pub fn upgrade_tls(self, opts: TlsOptions<'_>) -> XResult<Self> {
        let mut builder = TlsConnector::builder();

        if let Some(ca_path) = opts.server_ca_cert_path {
            let mut data = Vec::new();
            File::open(ca_path)
                .and_then(|mut f| f.read_to_end(&mut data))
                .map_err(|e| Error::from(TransportError::Tls(format!("cannot read CA cert: {e}"))))?;
            let cert = Certificate::from_pem(&data)
                .or_else(|_| Certificate::from_der(&data))
                .map_err(|e| Error::from(TransportError::Tls(format!("cannot parse CA cert: {e}"))))?;
            builder.add_root_certificate(cert);
        } else {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }

        let connector = builder
            .build()
            .map_err(|e| Error::from(TransportError::Tls(format!("cannot build TLS connector: {e}"))))?;
        let domain = opts.server_name.unwrap_or("");

        let stream = match self.stream {
            Stream::Tcp(tcp) => {
                let tls = connector
                    .connect(domain, tcp)
                    .map_err(|e| Error::from(TransportError::Tls(e.to_string())))?;
                Stream::TlsTcp(Box::new(tls))
            }
            Stream::Unix(unix) => {
                let tls = connector
                    .connect(domain, unix)
                    .map_err(|e| Error::from(TransportError::Tls(e.to_string())))?;
                Stream::TlsUnix(Box::new(tls))
            }
            already_tls => already_tls,
        };

        Ok(Transport { stream })
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Strips the "connect: " prefix OS error strings commonly carry, and classifies the
/// failure against the transport kind that produced it.
fn connect_error(kind: TransportKind, err: io::Error) -> Error {
    let message = err.to_string();
    let message = message.strip_prefix("connect: ").unwrap_or(&message).to_string();
    TransportError::Connect { kind, message }.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_connect_prefix() {
        let err = connect_error(TransportKind::Tcp, io::Error::new(io::ErrorKind::Other, "connect: refused"));
        match err {
            Error::Transport(TransportError::Connect { message, kind }) => {
                assert_eq!(message, "refused");
                assert_eq!(kind, TransportKind::Tcp);
            }
            _ => panic!("expected Connect error"),
        }
    }
}
