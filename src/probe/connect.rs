use std::io::{self, Read, Write};
use std::net::TcpStream;

use rustls::pki_types::CertificateDer;
use rustls::{ClientConnection, StreamOwned};
use tracing::debug;

use crate::verdict::ProbeFailure;

/// The transport for one hop, either a bare socket or a TLS session over
/// it. Boxed because the TLS session is large compared to the socket.
pub enum Connection {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Connection {
    pub fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        match self {
            Connection::Plain(_) => None,
            Connection::Tls(stream) => stream.conn.peer_certificates(),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(sock) => sock.read(buf),
            Connection::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(sock) => sock.write(buf),
            Connection::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Plain(sock) => sock.flush(),
            Connection::Tls(stream) => stream.flush(),
        }
    }
}

/// Opens the TCP connection for a hop. The overall deadline is enforced
/// by the watchdog, so the connect itself stays blocking.
pub fn open_tcp(address: &str, port: u16) -> Result<TcpStream, ProbeFailure> {
    let host = address.trim_matches(['[', ']']);
    TcpStream::connect((host, port)).map_err(|e| {
        debug!(address, port, error = %e, "TCP connect failed");
        ProbeFailure::critical("Unable to open TCP socket")
    })
}
