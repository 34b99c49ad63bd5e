use std::io::{Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

/// One-shot TCP fixture: serves a fixed sequence of canned responses,
/// one per accepted connection, then stops listening.
pub struct TestServer {
    addr: SocketAddr,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Binds first and hands the chosen port to the response builder, so
    /// fixtures can embed their own address in redirect targets.
    pub fn serve_with(build: impl FnOnce(u16) -> Vec<Vec<u8>>) -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind fixture");
        let addr = listener.local_addr().expect("local addr");
        let responses = build(addr.port());
        let handle = thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                read_request(&mut stream);
                let _ = stream.write_all(&response);
                let _ = stream.shutdown(Shutdown::Both);
            }
        });
        Self {
            addr,
            _handle: handle,
        }
    }

    pub fn serve(responses: Vec<Vec<u8>>) -> Self {
        Self::serve_with(move |_| responses)
    }

    pub fn http_response(response: impl Into<Vec<u8>>) -> Self {
        Self::serve(vec![response.into()])
    }

    pub fn http_ok(body: &str) -> Self {
        Self::http_response(ok_response(body))
    }

    /// Accepts a connection and closes it without writing anything.
    pub fn close_without_response() -> Self {
        Self::serve(vec![Vec::new()])
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

pub fn ok_response(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

pub fn redirect_response(location: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    )
    .into_bytes()
}

fn read_request(stream: &mut TcpStream) {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                data.extend_from_slice(&buf[..n]);
                if data.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
}
