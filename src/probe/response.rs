//! Raw response collection. The whole exchange is a single
//! request/response over a connection the server closes, so reading is a
//! matter of finding the header boundary and then honoring
//! Content-Length when one is declared.

use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::connect::Connection;
use super::headers;
use crate::verdict::ProbeFailure;

const RECV_CHUNK: usize = 8192;

/// One hop's response, split at the header boundary but otherwise
/// untouched. The body is raw wire bytes; chunked decoding happens later.
pub struct RawResponse {
    pub status_line: String,
    pub header_block: String,
    pub body: Vec<u8>,
    pub total_received: usize,
    pub time_firstbyte: Option<Duration>,
}

/// Index of the newline that ends the final header line, i.e. the first
/// `\n` followed by an empty line (`\n` or `\r\n`).
fn header_boundary(buf: &[u8]) -> Option<usize> {
    buf.iter().enumerate().position(|(i, &b)| {
        b == b'\n' && (buf[i + 1..].starts_with(b"\n") || buf[i + 1..].starts_with(b"\r\n"))
    })
}

/// Reads the full response. With `no_body` set, reading stops at the end
/// of the headers; otherwise the body is read until the declared
/// Content-Length is satisfied or the server closes the connection.
pub fn read_response(conn: &mut Connection, no_body: bool) -> Result<RawResponse, ProbeFailure> {
    let start = Instant::now();
    let mut page: Vec<u8> = Vec::new();
    let mut chunk = [0u8; RECV_CHUNK];
    let mut time_firstbyte = None;
    let mut boundary = None;

    loop {
        let n = recv(conn, &mut chunk)?;
        if n == 0 {
            break;
        }
        if time_firstbyte.is_none() {
            time_firstbyte = Some(start.elapsed());
        }
        page.extend_from_slice(&chunk[..n]);
        if let Some(end) = header_boundary(&page) {
            boundary = Some(end);
            break;
        }
    }

    if page.is_empty() {
        return Err(ProbeFailure::critical("No data received from host"));
    }

    // A response that ends before the blank line is all headers.
    let header_end = boundary.unwrap_or(page.len());
    let head = String::from_utf8_lossy(&page[..header_end]).into_owned();
    let (status_line, header_block) = split_head(&head);

    let mut total_received = page.len();
    let body = if no_body {
        trace!("discarding body per configuration");
        Vec::new()
    } else {
        let mut content_start = header_end + 1;
        while content_start < page.len()
            && (page[content_start] == b'\n' || page[content_start] == b'\r')
        {
            content_start += 1;
        }

        let goal = match headers::content_length(&header_block) {
            Some(n) if n >= 0 => Some(n as usize),
            // A negative declared length means read until close.
            _ => None,
        };
        let mut seen = page.len().saturating_sub(content_start);
        while goal.is_none_or(|goal| seen < goal) {
            let n = recv(conn, &mut chunk)?;
            if n == 0 {
                break;
            }
            page.extend_from_slice(&chunk[..n]);
            seen += n;
        }
        total_received = page.len();
        page.split_off(content_start.min(page.len()))
    };

    debug!(
        total = total_received,
        body = body.len(),
        status = %status_line,
        "response received"
    );
    Ok(RawResponse {
        status_line,
        header_block,
        body,
        total_received,
        time_firstbyte,
    })
}

fn recv(conn: &mut Connection, chunk: &mut [u8]) -> Result<usize, ProbeFailure> {
    match conn.read(chunk) {
        Ok(n) => Ok(n),
        // Close without close_notify and resets both count as end of
        // stream; the classifier decides whether the data was enough.
        Err(e) if matches!(e.kind(), ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset) => {
            Ok(0)
        }
        Err(e) => {
            debug!(error = %e, "receive failed");
            Err(ProbeFailure::critical("Error on receive"))
        }
    }
}

/// Splits the head section into the status line and the header block,
/// trimming line terminators off both ends.
fn split_head(head: &str) -> (String, String) {
    match head.split_once('\n') {
        Some((status, rest)) => (
            status.trim_end().to_string(),
            rest.trim_matches(['\r', '\n']).to_string(),
        ),
        None => (head.trim_end().to_string(), String::new()),
    }
}
