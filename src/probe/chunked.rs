//! Decoder for `Transfer-Encoding: chunked` bodies.

use crate::verdict::ProbeFailure;

/// Reassembles a chunked body into a fresh buffer. Trailers are ignored;
/// a malformed chunk size or framing raises an UNKNOWN failure rather
/// than classifying garbage as page content.
pub fn decode_chunked(raw: &[u8]) -> Result<Vec<u8>, ProbeFailure> {
    let mut decoded = Vec::with_capacity(raw.len());
    let mut pos = 0;

    loop {
        while pos < raw.len() && raw[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= raw.len() {
            break;
        }

        let size_start = pos;
        while pos < raw.len() && raw[pos].is_ascii_hexdigit() {
            pos += 1;
        }
        let size_str = std::str::from_utf8(&raw[size_start..pos]).unwrap_or("");
        let size = usize::from_str_radix(size_str, 16).map_err(|_| {
            ProbeFailure::unknown("Failed to parse chunked body, invalid chunk size")
        })?;
        if size == 0 {
            break;
        }

        // Skip chunk extensions up to the end of the size line, then
        // require the line terminator itself.
        while pos < raw.len() && raw[pos] != b'\r' && raw[pos] != b'\n' {
            pos += 1;
        }
        if raw[pos..].starts_with(b"\r\n") {
            pos += 2;
        } else if raw[pos..].starts_with(b"\n") {
            pos += 1;
        } else {
            return Err(ProbeFailure::unknown(
                "Failed to parse chunked body, invalid format",
            ));
        }

        // size is attacker-controlled and may be usize::MAX; compare
        // against the remainder instead of computing pos + size.
        if size > raw.len() - pos {
            return Err(ProbeFailure::unknown(
                "Failed to parse chunked body, invalid format",
            ));
        }
        decoded.extend_from_slice(&raw[pos..pos + size]);
        pos += size;
    }

    Ok(decoded)
}
