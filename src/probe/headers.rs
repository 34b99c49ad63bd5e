//! Lenient header-block parsing. Servers in the wild fold lines, vary
//! case, and pad values, so everything here is tolerant by default.

/// Joins folded continuation lines and drops blank ones, yielding one
/// string per logical header.
pub fn logical_lines(block: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in block.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.is_empty() {
            continue;
        }
        if line.starts_with([' ', '\t']) {
            if let Some(last) = out.last_mut() {
                last.push(' ');
                last.push_str(line.trim_start());
                continue;
            }
        }
        out.push(line.to_string());
    }
    out
}

fn value_of<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    if line.len() <= name.len() {
        return None;
    }
    let (head, rest) = line.split_at(name.len());
    if !head.eq_ignore_ascii_case(name) {
        return None;
    }
    rest.strip_prefix(':').map(str::trim)
}

/// Value of the first header with the given name, case-insensitively.
pub fn first_header(block: &str, name: &str) -> Option<String> {
    logical_lines(block)
        .iter()
        .find_map(|line| value_of(line, name))
        .map(str::to_string)
}

/// Value of the last header with the given name. Duplicate Date or
/// Last-Modified headers resolve to the final occurrence.
pub fn last_header(block: &str, name: &str) -> Option<String> {
    logical_lines(block)
        .iter()
        .rev()
        .find_map(|line| value_of(line, name))
        .map(str::to_string)
}

/// Declared Content-Length, parsed with leading-digits semantics: a
/// value that starts with garbage counts as zero, a negative value is
/// preserved so the caller can fall back to read-to-EOF.
pub fn content_length(block: &str) -> Option<i64> {
    first_header(block, "Content-Length").map(|value| leading_int(&value))
}

pub fn is_chunked(block: &str) -> bool {
    first_header(block, "Transfer-Encoding")
        .is_some_and(|value| value.eq_ignore_ascii_case("chunked"))
}

fn leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = rest
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(rest.len(), |(i, _)| i);
    rest[..end].parse::<i64>().map_or(0, |v| sign * v)
}

/// Byte-wise substring search, used for body content expectations.
pub fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = "Server: test\r\nContent-Length: 42\r\nX-Long: first part\r\n  second part\r\nDate: Mon, 01 Jan 2024 00:00:00 GMT\r\nDate: Tue, 02 Jan 2024 00:00:00 GMT\r\n";

    #[test]
    fn finds_headers_case_insensitively() {
        assert_eq!(first_header(BLOCK, "server").as_deref(), Some("test"));
        assert_eq!(first_header(BLOCK, "SERVER").as_deref(), Some("test"));
        assert_eq!(first_header(BLOCK, "missing"), None);
    }

    #[test]
    fn folded_lines_are_joined() {
        assert_eq!(
            first_header(BLOCK, "X-Long").as_deref(),
            Some("first part second part")
        );
    }

    #[test]
    fn duplicate_headers_last_wins() {
        assert_eq!(
            last_header(BLOCK, "Date").as_deref(),
            Some("Tue, 02 Jan 2024 00:00:00 GMT")
        );
        assert_eq!(
            first_header(BLOCK, "Date").as_deref(),
            Some("Mon, 01 Jan 2024 00:00:00 GMT")
        );
    }

    #[test]
    fn content_length_uses_leading_digits() {
        assert_eq!(content_length(BLOCK), Some(42));
        assert_eq!(content_length("Content-Length: 17abc\r\n"), Some(17));
        assert_eq!(content_length("Content-Length: abc\r\n"), Some(0));
        assert_eq!(content_length("Content-Length: -1\r\n"), Some(-1));
        assert_eq!(content_length("Server: x\r\n"), None);
    }

    #[test]
    fn chunked_detection_requires_exact_coding() {
        assert!(is_chunked("Transfer-Encoding: chunked\r\n"));
        assert!(is_chunked("transfer-encoding: Chunked\r\n"));
        assert!(!is_chunked("Transfer-Encoding: gzip, chunked\r\n"));
        assert!(!is_chunked("Server: x\r\n"));
    }

    #[test]
    fn subslice_search() {
        assert!(contains_subslice(b"hello world", b"lo wo"));
        assert!(!contains_subslice(b"hello", b"world"));
        assert!(contains_subslice(b"x", b""));
    }
}
