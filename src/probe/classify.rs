//! Response classification: status-line checks first, then the content
//! expectations, then the message/perfdata assembly that produces the
//! final verdict line.

use super::freshness;
use super::headers;
use super::{HopTimings, ProbeTarget};
use crate::perfdata;
use crate::settings::{HTTP_PORT, RedirectPolicy, Settings};
use crate::verdict::{ProbeFailure, Severity, Verdict};

/// Widest a quoted expectation may appear in the verdict message.
const SEARCH_DISPLAY_MAX: usize = 29;

#[derive(Debug)]
pub enum StatusOutcome {
    /// A 3xx answer under a follow policy; the caller resolves the next hop.
    Redirect,
    /// Terminal status; content checks and formatting still follow.
    Continue { result: Severity, message: String },
}

/// Applies the expect list and the status-code classes to the status
/// line. `initial`/`message` carry state seeded by an earlier
/// certificate check when the probe continues past it.
pub fn evaluate_status(
    settings: &Settings,
    target: &ProbeTarget,
    status_line: &str,
    initial: Severity,
    message: String,
) -> Result<StatusOutcome, ProbeFailure> {
    let mut result = initial;
    let mut message = message;
    let mut bad_response = false;

    if !expected_statuscode(status_line, &settings.server_expect) {
        message = if target.port == HTTP_PORT {
            format!("Invalid HTTP response received from host: {status_line}")
        } else {
            format!(
                "Invalid HTTP response received from host on port {}: {status_line}",
                target.port
            )
        };
        bad_response = true;
    }

    if settings.expect_is_custom && !bad_response {
        // A user-supplied expect list bypasses the status-class logic.
        message = format!(
            "Status line output matched \"{}\" - ",
            settings.server_expect
        );
    } else {
        if status_line.is_empty() {
            return Err(fatal(settings, target, "No Status Line".to_string()));
        }
        let status = parse_status_code(status_line)
            .ok_or_else(|| fatal(settings, target, format!("Invalid Status Line ({status_line})")))?;
        if !(100..600).contains(&status) {
            return Err(fatal(settings, target, format!("Invalid Status ({status_line})")));
        }

        // On an expect-list miss the message is already the full
        // "Invalid HTTP response" diagnostic; repeating the status line
        // would only duplicate it.
        if status >= 500 {
            if !bad_response {
                message.push_str(&format!("{status_line} - "));
            }
            if bad_response || !settings.expect_is_custom {
                result = Severity::Critical;
            }
        } else if status >= 400 {
            if !bad_response {
                message.push_str(&format!("{status_line} - "));
            }
            if bad_response || !settings.expect_is_custom {
                result = Severity::Warning.worst(result);
            }
        } else if status >= 300 {
            match settings.redirect_policy {
                RedirectPolicy::Follow { .. } => return Ok(StatusOutcome::Redirect),
                RedirectPolicy::Fixed(severity) => {
                    result = severity.worst(result);
                    if !bad_response {
                        message.push_str(&format!("{status_line} - "));
                    }
                }
            }
        } else if !bad_response {
            message.push_str(&format!("{status_line} - "));
        }
    }

    if bad_response {
        return Err(fatal(settings, target, message));
    }
    Ok(StatusOutcome::Continue { result, message })
}

/// Runs the content expectations against the decoded body and assembles
/// the verdict line with its performance data.
pub fn finish(
    settings: &Settings,
    target: &ProbeTarget,
    header_block: &str,
    body: &[u8],
    timings: &HopTimings,
    result: Severity,
    message: String,
) -> Verdict {
    let mut result = result;
    let mut message = message;

    if let Some(max_age) = settings.max_age {
        let (severity, fragment) = freshness::check_document_age(header_block, max_age);
        message.push_str(&fragment);
        result = severity.worst(result);
    }

    if let Some(expect) = &settings.header_expect {
        if !header_block.contains(expect.as_str()) {
            message.push_str(&format!(
                "header '{}' not found on '{}', ",
                truncate_search(expect),
                target.url_display()
            ));
            result = Severity::Critical;
        }
    }

    if let Some(expect) = &settings.string_expect {
        if !headers::contains_subslice(body, expect.as_bytes()) {
            message.push_str(&format!(
                "string '{}' not found on '{}', ",
                truncate_search(expect),
                target.url_display()
            ));
            result = Severity::Critical;
        }
    }

    if let Some(regex) = &settings.body_regex {
        let matched = regex.is_match(body);
        if matched == settings.invert_regex {
            message.push_str(if settings.invert_regex {
                "pattern found, "
            } else {
                "pattern not found, "
            });
            result = Severity::Critical;
        }
    }

    let page_len = body.len() as i64;
    if settings.max_page_len > 0 && page_len > settings.max_page_len {
        message.push_str(&format!("page size {page_len} too large, "));
        result = Severity::Warning.worst(result);
    } else if settings.min_page_len > 0 && page_len < settings.min_page_len {
        message.push_str(&format!("page size {page_len} too small, "));
        result = Severity::Warning.worst(result);
    }

    if let Some(trimmed) = message.strip_suffix(", ") {
        message = trimmed.to_string();
    } else if let Some(trimmed) = message.strip_suffix(" - ") {
        message = trimmed.to_string();
    }

    if settings.show_url {
        message.push_str(&format!(" - {}", target.url_display()));
    }

    let elapsed = timings.total.as_secs_f64();
    let mut perf = vec![
        perfdata::perfd_time(elapsed, &settings.thresholds),
        perfdata::perfd_size(page_len, settings.min_page_len),
    ];
    if settings.extended_perfdata {
        perf.push(perfdata::perfd_duration("time_connect", timings.connect));
        if let Some(tls) = timings.tls {
            perf.push(perfdata::perfd_duration("time_ssl", tls));
        }
        perf.push(perfdata::perfd_duration("time_headers", timings.headers));
        perf.push(perfdata::perfd_duration(
            "time_firstbyte",
            timings.firstbyte.unwrap_or_default(),
        ));
        perf.push(perfdata::perfd_duration("time_transfer", timings.transfer));
    }
    if settings.output_body_as_perfdata && result == Severity::Ok {
        perf.push(String::from_utf8_lossy(body).into_owned());
    }

    message.push_str(&format!(
        " - {page_len} bytes in {elapsed:.3} second response time |{}",
        perf.join(" ")
    ));

    result = settings.thresholds.classify(elapsed).worst(result);
    Verdict::completed(result, message)
}

fn fatal(settings: &Settings, target: &ProbeTarget, message: String) -> ProbeFailure {
    if settings.show_url {
        ProbeFailure::critical(format!("{} - {message}", target.url_display()))
    } else {
        ProbeFailure::critical(message)
    }
}

/// True when any comma-separated token appears in the status line.
fn expected_statuscode(reply: &str, statuscodes: &str) -> bool {
    statuscodes
        .split(',')
        .any(|code| !code.is_empty() && reply.contains(code))
}

/// Extracts the status code: after the first run of spaces the line must
/// carry exactly three digits.
fn parse_status_code(status_line: &str) -> Option<u32> {
    let (_, rest) = status_line.split_once(' ')?;
    let rest = rest.trim_start_matches(' ');
    let digits = rest
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(rest.len(), |(i, _)| i);
    if digits != 3 {
        return None;
    }
    rest[..3].parse().ok()
}

fn truncate_search(expect: &str) -> String {
    if expect.len() <= SEARCH_DISPLAY_MAX {
        expect.to_string()
    } else {
        format!("{}...", &expect[..SEARCH_DISPLAY_MAX - 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn settings(args: &[&str]) -> Settings {
        let mut full = vec!["httpcheck", "-H", "www.example.com"];
        full.extend_from_slice(args);
        Settings::from_cli(Cli::parse_from(full)).unwrap()
    }

    fn target(settings: &Settings) -> ProbeTarget {
        ProbeTarget::initial(settings)
    }

    fn evaluate(settings: &Settings, status_line: &str) -> Result<StatusOutcome, ProbeFailure> {
        let target = target(settings);
        evaluate_status(settings, &target, status_line, Severity::Ok, String::new())
    }

    fn continue_result(outcome: StatusOutcome) -> (Severity, String) {
        match outcome {
            StatusOutcome::Continue { result, message } => (result, message),
            StatusOutcome::Redirect => panic!("unexpected redirect"),
        }
    }

    #[test]
    fn ok_status_appends_status_line() {
        let s = settings(&[]);
        let (result, message) = continue_result(evaluate(&s, "HTTP/1.1 200 OK").unwrap());
        assert_eq!(result, Severity::Ok);
        assert_eq!(message, "HTTP/1.1 200 OK - ");
    }

    #[test]
    fn server_error_is_critical() {
        let s = settings(&[]);
        let (result, _) = continue_result(evaluate(&s, "HTTP/1.1 503 Unavailable").unwrap());
        assert_eq!(result, Severity::Critical);
    }

    #[test]
    fn client_error_is_warning() {
        let s = settings(&[]);
        let (result, _) = continue_result(evaluate(&s, "HTTP/1.1 404 Not Found").unwrap());
        assert_eq!(result, Severity::Warning);
    }

    #[test]
    fn redirect_with_default_policy_is_ok() {
        let s = settings(&[]);
        let (result, message) = continue_result(evaluate(&s, "HTTP/1.1 302 Found").unwrap());
        assert_eq!(result, Severity::Ok);
        assert_eq!(message, "HTTP/1.1 302 Found - ");
    }

    #[test]
    fn redirect_with_follow_policy_asks_for_next_hop() {
        let s = settings(&["-f", "follow"]);
        assert!(matches!(
            evaluate(&s, "HTTP/1.1 301 Moved").unwrap(),
            StatusOutcome::Redirect
        ));
    }

    #[test]
    fn redirect_with_critical_policy() {
        let s = settings(&["-f", "critical"]);
        let (result, _) = continue_result(evaluate(&s, "HTTP/1.1 302 Found").unwrap());
        assert_eq!(result, Severity::Critical);
    }

    #[test]
    fn custom_expect_match_bypasses_status_classes() {
        let s = settings(&["-e", "200,301"]);
        let (result, message) = continue_result(evaluate(&s, "HTTP/1.1 301 Moved").unwrap());
        assert_eq!(result, Severity::Ok);
        assert_eq!(message, "Status line output matched \"200,301\" - ");
    }

    #[test]
    fn custom_expect_miss_is_invalid_response() {
        let s = settings(&["-e", "200", "-p", "8080"]);
        let err = evaluate(&s, "HTTP/1.1 500 Oops").unwrap_err();
        assert_eq!(err.severity, Severity::Critical);
        assert_eq!(
            err.message,
            "Invalid HTTP response received from host on port 8080: HTTP/1.1 500 Oops"
        );
    }

    #[test]
    fn default_expect_miss_on_port_80_uses_short_form() {
        let s = settings(&[]);
        let err = evaluate(&s, "SMTP 220 ready").unwrap_err();
        assert_eq!(
            err.message,
            "Invalid HTTP response received from host: SMTP 220 ready"
        );
    }

    #[test]
    fn malformed_status_lines_are_critical() {
        let s = settings(&[]);
        let err = evaluate(&s, "HTTP/1.1 .....").unwrap_err();
        assert_eq!(err.message, "Invalid Status Line (HTTP/1.1 .....)");
        let err = evaluate(&s, "HTTP/1.1 2000 OK").unwrap_err();
        assert_eq!(err.message, "Invalid Status Line (HTTP/1.1 2000 OK)");
        let err = evaluate(&s, "HTTP/1.1 099 Low").unwrap_err();
        assert_eq!(err.message, "Invalid Status (HTTP/1.1 099 Low)");
    }

    #[test]
    fn extra_spaces_before_code_are_tolerated() {
        let s = settings(&[]);
        let (result, _) = continue_result(evaluate(&s, "HTTP/1.1   200 OK").unwrap());
        assert_eq!(result, Severity::Ok);
    }

    fn finish_with(
        s: &Settings,
        header_block: &str,
        body: &[u8],
        result: Severity,
        message: &str,
    ) -> Verdict {
        let target = target(s);
        finish(
            s,
            &target,
            header_block,
            body,
            &HopTimings::default(),
            result,
            message.to_string(),
        )
    }

    #[test]
    fn ok_line_includes_size_and_time() {
        let s = settings(&[]);
        let verdict = finish_with(&s, "", b"hello", Severity::Ok, "HTTP/1.1 200 OK - ");
        assert_eq!(verdict.severity, Severity::Ok);
        assert!(verdict.text.starts_with("HTTP OK: HTTP/1.1 200 OK - 5 bytes in 0.000 second response time |time="));
        assert!(verdict.text.contains("size=5B;;;0"));
    }

    #[test]
    fn missing_string_is_critical() {
        let s = settings(&["-s", "welcome"]);
        let verdict = finish_with(&s, "", b"goodbye", Severity::Ok, "HTTP/1.1 200 OK - ");
        assert_eq!(verdict.severity, Severity::Critical);
        assert!(verdict.text.contains(
            "string 'welcome' not found on 'http://www.example.com:80/'"
        ));
    }

    #[test]
    fn long_search_strings_are_truncated() {
        let s = settings(&["-s", "abcdefghijklmnopqrstuvwxyz0123456789"]);
        let verdict = finish_with(&s, "", b"x", Severity::Ok, "");
        assert!(verdict.text.contains("string 'abcdefghijklmnopqrstuvwxyz...' not found"));
    }

    #[test]
    fn missing_header_is_critical() {
        let s = settings(&["-d", "X-Frame-Options"]);
        let verdict = finish_with(&s, "Server: nginx", b"", Severity::Ok, "");
        assert_eq!(verdict.severity, Severity::Critical);
        assert!(verdict.text.contains("header 'X-Frame-Options' not found"));
    }

    #[test]
    fn regex_and_inversion() {
        let s = settings(&["-r", "ok[0-9]+"]);
        let verdict = finish_with(&s, "", b"status ok42 end", Severity::Ok, "");
        assert_eq!(verdict.severity, Severity::Ok);

        let verdict = finish_with(&s, "", b"nothing here", Severity::Ok, "");
        assert_eq!(verdict.severity, Severity::Critical);
        assert!(verdict.text.contains("pattern not found"));

        let s = settings(&["-r", "ok[0-9]+", "--invert-regex"]);
        let verdict = finish_with(&s, "", b"status ok42 end", Severity::Ok, "");
        assert_eq!(verdict.severity, Severity::Critical);
        assert!(verdict.text.contains("pattern found"));
    }

    #[test]
    fn case_insensitive_regex() {
        let s = settings(&["-R", "WELCOME"]);
        let verdict = finish_with(&s, "", b"welcome home", Severity::Ok, "");
        assert_eq!(verdict.severity, Severity::Ok);
    }

    #[test]
    fn page_size_bounds_are_warnings() {
        let s = settings(&["-m", "10:20"]);
        let verdict = finish_with(&s, "", b"tiny", Severity::Ok, "");
        assert_eq!(verdict.severity, Severity::Warning);
        assert!(verdict.text.contains("page size 4 too small"));

        let verdict = finish_with(&s, "", &[b'x'; 30], Severity::Ok, "");
        assert_eq!(verdict.severity, Severity::Warning);
        assert!(verdict.text.contains("page size 30 too large"));
    }

    #[test]
    fn show_url_decorates_message() {
        let s = settings(&["-U"]);
        let verdict = finish_with(&s, "", b"ok", Severity::Ok, "HTTP/1.1 200 OK - ");
        assert!(verdict.text.contains("HTTP/1.1 200 OK - http://www.example.com:80/ - 2 bytes"));
    }

    #[test]
    fn body_becomes_perfdata_only_when_ok() {
        let s = settings(&["-o"]);
        let verdict = finish_with(&s, "", b"payload", Severity::Ok, "");
        assert!(verdict.text.ends_with("payload"));

        let s = settings(&["-o", "-s", "absent"]);
        let verdict = finish_with(&s, "", b"payload", Severity::Ok, "");
        assert!(!verdict.text.ends_with("payload"));
    }

    #[test]
    fn stale_document_downgrades_verdict() {
        let s = settings(&["-M", "60"]);
        let block = "Date: Tue, 25 Dec 2001 03:00:00 GMT\r\nLast-Modified: Tue, 25 Dec 2001 01:00:00 GMT\r\n";
        let verdict = finish_with(&s, block, b"", Severity::Ok, "");
        assert_eq!(verdict.severity, Severity::Critical);
        assert!(verdict.text.contains("Last modified 2:00:00 ago"));
    }
}
