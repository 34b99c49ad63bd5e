//! Document-age check driven by the server's own Date and Last-Modified
//! headers, so clock skew between the prober and the server stays out of
//! the verdict.

use time::{Date, Month, PrimitiveDateTime, Time};

use super::headers;
use crate::verdict::Severity;

/// Verifies the document was modified within `max_age` seconds of the
/// server's reported time. Returns a severity plus a message fragment
/// ending in ", " (empty when fresh).
pub fn check_document_age(header_block: &str, max_age: i64) -> (Severity, String) {
    let server_date = headers::last_header(header_block, "Date");
    let document_date = headers::last_header(header_block, "Last-Modified");

    let Some(server_date) = server_date else {
        return (Severity::Unknown, "Server date unknown, ".to_string());
    };
    let Some(document_date) = document_date else {
        return (
            Severity::Critical,
            "Document modification date unknown, ".to_string(),
        );
    };

    let Some(srv) = parse_http_date(&server_date) else {
        return (
            Severity::Critical,
            format!("Server date \"{server_date}\" unparsable, "),
        );
    };
    let Some(doc) = parse_http_date(&document_date) else {
        return (
            Severity::Critical,
            format!("Document date \"{document_date}\" unparsable, "),
        );
    };

    if doc > srv + 30 {
        return (
            Severity::Critical,
            format!("Document is {} seconds in the future, ", doc - srv),
        );
    }
    if doc < srv - max_age {
        let age = srv - doc;
        let message = if age > 2 * 86_400 {
            format!("Last modified {:.1} days ago, ", age as f64 / 86_400.0)
        } else {
            format!(
                "Last modified {}:{:02}:{:02} ago, ",
                age / 3_600,
                (age / 60) % 60,
                age % 60
            )
        };
        return (Severity::Critical, message);
    }

    (Severity::Ok, String::new())
}

/// Parses the fixed RFC 1123 layout `Tue, 25 Dec 2001 02:59:03 GMT`.
/// Anything else (RFC 850 dates, asctime) is treated as unparsable.
fn parse_http_date(value: &str) -> Option<i64> {
    let value = value.trim();
    let rest = value.split_once(", ").map(|(day_name, rest)| {
        if day_name.len() == 3 { Some(rest) } else { None }
    })??;

    let mut fields = rest.split_whitespace();
    let day: u8 = fields.next()?.parse().ok()?;
    let month = parse_month(fields.next()?)?;
    let year: i32 = fields.next()?.parse().ok()?;
    let mut clock = fields.next()?.split(':');
    let hour: u8 = clock.next()?.parse().ok()?;
    let minute: u8 = clock.next()?.parse().ok()?;
    let second: u8 = clock.next()?.parse().ok()?;

    let date = Date::from_calendar_date(year, month, day).ok()?;
    let time = Time::from_hms(hour, minute, second).ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_utc().unix_timestamp())
}

fn parse_month(name: &str) -> Option<Month> {
    Some(match name {
        "Jan" => Month::January,
        "Feb" => Month::February,
        "Mar" => Month::March,
        "Apr" => Month::April,
        "May" => Month::May,
        "Jun" => Month::June,
        "Jul" => Month::July,
        "Aug" => Month::August,
        "Sep" => Month::September,
        "Oct" => Month::October,
        "Nov" => Month::November,
        "Dec" => Month::December,
        _ => return None,
    })
}
