use std::time::Duration;

use crate::threshold::Thresholds;

/// Formats one perfdata token: `label=value[uom];warn;crit;min;max`, with
/// empty trailing fields trimmed.
pub fn fperfdata(
    label: &str,
    value: f64,
    uom: &str,
    warn: Option<f64>,
    crit: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
) -> String {
    let mut out = format!("{label}={value:.6}{uom}");
    push_fields(
        &mut out,
        [
            warn.map(|v| format!("{v:.6}")),
            crit.map(|v| format!("{v:.6}")),
            min.map(|v| format!("{v:.6}")),
            max.map(|v| format!("{v:.6}")),
        ],
    );
    out
}

/// Integer variant of [`fperfdata`].
pub fn perfdata(
    label: &str,
    value: i64,
    uom: &str,
    warn: Option<i64>,
    crit: Option<i64>,
    min: Option<i64>,
    max: Option<i64>,
) -> String {
    let mut out = format!("{label}={value}{uom}");
    push_fields(
        &mut out,
        [
            warn.map(|v| v.to_string()),
            crit.map(|v| v.to_string()),
            min.map(|v| v.to_string()),
            max.map(|v| v.to_string()),
        ],
    );
    out
}

fn push_fields(out: &mut String, fields: [Option<String>; 4]) {
    let last = fields.iter().rposition(Option::is_some);
    let Some(last) = last else { return };
    for field in &fields[..=last] {
        out.push(';');
        if let Some(value) = field {
            out.push_str(value);
        }
    }
}

pub fn perfd_time(elapsed: f64, thresholds: &Thresholds) -> String {
    fperfdata(
        "time",
        elapsed,
        "s",
        thresholds.warning.as_ref().map(|r| r.end()),
        thresholds.critical.as_ref().map(|r| r.end()),
        Some(0.0),
        None,
    )
}

pub fn perfd_size(page_len: i64, min_page_len: i64) -> String {
    let bounded = min_page_len > 0;
    perfdata(
        "size",
        page_len,
        "B",
        bounded.then_some(min_page_len),
        bounded.then_some(0),
        Some(0),
        None,
    )
}

pub fn perfd_duration(label: &str, elapsed: Duration) -> String {
    fperfdata(label, elapsed.as_secs_f64(), "s", None, None, None, None)
}
