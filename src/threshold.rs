use anyhow::{Result, anyhow, bail};

use crate::verdict::Severity;

/// A Nagios-style alert range. `alerts_on` is true when the value falls
/// outside `[start, end]` (or inside it, for `@`-prefixed ranges).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    start: f64,
    end: f64,
    inside: bool,
}

impl Range {
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            bail!("range specification must not be empty");
        }
        let (inside, spec) = match spec.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };

        let (start, end) = match spec.split_once(':') {
            Some((lo, hi)) => {
                let start = if lo == "~" {
                    f64::NEG_INFINITY
                } else if lo.is_empty() {
                    0.0
                } else {
                    parse_bound(lo)?
                };
                let end = if hi.is_empty() {
                    f64::INFINITY
                } else {
                    parse_bound(hi)?
                };
                (start, end)
            }
            None => (0.0, parse_bound(spec)?),
        };

        if start > end {
            bail!("range start {start} must not exceed end {end}");
        }
        Ok(Self { start, end, inside })
    }

    pub fn alerts_on(&self, value: f64) -> bool {
        let outside = value < self.start || value > self.end;
        if self.inside { !outside } else { outside }
    }

    /// Upper bound of the range, used for perfdata fields and for widening
    /// the probe timeout.
    pub fn end(&self) -> f64 {
        self.end
    }
}

fn parse_bound(value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| anyhow!("invalid range bound '{value}'"))
}

/// Warning/critical time bounds for the response-time check.
#[derive(Debug, Clone, Copy, Default)]
pub struct Thresholds {
    pub warning: Option<Range>,
    pub critical: Option<Range>,
}

impl Thresholds {
    pub fn parse(warning: Option<&str>, critical: Option<&str>) -> Result<Self> {
        Ok(Self {
            warning: warning.map(Range::parse).transpose()?,
            critical: critical.map(Range::parse).transpose()?,
        })
    }

    pub fn classify(&self, value: f64) -> Severity {
        if let Some(critical) = &self.critical {
            if critical.alerts_on(value) {
                return Severity::Critical;
            }
        }
        if let Some(warning) = &self.warning {
            if warning.alerts_on(value) {
                return Severity::Warning;
            }
        }
        Severity::Ok
    }
}
