use std::fmt;

use thiserror::Error;

/// Probe outcome severity, ordered for combination the way monitoring
/// pipelines expect: OK < UNKNOWN < WARNING < CRITICAL. The numeric exit
/// code is a separate mapping (UNKNOWN exits 3 even though it ranks below
/// WARNING).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Severity {
    pub fn exit_code(self) -> i32 {
        match self {
            Severity::Ok => 0,
            Severity::Warning => 1,
            Severity::Critical => 2,
            Severity::Unknown => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
            Severity::Unknown => "UNKNOWN",
        }
    }

    fn rank(self) -> u8 {
        match self {
            Severity::Ok => 0,
            Severity::Unknown => 1,
            Severity::Warning => 2,
            Severity::Critical => 3,
        }
    }

    /// Returns the worse of the two severities.
    pub fn worst(self, other: Severity) -> Severity {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal probe condition. Every fatal path carries the severity the
/// process must exit with alongside its diagnostic.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProbeFailure {
    pub severity: Severity,
    pub message: String,
}

impl ProbeFailure {
    pub fn critical(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Critical,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Unknown,
            message: message.into(),
        }
    }
}

/// Terminal probe result: the severity plus the fully composed output line.
#[derive(Debug)]
pub struct Verdict {
    pub severity: Severity,
    pub text: String,
}

impl Verdict {
    pub fn completed(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            text: format!("HTTP {severity}: {}", message.into()),
        }
    }
}

impl From<ProbeFailure> for Verdict {
    fn from(failure: ProbeFailure) -> Self {
        Self {
            severity: failure.severity,
            text: format!("HTTP {} - {}", failure.severity, failure.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_ranks_unknown_below_warning() {
        assert_eq!(Severity::Unknown.worst(Severity::Warning), Severity::Warning);
        assert_eq!(Severity::Warning.worst(Severity::Unknown), Severity::Warning);
        assert_eq!(Severity::Ok.worst(Severity::Unknown), Severity::Unknown);
        assert_eq!(Severity::Critical.worst(Severity::Warning), Severity::Critical);
    }

    #[test]
    fn exit_codes_follow_plugin_convention() {
        assert_eq!(Severity::Ok.exit_code(), 0);
        assert_eq!(Severity::Warning.exit_code(), 1);
        assert_eq!(Severity::Critical.exit_code(), 2);
        assert_eq!(Severity::Unknown.exit_code(), 3);
    }

    #[test]
    fn failure_formats_with_dash() {
        let verdict = Verdict::from(ProbeFailure::critical("Unable to open TCP socket"));
        assert_eq!(verdict.text, "HTTP CRITICAL - Unable to open TCP socket");
    }

    #[test]
    fn completion_formats_with_colon() {
        let verdict = Verdict::completed(Severity::Ok, "all good");
        assert_eq!(verdict.text, "HTTP OK: all good");
    }
}
