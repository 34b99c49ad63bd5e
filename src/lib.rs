//! Single-shot HTTP(S) endpoint probe. Connects, issues one request,
//! classifies the response, and reports a monitoring verdict with
//! performance data.

pub mod cli;
pub mod logging;
pub mod perfdata;
pub mod probe;
pub mod settings;
pub mod threshold;
pub mod tls;
pub mod verdict;
pub mod watchdog;

use settings::Settings;
use tls::TlsProvider;
use verdict::{ProbeFailure, Verdict};
use watchdog::Watchdog;

/// Runs the whole probe and folds every failure path into a verdict.
/// TLS material is prepared up front because a redirect chain may
/// upgrade a plain hop to HTTPS at any point.
pub fn run(settings: &Settings, watchdog: &Watchdog) -> Verdict {
    let tls = match TlsProvider::new(settings) {
        Ok(tls) => tls,
        Err(e) => return Verdict::from(ProbeFailure::unknown(format!("{e:#}"))),
    };
    match probe::run_probe(settings, &tls, watchdog) {
        Ok(verdict) => verdict,
        Err(failure) => Verdict::from(failure),
    }
}
