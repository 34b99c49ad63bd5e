use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::verdict::Severity;

/// Hard deadline for the whole probe. Blocking socket calls cannot be
/// interrupted individually, so a background thread enforces the overall
/// timeout and terminates the process with a CRITICAL verdict if the
/// probe is still running when it fires.
#[derive(Clone)]
pub struct Watchdog {
    disarmed: Arc<AtomicBool>,
}

impl Watchdog {
    pub fn arm(timeout_secs: u64) -> Self {
        let disarmed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&disarmed);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(timeout_secs));
            if !flag.load(Ordering::SeqCst) {
                println!("CRITICAL - Socket timeout after {timeout_secs} seconds");
                process::exit(Severity::Critical.exit_code());
            }
        });
        Self { disarmed }
    }

    /// Cancels the deadline once all network I/O is finished. Local
    /// post-processing (pattern checks, formatting) runs without it.
    pub fn disarm(&self) {
        self.disarmed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disarmed_watchdog_does_not_fire() {
        let watchdog = Watchdog::arm(1);
        watchdog.disarm();
        thread::sleep(Duration::from_millis(1100));
        // still alive
    }
}
