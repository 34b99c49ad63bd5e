use std::process;

use clap::Parser;

use httpcheck::cli::Cli;
use httpcheck::settings::Settings;
use httpcheck::verdict::Severity;
use httpcheck::watchdog::Watchdog;
use httpcheck::{logging, run};

fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let settings = match Settings::from_cli(cli) {
        Ok(settings) => settings,
        Err(e) => {
            println!("HTTP UNKNOWN - {e:#}");
            process::exit(Severity::Unknown.exit_code());
        }
    };

    if let Err(e) = logging::init_logger(verbose) {
        eprintln!("{e:#}");
    }

    let watchdog = Watchdog::arm(settings.timeout);
    let verdict = run(&settings, &watchdog);
    println!("{}", verdict.text);
    process::exit(verdict.severity.exit_code());
}
