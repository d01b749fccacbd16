// SPDX-License-Identifier: MIT

use colored::Colorize;
use log::{Level, LevelFilter, Metadata, Record};

struct ProbeLogger;

static LOGGER: ProbeLogger = ProbeLogger;

impl log::Log for ProbeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "error".red().bold(),
            Level::Warn => "warn".yellow().bold(),
            Level::Info => "info".green(),
            Level::Debug => "debug".blue(),
            Level::Trace => "trace".dimmed(),
        };
        eprintln!("[rimprobe] {tag} {}", record.args());
    }

    fn flush(&self) {}
}

pub fn level_for(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Installs the stderr logger. Safe to call more than once.
pub fn init(verbose: bool) {
    // set_logger only fails when a logger is already installed.
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level_for(verbose));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_enables_debug() {
        assert_eq!(level_for(true), LevelFilter::Debug);
        assert_eq!(level_for(false), LevelFilter::Info);
    }

    #[test]
    fn init_twice_is_harmless() {
        init(false);
        init(true);
        assert_eq!(log::max_level(), LevelFilter::Debug);
    }
}
