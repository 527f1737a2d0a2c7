//! Minimal stderr logger for the bridge.
//!
//! Lines look like `[  0.512s  WARN marker_bridge::pose] message`. Mobile
//! hosts usually redirect stderr into their own log sink, so nothing here is
//! platform specific. Install once with [`init_with_level`].

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

struct BridgeLogger {
    started: Instant,
}

impl Log for BridgeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:7.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<BridgeLogger> = OnceLock::new();

/// Install the logger with the provided level filter.
///
/// Later calls only adjust the maximum level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| BridgeLogger {
            started: Instant::now(),
        });
        log::set_logger(logger)?;
    }
    log::set_max_level(level);
    Ok(())
}

/// Map a numeric verbosity (0 = off .. 5 = trace) to a level filter.
///
/// Used by foreign callers that can only pass integers.
pub fn level_from_verbosity(verbosity: u32) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install a `tracing` subscriber that also captures `log` records.
///
/// `RUST_LOG` wins over `default_filter`. Span close events carry the
/// timing of the instrumented entry points. Returns `false` when a global
/// subscriber or logger is already set.
#[cfg(feature = "tracing")]
pub fn init_tracing(default_filter: &str, json: bool) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_mapping_saturates_at_trace() {
        assert_eq!(level_from_verbosity(0), LevelFilter::Off);
        assert_eq!(level_from_verbosity(3), LevelFilter::Info);
        assert_eq!(level_from_verbosity(42), LevelFilter::Trace);
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn tracing_subscriber_installs_once() {
        init_tracing("debug", false);
        assert!(!init_tracing("debug", true));
    }
}
