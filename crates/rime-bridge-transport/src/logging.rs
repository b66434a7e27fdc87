//! Tracing set-up for host binaries, and re-emission of engine log lines.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT_TRACING: Once = Once::new();

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`).
/// Later calls are no-ops.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .with(filter)
            .try_init();
        tracing::info!("rime bridge tracing initialized");
    });
}

/// Severity of an engine log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSeverity {
    Info,
    Warning,
    Error,
    Fatal,
}

/// Split a glog-style line (`I0101 12:00:00.000000  1234 file.cc:12] text`)
/// into its severity and the part from the source location on.
#[must_use]
pub fn parse_engine_log(line: &str) -> Option<(EngineSeverity, &str)> {
    fn field(rest: &str) -> Option<(&str, &str)> {
        let rest = rest.trim_start();
        let end = rest.find(' ')?;
        Some((&rest[..end], &rest[end..]))
    }
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    let severity = match line.chars().next()? {
        'I' => EngineSeverity::Info,
        'W' => EngineSeverity::Warning,
        'E' => EngineSeverity::Error,
        'F' => EngineSeverity::Fatal,
        _ => return None,
    };
    let (date, rest) = field(&line[1..])?;
    let (time, rest) = field(rest)?;
    let (thread, rest) = field(rest)?;
    if !digits(date) || !time.contains(':') || !digits(thread) {
        return None;
    }
    Some((severity, rest.trim_start()))
}

/// Re-emit an engine log line at the matching tracing level. Lines that are
/// not in glog format go out at error level when `default_error` is set,
/// info otherwise.
///
/// Engine bindings call this from their log callback, passing
/// `default_error` for lines read from the engine's stderr.
pub fn forward_engine_log(line: &str, default_error: bool) {
    match parse_engine_log(line) {
        Some((EngineSeverity::Info, message)) => tracing::info!(target: "engine", "{message}"),
        Some((EngineSeverity::Warning, message)) => tracing::warn!(target: "engine", "{message}"),
        Some((EngineSeverity::Error | EngineSeverity::Fatal, message)) => {
            tracing::error!(target: "engine", "{message}");
        }
        None if default_error => tracing::error!(target: "engine", "{line}"),
        None => tracing::info!(target: "engine", "{line}"),
    }
}
