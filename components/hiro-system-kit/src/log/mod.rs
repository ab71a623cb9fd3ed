use slog::{o, Drain, Level, Logger};
use slog_atomic::AtomicSwitch;
use slog_scope::GlobalLoggerGuard;
use std::str::FromStr;
use std::sync::Mutex;

/// Output flavor of the root logger
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line on stderr
    Json,
    /// Human readable, colored when attached to a terminal
    Term,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "term" | "text" | "pretty" => Ok(LogFormat::Term),
            _ => Err(format!("unsupported log format '{}' (expected json or term)", s)),
        }
    }
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(feature = "release") {
            LogFormat::Json
        } else {
            LogFormat::Term
        }
    }
}

pub fn parse_level(level: &str) -> Result<Level, String> {
    Level::from_str(level).map_err(|_| format!("unsupported log level '{}'", level))
}

pub fn setup_global_logger(logger: Logger) -> GlobalLoggerGuard {
    slog_scope::set_global_logger(logger)
}

pub fn setup_logger() -> Logger {
    setup_logger_with(LogFormat::default(), Level::Info)
}

pub fn setup_logger_with(format: LogFormat, level: Level) -> Logger {
    match format {
        LogFormat::Json => {
            let drain = Mutex::new(slog_json::Json::default(std::io::stderr())).map(slog::Fuse);
            Logger::root(drain.filter_level(level).fuse(), o!())
        }
        LogFormat::Term => {
            let decorator = slog_term::TermDecorator::new().build();
            let drain = Mutex::new(slog_term::FullFormat::new(decorator).build()).fuse();
            let drain = slog_async::Async::new(drain).build().fuse();
            let drain = AtomicSwitch::new(drain.filter_level(level).fuse());
            Logger::root(drain.fuse(), o!())
        }
    }
}
