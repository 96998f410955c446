use std::sync::{Arc, Once};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

pub trait BusLogger: Send + Sync {
    fn log(&self, level: LogLevel, component: &str, msg: &str);
}

/// Forwards to the `log` facade, using the component as the record target.
pub struct LogFacade;

impl LogFacade {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl BusLogger for LogFacade {
    fn log(&self, level: LogLevel, component: &str, msg: &str) {
        let level: log::Level = level.into();
        log::log!(target: component, level, "{}", msg);
    }
}

static INIT: Once = Once::new();

/// Install `env_logger` as the `log` backend. `filter` uses `RUST_LOG` syntax and
/// falls back to the environment, then to `info`. Later calls are no-ops.
pub fn init(filter: Option<&str>) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
        if let Some(filter) = filter {
            builder.parse_filters(filter);
        }
        // Another logger may already be installed by the host application.
        let _ = builder.format_timestamp_millis().try_init();
    });
}
