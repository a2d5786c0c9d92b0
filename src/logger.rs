/*!
 * Production logging system for ShardKV
 * Structured logging with proper log levels and formatting
 */

use std::fmt;
use std::sync::Mutex;
use chrono::{DateTime, Utc};
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO "),
            LogLevel::Warning => write!(f, "WARN "),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::TRACE | Level::DEBUG => LogLevel::Debug,
            Level::INFO => LogLevel::Info,
            Level::WARN => LogLevel::Warning,
            Level::ERROR => LogLevel::Error,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShardKvLogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub pid: u32,
    pub message: String,
}

impl ShardKvLogEvent {
    pub fn new(level: LogLevel, message: String) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            pid: std::process::id(),
            message,
        }
    }

    pub fn format_compact(&self) -> String {
        let symbol = match self.level {
            LogLevel::Debug => "•",
            LogLevel::Info => "✓",
            LogLevel::Warning => "⚠",
            LogLevel::Error => "✗",
        };

        format!(
            "{} {} {} : shardkv [{}]",
            symbol,
            self.pid,
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.message
        )
    }

    pub fn format_detailed(&self) -> String {
        format!(
            "{} {} {} {} : shardkv [{}]",
            self.level,
            self.pid,
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.timestamp.timestamp_millis(),
            self.message
        )
    }
}

#[derive(Clone)]
pub struct ShardKvLogger {
    level: LogLevel,
    compact: bool,
}

impl ShardKvLogger {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            compact: true,
        }
    }

    pub fn with_detailed_format(mut self) -> Self {
        self.compact = false;
        self
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if level as u8 >= self.level as u8 {
            let event = ShardKvLogEvent::new(level, message.to_string());
            let formatted = if self.compact {
                event.format_compact()
            } else {
                event.format_detailed()
            };

            // Output to stderr for logs, stdout for normal output
            eprintln!("{}", formatted);
        }
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

// Global logger instance
static GLOBAL_LOGGER: Mutex<Option<ShardKvLogger>> = Mutex::new(None);

pub fn init_logger(level: LogLevel, detailed: bool) {
    let logger = if detailed {
        ShardKvLogger::new(level).with_detailed_format()
    } else {
        ShardKvLogger::new(level)
    };

    let mut global = GLOBAL_LOGGER.lock().unwrap();
    *global = Some(logger);
}

pub fn get_logger() -> Option<ShardKvLogger> {
    GLOBAL_LOGGER.lock().unwrap().clone()
}

// Convenience macros for logging
#[macro_export]
macro_rules! shardkv_debug {
    ($($arg:tt)*) => {
        if let Some(logger) = $crate::logger::get_logger() {
            logger.debug(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! shardkv_info {
    ($($arg:tt)*) => {
        if let Some(logger) = $crate::logger::get_logger() {
            logger.info(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! shardkv_warn {
    ($($arg:tt)*) => {
        if let Some(logger) = $crate::logger::get_logger() {
            logger.warning(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! shardkv_error {
    ($($arg:tt)*) => {
        if let Some(logger) = $crate::logger::get_logger() {
            logger.error(&format!($($arg)*));
        }
    };
}

// Tracing integration
pub struct ShardKvTracingLayer;

impl<S> tracing_subscriber::Layer<S> for ShardKvTracingLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let metadata = event.metadata();
        let level = LogLevel::from(*metadata.level());

        let mut visitor = LogVisitor::default();
        event.record(&mut visitor);

        let message = visitor.message.unwrap_or_else(|| {
            metadata.name().to_string()
        });

        if let Some(logger) = get_logger() {
            logger.log(level, &message);
        }
    }
}

#[derive(Default)]
struct LogVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for LogVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        }
    }
}

pub fn init_tracing_logger(level: LogLevel, detailed: bool) -> Result<(), Box<dyn std::error::Error>> {
    init_logger(level, detailed);

    let filter = match level {
        LogLevel::Debug => EnvFilter::new("debug"),
        LogLevel::Info => EnvFilter::new("info"),
        LogLevel::Warning => EnvFilter::new("warn"),
        LogLevel::Error => EnvFilter::new("error"),
    };

    Registry::default()
        .with(filter)
        .with(ShardKvTracingLayer)
        .init();

    Ok(())
}
