use chrono::{DateTime, Utc};

/// A normalized log level. Unknown spellings normalize to `None` rather than being guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Err,
    Debug,
}

impl LogLevel {
    /// Normalize a raw level token (as found in JSON `level`/`lvl`, logfmt `level=`/`lvl=`, or a
    /// leading plain-text keyword) to one of the four canonical levels. Returns `None` for
    /// anything not recognized, per the "unknown levels normalize to empty" rule.
    pub fn normalize(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "info" | "information" | "notice" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "err" | "error" | "fatal" | "panic" | "crit" | "critical" => Some(LogLevel::Err),
            "dbug" | "debug" | "trace" | "verbose" => Some(LogLevel::Debug),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Err => "ERR",
            LogLevel::Debug => "DBUG",
        }
    }
}

/// One parsed line of container output, ready for batch persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub container_id: String,
    pub stream: Stream,
    pub timestamp: DateTime<Utc>,
    pub level: Option<LogLevel>,
    pub message: String,
}

/// Which demuxed stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_known_spellings() {
        assert_eq!(LogLevel::normalize("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::normalize("err"), Some(LogLevel::Err));
        assert_eq!(LogLevel::normalize("dbug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::normalize("banana"), None);
    }
}
