//! Protocol types and definitions for MCP logging
//!
//! Log lines travel as one-way `notifications/message` frames scoped to the
//! request that produced them.

use serde::{Deserialize, Serialize};

/// The severity of a log message.
///
/// These map to syslog message severities, as specified in RFC-5424:
/// https://datatracker.ietf.org/doc/html/rfc5424#section-6.2.1
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    /// Debug-level message
    Debug,
    /// Informational message
    Info,
    /// Normal but significant condition
    Notice,
    /// Warning conditions
    Warning,
    /// Error conditions
    Error,
    /// Critical conditions
    Critical,
    /// Action must be taken immediately
    Alert,
    /// System is unusable
    Emergency,
}

impl LoggingLevel {
    /// Get the numeric value of the log level (lower = more severe)
    pub fn as_severity(&self) -> u8 {
        match self {
            Self::Debug => 7,
            Self::Info => 6,
            Self::Notice => 5,
            Self::Warning => 4,
            Self::Error => 3,
            Self::Critical => 2,
            Self::Alert => 1,
            Self::Emergency => 0,
        }
    }

    /// Check if this log level is at least as severe as another level
    pub fn is_at_least_as_severe_as(&self, other: &Self) -> bool {
        self.as_severity() <= other.as_severity()
    }

    /// The closest `log` crate level, for forwarding peer logs locally
    pub fn to_log_level(&self) -> log::Level {
        match self {
            Self::Debug => log::Level::Debug,
            Self::Info | Self::Notice => log::Level::Info,
            Self::Warning => log::Level::Warn,
            _ => log::Level::Error,
        }
    }
}

/// Parameters for the `logging/setLevel` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetLevelParams {
    /// The server sends all logs at this level and higher (more severe).
    pub level: LoggingLevel,
}

/// Parameters for the `notifications/message` notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingMessageParams {
    /// The severity of this log message.
    pub level: LoggingLevel,
    /// An optional name of the logger issuing this message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    /// `{"msg": ..., "extra": {...}}` for messages emitted through an invocation context,
    /// any JSON value otherwise.
    pub data: serde_json::Value,
}

impl LoggingMessageParams {
    /// A message with structured extra fields
    pub fn message(level: LoggingLevel, message: impl Into<String>, extra: Option<serde_json::Value>) -> Self {
        Self {
            level,
            logger: None,
            data: serde_json::json!({
                "msg": message.into(),
                "extra": extra.unwrap_or(serde_json::Value::Null),
            }),
        }
    }

    /// The message text, when `data` follows the `{"msg": ...}` shape or is a plain string
    pub fn text(&self) -> Option<&str> {
        self.data
            .get("msg")
            .and_then(|m| m.as_str())
            .or_else(|| self.data.as_str())
    }

    /// The structured extra fields, if any
    pub fn extra(&self) -> Option<&serde_json::Value> {
        self.data.get("extra").filter(|e| !e.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_order() {
        assert!(LoggingLevel::Error.is_at_least_as_severe_as(&LoggingLevel::Warning));
        assert!(!LoggingLevel::Debug.is_at_least_as_severe_as(&LoggingLevel::Info));
        assert!(LoggingLevel::Info.is_at_least_as_severe_as(&LoggingLevel::Info));
    }

    #[test]
    fn test_message_shape() {
        let params = LoggingMessageParams::message(
            LoggingLevel::Info,
            "Analyzing 5 data points",
            Some(json!({"count": 5})),
        );
        assert_eq!(params.text(), Some("Analyzing 5 data points"));
        assert_eq!(params.extra(), Some(&json!({"count": 5})));

        let plain = LoggingMessageParams {
            level: LoggingLevel::Debug,
            logger: None,
            data: json!("raw line"),
        };
        assert_eq!(plain.text(), Some("raw line"));
        assert_eq!(plain.extra(), None);
    }
}
