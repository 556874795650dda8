//! Structured JSON logger
//!
//! One line per event, written synchronously. Keys come out in a fixed order:
//! `event`, `severity`, `ts`, then the event's fields sorted by name.
//! INFO and WARN go to stdout, ERROR and FATAL to stderr.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use chrono::{SecondsFormat, Utc};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace = 0,
    Info = 1,
    /// Recoverable, request-level problems
    Warn = 2,
    Error = 3,
    /// The process cannot continue
    Fatal = 4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    fn to_stderr(&self) -> bool {
        *self >= Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured logger
pub struct Logger;

impl Logger {
    /// Emit one event line.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        let line = Self::render(severity, event, fields);
        if severity.to_stderr() {
            Self::write_line(&mut io::stderr().lock(), &line);
        } else {
            Self::write_line(&mut io::stdout().lock(), &line);
        }
    }

    fn write_line<W: Write>(writer: &mut W, line: &str) {
        // Logging never fails the caller
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let sorted: BTreeMap<&str, &str> = fields.iter().copied().collect();

        let mut line = String::with_capacity(128);
        line.push('{');
        push_pair(&mut line, "event", event);
        line.push(',');
        push_pair(&mut line, "severity", severity.as_str());
        line.push(',');
        push_pair(
            &mut line,
            "ts",
            &Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        for (key, value) in sorted {
            // Reserved keys keep their meaning
            if matches!(key, "event" | "severity" | "ts") {
                continue;
            }
            line.push(',');
            push_pair(&mut line, key, value);
        }
        line.push_str("}\n");
        line
    }

    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Fatal, event, fields);
    }
}

fn push_pair(line: &mut String, key: &str, value: &str) {
    push_json_string(line, key);
    line.push(':');
    push_json_string(line, value);
}

fn push_json_string(line: &mut String, s: &str) {
    line.push('"');
    for c in s.chars() {
        match c {
            '"' => line.push_str("\\\""),
            '\\' => line.push_str("\\\\"),
            '\n' => line.push_str("\\n"),
            '\r' => line.push_str("\\r"),
            '\t' => line.push_str("\\t"),
            c if c.is_control() => line.push_str(&format!("\\u{:04x}", c as u32)),
            c => line.push(c),
        }
    }
    line.push('"');
}

#[cfg(test)]
pub(crate) fn capture_log(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut buffer = Vec::new();
    Logger::write_line(&mut buffer, &Logger::render(severity, event, fields));
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_is_json_with_fixed_head() {
        let output = capture_log(Severity::Info, "RENDER_COMPLETE", &[("title", "Foobar")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "RENDER_COMPLETE");
        assert_eq!(parsed["severity"], "INFO");
        assert_eq!(parsed["title"], "Foobar");
        assert!(parsed["ts"].is_string());
        assert!(output.starts_with("{\"event\":"));
    }

    #[test]
    fn test_fields_sorted_regardless_of_input_order() {
        let a = capture_log(Severity::Warn, "E", &[("zeta", "1"), ("alpha", "2")]);
        let b = capture_log(Severity::Warn, "E", &[("alpha", "2"), ("zeta", "1")]);
        let strip = |s: &str| s.split("\"ts\":").nth(1).unwrap().split_once(',').unwrap().1.to_string();
        assert_eq!(strip(&a), strip(&b));
        assert!(a.find("alpha").unwrap() < a.find("zeta").unwrap());
    }

    #[test]
    fn test_escaping_and_single_line() {
        let output = capture_log(Severity::Error, "E", &[("detail", "a \"quoted\"\nvalue\u{1}")]);
        assert_eq!(output.matches('\n').count(), 1);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["detail"], "a \"quoted\"\nvalue\u{1}");
    }

    #[test]
    fn test_reserved_keys_not_overridden() {
        let output = capture_log(Severity::Info, "REAL", &[("event", "FAKE")]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "REAL");
    }

    #[test]
    fn test_severity_routing() {
        assert!(!Severity::Warn.to_stderr());
        assert!(Severity::Error.to_stderr());
        assert!(Severity::Fatal.to_stderr());
    }
}
