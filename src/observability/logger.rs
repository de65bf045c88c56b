//! Structured JSON logger.
//!
//! - One log line is one event.
//! - Fields are emitted in deterministic (alphabetical) order so log lines
//!   diff cleanly and are greppable without a JSON parser.
//! - Synchronous, unbuffered: a log call is a single `write` syscall.

use std::fmt;
use std::io::{self, Write};

/// Log severity levels, ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured logger that emits one JSON object per line.
pub struct Logger;

impl Logger {
    /// Logs an event with fields, to stdout.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        Self::log_to_writer(severity, event, fields, &mut io::stdout());
    }

    /// Logs to stderr; used for WARN and ERROR by convention.
    pub fn log_stderr(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        Self::log_to_writer(severity, event, fields, &mut io::stderr());
    }

    fn log_to_writer<W: Write>(severity: Severity, event: &str, fields: &[(&str, &str)], writer: &mut W) {
        let mut output = String::with_capacity(256);
        output.push('{');

        output.push_str("\"event\":\"");
        Self::escape_json_string(&mut output, event);
        output.push('"');

        output.push_str(",\"severity\":\"");
        output.push_str(severity.as_str());
        output.push('"');

        let mut sorted_fields: Vec<_> = fields.iter().collect();
        sorted_fields.sort_by_key(|(k, _)| *k);

        for (key, value) in sorted_fields {
            output.push_str(",\"");
            Self::escape_json_string(&mut output, key);
            output.push_str("\":\"");
            Self::escape_json_string(&mut output, value);
            output.push('"');
        }

        output.push('}');
        output.push('\n');

        let _ = writer.write_all(output.as_bytes());
        let _ = writer.flush();
    }

    fn escape_json_string(output: &mut String, s: &str) {
        for c in s.chars() {
            match c {
                '"' => output.push_str("\\\""),
                '\\' => output.push_str("\\\\"),
                '\n' => output.push_str("\\n"),
                '\r' => output.push_str("\\r"),
                '\t' => output.push_str("\\t"),
                c if c.is_control() => output.push_str(&format!("\\u{:04x}", c as u32)),
                c => output.push(c),
            }
        }
    }

    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log_stderr(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log_stderr(Severity::Error, event, fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn fields_are_sorted_alphabetically() {
        let mut buf = Cursor::new(Vec::new());
        Logger::log_to_writer(Severity::Info, "runCompleted", &[("zeta", "1"), ("alpha", "2")], &mut buf);
        let out = String::from_utf8(buf.into_inner()).unwrap();
        let alpha_pos = out.find("\"alpha\"").unwrap();
        let zeta_pos = out.find("\"zeta\"").unwrap();
        assert!(alpha_pos < zeta_pos);
    }

    #[test]
    fn escapes_control_characters() {
        let mut buf = Cursor::new(Vec::new());
        Logger::log_to_writer(Severity::Error, "e", &[("msg", "line1\nline2\ttab")], &mut buf);
        let out = String::from_utf8(buf.into_inner()).unwrap();
        assert!(out.contains("\\n"));
        assert!(out.contains("\\t"));
        assert!(!out.contains('\n') || out.ends_with('\n'));
    }

    #[test]
    fn one_line_per_call() {
        let mut buf = Cursor::new(Vec::new());
        Logger::log_to_writer(Severity::Info, "a", &[], &mut buf);
        Logger::log_to_writer(Severity::Info, "b", &[], &mut buf);
        let out = String::from_utf8(buf.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 2);
    }
}
