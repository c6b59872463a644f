//! # stdio
//!
//! Human-facing terminal output for the activity server.
//!
//! ## Format
//!
//! ```text
//! [action] message
//! ```
//!
//! ## Usage
//!
//! ```rust
//! stdio::log("listen", "http://localhost:3333");
//! stdio::warn("registry", "no activities found");
//! stdio::error("config", "invalid PORT");
//! ```
//!
//! ## Log Levels
//!
//! Control output with the `LOG_LEVEL` environment variable:
//! - `error` - Errors only
//! - `info` - Default (startup + important messages)
//! - `debug` - Verbose output

use std::env;
use std::sync::OnceLock;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum LogLevel {
    Error = 0,
    Info = 1,
    Debug = 2,
}

impl LogLevel {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "debug" => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }
}

static LOG_LEVEL: OnceLock<LogLevel> = OnceLock::new();

fn emit_line(line: &str) {
    eprintln!("{}", line);
}

/// Current log level, read once from `LOG_LEVEL`.
pub fn log_level() -> LogLevel {
    *LOG_LEVEL.get_or_init(|| {
        env::var("LOG_LEVEL")
            .map(|s| LogLevel::parse(&s))
            .unwrap_or(LogLevel::Info)
    })
}

pub fn is_debug() -> bool {
    log_level() >= LogLevel::Debug
}

/// Log an action with a message.
///
/// ```
/// stdio::log("discover", "12 activities");
/// // Output: [discover] 12 activities
/// ```
pub fn log(action: &str, message: &str) {
    if log_level() >= LogLevel::Info {
        emit_line(&format_action(action, message));
    }
}

/// Always printed, whatever the level.
pub fn error(action: &str, message: &str) {
    emit_line(&format_action(action, message));
}

/// Format: `[warn] [name] message`
pub fn warn(name: &str, message: &str) {
    if log_level() >= LogLevel::Info {
        emit_line(&format!("[warn] [{}] {}", name, message));
    }
}

/// Only shown when `LOG_LEVEL=debug`.
pub fn debug(action: &str, message: &str) {
    if is_debug() {
        emit_line(&format_action(action, message));
    }
}

/// Format: `  label      value`
pub fn info(label: &str, value: &str) {
    if log_level() >= LogLevel::Info {
        emit_line(&format_info(label, value));
    }
}

/// Section title followed by a rule.
pub fn header(title: &str) {
    if log_level() >= LogLevel::Info {
        emit_line("");
        emit_line(title);
        emit_line(&"-".repeat(40));
    }
}

pub fn format_action(action: &str, message: &str) -> String {
    format!("[{}] {}", action, message)
}

pub fn format_info(label: &str, value: &str) -> String {
    format!("  {:<10} {}", label, value)
}

/// What the server prints once it is about to listen.
#[derive(Debug, Clone, Default)]
pub struct StartupSummary {
    pub public_url: String,
    pub listen_addr: String,
    /// `(domain, route, framework)` in discovery order.
    pub activities: Vec<(String, String, String)>,
}

impl StartupSummary {
    /// Lines of the summary, without the level check.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format_action("listen", &self.listen_addr),
            format_info("dashboard", &format!("{}/", self.public_url)),
            format_info("browse", &format!("{}/browse", self.public_url)),
            format_info("api", &format!("{}/api/activities", self.public_url)),
            format_info("metrics", &format!("{}/api/metrics", self.public_url)),
        ];

        let mut domain: Option<&str> = None;
        for (activity_domain, route, framework) in &self.activities {
            if domain != Some(activity_domain.as_str()) {
                domain = Some(activity_domain.as_str());
                lines.push(format_action("domain", activity_domain));
            }
            lines.push(format!("    {} ({})", route, framework));
        }
        lines.push(format_action(
            "activities",
            &format!("{} loaded", self.activities.len()),
        ));
        lines
    }

    pub fn print(&self) {
        if log_level() < LogLevel::Info {
            return;
        }
        header("activity server");
        for line in self.lines() {
            emit_line(&line);
        }
    }
}
