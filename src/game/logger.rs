//! Centralized game logging
//!
//! The logger lives inside `GameState` so that log output is part of the
//! deterministic, snapshottable state rather than an external sink. It
//! supports text output for interactive debugging, JSON output for
//! machine consumption, and in-memory capture for tests.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// How much the logger prints
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum VerbosityLevel {
    /// No output at all
    Silent,
    /// Key game events
    #[default]
    Normal,
    /// Everything, including priority passes and trigger collection
    Verbose,
}

/// Output format for log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// Human-readable text output (default)
    #[default]
    Text,
    /// Machine-readable JSON output (one object per line)
    Json,
}

/// A structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: VerbosityLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Centralized logger for game events
///
/// Uses RefCell for the capture buffer so logging does not require
/// `&mut self` from read-only contexts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameLogger {
    verbosity: VerbosityLevel,
    output_format: OutputFormat,
    /// Whether to capture logs in memory
    capture_logs: bool,
    /// Whether to print to stdout
    print_logs: bool,
    #[serde(skip)]
    log_buffer: RefCell<Vec<LogEntry>>,
}

impl GameLogger {
    pub fn new() -> Self {
        GameLogger {
            verbosity: VerbosityLevel::default(),
            output_format: OutputFormat::default(),
            capture_logs: true,
            print_logs: false,
            log_buffer: RefCell::new(Vec::new()),
        }
    }

    pub fn with_verbosity(verbosity: VerbosityLevel) -> Self {
        GameLogger {
            verbosity,
            ..GameLogger::new()
        }
    }

    pub fn set_output_format(&mut self, format: OutputFormat) {
        self.output_format = format;
    }

    pub fn set_print(&mut self, print: bool) {
        self.print_logs = print;
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    /// Get captured log entries (clones the buffer)
    pub fn get_logs(&self) -> Vec<LogEntry> {
        self.log_buffer.borrow().clone()
    }

    pub fn clear_logs(&self) {
        self.log_buffer.borrow_mut().clear();
    }

    /// Messages captured since the given watermark
    pub fn logs_since(&self, mark: usize) -> Vec<String> {
        self.log_buffer
            .borrow()
            .iter()
            .skip(mark)
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log_buffer.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_buffer.borrow().is_empty()
    }

    /// Log at Normal verbosity
    pub fn log(&self, message: impl Into<String>) {
        self.emit(VerbosityLevel::Normal, message.into(), None);
    }

    /// Log at Verbose verbosity
    pub fn debug(&self, message: impl Into<String>) {
        self.emit(VerbosityLevel::Verbose, message.into(), None);
    }

    /// Log with an explicit category (e.g. "trigger", "combat")
    pub fn log_category(&self, category: &str, message: impl Into<String>) {
        self.emit(
            VerbosityLevel::Normal,
            message.into(),
            Some(category.to_string()),
        );
    }

    fn emit(&self, level: VerbosityLevel, message: String, category: Option<String>) {
        let entry = LogEntry {
            level,
            message,
            category,
        };

        if self.capture_logs {
            self.log_buffer.borrow_mut().push(entry.clone());
        }

        if self.print_logs && level <= self.verbosity {
            match self.output_format {
                OutputFormat::Text => println!("{}", entry.message),
                OutputFormat::Json => {
                    if let Ok(json) = serde_json::to_string(&entry) {
                        println!("{}", json);
                    }
                }
            }
        }
    }
}

impl Default for GameLogger {
    fn default() -> Self {
        Self::new()
    }
}
