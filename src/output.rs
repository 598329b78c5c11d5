// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet, and JSON output modes over capturable sinks.

use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Results and tables only
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Where a stream of output lines ends up.
#[derive(Clone)]
enum Sink {
    Stdout,
    Stderr,
    Buffer(Arc<Mutex<String>>),
}

impl Sink {
    fn write(&self, text: &str, newline: bool) {
        let end = if newline { "\n" } else { "" };
        match self {
            Sink::Stdout => {
                let mut out = std::io::stdout().lock();
                let _ = write!(out, "{text}{end}");
                let _ = out.flush();
            }
            Sink::Stderr => {
                let mut err = std::io::stderr().lock();
                let _ = write!(err, "{text}{end}");
            }
            Sink::Buffer(buf) => {
                let mut buf = buf.lock();
                buf.push_str(text);
                buf.push_str(end);
            }
        }
    }
}

/// Text written to a captured [`Output`].
#[derive(Clone, Default)]
pub struct Captured {
    stdout: Arc<Mutex<String>>,
    stderr: Arc<Mutex<String>>,
}

impl Captured {
    pub fn stdout(&self) -> String {
        self.stdout.lock().clone()
    }

    pub fn stderr(&self) -> String {
        self.stderr.lock().clone()
    }
}

/// Handles CLI output based on the configured mode.
#[derive(Clone)]
pub struct Output {
    mode: OutputMode,
    out: Sink,
    err: Sink,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            out: Sink::Stdout,
            err: Sink::Stderr,
            start_time: None,
        }
    }

    /// An output that records everything instead of printing it.
    pub fn captured(mode: OutputMode) -> (Self, Captured) {
        let captured = Captured::default();
        let output = Self {
            mode,
            out: Sink::Buffer(captured.stdout.clone()),
            err: Sink::Buffer(captured.stderr.clone()),
            start_time: None,
        };
        (output, captured)
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    fn event(&self, sink: &Sink, event: &str, message: &str) {
        let event = JsonEvent {
            event,
            message,
            duration_secs: self.duration(),
        };
        if let Ok(json) = serde_json::to_string(&event) {
            sink.write(&json, true);
        }
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            self.out.write(message, true);
        }
    }

    /// Print a result line: tables, notices, conflict reports.
    pub fn info(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => self.out.write(message, true),
            OutputMode::Json => self.event(&self.out, "info", message),
        }
    }

    /// Print a question without a trailing newline.
    pub fn ask(&self, question: &str) {
        self.out.write(question, false);
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => match self.duration() {
                Some(elapsed) => self.out.write(&format!("{message} ({:.1}s)", elapsed), true),
                None => self.out.write(message, true),
            },
            OutputMode::Quiet => self.out.write(message, true),
            OutputMode::Json => self.event(&self.out, "success", message),
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                self.err.write(&format!("Warning: {message}"), true)
            }
            OutputMode::Json => self.event(&self.err, "warning", message),
        }
    }

    /// Print a failure that does not stop the command.
    pub fn failure(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => self.err.write(message, true),
            OutputMode::Json => self.event(&self.err, "failure", message),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                self.err.write(&format!("Error: {message}"), true)
            }
            OutputMode::Json => self.event(&self.err, "error", message),
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
