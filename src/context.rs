//! Call-site derivation from stack traces
//!
//! Two pluggable pieces: a [`StackCapture`] grabs a trace synchronously at
//! call time, and an [`InitiatorStrategy`] turns that text into a short
//! `file:line` string. Both are best-effort; a host without synchronous
//! trace capture simply yields [`NO_STACK`].

use regex::Regex;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::LazyLock;

/// Initiator when no trace could be obtained at all
pub const NO_STACK: &str = "<no stack available>";

/// Initiator when a trace exists but no caller frame was recognized
pub const FALLBACK_INITIATOR: &str = "script";

/// Frames at the top of every trace that belong to the capture machinery
const SKIPPED_FRAMES: usize = 2;

static FRAME_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([^\s/\\()\[\]@]+\.(?:js|mjs|cjs|jsx|ts|tsx|vue|svelte|rs)):(\d+)")
        .expect("frame location pattern is valid")
});

/// Obtains a raw stack trace at call time
pub trait StackCapture: Send + Sync {
    /// Multi-line trace text, or None when the environment cannot provide one
    fn capture(&self) -> Option<String>;
}

/// Derives the initiator string from a captured trace
pub trait InitiatorStrategy: Send + Sync {
    fn derive(&self, stack: Option<&str>) -> String;
}

/// Symbol prefixes of the runtime, the capture machinery and this crate
const RUNTIME_SYMBOLS: [&str; 6] = [
    "std::",
    "core::",
    "alloc::",
    "backtrace::",
    "tokio::",
    concat!(env!("CARGO_CRATE_NAME"), "::"),
];

/// Source locations of the toolchain and of registry or git dependencies
const RUNTIME_PATHS: [&str; 4] = ["/rustc/", ".cargo/registry", ".cargo/git", "\\rustc\\"];

/// Frames that can never be the caller's own code
fn is_runtime_frame(name: &str, file: &Path) -> bool {
    let symbol = name.trim_start_matches(['<', '&']);
    let file = file.to_string_lossy();
    RUNTIME_SYMBOLS.iter().any(|prefix| symbol.starts_with(prefix))
        || RUNTIME_PATHS.iter().any(|part| file.contains(part))
}

/// Captures the current thread's stack with the `backtrace` crate
///
/// Output mimics the familiar `at symbol (file:line:col)` layout, one frame
/// per line after a header line. Paths under the working directory are
/// shown relative to it. Frames without source information, and frames of
/// the runtime, of dependencies or of this crate, are rendered as
/// `[native code]` so the frame scan skips them.
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktraceCapture;

impl StackCapture for BacktraceCapture {
    fn capture(&self) -> Option<String> {
        let trace = backtrace::Backtrace::new();
        let cwd = std::env::current_dir().ok();
        let mut out = String::from("Error: stack capture\n");

        for frame in trace.frames() {
            for symbol in frame.symbols() {
                let name = symbol
                    .name()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());

                match (symbol.filename(), symbol.lineno()) {
                    (Some(file), Some(line)) if !is_runtime_frame(&name, file) => {
                        let shown = cwd
                            .as_deref()
                            .and_then(|cwd| file.strip_prefix(cwd).ok())
                            .unwrap_or(file);
                        let _ = writeln!(
                            out,
                            "    at {} ({}:{}:{})",
                            name,
                            shown.display(),
                            line,
                            symbol.colno().unwrap_or(0)
                        );
                    }
                    _ => {
                        let _ = writeln!(out, "    at {} [native code]", name);
                    }
                }
            }
        }

        Some(out)
    }
}

/// For hosts without synchronous trace capture
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStackCapture;

impl StackCapture for NoStackCapture {
    fn capture(&self) -> Option<String> {
        None
    }
}

/// A trace supplied verbatim, e.g. one taken by page-side script
#[derive(Debug, Clone)]
pub struct FixedStackCapture(pub String);

impl StackCapture for FixedStackCapture {
    fn capture(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Scans frames top to bottom for the first caller-owned script location
#[derive(Debug, Clone)]
pub struct FrameScanInitiator {
    own_marker: String,
}

impl FrameScanInitiator {
    /// `own_marker` identifies frames of the interceptor itself
    pub fn new(own_marker: impl Into<String>) -> Self {
        Self {
            own_marker: own_marker.into().to_ascii_lowercase(),
        }
    }

    fn is_candidate(&self, line: &str) -> bool {
        let lower = line.to_ascii_lowercase();
        if lower.trim().is_empty() || lower.contains("native") {
            return false;
        }
        self.own_marker.is_empty() || !lower.contains(&self.own_marker)
    }
}

impl Default for FrameScanInitiator {
    fn default() -> Self {
        Self::new("sonda")
    }
}

impl InitiatorStrategy for FrameScanInitiator {
    fn derive(&self, stack: Option<&str>) -> String {
        let Some(stack) = stack else {
            return NO_STACK.to_string();
        };

        stack
            .lines()
            .skip(SKIPPED_FRAMES)
            .find(|line| self.is_candidate(line))
            .and_then(|line| FRAME_LOCATION.captures(line))
            .map(|caps| format!("{}:{}", &caps[1], &caps[2]))
            .unwrap_or_else(|| FALLBACK_INITIATOR.to_string())
    }
}

/// Always reports that no stack is available
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledInitiator;

impl InitiatorStrategy for DisabledInitiator {
    fn derive(&self, _stack: Option<&str>) -> String {
        NO_STACK.to_string()
    }
}
