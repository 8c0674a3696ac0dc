//! Stack capture backends

use std::ffi::c_void;
use std::fmt;
use std::path::{Path, PathBuf};

/// One symbolic call frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Demangled, path-qualified function name without the symbol hash
    pub function: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
}

impl Frame {
    pub fn new(function: impl Into<String>, file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            function: function.into(),
            file: Some(file.into()),
            line: Some(line),
        }
    }
}

/// Capability to snapshot the current call stack and symbolize it later.
///
/// `capture` runs on every error construction and must stay cheap: it only
/// records instruction addresses, innermost first. `resolve` runs at most
/// once per address per render and may be slow. A single address can yield
/// several frames when calls were inlined.
pub trait StackProvider: Send + Sync + fmt::Debug {
    fn capture(&self, max_depth: usize) -> Vec<usize>;

    fn resolve(&self, ip: usize) -> Vec<Frame>;
}

/// Unwinds and symbolizes with the `backtrace` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktraceProvider;

impl StackProvider for BacktraceProvider {
    fn capture(&self, max_depth: usize) -> Vec<usize> {
        let mut ips = Vec::with_capacity(max_depth);
        if max_depth == 0 {
            return ips;
        }
        backtrace::trace(|frame| {
            ips.push(frame.ip() as usize);
            ips.len() < max_depth
        });
        ips
    }

    fn resolve(&self, ip: usize) -> Vec<Frame> {
        let mut frames = Vec::new();
        backtrace::resolve(ip as *mut c_void, |symbol| {
            let function = symbol
                .name()
                .map(|name| format!("{:#}", name))
                .unwrap_or_else(|| format!("{:#x}", ip));
            frames.push(Frame {
                function,
                file: symbol.filename().map(Path::to_path_buf),
                line: symbol.lineno(),
            });
        });
        if frames.is_empty() {
            frames.push(Frame {
                function: format!("{:#x}", ip),
                file: None,
                line: None,
            });
        }
        frames
    }
}

/// Captures nothing; for platforms without unwinding support or when
/// traces are switched off
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProvider;

impl StackProvider for NoopProvider {
    fn capture(&self, _max_depth: usize) -> Vec<usize> {
        Vec::new()
    }

    fn resolve(&self, _ip: usize) -> Vec<Frame> {
        Vec::new()
    }
}
