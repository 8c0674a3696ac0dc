//! # Call stack snapshots
//!
//! A [`Stack`] records raw instruction addresses when an error is built and
//! turns them into text only when somebody looks at it. Rendering:
//!
//! - drops the frames of the capture machinery itself, then `skip` more
//! - walks outward and stops for good at the first frame whose source path
//!   matches the denylist; everything past that point is runtime plumbing
//! - leaves out toolchain and dependency frames (`?` conversions, `map_err`,
//!   iterator adapters) without stopping, so the callers above them survive
//! - prints each frame as `<file>:<line> <source line or function name>`
//!
//! The result is computed once per snapshot and shared by every clone of the
//! error that owns it.

mod config;
mod provider;

pub use config::{StackConfig, DEFAULT_DENYLIST, DEFAULT_HIDDEN, DEFAULT_MAX_DEPTH};
pub use provider::{BacktraceProvider, Frame, NoopProvider, StackProvider};

use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Printed when the failing line is outside the source file
const UNKNOWN_LINE: &str = "?";

/// Function-name prefixes of the frames that perform the capture
const INTERNAL_PREFIXES: [&str; 4] = [
    "backtrace::",
    "faultline_error::stack::",
    "faultline_error::builder::",
    "faultline_error::error::",
];

/// A captured call stack, rendered lazily
pub struct Stack {
    ips: Vec<usize>,
    config: StackConfig,
    rendered: OnceLock<Vec<String>>,
}

impl Stack {
    /// Record the current call stack. Only addresses are stored.
    pub fn capture(config: &StackConfig) -> Self {
        let ips = config.provider.capture(config.max_depth);
        Self {
            ips,
            config: config.clone(),
            rendered: OnceLock::new(),
        }
    }

    /// A snapshot with no frames
    pub fn empty() -> Self {
        Self {
            ips: Vec::new(),
            config: StackConfig::disabled(),
            rendered: OnceLock::new(),
        }
    }

    /// Number of raw addresses captured
    pub fn depth(&self) -> usize {
        self.ips.len()
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered.get().is_some()
    }

    /// The rendered frames, innermost first. Computed on first call.
    pub fn frames(&self) -> &[String] {
        self.rendered.get_or_init(|| self.render())
    }

    /// The text form: every frame on its own line, each preceded by a
    /// newline so the block sits under the error message
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for frame in self.frames() {
            out.push('\n');
            out.push_str(frame);
        }
        out
    }

    fn render(&self) -> Vec<String> {
        let resolved = self
            .ips
            .iter()
            .flat_map(|ip| self.config.provider.resolve(*ip));
        let frames = render_frames(resolved, &self.config);
        tracing::trace!(captured = self.ips.len(), rendered = frames.len(), "rendered stack");
        frames
    }
}

/// Filter and format resolved frames, innermost first.
pub fn render_frames(frames: impl IntoIterator<Item = Frame>, config: &StackConfig) -> Vec<String> {
    let mut sources = SourceCache::new(config.read_source);
    let mut rendered = Vec::new();

    let located = frames.into_iter().map(|frame| {
        let file = frame
            .file
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned());
        (frame, file)
    });

    let hidden = |file: &Option<String>| file.as_deref().is_some_and(|f| config.is_hidden(f));
    let denied = |file: &Option<String>| file.as_deref().is_some_and(|f| config.is_denied(f));

    let retained = located
        .skip_while(|(frame, file)| is_internal(&frame.function) || hidden(file))
        .take_while(|(_, file)| !denied(file))
        .filter(|(_, file)| !hidden(file))
        .skip(config.skip);

    for (frame, file) in retained {
        let location = match &file {
            Some(file) => relative_path(&frame.function, file),
            None => UNKNOWN_LINE.to_string(),
        };
        let line = frame.line.unwrap_or(0);

        let text = match (&frame.file, frame.line) {
            (Some(path), Some(line)) => sources.line(path, line),
            _ => None,
        };
        let text = text.unwrap_or_else(|| short_function(&frame.function));

        rendered.push(format!("{}:{} {}", location, line, text));
    }

    rendered
}

/// Source files read during one render pass
struct SourceCache {
    enabled: bool,
    files: HashMap<PathBuf, Option<Vec<String>>>,
}

impl SourceCache {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            files: HashMap::new(),
        }
    }

    /// The trimmed text of a 1-based line. `None` if the file can't be read;
    /// `?` if the line is out of range.
    fn line(&mut self, path: &Path, line: u32) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let lines = self.files.entry(path.to_path_buf()).or_insert_with(|| {
            match std::fs::read_to_string(path) {
                Ok(data) => Some(data.split('\n').map(str::to_string).collect()),
                Err(e) => {
                    tracing::debug!(file = %path.display(), error = %e, "source unavailable, using function name");
                    None
                }
            }
        });
        let lines = lines.as_ref()?;

        let text = (line as usize)
            .checked_sub(1)
            .and_then(|n| lines.get(n))
            .map(|text| text.trim_matches(|c: char| c == ' ' || c == '\t' || c == '\r').to_string())
            .unwrap_or_else(|| UNKNOWN_LINE.to_string());
        Some(text)
    }
}

fn is_internal(function: &str) -> bool {
    let name = function.trim_start_matches('<');
    if name.contains("::tests::") {
        return false;
    }
    name.starts_with("_Unwind_") || INTERNAL_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Trim a source path so it starts at the crate directory.
///
/// The function's module path has `n` segments; the file lives `n + 1`
/// segments below the directory that holds the crate, so the last `n + 1`
/// path segments are kept. Paths with fewer segments are returned whole.
pub fn relative_path(function: &str, file: &str) -> String {
    let keep = module_depth(function) + 1;
    let mut end = file.len();
    for _ in 0..keep {
        match file[..end].rfind(|c: char| c == '/' || c == '\\') {
            Some(i) => end = i,
            None => return file.to_string(),
        }
    }
    file[end + 1..].to_string()
}

/// Number of module segments in a qualified function name, not counting
/// the function itself
fn module_depth(function: &str) -> usize {
    let mut name = function.trim_start_matches('<');
    if let Some(i) = name.find(" as ") {
        name = &name[..i];
    }
    let name = strip_generics(name);
    let segments = name
        .split("::")
        .filter(|s| !s.is_empty() && !s.starts_with("{{") && !is_hash(s) && !s.starts_with('>'))
        .count();
    segments.saturating_sub(1)
}

/// Function name without the crate prefix, symbol hash or closure braces
pub fn short_function(function: &str) -> String {
    let mut name = function;
    if let Some(i) = name.rfind("::") {
        if is_hash(&name[i + 2..]) {
            name = &name[..i];
        }
    }
    if let Some(i) = name.find("::") {
        name = &name[i + 2..];
    }
    name.replace("{{closure}}", "closure")
}

fn strip_generics(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut depth = 0usize;
    for c in name.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Legacy mangling appends `::h` plus 16 hex digits
fn is_hash(segment: &str) -> bool {
    segment.len() == 17
        && segment.starts_with('h')
        && segment[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl Clone for Stack {
    fn clone(&self) -> Self {
        let rendered = OnceLock::new();
        if let Some(frames) = self.rendered.get() {
            let _ = rendered.set(frames.clone());
        }
        Self {
            ips: self.ips.clone(),
            config: self.config.clone(),
            rendered,
        }
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.frames()).finish()
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl Serialize for Stack {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let frames = self.frames();
        let mut seq = serializer.serialize_seq(Some(frames.len()))?;
        for frame in frames {
            seq.serialize_element(frame)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Resolves address `i` to `frames[i]` and counts resolutions
    #[derive(Debug, Default)]
    struct FakeProvider {
        frames: Vec<Frame>,
        resolved: Arc<AtomicUsize>,
    }

    impl StackProvider for FakeProvider {
        fn capture(&self, max_depth: usize) -> Vec<usize> {
            (0..self.frames.len().min(max_depth)).collect()
        }

        fn resolve(&self, ip: usize) -> Vec<Frame> {
            self.resolved.fetch_add(1, Ordering::SeqCst);
            self.frames.get(ip).cloned().into_iter().collect()
        }
    }

    fn config_with(frames: Vec<Frame>) -> (StackConfig, Arc<AtomicUsize>) {
        let resolved = Arc::new(AtomicUsize::new(0));
        let provider = FakeProvider {
            frames,
            resolved: resolved.clone(),
        };
        (StackConfig::default().with_read_source(false).with_provider(provider), resolved)
    }

    #[test]
    fn test_denylisted_frame_stops_walk() {
        let (config, _) = config_with(vec![
            Frame::new("app::db::insert", "/work/app/src/db.rs", 10),
            Frame::new("app::handler::create", "/work/app/src/handler.rs", 20),
            Frame::new(
                "tokio::runtime::park::CachedParkThread::block_on",
                "/home/u/.cargo/registry/src/index.crates.io-6f17d22bba15001f/tokio-1.40.0/src/runtime/park.rs",
                5,
            ),
            Frame::new("app::main", "/work/app/src/main.rs", 3),
        ]);
        let stack = Stack::capture(&config);

        assert_eq!(
            stack.frames(),
            &["app/src/db.rs:10 db::insert", "app/src/handler.rs:20 handler::create"]
        );
    }

    #[test]
    fn test_toolchain_frames_do_not_stop_walk() {
        let (config, _) = config_with(vec![
            Frame::new("backtrace::backtrace::trace", "/b/src/backtrace/mod.rs", 1),
            Frame::new("core::ops::function::FnMut::call_mut", "/rustc/abc/library/core/src/ops/function.rs", 2),
            Frame::new("faultline_error::builder::build", "/f/src/builder.rs", 3),
            Frame::new("app::repo::load::{{closure}}", "/work/app/src/repo.rs", 7),
            Frame::new("core::result::Result<T,E>::map_err", "/rustc/abc/library/core/src/result.rs", 9),
            Frame::new("app::repo::load", "/work/app/src/repo.rs", 7),
            Frame::new(
                "<core::result::Result<T,F> as core::ops::try_trait::FromResidual>::from_residual",
                "/rustc/abc/library/core/src/result.rs",
                11,
            ),
            Frame::new("app::service::run", "/work/app/src/service.rs", 8),
            Frame::new("core::ops::function::FnOnce::call_once", "/rustc/abc/library/core/src/ops/function.rs", 250),
            Frame::new("app::main", "/work/app/src/main.rs", 3),
            Frame::new("std::rt::lang_start::{{closure}}", "/rustc/abc/library/std/src/rt.rs", 195),
            Frame::new("main", "/work/app/src/main.rs", 1),
        ]);
        let stack = Stack::capture(&config);

        assert_eq!(
            stack.frames(),
            &[
                "app/src/repo.rs:7 repo::load::closure",
                "app/src/repo.rs:7 repo::load",
                "app/src/service.rs:8 service::run",
                "src/main.rs:3 main",
            ]
        );
    }

    #[test]
    fn test_internal_frames_and_skip() {
        let frames = vec![
            Frame::new("backtrace::backtrace::trace", "/b/src/backtrace/mod.rs", 1),
            Frame::new("faultline_error::builder::build_with", "/f/src/builder.rs", 2),
            Frame::new("app::repo::load", "/work/app/src/repo.rs", 7),
            Frame::new("app::service::run", "/work/app/src/service.rs", 8),
        ];
        let (config, _) = config_with(frames.clone());
        let stack = Stack::capture(&config);
        assert_eq!(stack.frames().len(), 2);
        assert!(stack.frames()[0].starts_with("app/src/repo.rs:7"));

        let (config, _) = config_with(frames);
        let stack = Stack::capture(&config.with_skip(1));
        assert_eq!(stack.frames(), &["app/src/service.rs:8 service::run"]);
    }

    #[test]
    fn test_render_runs_once() {
        let (config, resolved) = config_with(vec![
            Frame::new("app::a", "/w/app/src/lib.rs", 1),
            Frame::new("app::b", "/w/app/src/lib.rs", 2),
        ]);
        let stack = Stack::capture(&config);
        assert!(!stack.is_rendered());

        let first = stack.to_text();
        let second = stack.to_text();
        assert_eq!(first, second);
        assert!(stack.is_rendered());
        assert_eq!(resolved.load(Ordering::SeqCst), 2);

        let copy = stack.clone();
        assert_eq!(copy.to_text(), first);
        assert_eq!(resolved.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_first_render() {
        let (config, resolved) = config_with(vec![
            Frame::new("app::a", "/w/app/src/lib.rs", 1),
            Frame::new("app::b", "/w/app/src/lib.rs", 2),
            Frame::new("app::c", "/w/app/src/lib.rs", 3),
        ]);
        let stack = Arc::new(Stack::capture(&config));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stack = stack.clone();
                std::thread::spawn(move || stack.to_text())
            })
            .collect();
        let texts: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(texts.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(resolved.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_text_and_json_forms() {
        let (config, _) = config_with(vec![
            Frame::new("app::a", "/w/app/src/lib.rs", 1),
            Frame::new("app::b", "/w/app/src/lib.rs", 2),
        ]);
        let stack = Stack::capture(&config);
        assert_eq!(stack.to_text(), "\nsrc/lib.rs:1 a\nsrc/lib.rs:2 b");

        let json = serde_json::to_value(&stack).unwrap();
        assert_eq!(json, serde_json::json!(["src/lib.rs:1 a", "src/lib.rs:2 b"]));

        let empty = Stack::empty();
        assert_eq!(empty.to_text(), "");
        assert_eq!(serde_json::to_string(&empty).unwrap(), "[]");
    }

    #[test]
    fn test_source_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app").join("src").join("lib.rs");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "fn main() {{").unwrap();
        writeln!(file, "\t    let x = load()?;  ").unwrap();
        writeln!(file, "}}").unwrap();
        drop(file);

        let path_str = path.to_string_lossy().into_owned();
        let missing = dir.path().join("app/src/gone.rs");
        let frames = vec![
            Frame::new("app::main", path.clone(), 2),
            Frame::new("app::main", path.clone(), 99),
            Frame::new("app::gone::{{closure}}", missing, 4),
        ];
        let config = StackConfig::default().with_denylist(Vec::<String>::new());
        let rendered = render_frames(frames, &config);

        assert!(path_str.ends_with("app/src/lib.rs"));
        assert_eq!(rendered[0], "src/lib.rs:2 let x = load()?;");
        assert_eq!(rendered[1], "src/lib.rs:99 ?");
        assert_eq!(rendered[2], "src/gone.rs:4 gone::closure");
    }

    #[test]
    fn test_source_lines_crlf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app").join("src").join("lib.rs");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "fn main() {\r\n    let x = load()?;\r\n}\r\n").unwrap();

        let config = StackConfig::default().with_denylist(Vec::<String>::new());
        let rendered = render_frames(vec![Frame::new("app::main", path, 2)], &config);
        assert_eq!(rendered, vec!["src/lib.rs:2 let x = load()?;"]);
    }

    #[test]
    fn test_frames_without_file_info() {
        let frames = vec![
            Frame {
                function: "app::mystery".to_string(),
                file: None,
                line: None,
            },
            Frame::new("app::after", "/w/app/src/lib.rs", 5),
        ];
        let config = StackConfig::default().with_read_source(false);
        let rendered = render_frames(frames, &config);
        assert_eq!(rendered, vec!["?:0 mystery", "src/lib.rs:5 after"]);
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path("myapp::handlers::users::create", "/home/u/proj/src/handlers/users.rs"),
            "proj/src/handlers/users.rs"
        );
        assert_eq!(
            relative_path("<myapp::db::Store as core::fmt::Debug>::fmt", "/home/u/myapp/src/db.rs"),
            "myapp/src/db.rs"
        );
        assert_eq!(relative_path("app::run", "src/main.rs"), "src/main.rs");
        assert_eq!(relative_path("app::run", "main.rs"), "main.rs");
    }

    #[test]
    fn test_short_function() {
        assert_eq!(short_function("app::db::insert"), "db::insert");
        assert_eq!(short_function("app::db::insert::h0123456789abcdef"), "db::insert");
        assert_eq!(short_function("app::run::{{closure}}"), "run::closure");
        assert_eq!(short_function("main"), "main");
    }

    #[test]
    fn test_module_depth_ignores_generics_and_closures() {
        assert_eq!(module_depth("app::Store<T>::get"), 2);
        assert_eq!(module_depth("app::run::{{closure}}"), 1);
        assert_eq!(module_depth("main"), 0);
    }
}
