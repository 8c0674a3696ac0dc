//! Stack capture configuration

use super::provider::{BacktraceProvider, NoopProvider, StackProvider};
use std::env;
use std::sync::{Arc, OnceLock};

/// Default number of addresses recorded per error
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Path fragments that mark entry into a runtime: `main`'s caller, the test
/// harness, spawned threads and async executors. Once a frame from one of
/// these is reached the rest of the stack is dropped.
pub const DEFAULT_DENYLIST: [&str; 8] = [
    "/library/std/src/rt.rs",
    "/library/std/src/thread/",
    "/library/test/",
    "/tokio-",
    "/async-std-",
    "/async-executor-",
    "/futures-executor-",
    "/rayon-core-",
];

/// Path fragments of toolchain and dependency code. Such frames are left out
/// of the rendering but the walk carries on past them, so `?` conversions and
/// closures passed to `map_err` keep their callers.
pub const DEFAULT_HIDDEN: [&str; 4] = ["/rustc/", "/library/", "/.cargo/registry/", "/.cargo/git/"];

static GLOBAL: OnceLock<StackConfig> = OnceLock::new();

/// How stacks are captured and rendered
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Retained frames to drop after the library's own frames are removed
    pub skip: usize,
    pub max_depth: usize,
    pub denylist: Arc<[String]>,
    pub hidden: Arc<[String]>,
    /// Read source files to show the failing line instead of the function name
    pub read_source: bool,
    pub provider: Arc<dyn StackProvider>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            skip: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            hidden: DEFAULT_HIDDEN.iter().map(|s| s.to_string()).collect(),
            read_source: true,
            provider: Arc::new(BacktraceProvider),
        }
    }
}

impl StackConfig {
    /// A configuration that never captures anything
    pub fn disabled() -> Self {
        Self::default().with_provider(NoopProvider)
    }

    /// Defaults overridden by `FAULTLINE_STACK*` environment variables.
    ///
    /// - `FAULTLINE_STACK=off` disables capture
    /// - `FAULTLINE_STACK_DEPTH`, `FAULTLINE_STACK_SKIP` take integers
    /// - `FAULTLINE_STACK_DENYLIST`, `FAULTLINE_STACK_HIDDEN` take comma
    ///   separated path fragments
    /// - `FAULTLINE_STACK_SOURCE=0|false` renders function names only
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(mode) = lookup("FAULTLINE_STACK") {
            if matches!(mode.trim(), "off" | "0" | "false") {
                config = config.with_provider(NoopProvider);
            }
        }
        if let Some(depth) = lookup("FAULTLINE_STACK_DEPTH") {
            match depth.trim().parse() {
                Ok(depth) => config.max_depth = depth,
                Err(e) => tracing::warn!(value = %depth, error = %e, "ignoring FAULTLINE_STACK_DEPTH"),
            }
        }
        if let Some(skip) = lookup("FAULTLINE_STACK_SKIP") {
            match skip.trim().parse() {
                Ok(skip) => config.skip = skip,
                Err(e) => tracing::warn!(value = %skip, error = %e, "ignoring FAULTLINE_STACK_SKIP"),
            }
        }
        if let Some(list) = lookup("FAULTLINE_STACK_DENYLIST") {
            config = config.with_denylist(split_list(&list));
        }
        if let Some(list) = lookup("FAULTLINE_STACK_HIDDEN") {
            config = config.with_hidden(split_list(&list));
        }
        if let Some(source) = lookup("FAULTLINE_STACK_SOURCE") {
            config.read_source = !matches!(source.trim(), "0" | "false" | "off");
        }

        config
    }

    /// The process-wide configuration used by [`build`](crate::build).
    ///
    /// Initialized from the environment on first use.
    pub fn global() -> &'static StackConfig {
        GLOBAL.get_or_init(StackConfig::from_env)
    }

    /// Install the process-wide configuration. Fails, handing the config
    /// back, if errors have already been built with the previous one.
    pub fn set_global(config: StackConfig) -> Result<(), StackConfig> {
        GLOBAL.set(config)
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_denylist<I, S>(mut self, denylist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denylist = denylist.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hidden<I, S>(mut self, hidden: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden = hidden.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_read_source(mut self, read_source: bool) -> Self {
        self.read_source = read_source;
        self
    }

    pub fn with_provider(mut self, provider: impl StackProvider + 'static) -> Self {
        self.provider = Arc::new(provider);
        self
    }

    /// Whether a source path belongs to denylisted infrastructure
    pub fn is_denied(&self, path: &str) -> bool {
        self.denylist.iter().any(|fragment| path.contains(fragment.as_str()))
    }

    /// Whether a source path is toolchain or dependency code left out of the
    /// rendering. Denylisted paths are never hidden.
    pub fn is_hidden(&self, path: &str) -> bool {
        !self.is_denied(path) && self.hidden.iter().any(|fragment| path.contains(fragment.as_str()))
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StackConfig::default();
        assert_eq!(config.skip, 0);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.read_source);
        assert!(config.is_denied("/rustc/abc123/library/std/src/rt.rs"));
        assert!(config.is_denied("/rustc/abc123/library/test/src/lib.rs"));
        assert!(config.is_denied("/home/me/.cargo/registry/src/index.crates.io-6f17d22bba15001f/tokio-1.40.0/src/runtime/park.rs"));
        assert!(!config.is_denied("/home/me/app/src/main.rs"));
    }

    #[test]
    fn test_combinators_are_hidden_not_denied() {
        let config = StackConfig::default();
        let from_residual = "/rustc/abc123/library/core/src/result.rs";
        assert!(!config.is_denied(from_residual));
        assert!(config.is_hidden(from_residual));
        assert!(config.is_hidden("/home/me/.cargo/registry/src/index.crates.io-6f17d22bba15001f/serde-1.0.0/src/de.rs"));
        assert!(!config.is_hidden("/rustc/abc123/library/std/src/rt.rs"));
        assert!(!config.is_hidden("/home/me/app/src/main.rs"));
    }

    #[test]
    fn test_from_env_overrides() {
        let config = StackConfig::from_lookup(lookup(&[
            ("FAULTLINE_STACK_DEPTH", "8"),
            ("FAULTLINE_STACK_SKIP", "2"),
            ("FAULTLINE_STACK_DENYLIST", "vendor/, generated ,"),
            ("FAULTLINE_STACK_HIDDEN", "vendor/"),
            ("FAULTLINE_STACK_SOURCE", "false"),
        ]));
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.skip, 2);
        assert_eq!(&*config.denylist, &["vendor/".to_string(), "generated".to_string()]);
        assert_eq!(&*config.hidden, &["vendor/".to_string()]);
        assert!(!config.read_source);
    }

    #[test]
    fn test_from_env_ignores_garbage() {
        let config = StackConfig::from_lookup(lookup(&[("FAULTLINE_STACK_DEPTH", "lots")]));
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_stack_off() {
        let config = StackConfig::from_lookup(lookup(&[("FAULTLINE_STACK", "off")]));
        assert!(config.provider.capture(16).is_empty());
        assert!(StackConfig::disabled().provider.capture(16).is_empty());
    }

    #[test]
    fn test_builders() {
        let config = StackConfig::default()
            .with_skip(1)
            .with_max_depth(4)
            .with_denylist(["gen/"])
            .with_read_source(false);
        assert_eq!(config.skip, 1);
        assert_eq!(config.max_depth, 4);
        assert!(config.is_denied("src/gen/schema.rs"));
        assert!(!config.is_denied("/rustc/x/library/std/src/rt.rs"));
        assert!(!config.read_source);
    }
}
