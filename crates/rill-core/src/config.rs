use std::sync::OnceLock;

fn env_true(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|val| {
        let trimmed = val.trim();
        !trimmed.is_empty() && !matches!(trimmed, "0" | "false" | "FALSE" | "False")
    })
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<T>().ok())
}

/// Process-wide switch for echoing `log(...)` lines through tracing.
pub fn echo_log_default() -> bool {
    static ECHO: OnceLock<bool> = OnceLock::new();
    *ECHO.get_or_init(|| env_true("RILL_ECHO_LOG").unwrap_or(false))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterOptions {
    /// Nested call limit before a run aborts with a Runtime Error.
    pub max_call_depth: usize,
    pub memoize: bool,
    /// Upper bound on scheduler task slices per run. Guards against
    /// runaway programs; it is not a timeout.
    pub max_scheduler_steps: usize,
    pub echo_log: bool,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 512,
            memoize: true,
            max_scheduler_steps: 1_000_000,
            echo_log: false,
        }
    }
}

impl InterpreterOptions {
    /// Defaults overlaid with `RILL_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_call_depth: env_number("RILL_MAX_CALL_DEPTH").unwrap_or(defaults.max_call_depth),
            memoize: env_true("RILL_MEMOIZE").unwrap_or(defaults.memoize),
            max_scheduler_steps: env_number("RILL_MAX_STEPS")
                .unwrap_or(defaults.max_scheduler_steps),
            echo_log: echo_log_default(),
        }
    }

    pub fn with_memoize(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}
