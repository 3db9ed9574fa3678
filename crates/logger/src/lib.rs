use std::sync::Mutex;

pub trait Logger: Clone {
    fn log(&self, message: impl Into<String>);
    fn warn(&self, message: impl Into<String>) {
        self.log(format!("WARN: {}", message.into()));
    }
    fn error(&self, message: impl Into<String>) {
        self.log(format!("ERROR: {}", message.into()));
    }
}

impl<T: Logger> Logger for &T {
    fn log(&self, message: impl Into<String>) {
        (*self).log(message);
    }
}

/// Logs a formatted message, but only when verbose logging was requested
/// through the environment (`BUNDLE_LOG_DEBUG=1`).
#[macro_export]
macro_rules! debug_logf {
    ($logger:expr, $($arg:tt)*) => {
        if ::std::env::var_os("BUNDLE_LOG_DEBUG").is_some() {
            $crate::Logger::log(&$logger, format!($($arg)*));
        }
    };
}

/// Logger for interactive use. Messages are prefixed with the time since
/// the logger was created, so slow pipeline stages show up in the output.
///
/// Progress messages go to stderr; stdout is reserved for emitted code
/// (`--outfile=-`) and metadata JSON.
pub struct StdioLogger {
    zero_time: std::time::Instant,
}
impl Logger for &StdioLogger {
    fn log(&self, message: impl Into<String>) {
        let delta_time = std::time::Instant::now().duration_since(self.zero_time);
        eprintln!("[{:.04}] {}", delta_time.as_secs_f64(), message.into());
    }
}
impl StdioLogger {
    pub fn new() -> Self {
        Self {
            zero_time: std::time::Instant::now(),
        }
    }
}
impl Default for StdioLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// Logger that discards everything. Used by API callers that only want the
/// diagnostics collected on the build result.
#[derive(Clone, Copy, Default)]
pub struct NullLogger;
impl Logger for NullLogger {
    fn log(&self, _message: impl Into<String>) {}
}

/// Logger that buffers messages in memory. Used by tests to assert on
/// warnings without capturing stdio.
#[derive(Default)]
pub struct VecLogger {
    logs: Mutex<Vec<String>>,
}

impl Logger for &VecLogger {
    fn log(&self, message: impl Into<String>) {
        self.logs
            .lock()
            .expect("locking the logger array should not fail!")
            .push(message.into());
    }
}
impl VecLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_logs(self) -> Vec<String> {
        self.logs.into_inner().expect("logger mutex poisoned")
    }
}
