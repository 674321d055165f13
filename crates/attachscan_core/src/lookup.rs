use anyhow::Result;
use tracing::{debug, warn};

/// Outcome of a best-effort remote lookup.
///
/// Transport failures, error statuses and malformed payloads all collapse into
/// `Empty`; callers treat that as "no data" and keep going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Data(T),
    Empty,
}

impl<T> Lookup<T> {
    /// Convert a fallible call into a lookup, logging the discarded error.
    pub fn from_result(result: Result<T>, what: &str) -> Self {
        match result {
            Ok(value) => Self::Data(value),
            Err(error) => {
                warn!("{what}: no data ({error:#})");
                Self::Empty
            }
        }
    }

    /// Like `from_result`, for lookups where no data is an expected answer;
    /// the discarded error is only logged at debug level.
    pub fn from_optional_result(result: Result<T>, what: &str) -> Self {
        match result {
            Ok(value) => Self::Data(value),
            Err(error) => {
                debug!("{what}: no data ({error:#})");
                Self::Empty
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Data(value) => Some(value),
            Self::Empty => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Data(value) => Lookup::Data(f(value)),
            Self::Empty => Lookup::Empty,
        }
    }

    pub fn unwrap_or_default(self) -> T
    where
        T: Default,
    {
        self.into_option().unwrap_or_default()
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Data(value),
            None => Self::Empty,
        }
    }
}

/// Run `body` under a scoped subscriber and return everything it logged.
#[cfg(test)]
pub(crate) fn capture_logs<R>(filter: &str, body: impl FnOnce() -> R) -> (R, String) {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .map_err(|_| io::Error::other("log buffer poisoned"))?
                .extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, body);
    let output = String::from_utf8_lossy(&buffer.0.lock().expect("log buffer")).into_owned();
    (result, output)
}
