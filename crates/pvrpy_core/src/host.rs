//! The host side of the bridge, as seen from the core.
//!
//! The ABI crate implements [`HostServices`] over the host's function
//! table; tests implement it with a recording mock.

use crate::records::TransferEntry;

/// Severity accepted by the host log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum HostLogLevel {
    Debug = 0,
    Info = 1,
    Notice = 2,
    Error = 3,
}

impl HostLogLevel {
    /// Map a tracing level onto the host's coarser scale.
    pub fn from_tracing(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Notice,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

/// Identifies the host enumeration call that transfers are attributed to.
///
/// Opaque to the bridge: it is whatever handle the host passed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallToken(usize);

impl CallToken {
    pub fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

/// A file opened by the host's native I/O layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeFile(usize);

impl NativeFile {
    pub fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

/// Ingestion and logging sinks of the host.
pub trait HostSink: Send + Sync {
    /// Emit a log line.
    fn log(&self, level: HostLogLevel, message: &str);

    /// Push one transfer record into the sink matching its kind.
    fn transfer(&self, token: CallToken, entry: &TransferEntry);
}

/// The host's native file I/O.
pub trait NativeIo: Send + Sync {
    /// Open `path` for reading. `None` when the host cannot open it.
    fn open_file(&self, path: &str) -> Option<NativeFile>;

    fn read_file(&self, file: NativeFile, buf: &mut [u8]) -> i64;

    fn seek_file(&self, file: NativeFile, position: i64, whence: i32) -> i64;

    fn file_position(&self, file: NativeFile) -> i64;

    fn file_length(&self, file: NativeFile) -> i64;

    fn close_file(&self, file: NativeFile);
}

/// Everything the bridge needs from the host.
pub trait HostServices: HostSink + NativeIo {}

impl<T: HostSink + NativeIo + ?Sized> HostServices for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_levels_map_onto_host_levels() {
        assert_eq!(HostLogLevel::from_tracing(&tracing::Level::TRACE), HostLogLevel::Debug);
        assert_eq!(HostLogLevel::from_tracing(&tracing::Level::DEBUG), HostLogLevel::Debug);
        assert_eq!(HostLogLevel::from_tracing(&tracing::Level::INFO), HostLogLevel::Info);
        assert_eq!(HostLogLevel::from_tracing(&tracing::Level::WARN), HostLogLevel::Notice);
        assert_eq!(HostLogLevel::from_tracing(&tracing::Level::ERROR), HostLogLevel::Error);
    }

    #[test]
    fn tokens_keep_raw_value() {
        assert_eq!(CallToken::new(0xdead).raw(), 0xdead);
        assert_eq!(NativeFile::new(7).raw(), 7);
    }
}
