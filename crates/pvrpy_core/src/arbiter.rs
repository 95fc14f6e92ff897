//! The stream arbiter.
//!
//! Decides, per live stream, whether I/O is serviced by the host's native
//! file layer or by the implementation. Holds at most one native file.
//!
//! ```text
//!            open -> Managed(true)
//!   Closed ------------------------> OpenManaged
//!     |  ^                               |
//!     |  +-------- close ----------------+
//!     |  |
//!     |  +-------- close ----------------+
//!     |                                  |
//!     +--- open -> Native(path) ---> OpenNative(file)
//!          and the host opened path
//! ```
//!
//! Every open starts by closing whatever is open, so two native files are
//! never live at once.

use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::host::{NativeFile, NativeIo};

/// What the implementation answered to an open request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenReply {
    /// The implementation serves the stream itself; `false` means the open failed.
    Managed(bool),
    /// The implementation wants the host to read this file natively.
    Native(String),
}

/// One read from the implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedChunk {
    /// The count the implementation reported.
    pub bytes_read: i64,
    pub payload: Vec<u8>,
}

impl ManagedChunk {
    pub fn empty(bytes_read: i64) -> Self {
        Self {
            bytes_read,
            payload: Vec::new(),
        }
    }
}

/// The implementation's live-stream operations.
pub trait ManagedStream {
    fn open(&mut self, channel_uid: u32) -> BridgeResult<OpenReply>;

    /// Ask for up to `size` bytes.
    fn read(&mut self, size: usize) -> BridgeResult<ManagedChunk>;

    fn seek(&mut self, position: i64, whence: i32) -> BridgeResult<i64>;

    fn position(&mut self) -> BridgeResult<i64>;

    fn length(&mut self) -> BridgeResult<i64>;

    fn close(&mut self) -> BridgeResult<()>;

    fn can_pause(&mut self) -> BridgeResult<bool>;

    fn can_seek(&mut self) -> BridgeResult<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Closed,
    OpenNative(NativeFile),
    OpenManaged,
}

/// Owns the live-stream state.
#[derive(Debug, Default)]
pub struct StreamArbiter {
    state: StreamState,
}

impl StreamArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Whether the next call would go to native I/O.
    pub fn is_native(&self) -> bool {
        matches!(self.state, StreamState::OpenNative(_))
    }

    /// Close whatever is open, then open `channel_uid`.
    ///
    /// A native request whose file the host cannot open is reported as
    /// [`BridgeError::NativeIoFailure`]; the implementation is told to close
    /// again so nothing is left open on either side.
    pub fn open<M, N>(&mut self, channel_uid: u32, managed: &mut M, native: &N) -> BridgeResult<bool>
    where
        M: ManagedStream + ?Sized,
        N: NativeIo + ?Sized,
    {
        if let Err(e) = self.close(managed, native) {
            warn!("Closing the previous stream failed: {}", e);
        }

        match managed.open(channel_uid)? {
            OpenReply::Managed(true) => {
                self.state = StreamState::OpenManaged;
                Ok(true)
            }
            OpenReply::Managed(false) => Ok(false),
            OpenReply::Native(path) => match native.open_file(&path) {
                Some(file) => {
                    debug!(path = %path, "Opened stream natively");
                    self.state = StreamState::OpenNative(file);
                    Ok(true)
                }
                None => {
                    warn!(path = %path, "Failed to open stream natively");
                    if let Err(e) = managed.close() {
                        warn!("Closing the abandoned stream failed: {}", e);
                    }
                    Err(BridgeError::NativeIoFailure { path })
                }
            },
        }
    }

    /// Read into `buf`.
    ///
    /// A managed read that reports zero or fewer bytes leaves `buf` untouched
    /// and returns the reported value.
    pub fn read<M, N>(&mut self, buf: &mut [u8], managed: &mut M, native: &N) -> BridgeResult<i64>
    where
        M: ManagedStream + ?Sized,
        N: NativeIo + ?Sized,
    {
        if let StreamState::OpenNative(file) = self.state {
            return Ok(native.read_file(file, buf));
        }

        let chunk = managed.read(buf.len())?;
        if chunk.bytes_read <= 0 {
            return Ok(chunk.bytes_read);
        }
        let n = (chunk.bytes_read as usize)
            .min(chunk.payload.len())
            .min(buf.len());
        buf[..n].copy_from_slice(&chunk.payload[..n]);
        Ok(n as i64)
    }

    pub fn seek<M, N>(&mut self, position: i64, whence: i32, managed: &mut M, native: &N) -> BridgeResult<i64>
    where
        M: ManagedStream + ?Sized,
        N: NativeIo + ?Sized,
    {
        match self.state {
            StreamState::OpenNative(file) => Ok(native.seek_file(file, position, whence)),
            _ => managed.seek(position, whence),
        }
    }

    pub fn position<M, N>(&mut self, managed: &mut M, native: &N) -> BridgeResult<i64>
    where
        M: ManagedStream + ?Sized,
        N: NativeIo + ?Sized,
    {
        match self.state {
            StreamState::OpenNative(file) => Ok(native.file_position(file)),
            _ => managed.position(),
        }
    }

    pub fn length<M, N>(&mut self, managed: &mut M, native: &N) -> BridgeResult<i64>
    where
        M: ManagedStream + ?Sized,
        N: NativeIo + ?Sized,
    {
        match self.state {
            StreamState::OpenNative(file) => Ok(native.file_length(file)),
            _ => managed.length(),
        }
    }

    /// Always ends in [`StreamState::Closed`], whatever the implementation says.
    pub fn close<M, N>(&mut self, managed: &mut M, native: &N) -> BridgeResult<()>
    where
        M: ManagedStream + ?Sized,
        N: NativeIo + ?Sized,
    {
        match std::mem::take(&mut self.state) {
            StreamState::OpenNative(file) => {
                native.close_file(file);
                Ok(())
            }
            StreamState::OpenManaged | StreamState::Closed => managed.close(),
        }
    }

    /// Close an open stream before the context goes away.
    ///
    /// Unlike [`StreamArbiter::close`], a closed arbiter does not call into
    /// the implementation.
    pub fn shutdown<M, N>(&mut self, managed: &mut M, native: &N)
    where
        M: ManagedStream + ?Sized,
        N: NativeIo + ?Sized,
    {
        if self.state == StreamState::Closed {
            return;
        }
        debug!("Force-closing live stream on shutdown");
        if let Err(e) = self.close(managed, native) {
            warn!("Closing the live stream on shutdown failed: {}", e);
        }
    }

    /// Native streams are plain files and can always pause and seek.
    pub fn can_pause<M: ManagedStream + ?Sized>(&self, managed: &mut M) -> BridgeResult<bool> {
        match self.state {
            StreamState::OpenNative(_) => Ok(true),
            _ => managed.can_pause(),
        }
    }

    pub fn can_seek<M: ManagedStream + ?Sized>(&self, managed: &mut M) -> BridgeResult<bool> {
        match self.state {
            StreamState::OpenNative(_) => Ok(true),
            _ => managed.can_seek(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockHost;

    /// Scripted implementation side.
    #[derive(Default)]
    struct Scripted {
        reply: Option<OpenReply>,
        chunk: Option<ManagedChunk>,
        calls: Vec<&'static str>,
    }

    impl Scripted {
        fn replying(reply: OpenReply) -> Self {
            Self {
                reply: Some(reply),
                ..Self::default()
            }
        }
    }

    impl ManagedStream for Scripted {
        fn open(&mut self, _channel_uid: u32) -> BridgeResult<OpenReply> {
            self.calls.push("open");
            self.reply
                .clone()
                .ok_or_else(|| BridgeError::runtime_fault("OpenLiveStream", "scripted fault"))
        }

        fn read(&mut self, _size: usize) -> BridgeResult<ManagedChunk> {
            self.calls.push("read");
            Ok(self.chunk.clone().unwrap_or_else(|| ManagedChunk::empty(0)))
        }

        fn seek(&mut self, position: i64, _whence: i32) -> BridgeResult<i64> {
            self.calls.push("seek");
            Ok(position)
        }

        fn position(&mut self) -> BridgeResult<i64> {
            self.calls.push("position");
            Ok(0)
        }

        fn length(&mut self) -> BridgeResult<i64> {
            self.calls.push("length");
            Ok(0)
        }

        fn close(&mut self) -> BridgeResult<()> {
            self.calls.push("close");
            Ok(())
        }

        fn can_pause(&mut self) -> BridgeResult<bool> {
            self.calls.push("can_pause");
            Ok(false)
        }

        fn can_seek(&mut self) -> BridgeResult<bool> {
            self.calls.push("can_seek");
            Ok(false)
        }
    }

    #[test]
    fn managed_open_and_close() {
        let host = MockHost::default();
        let mut managed = Scripted::replying(OpenReply::Managed(true));
        let mut arbiter = StreamArbiter::new();

        assert!(arbiter.open(5, &mut managed, &host).unwrap());
        assert_eq!(arbiter.state(), StreamState::OpenManaged);

        arbiter.close(&mut managed, &host).unwrap();
        assert_eq!(arbiter.state(), StreamState::Closed);
        assert_eq!(managed.calls, ["close", "open", "close"]);
        assert!(host.native_calls().is_empty());
    }

    #[test]
    fn managed_open_refused_stays_closed() {
        let host = MockHost::default();
        let mut managed = Scripted::replying(OpenReply::Managed(false));
        let mut arbiter = StreamArbiter::new();

        assert!(!arbiter.open(5, &mut managed, &host).unwrap());
        assert_eq!(arbiter.state(), StreamState::Closed);
    }

    #[test]
    fn native_stream_never_reaches_implementation() {
        let host = MockHost::default().with_file("/tmp/s.ts", b"0123456789");
        let mut managed = Scripted::replying(OpenReply::Native("/tmp/s.ts".to_string()));
        let mut arbiter = StreamArbiter::new();

        assert!(arbiter.open(5, &mut managed, &host).unwrap());
        assert!(arbiter.is_native());
        let before = managed.calls.len();

        let mut buf = [0u8; 4];
        assert_eq!(arbiter.read(&mut buf, &mut managed, &host).unwrap(), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(arbiter.seek(2, 1, &mut managed, &host).unwrap(), 6);
        assert_eq!(arbiter.position(&mut managed, &host).unwrap(), 6);
        assert_eq!(arbiter.length(&mut managed, &host).unwrap(), 10);
        assert!(arbiter.can_pause(&mut managed).unwrap());
        assert!(arbiter.can_seek(&mut managed).unwrap());
        arbiter.close(&mut managed, &host).unwrap();

        assert_eq!(managed.calls.len(), before);
        assert_eq!(
            host.native_calls(),
            ["open", "read", "seek", "position", "length", "close"]
        );
        assert_eq!(host.open_files(), 0);
        assert_eq!(arbiter.state(), StreamState::Closed);
    }

    #[test]
    fn native_open_failure_leaves_nothing_open() {
        let host = MockHost::default();
        let mut managed = Scripted::replying(OpenReply::Native("/missing.ts".to_string()));
        let mut arbiter = StreamArbiter::new();

        let err = arbiter.open(5, &mut managed, &host).unwrap_err();
        assert!(matches!(err, BridgeError::NativeIoFailure { ref path } if path == "/missing.ts"));
        assert_eq!(arbiter.state(), StreamState::Closed);
        assert_eq!(managed.calls, ["close", "open", "close"]);
        assert_eq!(host.open_files(), 0);
    }

    #[test]
    fn reopening_closes_the_native_file_first() {
        let host = MockHost::default()
            .with_file("/a.ts", b"aaaa")
            .with_file("/b.ts", b"bbbb");
        let mut arbiter = StreamArbiter::new();

        let mut first = Scripted::replying(OpenReply::Native("/a.ts".to_string()));
        assert!(arbiter.open(1, &mut first, &host).unwrap());
        let mut second = Scripted::replying(OpenReply::Native("/b.ts".to_string()));
        assert!(arbiter.open(2, &mut second, &host).unwrap());

        assert_eq!(host.open_files(), 1);
        assert_eq!(host.native_calls(), ["open", "close", "open"]);
        // The native close replaces the implementation close.
        assert_eq!(second.calls, ["open"]);
    }

    #[test]
    fn open_fault_leaves_closed() {
        let host = MockHost::default().with_file("/a.ts", b"aaaa");
        let mut arbiter = StreamArbiter::new();
        let mut native = Scripted::replying(OpenReply::Native("/a.ts".to_string()));
        arbiter.open(1, &mut native, &host).unwrap();

        let mut faulty = Scripted::default();
        assert!(arbiter.open(2, &mut faulty, &host).unwrap_err().is_runtime_fault());
        assert_eq!(arbiter.state(), StreamState::Closed);
        assert_eq!(host.open_files(), 0);
    }

    #[test]
    fn managed_read_copies_reported_bytes() {
        let host = MockHost::default();
        let mut managed = Scripted::replying(OpenReply::Managed(true));
        let mut arbiter = StreamArbiter::new();
        arbiter.open(5, &mut managed, &host).unwrap();

        managed.chunk = Some(ManagedChunk {
            bytes_read: 3,
            payload: b"abcdef".to_vec(),
        });
        let mut buf = [0u8; 8];
        assert_eq!(arbiter.read(&mut buf, &mut managed, &host).unwrap(), 3);
        assert_eq!(&buf[..4], b"abc\0");
    }

    #[test]
    fn managed_read_of_nothing_leaves_buffer_untouched() {
        let host = MockHost::default();
        let mut managed = Scripted::replying(OpenReply::Managed(true));
        let mut arbiter = StreamArbiter::new();
        arbiter.open(5, &mut managed, &host).unwrap();

        let mut buf = [0xAAu8; 16];
        assert_eq!(arbiter.read(&mut buf, &mut managed, &host).unwrap(), 0);
        assert_eq!(buf, [0xAA; 16]);

        managed.chunk = Some(ManagedChunk::empty(-1));
        assert_eq!(arbiter.read(&mut buf, &mut managed, &host).unwrap(), -1);
        assert_eq!(buf, [0xAA; 16]);
    }

    #[test]
    fn managed_read_never_overruns_buffer() {
        let host = MockHost::default();
        let mut managed = Scripted::default();
        managed.chunk = Some(ManagedChunk {
            bytes_read: 100,
            payload: vec![1; 100],
        });
        let mut arbiter = StreamArbiter::new();

        let mut buf = [0u8; 4];
        assert_eq!(arbiter.read(&mut buf, &mut managed, &host).unwrap(), 4);
        assert_eq!(buf, [1; 4]);
    }

    #[test]
    fn shutdown_only_touches_open_streams() {
        let host = MockHost::default();
        let mut managed = Scripted::replying(OpenReply::Managed(true));
        let mut arbiter = StreamArbiter::new();

        arbiter.shutdown(&mut managed, &host);
        assert!(managed.calls.is_empty());

        arbiter.open(5, &mut managed, &host).unwrap();
        arbiter.shutdown(&mut managed, &host);
        assert_eq!(managed.calls, ["close", "open", "close"]);
        assert_eq!(arbiter.state(), StreamState::Closed);
    }
}
