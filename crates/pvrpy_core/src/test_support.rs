//! Shared helpers for the crate's tests.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};
use pyo3::prelude::*;

use crate::host::{CallToken, HostLogLevel, HostSink, NativeFile, NativeIo};
use crate::records::TransferEntry;

static SERIAL: Mutex<()> = parking_lot::const_mutex(());

/// Tests touching process-wide state (`sys.modules`, the log target) hold this.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock()
}

/// Run `f` with the interpreter lock held.
pub fn with_python<F, R>(f: F) -> R
where
    F: for<'py> FnOnce(Python<'py>) -> R,
{
    pyo3::prepare_freethreaded_python();
    Python::with_gil(f)
}

/// Write `<name>.py` into `dir`.
pub fn write_module(dir: &Path, name: &str, source: &str) {
    fs::write(dir.join(format!("{}.py", name)), source).unwrap();
}

/// Host double recording everything the bridge hands it.
#[derive(Default)]
pub struct MockHost {
    logs: Mutex<Vec<(HostLogLevel, String)>>,
    transfers: Mutex<Vec<(CallToken, TransferEntry)>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    open: Mutex<HashMap<usize, (Vec<u8>, i64)>>,
    native_calls: Mutex<Vec<&'static str>>,
    next_handle: AtomicUsize,
}

impl MockHost {
    /// Make `path` openable through native I/O.
    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.files.lock().insert(path.to_string(), data.to_vec());
        self
    }

    pub fn logs(&self) -> Vec<(HostLogLevel, String)> {
        self.logs.lock().clone()
    }

    pub fn transfers(&self) -> Vec<(CallToken, TransferEntry)> {
        self.transfers.lock().clone()
    }

    pub fn native_calls(&self) -> Vec<&'static str> {
        self.native_calls.lock().clone()
    }

    pub fn open_files(&self) -> usize {
        self.open.lock().len()
    }

    fn record(&self, call: &'static str) {
        self.native_calls.lock().push(call);
    }
}

impl HostSink for MockHost {
    fn log(&self, level: HostLogLevel, message: &str) {
        self.logs.lock().push((level, message.to_string()));
    }

    fn transfer(&self, token: CallToken, entry: &TransferEntry) {
        self.transfers.lock().push((token, entry.clone()));
    }
}

impl NativeIo for MockHost {
    fn open_file(&self, path: &str) -> Option<NativeFile> {
        self.record("open");
        let data = self.files.lock().get(path).cloned()?;
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        self.open.lock().insert(handle, (data, 0));
        Some(NativeFile::new(handle))
    }

    fn read_file(&self, file: NativeFile, buf: &mut [u8]) -> i64 {
        self.record("read");
        let mut open = self.open.lock();
        let Some((data, pos)) = open.get_mut(&file.raw()) else {
            return -1;
        };
        let start = (*pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        *pos += n as i64;
        n as i64
    }

    fn seek_file(&self, file: NativeFile, position: i64, whence: i32) -> i64 {
        self.record("seek");
        let mut open = self.open.lock();
        let Some((data, pos)) = open.get_mut(&file.raw()) else {
            return -1;
        };
        let target = match whence {
            0 => position,
            1 => *pos + position,
            2 => data.len() as i64 + position,
            _ => return -1,
        };
        if target < 0 {
            return -1;
        }
        *pos = target;
        target
    }

    fn file_position(&self, file: NativeFile) -> i64 {
        self.record("position");
        self.open.lock().get(&file.raw()).map_or(-1, |(_, pos)| *pos)
    }

    fn file_length(&self, file: NativeFile) -> i64 {
        self.record("length");
        self.open
            .lock()
            .get(&file.raw())
            .map_or(-1, |(data, _)| data.len() as i64)
    }

    fn close_file(&self, file: NativeFile) {
        self.record("close");
        self.open.lock().remove(&file.raw());
    }
}
