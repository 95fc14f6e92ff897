//! The callback surface the implementation calls back into.
//!
//! Registered as the importable module `bridge`. Every function takes one
//! structured argument, validates it against its record contract, and
//! pushes the typed record into the host sink of the enumeration call in
//! progress. Nothing is ever raised back into Python: a record that does
//! not match its contract, or arrives outside an enumeration call, is
//! logged and dropped, and the function returns `None`.

use std::sync::Arc;

use parking_lot::Mutex;
use pyo3::prelude::*;
use tracing::{error, warn};

use crate::host::{CallToken, HostLogLevel, HostServices};
use crate::marshal::{text_value, FieldReader};
use crate::records::{
    ChannelEntry, ChannelGroup, ChannelGroupMember, EpgEntry, RecordingEntry, TimerEntry,
    TransferRecord,
};

/// Name under which the surface is importable.
pub const MODULE_NAME: &str = "bridge";

/// The enumeration call that transfers are currently attributed to.
///
/// Set only while an enumeration holds the gate. Any thread may transfer
/// during that window, including workers the implementation starts and
/// joins inside the call.
#[derive(Debug, Default)]
pub struct CallScope {
    active: Mutex<Option<CallToken>>,
}

impl CallScope {
    /// Attribute transfers to `token` until the guard drops.
    pub fn enter(&self, token: CallToken) -> ScopeGuard<'_> {
        *self.active.lock() = Some(token);
        ScopeGuard { scope: self }
    }

    /// The token of the active enumeration, if any.
    pub fn current(&self) -> Option<CallToken> {
        *self.active.lock()
    }
}

/// Clears the call scope on drop.
pub struct ScopeGuard<'a> {
    scope: &'a CallScope,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.scope.active.lock().take();
    }
}

/// The `bridge` module object seen by the implementation.
#[pyclass(frozen, name = "bridge", module = "bridge")]
pub struct BridgeSurface {
    host: Arc<dyn HostServices>,
    scope: Arc<CallScope>,
}

impl BridgeSurface {
    pub fn new(host: Arc<dyn HostServices>, scope: Arc<CallScope>) -> Self {
        Self { host, scope }
    }

    fn push<R: TransferRecord>(&self, value: &Bound<'_, PyAny>) {
        let record = match R::read(&FieldReader::new(value, R::KIND)) {
            Ok(record) => record,
            Err(e) => {
                error!("Dropping {}: {}", R::KIND, e);
                return;
            }
        };
        match self.scope.current() {
            Some(token) => self.host.transfer(token, &record.into_entry()),
            None => warn!("Dropping {} made outside an enumeration call", R::KIND),
        }
    }

    fn forward_log(&self, text: &Bound<'_, PyAny>) {
        match text_value(text) {
            Some(line) => self.host.log(HostLogLevel::Debug, &line),
            None => error!("Dropping log message: argument must be a string"),
        }
    }
}

#[pymethods]
impl BridgeSurface {
    #[pyo3(name = "LogMessage")]
    fn log_message(&self, text: &Bound<'_, PyAny>) {
        self.forward_log(text);
    }

    #[pyo3(name = "TransferChannelEntry")]
    fn transfer_channel_entry(&self, entry: &Bound<'_, PyAny>) {
        self.push::<ChannelEntry>(entry);
    }

    #[pyo3(name = "TransferChannelGroup")]
    fn transfer_channel_group(&self, group: &Bound<'_, PyAny>) {
        self.push::<ChannelGroup>(group);
    }

    #[pyo3(name = "TransferChannelGroupMember")]
    fn transfer_channel_group_member(&self, member: &Bound<'_, PyAny>) {
        self.push::<ChannelGroupMember>(member);
    }

    #[pyo3(name = "TransferTimerEntry")]
    fn transfer_timer_entry(&self, timer: &Bound<'_, PyAny>) {
        self.push::<TimerEntry>(timer);
    }

    #[pyo3(name = "TransferRecordingEntry")]
    fn transfer_recording_entry(&self, recording: &Bound<'_, PyAny>) {
        self.push::<RecordingEntry>(recording);
    }

    #[pyo3(name = "TransferEpgEntry")]
    fn transfer_epg_entry(&self, tag: &Bound<'_, PyAny>) {
        self.push::<EpgEntry>(tag);
    }

    // Names used by existing implementations.

    #[pyo3(name = "XBMC_Log")]
    fn legacy_log(&self, text: &Bound<'_, PyAny>) {
        self.forward_log(text);
    }

    #[pyo3(name = "PVR_TransferChannelEntry")]
    fn legacy_channel_entry(&self, entry: &Bound<'_, PyAny>) {
        self.push::<ChannelEntry>(entry);
    }

    #[pyo3(name = "PVR_TransferChannelGroup")]
    fn legacy_channel_group(&self, group: &Bound<'_, PyAny>) {
        self.push::<ChannelGroup>(group);
    }

    #[pyo3(name = "PVR_TransferChannelGroupMember")]
    fn legacy_channel_group_member(&self, member: &Bound<'_, PyAny>) {
        self.push::<ChannelGroupMember>(member);
    }

    #[pyo3(name = "PVR_TransferTimerEntry")]
    fn legacy_timer_entry(&self, timer: &Bound<'_, PyAny>) {
        self.push::<TimerEntry>(timer);
    }

    #[pyo3(name = "PVR_TransferRecordingEntry")]
    fn legacy_recording_entry(&self, recording: &Bound<'_, PyAny>) {
        self.push::<RecordingEntry>(recording);
    }

    #[pyo3(name = "PVR_TransferEpgEntry")]
    fn legacy_epg_entry(&self, tag: &Bound<'_, PyAny>) {
        self.push::<EpgEntry>(tag);
    }
}

/// Make `surface` importable as `bridge`.
pub fn install(py: Python<'_>, surface: BridgeSurface) -> PyResult<()> {
    let surface = Bound::new(py, surface)?;
    py.import("sys")?
        .getattr("modules")?
        .set_item(MODULE_NAME, surface)
}

/// Remove the `bridge` module again. Absent is fine.
pub fn uninstall(py: Python<'_>) -> PyResult<()> {
    let modules = py.import("sys")?.getattr("modules")?;
    if modules.contains(MODULE_NAME)? {
        modules.del_item(MODULE_NAME)?;
    }
    Ok(())
}
