//! The add-on: one explicitly owned value implementing every core entry point.
//!
//! Lock order is stream arbiter, then gate, then the interpreter lock.
//! Native stream I/O takes only the arbiter lock and never enters the gate.

use std::sync::Arc;

use parking_lot::Mutex;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use tracing::{debug, error, info, warn};

use crate::arbiter::{ManagedChunk, ManagedStream, OpenReply, StreamArbiter};
use crate::callbacks::{BridgeSurface, CallScope};
use crate::config::{AddonConfig, RuntimeSettings};
use crate::error::{AddonStatus, BridgeError, BridgeResult, MarshalError, PvrError};
use crate::gate::{ConcurrencyGate, GateGuard, GateStats};
use crate::host::{CallToken, HostServices};
use crate::marshal::{is_true, settle, to_int, to_text, tuple_items, Narrow};
use crate::runtime::{ExecutionContext, ImplementationStream};

type Context = Option<ExecutionContext>;

/// Support flags reported by `GetAddonCapabilities`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub supports_epg: bool,
    pub supports_tv: bool,
    pub supports_radio: bool,
    pub supports_recordings: bool,
    pub supports_recordings_undelete: bool,
    pub supports_timers: bool,
    pub supports_channel_groups: bool,
    pub supports_channel_scan: bool,
    pub supports_channel_settings: bool,
    pub handles_input_stream: bool,
    pub handles_demuxing: bool,
    pub supports_recording_play_count: bool,
    pub supports_last_played_position: bool,
    pub supports_recording_edl: bool,
}

impl Capabilities {
    /// A missing key reads as false; a present one must be `True`.
    fn read(flags: &Bound<'_, PyDict>) -> Self {
        let flag = |key: &str| {
            flags
                .get_item(key)
                .ok()
                .flatten()
                .is_some_and(|value| is_true(&value))
        };
        Self {
            supports_epg: flag("supportsEPG"),
            supports_tv: flag("supportsTV"),
            supports_radio: flag("supportsRadio"),
            supports_recordings: flag("supportsRecordings"),
            supports_recordings_undelete: flag("supportsRecordingsUndelete"),
            supports_timers: flag("supportsTimers"),
            supports_channel_groups: flag("supportsChannelGroups"),
            supports_channel_scan: flag("supportsChannelScan"),
            supports_channel_settings: flag("supportsChannelSettings"),
            handles_input_stream: flag("handlesInputStream"),
            handles_demuxing: flag("handlesDemuxing"),
            supports_recording_play_count: flag("supportsRecordingPlayCount"),
            supports_last_played_position: flag("supportsLastPlayedPosition"),
            supports_recording_edl: flag("supportsRecordingEdl"),
        }
    }
}

/// Backend storage in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveSpace {
    pub total: i64,
    pub used: i64,
}

/// The bridge between the host ABI and the implementation.
pub struct PvrAddon {
    host: Arc<dyn HostServices>,
    gate: ConcurrencyGate<Context>,
    stream: Mutex<StreamArbiter>,
    scope: Arc<CallScope>,
    status: AddonStatus,
}

impl PvrAddon {
    /// Create the execution context and run the configuration handshake.
    ///
    /// Always returns an add-on; when anything fails the status is
    /// [`AddonStatus::PermanentFailure`] and every entry point reports
    /// [`BridgeError::NotCreated`].
    pub fn create(host: Arc<dyn HostServices>, config: &AddonConfig, settings: &RuntimeSettings) -> Self {
        let mut addon = Self {
            host,
            gate: ConcurrencyGate::new(None),
            stream: Mutex::new(StreamArbiter::new()),
            scope: Arc::new(CallScope::default()),
            status: AddonStatus::Unknown,
        };
        addon.status = addon.start(config, settings).unwrap_or_else(|e| {
            error!("Creating the add-on failed: {}", e);
            AddonStatus::PermanentFailure
        });
        info!(status = ?addon.status, "Add-on created");
        addon
    }

    fn start(&self, config: &AddonConfig, settings: &RuntimeSettings) -> BridgeResult<AddonStatus> {
        pyo3::prepare_freethreaded_python();
        let mut slot = self.gate.enter();
        Python::with_gil(|py| {
            let surface = BridgeSurface::new(Arc::clone(&self.host), Arc::clone(&self.scope));
            let context = ExecutionContext::create(py, config, settings, surface)?;
            match context.handshake(py, config) {
                Ok(status) => {
                    *slot = Some(context);
                    Ok(status)
                }
                Err(e) => {
                    context.teardown(py);
                    Err(e)
                }
            }
        })
    }

    /// Force-close any open stream and tear the execution context down.
    ///
    /// Idempotent; also runs on drop.
    pub fn destroy(&self) {
        let mut arbiter = self.stream.lock();
        let mut slot = self.gate.enter();
        let Some(context) = slot.take() else {
            return;
        };
        Python::with_gil(|py| {
            arbiter.shutdown(&mut context.stream(py), &*self.host);
            context.teardown(py);
        });
        info!("Add-on destroyed");
    }

    /// The status reported by Create.
    pub fn status(&self) -> AddonStatus {
        self.status
    }

    pub fn is_created(&self) -> bool {
        self.gate.enter().is_some()
    }

    pub fn gate_stats(&self) -> GateStats {
        self.gate.stats()
    }

    /// Enter the gate and run `f` against the context.
    fn invoke<R, F>(&self, operation: &'static str, f: F) -> BridgeResult<R>
    where
        F: for<'py> FnOnce(Python<'py>, &ExecutionContext) -> BridgeResult<R>,
    {
        debug!(operation, "entry point");
        let slot = self.gate.enter();
        let context = slot.as_ref().ok_or(BridgeError::NotCreated)?;
        Python::with_gil(|py| f(py, context))
    }

    /// Run an enumeration with `token` as the target of every transfer.
    fn enumerate<F>(&self, token: CallToken, operation: &'static str, call: F) -> BridgeResult<PvrError>
    where
        F: for<'py> FnOnce(&Bound<'py, PyAny>) -> PyResult<Bound<'py, PyAny>>,
    {
        self.invoke(operation, |py, context| {
            let _scope = self.scope.enter(token);
            let reply = settle(py, operation, call(context.instance(py)))?;
            Ok(PvrError::from_code(to_int(operation, &reply)?))
        })
    }

    fn int_query<T: Narrow>(&self, operation: &'static str) -> BridgeResult<T> {
        self.invoke(operation, |py, context| {
            let reply = context.call0(py, operation)?;
            to_int(operation, &reply).map(T::narrow)
        })
    }

    fn text_query(&self, operation: &'static str) -> BridgeResult<String> {
        self.invoke(operation, |py, context| {
            let reply = context.call0(py, operation)?;
            to_text(operation, &reply)
        })
    }

    pub fn get_addon_capabilities(&self) -> BridgeResult<(PvrError, Capabilities)> {
        const OP: &str = "GetAddonCapabilities";
        self.invoke(OP, |py, context| {
            let reply = context.call0(py, OP)?;
            let items = tuple_items(OP, &reply, 2, "(code, dict)")?;
            let code = PvrError::from_code(to_int(OP, &items[0])?);
            let flags = items[1]
                .downcast::<PyDict>()
                .map_err(|_| MarshalError::shape(OP, "(code, dict)"))?;
            Ok((code, Capabilities::read(flags)))
        })
    }

    pub fn backend_name(&self) -> BridgeResult<String> {
        self.text_query("GetBackendName")
    }

    pub fn backend_version(&self) -> BridgeResult<String> {
        self.text_query("GetBackendVersion")
    }

    pub fn backend_hostname(&self) -> BridgeResult<String> {
        self.text_query("GetBackendHostname")
    }

    pub fn connection_string(&self) -> BridgeResult<String> {
        self.text_query("GetConnectionString")
    }

    pub fn get_channels(&self, token: CallToken, radio: bool) -> BridgeResult<PvrError> {
        self.enumerate(token, "_cGetChannels", |instance| {
            instance.call_method1("_cGetChannels", (radio,))
        })
    }

    pub fn get_channel_groups(&self, token: CallToken, radio: bool) -> BridgeResult<PvrError> {
        self.enumerate(token, "_cGetChannelGroups", |instance| {
            instance.call_method1("_cGetChannelGroups", (radio,))
        })
    }

    pub fn get_channel_group_members(&self, token: CallToken, group_name: &str) -> BridgeResult<PvrError> {
        self.enumerate(token, "_cGetChannelGroupMembers", |instance| {
            instance.call_method1("_cGetChannelGroupMembers", (group_name,))
        })
    }

    pub fn get_timers(&self, token: CallToken) -> BridgeResult<PvrError> {
        self.enumerate(token, "_cGetTimers", |instance| instance.call_method0("_cGetTimers"))
    }

    pub fn get_recordings(&self, token: CallToken, deleted: bool) -> BridgeResult<PvrError> {
        self.enumerate(token, "_cGetRecordings", |instance| {
            instance.call_method1("_cGetRecordings", (deleted,))
        })
    }

    pub fn get_epg_for_channel(
        &self,
        token: CallToken,
        channel_uid: u32,
        start: i64,
        end: i64,
    ) -> BridgeResult<PvrError> {
        self.enumerate(token, "_cGetEPGForChannel", |instance| {
            instance.call_method1("_cGetEPGForChannel", (channel_uid, start, end))
        })
    }

    pub fn channels_amount(&self) -> BridgeResult<i32> {
        self.int_query("GetChannelsAmount")
    }

    pub fn timers_amount(&self) -> BridgeResult<i32> {
        self.int_query("GetTimersAmount")
    }

    pub fn recordings_amount(&self, deleted: bool) -> BridgeResult<i32> {
        const OP: &str = "GetRecordingsAmount";
        self.invoke(OP, |py, context| {
            let reply = settle(py, OP, context.instance(py).call_method1(OP, (deleted,)))?;
            to_int(OP, &reply).map(i32::narrow)
        })
    }

    pub fn get_drive_space(&self) -> BridgeResult<(PvrError, DriveSpace)> {
        const OP: &str = "GetDriveSpace";
        self.invoke(OP, |py, context| {
            let reply = context.call0(py, OP)?;
            let items = tuple_items(OP, &reply, 3, "(code, total, used)")?;
            Ok((
                PvrError::from_code(to_int(OP, &items[0])?),
                DriveSpace {
                    total: to_int(OP, &items[1])?,
                    used: to_int(OP, &items[2])?,
                },
            ))
        })
    }

    /// The implementation's stream methods behind the gate, entered on first use.
    fn managed(&self) -> GatedStream<'_> {
        GatedStream {
            gate: &self.gate,
            held: None,
        }
    }

    pub fn open_live_stream(&self, channel_uid: u32) -> BridgeResult<bool> {
        debug!(channel_uid, "OpenLiveStream");
        let mut arbiter = self.stream.lock();
        arbiter.open(channel_uid, &mut self.managed(), &*self.host)
    }

    pub fn read_live_stream(&self, buf: &mut [u8]) -> BridgeResult<i64> {
        let mut arbiter = self.stream.lock();
        arbiter.read(buf, &mut self.managed(), &*self.host)
    }

    pub fn seek_live_stream(&self, position: i64, whence: i32) -> BridgeResult<i64> {
        let mut arbiter = self.stream.lock();
        arbiter.seek(position, whence, &mut self.managed(), &*self.host)
    }

    pub fn position_live_stream(&self) -> BridgeResult<i64> {
        let mut arbiter = self.stream.lock();
        arbiter.position(&mut self.managed(), &*self.host)
    }

    pub fn length_live_stream(&self) -> BridgeResult<i64> {
        let mut arbiter = self.stream.lock();
        arbiter.length(&mut self.managed(), &*self.host)
    }

    pub fn close_live_stream(&self) -> BridgeResult<()> {
        debug!("CloseLiveStream");
        let mut arbiter = self.stream.lock();
        arbiter.close(&mut self.managed(), &*self.host)
    }

    pub fn can_pause_stream(&self) -> BridgeResult<bool> {
        let arbiter = self.stream.lock();
        arbiter.can_pause(&mut self.managed())
    }

    pub fn can_seek_stream(&self) -> BridgeResult<bool> {
        let arbiter = self.stream.lock();
        arbiter.can_seek(&mut self.managed())
    }

    /// Close the current stream, then open `channel_uid`.
    pub fn switch_channel(&self, channel_uid: u32) -> BridgeResult<bool> {
        debug!(channel_uid, "SwitchChannel");
        let mut arbiter = self.stream.lock();
        let mut managed = self.managed();
        if let Err(e) = arbiter.close(&mut managed, &*self.host) {
            warn!("Closing the current stream failed: {}", e);
        }
        arbiter.open(channel_uid, &mut managed, &*self.host)
    }
}

impl Drop for PvrAddon {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Enters the gate the first time the implementation is needed and holds
/// it until dropped, so one entry point takes the gate at most once.
struct GatedStream<'a> {
    gate: &'a ConcurrencyGate<Context>,
    held: Option<GateGuard<'a, Context>>,
}

impl GatedStream<'_> {
    fn with_stream<R, F>(&mut self, f: F) -> BridgeResult<R>
    where
        F: for<'c, 'py> FnOnce(&mut ImplementationStream<'c, 'py>) -> BridgeResult<R>,
    {
        let gate = self.gate;
        let slot = self.held.get_or_insert_with(|| gate.enter());
        let context = (**slot).as_ref().ok_or(BridgeError::NotCreated)?;
        Python::with_gil(|py| f(&mut context.stream(py)))
    }
}

impl ManagedStream for GatedStream<'_> {
    fn open(&mut self, channel_uid: u32) -> BridgeResult<OpenReply> {
        self.with_stream(|stream| stream.open(channel_uid))
    }

    fn read(&mut self, size: usize) -> BridgeResult<ManagedChunk> {
        self.with_stream(|stream| stream.read(size))
    }

    fn seek(&mut self, position: i64, whence: i32) -> BridgeResult<i64> {
        self.with_stream(|stream| stream.seek(position, whence))
    }

    fn position(&mut self) -> BridgeResult<i64> {
        self.with_stream(|stream| stream.position())
    }

    fn length(&mut self) -> BridgeResult<i64> {
        self.with_stream(|stream| stream.length())
    }

    fn close(&mut self) -> BridgeResult<()> {
        self.with_stream(|stream| stream.close())
    }

    fn can_pause(&mut self) -> BridgeResult<bool> {
        self.with_stream(|stream| stream.can_pause())
    }

    fn can_seek(&mut self) -> BridgeResult<bool> {
        self.with_stream(|stream| stream.can_seek())
    }
}
