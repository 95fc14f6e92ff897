//! Entry points that reach the add-on.
//!
//! Pointers passed by the host are trusted to be null or valid for the
//! duration of the call.

#![allow(non_snake_case)]
#![allow(clippy::not_unsafe_ptr_arg_deref)]

use std::collections::{HashMap, HashSet};
use std::ffi::{c_char, c_int, c_longlong, c_uint, CString};
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{error, warn};

use pvrpy_core::{config, logging, AddonStatus, CallToken, PvrAddon, PvrError};

use crate::abi::{
    c_string, fixed, read_fixed, PvrAddonCapabilities, PvrChannel, PvrChannelGroup, PvrProperties,
    PvrSignalStatus, TimeT,
};
use crate::host::{CallbackHost, HostCallbacks};
use crate::{call, current, guarded, install, take};

pub const PVR_API_VERSION: &std::ffi::CStr = c"5.2.1";
pub const MIN_PVR_API_VERSION: &std::ffi::CStr = c"4.1.0";
pub const GUI_API_VERSION: &std::ffi::CStr = c"";
pub const MIN_GUI_API_VERSION: &std::ffi::CStr = c"";

/// Every string each backend getter has returned.
///
/// Entries are never freed, so a returned pointer stays valid after the
/// getter runs again. Repeated values share one entry.
static STRINGS: Lazy<Mutex<HashMap<&'static str, HashSet<CString>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn cached(getter: &'static str, text: String) -> *const c_char {
    let text = c_string(&text);
    let mut strings = STRINGS.lock();
    let seen = strings.entry(getter).or_default();
    if let Some(kept) = seen.get(&text) {
        return kept.as_ptr();
    }
    let ptr = text.as_ptr();
    seen.insert(text);
    ptr
}

fn token(handle: *mut std::ffi::c_void) -> CallToken {
    CallToken::new(handle as usize)
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn ADDON_Create(hdl: *const HostCallbacks, props: *const PvrProperties) -> c_int {
    guarded("ADDON_Create", AddonStatus::PermanentFailure.code(), || unsafe {
        let Some(props) = props.as_ref() else {
            return AddonStatus::Unknown.code();
        };
        if let Some(previous) = take() {
            previous.destroy();
        }

        let host = match CallbackHost::register(hdl) {
            Ok(host) => Arc::new(host),
            Err(e) => {
                error!("{}", e);
                return AddonStatus::PermanentFailure.code();
            }
        };

        let config = props.to_config();
        let loaded = config::load_settings(&config);
        let settings = loaded.as_ref().cloned().unwrap_or_default();
        logging::init_tracing(&settings.logging, Some(Path::new(&config.user_path)));
        logging::attach_host(host.clone());
        if let Err(e) = &loaded {
            warn!(
                "Using default bridge settings, {} unusable: {}",
                config.settings_path().display(),
                e
            );
        }

        let addon = Arc::new(PvrAddon::create(host, &config, &settings.runtime));
        let status = addon.status();
        install(addon);
        status.code()
    })
}

#[no_mangle]
pub extern "C" fn ADDON_GetStatus() -> c_int {
    guarded("ADDON_GetStatus", AddonStatus::Unknown.code(), || {
        current()
            .map(|addon| addon.status())
            .unwrap_or_default()
            .code()
    })
}

#[no_mangle]
pub extern "C" fn ADDON_Destroy() {
    guarded("ADDON_Destroy", (), || {
        if let Some(addon) = take() {
            addon.destroy();
        }
        logging::detach_host();
    })
}

#[no_mangle]
pub extern "C" fn ADDON_HasSettings() -> bool {
    true
}

#[no_mangle]
pub extern "C" fn ADDON_GetSettings(_settings: *mut *mut std::ffi::c_void) -> c_uint {
    0
}

#[no_mangle]
pub extern "C" fn ADDON_SetSetting(_name: *const c_char, _value: *const std::ffi::c_void) -> c_int {
    AddonStatus::Ok.code()
}

#[no_mangle]
pub extern "C" fn ADDON_Stop() {}

#[no_mangle]
pub extern "C" fn ADDON_FreeSettings() {}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn GetPVRAPIVersion() -> *const c_char {
    PVR_API_VERSION.as_ptr()
}

#[no_mangle]
pub extern "C" fn GetMininumPVRAPIVersion() -> *const c_char {
    MIN_PVR_API_VERSION.as_ptr()
}

#[no_mangle]
pub extern "C" fn GetGUIAPIVersion() -> *const c_char {
    GUI_API_VERSION.as_ptr()
}

#[no_mangle]
pub extern "C" fn GetMininumGUIAPIVersion() -> *const c_char {
    MIN_GUI_API_VERSION.as_ptr()
}

#[no_mangle]
pub extern "C" fn GetAddonCapabilities(capabilities: *mut PvrAddonCapabilities) -> c_int {
    call("GetAddonCapabilities", |addon| {
        let (code, caps) = addon.get_addon_capabilities()?;
        if let Some(out) = unsafe { capabilities.as_mut() } {
            *out = caps.into();
        }
        Ok(code)
    })
    .code()
}

#[no_mangle]
pub extern "C" fn GetBackendName() -> *const c_char {
    cached("GetBackendName", call("GetBackendName", PvrAddon::backend_name))
}

#[no_mangle]
pub extern "C" fn GetBackendVersion() -> *const c_char {
    cached("GetBackendVersion", call("GetBackendVersion", PvrAddon::backend_version))
}

#[no_mangle]
pub extern "C" fn GetBackendHostname() -> *const c_char {
    cached("GetBackendHostname", call("GetBackendHostname", PvrAddon::backend_hostname))
}

#[no_mangle]
pub extern "C" fn GetConnectionString() -> *const c_char {
    cached("GetConnectionString", call("GetConnectionString", PvrAddon::connection_string))
}

#[no_mangle]
pub extern "C" fn GetDriveSpace(total: *mut c_longlong, used: *mut c_longlong) -> c_int {
    call("GetDriveSpace", |addon| {
        let (code, space) = addon.get_drive_space()?;
        unsafe {
            if let Some(total) = total.as_mut() {
                *total = space.total;
            }
            if let Some(used) = used.as_mut() {
                *used = space.used;
            }
        }
        Ok(code)
    })
    .code()
}

#[no_mangle]
pub extern "C" fn SignalStatus(status: *mut PvrSignalStatus) -> c_int {
    guarded("SignalStatus", PvrError::Failed.code(), || {
        if let Some(status) = unsafe { status.as_mut() } {
            status.adapter_status = fixed("OK");
        }
        PvrError::NoError.code()
    })
}

// ---------------------------------------------------------------------------
// Enumeration
// ---------------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn GetChannels(handle: *mut std::ffi::c_void, radio: bool) -> c_int {
    call("GetChannels", |addon| addon.get_channels(token(handle), radio)).code()
}

#[no_mangle]
pub extern "C" fn GetChannelGroups(handle: *mut std::ffi::c_void, radio: bool) -> c_int {
    call("GetChannelGroups", |addon| addon.get_channel_groups(token(handle), radio)).code()
}

#[no_mangle]
pub extern "C" fn GetChannelGroupMembers(
    handle: *mut std::ffi::c_void,
    group: *const PvrChannelGroup,
) -> c_int {
    call("GetChannelGroupMembers", |addon| {
        let Some(group) = (unsafe { group.as_ref() }) else {
            return Ok(PvrError::InvalidParameters);
        };
        addon.get_channel_group_members(token(handle), &read_fixed(&group.group_name))
    })
    .code()
}

#[no_mangle]
pub extern "C" fn GetTimers(handle: *mut std::ffi::c_void) -> c_int {
    call("GetTimers", |addon| addon.get_timers(token(handle))).code()
}

#[no_mangle]
pub extern "C" fn GetRecordings(handle: *mut std::ffi::c_void, deleted: bool) -> c_int {
    call("GetRecordings", |addon| addon.get_recordings(token(handle), deleted)).code()
}

#[no_mangle]
pub extern "C" fn GetEPGForChannel(
    handle: *mut std::ffi::c_void,
    channel: *const PvrChannel,
    start: TimeT,
    end: TimeT,
) -> c_int {
    call("GetEPGForChannel", |addon| {
        let Some(channel) = (unsafe { channel.as_ref() }) else {
            return Ok(PvrError::InvalidParameters);
        };
        addon.get_epg_for_channel(token(handle), channel.unique_id, start, end)
    })
    .code()
}

#[no_mangle]
pub extern "C" fn GetChannelsAmount() -> c_int {
    call("GetChannelsAmount", PvrAddon::channels_amount)
}

#[no_mangle]
pub extern "C" fn GetTimersAmount() -> c_int {
    call("GetTimersAmount", PvrAddon::timers_amount)
}

#[no_mangle]
pub extern "C" fn GetRecordingsAmount(deleted: bool) -> c_int {
    call("GetRecordingsAmount", |addon| addon.recordings_amount(deleted))
}

// ---------------------------------------------------------------------------
// Live stream
// ---------------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn OpenLiveStream(channel: *const PvrChannel) -> bool {
    call("OpenLiveStream", |addon| match unsafe { channel.as_ref() } {
        Some(channel) => addon.open_live_stream(channel.unique_id),
        None => Ok(false),
    })
}

#[no_mangle]
pub extern "C" fn ReadLiveStream(buf: *mut u8, size: c_uint) -> c_int {
    call("ReadLiveStream", |addon| {
        if buf.is_null() {
            return Ok(-1);
        }
        let buf = unsafe { std::slice::from_raw_parts_mut(buf, size as usize) };
        addon.read_live_stream(buf).map(|n| n as c_int)
    })
}

#[no_mangle]
pub extern "C" fn SeekLiveStream(position: c_longlong, whence: c_int) -> c_longlong {
    call("SeekLiveStream", |addon| addon.seek_live_stream(position, whence))
}

#[no_mangle]
pub extern "C" fn PositionLiveStream() -> c_longlong {
    call("PositionLiveStream", PvrAddon::position_live_stream)
}

#[no_mangle]
pub extern "C" fn LengthLiveStream() -> c_longlong {
    call("LengthLiveStream", PvrAddon::length_live_stream)
}

#[no_mangle]
pub extern "C" fn CloseLiveStream() {
    call("CloseLiveStream", PvrAddon::close_live_stream)
}

#[no_mangle]
pub extern "C" fn CanPauseStream() -> bool {
    call("CanPauseStream", PvrAddon::can_pause_stream)
}

#[no_mangle]
pub extern "C" fn CanSeekStream() -> bool {
    call("CanSeekStream", PvrAddon::can_seek_stream)
}

#[no_mangle]
pub extern "C" fn SwitchChannel(channel: *const PvrChannel) -> bool {
    call("SwitchChannel", |addon| match unsafe { channel.as_ref() } {
        Some(channel) => addon.switch_channel(channel.unique_id),
        None => Ok(false),
    })
}
