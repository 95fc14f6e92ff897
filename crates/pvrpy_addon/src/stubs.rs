//! Host API the add-on does not implement.
//!
//! These return a fixed value and never reach the add-on.

#![allow(non_snake_case)]

use std::ffi::{c_char, c_int, c_uint};

use pvrpy_core::PvrError;

use crate::abi::{
    DemuxPacket, PvrChannel, PvrEdlEntry, PvrMenuHook, PvrMenuHookData, PvrRecording,
    PvrStreamProperties, PvrTimer, PvrTimerType, TimeT,
};

const NOT_IMPLEMENTED: c_int = PvrError::NotImplemented as c_int;

// Channels and timers

#[no_mangle]
pub extern "C" fn GetTimerTypes(_types: *mut PvrTimerType, _size: *mut c_int) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn GetStreamProperties(_properties: *mut PvrStreamProperties) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn OpenDialogChannelScan() -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn CallMenuHook(_hook: *const PvrMenuHook, _item: *const PvrMenuHookData) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn DeleteChannel(_channel: *const PvrChannel) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn RenameChannel(_channel: *const PvrChannel) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn MoveChannel(_channel: *const PvrChannel) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn OpenDialogChannelSettings(_channel: *const PvrChannel) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn OpenDialogChannelAdd(_channel: *const PvrChannel) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn GetChannelGroupsAmount() -> c_int {
    -1
}

#[no_mangle]
pub extern "C" fn AddTimer(_timer: *const PvrTimer) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn DeleteTimer(_timer: *const PvrTimer, _force: bool) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn UpdateTimer(_timer: *const PvrTimer) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn SetEPGTimeFrame(_days: c_int) -> c_int {
    NOT_IMPLEMENTED
}

// Recordings

#[no_mangle]
pub extern "C" fn DeleteRecording(_recording: *const PvrRecording) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn UndeleteRecording(_recording: *const PvrRecording) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn DeleteAllRecordingsFromTrash() -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn RenameRecording(_recording: *const PvrRecording) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn SetRecordingPlayCount(_recording: *const PvrRecording, _count: c_int) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn SetRecordingLastPlayedPosition(
    _recording: *const PvrRecording,
    _position: c_int,
) -> c_int {
    NOT_IMPLEMENTED
}

#[no_mangle]
pub extern "C" fn GetRecordingLastPlayedPosition(_recording: *const PvrRecording) -> c_int {
    -1
}

#[no_mangle]
pub extern "C" fn GetRecordingEdl(
    _recording: *const PvrRecording,
    _entries: *mut PvrEdlEntry,
    _size: *mut c_int,
) -> c_int {
    NOT_IMPLEMENTED
}

// Recorded stream

#[no_mangle]
pub extern "C" fn OpenRecordedStream(_recording: *const PvrRecording) -> bool {
    false
}

#[no_mangle]
pub extern "C" fn CloseRecordedStream() {}

#[no_mangle]
pub extern "C" fn ReadRecordedStream(_buf: *mut u8, _size: c_uint) -> c_int {
    0
}

#[no_mangle]
pub extern "C" fn SeekRecordedStream(_position: i64, _whence: c_int) -> i64 {
    0
}

#[no_mangle]
pub extern "C" fn PositionRecordedStream() -> i64 {
    -1
}

#[no_mangle]
pub extern "C" fn LengthRecordedStream() -> i64 {
    0
}

// Live stream extras and demuxing

#[no_mangle]
pub extern "C" fn GetLiveStreamURL(_channel: *const PvrChannel) -> *const c_char {
    c"".as_ptr()
}

#[no_mangle]
pub extern "C" fn GetChannelSwitchDelay() -> c_uint {
    0
}

#[no_mangle]
pub extern "C" fn PauseStream(_paused: bool) {}

#[no_mangle]
pub extern "C" fn SetSpeed(_speed: c_int) {}

#[no_mangle]
pub extern "C" fn SeekTime(_time: f64, _backwards: bool, _start_pts: *mut f64) -> bool {
    false
}

#[no_mangle]
pub extern "C" fn IsTimeshifting() -> bool {
    false
}

#[no_mangle]
pub extern "C" fn IsRealTimeStream() -> bool {
    true
}

#[no_mangle]
pub extern "C" fn GetPlayingTime() -> TimeT {
    0
}

#[no_mangle]
pub extern "C" fn GetBufferTimeStart() -> TimeT {
    0
}

#[no_mangle]
pub extern "C" fn GetBufferTimeEnd() -> TimeT {
    0
}

#[no_mangle]
pub extern "C" fn DemuxRead() -> *mut DemuxPacket {
    std::ptr::null_mut()
}

#[no_mangle]
pub extern "C" fn DemuxReset() {}

#[no_mangle]
pub extern "C" fn DemuxAbort() {}

#[no_mangle]
pub extern "C" fn DemuxFlush() {}

// Power management

#[no_mangle]
pub extern "C" fn OnSystemSleep() {}

#[no_mangle]
pub extern "C" fn OnSystemWake() {}

#[no_mangle]
pub extern "C" fn OnPowerSavingActivated() {}

#[no_mangle]
pub extern "C" fn OnPowerSavingDeactivated() {}

#[cfg(test)]
mod tests {
    use std::ptr::{null, null_mut};

    use super::*;
    use crate::abi::c_text;

    #[test]
    fn mutations_are_not_implemented() {
        let codes = [
            GetTimerTypes(null_mut(), null_mut()),
            GetStreamProperties(null_mut()),
            OpenDialogChannelScan(),
            CallMenuHook(null(), null()),
            DeleteChannel(null()),
            RenameChannel(null()),
            MoveChannel(null()),
            OpenDialogChannelSettings(null()),
            OpenDialogChannelAdd(null()),
            AddTimer(null()),
            DeleteTimer(null(), true),
            UpdateTimer(null()),
            SetEPGTimeFrame(7),
            DeleteRecording(null()),
            UndeleteRecording(null()),
            DeleteAllRecordingsFromTrash(),
            RenameRecording(null()),
            SetRecordingPlayCount(null(), 1),
            SetRecordingLastPlayedPosition(null(), 10),
            GetRecordingEdl(null(), null_mut(), null_mut()),
        ];
        assert!(codes.iter().all(|&code| code == PvrError::NotImplemented.code()));
    }

    #[test]
    fn recorded_stream_is_neutral() {
        assert!(!OpenRecordedStream(null()));
        assert_eq!(ReadRecordedStream(null_mut(), 188), 0);
        assert_eq!(SeekRecordedStream(100, 0), 0);
        assert_eq!(PositionRecordedStream(), -1);
        assert_eq!(LengthRecordedStream(), 0);
        assert_eq!(GetRecordingLastPlayedPosition(null()), -1);
        CloseRecordedStream();
    }

    #[test]
    fn live_stream_extras_are_neutral() {
        assert_eq!(GetChannelGroupsAmount(), -1);
        assert_eq!(unsafe { c_text(GetLiveStreamURL(null())) }, "");
        assert_eq!(GetChannelSwitchDelay(), 0);
        assert!(!SeekTime(1.0, false, null_mut()));
        assert!(!IsTimeshifting());
        assert!(IsRealTimeStream());
        assert_eq!(GetPlayingTime(), 0);
        assert_eq!(GetBufferTimeStart(), 0);
        assert_eq!(GetBufferTimeEnd(), 0);
        assert!(DemuxRead().is_null());
        DemuxReset();
        DemuxAbort();
        DemuxFlush();
        PauseStream(true);
        SetSpeed(1000);
        OnSystemSleep();
        OnSystemWake();
        OnPowerSavingActivated();
        OnPowerSavingDeactivated();
    }
}
