//! The host callback table and the [`HostServices`] adapter over it.

use std::ffi::{c_char, c_int, c_uint, c_void};

use pvrpy_core::records::TransferEntry;
use pvrpy_core::{BridgeError, BridgeResult, CallToken, HostLogLevel, HostSink, NativeFile, NativeIo};

use crate::abi::{
    c_string, EpgTag, EpgTagBuf, PvrChannel, PvrChannelGroup, PvrChannelGroupMember, PvrRecording,
    PvrTimer,
};

pub type LogFn = unsafe extern "C" fn(context: *mut c_void, level: c_int, message: *const c_char);
pub type TransferFn<T> = unsafe extern "C" fn(context: *mut c_void, handle: *mut c_void, entry: *const T);
pub type OpenFileFn =
    unsafe extern "C" fn(context: *mut c_void, path: *const c_char, flags: c_uint) -> *mut c_void;
pub type ReadFileFn =
    unsafe extern "C" fn(context: *mut c_void, file: *mut c_void, buf: *mut c_void, size: usize) -> i64;
pub type SeekFileFn =
    unsafe extern "C" fn(context: *mut c_void, file: *mut c_void, position: i64, whence: c_int) -> i64;
pub type FileQueryFn = unsafe extern "C" fn(context: *mut c_void, file: *mut c_void) -> i64;
pub type CloseFileFn = unsafe extern "C" fn(context: *mut c_void, file: *mut c_void);

/// Function table handed over by the host in `ADDON_Create`.
///
/// `context` is passed back unchanged as the first argument of every call.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HostCallbacks {
    pub context: *mut c_void,
    pub log: Option<LogFn>,
    pub transfer_channel_entry: Option<TransferFn<PvrChannel>>,
    pub transfer_channel_group: Option<TransferFn<PvrChannelGroup>>,
    pub transfer_channel_group_member: Option<TransferFn<PvrChannelGroupMember>>,
    pub transfer_timer_entry: Option<TransferFn<PvrTimer>>,
    pub transfer_recording_entry: Option<TransferFn<PvrRecording>>,
    pub transfer_epg_entry: Option<TransferFn<EpgTag>>,
    pub open_file: Option<OpenFileFn>,
    pub read_file: Option<ReadFileFn>,
    pub seek_file: Option<SeekFileFn>,
    pub get_file_position: Option<FileQueryFn>,
    pub get_file_length: Option<FileQueryFn>,
    pub close_file: Option<CloseFileFn>,
}

/// The host, reached through a validated callback table.
pub struct CallbackHost {
    context: *mut c_void,
    log: LogFn,
    channel: TransferFn<PvrChannel>,
    group: TransferFn<PvrChannelGroup>,
    member: TransferFn<PvrChannelGroupMember>,
    timer: TransferFn<PvrTimer>,
    recording: TransferFn<PvrRecording>,
    epg: TransferFn<EpgTag>,
    open_file: OpenFileFn,
    read_file: ReadFileFn,
    seek_file: SeekFileFn,
    file_position: FileQueryFn,
    file_length: FileQueryFn,
    close_file: CloseFileFn,
}

// SAFETY: the host contract allows its callbacks to be invoked from any
// thread, and `context` is only ever handed back to the host.
unsafe impl Send for CallbackHost {}
unsafe impl Sync for CallbackHost {}

fn require<T>(callback: Option<T>, name: &str) -> BridgeResult<T> {
    callback.ok_or_else(|| BridgeError::RegistrationFailure(format!("host callback '{}' is missing", name)))
}

impl CallbackHost {
    /// Validate the host's table. Every function pointer is required.
    ///
    /// # Safety
    /// `table` is null or points to a readable `HostCallbacks`.
    pub unsafe fn register(table: *const HostCallbacks) -> BridgeResult<Self> {
        let table = table
            .as_ref()
            .ok_or_else(|| BridgeError::RegistrationFailure("no host callback table".to_string()))?;
        Ok(Self {
            context: table.context,
            log: require(table.log, "log")?,
            channel: require(table.transfer_channel_entry, "transfer_channel_entry")?,
            group: require(table.transfer_channel_group, "transfer_channel_group")?,
            member: require(table.transfer_channel_group_member, "transfer_channel_group_member")?,
            timer: require(table.transfer_timer_entry, "transfer_timer_entry")?,
            recording: require(table.transfer_recording_entry, "transfer_recording_entry")?,
            epg: require(table.transfer_epg_entry, "transfer_epg_entry")?,
            open_file: require(table.open_file, "open_file")?,
            read_file: require(table.read_file, "read_file")?,
            seek_file: require(table.seek_file, "seek_file")?,
            file_position: require(table.get_file_position, "get_file_position")?,
            file_length: require(table.get_file_length, "get_file_length")?,
            close_file: require(table.close_file, "close_file")?,
        })
    }
}

impl HostSink for CallbackHost {
    fn log(&self, level: HostLogLevel, message: &str) {
        let line = c_string(message);
        unsafe { (self.log)(self.context, level as c_int, line.as_ptr()) }
    }

    fn transfer(&self, token: CallToken, entry: &TransferEntry) {
        let handle = token.raw() as *mut c_void;
        unsafe {
            match entry {
                TransferEntry::Channel(channel) => {
                    let record = PvrChannel::from(channel);
                    (self.channel)(self.context, handle, &record)
                }
                TransferEntry::ChannelGroup(group) => {
                    let record = PvrChannelGroup::from(group);
                    (self.group)(self.context, handle, &record)
                }
                TransferEntry::ChannelGroupMember(member) => {
                    let record = PvrChannelGroupMember::from(member);
                    (self.member)(self.context, handle, &record)
                }
                TransferEntry::Timer(timer) => {
                    let record = PvrTimer::from(timer);
                    (self.timer)(self.context, handle, &record)
                }
                TransferEntry::Recording(recording) => {
                    let record = Box::new(PvrRecording::from(recording));
                    (self.recording)(self.context, handle, &*record)
                }
                TransferEntry::Epg(tag) => {
                    let record = EpgTagBuf::new(tag);
                    (self.epg)(self.context, handle, record.as_ptr())
                }
            }
        }
    }
}

impl NativeIo for CallbackHost {
    fn open_file(&self, path: &str) -> Option<NativeFile> {
        let path = c_string(path);
        let file = unsafe { (self.open_file)(self.context, path.as_ptr(), 0) };
        (!file.is_null()).then(|| NativeFile::new(file as usize))
    }

    fn read_file(&self, file: NativeFile, buf: &mut [u8]) -> i64 {
        unsafe {
            (self.read_file)(
                self.context,
                file.raw() as *mut c_void,
                buf.as_mut_ptr().cast(),
                buf.len(),
            )
        }
    }

    fn seek_file(&self, file: NativeFile, position: i64, whence: i32) -> i64 {
        unsafe { (self.seek_file)(self.context, file.raw() as *mut c_void, position, whence) }
    }

    fn file_position(&self, file: NativeFile) -> i64 {
        unsafe { (self.file_position)(self.context, file.raw() as *mut c_void) }
    }

    fn file_length(&self, file: NativeFile) -> i64 {
        unsafe { (self.file_length)(self.context, file.raw() as *mut c_void) }
    }

    fn close_file(&self, file: NativeFile) {
        unsafe { (self.close_file)(self.context, file.raw() as *mut c_void) }
    }
}
