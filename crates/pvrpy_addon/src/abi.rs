//! Fixed-layout host records.
//!
//! Text fields are fixed `c_char` arrays except in [`EpgTag`], which points
//! at strings owned by an [`EpgTagBuf`] for as long as the host sink runs.
//! Every copy into a fixed array truncates and always NUL-terminates.

use std::ffi::{c_char, c_int, c_long, CStr, CString};

use pvrpy_core::records::{
    ChannelEntry, ChannelGroup, ChannelGroupMember, EpgEntry, RecordingEntry, TimerEntry,
};
use pvrpy_core::{AddonConfig, Capabilities};

pub const NAME_LEN: usize = 1024;
pub const URL_LEN: usize = 1024;
pub const DESC_LEN: usize = 1024;
pub const INPUT_FORMAT_LEN: usize = 32;

/// `time_t` on the supported 64-bit hosts.
pub type TimeT = i64;

/// Copy `text` into a fixed array. Stops at an interior NUL.
pub fn fixed<const N: usize>(text: &str) -> [c_char; N] {
    let mut out = [0 as c_char; N];
    let bytes = text.as_bytes();
    let len = bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(bytes.len())
        .min(N.saturating_sub(1));
    for (dst, src) in out.iter_mut().zip(&bytes[..len]) {
        *dst = *src as c_char;
    }
    out
}

/// Read a fixed array written by the host.
pub fn read_fixed(field: &[c_char]) -> String {
    let bytes: Vec<u8> = field
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// An owned C string. Stops at an interior NUL.
pub fn c_string(text: &str) -> CString {
    let end = text.find('\0').unwrap_or(text.len());
    CString::new(&text[..end]).unwrap_or_default()
}

/// Read a host C string; null reads as empty.
///
/// # Safety
/// `ptr` is null or points to a NUL-terminated string.
pub unsafe fn c_text(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

/// Properties passed to `ADDON_Create`.
#[repr(C)]
pub struct PvrProperties {
    pub user_path: *const c_char,
    pub client_path: *const c_char,
    pub epg_max_days: c_int,
}

impl PvrProperties {
    /// # Safety
    /// Both path pointers are null or valid C strings.
    pub unsafe fn to_config(&self) -> AddonConfig {
        AddonConfig::new(
            c_text(self.user_path),
            c_text(self.client_path),
            self.epg_max_days,
        )
    }
}

#[repr(C)]
pub struct PvrChannel {
    pub unique_id: u32,
    pub is_radio: bool,
    pub channel_number: u32,
    pub sub_channel_number: u32,
    pub channel_name: [c_char; NAME_LEN],
    pub input_format: [c_char; INPUT_FORMAT_LEN],
    pub stream_url: [c_char; URL_LEN],
    pub encryption_system: u32,
    pub icon_path: [c_char; URL_LEN],
    pub is_hidden: bool,
}

impl From<&ChannelEntry> for PvrChannel {
    fn from(entry: &ChannelEntry) -> Self {
        Self {
            unique_id: entry.unique_id,
            is_radio: entry.is_radio,
            channel_number: entry.channel_number,
            sub_channel_number: entry.sub_channel_number,
            channel_name: fixed(&entry.channel_name),
            input_format: fixed(&entry.input_format),
            stream_url: fixed(&entry.stream_url),
            encryption_system: entry.encryption_system,
            icon_path: fixed(&entry.icon_path),
            is_hidden: entry.is_hidden,
        }
    }
}

#[repr(C)]
pub struct PvrChannelGroup {
    pub group_name: [c_char; NAME_LEN],
    pub is_radio: bool,
    pub position: u32,
}

impl From<&ChannelGroup> for PvrChannelGroup {
    fn from(group: &ChannelGroup) -> Self {
        Self {
            group_name: fixed(&group.group_name),
            is_radio: group.is_radio,
            position: group.position,
        }
    }
}

#[repr(C)]
pub struct PvrChannelGroupMember {
    pub group_name: [c_char; NAME_LEN],
    pub channel_unique_id: u32,
    pub channel_number: u32,
}

impl From<&ChannelGroupMember> for PvrChannelGroupMember {
    fn from(member: &ChannelGroupMember) -> Self {
        Self {
            group_name: fixed(&member.group_name),
            channel_unique_id: member.channel_unique_id,
            channel_number: member.channel_number,
        }
    }
}

#[repr(C)]
pub struct PvrTimer {
    pub client_index: u32,
    pub parent_client_index: u32,
    pub client_channel_uid: i32,
    pub start_time: TimeT,
    pub end_time: TimeT,
    pub start_any_time: bool,
    pub end_any_time: bool,
    pub state: c_int,
    pub timer_type: u32,
    pub title: [c_char; NAME_LEN],
    pub epg_search_string: [c_char; NAME_LEN],
    pub full_text_epg_search: bool,
    pub directory: [c_char; URL_LEN],
    pub summary: [c_char; DESC_LEN],
    pub priority: c_int,
    pub lifetime: c_int,
    pub max_recordings: c_int,
    pub recording_group: u32,
    pub first_day: TimeT,
    pub weekdays: u32,
    pub prevent_duplicate_episodes: u32,
    pub epg_uid: u32,
    pub margin_start: u32,
    pub margin_end: u32,
    pub genre_type: c_int,
    pub genre_sub_type: c_int,
}

impl From<&TimerEntry> for PvrTimer {
    fn from(timer: &TimerEntry) -> Self {
        Self {
            client_index: timer.client_index,
            parent_client_index: timer.parent_client_index,
            client_channel_uid: timer.client_channel_uid,
            start_time: timer.start_time,
            end_time: timer.end_time,
            start_any_time: timer.start_any_time,
            end_any_time: timer.end_any_time,
            state: timer.state,
            timer_type: timer.timer_type,
            title: fixed(&timer.title),
            epg_search_string: fixed(&timer.epg_search_string),
            full_text_epg_search: timer.full_text_epg_search,
            directory: fixed(&timer.directory),
            summary: fixed(&timer.summary),
            priority: timer.priority,
            lifetime: timer.lifetime,
            max_recordings: timer.max_recordings,
            recording_group: timer.recording_group,
            first_day: timer.first_day,
            weekdays: timer.weekdays,
            prevent_duplicate_episodes: timer.prevent_duplicate_episodes,
            epg_uid: timer.epg_uid,
            margin_start: timer.margin_start,
            margin_end: timer.margin_end,
            genre_type: timer.genre_type,
            genre_sub_type: timer.genre_sub_type,
        }
    }
}

#[repr(C)]
pub struct PvrRecording {
    pub recording_id: [c_char; NAME_LEN],
    pub title: [c_char; NAME_LEN],
    pub episode_name: [c_char; NAME_LEN],
    pub series_number: c_int,
    pub episode_number: c_int,
    pub year: c_int,
    pub stream_url: [c_char; URL_LEN],
    pub directory: [c_char; URL_LEN],
    pub plot_outline: [c_char; DESC_LEN],
    pub plot: [c_char; DESC_LEN],
    pub channel_name: [c_char; NAME_LEN],
    pub icon_path: [c_char; URL_LEN],
    pub thumbnail_path: [c_char; URL_LEN],
    pub fanart_path: [c_char; URL_LEN],
    pub recording_time: TimeT,
    pub duration: c_int,
    pub priority: c_int,
    pub lifetime: c_int,
    pub genre_type: c_int,
    pub genre_sub_type: c_int,
    pub play_count: c_int,
    pub last_played_position: c_int,
    pub is_deleted: bool,
    pub epg_event_id: u32,
    pub channel_uid: c_int,
    pub channel_type: c_int,
}

impl From<&RecordingEntry> for PvrRecording {
    fn from(rec: &RecordingEntry) -> Self {
        Self {
            recording_id: fixed(&rec.recording_id),
            title: fixed(&rec.title),
            episode_name: fixed(&rec.episode_name),
            series_number: rec.series_number,
            episode_number: rec.episode_number,
            year: rec.year,
            stream_url: fixed(&rec.stream_url),
            directory: fixed(&rec.directory),
            plot_outline: fixed(&rec.plot_outline),
            plot: fixed(&rec.plot),
            channel_name: fixed(&rec.channel_name),
            icon_path: fixed(&rec.icon_path),
            thumbnail_path: fixed(&rec.thumbnail_path),
            fanart_path: fixed(&rec.fanart_path),
            recording_time: rec.recording_time,
            duration: rec.duration,
            priority: rec.priority,
            lifetime: rec.lifetime,
            genre_type: rec.genre_type,
            genre_sub_type: rec.genre_sub_type,
            play_count: rec.play_count,
            last_played_position: rec.last_played_position,
            is_deleted: rec.is_deleted,
            epg_event_id: rec.epg_event_id,
            channel_uid: rec.channel_uid,
            channel_type: rec.channel_type,
        }
    }
}

#[repr(C)]
pub struct EpgTag {
    pub unique_broadcast_id: u32,
    pub title: *const c_char,
    pub channel_number: u32,
    pub start_time: TimeT,
    pub end_time: TimeT,
    pub plot_outline: *const c_char,
    pub plot: *const c_char,
    pub original_title: *const c_char,
    pub cast: *const c_char,
    pub director: *const c_char,
    pub writer: *const c_char,
    pub year: c_int,
    pub imdb_number: *const c_char,
    pub icon_path: *const c_char,
    pub genre_type: c_int,
    pub genre_sub_type: c_int,
    pub genre_description: *const c_char,
    pub first_aired: TimeT,
    pub parental_rating: c_int,
    pub star_rating: c_int,
    pub notify: bool,
    pub series_number: c_int,
    pub episode_number: c_int,
    pub episode_part_number: c_int,
    pub episode_name: *const c_char,
    pub flags: u32,
}

/// An [`EpgTag`] together with the strings it points at.
pub struct EpgTagBuf {
    tag: EpgTag,
    _text: Vec<CString>,
}

impl EpgTagBuf {
    pub fn new(entry: &EpgEntry) -> Self {
        let mut text = Vec::with_capacity(11);
        let mut keep = |value: &str| {
            let owned = c_string(value);
            // The heap buffer does not move when the CString is pushed.
            let ptr = owned.as_ptr();
            text.push(owned);
            ptr
        };
        let tag = EpgTag {
            unique_broadcast_id: entry.unique_broadcast_id,
            title: keep(&entry.title),
            channel_number: entry.channel_number,
            start_time: entry.start_time,
            end_time: entry.end_time,
            plot_outline: keep(&entry.plot_outline),
            plot: keep(&entry.plot),
            original_title: keep(&entry.original_title),
            cast: keep(&entry.cast),
            director: keep(&entry.director),
            writer: keep(&entry.writer),
            year: entry.year,
            imdb_number: keep(&entry.imdb_number),
            icon_path: keep(&entry.icon_path),
            genre_type: entry.genre_type,
            genre_sub_type: entry.genre_sub_type,
            genre_description: keep(&entry.genre_description),
            first_aired: entry.first_aired,
            parental_rating: entry.parental_rating,
            star_rating: entry.star_rating,
            notify: entry.notify,
            series_number: entry.series_number,
            episode_number: entry.episode_number,
            episode_part_number: entry.episode_part_number,
            episode_name: keep(&entry.episode_name),
            flags: entry.flags,
        };
        Self { tag, _text: text }
    }

    pub fn as_ptr(&self) -> *const EpgTag {
        &self.tag
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PvrAddonCapabilities {
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

impl From<Capabilities> for PvrAddonCapabilities {
    fn from(caps: Capabilities) -> Self {
        Self {
            supports_epg: caps.supports_epg,
            supports_tv: caps.supports_tv,
            supports_radio: caps.supports_radio,
            supports_recordings: caps.supports_recordings,
            supports_recordings_undelete: caps.supports_recordings_undelete,
            supports_timers: caps.supports_timers,
            supports_channel_groups: caps.supports_channel_groups,
            supports_channel_scan: caps.supports_channel_scan,
            supports_channel_settings: caps.supports_channel_settings,
            handles_input_stream: caps.handles_input_stream,
            handles_demuxing: caps.handles_demuxing,
            supports_recording_play_count: caps.supports_recording_play_count,
            supports_last_played_position: caps.supports_last_played_position,
            supports_recording_edl: caps.supports_recording_edl,
        }
    }
}

#[repr(C)]
pub struct PvrSignalStatus {
    pub adapter_name: [c_char; NAME_LEN],
    pub adapter_status: [c_char; NAME_LEN],
    pub service_name: [c_char; NAME_LEN],
    pub provider_name: [c_char; NAME_LEN],
    pub mux_name: [c_char; NAME_LEN],
    pub snr: c_int,
    pub signal: c_int,
    pub ber: c_long,
    pub unc: c_long,
}

/// Opaque to the add-on; the stubs taking these never read them.
#[repr(C)]
pub struct PvrTimerType {
    _private: [u8; 0],
}

#[repr(C)]
pub struct PvrStreamProperties {
    _private: [u8; 0],
}

#[repr(C)]
pub struct PvrMenuHook {
    _private: [u8; 0],
}

#[repr(C)]
pub struct PvrMenuHookData {
    _private: [u8; 0],
}

#[repr(C)]
pub struct PvrEdlEntry {
    _private: [u8; 0],
}

#[repr(C)]
pub struct DemuxPacket {
    _private: [u8; 0],
}
