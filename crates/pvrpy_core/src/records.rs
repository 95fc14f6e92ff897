//! Transfer records pushed from the implementation into host sinks.
//!
//! Each record type carries its structural contract: the exact field
//! names the implementation must provide and the type each must have.
//! Records own all of their data; nothing refers back to the Python
//! object they were read from.

use crate::error::MarshalError;
use crate::marshal::FieldReader;

/// A record kind with a field contract.
pub trait TransferRecord: Sized {
    /// Name used in mismatch reports.
    const KIND: &'static str;

    /// Read and validate every field of the contract.
    fn read(fields: &FieldReader<'_, '_>) -> Result<Self, MarshalError>;

    fn into_entry(self) -> TransferEntry;
}

/// One record of any kind, ready for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEntry {
    Channel(ChannelEntry),
    ChannelGroup(ChannelGroup),
    ChannelGroupMember(ChannelGroupMember),
    Timer(TimerEntry),
    Recording(RecordingEntry),
    Epg(EpgEntry),
}

impl TransferEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Channel(_) => ChannelEntry::KIND,
            Self::ChannelGroup(_) => ChannelGroup::KIND,
            Self::ChannelGroupMember(_) => ChannelGroupMember::KIND,
            Self::Timer(_) => TimerEntry::KIND,
            Self::Recording(_) => RecordingEntry::KIND,
            Self::Epg(_) => EpgEntry::KIND,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelEntry {
    pub unique_id: u32,
    pub is_radio: bool,
    pub channel_number: u32,
    pub sub_channel_number: u32,
    pub channel_name: String,
    pub input_format: String,
    pub stream_url: String,
    pub encryption_system: u32,
    pub icon_path: String,
    pub is_hidden: bool,
}

impl TransferRecord for ChannelEntry {
    const KIND: &'static str = "ChannelEntry";

    fn read(f: &FieldReader<'_, '_>) -> Result<Self, MarshalError> {
        Ok(Self {
            unique_id: f.int("uniqueId")?,
            is_radio: f.flag("isRadio")?,
            channel_number: f.int("channelNumber")?,
            sub_channel_number: f.int("subChannelNumber")?,
            channel_name: f.text("channelName")?,
            input_format: f.text("inputFormat")?,
            stream_url: f.text("streamURL")?,
            encryption_system: f.int("encryptionSystem")?,
            icon_path: f.text("iconPath")?,
            is_hidden: f.flag("isHidden")?,
        })
    }

    fn into_entry(self) -> TransferEntry {
        TransferEntry::Channel(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelGroup {
    pub group_name: String,
    pub is_radio: bool,
    pub position: u32,
}

impl TransferRecord for ChannelGroup {
    const KIND: &'static str = "ChannelGroup";

    fn read(f: &FieldReader<'_, '_>) -> Result<Self, MarshalError> {
        Ok(Self {
            group_name: f.text("groupName")?,
            is_radio: f.flag("isRadio")?,
            position: f.int("position")?,
        })
    }

    fn into_entry(self) -> TransferEntry {
        TransferEntry::ChannelGroup(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelGroupMember {
    pub group_name: String,
    pub channel_unique_id: u32,
    pub channel_number: u32,
}

impl TransferRecord for ChannelGroupMember {
    const KIND: &'static str = "ChannelGroupMember";

    fn read(f: &FieldReader<'_, '_>) -> Result<Self, MarshalError> {
        Ok(Self {
            group_name: f.text("groupName")?,
            channel_unique_id: f.int("channelUniqueId")?,
            channel_number: f.int("channelNumber")?,
        })
    }

    fn into_entry(self) -> TransferEntry {
        TransferEntry::ChannelGroupMember(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerEntry {
    pub client_index: u32,
    pub parent_client_index: u32,
    pub client_channel_uid: i32,
    pub start_time: i64,
    pub end_time: i64,
    pub start_any_time: bool,
    pub end_any_time: bool,
    pub state: i32,
    pub timer_type: u32,
    pub title: String,
    pub epg_search_string: String,
    pub full_text_epg_search: bool,
    pub directory: String,
    pub summary: String,
    pub priority: i32,
    pub lifetime: i32,
    pub max_recordings: i32,
    pub recording_group: u32,
    pub first_day: i64,
    pub weekdays: u32,
    pub prevent_duplicate_episodes: u32,
    pub epg_uid: u32,
    pub margin_start: u32,
    pub margin_end: u32,
    pub genre_type: i32,
    pub genre_sub_type: i32,
}

impl TransferRecord for TimerEntry {
    const KIND: &'static str = "TimerEntry";

    fn read(f: &FieldReader<'_, '_>) -> Result<Self, MarshalError> {
        Ok(Self {
            client_index: f.int("clientIndex")?,
            parent_client_index: f.int("parentClientIndex")?,
            client_channel_uid: f.int("clientChannelUid")?,
            start_time: f.time("startTime", "_cstartTime")?,
            end_time: f.time("endTime", "_cendTime")?,
            start_any_time: f.flag("startAnyTime")?,
            end_any_time: f.flag("endAnyTime")?,
            state: f.int("state")?,
            timer_type: f.int("timerType")?,
            title: f.text("title")?,
            epg_search_string: f.text("epgSearchString")?,
            full_text_epg_search: f.flag("fullTextEpgSearch")?,
            directory: f.text("directory")?,
            summary: f.text("summary")?,
            priority: f.int("priority")?,
            lifetime: f.int("lifetime")?,
            max_recordings: f.int("maxRecordings")?,
            recording_group: f.int("recordingGroup")?,
            first_day: f.time("firstDay", "_cfirstDay")?,
            weekdays: f.int("weekdays")?,
            prevent_duplicate_episodes: f.int("preventDuplicateEpisodes")?,
            epg_uid: f.int("epgUid")?,
            margin_start: f.int("marginStart")?,
            margin_end: f.int("marginEnd")?,
            genre_type: f.int("genreType")?,
            genre_sub_type: f.int("genreSubType")?,
        })
    }

    fn into_entry(self) -> TransferEntry {
        TransferEntry::Timer(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingEntry {
    pub recording_id: String,
    pub title: String,
    pub episode_name: String,
    pub series_number: i32,
    pub episode_number: i32,
    pub year: i32,
    pub stream_url: String,
    pub directory: String,
    pub plot_outline: String,
    pub plot: String,
    pub channel_name: String,
    pub icon_path: String,
    pub thumbnail_path: String,
    pub fanart_path: String,
    pub recording_time: i64,
    pub duration: i32,
    pub priority: i32,
    pub lifetime: i32,
    pub genre_type: i32,
    pub genre_sub_type: i32,
    pub play_count: i32,
    pub last_played_position: i32,
    pub is_deleted: bool,
    pub epg_event_id: u32,
    pub channel_uid: i32,
    pub channel_type: i32,
}

impl TransferRecord for RecordingEntry {
    const KIND: &'static str = "RecordingEntry";

    fn read(f: &FieldReader<'_, '_>) -> Result<Self, MarshalError> {
        Ok(Self {
            recording_id: f.text("recordingId")?,
            title: f.text("title")?,
            episode_name: f.text("episodeName")?,
            series_number: f.int("seriesNumber")?,
            episode_number: f.int("episodeNumber")?,
            year: f.int("year")?,
            stream_url: f.text("streamURL")?,
            directory: f.text("directory")?,
            plot_outline: f.text("plotOutline")?,
            plot: f.text("plot")?,
            channel_name: f.text("channelName")?,
            icon_path: f.text("iconPath")?,
            thumbnail_path: f.text("thumbnailPath")?,
            fanart_path: f.text("fanartPath")?,
            recording_time: f.time("recordingTime", "_crecordingTime")?,
            duration: f.int("duration")?,
            priority: f.int("priority")?,
            lifetime: f.int("lifetime")?,
            genre_type: f.int("genreType")?,
            genre_sub_type: f.int("genreSubType")?,
            play_count: f.int("playCount")?,
            last_played_position: f.int("lastPlayedPosition")?,
            is_deleted: f.flag("isDeleted")?,
            epg_event_id: f.int("epgEventId")?,
            channel_uid: f.int("channelUid")?,
            channel_type: f.int("channelType")?,
        })
    }

    fn into_entry(self) -> TransferEntry {
        TransferEntry::Recording(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpgEntry {
    pub unique_broadcast_id: u32,
    pub title: String,
    pub channel_number: u32,
    pub start_time: i64,
    pub end_time: i64,
    pub plot_outline: String,
    pub plot: String,
    pub original_title: String,
    pub cast: String,
    pub director: String,
    pub writer: String,
    pub year: i32,
    pub imdb_number: String,
    pub icon_path: String,
    pub genre_type: i32,
    pub genre_sub_type: i32,
    pub genre_description: String,
    pub first_aired: i64,
    pub parental_rating: i32,
    pub star_rating: i32,
    pub notify: bool,
    pub series_number: i32,
    pub episode_number: i32,
    pub episode_part_number: i32,
    pub episode_name: String,
    pub flags: u32,
}

impl TransferRecord for EpgEntry {
    const KIND: &'static str = "EpgEntry";

    fn read(f: &FieldReader<'_, '_>) -> Result<Self, MarshalError> {
        Ok(Self {
            unique_broadcast_id: f.int("uniqueBroadcastId")?,
            title: f.text("title")?,
            channel_number: f.int("channelNumber")?,
            start_time: f.time("startTime", "_cstartTime")?,
            end_time: f.time("endTime", "_cendTime")?,
            plot_outline: f.text("plotOutline")?,
            plot: f.text("plot")?,
            original_title: f.text("originalTitle")?,
            cast: f.text("cast")?,
            director: f.text("director")?,
            writer: f.text("writer")?,
            year: f.int("year")?,
            imdb_number: f.text("IMDBNumber")?,
            icon_path: f.text("iconPath")?,
            genre_type: f.int("genreType")?,
            genre_sub_type: f.int("genreSubType")?,
            genre_description: f.text("genreDescription")?,
            first_aired: f.time("firstAired", "_cfirstAired")?,
            parental_rating: f.int("parentalRating")?,
            star_rating: f.int("starRating")?,
            notify: f.flag("notify")?,
            series_number: f.int("seriesNumber")?,
            episode_number: f.int("episodeNumber")?,
            episode_part_number: f.int("episodePartNumber")?,
            episode_name: f.text("episodeName")?,
            flags: f.int("flags")?,
        })
    }

    fn into_entry(self) -> TransferEntry {
        TransferEntry::Epg(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::with_python;
    use std::ffi::CString;

    fn read<T: TransferRecord>(expr: &str) -> Result<T, MarshalError> {
        with_python(|py| {
            let code = CString::new(expr).unwrap();
            let obj = py.eval(&code, None, None).unwrap();
            T::read(&FieldReader::new(&obj, T::KIND))
        })
    }

    #[test]
    fn channel_entry_reads_full_contract() {
        let entry: ChannelEntry = read(
            "{'uniqueId': 1, 'isRadio': False, 'channelNumber': 1, 'subChannelNumber': 0, \
              'channelName': 'BBC One', 'inputFormat': '', 'streamURL': 'http://x', \
              'encryptionSystem': 0, 'iconPath': '', 'isHidden': False}",
        )
        .unwrap();

        assert_eq!(
            entry,
            ChannelEntry {
                unique_id: 1,
                channel_number: 1,
                channel_name: "BBC One".to_string(),
                stream_url: "http://x".to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let err = read::<ChannelGroup>("{'groupName': 'News', 'isRadio': False}").unwrap_err();
        assert_eq!(err, MarshalError::missing("ChannelGroup", "position"));
    }

    #[test]
    fn wrong_type_is_reported() {
        let err = read::<ChannelGroupMember>(
            "{'groupName': 'News', 'channelUniqueId': '7', 'channelNumber': 7}",
        )
        .unwrap_err();
        assert_eq!(
            err,
            MarshalError::wrong_type("ChannelGroupMember", "channelUniqueId", "an int")
        );
    }

    #[test]
    fn epg_entry_prefers_precomputed_times() {
        let entry: EpgEntry = read(
            "type('Tag', (), dict(uniqueBroadcastId=9, title='News', channelNumber=1, \
              startTime=object(), _cstartTime=1000, endTime=2000, plotOutline='', plot='', \
              originalTitle='', cast='', director='', writer='', year=2016, IMDBNumber='', \
              iconPath='', genreType=16, genreSubType=0, genreDescription='', firstAired=0, \
              parentalRating=0, starRating=0, notify=True, seriesNumber=0, episodeNumber=0, \
              episodePartNumber=0, episodeName='', flags=0))()",
        )
        .unwrap();

        assert_eq!(entry.start_time, 1000);
        assert_eq!(entry.end_time, 2000);
        assert!(entry.notify);
        assert_eq!(entry.year, 2016);
    }

    #[test]
    fn timer_entry_reads_full_contract() {
        let entry: TimerEntry = read(
            "{'clientIndex': 1, 'parentClientIndex': 2, 'clientChannelUid': 3, \
              'startTime': 1000, 'endTime': object(), '_cendTime': 2000, \
              'startAnyTime': False, 'endAnyTime': True, 'state': 4, 'timerType': 5, \
              'title': 'Late News', 'epgSearchString': 'news', 'fullTextEpgSearch': True, \
              'directory': '/rec', 'summary': 'Every night', 'priority': 6, 'lifetime': 7, \
              'maxRecordings': 8, 'recordingGroup': 9, 'firstDay': object(), \
              '_cfirstDay': 3000, 'weekdays': 127, 'preventDuplicateEpisodes': 10, \
              'epgUid': 11, 'marginStart': 12, 'marginEnd': 13, 'genreType': 14, \
              'genreSubType': 15}",
        )
        .unwrap();

        assert_eq!(
            entry,
            TimerEntry {
                client_index: 1,
                parent_client_index: 2,
                client_channel_uid: 3,
                start_time: 1000,
                end_time: 2000,
                start_any_time: false,
                end_any_time: true,
                state: 4,
                timer_type: 5,
                title: "Late News".to_string(),
                epg_search_string: "news".to_string(),
                full_text_epg_search: true,
                directory: "/rec".to_string(),
                summary: "Every night".to_string(),
                priority: 6,
                lifetime: 7,
                max_recordings: 8,
                recording_group: 9,
                first_day: 3000,
                weekdays: 127,
                prevent_duplicate_episodes: 10,
                epg_uid: 11,
                margin_start: 12,
                margin_end: 13,
                genre_type: 14,
                genre_sub_type: 15,
            }
        );
    }

    #[test]
    fn recording_entry_reads_full_contract() {
        let entry: RecordingEntry = read(
            "type('Recording', (), dict(recordingId='r1', title='Film', \
              episodeName='Pilot', seriesNumber=1, episodeNumber=2, year=1999, \
              streamURL='http://x/r1', directory='/films', plotOutline='Short', \
              plot=b'Long plot', channelName='Channel One', iconPath='icon.png', \
              thumbnailPath='thumb.png', fanartPath='fanart.png', recordingTime=object(), \
              _crecordingTime=4000, duration=5400, priority=3, lifetime=4, genreType=16, \
              genreSubType=5, playCount=6, lastPlayedPosition=7, isDeleted=False, \
              epgEventId=8, channelUid=9, channelType=10))()",
        )
        .unwrap();

        assert_eq!(
            entry,
            RecordingEntry {
                recording_id: "r1".to_string(),
                title: "Film".to_string(),
                episode_name: "Pilot".to_string(),
                series_number: 1,
                episode_number: 2,
                year: 1999,
                stream_url: "http://x/r1".to_string(),
                directory: "/films".to_string(),
                plot_outline: "Short".to_string(),
                plot: "Long plot".to_string(),
                channel_name: "Channel One".to_string(),
                icon_path: "icon.png".to_string(),
                thumbnail_path: "thumb.png".to_string(),
                fanart_path: "fanart.png".to_string(),
                recording_time: 4000,
                duration: 5400,
                priority: 3,
                lifetime: 4,
                genre_type: 16,
                genre_sub_type: 5,
                play_count: 6,
                last_played_position: 7,
                is_deleted: false,
                epg_event_id: 8,
                channel_uid: 9,
                channel_type: 10,
            }
        );
    }

    #[test]
    fn entry_kind_matches_record() {
        assert_eq!(ChannelEntry::default().into_entry().kind(), "ChannelEntry");
        assert_eq!(EpgEntry::default().into_entry().kind(), "EpgEntry");
        assert_eq!(TimerEntry::default().into_entry().kind(), "TimerEntry");
    }
}
