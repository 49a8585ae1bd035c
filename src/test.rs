use crate::{
    num::{u14, u28, u4, u7},
    ChannelControl, Controllers, Cursor, ErrorKind, EventIter, Format, Instruments, MetaMessage,
    MidiMessage, Percussion, PitchBend, Player, PlayerConfig, Result, Smf, Strategies, Synth,
    Tempo, Timbre, Timing, TrackEvent, TrackEventKind,
};
use assert_approx_eq::assert_approx_eq;
use std::fs;

/// Open and read the content of a test asset.
macro_rules! open {
    {$name:ident : $file:expr} => {
        let $name = fs::read(concat!("test-asset/", $file)).unwrap();
    };
    {$name:ident : [smf] $file:expr} => {
        let $name = match Smf::parse(&$file[..]) {
            Ok(smf) => smf,
            Err(err) => {
                eprintln!("failed to parse test file: {:?}", err);
                panic!()
            }
        };
    };
}

/// Build a Standard Midi File out of raw track data.
fn build_smf(format: u16, division: u16, tracks: &[&[u8]]) -> Vec<u8> {
    let mut raw = Vec::new();
    raw.extend_from_slice(b"MThd");
    raw.extend_from_slice(&6u32.to_be_bytes());
    raw.extend_from_slice(&format.to_be_bytes());
    raw.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    raw.extend_from_slice(&division.to_be_bytes());
    for track in tracks {
        raw.extend_from_slice(b"MTrk");
        raw.extend_from_slice(&(track.len() as u32).to_be_bytes());
        raw.extend_from_slice(track);
    }
    raw
}

/// Decode a whole track, panicking on errors.
fn decode(raw: &[u8]) -> Vec<TrackEvent> {
    EventIter::new(raw).collect::<Result<Vec<_>>>().unwrap()
}

/// The kind of the first error found in a track.
fn decode_err(raw: &[u8]) -> ErrorKind {
    match EventIter::new(raw).collect::<Result<Vec<_>>>() {
        Ok(evs) => panic!("track decoded successfully: {:?}", evs),
        Err(err) => err.kind(),
    }
}

fn parse_err(raw: &[u8]) -> ErrorKind {
    match Smf::parse(raw) {
        Ok(smf) => panic!("file parsed successfully: {:?}", smf),
        Err(err) => err.kind(),
    }
}

fn midi(channel: u8, message: MidiMessage) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: u4::from(channel),
        message,
    }
}

fn note_on(key: u8, vel: u8) -> MidiMessage {
    MidiMessage::NoteOn {
        key: u7::from(key),
        vel: u7::from(vel),
    }
}

fn note_off(key: u8, vel: u8) -> MidiMessage {
    MidiMessage::NoteOff {
        key: u7::from(key),
        vel: u7::from(vel),
    }
}

const SCENARIO_TRACK: &[u8] = &[
    0x00, 0x90, 0x3C, 0x64, //
    0x60, 0x80, 0x3C, 0x40, //
    0x00, 0xFF, 0x2F, 0x00,
];

mod decode {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scenario() {
        let raw = build_smf(1, 96, &[SCENARIO_TRACK]);
        assert_eq!(
            &raw[..14],
            &[0x4D, 0x54, 0x68, 0x64, 0, 0, 0, 6, 0, 1, 0, 1, 0, 0x60][..]
        );
        let smf = Smf::parse(&raw).unwrap();
        assert_eq!(smf.header.format, Format::Parallel);
        assert_eq!(smf.header.track_count, 1);
        assert_eq!(smf.header.timing, Timing::Metrical(96.into()));
        let evs = smf.ordered().collect::<Result<Vec<_>>>().unwrap();
        let evs = evs.iter().map(|ev| (ev.delta, ev.kind)).collect::<Vec<_>>();
        assert_eq!(
            evs,
            vec![
                (0, midi(0, note_on(60, 100))),
                (96, midi(0, note_off(60, 64))),
                (0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
            ]
        );
        assert_eq!(smf.duration().unwrap(), 0.5);
    }

    #[test]
    fn running_status() {
        let explicit = decode(&[
            0x00, 0x90, 0x3C, 0x64, //
            0x00, 0x90, 0x40, 0x64, //
            0x00, 0xFF, 0x2F, 0x00,
        ]);
        let implied = decode(&[
            0x00, 0x90, 0x3C, 0x64, //
            0x00, 0x40, 0x64, //
            0x00, 0xFF, 0x2F, 0x00,
        ]);
        assert_eq!(explicit, implied);
    }

    #[test]
    fn running_status_follows_last_status() {
        let raw: &[u8] = &[
            0x00, 0x90, 0x3C, 0x64, //
            0x00, 0xFF, 0x01, 0x00, //
            0x00, 0x01, 0x02, b'h', b'i', //
            0x00, 0x90, 0x3E, 0x64, //
            0x00, 0x40, 0x64, //
            0x00, 0xF0, 0x01, 0x7E, //
            0x00, 0x01, 0xF7,
        ];
        let evs = decode(raw);
        assert_eq!(
            evs.iter().map(|ev| ev.kind).collect::<Vec<_>>(),
            vec![
                midi(0, note_on(60, 100)),
                TrackEventKind::Meta(MetaMessage::Text(b"")),
                TrackEventKind::Meta(MetaMessage::Text(b"hi")),
                midi(0, note_on(62, 100)),
                midi(0, note_on(64, 100)),
                TrackEventKind::SysEx(&[0x7E]),
                TrackEventKind::SysEx(&[0xF7]),
            ]
        );

        let mut iter = EventIter::new(&raw[..8]);
        iter.next().unwrap().unwrap();
        assert_eq!(iter.running_status(), Some(0x90));
        iter.next().unwrap().unwrap();
        assert_eq!(iter.running_status(), Some(0xFF));
    }

    #[test]
    fn single_data_byte_messages() {
        let evs = decode(&[
            0x00, 0xC3, 0x18, //
            0x00, 0xD3, 0x40, //
            0x00, 0xE3, 0x00, 0x40,
        ]);
        assert_eq!(
            evs.iter().map(|ev| ev.kind).collect::<Vec<_>>(),
            vec![
                midi(
                    3,
                    MidiMessage::ProgramChange {
                        program: u7::from(0x18)
                    }
                ),
                midi(
                    3,
                    MidiMessage::ChannelAftertouch {
                        vel: u7::from(0x40)
                    }
                ),
                midi(
                    3,
                    MidiMessage::PitchBend {
                        bend: PitchBend::mid_raw_value()
                    }
                ),
            ]
        );
    }

    #[test]
    fn meta_messages() {
        let evs = decode(&[
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, //
            0x00, 0xFF, 0x58, 0x04, 0x04, 0x02, 0x18, 0x08, //
            0x00, 0xFF, 0x59, 0x02, 0xFE, 0x01, //
            0x00, 0xFF, 0x60, 0x01, 0xAA, //
            0x00, 0xFF, 0x2F, 0x00,
        ]);
        let kinds = evs.iter().map(|ev| ev.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                TrackEventKind::Meta(MetaMessage::Tempo(500_000.into())),
                TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8)),
                TrackEventKind::Meta(MetaMessage::KeySignature(-2, true)),
                TrackEventKind::Meta(MetaMessage::Unknown(0x60, &[0xAA])),
                TrackEventKind::Meta(MetaMessage::EndOfTrack),
            ]
        );
        assert_eq!(kinds[0].tempo(), Some(Tempo::DEFAULT));
        match kinds[3] {
            TrackEventKind::Meta(meta) => assert_eq!(meta.meta_type(), 0x60),
            _ => unreachable!(),
        }
    }

    #[test]
    fn varlen() {
        let read = |mut raw: &[u8]| u28::read_varlen(&mut raw).unwrap().as_int();
        assert_eq!(read(&[0x00]), 0);
        assert_eq!(read(&[0x81, 0x00]), 128);
        assert_eq!(read(&[0xFF, 0xFF, 0xFF, 0x7F]), 0x0FFF_FFFF);
        assert!(matches!(
            u28::read_varlen(&mut &[0x81, 0x80][..]),
            Err(ErrorKind::TruncatedStream(_))
        ));
    }

    #[test]
    fn truncated_varlen() {
        assert!(matches!(
            decode_err(&[0x81, 0x80, 0x80]),
            ErrorKind::TruncatedStream(_)
        ));
        assert!(matches!(
            decode_err(&[0x00, 0xFF, 0x01, 0x85]),
            ErrorKind::TruncatedStream(_)
        ));
    }

    #[test]
    fn truncated_message() {
        assert!(matches!(
            decode_err(&[0x00, 0x90, 0x3C]),
            ErrorKind::TruncatedStream(_)
        ));
        assert!(matches!(
            decode_err(&[0x00]),
            ErrorKind::TruncatedStream(_)
        ));
        assert!(matches!(
            decode_err(&[0x00, 0xF0, 0x05, 0x01]),
            ErrorKind::TruncatedStream(_)
        ));
    }

    #[test]
    fn unknown_status() {
        assert!(matches!(
            decode_err(&[0x00, 0xF2, 0x00, 0x00]),
            ErrorKind::UnknownStatusByte(_)
        ));
        assert!(matches!(
            decode_err(&[0x00, 0xF8]),
            ErrorKind::UnknownStatusByte(_)
        ));
    }

    #[test]
    fn running_status_without_context() {
        assert!(matches!(
            decode_err(&[0x00, 0x3C, 0x64]),
            ErrorKind::RunningStatusWithoutContext(_)
        ));
    }

    #[test]
    fn decoder_stops_after_error() {
        let raw: &[u8] = &[0x00, 0x90, 0x3C, 0x64, 0x00, 0xF4, 0x00, 0x90, 0x3C, 0x00];
        let mut iter = EventIter::new(raw);
        assert!(iter.next().unwrap().is_ok());
        assert_eq!(iter.position(), 4);
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[cfg(debug_assertions)]
    #[test]
    fn error_context() {
        let err = EventIter::new(&[0x81]).next().unwrap().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TruncatedStream(_)));
        assert_eq!(
            err.context(),
            &["failed to read event deltatime", "failed to decode track event"][..]
        );
    }
}

mod chunks {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_header() {
        assert!(matches!(parse_err(&[]), ErrorKind::MalformedHeader(_)));
        assert!(matches!(
            parse_err(b"MTrk\0\0\0\0"),
            ErrorKind::MalformedHeader(_)
        ));
    }

    #[test]
    fn invalid_header() {
        let mut raw = build_smf(1, 96, &[SCENARIO_TRACK]);
        raw[9] = 3;
        assert!(matches!(parse_err(&raw), ErrorKind::MalformedHeader(_)));
    }

    #[test]
    fn truncated_chunks() {
        let raw = build_smf(1, 96, &[SCENARIO_TRACK]);
        //Track chunk cut short
        assert!(matches!(
            parse_err(&raw[..raw.len() - 1]),
            ErrorKind::TruncatedStream(_)
        ));
        //Header chunk cut short
        assert!(matches!(
            parse_err(&raw[..12]),
            ErrorKind::TruncatedStream(_)
        ));
        //Header fields missing from the header chunk
        assert!(matches!(
            parse_err(b"MThd\0\0\0\x02\0\x01"),
            ErrorKind::TruncatedStream(_)
        ));
    }

    #[test]
    fn skip_unknown_chunks() {
        let mut raw = build_smf(0, 96, &[]);
        raw[11] = 1;
        raw.extend_from_slice(b"XFIH\0\0\0\x03abc");
        raw.extend_from_slice(b"MTrk\0\0\0\x0C");
        raw.extend_from_slice(SCENARIO_TRACK);
        let smf = Smf::parse(&raw).unwrap();
        assert_eq!(smf.track_count(), 1);
        assert_eq!(smf.tracks[0], SCENARIO_TRACK);
    }

    #[cfg(feature = "strict")]
    #[test]
    fn track_count_mismatch() {
        let mut raw = build_smf(1, 96, &[SCENARIO_TRACK]);
        raw[11] = 2;
        assert!(matches!(parse_err(&raw), ErrorKind::Malformed(_)));
    }

    #[cfg(feature = "strict")]
    #[test]
    fn corrupt_track_rejected_on_load() {
        let raw = build_smf(1, 96, &[SCENARIO_TRACK, &[0x00, 0x3C, 0x64]]);
        assert!(matches!(
            parse_err(&raw),
            ErrorKind::RunningStatusWithoutContext(_)
        ));
    }

    #[test]
    fn rmid() {
        open! {mid: "Scale.mid"};
        open! {rmi: "Scale.rmi"};
        open! {smf: [smf] mid};
        open! {wrapped: [smf] rmi};
        assert_eq!(smf.header, wrapped.header);
        assert_eq!(smf.tracks, wrapped.tracks);
    }

    #[test]
    fn smpte() {
        open! {raw: "Smpte.mid"};
        open! {smf: [smf] raw};
        assert_eq!(
            smf.header.timing,
            Timing::Timecode {
                format: -25,
                ticks_per_frame: 40
            }
        );
        assert_eq!(decode(smf.tracks[0]).len(), 3);
        assert!(matches!(
            smf.duration().unwrap_err().kind(),
            ErrorKind::UnsupportedDivision(_)
        ));
        assert!(matches!(
            smf.seek(0.0).unwrap_err().kind(),
            ErrorKind::UnsupportedDivision(_)
        ));
    }
}

mod merge {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_track_is_identity() {
        open! {raw: "Scale.mid"};
        open! {smf: [smf] raw};
        let track = decode(smf.tracks[0]);
        let merged = smf.ordered().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(
            track
                .iter()
                .map(|ev| (ev.delta.as_int(), ev.kind))
                .collect::<Vec<_>>(),
            merged
                .iter()
                .map(|ev| (ev.delta, ev.kind))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn ordered_by_time() {
        open! {raw: "Tempo.mid"};
        open! {smf: [smf] raw};
        let merged = smf.ordered().collect::<Result<Vec<_>>>().unwrap();
        let order = merged
            .iter()
            .map(|ev| (ev.delta, ev.track))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![
                (0, 0),
                (0, 1),
                (0, 1),
                (0, 1),
                (192, 0),
                (0, 1),
                (0, 1),
                (96, 0),
                (0, 1),
                (96, 1),
            ]
        );
        assert_eq!(
            merged[4].kind,
            TrackEventKind::Meta(MetaMessage::Tempo(1_000_000.into()))
        );
    }

    #[test]
    fn ties_prefer_lower_tracks() {
        let a: &[u8] = &[0x10, 0x90, 0x3C, 0x64];
        let b: &[u8] = &[0x10, 0x91, 0x3C, 0x64];
        let raw = build_smf(1, 96, &[b, a, b]);
        let smf = Smf::parse(&raw).unwrap();
        let tracks = smf
            .ordered()
            .map(|ev| ev.map(|ev| ev.track))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(tracks, vec![0, 1, 2]);
    }

    #[cfg(not(feature = "strict"))]
    #[test]
    fn error_after_pending_events() {
        let good: &[u8] = &[0x00, 0x90, 0x3C, 0x64, 0x60, 0x80, 0x3C, 0x40];
        let bad: &[u8] = &[0x00, 0x91, 0x3C, 0x64, 0x00, 0xF5];
        let raw = build_smf(1, 96, &[good, bad]);
        let smf = Smf::parse(&raw).unwrap();
        let mut merged = smf.ordered();
        assert_eq!(merged.next().unwrap().unwrap().track, 0);
        assert_eq!(merged.next().unwrap().unwrap().track, 1);
        //The note off of the first track was pulled before the second track failed
        let ev = merged.next().unwrap().unwrap();
        assert_eq!((ev.delta, ev.track), (96, 0));
        assert_eq!(ev.kind, midi(0, note_off(60, 64)));
        assert!(matches!(
            merged.next().unwrap().unwrap_err().kind(),
            ErrorKind::UnknownStatusByte(_)
        ));
        assert!(merged.next().is_none());
        assert!(matches!(
            smf.duration().unwrap_err().kind(),
            ErrorKind::UnknownStatusByte(_)
        ));
    }

    #[cfg(not(feature = "strict"))]
    #[test]
    fn error_while_priming() {
        let first: &[u8] = &[0x00, 0x90, 0x3C, 0x64, 0x60, 0x80, 0x3C, 0x40];
        let second: &[u8] = &[0x30, 0x91, 0x3E, 0x64];
        let bad: &[u8] = &[0x00, 0xF5];
        let raw = build_smf(1, 96, &[first, second, bad]);
        let smf = Smf::parse(&raw).unwrap();
        let mut merged = smf.ordered();
        let ev = merged.next().unwrap().unwrap();
        assert_eq!((ev.delta, ev.track), (0, 0));
        let ev = merged.next().unwrap().unwrap();
        assert_eq!((ev.delta, ev.track), (0x30, 1));
        assert_eq!(ev.kind, midi(1, note_on(62, 100)));
        assert!(matches!(
            merged.next().unwrap().unwrap_err().kind(),
            ErrorKind::UnknownStatusByte(_)
        ));
        assert!(merged.next().is_none());
    }

    #[test]
    fn no_tracks() {
        let raw = build_smf(1, 96, &[]);
        let smf = Smf::parse(&raw).unwrap();
        assert!(smf.ordered().next().is_none());
        assert_eq!(smf.duration().unwrap(), 0.0);
    }
}

mod timing {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tempo() {
        assert_eq!(Tempo::default(), Tempo::DEFAULT);
        assert_approx_eq!(Tempo::DEFAULT.bpm(), 120.0);
        assert_approx_eq!(Tempo::DEFAULT.tick_duration(96.into()), 0.5 / 96.0);
        assert_eq!(Tempo::new(1_000_000).ticks_to_seconds(48, 96.into()), 0.5);
    }

    #[test]
    fn scale_duration() {
        open! {raw: "Scale.mid"};
        open! {smf: [smf] raw};
        assert_approx_eq!(smf.duration().unwrap(), 4.0);
        //Memoized
        assert_approx_eq!(smf.duration().unwrap(), 4.0);
    }

    #[test]
    fn tempo_change_affects_following_deltas() {
        open! {raw: "Tempo.mid"};
        open! {smf: [smf] raw};
        let times = smf
            .timed()
            .unwrap()
            .scan(0.0, |time, ev| {
                Some(ev.map(|(secs, _)| {
                    *time += secs;
                    *time
                }))
            })
            .collect::<Result<Vec<f64>>>()
            .unwrap();
        assert_eq!(
            times,
            vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 3.0]
        );
        assert_approx_eq!(smf.duration().unwrap(), 3.0);
    }

    #[test]
    fn seek_lands_on_event_boundaries() {
        open! {raw: "Tempo.mid"};
        open! {smf: [smf] raw};
        let seek = smf.seek(1.5).unwrap();
        assert_approx_eq!(seek.position, 1.0);
        assert_eq!(seek.tempo, Tempo::new(1_000_000));
        let next = seek.cursor.pending().unwrap();
        assert_eq!((next.delta, next.track), (96, 0));
        assert_eq!(next.kind, TrackEventKind::Meta(MetaMessage::EndOfTrack));

        let seek = smf.seek(0.0).unwrap();
        assert_eq!(seek.position, 0.0);
        assert_eq!(seek.cursor.count(), 10);
    }

    #[test]
    fn seek_then_remaining_time() {
        open! {raw: "Tempo.mid"};
        open! {smf: [smf] raw};
        let duration = smf.duration().unwrap();
        let ticks_per_beat = smf.header.ticks_per_beat().unwrap();
        for &target in &[0.0, 0.3, 0.5, 1.0, 1.2, 2.0, 2.7, 3.0] {
            let seek = smf.seek(target).unwrap();
            assert!(seek.position <= target);
            let mut tempo = seek.tempo;
            let mut remaining = 0.0;
            let cursor: Cursor = seek.cursor;
            for ev in cursor {
                let ev = ev.unwrap();
                remaining += tempo.ticks_to_seconds(ev.delta, ticks_per_beat);
                if let Some(new_tempo) = ev.kind.tempo() {
                    tempo = new_tempo;
                }
            }
            assert_approx_eq!(seek.position + remaining, duration);
        }
    }

    #[test]
    fn seek_past_the_end() {
        open! {raw: "Tempo.mid"};
        open! {smf: [smf] raw};
        let mut seek = smf.seek(10.0).unwrap();
        assert_approx_eq!(seek.position, 3.0);
        assert!(seek.cursor.next().is_none());
    }

    #[test]
    fn helpers() {
        assert_approx_eq!(crate::note_to_frequency(u7::from(69)), 440.0);
        assert_approx_eq!(crate::note_to_frequency(u7::from(81)), 880.0);
        assert_approx_eq!(PitchBend::mid_raw_value().to_multiplier(2.0), 1.0);
        assert_eq!(PitchBend(u14::from(0)).as_int(), -0x2000);
        assert_approx_eq!(PitchBend(u14::from(0)).to_multiplier(12.0), 0.5);
    }
}

mod player {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Emit(f64, u8, u8, u8, Timbre),
        Release(f64, u8, u8),
        Silence(f64),
        Control(f64, u8, ChannelControl),
    }

    #[derive(Default, Debug)]
    struct Recorder {
        calls: Vec<Call>,
    }
    impl Recorder {
        fn take(&mut self) -> Vec<Call> {
            std::mem::take(&mut self.calls)
        }
    }
    impl Synth for Recorder {
        fn emit(&mut self, time: f64, channel: u4, key: u7, vel: u7, timbre: Timbre) {
            self.calls.push(Call::Emit(
                time,
                channel.as_int(),
                key.as_int(),
                vel.as_int(),
                timbre,
            ));
        }
        fn release(&mut self, time: f64, channel: u4, key: u7) {
            self.calls
                .push(Call::Release(time, channel.as_int(), key.as_int()));
        }
        fn silence_all(&mut self, time: f64) {
            self.calls.push(Call::Silence(time));
        }
        fn control(&mut self, time: f64, channel: u4, control: ChannelControl) {
            self.calls.push(Call::Control(time, channel.as_int(), control));
        }
    }

    fn player<'a>() -> Player<'a, Recorder> {
        Player::new(Recorder::default(), PlayerConfig::default())
    }

    #[test]
    fn play_through() {
        open! {raw: "Tempo.mid"};
        open! {smf: [smf] raw};
        let mut player = player();
        player.load(&smf, 0.0).unwrap();
        assert_approx_eq!(player.duration(), 3.0);
        player.play(0.0).unwrap();

        let evs = player.tick(0.0).unwrap();
        assert_eq!(
            evs.iter().map(|ev| ev.time).collect::<Vec<_>>(),
            vec![0.0, 0.0, 0.0, 0.0, 1.0]
        );
        assert_eq!(evs[1].announcement().as_deref(), Some("Hello"));
        assert_eq!(
            player.synth_mut().take(),
            vec![Call::Emit(0.0, 0, 64, 100, Timbre::Program(u7::from(24)))]
        );

        let evs = player.tick(0.5).unwrap();
        assert_eq!(evs.len(), 3);
        assert_eq!(
            player.synth_mut().take(),
            vec![
                Call::Release(1.0, 0, 64),
                Call::Emit(1.0, 0, 67, 100, Timbre::Program(u7::from(24))),
            ]
        );

        let evs = player.tick(1.5).unwrap();
        assert_eq!(
            evs.iter().map(|ev| ev.time).collect::<Vec<_>>(),
            vec![2.0, 3.0]
        );
        assert_eq!(player.synth_mut().take(), vec![Call::Release(2.0, 0, 67)]);

        assert!(player.tick(2.5).unwrap().is_empty());
        assert!(!player.has_ended(2.9));
        assert!(player.has_ended(3.0));
        let progress = player.position(3.5);
        assert_eq!(progress.position, 1.0);
        assert!(progress.is_playing);
    }

    #[test]
    fn dispatch_is_monotonic() {
        open! {raw: "Scale.mid"};
        open! {smf: [smf] raw};
        let mut player = player();
        player.load(&smf, 0.0).unwrap();
        player.play(0.0).unwrap();
        let mut times = Vec::new();
        let mut now = 0.0;
        while !player.has_ended(now) {
            times.extend(player.tick(now).unwrap().iter().map(|ev| ev.time));
            now += 0.025;
        }
        assert_eq!(times.len(), 18);
        assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_approx_eq!(times[times.len() - 1], 4.0);
        assert_eq!(player.active_notes(), 0);
    }

    #[test]
    fn pause_and_resume() {
        open! {raw: "Tempo.mid"};
        open! {smf: [smf] raw};
        let mut player = player();
        player.load(&smf, 0.0).unwrap();
        player.play(0.0).unwrap();
        player.tick(0.0).unwrap();
        player.synth_mut().take();

        player.pause(0.5).unwrap();
        assert_eq!(player.synth_mut().take(), vec![Call::Silence(0.5)]);
        assert_eq!(player.active_notes(), 0);
        let progress = player.position(7.0);
        assert!(!progress.is_playing);
        assert_approx_eq!(progress.current_time, 0.5);
        assert_approx_eq!(progress.position, 0.5 / 3.0);
        assert!(player.tick(8.0).unwrap().is_empty());

        player.play(10.0).unwrap();
        assert_approx_eq!(player.position(10.0).current_time, 0.5);
        let evs = player.tick(10.0).unwrap();
        assert_eq!(
            evs.iter().map(|ev| ev.time).collect::<Vec<_>>(),
            vec![10.5, 10.5, 10.5, 11.5]
        );
        assert_eq!(
            player.synth_mut().take(),
            vec![Call::Emit(10.5, 0, 67, 100, Timbre::Program(u7::from(24)))]
        );
    }

    #[test]
    fn seek_while_playing() {
        open! {raw: "Tempo.mid"};
        open! {smf: [smf] raw};
        let mut player = player();
        player.load(&smf, 0.0).unwrap();
        player.play(0.0).unwrap();
        player.tick(0.0).unwrap();
        player.synth_mut().take();

        player.seek(0.5, 0.25).unwrap();
        assert_eq!(player.synth_mut().take(), vec![Call::Silence(0.25)]);
        assert_eq!(player.position(0.25).current_time, 1.0);
        let evs = player.tick(0.25).unwrap();
        assert_eq!(evs.len(), 1);
        assert_eq!(evs[0].time, 1.25);
        assert_eq!(evs[0].kind, TrackEventKind::Meta(MetaMessage::EndOfTrack));
    }

    #[test]
    fn seek_while_stopped() {
        open! {raw: "Tempo.mid"};
        open! {smf: [smf] raw};
        let mut player = player();
        player.load(&smf, 0.0).unwrap();
        player.seek(0.5, 0.0).unwrap();
        assert!(!player.position(0.0).is_playing);
        assert_approx_eq!(player.position(0.0).current_time, 1.0);
        player.play(5.0).unwrap();
        let evs = player.tick(5.0).unwrap();
        assert_eq!(evs.iter().map(|ev| ev.time).collect::<Vec<_>>(), vec![6.0]);
    }

    #[test]
    fn stop_rewinds() {
        open! {raw: "Scale.mid"};
        open! {smf: [smf] raw};
        let mut player = player();
        player.load(&smf, 0.0).unwrap();
        player.play(0.0).unwrap();
        player.tick(1.0).unwrap();
        player.stop(1.0);
        assert_eq!(player.position(2.0).current_time, 0.0);
        player.synth_mut().take();
        player.play(2.0).unwrap();
        let evs = player.tick(2.0).unwrap();
        assert_eq!(
            evs[0].kind,
            TrackEventKind::Meta(MetaMessage::TrackName(b"Scale"))
        );
        assert_eq!(evs[0].time, 2.0);
    }

    #[test]
    fn nothing_loaded() {
        let mut player = player();
        player.play(0.0).unwrap();
        player.seek(0.5, 0.0).unwrap();
        assert!(player.tick(0.0).unwrap().is_empty());
        assert!(!player.has_ended(0.0));
        assert_eq!(player.position(0.0).duration, 0.0);
    }

    #[test]
    fn smpte_cannot_play() {
        open! {raw: "Smpte.mid"};
        open! {smf: [smf] raw};
        let mut player = player();
        player.load(&smf, 0.0).unwrap();
        assert_eq!(player.duration(), 0.0);
        assert!(matches!(
            player.play(0.0).unwrap_err().kind(),
            ErrorKind::UnsupportedDivision(_)
        ));
        assert!(matches!(
            player.seek(0.5, 0.0).unwrap_err().kind(),
            ErrorKind::UnsupportedDivision(_)
        ));
        assert!(player.tick(0.0).unwrap().is_empty());
    }

    #[cfg(not(feature = "strict"))]
    #[test]
    fn load_fails_on_corrupt_track() {
        let bad: &[u8] = &[0x00, 0x90, 0x3C, 0x64, 0x60, 0xF5];
        let raw = build_smf(0, 96, &[bad]);
        let smf = Smf::parse(&raw).unwrap();
        let mut player = player();
        assert!(player.load(&smf, 0.0).is_err());
        assert_eq!(player.duration(), 0.0);
    }

    #[test]
    fn corrupt_track_aborts_playback() {
        let raw = build_smf(0, 96, &[SCENARIO_TRACK]);
        let mut smf = Smf::parse(&raw).unwrap();
        //Memoize the duration of the intact track, then swap in a corrupt one
        assert_eq!(smf.duration().unwrap(), 0.5);
        smf.tracks[0] = &[0x00, 0x90, 0x3C, 0x64, 0x60, 0xF5];
        let mut player = player();
        player.load(&smf, 0.0).unwrap();
        player.play(0.0).unwrap();
        assert!(matches!(
            player.tick(0.0).unwrap_err().kind(),
            ErrorKind::UnknownStatusByte(_)
        ));
        assert_eq!(
            player.synth_mut().take(),
            vec![Call::Emit(0.0, 0, 60, 100, Timbre::Program(u7::from(0)))]
        );
        assert!(player.tick(0.5).unwrap().is_empty());
        assert!(player.has_ended(0.5));
    }

    #[test]
    fn seek_while_paused() {
        open! {raw: "Tempo.mid"};
        open! {smf: [smf] raw};
        let mut player = player();
        player.load(&smf, 0.0).unwrap();
        player.play(0.0).unwrap();
        player.tick(0.0).unwrap();
        player.pause(0.5).unwrap();
        player.synth_mut().take();

        player.seek(0.5, 3.0).unwrap();
        assert_eq!(player.phase(), crate::Phase::Paused);
        assert_eq!(player.synth_mut().take(), vec![Call::Silence(3.0)]);
        let progress = player.position(4.0);
        assert!(!progress.is_playing);
        assert_approx_eq!(progress.current_time, 1.0);
        assert!(player.tick(4.0).unwrap().is_empty());

        player.play(5.0).unwrap();
        assert_approx_eq!(player.position(5.0).current_time, 1.0);
        let evs = player.tick(5.0).unwrap();
        assert_eq!(evs.len(), 1);
        assert_approx_eq!(evs[0].time, 6.0);
        assert_eq!(evs[0].track, 0);
        assert_eq!(evs[0].kind, TrackEventKind::Meta(MetaMessage::EndOfTrack));
        let evs = player.tick(6.0).unwrap();
        assert_eq!(evs.len(), 2);
        assert_approx_eq!(evs[1].time, 7.0);
        //Notes were forgotten when pausing, so there is nothing to release
        assert!(player.synth_mut().take().is_empty());
    }

    #[test]
    fn pause_after_the_end() {
        open! {raw: "Tempo.mid"};
        open! {smf: [smf] raw};
        let mut player = player();
        player.load(&smf, 0.0).unwrap();
        player.play(0.0).unwrap();
        let mut now = 0.0;
        while !player.has_ended(now) {
            player.tick(now).unwrap();
            now += 0.5;
        }
        player.pause(10.0).unwrap();
        let progress = player.position(10.0);
        assert!(!progress.is_playing);
        assert_eq!(progress.position, 1.0);
        assert_approx_eq!(progress.current_time, 3.0);

        player.play(20.0).unwrap();
        let evs = player.tick(20.0).unwrap();
        assert_eq!(evs.len(), 1);
        assert_approx_eq!(evs[0].time, 20.0);
        assert_eq!(evs[0].kind, TrackEventKind::Meta(MetaMessage::EndOfTrack));
        assert!(player.has_ended(20.0));
    }

    #[test]
    fn sustain_pedal() {
        let track: &[u8] = &[
            0x00, 0xB0, 0x40, 0x7F, //pedal down
            0x00, 0x90, 0x3C, 0x64, //
            0x60, 0x80, 0x3C, 0x40, //
            0x60, 0xB0, 0x40, 0x00, //pedal up
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let raw = build_smf(0, 96, &[track]);
        let smf = Smf::parse(&raw).unwrap();
        let mut player = player();
        player.load(&smf, 0.0).unwrap();
        player.play(0.0).unwrap();
        player.tick(0.0).unwrap();
        assert_eq!(
            player.synth_mut().take(),
            vec![
                Call::Emit(0.0, 0, 60, 100, Timbre::Program(u7::from(0))),
                Call::Release(1.0, 0, 60),
            ]
        );
    }

    #[test]
    fn note_handling() {
        let track: &[u8] = &[
            0x00, 0x90, 0x3C, 0x64, //
            0x00, 0x3C, 0x50, //retrigger
            0x00, 0x3C, 0x00, //velocity 0 releases
            0x00, 0x3C, 0x00, //nothing left to release
            0x00, 0x99, 0x24, 0x64, //percussion
            0x00, 0xB0, 0x07, 0x50, //volume
            0x00, 0xB0, 0x7B, 0x00, //all notes off
        ];
        let raw = build_smf(0, 96, &[track]);
        let smf = Smf::parse(&raw).unwrap();
        let mut player = player();
        player.load(&smf, 0.0).unwrap();
        player.play(0.0).unwrap();
        player.tick(0.0).unwrap();
        assert_eq!(
            player.synth_mut().take(),
            vec![
                Call::Emit(0.0, 0, 60, 100, Timbre::Program(u7::from(0))),
                Call::Release(0.0, 0, 60),
                Call::Emit(0.0, 0, 60, 80, Timbre::Program(u7::from(0))),
                Call::Release(0.0, 0, 60),
                Call::Emit(0.0, 9, 36, 100, Timbre::Percussion),
                Call::Control(0.0, 0, ChannelControl::Volume(u7::from(0x50))),
            ]
        );
        assert_eq!(player.active_notes(), 1);
    }

    #[test]
    fn strategies() {
        let track: &[u8] = &[
            0x00, 0xC0, 0x18, //
            0x00, 0x90, 0x3C, 0x64, //
            0x00, 0x99, 0x24, 0x64, //
            0x00, 0xB0, 0x07, 0x50, //
            0x00, 0xB0, 0x40, 0x7F, //
            0x00, 0x80, 0x3C, 0x40,
        ];
        let raw = build_smf(0, 96, &[track]);
        let smf = Smf::parse(&raw).unwrap();
        let mut player = Player::new(
            Recorder::default(),
            PlayerConfig {
                strategies: Strategies {
                    percussion: Percussion::Disabled,
                    instruments: Instruments::Fixed(5),
                    controllers: Controllers::Disabled,
                },
                ..PlayerConfig::default()
            },
        );
        player.load(&smf, 0.0).unwrap();
        player.play(0.0).unwrap();
        player.tick(0.0).unwrap();
        assert_eq!(
            player.synth_mut().take(),
            vec![
                Call::Emit(0.0, 0, 60, 100, Timbre::Program(u7::from(5))),
                Call::Release(0.0, 0, 60),
            ]
        );

        player.set_strategies(Strategies::default());
        assert_eq!(player.strategies(), Strategies::default());
        player.seek(0.0, 1.0).unwrap();
        player.tick(1.0).unwrap();
        assert_eq!(
            player.synth_mut().take(),
            vec![
                Call::Silence(1.0),
                Call::Emit(1.0, 0, 60, 100, Timbre::Program(u7::from(24))),
                Call::Emit(1.0, 9, 36, 100, Timbre::Percussion),
                Call::Control(1.0, 0, ChannelControl::Volume(u7::from(0x50))),
            ]
        );
        assert_eq!(player.active_notes(), 2);
    }

    #[test]
    fn load_replaces_file() {
        open! {scale: "Scale.mid"};
        open! {tempo: "Tempo.mid"};
        open! {scale: [smf] scale};
        open! {tempo: [smf] tempo};
        let mut player = player();
        player.load(&scale, 0.0).unwrap();
        player.play(0.0).unwrap();
        player.tick(0.0).unwrap();
        player.synth_mut().take();
        player.load(&tempo, 0.5).unwrap();
        assert_eq!(player.synth_mut().take(), vec![Call::Silence(0.5)]);
        assert_eq!(player.phase(), crate::Phase::Stopped);
        assert_approx_eq!(player.duration(), 3.0);
        assert_eq!(player.position(0.5).current_time, 0.0);
    }

    #[test]
    fn driven_by_clock() {
        use crate::{Clock, SystemClock};
        use std::cell::Cell;

        let system = SystemClock::new();
        let first = system.now();
        assert!(first >= 0.0);
        assert!(system.now() >= first);

        let time = Cell::new(0.0);
        let clock = || time.get();
        open! {scale: "Scale.mid"};
        open! {scale: [smf] scale};
        let mut player = player();
        player.load(&scale, clock.now()).unwrap();
        player.play(clock.now()).unwrap();
        while !player.has_ended(clock.now()) {
            player.tick(clock.now()).unwrap();
            time.set(time.get() + 0.25);
        }
        assert_approx_eq!(clock.now(), 4.0);
        assert_eq!(player.active_notes(), 0);
    }
}
