//! All sort of events and their parsers.

use crate::{prelude::*, tempo::Tempo};

/// Represents a parsed SMF track event.
///
/// Consists of a delta time (in MIDI ticks relative to the previous event in the same track) and
/// the actual track event.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct TrackEvent<'a> {
    /// How many MIDI ticks after the previous event should this event fire.
    pub delta: u28,
    /// The type of event along with event-specific data.
    pub kind: TrackEventKind<'a>,
}
impl<'a> TrackEvent<'a> {
    /// Advances the slice and updates `running_status`.
    ///
    /// In case of failure the slice might be left in the middle of an event!
    pub(crate) fn read(
        raw: &mut &'a [u8],
        running_status: &mut Option<u8>,
    ) -> Result<TrackEvent<'a>> {
        let delta = u28::read_varlen(raw).context("failed to read event deltatime")?;
        let kind = TrackEventKind::read(raw, running_status).context("failed to parse event")?;
        Ok(TrackEvent { delta, kind })
    }
}

/// Represents the different kinds of SMF events and their associated data.
///
/// It notably does *not* include the timing of the event; the `TrackEvent` struct is responsible
/// for this.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum TrackEventKind<'a> {
    /// A message associated to a MIDI channel carrying musical data.
    ///
    /// Usually, the bulk of MIDI data is these kind of messages.
    Midi {
        /// The MIDI channel that this event is associated with.
        channel: u4,
        /// The MIDI message type and associated data.
        message: MidiMessage,
    },
    /// A System Exclusive message (status `0xF0`), carrying arbitrary data.
    ///
    /// The data bytes included here do not include the implicit `0xF0` prefix.
    SysEx(&'a [u8]),
    /// An escape sequence (status `0xF7`), intended to send arbitrary data to the synthesizer.
    Escape(&'a [u8]),
    /// A meta-message, giving extra information for correct playback, like tempo, song name,
    /// lyrics, etc...
    Meta(MetaMessage<'a>),
}
impl<'a> TrackEventKind<'a> {
    fn read(raw: &mut &'a [u8], running_status: &mut Option<u8>) -> Result<TrackEventKind<'a>> {
        //Read status
        let mut status = *raw
            .first()
            .ok_or(err_truncated!("failed to read status"))?;
        if status < 0x80 {
            //Running status!
            status = running_status.ok_or(err_running_status!(
                "event missing status with no running status active"
            ))?;
        } else {
            //Advance slice 1 byte to consume status. Note that because we already did `first()`,
            //we can use panicking index here
            *raw = &raw[1..];
            //Every explicit status is remembered, meta and sysex included
            *running_status = Some(status);
        }
        //Delegate further parsing depending on status
        let kind = match status {
            0x80..=0xEF => {
                let (channel, message) = MidiMessage::read(status, raw)?;
                TrackEventKind::Midi { channel, message }
            }
            0xFF => {
                TrackEventKind::Meta(MetaMessage::read(raw).context("failed to read meta event")?)
            }
            0xF0 => TrackEventKind::SysEx(
                read_varlen_slice(raw).context("failed to read sysex event")?,
            ),
            0xF7 => TrackEventKind::Escape(
                read_varlen_slice(raw).context("failed to read escape event")?,
            ),
            0xF1..=0xF6 => bail!(err_status!(
                "standard midi files cannot contain system common events"
            )),
            0xF8..=0xFE => bail!(err_status!(
                "standard midi files cannot contain system realtime events"
            )),
            0x00..=0x7F => bail!(err_status!("running status without top bit set")),
        };
        Ok(kind)
    }

    /// If this event is a `SetTempo` meta event, the tempo it sets.
    #[inline]
    pub fn tempo(&self) -> Option<Tempo> {
        match self {
            TrackEventKind::Meta(MetaMessage::Tempo(micros)) => Some(Tempo::new(micros.as_int())),
            _ => None,
        }
    }
}

/// Represents a MIDI message, usually associated to a MIDI channel.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum MidiMessage {
    /// Stop playing a note.
    NoteOff {
        /// The MIDI key to stop playing.
        key: u7,
        /// The velocity with which to stop playing it.
        vel: u7,
    },
    /// Start playing a note.
    NoteOn {
        /// The key to start playing.
        key: u7,
        /// The velocity (strength) with which to press it.
        ///
        /// Note that by convention a `NoteOn` message with a velocity of 0 is equivalent to a
        /// `NoteOff`.
        vel: u7,
    },
    /// Modify the velocity of a note after it has been played.
    Aftertouch {
        /// The key for which to modify its velocity.
        key: u7,
        /// The new velocity for the key.
        vel: u7,
    },
    /// Modify the value of a MIDI controller.
    Controller {
        /// The controller to modify.
        ///
        /// See the MIDI spec for the meaning of each index.
        controller: u7,
        /// The value to set it to.
        value: u7,
    },
    /// Change the program (also known as instrument) for a channel.
    ProgramChange {
        /// The new program (instrument) to use for the channel.
        program: u7,
    },
    /// Change the note velocity of a whole channel at once, without starting new notes.
    ChannelAftertouch {
        /// The new velocity for all notes currently playing in the channel.
        vel: u7,
    },
    /// Set the pitch bend value for the entire channel.
    PitchBend {
        /// The new pitch-bend value.
        bend: PitchBend,
    },
}
impl MidiMessage {
    /// Midi messages have a known length.
    /// Only `ProgramChange` and `ChannelAftertouch` carry a single data byte.
    pub(crate) fn msg_length(status: u8) -> usize {
        const LENGTH_BY_STATUS: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 2, 2, 2, 2, 1, 1, 2, 0];
        LENGTH_BY_STATUS[(status >> 4) as usize] as usize
    }

    /// Reads the data bytes that follow a channel status byte.
    ///
    /// `status` must be a MIDI message status (0x80..=0xEF).
    pub(crate) fn read(status: u8, raw: &mut &[u8]) -> Result<(u4, MidiMessage)> {
        let data0 = u7::read_data(raw)?;
        let data1 = if Self::msg_length(status) == 2 {
            u7::read_data(raw)?
        } else {
            u7::new(0)
        };
        let channel = u4::from(status);
        let msg = match status >> 4 {
            0x8 => MidiMessage::NoteOff {
                key: data0,
                vel: data1,
            },
            0x9 => MidiMessage::NoteOn {
                key: data0,
                vel: data1,
            },
            0xA => MidiMessage::Aftertouch {
                key: data0,
                vel: data1,
            },
            0xB => MidiMessage::Controller {
                controller: data0,
                value: data1,
            },
            0xC => MidiMessage::ProgramChange { program: data0 },
            0xD => MidiMessage::ChannelAftertouch { vel: data0 },
            0xE => {
                //Note the little-endian order, contrasting with the default big-endian order of
                //Standard Midi Files
                let lsb = data0.as_int() as u16;
                let msb = data1.as_int() as u16;
                MidiMessage::PitchBend {
                    bend: PitchBend(u14::from(msb << 7 | lsb)),
                }
            }
            _ => bail!(err_status!("channel message status out of range")),
        };
        Ok((channel, msg))
    }

    /// Get the raw status nibble (the message type) for this MIDI message.
    pub fn status_nibble(&self) -> u8 {
        match self {
            MidiMessage::NoteOff { .. } => 0x8,
            MidiMessage::NoteOn { .. } => 0x9,
            MidiMessage::Aftertouch { .. } => 0xA,
            MidiMessage::Controller { .. } => 0xB,
            MidiMessage::ProgramChange { .. } => 0xC,
            MidiMessage::ChannelAftertouch { .. } => 0xD,
            MidiMessage::PitchBend { .. } => 0xE,
        }
    }
}

/// The value of a pitch bend, represented as 14 bits.
///
/// A value of `0x0000` indicates full bend downwards.
/// A value of `0x2000` indicates no bend.
/// A value of `0x3FFF` indicates full bend upwards.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct PitchBend(pub u14);
impl PitchBend {
    /// The middle value of `0x2000`, indicating no bend.
    #[inline]
    pub const fn mid_raw_value() -> PitchBend {
        PitchBend(u14::new(0x2000))
    }

    /// Returns an int in the range `[-0x2000, 0x1FFF]`.
    #[inline]
    pub fn as_int(self) -> i16 {
        self.0.as_int() as i16 - 0x2000
    }

    /// Returns an `f64` in the range `[-1.0, 1.0)`.
    #[inline]
    pub fn as_f64(self) -> f64 {
        self.as_int() as f64 * (1.0 / 0x2000 as f64)
    }

    /// The frequency multiplier this bend applies, given the bend range in semitones.
    ///
    /// General MIDI synthesizers default to a range of 2 semitones.
    #[inline]
    pub fn to_multiplier(self, range: f64) -> f64 {
        (self.as_f64() * range / 12.0).exp2()
    }
}

/// A "meta message", as defined by the SMF spec.
/// These events carry metadata about the track, such as tempo, time signature, copyright, etc...
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum MetaMessage<'a> {
    /// For `Format::Sequential` MIDI file types, `TrackNumber` can be empty, and defaults to
    /// the track index.
    TrackNumber(Option<u16>),
    /// Arbitrary text associated to an instant.
    Text(&'a [u8]),
    /// A copyright notice.
    Copyright(&'a [u8]),
    /// Information about the name of the track.
    TrackName(&'a [u8]),
    /// Information about the name of the current instrument.
    InstrumentName(&'a [u8]),
    /// Arbitrary lyric information associated to an instant.
    Lyric(&'a [u8]),
    /// Arbitrary marker text associated to an instant.
    Marker(&'a [u8]),
    /// Arbitrary cue point text associated to an instant.
    CuePoint(&'a [u8]),
    /// Obligatory at track end.
    EndOfTrack,
    /// Amount of microseconds per beat (quarter note).
    ///
    /// Usually appears at the beginning of a track, before any midi events are sent, but there
    /// are no guarantees.
    Tempo(u24),
    /// The SMPTE time at which the track is supposed to start, as hours, minutes, seconds,
    /// frames and fractional frames (hundredths of a frame).
    ///
    /// The top bits of the hour byte encode the frame rate and are kept as found.
    SmpteOffset([u8; 5]),
    /// In order of the MIDI specification, numerator, denominator, MIDI clocks per click, 32nd
    /// notes per quarter
    TimeSignature(u8, u8, u8, u8),
    /// As in the MIDI specification, negative numbers indicate number of flats and positive
    /// numbers indicate number of sharps.
    /// `false` indicates a major scale, `true` indicates a minor scale.
    KeySignature(i8, bool),
    /// Arbitrary data intended for the sequencer.
    /// This data is never sent to a device.
    SequencerSpecific(&'a [u8]),
    /// A meta-message that is not interpreted by this crate, or whose payload is too short for
    /// its type.
    ///
    /// The first `u8` is the raw meta-message type byte.
    /// The slice is the actual payload of the meta-message.
    Unknown(u8, &'a [u8]),
}
impl<'a> MetaMessage<'a> {
    fn read(raw: &mut &'a [u8]) -> Result<MetaMessage<'a>> {
        let type_byte = u8::read(raw).context("failed to read meta message type")?;
        let mut data = read_varlen_slice(raw).context("failed to read meta message data")?;
        Ok(match type_byte {
            0x00 => MetaMessage::TrackNumber({
                if data.len() >= 2 {
                    Some(u16::read(&mut data)?)
                } else {
                    None
                }
            }),
            0x01 => MetaMessage::Text(data),
            0x02 => MetaMessage::Copyright(data),
            0x03 => MetaMessage::TrackName(data),
            0x04 => MetaMessage::InstrumentName(data),
            0x05 => MetaMessage::Lyric(data),
            0x06 => MetaMessage::Marker(data),
            0x07 => MetaMessage::CuePoint(data),
            0x2F => MetaMessage::EndOfTrack,
            0x51 if data.len() >= 3 => MetaMessage::Tempo(u24::read(&mut data)?),
            0x54 if data.len() >= 5 => {
                let mut offset = [0; 5];
                offset.copy_from_slice(&data[..5]);
                MetaMessage::SmpteOffset(offset)
            }
            0x58 if data.len() >= 4 => MetaMessage::TimeSignature(
                u8::read(&mut data)?,
                u8::read(&mut data)?,
                u8::read(&mut data)?,
                u8::read(&mut data)?,
            ),
            0x59 if data.len() >= 2 => {
                MetaMessage::KeySignature(u8::read(&mut data)? as i8, u8::read(&mut data)? != 0)
            }
            0x7F => MetaMessage::SequencerSpecific(data),
            _ => MetaMessage::Unknown(type_byte, data),
        })
    }

    /// The raw meta type byte, as found in the file.
    pub fn meta_type(&self) -> u8 {
        match self {
            MetaMessage::TrackNumber(_) => 0x00,
            MetaMessage::Text(_) => 0x01,
            MetaMessage::Copyright(_) => 0x02,
            MetaMessage::TrackName(_) => 0x03,
            MetaMessage::InstrumentName(_) => 0x04,
            MetaMessage::Lyric(_) => 0x05,
            MetaMessage::Marker(_) => 0x06,
            MetaMessage::CuePoint(_) => 0x07,
            MetaMessage::EndOfTrack => 0x2F,
            MetaMessage::Tempo(_) => 0x51,
            MetaMessage::SmpteOffset(_) => 0x54,
            MetaMessage::TimeSignature(..) => 0x58,
            MetaMessage::KeySignature(..) => 0x59,
            MetaMessage::SequencerSpecific(_) => 0x7F,
            MetaMessage::Unknown(type_byte, _) => *type_byte,
        }
    }
}
