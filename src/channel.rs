//! Per-channel playback state.

use crate::{
    config::{Controllers, Instruments, Percussion, Strategies},
    event::MidiMessage,
    prelude::*,
    synth::{ChannelControl, Synth, Timbre},
};

/// Channel 10 in one-based numbering.
const PERCUSSION_CHANNEL: u8 = 9;

const CC_VOLUME: u8 = 7;
const CC_PAN: u8 = 10;
const CC_EXPRESSION: u8 = 11;
const CC_SUSTAIN: u8 = 64;
const CC_RESET_ALL_CONTROLLERS: u8 = 121;
const CC_ALL_NOTES_OFF: u8 = 123;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum NoteState {
    Off,
    On,
    /// Released while the sustain pedal was down.
    Sustained,
}

#[derive(Clone, Debug)]
struct Channel {
    notes: [NoteState; 128],
    sustain: bool,
    program: u7,
}
impl Channel {
    fn new() -> Channel {
        Channel {
            notes: [NoteState::Off; 128],
            sustain: false,
            program: u7::new(0),
        }
    }

    /// Release every note in one of the given states.
    fn release_where<S: Synth>(
        &mut self,
        synth: &mut S,
        time: f64,
        channel: u4,
        which: impl Fn(NoteState) -> bool,
    ) {
        for (key, note) in self.notes.iter_mut().enumerate() {
            if *note != NoteState::Off && which(*note) {
                synth.release(time, channel, u7::new(key as u8));
                *note = NoteState::Off;
            }
        }
    }
}

/// The state of all 16 MIDI channels, as built up by the events dispatched so far.
#[derive(Clone, Debug)]
pub(crate) struct Channels {
    channels: Vec<Channel>,
}
impl Channels {
    pub(crate) fn new() -> Channels {
        Channels {
            channels: vec![Channel::new(); 16],
        }
    }

    /// Forget every sounding note, after the synthesizer has been silenced.
    pub(crate) fn clear_notes(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.notes = [NoteState::Off; 128];
        }
    }

    /// How many notes are currently sounding, sustained ones included.
    pub(crate) fn active_notes(&self) -> usize {
        self.channels
            .iter()
            .flat_map(|channel| channel.notes.iter())
            .filter(|note| **note != NoteState::Off)
            .count()
    }

    /// Apply a channel message, forwarding its effects to the synthesizer.
    pub(crate) fn apply<S: Synth>(
        &mut self,
        synth: &mut S,
        strategies: &Strategies,
        time: f64,
        channel: u4,
        message: MidiMessage,
    ) {
        let percussion = channel == PERCUSSION_CHANNEL;
        let state = &mut self.channels[channel.as_int() as usize];
        match message {
            MidiMessage::NoteOn { key, vel } if vel > 0 => {
                if percussion && strategies.percussion == Percussion::Disabled {
                    return;
                }
                let note = &mut state.notes[key.as_int() as usize];
                if *note != NoteState::Off {
                    //Retrigger
                    synth.release(time, channel, key);
                }
                *note = NoteState::On;
                let timbre = if percussion {
                    Timbre::Percussion
                } else {
                    match strategies.instruments {
                        Instruments::FromFile => Timbre::Program(state.program),
                        Instruments::Fixed(program) => Timbre::Program(u7::from(program)),
                        Instruments::Default => Timbre::Program(u7::new(0)),
                    }
                };
                synth.emit(time, channel, key, vel, timbre);
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                let note = &mut state.notes[key.as_int() as usize];
                match *note {
                    NoteState::Off => {}
                    _ if state.sustain => *note = NoteState::Sustained,
                    _ => {
                        synth.release(time, channel, key);
                        *note = NoteState::Off;
                    }
                }
            }
            MidiMessage::Controller { controller, value } => {
                if strategies.controllers == Controllers::Disabled {
                    return;
                }
                match controller.as_int() {
                    CC_SUSTAIN => {
                        state.sustain = value >= 64;
                        if !state.sustain {
                            state.release_where(synth, time, channel, |note| {
                                note == NoteState::Sustained
                            });
                        }
                    }
                    CC_ALL_NOTES_OFF => state.release_where(synth, time, channel, |_| true),
                    CC_RESET_ALL_CONTROLLERS => {
                        state.sustain = false;
                        state.release_where(synth, time, channel, |note| {
                            note == NoteState::Sustained
                        });
                        synth.control(time, channel, ChannelControl::Volume(u7::max_value()));
                        synth.control(time, channel, ChannelControl::Pan(u7::new(64)));
                        synth.control(
                            time,
                            channel,
                            ChannelControl::Expression(u7::max_value()),
                        );
                    }
                    CC_VOLUME => synth.control(time, channel, ChannelControl::Volume(value)),
                    CC_PAN => synth.control(time, channel, ChannelControl::Pan(value)),
                    CC_EXPRESSION => {
                        synth.control(time, channel, ChannelControl::Expression(value))
                    }
                    other => tracing::trace!(
                        channel = channel.as_int(),
                        controller = other,
                        "ignored controller"
                    ),
                }
            }
            MidiMessage::ProgramChange { program } => state.program = program,
            MidiMessage::PitchBend { bend } => {
                synth.control(time, channel, ChannelControl::PitchBend(bend))
            }
            MidiMessage::ChannelAftertouch { vel } => {
                synth.control(time, channel, ChannelControl::Pressure(vel))
            }
            MidiMessage::Aftertouch { .. } => {}
        }
    }
}
