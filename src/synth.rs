//! The interface to whatever actually makes sound.

use crate::{event::PitchBend, prelude::*};

/// The sound a note should be played with.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Timbre {
    /// A General MIDI program (instrument) number.
    Program(u7),
    /// A percussion kit, where every key is a different drum sound.
    Percussion,
}

/// Channel-wide parameters, forwarded to the synthesizer as they change.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ChannelControl {
    /// Channel volume (controller 7).
    Volume(u7),
    /// Stereo position, with `64` at the center (controller 10).
    Pan(u7),
    /// Expression, a fraction of the channel volume (controller 11).
    Expression(u7),
    /// Pitch bend of every note in the channel.
    PitchBend(PitchBend),
    /// Channel pressure (aftertouch) applied to every note in the channel.
    Pressure(u7),
}

/// A sound emission device, driven by a [`Player`](struct.Player.html).
///
/// Every call carries the instant (in the same time base as the `now` values given to the
/// player) at which it should take effect. Since the player schedules ahead of time, these
/// instants are usually in the future, and implementations are expected to queue them.
///
/// Calls are issued in non-decreasing time order, except right after `silence_all`, which
/// cancels everything queued past its instant.
pub trait Synth {
    /// Start playing a note.
    fn emit(&mut self, time: f64, channel: u4, key: u7, vel: u7, timbre: Timbre);

    /// Stop playing a note.
    fn release(&mut self, time: f64, channel: u4, key: u7);

    /// Stop every sound immediately and forget anything scheduled after `time`.
    fn silence_all(&mut self, time: f64);

    /// Change a channel-wide parameter.
    ///
    /// Ignored by default.
    #[inline]
    fn control(&mut self, time: f64, channel: u4, control: ChannelControl) {
        let _ = (time, channel, control);
    }
}
impl<S: Synth + ?Sized> Synth for &mut S {
    #[inline]
    fn emit(&mut self, time: f64, channel: u4, key: u7, vel: u7, timbre: Timbre) {
        (**self).emit(time, channel, key, vel, timbre)
    }
    #[inline]
    fn release(&mut self, time: f64, channel: u4, key: u7) {
        (**self).release(time, channel, key)
    }
    #[inline]
    fn silence_all(&mut self, time: f64) {
        (**self).silence_all(time)
    }
    #[inline]
    fn control(&mut self, time: f64, channel: u4, control: ChannelControl) {
        (**self).control(time, channel, control)
    }
}

/// The frequency of a MIDI key in hertz, in equal temperament with A4 (key 69) at 440Hz.
#[inline]
pub fn note_to_frequency(key: u7) -> f64 {
    440.0 * ((key.as_int() as f64 - 69.0) / 12.0).exp2()
}
