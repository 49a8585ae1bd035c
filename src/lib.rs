//! # Overview
//!
//! `midiplay` decodes Standard Midi Files (.mid, .midi and RIFF-wrapped .rmi files) into a
//! single time-ordered stream of events, and drives real-time playback of that stream against an
//! external synthesizer.
//!
//! Decoding is lazy and zero-copy: loading a file only splits it into chunks and reads the
//! header, while track events are decoded on demand every time the file is traversed.
//!
//! ```rust
//! use midiplay::Smf;
//!
//! // Format 1, one track, 96 ticks per quarter note
//! let bytes = [
//!     0x4D, 0x54, 0x68, 0x64, 0, 0, 0, 6, 0, 1, 0, 1, 0, 0x60,
//!     0x4D, 0x54, 0x72, 0x6B, 0, 0, 0, 12,
//!     0x00, 0x90, 0x3C, 0x64,
//!     0x60, 0x80, 0x3C, 0x40,
//!     0x00, 0xFF, 0x2F, 0x00,
//! ];
//! let smf = Smf::parse(&bytes).unwrap();
//! assert_eq!(smf.track_count(), 1);
//! assert_eq!(smf.duration().unwrap(), 0.5);
//! ```
//!
//! # About lifetimes
//!
//! The `Smf` struct borrows the raw file bytes in order to avoid copying track data, so the byte
//! buffer must outlive it:
//!
//! ```rust,no_run
//! use std::fs;
//! use midiplay::Smf;
//!
//! // Load bytes into a buffer
//! let bytes = fs::read("test-asset/Scale.mid").unwrap();
//!
//! // Parse bytes in a separate step
//! let smf = Smf::parse(&bytes).unwrap();
//! ```
//!
//! In the same way, a [`Player`](struct.Player.html) borrows the `Smf` it is playing.
//!
//! # Playing files
//!
//! The player never sleeps or spawns threads. Instead, the host calls
//! [`Player::tick`](struct.Player.html#method.tick) periodically (every
//! [`PlayerConfig::tick_interval`](struct.PlayerConfig.html#structfield.tick_interval) seconds
//! is a good cadence) with the current time, and the player forwards every event due before
//! `now + lookahead` to a [`Synth`](trait.Synth.html), timestamped with the instant it should
//! sound at.
//!
//! ```rust
//! use midiplay::{Player, PlayerConfig, Smf, Synth, Timbre, num::{u4, u7}};
//!
//! #[derive(Default)]
//! struct Counter(usize);
//! impl Synth for Counter {
//!     fn emit(&mut self, _time: f64, _channel: u4, _key: u7, _vel: u7, _timbre: Timbre) {
//!         self.0 += 1;
//!     }
//!     fn release(&mut self, _time: f64, _channel: u4, _key: u7) {}
//!     fn silence_all(&mut self, _time: f64) {}
//! }
//!
//! # let bytes = [
//! #     0x4D, 0x54, 0x68, 0x64, 0, 0, 0, 6, 0, 1, 0, 1, 0, 0x60,
//! #     0x4D, 0x54, 0x72, 0x6B, 0, 0, 0, 12,
//! #     0x00, 0x90, 0x3C, 0x64,
//! #     0x60, 0x80, 0x3C, 0x40,
//! #     0x00, 0xFF, 0x2F, 0x00,
//! # ];
//! let smf = Smf::parse(&bytes).unwrap();
//! let mut player = Player::new(Counter::default(), PlayerConfig::default());
//! player.load(&smf, 0.0).unwrap();
//! player.play(0.0).unwrap();
//! player.tick(0.0).unwrap();
//! assert_eq!(player.synth().0, 1);
//! ```
//!
//! # About features
//!
//! - The `parallel` feature (enabled by default)
//!
//!   Decodes tracks on several threads through `rayon` when a file is validated on load.
//!   Validation only happens when the `strict` feature is enabled.
//!
//! - The `strict` feature
//!
//!   By default `midiplay` will attempt to plow through non-standard files, as long as they can
//!   be read unambiguously.
//!   By enabling the `strict` feature the decoder will reject SMF uncompliant files and every
//!   track will be decoded when the file is loaded, throwing errors of the kind
//!   `ErrorKind::Malformed` when such a situation arises.
//!
//! - The `serde` feature
//!
//!   Derives `Serialize` and `Deserialize` for the player configuration types.

macro_rules! bail {
    ($err:expr) => {{
        return Err($err.into());
    }};
}
macro_rules! ensure {
    ($cond:expr, $err:expr) => {{
        if !$cond {
            bail!($err)
        }
    }};
}

/// All of the errors this crate produces.
#[macro_use]
mod error;

mod prelude {
    pub(crate) use crate::{
        error::{ErrorKind, Result, ResultExt, StdResult},
        primitive::{read_varlen_slice, u14, u15, u24, u28, u4, u7, IntRead, SplitChecked},
    };
    pub(crate) use core::{fmt, mem, ops};

    pub(crate) fn bit_range<T>(val: T, range: ops::Range<u32>) -> T
    where
        T: From<u8>
            + ops::Shr<u32, Output = T>
            + ops::Shl<u32, Output = T>
            + ops::Not<Output = T>
            + ops::BitAnd<Output = T>,
    {
        let mask = !((!T::from(0)) << (range.end - range.start));
        (val >> range.start) & mask
    }
}

mod channel;
mod clock;
mod config;
mod event;
mod playback;
mod player;
mod primitive;
mod riff;
mod smf;
mod synth;
mod tempo;

pub use crate::{
    clock::{Clock, SystemClock},
    config::{Controllers, Instruments, Percussion, PlayerConfig, Strategies},
    error::{Error, ErrorKind, Result},
    event::{MetaMessage, MidiMessage, PitchBend, TrackEvent, TrackEventKind},
    playback::{Cursor, OrderedIter, TimedEvent},
    player::{Dispatch, Phase, Player, Progress},
    primitive::{Format, Timing},
    smf::{parse, EventIter, Header, Smf, TrackIter},
    synth::{note_to_frequency, ChannelControl, Synth, Timbre},
    tempo::{Seek, Tempo, TimedIter},
};

/// Exotically-sized integers used by the MIDI standard.
pub mod num {
    pub use crate::primitive::{u14, u15, u24, u28, u4, u7};
}

#[cfg(test)]
mod test;
