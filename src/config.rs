//! Runtime configuration of the player.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What to do with notes of the percussion channel (channel 10, or index 9).
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Percussion {
    /// Play them with `Timbre::Percussion`.
    #[default]
    Enabled,
    /// Do not play them.
    Disabled,
}

/// Which timbre to play melodic notes with.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Instruments {
    /// Follow the `ProgramChange` events of the file.
    #[default]
    FromFile,
    /// Play every melodic note with the given program, masked to 7 bits.
    Fixed(u8),
    /// Ignore `ProgramChange` events, playing everything with program 0.
    Default,
}

/// Whether controller events are interpreted.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Controllers {
    /// Apply sustain, the channel mode messages and forward volume, pan and expression.
    #[default]
    Enabled,
    /// Ignore every `Controller` event.
    Disabled,
}

/// How the player interprets the events of a file.
///
/// Can be swapped while playing, affecting events dispatched from then on.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Strategies {
    pub percussion: Percussion,
    pub instruments: Instruments,
    pub controllers: Controllers,
}

/// Player configuration.
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlayerConfig {
    /// How far ahead of the current time events are dispatched on every tick, in seconds.
    pub lookahead: f64,
    /// How often the host should call `Player::tick`, in seconds.
    ///
    /// Should be well under `lookahead`, otherwise notes will be late.
    pub tick_interval: f64,
    /// Initial strategies.
    pub strategies: Strategies,
}
impl Default for PlayerConfig {
    fn default() -> PlayerConfig {
        PlayerConfig {
            lookahead: 1.0,
            tick_interval: 0.025,
            strategies: Strategies::default(),
        }
    }
}
