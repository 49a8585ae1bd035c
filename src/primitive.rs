//! Simple building-block data that can be read in one go.
//! Also, primitives advance the file pointer when read.

use crate::prelude::*;

pub(crate) trait SplitChecked: Sized {
    fn split_checked(&mut self, at: usize) -> Option<Self>;
}
impl<'a> SplitChecked for &'a [u8] {
    #[inline]
    fn split_checked(&mut self, at: usize) -> Option<&'a [u8]> {
        if at > self.len() {
            None
        } else {
            let (extracted, remainder) = self.split_at(at);
            *self = remainder;
            Some(extracted)
        }
    }
}

/// Implemented on integer types for reading as big-endian.
pub(crate) trait IntRead: Sized {
    /// Reads a big-endian integer.
    fn read(data: &mut &[u8]) -> StdResult<Self, &'static ErrorKind>;
}

/// Implement simple big endian integer reads.
macro_rules! impl_read_int {
    {$( $int:ty ),*} => {
        $(
            impl IntRead for $int {
                #[inline]
                fn read(raw: &mut &[u8]) -> StdResult<$int, &'static ErrorKind> {
                    let bytes = raw.split_checked(mem::size_of::<$int>())
                        .ok_or(err_truncated!("failed to read the expected integer"))?;
                    Ok(bytes.iter().fold(0, |acc, byte| {
                        acc.checked_shl(8).unwrap_or(0) | *byte as $int
                    }))
                }
            }
        )*
    }
}
impl_read_int! {u8,u16,u32}

/// Slightly restricted integers.
macro_rules! restricted_int {
    {$(#[$attr:meta])* $name:ident : $inner:tt => $bits:expr} => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Default)]
        #[repr(transparent)]
        #[allow(non_camel_case_types)]
        pub struct $name($inner);
        impl From<$inner> for $name {
            /// Lossy conversion, loses the extra top bits.
            #[inline]
            fn from(raw: $inner) -> $name {
                $name::new(raw)
            }
        }
        impl From<$name> for $inner {
            #[inline]
            fn from(restricted: $name) -> $inner {restricted.0}
        }
        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
        impl $name {
            const MASK: $inner = (1 << $bits) - 1;

            /// The maximum value that this restricted integer can hold.
            #[inline]
            pub const fn max_value() -> $name {
                $name (Self::MASK)
            }

            /// Creates a restricted int from its non-restricted counterpart by masking off the
            /// extra bits.
            #[inline]
            pub const fn new(raw: $inner) -> $name {
                $name (raw & Self::MASK)
            }

            /// Returns `Some` if the raw integer is within range of the restricted integer, and
            /// `None` otherwise.
            #[inline]
            pub fn try_from(raw: $inner) -> Option<$name> {
                if raw <= Self::MASK {
                    Some($name(raw))
                } else {
                    None
                }
            }

            /// Get the inner integer out of the wrapper.
            /// The inner integer is guaranteed to be in range of the restricted wrapper.
            #[inline]
            pub fn as_int(self) -> $inner {
                Into::into(self)
            }
        }
        impl PartialEq<$inner> for $name {
            fn eq(&self, rhs: &$inner) -> bool {
                self.as_int() == *rhs
            }
        }
        impl PartialOrd<$inner> for $name {
            fn partial_cmp(&self, rhs: &$inner) -> Option<core::cmp::Ordering> {
                Some(self.as_int().cmp(rhs))
            }
        }
    };
}
restricted_int! {
    /// A 15-bit integer type.
    ///
    /// Wraps the `u16` type and ensures that the top bit is always zero.
    u15: u16 => 15
}
restricted_int! {
    /// A 14-bit integer type.
    ///
    /// Wraps the `u16` type and ensures that the top two bits are always zero.
    u14: u16 => 14
}
restricted_int! {
    /// A 7-bit integer type.
    ///
    /// Wraps the `u8` type and ensures that the top bit is always zero.
    u7: u8 => 7
}
restricted_int! {
    /// A 4-bit integer type.
    ///
    /// Wraps the `u8` type and ensures that the top 4 bits are always zero.
    u4: u8 => 4
}
restricted_int! {
    /// A 24-bit integer type.
    ///
    /// Wraps the `u32` type and ensures that the top 8 bits are always zero.
    u24: u32 => 24
}
restricted_int! {
    /// Referred to in the MIDI spec as "variable length int".
    u28: u32 => 28
}

impl u7 {
    /// Read a single data byte.
    ///
    /// Data bytes with the top bit set are truncated, unless the `strict` feature is enabled.
    pub(crate) fn read_data(raw: &mut &[u8]) -> StdResult<u7, &'static ErrorKind> {
        let byte = u8::read(raw).map_err(|_| err_truncated!("truncated midi message"))?;
        if cfg!(feature = "strict") {
            u7::try_from(byte).ok_or(err_malformed!("data byte with top bit set"))
        } else {
            Ok(u7::from(byte))
        }
    }
}

impl u24 {
    pub(crate) fn read(raw: &mut &[u8]) -> StdResult<u24, &'static ErrorKind> {
        let bytes = raw
            .split_checked(3)
            .ok_or(err_truncated!("failed to read u24 bytes"))?;
        //Using lossy `from` because value is guaranteed to be 24 bits (3 bytes)
        Ok(u24::from(
            bytes.iter().fold(0, |acc, byte| acc << 8 | *byte as u32),
        ))
    }
}

impl u28 {
    /// Read a variable-length quantity.
    ///
    /// Continuation bytes are consumed until one without the top bit shows up. Only the bottom
    /// 28 bits are kept; longer encodings are rejected in strict mode.
    pub(crate) fn read_varlen(raw: &mut &[u8]) -> StdResult<u28, &'static ErrorKind> {
        let mut int: u32 = 0;
        let mut len = 0;
        loop {
            let byte = match raw.split_checked(1) {
                Some(slice) => slice[0],
                None => bail!(err_truncated!("unexpected eof while reading varlen int")),
            };
            len += 1;
            int = int << 7 | bit_range(byte, 0..7) as u32;
            if bit_range(byte, 7..8) == 0 {
                break;
            }
        }
        if cfg!(feature = "strict") && len > 4 {
            bail!(err_malformed!("varlen integer larger than 4 bytes"));
        }
        Ok(u28::from(int))
    }
}

/// Reads a slice represented in the input as a `u28` `len` followed by `len` bytes.
pub(crate) fn read_varlen_slice<'a>(
    raw: &mut &'a [u8],
) -> StdResult<&'a [u8], &'static ErrorKind> {
    let len = u28::read_varlen(raw)?.as_int();
    raw.split_checked(len as usize)
        .ok_or(err_truncated!("incomplete varlen slice"))
}

/// The order in which tracks are laid out in a Standard Midi File.
///
/// Playback always merges every track by time, whatever the format.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Format {
    /// This file should have a single track only (format id 0).
    ///
    /// If the `strict` feature is enabled, an error is raised if the format is
    /// `Format::SingleTrack` and there is not exactly one track.
    SingleTrack,
    /// This file has several tracks that should be played simultaneously (format id 1).
    ///
    /// Usually the first track controls tempo and other song metadata.
    Parallel,
    /// This file has several independent tracks (format id 2).
    Sequential,
}
impl Format {
    pub(crate) fn read(raw: &mut &[u8]) -> Result<Format> {
        let format = u16::read(raw).context("failed to read smf format")?;
        Ok(match format {
            0 => Format::SingleTrack,
            1 => Format::Parallel,
            2 => Format::Sequential,
            _ => bail!(err_header!("invalid smf format")),
        })
    }

    /// The numeric format id as stored in the header.
    #[inline]
    pub fn id(&self) -> u16 {
        match self {
            Format::SingleTrack => 0,
            Format::Parallel => 1,
            Format::Sequential => 2,
        }
    }
}

/// The time division of an SMF file.
/// This can be in ticks/beat or ticks/frame.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Timing {
    /// Specifies ticks/beat (ticks per quarter note) as a 15-bit integer.
    ///
    /// The length of a beat is not fixed, so in order to fully describe the length of a MIDI
    /// tick the [`MetaMessage::Tempo`](enum.MetaMessage.html#variant.Tempo) event should be
    /// present.
    Metrical(u15),
    /// Specifies ticks per SMPTE frame.
    ///
    /// `format` is the raw high byte of the division read as a signed integer, that is, the
    /// negated frame rate (`-24`, `-25`, `-29` or `-30` in well-formed files).
    ///
    /// Files with this kind of division can be decoded, but they cannot be timed or played.
    Timecode { format: i8, ticks_per_frame: u8 },
}
impl Timing {
    pub(crate) fn read(raw: &mut &[u8]) -> Result<Timing> {
        let raw = u16::read(raw).context("failed to read midi timing")?;
        if bit_range(raw, 15..16) != 0 {
            Ok(Timing::Timecode {
                format: bit_range(raw, 8..16) as u8 as i8,
                ticks_per_frame: bit_range(raw, 0..8) as u8,
            })
        } else {
            Ok(Timing::Metrical(u15::from(raw)))
        }
    }

    /// The amount of ticks per quarter note, failing with `UnsupportedDivision` for SMPTE
    /// timing.
    pub fn ticks_per_beat(&self) -> Result<u15> {
        match *self {
            Timing::Metrical(tpb) if tpb > 0 => Ok(tpb),
            Timing::Metrical(_) => bail!(err_division!("zero ticks per quarter note")),
            Timing::Timecode { .. } => bail!(err_division!(
                "smpte division cannot be converted to seconds through tempo"
            )),
        }
    }
}
