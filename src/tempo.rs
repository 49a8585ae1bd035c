//! Conversion of MIDI ticks into seconds.

use crate::{
    playback::{Cursor, OrderedIter, TimedEvent},
    prelude::*,
};

/// The length of a quarter note, in microseconds.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Tempo(u32);
impl Tempo {
    /// The tempo in effect until the first `SetTempo` event: 500000 microseconds per quarter
    /// note, or 120 beats per minute.
    pub const DEFAULT: Tempo = Tempo(500_000);

    #[inline]
    pub const fn new(micros_per_beat: u32) -> Tempo {
        Tempo(micros_per_beat)
    }

    #[inline]
    pub fn micros_per_beat(self) -> u32 {
        self.0
    }

    /// Quarter notes per minute.
    #[inline]
    pub fn bpm(self) -> f64 {
        60_000_000.0 / self.0 as f64
    }

    /// The length of a single tick, in seconds.
    #[inline]
    pub fn tick_duration(self, ticks_per_beat: u15) -> f64 {
        self.0 as f64 / (ticks_per_beat.as_int() as f64 * 1_000_000.0)
    }

    /// The length of `ticks` ticks, in seconds.
    ///
    /// Equivalent to `ticks * tick_duration`, with a single rounding step.
    #[inline]
    pub fn ticks_to_seconds(self, ticks: u32, ticks_per_beat: u15) -> f64 {
        ticks as f64 * self.0 as f64 / (ticks_per_beat.as_int() as f64 * 1_000_000.0)
    }
}
impl Default for Tempo {
    #[inline]
    fn default() -> Tempo {
        Tempo::DEFAULT
    }
}

/// The merged event stream of a file, with the delta of every event converted to seconds.
///
/// The delta of an event is measured with the tempo in effect before it, so a `SetTempo` event
/// only affects the events that follow it.
#[derive(Clone, Debug)]
pub struct TimedIter<'a> {
    ordered: OrderedIter<'a>,
    ticks_per_beat: u15,
    tempo: Tempo,
}
impl<'a> TimedIter<'a> {
    /// Time a merged stream, starting with the default tempo.
    #[inline]
    pub fn new(ordered: OrderedIter<'a>, ticks_per_beat: u15) -> TimedIter<'a> {
        TimedIter {
            ordered,
            ticks_per_beat,
            tempo: Tempo::DEFAULT,
        }
    }

    /// The tempo in effect for the next event.
    #[inline]
    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    #[inline]
    pub fn ticks_per_beat(&self) -> u15 {
        self.ticks_per_beat
    }

    /// Recover the underlying merged stream, positioned after the last yielded event.
    #[inline]
    pub fn into_ordered(self) -> OrderedIter<'a> {
        self.ordered
    }
}
impl<'a> Iterator for TimedIter<'a> {
    type Item = Result<(f64, TimedEvent<'a>)>;
    fn next(&mut self) -> Option<Self::Item> {
        let ev = match self.ordered.next()? {
            Ok(ev) => ev,
            Err(err) => return Some(Err(err)),
        };
        let secs = self.tempo.ticks_to_seconds(ev.delta, self.ticks_per_beat);
        if let Some(tempo) = ev.kind.tempo() {
            self.tempo = tempo;
        }
        Some(Ok((secs, ev)))
    }
}

/// The result of seeking into the merged stream.
#[derive(Clone, Debug)]
pub struct Seek<'a> {
    /// Continues the stream from the located event, which is yielded first.
    ///
    /// Yields nothing if the whole stream ended before the requested time.
    pub cursor: Cursor<'a>,
    /// The time in seconds right before the delta of the located event elapses.
    ///
    /// Never greater than the requested time, since seeking lands on event boundaries.
    pub position: f64,
    /// The tempo to time the located event with.
    pub tempo: Tempo,
}

/// Traverse the stream until the first event that ends at or after `target` seconds.
pub(crate) fn seek<'a>(mut timed: TimedIter<'a>, target: f64) -> Result<Seek<'a>> {
    let mut elapsed = 0.0;
    loop {
        let tempo = timed.tempo();
        match timed.next() {
            Some(Ok((secs, ev))) => {
                if elapsed + secs >= target {
                    tracing::debug!(
                        requested = target,
                        position = elapsed,
                        "seek located event"
                    );
                    return Ok(Seek {
                        cursor: Cursor::resume(ev, timed.into_ordered()),
                        position: elapsed,
                        tempo,
                    });
                }
                elapsed += secs;
            }
            Some(Err(err)) => return Err(err),
            None => {
                tracing::debug!(
                    requested = target,
                    position = elapsed,
                    "seek reached end of stream"
                );
                return Ok(Seek {
                    tempo: timed.tempo(),
                    cursor: Cursor::start(timed.into_ordered()),
                    position: elapsed,
                });
            }
        }
    }
}

/// Traverse the whole stream, adding up the length of every event.
pub(crate) fn duration(mut timed: TimedIter<'_>) -> Result<f64> {
    timed.try_fold(0.0, |total, ev| ev.map(|(secs, _)| total + secs))
}
