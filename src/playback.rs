//! Merging of several tracks into a single time-ordered event stream.

use crate::{
    error::Error,
    event::{TrackEvent, TrackEventKind},
    prelude::*,
    smf::EventIter,
};
use std::{cmp::Reverse, collections::BinaryHeap};

/// An event of the merged stream.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct TimedEvent<'a> {
    /// Ticks since the previous event of the merged stream, whatever track it came from.
    pub delta: u32,
    /// The index of the track this event comes from.
    pub track: usize,
    /// The event itself.
    pub kind: TrackEventKind<'a>,
}

/// Merges the events of several tracks into a single stream, ordered by absolute time.
///
/// Only one decoded event per track is held at any time. Events that happen at the exact same
/// tick are yielded in track order, and events of the same track always keep their relative
/// order.
///
/// If a track fails to decode, no more events are pulled from any track. The events that were
/// already pulled (one per track at most) are still yielded in order, then the error is yielded
/// and the iterator stops.
#[derive(Clone, Debug)]
pub struct OrderedIter<'a> {
    tracks: Vec<EventIter<'a>>,
    /// The next event of each track, if it was already pulled.
    pending: Vec<Option<TrackEvent<'a>>>,
    /// Absolute time of each pending event, along with its track index.
    heap: BinaryHeap<Reverse<(u64, usize)>>,
    /// Absolute time of the last yielded event.
    time: u64,
    primed: bool,
    error: Option<Error>,
}
impl<'a> OrderedIter<'a> {
    /// Merge the given track decoders.
    ///
    /// Nothing is decoded until the first event is requested.
    pub fn new(tracks: impl IntoIterator<Item = EventIter<'a>>) -> OrderedIter<'a> {
        let tracks: Vec<_> = tracks.into_iter().collect();
        OrderedIter {
            pending: vec![None; tracks.len()],
            heap: BinaryHeap::with_capacity(tracks.len()),
            tracks,
            time: 0,
            primed: false,
            error: None,
        }
    }

    /// The absolute time in ticks of the last yielded event.
    #[inline]
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Pull the next event of a track into its pending slot.
    fn pull(&mut self, track_idx: usize, base: u64) -> Result<()> {
        match self.tracks[track_idx].next() {
            Some(Ok(ev)) => {
                self.heap
                    .push(Reverse((base + ev.delta.as_int() as u64, track_idx)));
                self.pending[track_idx] = Some(ev);
                Ok(())
            }
            Some(Err(err)) => Err(err),
            None => Ok(()),
        }
    }
}
impl<'a> Iterator for OrderedIter<'a> {
    type Item = Result<TimedEvent<'a>>;
    fn next(&mut self) -> Option<Self::Item> {
        if !self.primed {
            self.primed = true;
            for track_idx in 0..self.tracks.len() {
                if let Err(err) = self.pull(track_idx, 0) {
                    self.error = Some(err);
                    break;
                }
            }
        }
        let Reverse((time, track_idx)) = match self.heap.pop() {
            Some(next) => next,
            //Drained, so the error (if any) comes last
            None => return self.error.take().map(Err),
        };
        let ev = self.pending[track_idx].take()?;
        if self.error.is_none() {
            if let Err(err) = self.pull(track_idx, time) {
                self.error = Some(err);
            }
        }
        //At most one track delta apart, so it always fits
        let delta = (time - self.time) as u32;
        self.time = time;
        Some(Ok(TimedEvent {
            delta,
            track: track_idx,
            kind: ev.kind,
        }))
    }
}

/// A position within the merged stream, from which playback can continue.
///
/// Yields the event it was positioned at (if any), followed by every event after it.
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    pending: Option<TimedEvent<'a>>,
    ordered: OrderedIter<'a>,
}
impl<'a> Cursor<'a> {
    /// A cursor at the start of the stream.
    #[inline]
    pub fn start(ordered: OrderedIter<'a>) -> Cursor<'a> {
        Cursor {
            pending: None,
            ordered,
        }
    }

    /// A cursor that yields `ev` before continuing with the rest of `ordered`.
    #[inline]
    pub(crate) fn resume(ev: TimedEvent<'a>, ordered: OrderedIter<'a>) -> Cursor<'a> {
        Cursor {
            pending: Some(ev),
            ordered,
        }
    }

    /// Peek at the event this cursor will yield next, if it is already decoded.
    #[inline]
    pub fn pending(&self) -> Option<&TimedEvent<'a>> {
        self.pending.as_ref()
    }
}
impl<'a> Iterator for Cursor<'a> {
    type Item = Result<TimedEvent<'a>>;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match self.pending.take() {
            Some(ev) => Some(Ok(ev)),
            None => self.ordered.next(),
        }
    }
}
