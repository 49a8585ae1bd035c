//! Specific to the SMF packaging of MIDI streams.

use crate::{
    event::TrackEvent,
    playback::OrderedIter,
    prelude::*,
    primitive::{Format, Timing},
    riff,
    tempo::{self, Seek, TimedIter},
};
use std::cell::OnceCell;

/// How many bytes of track data must a file hold before its tracks are decoded on several
/// threads during validation.
#[cfg(feature = "parallel")]
const PARALLEL_ENABLE_THRESHOLD: usize = 3 * 1024;

/// A loaded Standard Midi File.
///
/// Loading only splits the file into chunks and reads the header. Track events stay encoded in
/// the source buffer and are decoded from scratch by every traversal of the file (duration
/// calculation, seeking and playback), each one with its own fresh decoders.
#[derive(Clone, Debug)]
pub struct Smf<'a> {
    /// The header of this MIDI file, indicating tempo information and track format.
    pub header: Header,
    /// The raw data of each `MTrk` chunk, in file order.
    pub tracks: Vec<&'a [u8]>,
    duration: OnceCell<f64>,
}
impl<'a> Smf<'a> {
    /// Parse a `.mid` (or RIFF-wrapped `.rmi`) file.
    ///
    /// Fails if the header is missing or invalid, or if a chunk is truncated.
    /// With the `strict` feature every track is additionally decoded once, so that corrupt tracks
    /// are rejected here rather than halfway through playback.
    pub fn parse(raw: &'a [u8]) -> Result<Smf<'a>> {
        let (header, tracks) = parse(raw)?;
        let tracks = tracks
            .map(|track| track.map(|events| events.unread()))
            .collect::<Result<Vec<_>>>()?;
        validate_smf(&header, &tracks)?;
        tracing::debug!(
            format = header.format.id(),
            tracks = tracks.len(),
            timing = ?header.timing,
            "loaded midi file"
        );
        Ok(Smf {
            header,
            tracks,
            duration: OnceCell::new(),
        })
    }

    /// The amount of track chunks found in the file.
    ///
    /// This might differ from `header.track_count`, which is the amount declared by the header.
    #[inline]
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// A fresh decoder over the events of a single track.
    #[inline]
    pub fn track(&self, idx: usize) -> Option<EventIter<'a>> {
        self.tracks.get(idx).map(|raw| EventIter::new(raw))
    }

    /// Fresh decoders over every track, in file order.
    pub fn track_iters(&self) -> impl Iterator<Item = EventIter<'a>> + '_ {
        self.tracks.iter().map(|raw| EventIter::new(raw))
    }

    /// The events of all tracks merged into a single time-ordered stream.
    #[inline]
    pub fn ordered(&self) -> OrderedIter<'a> {
        OrderedIter::new(self.track_iters())
    }

    /// The merged event stream, with each delta converted to seconds.
    ///
    /// Fails with `UnsupportedDivision` if the file uses SMPTE timing.
    pub fn timed(&self) -> Result<TimedIter<'a>> {
        let ticks_per_beat = self.header.ticks_per_beat()?;
        Ok(TimedIter::new(self.ordered(), ticks_per_beat))
    }

    /// The total playback length of the file, in seconds.
    ///
    /// The first call traverses the whole file, later calls return the remembered value.
    /// Failures are not remembered.
    pub fn duration(&self) -> Result<f64> {
        if let Some(&duration) = self.duration.get() {
            return Ok(duration);
        }
        let duration = tempo::duration(self.timed()?)?;
        tracing::debug!(duration, "computed midi file duration");
        Ok(*self.duration.get_or_init(|| duration))
    }

    /// Locate the first event ending at or after `target` seconds.
    ///
    /// See [`Seek`](struct.Seek.html) for the details of what is returned.
    pub fn seek(&self, target: f64) -> Result<Seek<'a>> {
        tempo::seek(self.timed()?, target)
    }
}

fn validate_smf(header: &Header, tracks: &[&[u8]]) -> Result<()> {
    if cfg!(feature = "strict") {
        ensure!(
            header.track_count as usize == tracks.len(),
            err_malformed!("file has a different amount of tracks than declared")
        );
        ensure!(
            header.format != Format::SingleTrack || tracks.len() == 1,
            err_malformed!("singletrack format file has multiple tracks")
        );
        decode_tracks(tracks)?;
    }
    Ok(())
}

/// Decode every event of every track, discarding them, to find corrupt tracks early.
fn decode_tracks(tracks: &[&[u8]]) -> Result<()> {
    #[cfg(feature = "parallel")]
    {
        if tracks.iter().map(|track| track.len()).sum::<usize>() >= PARALLEL_ENABLE_THRESHOLD {
            use rayon::prelude::*;

            return tracks.par_iter().try_for_each(|track| decode_track(track));
        }
    }
    tracks.iter().try_for_each(|track| decode_track(track))
}

fn decode_track(raw: &[u8]) -> Result<()> {
    EventIter::new(raw).try_for_each(|ev| ev.map(|_| ()))
}

/// Parse a raw MIDI file lazily, yielding its header and a lazy track iterator.
///
/// The first chunk must be an `MThd` header chunk. Chunks after it that are neither `MThd` nor
/// `MTrk` are skipped.
pub fn parse(raw: &[u8]) -> Result<(Header, TrackIter<'_>)> {
    let raw = riff::unwrap(raw).unwrap_or(raw);
    let mut chunks = ChunkIter::new(raw);
    let header = match chunks.next() {
        Some(chunk) => match chunk? {
            (b"MThd", data) => Header::read(data).context("invalid midi header")?,
            _ => bail!(err_header!("expected header, found a different chunk")),
        },
        None => bail!(err_header!("no header chunk")),
    };
    Ok((header, TrackIter { chunks }))
}

/// Splits a file into `(id, data)` chunks.
///
/// Stops after yielding the first error.
#[derive(Copy, Clone, Debug)]
struct ChunkIter<'a> {
    /// Starts at the current index, ends at EOF.
    raw: &'a [u8],
}
impl<'a> ChunkIter<'a> {
    fn new(raw: &'a [u8]) -> ChunkIter<'a> {
        ChunkIter { raw }
    }

    fn read(raw: &mut &'a [u8]) -> StdResult<(&'a [u8], &'a [u8]), &'static ErrorKind> {
        let id = raw
            .split_checked(4)
            .ok_or(err_truncated!("failed to read chunk id"))?;
        let len = u32::read(raw).map_err(|_| err_truncated!("failed to read chunk length"))?;
        let data = raw
            .split_checked(len as usize)
            .ok_or(err_truncated!("reached eof before chunk ended"))?;
        Ok((id, data))
    }
}
impl<'a> Iterator for ChunkIter<'a> {
    type Item = Result<(&'a [u8], &'a [u8])>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.raw.is_empty() {
            return None;
        }
        match Self::read(&mut self.raw) {
            Ok(chunk) => Some(Ok(chunk)),
            Err(err) => {
                //Ensure no more chunks are read from the middle of a broken one
                self.raw = &[];
                Some(Err(err).context("failed to read chunk"))
            }
        }
    }
}

/// A MIDI file header.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Header {
    /// How the tracks of the file relate to each other.
    pub format: Format,
    /// The amount of tracks the header declares.
    ///
    /// Files do not always agree with their header, so the actual amount of tracks might differ.
    pub track_count: u16,
    /// The time division of the file.
    pub timing: Timing,
}
impl Header {
    #[inline]
    pub fn new(format: Format, track_count: u16, timing: Timing) -> Header {
        Header {
            format,
            track_count,
            timing,
        }
    }

    fn read(mut raw: &[u8]) -> Result<Header> {
        let format = Format::read(&mut raw)?;
        let track_count = u16::read(&mut raw).context("failed to read track count")?;
        let timing = Timing::read(&mut raw)?;
        Ok(Header::new(format, track_count, timing))
    }

    /// The amount of ticks per quarter note.
    ///
    /// Fails with `UnsupportedDivision` if the file uses SMPTE timing.
    #[inline]
    pub fn ticks_per_beat(&self) -> Result<u15> {
        self.timing.ticks_per_beat()
    }
}

/// An iterator over the tracks in a Standard Midi File.
///
/// Yields an error and stops if a chunk is truncated.
#[derive(Clone, Debug)]
pub struct TrackIter<'a> {
    chunks: ChunkIter<'a>,
}
impl<'a> TrackIter<'a> {
    /// Get the remaining unread bytes.
    #[inline]
    pub fn unread(&self) -> &'a [u8] {
        self.chunks.raw
    }
}
impl<'a> Iterator for TrackIter<'a> {
    type Item = Result<EventIter<'a>>;
    fn next(&mut self) -> Option<Result<EventIter<'a>>> {
        loop {
            match self.chunks.next()? {
                Ok((b"MTrk", data)) => break Some(Ok(EventIter::new(data))),
                Ok((b"MThd", _)) => {
                    if cfg!(feature = "strict") {
                        self.chunks.raw = &[];
                        break Some(Err(err_malformed!("found duplicate header").into()));
                    }
                    //Ignore duplicate header
                }
                //Unknown chunk, just ignore and read the next one
                Ok(_) => {}
                Err(err) => break Some(Err(err)),
            }
        }
    }
}

/// A decoder over the events of a single track.
///
/// Events are decoded on demand, straight from the track data. The decoder keeps the position
/// within the track and the last channel status byte, used to decode running status events.
///
/// If an event fails to decode, the error is yielded and the iterator stops.
/// This `struct` is very light, so it can be cloned freely.
#[derive(Clone, Debug)]
pub struct EventIter<'a> {
    raw: &'a [u8],
    len: usize,
    running_status: Option<u8>,
}
impl<'a> EventIter<'a> {
    /// Create a decoder positioned at the start of the given track data.
    #[inline]
    pub fn new(raw: &'a [u8]) -> EventIter<'a> {
        EventIter {
            raw,
            len: raw.len(),
            running_status: None,
        }
    }

    /// Get the remaining unread bytes.
    #[inline]
    pub fn unread(&self) -> &'a [u8] {
        self.raw
    }

    /// How many bytes of the track have been decoded so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.len - self.raw.len()
    }

    /// Get the current running status of the track.
    #[inline]
    pub fn running_status(&self) -> Option<u8> {
        self.running_status
    }
}
impl<'a> Iterator for EventIter<'a> {
    type Item = Result<TrackEvent<'a>>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.raw.is_empty() {
            return None;
        }
        match TrackEvent::read(&mut self.raw, &mut self.running_status) {
            Ok(ev) => Some(Ok(ev)),
            Err(err) => {
                //The slice may point to the middle of an event, so stop here
                self.raw = &[];
                Some(Err(err).context("failed to decode track event"))
            }
        }
    }
}
