//! The lookahead playback scheduler.

use crate::{
    channel::Channels,
    config::{PlayerConfig, Strategies},
    event::{MetaMessage, TrackEventKind},
    playback::Cursor,
    prelude::*,
    smf::Smf,
    synth::Synth,
    tempo::{Seek, Tempo},
};
use std::borrow::Cow;

/// The state of a [`Player`](struct.Player.html).
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Phase {
    /// Nothing is playing, either because no file was loaded or because it was never played.
    Stopped,
    /// Events are being dispatched on every tick.
    Playing,
    /// Playback is suspended, and will continue from the same point.
    Paused,
}

/// A snapshot of the playback progress.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Progress {
    /// Fraction of the file that has been played, in `[0, 1]`.
    pub position: f64,
    /// Length of the file in seconds.
    pub duration: f64,
    /// Seconds of the file that have been played.
    pub current_time: f64,
    pub is_playing: bool,
}

/// An event dispatched by the player.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Dispatch<'a> {
    /// The instant at which the event takes effect.
    pub time: f64,
    /// The track the event comes from.
    pub track: usize,
    pub kind: TrackEventKind<'a>,
}
impl<'a> Dispatch<'a> {
    /// The text to show to the listener, for text, lyric and copyright meta events.
    pub fn announcement(&self) -> Option<Cow<'a, str>> {
        match self.kind {
            TrackEventKind::Meta(MetaMessage::Text(text))
            | TrackEventKind::Meta(MetaMessage::Lyric(text))
            | TrackEventKind::Meta(MetaMessage::Copyright(text)) => {
                Some(String::from_utf8_lossy(text))
            }
            _ => None,
        }
    }
}

/// Where playback is within the merged stream.
#[derive(Clone, Debug)]
struct Context<'a> {
    cursor: Cursor<'a>,
    ticks_per_beat: u15,
    tempo: Tempo,
    /// Time of the last dispatched event, in seconds since the start of the file.
    position: f64,
    /// The instant at which the start of the file played, or would have played.
    start_time: f64,
    exhausted: bool,
}
impl<'a> Context<'a> {
    fn new(cursor: Cursor<'a>, ticks_per_beat: u15) -> Context<'a> {
        Context {
            cursor,
            ticks_per_beat,
            tempo: Tempo::DEFAULT,
            position: 0.0,
            start_time: 0.0,
            exhausted: false,
        }
    }

    fn jump(&mut self, seek: Seek<'a>) {
        self.cursor = seek.cursor;
        self.tempo = seek.tempo;
        self.position = seek.position;
        self.exhausted = false;
    }

    /// The instant at which the last dispatched event takes effect.
    #[inline]
    fn scheduled_time(&self) -> f64 {
        self.start_time + self.position
    }
}

/// Plays a loaded `Smf` through a [`Synth`](trait.Synth.html).
///
/// The player is driven by the host: every control operation and every call to `tick` receives
/// the current time in seconds, from any monotonic clock. `tick` should be called periodically
/// while playing, and dispatches every event due before `now + lookahead` in one go.
///
/// The player never dispatches anything by itself, so control operations and ticks are never
/// concurrent.
pub struct Player<'a, S> {
    synth: S,
    config: PlayerConfig,
    smf: Option<&'a Smf<'a>>,
    duration: f64,
    phase: Phase,
    context: Option<Context<'a>>,
    /// Seconds into the file where playback continues, while not playing.
    paused_at: f64,
    channels: Channels,
}
impl<'a, S: Synth> Player<'a, S> {
    pub fn new(synth: S, config: PlayerConfig) -> Player<'a, S> {
        Player {
            synth,
            config,
            smf: None,
            duration: 0.0,
            phase: Phase::Stopped,
            context: None,
            paused_at: 0.0,
            channels: Channels::new(),
        }
    }

    /// Replace the loaded file, stopping playback of the previous one.
    ///
    /// Computes the duration of the file, so it fails if a track is corrupt.
    /// Files with SMPTE timing can be loaded (with a duration of 0) but not played.
    pub fn load(&mut self, smf: &'a Smf<'a>, now: f64) -> Result<()> {
        let duration = match smf.duration() {
            Ok(duration) => duration,
            Err(err) if matches!(err.kind(), ErrorKind::UnsupportedDivision(_)) => {
                tracing::warn!(%err, "loaded a file that cannot be played");
                0.0
            }
            Err(err) => return Err(err),
        };
        if self.phase == Phase::Playing {
            self.synth.silence_all(now);
        }
        self.smf = Some(smf);
        self.duration = duration;
        self.phase = Phase::Stopped;
        self.context = None;
        self.paused_at = 0.0;
        self.channels = Channels::new();
        tracing::debug!(duration, "player loaded file");
        Ok(())
    }

    /// Start or resume playback.
    ///
    /// Playback starts from the beginning of the file, or from wherever it was paused or
    /// seeked to. Fails with `UnsupportedDivision` if the file uses SMPTE timing.
    pub fn play(&mut self, now: f64) -> Result<()> {
        let smf = match self.smf {
            Some(smf) => smf,
            None => {
                tracing::warn!("play requested with no file loaded");
                return Ok(());
            }
        };
        if self.phase == Phase::Playing {
            return Ok(());
        }
        let ticks_per_beat = smf.header.ticks_per_beat()?;
        let paused_at = self.paused_at;
        let ctx = self
            .context
            .get_or_insert_with(|| Context::new(Cursor::start(smf.ordered()), ticks_per_beat));
        ctx.start_time = now - paused_at;
        self.phase = Phase::Playing;
        tracing::debug!(now, position = paused_at, "playback started");
        Ok(())
    }

    /// Dispatch every event due before `now + lookahead` to the synthesizer.
    ///
    /// Returns the dispatched events, in dispatch order. Does nothing unless playing.
    ///
    /// If the file turns out to be corrupt, the error is returned and no more events are
    /// dispatched.
    pub fn tick(&mut self, now: f64) -> Result<Vec<Dispatch<'a>>> {
        let mut dispatched = Vec::new();
        let ctx = match (self.phase, self.context.as_mut()) {
            (Phase::Playing, Some(ctx)) => ctx,
            _ => return Ok(dispatched),
        };
        let horizon = now + self.config.lookahead;
        while !ctx.exhausted && ctx.scheduled_time() < horizon {
            let ev = match ctx.cursor.next() {
                Some(Ok(ev)) => ev,
                Some(Err(err)) => {
                    ctx.exhausted = true;
                    tracing::warn!(%err, "playback aborted");
                    return Err(err);
                }
                None => {
                    ctx.exhausted = true;
                    tracing::debug!(position = ctx.position, "reached end of stream");
                    break;
                }
            };
            ctx.position += ctx.tempo.ticks_to_seconds(ev.delta, ctx.ticks_per_beat);
            let time = ctx.scheduled_time();
            match ev.kind {
                TrackEventKind::Midi { channel, message } => self.channels.apply(
                    &mut self.synth,
                    &self.config.strategies,
                    time,
                    channel,
                    message,
                ),
                TrackEventKind::Meta(MetaMessage::Tempo(_)) => {
                    if let Some(tempo) = ev.kind.tempo() {
                        ctx.tempo = tempo;
                        tracing::debug!(bpm = tempo.bpm(), "tempo change");
                    }
                }
                _ => {}
            }
            tracing::trace!(time, track = ev.track, kind = ?ev.kind, "dispatched event");
            dispatched.push(Dispatch {
                time,
                track: ev.track,
                kind: ev.kind,
            });
        }
        Ok(dispatched)
    }

    /// Suspend playback, silencing every sound.
    ///
    /// Events that were already dispatched past `now` are dispatched again after resuming.
    pub fn pause(&mut self, now: f64) -> Result<()> {
        let smf = match (self.phase, self.smf) {
            (Phase::Playing, Some(smf)) => smf,
            _ => return Ok(()),
        };
        let paused_at = self.current_time(now);
        self.synth.silence_all(now);
        self.channels.clear_notes();
        let seek = smf.seek(paused_at)?;
        if let Some(ctx) = self.context.as_mut() {
            ctx.jump(seek);
        }
        self.paused_at = paused_at;
        self.phase = Phase::Paused;
        tracing::debug!(now, position = paused_at, "playback paused");
        Ok(())
    }

    /// Stop playback and rewind to the start of the file.
    pub fn stop(&mut self, now: f64) {
        if self.phase == Phase::Playing {
            self.synth.silence_all(now);
        }
        self.channels.clear_notes();
        self.context = None;
        self.paused_at = 0.0;
        self.phase = Phase::Stopped;
        tracing::debug!(now, "playback stopped");
    }

    /// Jump to a fraction of the file, in `[0, 1]`.
    ///
    /// Playback continues from the closest event boundary at or before the requested point.
    /// The phase does not change: a paused or stopped player will start from the new position
    /// once played. Fails with `UnsupportedDivision` if the file uses SMPTE timing.
    pub fn seek(&mut self, position: f64, now: f64) -> Result<()> {
        let smf = match self.smf {
            Some(smf) => smf,
            None => {
                tracing::warn!("seek requested with no file loaded");
                return Ok(());
            }
        };
        let ticks_per_beat = smf.header.ticks_per_beat()?;
        let target = position.max(0.0).min(1.0) * self.duration;
        let seek = smf.seek(target)?;
        let actual = seek.position;
        self.synth.silence_all(now);
        self.channels.clear_notes();
        let ctx = self
            .context
            .get_or_insert_with(|| Context::new(Cursor::start(smf.ordered()), ticks_per_beat));
        ctx.jump(seek);
        match self.phase {
            Phase::Playing => ctx.start_time = now - actual,
            Phase::Paused | Phase::Stopped => self.paused_at = actual,
        }
        tracing::debug!(now, requested = target, position = actual, "seeked");
        Ok(())
    }

    /// Seconds of the file that have been played.
    fn current_time(&self, now: f64) -> f64 {
        match (self.phase, &self.context) {
            (Phase::Playing, Some(ctx)) => (now - ctx.start_time).max(0.0).min(self.duration),
            _ => self.paused_at,
        }
    }

    /// The playback progress at instant `now`.
    pub fn position(&self, now: f64) -> Progress {
        let current_time = self.current_time(now);
        Progress {
            position: if self.duration > 0.0 {
                current_time / self.duration
            } else {
                0.0
            },
            duration: self.duration,
            current_time,
            is_playing: self.phase == Phase::Playing,
        }
    }

    /// Length of the loaded file in seconds, or 0 if no file is loaded.
    #[inline]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Whether every event was dispatched and the last one already took effect.
    pub fn has_ended(&self, now: f64) -> bool {
        match (self.phase, &self.context) {
            (Phase::Playing, Some(ctx)) => ctx.exhausted && now >= ctx.scheduled_time(),
            _ => false,
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    #[inline]
    pub fn strategies(&self) -> Strategies {
        self.config.strategies
    }

    /// Change how events are interpreted, from the next dispatched event on.
    pub fn set_strategies(&mut self, strategies: Strategies) {
        tracing::debug!(?strategies, "strategies updated");
        self.config.strategies = strategies;
    }

    /// How many notes are sounding, as far as the player knows.
    #[inline]
    pub fn active_notes(&self) -> usize {
        self.channels.active_notes()
    }

    #[inline]
    pub fn synth(&self) -> &S {
        &self.synth
    }

    #[inline]
    pub fn synth_mut(&mut self) -> &mut S {
        &mut self.synth
    }

    #[inline]
    pub fn into_synth(self) -> S {
        self.synth
    }
}
