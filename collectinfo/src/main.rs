use midiplay::{
    num::{u4, u7},
    Player, PlayerConfig, Smf, Synth, Timbre, Timing,
};
use std::{
    env,
    error::Error,
    fs,
    path::{Path, PathBuf},
};

const MIDI_DIR: &str = "../test-asset";

const MIDI_EXT: &[&str] = &["mid", "midi", "rmi"];

const INFO_COLLECTORS: &[(&str, fn(&Path) -> Result<(), Box<dyn Error>>)] = &[
    ("header", header),
    ("duration", duration),
    ("seek", seek),
    ("playback", playback),
];

fn header(path: &Path) -> Result<(), Box<dyn Error>> {
    let data = fs::read(path)?;
    let smf = Smf::parse(&data)?;
    let timing = match smf.header.timing {
        Timing::Metrical(tpb) => format!("{} ticks/beat", tpb),
        Timing::Timecode {
            format,
            ticks_per_frame,
        } => format!("smpte {} fps, {} ticks/frame", -(format as i16), ticks_per_frame),
    };
    eprintln!(
        "format {} / {} tracks ({} declared) / {}",
        smf.header.format.id(),
        smf.track_count(),
        smf.header.track_count,
        timing,
    );
    Ok(())
}

fn duration(path: &Path) -> Result<(), Box<dyn Error>> {
    let data = fs::read(path)?;
    let smf = Smf::parse(&data)?;
    let mut events = 0;
    let mut tempo_changes = 0;
    for ev in smf.timed()? {
        let (_secs, ev) = ev?;
        events += 1;
        if ev.kind.tempo().is_some() {
            tempo_changes += 1;
        }
    }
    eprintln!(
        "{:.3}s / {} events / {} tempo changes",
        smf.duration()?,
        events,
        tempo_changes,
    );
    Ok(())
}

fn seek(path: &Path) -> Result<(), Box<dyn Error>> {
    let data = fs::read(path)?;
    let smf = Smf::parse(&data)?;
    let duration = smf.duration()?;
    for &fraction in &[0.25, 0.5, 0.75] {
        let target = fraction * duration;
        let seek = smf.seek(target)?;
        eprint!(
            "{}% -> {:.3}s of {:.3}s ({} events left) ",
            fraction * 100.0,
            seek.position,
            target,
            seek.cursor.count(),
        );
    }
    eprintln!();
    Ok(())
}

/// Counts what the player asks of it.
#[derive(Default)]
struct CountingSynth {
    notes: usize,
    releases: usize,
    max_lead: f64,
    now: f64,
}
impl Synth for CountingSynth {
    fn emit(&mut self, time: f64, _channel: u4, _key: u7, _vel: u7, _timbre: Timbre) {
        self.notes += 1;
        self.max_lead = self.max_lead.max(time - self.now);
    }
    fn release(&mut self, _time: f64, _channel: u4, _key: u7) {
        self.releases += 1;
    }
    fn silence_all(&mut self, _time: f64) {}
}

fn playback(path: &Path) -> Result<(), Box<dyn Error>> {
    let data = fs::read(path)?;
    let smf = Smf::parse(&data)?;
    let config = PlayerConfig::default();
    let mut player = Player::new(CountingSynth::default(), config);
    player.load(&smf, 0.0)?;
    player.play(0.0)?;
    let mut now = 0.0;
    let mut ticks = 0;
    let mut dispatched = 0;
    while !player.has_ended(now) {
        player.synth_mut().now = now;
        dispatched += player.tick(now)?.len();
        ticks += 1;
        now += config.tick_interval;
    }
    let synth = player.synth();
    eprintln!(
        "{} events in {} ticks / {} notes, {} releases / ended at {:.3}s / max lead {:.3}s",
        dispatched, ticks, synth.notes, synth.releases, now, synth.max_lead,
    );
    Ok(())
}

fn list_midis(dir: &Path) -> Vec<PathBuf> {
    let mut midis = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if MIDI_EXT
            .iter()
            .any(|ext| path.extension() == Some(ext.as_ref()))
        {
            midis.push(path);
        }
    }
    midis
}

fn main() {
    let midi_filter = env::args().nth(1).unwrap_or_default().to_lowercase();
    let info_filter = env::args().nth(2).unwrap_or_default().to_lowercase();
    let midi_dir = env::args().nth(3).unwrap_or(MIDI_DIR.to_string());

    let collectors = INFO_COLLECTORS
        .iter()
        .filter(|(name, _)| name.contains(&info_filter))
        .collect::<Vec<_>>();
    if collectors.is_empty() {
        eprintln!("no info collectors match the pattern \"{}\"", info_filter);
        eprint!("available info collectors: ");
        for (i, (name, _)) in INFO_COLLECTORS.iter().enumerate() {
            if i > 0 {
                eprint!(", ");
            }
            eprint!("{}", name);
        }
        eprintln!();
    }

    let unfiltered_midis = list_midis(midi_dir.as_ref());
    let midis = unfiltered_midis
        .iter()
        .filter(|midi| {
            midi.file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_lowercase()
                .contains(&midi_filter)
        })
        .collect::<Vec<_>>();
    if midis.is_empty() {
        eprintln!("no midi files match the pattern \"{}\"", midi_filter);
        eprintln!("available midi files:");
        for file in unfiltered_midis.iter() {
            eprintln!("  {}", file.display());
        }
    } else {
        for midi in midis {
            eprintln!("collecting info about file \"{}\"", midi.display());
            for &(name, collect) in collectors.iter() {
                eprint!("  {}: ", name);
                if let Err(err) = collect(midi) {
                    eprintln!("collector error ({})", err);
                }
            }
            eprintln!();
        }
    }
}
