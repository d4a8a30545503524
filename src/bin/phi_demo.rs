//! Golden-ratio MIDI demo
//!
//! Plays a series of notes whose onsets follow the golden ratio, anchored to
//! the next bar, on a MIDI output device (or prints them with --dry-run).
//!
//! Usage:
//!   cargo run --bin phi_demo -- --list                      # List MIDI devices
//!   cargo run --bin phi_demo -- --device 0                  # Play on device 0
//!   cargo run --bin phi_demo -- --dry-run --policy direct   # Print firings only
//!
//! Set RUST_LOG=phi_timing=trace to see every registration and firing.

use midir::{MidiOutput, MidiOutputConnection};
use phi_timing::{
    Clock, ClockConfig, OffsetPolicy, PhiScheduler, RealtimeClock, SchedulerConfig,
};
use std::cell::RefCell;
use std::env;
use std::rc::Rc;
use tracing::info;
use tracing_subscriber::EnvFilter;

// MIDI constants
const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

/// Major pentatonic from middle C, repeated upward by octave.
const SCALE: [u8; 5] = [60, 62, 64, 67, 69];

/// How long each note sounds, in beats.
const NOTE_LENGTH: f64 = 0.2;

/// A note to play, identified by its position in the series.
#[derive(Clone, Copy, Debug)]
struct NoteEvent {
    index: usize,
    note: u8,
    velocity: u8,
}

/// Highest octave above the base scale.
const MAX_OCTAVE: usize = 4;

fn note_event(index: usize) -> NoteEvent {
    // Clamp while still in usize, then narrow
    let octave = (index / SCALE.len()).min(MAX_OCTAVE) as u8;
    let fade = index.saturating_mul(6).min(70) as u8;
    NoteEvent {
        index,
        note: SCALE[index % SCALE.len()] + 12 * octave,
        velocity: 110 - fade,
    }
}

fn note_series(count: usize) -> Vec<NoteEvent> {
    (0..count).map(note_event).collect()
}

/// Where note messages go.
enum Output {
    Midi(MidiOutputConnection),
    Print,
}

impl Output {
    fn note_on(&mut self, note: u8, velocity: u8, beat: f64) {
        match self {
            Output::Midi(conn) => {
                let _ = conn.send(&[NOTE_ON, note, velocity]);
            }
            Output::Print => println!("{:>9.3}  on   note={} vel={}", beat, note, velocity),
        }
    }

    fn note_off(&mut self, note: u8, beat: f64) {
        match self {
            Output::Midi(conn) => {
                let _ = conn.send(&[NOTE_OFF, note, 0]);
            }
            Output::Print => println!("{:>9.3}  off  note={}", beat, note),
        }
    }
}

struct Options {
    list_devices: bool,
    device_index: Option<usize>,
    dry_run: bool,
    count: usize,
    scheduler: SchedulerConfig,
    clock: ClockConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            list_devices: false,
            device_index: None,
            dry_run: false,
            count: 8,
            scheduler: SchedulerConfig {
                base: 0.25,
                ..Default::default()
            },
            clock: ClockConfig {
                bpm: 96.0,
                ..Default::default()
            },
        }
    }
}

/// Step past a flag and return its value.
fn take_value<'a>(
    args: &'a [String],
    i: &mut usize,
    flag: &str,
) -> Result<&'a str, Box<dyn std::error::Error>> {
    *i += 1;
    match args.get(*i) {
        Some(v) => Ok(v.as_str()),
        None => Err(format!("Missing value for {}", flag).into()),
    }
}

fn parse_args(args: &[String]) -> Result<Option<Options>, Box<dyn std::error::Error>> {
    let mut opts = Options::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || take_value(args, &mut i, flag);
        match flag {
            "--list" | "-l" => opts.list_devices = true,
            "--dry-run" | "-n" => opts.dry_run = true,
            "--device" | "-d" => opts.device_index = Some(value()?.parse()?),
            "--count" | "-c" => opts.count = value()?.parse()?,
            "--base" | "-b" => opts.scheduler.base = value()?.parse()?,
            "--policy" | "-p" => opts.scheduler.policy = value()?.parse::<OffsetPolicy>()?,
            "--grid" | "-g" => opts.scheduler.grid_unit = value()?.parse()?,
            "--bpm" => opts.clock.bpm = value()?.parse()?,
            "--rate" => opts.clock.rate = value()?.parse()?,
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            other => return Err(format!("Unknown argument {}", other).into()),
        }
        i += 1;
    }

    Ok(Some(opts))
}

fn print_usage() {
    println!("Phi Timing - Golden-ratio MIDI Demo");
    println!("===================================");
    println!();
    println!("Usage:");
    println!("  cargo run --bin phi_demo -- --list         # List MIDI devices");
    println!("  cargo run --bin phi_demo -- --device N     # Play on device N");
    println!("  cargo run --bin phi_demo -- --dry-run      # Print instead of playing");
    println!();
    println!("Options:");
    println!("  --count N          Number of notes (default 8)");
    println!("  --base B           Base duration in beats (default 0.25)");
    println!("  --policy P         cumulative | direct (default cumulative)");
    println!("  --grid G           Anchor grid in beats (default 4 = one bar)");
    println!("  --bpm B            Tempo (default 96)");
    println!("  --rate R           Playback speed multiplier (default 1)");
}

fn list_midi_devices() -> Result<(), Box<dyn std::error::Error>> {
    let midi_out = MidiOutput::new("phi_demo_list")?;
    let ports = midi_out.ports();

    if ports.is_empty() {
        println!("No MIDI output devices found.");
        return Ok(());
    }

    println!("Available MIDI output devices:");
    for (i, port) in ports.iter().enumerate() {
        let name = midi_out.port_name(port).unwrap_or_else(|_| "Unknown".to_string());
        println!("  {}: {}", i, name);
    }
    Ok(())
}

fn connect_to_device(
    device_index: usize,
) -> Result<MidiOutputConnection, Box<dyn std::error::Error>> {
    let midi_out = MidiOutput::new("phi_demo")?;
    let ports = midi_out.ports();

    let port = ports.get(device_index).ok_or_else(|| {
        format!(
            "Device index {} out of range. Only {} devices available.",
            device_index,
            ports.len()
        )
    })?;

    let port_name = midi_out.port_name(port)?;
    info!(device = %port_name, "connecting");
    Ok(midi_out.connect(port, "phi_demo_conn")?)
}

fn run(opts: Options, output: Output) -> Result<(), Box<dyn std::error::Error>> {
    let scheduler = PhiScheduler::new(opts.scheduler)?;
    let mut clock = RealtimeClock::new(opts.clock)?;
    let output = Rc::new(RefCell::new(output));

    let events = note_series(opts.count);
    let plan = scheduler.plan(events.len(), clock.now())?;
    info!(
        policy = ?scheduler.config().policy,
        first = plan.first().copied(),
        last = plan.last().copied(),
        "scheduling {} notes",
        events.len()
    );

    let sink_clock = clock.clone();
    let sink_output = output.clone();
    scheduler.schedule(events, &mut clock, move |ev: NoteEvent| {
        let now = sink_clock.now();
        sink_output.borrow_mut().note_on(ev.note, ev.velocity, now);

        // Note-off is its own absolute deadline
        let off_output = sink_output.clone();
        let mut off_clock = sink_clock.clone();
        let off_at = now + NOTE_LENGTH;
        let off = off_clock.schedule_at(
            off_at,
            Box::new(move || off_output.borrow_mut().note_off(ev.note, off_at)),
        );
        if let Err(e) = off {
            tracing::warn!(index = ev.index, error = %e, "could not schedule note-off");
        }
    })?;

    let fired = clock.run_until_idle();
    info!(fired, "done");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("phi_demo=info,phi_timing=info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(opts) = parse_args(&args)? else {
        return Ok(());
    };

    if opts.list_devices {
        return list_midi_devices();
    }

    let output = if opts.dry_run {
        Output::Print
    } else {
        let device_index = match opts.device_index {
            Some(d) => d,
            None => {
                print_usage();
                return Err("Missing --device argument (or use --dry-run)".into());
            }
        };
        Output::Midi(connect_to_device(device_index)?)
    };

    run(opts, output)
}
