use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use assert_no_alloc::{assert_no_alloc, AllocDisabler};
use backtrace::Backtrace;
use tracing::{error, info, warn};

use notegrid::action::{Action, ActionManager};
use notegrid::config::Config;
use notegrid::engine::{Engine, Sink, Trigger, TriggerKind};
use notegrid::instrument::{Instrument, InstrumentList};
use notegrid::midi_map::{MidiMap, MidiMessage};
use notegrid::pattern::{Pattern, PatternList};
use notegrid::session::{controls, Song, TransportState};
use notegrid::{FRAMES_PER_BUFFER, SAMPLE_RATE, TICKS_PER_BEAT};

#[global_allocator]
static A: AllocDisabler = AllocDisabler;

const MAX_TRIGGERS: usize = 256;

/// Collects a block's triggers without growing.
struct TriggerLog {
    triggers: Vec<Trigger>,
    dropped: usize,
}

impl TriggerLog {
    fn new() -> Self {
        Self {
            triggers: Vec::with_capacity(MAX_TRIGGERS),
            dropped: 0,
        }
    }
}

impl Sink for TriggerLog {
    fn trigger(&mut self, trigger: Trigger) {
        if self.triggers.len() < self.triggers.capacity() {
            self.triggers.push(trigger);
        } else {
            self.dropped += 1;
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    std::panic::set_hook(Box::new(|info| {
        error!("{}\n{:?}", info, Backtrace::new());
    }));

    if let Err(e) = run() {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let song = Song {
        patterns: PatternList::new(vec![Pattern::new("Verse", 4 * TICKS_PER_BEAT)]),
        instruments: InstrumentList::new(vec![
            Instrument::new("Kick"),
            Instrument::new("Snare"),
            Instrument::new("Closed Hat"),
            Instrument::new("Open Hat"),
        ]),
        bpm: 120.0,
    };
    let config = Config::default().with_playlist(["verse.h2song", "chorus.h2song"]);
    let (editor, engine, events) = controls(song, config);
    editor.session().set_transport(TransportState::Ready);

    let running = Arc::new(AtomicBool::new(true));
    let render = spawn_render(engine, running.clone())?;

    for beat in 0..4 {
        editor.toggle_note(0, beat * TICKS_PER_BEAT, 0, None)?;
        editor.toggle_note(0, beat * TICKS_PER_BEAT + TICKS_PER_BEAT / 2, 2, None)?;
    }
    editor.toggle_note(0, TICKS_PER_BEAT, 1, None)?;
    editor.toggle_note(0, 3 * TICKS_PER_BEAT, 1, None)?;
    editor.play()?;

    let mut map = MidiMap::with_mmc_defaults();
    map.register_cc(20, Action::new("BPM_CC_RELATIVE").with_parameter1(1));
    map.register_note(36, Action::new("MUTE_TOGGLE"));
    map.register_cc(7, Action::new("MASTER_VOLUME_ABSOLUTE"));

    let mut actions = ActionManager::new(editor.clone());
    let input: [&[u8]; 5] = [
        &[0xB0, 20, 64],
        &[0xB0, 20, 72],
        &[0xB0, 7, 100],
        &[0x90, 36, 127],
        &[0x90, 36, 127],
    ];
    for bytes in input {
        thread::sleep(Duration::from_millis(250));
        let msg = match MidiMessage::parse(bytes) {
            Some(msg) => msg,
            None => continue,
        };
        if let Some(action) = map.action_for(&msg) {
            if let Err(e) = actions.handle_action(&action) {
                warn!("{}: {}", action, e);
            }
        }
    }
    info!("tempo is now {}", editor.session().tempo.value_as_string());

    editor.undo()?;
    thread::sleep(Duration::from_millis(500));
    if let Some(stop) = MidiMessage::parse(&[0xF0, 0x7F, 0x7F, 0x06, 0x01, 0xF7])
        .and_then(|msg| map.action_for(&msg))
    {
        actions.handle_action(&stop)?;
    }

    running.store(false, Ordering::Relaxed);
    render
        .join()
        .map_err(|_| anyhow!("render thread panicked"))?;

    for event in events.try_iter() {
        info!(?event, "event");
    }
    Ok(())
}

fn spawn_render(mut engine: Engine, running: Arc<AtomicBool>) -> Result<thread::JoinHandle<()>> {
    let block = Duration::from_secs_f64(FRAMES_PER_BUFFER as f64 / SAMPLE_RATE);
    let handle = thread::Builder::new()
        .name("render".into())
        .spawn(move || {
            let mut log = TriggerLog::new();
            while running.load(Ordering::Relaxed) {
                assert_no_alloc(|| engine.process(FRAMES_PER_BUFFER, &mut log));
                for trigger in log.triggers.drain(..) {
                    match trigger.kind {
                        TriggerKind::NoteOn(voice) => {
                            info!(strip = ?trigger.instrument, velocity = voice.velocity, "note on")
                        }
                        TriggerKind::Stop => info!(strip = ?trigger.instrument, "note off"),
                        TriggerKind::Click { accent } => info!(accent, "click"),
                    }
                }
                if log.dropped > 0 {
                    warn!("dropped {} triggers", log.dropped);
                    log.dropped = 0;
                }
                thread::sleep(block);
            }
        })?;
    Ok(handle)
}
