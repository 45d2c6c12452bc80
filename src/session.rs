use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use basedrop::{Collector, Shared, SharedCell};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use ringbuf::{Producer, RingBuffer};
use triple_buffer::{Output, TripleBuffer};

use crate::config::Config;
use crate::editor::Editor;
use crate::engine::{Engine, EngineCommand, EngineState};
use crate::events::{Event, Notifier};
use crate::instrument::InstrumentList;
use crate::lock::EngineLock;
use crate::params::{format_bpm, Param, ParamInfo};
use crate::pattern::PatternList;
use crate::{Error, Result, DEFAULT_BPM, MAX_BPM, MIN_BPM};

const NONE: usize = usize::MAX;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransportState {
    Uninitialized = 0,
    Initialized,
    Prepared,
    Ready,
    Playing,
}

impl TransportState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => TransportState::Initialized,
            2 => TransportState::Prepared,
            3 => TransportState::Ready,
            4 => TransportState::Playing,
            _ => TransportState::Uninitialized,
        }
    }

    /// Pattern edits are only accepted once the engine is up.
    pub fn accepts_edits(self) -> bool {
        matches!(self, TransportState::Ready | TransportState::Playing)
    }
}

/// The song a session starts from.
pub struct Song {
    pub patterns: PatternList,
    pub instruments: InstrumentList,
    pub bpm: f64,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            patterns: PatternList::default(),
            instruments: InstrumentList::default(),
            bpm: DEFAULT_BPM,
        }
    }
}

/// State shared between the control path and the render path.
///
/// Pattern and instrument lists are published as immutable snapshots. The
/// render path loads the current snapshot once per block and never blocks;
/// writers serialize on the engine lock and replace the snapshot as a
/// whole. Replaced snapshots are reclaimed by the collector on the control
/// path once the render path has dropped its handle.
pub struct Session {
    patterns: SharedCell<PatternList>,
    instruments: SharedCell<InstrumentList>,
    lock: EngineLock,
    collector: Mutex<Collector>,
    commands: Mutex<Producer<EngineCommand>>,
    engine_state: Mutex<Output<EngineState>>,
    transport: AtomicU8,
    selected_pattern: AtomicUsize,
    next_pattern: AtomicUsize,
    locate: AtomicUsize,
    selected_instrument: AtomicUsize,
    playlist_index: AtomicUsize,
    master_muted: AtomicBool,
    metronome: AtomicBool,
    record_ready: AtomicBool,
    modified: AtomicBool,
    lead_lag_ticks: f64,
    pub tempo: Param,
    pub master_volume: Param,
}

/// Builds a session for `song` and hands out the control-path editor, the
/// render engine and the receiving end of editor notifications.
pub fn controls(song: Song, config: Config) -> (Editor, Engine, Receiver<Event>) {
    let collector = Collector::new();
    let (producer, consumer) =
        RingBuffer::<EngineCommand>::new(config.audition_queue_size).split();
    let (state_in, state_out) = TripleBuffer::new(&EngineState::default()).split();

    let session = Session {
        patterns: SharedCell::new(Shared::new(&collector.handle(), song.patterns)),
        instruments: SharedCell::new(Shared::new(&collector.handle(), song.instruments)),
        lock: EngineLock::new(),
        collector: Mutex::new(collector),
        commands: Mutex::new(producer),
        engine_state: Mutex::new(state_out),
        transport: AtomicU8::new(TransportState::Uninitialized as u8),
        selected_pattern: AtomicUsize::new(0),
        next_pattern: AtomicUsize::new(NONE),
        locate: AtomicUsize::new(NONE),
        selected_instrument: AtomicUsize::new(0),
        playlist_index: AtomicUsize::new(0),
        master_muted: AtomicBool::new(false),
        metronome: AtomicBool::new(false),
        record_ready: AtomicBool::new(false),
        modified: AtomicBool::new(false),
        lead_lag_ticks: config.lead_lag_ticks,
        tempo: Param::new(
            song.bpm,
            ParamInfo::new("Tempo", MIN_BPM, MAX_BPM)
                .with_step(1.0)
                .with_formatter(format_bpm),
        ),
        master_volume: Param::new(1.0, ParamInfo::new("Master Volume", 0.0, 1.5).with_step(0.05)),
    };
    let session = Arc::new(session);
    let (notifier, events) = Notifier::channel();
    let editor = Editor::new(session.clone(), notifier, config);
    let engine = Engine::new(session, consumer, state_in);
    (editor, engine, events)
}

impl Session {
    pub fn patterns(&self) -> Shared<PatternList> {
        self.patterns.get()
    }

    pub fn instruments(&self) -> Shared<InstrumentList> {
        self.instruments.get()
    }

    pub fn lock(&self) -> &EngineLock {
        &self.lock
    }

    /// Runs `f` on a copy of the pattern list under the engine lock and
    /// publishes the copy if `f` succeeds. Nothing is published on error.
    pub fn update_patterns<F, R>(&self, tag: &'static str, f: F) -> Result<R>
    where
        F: FnOnce(&mut PatternList) -> Result<R>,
    {
        let result = {
            let _guard = self.lock.acquire(tag);
            let mut patterns = (*self.patterns.get()).clone();
            let result = f(&mut patterns)?;
            let handle = self.collector.lock().handle();
            self.patterns.set(Shared::new(&handle, patterns));
            self.modified.store(true, Ordering::Relaxed);
            result
        };
        self.collector.lock().collect();
        Ok(result)
    }

    pub fn update_instruments<F, R>(&self, tag: &'static str, f: F) -> Result<R>
    where
        F: FnOnce(&mut InstrumentList) -> Result<R>,
    {
        let result = {
            let _guard = self.lock.acquire(tag);
            let mut instruments = (*self.instruments.get()).clone();
            let result = f(&mut instruments)?;
            let handle = self.collector.lock().handle();
            self.instruments.set(Shared::new(&handle, instruments));
            self.modified.store(true, Ordering::Relaxed);
            result
        };
        self.collector.lock().collect();
        Ok(result)
    }

    /// Queues a command for the render path.
    pub fn send(&self, cmd: EngineCommand) -> Result<()> {
        self.commands
            .lock()
            .push(cmd)
            .map_err(|_| Error::AuditionQueueFull)
    }

    /// Latest state published by the render path.
    pub fn engine_state(&self) -> EngineState {
        *self.engine_state.lock().read()
    }

    pub fn transport(&self) -> TransportState {
        TransportState::from_u8(self.transport.load(Ordering::Acquire))
    }

    pub fn set_transport(&self, state: TransportState) {
        self.transport.store(state as u8, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.transport() == TransportState::Playing
    }

    pub fn selected_pattern(&self) -> usize {
        self.selected_pattern.load(Ordering::Relaxed)
    }

    /// Returns whether the selection changed.
    pub fn select_pattern(&self, index: usize) -> bool {
        self.selected_pattern.swap(index, Ordering::Relaxed) != index
    }

    pub fn next_pattern(&self) -> Option<usize> {
        from_slot(self.next_pattern.load(Ordering::Relaxed))
    }

    pub fn queue_next_pattern(&self, index: Option<usize>) {
        self.next_pattern
            .store(index.unwrap_or(NONE), Ordering::Relaxed);
    }

    /// Takes the queued pattern. Called by the render path at a pattern
    /// boundary.
    pub fn take_next_pattern(&self) -> Option<usize> {
        from_slot(self.next_pattern.swap(NONE, Ordering::AcqRel))
    }

    /// Asks the render path to jump to the start of `pattern`.
    pub fn locate(&self, pattern: usize) {
        self.locate.store(pattern, Ordering::Release);
    }

    pub fn take_locate(&self) -> Option<usize> {
        from_slot(self.locate.swap(NONE, Ordering::AcqRel))
    }

    pub fn selected_instrument(&self) -> usize {
        self.selected_instrument.load(Ordering::Relaxed)
    }

    /// Returns whether the selection changed.
    pub fn select_instrument(&self, index: usize) -> bool {
        self.selected_instrument.swap(index, Ordering::Relaxed) != index
    }

    pub fn playlist_index(&self) -> usize {
        self.playlist_index.load(Ordering::Relaxed)
    }

    pub fn set_playlist_index(&self, index: usize) {
        self.playlist_index.store(index, Ordering::Relaxed);
    }

    pub fn is_master_muted(&self) -> bool {
        self.master_muted.load(Ordering::Relaxed)
    }

    pub fn set_master_muted(&self, muted: bool) {
        self.master_muted.store(muted, Ordering::Relaxed);
    }

    pub fn is_metronome_on(&self) -> bool {
        self.metronome.load(Ordering::Relaxed)
    }

    /// Flips the metronome and returns the new setting.
    pub fn toggle_metronome(&self) -> bool {
        !self.metronome.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn is_record_ready(&self) -> bool {
        self.record_ready.load(Ordering::Relaxed)
    }

    pub fn set_record_ready(&self, ready: bool) {
        self.record_ready.store(ready, Ordering::Relaxed);
    }

    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::Relaxed)
    }

    pub fn set_modified(&self, modified: bool) {
        self.modified.store(modified, Ordering::Relaxed);
    }

    pub fn lead_lag_ticks(&self) -> f64 {
        self.lead_lag_ticks
    }
}

fn from_slot(value: usize) -> Option<usize> {
    if value == NONE {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::Instrument;
    use crate::pattern::Pattern;
    use crate::right_here;

    fn song() -> Song {
        Song {
            patterns: PatternList::new(vec![Pattern::default()]),
            instruments: InstrumentList::new(vec![Instrument::new("Kick")]),
            bpm: 90.0,
        }
    }

    #[test]
    fn transport_round_trip() {
        let (editor, _engine, _events) = controls(song(), Config::default());
        let session = editor.session();
        assert_eq!(session.transport(), TransportState::Uninitialized);
        assert!(!session.transport().accepts_edits());
        session.set_transport(TransportState::Ready);
        assert_eq!(session.transport(), TransportState::Ready);
        assert!(session.transport().accepts_edits());
        assert_eq!(session.tempo.value(), 90.0);
    }

    #[test]
    fn failed_update_publishes_nothing() {
        let (editor, _engine, _events) = controls(song(), Config::default());
        let session = editor.session();
        let before = session.patterns();

        let result: Result<()> = session.update_patterns(right_here!(), |patterns| {
            patterns.push(Pattern::default());
            Err(Error::NoSuchPattern(7))
        });
        assert_eq!(result, Err(Error::NoSuchPattern(7)));
        assert_eq!(session.patterns().len(), 1);
        assert!(!session.is_modified());
        assert!(!session.lock().is_locked());
        drop(before);
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let (editor, _engine, _events) = controls(song(), Config::default());
        let session = editor.session();
        let held = session.patterns();

        session
            .update_patterns(right_here!(), |patterns| {
                patterns.push(Pattern::default());
                Ok(())
            })
            .unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(session.patterns().len(), 2);
        assert!(session.is_modified());
    }

    #[test]
    fn queued_pattern_is_taken_once() {
        let (editor, _engine, _events) = controls(song(), Config::default());
        let session = editor.session();
        session.queue_next_pattern(Some(3));
        assert_eq!(session.next_pattern(), Some(3));
        assert_eq!(session.take_next_pattern(), Some(3));
        assert_eq!(session.take_next_pattern(), None);
        assert!(session.toggle_metronome());
        assert!(!session.toggle_metronome());
    }
}
