use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::engine::EngineCommand;
use crate::events::{Event, Notifier};
use crate::history::{Edit, EditOp, History, Outcome};
use crate::instrument::InstrumentId;
use crate::note::{Note, NoteDefaults, NoteId, NoteLength, NoteProperty};
use crate::pattern::{Pattern, Toggled};
use crate::right_here;
use crate::session::{Session, TransportState};
use crate::{Error, Result, Tick};

/// Control-path front end for editing patterns.
///
/// Editors are cheap to clone. Every clone edits the same session and
/// shares one undo history, so a UI and a MIDI controller can work on the
/// song side by side.
#[derive(Clone)]
pub struct Editor {
    session: Arc<Session>,
    notifier: Notifier,
    history: Arc<Mutex<History>>,
    config: Arc<Config>,
}

impl Editor {
    pub fn new(session: Arc<Session>, notifier: Notifier, config: Config) -> Self {
        Self {
            session,
            notifier,
            history: Arc::new(Mutex::new(History::new(config.history_depth))),
            config: Arc::new(config),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn notify(&self, event: Event) {
        self.notifier.notify(event);
    }

    fn check_transport(&self, what: &str) -> Result<()> {
        let state = self.session.transport();
        if state.accepts_edits() {
            Ok(())
        } else {
            error!("skipping {}: engine not ready ({:?})", what, state);
            Err(Error::InvalidTransportState(state))
        }
    }

    fn instrument_id(&self, row: usize) -> Result<InstrumentId> {
        self.session
            .instruments()
            .get(row)
            .map(|instrument| instrument.id)
            .ok_or(Error::NoSuchInstrument(row))
    }

    /// Builds an edit from the locked copy of `pattern`, applies it,
    /// records its inverse and publishes the result. The pattern-changed
    /// notification goes out after the lock is released.
    fn commit_with<F>(&self, tag: &'static str, pattern: usize, build: F) -> Result<Outcome>
    where
        F: FnOnce(&Pattern) -> Result<EditOp>,
    {
        let outcome = self.session.update_patterns(tag, |patterns| {
            let target = patterns
                .get_mut(pattern)
                .ok_or(Error::NoSuchPattern(pattern))?;
            let op = build(&*target)?;
            let (inverse, outcome) = op.apply(target)?;
            self.history.lock().record(Edit {
                pattern,
                op: inverse,
            });
            Ok(outcome)
        })?;
        self.notifier.notify(Event::PatternChanged { pattern });
        Ok(outcome)
    }

    fn commit(&self, tag: &'static str, pattern: usize, op: EditOp) -> Result<Outcome> {
        self.commit_with(tag, pattern, move |_| Ok(op))
    }

    /// Resolves the note of instrument `row` under the pointer. See
    /// [`Pattern::find_note`].
    pub fn find_note(
        &self,
        pattern: usize,
        target: Tick,
        humanized: Tick,
        row: usize,
    ) -> Result<Option<Note>> {
        self.check_transport("find note")?;
        let instrument = self.instrument_id(row)?;
        let patterns = self.session.patterns();
        let pattern = patterns
            .get(pattern)
            .ok_or(Error::NoSuchPattern(pattern))?;
        Ok(pattern.find_note(target, humanized, instrument).cloned())
    }

    /// Adds or removes the note of instrument `row` at `tick` and selects
    /// that row. New notes take `defaults`, or the configured defaults, and
    /// are auditioned when the editor is set to hear new notes.
    pub fn toggle_note(
        &self,
        pattern: usize,
        tick: Tick,
        row: usize,
        defaults: Option<NoteDefaults>,
    ) -> Result<Toggled> {
        self.check_transport("toggle note")?;
        let instrument = self.instrument_id(row)?;
        let defaults = defaults.unwrap_or(self.config.note_defaults);
        let outcome = self.commit(
            right_here!(),
            pattern,
            EditOp::Toggle {
                tick,
                instrument,
                defaults,
            },
        )?;
        let toggled = match outcome {
            Outcome::Toggled(toggled) => toggled,
            other => {
                debug_assert!(false, "toggle produced {:?}", other);
                return Err(Error::NoteVanished(tick));
            }
        };
        debug!(pattern, tick, row, ?toggled, "toggled note");

        if self.session.select_instrument(row) {
            self.notifier.notify(Event::SelectedInstrumentChanged(row));
        }
        if matches!(toggled, Toggled::Created(_)) && self.config.hear_new_notes {
            self.audition(instrument, &defaults);
        }
        Ok(toggled)
    }

    fn audition(&self, instrument: InstrumentId, defaults: &NoteDefaults) {
        let note = Note::new(instrument, 0, defaults);
        if let Err(e) = self.session.send(EngineCommand::Audition { instrument, note }) {
            warn!("unable to audition note: {}", e);
        }
    }

    pub fn add_note_off(&self, pattern: usize, tick: Tick, row: usize) -> Result<NoteId> {
        self.check_transport("add note-off")?;
        let instrument = self.instrument_id(row)?;
        match self.commit(right_here!(), pattern, EditOp::AddNoteOff { tick, instrument })? {
            Outcome::Created(id) => Ok(id),
            other => {
                debug_assert!(false, "note-off produced {:?}", other);
                Err(Error::NoteVanished(tick))
            }
        }
    }

    /// Sets the length of a note previously resolved with `find_note`.
    /// Note-off markers are refused.
    pub fn set_note_length(
        &self,
        pattern: usize,
        tick: Tick,
        id: NoteId,
        length: NoteLength,
    ) -> Result<()> {
        self.check_transport("set note length")?;
        self.commit(right_here!(), pattern, EditOp::SetLength { tick, id, length })?;
        Ok(())
    }

    /// Stretches the note at `tick` so its tail ends under `pointer`.
    /// Note-off markers are refused.
    pub fn drag_note_length(
        &self,
        pattern: usize,
        tick: Tick,
        id: NoteId,
        pointer: Tick,
    ) -> Result<NoteLength> {
        self.check_transport("drag note length")?;
        let mut dragged = NoteLength::Open;
        self.commit_with(right_here!(), pattern, |target| {
            let note = target.notes().get(tick, id);
            debug_assert!(note.is_some(), "note {} vanished from tick {}", id, tick);
            let note = note.ok_or(Error::NoteVanished(tick))?;
            dragged = Pattern::drag_length(note, pointer)?;
            Ok(EditOp::SetLength {
                tick,
                id,
                length: dragged,
            })
        })?;
        Ok(dragged)
    }

    /// Removes every note of instrument `row` and returns them so they can
    /// be put back with `restore_notes`.
    pub fn purge_instrument(&self, pattern: usize, row: usize) -> Result<Vec<Note>> {
        self.check_transport("purge instrument")?;
        let instrument = self.instrument_id(row)?;
        match self.commit(right_here!(), pattern, EditOp::Purge(instrument))? {
            Outcome::Removed(notes) => Ok(notes),
            _ => Ok(Vec::new()),
        }
    }

    pub fn restore_notes(&self, pattern: usize, notes: Vec<Note>) -> Result<()> {
        self.check_transport("restore notes")?;
        self.commit(right_here!(), pattern, EditOp::Restore(notes))?;
        Ok(())
    }

    /// Fills every listed tick where instrument `row` has no note yet.
    pub fn fill_notes(&self, pattern: usize, row: usize, ticks: Vec<Tick>) -> Result<Vec<Tick>> {
        self.check_transport("fill notes")?;
        let instrument = self.instrument_id(row)?;
        let op = EditOp::Fill {
            instrument,
            ticks,
            defaults: self.config.note_defaults,
        };
        match self.commit(right_here!(), pattern, op)? {
            Outcome::Filled(ticks) => Ok(ticks),
            _ => Ok(Vec::new()),
        }
    }

    pub fn erase_notes(&self, pattern: usize, row: usize, ticks: Vec<Tick>) -> Result<Vec<Note>> {
        self.check_transport("erase notes")?;
        let instrument = self.instrument_id(row)?;
        match self.commit(right_here!(), pattern, EditOp::Erase { instrument, ticks })? {
            Outcome::Removed(notes) => Ok(notes),
            _ => Ok(Vec::new()),
        }
    }

    /// Changes a property of a note previously resolved with `find_note`.
    pub fn set_note_property(
        &self,
        pattern: usize,
        tick: Tick,
        id: NoteId,
        prop: NoteProperty,
    ) -> Result<()> {
        self.check_transport("set note property")?;
        self.commit(right_here!(), pattern, EditOp::SetProperty { tick, id, prop })?;
        Ok(())
    }

    pub fn set_pattern_length(&self, pattern: usize, length: Tick) -> Result<()> {
        self.check_transport("set pattern length")?;
        self.commit(right_here!(), pattern, EditOp::SetPatternLength(length))?;
        Ok(())
    }

    pub fn undo(&self) -> Result<()> {
        self.check_transport("undo")?;
        let pattern = self.replay(right_here!(), "undo")?;
        self.notifier.notify(Event::PatternChanged { pattern });
        Ok(())
    }

    pub fn redo(&self) -> Result<()> {
        self.check_transport("redo")?;
        let pattern = self.replay(right_here!(), "redo")?;
        self.notifier.notify(Event::PatternChanged { pattern });
        Ok(())
    }

    fn replay(&self, tag: &'static str, what: &'static str) -> Result<usize> {
        let undo = what == "undo";
        self.session.update_patterns(tag, |patterns| {
            let mut history = self.history.lock();
            let edit = if undo {
                history.take_undo()
            } else {
                history.take_redo()
            };
            let edit = edit.ok_or(Error::EmptyHistory(what))?;
            let pattern = edit.pattern;
            let target = match patterns.get_mut(pattern) {
                Some(target) => target,
                None => {
                    if undo {
                        history.redone(edit);
                    } else {
                        history.undone(edit);
                    }
                    return Err(Error::NoSuchPattern(pattern));
                }
            };
            let (inverse, _) = edit.op.apply(target)?;
            let inverse = Edit {
                pattern,
                op: inverse,
            };
            if undo {
                history.undone(inverse);
            } else {
                history.redone(inverse);
            }
            Ok(pattern)
        })
    }

    pub fn play(&self) -> Result<()> {
        match self.session.transport() {
            TransportState::Playing => Ok(()),
            TransportState::Ready => {
                self.session.set_transport(TransportState::Playing);
                self.notifier.notify(Event::TransportChanged);
                Ok(())
            }
            state => {
                error!("skipping play: engine not ready ({:?})", state);
                Err(Error::InvalidTransportState(state))
            }
        }
    }

    /// Stops playback and rewinds to the start of the selected pattern.
    pub fn stop(&self) -> Result<()> {
        self.check_transport("stop")?;
        self.session.set_transport(TransportState::Ready);
        self.session.locate(self.session.selected_pattern());
        self.notifier.notify(Event::TransportChanged);
        Ok(())
    }

    /// Stops playback and keeps the position.
    pub fn pause(&self) -> Result<()> {
        self.check_transport("pause")?;
        if self.session.is_playing() {
            self.session.set_transport(TransportState::Ready);
            self.notifier.notify(Event::TransportChanged);
        }
        Ok(())
    }

    pub fn select_pattern(&self, index: usize) -> Result<()> {
        if index >= self.session.patterns().len() {
            return Err(Error::NoSuchPattern(index));
        }
        if self.session.select_pattern(index) {
            self.notifier.notify(Event::SelectedPatternChanged(index));
        }
        Ok(())
    }

    /// Queues `index` to start when the playing pattern ends.
    pub fn queue_next_pattern(&self, index: usize) -> Result<()> {
        if index >= self.session.patterns().len() {
            return Err(Error::NoSuchPattern(index));
        }
        self.session.queue_next_pattern(Some(index));
        self.notifier.notify(Event::NextPatternQueued(index));
        Ok(())
    }

    pub fn select_instrument(&self, row: usize) {
        if self.session.select_instrument(row) {
            self.notifier.notify(Event::SelectedInstrumentChanged(row));
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.lock().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.lock().can_redo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, Trigger, TriggerKind};
    use crate::instrument::{Instrument, InstrumentList};
    use crate::note::NoteKey;
    use crate::pattern::PatternList;
    use crate::session::{controls, Song};
    use crossbeam_channel::Receiver;

    fn setup(config: Config) -> (Editor, Engine, Receiver<Event>) {
        let song = Song {
            patterns: PatternList::new(vec![Pattern::default(), Pattern::new("B", 96)]),
            instruments: InstrumentList::new(vec![
                Instrument::new("Kick"),
                Instrument::new("Snare"),
                Instrument::new("Hat"),
            ]),
            ..Song::default()
        };
        let (editor, engine, events) = controls(song, config);
        editor.session().set_transport(TransportState::Ready);
        (editor, engine, events)
    }

    fn drain(events: &Receiver<Event>) -> Vec<Event> {
        events.try_iter().collect()
    }

    #[test]
    fn edits_need_a_ready_engine() {
        let (editor, _engine, events) = setup(Config::default());
        let session = editor.session();
        session.set_transport(TransportState::Prepared);

        let result = editor.toggle_note(0, 0, 1, None);
        assert_eq!(
            result,
            Err(Error::InvalidTransportState(TransportState::Prepared))
        );
        assert!(session.patterns().get(0).unwrap().notes().is_empty());
        assert!(!session.is_modified());
        assert!(drain(&events).is_empty());
        assert!(!editor.can_undo());
        assert!(matches!(
            editor.find_note(0, 0, 0, 1),
            Err(Error::InvalidTransportState(TransportState::Prepared))
        ));
    }

    #[test]
    fn toggle_selects_row_and_notifies_once() {
        let (editor, _engine, events) = setup(Config::default());
        let toggled = editor.toggle_note(0, 12, 2, None).unwrap();
        assert!(matches!(toggled, Toggled::Created(_)));
        assert_eq!(
            drain(&events),
            vec![
                Event::PatternChanged { pattern: 0 },
                Event::SelectedInstrumentChanged(2),
            ]
        );

        editor.toggle_note(0, 12, 2, None).unwrap();
        assert_eq!(drain(&events), vec![Event::PatternChanged { pattern: 0 }]);
        assert!(editor.session().is_modified());
    }

    #[test]
    fn new_notes_are_auditioned_after_commit() {
        let (editor, mut engine, _events) = setup(Config::default());
        editor.toggle_note(0, 0, 1, None).unwrap();
        editor.toggle_note(0, 0, 1, None).unwrap();

        let mut out = Vec::new();
        engine.process(32, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].instrument, Some(1));
        assert!(matches!(out[0].kind, TriggerKind::NoteOn(_)));

        let (editor, mut engine, _events) = setup(Config::default().with_hear_new_notes(false));
        editor.toggle_note(0, 0, 1, None).unwrap();
        out.clear();
        engine.process(32, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn full_audition_queue_keeps_the_edit() {
        let config = Config::default().with_audition_queue_size(1);
        let (editor, _engine, _events) = setup(config);
        editor.toggle_note(0, 0, 0, None).unwrap();
        editor.toggle_note(0, 4, 0, None).unwrap();
        assert_eq!(editor.session().patterns().get(0).unwrap().notes().len(), 2);
    }

    #[test]
    fn undo_and_redo_toggle() {
        let (editor, _engine, _events) = setup(Config::default());
        let id = match editor.toggle_note(1, 24, 0, None).unwrap() {
            Toggled::Created(id) => id,
            other => panic!("expected a new note, got {:?}", other),
        };
        editor.undo().unwrap();
        assert!(editor.session().patterns().get(1).unwrap().notes().is_empty());
        assert!(editor.can_redo());

        editor.redo().unwrap();
        let patterns = editor.session().patterns();
        let note = patterns.get(1).unwrap().notes().get(24, id);
        assert!(note.is_some());

        editor.undo().unwrap();
        assert_eq!(editor.undo(), Err(Error::EmptyHistory("undo")));
    }

    #[test]
    fn drag_and_property_edits() {
        let (editor, _engine, _events) = setup(Config::default());
        let defaults = NoteDefaults {
            key: NoteKey::new(0, -1),
            ..NoteDefaults::default()
        };
        let id = match editor.toggle_note(0, 10, 0, Some(defaults)).unwrap() {
            Toggled::Created(id) => id,
            other => panic!("expected a new note, got {:?}", other),
        };
        assert_eq!(
            editor.drag_note_length(0, 10, id, 22).unwrap(),
            NoteLength::Ticks(6)
        );
        let note = editor.find_note(0, 14, 14, 0).unwrap().unwrap();
        assert_eq!(note.id, id);

        editor
            .set_note_property(0, 10, id, NoteProperty::Velocity(0.25))
            .unwrap();
        let note = editor.find_note(0, 10, 10, 0).unwrap().unwrap();
        assert_eq!(note.velocity, 0.25);

        assert_eq!(editor.drag_note_length(0, 10, id, 10).unwrap(), NoteLength::Open);
        assert_eq!(editor.find_note(0, 14, 14, 0).unwrap(), None);
    }

    #[test]
    fn property_undo_targets_the_edited_note() {
        let (editor, _engine, _events) = setup(Config::default().with_hear_new_notes(false));
        let id = match editor.toggle_note(0, 4, 0, None).unwrap() {
            Toggled::Created(id) => id,
            other => panic!("expected a new note, got {:?}", other),
        };
        let marker = editor.add_note_off(0, 4, 0).unwrap();
        editor
            .set_note_property(0, 4, id, NoteProperty::Pan { left: 0.1, right: 0.9 })
            .unwrap();
        assert!(matches!(
            editor.toggle_note(0, 4, 0, None).unwrap(),
            Toggled::Removed(ref note) if note.id == id
        ));

        // the restored note now sits behind the marker in its slot
        editor.undo().unwrap();
        editor.undo().unwrap();
        let pan = |editor: &Editor, id| {
            let patterns = editor.session().patterns();
            let note = patterns.get(0).unwrap().notes().get(4, id).unwrap().clone();
            (note.pan_l, note.pan_r)
        };
        assert_eq!(pan(&editor, id), (0.5, 0.5));
        assert_eq!(pan(&editor, marker), (0.5, 0.5));

        editor.redo().unwrap();
        assert_eq!(pan(&editor, id), (0.1, 0.9));
        assert_eq!(pan(&editor, marker), (0.5, 0.5));
    }

    #[test]
    fn note_off_markers_keep_their_length() {
        let (editor, _engine, events) = setup(Config::default());
        let marker = editor.add_note_off(0, 10, 0).unwrap();
        drain(&events);

        assert_eq!(
            editor.drag_note_length(0, 10, marker, 40),
            Err(Error::NoteOffLength(10))
        );
        assert_eq!(
            editor.set_note_length(0, 10, marker, NoteLength::Ticks(30)),
            Err(Error::NoteOffLength(10))
        );
        let note = editor.find_note(0, 10, 10, 0).unwrap().unwrap();
        assert_eq!(note.id, marker);
        assert_eq!(note.length, NoteLength::Ticks(1));
        assert!(drain(&events).is_empty());

        // only the marker itself is on the undo stack
        editor.undo().unwrap();
        assert!(!editor.can_undo());
    }

    #[test]
    fn ticks_past_the_pattern_end_are_rejected() {
        let (editor, mut engine, events) = setup(Config::default());
        let out_of_range = Error::TickOutOfRange {
            tick: 500,
            length: 192,
        };
        assert_eq!(editor.toggle_note(0, 500, 0, None), Err(out_of_range.clone()));
        assert_eq!(editor.add_note_off(0, 500, 0), Err(out_of_range));
        assert_eq!(
            editor.toggle_note(1, 96, 0, None),
            Err(Error::TickOutOfRange {
                tick: 96,
                length: 96
            })
        );

        assert!(editor.session().patterns().get(0).unwrap().notes().is_empty());
        assert!(!editor.session().is_modified());
        assert!(!editor.can_undo());
        assert!(drain(&events).is_empty());
        let mut out: Vec<Trigger> = Vec::new();
        engine.process(32, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn batch_edits_notify_once() {
        let (editor, _engine, events) = setup(Config::default());
        let changed = vec![Event::PatternChanged { pattern: 0 }];

        editor.fill_notes(0, 2, vec![0, 12, 24, 36, 48]).unwrap();
        assert_eq!(drain(&events), changed);

        editor.erase_notes(0, 2, vec![12, 36]).unwrap();
        assert_eq!(drain(&events), changed);

        let purged = editor.purge_instrument(0, 2).unwrap();
        assert_eq!(purged.len(), 3);
        assert_eq!(drain(&events), changed);

        // putting the purged notes back is a single multi-note edit too
        editor.undo().unwrap();
        assert_eq!(editor.session().patterns().get(0).unwrap().notes().len(), 3);
        assert_eq!(drain(&events), changed);
    }

    #[test]
    fn fill_erase_and_purge() {
        let (editor, _engine, _events) = setup(Config::default());
        let filled = editor.fill_notes(0, 2, vec![0, 12, 24, 36]).unwrap();
        assert_eq!(filled, vec![0, 12, 24, 36]);
        let erased = editor.erase_notes(0, 2, vec![12, 36]).unwrap();
        assert_eq!(erased.len(), 2);

        let purged = editor.purge_instrument(0, 2).unwrap();
        assert_eq!(purged.len(), 2);
        editor.restore_notes(0, purged).unwrap();
        assert_eq!(editor.session().patterns().get(0).unwrap().notes().len(), 2);

        editor.undo().unwrap();
        editor.undo().unwrap();
        editor.undo().unwrap();
        assert_eq!(editor.session().patterns().get(0).unwrap().notes().len(), 4);
    }

    #[test]
    fn unknown_targets_are_rejected() {
        let (editor, _engine, events) = setup(Config::default());
        assert_eq!(editor.toggle_note(5, 0, 0, None), Err(Error::NoSuchPattern(5)));
        assert_eq!(editor.toggle_note(0, 0, 9, None), Err(Error::NoSuchInstrument(9)));
        assert!(drain(&events).is_empty());
        assert!(!editor.session().is_modified());
    }

    #[test]
    fn transport_controls() {
        let (editor, _engine, _events) = setup(Config::default());
        let session = editor.session();
        editor.play().unwrap();
        assert_eq!(session.transport(), TransportState::Playing);
        editor.pause().unwrap();
        assert_eq!(session.transport(), TransportState::Ready);
        editor.stop().unwrap();
        assert_eq!(session.take_locate(), Some(0));

        session.set_transport(TransportState::Initialized);
        assert!(editor.play().is_err());
    }
}
