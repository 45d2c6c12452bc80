use std::collections::VecDeque;

use crate::instrument::InstrumentId;
use crate::note::{Note, NoteDefaults, NoteId, NoteLength, NoteProperty};
use crate::pattern::{Pattern, Toggled};
use crate::{Error, Result, Tick};

/// One undoable change to a pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct Edit {
    pub pattern: usize,
    pub op: EditOp,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EditOp {
    Toggle {
        tick: Tick,
        instrument: InstrumentId,
        defaults: NoteDefaults,
    },
    AddNoteOff {
        tick: Tick,
        instrument: InstrumentId,
    },
    Remove(Vec<(Tick, NoteId)>),
    Restore(Vec<Note>),
    SetLength {
        tick: Tick,
        id: NoteId,
        length: NoteLength,
    },
    Purge(InstrumentId),
    Fill {
        instrument: InstrumentId,
        ticks: Vec<Tick>,
        defaults: NoteDefaults,
    },
    Erase {
        instrument: InstrumentId,
        ticks: Vec<Tick>,
    },
    SetProperty {
        tick: Tick,
        id: NoteId,
        prop: NoteProperty,
    },
    SetPatternLength(Tick),
}

/// What an applied edit did, for callers that want more than success.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Toggled(Toggled),
    Created(NoteId),
    Removed(Vec<Note>),
    Filled(Vec<Tick>),
    Changed,
}

impl EditOp {
    /// Applies the edit to `pattern` and returns its exact inverse along with
    /// the outcome.
    pub fn apply(self, pattern: &mut Pattern) -> Result<(EditOp, Outcome)> {
        let applied = match self {
            EditOp::Toggle {
                tick,
                instrument,
                defaults,
            } => {
                pattern.check_tick(tick)?;
                match pattern.toggle_note(tick, instrument, &defaults) {
                    Toggled::Created(id) => (
                        EditOp::Remove(vec![(tick, id)]),
                        Outcome::Toggled(Toggled::Created(id)),
                    ),
                    Toggled::Removed(note) => (
                        EditOp::Restore(vec![note.clone()]),
                        Outcome::Toggled(Toggled::Removed(note)),
                    ),
                }
            }
            EditOp::AddNoteOff { tick, instrument } => {
                pattern.check_tick(tick)?;
                let id = pattern.add_note_off(tick, instrument);
                (EditOp::Remove(vec![(tick, id)]), Outcome::Created(id))
            }
            EditOp::Remove(ids) => {
                let removed = pattern.remove_notes(&ids);
                (EditOp::Restore(removed.clone()), Outcome::Removed(removed))
            }
            EditOp::Restore(notes) => {
                let ids = notes.iter().map(|note| (note.position, note.id)).collect();
                pattern.restore_notes(notes);
                (EditOp::Remove(ids), Outcome::Changed)
            }
            EditOp::SetLength { tick, id, length } => {
                let previous = pattern.set_note_length(tick, id, length)?;
                (
                    EditOp::SetLength {
                        tick,
                        id,
                        length: previous,
                    },
                    Outcome::Changed,
                )
            }
            EditOp::Purge(instrument) => {
                let removed = pattern.purge_instrument(instrument);
                (EditOp::Restore(removed.clone()), Outcome::Removed(removed))
            }
            EditOp::Fill {
                instrument,
                ticks,
                defaults,
            } => {
                let filled = pattern.fill_notes(instrument, &ticks, &defaults);
                (
                    EditOp::Erase {
                        instrument,
                        ticks: filled.clone(),
                    },
                    Outcome::Filled(filled),
                )
            }
            EditOp::Erase { instrument, ticks } => {
                let removed = pattern.erase_notes(instrument, &ticks);
                (EditOp::Restore(removed.clone()), Outcome::Removed(removed))
            }
            EditOp::SetProperty { tick, id, prop } => {
                let previous = pattern.set_property(tick, id, prop);
                debug_assert!(previous.is_some(), "note {} vanished from tick {}", id, tick);
                let previous = previous.ok_or(Error::NoteVanished(tick))?;
                (
                    EditOp::SetProperty {
                        tick,
                        id,
                        prop: previous,
                    },
                    Outcome::Changed,
                )
            }
            EditOp::SetPatternLength(length) => {
                let previous = pattern.set_len(length);
                (EditOp::SetPatternLength(previous), Outcome::Changed)
            }
        };
        Ok(applied)
    }
}

/// Undo and redo stacks of inverse edits.
#[derive(Debug)]
pub struct History {
    undo: VecDeque<Edit>,
    redo: Vec<Edit>,
    depth: usize,
}

impl History {
    pub fn new(depth: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(depth),
            redo: Vec::new(),
            depth,
        }
    }

    /// Records the inverse of a new edit. Anything that could be redone is
    /// dropped.
    pub fn record(&mut self, inverse: Edit) {
        self.redo.clear();
        self.push_undo(inverse);
    }

    fn push_undo(&mut self, inverse: Edit) {
        if self.depth == 0 {
            return;
        }
        if self.undo.len() == self.depth {
            self.undo.pop_front();
        }
        self.undo.push_back(inverse);
    }

    pub fn take_undo(&mut self) -> Option<Edit> {
        self.undo.pop_back()
    }

    pub fn take_redo(&mut self) -> Option<Edit> {
        self.redo.pop()
    }

    /// Stores the inverse of an undone edit so it can be redone.
    pub fn undone(&mut self, inverse: Edit) {
        self.redo.push(inverse);
    }

    /// Stores the inverse of a redone edit without touching the redo stack.
    pub fn redone(&mut self, inverse: Edit) {
        self.push_undo(inverse);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::NoteKey;

    fn snapshot(pattern: &Pattern) -> Vec<Note> {
        pattern.notes().all().cloned().collect()
    }

    fn round_trip(pattern: &mut Pattern, op: EditOp) {
        let before = snapshot(pattern);
        let (inverse, _) = op.apply(pattern).unwrap();
        let (redo, _) = inverse.apply(pattern).unwrap();
        assert_eq!(snapshot(pattern), before);
        redo.apply(pattern).unwrap();
    }

    #[test]
    fn every_edit_inverts() {
        let kick = InstrumentId::new();
        let mut pattern = Pattern::default();
        let defaults = NoteDefaults::default();

        round_trip(
            &mut pattern,
            EditOp::Toggle {
                tick: 0,
                instrument: kick,
                defaults,
            },
        );
        round_trip(
            &mut pattern,
            EditOp::AddNoteOff {
                tick: 12,
                instrument: kick,
            },
        );
        round_trip(
            &mut pattern,
            EditOp::Fill {
                instrument: kick,
                ticks: vec![0, 24, 48],
                defaults,
            },
        );
        let id = pattern.note_at(24, kick).unwrap().id;
        round_trip(
            &mut pattern,
            EditOp::SetProperty {
                tick: 24,
                id,
                prop: NoteProperty::Key(NoteKey::new(5, 1)),
            },
        );
        let id = pattern.note_at(48, kick).unwrap().id;
        round_trip(
            &mut pattern,
            EditOp::SetLength {
                tick: 48,
                id,
                length: NoteLength::Ticks(30),
            },
        );
        round_trip(
            &mut pattern,
            EditOp::Erase {
                instrument: kick,
                ticks: vec![24, 48],
            },
        );
        round_trip(&mut pattern, EditOp::Purge(kick));
        round_trip(&mut pattern, EditOp::SetPatternLength(96));
        assert_eq!(pattern.len(), 96);
    }

    #[test]
    fn toggle_outcome() {
        let kick = InstrumentId::new();
        let mut pattern = Pattern::default();
        let op = EditOp::Toggle {
            tick: 4,
            instrument: kick,
            defaults: NoteDefaults::default(),
        };
        let (inverse, outcome) = op.clone().apply(&mut pattern).unwrap();
        let id = match outcome {
            Outcome::Toggled(Toggled::Created(id)) => id,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(inverse, EditOp::Remove(vec![(4, id)]));

        let (_, outcome) = op.apply(&mut pattern).unwrap();
        assert!(matches!(outcome, Outcome::Toggled(Toggled::Removed(ref n)) if n.id == id));
    }

    #[test]
    fn new_edit_clears_redo() {
        let edit = |tick| Edit {
            pattern: 0,
            op: EditOp::SetPatternLength(tick),
        };
        let mut history = History::new(2);
        history.record(edit(1));
        history.record(edit(2));
        history.record(edit(3));
        assert_eq!(history.take_undo(), Some(edit(3)));
        history.undone(edit(30));
        assert!(history.can_redo());
        assert_eq!(history.take_undo(), Some(edit(2)));
        assert_eq!(history.take_undo(), None);

        history.record(edit(4));
        assert!(!history.can_redo());
    }

    #[test]
    fn out_of_range_ticks_leave_the_pattern_alone() {
        let kick = InstrumentId::new();
        let mut pattern = Pattern::new("Intro", 192);
        let toggle = EditOp::Toggle {
            tick: 500,
            instrument: kick,
            defaults: NoteDefaults::default(),
        };
        let expected = Err(Error::TickOutOfRange {
            tick: 500,
            length: 192,
        });
        assert_eq!(toggle.apply(&mut pattern).map(|_| ()), expected);
        let note_off = EditOp::AddNoteOff {
            tick: 192,
            instrument: kick,
        };
        assert!(note_off.apply(&mut pattern).is_err());
        assert!(pattern.notes().is_empty());
    }
}
