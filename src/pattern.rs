use crate::index::NotePositionIndex;
use crate::instrument::InstrumentId;
use crate::note::{Note, NoteDefaults, NoteId, NoteLength, NoteProperty};
use crate::{Error, Result, Tick, DEFAULT_PATTERN_LEN, MAX_PATTERN_LEN};

/// Tick under a pointer `offset` pixels into the grid, without snapping to
/// the editor resolution. Offsets left of the grid map to tick 0.
pub fn humanized_tick(offset: f64, grid_width: f64) -> Tick {
    if offset <= 0.0 || grid_width <= 0.0 {
        return 0;
    }
    (offset / grid_width).floor() as Tick
}

/// Result of toggling a note slot.
#[derive(Clone, Debug, PartialEq)]
pub enum Toggled {
    Created(NoteId),
    Removed(Note),
}

#[derive(Clone, Debug)]
pub struct Pattern {
    pub name: String,
    length: Tick,
    notes: NotePositionIndex,
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new("Pattern", DEFAULT_PATTERN_LEN)
    }
}

impl Pattern {
    pub fn new<S: Into<String>>(name: S, length: Tick) -> Self {
        Self {
            name: name.into(),
            length: length.clamp(1, MAX_PATTERN_LEN),
            notes: NotePositionIndex::new(),
        }
    }

    pub fn len(&self) -> Tick {
        self.length
    }

    /// Changes the loop span. Notes beyond the new end are kept so that
    /// growing the pattern again brings them back.
    pub fn set_len(&mut self, length: Tick) -> Tick {
        let previous = self.length;
        self.length = length.clamp(1, MAX_PATTERN_LEN);
        previous
    }

    pub fn notes(&self) -> &NotePositionIndex {
        &self.notes
    }

    /// Fails when `tick` lies past the end of the pattern.
    pub fn check_tick(&self, tick: Tick) -> Result<()> {
        if tick < self.length {
            Ok(())
        } else {
            Err(Error::TickOutOfRange {
                tick,
                length: self.length,
            })
        }
    }

    /// First note of `instrument` located exactly at `tick`.
    pub fn note_at(&self, tick: Tick, instrument: InstrumentId) -> Option<&Note> {
        self.notes
            .range_at(tick)
            .find(|note| note.instrument == instrument)
    }

    fn sounding_note_at(&self, tick: Tick, instrument: InstrumentId) -> Option<&Note> {
        self.notes
            .range_at(tick)
            .find(|note| note.instrument == instrument && !note.note_off)
    }

    /// Resolves the note a user is pointing at.
    ///
    /// `target` is the quantized tick, `humanized` the tick actually under
    /// the pointer. The first hit wins: a note at `target`, then a note at
    /// `humanized`, then the first earlier note whose stretched span still
    /// covers `humanized`.
    pub fn find_note(
        &self,
        target: Tick,
        humanized: Tick,
        instrument: InstrumentId,
    ) -> Option<&Note> {
        self.note_at(target, instrument)
            .or_else(|| self.note_at(humanized, instrument))
            .or_else(|| {
                self.notes
                    .before(humanized)
                    .find(|note| note.instrument == instrument && note.covers(humanized))
            })
    }

    /// Removes the instrument's sounding note at `tick` if there is one,
    /// otherwise creates one from `defaults`.
    pub fn toggle_note(
        &mut self,
        tick: Tick,
        instrument: InstrumentId,
        defaults: &NoteDefaults,
    ) -> Toggled {
        if let Some(id) = self.sounding_note_at(tick, instrument).map(|n| n.id) {
            if let Some(note) = self.notes.erase(tick, id) {
                return Toggled::Removed(note);
            }
        }
        let note = Note::new(instrument, tick, defaults);
        let id = note.id;
        self.notes.insert(tick, note);
        Toggled::Created(id)
    }

    /// Inserts a note-off marker. An existing marker in the same slot is
    /// not checked for.
    pub fn add_note_off(&mut self, tick: Tick, instrument: InstrumentId) -> NoteId {
        let note = Note::note_off(instrument, tick);
        let id = note.id;
        self.notes.insert(tick, note);
        id
    }

    /// Sets the sustain of a resolved note and returns the previous one.
    /// Note-off markers keep their fixed length.
    pub fn set_note_length(
        &mut self,
        tick: Tick,
        id: NoteId,
        length: NoteLength,
    ) -> Result<NoteLength> {
        let note = self
            .notes
            .get_mut(tick, id)
            .ok_or(Error::NoteVanished(tick))?;
        if note.note_off {
            return Err(Error::NoteOffLength(tick));
        }
        Ok(std::mem::replace(&mut note.length, length))
    }

    /// Length a note gets when its tail is dragged to `pointer`. The drag
    /// distance is in rendered ticks, so it is scaled back up by the note's
    /// stretch factor. Dragging onto or before the note start makes it open.
    pub fn drag_length(note: &Note, pointer: Tick) -> Result<NoteLength> {
        if note.note_off {
            return Err(Error::NoteOffLength(note.position));
        }
        if pointer <= note.position {
            return Ok(NoteLength::Open);
        }
        let ticks = (pointer - note.position) as f64 * note.key.ratio();
        Ok(NoteLength::Ticks(ticks as u32))
    }

    /// Removes every note of `instrument` and returns them.
    pub fn purge_instrument(&mut self, instrument: InstrumentId) -> Vec<Note> {
        self.notes.extract_if(|note| note.instrument == instrument)
    }

    /// Puts previously removed notes back at their own positions.
    pub fn restore_notes<I>(&mut self, notes: I)
    where
        I: IntoIterator<Item = Note>,
    {
        for note in notes {
            self.notes.insert(note.position, note);
        }
    }

    /// Creates a note at each of `ticks` where the instrument has no
    /// sounding note yet. Returns the ticks that were filled.
    pub fn fill_notes(
        &mut self,
        instrument: InstrumentId,
        ticks: &[Tick],
        defaults: &NoteDefaults,
    ) -> Vec<Tick> {
        let mut filled = Vec::with_capacity(ticks.len());
        for &tick in ticks {
            if tick >= self.length || self.sounding_note_at(tick, instrument).is_some() {
                continue;
            }
            self.notes.insert(tick, Note::new(instrument, tick, defaults));
            filled.push(tick);
        }
        filled
    }

    /// Removes the instrument's note at each of `ticks`.
    pub fn erase_notes(&mut self, instrument: InstrumentId, ticks: &[Tick]) -> Vec<Note> {
        let mut removed = Vec::with_capacity(ticks.len());
        for &tick in ticks {
            let id = match self.sounding_note_at(tick, instrument) {
                Some(note) => note.id,
                None => continue,
            };
            removed.extend(self.notes.erase(tick, id));
        }
        removed
    }

    /// Removes exactly the identified notes. Missing ones are skipped.
    pub fn remove_notes(&mut self, notes: &[(Tick, NoteId)]) -> Vec<Note> {
        notes
            .iter()
            .filter_map(|&(tick, id)| self.notes.erase(tick, id))
            .collect()
    }

    /// Changes a property of the identified note and returns the previous
    /// value.
    pub fn set_property(
        &mut self,
        tick: Tick,
        id: NoteId,
        prop: NoteProperty,
    ) -> Option<NoteProperty> {
        let note = self.notes.get_mut(tick, id)?;
        Some(note.apply(prop))
    }
}

/// The patterns of a song.
#[derive(Clone, Debug, Default)]
pub struct PatternList(Vec<Pattern>);

impl PatternList {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self(patterns)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Pattern> {
        self.0.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Pattern> {
        self.0.get_mut(index)
    }

    pub fn push(&mut self, pattern: Pattern) -> usize {
        self.0.push(pattern);
        self.0.len() - 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.0.iter()
    }
}
