use std::collections::BTreeMap;
use std::ops::Bound;

use crate::note::{Note, NoteId};
use crate::Tick;

/// Notes of a pattern, ordered by tick. Several notes may share a tick.
///
/// The index owns its notes by value. Within a tick, notes keep their
/// insertion order, and an emptied tick is dropped from the map so that
/// `ticks()` only ever yields occupied positions.
#[derive(Clone, Debug, Default)]
pub struct NotePositionIndex {
    ticks: BTreeMap<Tick, Vec<Note>>,
    len: usize,
}

impl NotePositionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts `note` at `tick`. Does not check for an existing note of the
    /// same instrument.
    pub fn insert(&mut self, tick: Tick, mut note: Note) {
        note.position = tick;
        self.ticks.entry(tick).or_default().push(note);
        self.len += 1;
    }

    /// Removes the note identified by `id` at `tick`, or does nothing if it
    /// isn't there.
    pub fn erase(&mut self, tick: Tick, id: NoteId) -> Option<Note> {
        let bucket = self.ticks.get_mut(&tick)?;
        let i = bucket.iter().position(|note| note.id == id)?;
        let note = bucket.remove(i);
        if bucket.is_empty() {
            self.ticks.remove(&tick);
        }
        self.len -= 1;
        Some(note)
    }

    /// All notes located exactly at `tick`.
    pub fn range_at(&self, tick: Tick) -> impl Iterator<Item = &Note> + Clone + '_ {
        self.ticks.get(&tick).into_iter().flatten()
    }

    /// Every note, in ascending tick order.
    pub fn all(&self) -> impl Iterator<Item = &Note> + Clone + '_ {
        self.ticks.values().flatten()
    }

    /// Notes at ticks strictly below `end`, in ascending tick order.
    pub fn before(&self, end: Tick) -> impl Iterator<Item = &Note> + Clone + '_ {
        self.ticks
            .range((Bound::Unbounded, Bound::Excluded(end)))
            .flat_map(|(_, bucket)| bucket.iter())
    }

    /// Occupied ticks in ascending order.
    pub fn ticks(&self) -> impl Iterator<Item = Tick> + '_ {
        self.ticks.keys().copied()
    }

    pub fn get(&self, tick: Tick, id: NoteId) -> Option<&Note> {
        self.range_at(tick).find(|note| note.id == id)
    }

    pub fn get_mut(&mut self, tick: Tick, id: NoteId) -> Option<&mut Note> {
        self.ticks
            .get_mut(&tick)?
            .iter_mut()
            .find(|note| note.id == id)
    }

    /// Removes every note for which `remove` returns true and hands the
    /// removed notes back in tick order.
    pub fn extract_if<F>(&mut self, mut remove: F) -> Vec<Note>
    where
        F: FnMut(&Note) -> bool,
    {
        let mut removed = Vec::new();
        for bucket in self.ticks.values_mut() {
            let mut i = 0;
            while i < bucket.len() {
                if remove(&bucket[i]) {
                    removed.push(bucket.remove(i));
                } else {
                    i += 1;
                }
            }
        }
        self.ticks.retain(|_, bucket| !bucket.is_empty());
        self.len -= removed.len();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::InstrumentId;
    use crate::note::NoteDefaults;

    fn note(instrument: InstrumentId) -> Note {
        Note::new(instrument, 0, &NoteDefaults::default())
    }

    #[test]
    fn insert_sets_position() {
        let mut index = NotePositionIndex::new();
        index.insert(12, note(InstrumentId::new()));
        let n = index.range_at(12).next().unwrap();
        assert_eq!(n.position, 12);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn range_at_returns_only_that_tick() {
        let kick = InstrumentId::new();
        let snare = InstrumentId::new();
        let mut index = NotePositionIndex::new();
        index.insert(0, note(kick));
        index.insert(4, note(kick));
        index.insert(4, note(snare));
        index.insert(8, note(snare));

        assert_eq!(index.range_at(4).count(), 2);
        assert_eq!(index.range_at(5).count(), 0);

        // restartable
        let range = index.range_at(4);
        assert_eq!(range.clone().count(), range.count());
    }

    #[test]
    fn all_is_ordered() {
        let id = InstrumentId::new();
        let mut index = NotePositionIndex::new();
        for tick in [40, 3, 17, 3, 0] {
            index.insert(tick, note(id));
        }
        let positions: Vec<Tick> = index.all().map(|n| n.position).collect();
        assert_eq!(positions, vec![0, 3, 3, 17, 40]);
        let below: Vec<Tick> = index.before(17).map(|n| n.position).collect();
        assert_eq!(below, vec![0, 3, 3]);
    }

    #[test]
    fn erase_exact_entry() {
        let id = InstrumentId::new();
        let mut index = NotePositionIndex::new();
        let first = note(id);
        let second = note(id);
        let first_id = first.id;
        index.insert(5, first);
        index.insert(5, second.clone());

        assert!(index.erase(6, first_id).is_none());
        let removed = index.erase(5, first_id).unwrap();
        assert_eq!(removed.id, first_id);
        assert_eq!(index.len(), 1);
        assert_eq!(index.range_at(5).next().unwrap().id, second.id);

        assert!(index.erase(5, first_id).is_none());
        index.erase(5, second.id);
        assert!(index.is_empty());
        assert_eq!(index.ticks().count(), 0);
    }

    #[test]
    fn extract_matching_notes() {
        let kick = InstrumentId::new();
        let snare = InstrumentId::new();
        let mut index = NotePositionIndex::new();
        index.insert(0, note(kick));
        index.insert(0, note(snare));
        index.insert(8, note(kick));

        let removed = index.extract_if(|n| n.instrument == kick);
        assert_eq!(removed.len(), 2);
        assert_eq!(index.len(), 1);
        assert_eq!(index.ticks().collect::<Vec<_>>(), vec![0]);
    }
}
