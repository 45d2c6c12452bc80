use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use param_derive::Params;
use ulid::Ulid;

use crate::params::{format_semitones, Param, ParamInfo};

pub const MAX_FX: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentId(Ulid);

impl InstrumentId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for InstrumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Mixer strip settings of an instrument.
#[derive(Params)]
pub struct StripParams {
    pub volume: Param,
    pub pan: Param,
    pub gain: Param,
    pub pitch: Param,
    pub cutoff: Param,
    pub fx1: Param,
    pub fx2: Param,
    pub fx3: Param,
    pub fx4: Param,
}

impl StripParams {
    pub fn fx_level(&self, slot: usize) -> Option<&Param> {
        match slot {
            0 => Some(&self.fx1),
            1 => Some(&self.fx2),
            2 => Some(&self.fx3),
            3 => Some(&self.fx4),
            _ => None,
        }
    }

    /// Splits the single pan value into left and right gains. Centre is full
    /// level on both sides.
    pub fn pan_lr(&self) -> (f32, f32) {
        let pan = self.pan.value() as f32;
        if pan >= 0.5 {
            ((1.0 - pan) * 2.0, 1.0)
        } else {
            (1.0, pan * 2.0)
        }
    }
}

impl Default for StripParams {
    fn default() -> Self {
        let fx = |name| Param::new(0.0, ParamInfo::new(name, 0.0, 1.0));
        Self {
            volume: Param::new(1.0, ParamInfo::new("Volume", 0.0, 1.5).with_step(0.05)),
            pan: Param::new(0.5, ParamInfo::new("Pan", 0.0, 1.0).with_step(0.1)),
            gain: Param::new(1.0, ParamInfo::new("Gain", 0.0, 5.0)),
            pitch: Param::new(
                0.0,
                ParamInfo::new("Pitch", -24.0, 24.0)
                    .with_step(1.0)
                    .with_formatter(format_semitones),
            ),
            cutoff: Param::new(1.0, ParamInfo::new("Filter Cutoff", 0.0, 1.0)),
            fx1: fx("FX 1"),
            fx2: fx("FX 2"),
            fx3: fx("FX 3"),
            fx4: fx("FX 4"),
        }
    }
}

pub struct Instrument {
    pub id: InstrumentId,
    pub name: String,
    pub params: StripParams,
    muted: AtomicBool,
    soloed: AtomicBool,
    filter_active: AtomicBool,
}

impl Instrument {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            id: InstrumentId::new(),
            name: name.into(),
            params: StripParams::default(),
            muted: AtomicBool::new(false),
            soloed: AtomicBool::new(false),
            filter_active: AtomicBool::new(false),
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub fn is_soloed(&self) -> bool {
        self.soloed.load(Ordering::Relaxed)
    }

    pub fn set_soloed(&self, soloed: bool) {
        self.soloed.store(soloed, Ordering::Relaxed);
    }

    pub fn is_filter_active(&self) -> bool {
        self.filter_active.load(Ordering::Relaxed)
    }

    pub fn set_filter_active(&self, active: bool) {
        self.filter_active.store(active, Ordering::Relaxed);
    }
}

impl fmt::Debug for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Instrument")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// The instruments of a song, in mixer order. Instruments are shared with
/// the render path, which only ever borrows them from a list snapshot.
#[derive(Clone, Debug, Default)]
pub struct InstrumentList(Vec<Arc<Instrument>>);

impl InstrumentList {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self(instruments.into_iter().map(Arc::new).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Instrument>> {
        self.0.get(index)
    }

    pub fn find(&self, id: InstrumentId) -> Option<&Arc<Instrument>> {
        self.0.iter().find(|instr| instr.id == id)
    }

    pub fn index_of(&self, id: InstrumentId) -> Option<usize> {
        self.0.iter().position(|instr| instr.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Instrument>> {
        self.0.iter()
    }

    pub fn push(&mut self, instrument: Instrument) {
        self.0.push(Arc::new(instrument));
    }

    pub fn any_soloed(&self) -> bool {
        self.0.iter().any(|instr| instr.is_soloed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamIterExt, Params};

    #[test]
    fn pan_split() {
        let strip = StripParams::default();
        assert_eq!(strip.pan_lr(), (1.0, 1.0));
        strip.pan.set(1.0);
        assert_eq!(strip.pan_lr(), (0.0, 1.0));
        strip.pan.set(0.25);
        assert_eq!(strip.pan_lr(), (1.0, 0.5));
    }

    #[test]
    fn params_by_name_and_index() {
        let strip = StripParams::default();
        assert_eq!(strip.len(), 9);
        assert_eq!(strip.get_param(0).label(), "Volume");
        assert_eq!(strip.find("cutoff").map(|p| p.label()), Some("Filter Cutoff"));
        assert!(strip.find("resonance").is_none());
        assert_eq!(strip.iter().count(), 9);
    }

    #[test]
    fn fx_slots() {
        let strip = StripParams::default();
        assert!(strip.fx_level(3).is_some());
        assert!(strip.fx_level(MAX_FX).is_none());
    }

    #[test]
    fn list_lookup() {
        let list = InstrumentList::new(vec![Instrument::new("Kick"), Instrument::new("Snare")]);
        let snare = list.get(1).unwrap().id;
        assert_eq!(list.index_of(snare), Some(1));
        assert_eq!(list.find(snare).unwrap().name, "Snare");
        assert!(!list.any_soloed());
        list.get(0).unwrap().set_soloed(true);
        assert!(list.any_soloed());
    }
}
