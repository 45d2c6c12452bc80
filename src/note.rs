use std::fmt;

use lazy_static::lazy_static;
use ulid::Ulid;

use crate::instrument::InstrumentId;
use crate::Tick;

/// Equal temperament ratio between two neighbouring semitones.
pub const KEY_RATIO: f64 = 1.0594630943593;

pub const MIN_OCTAVE: i8 = -3;
pub const MAX_OCTAVE: i8 = 3;

pub const DEFAULT_VELOCITY: f32 = 0.8;
pub const DEFAULT_PAN: f32 = 0.5;

/// Length in ticks of a note-off marker.
pub const NOTE_OFF_LENGTH: u32 = 1;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NoteKey {
    pub semitone: u8,
    pub octave: i8,
}

impl NoteKey {
    pub const C0: NoteKey = NoteKey {
        semitone: 0,
        octave: 0,
    };

    pub fn new(semitone: u8, octave: i8) -> Self {
        debug_assert!(semitone < 12, "semitone out of range: {}", semitone);
        Self { semitone, octave }
    }

    /// Builds a key from a signed semitone offset relative to C0.
    pub fn from_pitch(pitch: i32) -> Self {
        Self {
            semitone: pitch.rem_euclid(12) as u8,
            octave: pitch.div_euclid(12) as i8,
        }
    }

    pub fn semitones(&self) -> i32 {
        self.octave as i32 * 12 + self.semitone as i32
    }

    /// Playback-rate multiplier for this key. A note's sustain is divided by
    /// the same factor, so this is also its time-stretch factor.
    pub fn ratio(&self) -> f64 {
        f64::powf(KEY_RATIO, self.semitones() as f64)
    }
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let index = (self.octave as i32 - MIN_OCTAVE as i32) * 12 + self.semitone as i32;
        match usize::try_from(index).ok().and_then(|i| KEY_NAMES.get(i)) {
            Some(name) => f.write_str(name),
            None => write!(f, "{}{}", SEMITONE_NAMES[self.semitone as usize % 12], self.octave),
        }
    }
}

const SEMITONE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

lazy_static! {
    static ref KEY_NAMES: Vec<String> = (MIN_OCTAVE..=MAX_OCTAVE)
        .flat_map(|octave| {
            SEMITONE_NAMES
                .iter()
                .map(move |name| format!("{}{}", name, octave))
        })
        .collect();
}

/// Sustain of a note. `Open` lets the sample ring out.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NoteLength {
    Open,
    Ticks(u32),
}

impl NoteLength {
    /// Converts the stored integer form, where -1 means open.
    pub fn from_raw(raw: i32) -> Self {
        if raw < 0 {
            NoteLength::Open
        } else {
            NoteLength::Ticks(raw as u32)
        }
    }

    pub fn raw(&self) -> i32 {
        match self {
            NoteLength::Open => -1,
            NoteLength::Ticks(ticks) => i32::try_from(*ticks).unwrap_or(i32::MAX),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId(Ulid);

impl NoteId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub instrument: InstrumentId,
    pub position: Tick,
    pub velocity: f32,
    pub pan_l: f32,
    pub pan_r: f32,
    pub length: NoteLength,
    pub lead_lag: f32,
    pub key: NoteKey,
    pub note_off: bool,
}

impl Note {
    /// Creates a sounding note. Defaults are held to the same ranges as
    /// [`Note::apply`], and a key with an overflowing semitone is carried
    /// into the octave.
    pub fn new(instrument: InstrumentId, position: Tick, defaults: &NoteDefaults) -> Self {
        Self {
            id: NoteId::new(),
            instrument,
            position,
            velocity: defaults.velocity.clamp(0.0, 1.0),
            pan_l: defaults.pan_l.clamp(0.0, 1.0),
            pan_r: defaults.pan_r.clamp(0.0, 1.0),
            length: defaults.length,
            lead_lag: defaults.lead_lag.clamp(-1.0, 1.0),
            key: NoteKey::from_pitch(defaults.key.semitones()),
            note_off: false,
        }
    }

    pub fn note_off(instrument: InstrumentId, position: Tick) -> Self {
        Self {
            id: NoteId::new(),
            instrument,
            position,
            velocity: 0.0,
            pan_l: DEFAULT_PAN,
            pan_r: DEFAULT_PAN,
            length: NoteLength::Ticks(NOTE_OFF_LENGTH),
            lead_lag: 0.0,
            key: NoteKey::C0,
            note_off: true,
        }
    }

    /// Span in ticks covered by this note, after pitch stretching.
    ///
    /// Note-off markers cover their one-tick marker, unscaled. Open notes
    /// have no finite span.
    pub fn effective_length(&self) -> Option<f64> {
        if self.note_off {
            return Some(NOTE_OFF_LENGTH as f64);
        }
        match self.length {
            NoteLength::Open => None,
            NoteLength::Ticks(ticks) => Some(ticks as f64 / self.key.ratio()),
        }
    }

    /// Whether `tick` lies within `[position, position + effective_length]`.
    pub fn covers(&self, tick: Tick) -> bool {
        if tick < self.position {
            return false;
        }
        match self.effective_length() {
            Some(span) => (tick - self.position) as f64 <= span,
            None => false,
        }
    }

    /// Applies `prop` and returns the value it replaced. Velocity has no
    /// meaning on a note-off marker and is left untouched there.
    pub fn apply(&mut self, prop: NoteProperty) -> NoteProperty {
        match prop {
            NoteProperty::Velocity(v) => {
                let previous = NoteProperty::Velocity(self.velocity);
                if !self.note_off {
                    self.velocity = v.clamp(0.0, 1.0);
                }
                previous
            }
            NoteProperty::Pan { left, right } => {
                let previous = NoteProperty::Pan {
                    left: self.pan_l,
                    right: self.pan_r,
                };
                self.pan_l = left.clamp(0.0, 1.0);
                self.pan_r = right.clamp(0.0, 1.0);
                previous
            }
            NoteProperty::LeadLag(v) => {
                let previous = NoteProperty::LeadLag(self.lead_lag);
                self.lead_lag = v.clamp(-1.0, 1.0);
                previous
            }
            NoteProperty::Key(key) => {
                let previous = NoteProperty::Key(self.key);
                self.key = key;
                previous
            }
        }
    }
}

/// Properties given to a newly created note.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NoteDefaults {
    pub velocity: f32,
    pub pan_l: f32,
    pub pan_r: f32,
    pub lead_lag: f32,
    pub length: NoteLength,
    pub key: NoteKey,
}

impl Default for NoteDefaults {
    fn default() -> Self {
        Self {
            velocity: DEFAULT_VELOCITY,
            pan_l: DEFAULT_PAN,
            pan_r: DEFAULT_PAN,
            lead_lag: 0.0,
            length: NoteLength::Open,
            key: NoteKey::C0,
        }
    }
}

impl From<&Note> for NoteDefaults {
    fn from(note: &Note) -> Self {
        Self {
            velocity: note.velocity,
            pan_l: note.pan_l,
            pan_r: note.pan_r,
            lead_lag: note.lead_lag,
            length: note.length,
            key: note.key,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum NoteProperty {
    Velocity(f32),
    Pan { left: f32, right: f32 },
    LeadLag(f32),
    Key(NoteKey),
}
