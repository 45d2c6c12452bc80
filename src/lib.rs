pub mod action;
pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod index;
pub mod instrument;
pub mod lock;
pub mod midi_map;
pub mod note;
pub mod params;
pub mod pattern;
pub mod session;

pub use error::{Error, Result};

pub const SAMPLE_RATE: f64 = 44100.0;
pub const FRAMES_PER_BUFFER: usize = 128;

// A 4/4 bar of 192 ticks, so a quarter note spans 48 ticks.
pub const TICKS_PER_BEAT: u32 = 48;
pub const DEFAULT_PATTERN_LEN: u32 = 4 * TICKS_PER_BEAT;
pub const MAX_PATTERN_LEN: u32 = 16 * DEFAULT_PATTERN_LEN;

pub const MIN_BPM: f64 = 10.0;
pub const MAX_BPM: f64 = 400.0;
pub const DEFAULT_BPM: f64 = 120.0;

/// Position inside a pattern's tick grid.
pub type Tick = u32;
