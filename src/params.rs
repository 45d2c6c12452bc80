use atomic_float::AtomicF64;
use std::sync::atomic::Ordering;

/// Highest raw value sent by a 7-bit MIDI controller.
pub const MIDI_MAX: f64 = 127.0;

pub trait Params {
    fn get_param(&self, index: usize) -> &Param;
    fn len(&self) -> usize;
    fn find(&self, name: &str) -> Option<&Param>;
}

/// A parameter that can be written from the control path and read from the
/// render path without locking.
pub struct Param {
    value: AtomicF64,
    info: ParamInfo,
}

impl Param {
    pub fn new(value: f64, info: ParamInfo) -> Self {
        Self {
            value: AtomicF64::new(info.clamp(value)),
            info,
        }
    }

    pub fn value(&self) -> f64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: f64) {
        self.value.store(self.info.clamp(value), Ordering::Relaxed);
    }

    /// Maps a raw controller value in `0..=127` onto the parameter range.
    pub fn set_from_midi(&self, raw: f64) {
        let normalized = raw.clamp(0.0, MIDI_MAX) / MIDI_MAX;
        self.set(self.info.min + normalized * (self.info.max - self.info.min));
    }

    /// Adds `delta` to the current value, staying inside the range.
    pub fn nudge(&self, delta: f64) {
        self.set(self.value() + delta);
    }

    pub fn incr(&self) {
        self.nudge(self.info.step);
    }

    pub fn decr(&self) {
        self.nudge(-self.info.step);
    }

    pub fn value_as_string(&self) -> String {
        let fmt = self.info.format_value.unwrap_or(format_default);
        fmt(self.value())
    }

    pub fn label(&self) -> &str {
        self.info.name.as_str()
    }

    pub fn info(&self) -> &ParamInfo {
        &self.info
    }
}

pub struct ParamInfo {
    name: String,
    min: f64,
    max: f64,
    step: f64,
    format_value: Option<FormatValue>,
}

impl ParamInfo {
    const DEFAULT_STEP: f64 = 0.01;

    pub fn new<T: Into<f64>>(name: &str, min: T, max: T) -> Self {
        Self {
            name: String::from(name),
            min: min.into(),
            max: max.into(),
            step: Self::DEFAULT_STEP,
            format_value: None,
        }
    }

    pub fn with_step<T: Into<f64>>(mut self, step: T) -> Self {
        self.step = step.into();
        self
    }

    pub fn with_formatter(mut self, format_value: FormatValue) -> Self {
        self.format_value = Some(format_value);
        self
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Size of one controller step across the full range.
    pub fn midi_step(&self) -> f64 {
        (self.max - self.min) / MIDI_MAX
    }

    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

type FormatValue = fn(f64) -> String;

fn format_default(v: f64) -> String {
    format!("{:.2}", v)
}

pub fn format_bpm(v: f64) -> String {
    format!("{:.2} bpm", v)
}

pub fn format_semitones(v: f64) -> String {
    format!("{:+.1} st", v)
}

pub struct ParamIter<'a, P: ?Sized> {
    current: usize,
    params: &'a P,
}

impl<'a, P: Params + ?Sized> Iterator for ParamIter<'a, P> {
    type Item = &'a Param;
    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.params.len() {
            None
        } else {
            let idx = self.current;
            self.current += 1;
            Some(self.params.get_param(idx))
        }
    }
}

pub trait ParamIterExt: Params {
    fn iter(&self) -> ParamIter<'_, Self> {
        ParamIter {
            current: 0,
            params: self,
        }
    }
}

impl<P: Params + ?Sized> ParamIterExt for P {}
