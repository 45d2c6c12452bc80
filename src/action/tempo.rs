use std::time::Instant;

use crate::{MAX_BPM, MIN_BPM};

/// Taps further apart than this start a new measurement.
const MAX_TAP_INTERVAL: f64 = 1.0;
/// A tempo this far from the running average replaces it outright.
const TAP_JUMP_BPM: f64 = 20.0;
const TAP_HISTORY: usize = 8;

const MAX_BEAT_INTERVAL: f64 = 3.001;
const MIN_BEAT_INTERVAL: f64 = 0.001;

/// Tempo from the interval between consecutive taps, smoothed over the
/// last few taps.
#[derive(Debug, Default)]
pub struct TapTempo {
    last: Option<Instant>,
    history: Option<[f64; TAP_HISTORY]>,
}

impl TapTempo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tap and returns the new tempo once there is an interval
    /// to measure.
    pub fn tap(&mut self, now: Instant) -> Option<f64> {
        let last = self.last.replace(now)?;
        let interval = now.checked_duration_since(last)?.as_secs_f64();
        if interval <= 0.0 || interval >= MAX_TAP_INTERVAL {
            return None;
        }

        let bpm = 60.0 / interval;
        let mut history = match self.history {
            Some(history) if (history[0] - bpm).abs() <= TAP_JUMP_BPM => history,
            _ => [bpm; TAP_HISTORY],
        };
        let average = (bpm + history.iter().sum::<f64>()) / (TAP_HISTORY + 1) as f64;
        history.rotate_right(1);
        history[0] = average;
        self.history = Some(history);
        Some(average.clamp(MIN_BPM, MAX_BPM))
    }
}

/// Tempo from a fixed number of taps, reported once the count is full.
#[derive(Debug)]
pub struct BeatCounter {
    beats: usize,
    last: Option<Instant>,
    intervals: Vec<f64>,
}

impl BeatCounter {
    pub fn new(beats: u32) -> Self {
        let beats = (beats as usize).max(2);
        Self {
            beats,
            last: None,
            intervals: Vec::with_capacity(beats),
        }
    }

    pub fn beats(&self) -> usize {
        self.beats
    }

    /// Taps counted so far in the current measurement.
    pub fn count(&self) -> usize {
        match self.last {
            Some(_) => self.intervals.len() + 1,
            None => 0,
        }
    }

    pub fn tap(&mut self, now: Instant) -> Option<f64> {
        let last = match self.last.replace(now) {
            Some(last) => last,
            None => {
                self.intervals.clear();
                return None;
            }
        };
        let interval = now.saturating_duration_since(last).as_secs_f64();
        if interval > MAX_BEAT_INTERVAL {
            // too slow, this tap starts over
            self.intervals.clear();
            return None;
        }
        if interval <= MIN_BEAT_INTERVAL {
            self.last = Some(last);
            return None;
        }

        self.intervals.push(interval);
        if self.intervals.len() + 1 < self.beats {
            return None;
        }
        let average = self.intervals.iter().sum::<f64>() / self.intervals.len() as f64;
        self.intervals.clear();
        self.last = None;
        let bpm = (60.0 / average * 100.0).floor() / 100.0;
        Some(bpm.clamp(MIN_BPM, MAX_BPM))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(start: Instant, secs: f64) -> Instant {
        start + Duration::from_secs_f64(secs)
    }

    #[test]
    fn tap_tempo_averages() {
        let start = Instant::now();
        let mut tap = TapTempo::new();
        assert_eq!(tap.tap(start), None);
        let bpm = tap.tap(at(start, 0.5)).unwrap();
        assert!((bpm - 120.0).abs() < 1e-6);

        // a slightly slower tap only nudges the average
        let bpm = tap.tap(at(start, 1.02)).unwrap();
        assert!(bpm > 115.0 && bpm < 120.0);
    }

    #[test]
    fn tap_tempo_resets_after_pause_or_jump() {
        let start = Instant::now();
        let mut tap = TapTempo::new();
        tap.tap(start);
        tap.tap(at(start, 0.5));
        assert_eq!(tap.tap(at(start, 2.0)), None);

        let bpm = tap.tap(at(start, 2.25)).unwrap();
        assert!((bpm - 240.0).abs() < 1e-6);
    }

    #[test]
    fn beat_counter_reports_after_full_count() {
        let start = Instant::now();
        let mut counter = BeatCounter::new(4);
        assert_eq!(counter.tap(start), None);
        assert_eq!(counter.tap(at(start, 0.5)), None);
        assert_eq!(counter.tap(at(start, 1.0)), None);
        assert_eq!(counter.count(), 3);
        assert_eq!(counter.tap(at(start, 1.5)), Some(120.0));
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn beat_counter_starts_over_when_too_slow() {
        let start = Instant::now();
        let mut counter = BeatCounter::new(2);
        counter.tap(start);
        assert_eq!(counter.tap(at(start, 4.0)), None);
        assert_eq!(counter.count(), 1);
        assert_eq!(counter.tap(at(start, 5.0)), Some(60.0));
    }
}
