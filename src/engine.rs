use std::sync::Arc;

use ringbuf::Consumer;
use triple_buffer::Input;

use crate::instrument::{Instrument, InstrumentId, InstrumentList};
use crate::note::{Note, KEY_RATIO};
use crate::pattern::PatternList;
use crate::session::{Session, TransportState};
use crate::{Tick, SAMPLE_RATE, TICKS_PER_BEAT};

pub enum EngineCommand {
    /// Plays `note` on `instrument` right away, regardless of transport.
    Audition { instrument: InstrumentId, note: Note },
}

/// What the render path publishes back to the control path after each block.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct EngineState {
    pub current_pattern: usize,
    pub current_tick: Tick,
    pub frames: u64,
    pub playing: bool,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Voice {
    pub velocity: f32,
    pub pan_l: f32,
    pub pan_r: f32,
    /// Playback-rate multiplier.
    pub ratio: f64,
    /// Frames to shift the start by; negative plays early.
    pub delay: i64,
    /// Frames to sustain for, or `None` to let the sample ring out.
    pub duration: Option<usize>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TriggerKind {
    NoteOn(Voice),
    Stop,
    Click { accent: bool },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Trigger {
    /// Mixer strip, or `None` for the metronome.
    pub instrument: Option<usize>,
    /// Frame inside the current block.
    pub offset: usize,
    pub kind: TriggerKind,
}

/// Receives the triggers produced for one block. Implementations run on the
/// render path and must not allocate or block.
pub trait Sink {
    fn trigger(&mut self, trigger: Trigger);
}

impl Sink for Vec<Trigger> {
    fn trigger(&mut self, trigger: Trigger) {
        self.push(trigger);
    }
}

pub struct Engine {
    session: Arc<Session>,
    state: EngineState,
    state_buf: Input<EngineState>,
    consumer: Consumer<EngineCommand>,
    samples_to_tick: usize,
}

impl Engine {
    pub fn new(
        session: Arc<Session>,
        consumer: Consumer<EngineCommand>,
        state_buf: Input<EngineState>,
    ) -> Engine {
        Self {
            session,
            state: EngineState::default(),
            state_buf,
            consumer,
            samples_to_tick: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Renders one block of `frames` frames.
    pub fn process(&mut self, frames: usize, sink: &mut dyn Sink) {
        let patterns = self.session.patterns();
        let instruments = self.session.instruments();
        self.run_commands(&instruments, sink);

        if let Some(pattern) = self.session.take_locate() {
            self.state.current_pattern = pattern;
            self.state.current_tick = 0;
            self.samples_to_tick = 0;
        }

        let mut offset = 0;
        while let Some(block_size) = self.next_block(&patterns, &instruments, offset, frames, sink)
        {
            offset += block_size;
        }

        self.state.frames += frames as u64;
        self.state.playing = self.session.transport() == TransportState::Playing;
        let buf = self.state_buf.input_buffer();
        buf.clone_from(&self.state);
        self.state_buf.publish();
    }

    fn next_block(
        &mut self,
        patterns: &PatternList,
        instruments: &InstrumentList,
        offset: usize,
        frames: usize,
        sink: &mut dyn Sink,
    ) -> Option<usize> {
        if offset >= frames {
            return None;
        }
        if self.samples_to_tick == 0 {
            let samples_per_tick = self.samples_per_tick();
            if self.session.is_playing() {
                self.play_tick(patterns, instruments, offset, samples_per_tick, sink);
            }
            self.samples_to_tick = (samples_per_tick.round() as usize).max(1);
        }

        let block_size = usize::min(frames - offset, self.samples_to_tick);
        self.samples_to_tick -= block_size;
        Some(block_size)
    }

    fn samples_per_tick(&self) -> f64 {
        (SAMPLE_RATE * 60.0) / (self.session.tempo.value() * TICKS_PER_BEAT as f64)
    }

    fn play_tick(
        &mut self,
        patterns: &PatternList,
        instruments: &InstrumentList,
        offset: usize,
        samples_per_tick: f64,
        sink: &mut dyn Sink,
    ) {
        let mut current = self.state.current_pattern;
        let pattern = match patterns.get(current) {
            Some(pattern) => pattern,
            None => {
                // the playing pattern was removed, fall back to the first one
                current = 0;
                self.state.current_tick = 0;
                match patterns.get(current) {
                    Some(pattern) => pattern,
                    None => return,
                }
            }
        };
        let tick = self.state.current_tick;

        if self.session.is_metronome_on() && tick % TICKS_PER_BEAT == 0 {
            sink.trigger(Trigger {
                instrument: None,
                offset,
                kind: TriggerKind::Click { accent: tick == 0 },
            });
        }

        let any_soloed = instruments.any_soloed();
        for note in pattern.notes().range_at(tick) {
            let index = match instruments.index_of(note.instrument) {
                Some(index) => index,
                None => continue,
            };
            let instrument = match instruments.get(index) {
                Some(instrument) => instrument,
                None => continue,
            };
            if instrument.is_muted() || (any_soloed && !instrument.is_soloed()) {
                continue;
            }
            let kind = if note.note_off {
                TriggerKind::Stop
            } else {
                TriggerKind::NoteOn(self.voice(note, instrument, samples_per_tick))
            };
            sink.trigger(Trigger {
                instrument: Some(index),
                offset,
                kind,
            });
        }

        self.state.current_tick += 1;
        if self.state.current_tick >= pattern.len() {
            self.state.current_tick = 0;
            if let Some(next) = self.session.take_next_pattern() {
                if next < patterns.len() {
                    current = next;
                    self.session.select_pattern(next);
                }
            }
        }
        self.state.current_pattern = current;
    }

    fn voice(&self, note: &Note, instrument: &Instrument, samples_per_tick: f64) -> Voice {
        let strip = &instrument.params;
        let master = if self.session.is_master_muted() {
            0.0
        } else {
            self.session.master_volume.value()
        };
        let (strip_l, strip_r) = strip.pan_lr();
        let delay = note.lead_lag as f64 * self.session.lead_lag_ticks() * samples_per_tick;
        Voice {
            velocity: note.velocity * (strip.volume.value() * master) as f32,
            pan_l: note.pan_l * strip_l,
            pan_r: note.pan_r * strip_r,
            ratio: note.key.ratio() * KEY_RATIO.powf(strip.pitch.value()),
            delay: delay.round() as i64,
            duration: note
                .effective_length()
                .map(|ticks| (ticks * samples_per_tick).ceil() as usize),
        }
    }

    fn run_commands(&mut self, instruments: &InstrumentList, sink: &mut dyn Sink) {
        while let Some(cmd) = self.consumer.pop() {
            match cmd {
                EngineCommand::Audition { instrument, note } => {
                    let index = match instruments.index_of(instrument) {
                        Some(index) => index,
                        None => continue,
                    };
                    if let Some(strip) = instruments.get(index) {
                        let voice = self.voice(&note, strip, self.samples_per_tick());
                        sink.trigger(Trigger {
                            instrument: Some(index),
                            offset: 0,
                            kind: TriggerKind::NoteOn(Voice { delay: 0, ..voice }),
                        });
                    }
                }
            }
        }
    }
}
