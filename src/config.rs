use crate::note::NoteDefaults;

/// Editor preferences shared by every control-path front end.
#[derive(Clone, Debug)]
pub struct Config {
    pub hear_new_notes: bool,
    pub note_defaults: NoteDefaults,
    pub audition_queue_size: usize,
    /// Largest lead/lag offset in ticks, reached at a lead/lag of +/-1.
    pub lead_lag_ticks: f64,
    pub playlist: Vec<String>,
    pub beat_counter_beats: u32,
    pub history_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hear_new_notes: true,
            note_defaults: NoteDefaults::default(),
            audition_queue_size: 16,
            lead_lag_ticks: 5.0,
            playlist: Vec::new(),
            beat_counter_beats: 4,
            history_depth: 100,
        }
    }
}

impl Config {
    pub fn with_hear_new_notes(mut self, hear: bool) -> Self {
        self.hear_new_notes = hear;
        self
    }

    pub fn with_note_defaults(mut self, defaults: NoteDefaults) -> Self {
        self.note_defaults = defaults;
        self
    }

    pub fn with_audition_queue_size(mut self, size: usize) -> Self {
        self.audition_queue_size = size.max(1);
        self
    }

    pub fn with_playlist<I, S>(mut self, songs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.playlist = songs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_beat_counter_beats(mut self, beats: u32) -> Self {
        self.beat_counter_beats = beats.max(1);
        self
    }

    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }
}
