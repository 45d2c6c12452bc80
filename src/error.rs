//! Error types for the note store and the action dispatcher.

use thiserror::Error;

use crate::session::TransportState;
use crate::Tick;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("engine is {0:?}, expected Ready or Playing")]
    InvalidTransportState(TransportState),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("invalid {field} for {action}: {value:?}")]
    InvalidParameter {
        action: String,
        field: &'static str,
        value: String,
    },

    #[error("no pattern at index {0}")]
    NoSuchPattern(usize),

    #[error("no instrument at index {0}")]
    NoSuchInstrument(usize),

    #[error("no effect slot {0}")]
    NoSuchEffect(usize),

    #[error("no playlist entry {0}")]
    NoSuchSong(isize),

    #[error("note at tick {0} disappeared while the engine lock was held")]
    NoteVanished(Tick),

    #[error("tick {tick} is past the end of a {length}-tick pattern")]
    TickOutOfRange { tick: Tick, length: Tick },

    #[error("note-off marker at tick {0} has a fixed length")]
    NoteOffLength(Tick),

    #[error("audition queue is full")]
    AuditionQueueFull,

    #[error("nothing to {0}")]
    EmptyHistory(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
