use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use tracing::trace;

/// Notifications sent from the control path to whatever view layer is
/// listening. They are always sent after the engine lock is released.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    PatternChanged { pattern: usize },
    SelectedPatternChanged(usize),
    NextPatternQueued(usize),
    SelectedInstrumentChanged(usize),
    TransportChanged,
    TempoChanged(f64),
    MixerChanged { instrument: Option<usize> },
    MetronomeToggled(bool),
    PlaylistSongChanged(usize),
}

#[derive(Clone)]
pub struct Notifier {
    tx: Sender<Event>,
}

impl Notifier {
    pub fn new(tx: Sender<Event>) -> Self {
        Self { tx }
    }

    /// A notifier with a fresh receiving end.
    pub fn channel() -> (Self, Receiver<Event>) {
        let (tx, rx) = unbounded();
        (Self::new(tx), rx)
    }

    /// Sends `event`. A listener that went away is not an error.
    pub fn notify(&self, event: Event) {
        trace!(?event, "notify");
        if let Err(TrySendError::Disconnected(event)) = self.tx.try_send(event) {
            trace!(?event, "no listener");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_listener_is_ignored() {
        let (notifier, rx) = Notifier::channel();
        notifier.notify(Event::TransportChanged);
        assert_eq!(rx.try_recv(), Ok(Event::TransportChanged));
        drop(rx);
        notifier.notify(Event::MetronomeToggled(true));
    }
}
