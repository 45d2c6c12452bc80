use std::collections::HashMap;

use tracing::trace;

use crate::action::Action;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;
const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MmcCommand {
    Stop,
    Play,
    DeferredPlay,
    FastForward,
    Rewind,
    RecordStrobe,
    RecordExit,
    RecordPause,
    Pause,
}

impl MmcCommand {
    fn from_byte(byte: u8) -> Option<Self> {
        let cmd = match byte {
            0x01 => MmcCommand::Stop,
            0x02 => MmcCommand::Play,
            0x03 => MmcCommand::DeferredPlay,
            0x04 => MmcCommand::FastForward,
            0x05 => MmcCommand::Rewind,
            0x06 => MmcCommand::RecordStrobe,
            0x07 => MmcCommand::RecordExit,
            0x08 => MmcCommand::RecordPause,
            0x09 => MmcCommand::Pause,
            _ => return None,
        };
        Some(cmd)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    Mmc(MmcCommand),
}

impl MidiMessage {
    /// Decodes the messages that can drive actions. Anything else, or a
    /// truncated message, yields `None`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        if status == SYSEX_START {
            return Self::parse_mmc(bytes);
        }
        let channel = status & 0x0F;
        let data1 = *bytes.get(1)? & 0x7F;
        let data2 = *bytes.get(2)? & 0x7F;
        match status & 0xF0 {
            NOTE_ON if data2 > 0 => Some(MidiMessage::NoteOn {
                channel,
                note: data1,
                velocity: data2,
            }),
            // a note-on with zero velocity is a note-off
            NOTE_ON | NOTE_OFF => Some(MidiMessage::NoteOff {
                channel,
                note: data1,
            }),
            CONTROL_CHANGE => Some(MidiMessage::ControlChange {
                channel,
                controller: data1,
                value: data2,
            }),
            _ => None,
        }
    }

    // F0 7F <device> 06 <command> F7
    fn parse_mmc(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [SYSEX_START, 0x7F, _, 0x06, cmd, SYSEX_END, ..] => {
                MmcCommand::from_byte(*cmd).map(MidiMessage::Mmc)
            }
            _ => None,
        }
    }

    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::ControlChange { channel, .. } => Some(channel),
            MidiMessage::Mmc(_) => None,
        }
    }
}

/// Binds incoming MIDI messages to action templates.
#[derive(Clone, Debug, Default)]
pub struct MidiMap {
    channel: Option<u8>,
    cc: HashMap<u8, Action>,
    notes: HashMap<u8, Action>,
    mmc: HashMap<MmcCommand, Action>,
}

impl MidiMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport bindings for the machine control commands.
    pub fn with_mmc_defaults() -> Self {
        let mut map = Self::new();
        for (cmd, identifier) in [
            (MmcCommand::Stop, "STOP"),
            (MmcCommand::Play, "PLAY"),
            (MmcCommand::DeferredPlay, "PLAY"),
            (MmcCommand::FastForward, ">>_NEXT_BAR"),
            (MmcCommand::Rewind, "<<_PREVIOUS_BAR"),
            (MmcCommand::RecordStrobe, "RECORD_STROBE"),
            (MmcCommand::RecordExit, "RECORD_EXIT"),
            (MmcCommand::RecordPause, "RECORD_READY"),
            (MmcCommand::Pause, "PAUSE"),
        ] {
            map.register_mmc(cmd, Action::new(identifier));
        }
        map
    }

    /// Only accept channel messages on `channel`. `None` accepts all.
    pub fn with_channel(mut self, channel: Option<u8>) -> Self {
        self.channel = channel;
        self
    }

    pub fn register_cc(&mut self, controller: u8, action: Action) {
        self.cc.insert(controller & 0x7F, action);
    }

    pub fn register_note(&mut self, note: u8, action: Action) {
        self.notes.insert(note & 0x7F, action);
    }

    pub fn register_mmc(&mut self, cmd: MmcCommand, action: Action) {
        self.mmc.insert(cmd, action);
    }

    /// The action bound to `msg`, with its value set to the controller value
    /// or note velocity.
    pub fn action_for(&self, msg: &MidiMessage) -> Option<Action> {
        if let (Some(wanted), Some(channel)) = (self.channel, msg.channel()) {
            if wanted != channel {
                trace!(?msg, "ignoring message on channel {}", channel);
                return None;
            }
        }
        match *msg {
            MidiMessage::ControlChange {
                controller, value, ..
            } => self
                .cc
                .get(&controller)
                .map(|action| action.clone().with_value(value)),
            MidiMessage::NoteOn { note, velocity, .. } => self
                .notes
                .get(&note)
                .map(|action| action.clone().with_value(velocity)),
            MidiMessage::NoteOff { .. } => None,
            MidiMessage::Mmc(cmd) => self.mmc.get(&cmd).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_channel_messages() {
        assert_eq!(
            MidiMessage::parse(&[0x93, 36, 100]),
            Some(MidiMessage::NoteOn {
                channel: 3,
                note: 36,
                velocity: 100
            })
        );
        assert_eq!(
            MidiMessage::parse(&[0x90, 36, 0]),
            Some(MidiMessage::NoteOff {
                channel: 0,
                note: 36
            })
        );
        assert_eq!(
            MidiMessage::parse(&[0xB1, 7, 127]),
            Some(MidiMessage::ControlChange {
                channel: 1,
                controller: 7,
                value: 127
            })
        );
        assert_eq!(MidiMessage::parse(&[0xB0, 7]), None);
        assert_eq!(MidiMessage::parse(&[0xE0, 0, 64]), None);
        assert_eq!(MidiMessage::parse(&[]), None);
    }

    #[test]
    fn parse_mmc() {
        let play = [0xF0, 0x7F, 0x7F, 0x06, 0x02, 0xF7];
        assert_eq!(
            MidiMessage::parse(&play),
            Some(MidiMessage::Mmc(MmcCommand::Play))
        );
        assert_eq!(MidiMessage::parse(&[0xF0, 0x7F, 0x7F, 0x06, 0x7E, 0xF7]), None);
        assert_eq!(MidiMessage::parse(&[0xF0, 0x7F, 0x7F, 0x06]), None);
    }

    #[test]
    fn templates_take_the_value() {
        let mut map = MidiMap::new().with_channel(Some(9));
        map.register_cc(
            10,
            Action::new("PAN_ABSOLUTE").with_parameter1(2),
        );
        map.register_note(38, Action::new("SELECT_INSTRUMENT"));

        let cc = MidiMessage::ControlChange {
            channel: 9,
            controller: 10,
            value: 90,
        };
        let action = map.action_for(&cc).unwrap();
        assert_eq!(action.identifier, "PAN_ABSOLUTE");
        assert_eq!(action.parameter1, "2");
        assert_eq!(action.value, "90");

        let note = MidiMessage::NoteOn {
            channel: 9,
            note: 38,
            velocity: 1,
        };
        assert_eq!(map.action_for(&note).unwrap().value, "1");

        let other_channel = MidiMessage::ControlChange {
            channel: 0,
            controller: 10,
            value: 90,
        };
        assert_eq!(map.action_for(&other_channel), None);
    }

    #[test]
    fn mmc_defaults() {
        let map = MidiMap::with_mmc_defaults().with_channel(Some(4));
        let action = map.action_for(&MidiMessage::Mmc(MmcCommand::Rewind)).unwrap();
        assert_eq!(action.identifier, "<<_PREVIOUS_BAR");
        assert!(action.value.is_empty());
    }
}
