//! RT-safe MIDI event with sample-accurate session timing.

use midi_msg::{Channel, ChannelVoiceMsg};
use ostinato_core::SamplePos;

/// A channel-voice message stamped with a session sample time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    /// Session sample the event occurs at. Callers translating to a port
    /// buffer add their own per-port offset.
    pub time: SamplePos,
    pub channel: Channel,
    pub msg: ChannelVoiceMsg,
}

impl MidiEvent {
    #[inline]
    pub fn new(time: SamplePos, channel: Channel, msg: ChannelVoiceMsg) -> Self {
        Self { time, channel, msg }
    }

    #[inline]
    pub fn note_on(time: SamplePos, channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            time,
            channel: Channel::from_u8(channel),
            msg: ChannelVoiceMsg::NoteOn { note, velocity },
        }
    }

    #[inline]
    pub fn note_off(time: SamplePos, channel: u8, note: u8) -> Self {
        Self {
            time,
            channel: Channel::from_u8(channel),
            msg: ChannelVoiceMsg::NoteOff { note, velocity: 0 },
        }
    }

    /// Note-on with nonzero velocity; velocity zero is a note-off by
    /// convention.
    #[inline]
    pub fn is_note_on(&self) -> bool {
        matches!(self.msg, ChannelVoiceMsg::NoteOn { velocity, .. } if velocity > 0)
    }

    #[inline]
    pub fn is_note_off(&self) -> bool {
        matches!(
            self.msg,
            ChannelVoiceMsg::NoteOff { .. } | ChannelVoiceMsg::NoteOn { velocity: 0, .. }
        )
    }

    /// The note number for note on/off messages.
    #[inline]
    pub fn note(&self) -> Option<u8> {
        match self.msg {
            ChannelVoiceMsg::NoteOn { note, .. } | ChannelVoiceMsg::NoteOff { note, .. } => {
                Some(note)
            }
            _ => None,
        }
    }
}

impl Default for MidiEvent {
    fn default() -> Self {
        Self::note_off(0, 0, 0)
    }
}

/// 16-bit MIDI channel mask; a set bit passes the channel through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelFilter(pub u16);

impl ChannelFilter {
    pub const ALL: ChannelFilter = ChannelFilter(0xffff);

    #[inline]
    pub fn passes(&self, channel: Channel) -> bool {
        self.0 & (1 << channel as u16) != 0
    }
}
