//! MIDI streaming: timestamped events, the disk-side event ring, and the
//! sounding-note tracker used to resolve hanging notes at loops and seeks.

mod buffer;
mod event;
mod tracker;

pub use buffer::{MidiStreamBuffer, RingWriter};
pub use event::{ChannelFilter, MidiEvent};
pub use tracker::NoteTracker;

/// Destination for MIDI events: a per-cycle output buffer, the stream ring
/// itself, or anything else that accepts timestamped events.
pub trait MidiSink {
    fn push(&mut self, ev: MidiEvent);
}

impl MidiSink for Vec<MidiEvent> {
    fn push(&mut self, ev: MidiEvent) {
        Vec::push(self, ev);
    }
}
