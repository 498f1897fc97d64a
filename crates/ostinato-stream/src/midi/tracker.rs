//! Tracks which notes are sounding so they can be turned off at loop wraps,
//! seeks and overwrites.

use std::sync::atomic::{AtomicU8, Ordering};

use midi_msg::Channel;
use ostinato_core::SamplePos;

use super::{MidiEvent, MidiSink};

const CHANNELS: usize = 16;
const NOTES: usize = 128;

/// On-count per (channel, note). Counts saturate at 255; real material never
/// stacks a note that deep.
pub struct NoteTracker {
    on: Box<[AtomicU8]>,
}

impl NoteTracker {
    pub fn new() -> Self {
        Self {
            on: (0..CHANNELS * NOTES).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    #[inline]
    fn slot(channel: Channel, note: u8) -> usize {
        channel as usize * NOTES + note as usize
    }

    /// Account for one event passing through to the output.
    pub fn track(&self, ev: &MidiEvent) {
        let Some(note) = ev.note() else { return };
        let slot = &self.on[Self::slot(ev.channel, note)];

        if ev.is_note_on() {
            let count = slot.load(Ordering::Relaxed);
            if count < u8::MAX {
                slot.store(count + 1, Ordering::Relaxed);
            }
        } else if ev.is_note_off() {
            let count = slot.load(Ordering::Relaxed);
            if count > 0 {
                slot.store(count - 1, Ordering::Relaxed);
            }
        }
    }

    /// Emit a note-off at `time` for every sounding note, clearing the
    /// tracker. Returns the number of note-offs emitted.
    pub fn resolve(&self, dst: &mut dyn MidiSink, time: SamplePos) -> usize {
        let mut emitted = 0;
        for (i, slot) in self.on.iter().enumerate() {
            let count = slot.swap(0, Ordering::Relaxed);
            if count == 0 {
                continue;
            }
            let channel = (i / NOTES) as u8;
            let note = (i % NOTES) as u8;
            for _ in 0..count {
                dst.push(MidiEvent::note_off(time, channel, note));
                emitted += 1;
            }
        }
        emitted
    }

    pub fn reset(&self) {
        for slot in self.on.iter() {
            slot.store(0, Ordering::Relaxed);
        }
    }

    /// Total sounding note count.
    pub fn active(&self) -> usize {
        self.on
            .iter()
            .map(|s| s.load(Ordering::Relaxed) as usize)
            .sum()
    }
}

impl Default for NoteTracker {
    fn default() -> Self {
        Self::new()
    }
}
