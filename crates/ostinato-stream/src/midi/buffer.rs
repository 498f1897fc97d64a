//! Time-ordered SPSC event ring between the butler and the RT thread.

use ostinato_core::{PlaybackBuffer, SamplePos};

use super::{MidiEvent, MidiSink, NoteTracker};

/// Disk-side MIDI buffer.
///
/// The butler appends events in time order; the RT thread consumes the span
/// covered by each process cycle. A [`NoteTracker`] follows every event
/// delivered to the output so loop wraps, seeks and overwrites can turn off
/// whatever is still sounding.
pub struct MidiStreamBuffer {
    ring: PlaybackBuffer<MidiEvent>,
    tracker: NoteTracker,
}

impl MidiStreamBuffer {
    pub fn new(capacity_events: usize) -> Self {
        Self {
            ring: PlaybackBuffer::new(capacity_events),
            tracker: NoteTracker::new(),
        }
    }

    pub fn read_space(&self) -> usize {
        self.ring.read_space()
    }

    pub fn write_space(&self) -> usize {
        self.ring.write_space()
    }

    /// Append one event (butler side). Returns false when the ring is full.
    pub fn write(&self, ev: MidiEvent) -> bool {
        self.ring.write(std::slice::from_ref(&ev)) == 1
    }

    /// Consume events with times in `[start, end)` into `dst`, feeding the
    /// tracker. Anything outside the window stays buffered: an event before
    /// `start` marks the next loop lap (timestamps restart at the wrap), so
    /// the read must stop there, not swallow it. Stale events from
    /// non-looped playback are shed with [`Self::skip_to`] beforehand.
    /// Returns events delivered.
    pub fn read(&self, dst: &mut dyn MidiSink, start: SamplePos, end: SamplePos) -> usize {
        let mut delivered = 0;
        let mut slot = [MidiEvent::default()];

        while self.ring.peek(&mut slot, 0) == 1 {
            let ev = slot[0];
            if ev.time < start || ev.time >= end {
                break;
            }
            self.ring.increment_read_ptr(1);
            self.tracker.track(&ev);
            dst.push(ev);
            delivered += 1;
        }
        delivered
    }

    /// Drop buffered events older than `time`, keeping the tracker
    /// consistent. Returns the number dropped.
    pub fn skip_to(&self, time: SamplePos) -> usize {
        let mut skipped = 0;
        let mut slot = [MidiEvent::default()];

        while self.ring.peek(&mut slot, 0) == 1 {
            if slot[0].time >= time {
                break;
            }
            self.ring.increment_read_ptr(1);
            self.tracker.track(&slot[0]);
            skipped += 1;
        }
        skipped
    }

    /// Emit note-offs at `time` for everything sounding, clearing the
    /// tracker.
    pub fn resolve_tracker(&self, dst: &mut dyn MidiSink, time: SamplePos) -> usize {
        self.tracker.resolve(dst, time)
    }

    pub fn reset_tracker(&self) {
        self.tracker.reset();
    }

    /// Empty the ring. Same quiescence requirement as the audio rings.
    pub fn reset(&self) {
        self.ring.reset();
    }
}

/// Adapter letting playlists write straight into the ring.
pub struct RingWriter<'a>(pub &'a MidiStreamBuffer);

impl MidiSink for RingWriter<'_> {
    fn push(&mut self, ev: MidiEvent) {
        if !self.0.write(ev) {
            tracing::warn!(time = ev.time, "MIDI ring full, event dropped");
        }
    }
}
