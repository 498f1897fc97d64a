//! Per-cycle audio and MIDI buffers handed to the reader by the process
//! callback. Allocated up front and reused; nothing here allocates on the
//! RT path as long as cycles stay within the configured sizes.

use ostinato_core::Sample;

use crate::midi::{MidiEvent, MidiSink};

/// A set of audio output buffers plus MIDI destinations for one cycle.
pub struct BufferSet {
    audio: Vec<Vec<Sample>>,
    midi: Vec<MidiCycleBuffer>,
}

impl BufferSet {
    pub fn new(n_audio: usize, n_midi: usize, frames: usize) -> Self {
        Self {
            audio: (0..n_audio).map(|_| vec![0.0; frames]).collect(),
            midi: (0..n_midi).map(|_| MidiCycleBuffer::with_capacity(256)).collect(),
        }
    }

    pub fn n_audio(&self) -> usize {
        self.audio.len()
    }

    pub fn n_midi(&self) -> usize {
        self.midi.len()
    }

    pub fn audio(&self, i: usize) -> &[Sample] {
        &self.audio[i]
    }

    pub fn audio_mut(&mut self, i: usize) -> &mut [Sample] {
        &mut self.audio[i]
    }

    pub fn midi(&self, i: usize) -> &MidiCycleBuffer {
        &self.midi[i]
    }

    pub fn midi_mut(&mut self, i: usize) -> &mut MidiCycleBuffer {
        &mut self.midi[i]
    }

    /// Zero the first `nframes` of every audio buffer.
    pub fn silence(&mut self, nframes: usize) {
        for buf in &mut self.audio {
            let n = nframes.min(buf.len());
            buf[..n].fill(0.0);
        }
    }
}

/// MIDI events produced for one process cycle.
#[derive(Debug, Default)]
pub struct MidiCycleBuffer {
    events: Vec<MidiEvent>,
}

impl MidiCycleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    pub fn events(&self) -> &[MidiEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Append everything from `other`, keeping time order. In-place
    /// insertion; both sides are small and already sorted.
    pub fn merge_from(&mut self, other: &MidiCycleBuffer) {
        for &ev in &other.events {
            let at = self
                .events
                .iter()
                .rposition(|e| e.time <= ev.time)
                .map_or(0, |i| i + 1);
            self.events.insert(at, ev);
        }
    }
}

impl MidiSink for MidiCycleBuffer {
    fn push(&mut self, ev: MidiEvent) {
        self.events.push(ev);
    }
}

/// `dst[i] += src[i]`, no gain applied.
#[inline]
pub fn mix_buffers_no_gain(dst: &mut [Sample], src: &[Sample]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}

/// Constant gain over a whole buffer.
#[inline]
pub fn apply_simple_gain(buf: &mut [Sample], gain: f32) {
    if gain != 1.0 {
        for s in buf.iter_mut() {
            *s *= gain;
        }
    }
}
