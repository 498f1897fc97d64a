//! Contracts for the collaborators the disk reader pulls from.

use ostinato_core::{Sample, SampleCnt, SamplePos};

use crate::midi::{ChannelFilter, MidiSink};

/// A span of the timeline played as a seamless loop, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSpan {
    pub start: SamplePos,
    pub end: SamplePos,
}

impl LoopSpan {
    pub fn new(start: SamplePos, end: SamplePos) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }

    #[inline]
    pub fn length(&self) -> SampleCnt {
        self.end - self.start
    }

    /// Wrap `pos` into the loop domain.
    #[inline]
    pub fn squish(&self, pos: SamplePos) -> SamplePos {
        if pos >= self.end {
            self.start + (pos - self.start) % self.length()
        } else {
            pos
        }
    }
}

/// Region-based audio content, read one channel at a time.
///
/// `sum` receives the mixed result; `mixdown` and `gain` are caller-provided
/// scratch for region stacking. Returns the number of samples produced; a
/// short count means the range could not be read.
pub trait AudioPlaylist: Send + Sync {
    fn read(
        &self,
        sum: &mut [Sample],
        mixdown: &mut [Sample],
        gain: &mut [f32],
        start: SamplePos,
        cnt: SampleCnt,
        channel: usize,
    ) -> SampleCnt;
}

/// Region-based MIDI content.
pub trait MidiPlaylist: Send + Sync {
    /// Deliver events in `[start, start + cnt)` to `dst`, wrapping times
    /// into `loop_range` when present and dropping channels masked out by
    /// `filter`. Returns the span covered in samples; short means failure.
    fn read(
        &self,
        dst: &mut dyn MidiSink,
        start: SamplePos,
        cnt: SampleCnt,
        loop_range: Option<LoopSpan>,
        filter: Option<ChannelFilter>,
    ) -> SampleCnt;

    /// Emit note-offs at `time` for every note the playlist's own trackers
    /// consider sounding.
    fn resolve_note_trackers(&self, dst: &mut dyn MidiSink, time: SamplePos);
}

/// Session state the streaming side observes but does not own.
pub trait SessionHooks: Send + Sync {
    fn transport_speed(&self) -> f64;

    /// Session load in progress: skip disk reads, content will be replaced.
    fn loading(&self) -> bool {
        false
    }

    /// A session-wide locate has been requested but not yet completed.
    fn global_locate_pending(&self) -> bool {
        false
    }
}
