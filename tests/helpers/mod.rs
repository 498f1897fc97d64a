//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ostinato::{
    AudioPlaylist, ChannelFilter, LoopSpan, MidiEvent, MidiPlaylist, MidiSink, Sample, SampleCnt,
    SamplePos, SessionHooks, StreamConfig,
};

/// Session stub with controllable transport speed and flags.
pub struct TestSession {
    pub speed: Mutex<f64>,
    pub loading: AtomicBool,
    pub locate_pending: AtomicBool,
}

impl TestSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            speed: Mutex::new(1.0),
            loading: AtomicBool::new(false),
            locate_pending: AtomicBool::new(false),
        })
    }
}

impl SessionHooks for TestSession {
    fn transport_speed(&self) -> f64 {
        *self.speed.lock().unwrap()
    }

    fn loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    fn global_locate_pending(&self) -> bool {
        self.locate_pending.load(Ordering::Acquire)
    }
}

/// Audio content whose sample at position `p`, channel `c`, is
/// `p + c * 1e6`: reads verify themselves.
pub struct RampPlaylist;

impl AudioPlaylist for RampPlaylist {
    fn read(
        &self,
        sum: &mut [Sample],
        _mixdown: &mut [Sample],
        _gain: &mut [f32],
        start: SamplePos,
        cnt: SampleCnt,
        channel: usize,
    ) -> SampleCnt {
        for (i, s) in sum[..cnt as usize].iter_mut().enumerate() {
            *s = (start + i as i64) as f32 + channel as f32 * 1_000_000.0;
        }
        cnt
    }
}

/// Fixed set of MIDI events, delivered loop-aware and in time order.
pub struct EventsPlaylist {
    pub events: Vec<MidiEvent>,
}

impl MidiPlaylist for EventsPlaylist {
    fn read(
        &self,
        dst: &mut dyn MidiSink,
        start: SamplePos,
        cnt: SampleCnt,
        loop_range: Option<LoopSpan>,
        _filter: Option<ChannelFilter>,
    ) -> SampleCnt {
        let mut hits: Vec<MidiEvent> = self
            .events
            .iter()
            .map(|ev| MidiEvent {
                time: loop_range.map_or(ev.time, |l| l.squish(ev.time)),
                ..*ev
            })
            .filter(|ev| ev.time >= start && ev.time < start + cnt)
            .collect();
        hits.sort_by_key(|ev| ev.time);
        for ev in hits {
            dst.push(ev);
        }
        cnt
    }

    fn resolve_note_trackers(&self, _dst: &mut dyn MidiSink, _time: SamplePos) {}
}

pub fn small_config() -> Arc<StreamConfig> {
    Arc::new(StreamConfig {
        sample_rate: 48000.0,
        playback_buffer_samples: 8192,
        ring_reservation: 0,
        chunk_samples: 1024,
        midi_readahead: 4096,
        midi_ring_events: 256,
        native_bits_per_sample: 32,
        use_transport_fades: false,
    })
}

/// Poll `cond` until it holds or the deadline passes.
pub fn wait_for(mut cond: impl FnMut() -> bool, what: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(2));
    }
}
