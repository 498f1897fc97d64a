//! Per-track disk reader.
//!
//! Owns one playback ring per audio channel and optionally a MIDI event
//! ring. The realtime thread pulls from the rings ([`DiskReader::run`]);
//! the butler thread fills them (`refill`, `seek`,
//! `overwrite_existing_buffers`). Every method takes `&self`: state shared
//! across that boundary is atomic, and the rings follow the SPSC
//! discipline.

mod refill;
mod run;

pub use refill::{Refill, RefillScratch};

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::Mutex;
use tracing::debug;

use ostinato_core::{
    AtomicFlag, AtomicSamplePos, DeclickRamp, PlaybackBuffer, Sample, SampleCnt, SamplePos,
    SignalHub,
};

use crate::config::StreamConfig;
use crate::midi::{ChannelFilter, MidiStreamBuffer};
use crate::playlist::{AudioPlaylist, LoopSpan, MidiPlaylist, SessionHooks};

/// The RT thread could not get the samples it needed in time.
#[derive(Debug, Clone)]
pub struct Underrun {
    pub track: Arc<str>,
}

pub(crate) struct ChannelInfo {
    /// Swapped wholesale when the buffering preference changes.
    rbuf: ArcSwap<PlaybackBuffer<Sample>>,
}

impl ChannelInfo {
    fn new(capacity: usize, reservation: usize) -> Self {
        Self {
            rbuf: ArcSwap::from_pointee(PlaybackBuffer::with_reservation(capacity, reservation)),
        }
    }

    pub(crate) fn rbuf(&self) -> arc_swap::Guard<Arc<PlaybackBuffer<Sample>>> {
        self.rbuf.load()
    }
}

pub struct DiskReader {
    name: Arc<str>,
    config: Arc<StreamConfig>,
    session: Arc<dyn SessionHooks>,

    pub(crate) channels: Vec<ChannelInfo>,
    pub(crate) midi: Option<MidiStreamBuffer>,

    // Butler/control side only; never touched by the RT thread.
    audio_playlist: Mutex<Option<Arc<dyn AudioPlaylist>>>,
    midi_playlist: Mutex<Option<Arc<dyn MidiPlaylist>>>,
    midi_filter: Mutex<Option<ChannelFilter>>,
    has_audio_playlist: AtomicFlag,
    has_midi_playlist: AtomicFlag,

    /// Next playlist position the butler reads audio from.
    pub(crate) file_sample_audio: AtomicSamplePos,
    /// Next playlist position the butler reads MIDI from.
    pub(crate) file_sample_midi: AtomicSamplePos,
    /// RT-observed playback cursor.
    pub(crate) playback_sample: AtomicSamplePos,

    pub(crate) overwrite_sample: AtomicSamplePos,
    pub(crate) overwrite_queued: AtomicFlag,
    pub(crate) pending_overwrite: AtomicFlag,

    pub(crate) samples_read_from_midi_ring: AtomicU32,
    pub(crate) samples_written_to_midi_ring: AtomicU32,

    pub(crate) declick: DeclickRamp,
    pub(crate) declick_offs: AtomicUsize,

    pub(crate) loop_location: ArcSwapOption<LoopSpan>,

    slaved: AtomicFlag,
    no_disk_output: AtomicFlag,
    active: AtomicFlag,
    pending_active: AtomicFlag,
    need_butler: AtomicFlag,

    underruns: SignalHub<Underrun>,
}

impl DiskReader {
    pub fn new(
        name: &str,
        n_channels: usize,
        with_midi: bool,
        config: Arc<StreamConfig>,
        session: Arc<dyn SessionHooks>,
    ) -> Self {
        let channels = (0..n_channels)
            .map(|_| ChannelInfo::new(config.playback_buffer_samples, config.ring_reservation))
            .collect();
        let midi = with_midi.then(|| MidiStreamBuffer::new(config.midi_ring_events));

        Self {
            name: Arc::from(format!("player:{name}").as_str()),
            channels,
            midi,
            audio_playlist: Mutex::new(None),
            midi_playlist: Mutex::new(None),
            midi_filter: Mutex::new(None),
            has_audio_playlist: AtomicFlag::new(false),
            has_midi_playlist: AtomicFlag::new(false),
            file_sample_audio: AtomicSamplePos::new(0),
            file_sample_midi: AtomicSamplePos::new(0),
            playback_sample: AtomicSamplePos::new(0),
            overwrite_sample: AtomicSamplePos::new(0),
            overwrite_queued: AtomicFlag::new(false),
            pending_overwrite: AtomicFlag::new(false),
            samples_read_from_midi_ring: AtomicU32::new(0),
            samples_written_to_midi_ring: AtomicU32::new(0),
            declick: DeclickRamp::new(config.sample_rate),
            declick_offs: AtomicUsize::new(0),
            loop_location: ArcSwapOption::empty(),
            slaved: AtomicFlag::new(false),
            no_disk_output: AtomicFlag::new(false),
            active: AtomicFlag::new(false),
            pending_active: AtomicFlag::new(true),
            need_butler: AtomicFlag::new(false),
            underruns: SignalHub::new(),
            config,
            session,
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub(crate) fn session(&self) -> &dyn SessionHooks {
        &*self.session
    }

    /// Ring fill fraction, 0..=1.
    ///
    /// MIDI deliberately reports the audio value: an empty MIDI ring can
    /// mean "no more events on the playlist" rather than "cannot keep up",
    /// and MIDI data rates are negligible next to audio.
    pub fn buffer_load(&self) -> f32 {
        match self.channels.first() {
            None => 1.0,
            Some(chan) => {
                let rbuf = chan.rbuf();
                rbuf.read_space() as f32 / rbuf.capacity() as f32
            }
        }
    }

    /// Reallocate every channel ring at a new capacity (buffering
    /// preference changed). Butler/control side, not while rolling.
    pub fn adjust_buffering(&self, capacity: usize) {
        for chan in &self.channels {
            chan.rbuf.store(Arc::new(PlaybackBuffer::with_reservation(
                capacity,
                self.config.ring_reservation.min(capacity.saturating_sub(2)),
            )));
        }
    }

    pub fn playback_sample(&self) -> SamplePos {
        self.playback_sample.get()
    }

    /// Whether the RT side wants the butler woken.
    pub fn need_butler(&self) -> bool {
        self.need_butler.get()
    }

    pub fn subscribe_underruns(&self) -> crossbeam_channel::Receiver<Underrun> {
        self.underruns.subscribe()
    }

    pub(crate) fn emit_underrun(&self) {
        self.underruns.emit(Underrun {
            track: Arc::clone(&self.name),
        });
    }

    // ---- activation ----

    pub fn set_pending_active(&self, yn: bool) {
        self.pending_active.set(yn);
    }

    pub fn active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn honor_pending_active(&self) -> bool {
        if self.active.get() {
            if !self.pending_active.get() {
                self.active.set(false);
                return false;
            }
            true
        } else if self.pending_active.get() {
            self.active.set(true);
            true
        } else {
            false
        }
    }

    // ---- mode flags ----

    pub fn set_slaved(&self, yn: bool) {
        self.slaved.set(yn);
    }

    pub fn is_slaved(&self) -> bool {
        self.slaved.get()
    }

    /// Keep the transport advancing without producing disk output, used
    /// while chasing an external master. Must be set from the process call
    /// tree, before readers run.
    pub fn set_no_disk_output(&self, yn: bool) {
        self.no_disk_output.set(yn);
    }

    pub fn no_disk_output(&self) -> bool {
        self.no_disk_output.get()
    }

    pub fn set_loop(&self, span: Option<LoopSpan>) {
        self.loop_location.store(span.map(Arc::new));
    }

    pub fn loop_location(&self) -> Option<LoopSpan> {
        self.loop_location.load().as_deref().copied()
    }

    // ---- playlists ----

    /// Install the audio playlist. Returns true when the caller should
    /// schedule a butler overwrite (content changed under an active reader,
    /// or the session is mid-load).
    pub fn set_audio_playlist(&self, playlist: Arc<dyn AudioPlaylist>) -> bool {
        let prior = {
            let mut slot = self.audio_playlist.lock();
            let prior = slot.is_some();
            *slot = Some(playlist);
            prior
        };
        self.has_audio_playlist.set(true);
        (prior || self.session.loading()) && self.queue_overwrite()
    }

    pub fn set_midi_playlist(&self, playlist: Arc<dyn MidiPlaylist>) -> bool {
        let prior = {
            let mut slot = self.midi_playlist.lock();
            let prior = slot.is_some();
            *slot = Some(playlist);
            prior
        };
        self.has_midi_playlist.set(true);
        (prior || self.session.loading()) && self.queue_overwrite()
    }

    pub fn set_midi_filter(&self, filter: Option<ChannelFilter>) {
        *self.midi_filter.lock() = filter;
    }

    pub(crate) fn audio_playlist(&self) -> Option<Arc<dyn AudioPlaylist>> {
        self.audio_playlist.lock().clone()
    }

    pub(crate) fn midi_playlist(&self) -> Option<Arc<dyn MidiPlaylist>> {
        self.midi_playlist.lock().clone()
    }

    pub(crate) fn midi_filter(&self) -> Option<ChannelFilter> {
        *self.midi_filter.lock()
    }

    pub(crate) fn has_audio_playlist(&self) -> bool {
        self.has_audio_playlist.get()
    }

    pub(crate) fn has_midi_playlist(&self) -> bool {
        self.has_midi_playlist.get()
    }

    /// Playlist content changed: request exactly one buffer overwrite.
    /// Returns true when the caller should notify the butler; false when
    /// one is already queued.
    pub fn playlist_modified(&self) -> bool {
        self.queue_overwrite()
    }

    fn queue_overwrite(&self) -> bool {
        !self.overwrite_queued.swap(true)
    }

    // ---- declick ----

    /// A fade-out is still in flight. May be asked from the butler thread.
    pub fn declick_in_progress(&self) -> bool {
        self.declick.gain() != 0.0
    }

    // ---- overwrite handshake ----

    pub fn pending_overwrite(&self) -> bool {
        self.pending_overwrite.get()
    }

    /// RT side of the overwrite handshake: snapshot the playback cursor,
    /// drop everything readable, and flag the butler.
    pub fn set_pending_overwrite(&self) {
        debug_assert!(!self.pending_overwrite.get());

        self.overwrite_sample.set(self.playback_sample.get());
        for chan in &self.channels {
            chan.rbuf().read_flush();
        }
        self.pending_overwrite.set(true);
    }

    // ---- intra-buffer seeks ----

    /// Whether a read-cursor jump of `distance` can be absorbed by the
    /// rings without butler help.
    pub fn can_internal_playback_seek(&self, distance: SampleCnt) -> bool {
        for chan in &self.channels {
            if !chan.rbuf().can_seek(distance) {
                return false;
            }
        }

        if distance < 0 {
            return true;
        }

        if self.has_midi_playlist.get() {
            let samples_read = self.samples_read_from_midi_ring.load(Ordering::Acquire);
            let samples_written = self.samples_written_to_midi_ring.load(Ordering::Acquire);
            return (samples_written.wrapping_sub(samples_read) as i64) < distance;
        }

        true
    }

    /// Jump every ring's read cursor by `distance` and move the playback
    /// cursor by the distance actually absorbed.
    pub fn internal_playback_seek(&self, distance: SampleCnt) {
        if distance == 0 {
            return;
        }

        let mut off: SampleCnt = 0;
        for chan in &self.channels {
            let rbuf = chan.rbuf();
            off = if distance < 0 {
                -(rbuf.decrement_read_ptr(distance.unsigned_abs() as usize) as SampleCnt)
            } else {
                rbuf.increment_read_ptr(distance as usize) as SampleCnt
            };
        }

        debug!(track = %self.name, distance, applied = off, "intra-buffer seek");
        self.playback_sample.add(off);
    }

    // ---- trackers ----

    pub(crate) fn reset_tracker(&self) {
        if let Some(midi) = &self.midi {
            midi.reset_tracker();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bufferset::BufferSet;
    use crate::midi::{MidiEvent, MidiSink};
    use crate::reader::refill::{Refill, RefillScratch};
    use ostinato_core::MonitorState;

    struct TestSession {
        speed: Mutex<f64>,
    }

    impl TestSession {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                speed: Mutex::new(1.0),
            })
        }
    }

    impl SessionHooks for TestSession {
        fn transport_speed(&self) -> f64 {
            *self.speed.lock()
        }
    }

    /// Audio content where the sample at position `p` of channel `c` is
    /// `p + c * 1e6`, so reads are easy to verify.
    struct RampPlaylist;

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

    struct EventsPlaylist {
        events: Vec<MidiEvent>,
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

    fn test_config() -> Arc<StreamConfig> {
        Arc::new(StreamConfig {
            sample_rate: 48000.0,
            playback_buffer_samples: 4096,
            ring_reservation: 0,
            chunk_samples: 512,
            midi_readahead: 4096,
            midi_ring_events: 64,
            native_bits_per_sample: 32,
            use_transport_fades: false,
        })
    }

    fn audio_reader(n_channels: usize) -> (DiskReader, Arc<TestSession>) {
        let session = TestSession::new();
        let reader = DiskReader::new(
            "test",
            n_channels,
            false,
            test_config(),
            Arc::clone(&session) as Arc<dyn SessionHooks>,
        );
        reader.set_audio_playlist(Arc::new(RampPlaylist));
        (reader, session)
    }

    #[test]
    fn test_underrun_reported_once_and_cursor_untouched() {
        let (reader, _session) = audio_reader(1);
        let underruns = reader.subscribe_underruns();

        // Fewer samples buffered than one cycle needs.
        reader.channels[0].rbuf().write(&[0.5; 100]);

        let mut bufs = BufferSet::new(1, 0, 256);
        let mut scratch = BufferSet::new(1, 0, 256);
        reader.run(
            &mut bufs,
            &mut scratch,
            0,
            256,
            1.0,
            256,
            true,
            MonitorState::DISK,
        );

        assert_eq!(underruns.try_iter().count(), 1);
        assert_eq!(reader.playback_sample(), 0);
        assert_eq!(reader.channels[0].rbuf().read_space(), 100);
    }

    #[test]
    fn test_seek_primes_and_run_plays_playlist_content() {
        let (reader, _session) = audio_reader(2);
        let mut disk_scratch = RefillScratch::with_capacity(8192);

        reader.seek(1000, true, &mut disk_scratch).unwrap();
        assert_eq!(reader.playback_sample(), 1000);

        let mut bufs = BufferSet::new(2, 0, 256);
        let mut scratch = BufferSet::new(2, 0, 256);
        reader.run(
            &mut bufs,
            &mut scratch,
            1000,
            1256,
            1.0,
            256,
            true,
            MonitorState::DISK,
        );

        assert_eq!(bufs.audio(0)[0], 1000.0);
        assert_eq!(bufs.audio(0)[255], 1255.0);
        assert_eq!(bufs.audio(1)[0], 1_001_000.0);
        assert_eq!(reader.playback_sample(), 1256);
    }

    #[test]
    fn test_intra_buffer_seek_on_start_divergence() {
        let (reader, _session) = audio_reader(1);
        let mut disk_scratch = RefillScratch::with_capacity(8192);
        reader.seek(0, true, &mut disk_scratch).unwrap();

        // The graph asks for a start slightly ahead of our cursor.
        let mut bufs = BufferSet::new(1, 0, 64);
        let mut scratch = BufferSet::new(1, 0, 64);
        reader.run(
            &mut bufs,
            &mut scratch,
            300,
            364,
            1.0,
            64,
            true,
            MonitorState::DISK,
        );

        assert_eq!(bufs.audio(0)[0], 300.0);
        assert_eq!(reader.playback_sample(), 364);
    }

    #[test]
    fn test_refill_honors_fill_level_headroom() {
        let (reader, _session) = audio_reader(1);
        let mut scratch = RefillScratch::with_capacity(8192);

        let fill_level = 512;
        let r = reader.refill(&mut scratch, fill_level).unwrap();
        assert_eq!(r, Refill::Done);

        let rbuf = reader.channels[0].rbuf();
        assert!(rbuf.write_space() as i64 <= rbuf.capacity() as i64 - 1 - fill_level);
    }

    #[test]
    fn test_refill_skips_subchunk_space_at_normal_speed() {
        let (reader, _session) = audio_reader(1);
        let mut scratch = RefillScratch::with_capacity(8192);
        reader.seek(0, true, &mut scratch).unwrap();

        // Drain less than a chunk.
        reader.channels[0].rbuf().increment_read_ptr(100);
        let before = reader.channels[0].rbuf().read_space();
        reader.refill(&mut scratch, 0).unwrap();
        assert_eq!(reader.channels[0].rbuf().read_space(), before);
    }

    #[test]
    fn test_overwrite_is_idempotent() {
        let (reader, _session) = audio_reader(1);
        let mut disk_scratch = RefillScratch::with_capacity(8192);
        reader.seek(0, true, &mut disk_scratch).unwrap();

        // Roll a few cycles so the cursor is mid-buffer.
        let mut bufs = BufferSet::new(1, 0, 256);
        let mut scratch = BufferSet::new(1, 0, 256);
        for i in 0..3 {
            reader.run(
                &mut bufs,
                &mut scratch,
                i * 256,
                (i + 1) * 256,
                1.0,
                256,
                true,
                MonitorState::DISK,
            );
        }

        let snapshot = |reader: &DiskReader| {
            let rbuf = reader.channels[0].rbuf();
            let mut contents = vec![0.0f32; rbuf.read_space()];
            rbuf.peek(&mut contents, 0);
            contents
        };

        reader.set_pending_overwrite();
        reader.overwrite_existing_buffers().unwrap();
        let first = snapshot(&reader);
        assert_eq!(first[0], reader.playback_sample() as f32);

        reader.set_pending_overwrite();
        reader.overwrite_existing_buffers().unwrap();
        let second = snapshot(&reader);

        assert_eq!(first, second);
        assert!(!reader.pending_overwrite());
    }

    #[test]
    fn test_run_skips_ring_while_overwrite_pending() {
        let (reader, _session) = audio_reader(1);
        let mut disk_scratch = RefillScratch::with_capacity(8192);
        reader.seek(0, true, &mut disk_scratch).unwrap();

        reader.set_pending_overwrite();
        let read_space = reader.channels[0].rbuf().read_space();

        let mut bufs = BufferSet::new(1, 0, 256);
        let mut scratch = BufferSet::new(1, 0, 256);
        reader.run(
            &mut bufs,
            &mut scratch,
            0,
            256,
            1.0,
            256,
            true,
            MonitorState::DISK,
        );

        // Still locating: silence, no consumption, no cursor motion.
        assert!(bufs.audio(0).iter().all(|&s| s == 0.0));
        assert_eq!(reader.channels[0].rbuf().read_space(), read_space);
        assert_eq!(reader.playback_sample(), 0);
    }

    #[test]
    fn test_declick_fadeout_peeks_without_consuming() {
        let session = TestSession::new();
        let config = Arc::new(StreamConfig {
            use_transport_fades: true,
            ..*test_config()
        });
        let reader = DiskReader::new(
            "test",
            1,
            false,
            config,
            Arc::clone(&session) as Arc<dyn SessionHooks>,
        );
        reader.set_audio_playlist(Arc::new(RampPlaylist));

        let mut disk_scratch = RefillScratch::with_capacity(8192);
        reader.seek(0, true, &mut disk_scratch).unwrap();
        reader.declick.set_gain(1.0);

        let read_space = reader.channels[0].rbuf().read_space();

        let mut bufs = BufferSet::new(1, 0, 256);
        let mut scratch = BufferSet::new(1, 0, 256);
        reader.run(
            &mut bufs,
            &mut scratch,
            0,
            256,
            0.0,
            256,
            true,
            MonitorState::DISK,
        );

        // Ramp landed on real (non-consumed) disk data.
        assert!(bufs.audio(0)[0] != 0.0 || bufs.audio(0)[1] != 0.0);
        assert!(reader.declick.gain() < 1.0);
        assert_eq!(reader.declick_offs.load(Ordering::Relaxed), 256);
        assert_eq!(reader.channels[0].rbuf().read_space(), read_space);
        assert_eq!(reader.playback_sample(), 0);

        // Stopped and fully faded: the early-out path.
        while reader.declick.gain() != 0.0 {
            reader.run(
                &mut bufs,
                &mut scratch,
                0,
                256,
                0.0,
                256,
                true,
                MonitorState::DISK,
            );
        }
        assert_eq!(reader.playback_sample(), 0);
    }

    #[test]
    fn test_result_not_required_advances_read_pointer() {
        let (reader, _session) = audio_reader(1);
        let mut disk_scratch = RefillScratch::with_capacity(8192);
        reader.seek(0, true, &mut disk_scratch).unwrap();
        let before = reader.channels[0].rbuf().read_space();

        let mut bufs = BufferSet::new(1, 0, 256);
        let mut scratch = BufferSet::new(1, 0, 256);
        reader.run(
            &mut bufs,
            &mut scratch,
            0,
            256,
            1.0,
            256,
            false,
            MonitorState::DISK,
        );

        assert_eq!(reader.channels[0].rbuf().read_space(), before - 256);
        assert_eq!(reader.playback_sample(), 256);
    }

    #[test]
    fn test_butler_demand_after_draining_a_chunk() {
        let (reader, _session) = audio_reader(1);
        let mut disk_scratch = RefillScratch::with_capacity(8192);
        reader.seek(0, true, &mut disk_scratch).unwrap();

        let mut bufs = BufferSet::new(1, 0, 256);
        let mut scratch = BufferSet::new(1, 0, 256);

        reader.run(
            &mut bufs,
            &mut scratch,
            0,
            256,
            1.0,
            256,
            true,
            MonitorState::DISK,
        );
        assert!(!reader.need_butler());

        // chunk_samples is 512: two more cycles open up enough space.
        for i in 1..3 {
            reader.run(
                &mut bufs,
                &mut scratch,
                i * 256,
                (i + 1) * 256,
                1.0,
                256,
                true,
                MonitorState::DISK,
            );
        }
        assert!(reader.need_butler());
    }

    #[test]
    fn test_reverse_playback_reads_backwards() {
        let (reader, session) = audio_reader(1);
        *session.speed.lock() = -1.0;

        let mut disk_scratch = RefillScratch::with_capacity(8192);
        reader.seek(5000, true, &mut disk_scratch).unwrap();

        let mut bufs = BufferSet::new(1, 0, 64);
        let mut scratch = BufferSet::new(1, 0, 64);
        reader.run(
            &mut bufs,
            &mut scratch,
            5000,
            4936,
            -1.0,
            64,
            true,
            MonitorState::DISK,
        );

        // Samples come out newest-position-first.
        assert_eq!(bufs.audio(0)[0], 4999.0);
        assert_eq!(bufs.audio(0)[63], 4936.0);
        assert_eq!(reader.playback_sample(), 4936);
    }

    #[test]
    fn test_loop_boundary_midi_read() {
        let session = TestSession::new();
        let reader = DiskReader::new(
            "midi-test",
            0,
            true,
            test_config(),
            Arc::clone(&session) as Arc<dyn SessionHooks>,
        );
        reader.set_midi_playlist(Arc::new(EventsPlaylist {
            events: vec![
                MidiEvent::note_on(10, 0, 60, 100),
                MidiEvent::note_on(990, 0, 64, 100),
                MidiEvent::note_on(1005, 0, 67, 100),
            ],
        }));
        reader.set_loop(LoopSpan::new(0, 1000));

        let mut disk_scratch = RefillScratch::with_capacity(1024);
        reader.seek(980, false, &mut disk_scratch).unwrap();

        let mut bufs = BufferSet::new(0, 1, 64);
        let mut scratch = BufferSet::new(0, 1, 64);
        reader.run(
            &mut bufs,
            &mut scratch,
            980,
            1020,
            1.0,
            40,
            true,
            MonitorState::DISK,
        );

        let events = bufs.midi(0).events();
        let ons: Vec<_> = events.iter().filter(|ev| ev.is_note_on()).collect();
        assert_eq!(ons.len(), 3);
        assert_eq!(ons[0].time, 990);
        assert_eq!(ons[1].time, 5); // wrapped from 1005
        assert_eq!(ons[2].time, 10);

        // The note held over the wrap got its off.
        assert!(events
            .iter()
            .any(|ev| ev.is_note_off() && ev.note() == Some(64)));

        assert_eq!(reader.samples_read_from_midi_ring.load(Ordering::Acquire), 40);
    }

    #[test]
    fn test_midi_refill_stops_at_readahead() {
        let session = TestSession::new();
        let config = Arc::new(StreamConfig {
            midi_readahead: 100,
            midi_ring_events: 4096,
            ..*test_config()
        });
        let reader = DiskReader::new(
            "midi-test",
            0,
            true,
            config,
            Arc::clone(&session) as Arc<dyn SessionHooks>,
        );
        reader.set_midi_playlist(Arc::new(EventsPlaylist { events: vec![] }));

        reader.refill_midi().unwrap();
        assert_eq!(
            reader.samples_written_to_midi_ring.load(Ordering::Acquire),
            100
        );
        assert_eq!(reader.file_sample_midi.get(), 100);

        // Fully ahead: another pass is a no-op.
        reader.refill_midi().unwrap();
        assert_eq!(reader.file_sample_midi.get(), 100);
    }

    #[test]
    fn test_reverse_midi_refill_is_rejected() {
        let session = TestSession::new();
        let reader = DiskReader::new(
            "midi-test",
            0,
            true,
            test_config(),
            Arc::clone(&session) as Arc<dyn SessionHooks>,
        );
        reader.set_midi_playlist(Arc::new(EventsPlaylist {
            events: vec![MidiEvent::note_on(10, 0, 60, 100)],
        }));
        *session.speed.lock() = -1.0;

        reader.refill_midi().unwrap();
        assert_eq!(
            reader.samples_written_to_midi_ring.load(Ordering::Acquire),
            0
        );
    }

    #[test]
    fn test_playlist_change_queues_single_overwrite() {
        let (reader, _session) = audio_reader(1);

        // First install happened in the fixture; a replacement queues one
        // overwrite, repeats are coalesced.
        assert!(reader.set_audio_playlist(Arc::new(RampPlaylist)));
        assert!(!reader.playlist_modified());

        reader.set_pending_overwrite();
        reader.overwrite_existing_buffers().unwrap();
        assert!(reader.playlist_modified());
    }

    #[test]
    fn test_buffer_load() {
        let (reader, _session) = audio_reader(1);
        assert_eq!(reader.buffer_load(), 0.0);

        let mut scratch = RefillScratch::with_capacity(8192);
        reader.seek(0, true, &mut scratch).unwrap();
        assert!(reader.buffer_load() > 0.99);

        let empty = DiskReader::new(
            "no-channels",
            0,
            false,
            test_config(),
            TestSession::new() as Arc<dyn SessionHooks>,
        );
        assert_eq!(empty.buffer_load(), 1.0);
    }
}
