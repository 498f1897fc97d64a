//! Butler-side operations: seek, overwrite-after-modification, and the
//! refill loop that keeps the rings ahead of the RT cursor. Everything here
//! may allocate and block on I/O.

use std::sync::atomic::Ordering;

use tracing::{debug, error, warn};

use ostinato_core::{PlaybackBuffer, Sample, SampleCnt, SamplePos, MAX_SAMPLEPOS};

use crate::error::{Error, Result};
use crate::midi::RingWriter;

use super::DiskReader;

/// Outcome of one refill pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refill {
    /// Buffers are as full as this pass wants them.
    Done,
    /// Another pass would still find at least a chunk of space.
    MoreWork,
}

/// Reusable working buffers for playlist reads.
///
/// Sized for the largest possible read: 4 MiB at the smallest sample width
/// (16 bit) is 2M samples. One instance lives for the whole life of a
/// butler thread; reads are chunked to its size.
pub struct RefillScratch {
    pub(crate) sum: Vec<Sample>,
    pub(crate) mixdown: Vec<Sample>,
    pub(crate) gain: Vec<f32>,
}

impl RefillScratch {
    pub fn new() -> Self {
        Self::with_capacity(2 * 1024 * 1024)
    }

    pub fn with_capacity(samples: usize) -> Self {
        Self {
            sum: vec![0.0; samples],
            mixdown: vec![0.0; samples],
            gain: vec![0.0; samples],
        }
    }
}

impl Default for RefillScratch {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskReader {
    /// Relocate the stream to `sample` and prime the rings.
    ///
    /// With `complete_refill` the rings are filled until the refill loop
    /// reports no more space worth filling; otherwise a single chunk is
    /// read so rolling can resume quickly.
    pub fn seek(
        &self,
        sample: SamplePos,
        complete_refill: bool,
        scratch: &mut RefillScratch,
    ) -> Result<()> {
        if self.declick_in_progress() {
            // The transport should have let the fade finish first; honor
            // the seek anyway, it may click.
            warn!(track = %self.name(), "seek while declick in progress");
        }

        if sample == self.playback_sample.get() && !complete_refill {
            return Ok(());
        }

        debug!(track = %self.name(), sample, complete_refill, "seek");

        self.pending_overwrite.set(false);

        for chan in &self.channels {
            chan.rbuf().reset();
        }

        if self.samples_read_from_midi_ring.load(Ordering::Acquire) == 0 {
            // Nothing consumed since the last relocation; note state from
            // the abandoned preroll would only confuse matters.
            self.reset_tracker();
        }

        if let Some(midi) = &self.midi {
            midi.reset();
        }
        self.samples_read_from_midi_ring.store(0, Ordering::Release);
        self.samples_written_to_midi_ring
            .store(0, Ordering::Release);

        self.playback_sample.set(sample);
        self.file_sample_audio.set(sample);
        self.file_sample_midi.set(sample);

        if complete_refill {
            while self.refill(scratch, 0)? == Refill::MoreWork {}
        } else {
            self.refill(scratch, self.config().chunk_samples as SampleCnt)?;
        }

        Ok(())
    }

    /// Butler side of the overwrite handshake: replace ring contents with
    /// fresh playlist data around the snapshotted cursor.
    pub fn overwrite_existing_buffers(&self) -> Result<()> {
        debug_assert!(self.pending_overwrite());
        self.overwrite_queued.set(false);

        let overwrite_sample = self.overwrite_sample.get();
        debug!(track = %self.name(), overwrite_sample, "overwriting existing buffers");

        let mut result = Ok(());

        if !self.channels.is_empty() {
            let reversed = self.session().transport_speed() < 0.0;
            let to_read = self.channels[0].rbuf().write_space() as SampleCnt;

            if to_read > 0 {
                // Scoped scratch: overwrites are rare and ring-sized.
                let mut scratch = RefillScratch::with_capacity(to_read as usize);

                for (n, chan) in self.channels.iter().enumerate() {
                    let rbuf = chan.rbuf();
                    let mut start = overwrite_sample;
                    if let Err(e) =
                        self.audio_read(&rbuf, &mut scratch, &mut start, to_read, n, reversed)
                    {
                        error!(
                            track = %self.name(),
                            channel = n,
                            overwrite_sample,
                            error = %e,
                            "cannot re-read playlist for overwrite"
                        );
                        result = Err(e);
                        break;
                    }
                }
            }
        }

        if let Some(midi) = &self.midi {
            if let Some(playlist) = self.midi_playlist() {
                // Safe while the butler holds the overwrite: the RT side
                // skips ring reads until the flag clears.
                midi.reset();
                midi.reset_tracker();

                self.samples_read_from_midi_ring.store(0, Ordering::Release);
                self.samples_written_to_midi_ring
                    .store(0, Ordering::Release);

                // Turn off whatever the playlist believes is sounding; with
                // no record of what changed, resolving everything is the
                // only safe answer.
                let mut writer = RingWriter(midi);
                playlist.resolve_note_trackers(&mut writer, overwrite_sample);

                let mut ffm = overwrite_sample;
                let read = self.midi_read(&mut ffm, self.config().chunk_samples as SampleCnt);
                self.file_sample_midi.set(ffm);
                if let Err(e) = read {
                    error!(track = %self.name(), error = %e, "MIDI overwrite read failed");
                    result = Err(e);
                }
            }
        }

        self.pending_overwrite.set(false);
        result
    }

    /// One refill pass: audio first, then MIDI once audio has caught up.
    ///
    /// With a nonzero `fill_level`, that many samples of ring space are
    /// deliberately left unfilled so a post-locate refill returns quickly.
    pub fn refill(&self, scratch: &mut RefillScratch, fill_level: SampleCnt) -> Result<Refill> {
        match self.refill_audio(scratch, fill_level)? {
            Refill::MoreWork => Ok(Refill::MoreWork),
            Refill::Done => {
                self.refill_midi()?;
                Ok(Refill::Done)
            }
        }
    }

    /// Top up every channel ring from the audio playlist.
    pub fn refill_audio(
        &self,
        scratch: &mut RefillScratch,
        fill_level: SampleCnt,
    ) -> Result<Refill> {
        if self.session().loading() {
            // Content is about to be replaced wholesale; reads would be
            // wasted I/O.
            return Ok(Refill::Done);
        }

        if self.channels.is_empty() {
            return Ok(Refill::Done);
        }

        let speed = self.session().transport_speed();
        let reversed = speed < 0.0;

        let front = self.channels[0].rbuf();
        let mut total_space = self
            .channels
            .iter()
            .map(|c| c.rbuf().write_space())
            .min()
            .unwrap_or(0) as SampleCnt;

        if total_space == 0 {
            return Ok(Refill::Done);
        }

        // Headroom: only fill up to capacity - fill_level. A fill_level
        // larger than the free space means there is nothing useful to do
        // with it.
        if fill_level > 0 && fill_level < total_space {
            total_space -= fill_level;
        }

        // Near normal speed, skip sub-chunk refills; the next cycle will
        // open up a full chunk. At shuttle speeds take whatever we can get.
        if total_space < self.config().chunk_samples as SampleCnt && speed.abs() < 2.0 {
            return Ok(Refill::Done);
        }

        // Chasing an external master the cursor can jump backwards; keep
        // distance from the read pointer so reversal has data to work with.
        if self.is_slaved() && total_space < (front.capacity() / 2) as SampleCnt {
            return Ok(Refill::Done);
        }

        if reversed && self.loop_location.load().is_some() {
            warn!(track = %self.name(), "loop playback while reversed is not supported");
            return Ok(Refill::Done);
        }

        let ffa = self.file_sample_audio.get();

        if reversed {
            if ffa == 0 {
                // At the session start: nothing left behind us.
                for chan in &self.channels {
                    let rbuf = chan.rbuf();
                    rbuf.write_zero(rbuf.write_space());
                }
                return Ok(Refill::Done);
            }
            if ffa < total_space {
                total_space = ffa;
            }
        } else {
            if ffa == MAX_SAMPLEPOS {
                for chan in &self.channels {
                    let rbuf = chan.rbuf();
                    rbuf.write_zero(rbuf.write_space());
                }
                return Ok(Refill::Done);
            }
            if ffa > MAX_SAMPLEPOS - total_space {
                total_space = MAX_SAMPLEPOS - ffa;
            }
        }

        let samples_to_read = self.config().read_size_samples(total_space as usize) as SampleCnt;

        let mut file_sample_tmp = ffa;

        for (n, chan) in self.channels.iter().enumerate() {
            let rbuf = chan.rbuf();
            file_sample_tmp = ffa;

            let to_read = total_space
                .min(rbuf.write_space() as SampleCnt)
                .min(samples_to_read);

            if to_read > 0 {
                self.audio_read(&rbuf, scratch, &mut file_sample_tmp, to_read, n, reversed)
                    .inspect_err(|e| {
                        error!(
                            track = %self.name(),
                            channel = n,
                            at = ffa,
                            error = %e,
                            "refill read failed"
                        );
                    })?;
            }
        }

        self.file_sample_audio.set(file_sample_tmp);

        Ok(if total_space - samples_to_read > self.config().chunk_samples as SampleCnt {
            Refill::MoreWork
        } else {
            Refill::Done
        })
    }

    /// Read `cnt` samples of one channel from the playlist into its ring,
    /// splitting at loop boundaries and reversing blocks when running
    /// backwards. `start` is advanced to where the read ended.
    pub(crate) fn audio_read(
        &self,
        rbuf: &PlaybackBuffer<Sample>,
        scratch: &mut RefillScratch,
        start: &mut SamplePos,
        cnt: SampleCnt,
        channel: usize,
        reversed: bool,
    ) -> Result<()> {
        let Some(playlist) = self.audio_playlist() else {
            rbuf.write_zero(cnt as usize);
            return Ok(());
        };

        if reversed {
            return self.audio_read_reversed(rbuf, scratch, &playlist, start, cnt, channel);
        }

        let loc = self.loop_location.load_full().map(|l| *l);

        if let Some(l) = loc {
            if *start >= l.end {
                *start = l.squish(*start);
            }
        }

        let mut cnt = cnt;
        while cnt > 0 {
            // Never read across the loop end; split and come back around.
            let to_loop_end = loc.map(|l| l.end - *start);
            let mut this_read = match to_loop_end {
                Some(span) if span < cnt => span,
                _ => cnt,
            };

            if this_read == 0 {
                break;
            }
            this_read = this_read.min(scratch.sum.len() as SampleCnt);
            let reloop_start = match (loc, to_loop_end) {
                (Some(l), Some(span)) if span == this_read => Some(l.start),
                _ => None,
            };
            let n = this_read as usize;

            let got = playlist.read(
                &mut scratch.sum[..n],
                &mut scratch.mixdown[..n],
                &mut scratch.gain[..n],
                *start,
                this_read,
                channel,
            );
            if got != this_read {
                return Err(Error::AudioPlaylistRead {
                    pos: *start,
                    want: this_read,
                    got,
                });
            }

            if let Some(loop_start) = reloop_start {
                *start = loop_start;
            } else {
                *start += this_read;
            }

            if rbuf.write(&scratch.sum[..n]) != n {
                warn!(track = %self.name(), "ring buffer write overrun");
            }

            cnt -= this_read;
        }

        Ok(())
    }

    /// Reverse playback: the block behind `start` is read top-down and each
    /// chunk reversed, so the ring receives samples in playback order.
    /// Loops are never played in reverse; the refill gate upstream rejects
    /// the combination.
    fn audio_read_reversed(
        &self,
        rbuf: &PlaybackBuffer<Sample>,
        scratch: &mut RefillScratch,
        playlist: &std::sync::Arc<dyn crate::playlist::AudioPlaylist>,
        start: &mut SamplePos,
        cnt: SampleCnt,
        channel: usize,
    ) -> Result<()> {
        *start -= cnt;
        let mut high = *start + cnt;
        let mut remaining = cnt;

        while remaining > 0 {
            let this_read = remaining.min(scratch.sum.len() as SampleCnt);
            let n = this_read as usize;
            high -= this_read;

            let got = playlist.read(
                &mut scratch.sum[..n],
                &mut scratch.mixdown[..n],
                &mut scratch.gain[..n],
                high,
                this_read,
                channel,
            );
            if got != this_read {
                return Err(Error::AudioPlaylistRead {
                    pos: high,
                    want: this_read,
                    got,
                });
            }

            scratch.sum[..n].reverse();
            if rbuf.write(&scratch.sum[..n]) != n {
                warn!(track = %self.name(), "ring buffer write overrun");
            }

            remaining -= this_read;
        }

        Ok(())
    }

    /// Top up the MIDI ring to the readahead horizon.
    pub fn refill_midi(&self) -> Result<()> {
        if !self.has_midi_playlist() {
            return Ok(());
        }
        let Some(midi) = &self.midi else {
            return Ok(());
        };

        let write_space = midi.write_space();
        if write_space == 0 {
            return Ok(());
        }

        if self.session().transport_speed() < 0.0 {
            // Reverse MIDI playback is unsupported: no refill, the RT side
            // plays silence.
            return Ok(());
        }

        let ffm = self.file_sample_midi.get();
        if ffm == MAX_SAMPLEPOS {
            return Ok(());
        }

        let samples_read = self.samples_read_from_midi_ring.load(Ordering::Acquire) as i64;
        let samples_written = self.samples_written_to_midi_ring.load(Ordering::Acquire) as i64;
        let readahead = self.config().midi_readahead as i64;

        if samples_read < samples_written && samples_written - samples_read >= readahead {
            return Ok(());
        }

        let to_read = (readahead - (samples_written - samples_read))
            .min(MAX_SAMPLEPOS - ffm)
            .min(write_space as i64);

        if to_read <= 0 {
            return Ok(());
        }

        let mut ffm = ffm;
        let result = self.midi_read(&mut ffm, to_read);
        self.file_sample_midi.set(ffm);
        result
    }

    /// Read `dur` samples' worth of MIDI from the playlist into the ring,
    /// wrapping inside the loop location. `start` is advanced
    /// monotonically; wrapping applies to the read positions only.
    pub(crate) fn midi_read(&self, start: &mut SamplePos, dur: SampleCnt) -> Result<()> {
        let Some(playlist) = self.midi_playlist() else {
            return Ok(());
        };
        let Some(midi) = &self.midi else {
            return Ok(());
        };

        let loc = self.loop_location.load_full().map(|l| *l);
        let filter = self.midi_filter();

        let mut effective_start = *start;
        let mut dur = dur;

        while dur > 0 {
            let this_read = match loc {
                Some(l) => {
                    effective_start = l.squish(effective_start);
                    (l.end - effective_start).min(dur)
                }
                None => dur,
            };

            if this_read == 0 {
                break;
            }

            let mut writer = RingWriter(midi);
            let got = playlist.read(&mut writer, effective_start, this_read, loc, filter);
            if got != this_read {
                return Err(Error::MidiPlaylistRead {
                    pos: effective_start,
                    want: this_read,
                    got,
                });
            }

            self.samples_written_to_midi_ring
                .fetch_add(this_read as u32, Ordering::AcqRel);

            *start += this_read;
            effective_start += this_read;
            dur -= this_read;
        }

        Ok(())
    }
}
