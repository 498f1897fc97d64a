//! Realtime pull path. Nothing here allocates, locks or blocks: on trouble
//! the cycle yields silence or signals an underrun and returns.

use std::sync::atomic::Ordering;

use tracing::{error, warn};

use ostinato_core::{MonitorState, SamplePos};

use crate::bufferset::{apply_simple_gain, mix_buffers_no_gain, BufferSet};

use super::DiskReader;

enum AudioOutcome {
    Ok,
    /// Short ring read: the cycle is abandoned untouched.
    Underrun,
    /// The requested start position diverged beyond what the rings can
    /// bridge; the cycle is silence but MIDI and cursors still run.
    SeekFailed,
}

impl DiskReader {
    /// Serve one process cycle.
    ///
    /// `speed` is the transport speed quantized to -1, 0 or +1. When
    /// `result_required` is false the output buffers are not written, but
    /// ring cursors still advance so the stream stays aligned.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        bufs: &mut BufferSet,
        scratch: &mut BufferSet,
        start_sample: SamplePos,
        end_sample: SamplePos,
        speed: f64,
        nframes: usize,
        result_required: bool,
        monitor: MonitorState,
    ) {
        if !self.honor_pending_active() {
            return;
        }

        debug_assert!(speed == -1.0 || speed == 0.0 || speed == 1.0);

        let mut ms = monitor;
        let mut result_required = result_required;

        let target_gain = if speed == 0.0 || !ms.contains(MonitorState::DISK) {
            0.0
        } else {
            1.0
        };

        if !self.config().use_transport_fades {
            self.declick.set_gain(target_gain);
        }

        if speed == 0.0 && ms == MonitorState::DISK && self.declick.gain() == target_gain {
            // Stopped and settled: do not let stale disk data reach the
            // outputs.
            return;
        }

        let still_locating = self.session().global_locate_pending() || self.pending_overwrite();
        let disk_samples_to_consume: usize = if speed == 0.0 { 0 } else { nframes };

        if !self.channels.is_empty() {
            match self.run_audio(
                bufs,
                scratch,
                start_sample,
                speed,
                nframes,
                disk_samples_to_consume,
                &mut result_required,
                &mut ms,
                target_gain,
                still_locating,
            ) {
                AudioOutcome::Underrun => {
                    self.emit_underrun();
                    return;
                }
                AudioOutcome::Ok | AudioOutcome::SeekFailed => {}
            }
        }

        if self.midi.is_some() && bufs.n_midi() > 0 && ms.contains(MonitorState::DISK) && !still_locating
        {
            self.get_midi_playback(bufs, scratch, start_sample, end_sample, ms);
        }

        if !still_locating {
            if speed < 0.0 {
                self.playback_sample.add(-(disk_samples_to_consume as i64));
            } else {
                self.playback_sample.add(disk_samples_to_consume as i64);
            }
            self.update_butler_demand(disk_samples_to_consume);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_audio(
        &self,
        bufs: &mut BufferSet,
        scratch: &mut BufferSet,
        start_sample: SamplePos,
        speed: f64,
        nframes: usize,
        disk_samples_to_consume: usize,
        result_required: &mut bool,
        ms: &mut MonitorState,
        target_gain: f32,
        still_locating: bool,
    ) -> AudioOutcome {
        if self.declick.gain() != target_gain && target_gain == 0.0 {
            // Mid fade-out: keep pulling disk data (without consuming it)
            // until the ramp lands.
            *ms = ms.union(MonitorState::DISK);
            *result_required = true;
        } else {
            self.declick_offs.store(0, Ordering::Relaxed);
        }

        if !*result_required
            || !ms.contains(MonitorState::DISK)
            || still_locating
            || self.no_disk_output()
        {
            // No disk data wanted: keep the read cursors moving and return.
            if !still_locating || self.no_disk_output() {
                for chan in &self.channels {
                    chan.rbuf().increment_read_ptr(disk_samples_to_consume);
                }
            }
            if (self.no_disk_output() || still_locating) && *ms == MonitorState::DISK {
                bufs.silence(nframes);
            }
            return AudioOutcome::Ok;
        }

        let n_buffers = bufs.n_audio();
        let n_chans = self.channels.len();
        let scaling = if n_chans > n_buffers {
            n_buffers as f32 / n_chans as f32
        } else {
            1.0
        };

        let playback_sample = self.playback_sample.get();
        if start_sample != playback_sample && target_gain != 0.0 {
            let distance = start_sample - playback_sample;
            if self.can_internal_playback_seek(distance) {
                self.internal_playback_seek(distance);
            } else {
                debug_assert!(
                    false,
                    "playback at {playback_sample} cannot reach {start_sample} within the ring"
                );
                error!(
                    track = %self.name(),
                    playback_sample,
                    start_sample,
                    "playback position unreachable, silencing cycle"
                );
                bufs.silence(nframes);
                return AudioOutcome::SeekFailed;
            }
        }

        let monitoring_input = ms.contains(MonitorState::INPUT);

        for (n, chan) in self.channels.iter().enumerate() {
            let rbuf = chan.rbuf();
            let out_idx = n % n_buffers;

            let filled = if monitoring_input {
                let disk_buf = &mut scratch.audio_mut(n)[..nframes];
                self.fill_channel(&rbuf, disk_buf, speed, disk_samples_to_consume, target_gain)
            } else {
                let disk_buf = &mut bufs.audio_mut(out_idx)[..nframes];
                self.fill_channel(&rbuf, disk_buf, speed, disk_samples_to_consume, target_gain)
            };
            if !filled {
                return AudioOutcome::Underrun;
            }

            {
                let disk_buf = if monitoring_input {
                    &mut scratch.audio_mut(n)[..nframes]
                } else {
                    &mut bufs.audio_mut(out_idx)[..nframes]
                };
                self.declick.apply_gain(disk_buf, target_gain);
                apply_simple_gain(disk_buf, scaling);
            }

            if monitoring_input {
                // The input signal is already in the output buffer; sum the
                // disk signal on top.
                mix_buffers_no_gain(
                    &mut bufs.audio_mut(out_idx)[..nframes],
                    &scratch.audio(n)[..nframes],
                );
            }
        }

        AudioOutcome::Ok
    }

    /// Copy one channel's samples out of its ring. Returns false on a
    /// short read (underrun); the ring is left untouched in that case.
    fn fill_channel(
        &self,
        rbuf: &ostinato_core::PlaybackBuffer<f32>,
        disk_buf: &mut [f32],
        speed: f64,
        disk_samples_to_consume: usize,
        target_gain: f32,
    ) -> bool {
        if speed != 0.0 {
            if rbuf.read_space() < disk_samples_to_consume {
                warn!(
                    track = %self.name(),
                    want = disk_samples_to_consume,
                    have = rbuf.read_space(),
                    "underrun"
                );
                return false;
            }
            rbuf.read(&mut disk_buf[..disk_samples_to_consume]);
        } else if self.declick.gain() != target_gain {
            // Stopped mid fade-out: look ahead without consuming, so a
            // subsequent start replays from the right place.
            let offs = self.declick_offs.load(Ordering::Relaxed);
            let got = rbuf.peek(disk_buf, offs);
            self.declick_offs.store(offs + got, Ordering::Relaxed);
            disk_buf[got..].fill(0.0);
        }
        true
    }

    /// Pull MIDI for this cycle, honoring the loop location.
    fn get_midi_playback(
        &self,
        bufs: &mut BufferSet,
        scratch: &mut BufferSet,
        start_sample: SamplePos,
        end_sample: SamplePos,
        ms: MonitorState,
    ) {
        let Some(midi) = &self.midi else { return };
        let nframes = (end_sample - start_sample).unsigned_abs() as usize;

        // Input-monitored tracks merge disk events after the fact;
        // no-disk-output reads into scratch and discards.
        let to_scratch = self.no_disk_output() || ms.contains(MonitorState::INPUT);

        {
            let target = if to_scratch {
                let t = scratch.midi_mut(0);
                t.clear();
                t
            } else {
                bufs.midi_mut(0)
            };

            if let Some(loc) = self.loop_location.load().as_deref() {
                let effective_start = loc.squish(start_sample);

                if effective_start == loc.start {
                    // A fresh lap: notes held over the wrap get their offs.
                    midi.resolve_tracker(target, effective_start);
                }

                if loc.end >= effective_start && loc.end < effective_start + nframes as SamplePos {
                    // The wrap lands mid-cycle: split the read around it.
                    let first = (loc.end - effective_start) as usize;
                    let second = nframes - first;

                    if first > 0 {
                        midi.read(target, effective_start, loc.end);
                    }
                    if second > 0 {
                        midi.resolve_tracker(target, loc.start);
                        midi.read(target, loc.start, loc.start + second as SamplePos);
                    }
                } else {
                    midi.read(
                        target,
                        effective_start,
                        effective_start + nframes as SamplePos,
                    );
                }
            } else {
                let skipped = midi.skip_to(start_sample);
                if skipped > 0 {
                    warn!(
                        track = %self.name(),
                        skipped,
                        "skipped MIDI events, possible underflow"
                    );
                }
                midi.read(target, start_sample, end_sample);
            }
        }

        self.samples_read_from_midi_ring
            .fetch_add(nframes as u32, Ordering::AcqRel);

        if ms.contains(MonitorState::INPUT) && !self.no_disk_output() {
            let (dst, src) = (bufs.midi_mut(0), scratch.midi(0));
            dst.merge_from(src);
        }
    }

    /// Decide whether the butler should be woken after this cycle.
    fn update_butler_demand(&self, disk_samples_to_consume: usize) {
        let mut butler_required = false;

        if self.has_audio_playlist() {
            if let Some(chan) = self.channels.first() {
                let rbuf = chan.rbuf();
                butler_required = if self.is_slaved() {
                    // Conservative while chasing a master: only wake for
                    // half-empty rings.
                    rbuf.write_space() >= rbuf.capacity() / 2
                } else {
                    rbuf.write_space() >= self.config().chunk_samples
                };
            }
        }

        if self.has_midi_playlist() {
            let samples_read = self.samples_read_from_midi_ring.load(Ordering::Acquire);
            let samples_written = self.samples_written_to_midi_ring.load(Ordering::Acquire);

            // Right after an overwrite the read counter can lead the write
            // counter; that also means the butler is behind.
            if samples_read <= samples_written {
                let buffered = (samples_written - samples_read) as usize;
                if buffered + disk_samples_to_consume < self.config().midi_readahead as usize {
                    butler_required = true;
                }
            } else {
                butler_required = true;
            }
        }

        self.need_butler.set(butler_required);
    }
}
