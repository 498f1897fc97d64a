//! Streaming configuration.

/// Smallest disk read per refill pass, in bytes.
pub const MIN_READ_BYTES: usize = 256 * 1024;

/// Largest disk read per refill pass, in bytes. Bigger is faster in MB/s
/// but a bigger read always takes longer wall-clock.
pub const MAX_READ_BYTES: usize = 4 * 1024 * 1024;

/// Disk reads are rounded down to a multiple of this.
pub const READ_ALIGN_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Session sample rate. Default: 48000.0
    pub sample_rate: f64,
    /// Capacity of each per-channel playback ring. Default: 262144
    pub playback_buffer_samples: usize,
    /// Consumed history kept behind the read pointer for backward seeks.
    /// Default: 8191
    pub ring_reservation: usize,
    /// Refill granularity in samples. Default: 65536
    pub chunk_samples: usize,
    /// How far ahead of the RT cursor the MIDI ring is kept filled, in
    /// samples. Default: 4096
    pub midi_readahead: u32,
    /// Capacity of the MIDI event ring, in events. Default: 1024
    pub midi_ring_events: usize,
    /// Bit width of the session's native file format, used to size disk
    /// reads in bytes. Default: 32
    pub native_bits_per_sample: usize,
    /// Apply declick ramps at transport edges. Default: true
    pub use_transport_fades: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            playback_buffer_samples: 262144,
            ring_reservation: 8191,
            chunk_samples: 65536,
            midi_readahead: 4096,
            midi_ring_events: 1024,
            native_bits_per_sample: 32,
            use_transport_fades: true,
        }
    }
}

impl StreamConfig {
    /// Size one refill read, given the free space to fill.
    ///
    /// The read is planned in bytes (disk bandwidth is what matters),
    /// clamped to [`MIN_READ_BYTES`]..=[`MAX_READ_BYTES`], rounded down to
    /// [`READ_ALIGN_BYTES`], and converted back to samples at the native
    /// file bit width.
    pub fn read_size_samples(&self, total_space: usize) -> usize {
        let bytes_per_sample = self.native_bits_per_sample / 8;
        let total_bytes = total_space * bytes_per_sample;

        let byte_size = total_bytes.clamp(MIN_READ_BYTES, MAX_READ_BYTES);
        let byte_size = (byte_size / READ_ALIGN_BYTES) * READ_ALIGN_BYTES;

        byte_size / bytes_per_sample
    }
}
