//! Exponential gain ramp applied at transport edges.

use crate::lockfree::AtomicFloat;
use crate::Sample;

/// Samples processed per coefficient update.
const BLOCK: usize = 16;

/// Snap distance below which the ramp is considered settled.
const GAIN_DELTA: f32 = 1e-5;

/// One-pole gain ramp, roughly a 10 ms time constant at 44.1 kHz.
///
/// The current gain is readable from other threads (the butler asks whether
/// a fade-out is still in flight before acting on a seek).
#[derive(Debug)]
pub struct DeclickRamp {
    a: f32,
    l: f32,
    g: AtomicFloat,
}

impl DeclickRamp {
    pub fn new(sample_rate: f64) -> Self {
        let a = 4550.0 / sample_rate as f32;
        Self {
            a,
            l: -a.ln_1p(),
            g: AtomicFloat::new(0.0),
        }
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        self.g.get()
    }

    /// Jump to a gain without ramping (transport fades disabled).
    pub fn set_gain(&self, gain: f32) {
        self.g.set(gain);
    }

    /// Scale `buf` while ramping the gain toward `target`.
    ///
    /// The coefficient is applied once per block of up to [`BLOCK`] samples;
    /// the final partial block uses the exact exponential so the end value
    /// is deterministic for a given sample rate. Settles (snaps) once within
    /// [`GAIN_DELTA`] of the target. Never allocates.
    pub fn apply_gain(&self, buf: &mut [Sample], target: f32) {
        if buf.is_empty() {
            return;
        }

        let mut g = self.g.get();

        if g == target {
            if target != 1.0 {
                for s in buf.iter_mut() {
                    *s *= target;
                }
            }
            return;
        }

        for chunk in buf.chunks_mut(BLOCK) {
            for s in chunk.iter_mut() {
                *s *= g;
            }
            if chunk.len() == BLOCK {
                g += self.a * (target - g);
            } else {
                g = target - (target - g) * (self.l * chunk.len() as f32 / BLOCK as f32).exp();
            }
        }

        if (g - target).abs() < GAIN_DELTA {
            g = target;
        }
        self.g.set(g);
    }
}
