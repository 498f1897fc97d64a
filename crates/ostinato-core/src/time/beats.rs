//! Musical time in beats and sub-beat ticks.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

use super::tempo::TempoMap;

/// Pulses (ticks) per quarter note.
pub const PPQN: i32 = 1920;

/// Musical time as whole beats plus sub-beat ticks.
///
/// Canonical form keeps `|ticks| < PPQN` with the signs of both fields in
/// agreement (or either zero). All arithmetic re-normalizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Beats {
    beats: i32,
    ticks: i32,
}

impl Beats {
    /// Create from a precise beat/tick pair, normalizing.
    pub fn new(beats: i32, ticks: i32) -> Self {
        let mut b = Self { beats, ticks };
        b.normalize();
        b
    }

    /// Create from an integer number of beats.
    pub const fn from_beats(beats: i32) -> Self {
        Self { beats, ticks: 0 }
    }

    /// Create from a total tick count at the standard PPQN.
    pub fn from_ticks(ticks: i64) -> Self {
        Self {
            beats: (ticks / PPQN as i64) as i32,
            ticks: (ticks % PPQN as i64) as i32,
        }
    }

    /// Create from ticks at a foreign rate.
    ///
    /// Setting `ppqn` to samples-per-beat converts from sample counts. The
    /// result is at the standard PPQN, so the conversion may be lossy.
    pub fn ticks_at_rate(ticks: i64, ppqn: u32) -> Self {
        let ppqn = ppqn as i64;
        Self::new(
            (ticks / ppqn) as i32,
            ((ticks % ppqn) * PPQN as i64 / ppqn) as i32,
        )
    }

    /// Create from a real number of beats.
    pub fn from_f64(time: f64) -> Self {
        let whole = time.trunc();
        let frac = time - whole;
        Self::new(whole as i32, (frac * PPQN as f64).round() as i32)
    }

    /// Create from wall-clock seconds via a tempo map.
    pub fn from_seconds(seconds: f64, map: &TempoMap) -> Self {
        Self::from_f64(map.seconds_to_beats(seconds))
    }

    /// One tick.
    pub const fn tick() -> Self {
        Self { beats: 0, ticks: 1 }
    }

    /// The most negative representable value.
    pub const fn lowest() -> Self {
        Self {
            beats: i32::MIN,
            ticks: -(PPQN - 1),
        }
    }

    /// The most positive representable value.
    ///
    /// No `min` is provided: its meaning differs between integral and real
    /// time types, and this value is used as both.
    pub const fn max() -> Self {
        Self {
            beats: i32::MAX,
            ticks: PPQN - 1,
        }
    }

    /// Re-canonicalize so `|ticks| < PPQN` and the field signs agree,
    /// preserving the total tick count.
    pub fn normalize(&mut self) {
        let total = self.to_ticks();
        self.beats = (total / PPQN as i64) as i32;
        self.ticks = (total % PPQN as i64) as i32;
    }

    pub const fn get_beats(&self) -> i32 {
        self.beats
    }

    pub const fn get_ticks(&self) -> i32 {
        self.ticks
    }

    pub fn to_f64(&self) -> f64 {
        self.beats as f64 + self.ticks as f64 / PPQN as f64
    }

    /// Total tick count at the standard PPQN.
    pub fn to_ticks(&self) -> i64 {
        self.beats as i64 * PPQN as i64 + self.ticks as i64
    }

    /// Total tick count at a foreign rate.
    pub fn to_ticks_at_rate(&self, ppqn: u32) -> i64 {
        self.beats as i64 * ppqn as i64 + self.ticks as i64 * ppqn as i64 / PPQN as i64
    }

    /// Wall-clock seconds via a tempo map.
    pub fn to_seconds(&self, map: &TempoMap) -> f64 {
        map.beats_to_seconds(self.to_f64())
    }

    /// Round to the nearest beat boundary (ticks >= PPQN/2 round up).
    pub fn round_to_beat(&self) -> Self {
        if self.ticks >= PPQN / 2 {
            Self::from_beats(self.beats + 1)
        } else {
            Self::from_beats(self.beats)
        }
    }

    /// Round up to the next beat boundary unless already on one.
    pub fn round_up_to_beat(&self) -> Self {
        if self.ticks == 0 {
            *self
        } else {
            Self::from_beats(self.beats + 1)
        }
    }

    /// Truncate ticks.
    pub fn round_down_to_beat(&self) -> Self {
        Self::from_beats(self.beats)
    }

    /// Next multiple of `snap` at or after self, in real arithmetic.
    pub fn snap_to(&self, snap: Beats) -> Self {
        let snap_time = snap.to_f64();
        Self::from_f64((self.to_f64() / snap_time).ceil() * snap_time)
    }

    pub const fn is_zero(&self) -> bool {
        self.beats == 0 && self.ticks == 0
    }
}

impl std::ops::Add for Beats {
    type Output = Beats;

    fn add(self, rhs: Beats) -> Beats {
        Beats::new(self.beats + rhs.beats, self.ticks + rhs.ticks)
    }
}

impl std::ops::Sub for Beats {
    type Output = Beats;

    fn sub(self, rhs: Beats) -> Beats {
        Beats::new(self.beats - rhs.beats, self.ticks - rhs.ticks)
    }
}

impl std::ops::Neg for Beats {
    type Output = Beats;

    fn neg(self) -> Beats {
        Beats::new(-self.beats, -self.ticks)
    }
}

impl std::ops::Add<i32> for Beats {
    type Output = Beats;

    fn add(self, rhs: i32) -> Beats {
        Beats::new(self.beats + rhs, self.ticks)
    }
}

impl std::ops::Sub<i32> for Beats {
    type Output = Beats;

    fn sub(self, rhs: i32) -> Beats {
        Beats::new(self.beats - rhs, self.ticks)
    }
}

impl std::ops::Add<f64> for Beats {
    type Output = Beats;

    fn add(self, rhs: f64) -> Beats {
        Beats::from_f64(self.to_f64() + rhs)
    }
}

impl std::ops::Sub<f64> for Beats {
    type Output = Beats;

    fn sub(self, rhs: f64) -> Beats {
        Beats::from_f64(self.to_f64() - rhs)
    }
}

impl std::ops::AddAssign for Beats {
    fn add_assign(&mut self, rhs: Beats) {
        self.beats += rhs.beats;
        self.ticks += rhs.ticks;
        self.normalize();
    }
}

impl std::ops::SubAssign for Beats {
    fn sub_assign(&mut self, rhs: Beats) {
        self.beats -= rhs.beats;
        self.ticks -= rhs.ticks;
        self.normalize();
    }
}

impl std::ops::Mul<i32> for Beats {
    type Output = Beats;

    fn mul(self, factor: i32) -> Beats {
        Beats::from_ticks(self.to_ticks() * factor as i64)
    }
}

impl std::ops::Div<i32> for Beats {
    type Output = Beats;

    /// Tick-precision division.
    fn div(self, factor: i32) -> Beats {
        Beats::from_ticks(self.to_ticks() / factor as i64)
    }
}

impl std::ops::Mul<f64> for Beats {
    type Output = Beats;

    fn mul(self, factor: f64) -> Beats {
        Beats::from_ticks((self.to_ticks() as f64 * factor).round() as i64)
    }
}

impl std::ops::Div<f64> for Beats {
    type Output = Beats;

    fn div(self, factor: f64) -> Beats {
        Beats::from_ticks((self.to_ticks() as f64 / factor).round() as i64)
    }
}

/// Real-number comparison with a one-tick tolerance: values within 1/PPQN
/// compare equal, and strict `<` / `>` are false for such pairs.
impl PartialEq<f64> for Beats {
    fn eq(&self, other: &f64) -> bool {
        (self.to_f64() - other).abs() <= 1.0 / PPQN as f64
    }
}

impl PartialOrd<f64> for Beats {
    fn partial_cmp(&self, other: &f64) -> Option<std::cmp::Ordering> {
        if self == other {
            Some(std::cmp::Ordering::Equal)
        } else {
            self.to_f64().partial_cmp(other)
        }
    }
}

impl PartialEq<i32> for Beats {
    fn eq(&self, other: &i32) -> bool {
        self.beats == *other
    }
}

impl fmt::Display for Beats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.beats, self.ticks)
    }
}

impl FromStr for Beats {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let time: f64 = s.trim().parse()?;
        Ok(Beats::from_f64(time))
    }
}
