//! Per-track monitoring flags.

/// Which signal sources are audible on a track's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitorState(u8);

impl MonitorState {
    pub const OFF: MonitorState = MonitorState(0);
    /// Playback from the disk stream.
    pub const DISK: MonitorState = MonitorState(1);
    /// Live input passthrough.
    pub const INPUT: MonitorState = MonitorState(2);

    #[inline]
    pub fn contains(self, other: MonitorState) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn union(self, other: MonitorState) -> MonitorState {
        MonitorState(self.0 | other.0)
    }
}

impl std::ops::BitOr for MonitorState {
    type Output = MonitorState;

    fn bitor(self, rhs: MonitorState) -> MonitorState {
        self.union(rhs)
    }
}
