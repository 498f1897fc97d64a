//! Musical timebase: beats+ticks values and tempo mapping.

mod beats;
mod tempo;

pub use beats::{Beats, PPQN};
pub use tempo::TempoMap;
