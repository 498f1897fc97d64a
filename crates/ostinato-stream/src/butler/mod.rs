//! Background disk I/O worker.

mod thread;

pub use thread::{Butler, ButlerNotice, ButlerRequest};
