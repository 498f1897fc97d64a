//! Small observer channels usable from the realtime thread.

use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::Arc;

/// Default per-subscriber queue depth.
const SIGNAL_QUEUE: usize = 64;

/// Single-producer-side, multi-consumer notification hub.
///
/// `emit` is safe on the realtime path: the subscriber list is an
/// [`ArcSwap`] snapshot and delivery is a bounded `try_send` per subscriber
/// (a slow consumer drops notifications rather than blocking the emitter).
/// Subscription happens on control threads and republishes the list.
pub struct SignalHub<T> {
    subscribers: ArcSwap<Vec<Sender<T>>>,
    register: Mutex<Vec<Sender<T>>>,
}

impl<T: Clone> SignalHub<T> {
    pub fn new() -> Self {
        Self {
            subscribers: ArcSwap::from_pointee(Vec::new()),
            register: Mutex::new(Vec::new()),
        }
    }

    /// Add a subscriber and return its receiving end.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = bounded(SIGNAL_QUEUE);
        let mut reg = self.register.lock();
        reg.push(tx);
        self.subscribers.store(Arc::new(reg.clone()));
        rx
    }

    /// Deliver `value` to every live subscriber. Lock-free, non-blocking.
    pub fn emit(&self, value: T) {
        let subs = self.subscribers.load();
        match subs.len() {
            0 => {}
            1 => {
                let _ = subs[0].try_send(value);
            }
            _ => {
                for tx in subs.iter() {
                    if let Err(TrySendError::Full(_)) = tx.try_send(value.clone()) {
                        // dropped; observers are advisory
                    }
                }
            }
        }
    }

}

impl<T: Clone> Default for SignalHub<T> {
    fn default() -> Self {
        Self::new()
    }
}
