//! Lock-free SPSC ring buffer for disk-to-RT streaming.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Single-producer/single-consumer ring of fixed capacity.
///
/// The butler thread writes, the realtime thread reads. One slot is kept
/// reserved so an empty ring and a full ring are distinguishable: usable
/// capacity is `capacity - 1`. A `reservation` of already-consumed history
/// can additionally be kept behind the read pointer, allowing the consumer
/// to retreat (`decrement_read_ptr`) without racing the producer.
///
/// Storage is zero-initialized and every page is touched at construction so
/// the realtime side never takes a page fault.
pub struct PlaybackBuffer<T> {
    storage: UnsafeCell<Box<[T]>>,
    capacity: usize,
    reservation: usize,
    /// Consumer cursor. Written by the consumer (release), read by the
    /// producer (acquire).
    read_idx: CursorCell,
    /// Producer cursor. Written by the producer (release), read by the
    /// consumer (acquire).
    write_idx: CursorCell,
    /// Valid history behind the read pointer, capped at `reservation`.
    /// Consumer-side only.
    consumed: AtomicUsize,
}

// Cursors live on their own cache lines so the two sides do not false-share.
#[repr(align(64))]
struct CursorCell(AtomicUsize);

// SAFETY: at most one thread reads and one thread writes concurrently; the
// cursors partition the storage into a producer-owned and a consumer-owned
// region, published with release stores and observed with acquire loads.
unsafe impl<T: Send> Send for PlaybackBuffer<T> {}
unsafe impl<T: Send> Sync for PlaybackBuffer<T> {}

impl<T: Copy + Default> PlaybackBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self::with_reservation(capacity, 0)
    }

    pub fn with_reservation(capacity: usize, reservation: usize) -> Self {
        assert!(capacity >= 2, "ring capacity must be at least 2");
        assert!(
            reservation < capacity,
            "reservation must leave usable capacity"
        );

        let mut storage = vec![T::default(); capacity].into_boxed_slice();

        // Touch every page up front; a zeroing allocator may hand back
        // lazily-mapped pages.
        let stride = (4096 / std::mem::size_of::<T>().max(1)).max(1);
        for i in (0..capacity).step_by(stride) {
            unsafe { std::ptr::write_volatile(&mut storage[i], T::default()) };
        }

        Self {
            storage: UnsafeCell::new(storage),
            capacity,
            reservation,
            read_idx: CursorCell(AtomicUsize::new(0)),
            write_idx: CursorCell(AtomicUsize::new(0)),
            consumed: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples available for the consumer to read.
    pub fn read_space(&self) -> usize {
        let w = self.write_idx.0.load(Ordering::Acquire);
        let r = self.read_idx.0.load(Ordering::Acquire);
        (w + self.capacity - r) % self.capacity
    }

    /// Samples the producer may currently write.
    pub fn write_space(&self) -> usize {
        (self.capacity - 1 - self.read_space()).saturating_sub(self.reservation)
    }

    /// Non-blocking write. Returns the number of samples accepted; short
    /// only when the ring is (nearly) full.
    pub fn write(&self, src: &[T]) -> usize {
        let n = src.len().min(self.write_space());
        if n == 0 {
            return 0;
        }

        let w = self.write_idx.0.load(Ordering::Relaxed);
        let first = n.min(self.capacity - w);
        unsafe {
            let dst = self.data_ptr();
            std::ptr::copy_nonoverlapping(src.as_ptr(), dst.add(w), first);
            if n > first {
                std::ptr::copy_nonoverlapping(src.as_ptr().add(first), dst, n - first);
            }
        }
        self.write_idx
            .0
            .store((w + n) % self.capacity, Ordering::Release);
        n
    }

    /// Write `n` default-valued samples.
    pub fn write_zero(&self, n: usize) -> usize {
        let n = n.min(self.write_space());
        if n == 0 {
            return 0;
        }

        let w = self.write_idx.0.load(Ordering::Relaxed);
        let first = n.min(self.capacity - w);
        unsafe {
            let dst = self.data_ptr();
            for i in 0..first {
                *dst.add(w + i) = T::default();
            }
            for i in 0..n - first {
                *dst.add(i) = T::default();
            }
        }
        self.write_idx
            .0
            .store((w + n) % self.capacity, Ordering::Release);
        n
    }

    /// Non-blocking read, advancing the read pointer. Returns the number of
    /// samples copied into `dst`.
    pub fn read(&self, dst: &mut [T]) -> usize {
        let n = dst.len().min(self.read_space());
        if n == 0 {
            return 0;
        }

        let r = self.read_idx.0.load(Ordering::Relaxed);
        self.copy_out(dst, r, n);
        self.read_idx
            .0
            .store((r + n) % self.capacity, Ordering::Release);
        self.note_consumed(n);
        n
    }

    /// Read without moving the read pointer, starting `offset` samples past
    /// it. Used by the declick fade-out to look ahead while stopped.
    pub fn peek(&self, dst: &mut [T], offset: usize) -> usize {
        let avail = self.read_space();
        if offset >= avail {
            return 0;
        }
        let n = dst.len().min(avail - offset);
        if n == 0 {
            return 0;
        }

        let r = self.read_idx.0.load(Ordering::Relaxed);
        self.copy_out(dst, (r + offset) % self.capacity, n);
        n
    }

    /// Advance the read pointer without copying. Returns the distance
    /// actually advanced.
    pub fn increment_read_ptr(&self, n: usize) -> usize {
        let n = n.min(self.read_space());
        if n > 0 {
            let r = self.read_idx.0.load(Ordering::Relaxed);
            self.read_idx
                .0
                .store((r + n) % self.capacity, Ordering::Release);
            self.note_consumed(n);
        }
        n
    }

    /// Retreat the read pointer into already-consumed history. Returns the
    /// distance actually retreated (bounded by the reservation).
    pub fn decrement_read_ptr(&self, n: usize) -> usize {
        let n = n.min(self.consumed.load(Ordering::Relaxed));
        if n > 0 {
            let r = self.read_idx.0.load(Ordering::Relaxed);
            self.read_idx
                .0
                .store((r + self.capacity - n) % self.capacity, Ordering::Release);
            self.consumed.fetch_sub(n, Ordering::Relaxed);
        }
        n
    }

    /// Whether a read-pointer jump of `distance` can be satisfied from data
    /// (forward) or retained history (backward) already in the ring.
    pub fn can_seek(&self, distance: i64) -> bool {
        if distance > 0 {
            self.read_space() as i64 >= distance
        } else if distance < 0 {
            self.consumed.load(Ordering::Relaxed) as i64 >= -distance
        } else {
            true
        }
    }

    /// Drop everything readable (consumer side).
    pub fn read_flush(&self) {
        self.increment_read_ptr(self.read_space());
    }

    /// Return to the empty state.
    ///
    /// Not concurrency-safe: callers must guarantee the other side is
    /// quiescent (the seek/overwrite protocol does).
    pub fn reset(&self) {
        self.read_idx.0.store(0, Ordering::Release);
        self.write_idx.0.store(0, Ordering::Release);
        self.consumed.store(0, Ordering::Relaxed);
    }

    fn copy_out(&self, dst: &mut [T], from: usize, n: usize) {
        let first = n.min(self.capacity - from);
        unsafe {
            let src = self.data_ptr();
            std::ptr::copy_nonoverlapping(src.add(from), dst.as_mut_ptr(), first);
            if n > first {
                std::ptr::copy_nonoverlapping(src, dst.as_mut_ptr().add(first), n - first);
            }
        }
    }

    fn note_consumed(&self, n: usize) {
        let c = self.consumed.load(Ordering::Relaxed);
        self.consumed
            .store((c + n).min(self.reservation), Ordering::Relaxed);
    }

    fn data_ptr(&self) -> *mut T {
        unsafe { (*self.storage.get()).as_mut_ptr() }
    }
}
