//! Receive queue between the serial interrupt and the application context.
//!
//! Single producer, single consumer. The producer half is moved into the
//! serial driver's receive handler; the consumer half stays with the link.
//! Bytes that do not fit are dropped (newest first) and counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use crate::core::DeferredWork;

struct Shared {
    /// Ring storage.
    buffer: Box<[AtomicU8]>,
    /// Total bytes ever written (producer cursor).
    head: AtomicUsize,
    /// Total bytes ever consumed (consumer cursor).
    tail: AtomicUsize,
    /// Bytes dropped on overflow since the last `take_dropped`.
    dropped: AtomicUsize,
    /// A drain has been scheduled and not yet started.
    pending: AtomicBool,
    /// Scheduler for the drain.
    work: Arc<dyn DeferredWork>,
}

impl Shared {
    fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

/// Producer half. Safe to use from interrupt context: it never blocks and
/// never allocates.
pub struct ReceiveProducer {
    shared: Arc<Shared>,
}

impl ReceiveProducer {
    /// Append `data`, dropping whatever does not fit.
    ///
    /// Schedules a drain unless one is already pending. Returns the number of
    /// bytes accepted.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let shared = &*self.shared;
        let capacity = shared.capacity();

        let tail = shared.tail.load(Ordering::Acquire);
        let head = shared.head.load(Ordering::Relaxed);
        let free = capacity - head.wrapping_sub(tail);
        let accepted = data.len().min(free);

        for (offset, byte) in data[..accepted].iter().enumerate() {
            shared.buffer[head.wrapping_add(offset) % capacity].store(*byte, Ordering::Relaxed);
        }
        shared.head.store(head.wrapping_add(accepted), Ordering::Release);

        if accepted < data.len() {
            shared
                .dropped
                .fetch_add(data.len() - accepted, Ordering::Relaxed);
        }

        if accepted > 0 && !shared.pending.swap(true, Ordering::AcqRel) {
            shared.work.schedule();
        }

        accepted
    }
}

impl std::fmt::Debug for ReceiveProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveProducer")
            .field("capacity", &self.shared.capacity())
            .finish()
    }
}

/// Consumer half of the receive queue.
pub struct ReceiveQueue {
    shared: Arc<Shared>,
}

impl ReceiveQueue {
    /// Create a queue of `capacity` bytes.
    ///
    /// `work` is scheduled whenever bytes arrive and no drain is pending.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, work: Arc<dyn DeferredWork>) -> (ReceiveProducer, Self) {
        assert!(capacity > 0, "receive queue capacity must be non-zero");

        let buffer = (0..capacity).map(|_| AtomicU8::new(0)).collect();
        let shared = Arc::new(Shared {
            buffer,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
            pending: AtomicBool::new(false),
            work,
        });

        (
            ReceiveProducer {
                shared: Arc::clone(&shared),
            },
            Self { shared },
        )
    }

    /// Queue capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        let head = self.shared.head.load(Ordering::Acquire);
        let tail = self.shared.tail.load(Ordering::Relaxed);
        head.wrapping_sub(tail)
    }

    /// Check if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark the scheduled drain as started.
    ///
    /// Must be called before reading so that bytes pushed during the drain
    /// schedule a fresh one instead of being stranded.
    pub fn begin_drain(&mut self) {
        self.shared.pending.store(false, Ordering::Release);
    }

    /// Move the next contiguous run of buffered bytes into `out`.
    ///
    /// `out` is cleared first. Returns the number of bytes moved; zero means
    /// the queue is empty. A drain is [`begin_drain`](Self::begin_drain)
    /// followed by calls until zero, so the consumer can stop between runs.
    pub fn read_contiguous(&mut self, out: &mut Vec<u8>) -> usize {
        let shared = &*self.shared;
        let capacity = shared.capacity();

        let head = shared.head.load(Ordering::Acquire);
        let tail = shared.tail.load(Ordering::Relaxed);
        let available = head.wrapping_sub(tail);

        out.clear();
        if available == 0 {
            return 0;
        }

        let start = tail % capacity;
        let run = available.min(capacity - start);
        out.extend(
            shared.buffer[start..start + run]
                .iter()
                .map(|byte| byte.load(Ordering::Relaxed)),
        );
        shared.tail.store(tail.wrapping_add(run), Ordering::Release);

        run
    }

    /// Discard everything buffered. Returns the number of bytes discarded.
    pub fn discard(&mut self) -> usize {
        let head = self.shared.head.load(Ordering::Acquire);
        let tail = self.shared.tail.load(Ordering::Relaxed);
        self.shared.tail.store(head, Ordering::Release);
        head.wrapping_sub(tail)
    }

    /// Return and reset the overflow counter.
    pub fn take_dropped(&mut self) -> usize {
        self.shared.dropped.swap(0, Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ReceiveQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
