//! Ring bookkeeping shared by the producer and the drain thread
//!
//! Pure data structure, no synchronization: the owner wraps it in a mutex.

/// Lifecycle of an [`AsyncRingBuffer`](super::AsyncRingBuffer)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingState {
    /// Drain thread running, writes accepted
    Running,
    /// Shutdown requested: drain what is pending, then exit
    Closing,
    /// Drain thread joined
    Closed,
}

/// Fixed-capacity byte ring
///
/// `pending` bytes sit between `read_head` and `write_head` waiting for the
/// drain thread. `draining` bytes have been copied out by the drain thread but
/// not yet delivered, and still count against capacity so the producer cannot
/// run more than `capacity` bytes ahead of the sink.
#[derive(Debug)]
pub struct Ring {
    buf: Box<[u8]>,
    read_head: usize,
    write_head: usize,
    pending: usize,
    draining: usize,
    pub(crate) state: RingState,
    /// Total bytes accepted from the producer
    pub(crate) submitted: u64,
    /// Total bytes handed to the sink (successfully or not)
    pub(crate) delivered: u64,
    /// Set once the sink has returned a short count
    pub(crate) sink_failed: bool,
    /// Set when the drain thread has exited, normally or by panic
    pub(crate) drain_exited: bool,
}

impl Ring {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            read_head: 0,
            write_head: 0,
            pending: 0,
            draining: 0,
            state: RingState::Running,
            submitted: 0,
            delivered: 0,
            sink_failed: false,
            drain_exited: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.pending - self.draining
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Copy `chunk` in at the write head, wrapping at the end of the array
    ///
    /// Caller guarantees `chunk.len() <= self.free()`.
    pub fn push(&mut self, chunk: &[u8]) {
        debug_assert!(chunk.len() <= self.free());
        let cap = self.capacity();
        let first = chunk.len().min(cap - self.write_head);
        self.buf[self.write_head..self.write_head + first].copy_from_slice(&chunk[..first]);
        self.buf[..chunk.len() - first].copy_from_slice(&chunk[first..]);

        self.write_head = (self.write_head + chunk.len()) % cap;
        self.pending += chunk.len();
        self.submitted += chunk.len() as u64;
    }

    /// Move every pending byte into `out` (replacing its contents)
    ///
    /// The two halves of a wrapped region land in order. Returns the split
    /// point: `out[..split]` came from before the wrap boundary.
    pub fn take_pending(&mut self, out: &mut Vec<u8>) -> usize {
        out.clear();
        let cap = self.capacity();
        let n = self.pending;
        let first = n.min(cap - self.read_head);
        out.extend_from_slice(&self.buf[self.read_head..self.read_head + first]);
        out.extend_from_slice(&self.buf[..n - first]);

        self.read_head = (self.read_head + n) % cap;
        self.pending = 0;
        self.draining += n;
        first
    }

    /// Release `n` bytes the drain thread finished with
    pub fn release(&mut self, n: usize) {
        debug_assert!(n <= self.draining);
        self.draining -= n;
        self.delivered += n as u64;
    }
}
