//! # Asynchronous Ring Buffer
//!
//! Decouples the instrumented producer from downstream I/O. The producer copies
//! bytes into a fixed-capacity ring and returns; a dedicated drain thread moves
//! them into the wrapped [`ByteSink`].
//!
//! ## Threads and Waiting
//!
//! ```text
//!  producer ── write() ──▶ ┌──────────── Ring ────────────┐ ──▶ drain thread ──▶ sink
//!                          │ pending │ draining │  free    │
//!                          └──────────────────────────────┘
//!   waits on `space`       (one Mutex, three Condvars)      waits on `data`
//!   flush() waits on `delivered`
//! ```
//!
//! - `write()` blocks while there is not enough free space for the next chunk.
//! - The drain thread blocks while nothing is pending.
//! - `flush()` blocks until everything submitted so far has been delivered.
//!
//! Shutdown moves the state from `Running` to `Closing` and wakes everyone; the
//! drain thread empties the ring, flushes the sink and exits, after which the
//! state is `Closed`. There is no discard path: dropping the buffer always
//! delivers every accepted byte first.
//!
//! If the drain thread dies (a panicking sink), its exit guard marks the sink
//! failed, moves the state to `Closing` and wakes every waiter, so a blocked
//! `write()` returns a short count and a blocked `flush()` returns.
//!
//! ## Ordering
//!
//! One producer (`write` takes `&mut self`) and one consumer, so bytes reach
//! the sink in exactly the order they were submitted, and a single `write`
//! call is never interleaved with anything else.

mod state;

pub use state::RingState;

use log::{debug, error, info};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::sink::ByteSink;
use state::Ring;

/// Default ring capacity used by capture sessions (1 MiB)
pub const DEFAULT_RING_CAPACITY: usize = 1 << 20;

struct Shared {
    ring: Mutex<Ring>,
    /// Signalled when free space grows
    space: Condvar,
    /// Signalled when bytes become pending or shutdown starts
    data: Condvar,
    /// Signalled when the delivered count advances
    delivered: Condvar,
}

/// Bounded single-producer byte queue drained into a sink by its own thread
pub struct AsyncRingBuffer<S: ByteSink + Send + 'static> {
    shared: Arc<Shared>,
    drain: Option<JoinHandle<S>>,
    capacity: usize,
}

impl<S: ByteSink + Send + 'static> AsyncRingBuffer<S> {
    /// Wrap `sink` behind a ring of `capacity` bytes
    ///
    /// # Panics
    /// Panics if `capacity` is zero or the drain thread cannot be spawned.
    pub fn new(sink: S, capacity: usize) -> Self {
        let shared = Arc::new(Shared {
            ring: Mutex::new(Ring::new(capacity)),
            space: Condvar::new(),
            data: Condvar::new(),
            delivered: Condvar::new(),
        });

        let worker = Arc::clone(&shared);
        let drain = thread::Builder::new()
            .name("tracecap-drain".to_string())
            .spawn(move || drain_loop(&worker, sink))
            .unwrap_or_else(|e| panic!("failed to spawn ring drain thread: {e}"));

        debug!("Ring buffer started ({capacity} bytes)");
        Self {
            shared,
            drain: Some(drain),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> RingState {
        self.shared.ring.lock().state
    }

    /// Whether the sink has reported a short write
    #[must_use]
    pub fn sink_failed(&self) -> bool {
        self.shared.ring.lock().sink_failed
    }

    /// Total bytes accepted so far
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.shared.ring.lock().submitted
    }

    /// Queue `data` for the sink, blocking while the ring is full
    ///
    /// Large writes are split into chunks of at most `capacity` bytes. Returns
    /// the number of bytes accepted: all of them, unless the sink has already
    /// failed, in which case the remaining chunks are refused.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let mut accepted = 0;
        let mut ring = self.shared.ring.lock();
        debug_assert_ne!(ring.state, RingState::Closed, "write into a closed ring buffer");

        for chunk in data.chunks(self.capacity) {
            while ring.free() < chunk.len() && !ring.sink_failed {
                self.shared.space.wait(&mut ring);
            }
            if ring.sink_failed {
                break;
            }
            ring.push(chunk);
            accepted += chunk.len();
            self.shared.data.notify_one();
        }
        accepted
    }

    /// Block until every byte submitted so far has reached the sink
    ///
    /// The ring stays open. When the drain thread goes idle it also flushes
    /// the sink, so a buffered sink has pushed the bytes downstream too.
    /// Returns early if the drain thread has died.
    pub fn flush(&self) {
        let mut ring = self.shared.ring.lock();
        let target = ring.submitted;
        while ring.delivered < target && !ring.drain_exited {
            self.shared.delivered.wait(&mut ring);
        }
    }

    /// Drain everything, stop the drain thread and hand back the sink
    ///
    /// # Panics
    /// Re-raises a panic from the drain thread.
    pub fn close(mut self) -> S {
        match self.shutdown() {
            Some(Ok(sink)) => sink,
            Some(Err(panic)) => std::panic::resume_unwind(panic),
            None => unreachable!("drain thread is only joined once"),
        }
    }

    fn shutdown(&mut self) -> Option<thread::Result<S>> {
        let handle = self.drain.take()?;
        {
            let mut ring = self.shared.ring.lock();
            ring.state = RingState::Closing;
            self.shared.data.notify_all();
        }

        let joined = handle.join();

        let mut ring = self.shared.ring.lock();
        ring.state = RingState::Closed;
        info!(
            "Ring buffer closed: {} bytes submitted, {} delivered",
            ring.submitted, ring.delivered
        );
        Some(joined)
    }
}

impl<S: ByteSink + Send + 'static> Drop for AsyncRingBuffer<S> {
    fn drop(&mut self) {
        if let Some(Err(_)) = self.shutdown() {
            error!("Ring drain thread panicked; buffered bytes may be lost");
        }
    }
}

impl<S: ByteSink + Send + 'static> ByteSink for AsyncRingBuffer<S> {
    fn write(&mut self, bytes: &[u8]) -> usize {
        AsyncRingBuffer::write(self, bytes)
    }

    fn flush(&mut self) -> bool {
        AsyncRingBuffer::flush(self);
        !self.sink_failed()
    }
}

/// Wakes every waiter when the drain thread exits, by return or by unwind
struct DrainExit<'a> {
    shared: &'a Shared,
}

impl Drop for DrainExit<'_> {
    fn drop(&mut self) {
        let mut ring = self.shared.ring.lock();
        if thread::panicking() {
            error!("Ring drain thread panicked; discarding the rest of the stream");
            ring.sink_failed = true;
            if ring.state == RingState::Running {
                ring.state = RingState::Closing;
            }
        }
        ring.drain_exited = true;
        self.shared.space.notify_all();
        self.shared.delivered.notify_all();
    }
}

fn drain_loop<S: ByteSink>(shared: &Shared, mut sink: S) -> S {
    let _exit = DrainExit { shared };
    let mut batch = Vec::new();

    loop {
        let split = {
            let mut ring = shared.ring.lock();
            while ring.pending() == 0 && ring.state == RingState::Running {
                shared.data.wait(&mut ring);
            }
            if ring.pending() == 0 {
                break;
            }
            ring.take_pending(&mut batch)
        };

        let ok = deliver(&mut sink, &batch[..split]) && deliver(&mut sink, &batch[split..]);

        let idle = shared.ring.lock().pending() == 0;
        let flushed = !idle || sink.flush();

        let mut ring = shared.ring.lock();
        if !(ok && flushed) && !ring.sink_failed {
            error!("Sink stopped accepting bytes; discarding the rest of the stream");
            ring.sink_failed = true;
        }
        ring.release(batch.len());
        shared.space.notify_one();
        shared.delivered.notify_all();
    }

    sink.flush();
    sink
}

/// Hand `bytes` to the sink; false on a short write
fn deliver<S: ByteSink>(sink: &mut S, bytes: &[u8]) -> bool {
    bytes.is_empty() || sink.write(bytes) == bytes.len()
}
