//! Packs formatted StatsD lines into ≤1400-byte datagrams and hands them to
//! an injected `DatagramIo`, with bounded completion concurrency as the
//! sole backpressure signal. Fire-and-forget: a send failure is counted,
//! never retried.


use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

use crate::buf::BoundedBuf;
use crate::format::{format_metric, LineTags, Sample};
use crate::schema::{PACKET_COUNT_MAX, PACKET_SIZE_MAX};

pub type SendCallback = Box<dyn FnOnce(std::io::Result<()>) + Send>;

/// External async I/O collaborator, consumed only by contract (spec.md §6).
/// Both implementations below invoke `on_complete` inline; a real async
/// layer would invoke it later, from its own poll loop.
pub trait DatagramIo {
  fn send(&mut self, buf: &[u8], on_complete: SendCallback);
}

/// Sends each datagram over a pre-connected UDP socket.
pub struct UdpIo {
  socket: UdpSocket,
}

impl UdpIo {
  pub fn connect(bind: SocketAddr, remote: SocketAddr) -> std::io::Result<Self> {
    let socket = UdpSocket::bind(bind)?;
    socket.connect(remote)?;
    Ok(Self { socket })
  }
}

impl DatagramIo for UdpIo {
  fn send(&mut self, buf: &[u8], on_complete: SendCallback) {
    let result = self.socket.send(buf).map(|_| ());
    on_complete(result);
  }
}

/// "log" mode (spec.md §4.3): writes the datagram payload as a debug log
/// line instead of touching the network, for deterministic tests.
#[derive(Default)]
pub struct LogIo;

impl DatagramIo for LogIo {
  fn send(&mut self, buf: &[u8], on_complete: SendCallback) {
    let text = String::from_utf8_lossy(buf);
    for line in text.lines() {
      println!("[emit][log] {line}");
    }
    on_complete(Ok(()));
  }
}

/// Fixed-capacity free-list of completion handles. `crossbeam_queue`'s
/// `ArrayQueue` is the same lock-free primitive the ring buffer layer uses
/// for its bounded storage; here it holds small integer handles rather than
/// events.
pub struct CompletionPool {
  free: ArrayQueue<u8>,
  capacity: usize,
}

impl CompletionPool {
  pub fn new(capacity: usize) -> Self {
    assert!(capacity > 0 && capacity < 256, "completion pool capacity out of range");
    let free = ArrayQueue::new(capacity);
    for h in 0..capacity {
      free.push(h as u8).expect("freshly sized queue always accepts its own capacity");
    }
    Self { free, capacity }
  }

  pub fn acquire(&self) -> Option<u8> {
    self.free.pop()
  }

  pub fn release(&self, handle: u8) {
    let _ = self.free.push(handle);
  }

  /// Number of handles currently checked out.
  pub fn executing(&self) -> usize {
    self.capacity - self.free.len()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitError {
  /// A prior emission still has in-flight completions; this one is dropped
  /// entirely, not queued (spec.md §4.3 step 1).
  Busy,
}

impl std::fmt::Display for EmitError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      EmitError::Busy => write!(f, "busy: prior emission still draining"),
    }
  }
}

impl std::error::Error for EmitError {}

/// Boundaries of one formatted datagram inside `send_buffer`: `[start, end)`.
struct DatagramSpan {
  start: usize,
  end: usize,
}

/// Owns the send buffer and completion pool; `emit` is the one entry point.
///
/// `completions`/`send_errors` are `Arc`-wrapped so a completion callback —
/// which the `DatagramIo` contract requires to be `'static` because a real
/// async layer may invoke it long after `emit` returns — can hold its own
/// handle on them without borrowing `self`.
pub struct Emitter<Io: DatagramIo> {
  io: Io,
  send_buffer: BoundedBuf,
  completions: Arc<CompletionPool>,
  send_errors: Arc<AtomicUsize>,
}

impl<Io: DatagramIo> Emitter<Io> {
  pub fn new(io: Io) -> Self {
    Self {
      io,
      send_buffer: BoundedBuf::new(PACKET_COUNT_MAX * PACKET_SIZE_MAX),
      completions: Arc::new(CompletionPool::new(PACKET_COUNT_MAX)),
      send_errors: Arc::new(AtomicUsize::new(0)),
    }
  }

  /// Packs `gauges`/`timings` into datagrams and dispatches them. See
  /// spec.md §4.3 for the full algorithm; step numbers below match it.
  ///
  /// Generic over the samples' lifetime rather than pinned to `'static`:
  /// the tracer façade builds its `Sample`s from aggregate snapshots that
  /// only live for the duration of this call, and `format_metric` copies
  /// every byte it needs into `send_buffer` before returning, so nothing
  /// here is retained past the call.
  pub fn emit<'a>(
    &mut self,
    gauges: impl Iterator<Item = Sample<'a>>,
    timings: impl Iterator<Item = Sample<'a>>,
    tags: LineTags,
  ) -> Result<(), EmitError> {
    // Step 1: pre-flight busy check.
    if self.completions.executing() > 0 {
      return Err(EmitError::Busy);
    }

    // Step 2: log and reset the accumulated send-error counter.
    let prior_errors = self.send_errors.swap(0, Ordering::Relaxed);
    if prior_errors > 0 {
      eprintln!("[emit] {prior_errors} send error(s) since last successful emission");
    }

    // Step 3: format every line, sealing datagrams greedily by size.
    self.send_buffer.clear();
    let mut datagrams: Vec<DatagramSpan> = Vec::with_capacity(PACKET_COUNT_MAX);
    let mut current_start = 0usize;

    for sample in gauges.chain(timings) {
      let mark = self.send_buffer.len();
      match format_metric(&mut self.send_buffer, sample, tags) {
        Ok(()) => {}
        Err(_) => {
          // Preconditions guarantee every admissible line fits in an empty
          // datagram; this only fires if the current datagram is already
          // near-full. Seal it and retry once in a fresh datagram.
          if mark > current_start {
            datagrams.push(DatagramSpan { start: current_start, end: mark });
            current_start = mark;
          }
          if format_metric(&mut self.send_buffer, sample, tags).is_err() {
            eprintln!("[emit] dropping sample: no space left even in an empty datagram");
            self.send_buffer.truncate(mark);
          }
          continue;
        }
      }
      let end = self.send_buffer.len();
      if end - current_start > PACKET_SIZE_MAX {
        // This line pushed the datagram over budget; seal at `mark` and
        // start a new datagram containing just this line.
        datagrams.push(DatagramSpan { start: current_start, end: mark });
        current_start = mark;
      }
    }
    if self.send_buffer.len() > current_start {
      datagrams.push(DatagramSpan { start: current_start, end: self.send_buffer.len() });
    }

    // Step 4: dispatch each sealed datagram through the I/O layer.
    let bytes = self.send_buffer.as_bytes();
    for span in datagrams {
      let Some(handle) = self.completions.acquire() else {
        eprintln!("[emit] completion pool exhausted; dropping remaining datagrams this emission");
        break;
      };
      let payload = bytes[span.start..span.end].to_vec();
      let errors = Arc::clone(&self.send_errors);
      let pool = Arc::clone(&self.completions);
      let on_complete: SendCallback = Box::new(move |result| {
        if result.is_err() {
          errors.fetch_add(1, Ordering::Relaxed);
        }
        pool.release(handle);
      });
      self.io.send(&payload, on_complete);
    }

    Ok(())
  }

  pub fn executing(&self) -> usize {
    self.completions.executing()
  }

  #[cfg(test)]
  pub(crate) fn reserve_all_completions_for_test(&self) -> Vec<u8> {
    let mut handles = Vec::new();
    while let Some(h) = self.completions.acquire() {
      handles.push(h);
    }
    handles
  }

  #[cfg(test)]
  pub(crate) fn release_for_test(&self, handles: Vec<u8>) {
    for h in handles {
      self.completions.release(h);
    }
  }
}
