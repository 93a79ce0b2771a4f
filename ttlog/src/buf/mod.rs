//! A fixed-capacity byte buffer that genuinely runs out of space. Used for
//! the trace-span scratch buffer and the emitter's send buffer, both of
//! which have a hard capacity by design (`trace_span_size_max`,
//! `packet_count_max * 1400`).

mod __test__;

use std::fmt;

#[derive(Debug)]
pub struct BoundedBuf {
  data: Vec<u8>,
  capacity: usize,
}

impl BoundedBuf {
  pub fn new(capacity: usize) -> Self {
    Self { data: Vec::with_capacity(capacity), capacity }
  }

  pub fn clear(&mut self) {
    self.data.clear();
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn remaining(&self) -> usize {
    self.capacity - self.data.len()
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }

  /// Discards everything appended since `mark`, used to roll back a
  /// partially-written, over-budget line.
  pub fn truncate(&mut self, mark: usize) {
    self.data.truncate(mark);
  }

  pub fn push_byte(&mut self, b: u8) -> Result<(), ()> {
    if self.remaining() == 0 {
      return Err(());
    }
    self.data.push(b);
    Ok(())
  }
}

impl fmt::Write for BoundedBuf {
  fn write_str(&mut self, s: &str) -> fmt::Result {
    if s.len() > self.remaining() {
      return Err(fmt::Error);
    }
    self.data.extend_from_slice(s.as_bytes());
    Ok(())
  }
}
