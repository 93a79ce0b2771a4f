//! An append-only byte writer for the Chrome-trace stream (spec.md §6,
//! "Trace sink (produced)"). Two implementations ship here, mirroring the
//! teacher's own file-backed vs. stdout-backed `LogListener` split: a
//! `Vec<u8>`-backed sink for tests and a thin `FileTraceSink` opened in
//! append mode, grounded in `FileListener::new`'s
//! `OpenOptions::new().create(true).append(true)`.

mod __test__;

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Accepts raw bytes, never closes, never seeks. The tracer never checks
/// for write failures beyond logging them — a broken trace sink must not
/// be allowed to take down the host (spec.md §1: "the core is the hard
/// part", not the sink).
pub trait TraceSink {
  fn write_all(&mut self, bytes: &[u8]);
}

/// In-memory sink, the one production code never ships but every test in
/// this crate uses to assert on the exact JSON stream produced.
#[derive(Debug, Default)]
pub struct VecTraceSink {
  buf: Vec<u8>,
}

impl VecTraceSink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.buf
  }

  pub fn as_str(&self) -> &str {
    std::str::from_utf8(&self.buf).expect("trace sink only ever receives UTF-8 JSON text")
  }
}

impl TraceSink for VecTraceSink {
  fn write_all(&mut self, bytes: &[u8]) {
    self.buf.extend_from_slice(bytes);
  }
}

/// Append-only file sink for production use.
pub struct FileTraceSink {
  file: std::fs::File,
}

impl FileTraceSink {
  pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Self { file })
  }
}

impl TraceSink for FileTraceSink {
  fn write_all(&mut self, bytes: &[u8]) {
    if let Err(err) = self.file.write_all(bytes) {
      eprintln!("[tracer] trace sink write failed: {err}");
    }
  }
}
