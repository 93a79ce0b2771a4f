//! Turns one metric sample into one StatsD line. Pure function of
//! `(sample, cluster, replica)` — no I/O, no allocation beyond the caller's
//! buffer.


use std::fmt::Write as _;

use crate::buf::BoundedBuf;
use crate::schema::FieldValue;

/// Which of the five timing statistics a line reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
  Min,
  Max,
  Avg,
  Sum,
  Count,
}

impl StatKind {
  const fn suffix(self) -> &'static str {
    match self {
      StatKind::Min => "_us.min",
      StatKind::Max => "_us.max",
      StatKind::Avg => "_us.avg",
      StatKind::Sum => "_us.sum",
      StatKind::Count => "_us.count",
    }
  }

  const fn statsd_type(self) -> &'static str {
    match self {
      StatKind::Min | StatKind::Max | StatKind::Avg => "g",
      StatKind::Sum | StatKind::Count => "c",
    }
  }
}

/// A single value ready to be formatted: either a gauge sample or one of
/// the five timing statistics.
#[derive(Debug, Clone, Copy)]
pub enum Sample<'a> {
  Gauge { name: &'a str, value: u64, fields: &'a [(&'static str, FieldValue)] },
  Timing { name: &'a str, kind: StatKind, value: u64, fields: &'a [(&'static str, FieldValue)] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatError;

impl std::fmt::Display for FormatError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "no space left in line buffer")
  }
}

impl std::error::Error for FormatError {}

/// Identifying tags every line carries, independent of the sample.
#[derive(Debug, Clone, Copy)]
pub struct LineTags {
  pub cluster: u128,
  pub replica: u8,
}

/// Appends exactly one `\n`-terminated StatsD line to `sink`. Reserved field
/// names `cluster`/`replica` must never appear in `sample`'s own fields —
/// that invariant is enforced at schema build time, not here.
///
/// Returns `Err(FormatError)` ("no space left") without partially writing
/// past what `sink` can already hold; callers drop the sample and continue.
pub fn format_metric(sink: &mut BoundedBuf, sample: Sample<'_>, tags: LineTags) -> Result<(), FormatError> {
  let start_len = sink.len();
  let result = (|| -> std::fmt::Result {
    write!(sink, "tb.")?;
    match sample {
      Sample::Gauge { name, value, fields } => {
        write!(sink, "{name}:{value}|g")?;
        write_tags(sink, tags, fields)?;
      }
      Sample::Timing { name, kind, value, fields } => {
        write!(sink, "{name}{}:{value}|{}", kind.suffix(), kind.statsd_type())?;
        write_tags(sink, tags, fields)?;
      }
    }
    writeln!(sink)
  })();

  if result.is_err() {
    sink.truncate(start_len);
    return Err(FormatError);
  }
  Ok(())
}

fn write_tags(sink: &mut BoundedBuf, tags: LineTags, fields: &[(&'static str, FieldValue)]) -> std::fmt::Result {
  write!(sink, "|#cluster:{:032x},replica:{}", tags.cluster, tags.replica)?;
  for (name, value) in fields {
    debug_assert!(*name != "cluster" && *name != "replica", "reserved field name collides with a tag");
    match value {
      FieldValue::U8(v) => write!(sink, ",{name}:{v}")?,
      FieldValue::Tag(v) => write!(sink, ",{name}:{v}")?,
    }
  }
  Ok(())
}

/// `floor(sum / count)`, saturating-safe because both operands are `u64`
/// and `count >= 1` whenever an aggregate exists.
pub fn avg_us(sum: u64, count: u64) -> u64 {
  if count == 0 {
    0
  } else {
    sum / count
  }
}
