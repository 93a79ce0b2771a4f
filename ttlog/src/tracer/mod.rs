//! The public surface of the observability core (spec.md §4.5): `start`,
//! `stop`, `cancel`, `gauge`, `emit_metrics`. Owns every buffer and table
//! in the crate, drives the aggregator and the emitter, and writes
//! Chrome-trace JSON spans to an optional sink. Every method here runs
//! synchronously to completion on the host's single logical thread
//! (spec.md §5) — there is no locking anywhere in this module.

mod __test__;

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::time::Instant;

use crate::aggregate::Aggregator;
use crate::buf::BoundedBuf;
use crate::clock::{Clock, SystemClock};
use crate::emit::{EmitError, Emitter, LogIo, UdpIo};
use crate::format::{avg_us, LineTags, Sample, StatKind};
use crate::schema::{self, FieldValue, GaugeEvent, SpanEvent, SpanTag};
use crate::trace_sink::TraceSink;

/// Scratch-buffer capacity for one formatted Chrome-trace JSON object
/// (spec.md §3: `trace_span_size_max = 1024`).
pub const TRACE_SPAN_SIZE_MAX: usize = 1024;

/// Which transport `emit_metrics` should use, matching spec.md §6's
/// "statsd_options" configuration knob.
pub enum StatsdOptions {
  /// Format and log lines instead of sending them — deterministic, used by
  /// tests and the simulator harness.
  Log,
  /// Send over a connected UDP socket bound to `bind`, dialed to `remote`.
  Udp { bind: SocketAddr, remote: SocketAddr },
}

impl Default for StatsdOptions {
  fn default() -> Self {
    StatsdOptions::Log
  }
}

/// Construction parameters grouped into one struct, the way the wider
/// retrieval pack groups its collector options rather than taking a long
/// positional argument list.
pub struct TracerConfig {
  /// Trace sink; absent means `start`/`stop`/`cancel` still validate
  /// invariants and update aggregates, but emit no JSON (spec.md §6).
  pub writer: Option<Box<dyn TraceSink>>,
  pub statsd: StatsdOptions,
  pub cluster: u128,
  pub replica: u8,
}

impl Default for TracerConfig {
  fn default() -> Self {
    Self { writer: None, statsd: StatsdOptions::default(), cluster: 0, replica: 0 }
  }
}

/// Either shipped `DatagramIo`, picked once at `init` from `TracerConfig`.
enum StatsdTransport {
  Log(Emitter<LogIo>),
  Udp(Emitter<UdpIo>),
}

impl StatsdTransport {
  fn emit<'a>(
    &mut self,
    gauges: impl Iterator<Item = Sample<'a>>,
    timings: impl Iterator<Item = Sample<'a>>,
    tags: LineTags,
  ) -> Result<(), EmitError> {
    match self {
      StatsdTransport::Log(e) => e.emit(gauges, timings, tags),
      StatsdTransport::Udp(e) => e.emit(gauges, timings, tags),
    }
  }

  #[cfg(test)]
  fn executing(&self) -> usize {
    match self {
      StatsdTransport::Log(e) => e.executing(),
      StatsdTransport::Udp(e) => e.executing(),
    }
  }

  #[cfg(test)]
  fn reserve_all_completions_for_test(&self) -> Vec<u8> {
    match self {
      StatsdTransport::Log(e) => e.reserve_all_completions_for_test(),
      StatsdTransport::Udp(e) => e.reserve_all_completions_for_test(),
    }
  }

  #[cfg(test)]
  fn release_for_test(&self, handles: Vec<u8>) {
    match self {
      StatsdTransport::Log(e) => e.release_for_test(handles),
      StatsdTransport::Udp(e) => e.release_for_test(handles),
    }
  }
}

/// Owns every buffer and table the core needs: per-stack start instants,
/// the gauge/timing aggregate tables, the trace scratch buffer, and the
/// emitter (which in turn owns the send buffer and completion pool).
pub struct Tracer<C: Clock = SystemClock> {
  clock: C,
  time_start: Instant,
  events_started: Box<[Option<Instant>]>,
  aggregator: Aggregator,
  writer: Option<Box<dyn TraceSink>>,
  span_buf: BoundedBuf,
  statsd: StatsdTransport,
  cluster: u128,
  replica: u8,
}

impl Tracer<SystemClock> {
  /// Opens/connects the configured transport, allocates every table and
  /// buffer, and writes the opening `"[\n"` to the trace sink if present
  /// (spec.md §3, "Lifecycle").
  pub fn init(config: TracerConfig) -> std::io::Result<Self> {
    Self::init_with_clock(config, SystemClock)
  }
}

impl<C: Clock> Tracer<C> {
  pub fn init_with_clock(config: TracerConfig, clock: C) -> std::io::Result<Self> {
    let statsd = match config.statsd {
      StatsdOptions::Log => StatsdTransport::Log(Emitter::new(LogIo)),
      StatsdOptions::Udp { bind, remote } => StatsdTransport::Udp(Emitter::new(UdpIo::connect(bind, remote)?)),
    };
    let mut writer = config.writer;
    if let Some(w) = writer.as_mut() {
      w.write_all(b"[\n");
    }
    let time_start = clock.now();
    Ok(Self {
      clock,
      time_start,
      events_started: vec![None; schema::STACK_COUNT].into_boxed_slice(),
      aggregator: Aggregator::new(),
      writer,
      span_buf: BoundedBuf::new(TRACE_SPAN_SIZE_MAX),
      statsd,
      cluster: config.cluster,
      replica: config.replica,
    })
  }

  fn micros_since_start(&self, at: Instant) -> u64 {
    at.duration_since(self.time_start).as_micros() as u64
  }

  /// Appends one Chrome-trace JSON object followed by `",\n"`. Drops the
  /// span with a log if it would overflow the 1024-byte scratch buffer —
  /// the write is all-or-nothing, so a failure never leaves a partial
  /// object in the sink (spec.md §4.5 step 4, §7 "Budget exhaustion
  /// (run-time)").
  fn append_span(&mut self, json: serde_json::Value) {
    let Some(writer) = self.writer.as_mut() else { return };
    self.span_buf.clear();
    let fits = (|| -> std::fmt::Result {
      write!(self.span_buf, "{json}")?;
      write!(self.span_buf, ",\n")
    })()
    .is_ok();
    if fits {
      writer.write_all(self.span_buf.as_bytes());
    } else {
      eprintln!("[tracer] span dropped: exceeds {TRACE_SPAN_SIZE_MAX}-byte scratch buffer");
    }
  }

  fn begin_span(&mut self, event: SpanEvent, stack: u32, now: Instant) {
    if self.writer.is_some() {
      let ts = self.micros_since_start(now);
      let tag = event.tag();
      let name = format!("{} stack={} timing={}", tag.name(), stack, event.timing_slot());
      let json = serde_json::json!({
        "pid": self.replica,
        "tid": stack,
        "cat": tag.name(),
        "ph": "B",
        "ts": ts,
        "name": name,
        "args": event.to_json(),
      });
      self.append_span(json);
    }
    eprintln!("[tracer] start {} stack={}", event.tag().name(), stack);
  }

  fn end_span(&mut self, stack: u32, now: Instant) {
    if self.writer.is_some() {
      let ts = self.micros_since_start(now);
      let json = serde_json::json!({ "pid": self.replica, "tid": stack, "ph": "E", "ts": ts });
      self.append_span(json);
    }
  }

  fn log_stop(&self, tag: SpanTag, stack: u32, duration: std::time::Duration) {
    let micros = duration.as_micros() as u64;
    if micros >= 5_000 {
      eprintln!("[tracer] stop {} stack={} {:.3}ms", tag.name(), stack, micros as f64 / 1_000.0);
    } else {
      eprintln!("[tracer] stop {} stack={} {micros}us", tag.name(), stack);
    }
  }

  /// Starts one span. Panics if this stack slot is already running —
  /// concurrent starts of the same `(tag, discriminant)` are a caller bug,
  /// not an environmental condition (spec.md §4.5, §7).
  pub fn start(&mut self, event: SpanEvent) {
    let s = event.stack();
    assert!(
      self.events_started[s as usize].is_none(),
      "start called on stack {s} ({}) while already running",
      event.tag().name()
    );
    let now = self.clock.now();
    self.events_started[s as usize] = Some(now);
    self.begin_span(event, s, now);
  }

  /// Stops one span. Panics if this stack slot is idle (spec.md §4.5, §7).
  pub fn stop(&mut self, event: SpanEvent) {
    let s = event.stack();
    let start = self.events_started[s as usize].take().unwrap_or_else(|| {
      panic!("stop called on stack {s} ({}) while idle", event.tag().name())
    });
    let now = self.clock.now();
    let duration = now.duration_since(start);
    self.aggregator.timing(event, duration.as_micros() as u64);
    self.end_span(s, now);
    self.log_stop(event.tag(), s, duration);
  }

  /// Ends every in-flight stack for `tag` without updating the timing
  /// aggregate (spec.md §9 Open Question: the reference behaviour records
  /// the phase-E trace event but does not feed the duration into the
  /// aggregator; see DESIGN.md). A no-op if nothing for `tag` is running.
  pub fn cancel(&mut self, tag: SpanTag) {
    let base = schema::STACK_BASES[tag.index()];
    let limit = tag.stack_limit();
    for s in base..base + limit {
      if self.events_started[s].take().is_some() {
        let now = self.clock.now();
        self.end_span(s as u32, now);
        eprintln!("[tracer] cancel {} stack={s}", tag.name());
      }
    }
  }

  /// Last-write-wins gauge update (spec.md §4.4). Never touches a stack.
  pub fn gauge(&mut self, event: GaugeEvent, value: u64) {
    self.aggregator.gauge(event, value);
  }

  /// Snapshots the current aggregate tables into owned `Sample`s, in the
  /// order spec.md §5 requires: gauges in slot order, then timings in slot
  /// order, five lines per timing in `[min, max, avg, sum, count]` order.
  fn collect_samples(&self) -> (Vec<(&'static str, u64, Vec<(&'static str, FieldValue)>)>, Vec<(&'static str, StatKind, u64, Vec<(&'static str, FieldValue)>)>) {
    let gauges = self
      .aggregator
      .gauges()
      .iter()
      .flatten()
      .map(|g| (g.event.name(), g.value, g.event.fields()))
      .collect();

    let mut timings = Vec::new();
    for t in self.aggregator.timings().iter().flatten() {
      let name = t.event.tag().name();
      let fields = t.event.fields();
      let avg = avg_us(t.duration_sum_us, t.count);
      timings.push((name, StatKind::Min, t.duration_min_us, fields.clone()));
      timings.push((name, StatKind::Max, t.duration_max_us, fields.clone()));
      timings.push((name, StatKind::Avg, avg, fields.clone()));
      timings.push((name, StatKind::Sum, t.duration_sum_us, fields.clone()));
      timings.push((name, StatKind::Count, t.count, fields));
    }
    (gauges, timings)
  }

  /// Wraps `statsd.emit` inside `start(.metrics_emit)`/`stop(.metrics_emit)`
  /// so the cost of emission is itself observable (spec.md §4.5).
  ///
  /// Ordering subtlety (see DESIGN.md): on success, `.metrics_emit`'s own
  /// duration is not folded into the timing aggregate — it is already
  /// observable via its phase-B/phase-E trace spans, and invariant 2
  /// (spec.md §8: every slot `None` after a successful `emit_metrics`)
  /// leaves no slot for it to survive in. On `Busy`, the aggregator is left
  /// completely untouched (spec.md §8 invariant 3) — the `.metrics_emit`
  /// stack is simply closed out like a `cancel`, without a timing sample.
  pub fn emit_metrics(&mut self) -> Result<(), EmitError> {
    self.start(SpanEvent::MetricsEmit);

    let (gauges, timings) = self.collect_samples();
    let gauge_samples =
      gauges.iter().map(|(name, value, fields)| Sample::Gauge { name: *name, value: *value, fields });
    let timing_samples = timings
      .iter()
      .map(|(name, kind, value, fields)| Sample::Timing { name: *name, kind: *kind, value: *value, fields });
    let tags = LineTags { cluster: self.cluster, replica: self.replica };
    let result = self.statsd.emit(gauge_samples, timing_samples, tags);

    let s = SpanEvent::MetricsEmit.stack();
    let start = self.events_started[s as usize]
      .take()
      .expect("metrics_emit stack must still be running here");
    let now = self.clock.now();
    self.end_span(s, now);

    match result {
      Ok(()) => {
        self.aggregator.clear();
        let duration = now.duration_since(start);
        self.log_stop(SpanTag::MetricsEmit, s, duration);
        Ok(())
      }
      Err(EmitError::Busy) => {
        eprintln!("[tracer] emit_metrics busy: prior emission still draining, aggregates preserved");
        Err(EmitError::Busy)
      }
    }
  }

  #[cfg(test)]
  pub(crate) fn aggregator(&self) -> &Aggregator {
    &self.aggregator
  }

  #[cfg(test)]
  pub(crate) fn reserve_all_completions_for_test(&self) -> Vec<u8> {
    self.statsd.reserve_all_completions_for_test()
  }

  #[cfg(test)]
  pub(crate) fn release_for_test(&self, handles: Vec<u8>) {
    self.statsd.release_for_test(handles)
  }
}
