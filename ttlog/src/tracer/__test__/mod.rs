#[cfg(test)]
mod __test__ {
  use crate::clock::SimClock;
  use crate::emit::EmitError;
  use crate::schema::{CommitStage, GaugeEvent, SpanEvent, SpanTag, Tree};
  use crate::trace_sink::{TraceSink, VecTraceSink};
  use crate::tracer::{Tracer, TracerConfig};

  fn tracer_with_sink() -> Tracer<SimClock> {
    let config = TracerConfig { writer: Some(Box::new(VecTraceSink::new())), ..Default::default() };
    Tracer::init_with_clock(config, SimClock::new()).unwrap()
  }

  #[test]
  fn start_then_stop_records_one_timing_sample() {
    let mut tracer = tracer_with_sink();
    tracer.start(SpanEvent::ReplicaAofWrite);
    tracer.stop(SpanEvent::ReplicaAofWrite);
    let slot = SpanEvent::ReplicaAofWrite.timing_slot() as usize;
    let t = tracer.aggregator().timings()[slot].unwrap();
    assert_eq!(t.count, 1);
  }

  #[test]
  #[should_panic(expected = "already running")]
  fn start_while_running_panics() {
    let mut tracer = tracer_with_sink();
    tracer.start(SpanEvent::ReplicaAofWrite);
    tracer.start(SpanEvent::ReplicaAofWrite);
  }

  #[test]
  #[should_panic(expected = "while idle")]
  fn stop_while_idle_panics() {
    let mut tracer = tracer_with_sink();
    tracer.stop(SpanEvent::ReplicaAofWrite);
  }

  #[test]
  fn cancel_clears_the_slot_without_touching_the_timing_aggregate() {
    let mut tracer = tracer_with_sink();
    tracer.start(SpanEvent::IoRead { request: 3 });
    tracer.cancel(SpanTag::IoRead);
    // The stack is idle again: starting it fresh must not panic.
    tracer.start(SpanEvent::IoRead { request: 3 });
    tracer.stop(SpanEvent::IoRead { request: 3 });
    let slot = SpanEvent::IoRead { request: 3 }.timing_slot() as usize;
    let t = tracer.aggregator().timings()[slot].unwrap();
    // Only the second (stopped) instance contributed a sample.
    assert_eq!(t.count, 1);
  }

  #[test]
  fn cancel_with_nothing_running_is_a_no_op() {
    let mut tracer = tracer_with_sink();
    tracer.cancel(SpanTag::CompactBeat);
    tracer.start(SpanEvent::CompactBeat { tree: Tree::AccountId, level_b: 0 });
    tracer.stop(SpanEvent::CompactBeat { tree: Tree::AccountId, level_b: 0 });
  }

  #[test]
  fn gauge_is_last_write_wins_through_the_facade() {
    let mut tracer = tracer_with_sink();
    let e = GaugeEvent::CacheHits { tree: Tree::AccountLedger };
    tracer.gauge(e, 10);
    tracer.gauge(e, 20);
    let slot = e.slot() as usize;
    assert_eq!(tracer.aggregator().gauges()[slot].unwrap().value, 20);
  }

  #[test]
  fn emit_metrics_ok_clears_both_tables() {
    let mut tracer = tracer_with_sink();
    tracer.gauge(GaugeEvent::CacheHits { tree: Tree::AccountId }, 42);
    tracer.start(SpanEvent::ReplicaAofWrite);
    tracer.stop(SpanEvent::ReplicaAofWrite);

    tracer.emit_metrics().unwrap();

    assert!(tracer.aggregator().gauges().iter().all(|s| s.is_none()));
    assert!(tracer.aggregator().timings().iter().all(|s| s.is_none()));
  }

  #[test]
  fn emit_metrics_busy_preserves_both_tables_exactly() {
    let mut tracer = tracer_with_sink();
    tracer.gauge(GaugeEvent::CacheHits { tree: Tree::AccountId }, 7);
    tracer.start(SpanEvent::ReplicaAofWrite);
    tracer.stop(SpanEvent::ReplicaAofWrite);

    let handles = tracer.reserve_all_completions_for_test();
    let result = tracer.emit_metrics();
    assert_eq!(result, Err(EmitError::Busy));

    let gauge_slot = GaugeEvent::CacheHits { tree: Tree::AccountId }.slot() as usize;
    assert_eq!(tracer.aggregator().gauges()[gauge_slot].unwrap().value, 7);
    let slot = SpanEvent::ReplicaAofWrite.timing_slot() as usize;
    assert_eq!(tracer.aggregator().timings()[slot].unwrap().count, 1);

    tracer.release_for_test(handles);
  }

  /// A sink that hands its bytes back out, used where the test needs to
  /// read the stream after writing to it (`VecTraceSink` is consumed into
  /// a `Box<dyn TraceSink>` by `TracerConfig`, so a plain local won't do).
  #[derive(Clone, Default)]
  struct SharedSink(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

  impl TraceSink for SharedSink {
    fn write_all(&mut self, bytes: &[u8]) {
      self.0.borrow_mut().extend_from_slice(bytes);
    }
  }

  #[test]
  fn json_trace_shape_matches_scenario_one() {
    let sink = SharedSink::default();
    let config = TracerConfig { writer: Some(Box::new(sink.clone())), ..Default::default() };
    let mut tracer = Tracer::init_with_clock(config, SimClock::new()).unwrap();

    tracer.start(SpanEvent::ReplicaCommit { stage: CommitStage::Idle, op: 123 });
    tracer.start(SpanEvent::CompactBeat { tree: Tree::AccountId, level_b: 1 });
    tracer.stop(SpanEvent::CompactBeat { tree: Tree::AccountId, level_b: 1 });
    tracer.stop(SpanEvent::ReplicaCommit { stage: CommitStage::Idle, op: 456 });

    let bytes = sink.0.borrow();
    let text = std::str::from_utf8(&bytes).unwrap();
    assert!(text.starts_with("[\n"));
    assert!(!text.contains(']'));

    let body = text.strip_prefix("[\n").unwrap();
    let lines: Vec<&str> = body.trim_end_matches(",\n").split(",\n").collect();
    assert_eq!(lines.len(), 4);

    let begin_commit: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(begin_commit["ph"], "B");
    assert_eq!(begin_commit["pid"], 0);
    assert_eq!(begin_commit["tid"], 0);
    assert_eq!(begin_commit["cat"], "replica_commit");
    assert_eq!(begin_commit["args"]["stage"], "idle");
    assert_eq!(begin_commit["args"]["op"], 123);

    let begin_compact: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(begin_compact["ph"], "B");
    assert_eq!(begin_compact["cat"], "compact_beat");
    let compact_stack = begin_compact["tid"].clone();
    assert_ne!(compact_stack, begin_commit["tid"]);

    let end_compact: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
    assert_eq!(end_compact["ph"], "E");
    assert_eq!(end_compact["tid"], compact_stack);
    assert!(end_compact.get("cat").is_none());
    assert!(end_compact.get("args").is_none());

    let end_commit: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
    assert_eq!(end_commit["ph"], "E");
    assert_eq!(end_commit["tid"], 0);
  }

  #[test]
  fn opening_bracket_is_written_exactly_once_at_init() {
    let sink = SharedSink::default();
    let config = TracerConfig { writer: Some(Box::new(sink.clone())), ..Default::default() };
    let tracer = Tracer::init_with_clock(config, SimClock::new()).unwrap();
    drop(tracer);
    assert_eq!(sink.0.borrow().as_slice(), b"[\n");
  }

  #[test]
  fn tracer_without_a_writer_still_updates_aggregates() {
    let mut tracer = Tracer::init_with_clock(TracerConfig::default(), SimClock::new()).unwrap();
    tracer.start(SpanEvent::ReplicaAofWrite);
    tracer.stop(SpanEvent::ReplicaAofWrite);
    let slot = SpanEvent::ReplicaAofWrite.timing_slot() as usize;
    assert_eq!(tracer.aggregator().timings()[slot].unwrap().count, 1);
  }
}
