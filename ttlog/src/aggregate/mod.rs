//! Gauge and timing slot tables. Plain arrays indexed by the schema's flat
//! slots — no locking, because nothing but the tracer's single logical
//! thread ever touches them (spec.md §5).


use crate::schema::{GaugeEvent, SpanEvent, METRIC_SLOT_COUNT, TIMING_SLOT_COUNT};

#[derive(Debug, Clone, Copy)]
pub struct GaugeAggregate {
  pub event: GaugeEvent,
  pub value: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct TimingAggregate {
  pub event: SpanEvent,
  pub duration_min_us: u64,
  pub duration_max_us: u64,
  pub duration_sum_us: u64,
  pub count: u64,
}

pub struct Aggregator {
  gauges: Box<[Option<GaugeAggregate>]>,
  timings: Box<[Option<TimingAggregate>]>,
}

impl Aggregator {
  pub fn new() -> Self {
    Self {
      gauges: vec![None; METRIC_SLOT_COUNT].into_boxed_slice(),
      timings: vec![None; TIMING_SLOT_COUNT].into_boxed_slice(),
    }
  }

  /// Last write wins — no aggregation.
  pub fn gauge(&mut self, event: GaugeEvent, value: u64) {
    self.gauges[event.slot() as usize] = Some(GaugeAggregate { event, value });
  }

  /// `min`/`max`/`sum` (saturating) / `count` (saturating) reduction over a
  /// stream of duration samples sharing `event`'s timing slot.
  pub fn timing(&mut self, event: SpanEvent, duration_us: u64) {
    let slot = &mut self.timings[event.timing_slot() as usize];
    match slot {
      Some(existing) => {
        existing.duration_min_us = existing.duration_min_us.min(duration_us);
        existing.duration_max_us = existing.duration_max_us.max(duration_us);
        existing.duration_sum_us = existing.duration_sum_us.saturating_add(duration_us);
        existing.count = existing.count.saturating_add(1);
      }
      None => {
        *slot = Some(TimingAggregate {
          event,
          duration_min_us: duration_us,
          duration_max_us: duration_us,
          duration_sum_us: duration_us,
          count: 1,
        });
      }
    }
  }

  pub fn gauges(&self) -> &[Option<GaugeAggregate>] {
    &self.gauges
  }

  pub fn timings(&self) -> &[Option<TimingAggregate>] {
    &self.timings
  }

  /// Reset contract: called after a successful `emit_metrics` so aggregation
  /// windows never span emissions.
  pub fn clear(&mut self) {
    for slot in self.gauges.iter_mut() {
      *slot = None;
    }
    for slot in self.timings.iter_mut() {
      *slot = None;
    }
  }
}

impl Default for Aggregator {
  fn default() -> Self {
    Self::new()
  }
}
