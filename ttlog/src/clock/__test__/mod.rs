#[cfg(test)]
mod __test__ {
  use crate::clock::{Clock, SimClock};
  use std::time::Duration;

  #[test]
  fn sim_clock_only_moves_on_advance() {
    let clock = SimClock::new();
    let t0 = clock.now();
    let t1 = clock.now();
    assert_eq!(t0, t1);
    clock.advance(Duration::from_micros(500));
    let t2 = clock.now();
    assert_eq!(t2.duration_since(t0), Duration::from_micros(500));
  }

  #[test]
  fn sim_clock_advances_are_cumulative() {
    let clock = SimClock::new();
    let t0 = clock.now();
    clock.advance(Duration::from_micros(100));
    clock.advance(Duration::from_micros(250));
    assert_eq!(clock.now().duration_since(t0), Duration::from_micros(350));
  }
}
