//! Observability core for a distributed database replica: per-event Chrome
//! trace spans plus gauge/timing aggregates emitted as StatsD datagrams.
//!
//! Five layers, leaves first: [`schema`] (the closed event catalogue),
//! [`format`] (one metric sample to one StatsD line), [`emit`] (datagram
//! packing and dispatch through an injected [`emit::DatagramIo`]),
//! [`aggregate`] (the gauge/timing slot tables), and [`tracer`] (the public
//! façade — `start`/`stop`/`cancel`/`gauge`/`emit_metrics`).

pub mod aggregate;
pub mod buf;
pub mod clock;
pub mod emit;
pub mod format;
pub mod schema;
pub mod trace_sink;
pub mod tracer;

pub use clock::{Clock, SimClock, SystemClock};
pub use schema::{CommitStage, GaugeEvent, SpanEvent, SpanTag, Tree};
pub use tracer::{StatsdOptions, Tracer, TracerConfig};
