//! Closed event catalogue for the replica's observability core.
//!
//! Every event the tracer knows about is enumerated here. There is no open
//! polymorphism: adding an event means adding a variant and recomputing the
//! derived constants below, which is what makes the whole layer checkable
//! at compile time (see the `const _: () = { ... }` block at the bottom).


/// LSM-forest column family a tree-scoped event is reporting on.
///
/// The Rust identifier and the wire tag name are deliberately different:
/// `tag_name()` returns the dotted display form StatsD consumers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tree {
  AccountId,
  AccountUserData128,
  AccountUserData64,
  AccountLedger,
  TransferId,
  TransferAmount,
}

impl Tree {
  pub const COUNT: usize = 6;
  pub const ALL: [Tree; Tree::COUNT] = [
    Tree::AccountId,
    Tree::AccountUserData128,
    Tree::AccountUserData64,
    Tree::AccountLedger,
    Tree::TransferId,
    Tree::TransferAmount,
  ];

  pub const fn tag_name(self) -> &'static str {
    match self {
      Tree::AccountId => "Account.id",
      Tree::AccountUserData128 => "Account.user_data_128",
      Tree::AccountUserData64 => "Account.user_data_64",
      Tree::AccountLedger => "Account.ledger",
      Tree::TransferId => "Transfer.id",
      Tree::TransferAmount => "Transfer.amount",
    }
  }

  pub const fn index(self) -> usize {
    self as usize
  }

  /// Longest `tag_name()` across all variants, used by the build-time
  /// line-size computation below.
  pub const fn max_tag_name_len() -> usize {
    let mut max = 0;
    let mut i = 0;
    while i < Tree::COUNT {
      let len = Tree::ALL[i].tag_name().len();
      if len > max {
        max = len;
      }
      i += 1;
    }
    max
  }
}

/// Stage of a replica commit, used purely to bucket its timing aggregate —
/// only one commit is ever in flight, so it does not widen the stack count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStage {
  Idle,
  Prepare,
  Replicate,
  Commit,
}

impl CommitStage {
  pub const COUNT: usize = 4;
  pub const ALL: [CommitStage; CommitStage::COUNT] = [
    CommitStage::Idle,
    CommitStage::Prepare,
    CommitStage::Replicate,
    CommitStage::Commit,
  ];

  pub const fn tag_name(self) -> &'static str {
    match self {
      CommitStage::Idle => "idle",
      CommitStage::Prepare => "prepare",
      CommitStage::Replicate => "replicate",
      CommitStage::Commit => "commit",
    }
  }

  pub const fn index(self) -> usize {
    self as usize
  }

  pub const fn max_tag_name_len() -> usize {
    let mut max = 0;
    let mut i = 0;
    while i < CommitStage::COUNT {
      let len = CommitStage::ALL[i].tag_name().len();
      if len > max {
        max = len;
      }
      i += 1;
    }
    max
  }
}

/// Number of LSM levels a compaction beat can target.
pub const LEVEL_COUNT: usize = 4;
/// Number of concurrent IO requests the replica may have outstanding.
pub const IO_REQUEST_COUNT: usize = 8;

/// Identity of a span-producing event, independent of its payload. Used to
/// address `stack_bases`/`stack_limits` and to drive `cancel(tag)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanTag {
  ReplicaCommit,
  CompactBeat,
  ReplicaAofWrite,
  IoRead,
  MetricsEmit,
}

impl SpanTag {
  pub const COUNT: usize = 5;
  pub const ALL: [SpanTag; SpanTag::COUNT] = [
    SpanTag::ReplicaCommit,
    SpanTag::CompactBeat,
    SpanTag::ReplicaAofWrite,
    SpanTag::IoRead,
    SpanTag::MetricsEmit,
  ];

  pub const fn name(self) -> &'static str {
    match self {
      SpanTag::ReplicaCommit => "replica_commit",
      SpanTag::CompactBeat => "compact_beat",
      SpanTag::ReplicaAofWrite => "replica_aof_write",
      SpanTag::IoRead => "io_read",
      SpanTag::MetricsEmit => "metrics_emit",
    }
  }

  pub const fn index(self) -> usize {
    self as usize
  }

  /// Number of concurrently addressable stacks for this tag.
  pub const fn stack_limit(self) -> usize {
    match self {
      SpanTag::ReplicaCommit => 1,
      SpanTag::CompactBeat => Tree::COUNT * LEVEL_COUNT,
      SpanTag::ReplicaAofWrite => 1,
      SpanTag::IoRead => IO_REQUEST_COUNT,
      SpanTag::MetricsEmit => 1,
    }
  }

  /// Number of distinct timing-aggregate buckets for this tag. May differ
  /// from `stack_limit` — `IoRead` collapses eight concurrency slots into
  /// one shared bucket; `ReplicaCommit` does the opposite, splitting one
  /// concurrency slot into four stage-keyed buckets.
  pub const fn timing_slot_count(self) -> usize {
    match self {
      SpanTag::ReplicaCommit => CommitStage::COUNT,
      SpanTag::CompactBeat => Tree::COUNT * LEVEL_COUNT,
      SpanTag::ReplicaAofWrite => 1,
      SpanTag::IoRead => 1,
      SpanTag::MetricsEmit => 1,
    }
  }
}

const fn stack_bases() -> [usize; SpanTag::COUNT] {
  let mut bases = [0usize; SpanTag::COUNT];
  let mut i = 1;
  while i < SpanTag::COUNT {
    bases[i] = bases[i - 1] + SpanTag::ALL[i - 1].stack_limit();
    i += 1;
  }
  bases
}

const fn timing_bases() -> [usize; SpanTag::COUNT] {
  let mut bases = [0usize; SpanTag::COUNT];
  let mut i = 1;
  while i < SpanTag::COUNT {
    bases[i] = bases[i - 1] + SpanTag::ALL[i - 1].timing_slot_count();
    i += 1;
  }
  bases
}

pub const STACK_BASES: [usize; SpanTag::COUNT] = stack_bases();
pub const TIMING_BASES: [usize; SpanTag::COUNT] = timing_bases();

pub const STACK_COUNT: usize =
  STACK_BASES[SpanTag::COUNT - 1] + SpanTag::ALL[SpanTag::COUNT - 1].stack_limit();
pub const TIMING_SLOT_COUNT: usize =
  TIMING_BASES[SpanTag::COUNT - 1] + SpanTag::ALL[SpanTag::COUNT - 1].timing_slot_count();
/// `cache_hits` is the crate's only gauge event, one slot per tree.
pub const METRIC_SLOT_COUNT: usize = Tree::COUNT;

/// A span-producing event together with its payload. `start`/`stop`/`cancel`
/// operate on this; it never carries a gauge value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanEvent {
  ReplicaCommit { stage: CommitStage, op: u32 },
  CompactBeat { tree: Tree, level_b: u8 },
  ReplicaAofWrite,
  IoRead { request: u8 },
  MetricsEmit,
}

/// One formattable field of an event, in declared order. `op` and `request`
/// are intentionally absent here: they are unbounded/high-cardinality and
/// never contribute to a stack, timing slot, or StatsD tag (they still
/// appear in the full JSON `args` object written to the trace sink).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
  U8(u8),
  Tag(&'static str),
}

impl SpanEvent {
  pub const fn tag(&self) -> SpanTag {
    match self {
      SpanEvent::ReplicaCommit { .. } => SpanTag::ReplicaCommit,
      SpanEvent::CompactBeat { .. } => SpanTag::CompactBeat,
      SpanEvent::ReplicaAofWrite => SpanTag::ReplicaAofWrite,
      SpanEvent::IoRead { .. } => SpanTag::IoRead,
      SpanEvent::MetricsEmit => SpanTag::MetricsEmit,
    }
  }

  /// Unique concurrency slot in `[0, STACK_COUNT)`.
  pub fn stack(&self) -> u32 {
    let base = STACK_BASES[self.tag().index()];
    let offset = match *self {
      SpanEvent::ReplicaCommit { .. } => 0,
      SpanEvent::CompactBeat { tree, level_b } => {
        tree.index() * LEVEL_COUNT + level_b as usize
      }
      SpanEvent::ReplicaAofWrite => 0,
      SpanEvent::IoRead { request } => {
        debug_assert!((request as usize) < IO_REQUEST_COUNT, "request out of range");
        request as usize
      }
      SpanEvent::MetricsEmit => 0,
    };
    (base + offset) as u32
  }

  /// Flat slot in `[0, TIMING_SLOT_COUNT)` identifying this event's timing
  /// aggregate bucket.
  pub fn timing_slot(&self) -> u32 {
    let base = TIMING_BASES[self.tag().index()];
    let offset = match *self {
      SpanEvent::ReplicaCommit { stage, .. } => stage.index(),
      SpanEvent::CompactBeat { tree, level_b } => {
        tree.index() * LEVEL_COUNT + level_b as usize
      }
      SpanEvent::ReplicaAofWrite => 0,
      SpanEvent::IoRead { .. } => 0,
      SpanEvent::MetricsEmit => 0,
    };
    (base + offset) as u32
  }

  /// Fields of this event, in declared order, for StatsD tags and JSON args.
  /// `op`/`request` are excluded — see `FieldValue`.
  pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
    match *self {
      SpanEvent::ReplicaCommit { stage, .. } => vec![("stage", FieldValue::Tag(stage.tag_name()))],
      SpanEvent::CompactBeat { tree, level_b } => vec![
        ("tree", FieldValue::Tag(tree.tag_name())),
        ("level_b", FieldValue::U8(level_b)),
      ],
      SpanEvent::ReplicaAofWrite => Vec::new(),
      SpanEvent::IoRead { .. } => Vec::new(),
      SpanEvent::MetricsEmit => Vec::new(),
    }
  }

  /// Full JSON-serialisable payload (includes `op`/`request`), used only
  /// for the Chrome-trace `args` object.
  pub fn to_json(&self) -> serde_json::Value {
    match *self {
      SpanEvent::ReplicaCommit { stage, op } => {
        serde_json::json!({ "stage": stage.tag_name(), "op": op })
      }
      SpanEvent::CompactBeat { tree, level_b } => {
        serde_json::json!({ "tree": tree.tag_name(), "level_b": level_b })
      }
      SpanEvent::ReplicaAofWrite => serde_json::json!({}),
      SpanEvent::IoRead { request } => serde_json::json!({ "request": request }),
      SpanEvent::MetricsEmit => serde_json::json!({}),
    }
  }
}

/// The crate's one gauge-producing event: `gauge()` never touches a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeEvent {
  CacheHits { tree: Tree },
}

impl GaugeEvent {
  pub const fn name(&self) -> &'static str {
    match self {
      GaugeEvent::CacheHits { .. } => "cache_hits",
    }
  }

  pub fn slot(&self) -> u32 {
    match *self {
      GaugeEvent::CacheHits { tree } => tree.index() as u32,
    }
  }

  pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
    match *self {
      GaugeEvent::CacheHits { tree } => vec![("tree", FieldValue::Tag(tree.tag_name()))],
    }
  }
}

// --- Build-time budget: worst-case StatsD line length --------------------
//
// A safe (not necessarily tight) upper bound: the longest possible value of
// every independent component, summed. This mirrors `LogEvent`'s
// `size_of`/`align_of` assertion in the original event layer — the
// guarantee is made a compile failure, not a runtime check.

const MAX_NAME_LEN: usize = {
  // "replica_aof_write" is the longest tag name across both catalogues.
  let mut max = GaugeEvent::CacheHits { tree: Tree::AccountId }.name().len();
  let mut i = 0;
  while i < SpanTag::COUNT {
    let len = SpanTag::ALL[i].name().len();
    if len > max {
      max = len;
    }
    i += 1;
  }
  max
};

/// Longest stat-kind suffix: `_us.count` (see `format::StatKind`).
const MAX_SUFFIX_LEN: usize = 9;
/// `u64::MAX` formatted in decimal.
const MAX_U64_DIGITS: usize = 20;
/// `u8::MAX` formatted in decimal.
const MAX_U8_DIGITS: usize = 3;
const CLUSTER_HEX_LEN: usize = 32;

const MAX_FIELD_NAME_LEN: usize = {
  // max("stage"=5, "tree"=4, "level_b"=7)
  7
};

const MAX_FIELD_VALUE_LEN: usize = {
  let tree_len = Tree::max_tag_name_len();
  let stage_len = CommitStage::max_tag_name_len();
  if tree_len > stage_len {
    tree_len
  } else {
    stage_len
  }
};

/// `compact_beat` carries the most fields (`tree`, `level_b`) of any event.
const MAX_FIELD_COUNT: usize = 2;

/// `,<name>:<value>` repeated `MAX_FIELD_COUNT` times.
const MAX_FIELDS_LEN: usize = MAX_FIELD_COUNT * (1 + MAX_FIELD_NAME_LEN + 1 + MAX_FIELD_VALUE_LEN);

/// `tb.<name><suffix>:<value>|<type>|#cluster:<hex>,replica:<dec>[,field:value]*\n`
pub const STATSD_LINE_SIZE_MAX: usize = 3 // "tb."
  + MAX_NAME_LEN
  + MAX_SUFFIX_LEN
  + 1 // ':'
  + MAX_U64_DIGITS
  + 1 // '|'
  + 1 // type char
  + 10 // "|#cluster:"
  + CLUSTER_HEX_LEN
  + 9 // ",replica:"
  + MAX_U8_DIGITS
  + MAX_FIELDS_LEN
  + 1; // '\n'

pub const PACKET_SIZE_MAX: usize = 1400;

pub const PACKET_MESSAGES_MAX: usize = PACKET_SIZE_MAX / STATSD_LINE_SIZE_MAX;

/// Every timing slot contributes five lines (min, max, avg, sum, count).
pub const TOTAL_LINES_MAX: usize = METRIC_SLOT_COUNT + TIMING_SLOT_COUNT * 5;

pub const PACKET_COUNT_MAX: usize =
  (TOTAL_LINES_MAX + PACKET_MESSAGES_MAX - 1) / PACKET_MESSAGES_MAX;

const _: () = {
  assert!(STATSD_LINE_SIZE_MAX <= PACKET_SIZE_MAX, "worst-case line exceeds datagram budget");
  assert!(PACKET_MESSAGES_MAX > 0, "datagram budget cannot fit even one worst-case line");
  assert!(PACKET_COUNT_MAX >= 1 && PACKET_COUNT_MAX < 256, "packet_count_max out of range");
  // The tag set `cluster`/`replica` must never collide with a payload field.
  assert!(MAX_FIELD_NAME_LEN < 8, "field name budget drifted without updating the line-size math");
};
