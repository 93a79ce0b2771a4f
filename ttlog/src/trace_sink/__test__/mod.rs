#[cfg(test)]
mod __test__ {
  use crate::trace_sink::{FileTraceSink, TraceSink, VecTraceSink};

  #[test]
  fn vec_sink_accumulates_every_write() {
    let mut sink = VecTraceSink::new();
    sink.write_all(b"[\n");
    sink.write_all(b"{\"a\":1},\n");
    assert_eq!(sink.as_str(), "[\n{\"a\":1},\n");
  }

  #[test]
  fn file_sink_appends_across_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.json");

    let mut first = FileTraceSink::open(&path).unwrap();
    first.write_all(b"[\n");
    first.write_all(b"{\"a\":1},\n");
    drop(first);

    let mut second = FileTraceSink::open(&path).unwrap();
    second.write_all(b"{\"a\":2},\n");
    drop(second);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "[\n{\"a\":1},\n{\"a\":2},\n");
  }
}
