#[cfg(test)]
mod __test__ {
  use crate::buf::BoundedBuf;
  use std::fmt::Write as _;

  #[test]
  fn write_str_fails_without_partially_writing() {
    let mut buf = BoundedBuf::new(4);
    write!(buf, "ab").unwrap();
    assert_eq!(buf.len(), 2);
    assert!(write!(buf, "xyz").is_err());
    // The failed write must not have appended anything.
    assert_eq!(buf.as_bytes(), b"ab");
  }

  #[test]
  fn truncate_rolls_back_to_a_mark() {
    let mut buf = BoundedBuf::new(16);
    write!(buf, "hello").unwrap();
    let mark = buf.len();
    write!(buf, " world").unwrap();
    buf.truncate(mark);
    assert_eq!(buf.as_bytes(), b"hello");
  }

  #[test]
  fn clear_empties_without_changing_capacity() {
    let mut buf = BoundedBuf::new(8);
    write!(buf, "abcd").unwrap();
    buf.clear();
    assert!(buf.is_empty());
    assert_eq!(buf.capacity(), 8);
    assert_eq!(buf.remaining(), 8);
  }

  #[test]
  fn push_byte_fails_at_capacity() {
    let mut buf = BoundedBuf::new(1);
    assert!(buf.push_byte(b'a').is_ok());
    assert!(buf.push_byte(b'b').is_err());
  }
}
