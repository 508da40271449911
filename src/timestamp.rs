//! Internal MongoDB timestamps (the oplog kind, not wall-clock time).

/// A BSON timestamp: a 32-bit second count paired with a 32-bit ordinal
/// distinguishing operations within that second. On the wire the
/// increment is written first, both halves little-endian.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    pub time: u32,
    /// Ordinal within the second.
    pub increment: u32,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::buffer::Reader;
    use crate::element::{parse_elem, serialize_elem, Element};
    use crate::marker::ElementType;

    #[test]
    fn wire_puts_increment_first() {
        let ts = Timestamp {
            time: 0x1122_3344,
            increment: 0x5566_7788,
        };
        let mut buf = Vec::new();
        serialize_elem(&mut buf, &Element::Timestamp(ts));
        assert_eq!(buf, [0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);

        let mut r = Reader::new(&buf);
        match parse_elem(&mut r, ElementType::Timestamp).unwrap() {
            Element::Timestamp(back) => assert_eq!(back, ts),
            other => panic!("wrong element: {:?}", other),
        }
    }
}
