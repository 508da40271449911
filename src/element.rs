//! Wire-level elements: the per-type payload codecs and the forward
//! scan over a document envelope.
//!
//! Reading a payload advances the cursor past exactly the bytes that
//! belong to it; writing appends exactly those bytes. The type tag and
//! the key are the document's concern and never appear here except in
//! [`RawIter`], which walks a whole envelope.

use std::ops::Range;

use crate::buffer::{self, Reader};
use crate::datetime::DateTime;
use crate::decimal128::Decimal128;
use crate::error::{Error, Result};
use crate::marker::{BinarySubtype, ElementType};
use crate::oid::ObjectId;
use crate::timestamp::Timestamp;

/// One element payload, borrowed from the buffer it was read from.
/// Nested documents and arrays stay as their raw envelope bytes.
#[derive(Clone, Debug)]
pub enum Element<'a> {
    Double(f64),
    Str(&'a str),
    Doc(&'a [u8]),
    Arr(&'a [u8]),
    Bin {
        subtype: BinarySubtype,
        data: &'a [u8],
    },
    Undefined,
    ObjectId(ObjectId),
    Bool(bool),
    DateTime(DateTime),
    Null,
    Regex {
        pattern: &'a str,
        options: &'a str,
    },
    DbPointer {
        namespace: &'a str,
        id: ObjectId,
    },
    Code(&'a str),
    Symbol(&'a str),
    CodeWithScope {
        code: &'a str,
        scope: &'a [u8],
    },
    Int32(i32),
    Timestamp(Timestamp),
    Int64(i64),
    Decimal128(Decimal128),
    MinKey,
    MaxKey,
}

impl<'a> Element<'a> {
    pub fn name(&self) -> &'static str {
        use self::Element::*;
        match self {
            Double(_) => "double",
            Str(_) => "string",
            Doc(_) => "document",
            Arr(_) => "array",
            Bin { .. } => "binary",
            Undefined => "undefined",
            ObjectId(_) => "objectid",
            Bool(_) => "bool",
            DateTime(_) => "datetime",
            Null => "null",
            Regex { .. } => "regex",
            DbPointer { .. } => "dbpointer",
            Code(_) => "code",
            Symbol(_) => "symbol",
            CodeWithScope { .. } => "code-with-scope",
            Int32(_) => "int32",
            Timestamp(_) => "timestamp",
            Int64(_) => "int64",
            Decimal128(_) => "decimal128",
            MinKey => "minkey",
            MaxKey => "maxkey",
        }
    }

    pub fn element_type(&self) -> ElementType {
        use self::Element::*;
        match self {
            Double(_) => ElementType::Double,
            Str(_) => ElementType::String,
            Doc(_) => ElementType::EmbeddedDocument,
            Arr(_) => ElementType::Array,
            Bin { .. } => ElementType::Binary,
            Undefined => ElementType::Undefined,
            ObjectId(_) => ElementType::ObjectId,
            Bool(_) => ElementType::Boolean,
            DateTime(_) => ElementType::DateTime,
            Null => ElementType::Null,
            Regex { .. } => ElementType::RegularExpression,
            DbPointer { .. } => ElementType::DbPointer,
            Code(_) => ElementType::JavaScriptCode,
            Symbol(_) => ElementType::Symbol,
            CodeWithScope { .. } => ElementType::JavaScriptCodeWithScope,
            Int32(_) => ElementType::Int32,
            Timestamp(_) => ElementType::Timestamp,
            Int64(_) => ElementType::Int64,
            Decimal128(_) => ElementType::Decimal128,
            MinKey => ElementType::MinKey,
            MaxKey => ElementType::MaxKey,
        }
    }
}

/// Read a length-prefixed string: `i32 length (including NUL) | bytes |
/// 0x00`. The body may contain interior NULs; only the declared
/// terminator position is checked.
fn read_lenstr<'a>(r: &mut Reader<'a>, step: &'static str) -> Result<&'a str> {
    let start = r.position();
    let len = r.read_i32(step)?;
    if len < 1 {
        return Err(Error::internal_at(
            start,
            format!("{}: declared length {} is below the 1-byte minimum", step, len),
        ));
    }
    let bytes = r.read_bytes(len as usize, step)?;
    let (body, terminator) = bytes.split_at(bytes.len() - 1);
    if terminator != [0] {
        return Err(Error::internal_at(
            start,
            format!("{}: declared length {} does not land on a NUL", step, len),
        ));
    }
    std::str::from_utf8(body)
        .map_err(|e| Error::internal_at(start, format!("{}: invalid UTF-8: {}", step, e)))
}

/// Read a document envelope and return its full bytes, length prefix
/// and terminator included. Contents are not walked here.
fn read_doc<'a>(r: &mut Reader<'a>, step: &'static str) -> Result<&'a [u8]> {
    let start = r.position();
    let len = r.read_i32(step)?;
    if len < 5 {
        return Err(Error::internal_at(
            start,
            format!("{}: declared length {} is below the 5-byte minimum", step, len),
        ));
    }
    let body = r.read_bytes(len as usize - 4, step)?;
    if body.last() != Some(&0) {
        return Err(Error::internal_at(
            start,
            format!("{}: missing trailing terminator", step),
        ));
    }
    Ok(r.slice_from(start))
}

fn read_oid(r: &mut Reader, step: &'static str) -> Result<ObjectId> {
    let bytes = r.read_bytes(12, step)?;
    let raw: [u8; 12] = bytes.try_into().unwrap(); // length checked
    Ok(ObjectId::from(raw))
}

/// Read the payload for `tag`, advancing the cursor past exactly the
/// bytes that belong to it.
pub fn parse_elem<'a>(r: &mut Reader<'a>, tag: ElementType) -> Result<Element<'a>> {
    let elem = match tag {
        ElementType::Double => Element::Double(r.read_f64("double payload")?),
        ElementType::String => Element::Str(read_lenstr(r, "string payload")?),
        ElementType::EmbeddedDocument => Element::Doc(read_doc(r, "document payload")?),
        ElementType::Array => Element::Arr(read_doc(r, "array payload")?),
        ElementType::Binary => {
            let start = r.position();
            let len = r.read_i32("binary length")?;
            if len < 0 {
                return Err(Error::internal_at(
                    start,
                    format!("binary length: declared length {} is negative", len),
                ));
            }
            let subtype_byte = r.read_u8("binary subtype")?;
            let subtype = BinarySubtype::from_u8(subtype_byte)
                .map_err(|e| Error::internal_at(start, e.to_string()))?;
            let data = if subtype == BinarySubtype::BinaryOld {
                // The deprecated subtype carries a second, redundant
                // length in front of the payload.
                let inner = r.read_i32("old binary inner length")?;
                if inner != len - 4 {
                    return Err(Error::internal_at(
                        start,
                        format!(
                            "old binary inner length {} disagrees with outer length {}",
                            inner, len
                        ),
                    ));
                }
                r.read_bytes(inner as usize, "old binary payload")?
            } else {
                r.read_bytes(len as usize, "binary payload")?
            };
            if subtype == BinarySubtype::Uuid && data.len() != 16 {
                return Err(Error::internal_at(
                    start,
                    format!("UUID binary holds {} bytes instead of 16", data.len()),
                ));
            }
            Element::Bin { subtype, data }
        }
        ElementType::Undefined => Element::Undefined,
        ElementType::ObjectId => Element::ObjectId(read_oid(r, "objectid payload")?),
        ElementType::Boolean => {
            let start = r.position();
            match r.read_u8("bool payload")? {
                0 => Element::Bool(false),
                1 => Element::Bool(true),
                other => {
                    return Err(Error::internal_at(
                        start,
                        format!("bool byte must be 0 or 1, got {}", other),
                    ))
                }
            }
        }
        ElementType::DateTime => {
            Element::DateTime(DateTime::from_millis(r.read_i64("datetime payload")?))
        }
        ElementType::Null => Element::Null,
        ElementType::RegularExpression => Element::Regex {
            pattern: r.read_cstr("regex pattern")?,
            options: r.read_cstr("regex options")?,
        },
        ElementType::DbPointer => Element::DbPointer {
            namespace: read_lenstr(r, "dbpointer namespace")?,
            id: read_oid(r, "dbpointer id")?,
        },
        ElementType::JavaScriptCode => Element::Code(read_lenstr(r, "code payload")?),
        ElementType::Symbol => Element::Symbol(read_lenstr(r, "symbol payload")?),
        ElementType::JavaScriptCodeWithScope => {
            let start = r.position();
            let total = r.read_i32("code-with-scope length")?;
            // 4-byte length + minimum string + minimum document.
            if total < 14 {
                return Err(Error::internal_at(
                    start,
                    format!("code-with-scope length {} is below the 14-byte minimum", total),
                ));
            }
            let code = read_lenstr(r, "code-with-scope code")?;
            let scope = read_doc(r, "code-with-scope scope")?;
            if r.position() - start != total as usize {
                return Err(Error::internal_at(
                    start,
                    format!(
                        "code-with-scope length {} disagrees with its contents ({} bytes)",
                        total,
                        r.position() - start
                    ),
                ));
            }
            Element::CodeWithScope { code, scope }
        }
        ElementType::Int32 => Element::Int32(r.read_i32("int32 payload")?),
        ElementType::Timestamp => Element::Timestamp(Timestamp {
            increment: r.read_u32("timestamp increment")?,
            time: r.read_u32("timestamp seconds")?,
        }),
        ElementType::Int64 => Element::Int64(r.read_i64("int64 payload")?),
        ElementType::Decimal128 => {
            let low = r.read_u64("decimal128 low half")?;
            let high = r.read_u64("decimal128 high half")?;
            Element::Decimal128(Decimal128::from_wire(low, high))
        }
        ElementType::MinKey => Element::MinKey,
        ElementType::MaxKey => Element::MaxKey,
    };
    Ok(elem)
}

/// Append the payload bytes for `elem`. Doesn't write the type tag or
/// any key; those belong to the enclosing document.
pub fn serialize_elem(buf: &mut Vec<u8>, elem: &Element) {
    use self::Element::*;
    match *elem {
        Double(v) => buffer::write_f64(buf, v),
        Str(v) | Code(v) | Symbol(v) => buffer::write_string(buf, v),
        Doc(v) | Arr(v) => buf.extend_from_slice(v),
        Bin { subtype, data } => {
            if subtype == BinarySubtype::BinaryOld {
                buffer::write_i32(buf, data.len() as i32 + 4);
                buf.push(subtype.into());
                buffer::write_i32(buf, data.len() as i32);
            } else {
                buffer::write_i32(buf, data.len() as i32);
                buf.push(subtype.into());
            }
            buf.extend_from_slice(data);
        }
        Undefined | Null | MinKey | MaxKey => {}
        ObjectId(id) => buf.extend_from_slice(&id.bytes()),
        Bool(v) => buf.push(v as u8),
        DateTime(dt) => buffer::write_i64(buf, dt.timestamp_millis()),
        Regex { pattern, options } => {
            buffer::write_cstr(buf, pattern);
            buffer::write_cstr(buf, options);
        }
        DbPointer { namespace, id } => {
            buffer::write_string(buf, namespace);
            buf.extend_from_slice(&id.bytes());
        }
        CodeWithScope { code, scope } => {
            let total = 4 + (4 + code.len() + 1) + scope.len();
            buffer::write_i32(buf, total as i32);
            buffer::write_string(buf, code);
            buf.extend_from_slice(scope);
        }
        Int32(v) => buffer::write_i32(buf, v),
        Timestamp(ts) => {
            // Increment first, then seconds.
            buffer::write_u32(buf, ts.increment);
            buffer::write_u32(buf, ts.time);
        }
        Int64(v) => buffer::write_i64(buf, v),
        Decimal128(d) => {
            let (low, high) = d.wire_halves();
            buffer::write_u64(buf, low);
            buffer::write_u64(buf, high);
        }
    }
}

/// One entry yielded by [`RawIter`]: the key, the parsed payload, and
/// where both sit inside the envelope.
#[derive(Clone, Debug)]
pub struct RawEntry<'a> {
    pub key: &'a str,
    pub element: Element<'a>,
    /// Byte range of the key, terminator excluded.
    pub key_range: Range<usize>,
    /// Byte range of the value payload.
    pub value_range: Range<usize>,
}

impl<'a> RawEntry<'a> {
    /// Byte range of the whole entry: type tag, key C-string, payload.
    pub fn entry_range(&self) -> Range<usize> {
        self.key_range.start - 1..self.value_range.end
    }
}

/// Single-pass forward scan over a document envelope.
///
/// The first failure is terminal: the error is yielded once and the
/// iterator returns `None` from then on.
#[derive(Clone, Debug)]
pub struct RawIter<'a> {
    envelope: &'a [u8],
    reader: Reader<'a>,
    started: bool,
    errored: bool,
}

impl<'a> RawIter<'a> {
    pub fn new(envelope: &'a [u8]) -> RawIter<'a> {
        RawIter {
            envelope,
            reader: Reader::new(envelope),
            started: false,
            errored: false,
        }
    }

    /// Envelope checks, run before the first entry: the length prefix
    /// must match the slice and the final byte must be the terminator.
    fn begin(&mut self) -> Result<()> {
        let len = self.reader.read_i32("document length")?;
        if len as usize != self.envelope.len() || len < 5 {
            return Err(Error::internal(format!(
                "document length prefix {} disagrees with its {} bytes",
                len,
                self.envelope.len()
            )));
        }
        if self.envelope.last() != Some(&0) {
            return Err(Error::internal(format!(
                "document of {} bytes is missing its trailing terminator",
                self.envelope.len()
            )));
        }
        Ok(())
    }

    fn step(&mut self) -> Result<Option<RawEntry<'a>>> {
        if !self.started {
            self.started = true;
            self.begin()?;
        }
        let tag_at = self.reader.position();
        let tag_byte = self.reader.read_u8("element type")?;
        if tag_byte == 0 {
            if self.reader.remaining() != 0 {
                return Err(Error::internal_at(
                    tag_at,
                    format!("{} bytes of trailing garbage after the document terminator",
                        self.reader.remaining()),
                ));
            }
            return Ok(None);
        }
        let tag = ElementType::from_u8(tag_byte).ok_or_else(|| {
            Error::internal_at(tag_at, format!("unknown element type {:#04x}", tag_byte))
        })?;
        let key_start = self.reader.position();
        let key = self.reader.read_cstr("element key")?;
        let value_start = self.reader.position();
        let element = parse_elem(&mut self.reader, tag)?;
        Ok(Some(RawEntry {
            key,
            element,
            key_range: key_start..key_start + key.len(),
            value_range: value_start..self.reader.position(),
        }))
    }
}

impl<'a> Iterator for RawIter<'a> {
    type Item = Result<RawEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.errored {
            return None;
        }
        match self.step() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.errored = true;
                None
            }
            Err(e) => {
                self.errored = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn roundtrip(elem: Element) {
        let mut enc = Vec::new();
        serialize_elem(&mut enc, &elem);
        let mut r = Reader::new(&enc);
        let back = parse_elem(&mut r, elem.element_type()).unwrap();
        assert_eq!(r.remaining(), 0, "payload not fully consumed");
        let mut enc2 = Vec::new();
        serialize_elem(&mut enc2, &back);
        assert_eq!(enc, enc2);
    }

    mod scalar {
        use super::*;

        #[test]
        fn roundtrips() {
            roundtrip(Element::Double(5.05));
            roundtrip(Element::Double(f64::NEG_INFINITY));
            roundtrip(Element::Str("awesome"));
            roundtrip(Element::Str(""));
            roundtrip(Element::Bool(true));
            roundtrip(Element::Bool(false));
            roundtrip(Element::DateTime(DateTime::from_millis(-5_000)));
            roundtrip(Element::Int32(1986));
            roundtrip(Element::Int64(i64::MIN));
            roundtrip(Element::Timestamp(Timestamp {
                time: 4,
                increment: 9,
            }));
            roundtrip(Element::Decimal128(
                Decimal128::parse_str("1.2E+10").unwrap(),
            ));
            roundtrip(Element::Regex {
                pattern: "^ab*$",
                options: "ix",
            });
            roundtrip(Element::Null);
            roundtrip(Element::Undefined);
            roundtrip(Element::MinKey);
            roundtrip(Element::MaxKey);
        }

        #[test]
        fn string_spec_bytes() {
            let mut enc = Vec::new();
            serialize_elem(&mut enc, &Element::Str("world"));
            assert_eq!(
                enc,
                [0x06, 0x00, 0x00, 0x00, 0x77, 0x6F, 0x72, 0x6C, 0x64, 0x00]
            );
        }

        #[test]
        fn string_length_must_cover_terminator() {
            // Length says 6 but the NUL sits early.
            let bad = [0x06, 0x00, 0x00, 0x00, 0x77, 0x00, 0x72, 0x6C, 0x64, 0x00];
            let mut r = Reader::new(&bad);
            assert!(parse_elem(&mut r, ElementType::String).is_err());
        }

        #[test]
        fn bool_bytes_other_than_0_1_rejected() {
            let bad = [0x02u8];
            let mut r = Reader::new(&bad);
            assert!(parse_elem(&mut r, ElementType::Boolean).is_err());
        }
    }

    mod binary {
        use super::*;

        #[test]
        fn roundtrips() {
            roundtrip(Element::Bin {
                subtype: BinarySubtype::Generic,
                data: &[0xFF, 0xFF],
            });
            roundtrip(Element::Bin {
                subtype: BinarySubtype::UserDefined(0x80),
                data: &[],
            });
            roundtrip(Element::Bin {
                subtype: BinarySubtype::Uuid,
                data: &[7; 16],
            });
        }

        #[test]
        fn old_binary_has_inner_length() {
            let elem = Element::Bin {
                subtype: BinarySubtype::BinaryOld,
                data: &[1, 2, 3],
            };
            let mut enc = Vec::new();
            serialize_elem(&mut enc, &elem);
            assert_eq!(
                enc,
                [0x07, 0x00, 0x00, 0x00, 0x02, 0x03, 0x00, 0x00, 0x00, 1, 2, 3]
            );
            roundtrip(elem);
        }

        #[test]
        fn old_binary_inner_length_mismatch_rejected() {
            let bad = [0x07, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x00, 0x00, 1, 2, 3];
            let mut r = Reader::new(&bad);
            assert!(parse_elem(&mut r, ElementType::Binary).is_err());
        }

        #[test]
        fn reserved_subtype_rejected() {
            let bad = [0x01, 0x00, 0x00, 0x00, 0x42, 0xAA];
            let mut r = Reader::new(&bad);
            assert!(parse_elem(&mut r, ElementType::Binary).is_err());
        }

        #[test]
        fn uuid_wrong_length_rejected() {
            let bad = [0x02, 0x00, 0x00, 0x00, 0x04, 0xAA, 0xBB];
            let mut r = Reader::new(&bad);
            assert!(parse_elem(&mut r, ElementType::Binary).is_err());
        }
    }

    mod compound {
        use super::*;

        const EMPTY_DOC: &[u8] = &[0x05, 0x00, 0x00, 0x00, 0x00];

        #[test]
        fn roundtrips() {
            roundtrip(Element::Doc(EMPTY_DOC));
            roundtrip(Element::Arr(EMPTY_DOC));
            roundtrip(Element::Code("function() {}"));
            roundtrip(Element::Symbol("sym"));
            roundtrip(Element::CodeWithScope {
                code: "f()",
                scope: EMPTY_DOC,
            });
            roundtrip(Element::DbPointer {
                namespace: "db.coll",
                id: ObjectId::from([1; 12]),
            });
            roundtrip(Element::ObjectId(ObjectId::from([0xAB; 12])));
        }

        #[test]
        fn code_with_scope_length_is_self_inclusive() {
            let elem = Element::CodeWithScope {
                code: "f()",
                scope: EMPTY_DOC,
            };
            let mut enc = Vec::new();
            serialize_elem(&mut enc, &elem);
            // 4 (total) + 8 (string "f()") + 5 (empty doc)
            assert_eq!(enc.len(), 17);
            assert_eq!(&enc[..4], &[17, 0, 0, 0]);
        }

        #[test]
        fn code_with_scope_length_mismatch_rejected() {
            let elem = Element::CodeWithScope {
                code: "f()",
                scope: EMPTY_DOC,
            };
            let mut enc = Vec::new();
            serialize_elem(&mut enc, &elem);
            enc[0] += 1; // now disagrees with the contents
            enc.push(0); // keep enough bytes around
            let mut r = Reader::new(&enc);
            assert!(parse_elem(&mut r, ElementType::JavaScriptCodeWithScope).is_err());
        }
    }

    mod raw_iter {
        use super::*;

        // { "hello": "world" }, the spec's own example.
        const HELLO: &[u8] = &[
            0x16, 0x00, 0x00, 0x00, 0x02, 0x68, 0x65, 0x6C, 0x6C, 0x6F, 0x00, 0x06, 0x00, 0x00,
            0x00, 0x77, 0x6F, 0x72, 0x6C, 0x64, 0x00, 0x00,
        ];

        #[test]
        fn walks_entries_with_ranges() {
            let mut iter = RawIter::new(HELLO);
            let entry = iter.next().unwrap().unwrap();
            assert_eq!(entry.key, "hello");
            assert_eq!(entry.key_range, 5..10);
            assert_eq!(entry.value_range, 11..21);
            assert_eq!(entry.entry_range(), 4..21);
            match entry.element {
                Element::Str(s) => assert_eq!(s, "world"),
                other => panic!("wrong element: {:?}", other),
            }
            assert!(iter.next().is_none());
        }

        #[test]
        fn bad_length_prefix_is_fatal() {
            let mut bytes = HELLO.to_vec();
            bytes[0] += 1;
            let mut iter = RawIter::new(&bytes);
            assert!(iter.next().unwrap().is_err());
            assert!(iter.next().is_none());
        }

        #[test]
        fn unknown_type_tag_is_fatal() {
            let mut bytes = HELLO.to_vec();
            bytes[4] = 0x20;
            let mut iter = RawIter::new(&bytes);
            assert!(iter.next().unwrap().is_err());
            assert!(iter.next().is_none());
        }

        #[test]
        fn truncated_payload_is_fatal() {
            // Declared string length runs past the envelope.
            let mut bytes = HELLO.to_vec();
            bytes[11] = 0x40;
            let mut iter = RawIter::new(&bytes);
            assert!(iter.next().unwrap().is_err());
            assert!(iter.next().is_none());
        }

        #[test]
        fn empty_document() {
            let bytes = [0x05u8, 0x00, 0x00, 0x00, 0x00];
            let mut iter = RawIter::new(&bytes);
            assert!(iter.next().is_none());
        }
    }
}
