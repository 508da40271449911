//! The BSON value model: one tagged union over every type the format
//! defines.
//!
//! Behavior shared across variants (reading, writing, the Extended
//! JSON forms) dispatches by matching on the tag. Reading and writing
//! here cover the payload only; type tags and keys belong to
//! [`Document`](crate::document::Document).

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::binary::Binary;
use crate::buffer::Reader;
use crate::datetime::DateTime;
use crate::decimal128::Decimal128;
use crate::document::{validate_envelope, Array, Document};
use crate::element::{parse_elem, serialize_elem, Element};
use crate::error::Result;
use crate::marker::ElementType;
use crate::oid::ObjectId;
use crate::timestamp::Timestamp;

/// A regular-expression value. Pattern and options travel as C-strings,
/// so neither may contain an interior NUL; [`Regex::new`] enforces
/// that.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Regex {
    pub pattern: String,
    pub options: String,
}

impl Regex {
    pub fn new(pattern: impl Into<String>, options: impl Into<String>) -> Result<Regex> {
        let regex = Regex {
            pattern: pattern.into(),
            options: options.into(),
        };
        regex.check_cstrings()?;
        Ok(regex)
    }

    pub(crate) fn check_cstrings(&self) -> Result<()> {
        if self.pattern.as_bytes().contains(&0) || self.options.as_bytes().contains(&0) {
            return Err(crate::error::Error::InvalidArgument(format!(
                "regular expression {:?} contains an interior NUL",
                self.pattern
            )));
        }
        Ok(())
    }
}

/// JavaScript code bundled with the document of variables it closes
/// over.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JavaScriptCodeWithScope {
    pub code: String,
    pub scope: Document,
}

/// A deprecated namespace-plus-id reference, kept for wire
/// compatibility.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DbPointer {
    pub namespace: String,
    pub id: ObjectId,
}

/// Any BSON value.
#[derive(Clone, Debug, PartialEq)]
pub enum Bson {
    Double(f64),
    String(String),
    Document(Document),
    Array(Array),
    Binary(Binary),
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    DateTime(DateTime),
    Null,
    RegularExpression(Regex),
    DbPointer(DbPointer),
    JavaScriptCode(String),
    Symbol(String),
    JavaScriptCodeWithScope(JavaScriptCodeWithScope),
    Int32(i32),
    Timestamp(Timestamp),
    Int64(i64),
    Decimal128(Decimal128),
    MinKey,
    MaxKey,
}

impl Bson {
    /// The wire tag this value is written under.
    pub fn element_type(&self) -> ElementType {
        match self {
            Bson::Double(_) => ElementType::Double,
            Bson::String(_) => ElementType::String,
            Bson::Document(_) => ElementType::EmbeddedDocument,
            Bson::Array(_) => ElementType::Array,
            Bson::Binary(_) => ElementType::Binary,
            Bson::Undefined => ElementType::Undefined,
            Bson::ObjectId(_) => ElementType::ObjectId,
            Bson::Boolean(_) => ElementType::Boolean,
            Bson::DateTime(_) => ElementType::DateTime,
            Bson::Null => ElementType::Null,
            Bson::RegularExpression(_) => ElementType::RegularExpression,
            Bson::DbPointer(_) => ElementType::DbPointer,
            Bson::JavaScriptCode(_) => ElementType::JavaScriptCode,
            Bson::Symbol(_) => ElementType::Symbol,
            Bson::JavaScriptCodeWithScope(_) => ElementType::JavaScriptCodeWithScope,
            Bson::Int32(_) => ElementType::Int32,
            Bson::Timestamp(_) => ElementType::Timestamp,
            Bson::Int64(_) => ElementType::Int64,
            Bson::Decimal128(_) => ElementType::Decimal128,
            Bson::MinKey => ElementType::MinKey,
            Bson::MaxKey => ElementType::MaxKey,
        }
    }

    /// Read the payload written under `tag`, advancing the cursor past
    /// exactly the bytes that belong to it. Nested envelopes are
    /// validated in full.
    pub fn read(reader: &mut Reader, tag: ElementType) -> Result<Bson> {
        let elem = parse_elem(reader, tag)?;
        match &elem {
            Element::Doc(nested) | Element::Arr(nested) => validate_envelope(nested)?,
            Element::CodeWithScope { scope, .. } => validate_envelope(scope)?,
            _ => {}
        }
        Ok(Bson::from_element(&elem))
    }

    /// Append the payload bytes, without the type tag or any key.
    pub fn write(&self, buf: &mut Vec<u8>) {
        serialize_elem(buf, &self.to_element());
    }

    /// A borrowed wire-level view of this value.
    pub(crate) fn to_element(&self) -> Element {
        match self {
            Bson::Double(v) => Element::Double(*v),
            Bson::String(s) => Element::Str(s),
            Bson::Document(d) => Element::Doc(d.as_bytes()),
            Bson::Array(a) => Element::Arr(a.as_document().as_bytes()),
            Bson::Binary(b) => Element::Bin {
                subtype: b.subtype,
                data: &b.bytes,
            },
            Bson::Undefined => Element::Undefined,
            Bson::ObjectId(id) => Element::ObjectId(*id),
            Bson::Boolean(v) => Element::Bool(*v),
            Bson::DateTime(dt) => Element::DateTime(*dt),
            Bson::Null => Element::Null,
            Bson::RegularExpression(re) => Element::Regex {
                pattern: &re.pattern,
                options: &re.options,
            },
            Bson::DbPointer(p) => Element::DbPointer {
                namespace: &p.namespace,
                id: p.id,
            },
            Bson::JavaScriptCode(s) => Element::Code(s),
            Bson::Symbol(s) => Element::Symbol(s),
            Bson::JavaScriptCodeWithScope(c) => Element::CodeWithScope {
                code: &c.code,
                scope: c.scope.as_bytes(),
            },
            Bson::Int32(v) => Element::Int32(*v),
            Bson::Timestamp(ts) => Element::Timestamp(*ts),
            Bson::Int64(v) => Element::Int64(*v),
            Bson::Decimal128(d) => Element::Decimal128(*d),
            Bson::MinKey => Element::MinKey,
            Bson::MaxKey => Element::MaxKey,
        }
    }

    /// Build an owned value from a wire-level element whose nested
    /// envelopes are already known valid.
    pub(crate) fn from_element(elem: &Element) -> Bson {
        match *elem {
            Element::Double(v) => Bson::Double(v),
            Element::Str(s) => Bson::String(s.to_string()),
            Element::Doc(d) => Bson::Document(Document::from_vec_unchecked(d.to_vec())),
            Element::Arr(d) => {
                Bson::Array(Array::from_document(Document::from_vec_unchecked(d.to_vec())))
            }
            Element::Bin { subtype, data } => Bson::Binary(Binary {
                subtype,
                bytes: data.to_vec(),
            }),
            Element::Undefined => Bson::Undefined,
            Element::ObjectId(id) => Bson::ObjectId(id),
            Element::Bool(v) => Bson::Boolean(v),
            Element::DateTime(dt) => Bson::DateTime(dt),
            Element::Null => Bson::Null,
            Element::Regex { pattern, options } => Bson::RegularExpression(Regex {
                pattern: pattern.to_string(),
                options: options.to_string(),
            }),
            Element::DbPointer { namespace, id } => Bson::DbPointer(DbPointer {
                namespace: namespace.to_string(),
                id,
            }),
            Element::Code(s) => Bson::JavaScriptCode(s.to_string()),
            Element::Symbol(s) => Bson::Symbol(s.to_string()),
            Element::CodeWithScope { code, scope } => {
                Bson::JavaScriptCodeWithScope(JavaScriptCodeWithScope {
                    code: code.to_string(),
                    scope: Document::from_vec_unchecked(scope.to_vec()),
                })
            }
            Element::Int32(v) => Bson::Int32(v),
            Element::Timestamp(ts) => Bson::Timestamp(ts),
            Element::Int64(v) => Bson::Int64(v),
            Element::Decimal128(d) => Bson::Decimal128(d),
            Element::MinKey => Bson::MinKey,
            Element::MaxKey => Bson::MaxKey,
        }
    }

    // --- conversion helpers ---------------------------------------------

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Bson::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Bson::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Bson::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Bson::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&Binary> {
        match self {
            Bson::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match *self {
            Bson::ObjectId(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Bson::Boolean(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime> {
        match *self {
            Bson::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_regex(&self) -> Option<&Regex> {
        match self {
            Bson::RegularExpression(re) => Some(re),
            _ => None,
        }
    }

    pub fn as_code(&self) -> Option<&str> {
        match self {
            Bson::JavaScriptCode(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Bson::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_code_with_scope(&self) -> Option<&JavaScriptCodeWithScope> {
        match self {
            Bson::JavaScriptCodeWithScope(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Bson::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match *self {
            Bson::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Bson::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_decimal128(&self) -> Option<Decimal128> {
        match *self {
            Bson::Decimal128(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Bson::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Bson::Undefined)
    }
}

// Hashing is structural, like equality; doubles hash by bit pattern
// since `f64` cannot derive it.
impl Hash for Bson {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.element_type().hash(state);
        match self {
            Bson::Double(v) => v.to_bits().hash(state),
            Bson::String(s) | Bson::JavaScriptCode(s) | Bson::Symbol(s) => s.hash(state),
            Bson::Document(d) => d.hash(state),
            Bson::Array(a) => a.hash(state),
            Bson::Binary(b) => b.hash(state),
            Bson::ObjectId(id) => id.hash(state),
            Bson::Boolean(v) => v.hash(state),
            Bson::DateTime(dt) => dt.hash(state),
            Bson::RegularExpression(re) => re.hash(state),
            Bson::DbPointer(p) => p.hash(state),
            Bson::JavaScriptCodeWithScope(c) => c.hash(state),
            Bson::Int32(v) => v.hash(state),
            Bson::Timestamp(ts) => ts.hash(state),
            Bson::Int64(v) => v.hash(state),
            Bson::Decimal128(d) => d.hash(state),
            Bson::Undefined | Bson::Null | Bson::MinKey | Bson::MaxKey => {}
        }
    }
}

impl fmt::Display for Bson {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_relaxed_json())
    }
}

impl From<f64> for Bson {
    fn from(v: f64) -> Bson {
        Bson::Double(v)
    }
}

impl From<&str> for Bson {
    fn from(v: &str) -> Bson {
        Bson::String(v.to_string())
    }
}

impl From<String> for Bson {
    fn from(v: String) -> Bson {
        Bson::String(v)
    }
}

impl From<bool> for Bson {
    fn from(v: bool) -> Bson {
        Bson::Boolean(v)
    }
}

impl From<i32> for Bson {
    fn from(v: i32) -> Bson {
        Bson::Int32(v)
    }
}

impl From<i64> for Bson {
    fn from(v: i64) -> Bson {
        Bson::Int64(v)
    }
}

impl From<Document> for Bson {
    fn from(v: Document) -> Bson {
        Bson::Document(v)
    }
}

impl From<Array> for Bson {
    fn from(v: Array) -> Bson {
        Bson::Array(v)
    }
}

impl From<Binary> for Bson {
    fn from(v: Binary) -> Bson {
        Bson::Binary(v)
    }
}

impl From<ObjectId> for Bson {
    fn from(v: ObjectId) -> Bson {
        Bson::ObjectId(v)
    }
}

impl From<DateTime> for Bson {
    fn from(v: DateTime) -> Bson {
        Bson::DateTime(v)
    }
}

impl From<Timestamp> for Bson {
    fn from(v: Timestamp) -> Bson {
        Bson::Timestamp(v)
    }
}

impl From<Decimal128> for Bson {
    fn from(v: Decimal128) -> Bson {
        Bson::Decimal128(v)
    }
}

impl From<Regex> for Bson {
    fn from(v: Regex) -> Bson {
        Bson::RegularExpression(v)
    }
}

impl From<DbPointer> for Bson {
    fn from(v: DbPointer) -> Bson {
        Bson::DbPointer(v)
    }
}

impl From<JavaScriptCodeWithScope> for Bson {
    fn from(v: JavaScriptCodeWithScope) -> Bson {
        Bson::JavaScriptCodeWithScope(v)
    }
}

impl From<Vec<u8>> for Bson {
    fn from(v: Vec<u8>) -> Bson {
        Bson::Binary(Binary::generic(v))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::marker::BinarySubtype;

    fn kitchen_sink() -> Vec<Bson> {
        let mut scope = Document::new();
        scope.set("x", 1i32).unwrap();
        let mut nested = Document::new();
        nested.set("deep", Bson::Null).unwrap();
        vec![
            Bson::Double(5.05),
            Bson::String("awesome".into()),
            Bson::Document(nested),
            Bson::Array(Array::from_values([1i32, 2, 3]).unwrap()),
            Bson::Binary(Binary::new(BinarySubtype::Uuid, vec![9; 16]).unwrap()),
            Bson::Undefined,
            Bson::ObjectId(ObjectId::from([0xAB; 12])),
            Bson::Boolean(true),
            Bson::DateTime(DateTime::from_millis(978_312_200_000)),
            Bson::Null,
            Bson::RegularExpression(Regex::new("^a", "i").unwrap()),
            Bson::DbPointer(DbPointer {
                namespace: "db.coll".into(),
                id: ObjectId::from([1; 12]),
            }),
            Bson::JavaScriptCode("function() {}".into()),
            Bson::Symbol("sym".into()),
            Bson::JavaScriptCodeWithScope(JavaScriptCodeWithScope {
                code: "f(x)".into(),
                scope,
            }),
            Bson::Int32(1986),
            Bson::Timestamp(Timestamp {
                time: 123,
                increment: 456,
            }),
            Bson::Int64(2i64.pow(53)),
            Bson::Decimal128(Decimal128::parse_str("1.2E+10").unwrap()),
            Bson::MinKey,
            Bson::MaxKey,
        ]
    }

    #[test]
    fn payload_round_trip_every_variant() {
        for value in kitchen_sink() {
            let mut buf = Vec::new();
            value.write(&mut buf);
            let mut reader = Reader::new(&buf);
            let back = Bson::read(&mut reader, value.element_type()).unwrap();
            assert_eq!(reader.remaining(), 0, "{:?} left bytes behind", value);
            assert_eq!(back, value);
        }
    }

    #[test]
    fn document_round_trip_every_variant() {
        let mut doc = Document::new();
        for (i, value) in kitchen_sink().into_iter().enumerate() {
            doc.set(&format!("k{}", i), value).unwrap();
        }
        let back = Document::from_bytes(doc.as_bytes().to_vec()).unwrap();
        assert_eq!(back, doc);
        for (i, value) in kitchen_sink().into_iter().enumerate() {
            assert_eq!(back.get(&format!("k{}", i)), Some(value));
        }
    }

    #[test]
    fn read_validates_nested_envelopes() {
        let mut nested = Document::new();
        nested.set("x", 1i32).unwrap();
        let value = Bson::Document(nested);
        let mut buf = Vec::new();
        value.write(&mut buf);
        let tag_at = buf.iter().position(|&b| b == 0x10).unwrap();
        buf[tag_at] = 0x42;
        let mut reader = Reader::new(&buf);
        assert!(Bson::read(&mut reader, ElementType::EmbeddedDocument).is_err());
    }

    #[test]
    fn equal_values_hash_alike() {
        use std::collections::hash_map::DefaultHasher;
        let hash_of = |v: &Bson| {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        };
        for value in kitchen_sink() {
            assert_eq!(hash_of(&value), hash_of(&value.clone()));
        }
        assert_ne!(
            hash_of(&Bson::Int32(5)),
            hash_of(&Bson::Int64(5)),
            "same number, different type, should hash apart"
        );
    }

    #[test]
    fn accessors_pick_their_variant() {
        assert_eq!(Bson::Double(1.5).as_f64(), Some(1.5));
        assert_eq!(Bson::Int32(1).as_f64(), None);
        assert_eq!(Bson::String("s".into()).as_str(), Some("s"));
        assert_eq!(Bson::Int64(7).as_i64(), Some(7));
        assert_eq!(Bson::Boolean(true).as_bool(), Some(true));
        assert!(Bson::Null.is_null());
        assert!(!Bson::Undefined.is_null());
        assert!(Bson::Undefined.is_undefined());
        assert_eq!(
            Bson::Timestamp(Timestamp {
                time: 1,
                increment: 2
            })
            .as_timestamp(),
            Some(Timestamp {
                time: 1,
                increment: 2
            })
        );
    }
}
