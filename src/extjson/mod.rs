//! Extended JSON: the two standardized text renderings of BSON.
//!
//! The canonical profile preserves every BSON type exactly by wrapping
//! non-JSON-native values in `$`-prefixed objects; the relaxed profile
//! uses plain JSON numbers and ISO-8601 date strings where that loses
//! nothing, falling back to the canonical wrappers otherwise. Reading
//! accepts both profiles interchangeably, plus the legacy v1 `$binary`
//! and the `$uuid` shorthand.
//!
//! The intermediate representation is a [`serde_json::Value`] tree;
//! key order survives both directions.

mod read;
mod write;

use serde_json::Value as Json;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::value::Bson;

/// Which profile [`ExtendedJsonEncoder`] emits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExtJsonFormat {
    /// Every value in its exact type wrapper.
    Canonical,
    /// Plain JSON where lossless.
    #[default]
    Relaxed,
}

/// Serializes documents to Extended JSON text.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtendedJsonEncoder {
    pub format: ExtJsonFormat,
}

impl ExtendedJsonEncoder {
    /// An encoder for the default (relaxed) profile.
    pub fn new() -> ExtendedJsonEncoder {
        ExtendedJsonEncoder::default()
    }

    pub fn canonical() -> ExtendedJsonEncoder {
        ExtendedJsonEncoder {
            format: ExtJsonFormat::Canonical,
        }
    }

    /// Render a document as UTF-8 JSON text.
    pub fn encode(&self, doc: &Document) -> Result<Vec<u8>> {
        let tree = match self.format {
            ExtJsonFormat::Canonical => doc.to_canonical_json(),
            ExtJsonFormat::Relaxed => doc.to_relaxed_json(),
        };
        serde_json::to_vec(&tree).map_err(|e| Error::internal(format!("JSON writing: {}", e)))
    }

    /// Render a single value, for top-level non-document fragments.
    pub fn encode_value(&self, value: &Bson) -> Result<Vec<u8>> {
        let tree = match self.format {
            ExtJsonFormat::Canonical => value.to_canonical_json(),
            ExtJsonFormat::Relaxed => value.to_relaxed_json(),
        };
        serde_json::to_vec(&tree).map_err(|e| Error::internal(format!("JSON writing: {}", e)))
    }
}

/// Parses Extended JSON text of either profile back into documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtendedJsonDecoder;

impl ExtendedJsonDecoder {
    pub fn new() -> ExtendedJsonDecoder {
        ExtendedJsonDecoder
    }

    /// Parse a document. The top-level JSON value must be an object
    /// that is not itself a type wrapper.
    pub fn decode(&self, bytes: &[u8]) -> Result<Document> {
        match self.decode_value(bytes)? {
            Bson::Document(doc) => Ok(doc),
            other => Err(Error::corrupted(
                &[],
                format!(
                    "top-level Extended JSON must be a document, found a {:?} value",
                    other.element_type()
                ),
            )),
        }
    }

    /// Parse any single value, wrappers included.
    pub fn decode_value(&self, bytes: &[u8]) -> Result<Bson> {
        let json: Json = serde_json::from_slice(bytes)
            .map_err(|e| Error::corrupted(&[], format!("invalid JSON: {}", e)))?;
        Bson::from_extended_json(json)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::binary::Binary;
    use crate::datetime::DateTime;
    use crate::decimal128::Decimal128;
    use crate::document::Array;
    use crate::marker::BinarySubtype;
    use crate::oid::ObjectId;
    use crate::timestamp::Timestamp;
    use crate::value::{DbPointer, JavaScriptCodeWithScope, Regex};

    fn reencode(text: &str, format: ExtJsonFormat) -> String {
        let doc = ExtendedJsonDecoder::new().decode(text.as_bytes()).unwrap();
        let bytes = ExtendedJsonEncoder { format }.encode(&doc).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    // S3: a $numberDecimal survives into the documented bit pattern.
    #[test]
    fn decimal_wrapper_to_wire_bytes() {
        let doc = ExtendedJsonDecoder::new()
            .decode(br#"{"d":{"$numberDecimal":"1.2E+10"}}"#)
            .unwrap();
        let bytes = doc.as_bytes();
        // tag 0x13, key "d", low half 12, high half 0x3052...
        let tail = &bytes[4..bytes.len() - 1];
        assert_eq!(
            tail,
            [
                0x13, 0x64, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x52, 0x30
            ]
        );
    }

    // S5: relaxed $date string.
    #[test]
    fn relaxed_date_string_decodes() {
        let doc = ExtendedJsonDecoder::new()
            .decode(br#"{"when":{"$date":"2001-01-01T01:23:20Z"}}"#)
            .unwrap();
        assert_eq!(
            doc.get_datetime("when").unwrap(),
            DateTime::from_millis(978_312_200_000)
        );
    }

    // S6: canonical $binary decodes, and re-encoding relaxed emits the
    // identical wrapper.
    #[test]
    fn binary_wrapper_is_profile_invariant() {
        let text = r#"{"b":{"$binary":{"base64":"//8=","subType":"00"}}}"#;
        let doc = ExtendedJsonDecoder::new().decode(text.as_bytes()).unwrap();
        let bin = doc.get_binary("b").unwrap();
        assert_eq!(bin.bytes, [0xFF, 0xFF]);
        assert_eq!(bin.subtype, BinarySubtype::Generic);
        assert_eq!(reencode(text, ExtJsonFormat::Relaxed), text);
    }

    #[test]
    fn canonical_round_trip_preserves_every_type() {
        let mut scope = Document::new();
        scope.set("x", 1i32).unwrap();
        let mut doc = Document::new();
        doc.set("double", 5.05f64).unwrap();
        doc.set("neg_inf", f64::NEG_INFINITY).unwrap();
        doc.set("string", "text").unwrap();
        doc.set("array", Array::from_values([1i32, 2]).unwrap())
            .unwrap();
        doc.set("binary", Binary::generic(vec![1, 2, 3])).unwrap();
        doc.set("undefined", Bson::Undefined).unwrap();
        doc.set("oid", ObjectId::from([0xAB; 12])).unwrap();
        doc.set("bool", true).unwrap();
        doc.set("date", DateTime::from_millis(978_312_200_500))
            .unwrap();
        doc.set("far_date", DateTime::from_millis(-5)).unwrap();
        doc.set("null", Bson::Null).unwrap();
        doc.set("regex", Regex::new("^a.*$", "ix").unwrap()).unwrap();
        doc.set(
            "dbptr",
            DbPointer {
                namespace: "db.coll".into(),
                id: ObjectId::from([1; 12]),
            },
        )
        .unwrap();
        doc.set("code", Bson::JavaScriptCode("f()".into())).unwrap();
        doc.set("symbol", Bson::Symbol("sym".into())).unwrap();
        doc.set(
            "code_w_s",
            JavaScriptCodeWithScope {
                code: "g()".into(),
                scope,
            },
        )
        .unwrap();
        doc.set("int32", 1986i32).unwrap();
        doc.set(
            "ts",
            Timestamp {
                time: 123,
                increment: 456,
            },
        )
        .unwrap();
        doc.set("int64", 2i64.pow(53) + 1).unwrap();
        doc.set("dec", Decimal128::parse_str("0.001").unwrap())
            .unwrap();
        doc.set("min", Bson::MinKey).unwrap();
        doc.set("max", Bson::MaxKey).unwrap();

        let bytes = ExtendedJsonEncoder::canonical().encode(&doc).unwrap();
        let back = ExtendedJsonDecoder::new().decode(&bytes).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn relaxed_round_trip_modulo_number_collapse() {
        let mut doc = Document::new();
        doc.set("int32", 1986i32).unwrap();
        doc.set("small_int64", 5i64).unwrap();
        doc.set("big_int64", i64::MAX).unwrap();
        doc.set("double", 5.05f64).unwrap();
        doc.set("whole_double", 4.0f64).unwrap();

        let bytes = ExtendedJsonEncoder::new().encode(&doc).unwrap();
        let back = ExtendedJsonDecoder::new().decode(&bytes).unwrap();

        assert_eq!(back.get("int32"), Some(Bson::Int32(1986)));
        // A small int64 collapses to the narrower type; the number
        // survives.
        assert_eq!(back.get("small_int64"), Some(Bson::Int32(5)));
        // One that a double cannot hold keeps its wrapper and type.
        assert_eq!(back.get("big_int64"), Some(Bson::Int64(i64::MAX)));
        assert_eq!(back.get("double"), Some(Bson::Double(5.05)));
        assert_eq!(back.get("whole_double"), Some(Bson::Double(4.0)));
    }

    #[test]
    fn relaxed_falls_back_to_wrappers_when_lossy() {
        let mut doc = Document::new();
        doc.set("nan", f64::NAN).unwrap();
        doc.set("big", i64::MAX).unwrap();
        doc.set("old_date", DateTime::from_millis(-5)).unwrap();
        let text = String::from_utf8(ExtendedJsonEncoder::new().encode(&doc).unwrap()).unwrap();
        assert!(text.contains(r#""nan":{"$numberDouble":"NaN"}"#));
        assert!(text.contains(r#""big":{"$numberLong":"9223372036854775807"}"#));
        assert!(text.contains(r#""old_date":{"$date":{"$numberLong":"-5"}}"#));
    }

    #[test]
    fn exactly_representable_int64_emits_plain() {
        let mut doc = Document::new();
        doc.set("two_53", 2i64.pow(53)).unwrap();
        let text = String::from_utf8(ExtendedJsonEncoder::new().encode(&doc).unwrap()).unwrap();
        assert_eq!(text, r#"{"two_53":9007199254740992}"#);
        // The reverse direction accepts the wrapper form too.
        let doc = ExtendedJsonDecoder::new()
            .decode(br#"{"two_53":{"$numberLong":"9007199254740992"}}"#)
            .unwrap();
        assert_eq!(doc.get_i64("two_53").unwrap(), 2i64.pow(53));
    }

    #[test]
    fn top_level_wrapper_is_not_a_document() {
        let err = ExtendedJsonDecoder::new()
            .decode(br#"{"$numberInt":"5"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::DataCorrupted { .. }));
    }

    #[test]
    fn decode_value_accepts_fragments() {
        let value = ExtendedJsonDecoder::new()
            .decode_value(br#"{"$numberLong":"99"}"#)
            .unwrap();
        assert_eq!(value, Bson::Int64(99));
        let value = ExtendedJsonDecoder::new().decode_value(b"[1,2]").unwrap();
        assert_eq!(value, Bson::Array(Array::from_values([1i32, 2]).unwrap()));
    }

    #[test]
    fn key_order_survives() {
        let text = r#"{"z":1,"a":2,"m":3}"#;
        assert_eq!(reencode(text, ExtJsonFormat::Relaxed), text);
    }
}
