//! BSON to Extended JSON trees.

use serde_json::{json, Map, Number, Value as Json};

use super::ExtJsonFormat;
use crate::document::Document;
use crate::value::Bson;

impl Bson {
    /// The canonical Extended JSON rendering: every non-JSON-native
    /// type in its `$` wrapper.
    pub fn to_canonical_json(&self) -> Json {
        write_value(self, ExtJsonFormat::Canonical)
    }

    /// The relaxed Extended JSON rendering: plain JSON numbers and date
    /// strings where lossless, canonical wrappers everywhere else.
    pub fn to_relaxed_json(&self) -> Json {
        write_value(self, ExtJsonFormat::Relaxed)
    }
}

impl Document {
    pub fn to_canonical_json(&self) -> Json {
        write_document(self, ExtJsonFormat::Canonical)
    }

    pub fn to_relaxed_json(&self) -> Json {
        write_document(self, ExtJsonFormat::Relaxed)
    }
}

fn write_document(doc: &Document, format: ExtJsonFormat) -> Json {
    let mut out = Map::new();
    for (key, value) in doc.iter() {
        out.insert(key.to_string(), write_value(&value, format));
    }
    Json::Object(out)
}

/// Canonical `$numberDouble` payload. Whole finite doubles keep a
/// trailing `.0` so the text names a double unambiguously.
fn double_string(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "Infinity".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

fn write_value(value: &Bson, format: ExtJsonFormat) -> Json {
    let relaxed = format == ExtJsonFormat::Relaxed;
    match value {
        Bson::Double(v) => {
            if relaxed {
                if let Some(n) = Number::from_f64(*v) {
                    return Json::Number(n);
                }
            }
            json!({ "$numberDouble": double_string(*v) })
        }
        Bson::String(s) => Json::String(s.clone()),
        Bson::Document(d) => write_document(d, format),
        Bson::Array(a) => Json::Array(a.iter().map(|v| write_value(&v, format)).collect()),
        Bson::Binary(b) => json!({
            "$binary": {
                "base64": b.to_base64(),
                "subType": format!("{:02x}", b.subtype.into_u8()),
            }
        }),
        Bson::Undefined => json!({ "$undefined": true }),
        Bson::ObjectId(id) => json!({ "$oid": id.to_hex() }),
        Bson::Boolean(v) => Json::Bool(*v),
        Bson::DateTime(dt) => {
            if relaxed {
                if let Ok(iso) = dt.to_iso_string() {
                    return json!({ "$date": iso });
                }
            }
            json!({ "$date": { "$numberLong": dt.timestamp_millis().to_string() } })
        }
        Bson::Null => Json::Null,
        Bson::RegularExpression(re) => json!({
            "$regularExpression": { "pattern": re.pattern, "options": re.options }
        }),
        Bson::DbPointer(p) => json!({
            "$dbPointer": { "$ref": p.namespace, "$id": { "$oid": p.id.to_hex() } }
        }),
        Bson::JavaScriptCode(s) => json!({ "$code": s }),
        Bson::Symbol(s) => json!({ "$symbol": s }),
        Bson::JavaScriptCodeWithScope(c) => json!({
            "$code": c.code,
            "$scope": write_document(&c.scope, format),
        }),
        Bson::Int32(v) => {
            if relaxed {
                Json::Number(Number::from(*v))
            } else {
                json!({ "$numberInt": v.to_string() })
            }
        }
        Bson::Timestamp(ts) => json!({
            "$timestamp": { "t": ts.time, "i": ts.increment }
        }),
        Bson::Int64(v) => {
            // Plain only when the double image round-trips; 2^53 itself
            // is exact and stays plain. The comparison runs in i128
            // because an i64 cast of the image would saturate and pass
            // values near the top of the range.
            if relaxed && (*v as f64) as i128 == *v as i128 {
                Json::Number(Number::from(*v))
            } else {
                json!({ "$numberLong": v.to_string() })
            }
        }
        Bson::Decimal128(d) => json!({ "$numberDecimal": d.to_string() }),
        Bson::MinKey => json!({ "$minKey": 1 }),
        Bson::MaxKey => json!({ "$maxKey": 1 }),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datetime::DateTime;
    use crate::timestamp::Timestamp;

    #[test]
    fn canonical_double_strings() {
        assert_eq!(double_string(5.05), "5.05");
        assert_eq!(double_string(4.0), "4.0");
        assert_eq!(double_string(-0.0), "-0.0");
        assert_eq!(double_string(f64::NAN), "NaN");
        assert_eq!(double_string(f64::INFINITY), "Infinity");
        assert_eq!(double_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn canonical_wrappers() {
        assert_eq!(
            Bson::Int32(42).to_canonical_json(),
            json!({ "$numberInt": "42" })
        );
        assert_eq!(
            Bson::Int64(-9).to_canonical_json(),
            json!({ "$numberLong": "-9" })
        );
        assert_eq!(
            Bson::DateTime(DateTime::from_millis(0)).to_canonical_json(),
            json!({ "$date": { "$numberLong": "0" } })
        );
        assert_eq!(
            Bson::Timestamp(Timestamp {
                time: 4,
                increment: 9
            })
            .to_canonical_json(),
            json!({ "$timestamp": { "t": 4, "i": 9 } })
        );
        assert_eq!(Bson::MinKey.to_canonical_json(), json!({ "$minKey": 1 }));
        assert_eq!(
            Bson::Undefined.to_canonical_json(),
            json!({ "$undefined": true })
        );
    }

    #[test]
    fn relaxed_numbers_are_plain() {
        assert_eq!(Bson::Int32(42).to_relaxed_json(), json!(42));
        assert_eq!(Bson::Int64(-9).to_relaxed_json(), json!(-9));
        assert_eq!(Bson::Double(5.05).to_relaxed_json(), json!(5.05));
    }

    #[test]
    fn relaxed_date_uses_iso_in_window() {
        assert_eq!(
            Bson::DateTime(DateTime::from_millis(978_312_200_000)).to_relaxed_json(),
            json!({ "$date": "2001-01-01T01:23:20Z" })
        );
        assert_eq!(
            Bson::DateTime(DateTime::from_millis(-1)).to_relaxed_json(),
            json!({ "$date": { "$numberLong": "-1" } })
        );
    }

    #[test]
    fn null_and_bool_are_native_in_both_profiles() {
        assert_eq!(Bson::Null.to_canonical_json(), Json::Null);
        assert_eq!(Bson::Boolean(true).to_relaxed_json(), Json::Bool(true));
    }
}
