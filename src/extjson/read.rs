//! Extended JSON trees to BSON.
//!
//! Every wrapper probe is tri-state: it declines when its signature key
//! is absent (the caller tries the next type), claims the object when
//! the shape is right, and fails hard when the key is present but the
//! shape is wrong. An object no probe claims is a plain document.

use serde_json::{Map, Number, Value as Json};

use crate::binary::Binary;
use crate::datetime::DateTime;
use crate::decimal128::Decimal128;
use crate::document::{Array, Document};
use crate::error::{Error, Result};
use crate::marker::BinarySubtype;
use crate::oid::ObjectId;
use crate::timestamp::Timestamp;
use crate::value::{Bson, DbPointer, JavaScriptCodeWithScope, Regex};

impl Bson {
    /// Interpret an Extended JSON tree. Both profiles are accepted
    /// interchangeably, as are the legacy v1 `$binary` form and the
    /// `$uuid` shorthand. Errors carry the JSON key path down to the
    /// offending node.
    pub fn from_extended_json(json: Json) -> Result<Bson> {
        let mut path = Vec::new();
        value_from_json(json, &mut path)
    }
}

fn value_from_json(json: Json, path: &mut Vec<String>) -> Result<Bson> {
    match json {
        Json::Null => Ok(Bson::Null),
        Json::Bool(v) => Ok(Bson::Boolean(v)),
        Json::Number(n) => number_from_json(&n, path),
        Json::String(s) => Ok(Bson::String(s)),
        Json::Array(items) => {
            let mut array = Array::new();
            for (index, item) in items.into_iter().enumerate() {
                path.push(index.to_string());
                let value = value_from_json(item, path)?;
                path.pop();
                array.push(value)?;
            }
            Ok(Bson::Array(array))
        }
        Json::Object(map) => object_from_json(map, path),
    }
}

/// Plain JSON numbers land in the narrowest BSON type that holds them.
fn number_from_json(n: &Number, path: &[String]) -> Result<Bson> {
    if let Some(v) = n.as_i64() {
        Ok(match i32::try_from(v) {
            Ok(v) => Bson::Int32(v),
            Err(_) => Bson::Int64(v),
        })
    } else if let Some(v) = n.as_u64() {
        Ok(Bson::Double(v as f64))
    } else if let Some(v) = n.as_f64() {
        Ok(Bson::Double(v))
    } else {
        Err(Error::corrupted(
            path,
            format!("JSON number {} fits no BSON numeric type", n),
        ))
    }
}

fn object_from_json(map: Map<String, Json>, path: &mut Vec<String>) -> Result<Bson> {
    if let Some(v) = try_oid(&map, path)? {
        return Ok(v);
    }
    if let Some(v) = try_symbol(&map, path)? {
        return Ok(v);
    }
    if let Some(v) = try_number_int(&map, path)? {
        return Ok(v);
    }
    if let Some(v) = try_number_long(&map, path)? {
        return Ok(v);
    }
    if let Some(v) = try_number_double(&map, path)? {
        return Ok(v);
    }
    if let Some(v) = try_number_decimal(&map, path)? {
        return Ok(v);
    }
    if let Some(v) = try_binary(&map, path)? {
        return Ok(v);
    }
    if let Some(v) = try_uuid(&map, path)? {
        return Ok(v);
    }
    if let Some(v) = try_code(&map, path)? {
        return Ok(v);
    }
    if let Some(v) = try_timestamp(&map, path)? {
        return Ok(v);
    }
    if let Some(v) = try_regex(&map, path)? {
        return Ok(v);
    }
    if let Some(v) = try_db_pointer(&map, path)? {
        return Ok(v);
    }
    if let Some(v) = try_date(&map, path)? {
        return Ok(v);
    }
    if let Some(v) = try_min_max_key(&map, path)? {
        return Ok(v);
    }
    if let Some(v) = try_undefined(&map, path)? {
        return Ok(v);
    }
    Ok(Bson::Document(document_from_map(map, path)?))
}

fn document_from_map(map: Map<String, Json>, path: &mut Vec<String>) -> Result<Document> {
    let mut doc = Document::new();
    for (key, value) in map {
        path.push(key.clone());
        let value = value_from_json(value, path)?;
        path.pop();
        doc.append(&key, value)?;
    }
    Ok(doc)
}

/// Demote an `InvalidArgument` from a scalar parser to a corrupted-data
/// error carrying the key path.
fn rewrap(path: &[String], e: Error) -> Error {
    match e {
        Error::InvalidArgument(message) => Error::corrupted(path, message),
        other => other,
    }
}

/// The wrapper must hold exactly `keys`, no more and no fewer.
fn exact_keys(
    map: &Map<String, Json>,
    keys: &[&str],
    path: &[String],
    wrapper: &str,
) -> Result<()> {
    if map.len() == keys.len() && keys.iter().all(|k| map.contains_key(*k)) {
        Ok(())
    } else {
        Err(Error::corrupted(
            path,
            format!("{} wrapper holds unexpected keys", wrapper),
        ))
    }
}

fn expect_str<'a>(value: &'a Json, path: &[String], what: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| Error::corrupted(path, format!("{} must be a string", what)))
}

fn try_oid(map: &Map<String, Json>, path: &[String]) -> Result<Option<Bson>> {
    let value = match map.get("$oid") {
        None => return Ok(None),
        Some(v) => v,
    };
    exact_keys(map, &["$oid"], path, "$oid")?;
    let hex = expect_str(value, path, "$oid")?;
    let id = ObjectId::parse_str(hex).map_err(|e| rewrap(path, e))?;
    Ok(Some(Bson::ObjectId(id)))
}

fn try_symbol(map: &Map<String, Json>, path: &[String]) -> Result<Option<Bson>> {
    let value = match map.get("$symbol") {
        None => return Ok(None),
        Some(v) => v,
    };
    exact_keys(map, &["$symbol"], path, "$symbol")?;
    Ok(Some(Bson::Symbol(
        expect_str(value, path, "$symbol")?.to_string(),
    )))
}

fn try_number_int(map: &Map<String, Json>, path: &[String]) -> Result<Option<Bson>> {
    let value = match map.get("$numberInt") {
        None => return Ok(None),
        Some(v) => v,
    };
    exact_keys(map, &["$numberInt"], path, "$numberInt")?;
    let text = expect_str(value, path, "$numberInt")?;
    let v: i32 = text.parse().map_err(|_| {
        Error::corrupted(path, format!("\"{}\" is not a 32-bit integer", text))
    })?;
    Ok(Some(Bson::Int32(v)))
}

fn try_number_long(map: &Map<String, Json>, path: &[String]) -> Result<Option<Bson>> {
    let value = match map.get("$numberLong") {
        None => return Ok(None),
        Some(v) => v,
    };
    exact_keys(map, &["$numberLong"], path, "$numberLong")?;
    let text = expect_str(value, path, "$numberLong")?;
    let v: i64 = text.parse().map_err(|_| {
        Error::corrupted(path, format!("\"{}\" is not a 64-bit integer", text))
    })?;
    Ok(Some(Bson::Int64(v)))
}

fn try_number_double(map: &Map<String, Json>, path: &[String]) -> Result<Option<Bson>> {
    let value = match map.get("$numberDouble") {
        None => return Ok(None),
        Some(v) => v,
    };
    exact_keys(map, &["$numberDouble"], path, "$numberDouble")?;
    let text = expect_str(value, path, "$numberDouble")?;
    let v = match text {
        "Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        "NaN" => f64::NAN,
        other => other.parse().map_err(|_| {
            Error::corrupted(path, format!("\"{}\" is not a double", other))
        })?,
    };
    Ok(Some(Bson::Double(v)))
}

fn try_number_decimal(map: &Map<String, Json>, path: &[String]) -> Result<Option<Bson>> {
    let value = match map.get("$numberDecimal") {
        None => return Ok(None),
        Some(v) => v,
    };
    exact_keys(map, &["$numberDecimal"], path, "$numberDecimal")?;
    let text = expect_str(value, path, "$numberDecimal")?;
    let v = Decimal128::parse_str(text).map_err(|e| rewrap(path, e))?;
    Ok(Some(Bson::Decimal128(v)))
}

fn subtype_from_hex(text: &str, path: &[String]) -> Result<BinarySubtype> {
    if text.is_empty() || text.len() > 2 {
        return Err(Error::corrupted(
            path,
            format!("\"{}\" is not a 1-2 digit hex subtype", text),
        ));
    }
    let byte = u8::from_str_radix(text, 16).map_err(|_| {
        Error::corrupted(path, format!("\"{}\" is not a 1-2 digit hex subtype", text))
    })?;
    BinarySubtype::from_u8(byte).map_err(|e| rewrap(path, e))
}

fn try_binary(map: &Map<String, Json>, path: &[String]) -> Result<Option<Bson>> {
    let value = match map.get("$binary") {
        None => return Ok(None),
        Some(v) => v,
    };
    match value {
        // v2: {"$binary": {"base64": ..., "subType": ...}}
        Json::Object(fields) => {
            exact_keys(map, &["$binary"], path, "$binary")?;
            exact_keys(fields, &["base64", "subType"], path, "$binary")?;
            let b64 = expect_str(&fields["base64"], path, "$binary.base64")?;
            let subtype = subtype_from_hex(
                expect_str(&fields["subType"], path, "$binary.subType")?,
                path,
            )?;
            let binary = Binary::from_base64(b64, subtype).map_err(|e| rewrap(path, e))?;
            Ok(Some(Bson::Binary(binary)))
        }
        // legacy v1: {"$binary": "<b64>", "$type": "<hex or number>"}
        Json::String(b64) => {
            exact_keys(map, &["$binary", "$type"], path, "legacy $binary")?;
            let subtype = match &map["$type"] {
                Json::String(hex) => subtype_from_hex(hex, path)?,
                Json::Number(n) => {
                    let byte = n
                        .as_u64()
                        .and_then(|v| u8::try_from(v).ok())
                        .ok_or_else(|| {
                            Error::corrupted(path, format!("{} is not a subtype byte", n))
                        })?;
                    BinarySubtype::from_u8(byte).map_err(|e| rewrap(path, e))?
                }
                _ => {
                    return Err(Error::corrupted(
                        path,
                        "legacy $type must be a hex string or a number",
                    ))
                }
            };
            let binary = Binary::from_base64(b64, subtype).map_err(|e| rewrap(path, e))?;
            Ok(Some(Bson::Binary(binary)))
        }
        _ => Err(Error::corrupted(
            path,
            "$binary must be an object or a base64 string",
        )),
    }
}

fn try_uuid(map: &Map<String, Json>, path: &[String]) -> Result<Option<Bson>> {
    let value = match map.get("$uuid") {
        None => return Ok(None),
        Some(v) => v,
    };
    exact_keys(map, &["$uuid"], path, "$uuid")?;
    let text = expect_str(value, path, "$uuid")?;
    let segments: Vec<&str> = text.split('-').collect();
    let well_formed = segments.len() == 5
        && segments
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(s, len)| s.len() == len);
    let bytes = if well_formed {
        hex::decode(segments.concat()).ok()
    } else {
        None
    };
    let bytes: [u8; 16] = bytes
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            Error::corrupted(
                path,
                format!("\"{}\" is not a 8-4-4-4-12 hex UUID string", text),
            )
        })?;
    Ok(Some(Bson::Binary(Binary::uuid(bytes))))
}

fn try_code(map: &Map<String, Json>, path: &mut Vec<String>) -> Result<Option<Bson>> {
    let value = match map.get("$code") {
        None => return Ok(None),
        Some(v) => v,
    };
    let code = expect_str(value, path, "$code")?.to_string();
    match map.get("$scope") {
        None => {
            exact_keys(map, &["$code"], path, "$code")?;
            Ok(Some(Bson::JavaScriptCode(code)))
        }
        Some(Json::Object(scope)) => {
            exact_keys(map, &["$code", "$scope"], path, "$code")?;
            path.push("$scope".to_string());
            let scope = document_from_map(scope.clone(), path)?;
            path.pop();
            Ok(Some(Bson::JavaScriptCodeWithScope(
                JavaScriptCodeWithScope { code, scope },
            )))
        }
        Some(_) => Err(Error::corrupted(path, "$scope must be a document")),
    }
}

fn try_timestamp(map: &Map<String, Json>, path: &[String]) -> Result<Option<Bson>> {
    let value = match map.get("$timestamp") {
        None => return Ok(None),
        Some(v) => v,
    };
    exact_keys(map, &["$timestamp"], path, "$timestamp")?;
    let fields = value.as_object().ok_or_else(|| {
        Error::corrupted(path, "$timestamp must be a {\"t\", \"i\"} object")
    })?;
    exact_keys(fields, &["t", "i"], path, "$timestamp")?;
    let part = |name: &str| -> Result<u32> {
        fields[name]
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| {
                Error::corrupted(
                    path,
                    format!("$timestamp.{} must be an unsigned 32-bit number", name),
                )
            })
    };
    Ok(Some(Bson::Timestamp(Timestamp {
        time: part("t")?,
        increment: part("i")?,
    })))
}

fn try_regex(map: &Map<String, Json>, path: &[String]) -> Result<Option<Bson>> {
    let value = match map.get("$regularExpression") {
        None => return Ok(None),
        Some(v) => v,
    };
    exact_keys(map, &["$regularExpression"], path, "$regularExpression")?;
    let fields = value.as_object().ok_or_else(|| {
        Error::corrupted(
            path,
            "$regularExpression must be a {\"pattern\", \"options\"} object",
        )
    })?;
    exact_keys(fields, &["pattern", "options"], path, "$regularExpression")?;
    let regex = Regex::new(
        expect_str(&fields["pattern"], path, "$regularExpression.pattern")?,
        expect_str(&fields["options"], path, "$regularExpression.options")?,
    )
    .map_err(|e| rewrap(path, e))?;
    Ok(Some(Bson::RegularExpression(regex)))
}

fn try_db_pointer(map: &Map<String, Json>, path: &[String]) -> Result<Option<Bson>> {
    let value = match map.get("$dbPointer") {
        None => return Ok(None),
        Some(v) => v,
    };
    exact_keys(map, &["$dbPointer"], path, "$dbPointer")?;
    let fields = value.as_object().ok_or_else(|| {
        Error::corrupted(path, "$dbPointer must be a {\"$ref\", \"$id\"} object")
    })?;
    exact_keys(fields, &["$ref", "$id"], path, "$dbPointer")?;
    let namespace = expect_str(&fields["$ref"], path, "$dbPointer.$ref")?.to_string();
    let id_fields = fields["$id"].as_object().ok_or_else(|| {
        Error::corrupted(path, "$dbPointer.$id must be an ObjectId wrapper")
    })?;
    exact_keys(id_fields, &["$oid"], path, "$dbPointer.$id")?;
    let hex = expect_str(&id_fields["$oid"], path, "$dbPointer.$id.$oid")?;
    let id = ObjectId::parse_str(hex).map_err(|e| rewrap(path, e))?;
    Ok(Some(Bson::DbPointer(DbPointer { namespace, id })))
}

fn try_date(map: &Map<String, Json>, path: &[String]) -> Result<Option<Bson>> {
    let value = match map.get("$date") {
        None => return Ok(None),
        Some(v) => v,
    };
    exact_keys(map, &["$date"], path, "$date")?;
    match value {
        // Relaxed: an ISO-8601 string.
        Json::String(text) => {
            let dt = DateTime::parse_iso_str(text).map_err(|e| rewrap(path, e))?;
            Ok(Some(Bson::DateTime(dt)))
        }
        // Canonical: {"$numberLong": "<ms>"}.
        Json::Object(fields) => {
            exact_keys(fields, &["$numberLong"], path, "$date")?;
            let text = expect_str(&fields["$numberLong"], path, "$date.$numberLong")?;
            let ms: i64 = text.parse().map_err(|_| {
                Error::corrupted(
                    path,
                    format!("\"{}\" is not a millisecond count", text),
                )
            })?;
            Ok(Some(Bson::DateTime(DateTime::from_millis(ms))))
        }
        _ => Err(Error::corrupted(
            path,
            "$date must be an ISO-8601 string or a $numberLong wrapper",
        )),
    }
}

fn try_min_max_key(map: &Map<String, Json>, path: &[String]) -> Result<Option<Bson>> {
    for (key, value) in [("$minKey", Bson::MinKey), ("$maxKey", Bson::MaxKey)] {
        let found = match map.get(key) {
            None => continue,
            Some(v) => v,
        };
        exact_keys(map, &[key], path, key)?;
        if found.as_f64() != Some(1.0) {
            return Err(Error::corrupted(path, format!("{} must hold the number 1", key)));
        }
        return Ok(Some(value));
    }
    Ok(None)
}

fn try_undefined(map: &Map<String, Json>, path: &[String]) -> Result<Option<Bson>> {
    let value = match map.get("$undefined") {
        None => return Ok(None),
        Some(v) => v,
    };
    exact_keys(map, &["$undefined"], path, "$undefined")?;
    if value != &Json::Bool(true) {
        return Err(Error::corrupted(path, "$undefined must hold the value true"));
    }
    Ok(Some(Bson::Undefined))
}
