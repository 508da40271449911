//! Documents kept in their serialized form.
//!
//! A [`Document`] owns the raw bytes of its BSON envelope: the
//! little-endian length prefix, the element sequence, and the trailing
//! terminator. Keyed and indexed access scan forward from the start,
//! so lookups are O(n); in exchange, reads borrow straight out of the
//! buffer, writing a document is a single allocation, and slicing out
//! a subsequence never re-parses values.
//!
//! The buffer is validated on construction and every mutation keeps it
//! valid, so accessors can walk it without surfacing wire errors.

use std::fmt;

use crate::buffer;
use crate::element::{serialize_elem, Element, RawEntry, RawIter};
use crate::error::{Error, Result};
use crate::value::Bson;
use crate::MAX_DOCUMENT_SIZE;

const EMPTY_DOC: [u8; 5] = [5, 0, 0, 0, 0];

/// An ordered mapping from string keys to BSON values, stored as the
/// bytes of its own wire envelope.
///
/// Insertion order is preserved. Duplicate keys are representable (the
/// wire format allows them); keyed accessors act on the first match.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Document {
    buf: Vec<u8>,
}

impl Document {
    /// An empty document.
    pub fn new() -> Document {
        Document {
            buf: EMPTY_DOC.to_vec(),
        }
    }

    /// Take ownership of an encoded document, validating the envelope
    /// and every element in it, nested documents included.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Document> {
        if buf.len() > MAX_DOCUMENT_SIZE {
            return Err(Error::DocumentTooLarge { actual: buf.len() });
        }
        validate_envelope(&buf)?;
        Ok(Document { buf })
    }

    /// Wrap bytes that are already known valid, e.g. a nested envelope
    /// sliced out of a validated parent.
    pub(crate) fn from_vec_unchecked(buf: Vec<u8>) -> Document {
        Document { buf }
    }

    /// The wire bytes, length prefix and terminator included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Total length of the envelope in bytes. Always equal to the
    /// length prefix the document writes.
    pub fn byte_len(&self) -> usize {
        self.buf.len()
    }

    /// Number of entries. O(n): counts by scanning.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() == EMPTY_DOC.len()
    }

    /// Scan the raw entries. Errors cannot surface on a document built
    /// through this API; the iterator form exists for foreign bytes.
    pub fn raw_iter(&self) -> RawIter {
        RawIter::new(&self.buf)
    }

    /// Iterate `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> Iter {
        Iter {
            raw: self.raw_iter(),
        }
    }

    /// Iterate the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.raw_iter().filter_map(Result::ok).map(|e| e.key)
    }

    fn raw_get(&self, key: &str) -> Option<RawEntry> {
        self.raw_iter()
            .filter_map(Result::ok)
            .find(|e| e.key == key)
    }

    /// The value under `key`, decoded. Returns the first match when the
    /// document carries duplicates.
    pub fn get(&self, key: &str) -> Option<Bson> {
        self.raw_get(key).map(|e| Bson::from_element(&e.element))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.raw_get(key).is_some()
    }

    /// The `(key, value)` pair at position `index`. O(n): scans from
    /// the start.
    pub fn entry_at(&self, index: usize) -> Option<(&str, Bson)> {
        self.iter().nth(index)
    }

    /// Set `key` to `value`, replacing the first existing entry with
    /// that key. Returns the replaced value, if any.
    ///
    /// When the replacement element occupies exactly as many bytes as
    /// the old one it is overwritten in place and keeps its position;
    /// otherwise the old entry is spliced out and the new one appended,
    /// so the replaced key moves to the end. Every other entry keeps
    /// its relative order either way.
    pub fn set(&mut self, key: &str, value: impl Into<Bson>) -> Result<Option<Bson>> {
        let value = value.into();
        let entry = encode_entry(key, &value)?;

        let existing = self
            .raw_get(key)
            .map(|e| (e.entry_range(), Bson::from_element(&e.element)));
        match existing {
            Some((range, old)) if range.len() == entry.len() => {
                self.buf[range].copy_from_slice(&entry);
                Ok(Some(old))
            }
            Some((range, old)) => {
                let new_len = self.buf.len() - range.len() + entry.len();
                if new_len > MAX_DOCUMENT_SIZE {
                    return Err(Error::DocumentTooLarge { actual: new_len });
                }
                self.buf.drain(range);
                self.insert_before_terminator(entry);
                Ok(Some(old))
            }
            None => {
                let new_len = self.buf.len() + entry.len();
                if new_len > MAX_DOCUMENT_SIZE {
                    return Err(Error::DocumentTooLarge { actual: new_len });
                }
                self.insert_before_terminator(entry);
                Ok(None)
            }
        }
    }

    /// Append an entry without looking for an existing key. The way to
    /// deliberately build a document with duplicate keys.
    pub fn append(&mut self, key: &str, value: impl Into<Bson>) -> Result<()> {
        let entry = encode_entry(key, &value.into())?;
        let new_len = self.buf.len() + entry.len();
        if new_len > MAX_DOCUMENT_SIZE {
            return Err(Error::DocumentTooLarge { actual: new_len });
        }
        self.insert_before_terminator(entry);
        Ok(())
    }

    /// Remove the first entry with `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Bson> {
        let (range, old) = self
            .raw_get(key)
            .map(|e| (e.entry_range(), Bson::from_element(&e.element)))?;
        self.buf.drain(range);
        self.set_length_prefix();
        Some(old)
    }

    /// Build a document from `(key, value)` pairs, appending in order.
    pub fn from_entries<K, V, I>(entries: I) -> Result<Document>
    where
        K: AsRef<str>,
        V: Into<Bson>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut doc = Document::new();
        for (key, value) in entries {
            doc.append(key.as_ref(), value)?;
        }
        Ok(doc)
    }

    /// A fresh document holding the entries at positions
    /// `[start, end)`. Out-of-range bounds clamp.
    pub fn subsequence(&self, start: usize, end: usize) -> Document {
        let mut out = Document::new();
        for (i, entry) in self.raw_iter().filter_map(Result::ok).enumerate() {
            if i >= start && i < end {
                out.push_raw(&entry);
            }
        }
        out
    }

    /// The first `n` entries.
    pub fn prefix(&self, n: usize) -> Document {
        self.subsequence(0, n)
    }

    /// Everything but the first `n` entries.
    pub fn drop_first(&self, n: usize) -> Document {
        self.subsequence(n, usize::MAX)
    }

    /// The last `n` entries.
    pub fn suffix(&self, n: usize) -> Document {
        let len = self.len();
        self.subsequence(len.saturating_sub(n), len)
    }

    /// Everything but the last `n` entries.
    pub fn drop_last(&self, n: usize) -> Document {
        let len = self.len();
        self.subsequence(0, len.saturating_sub(n))
    }

    /// The leading run of entries for which `pred` holds.
    pub fn prefix_while(&self, mut pred: impl FnMut(&str, &Bson) -> bool) -> Document {
        let mut out = Document::new();
        for entry in self.raw_iter().filter_map(Result::ok) {
            if !pred(entry.key, &Bson::from_element(&entry.element)) {
                break;
            }
            out.push_raw(&entry);
        }
        out
    }

    /// Everything after the leading run of entries for which `pred`
    /// holds.
    pub fn drop_while(&self, mut pred: impl FnMut(&str, &Bson) -> bool) -> Document {
        let mut out = Document::new();
        let mut dropping = true;
        for entry in self.raw_iter().filter_map(Result::ok) {
            if dropping && pred(entry.key, &Bson::from_element(&entry.element)) {
                continue;
            }
            dropping = false;
            out.push_raw(&entry);
        }
        out
    }

    /// Transform every entry. Fails only if a transformed entry pushes
    /// the result past the size limit.
    pub fn map(&self, mut f: impl FnMut(&str, Bson) -> (String, Bson)) -> Result<Document> {
        let mut out = Document::new();
        for (key, value) in self.iter() {
            let (key, value) = f(key, value);
            out.append(&key, value)?;
        }
        Ok(out)
    }

    /// Keep the entries for which `pred` holds.
    pub fn filter(&self, mut pred: impl FnMut(&str, &Bson) -> bool) -> Document {
        let mut out = Document::new();
        for entry in self.raw_iter().filter_map(Result::ok) {
            if pred(entry.key, &Bson::from_element(&entry.element)) {
                out.push_raw(&entry);
            }
        }
        out
    }

    /// Split around entries matching `is_separator`, dropping the
    /// separators. At most `max_splits` cuts are made; the remainder,
    /// separators included, lands in the final piece. With
    /// `omitting_empty`, pieces with no entries disappear from the
    /// result.
    pub fn split(
        &self,
        mut is_separator: impl FnMut(&str, &Bson) -> bool,
        max_splits: Option<usize>,
        omitting_empty: bool,
    ) -> Vec<Document> {
        let max_splits = max_splits.unwrap_or(usize::MAX);
        let mut pieces = Vec::new();
        let mut current = Document::new();
        let mut splits = 0;
        for entry in self.raw_iter().filter_map(Result::ok) {
            let separator = splits < max_splits
                && is_separator(entry.key, &Bson::from_element(&entry.element));
            if separator {
                splits += 1;
                if !(omitting_empty && current.is_empty()) {
                    pieces.push(std::mem::take(&mut current));
                }
            } else {
                current.push_raw(&entry);
            }
        }
        if !(omitting_empty && current.is_empty()) {
            pieces.push(current);
        }
        pieces
    }

    // --- typed accessors ------------------------------------------------

    fn typed<'a, T>(
        &'a self,
        key: &str,
        expected: &'static str,
        pick: impl FnOnce(&Element<'a>) -> Option<T>,
    ) -> Result<T> {
        let entry = self.raw_get(key).ok_or_else(|| Error::TypeMismatch {
            key: key.to_string(),
            expected,
            actual: "no value",
        })?;
        let actual = entry.element.name();
        pick(&entry.element).ok_or_else(|| Error::TypeMismatch {
            key: key.to_string(),
            expected,
            actual,
        })
    }

    pub fn get_str(&self, key: &str) -> Result<&str> {
        self.typed(key, "string", |e| match e {
            Element::Str(s) => Some(*s),
            _ => None,
        })
    }

    pub fn get_i32(&self, key: &str) -> Result<i32> {
        self.typed(key, "int32", |e| match e {
            Element::Int32(v) => Some(*v),
            _ => None,
        })
    }

    pub fn get_i64(&self, key: &str) -> Result<i64> {
        self.typed(key, "int64", |e| match e {
            Element::Int64(v) => Some(*v),
            _ => None,
        })
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        self.typed(key, "double", |e| match e {
            Element::Double(v) => Some(*v),
            _ => None,
        })
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.typed(key, "bool", |e| match e {
            Element::Bool(v) => Some(*v),
            _ => None,
        })
    }

    pub fn get_document(&self, key: &str) -> Result<Document> {
        self.typed(key, "document", |e| match e {
            Element::Doc(d) => Some(Document::from_vec_unchecked(d.to_vec())),
            _ => None,
        })
    }

    pub fn get_array(&self, key: &str) -> Result<Array> {
        self.typed(key, "array", |e| match e {
            Element::Arr(d) => Some(Array::from_document(Document::from_vec_unchecked(
                d.to_vec(),
            ))),
            _ => None,
        })
    }

    pub fn get_object_id(&self, key: &str) -> Result<crate::oid::ObjectId> {
        self.typed(key, "objectid", |e| match e {
            Element::ObjectId(id) => Some(*id),
            _ => None,
        })
    }

    pub fn get_datetime(&self, key: &str) -> Result<crate::datetime::DateTime> {
        self.typed(key, "datetime", |e| match e {
            Element::DateTime(dt) => Some(*dt),
            _ => None,
        })
    }

    pub fn get_binary(&self, key: &str) -> Result<crate::binary::Binary> {
        self.typed(key, "binary", |e| match e {
            Element::Bin { subtype, data } => Some(crate::binary::Binary {
                subtype: *subtype,
                bytes: data.to_vec(),
            }),
            _ => None,
        })
    }

    pub fn get_decimal128(&self, key: &str) -> Result<crate::decimal128::Decimal128> {
        self.typed(key, "decimal128", |e| match e {
            Element::Decimal128(d) => Some(*d),
            _ => None,
        })
    }

    // --- internals ------------------------------------------------------

    /// Copy an already-encoded entry in at the end. Only used with
    /// entries lifted out of a validated document no larger than this
    /// one can become.
    fn push_raw(&mut self, entry: &RawEntry) {
        let mut bytes = Vec::with_capacity(entry.entry_range().len());
        bytes.push(entry.element.element_type().into());
        buffer::write_cstr(&mut bytes, entry.key);
        serialize_elem(&mut bytes, &entry.element);
        self.insert_before_terminator(bytes);
    }

    fn insert_before_terminator(&mut self, entry: Vec<u8>) {
        let terminator = self.buf.len() - 1;
        self.buf.splice(terminator..terminator, entry);
        self.set_length_prefix();
    }

    fn set_length_prefix(&mut self) {
        let len = self.buf.len() as i32;
        self.buf[..4].copy_from_slice(&len.to_le_bytes());
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_relaxed_json())
    }
}

fn encode_entry(key: &str, value: &Bson) -> Result<Vec<u8>> {
    if key.as_bytes().contains(&0) {
        return Err(Error::InvalidArgument(format!(
            "key {:?} contains an interior NUL and cannot be a BSON key",
            key
        )));
    }
    if let Bson::RegularExpression(re) = value {
        re.check_cstrings()?;
    }
    let mut entry = Vec::new();
    entry.push(value.element_type().into());
    buffer::write_cstr(&mut entry, key);
    value.write(&mut entry);
    Ok(entry)
}

/// Walk an envelope and everything nested in it, surfacing the first
/// wire inconsistency.
pub(crate) fn validate_envelope(envelope: &[u8]) -> Result<()> {
    for entry in RawIter::new(envelope) {
        let entry = entry?;
        match entry.element {
            Element::Doc(nested) | Element::Arr(nested) => validate_envelope(nested)?,
            Element::CodeWithScope { scope, .. } => validate_envelope(scope)?,
            _ => {}
        }
    }
    Ok(())
}

/// Iterator over a document's `(key, value)` pairs.
pub struct Iter<'a> {
    raw: RawIter<'a>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, Bson);

    fn next(&mut self) -> Option<Self::Item> {
        // Errors cannot occur on a validated document.
        let entry = self.raw.next()?.ok()?;
        Some((entry.key, Bson::from_element(&entry.element)))
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a str, Bson);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// A document viewed as a sequence: the keys are the decimal indices
/// `"0".."N-1"` in order. Converting between the two views touches no
/// bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Array(Document);

impl Array {
    pub fn new() -> Array {
        Array(Document::new())
    }

    /// Append a value under the next index key.
    pub fn push(&mut self, value: impl Into<Bson>) -> Result<()> {
        let index = self.0.len();
        self.0.append(&index.to_string(), value)
    }

    /// The value at `index`. O(n), like the keyed document lookup it
    /// wraps.
    pub fn get(&self, index: usize) -> Option<Bson> {
        self.0.get(&index.to_string())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Bson> + '_ {
        self.0.iter().map(|(_, value)| value)
    }

    /// Collect values into an array, indexing from zero.
    pub fn from_values<V, I>(values: I) -> Result<Array>
    where
        V: Into<Bson>,
        I: IntoIterator<Item = V>,
    {
        let mut array = Array::new();
        for value in values {
            array.push(value)?;
        }
        Ok(array)
    }

    /// View a document as an array. The keys are taken on faith; wire
    /// data written by other producers is indexed in entry order
    /// regardless of what its keys say.
    pub fn from_document(doc: Document) -> Array {
        Array(doc)
    }

    pub fn into_document(self) -> Document {
        self.0
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }
}
