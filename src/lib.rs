//! Encoding and decoding of BSON and its Extended JSON text forms.
//!
//! BSON is the length-prefixed binary document format MongoDB stores
//! and speaks on the wire. It extends the JSON data model with typed
//! scalars: 32- and 64-bit integers, decimal floating point, datetimes,
//! ObjectIds, binary blobs with subtypes, timestamps, and the min/max
//! sentinels.
//!
//! The crate is built around three layers:
//!
//! - the value model: [`Bson`], the tagged union over every BSON type,
//!   and [`Document`], an insertion-ordered keyed container stored as
//!   the raw bytes of its own wire envelope;
//! - the binary codec: byte-exact reading and writing of every type,
//!   reachable through [`Document::from_bytes`], [`Document::as_bytes`],
//!   and the payload-level [`Bson::read`] / [`Bson::write`];
//! - Extended JSON: [`ExtendedJsonEncoder`] and [`ExtendedJsonDecoder`]
//!   for the canonical and relaxed text profiles, including the legacy
//!   wrapper forms on input.
//!
//! [`Decimal128`] implements the IEEE 754-2008 decimal128 interchange
//! encoding with string conversion in both directions, and
//! [`ObjectId`] carries the process-wide id generator.
//!
//! ```
//! use bsonic::{Document, ExtendedJsonEncoder};
//!
//! # fn main() -> bsonic::Result<()> {
//! let mut doc = Document::new();
//! doc.set("hello", "world")?;
//! assert_eq!(doc.as_bytes()[4], 0x02); // a string element
//!
//! let text = ExtendedJsonEncoder::new().encode(&doc)?;
//! assert_eq!(text, br#"{"hello":"world"}"#);
//! # Ok(())
//! # }
//! ```

mod binary;
mod buffer;
mod datetime;
mod decimal128;
mod document;
mod element;
mod error;
mod extjson;
mod marker;
mod oid;
mod timestamp;
mod value;

pub use self::binary::Binary;
pub use self::buffer::Reader;
pub use self::datetime::DateTime;
pub use self::decimal128::Decimal128;
pub use self::document::{Array, Document, Iter};
pub use self::element::{Element, RawEntry, RawIter};
pub use self::error::{Error, Result};
pub use self::extjson::{ExtJsonFormat, ExtendedJsonDecoder, ExtendedJsonEncoder};
pub use self::marker::{BinarySubtype, ElementType};
pub use self::oid::ObjectId;
pub use self::timestamp::Timestamp;
pub use self::value::{Bson, DbPointer, JavaScriptCodeWithScope, Regex};

/// Largest allowed document envelope: 16 MiB, the wire format's cap.
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;
