//! BSON ObjectIds and the process-wide generator behind them.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use rand::{random, thread_rng, Rng};

use crate::error::{Error, Result};

const TIMESTAMP_SIZE: usize = 4;
const PROCESS_ID_SIZE: usize = 5;

const TIMESTAMP_OFFSET: usize = 0;
const PROCESS_ID_OFFSET: usize = TIMESTAMP_OFFSET + TIMESTAMP_SIZE;
const COUNTER_OFFSET: usize = PROCESS_ID_OFFSET + PROCESS_ID_SIZE;

const MAX_U24: u32 = 0xFF_FFFF;

// The counter seed comes from the thread RNG; the 5-byte field is drawn
// once per process and shared by every generated id.
static OID_COUNTER: Lazy<AtomicU32> =
    Lazy::new(|| AtomicU32::new(thread_rng().gen_range(0..=MAX_U24)));
static PROCESS_RANDOM: Lazy<[u8; PROCESS_ID_SIZE]> = Lazy::new(random);

/// A 12-byte BSON ObjectId: 4-byte big-endian seconds since the Unix
/// epoch, a 5-byte per-process random value, and a 3-byte big-endian
/// counter that wraps at 2^24.
///
/// Ids generated within one process share the random field and carry
/// strictly increasing counter values modulo 2^24; the increment is
/// atomic, so concurrent generators never observe the same counter.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    id: [u8; 12],
}

impl ObjectId {
    /// Generate a fresh id from the process-wide generator.
    pub fn new() -> ObjectId {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let counter = OID_COUNTER.fetch_add(1, Ordering::SeqCst) & MAX_U24;

        let mut id = [0u8; 12];
        id[TIMESTAMP_OFFSET..PROCESS_ID_OFFSET].copy_from_slice(&timestamp.to_be_bytes());
        id[PROCESS_ID_OFFSET..COUNTER_OFFSET].copy_from_slice(&*PROCESS_RANDOM);
        id[COUNTER_OFFSET..].copy_from_slice(&counter.to_be_bytes()[1..]);
        ObjectId { id }
    }

    /// The raw 12 bytes, exactly as stored on the wire.
    pub const fn bytes(&self) -> [u8; 12] {
        self.id
    }

    /// The embedded big-endian timestamp, in seconds since the Unix
    /// epoch.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.id[0], self.id[1], self.id[2], self.id[3]])
    }

    /// The lowercase 24-character hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Parse a 24-character hex string, either case.
    pub fn parse_str(s: &str) -> Result<ObjectId> {
        let bytes = hex::decode(s).map_err(|_| {
            Error::InvalidArgument(format!("\"{}\" is not a valid ObjectId hex string", s))
        })?;
        let id: [u8; 12] = bytes.try_into().map_err(|_| {
            Error::InvalidArgument(format!(
                "\"{}\" is not 24 hex characters, cannot be an ObjectId",
                s
            ))
        })?;
        Ok(ObjectId { id })
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[u8; 12]> for ObjectId {
    fn from(bytes: [u8; 12]) -> Self {
        ObjectId { id: bytes }
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObjectId(\"{}\")", self.to_hex())
    }
}
