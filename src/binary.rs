//! Binary payloads and the invariants their subtypes impose.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{Error, Result};
use crate::marker::BinarySubtype;

const UUID_LENGTH: usize = 16;

/// A BSON binary value: a subtype byte plus the payload bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Binary {
    pub subtype: BinarySubtype,
    pub bytes: Vec<u8>,
}

impl Binary {
    /// Build a binary value, enforcing the subtype invariants: UUID
    /// payloads must be exactly 16 bytes.
    ///
    /// Reserved subtypes cannot be expressed by [`BinarySubtype`] and
    /// are refused at its construction instead.
    pub fn new(subtype: BinarySubtype, bytes: Vec<u8>) -> Result<Binary> {
        if subtype == BinarySubtype::Uuid && bytes.len() != UUID_LENGTH {
            return Err(Error::InvalidArgument(format!(
                "UUID binary must hold exactly {} bytes, got {}",
                UUID_LENGTH,
                bytes.len()
            )));
        }
        Ok(Binary { subtype, bytes })
    }

    /// A generic (subtype 0x00) binary value.
    pub fn generic(bytes: Vec<u8>) -> Binary {
        Binary {
            subtype: BinarySubtype::Generic,
            bytes,
        }
    }

    /// A UUID (subtype 0x04) binary value.
    pub fn uuid(bytes: [u8; UUID_LENGTH]) -> Binary {
        Binary {
            subtype: BinarySubtype::Uuid,
            bytes: bytes.to_vec(),
        }
    }

    /// Decode a base64 payload, as found in Extended JSON `$binary`
    /// wrappers.
    pub fn from_base64(b64: &str, subtype: BinarySubtype) -> Result<Binary> {
        let bytes = BASE64.decode(b64).map_err(|_| {
            Error::InvalidArgument(format!("\"{}\" is not valid base64", b64))
        })?;
        Binary::new(subtype, bytes)
    }

    /// The payload as standard base64 text.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uuid_requires_16_bytes() {
        assert!(Binary::new(BinarySubtype::Uuid, vec![0u8; 16]).is_ok());
        assert!(Binary::new(BinarySubtype::Uuid, vec![0u8; 15]).is_err());
        assert!(Binary::new(BinarySubtype::Uuid, vec![0u8; 17]).is_err());
    }

    #[test]
    fn base64_round_trip() {
        let bin = Binary::from_base64("//8=", BinarySubtype::Generic).unwrap();
        assert_eq!(bin.bytes, [0xFF, 0xFF]);
        assert_eq!(bin.to_base64(), "//8=");
    }

    #[test]
    fn bad_base64_rejected() {
        let err = Binary::from_base64("not/base64!!", BinarySubtype::Generic).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
