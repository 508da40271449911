//! IEEE 754-2008 128-bit decimal floating point, binary integer
//! significand encoding.
//!
//! The value is held as the two 64-bit halves of the encoding. On the
//! wire the low half is written first, both little-endian. Reading
//! accepts both the "small" significand encoding and the "large" one
//! (implicit leading `100` bits); writing always produces the small
//! form, and any encoding whose significand exceeds 34 decimal digits
//! decodes as zero, per the BSON compatibility rule.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

const EXPONENT_MAX: i128 = 6111;
const EXPONENT_MIN: i128 = -6176;
const EXPONENT_BIAS: i128 = 6176;
const MAX_DIGITS: usize = 34;

// 10^34 - 1, the largest canonical significand.
const MAX_SIGNIFICAND: u128 = 9_999_999_999_999_999_999_999_999_999_999_999;

const SIGN_BIT: u64 = 1 << 63;
const NAN_HIGH: u64 = 0x7C00_0000_0000_0000;
const INFINITY_HIGH: u64 = 0x7800_0000_0000_0000;

// Combination-field probes on the high word.
const COMBINATION_NAN: u64 = 0b11111;
const COMBINATION_INFINITY: u64 = 0b11110;

const SMALL_SIGNIFICAND_MASK: u64 = (1 << 49) - 1;

static DECIMAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<sign>[-+])?(?P<int>\d*)(?:\.(?P<frac>\d*))?(?:[eE](?P<expsign>[-+])?(?P<exp>\d+))?$")
        .unwrap()
});
static INFINITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?P<sign>[-+])?inf(inity)?$").unwrap());
static NAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^[-+]?nan$").unwrap());

/// A 128-bit decimal floating-point value.
///
/// Equality and hashing are on the bit pattern, so distinct encodings of
/// the same numeric value (different exponents) compare unequal, and NaN
/// compares equal to itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal128 {
    high: u64,
    low: u64,
}

impl Decimal128 {
    /// The quiet NaN bit pattern.
    pub const NAN: Decimal128 = Decimal128 {
        high: NAN_HIGH,
        low: 0,
    };
    /// Positive infinity.
    pub const INFINITY: Decimal128 = Decimal128 {
        high: INFINITY_HIGH,
        low: 0,
    };
    /// Negative infinity.
    pub const NEG_INFINITY: Decimal128 = Decimal128 {
        high: SIGN_BIT | INFINITY_HIGH,
        low: 0,
    };

    pub(crate) const fn from_wire(low: u64, high: u64) -> Decimal128 {
        Decimal128 { high, low }
    }

    pub(crate) const fn wire_halves(&self) -> (u64, u64) {
        (self.low, self.high)
    }

    /// The 16 wire bytes: low half first, both halves little-endian.
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.low.to_le_bytes());
        out[8..].copy_from_slice(&self.high.to_le_bytes());
        out
    }

    /// Rebuild from the 16 wire bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Decimal128 {
        let low = u64::from_le_bytes(bytes[..8].try_into().unwrap());
        let high = u64::from_le_bytes(bytes[8..].try_into().unwrap());
        Decimal128 { high, low }
    }

    pub fn is_nan(&self) -> bool {
        (self.high >> 58) & 0x1F == COMBINATION_NAN
    }

    pub fn is_infinite(&self) -> bool {
        (self.high >> 58) & 0x1F == COMBINATION_INFINITY
    }

    /// Parse a decimal string such as `"1.2E+10"`, `"-0.5"`,
    /// `"Infinity"`, or `"NaN"`.
    ///
    /// The exponent is adjusted so the significand is an integer, then
    /// clamped toward the representable range: exponents above the
    /// maximum absorb trailing zeros into the significand while it has
    /// room, exponents below the minimum shed trailing zeros. Values
    /// that still fall outside the range, or whose significand exceeds
    /// 34 digits, are refused.
    pub fn parse_str(s: &str) -> Result<Decimal128> {
        if NAN_RE.is_match(s) {
            return Ok(Decimal128::NAN);
        }
        if let Some(caps) = INFINITY_RE.captures(s) {
            return Ok(match caps.name("sign").map(|m| m.as_str()) {
                Some("-") => Decimal128::NEG_INFINITY,
                _ => Decimal128::INFINITY,
            });
        }

        let invalid =
            || Error::InvalidArgument(format!("\"{}\" is not a valid Decimal128 string", s));
        let caps = DECIMAL_RE.captures(s).ok_or_else(invalid)?;

        let negative = caps.name("sign").map(|m| m.as_str()) == Some("-");
        let int_digits = caps.name("int").map_or("", |m| m.as_str());
        let frac_digits = caps.name("frac").map_or("", |m| m.as_str());
        if int_digits.is_empty() && frac_digits.is_empty() {
            return Err(invalid());
        }

        // Exponent math happens in i128; the digit count of the input
        // bounds how far it can drift from the written exponent.
        let mut exponent: i128 = match caps.name("exp") {
            None => 0,
            Some(m) => {
                let magnitude: i128 = m.as_str().parse().map_err(|_| {
                    Error::InvalidArgument(format!(
                        "\"{}\" has an exponent too large to consider",
                        s
                    ))
                })?;
                if caps.name("expsign").map(|m| m.as_str()) == Some("-") {
                    -magnitude
                } else {
                    magnitude
                }
            }
        };
        exponent -= frac_digits.len() as i128;

        let mut digits: Vec<u8> = int_digits
            .bytes()
            .chain(frac_digits.bytes())
            .map(|b| b - b'0')
            .collect();
        while digits.len() > 1 && digits[0] == 0 {
            digits.remove(0);
        }

        // Clamp upward: trailing zeros join the significand while it
        // has room for them.
        while exponent > EXPONENT_MAX && digits.len() < MAX_DIGITS {
            digits.push(0);
            exponent -= 1;
        }
        // Clamp downward: shed trailing zeros.
        while exponent < EXPONENT_MIN && digits.last() == Some(&0) {
            digits.pop();
            exponent += 1;
        }

        if exponent > EXPONENT_MAX {
            return Err(Error::InvalidArgument(format!(
                "\"{}\" overflows Decimal128",
                s
            )));
        }
        if exponent < EXPONENT_MIN {
            return Err(Error::InvalidArgument(format!(
                "\"{}\" underflows Decimal128",
                s
            )));
        }
        if digits.len() > MAX_DIGITS {
            return Err(Error::InvalidArgument(format!(
                "\"{}\" has more than {} significand digits",
                s, MAX_DIGITS
            )));
        }

        let significand = digits
            .iter()
            .fold(0u128, |acc, &d| acc * 10 + u128::from(d));

        let biased = (exponent + EXPONENT_BIAS) as u64 & 0x3FFF;
        let mut high = (biased << 49) | (significand >> 64) as u64;
        let low = significand as u64;
        if negative {
            high |= SIGN_BIT;
        }
        Ok(Decimal128 { high, low })
    }

    /// Format as the canonical decimal string: plain decimal notation
    /// where the exponent allows it, scientific notation otherwise.
    fn format(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_nan() {
            return f.write_str("NaN");
        }
        let negative = self.high & SIGN_BIT != 0;
        if self.is_infinite() {
            return f.write_str(if negative { "-Infinity" } else { "Infinity" });
        }

        let (exponent, significand) = self.unpack_finite();
        if negative {
            f.write_str("-")?;
        }

        let digits = significand.to_string();
        let len = digits.len() as i128;
        let adjusted = exponent + len - 1;
        if exponent > 0 || adjusted < -6 {
            // Scientific: one leading digit, the rest behind the point.
            f.write_str(&digits[..1])?;
            if len > 1 {
                write!(f, ".{}", &digits[1..])?;
            }
            write!(f, "E{:+}", adjusted)
        } else if exponent == 0 {
            f.write_str(&digits)
        } else {
            let point = len + exponent;
            if point > 0 {
                let point = point as usize;
                write!(f, "{}.{}", &digits[..point], &digits[point..])
            } else {
                f.write_str("0.")?;
                for _ in 0..-point {
                    f.write_str("0")?;
                }
                f.write_str(&digits)
            }
        }
    }

    /// Extract the unbiased exponent and significand of a finite value.
    /// Non-canonical significands (anything above 34 digits, including
    /// every "large" form encoding) collapse to zero.
    fn unpack_finite(&self) -> (i128, u128) {
        let (biased, significand) = if (self.high >> 61) & 0b11 == 0b11 {
            // Large form: exponent sits two bits lower and the
            // significand gains implicit `100` leading bits, which
            // already puts it past the canonical maximum.
            ((self.high >> 47) & 0x3FFF, 0)
        } else {
            let sig =
                ((self.high & SMALL_SIGNIFICAND_MASK) as u128) << 64 | self.low as u128;
            ((self.high >> 49) & 0x3FFF, sig)
        };
        let significand = if significand > MAX_SIGNIFICAND {
            0
        } else {
            significand
        };
        (biased as i128 - EXPONENT_BIAS, significand)
    }
}

impl FromStr for Decimal128 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}

impl fmt::Display for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.format(f)
    }
}

impl fmt::Debug for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Decimal128(\"{}\")", self)
    }
}
