//! Binary-Coded-Decimal fixed-point numbers, as used by the X Protocol `DECIMAL` column
//! type. Distinct from the NEWDECIMAL binary layout used by the classic replication
//! protocol; this format packs ASCII-style decimal digits two per byte with a trailing
//! sign nibble rather than base-10^9 binary groups.

use std::fmt;
use std::str::FromStr;

use common::err::{Error, XResult};
use num_bigint::BigUint;

const SIGN_POSITIVE: u8 = 0xC;
const SIGN_NEGATIVE: u8 = 0xD;

/// A fixed-point decimal: `sign * digits * 10^-scale`. `digits` is the full decimal digit
/// sequence (integer part followed by fractional part), most significant digit first, so
/// that scale and leading/trailing zeros round-trip exactly through re-encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decimal {
    negative: bool,
    scale: u8,
    digits: Vec<u8>,
}

impl Decimal {
    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// The magnitude as an arbitrary-precision integer, ignoring the decimal point.
    pub fn unscaled_magnitude(&self) -> BigUint {
        let mut value = BigUint::from(0u32);
        for &digit in &self.digits {
            value = value * 10u32 + BigUint::from(digit as u32);
        }
        value
    }

    pub fn decode_bcd(bytes: &[u8]) -> XResult<Decimal> {
        let (&scale, data) = bytes
            .split_first()
            .ok_or_else(|| Error::decode("empty DECIMAL payload"))?;
        if data.is_empty() {
            return Err(Error::decode("DECIMAL payload missing digit/sign bytes"));
        }

        let mut digits = Vec::with_capacity(data.len() * 2);
        let (body, last) = data.split_at(data.len() - 1);
        let last = last[0];

        for &byte in body {
            push_digit_nibble(&mut digits, byte >> 4)?;
            push_digit_nibble(&mut digits, byte & 0x0F)?;
        }

        let low = last & 0x0F;
        let high = last >> 4;
        let negative = if low == SIGN_POSITIVE || low == SIGN_NEGATIVE {
            push_digit_nibble(&mut digits, high)?;
            low == SIGN_NEGATIVE
        } else if high == SIGN_POSITIVE || high == SIGN_NEGATIVE {
            if low != 0 {
                return Err(Error::decode("DECIMAL sign byte has nonzero low nibble"));
            }
            high == SIGN_NEGATIVE
        } else {
            return Err(Error::decode("DECIMAL payload missing a sign nibble"));
        };

        Ok(Decimal { negative, scale, digits })
    }

    pub fn encode_bcd(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.digits.len() / 2);
        out.push(self.scale);

        let sign = if self.negative { SIGN_NEGATIVE } else { SIGN_POSITIVE };
        let mut chunks = self.digits.chunks_exact(2);
        for pair in chunks.by_ref() {
            out.push((pair[0] << 4) | pair[1]);
        }
        match chunks.remainder() {
            [last] => out.push((*last << 4) | sign),
            [] => out.push(sign << 4),
            _ => unreachable!("chunks_exact(2) remainder is at most one element"),
        }
        out
    }
}

fn push_digit_nibble(digits: &mut Vec<u8>, nibble: u8) -> XResult<()> {
    if nibble > 9 {
        return Err(Error::decode(format!("invalid BCD digit nibble {nibble:#x}")));
    }
    digits.push(nibble);
    Ok(())
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        let scale = self.scale as usize;
        if scale >= self.digits.len() {
            write!(f, "0.")?;
            for _ in 0..(scale - self.digits.len()) {
                write!(f, "0")?;
            }
            for &d in &self.digits {
                write!(f, "{d}")?;
            }
        } else {
            let split = self.digits.len() - scale;
            for &d in &self.digits[..split] {
                write!(f, "{d}")?;
            }
            if scale > 0 {
                write!(f, ".")?;
                for &d in &self.digits[split..] {
                    write!(f, "{d}")?;
                }
            }
        }
        Ok(())
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (int_part, frac_part) = match rest.split_once('.') {
            Some((i, f)) => (i, f),
            None => (rest, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(Error::argument("empty decimal literal"));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::argument(format!("invalid decimal literal: {s}")));
        }

        let int_part = if int_part.is_empty() { "0" } else { int_part };
        let scale = frac_part.len();
        if scale > u8::MAX as usize {
            return Err(Error::argument("decimal scale exceeds 255"));
        }

        let mut digits = Vec::with_capacity(int_part.len() + frac_part.len());
        for c in int_part.chars().chain(frac_part.chars()) {
            digits.push(c.to_digit(10).unwrap() as u8);
        }

        Ok(Decimal { negative, scale: scale as u8, digits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(s: &str) {
        let decimal: Decimal = s.parse().unwrap();
        let encoded = decimal.encode_bcd();
        let decoded = Decimal::decode_bcd(&encoded).unwrap();
        assert_eq!(decimal, decoded, "round trip mismatch for {s}");
        assert_eq!(decimal.to_string(), s);
    }

    #[test]
    fn round_trips_positive_with_trailing_zeros() {
        round_trip("123.4500");
    }

    #[test]
    fn round_trips_negative() {
        round_trip("-123456789.0100");
    }

    #[test]
    fn round_trips_leading_zero_fraction() {
        round_trip("0.05");
    }

    #[test]
    fn round_trips_whole_number() {
        round_trip("42");
    }

    #[test]
    fn rejects_bad_digit_nibble() {
        let bytes = [2u8, 0xAB, 0x0C];
        assert!(Decimal::decode_bcd(&bytes).is_err());
    }

    #[test]
    fn rejects_missing_sign_nibble() {
        let bytes = [2u8, 0x12, 0x34];
        assert!(Decimal::decode_bcd(&bytes).is_err());
    }

    #[test]
    fn scale_distinguishes_equal_values() {
        let a: Decimal = "123.45".parse().unwrap();
        let b: Decimal = "123.4500".parse().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.unscaled_magnitude(), BigUint::from(12345u32));
    }
}
