//! Arbitrary-precision non-negative integers with a single-word fast path.
//!
//! Polynomial coefficients are almost always small, so [`BigNum`] keeps
//! values that fit a `u64` inline and only spills to a heap-allocated
//! [`num_bigint::BigUint`] when an operation overflows. The representation
//! is normalised: a value that fits one word is always held inline, so
//! `Eq`/`Ord`/`Hash` never observe two representations of the same number.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::ops::{Add, AddAssign, Mul, MulAssign};

use num_bigint::{BigInt, BigUint};
use num_traits::Pow;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Repr {
    Small(u64),
    Big(BigUint),
}

/// A non-negative integer of arbitrary size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigNum(Repr);

impl BigNum {
    pub fn zero() -> Self {
        BigNum(Repr::Small(0))
    }

    pub fn one() -> Self {
        BigNum(Repr::Small(1))
    }

    pub fn is_zero(&self) -> bool {
        match &self.0 {
            Repr::Small(v) => *v == 0,
            // Normalisation keeps zero inline.
            Repr::Big(_) => false,
        }
    }

    /// Restore the inline representation when the value fits one word.
    fn normalize(self) -> Self {
        match self.0 {
            Repr::Big(b) => match u64::try_from(&b) {
                Ok(v) => BigNum(Repr::Small(v)),
                Err(_) => BigNum(Repr::Big(b)),
            },
            small => BigNum(small),
        }
    }

    fn to_biguint(&self) -> BigUint {
        match &self.0 {
            Repr::Small(v) => BigUint::from(*v),
            Repr::Big(b) => b.clone(),
        }
    }

    pub fn to_bigint(&self) -> BigInt {
        BigInt::from(self.to_biguint())
    }

    /// Raise to a small exponent.
    pub fn pow(&self, exp: u32) -> Self {
        match &self.0 {
            Repr::Small(v) => {
                if let Some(r) = v.checked_pow(exp) {
                    return BigNum(Repr::Small(r));
                }
                BigNum(Repr::Big(Pow::pow(BigUint::from(*v), exp)))
            }
            Repr::Big(b) => BigNum(Repr::Big(Pow::pow(b, exp))).normalize(),
        }
    }

    /// Little-endian byte image, minimal length (empty for zero).
    pub fn to_bytes_le(&self) -> Vec<u8> {
        match &self.0 {
            Repr::Small(0) => Vec::new(),
            Repr::Small(v) => {
                let mut bytes = v.to_le_bytes().to_vec();
                while bytes.last() == Some(&0) {
                    bytes.pop();
                }
                bytes
            }
            Repr::Big(b) => b.to_bytes_le(),
        }
    }

    pub fn from_bytes_le(bytes: &[u8]) -> Self {
        if bytes.len() <= 8 {
            let mut word = [0u8; 8];
            word[..bytes.len()].copy_from_slice(bytes);
            BigNum(Repr::Small(u64::from_le_bytes(word)))
        } else {
            BigNum(Repr::Big(BigUint::from_bytes_le(bytes))).normalize()
        }
    }
}

impl From<u64> for BigNum {
    fn from(v: u64) -> Self {
        BigNum(Repr::Small(v))
    }
}

impl From<u32> for BigNum {
    fn from(v: u32) -> Self {
        BigNum(Repr::Small(v as u64))
    }
}

impl Add for &BigNum {
    type Output = BigNum;

    fn add(self, rhs: &BigNum) -> BigNum {
        match (&self.0, &rhs.0) {
            (Repr::Small(a), Repr::Small(b)) => match a.checked_add(*b) {
                Some(r) => BigNum(Repr::Small(r)),
                None => BigNum(Repr::Big(BigUint::from(*a) + BigUint::from(*b))),
            },
            _ => BigNum(Repr::Big(self.to_biguint() + rhs.to_biguint())).normalize(),
        }
    }
}

impl Add for BigNum {
    type Output = BigNum;

    fn add(self, rhs: BigNum) -> BigNum {
        &self + &rhs
    }
}

impl AddAssign<&BigNum> for BigNum {
    fn add_assign(&mut self, rhs: &BigNum) {
        *self = &*self + rhs;
    }
}

impl Mul for &BigNum {
    type Output = BigNum;

    fn mul(self, rhs: &BigNum) -> BigNum {
        match (&self.0, &rhs.0) {
            (Repr::Small(a), Repr::Small(b)) => match a.checked_mul(*b) {
                Some(r) => BigNum(Repr::Small(r)),
                None => BigNum(Repr::Big(BigUint::from(*a) * BigUint::from(*b))),
            },
            _ => BigNum(Repr::Big(self.to_biguint() * rhs.to_biguint())).normalize(),
        }
    }
}

impl Mul for BigNum {
    type Output = BigNum;

    fn mul(self, rhs: BigNum) -> BigNum {
        &self * &rhs
    }
}

impl MulAssign<&BigNum> for BigNum {
    fn mul_assign(&mut self, rhs: &BigNum) {
        *self = &*self * rhs;
    }
}

impl PartialOrd for BigNum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigNum {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            (Repr::Small(a), Repr::Small(b)) => a.cmp(b),
            // A spilled value is always larger than any inline one.
            (Repr::Small(_), Repr::Big(_)) => Ordering::Less,
            (Repr::Big(_), Repr::Small(_)) => Ordering::Greater,
            (Repr::Big(a), Repr::Big(b)) => a.cmp(b),
        }
    }
}

impl Display for BigNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Small(v) => write!(f, "{}", v),
            Repr::Big(b) => write!(f, "{}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_arithmetic() {
        let a = BigNum::from(6u64);
        let b = BigNum::from(7u64);
        assert_eq!(&a + &b, BigNum::from(13u64));
        assert_eq!(&a * &b, BigNum::from(42u64));
    }

    #[test]
    fn test_spill_on_overflow() {
        let max = BigNum::from(u64::MAX);
        let sum = &max + &BigNum::one();
        assert_eq!(sum.to_string(), "18446744073709551616");
        let prod = &max * &max;
        assert_eq!(prod, &prod.clone() + &BigNum::zero());
        assert!(prod > max);
    }

    #[test]
    fn test_pow() {
        assert_eq!(BigNum::from(2u64).pow(10), BigNum::from(1024u64));
        let big = BigNum::from(2u64).pow(100);
        assert_eq!(big.to_string(), "1267650600228229401496703205376");
    }

    #[test]
    fn test_ordering() {
        let small = BigNum::from(5u64);
        let large = BigNum::from(2u64).pow(80);
        assert!(small < large);
        assert!(large > small);
        assert_eq!(small.cmp(&small), Ordering::Equal);
    }

    #[test]
    fn test_bytes_roundtrip() {
        for v in [0u64, 1, 255, 256, 123_456_789, u64::MAX] {
            let n = BigNum::from(v);
            assert_eq!(BigNum::from_bytes_le(&n.to_bytes_le()), n);
        }
        let big = BigNum::from(3u64).pow(200);
        assert_eq!(BigNum::from_bytes_le(&big.to_bytes_le()), big);
    }

    #[test]
    fn test_normalized_equality() {
        // A padded byte image decodes through the BigUint path but must
        // normalise back to the inline representation.
        let padded = BigNum::from_bytes_le(&[7, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(padded, BigNum::from(7u64));
    }

    #[test]
    fn test_to_bigint() {
        assert_eq!(BigNum::from(42u64).to_bigint(), BigInt::from(42));
    }
}
