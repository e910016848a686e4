//! Factorised bivariate polynomials in `x` and `y`.
//!
//! The delete-contract recursion combines sub-results with `+` and the
//! structural reductions (biconnected components, loops, multi-edges)
//! combine them with `*`. Products dominate, so a [`FactorPoly`] is kept
//! as a *product of factor groups*, each group a sum of monomials with
//! [`BigNum`] coefficients. Multiplication just concatenates the factor
//! list; only an addition forces the operands to be expanded into a
//! single group. This keeps cache entries small and products cheap.
//!
//! The zero polynomial is represented by a single empty group (an empty
//! sum), which any product absorbs.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use num_bigint::BigInt;
use num_traits::Pow;

use crate::bignum::BigNum;
use crate::error::Error;

/// A power product `x^xpow * y^ypow`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Monomial {
    pub xpow: u32,
    pub ypow: u32,
}

impl Monomial {
    pub fn new(xpow: u32, ypow: u32) -> Self {
        Monomial { xpow, ypow }
    }
}

/// One factor group: a sum of monomials with non-zero coefficients.
type TermSum = BTreeMap<Monomial, BigNum>;

/// A polynomial stored as a product of factor groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorPoly {
    factors: Vec<TermSum>,
}

impl FactorPoly {
    /// The zero polynomial (a single empty sum).
    pub fn zero() -> Self {
        FactorPoly {
            factors: vec![TermSum::new()],
        }
    }

    /// The literal `x^n`.
    pub fn x(n: u32) -> Self {
        FactorPoly::monomial(Monomial::new(n, 0), BigNum::one())
    }

    /// The literal `y^n`.
    pub fn y(n: u32) -> Self {
        FactorPoly::monomial(Monomial::new(0, n), BigNum::one())
    }

    /// The range sum `y^a + y^{a+1} + ... + y^b`, zero when `b < a`.
    ///
    /// This is the multi-edge expansion factor: contracting a parallel
    /// class of `k` edges contributes `y_range(0, k - 1)`.
    pub fn y_range(a: u32, b: u32) -> Self {
        let mut terms = TermSum::new();
        if a <= b {
            for p in a..=b {
                terms.insert(Monomial::new(0, p), BigNum::one());
            }
        }
        FactorPoly { factors: vec![terms] }
    }

    /// The range sum `x^a + x^{a+1} + ... + x^b`, zero when `b < a`.
    ///
    /// Used by the line reduction: deleting a line of `m` series edges
    /// contributes `x_range(0, m - 1)`.
    pub fn x_range(a: u32, b: u32) -> Self {
        let mut terms = TermSum::new();
        if a <= b {
            for p in a..=b {
                terms.insert(Monomial::new(p, 0), BigNum::one());
            }
        }
        FactorPoly { factors: vec![terms] }
    }

    fn monomial(m: Monomial, c: BigNum) -> Self {
        let mut terms = TermSum::new();
        if !c.is_zero() {
            terms.insert(m, c);
        }
        FactorPoly { factors: vec![terms] }
    }

    pub fn is_zero(&self) -> bool {
        self.factors.iter().any(|f| f.is_empty())
    }

    /// The constant one: every factor group is the single term `1`.
    pub fn is_one(&self) -> bool {
        self.factors.iter().all(|f| {
            f.len() == 1
                && f.get(&Monomial::new(0, 0))
                    .is_some_and(|c| *c == BigNum::one())
        })
    }

    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    /// Expand the product into a single factor group.
    fn flatten(&self) -> TermSum {
        let mut acc: Option<TermSum> = None;
        for factor in &self.factors {
            acc = Some(match acc {
                None => factor.clone(),
                Some(lhs) => mul_sums(&lhs, factor),
            });
        }
        acc.unwrap_or_default()
    }

    /// Collapse the factor list in place to its single-group form.
    fn make_single(&mut self) {
        if self.factors.len() > 1 {
            self.factors = vec![self.flatten()];
        }
    }

    /// Evaluate at an integer point.
    ///
    /// Coefficients are non-negative but evaluation points may not be,
    /// so the result is a signed [`BigInt`].
    pub fn substitute(&self, x0: i64, y0: i64) -> BigInt {
        let x0 = BigInt::from(x0);
        let y0 = BigInt::from(y0);
        let mut result = BigInt::from(1);
        for factor in &self.factors {
            let mut sum = BigInt::from(0);
            for (m, c) in factor {
                sum += c.to_bigint() * Pow::pow(&x0, m.xpow) * Pow::pow(&y0, m.ypow);
            }
            result *= sum;
        }
        result
    }

    /// Serialize in the cache wire format: varint group count, then per
    /// group a varint monomial count and per monomial varint xpow, ypow,
    /// coefficient length and little-endian coefficient bytes.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        write_varint(out, self.factors.len() as u64);
        for factor in &self.factors {
            write_varint(out, factor.len() as u64);
            for (m, c) in factor {
                write_varint(out, m.xpow as u64);
                write_varint(out, m.ypow as u64);
                let bytes = c.to_bytes_le();
                write_varint(out, bytes.len() as u64);
                out.extend_from_slice(&bytes);
            }
        }
    }

    pub fn serialized_size(&self) -> usize {
        let mut buf = Vec::new();
        self.serialize(&mut buf);
        buf.len()
    }

    /// Decode a polynomial written by [`FactorPoly::serialize`].
    pub fn deserialize(buf: &[u8]) -> Result<FactorPoly, Error> {
        let mut pos = 0;
        let nfactors = read_varint(buf, &mut pos)? as usize;
        let mut factors = Vec::with_capacity(nfactors);
        for _ in 0..nfactors {
            let nterms = read_varint(buf, &mut pos)? as usize;
            let mut terms = TermSum::new();
            for _ in 0..nterms {
                let xpow = read_varint(buf, &mut pos)? as u32;
                let ypow = read_varint(buf, &mut pos)? as u32;
                let len = read_varint(buf, &mut pos)? as usize;
                if pos + len > buf.len() {
                    return Err(Error::Internal("truncated polynomial coefficient"));
                }
                let coeff = BigNum::from_bytes_le(&buf[pos..pos + len]);
                pos += len;
                terms.insert(Monomial::new(xpow, ypow), coeff);
            }
            factors.push(terms);
        }
        if factors.is_empty() {
            return Err(Error::Internal("polynomial with no factor groups"));
        }
        Ok(FactorPoly { factors })
    }
}

/// Expand the product of two factor groups.
fn mul_sums(a: &TermSum, b: &TermSum) -> TermSum {
    let mut out = TermSum::new();
    for (ma, ca) in a {
        for (mb, cb) in b {
            let m = Monomial::new(ma.xpow + mb.xpow, ma.ypow + mb.ypow);
            let c = ca * cb;
            match out.get_mut(&m) {
                Some(existing) => *existing += &c,
                None => {
                    out.insert(m, c);
                }
            }
        }
    }
    out
}

impl std::ops::Add for FactorPoly {
    type Output = FactorPoly;

    fn add(mut self, mut rhs: FactorPoly) -> FactorPoly {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }
        // Both operands end up in single-group form; when they already
        // are, this is a plain map merge.
        self.make_single();
        rhs.make_single();
        let mut terms = self.factors.pop().expect("single factor");
        for (m, c) in rhs.factors.pop().expect("single factor") {
            match terms.get_mut(&m) {
                Some(existing) => *existing += &c,
                None => {
                    terms.insert(m, c);
                }
            }
        }
        FactorPoly { factors: vec![terms] }
    }
}

impl std::ops::AddAssign for FactorPoly {
    fn add_assign(&mut self, rhs: FactorPoly) {
        let lhs = std::mem::replace(self, FactorPoly::zero());
        *self = lhs + rhs;
    }
}

impl std::ops::Mul for FactorPoly {
    type Output = FactorPoly;

    fn mul(mut self, mut rhs: FactorPoly) -> FactorPoly {
        if self.is_zero() || rhs.is_zero() {
            return FactorPoly::zero();
        }
        // Unit factors (the y^0 loop prefactor of most frames) would
        // otherwise pile up in the factor list.
        if self.is_one() {
            return rhs;
        }
        if rhs.is_one() {
            return self;
        }
        self.factors.append(&mut rhs.factors);
        self
    }
}

impl std::ops::MulAssign for FactorPoly {
    fn mul_assign(&mut self, rhs: FactorPoly) {
        let lhs = std::mem::replace(self, FactorPoly::zero());
        *self = lhs * rhs;
    }
}

impl Display for FactorPoly {
    /// Canonical textual form: the flattened sum with terms ascending by
    /// `(xpow, ypow)`, e.g. `y + x + x^2` for the triangle.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let flat = self.flatten();
        if flat.is_empty() {
            return write!(f, "0");
        }
        let mut first = true;
        for (m, c) in &flat {
            if !first {
                write!(f, " + ")?;
            }
            first = false;
            let mut parts: Vec<String> = Vec::new();
            if *c != BigNum::one() || (m.xpow == 0 && m.ypow == 0) {
                parts.push(c.to_string());
            }
            match m.xpow {
                0 => {}
                1 => parts.push("x".to_string()),
                p => parts.push(format!("x^{}", p)),
            }
            match m.ypow {
                0 => {}
                1 => parts.push("y".to_string()),
                p => parts.push(format!("y^{}", p)),
            }
            write!(f, "{}", parts.join("*"))?;
        }
        Ok(())
    }
}

fn write_varint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn read_varint(buf: &[u8], pos: &mut usize) -> Result<u64, Error> {
    let mut result = 0u64;
    let mut shift = 0;
    loop {
        let byte = *buf
            .get(*pos)
            .ok_or(Error::Internal("truncated varint in polynomial stream"))?;
        *pos += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 64 {
            return Err(Error::Internal("oversized varint in polynomial stream"));
        }
    }
}
