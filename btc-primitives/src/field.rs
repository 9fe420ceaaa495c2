//! Prime-field elements: a value paired with its modulus, closed under the
//! modular operations the curve group law needs.

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use crate::error::{Error, Result};
use crate::u256::U256;

/// An integer in [0, p) tagged with its prime p. Elements of different
/// fields never mix: the constructor rejects out-of-range values and the
/// operators insist both sides share a prime.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FieldElement {
    num: U256,
    prime: U256,
}

impl FieldElement {
    pub fn new(num: U256, prime: U256) -> Result<Self> {
        if num >= prime {
            return Err(Error::Invariant(format!(
                "field value {num:x} not in range [0, {prime:x})"
            )));
        }
        Ok(FieldElement { num, prime })
    }

    pub fn num(&self) -> U256 {
        self.num
    }

    pub fn prime(&self) -> U256 {
        self.prime
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    pub fn pow(&self, exp: U256) -> FieldElement {
        FieldElement {
            num: self.num.pow_mod(exp, self.prime),
            prime: self.prime,
        }
    }

    /// Multiplicative inverse via Fermat: a^(p-2) mod p.
    ///
    /// # Panics
    ///
    /// On the zero element, which has no inverse.
    pub fn inv(&self) -> FieldElement {
        assert!(!self.num.is_zero(), "zero has no multiplicative inverse");
        FieldElement {
            num: self.num.inv_mod(self.prime),
            prime: self.prime,
        }
    }

    /// Square root, defined for p = 3 mod 4 (which secp256k1's prime is):
    /// a^((p+1)/4). Errors if the element is not a quadratic residue or the
    /// prime has the wrong form.
    pub fn sqrt(&self) -> Result<FieldElement> {
        if !(self.prime.bit(0) && self.prime.bit(1)) {
            return Err(Error::Invariant(format!(
                "square root requires p = 3 mod 4, got {:x}",
                self.prime
            )));
        }
        // p + 1 never wraps: p is odd, so the low bit is free.
        let exp = (self.prime + U256::ONE) >> 2;
        let root = self.pow(exp);
        if root * root != *self {
            return Err(Error::Crypto(format!(
                "{:x} is not a quadratic residue",
                self.num
            )));
        }
        Ok(root)
    }

    fn assert_same_field(&self, other: &FieldElement) {
        assert_eq!(
            self.prime, other.prime,
            "cannot operate on elements of different fields"
        );
    }
}

impl Add for FieldElement {
    type Output = FieldElement;

    fn add(self, rhs: FieldElement) -> FieldElement {
        self.assert_same_field(&rhs);
        FieldElement {
            num: self.num.add_mod(rhs.num, self.prime),
            prime: self.prime,
        }
    }
}

impl Sub for FieldElement {
    type Output = FieldElement;

    fn sub(self, rhs: FieldElement) -> FieldElement {
        self.assert_same_field(&rhs);
        FieldElement {
            num: self.num.sub_mod(rhs.num, self.prime),
            prime: self.prime,
        }
    }
}

impl Mul for FieldElement {
    type Output = FieldElement;

    fn mul(self, rhs: FieldElement) -> FieldElement {
        self.assert_same_field(&rhs);
        FieldElement {
            num: self.num.mul_mod(rhs.num, self.prime),
            prime: self.prime,
        }
    }
}

impl Div for FieldElement {
    type Output = FieldElement;

    fn div(self, rhs: FieldElement) -> FieldElement {
        self.assert_same_field(&rhs);
        self * rhs.inv()
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({:x} mod {:x})", self.num, self.prime)
    }
}
