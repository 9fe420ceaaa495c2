use std::fmt;
use std::ops::{Add, Div, Not, Rem, Shl, Shr, Sub};

use crate::error::{Error, Result};

/// Unsigned 256-bit integer over two u128 limbs, high limb first.
///
/// Every scalar quantity in this library (field elements, curve
/// coordinates, targets, secrets, digests-as-integers) fits in 256 bits;
/// intermediate products are avoided by doing modular multiplication
/// bit-by-bit instead of widening.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct U256(u128, u128);

impl U256 {
    pub const MAX: U256 = U256(u128::MAX, u128::MAX);

    pub const ZERO: U256 = U256(0, 0);

    pub const ONE: U256 = U256(0, 1);

    pub const fn new(high: u128, low: u128) -> Self {
        U256(high, low)
    }

    /// Creates `U256` from a big-endian array of `u8`s.
    #[must_use]
    pub fn from_be_bytes(a: &[u8; 32]) -> U256 {
        let (high, low) = split_in_half(a);
        U256(u128::from_be_bytes(high), u128::from_be_bytes(low))
    }

    /// Creates a `U256` from a little-endian array of `u8`s.
    #[must_use]
    pub fn from_le_bytes(a: &[u8; 32]) -> U256 {
        let (high, low) = split_in_half(a);
        U256(u128::from_le_bytes(low), u128::from_le_bytes(high))
    }

    /// Creates a `U256` from up to 32 big-endian bytes, left-padding with
    /// zeros. Errors on longer input.
    pub fn from_be_slice(bytes: &[u8]) -> Result<U256> {
        if bytes.len() > 32 {
            return Err(Error::Parse(format!(
                "integer out of range: {} bytes, expected at most 32",
                bytes.len()
            )));
        }
        let mut buf = [0u8; 32];
        buf[32 - bytes.len()..].copy_from_slice(bytes);
        Ok(U256::from_be_bytes(&buf))
    }

    /// Parses a big-endian hex string, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<U256> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        // Accept odd-length strings the way integer parsing would.
        let padded;
        let s = if s.len() % 2 == 1 {
            padded = format!("0{s}");
            &padded
        } else {
            s
        };
        let bytes = hex::decode(s).map_err(|e| Error::Parse(format!("invalid hex integer: {e}")))?;
        U256::from_be_slice(&bytes)
    }

    /// Converts `U256` to a big-endian array of `u8`s.
    #[must_use]
    pub fn to_be_bytes(self) -> [u8; 32] {
        let mut out = [0; 32];
        out[..16].copy_from_slice(&self.0.to_be_bytes());
        out[16..].copy_from_slice(&self.1.to_be_bytes());
        out
    }

    /// Converts `U256` to a little-endian array of `u8`s.
    #[must_use]
    pub fn to_le_bytes(self) -> [u8; 32] {
        let mut out = [0; 32];
        out[..16].copy_from_slice(&self.1.to_le_bytes());
        out[16..].copy_from_slice(&self.0.to_le_bytes());
        out
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == 0 && self.1 == 0
    }

    /// Returns the least number of bits needed to represent the number.
    pub fn bits(&self) -> u32 {
        if self.0 > 0 {
            256 - self.0.leading_zeros()
        } else {
            128 - self.1.leading_zeros()
        }
    }

    /// Value of bit `i`, counting from the least significant bit.
    pub fn bit(&self, i: u32) -> bool {
        if i >= 128 {
            (self.0 >> (i - 128)) & 1 == 1
        } else {
            (self.1 >> i) & 1 == 1
        }
    }

    /// Calculates `self` + `rhs`, returning the wrapped sum and whether the
    /// addition overflowed 256 bits.
    #[must_use = "this returns the result of the operation, without modifying the original"]
    pub fn overflowing_add(self, rhs: Self) -> (Self, bool) {
        let (low, carry) = self.1.overflowing_add(rhs.1);
        let (high, overflow1) = self.0.overflowing_add(rhs.0);
        let (high, overflow2) = high.overflowing_add(u128::from(carry));
        (U256(high, low), overflow1 | overflow2)
    }

    /// Calculates `self` - `rhs`, returning the wrapped difference and
    /// whether `rhs` was larger than `self`.
    #[must_use = "this returns the result of the operation, without modifying the original"]
    pub fn overflowing_sub(self, rhs: Self) -> (Self, bool) {
        let ret = self.wrapping_add(!rhs).wrapping_add(Self::ONE);
        (ret, rhs > self)
    }

    /// Wrapping (modular) addition at the 2^256 boundary.
    #[must_use = "this returns the result of the operation, without modifying the original"]
    pub fn wrapping_add(self, rhs: Self) -> Self {
        self.overflowing_add(rhs).0
    }

    /// Wrapping (modular) subtraction at the 2^256 boundary.
    #[must_use = "this returns the result of the operation, without modifying the original"]
    pub fn wrapping_sub(self, rhs: Self) -> Self {
        self.overflowing_sub(rhs).0
    }

    /// Multiplies by a small factor, returning the wrapped product and an
    /// overflow flag. Used by the retarget arithmetic, where the factor is a
    /// clamped timespan.
    #[must_use]
    pub fn overflowing_mul(self, rhs: u64) -> (Self, bool) {
        let rhs = u128::from(rhs);
        // Split the low limb so every partial product fits in a u128.
        let (l1, l0) = (self.1 >> 64, self.1 & u128::from(u64::MAX));
        let p0 = l0 * rhs;
        let p1 = l1 * rhs + (p0 >> 64);
        let low = (p0 & u128::from(u64::MAX)) | (p1 << 64);
        let carry = p1 >> 64;

        let (h1, h0) = (self.0 >> 64, self.0 & u128::from(u64::MAX));
        let q0 = h0 * rhs + carry;
        let q1 = h1 * rhs + (q0 >> 64);
        let high = (q0 & u128::from(u64::MAX)) | (q1 << 64);

        (U256(high, low), q1 >> 64 != 0)
    }

    /// Calculates quotient and remainder.
    ///
    /// # Panics
    ///
    /// If `rhs` is zero.
    pub fn div_rem(self, rhs: Self) -> (Self, Self) {
        let my_bits = self.bits();
        let your_bits = rhs.bits();

        assert!(your_bits != 0, "attempted to divide by zero");

        if my_bits < your_bits {
            return (U256::ZERO, self);
        }

        // Bitwise long division.
        let mut rem = self;
        let mut quot = U256::ZERO;
        let mut shift = my_bits - your_bits;
        let mut divisor = rhs << shift;
        loop {
            if rem >= divisor {
                if shift >= 128 {
                    quot.0 |= 1 << (shift - 128);
                } else {
                    quot.1 |= 1 << shift;
                }
                rem = rem.wrapping_sub(divisor);
            }
            divisor = divisor >> 1;
            if shift == 0 {
                break;
            }
            shift -= 1;
        }

        (quot, rem)
    }

    /// `(self + rhs) mod m`. Both operands must already be reduced.
    #[must_use]
    pub fn add_mod(self, rhs: Self, m: Self) -> Self {
        debug_assert!(self < m && rhs < m);
        let (sum, carry) = self.overflowing_add(rhs);
        // With both operands below m the true sum is below 2m, so a single
        // conditional subtraction reduces it even when the 256-bit sum
        // wrapped.
        if carry || sum >= m {
            sum.wrapping_sub(m)
        } else {
            sum
        }
    }

    /// `(self - rhs) mod m`. Both operands must already be reduced.
    #[must_use]
    pub fn sub_mod(self, rhs: Self, m: Self) -> Self {
        debug_assert!(self < m && rhs < m);
        if self >= rhs {
            self.wrapping_sub(rhs)
        } else {
            m.wrapping_sub(rhs).wrapping_add(self)
        }
    }

    /// `(self * rhs) mod m` by binary double-and-add, so no 512-bit
    /// intermediate is needed. Both operands must already be reduced.
    #[must_use]
    pub fn mul_mod(self, rhs: Self, m: Self) -> Self {
        debug_assert!(self < m && rhs < m);
        let mut acc = U256::ZERO;
        let mut i = self.bits();
        while i > 0 {
            i -= 1;
            acc = acc.add_mod(acc, m);
            if self.bit(i) {
                acc = acc.add_mod(rhs, m);
            }
        }
        acc
    }

    /// `self^exp mod m` by square-and-multiply over the exponent's bits,
    /// most significant first.
    #[must_use]
    pub fn pow_mod(self, exp: Self, m: Self) -> Self {
        if m == U256::ONE {
            return U256::ZERO;
        }
        let base = self % m;
        let mut acc = U256::ONE;
        let mut i = exp.bits();
        while i > 0 {
            i -= 1;
            acc = acc.mul_mod(acc, m);
            if exp.bit(i) {
                acc = acc.mul_mod(base, m);
            }
        }
        acc
    }

    /// Multiplicative inverse modulo a prime, via Fermat's little theorem:
    /// `a^(m-2) mod m`. `self` must not be congruent to zero.
    #[must_use]
    pub fn inv_mod(self, m: Self) -> Self {
        debug_assert!(!(self % m).is_zero());
        self.pow_mod(m.wrapping_sub(U256::new(0, 2)), m)
    }

    /// Calculates 2^256 / (x + 1), the chain-work contribution of a block
    /// with target x.
    ///
    /// 2**256 / (x + 1) == ~x / (x + 1) + 1
    ///
    /// (Equation shamelessly stolen from bitcoind)
    #[must_use]
    pub fn inverse(&self) -> U256 {
        // Zero and one never occur as real targets; define both to map to
        // MAX, and MAX to one, so the function is total.
        if self.is_zero() || *self == U256::ONE {
            return U256::MAX;
        }
        if *self == U256::MAX {
            return U256::ONE;
        }

        let ret = !*self / self.wrapping_add(U256::ONE);
        ret.wrapping_add(U256::ONE)
    }

    /// Encodes the integer as Bitcoin's compact "bits" representation:
    /// a byte-length exponent and a 3-byte signed mantissa.
    pub fn to_compact_bits(&self) -> u32 {
        let mut n_size = (self.bits() + 7) / 8;
        let mut n_compact: u32;

        if n_size <= 3 {
            n_compact = u32::try_from(self.1 << (8 * (3 - n_size))).unwrap_or(0);
        } else {
            let shifted = *self >> (8 * (n_size - 3));
            n_compact = u32::try_from(shifted.1 & 0x00ff_ffff).unwrap_or(0);
        }

        // The mantissa is signed; if the high bit would be set, shift it
        // down a byte and bump the exponent.
        if n_compact & 0x0080_0000 != 0 {
            n_compact >>= 8;
            n_size += 1;
        }

        n_compact | (n_size << 24)
    }

    /// Decodes Bitcoin's compact "bits" representation into the full
    /// 256-bit target: mantissa * 256^(exponent - 3).
    #[must_use]
    pub fn from_compact_bits(bits: u32) -> U256 {
        let (mant, expt) = {
            let unshifted_expt = bits >> 24;
            if unshifted_expt <= 3 {
                ((bits & 0x00ff_ffff) >> (8 * (3 - unshifted_expt)), 0)
            } else {
                (bits & 0x00ff_ffff, 8 * (unshifted_expt - 3))
            }
        };

        // The mantissa is signed but may not be negative.
        if mant > 0x007f_ffff {
            U256::ZERO
        } else {
            U256::from(mant) << expt
        }
    }

    /// Panic-free shift-left; shifts of 256 or more clear the value.
    #[must_use]
    fn wrapping_shl(self, rhs: u32) -> Self {
        if rhs >= 256 {
            return U256::ZERO;
        }
        let bit_shift = rhs % 128;
        let mut ret = U256::ZERO;
        if rhs >= 128 {
            ret.0 = self.1 << bit_shift;
        } else {
            ret.0 = self.0 << bit_shift;
            if bit_shift > 0 {
                ret.0 |= self.1 >> (128 - bit_shift);
            }
            ret.1 = self.1 << bit_shift;
        }
        ret
    }

    /// Panic-free shift-right; shifts of 256 or more clear the value.
    #[must_use]
    fn wrapping_shr(self, rhs: u32) -> Self {
        if rhs >= 256 {
            return U256::ZERO;
        }
        let bit_shift = rhs % 128;
        let mut ret = U256::ZERO;
        if rhs >= 128 {
            ret.1 = self.0 >> bit_shift;
        } else {
            ret.0 = self.0 >> bit_shift;
            ret.1 = self.1 >> bit_shift;
            if bit_shift > 0 {
                ret.1 |= self.0 << (128 - bit_shift);
            }
        }
        ret
    }
}

/// Splits a 32 byte array into two 16 byte arrays.
fn split_in_half(a: &[u8; 32]) -> ([u8; 16], [u8; 16]) {
    let mut high = [0_u8; 16];
    let mut low = [0_u8; 16];

    high.copy_from_slice(&a[..16]);
    low.copy_from_slice(&a[16..]);

    (high, low)
}

impl<T: Into<u128>> From<T> for U256 {
    fn from(x: T) -> Self {
        U256(0, x.into())
    }
}

impl Add for U256 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        let (ret, overflow) = self.overflowing_add(rhs);
        debug_assert!(!overflow, "U256 addition overflow");
        ret
    }
}

impl Sub for U256 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        let (ret, underflow) = self.overflowing_sub(rhs);
        debug_assert!(!underflow, "U256 subtraction underflow");
        ret
    }
}

impl Div for U256 {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        self.div_rem(rhs).0
    }
}

impl Rem for U256 {
    type Output = Self;
    fn rem(self, rhs: Self) -> Self {
        self.div_rem(rhs).1
    }
}

impl Not for U256 {
    type Output = Self;

    fn not(self) -> Self {
        U256(!self.0, !self.1)
    }
}

impl Shl<u32> for U256 {
    type Output = Self;
    fn shl(self, shift: u32) -> U256 {
        self.wrapping_shl(shift)
    }
}

impl Shr<u32> for U256 {
    type Output = Self;
    fn shr(self, shift: u32) -> U256 {
        self.wrapping_shr(shift)
    }
}

impl fmt::LowerHex for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}{:032x}", self.0, self.1)
    }
}

impl fmt::UpperHex for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032X}{:032X}", self.0, self.1)
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(self, f)
    }
}
