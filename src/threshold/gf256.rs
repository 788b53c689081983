//! GF(2^8) arithmetic over the AES polynomial x^8 + x^4 + x^3 + x + 1 (0x11B).
//!
//! Multiplication is bit-serial with masks instead of branches or lookup
//! tables, so timing does not depend on share bytes.

use std::ops::{Add, AddAssign, Mul, MulAssign};

use zeroize::Zeroize;

/// Low byte of the reduction polynomial.
const POLY: u8 = 0x1B;

/// A field element.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Zeroize)]
#[repr(transparent)]
pub struct Gf256(pub u8);

impl Gf256 {
    pub const ZERO: Self = Gf256(0);
    pub const ONE: Self = Gf256(1);

    /// Multiplicative inverse via a^254. Zero maps to zero.
    pub fn inv(self) -> Self {
        // 254 = 0b1111_1110
        let mut result = Gf256::ONE;
        let mut base = self;
        let mut exp: u8 = 254;
        for _ in 0..8 {
            let mask = 0u8.wrapping_sub(exp & 1);
            let chosen = Gf256((result * base).0 & mask | result.0 & !mask);
            result = chosen;
            base = base * base;
            exp >>= 1;
        }
        result
    }
}

impl Add for Gf256 {
    type Output = Self;

    #[allow(clippy::suspicious_arithmetic_impl)]
    fn add(self, rhs: Self) -> Self {
        Gf256(self.0 ^ rhs.0)
    }
}

impl AddAssign for Gf256 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Mul for Gf256 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut a = self.0;
        let mut b = rhs.0;
        let mut product = 0u8;
        for _ in 0..8 {
            product ^= a & 0u8.wrapping_sub(b & 1);
            let carry = 0u8.wrapping_sub(a >> 7);
            a = (a << 1) ^ (POLY & carry);
            b >>= 1;
        }
        Gf256(product)
    }
}

impl MulAssign for Gf256 {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

/// Evaluate `coeffs[0] + coeffs[1]·x + …` with Horner's method.
pub fn evaluate(coeffs: &[Gf256], x: Gf256) -> Gf256 {
    coeffs
        .iter()
        .rev()
        .fold(Gf256::ZERO, |acc, &c| acc * x + c)
}
