use std::ops::{Add, AddAssign, Mul, MulAssign};

use crate::common::error::FieldError;

// Galois field element over GF(256) with primitive polynomial x^8 + x^4 + x^3 + x^2 + 1
//------------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct G(pub u8);

impl G {
    pub const ZERO: G = G(0);
    pub const ONE: G = G(1);

    /// Returns alpha^i, where alpha is the field generator 2
    pub fn gen_pow(i: usize) -> Self {
        G(EXP_TABLE[i % 255])
    }

    pub fn pow(self, n: usize) -> Self {
        if self.0 == 0 {
            return if n == 0 { G::ONE } else { G::ZERO };
        }
        let log = LOG_TABLE[self.0 as usize] as usize;
        G::gen_pow(log * n % 255)
    }

    pub fn inverse(self) -> Result<Self, FieldError> {
        if self.0 == 0 {
            return Err(FieldError::DivisionByZero);
        }
        Ok(G(EXP_TABLE[255 - LOG_TABLE[self.0 as usize] as usize]))
    }

    pub fn checked_div(self, rhs: Self) -> Result<Self, FieldError> {
        Ok(self * rhs.inverse()?)
    }
}

impl From<G> for u8 {
    fn from(g: G) -> Self {
        g.0
    }
}

impl Add for G {
    type Output = Self;
    #[allow(clippy::suspicious_arithmetic_impl)]
    fn add(self, rhs: Self) -> Self {
        G(self.0 ^ rhs.0)
    }
}

impl AddAssign for G {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Mul for G {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        if self.0 == 0 || rhs.0 == 0 {
            return G::ZERO;
        }
        let log = LOG_TABLE[self.0 as usize] as usize + LOG_TABLE[rhs.0 as usize] as usize;
        G(EXP_TABLE[log % 255])
    }
}

impl MulAssign for G {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

// Log & anti-log tables
//------------------------------------------------------------------------------

const PRIMITIVE_POLY: u16 = 0x11D;

static EXP_TABLE: [u8; 256] = build_exp_table();

static LOG_TABLE: [u8; 256] = build_log_table();

const fn build_exp_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < 255 {
        table[i] = x as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIMITIVE_POLY;
        }
        i += 1;
    }
    table[255] = table[0];
    table
}

const fn build_log_table() -> [u8; 256] {
    let exp = build_exp_table();
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 255 {
        table[exp[i] as usize] = i as u8;
        i += 1;
    }
    table
}

#[cfg(test)]
mod galois_tests {
    use test_case::test_case;

    use super::G;
    use crate::common::error::FieldError;

    #[test_case(0, 1)]
    #[test_case(1, 2)]
    #[test_case(8, 29)]
    #[test_case(25, 3)]
    #[test_case(255, 1)]
    fn test_gen_pow(i: usize, exp: u8) {
        assert_eq!(G::gen_pow(i), G(exp));
    }

    #[test]
    fn test_mul() {
        assert_eq!(G(0x53) * G(0xCA), G(0x01) * G(0x53) * G(0xCA));
        assert_eq!(G(2) * G(128), G(29));
        assert_eq!(G(0) * G(77), G(0));
        assert_eq!(G(3).pow(2), G(5));
    }

    #[test]
    fn test_inverse() {
        for b in 1..=255u8 {
            let g = G(b);
            assert_eq!(g * g.inverse().unwrap(), G::ONE);
        }
    }

    #[test]
    fn test_inverse_of_zero() {
        assert_eq!(G(0).inverse(), Err(FieldError::DivisionByZero));
        assert_eq!(G(9).checked_div(G(0)), Err(FieldError::DivisionByZero));
    }
}
