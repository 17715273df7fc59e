//! # GF(2^w) Arithmetic
//!
//! Log/antilog tables for O(1) scalar multiply/divide over GF(2^w), plus a
//! per-scalar byte table for region operations. Symbols are byte vectors;
//! for `w < 8` each byte packs `8 / w` field elements, so only widths that
//! divide 8 are supported.

use std::fmt;

use crate::error::CodecError;

/// Primitive polynomial for each supported width (bit `w` set).
fn primitive_poly(width: u8) -> Option<u16> {
    match width {
        1 => Some(0b11),
        2 => Some(0o7),
        4 => Some(0o23),
        8 => Some(0o435), // x^8 + x^4 + x^3 + x^2 + 1 (0x11D)
        _ => None,
    }
}

/// A Galois field GF(2^w), built once per encoder/decoder.
#[derive(Clone)]
pub struct Field {
    width: u8,
    /// Multiplicative group order, 2^w - 1.
    order: usize,
    /// Antilog table, duplicated so `log a + log b` never needs a modulo.
    exp: Vec<u8>,
    log: Vec<u8>,
    /// `region[c * 256 + byte]` is `byte` (as packed elements) scaled by `c`.
    region: Vec<u8>,
}

impl Field {
    /// Construct GF(2^w).
    pub fn new(width: u8) -> Result<Self, CodecError> {
        let poly = primitive_poly(width).ok_or(CodecError::FieldWidth(width))?;
        let size = 1usize << width;
        let order = size - 1;

        let mut exp = vec![0u8; 2 * order];
        let mut log = vec![0u8; size];
        let mut x: u16 = 1;
        for i in 0..order {
            exp[i] = x as u8;
            exp[i + order] = x as u8;
            log[x as usize] = i as u8;
            x <<= 1;
            if x & size as u16 != 0 {
                x ^= poly;
            }
        }

        let mut field = Field {
            width,
            order,
            exp,
            log,
            region: Vec::new(),
        };
        field.region = field.region_table();
        Ok(field)
    }

    fn region_table(&self) -> Vec<u8> {
        let size = self.size();
        let w = self.width as u32;
        let mask = self.mask();
        let mut table = vec![0u8; size * 256];
        for c in 0..size {
            for byte in 0..256usize {
                let mut packed = 0u8;
                let mut shift = 0;
                while shift < 8 {
                    let elem = ((byte >> shift) as u8) & mask;
                    packed |= self.mul(c as u8, elem) << shift;
                    shift += w;
                }
                table[c * 256 + byte] = packed;
            }
        }
        table
    }

    /// Bits per element.
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Number of field elements, 2^w.
    pub fn size(&self) -> usize {
        self.order + 1
    }

    fn mask(&self) -> u8 {
        self.order as u8
    }

    /// Multiplication.
    #[inline]
    pub fn mul(&self, a: u8, b: u8) -> u8 {
        debug_assert!((a as usize) <= self.order && (b as usize) <= self.order);
        if a == 0 || b == 0 {
            return 0;
        }
        self.exp[self.log[a as usize] as usize + self.log[b as usize] as usize]
    }

    /// Division. Panics if `b == 0`: in elimination that means a pivot lost
    /// its nonzero lead, which is a broken invariant rather than bad input.
    #[inline]
    pub fn div(&self, a: u8, b: u8) -> u8 {
        assert_ne!(b, 0, "division by zero in GF(2^{})", self.width);
        if a == 0 {
            return 0;
        }
        self.exp[self.log[a as usize] as usize + self.order - self.log[b as usize] as usize]
    }

    /// Division returning `None` for a zero divisor.
    pub fn checked_div(&self, a: u8, b: u8) -> Option<u8> {
        if b == 0 {
            None
        } else {
            Some(self.div(a, b))
        }
    }

    /// Multiplicative inverse. Panics on zero.
    #[inline]
    pub fn inv(&self, a: u8) -> u8 {
        self.div(1, a)
    }

    /// `dst[i] += c * src[i]` over the shorter of the two slices.
    pub fn mul_add_region(&self, dst: &mut [u8], src: &[u8], c: u8) {
        match c {
            0 => {}
            1 => {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d ^= *s;
                }
            }
            _ => {
                let row = &self.region[c as usize * 256..(c as usize + 1) * 256];
                for (d, s) in dst.iter_mut().zip(src) {
                    *d ^= row[*s as usize];
                }
            }
        }
    }

    /// `dst[i] *= c`.
    pub fn scale_region(&self, dst: &mut [u8], c: u8) {
        match c {
            0 => dst.fill(0),
            1 => {}
            _ => {
                let row = &self.region[c as usize * 256..(c as usize + 1) * 256];
                for d in dst.iter_mut() {
                    *d = row[*d as usize];
                }
            }
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GF(2^{})", self.width)
    }
}
