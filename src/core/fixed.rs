//! Q16.16 Fixed-Point Arithmetic
//!
//! Deterministic fixed-point math for the simulation core. Bullets travel
//! in sub-cell increments; everything else lives on integer cells. All
//! operations use integer arithmetic only - no floats in simulation logic.
//!
//! ## Format: Q16.16
//!
//! 32-bit signed integer, 16 bits integer part, 16 bits fractional part.
//! Range ±32767, precision 1/65536 of a cell. One cell = `FIXED_ONE`.

/// Q16.16 fixed-point number stored as i32.
pub type Fixed = i32;

/// Number of fractional bits (16)
pub const FIXED_SCALE: i32 = 16;

/// 1.0 cell in fixed-point (65536)
pub const FIXED_ONE: Fixed = 1 << FIXED_SCALE;

/// 0.5 cell in fixed-point (32768)
pub const FIXED_HALF: Fixed = FIXED_ONE >> 1;

/// 1/sqrt(2) in fixed-point, for diagonal travel steps.
///
/// round(65536 / 1.41421356) = 46341
pub const FIXED_INV_SQRT2: Fixed = 46341;

/// Convert a compile-time float to fixed-point.
///
/// Only use in const contexts or initialization, never in the tick loop.
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * (FIXED_ONE as f64)) as Fixed
}

/// Convert fixed-point to float for display only.
///
/// Never feed the result back into simulation logic.
#[inline]
pub fn to_float(f: Fixed) -> f32 {
    f as f32 / FIXED_ONE as f32
}

/// Convert a whole cell coordinate to its fixed-point center-of-cell span.
#[inline]
pub const fn from_cell(c: i32) -> Fixed {
    c << FIXED_SCALE
}

/// Round a fixed-point coordinate to the nearest whole cell.
///
/// Truncates the half-open cell [c - 0.5, c + 0.5) to c, matching the
/// convention that a cell's center is at the integer coordinate.
#[inline]
pub fn to_cell(f: Fixed) -> i32 {
    (f + FIXED_HALF) >> FIXED_SCALE
}

/// Sub-cell remainder of a fixed-point coordinate relative to its cell.
#[inline]
pub fn cell_remainder(f: Fixed) -> Fixed {
    f - from_cell(to_cell(f))
}

/// Multiply two fixed-point numbers.
///
/// Widens to i64 to prevent overflow, then truncates toward zero.
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    let wide = (a as i64) * (b as i64);
    (wide >> FIXED_SCALE) as Fixed
}

/// Absolute value with saturating negation of i32::MIN.
#[inline]
pub fn fixed_abs(a: Fixed) -> Fixed {
    if a == Fixed::MIN {
        Fixed::MAX
    } else {
        a.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_cell() {
        assert_eq!(FIXED_ONE, 65536);
        assert_eq!(to_fixed(1.0), FIXED_ONE);
        assert_eq!(to_fixed(0.5), FIXED_HALF);
    }

    #[test]
    fn test_cell_round_trip() {
        for c in -100..100 {
            assert_eq!(to_cell(from_cell(c)), c);
        }
    }

    #[test]
    fn test_to_cell_rounds_to_nearest() {
        assert_eq!(to_cell(from_cell(3) + FIXED_HALF - 1), 3);
        assert_eq!(to_cell(from_cell(3) + FIXED_HALF), 4);
        assert_eq!(to_cell(from_cell(3) - FIXED_HALF), 3);
        assert_eq!(to_cell(-FIXED_HALF), 0);
    }

    #[test]
    fn test_cell_remainder() {
        let f = from_cell(5) + 1234;
        assert_eq!(cell_remainder(f), 1234);
        let g = from_cell(-2) - 1000;
        assert_eq!(cell_remainder(g), -1000);
    }

    #[test]
    fn test_fixed_mul() {
        assert_eq!(fixed_mul(to_fixed(2.0), to_fixed(3.0)), to_fixed(6.0));
        assert_eq!(fixed_mul(to_fixed(0.5), to_fixed(0.5)), to_fixed(0.25));
        assert_eq!(fixed_mul(to_fixed(-1.5), to_fixed(2.0)), to_fixed(-3.0));
    }

    #[test]
    fn test_inv_sqrt2() {
        // (1/sqrt2)^2 == 1/2 within one ulp
        let sq = fixed_mul(FIXED_INV_SQRT2, FIXED_INV_SQRT2);
        assert!((sq - FIXED_HALF).abs() <= 1);
    }
}
