//! Numeric helpers shared between the arithmetic opcodes and the
//! externalizer: bignum float equality and literal parsing quirks.

use rug::Float;
use rug::float::Round;
use rug::ops::{AssignRound, Pow};

/// Relative-difference equality for bignum floats (§4.1): `a == b` when
/// `|a - b| <= epsilon * max(|a|, |b|, 1)`. Plain `==` on `rug::Float`
/// would demand bit-for-bit equality, which is useless for values that
/// arrived via different code paths at the same mathematical value.
pub fn float_approx_eq(a: &Float, b: &Float, epsilon: f64) -> bool {
    if a == b {
        return true;
    }
    let prec = a.prec().max(b.prec());
    let diff = Float::with_val(prec, a - b).abs();
    let scale = {
        let abs_a = Float::with_val(prec, a).abs();
        let abs_b = Float::with_val(prec, b).abs();
        let largest = if abs_a > abs_b { abs_a } else { abs_b };
        if largest > Float::with_val(prec, 1) {
            largest
        } else {
            Float::with_val(prec, 1)
        }
    };
    let bound = Float::with_val(prec, epsilon) * scale;
    diff <= bound
}

/// The VM forces a canonical `.` decimal separator before parsing so that
/// the underlying bignum parser (which is locale-sensitive) never sees a
/// `,` on machines configured for a comma-decimal locale (§9's
/// "locale-sensitive bignum parsing" note). Loom never reads the process
/// locale, so this is a no-op by construction today, but literal text is
/// always routed through this function rather than straight into
/// `Float::parse` so that guarantee stays visible and enforced in one
/// place.
pub fn canonicalize_float_text(raw: &str) -> String {
    raw.replace(',', ".")
}

/// `10^exponent` at the given precision, used by float literal parsing
/// when an `@`-rewritten exponent marker is present.
pub fn pow10(exponent: i32, precision: u32) -> Float {
    Float::with_val(precision, 10).pow(exponent)
}

/// Round a float to the nearest representable value at `precision` bits,
/// used by the `precision` opcode when narrowing an existing value.
pub fn round_to_precision(value: &Float, precision: u32) -> Float {
    let mut out = Float::with_val(precision, 0);
    let _ = out.assign_round(value, Round::Nearest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_floats_compare_equal() {
        let a = Float::with_val(53, 1.0);
        let b = Float::with_val(53, 1.0);
        assert!(float_approx_eq(&a, &b, 2.22e-16));
    }

    #[test]
    fn within_epsilon_compares_equal() {
        let a = Float::with_val(53, 1.0);
        let b = Float::with_val(53, 1.0) + Float::with_val(53, 1e-17);
        assert!(float_approx_eq(&a, &b, 2.22e-16));
    }

    #[test]
    fn outside_epsilon_compares_unequal() {
        let a = Float::with_val(53, 1.0);
        let b = Float::with_val(53, 1.1);
        assert!(!float_approx_eq(&a, &b, 2.22e-16));
    }

    #[test]
    fn canonicalizes_comma_decimal() {
        assert_eq!(canonicalize_float_text("3,14"), "3.14");
    }
}
