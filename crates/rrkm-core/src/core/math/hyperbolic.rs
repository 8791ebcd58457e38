//! Overflow-safe logarithms of hyperbolic functions.

use std::f64::consts::LN_2;

pub fn ln_cosh(x: f64) -> f64 {
    let a = x.abs();
    a + (-2.0 * a).exp().ln_1p() - LN_2
}

/// `ln(sinh x)` for `x > 0`.
pub fn ln_sinh(x: f64) -> f64 {
    if x < 1.0 {
        x.sinh().ln()
    } else {
        x + (-(-2.0 * x).exp()).ln_1p() - LN_2
    }
}

/// `ln(e^a + e^b)`.
pub fn ln_add(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    if hi == f64::NEG_INFINITY {
        return hi;
    }
    hi + (lo - hi).exp().ln_1p()
}

/// `ln(1 + e^x)`.
pub fn softplus(x: f64) -> f64 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// `1 / (1 + e^x)`.
pub fn logistic_complement(x: f64) -> f64 {
    if x > 0.0 {
        let e = (-x).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + x.exp())
    }
}
