use super::NumericError;

/// Newton–Raphson with a bisection safeguard and a hard iteration cap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootSearch {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for RootSearch {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            max_iterations: 200,
        }
    }
}

impl RootSearch {
    /// Finds a root of `f` inside `[lower, upper]`.
    ///
    /// `f` returns the function value and its derivative. Newton steps that leave
    /// the current bracket, or that are undefined, are replaced by bisection.
    pub fn bracketed<F>(&self, f: F, lower: f64, upper: f64) -> Result<f64, NumericError>
    where
        F: Fn(f64) -> (f64, f64),
    {
        let (mut lo, mut hi) = (lower.min(upper), lower.max(upper));
        let (f_lo, _) = f(lo);
        let (f_hi, _) = f(hi);
        if f_lo == 0.0 {
            return Ok(lo);
        }
        if f_hi == 0.0 {
            return Ok(hi);
        }
        if f_lo.signum() == f_hi.signum() || !f_lo.is_finite() || !f_hi.is_finite() {
            return Err(NumericError::NoBracket {
                lower: lo,
                upper: hi,
            });
        }
        let rising = f_hi > 0.0;

        let mut x = 0.5 * (lo + hi);
        for _ in 0..self.max_iterations {
            let (fx, dfx) = f(x);
            if fx == 0.0 {
                return Ok(x);
            }
            if (fx > 0.0) == rising {
                hi = x;
            } else {
                lo = x;
            }

            let newton = x - fx / dfx;
            let next = if dfx != 0.0 && newton.is_finite() && newton > lo && newton < hi {
                newton
            } else {
                0.5 * (lo + hi)
            };

            let scale = 1.0 + next.abs();
            if (next - x).abs() <= self.tolerance * scale || (hi - lo) <= self.tolerance * scale {
                return Ok(next);
            }
            x = next;
        }

        Err(NumericError::NotConverged {
            iterations: self.max_iterations,
            last: x,
        })
    }
}
