use super::NumericError;
use super::spline::CubicSpline;

/// How a [`TabulatedFunction`] continues beyond its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extrapolation {
    /// `y_b (x/x_b)^a` with the exponent taken from the boundary slope. Needs positive data.
    PowerLaw,
    /// Straight continuation of the boundary tangent, for signed data.
    Linear,
}

#[derive(Debug, Clone, Copy)]
struct Tail {
    x: f64,
    y: f64,
    slope: f64,
}

/// A spline over a table with a controlled extrapolation outside of it.
///
/// Queries farther than `band` times the table span beyond the upper end are
/// rejected with [`NumericError::OutOfRange`] instead of silently extrapolated.
#[derive(Debug, Clone)]
pub struct TabulatedFunction {
    spline: CubicSpline,
    kind: Extrapolation,
    band: f64,
    lower: Option<Tail>,
    upper: Tail,
}

impl TabulatedFunction {
    pub fn new(
        x: Vec<f64>,
        y: Vec<f64>,
        kind: Extrapolation,
        band: f64,
    ) -> Result<Self, NumericError> {
        if !(band >= 1.0) {
            return Err(NumericError::InvalidTable(format!(
                "extrapolation band must be at least 1, got {}",
                band
            )));
        }
        let spline = CubicSpline::new(x, y)?;
        let (x_lo, x_hi) = (spline.x_min(), spline.x_max());
        let (y_lo, y_hi) = (spline.value(x_lo), spline.value(x_hi));

        let (lower, upper) = match kind {
            Extrapolation::PowerLaw => {
                if x_hi <= 0.0 || y_hi <= 0.0 {
                    return Err(NumericError::InvalidTable(format!(
                        "power-law extrapolation needs a positive upper boundary, got ({}, {})",
                        x_hi, y_hi
                    )));
                }
                let upper = Tail {
                    x: x_hi,
                    y: y_hi,
                    slope: x_hi * spline.derivative(x_hi) / y_hi,
                };
                let lower = (x_lo > 0.0 && y_lo > 0.0).then(|| Tail {
                    x: x_lo,
                    y: y_lo,
                    slope: x_lo * spline.derivative(x_lo) / y_lo,
                });
                (lower, upper)
            }
            Extrapolation::Linear => (
                Some(Tail {
                    x: x_lo,
                    y: y_lo,
                    slope: spline.derivative(x_lo),
                }),
                Tail {
                    x: x_hi,
                    y: y_hi,
                    slope: spline.derivative(x_hi),
                },
            ),
        };

        Ok(Self {
            spline,
            kind,
            band,
            lower,
            upper,
        })
    }

    pub fn power_law(x: Vec<f64>, y: Vec<f64>, band: f64) -> Result<Self, NumericError> {
        Self::new(x, y, Extrapolation::PowerLaw, band)
    }

    pub fn linear(x: Vec<f64>, y: Vec<f64>, band: f64) -> Result<Self, NumericError> {
        Self::new(x, y, Extrapolation::Linear, band)
    }

    pub fn x_min(&self) -> f64 {
        self.spline.x_min()
    }

    pub fn x_max(&self) -> f64 {
        self.spline.x_max()
    }

    /// Exponent (power law) or slope (linear) used above the table.
    pub fn upper_slope(&self) -> f64 {
        self.upper.slope
    }

    /// Largest argument accepted before queries become an error.
    pub fn upper_limit(&self) -> f64 {
        let span = self.x_max() - self.x_min();
        match self.kind {
            Extrapolation::PowerLaw => (self.x_max() * self.band).max(self.x_max() + span),
            Extrapolation::Linear => self.x_max() + (self.band - 1.0) * span,
        }
    }

    fn lower_limit(&self) -> f64 {
        match self.kind {
            Extrapolation::PowerLaw => 0.0,
            Extrapolation::Linear => self.x_min() - (self.band - 1.0) * (self.x_max() - self.x_min()),
        }
    }

    fn out_of_range(&self, x: f64) -> NumericError {
        NumericError::OutOfRange {
            x,
            min: self.lower_limit(),
            max: self.upper_limit(),
        }
    }

    fn tail_for(&self, x: f64) -> Result<Option<Tail>, NumericError> {
        if x > self.x_max() {
            if x > self.upper_limit() {
                return Err(self.out_of_range(x));
            }
            return Ok(Some(self.upper));
        }
        if x < self.x_min() {
            return match (self.kind, self.lower) {
                (Extrapolation::PowerLaw, Some(tail)) if x > 0.0 => Ok(Some(tail)),
                (Extrapolation::Linear, Some(tail)) if x >= self.lower_limit() => Ok(Some(tail)),
                _ => Err(self.out_of_range(x)),
            };
        }
        Ok(None)
    }

    pub fn value(&self, x: f64) -> Result<f64, NumericError> {
        Ok(match self.tail_for(x)? {
            None => self.spline.value(x),
            Some(tail) => match self.kind {
                Extrapolation::PowerLaw => tail.y * (x / tail.x).powf(tail.slope),
                Extrapolation::Linear => tail.y + tail.slope * (x - tail.x),
            },
        })
    }

    pub fn derivative(&self, x: f64) -> Result<f64, NumericError> {
        Ok(match self.tail_for(x)? {
            None => self.spline.derivative(x),
            Some(tail) => match self.kind {
                Extrapolation::PowerLaw => {
                    tail.slope * tail.y * (x / tail.x).powf(tail.slope) / x
                }
                Extrapolation::Linear => tail.slope,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cubic_table() -> TabulatedFunction {
        let x: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v * v * v).collect();
        TabulatedFunction::power_law(x, y, 10.0).unwrap()
    }

    #[test]
    fn reproduces_table_values_inside_range() {
        let table = cubic_table();
        for i in 1..=20 {
            let x = i as f64;
            assert_relative_eq!(table.value(x).unwrap(), 2.0 * x * x * x, max_relative = 1e-12);
        }
    }

    #[test]
    fn follows_fitted_power_law_beyond_table() {
        let table = cubic_table();
        let slope = table.upper_slope();
        let at_edge = table.value(20.0).unwrap();
        let beyond = table.value(40.0).unwrap();
        assert_relative_eq!(beyond, at_edge * 2.0_f64.powf(slope), max_relative = 1e-12);
        assert_relative_eq!(slope, 3.0, epsilon = 0.15);
    }

    #[test]
    fn extrapolated_derivative_is_continuous_at_boundary() {
        let table = cubic_table();
        let inside = table.derivative(20.0).unwrap();
        let outside = table.derivative(20.0 + 1e-9).unwrap();
        assert_relative_eq!(inside, outside, max_relative = 1e-6);
    }

    #[test]
    fn rejects_queries_beyond_band() {
        let table = cubic_table();
        assert!(matches!(
            table.value(250.0),
            Err(NumericError::OutOfRange { .. })
        ));
    }

    #[test]
    fn low_side_power_law_applies_between_zero_and_first_node() {
        let table = cubic_table();
        assert!(table.value(0.5).unwrap() > 0.0);
        assert!(table.value(0.5).unwrap() < table.value(1.0).unwrap());
        assert!(table.value(-1.0).is_err());
    }

    #[test]
    fn linear_mode_extends_signed_data_on_both_sides() {
        let x = vec![-4.0, -2.0, 0.0];
        let y = vec![8.0, 4.0, 0.0];
        let table = TabulatedFunction::linear(x, y, 10.0).unwrap();
        assert_relative_eq!(table.value(1.0).unwrap(), -2.0, epsilon = 1e-12);
        assert_relative_eq!(table.value(-5.0).unwrap(), 10.0, epsilon = 1e-12);
        assert_relative_eq!(table.derivative(3.0).unwrap(), -2.0, epsilon = 1e-12);
    }

    #[test]
    fn power_law_requires_positive_upper_boundary() {
        let result = TabulatedFunction::power_law(vec![0.0, 1.0], vec![0.0, 0.0], 10.0);
        assert!(result.is_err());
    }
}
