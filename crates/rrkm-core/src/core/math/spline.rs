use super::NumericError;

fn validate(x: &[f64], y: &[f64]) -> Result<(), NumericError> {
    if x.len() != y.len() {
        return Err(NumericError::InvalidTable(format!(
            "{} abscissae but {} ordinates",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(NumericError::InvalidTable(
            "at least two points are required".to_string(),
        ));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(NumericError::InvalidTable(
            "table contains non-finite values".to_string(),
        ));
    }
    if let Some(w) = x.windows(2).find(|w| w[1] <= w[0]) {
        return Err(NumericError::InvalidTable(format!(
            "abscissae must increase strictly ({} followed by {})",
            w[0], w[1]
        )));
    }
    Ok(())
}

fn interval(x: &[f64], t: f64) -> usize {
    let upper = x.partition_point(|&v| v <= t);
    upper.saturating_sub(1).min(x.len() - 2)
}

/// Natural cubic spline through strictly increasing abscissae.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    second: Vec<f64>,
}

impl CubicSpline {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, NumericError> {
        validate(&x, &y)?;

        let n = x.len();
        let mut second = vec![0.0; n];
        if n > 2 {
            // Thomas algorithm on the interior nodes; both ends are natural.
            let mut c_prime = vec![0.0; n];
            let mut d_prime = vec![0.0; n];
            for i in 1..n - 1 {
                let h0 = x[i] - x[i - 1];
                let h1 = x[i + 1] - x[i];
                let rhs = 6.0 * ((y[i + 1] - y[i]) / h1 - (y[i] - y[i - 1]) / h0);
                let denom = 2.0 * (h0 + h1) - h0 * c_prime[i - 1];
                c_prime[i] = h1 / denom;
                d_prime[i] = (rhs - h0 * d_prime[i - 1]) / denom;
            }
            for i in (1..n - 1).rev() {
                second[i] = d_prime[i] - c_prime[i] * second[i + 1];
            }
        }

        Ok(Self { x, y, second })
    }

    pub fn x_min(&self) -> f64 {
        self.x[0]
    }

    pub fn x_max(&self) -> f64 {
        self.x[self.x.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn abscissae(&self) -> &[f64] {
        &self.x
    }

    pub fn ordinates(&self) -> &[f64] {
        &self.y
    }

    /// Spline value; outside the nodes the end cubics are continued.
    pub fn value(&self, t: f64) -> f64 {
        let i = interval(&self.x, t);
        let h = self.x[i + 1] - self.x[i];
        let a = (self.x[i + 1] - t) / h;
        let b = (t - self.x[i]) / h;
        a * self.y[i]
            + b * self.y[i + 1]
            + ((a * a * a - a) * self.second[i] + (b * b * b - b) * self.second[i + 1]) * h * h
                / 6.0
    }

    pub fn derivative(&self, t: f64) -> f64 {
        let i = interval(&self.x, t);
        let h = self.x[i + 1] - self.x[i];
        let a = (self.x[i + 1] - t) / h;
        let b = (t - self.x[i]) / h;
        (self.y[i + 1] - self.y[i]) / h - (3.0 * a * a - 1.0) / 6.0 * h * self.second[i]
            + (3.0 * b * b - 1.0) / 6.0 * h * self.second[i + 1]
    }
}

/// Piecewise cubic Hermite interpolant that never overshoots its data.
///
/// Node slopes follow Fritsch and Butland: a weighted harmonic mean of the
/// neighbouring secants inside, zero at local extrema, and the secant itself
/// at both ends. Monotone data therefore gives a monotone interpolant.
#[derive(Debug, Clone)]
pub struct MonotoneCubic {
    x: Vec<f64>,
    y: Vec<f64>,
    slope: Vec<f64>,
}

impl MonotoneCubic {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, NumericError> {
        validate(&x, &y)?;

        let n = x.len();
        let secant: Vec<f64> = (0..n - 1)
            .map(|i| (y[i + 1] - y[i]) / (x[i + 1] - x[i]))
            .collect();
        let mut slope = vec![0.0; n];
        slope[0] = secant[0];
        slope[n - 1] = secant[n - 2];
        for i in 1..n - 1 {
            let (d0, d1) = (secant[i - 1], secant[i]);
            if d0 * d1 > 0.0 {
                let h0 = x[i] - x[i - 1];
                let h1 = x[i + 1] - x[i];
                let w0 = 2.0 * h1 + h0;
                let w1 = h1 + 2.0 * h0;
                slope[i] = (w0 + w1) / (w0 / d0 + w1 / d1);
            }
        }

        Ok(Self { x, y, slope })
    }

    pub fn x_min(&self) -> f64 {
        self.x[0]
    }

    pub fn x_max(&self) -> f64 {
        self.x[self.x.len() - 1]
    }

    /// Value; outside the nodes the end cubics are continued.
    pub fn value(&self, t: f64) -> f64 {
        let i = interval(&self.x, t);
        let h = self.x[i + 1] - self.x[i];
        let s = (t - self.x[i]) / h;
        let s2 = s * s;
        let s3 = s2 * s;
        (2.0 * s3 - 3.0 * s2 + 1.0) * self.y[i]
            + (s3 - 2.0 * s2 + s) * h * self.slope[i]
            + (3.0 * s2 - 2.0 * s3) * self.y[i + 1]
            + (s3 - s2) * h * self.slope[i + 1]
    }

    pub fn derivative(&self, t: f64) -> f64 {
        let i = interval(&self.x, t);
        let h = self.x[i + 1] - self.x[i];
        let s = (t - self.x[i]) / h;
        let s2 = s * s;
        6.0 * (s - s2) * (self.y[i + 1] - self.y[i]) / h
            + (3.0 * s2 - 4.0 * s + 1.0) * self.slope[i]
            + (3.0 * s2 - 2.0 * s) * self.slope[i + 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reproduces_nodes_exactly() {
        let x = vec![0.0, 1.0, 2.5, 4.0];
        let y = vec![1.0, -2.0, 0.5, 3.0];
        let spline = CubicSpline::new(x.clone(), y.clone()).unwrap();
        for (xi, yi) in x.iter().zip(&y) {
            assert_relative_eq!(spline.value(*xi), *yi, epsilon = 1e-12);
        }
    }

    #[test]
    fn linear_data_is_interpolated_exactly() {
        let x: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 1.0).collect();
        let spline = CubicSpline::new(x, y).unwrap();
        assert_relative_eq!(spline.value(2.7), 7.1, epsilon = 1e-12);
        assert_relative_eq!(spline.derivative(4.3), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn smooth_function_is_approximated_closely() {
        let x: Vec<f64> = (0..41).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|v| v.sin()).collect();
        let spline = CubicSpline::new(x, y).unwrap();
        assert_relative_eq!(spline.value(1.23), 1.23_f64.sin(), epsilon = 1e-5);
        assert_relative_eq!(spline.derivative(2.05), 2.05_f64.cos(), epsilon = 1e-3);
    }

    #[test]
    fn rejects_non_increasing_abscissae() {
        let result = CubicSpline::new(vec![0.0, 1.0, 1.0], vec![0.0, 1.0, 2.0]);
        assert!(matches!(result, Err(NumericError::InvalidTable(_))));
    }

    #[test]
    fn rejects_single_point() {
        assert!(CubicSpline::new(vec![1.0], vec![1.0]).is_err());
    }

    #[test]
    fn monotone_cubic_never_overshoots_a_staircase() {
        // Near-degenerate pairs make a natural spline ring between nodes.
        let x = vec![10.0, 10.001, 20.0, 20.08, 30.0];
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let cubic = MonotoneCubic::new(x.clone(), y.clone()).unwrap();
        for (xi, yi) in x.iter().zip(&y) {
            assert_relative_eq!(cubic.value(*xi), *yi, epsilon = 1e-12);
        }
        let mut previous = cubic.value(10.0);
        for k in 1..=2000 {
            let t = 10.0 + k as f64 * 0.01;
            let value = cubic.value(t);
            assert!(value >= previous - 1e-12, "decreases at {}", t);
            assert!(cubic.derivative(t) >= -1e-12);
            previous = value;
        }
    }

    #[test]
    fn monotone_cubic_keeps_local_extrema_flat() {
        let cubic = MonotoneCubic::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 0.0]).unwrap();
        assert_relative_eq!(cubic.derivative(1.0), 0.0, epsilon = 1e-12);
        assert!(cubic.value(0.5) <= 1.0);
        assert!(cubic.value(1.5) <= 1.0);
    }

    #[test]
    fn monotone_cubic_reproduces_linear_data() {
        let x: Vec<f64> = (0..5).map(|i| i as f64 * 1.5).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        let cubic = MonotoneCubic::new(x, y).unwrap();
        assert_relative_eq!(cubic.value(3.7), 8.4, epsilon = 1e-12);
        assert_relative_eq!(cubic.derivative(5.2), 2.0, epsilon = 1e-12);
    }
}
