/// Composite Simpson rule over uniformly spaced samples.
///
/// An even number of samples closes the last interval with the trapezoid rule.
pub fn simpson(values: &[f64], step: f64) -> f64 {
    match values.len() {
        0 | 1 => 0.0,
        2 => 0.5 * step * (values[0] + values[1]),
        n => {
            let odd_count = if n % 2 == 1 { n } else { n - 1 };
            let mut sum = values[0] + values[odd_count - 1];
            for (i, v) in values[1..odd_count - 1].iter().enumerate() {
                sum += if i % 2 == 0 { 4.0 * v } else { 2.0 * v };
            }
            let mut integral = sum * step / 3.0;
            if odd_count < n {
                integral += 0.5 * step * (values[n - 2] + values[n - 1]);
            }
            integral
        }
    }
}

/// Simpson integral of `f` over `[a, b]` with `intervals` subdivisions (rounded up to even).
pub fn simpson_fn<F>(f: F, a: f64, b: f64, intervals: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    let n = (intervals.max(2) + 1) / 2 * 2;
    let step = (b - a) / n as f64;
    let values: Vec<f64> = (0..=n).map(|i| f(a + step * i as f64)).collect();
    simpson(&values, step)
}

/// Fallible Simpson integral; the first error aborts the sum.
pub fn try_simpson_fn<F, E>(f: F, a: f64, b: f64, intervals: usize) -> Result<f64, E>
where
    F: Fn(f64) -> Result<f64, E>,
{
    let n = (intervals.max(2) + 1) / 2 * 2;
    let step = (b - a) / n as f64;
    let values = (0..=n)
        .map(|i| f(a + step * i as f64))
        .collect::<Result<Vec<_>, E>>()?;
    Ok(simpson(&values, step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn simpson_is_exact_for_cubics() {
        let integral = simpson_fn(|x| x * x * x - 2.0 * x + 1.0, 0.0, 2.0, 4);
        assert_relative_eq!(integral, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn simpson_integrates_sine_over_half_period() {
        let integral = simpson_fn(f64::sin, 0.0, std::f64::consts::PI, 200);
        assert_relative_eq!(integral, 2.0, epsilon = 1e-8);
    }

    #[test]
    fn even_sample_count_uses_trapezoid_for_last_interval() {
        let values = [1.0, 1.0, 1.0, 1.0];
        assert_relative_eq!(simpson(&values, 0.5), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn fallible_integration_propagates_errors() {
        let result: Result<f64, &str> =
            try_simpson_fn(|x| if x > 0.5 { Err("boom") } else { Ok(x) }, 0.0, 1.0, 10);
        assert_eq!(result, Err("boom"));
    }
}
