use crate::core::base::{LAPLACE_INTERVALS, LAPLACE_SPAN, LAPLACE_SPAN_MIN, laplace_weight};
use crate::core::math::NumericError;
use crate::core::math::quadrature::try_simpson_fn;
use crate::core::math::spline::CubicSpline;
use crate::core::mode::StatesMode;

#[derive(Debug, Clone)]
enum Lookup {
    /// Piecewise-constant reading of a discrete spectrum.
    Step,
    Spline(CubicSpline),
}

/// States on the uniform grid `k * step` above a species ground.
///
/// Queries inside the grid read the computed values directly; above it a
/// power law `N_top (E/E_top)^a` continues the count up to `band` times the
/// grid ceiling. The exponent is the log-slope at the ceiling, so the slope
/// stays continuous there.
#[derive(Debug, Clone)]
pub struct StatesGrid {
    mode: StatesMode,
    step: f64,
    values: Vec<f64>,
    lookup: Lookup,
    exponent: f64,
    band: f64,
}

impl StatesGrid {
    pub fn new(
        mode: StatesMode,
        step: f64,
        values: Vec<f64>,
        discrete: bool,
        band: f64,
    ) -> Result<Self, NumericError> {
        if values.len() < 3 {
            return Err(NumericError::InvalidTable(format!(
                "a grid of states needs at least three nodes, got {}",
                values.len()
            )));
        }
        let top = values.len() - 1;
        let high = values[top];
        if !(high > 0.0) {
            return Err(NumericError::InvalidTable(format!(
                "grid of states must be positive at its ceiling, got {}",
                high
            )));
        }

        let lookup = if discrete {
            Lookup::Step
        } else {
            let x = (0..values.len()).map(|k| step * k as f64).collect();
            Lookup::Spline(CubicSpline::new(x, values.clone())?)
        };
        let energy_top = step * top as f64;
        let slope = match &lookup {
            Lookup::Step => (high - values[top - 1]) / step,
            Lookup::Spline(spline) => spline.derivative(energy_top),
        };
        let mut exponent = energy_top * slope / high;
        if mode != StatesMode::Density {
            // A count never decreases.
            exponent = exponent.max(0.0);
        }
        Ok(Self {
            mode,
            step,
            values,
            lookup,
            exponent,
            band,
        })
    }

    pub fn mode(&self) -> StatesMode {
        self.mode
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn energy_max(&self) -> f64 {
        self.step * (self.values.len() - 1) as f64
    }

    pub fn energy_limit(&self) -> f64 {
        self.energy_max() * self.band
    }

    pub fn tail_exponent(&self) -> f64 {
        self.exponent
    }

    /// States at `energy` above the ground.
    pub fn value(&self, energy: f64) -> Result<f64, NumericError> {
        if energy < 0.0 {
            return Ok(0.0);
        }
        let top = self.energy_max();
        if energy > top {
            if energy > self.energy_limit() {
                return Err(NumericError::OutOfRange {
                    x: energy,
                    min: 0.0,
                    max: self.energy_limit(),
                });
            }
            let last = self.values[self.values.len() - 1];
            return Ok(last * (energy / top).powf(self.exponent));
        }
        Ok(match &self.lookup {
            Lookup::Step => {
                let position = energy / self.step;
                let index = match self.mode {
                    StatesMode::Density => position.round(),
                    StatesMode::Number | StatesMode::NoStates => (position + 1e-9).floor(),
                } as usize;
                self.values[index.min(self.values.len() - 1)]
            }
            Lookup::Spline(spline) => spline.value(energy).max(0.0),
        })
    }

    /// Canonical weight relative to the ground.
    ///
    /// A discrete count grid sums its steps exactly, `Σ ΔN_k exp(-E_k/T)`, and
    /// adds the power-law tail by quadrature; other grids take the Laplace
    /// transform of their interpolated count.
    pub fn weight(&self, temperature: f64) -> Result<f64, NumericError> {
        let limit = self.energy_limit();
        let discrete_count = matches!(self.lookup, Lookup::Step)
            && !matches!(self.mode, StatesMode::Density);
        if !discrete_count {
            return laplace_weight(|e| self.number(e), temperature, limit);
        }
        if limit < LAPLACE_SPAN_MIN * temperature {
            return Err(NumericError::OutOfRange {
                x: temperature,
                min: 0.0,
                max: limit / LAPLACE_SPAN_MIN,
            });
        }

        let mut previous = 0.0;
        let mut sum = 0.0;
        for (k, &value) in self.values.iter().enumerate() {
            sum += (value - previous) * (-self.step * k as f64 / temperature).exp();
            previous = value;
        }

        let top = self.energy_max();
        let upper = (LAPLACE_SPAN * temperature).min(limit);
        if self.exponent > 0.0 && upper > top {
            sum += try_simpson_fn(
                |e| {
                    let slope = self.exponent * self.value(e)? / e;
                    Ok::<f64, NumericError>(slope * (-e / temperature).exp())
                },
                top,
                upper,
                LAPLACE_INTERVALS,
            )?;
        }
        Ok(sum)
    }

    /// Cumulative count at `energy`, integrating a density grid when needed.
    pub fn number(&self, energy: f64) -> Result<f64, NumericError> {
        match self.mode {
            StatesMode::Number | StatesMode::NoStates => self.value(energy),
            StatesMode::Density => {
                if energy < 0.0 {
                    return Ok(0.0);
                }
                let top = self.energy_max();
                if energy > top {
                    let total = self.number(top)?;
                    let ratio = energy / top;
                    if energy > self.energy_limit() {
                        return Err(NumericError::OutOfRange {
                            x: energy,
                            min: 0.0,
                            max: self.energy_limit(),
                        });
                    }
                    let density = self.values[self.values.len() - 1];
                    let a = self.exponent + 1.0;
                    let integral = if a.abs() < 1e-12 {
                        ratio.ln()
                    } else {
                        (ratio.powf(a) - 1.0) / a
                    };
                    return Ok(total + density * top * integral);
                }
                let cells = ((energy / self.step) + 0.5).floor() as usize;
                let whole: f64 = self.values[..cells.min(self.values.len())].iter().sum();
                let partial = match self.values.get(cells) {
                    Some(v) => v * (energy - (cells as f64 - 0.5) * self.step),
                    None => 0.0,
                };
                Ok(whole * self.step + partial)
            }
        }
    }
}
