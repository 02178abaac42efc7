//! Signal and Continuous Pattern Operations
//!
//! Continuous patterns return one whole-less hap per query, sampled at the
//! start of the queried span. Give them structure with `segment` or
//! `struct_pattern` before handing them to a scheduler.

use crate::error::{PatternError, PatternResult};
use crate::noise;
use crate::pattern::{Fraction, Hap, Pattern};
use std::f64::consts::TAU;

/// Sine wave signal (0 to 1)
pub fn sine() -> Pattern<f64> {
    Pattern::signal(|t| (t.to_float() * TAU).sin() * 0.5 + 0.5)
}

/// Cosine wave signal (0 to 1)
pub fn cosine() -> Pattern<f64> {
    Pattern::signal(|t| (t.to_float() * TAU).cos() * 0.5 + 0.5)
}

/// Sawtooth wave signal (0 to 1)
pub fn saw() -> Pattern<f64> {
    Pattern::signal(|t| t.cycle_pos().to_float())
}

/// Inverse sawtooth wave signal (1 to 0)
pub fn isaw() -> Pattern<f64> {
    Pattern::signal(|t| 1.0 - t.cycle_pos().to_float())
}

/// Triangle wave signal (0 to 1)
pub fn tri() -> Pattern<f64> {
    Pattern::signal(|t| {
        let phase = t.cycle_pos().to_float();
        if phase < 0.5 {
            phase * 2.0
        } else {
            2.0 - phase * 2.0
        }
    })
}

/// Square wave signal (0 or 1)
pub fn square() -> Pattern<f64> {
    Pattern::signal(|t| if t.cycle_pos() < Fraction::new(1, 2) { 0.0 } else { 1.0 })
}

/// Current cycle position as an exact time
pub fn time() -> Pattern<Fraction> {
    Pattern::signal(|t| t)
}

/// `0, 1, .. n-1` spread over one cycle
pub fn run(n: usize) -> Pattern<i64> {
    Pattern::fastcat((0..n as i64).map(Pattern::pure).collect())
}

// ============= Noise Signals =============
//
// Noise signals sample at `t * frequency`, so a frequency of 4 moves through
// four lattice cells of noise per cycle.

fn check_frequency(combinator: &'static str, frequency: f64) -> PatternResult<()> {
    if !frequency.is_finite() {
        return Err(PatternError::argument(
            combinator,
            format!("frequency must be finite, got {}", frequency),
        ));
    }
    Ok(())
}

/// Perlin noise over time, rescaled to 0..1
pub fn perlin(frequency: f64) -> PatternResult<Pattern<f64>> {
    check_frequency("perlin", frequency)?;
    Ok(Pattern::signal(move |t| noise::perlin1d(t.to_float() * frequency) * 0.5 + 0.5))
}

/// Perlin noise over time at a fixed `y` slice, rescaled to 0..1
pub fn perlin_2d(frequency: f64, y: f64) -> PatternResult<Pattern<f64>> {
    check_frequency("perlin_2d", frequency)?;
    Ok(Pattern::signal(move |t| noise::perlin2d(t.to_float() * frequency, y) * 0.5 + 0.5))
}

/// Fractal Brownian motion over time, rescaled to 0..1
pub fn fbm_signal(
    frequency: f64,
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
) -> PatternResult<Pattern<f64>> {
    check_frequency("fbm_signal", frequency)?;
    Ok(Pattern::signal(move |t| {
        noise::fbm(t.to_float() * frequency, octaves, persistence, lacunarity) * 0.5 + 0.5
    }))
}

/// Turbulence over time (raw, unnormalized range)
pub fn turbulence_signal(
    frequency: f64,
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
) -> PatternResult<Pattern<f64>> {
    check_frequency("turbulence_signal", frequency)?;
    Ok(Pattern::signal(move |t| {
        noise::turbulence(t.to_float() * frequency, octaves, persistence, lacunarity)
    }))
}

/// Ridged noise over time at a fixed `y` slice
pub fn ridge_signal(frequency: f64, y: f64, offset: f64) -> PatternResult<Pattern<f64>> {
    check_frequency("ridge_signal", frequency)?;
    Ok(Pattern::signal(move |t| noise::ridge(t.to_float() * frequency, y, offset)))
}

impl Pattern<f64> {
    /// Map a unipolar 0..1 pattern onto `[min, max]`
    pub fn range(self, min: f64, max: f64) -> Pattern<f64> {
        self.fmap(move |v| min + v * (max - min))
    }

    /// Read a named control from the query state, falling back to `default`
    pub fn control(name: &str, default: f64) -> Pattern<f64> {
        let name = name.to_string();
        Pattern::new(move |state| {
            let value = state.control(&name).unwrap_or(default);
            if !value.is_finite() {
                return Err(PatternError::argument(
                    "control",
                    format!("control '{}' is not a finite number", name),
                ));
            }
            Ok(vec![Hap::new(None, state.span, value)])
        })
    }
}
