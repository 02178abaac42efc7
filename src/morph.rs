//! Pattern morphing: tension curves and curve-driven blends between patterns
//!
//! Every blend derives its tension from the position of the query, never from
//! elapsed time or stored state. A morph over `cycles` cycles wraps around and
//! starts again after each period.

use crate::config::Limits;
use crate::error::{PatternError, PatternResult};
use crate::fractal::ElementaryAutomaton;
use crate::pattern::{Context, Fraction, Hap, Pattern, TimeSpan};
use crate::value::Value;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Golden ratio
const PHI: f64 = 1.618_033_988_749_895;

/// Where `cliff` peaks
const CLIFF_PEAK: f64 = 0.8;

/// On/off divisions of `pulse`
const PULSE_DIVISIONS: f64 = 8.0;

/// Lorenz integration steps per unit of `t`
const LORENZ_STEPS: f64 = 1000.0;
const LORENZ_DT: f64 = 0.01;

/// Filter sweeps for `spectral_morph`, in Hz
const HPF_START: f64 = 20.0;
const HPF_END: f64 = 8000.0;
const LPF_START: f64 = 20_000.0;
const LPF_END: f64 = 200.0;

/// Cell count `evolve` uses when the pattern has no integral step count
const DEFAULT_EVOLVE_CELLS: usize = 16;

pub type CurveFn = dyn Fn(f64) -> PatternResult<f64> + Send + Sync;

/// A `[0, 1] -> [0, 1]` transition shape
#[derive(Clone)]
pub enum TensionCurve {
    Linear,
    /// `sin(pi t)`: up and back down
    Arc,
    /// Slow rise to a peak at 0.8, then a sharp drop
    Cliff,
    /// `(sin(4 pi t) + 1) / 2`
    Wave,
    /// `t^(1/phi)`
    Golden,
    /// Alternating on/off over eight divisions
    Pulse,
    /// Lorenz attractor `x` after `1000 t` steps, squashed into `[0, 1]`
    Lorenz,
    Custom(Arc<CurveFn>),
}

lazy_static! {
    static ref CURVES_BY_NAME: HashMap<&'static str, TensionCurve> = {
        let mut m = HashMap::new();
        m.insert("linear", TensionCurve::Linear);
        m.insert("arc", TensionCurve::Arc);
        m.insert("cliff", TensionCurve::Cliff);
        m.insert("wave", TensionCurve::Wave);
        m.insert("golden", TensionCurve::Golden);
        m.insert("pulse", TensionCurve::Pulse);
        m.insert("lorenz", TensionCurve::Lorenz);
        m
    };
}

impl TensionCurve {
    /// Look up a named curve; unknown names fall back to `Arc`
    pub fn from_name(name: &str) -> TensionCurve {
        match CURVES_BY_NAME.get(name.trim().to_lowercase().as_str()) {
            Some(curve) => curve.clone(),
            None => {
                warn!(name, "unknown tension curve, falling back to arc");
                TensionCurve::Arc
            }
        }
    }

    /// Names accepted by `from_name`, sorted
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = CURVES_BY_NAME.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn custom(f: impl Fn(f64) -> PatternResult<f64> + Send + Sync + 'static) -> TensionCurve {
        TensionCurve::Custom(Arc::new(f))
    }

    pub fn name(&self) -> &'static str {
        match self {
            TensionCurve::Linear => "linear",
            TensionCurve::Arc => "arc",
            TensionCurve::Cliff => "cliff",
            TensionCurve::Wave => "wave",
            TensionCurve::Golden => "golden",
            TensionCurve::Pulse => "pulse",
            TensionCurve::Lorenz => "lorenz",
            TensionCurve::Custom(_) => "custom",
        }
    }

    /// Evaluate at `t`, clamped to `[0, 1]`.
    ///
    /// Custom curves may fail; their output is clamped like the built-ins.
    pub fn apply(&self, t: f64) -> PatternResult<f64> {
        if t.is_nan() {
            return Err(PatternError::Arithmetic("tension curve input is NaN".to_string()));
        }
        let t = t.clamp(0.0, 1.0);
        let value = match self {
            TensionCurve::Linear => t,
            TensionCurve::Arc => (PI * t).sin(),
            TensionCurve::Cliff => {
                if t < CLIFF_PEAK {
                    (t / CLIFF_PEAK * PI / 2.0).sin()
                } else {
                    (1.0 - t) / (1.0 - CLIFF_PEAK)
                }
            }
            TensionCurve::Wave => ((4.0 * PI * t).sin() + 1.0) / 2.0,
            TensionCurve::Golden => t.powf(1.0 / PHI),
            TensionCurve::Pulse => {
                if (t * PULSE_DIVISIONS).floor() as i64 % 2 == 0 {
                    1.0
                } else {
                    0.0
                }
            }
            TensionCurve::Lorenz => lorenz_x(t),
            TensionCurve::Custom(f) => {
                let v = f(t)?;
                if !v.is_finite() {
                    return Err(PatternError::Arithmetic(format!(
                        "custom tension curve returned {} at {}",
                        v, t
                    )));
                }
                v
            }
        };
        Ok(value.clamp(0.0, 1.0))
    }
}

impl fmt::Debug for TensionCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TensionCurve::{}", self.name())
    }
}

// Integrated from scratch on every call so the result depends on `t` alone
fn lorenz_x(t: f64) -> f64 {
    let (sigma, rho, beta) = (10.0, 28.0, 8.0 / 3.0);
    let (mut x, mut y, mut z) = (1.0f64, 1.0f64, 1.0f64);
    let steps = (t * LORENZ_STEPS).floor() as usize;
    for _ in 0..steps {
        let dx = sigma * (y - x);
        let dy = x * (rho - z) - y;
        let dz = x * y - beta * z;
        x += dx * LORENZ_DT;
        y += dy * LORENZ_DT;
        z += dz * LORENZ_DT;
    }
    ((x / 10.0).tanh() + 1.0) / 2.0
}

fn check_cycles(combinator: &'static str, cycles: Fraction) -> PatternResult<()> {
    if cycles <= Fraction::ZERO {
        return Err(PatternError::argument(
            combinator,
            format!("period must be positive, got {} cycles", cycles),
        ));
    }
    Ok(())
}

/// Tension at time `t` of a morph lasting `cycles`, wrapping each period
pub fn tension_at(curve: &TensionCurve, t: Fraction, cycles: Fraction) -> PatternResult<f64> {
    let progress = t.modulo(cycles)?.checked_div(cycles)?;
    curve.apply(progress.to_float())
}

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    /// Speed the pattern from its own density towards `target_density` steps
    /// per cycle as the curve rises
    pub fn density_morph(
        self,
        target_density: f64,
        curve: TensionCurve,
        cycles: Fraction,
    ) -> PatternResult<Pattern<T>> {
        check_cycles("density_morph", cycles)?;
        if !(target_density.is_finite() && target_density > 0.0) {
            return Err(PatternError::argument(
                "density_morph",
                format!("target density must be positive, got {}", target_density),
            ));
        }
        let current = self
            .steps()
            .map(|s| s.to_float())
            .filter(|s| *s > 0.0)
            .unwrap_or(1.0);

        Ok(Pattern::new(move |state| {
            let tension = tension_at(&curve, state.span.begin, cycles)?;
            let density = current + (target_density - current) * tension;
            let factor = Fraction::from_float(density / current)?;
            self.clone().fast(factor)?.query(state)
        })
        .split_queries())
    }

    /// Run an elementary automaton seeded from this pattern's first-cycle
    /// onsets. Cycle `c` shows generation `c mod generations`; the `k`th live
    /// cell takes the value of the `k`th onset (wrapping). The cell count must
    /// fit within `limits.max_automaton_size`.
    pub fn evolve(self, rule: u32, generations: usize, limits: &Limits) -> PatternResult<Pattern<T>> {
        if generations == 0 {
            return Err(PatternError::argument("evolve", "generations must be positive"));
        }
        let size = match self.steps() {
            Some(steps) if steps.is_integer() && steps > Fraction::ZERO => steps.numerator() as usize,
            _ => DEFAULT_EVOLVE_CELLS,
        };
        limits.check_automaton("evolve", size)?;

        let mut onsets: Vec<Hap<T>> = self
            .first_cycle()?
            .into_iter()
            .filter(|hap| hap.has_onset())
            .collect();
        onsets.sort_by_key(|hap| hap.part.begin);
        if onsets.is_empty() {
            return Ok(Pattern::silence());
        }

        let cell_count = Fraction::from_integer(size as i64);
        let positions: Vec<usize> = onsets
            .iter()
            .map(|hap| (hap.part.begin.cycle_pos() * cell_count).floor().numerator() as usize)
            .collect();
        let seeds: Vec<(T, Context)> = onsets
            .into_iter()
            .map(|hap| (hap.value, hap.context))
            .collect();

        Ok(Pattern::new(move |state| {
            let cycle = state.span.begin.sam();
            let generation = cycle.numerator().rem_euclid(generations as i64) as usize;
            let mut automaton = ElementaryAutomaton::from_positions(rule, size, positions.iter().copied());
            automaton.steps(generation);

            let mut haps = Vec::new();
            let live = automaton
                .cells()
                .iter()
                .enumerate()
                .filter(|(_, alive)| **alive)
                .map(|(i, _)| i);
            for (k, i) in live.enumerate() {
                let begin = cycle.checked_add(Fraction::new(i as i64, size as i64))?;
                let whole = TimeSpan::new(begin, begin.checked_add(cell_count.recip()?)?);
                if let Some(part) = whole.intersection(&state.span) {
                    let (value, context) = &seeds[k % seeds.len()];
                    haps.push(Hap::new(Some(whole), part, value.clone()).set_context(context.clone()));
                }
            }
            Ok(haps)
        })
        .split_queries()
        .set_steps(Some(cell_count)))
    }
}

impl Pattern<Value> {
    /// Crossfade into `target`: source gains scale by `1 - tension`, target
    /// gains by `tension`
    pub fn morph(
        self,
        target: Pattern<Value>,
        curve: TensionCurve,
        cycles: Fraction,
    ) -> PatternResult<Pattern<Value>> {
        check_cycles("morph", cycles)?;
        Ok(Pattern::new(move |state| {
            let tension = tension_at(&curve, state.span.begin, cycles)?;
            let mut haps: Vec<Hap<Value>> = self
                .query(state)?
                .into_iter()
                .map(|hap| hap.with_value(|v| v.scale_gain(1.0 - tension)))
                .collect();
            haps.extend(
                target
                    .query(state)?
                    .into_iter()
                    .map(|hap| hap.with_value(|v| v.scale_gain(tension))),
            );
            Ok(haps)
        })
        .split_queries())
    }

    /// Crossfade by filter hints: the source gets a rising `hpf`, the target a
    /// falling `lpf`
    pub fn spectral_morph(
        self,
        target: Pattern<Value>,
        curve: TensionCurve,
        cycles: Fraction,
    ) -> PatternResult<Pattern<Value>> {
        check_cycles("spectral_morph", cycles)?;
        Ok(Pattern::new(move |state| {
            let tension = tension_at(&curve, state.span.begin, cycles)?;
            let hpf = HPF_START + (HPF_END - HPF_START) * tension;
            let lpf = LPF_START + (LPF_END - LPF_START) * tension;
            let mut haps: Vec<Hap<Value>> = self
                .query(state)?
                .into_iter()
                .map(|hap| hap.with_value(|v| v.with_param("hpf", Value::Float(hpf))))
                .collect();
            haps.extend(
                target
                    .query(state)?
                    .into_iter()
                    .map(|hap| hap.with_value(|v| v.with_param("lpf", Value::Float(lpf)))),
            );
            Ok(haps)
        })
        .split_queries())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gain(hap: &Hap<Value>) -> f64 {
        hap.value.param("gain").and_then(Value::as_f64).unwrap()
    }

    fn cycle<T: Clone + Send + Sync + 'static>(p: &Pattern<T>, c: i64) -> Vec<Hap<T>> {
        p.query_span(Fraction::from_integer(c), Fraction::from_integer(c + 1))
            .unwrap()
    }

    #[test]
    fn test_curve_boundaries() {
        let arc = TensionCurve::Arc;
        assert_eq!(arc.apply(0.0).unwrap(), 0.0);
        assert!((arc.apply(0.5).unwrap() - 1.0).abs() < 1e-12);
        assert!(arc.apply(1.0).unwrap() < 1e-12);

        let golden = TensionCurve::Golden;
        assert_eq!(golden.apply(0.0).unwrap(), 0.0);
        assert_eq!(golden.apply(1.0).unwrap(), 1.0);

        let cliff = TensionCurve::Cliff;
        assert!((cliff.apply(0.8).unwrap() - 1.0).abs() < 1e-12);
        assert!(cliff.apply(1.0).unwrap() < 1e-12);
        assert!(cliff.apply(0.4).unwrap() < cliff.apply(0.7).unwrap());

        assert!((TensionCurve::Wave.apply(0.0).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(TensionCurve::Pulse.apply(0.0).unwrap(), 1.0);
        assert_eq!(TensionCurve::Pulse.apply(0.2).unwrap(), 0.0);
    }

    #[test]
    fn test_apply_clamps_input() {
        let linear = TensionCurve::Linear;
        assert_eq!(linear.apply(1.7).unwrap(), 1.0);
        assert_eq!(linear.apply(-3.0).unwrap(), 0.0);
        assert!(linear.apply(f64::NAN).is_err());
    }

    #[test]
    fn test_lorenz_deterministic() {
        let lorenz = TensionCurve::Lorenz;
        let first = lorenz.apply(0.37).unwrap();
        let _ = lorenz.apply(0.9).unwrap();
        assert_eq!(lorenz.apply(0.37).unwrap(), first);
        assert!((0.0..=1.0).contains(&first));
        assert!((lorenz.apply(0.0).unwrap() - ((0.1f64).tanh() + 1.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_name_fallback() {
        assert_eq!(TensionCurve::from_name("Golden").name(), "golden");
        assert_eq!(TensionCurve::from_name("goldne").name(), "arc");
        assert_eq!(TensionCurve::names().len(), 7);
    }

    #[test]
    fn test_custom_curve_clamped_and_fallible() {
        let double = TensionCurve::custom(|t| Ok(t * 2.0));
        assert_eq!(double.apply(0.75).unwrap(), 1.0);
        let broken = TensionCurve::custom(|_| Err(PatternError::Arithmetic("boom".into())));
        assert!(broken.apply(0.5).is_err());
    }

    #[test]
    fn test_morph_gains() {
        let source = Pattern::pure(Value::from("bd"));
        let target = Pattern::pure(Value::from("sn"));
        let p = source
            .morph(target, TensionCurve::Linear, Fraction::from_integer(4))
            .unwrap();

        let start = cycle(&p, 0);
        assert_eq!(start.len(), 2);
        assert_eq!(gain(&start[0]), 1.0);
        assert_eq!(gain(&start[1]), 0.0);

        let middle = cycle(&p, 2);
        assert_eq!(gain(&middle[0]), 0.5);
        assert_eq!(gain(&middle[1]), 0.5);

        let wrapped = cycle(&p, 4);
        assert_eq!(gain(&wrapped[0]), 1.0);
    }

    #[test]
    fn test_morph_rejects_bad_period() {
        let p = Pattern::pure(Value::from(1i64));
        assert!(p.clone().morph(p.clone(), TensionCurve::Arc, Fraction::ZERO).is_err());
        assert!(p.clone().spectral_morph(p, TensionCurve::Arc, Fraction::from_integer(-2)).is_err());
    }

    #[test]
    fn test_morph_propagates_curve_error() {
        let p = Pattern::pure(Value::from(1i64));
        let broken = TensionCurve::custom(|_| Err(PatternError::Arithmetic("boom".into())));
        let morphed = p.clone().morph(p, broken, Fraction::ONE).unwrap();
        assert!(morphed.first_cycle().is_err());
    }

    #[test]
    fn test_spectral_morph_params() {
        let p = Pattern::pure(Value::from("pad"))
            .spectral_morph(Pattern::pure(Value::from("lead")), TensionCurve::Linear, Fraction::from_integer(4))
            .unwrap();
        let start = cycle(&p, 0);
        assert_eq!(start[0].value.param("hpf"), Some(&Value::Float(20.0)));
        assert_eq!(start[1].value.param("lpf"), Some(&Value::Float(20_000.0)));

        let middle = cycle(&p, 2);
        assert_eq!(middle[0].value.param("hpf"), Some(&Value::Float(4010.0)));
        assert_eq!(middle[1].value.param("lpf"), Some(&Value::Float(10_100.0)));
    }

    #[test]
    fn test_density_morph() {
        let p = Pattern::pure('x')
            .density_morph(4.0, TensionCurve::Linear, Fraction::from_integer(4))
            .unwrap();
        assert_eq!(cycle(&p, 0).len(), 1);
        let dense = cycle(&p, 2);
        assert_eq!(dense.iter().filter(|h| h.has_onset()).count(), 3);
        assert!(Pattern::pure('x')
            .density_morph(0.0, TensionCurve::Linear, Fraction::ONE)
            .is_err());
    }

    #[test]
    fn test_evolve_rule_90() {
        let p = Pattern::fastcat(vec![
            Pattern::pure(7),
            Pattern::silence(),
            Pattern::silence(),
            Pattern::silence(),
        ])
        .evolve(90, 2, &Limits::default())
        .unwrap();

        let c0 = cycle(&p, 0);
        assert_eq!(c0.len(), 1);
        assert_eq!(c0[0].whole, Some(TimeSpan::new(Fraction::ZERO, Fraction::new(1, 4))));

        let c1 = cycle(&p, 1);
        let begins: Vec<Fraction> = c1.iter().map(|h| h.whole.unwrap().begin).collect();
        assert_eq!(begins, vec![Fraction::new(5, 4), Fraction::new(7, 4)]);
        assert!(c1.iter().all(|h| h.value == 7));

        assert_eq!(cycle(&p, 2).len(), 1);
    }

    #[test]
    fn test_evolve_edges() {
        let limits = Limits::default();
        assert!(Pattern::pure(1).evolve(30, 0, &limits).is_err());
        let empty = Pattern::<i32>::silence().evolve(30, 4, &limits).unwrap();
        assert!(cycle(&empty, 3).is_empty());
    }

    #[test]
    fn test_evolve_respects_automaton_limit() {
        let tight = Limits {
            max_automaton_size: 8,
            ..Limits::default()
        };
        let eight = Pattern::fastcat((0..8).map(Pattern::pure).collect());
        assert!(eight.evolve(30, 2, &tight).is_ok());

        // No step count falls back to 16 cells
        let err = Pattern::<i32>::silence().evolve(30, 2, &tight).unwrap_err();
        assert!(matches!(err, PatternError::PatternArgument { combinator: "evolve", .. }));
    }
}
