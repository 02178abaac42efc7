//! Randomness, probability and conditional pattern operators
//!
//! Every random decision is a pure function of a seed and a position in
//! rational time, so a pattern gives the same answer no matter how often, in
//! which order, or from which thread it is queried.

use crate::error::{PatternError, PatternResult};
use crate::pattern::{Fraction, Hap, Pattern, TimeSpan};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;

/// Deterministic uniform value in `[0, 1)` for a seed and a time
pub fn time_to_rand(seed: u64, t: Fraction) -> f64 {
    let event_seed = seed
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add((t.numerator() as u64).wrapping_mul(2654435761))
        .rotate_left(29)
        ^ (t.denominator() as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    let mut rng = StdRng::seed_from_u64(event_seed);
    rng.gen::<f64>()
}

fn check_probability(combinator: &'static str, p: f64) -> PatternResult<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(PatternError::argument(
            combinator,
            format!("probability must be within [0, 1], got {}", p),
        ));
    }
    Ok(())
}

// ============= Random Signals =============

impl Pattern<f64> {
    /// Continuous random signal in `[0, 1)`
    pub fn rand() -> Pattern<f64> {
        Self::rand_seeded(0)
    }

    pub fn rand_seeded(seed: u64) -> Pattern<f64> {
        Pattern::signal(move |t| time_to_rand(seed, t))
    }
}

impl Pattern<i64> {
    /// Continuous random integers in `[0, n)`
    pub fn irand(seed: u64, n: u32) -> PatternResult<Pattern<i64>> {
        if n == 0 {
            return Err(PatternError::argument("irand", "range must be positive"));
        }
        Ok(Pattern::<f64>::rand_seeded(seed).fmap(move |r| (r * n as f64).floor() as i64))
    }
}

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    // ============= Random Choice =============

    /// Continuous pattern choosing uniformly among `values`
    pub fn choose(seed: u64, values: Vec<T>) -> PatternResult<Pattern<T>> {
        if values.is_empty() {
            return Err(PatternError::argument("choose", "no values to choose from"));
        }
        let len = values.len();
        Ok(Pattern::signal(move |t| {
            let index = ((time_to_rand(seed, t) * len as f64) as usize).min(len - 1);
            values[index].clone()
        }))
    }

    /// Continuous pattern choosing among values in proportion to their weights
    pub fn wchoose(seed: u64, weighted: Vec<(T, f64)>) -> PatternResult<Pattern<T>> {
        if weighted.is_empty() {
            return Err(PatternError::argument("wchoose", "no values to choose from"));
        }
        if weighted.iter().any(|(_, w)| !(w.is_finite() && *w >= 0.0)) {
            return Err(PatternError::argument("wchoose", "weights must be non-negative"));
        }
        let total: f64 = weighted.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Err(PatternError::argument("wchoose", "weights sum to zero"));
        }

        Ok(Pattern::signal(move |t| {
            let target = time_to_rand(seed, t) * total;
            let mut acc = 0.0;
            for (value, weight) in &weighted {
                acc += weight;
                if target < acc {
                    return value.clone();
                }
            }
            // Rounding can leave target == total
            weighted[weighted.len() - 1].0.clone()
        }))
    }

    /// Pick one of `patterns` at random for each cycle
    pub fn randcat(seed: u64, patterns: Vec<Pattern<T>>) -> Pattern<T> {
        if patterns.is_empty() {
            return Pattern::silence();
        }
        let len = patterns.len();
        let patterns = Arc::new(patterns);
        Pattern::new(move |state| {
            let cycle = state.span.begin.sam();
            let index = ((time_to_rand(seed, cycle) * len as f64) as usize).min(len - 1);
            patterns[index].query(state)
        })
        .split_queries()
    }

    // ============= Degrade =============

    /// Drop each hap with probability `amount`
    pub fn degrade_by(self, amount: f64) -> PatternResult<Self> {
        self.degrade_by_with_seed(amount, 0)
    }

    pub fn degrade_by_with_seed(self, amount: f64, seed: u64) -> PatternResult<Self> {
        check_probability("degrade_by", amount)?;
        Ok(self.keep_by_rand(seed, move |r| r >= amount))
    }

    /// Keep exactly the haps `degrade_by(amount)` would drop
    pub fn undegrade_by(self, amount: f64) -> PatternResult<Self> {
        self.undegrade_by_with_seed(amount, 0)
    }

    pub fn undegrade_by_with_seed(self, amount: f64, seed: u64) -> PatternResult<Self> {
        check_probability("undegrade_by", amount)?;
        Ok(self.keep_by_rand(seed, move |r| r < amount))
    }

    /// Drop half of the haps
    pub fn degrade(self) -> Self {
        self.keep_by_rand(0, |r| r >= 0.5)
    }

    // The random value comes from the start of the whole, so every fragment of
    // one event gets the same verdict
    fn keep_by_rand(self, seed: u64, keep: impl Fn(f64) -> bool + Send + Sync + 'static) -> Self {
        self.filter_haps(move |hap| keep(time_to_rand(seed, hap.whole_or_part().begin)))
    }

    // ============= Sometimes =============

    /// Apply `f` to a random `amount` fraction of haps, leaving the rest as is.
    ///
    /// The two fractions are disjoint: a hap is either passed through or fed to `f`.
    pub fn sometimes_by(
        self,
        amount: f64,
        f: impl FnOnce(Pattern<T>) -> PatternResult<Pattern<T>>,
    ) -> PatternResult<Self> {
        self.sometimes_by_with_seed(amount, 0, f)
    }

    pub fn sometimes_by_with_seed(
        self,
        amount: f64,
        seed: u64,
        f: impl FnOnce(Pattern<T>) -> PatternResult<Pattern<T>>,
    ) -> PatternResult<Self> {
        check_probability("sometimes_by", amount)?;
        let untouched = self.clone().degrade_by_with_seed(amount, seed)?;
        let transformed = f(self.undegrade_by_with_seed(amount, seed)?)?;
        Ok(Pattern::stack(vec![untouched, transformed]))
    }

    /// Apply a function to half the haps
    pub fn sometimes(self, f: impl FnOnce(Pattern<T>) -> PatternResult<Pattern<T>>) -> PatternResult<Self> {
        self.sometimes_by(0.5, f)
    }

    /// 75%
    pub fn often(self, f: impl FnOnce(Pattern<T>) -> PatternResult<Pattern<T>>) -> PatternResult<Self> {
        self.sometimes_by(0.75, f)
    }

    /// 25%
    pub fn rarely(self, f: impl FnOnce(Pattern<T>) -> PatternResult<Pattern<T>>) -> PatternResult<Self> {
        self.sometimes_by(0.25, f)
    }

    /// 90%
    pub fn almost_always(
        self,
        f: impl FnOnce(Pattern<T>) -> PatternResult<Pattern<T>>,
    ) -> PatternResult<Self> {
        self.sometimes_by(0.9, f)
    }

    /// 10%
    pub fn almost_never(
        self,
        f: impl FnOnce(Pattern<T>) -> PatternResult<Pattern<T>>,
    ) -> PatternResult<Self> {
        self.sometimes_by(0.1, f)
    }

    pub fn always(self, f: impl FnOnce(Pattern<T>) -> PatternResult<Pattern<T>>) -> PatternResult<Self> {
        f(self)
    }

    pub fn never(self, _f: impl FnOnce(Pattern<T>) -> PatternResult<Pattern<T>>) -> PatternResult<Self> {
        Ok(self)
    }

    /// Apply `f` to whole cycles chosen at random with probability `amount`
    pub fn somecycles_by(
        self,
        amount: f64,
        seed: u64,
        f: impl FnOnce(Pattern<T>) -> PatternResult<Pattern<T>>,
    ) -> PatternResult<Self> {
        check_probability("somecycles_by", amount)?;
        let transformed = f(self.clone())?;
        Ok(self.when_cycle(move |cycle| time_to_rand(seed, Fraction::from_integer(cycle)) < amount, transformed))
    }

    // ============= Conditional Operations =============

    fn when_cycle(
        self,
        pred: impl Fn(i64) -> bool + Send + Sync + 'static,
        transformed: Pattern<T>,
    ) -> Self {
        let steps = self.steps();
        Pattern::new(move |state| {
            let cycle = state.span.begin.sam().numerator();
            if pred(cycle) {
                transformed.query(state)
            } else {
                self.query(state)
            }
        })
        .split_queries()
        .set_steps(steps)
    }

    /// Apply `f` on every `n`th cycle, starting with cycle 0
    pub fn every(
        self,
        n: i64,
        f: impl FnOnce(Pattern<T>) -> PatternResult<Pattern<T>>,
    ) -> PatternResult<Self> {
        if n <= 0 {
            return Err(PatternError::argument(
                "every",
                format!("period must be positive, got {}", n),
            ));
        }
        let transformed = f(self.clone())?;
        Ok(self.when_cycle(move |cycle| cycle.rem_euclid(n) == 0, transformed))
    }

    /// Apply `f` when `cycle mod modulo >= offset`
    pub fn when_mod(
        self,
        modulo: i64,
        offset: i64,
        f: impl FnOnce(Pattern<T>) -> PatternResult<Pattern<T>>,
    ) -> PatternResult<Self> {
        if modulo <= 0 {
            return Err(PatternError::argument(
                "when_mod",
                format!("modulo must be positive, got {}", modulo),
            ));
        }
        let transformed = f(self.clone())?;
        Ok(self.when_cycle(move |cycle| cycle.rem_euclid(modulo) >= offset, transformed))
    }

    // ============= Layering =============

    /// Play the pattern together with a transformed copy of itself
    pub fn superimpose(
        self,
        f: impl FnOnce(Pattern<T>) -> PatternResult<Pattern<T>>,
    ) -> PatternResult<Self> {
        let transformed = f(self.clone())?;
        Ok(Pattern::stack(vec![self, transformed]))
    }

    /// Superimpose a copy shifted later by `offset` and transformed by `f`
    pub fn off(
        self,
        offset: Fraction,
        f: impl FnOnce(Pattern<T>) -> PatternResult<Pattern<T>>,
    ) -> PatternResult<Self> {
        self.superimpose(move |p| f(p.late(offset)))
    }

    // ============= Structural Manipulation =============

    /// Repeat each event `n` times within its own span
    pub fn ply(self, n: usize) -> PatternResult<Self> {
        if n == 0 {
            return Err(PatternError::argument("ply", "repeat count must be positive"));
        }
        let count = Fraction::from_integer(n as i64);
        let steps = self.steps().map(|s| s * count);
        Ok(Pattern::new(move |state| {
            let mut haps = Vec::new();
            for hap in self.query(state)? {
                let whole = match hap.whole {
                    Some(whole) => whole,
                    None => {
                        haps.push(hap);
                        continue;
                    }
                };
                let step = whole.end.checked_sub(whole.begin)?.checked_div(count)?;
                for i in 0..n {
                    let begin = whole
                        .begin
                        .checked_add(step.checked_mul(Fraction::from_integer(i as i64))?)?;
                    let sub = TimeSpan::new(begin, begin.checked_add(step)?);
                    if let Some(part) = sub.intersection(&hap.part) {
                        haps.push(
                            Hap::new(Some(sub), part, hap.value.clone())
                                .set_context(hap.context.clone()),
                        );
                    }
                }
            }
            Ok(haps)
        })
        .set_steps(steps))
    }

    /// Sample the pattern `n` times per cycle, giving it discrete structure
    pub fn segment(self, n: usize) -> PatternResult<Self> {
        if n == 0 {
            return Err(PatternError::argument("segment", "segment count must be positive"));
        }
        let count = Fraction::from_integer(n as i64);
        Ok(Pattern::pure(())
            .fast_unchecked(count)
            .app_left(self, |_, value| value)
            .set_steps(Some(count)))
    }

    /// Shift the pattern one `1/n` step earlier each cycle
    pub fn iter(self, n: usize) -> PatternResult<Self> {
        if n == 0 {
            return Err(PatternError::argument("iter", "division count must be positive"));
        }
        let steps = self.steps();
        let n = n as i64;
        let shifted = (0..n)
            .map(|i| self.clone().early(Fraction::new(i, n)))
            .collect();
        Ok(Pattern::slowcat(shifted).set_steps(steps))
    }

    /// Reverse every other cycle
    pub fn palindrome(self) -> Self {
        let reversed = self.clone().rev();
        self.when_cycle(|cycle| cycle.rem_euclid(2) == 1, reversed)
    }
}
