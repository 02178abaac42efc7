//! Structural alignment: Euclidean rhythms, applicative combination,
//! struct/mask gating and polymeters

use crate::error::{PatternError, PatternResult};
use crate::pattern::{Fraction, Hap, Pattern};
use crate::value::Value;
use tracing::debug;

// ============= Bjorklund =============

/// Distribute `pulses` onsets as evenly as possible over `steps` slots.
///
/// `pulses >= steps` gives all onsets, `pulses == 0` none.
pub fn bjorklund(pulses: usize, steps: usize) -> Vec<bool> {
    if steps == 0 {
        return vec![];
    }
    if pulses >= steps {
        return vec![true; steps];
    }
    if pulses == 0 {
        return vec![false; steps];
    }

    let mut pattern: Vec<Vec<bool>> = vec![vec![true]; pulses];
    let mut remainder: Vec<Vec<bool>> = vec![vec![false]; steps - pulses];

    while remainder.len() > 1 {
        let min_len = pattern.len().min(remainder.len());
        let mut paired = Vec::with_capacity(min_len);
        for i in 0..min_len {
            let mut group = pattern[i].clone();
            group.extend_from_slice(&remainder[i]);
            paired.push(group);
        }

        let leftover = if pattern.len() > remainder.len() {
            pattern[min_len..].to_vec()
        } else {
            remainder[min_len..].to_vec()
        };

        pattern = paired;
        remainder = leftover;
    }

    pattern.extend(remainder);
    pattern.into_iter().flatten().collect()
}

/// Bjorklund sequence rotated left by `rotation` steps (negative rotates right)
pub fn bjorklund_rotated(pulses: usize, steps: usize, rotation: i64) -> Vec<bool> {
    let mut bits = bjorklund(pulses, steps);
    if !bits.is_empty() {
        let shift = rotation.rem_euclid(bits.len() as i64) as usize;
        bits.rotate_left(shift);
    }
    bits
}

pub(crate) fn check_euclid_args(pulses: i64, steps: i64) -> PatternResult<(usize, usize)> {
    if steps <= 0 {
        return Err(PatternError::argument(
            "euclid",
            format!("steps must be positive, got {}", steps),
        ));
    }
    if pulses < 0 {
        return Err(PatternError::argument(
            "euclid",
            format!("pulses must not be negative, got {}", pulses),
        ));
    }
    if pulses > steps {
        debug!(pulses, steps, "euclid pulses exceed steps, filling every step");
    }
    Ok((pulses as usize, steps as usize))
}

impl Pattern<bool> {
    /// Euclidean rhythm as a boolean sequence over one cycle
    pub fn euclid(pulses: i64, steps: i64, rotation: i64) -> PatternResult<Pattern<bool>> {
        let (pulses, steps) = check_euclid_args(pulses, steps)?;
        let bits = bjorklund_rotated(pulses, steps, rotation);
        Ok(Pattern::fastcat(bits.into_iter().map(Pattern::pure).collect()))
    }
}

// ============= Applicative Alignment =============

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    /// Combine values, keeping the structure (wholes) of `self`.
    ///
    /// For every hap of `self`, `other` is queried over that hap's whole and
    /// each overlapping hap contributes one result whose part is the overlap.
    pub fn app_left<U, R>(
        self,
        other: Pattern<U>,
        f: impl Fn(T, U) -> R + Send + Sync + 'static,
    ) -> Pattern<R>
    where
        U: Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
    {
        let steps = self.steps();
        Pattern::new(move |state| {
            let mut haps = Vec::new();
            for left in self.query(state)? {
                let right_haps = other.query(&state.set_span(left.whole_or_part()))?;
                for right in right_haps {
                    if let Some(part) = left.part.intersection(&right.part) {
                        let context = right.combine_context(&left);
                        haps.push(
                            Hap::new(left.whole, part, f(left.value.clone(), right.value))
                                .set_context(context),
                        );
                    }
                }
            }
            Ok(haps)
        })
        .set_steps(steps)
    }

    /// Combine values, keeping the structure of `other`
    pub fn app_right<U, R>(
        self,
        other: Pattern<U>,
        f: impl Fn(T, U) -> R + Send + Sync + 'static,
    ) -> Pattern<R>
    where
        U: Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
    {
        let steps = other.steps();
        Pattern::new(move |state| {
            let mut haps = Vec::new();
            for right in other.query(state)? {
                let left_haps = self.query(&state.set_span(right.whole_or_part()))?;
                for left in left_haps {
                    if let Some(part) = right.part.intersection(&left.part) {
                        let context = left.combine_context(&right);
                        haps.push(
                            Hap::new(right.whole, part, f(left.value, right.value.clone()))
                                .set_context(context),
                        );
                    }
                }
            }
            Ok(haps)
        })
        .set_steps(steps)
    }

    /// Combine values where haps of both patterns overlap; structure comes
    /// from both sides (wholes are intersected)
    pub fn app_both<U, R>(
        self,
        other: Pattern<U>,
        f: impl Fn(T, U) -> R + Send + Sync + 'static,
    ) -> Pattern<R>
    where
        U: Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
    {
        Pattern::new(move |state| {
            let left_haps = self.query(state)?;
            let right_haps = other.query(state)?;
            let mut haps = Vec::new();
            for left in &left_haps {
                for right in &right_haps {
                    let part = match left.part.intersection(&right.part) {
                        Some(part) => part,
                        None => continue,
                    };
                    let whole = match (left.whole, right.whole) {
                        (Some(a), Some(b)) => match a.intersection(&b) {
                            Some(whole) => Some(whole),
                            None => continue,
                        },
                        _ => None,
                    };
                    haps.push(
                        Hap::new(whole, part, f(left.value.clone(), right.value.clone()))
                            .set_context(left.combine_context(right)),
                    );
                }
            }
            Ok(haps)
        })
    }

    /// Impose the structure of a boolean pattern: one hap per true hap of
    /// `bools`, carrying this pattern's value at that time
    pub fn struct_pattern(self, bools: Pattern<bool>) -> Pattern<T> {
        bools
            .app_left(self, |keep, value| (keep, value))
            .filter_map_values(|(keep, value)| if keep { Some(value) } else { None })
    }

    /// Keep this pattern's structure, silencing it where `bools` is false
    pub fn mask(self, bools: Pattern<bool>) -> Pattern<T> {
        self.app_left(bools, |value, keep| (value, keep))
            .filter_map_values(|(value, keep)| if keep { Some(value) } else { None })
    }

    /// `struct_pattern` driven by a value pattern, e.g. `"1 0 ~ 1"`
    pub fn struct_values(self, gate: Pattern<Value>) -> Pattern<T> {
        self.struct_pattern(gate.truthy())
    }

    /// `mask` driven by a value pattern
    pub fn mask_values(self, gate: Pattern<Value>) -> Pattern<T> {
        self.mask(gate.truthy())
    }

    /// Gate this pattern with a Euclidean rhythm
    pub fn euclid_struct(self, pulses: i64, steps: i64, rotation: i64) -> PatternResult<Pattern<T>> {
        Ok(self.struct_pattern(Pattern::<bool>::euclid(pulses, steps, rotation)?))
    }

    // ============= Polymeter =============

    /// Layer sequences of different lengths so each advances `steps` items per
    /// cycle (`{a b, c d e}%steps`)
    pub fn polymeter_steps(steps: usize, layers: Vec<Vec<Pattern<T>>>) -> PatternResult<Pattern<T>> {
        if steps == 0 {
            return Err(PatternError::argument(
                "polymeter",
                "steps per cycle must be positive",
            ));
        }
        let per_cycle = Fraction::from_integer(steps as i64);
        let mut stacked = Vec::with_capacity(layers.len());
        for layer in layers.into_iter().filter(|layer| !layer.is_empty()) {
            let len = Fraction::from_integer(layer.len() as i64);
            stacked.push(Pattern::fastcat(layer).fast_unchecked(per_cycle / len));
        }
        Ok(Pattern::stack(stacked).set_steps(Some(per_cycle)))
    }

    /// Polymeter stepped at the length of the first non-empty layer
    pub fn polymeter(layers: Vec<Vec<Pattern<T>>>) -> PatternResult<Pattern<T>> {
        let steps = layers
            .iter()
            .map(|layer| layer.len())
            .find(|len| *len > 0)
            .unwrap_or(0);
        if steps == 0 {
            return Ok(Pattern::silence());
        }
        Pattern::polymeter_steps(steps, layers)
    }
}

impl Pattern<Value> {
    /// Merge parameters from `other` into this pattern's haps; structure comes
    /// from `self`, colliding keys take `other`'s value
    pub fn set(self, other: Pattern<Value>) -> Pattern<Value> {
        self.app_left(other, |left, right| left.union(right))
    }
}
