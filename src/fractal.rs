//! Fractal and generative sequence builders
//!
//! Cantor sets, Sierpinski, dragon curves, L-systems, elementary cellular
//! automata, iterated function systems and chaos maps. The sequence functions
//! are pure; only the IFS family draws random numbers, always from an
//! explicitly seeded `StdRng`.
//!
//! Sizes grow fast (`cantor(depth)` is `O(3^depth)`, `cellular_automaton(rule,
//! size)` is `O(size^2)`), so the pattern-level entry point, [`Generator`],
//! checks [`Limits`] before allocating anything.

use crate::config::Limits;
use crate::error::{PatternError, PatternResult};
use crate::pattern::Pattern;
use crate::pattern_structure::{bjorklund_rotated, check_euclid_args};
use num_complex::Complex64;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

// ============= Recursive Sequences =============

/// Cantor set of length `3^depth`: keep the outer thirds, blank the middle
pub fn cantor(depth: u32) -> Vec<bool> {
    let mut seq = vec![true];
    for _ in 0..depth {
        let len = seq.len();
        let mut next = Vec::with_capacity(len * 3);
        next.extend_from_slice(&seq);
        next.extend(std::iter::repeat(false).take(len));
        next.extend_from_slice(&seq);
        seq = next;
    }
    seq
}

/// Sequence of length `2^depth` where index `i` is set iff `i & j == j` for
/// every `j` in `1..=i`.
///
/// Use [`Generator::Sierpinski`] for untrusted depths; it checks the length first.
pub fn sierpinski(depth: u32) -> Vec<bool> {
    let len = 1usize.checked_shl(depth).unwrap_or(0);
    (0..len)
        .map(|i| (1..=i).all(|j| i & j == j))
        .collect()
}

/// Paper-folding dragon sequence of length `2^(n+1) - 1`
pub fn dragon(n: u32) -> Vec<bool> {
    let mut seq = vec![true];
    for _ in 0..n {
        let folded: Vec<bool> = seq.iter().rev().map(|b| !b).collect();
        seq.push(true);
        seq.extend(folded);
    }
    seq
}

// ============= L-Systems =============

/// String rewriting system; symbols without a rule are copied unchanged
#[derive(Debug, Clone, PartialEq)]
pub struct LSystem {
    axiom: String,
    rules: HashMap<char, String>,
}

impl LSystem {
    pub fn new(axiom: impl Into<String>) -> Self {
        Self {
            axiom: axiom.into(),
            rules: HashMap::new(),
        }
    }

    pub fn rule(mut self, symbol: char, replacement: impl Into<String>) -> Self {
        self.rules.insert(symbol, replacement.into());
        self
    }

    pub fn axiom(&self) -> &str {
        &self.axiom
    }

    /// Rewrite once
    pub fn rewrite(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len() * 2);
        for c in input.chars() {
            match self.rules.get(&c) {
                Some(replacement) => out.push_str(replacement),
                None => out.push(c),
            }
        }
        out
    }

    /// Result after `iterations` rewrites
    pub fn generate(&self, iterations: usize) -> String {
        let mut current = self.axiom.clone();
        for _ in 0..iterations {
            current = self.rewrite(&current);
        }
        current
    }

    /// Axiom plus every intermediate generation, failing once a generation
    /// outgrows `limits.max_sequence_len` or `iterations` exceeds
    /// `limits.max_iterations`
    pub fn generations(&self, iterations: usize, limits: &Limits) -> PatternResult<Vec<String>> {
        limits.check_iterations("lsystem", iterations)?;
        let mut current = self.axiom.clone();
        let mut out = Vec::with_capacity(iterations + 1);
        for _ in 0..iterations {
            limits.check_sequence("lsystem", current.chars().count())?;
            let next = self.rewrite(&current);
            out.push(current);
            current = next;
        }
        limits.check_sequence("lsystem", current.chars().count())?;
        out.push(current);
        Ok(out)
    }
}

/// Apply `rules` to `axiom` `iterations` times
pub fn lsystem(axiom: &str, rules: &HashMap<char, String>, iterations: usize) -> String {
    LSystem {
        axiom: axiom.to_string(),
        rules: rules.clone(),
    }
    .generate(iterations)
}

/// Numeric reading of a symbol string: each character code mod 8
pub fn lsystem_numeric(symbols: &str) -> Vec<i64> {
    symbols.chars().map(|c| (c as u32 % 8) as i64).collect()
}

/// One step per symbol over a cycle, looked up in `table`.
///
/// Unmapped symbols take `fallback`, or fail with `UndefinedSymbol` when
/// there is none.
pub fn symbols_to_pattern<T: Clone + Send + Sync + 'static>(
    symbols: &str,
    table: &HashMap<char, T>,
    fallback: Option<T>,
) -> PatternResult<Pattern<T>> {
    let steps = symbols
        .chars()
        .map(|c| match table.get(&c).cloned().or_else(|| fallback.clone()) {
            Some(value) => Ok(Pattern::pure(value)),
            None => Err(PatternError::undefined_symbol(c, "symbols_to_pattern")),
        })
        .collect::<PatternResult<Vec<_>>>()?;
    Ok(Pattern::fastcat(steps))
}

/// Play generation `k` of the system during cycle `k`, up to `iterations`,
/// then start again from the axiom
pub fn lsystem_cycles<T: Clone + Send + Sync + 'static>(
    system: &LSystem,
    iterations: usize,
    table: &HashMap<char, T>,
    fallback: Option<T>,
    limits: &Limits,
) -> PatternResult<Pattern<T>> {
    let cycles = system
        .generations(iterations, limits)?
        .iter()
        .map(|generation| symbols_to_pattern(generation, table, fallback.clone()))
        .collect::<PatternResult<Vec<_>>>()?;
    Ok(Pattern::slowcat(cycles))
}

// ============= Cellular Automata =============

/// 1D elementary automaton with wraparound boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementaryAutomaton {
    rule: u8,
    cells: Vec<bool>,
}

impl ElementaryAutomaton {
    /// Single live cell at the center. Rule numbers above 255 wrap.
    pub fn new(rule: u32, size: usize) -> Self {
        let positions = if size > 0 { vec![size / 2] } else { vec![] };
        Self::from_positions(rule, size, positions)
    }

    /// Live cells at `positions` (taken mod `size`)
    pub fn from_positions(rule: u32, size: usize, positions: impl IntoIterator<Item = usize>) -> Self {
        if rule > 255 {
            warn!(rule, "elementary automaton rule out of range, using rule % 256");
        }
        let mut cells = vec![false; size];
        if size > 0 {
            for p in positions {
                cells[p % size] = true;
            }
        }
        Self {
            rule: (rule % 256) as u8,
            cells,
        }
    }

    pub fn rule(&self) -> u8 {
        self.rule
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn live_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// Advance one generation
    pub fn step(&mut self) {
        let size = self.cells.len();
        if size == 0 {
            return;
        }
        let next = (0..size)
            .map(|i| {
                let left = self.cells[(i + size - 1) % size] as u8;
                let center = self.cells[i] as u8;
                let right = self.cells[(i + 1) % size] as u8;
                let neighborhood = (left << 2) | (center << 1) | right;
                (self.rule >> neighborhood) & 1 == 1
            })
            .collect();
        self.cells = next;
    }

    pub fn steps(&mut self, n: usize) {
        for _ in 0..n {
            self.step();
        }
    }
}

/// Diagonal trace of an automaton: cell `g % size` of generation `g`, for
/// `size` generations
pub fn cellular_automaton(rule: u32, size: usize) -> Vec<bool> {
    let mut automaton = ElementaryAutomaton::new(rule, size);
    let mut trace = Vec::with_capacity(size);
    for generation in 0..size {
        trace.push(automaton.cells()[generation % size]);
        automaton.step();
    }
    trace
}

/// Every generation from the seed row, `generations + 1` rows in total
pub fn automaton_generations(
    rule: u32,
    size: usize,
    generations: usize,
    limits: &Limits,
) -> PatternResult<Vec<Vec<bool>>> {
    limits.check_automaton("automaton_generations", size)?;
    limits.check_iterations("automaton_generations", generations)?;
    let mut automaton = ElementaryAutomaton::new(rule, size);
    let mut rows = Vec::with_capacity(generations + 1);
    rows.push(automaton.cells().to_vec());
    for _ in 0..generations {
        automaton.step();
        rows.push(automaton.cells().to_vec());
    }
    Ok(rows)
}

// ============= Iterated Function Systems =============

/// Affine map `(x, y) -> (a x + b y + e, c x + d y + f)` chosen with `probability`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
    pub probability: f64,
}

impl AffineTransform {
    pub fn apply(&self, (x, y): (f64, f64)) -> (f64, f64) {
        (
            self.a * x + self.b * y + self.e,
            self.c * x + self.d * y + self.f,
        )
    }
}

/// The four maps of the Barnsley fern
pub const BARNSLEY_FERN: [AffineTransform; 4] = [
    AffineTransform { a: 0.0, b: 0.0, c: 0.0, d: 0.16, e: 0.0, f: 0.0, probability: 0.01 },
    AffineTransform { a: 0.85, b: 0.04, c: -0.04, d: 0.85, e: 0.0, f: 1.6, probability: 0.85 },
    AffineTransform { a: 0.2, b: -0.26, c: 0.23, d: 0.22, e: 0.0, f: 1.6, probability: 0.07 },
    AffineTransform { a: -0.15, b: 0.28, c: 0.26, d: 0.24, e: 0.0, f: 0.44, probability: 0.07 },
];

/// Trajectory of the chaos game over `transforms`, starting at the origin
pub fn ifs(
    transforms: &[AffineTransform],
    iterations: usize,
    seed: u64,
    limits: &Limits,
) -> PatternResult<Vec<(f64, f64)>> {
    limits.check_iterations("ifs", iterations)?;
    if transforms.is_empty() {
        return Err(PatternError::argument("ifs", "no transforms given"));
    }
    let dist = WeightedIndex::new(transforms.iter().map(|t| t.probability))
        .map_err(|e| PatternError::argument("ifs", e.to_string()))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut point = (0.0, 0.0);
    let mut trajectory = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        point = transforms[dist.sample(&mut rng)].apply(point);
        trajectory.push(point);
    }
    Ok(trajectory)
}

/// `points` samples of the Barnsley fern
pub fn barnsley_fern(points: usize, seed: u64, limits: &Limits) -> PatternResult<Vec<(f64, f64)>> {
    ifs(&BARNSLEY_FERN, points, seed, limits)
}

/// Chaos-game Sierpinski triangle: jump halfway to a random corner each step
pub fn chaos_game_sierpinski(
    points: usize,
    seed: u64,
    limits: &Limits,
) -> PatternResult<Vec<(f64, f64)>> {
    const CORNERS: [(f64, f64); 3] = [(0.0, 0.0), (1.0, 0.0), (0.5, 1.0)];
    limits.check_iterations("chaos_game_sierpinski", points)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut point = (0.5, 0.5);
    Ok((0..points)
        .map(|_| {
            let (cx, cy) = CORNERS[rng.gen_range(0..CORNERS.len())];
            point = ((point.0 + cx) / 2.0, (point.1 + cy) / 2.0);
            point
        })
        .collect())
}

/// Rescale a trajectory into the unit square by its bounding box; a
/// degenerate axis maps to 0.5
pub fn normalize_points(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let bounds = |axis: fn(&(f64, f64)) -> f64| {
        points
            .iter()
            .map(axis)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
    };
    let (x_lo, x_hi) = bounds(|p| p.0);
    let (y_lo, y_hi) = bounds(|p| p.1);
    let scale = |v: f64, lo: f64, hi: f64| {
        if hi > lo {
            ((v - lo) / (hi - lo)).clamp(0.0, 1.0)
        } else {
            0.5
        }
    };
    points
        .iter()
        .map(|(x, y)| (scale(*x, x_lo, x_hi), scale(*y, y_lo, y_hi)))
        .collect()
}

/// Map a trajectory onto parameter ranges, e.g. x to pan and y to pitch
pub fn points_to_range(
    points: &[(f64, f64)],
    x_range: (f64, f64),
    y_range: (f64, f64),
) -> Vec<(f64, f64)> {
    normalize_points(points)
        .into_iter()
        .map(|(x, y)| {
            (
                x_range.0 + x * (x_range.1 - x_range.0),
                y_range.0 + y * (y_range.1 - y_range.0),
            )
        })
        .collect()
}

// ============= Chaos Maps =============

/// `iterations` values of `x -> r x (1 - x)` after `x0`
pub fn logistic_map(r: f64, x0: f64, iterations: usize, limits: &Limits) -> PatternResult<Vec<f64>> {
    limits.check_iterations("logistic_map", iterations)?;
    let mut x = x0;
    Ok((0..iterations)
        .map(|_| {
            x = r * x * (1.0 - x);
            x
        })
        .collect())
}

/// Hénon map orbit from the origin; stops early if the orbit diverges
pub fn henon_map(a: f64, b: f64, iterations: usize, limits: &Limits) -> PatternResult<Vec<(f64, f64)>> {
    limits.check_iterations("henon_map", iterations)?;
    let (mut x, mut y) = (0.0f64, 0.0f64);
    let mut orbit = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let next_x = 1.0 - a * x * x + y;
        y = b * x;
        x = next_x;
        if !(x.is_finite() && y.is_finite()) {
            break;
        }
        orbit.push((x, y));
    }
    Ok(orbit)
}

fn escape_time(mut z: Complex64, c: Complex64, max_iterations: u32) -> f64 {
    if max_iterations == 0 {
        return 1.0;
    }
    for i in 0..max_iterations {
        z = z * z + c;
        if z.norm_sqr() > 4.0 {
            return (i as f64 / max_iterations as f64).clamp(0.0, 1.0);
        }
    }
    1.0
}

/// Normalized escape time of `c` in `[0, 1]`; points that never escape give 1
pub fn mandelbrot(cx: f64, cy: f64, max_iterations: u32) -> f64 {
    escape_time(Complex64::new(0.0, 0.0), Complex64::new(cx, cy), max_iterations)
}

/// Normalized escape time of `z` under `z^2 + c` in `[0, 1]`
pub fn julia(zx: f64, zy: f64, cx: f64, cy: f64, max_iterations: u32) -> f64 {
    escape_time(Complex64::new(zx, zy), Complex64::new(cx, cy), max_iterations)
}

// ============= Sequence Patterns =============

/// One step per bit over a cycle
pub fn bits_to_pattern(bits: &[bool]) -> Pattern<bool> {
    values_to_pattern(bits.to_vec())
}

/// One step per value over a cycle
pub fn values_to_pattern<T: Clone + Send + Sync + 'static>(values: Vec<T>) -> Pattern<T> {
    Pattern::fastcat(values.into_iter().map(Pattern::pure).collect())
}

/// A boolean rhythm generator, parsed from `name:args` strings such as
/// `cantor:3`, `euclid:3,8,1` or `ca:30,16`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Generator {
    Cantor { depth: u32 },
    Sierpinski { depth: u32 },
    Dragon { depth: u32 },
    Automaton { rule: u32, size: usize },
    Euclid { pulses: i64, steps: i64, rotation: i64 },
}

impl Generator {
    /// Length of the sequence this generator produces, if it fits in `usize`
    pub fn sequence_len(&self) -> Option<usize> {
        match self {
            Generator::Cantor { depth } => 3usize.checked_pow(*depth),
            Generator::Sierpinski { depth } => 2usize.checked_pow(*depth),
            Generator::Dragon { depth } => 2usize
                .checked_pow(depth.checked_add(1)?)
                .map(|n| n - 1),
            Generator::Automaton { size, .. } => Some(*size),
            Generator::Euclid { steps, .. } => usize::try_from(*steps).ok(),
        }
    }

    /// Build the step sequence after checking it against `limits`
    pub fn sequence(&self, limits: &Limits) -> PatternResult<Vec<bool>> {
        let name = self.name();
        let len = self.sequence_len().ok_or_else(|| {
            PatternError::argument(name, format!("{} is too large to build", self))
        })?;
        limits.check_sequence(name, len)?;

        let bits = match self {
            Generator::Cantor { depth } => cantor(*depth),
            Generator::Sierpinski { depth } => sierpinski(*depth),
            Generator::Dragon { depth } => dragon(*depth),
            Generator::Automaton { rule, size } => {
                limits.check_automaton(name, *size)?;
                cellular_automaton(*rule, *size)
            }
            Generator::Euclid {
                pulses,
                steps,
                rotation,
            } => {
                let (pulses, steps) = check_euclid_args(*pulses, *steps)?;
                bjorklund_rotated(pulses, steps, *rotation)
            }
        };
        debug!(generator = %self, len = bits.len(), "built generator sequence");
        Ok(bits)
    }

    /// Pattern spreading the sequence over one cycle
    pub fn build(&self, limits: &Limits) -> PatternResult<Pattern<bool>> {
        Ok(bits_to_pattern(&self.sequence(limits)?))
    }

    fn name(&self) -> &'static str {
        match self {
            Generator::Cantor { .. } => "cantor",
            Generator::Sierpinski { .. } => "sierpinski",
            Generator::Dragon { .. } => "dragon",
            Generator::Automaton { .. } => "ca",
            Generator::Euclid { .. } => "euclid",
        }
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generator::Cantor { depth } | Generator::Sierpinski { depth } | Generator::Dragon { depth } => {
                write!(f, "{}:{}", self.name(), depth)
            }
            Generator::Automaton { rule, size } => write!(f, "ca:{},{}", rule, size),
            Generator::Euclid {
                pulses,
                steps,
                rotation,
            } => write!(f, "euclid:{},{},{}", pulses, steps, rotation),
        }
    }
}

impl FromStr for Generator {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, args) = s.split_once(':').unwrap_or((s, ""));
        let args: Vec<&str> = args
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect();

        fn num<N: FromStr>(name: &'static str, arg: &str) -> PatternResult<N> {
            arg.parse()
                .map_err(|_| PatternError::argument(name, format!("'{}' is not a number", arg)))
        }

        match (name.trim(), args.as_slice()) {
            ("cantor", [depth]) => Ok(Generator::Cantor { depth: num("cantor", depth)? }),
            ("sierpinski", [depth]) => Ok(Generator::Sierpinski { depth: num("sierpinski", depth)? }),
            ("dragon", [depth]) => Ok(Generator::Dragon { depth: num("dragon", depth)? }),
            ("ca" | "automaton", [rule, size]) => Ok(Generator::Automaton {
                rule: num("ca", rule)?,
                size: num("ca", size)?,
            }),
            ("euclid", [pulses, steps]) => Ok(Generator::Euclid {
                pulses: num("euclid", pulses)?,
                steps: num("euclid", steps)?,
                rotation: 0,
            }),
            ("euclid", [pulses, steps, rotation]) => Ok(Generator::Euclid {
                pulses: num("euclid", pulses)?,
                steps: num("euclid", steps)?,
                rotation: num("euclid", rotation)?,
            }),
            ("cantor" | "sierpinski" | "dragon" | "ca" | "automaton" | "euclid", _) => {
                Err(PatternError::argument(
                    "generator",
                    format!("wrong number of arguments in '{}'", s),
                ))
            }
            (other, _) => Err(PatternError::undefined_symbol(other, format!("generator '{}'", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(s: &str) -> Vec<bool> {
        s.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn test_cantor() {
        assert_eq!(cantor(0), bits("1"));
        assert_eq!(cantor(1), bits("101"));
        assert_eq!(cantor(2), bits("101000101"));
        assert_eq!(cantor(4).len(), 81);
    }

    #[test]
    fn test_sierpinski() {
        assert_eq!(sierpinski(0), bits("1"));
        assert_eq!(sierpinski(3), bits("11010001"));
        assert_eq!(sierpinski(5).len(), 32);
    }

    #[test]
    fn test_dragon() {
        assert_eq!(dragon(0), bits("1"));
        assert_eq!(dragon(1), bits("110"));
        assert_eq!(dragon(2), bits("1101100"));
        assert_eq!(dragon(5).len(), 63);
    }

    #[test]
    fn test_lsystem_algae() {
        let algae = LSystem::new("A").rule('A', "AB").rule('B', "A");
        assert_eq!(algae.generate(0), "A");
        assert_eq!(algae.generate(4), "ABAABABA");
    }

    #[test]
    fn test_lsystem_passthrough() {
        let mut rules = HashMap::new();
        rules.insert('F', "F+F".to_string());
        assert_eq!(lsystem("F-", &rules, 2), "F+F+F+F-");
    }

    #[test]
    fn test_lsystem_numeric() {
        assert_eq!(lsystem_numeric("AB+"), vec![1, 2, 3]);
    }

    #[test]
    fn test_lsystem_generations_limit() {
        let doubling = LSystem::new("A").rule('A', "AA");
        let limits = Limits {
            max_sequence_len: 8,
            ..Limits::default()
        };
        assert_eq!(doubling.generations(3, &limits).unwrap().len(), 4);
        assert!(doubling.generations(4, &limits).is_err());

        let err = LSystem::new("A")
            .generations(usize::MAX, &Limits::default())
            .unwrap_err();
        assert!(matches!(err, PatternError::PatternArgument { combinator: "lsystem", .. }));
    }

    #[test]
    fn test_symbols_to_pattern() {
        let mut table = HashMap::new();
        table.insert('A', "bd");
        table.insert('B', "sn");

        let p = symbols_to_pattern("ABA", &table, None).unwrap();
        let values: Vec<&str> = p.first_cycle().unwrap().into_iter().map(|h| h.value).collect();
        assert_eq!(values, vec!["bd", "sn", "bd"]);

        let err = symbols_to_pattern("AXB", &table, None).unwrap_err();
        assert_eq!(err, PatternError::undefined_symbol('X', "symbols_to_pattern"));

        let lenient = symbols_to_pattern("AX", &table, Some("~")).unwrap();
        assert_eq!(lenient.first_cycle().unwrap()[1].value, "~");
    }

    #[test]
    fn test_lsystem_cycles() {
        use crate::pattern::Fraction;

        let algae = LSystem::new("A").rule('A', "AB").rule('B', "A");
        let mut table = HashMap::new();
        table.insert('A', 1);
        table.insert('B', 0);
        let p = lsystem_cycles(&algae, 2, &table, None, &Limits::default()).unwrap();
        let counts: Vec<usize> = (0..4)
            .map(|c| {
                p.query_span(Fraction::from_integer(c), Fraction::from_integer(c + 1))
                    .unwrap()
                    .len()
            })
            .collect();
        assert_eq!(counts, vec![1, 2, 3, 1]);
    }

    #[test]
    fn test_rule_30_diagonal() {
        assert_eq!(cellular_automaton(30, 5), bits("01010"));
    }

    #[test]
    fn test_automaton_edges() {
        assert!(cellular_automaton(30, 0).is_empty());
        assert_eq!(cellular_automaton(90, 1), bits("1"));
        assert_eq!(cellular_automaton(286, 5), cellular_automaton(30, 5));
    }

    #[test]
    fn test_automaton_generations() {
        let rows = automaton_generations(30, 5, 2, &Limits::default()).unwrap();
        assert_eq!(rows, vec![bits("00100"), bits("01110"), bits("11001")]);
        assert!(automaton_generations(30, 5, usize::MAX, &Limits::default()).is_err());
        assert!(automaton_generations(30, 4096, 1, &Limits::default()).is_err());
    }

    #[test]
    fn test_from_positions_wraps() {
        let ca = ElementaryAutomaton::from_positions(90, 4, vec![1, 6]);
        assert_eq!(ca.cells(), &bits("0110")[..]);
        assert_eq!(ca.live_count(), 2);
    }

    #[test]
    fn test_barnsley_fern_seeded() {
        let a = barnsley_fern(500, 42, &Limits::default()).unwrap();
        let b = barnsley_fern(500, 42, &Limits::default()).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|(x, y)| (-3.0..=3.0).contains(x) && (0.0..=10.1).contains(y)));
    }

    #[test]
    fn test_ifs_rejects_bad_weights() {
        assert!(ifs(&[], 10, 0, &Limits::default()).is_err());
        let zero = AffineTransform {
            probability: 0.0,
            ..BARNSLEY_FERN[0]
        };
        assert!(ifs(&[zero], 10, 0, &Limits::default()).is_err());
    }

    #[test]
    fn test_point_counts_bounded_by_limits() {
        let limits = Limits::default();
        let oversize = [
            barnsley_fern(usize::MAX / 8, 1, &limits).unwrap_err(),
            ifs(&BARNSLEY_FERN, usize::MAX, 1, &limits).unwrap_err(),
            chaos_game_sierpinski(usize::MAX / 8, 1, &limits).unwrap_err(),
            henon_map(1.4, 0.3, usize::MAX / 8, &limits).unwrap_err(),
            logistic_map(3.9, 0.5, usize::MAX, &limits).unwrap_err(),
        ];
        for err in oversize {
            assert!(matches!(err, PatternError::PatternArgument { .. }), "{:?}", err);
        }

        let tight = Limits {
            max_iterations: 10,
            ..Limits::default()
        };
        assert_eq!(barnsley_fern(10, 1, &tight).unwrap().len(), 10);
        assert!(barnsley_fern(11, 1, &tight).is_err());
    }

    #[test]
    fn test_chaos_game_in_triangle() {
        let points = chaos_game_sierpinski(200, 3, &Limits::default()).unwrap();
        assert_eq!(points.len(), 200);
        assert!(points.iter().all(|(x, y)| (0.0..=1.0).contains(x) && (0.0..=1.0).contains(y)));
    }

    #[test]
    fn test_points_to_range() {
        let points = vec![(0.0, 5.0), (2.0, 5.0), (1.0, 5.0)];
        let mapped = points_to_range(&points, (-1.0, 1.0), (40.0, 80.0));
        assert_eq!(mapped, vec![(-1.0, 60.0), (1.0, 60.0), (0.0, 60.0)]);
    }

    #[test]
    fn test_logistic_and_henon() {
        let limits = Limits::default();
        let xs = logistic_map(3.9, 0.5, 100, &limits).unwrap();
        assert_eq!(xs.len(), 100);
        assert!(xs.iter().all(|x| (0.0..=1.0).contains(x)));

        let orbit = henon_map(1.4, 0.3, 1000, &limits).unwrap();
        assert_eq!(orbit.len(), 1000);
        assert!(orbit.iter().all(|(x, y)| x.abs() < 2.0 && y.abs() < 1.0));

        assert!(henon_map(4.0, 0.3, 100, &limits).unwrap().len() < 100);
    }

    #[test]
    fn test_escape_time_clamped() {
        assert_eq!(mandelbrot(0.0, 0.0, 100), 1.0);
        assert_eq!(mandelbrot(2.0, 2.0, 100), 0.0);
        let edge = mandelbrot(-0.75, 0.1, 200);
        assert!((0.0..=1.0).contains(&edge));
        assert_eq!(julia(0.0, 0.0, 0.0, 0.0, 50), 1.0);
        assert_eq!(mandelbrot(0.3, 0.5, 0), 1.0);
    }

    #[test]
    fn test_generator_parse() {
        assert_eq!("cantor:3".parse::<Generator>().unwrap(), Generator::Cantor { depth: 3 });
        assert_eq!(
            "euclid:3,8".parse::<Generator>().unwrap(),
            Generator::Euclid { pulses: 3, steps: 8, rotation: 0 }
        );
        assert_eq!(
            "ca:30,16".parse::<Generator>().unwrap(),
            Generator::Automaton { rule: 30, size: 16 }
        );
        assert!("cantor:x".parse::<Generator>().is_err());
        assert!(matches!(
            "ca:30".parse::<Generator>(),
            Err(PatternError::PatternArgument { combinator: "generator", .. })
        ));
        assert!(matches!(
            "mandel:3".parse::<Generator>(),
            Err(PatternError::UndefinedSymbol { .. })
        ));
        let g: Generator = "euclid:5,8,2".parse().unwrap();
        assert_eq!(g.to_string().parse::<Generator>().unwrap(), g);
    }

    #[test]
    fn test_generator_limits() {
        let limits = Limits::default();
        assert!(Generator::Cantor { depth: 12 }.sequence(&limits).is_ok());
        assert!(matches!(
            Generator::Cantor { depth: 13 }.sequence(&limits),
            Err(PatternError::PatternArgument { combinator: "cantor", .. })
        ));
        assert!(Generator::Sierpinski { depth: 80 }.sequence(&limits).is_err());
        assert!(Generator::Automaton { rule: 30, size: 2048 }.sequence(&limits).is_err());
    }

    #[test]
    fn test_generator_build() {
        let p = Generator::Euclid { pulses: 3, steps: 8, rotation: 0 }
            .build(&Limits::default())
            .unwrap();
        let onsets = p.first_cycle().unwrap().into_iter().filter(|h| h.value).count();
        assert_eq!(onsets, 3);
    }
}
