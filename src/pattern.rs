//! Core pattern engine: rational time, spans, haps and the `Pattern` type
//!
//! A `Pattern<T>` is a function from a query [`State`] (a time span plus named
//! control values) to the [`Hap`]s active during that span. All span
//! boundaries are exact [`Fraction`]s, so `fast(n).slow(n)` round-trips without
//! drift no matter how long a performance runs.
//!
//! Patterns are immutable and cheap to clone: the query closure sits behind an
//! `Arc`, so the same sub-pattern can be shared by many branches of a tree and
//! queried concurrently from several threads.

use crate::error::{PatternError, PatternResult};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// ============= Rational Time =============

/// Exact rational time value, always reduced with a positive denominator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fraction {
    numerator: i64,
    denominator: i64,
}

/// Largest denominator `Fraction::from_float` will produce
const MAX_FLOAT_DENOMINATOR: i128 = 1_000_000;

impl Fraction {
    pub const ZERO: Fraction = Fraction {
        numerator: 0,
        denominator: 1,
    };
    pub const ONE: Fraction = Fraction {
        numerator: 1,
        denominator: 1,
    };

    /// Create a reduced fraction.
    ///
    /// # Panics
    /// Panics when `d == 0`, like integer division. Use [`Fraction::try_new`]
    /// for untrusted input.
    pub fn new(n: i64, d: i64) -> Self {
        match Self::try_new(n, d) {
            Ok(f) => f,
            Err(e) => panic!("{}", e),
        }
    }

    /// Create a reduced fraction, failing on a zero denominator
    pub fn try_new(n: i64, d: i64) -> PatternResult<Self> {
        if d == 0 {
            return Err(PatternError::Arithmetic(format!(
                "zero denominator in {}/0",
                n
            )));
        }
        Self::reduce(n as i128, d as i128)
    }

    pub fn from_integer(n: i64) -> Self {
        Fraction {
            numerator: n,
            denominator: 1,
        }
    }

    /// Best rational approximation of `value` with a denominator of at most 10^6.
    ///
    /// Uses a continued-fraction expansion, so values like `1.0 / 3.0` come
    /// back as exactly `1/3`.
    pub fn from_float(value: f64) -> PatternResult<Self> {
        if !value.is_finite() || value.abs() > 1e15 {
            return Err(PatternError::Arithmetic(format!(
                "cannot represent {} as rational time",
                value
            )));
        }

        let (mut h_prev, mut h) = (0i128, 1i128);
        let (mut k_prev, mut k) = (1i128, 0i128);
        let mut x = value;

        for _ in 0..64 {
            let a = x.floor();
            if a.abs() > 1e15 {
                break;
            }
            let a_int = a as i128;
            let h_next = a_int * h + h_prev;
            let k_next = a_int * k + k_prev;
            if k_next > MAX_FLOAT_DENOMINATOR {
                break;
            }
            h_prev = h;
            h = h_next;
            k_prev = k;
            k = k_next;

            if ((h as f64 / k as f64) - value).abs() < 1e-12 {
                break;
            }
            let rest = x - a;
            if rest <= 0.0 {
                break;
            }
            x = 1.0 / rest;
        }

        Self::reduce(h, k)
    }

    pub fn to_float(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    pub fn numerator(&self) -> i64 {
        self.numerator
    }

    pub fn denominator(&self) -> i64 {
        self.denominator
    }

    pub fn is_zero(&self) -> bool {
        self.numerator == 0
    }

    pub fn is_integer(&self) -> bool {
        self.denominator == 1
    }

    pub fn abs(&self) -> Self {
        Fraction {
            numerator: self.numerator.abs(),
            denominator: self.denominator,
        }
    }

    /// Largest integer not greater than this value
    pub fn floor(&self) -> Self {
        Self::from_integer(self.numerator.div_euclid(self.denominator))
    }

    /// Smallest integer not less than this value
    pub fn ceil(&self) -> Self {
        let floor = self.floor();
        if floor == *self {
            floor
        } else {
            floor + Fraction::ONE
        }
    }

    /// Start of the cycle containing this time
    pub fn sam(&self) -> Self {
        self.floor()
    }

    /// Start of the following cycle
    pub fn next_sam(&self) -> Self {
        self.sam() + Fraction::ONE
    }

    /// Position within the current cycle, in `[0, 1)`
    pub fn cycle_pos(&self) -> Self {
        *self - self.sam()
    }

    /// The whole cycle containing this time
    pub fn whole_cycle(&self) -> TimeSpan {
        TimeSpan::new(self.sam(), self.next_sam())
    }

    /// Reciprocal, failing for zero
    pub fn recip(&self) -> PatternResult<Self> {
        Fraction::ONE.checked_div(*self)
    }

    /// Addition that reports overflow instead of panicking
    pub fn checked_add(&self, other: Fraction) -> PatternResult<Self> {
        Self::reduce(
            self.numerator as i128 * other.denominator as i128
                + other.numerator as i128 * self.denominator as i128,
            self.denominator as i128 * other.denominator as i128,
        )
    }

    /// Subtraction that reports overflow instead of panicking
    pub fn checked_sub(&self, other: Fraction) -> PatternResult<Self> {
        Self::reduce(
            self.numerator as i128 * other.denominator as i128
                - other.numerator as i128 * self.denominator as i128,
            self.denominator as i128 * other.denominator as i128,
        )
    }

    /// Multiplication that reports overflow instead of panicking
    pub fn checked_mul(&self, other: Fraction) -> PatternResult<Self> {
        Self::reduce(
            self.numerator as i128 * other.numerator as i128,
            self.denominator as i128 * other.denominator as i128,
        )
    }

    pub fn checked_neg(&self) -> PatternResult<Self> {
        Self::reduce(-(self.numerator as i128), self.denominator as i128)
    }

    /// Division that reports a zero divisor instead of panicking
    pub fn checked_div(&self, other: Fraction) -> PatternResult<Self> {
        if other.is_zero() {
            return Err(PatternError::Arithmetic(format!(
                "division of {} by zero",
                self
            )));
        }
        Self::reduce(
            self.numerator as i128 * other.denominator as i128,
            self.denominator as i128 * other.numerator as i128,
        )
    }

    /// Euclidean modulo: the result has the sign of `modulus`
    pub fn modulo(&self, modulus: Fraction) -> PatternResult<Self> {
        let quotient = self.checked_div(modulus)?.floor();
        self.checked_sub(modulus.checked_mul(quotient)?)
    }

    fn reduce(n: i128, d: i128) -> PatternResult<Self> {
        let divisor = gcd(n.abs(), d.abs());
        let sign = if d < 0 { -1 } else { 1 };
        let n = n / divisor * sign;
        let d = d.abs() / divisor;
        match (i64::try_from(n), i64::try_from(d)) {
            (Ok(numerator), Ok(denominator)) => Ok(Fraction {
                numerator,
                denominator,
            }),
            _ => Err(PatternError::Arithmetic(format!(
                "rational time overflow: {}/{}",
                n, d
            ))),
        }
    }
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    if a == 0 {
        1
    } else {
        a
    }
}

impl Default for Fraction {
    fn default() -> Self {
        Fraction::ZERO
    }
}

impl From<i64> for Fraction {
    fn from(n: i64) -> Self {
        Fraction::from_integer(n)
    }
}

fn or_panic(result: PatternResult<Fraction>) -> Fraction {
    match result {
        Ok(f) => f,
        Err(e) => panic!("{}", e),
    }
}

// The operators panic on overflow and are meant for constants and small
// offsets. Anything that runs inside a query uses the `checked_*` forms.

impl std::ops::Add for Fraction {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        or_panic(self.checked_add(other))
    }
}

impl std::ops::Sub for Fraction {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        or_panic(self.checked_sub(other))
    }
}

impl std::ops::Mul for Fraction {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        or_panic(self.checked_mul(other))
    }
}

/// # Panics
/// Panics on a zero divisor; see [`Fraction::checked_div`].
impl std::ops::Div for Fraction {
    type Output = Self;

    fn div(self, other: Self) -> Self {
        or_panic(self.checked_div(other))
    }
}

impl std::ops::Neg for Fraction {
    type Output = Self;

    fn neg(self) -> Self {
        or_panic(self.checked_neg())
    }
}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.numerator as i128 * other.denominator as i128;
        let rhs = other.numerator as i128 * self.denominator as i128;
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

// ============= TimeSpan =============

/// TimeSpan represents a time interval `[begin, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeSpan {
    pub begin: Fraction,
    pub end: Fraction,
}

impl TimeSpan {
    pub fn new(begin: Fraction, end: Fraction) -> Self {
        Self { begin, end }
    }

    /// Create a span, rejecting `begin > end`
    pub fn try_new(begin: Fraction, end: Fraction) -> PatternResult<Self> {
        if begin > end {
            return Err(PatternError::argument(
                "TimeSpan",
                format!("begin {} is after end {}", begin, end),
            ));
        }
        Ok(Self { begin, end })
    }

    pub fn from_integers(begin: i64, end: i64) -> Self {
        Self::new(Fraction::from_integer(begin), Fraction::from_integer(end))
    }

    pub fn duration(&self) -> Fraction {
        self.end - self.begin
    }

    /// Split at every integer cycle boundary the span crosses.
    ///
    /// A zero-width span is returned unsplit so instantaneous samples of
    /// continuous patterns still produce a result.
    pub fn span_cycles(&self) -> Vec<TimeSpan> {
        if self.begin == self.end {
            return vec![*self];
        }

        let mut spans = Vec::new();
        let mut begin = self.begin;
        let end_sam = self.end.sam();

        while self.end > begin {
            if begin.sam() == end_sam {
                spans.push(TimeSpan::new(begin, self.end));
                break;
            }
            let next_begin = begin.next_sam();
            spans.push(TimeSpan::new(begin, next_begin));
            begin = next_begin;
        }
        spans
    }

    /// Apply `f` to both ends
    pub fn with_time(
        &self,
        f: impl Fn(Fraction) -> PatternResult<Fraction>,
    ) -> PatternResult<TimeSpan> {
        Ok(TimeSpan::new(f(self.begin)?, f(self.end)?))
    }

    /// Overlap of two spans, or `None` when they are disjoint.
    ///
    /// A zero-width overlap sitting on the end of a non-zero-width span does
    /// not count, so adjacent spans never intersect.
    pub fn intersection(&self, other: &TimeSpan) -> Option<TimeSpan> {
        let begin = self.begin.max(other.begin);
        let end = self.end.min(other.end);

        if begin > end {
            return None;
        }
        if begin == end {
            if begin == self.end && self.begin < self.end {
                return None;
            }
            if begin == other.end && other.begin < other.end {
                return None;
            }
        }
        Some(TimeSpan::new(begin, end))
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.begin, self.end)
    }
}

// ============= Hap =============

/// A location in the source text that produced a hap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub start: usize,
    pub end: usize,
}

/// Metadata carried alongside a hap's value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub locations: Vec<SourceLocation>,
    pub tags: Vec<String>,
    pub meta: HashMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() && self.tags.is_empty() && self.meta.is_empty()
    }

    /// Merge two contexts: locations and tags are set-unions in order of
    /// first appearance, `meta` collisions resolve to `other` (last write wins).
    pub fn combine(&self, other: &Context) -> Context {
        let mut locations = self.locations.clone();
        for location in &other.locations {
            if !locations.contains(location) {
                locations.push(*location);
            }
        }

        let mut tags = self.tags.clone();
        for tag in &other.tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }

        let mut meta = self.meta.clone();
        meta.extend(other.meta.iter().map(|(k, v)| (k.clone(), v.clone())));

        Context {
            locations,
            tags,
            meta,
        }
    }
}

/// Hap (short for "happening") is an event with a value
///
/// `whole` is the event's logical extent (`None` for continuous signals) and
/// `part` the fragment visible to the current query; `part` always lies
/// inside `whole`.
#[derive(Debug, Clone, PartialEq)]
pub struct Hap<T> {
    pub whole: Option<TimeSpan>,
    pub part: TimeSpan,
    pub value: T,
    pub context: Context,
}

impl<T> Hap<T> {
    pub fn new(whole: Option<TimeSpan>, part: TimeSpan, value: T) -> Self {
        Self {
            whole,
            part,
            value,
            context: Context::new(),
        }
    }

    /// Replace the context
    pub fn set_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// True when this fragment contains the event's start
    pub fn has_onset(&self) -> bool {
        match &self.whole {
            Some(whole) => whole.begin == self.part.begin,
            None => false,
        }
    }

    pub fn is_discrete(&self) -> bool {
        self.whole.is_some()
    }

    pub fn whole_or_part(&self) -> TimeSpan {
        self.whole.unwrap_or(self.part)
    }

    /// Map `whole` and `part` through a span transform
    pub fn with_span(self, f: impl Fn(TimeSpan) -> PatternResult<TimeSpan>) -> PatternResult<Self> {
        Ok(Hap {
            whole: self.whole.map(&f).transpose()?,
            part: f(self.part)?,
            value: self.value,
            context: self.context,
        })
    }

    /// Map the value, keeping spans and context
    pub fn with_value<U>(self, f: impl FnOnce(T) -> U) -> Hap<U> {
        Hap {
            whole: self.whole,
            part: self.part,
            value: f(self.value),
            context: self.context,
        }
    }

    pub fn try_with_value<U>(self, f: impl FnOnce(T) -> PatternResult<U>) -> PatternResult<Hap<U>> {
        Ok(Hap {
            whole: self.whole,
            part: self.part,
            value: f(self.value)?,
            context: self.context,
        })
    }

    pub fn combine_context<U>(&self, other: &Hap<U>) -> Context {
        self.context.combine(&other.context)
    }
}

// ============= Query State =============

/// State for pattern queries
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub span: TimeSpan,
    pub controls: HashMap<String, f64>,
}

impl State {
    pub fn new(span: TimeSpan) -> Self {
        Self {
            span,
            controls: HashMap::new(),
        }
    }

    /// Same controls, different span
    pub fn set_span(&self, span: TimeSpan) -> Self {
        Self {
            span,
            controls: self.controls.clone(),
        }
    }

    pub fn with_span(
        &self,
        f: impl FnOnce(TimeSpan) -> PatternResult<TimeSpan>,
    ) -> PatternResult<Self> {
        Ok(self.set_span(f(self.span)?))
    }

    pub fn with_control(mut self, name: impl Into<String>, value: f64) -> Self {
        self.controls.insert(name.into(), value);
        self
    }

    pub fn control(&self, name: &str) -> Option<f64> {
        self.controls.get(name).copied()
    }
}

// ============= Pattern =============

/// The query function: a query state in, the haps active in its span out
pub type QueryFn<T> = dyn Fn(&State) -> PatternResult<Vec<Hap<T>>> + Send + Sync;

/// Core Pattern type - the heart of the system
pub struct Pattern<T> {
    query: Arc<QueryFn<T>>,
    steps: Option<Fraction>,
}

impl<T> Clone for Pattern<T> {
    fn clone(&self) -> Self {
        Self {
            query: Arc::clone(&self.query),
            steps: self.steps,
        }
    }
}

impl<T> fmt::Debug for Pattern<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("query", &"<closure>")
            .field("steps", &self.steps)
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    /// Create a new pattern from a query function
    pub fn new(
        query: impl Fn(&State) -> PatternResult<Vec<Hap<T>>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            query: Arc::new(query),
            steps: None,
        }
    }

    /// Query the pattern for events in a time span
    pub fn query(&self, state: &State) -> PatternResult<Vec<Hap<T>>> {
        (self.query)(state)
    }

    /// Query `[begin, end)` with no controls
    pub fn query_span(&self, begin: Fraction, end: Fraction) -> PatternResult<Vec<Hap<T>>> {
        self.query(&State::new(TimeSpan::new(begin, end)))
    }

    pub fn first_cycle(&self) -> PatternResult<Vec<Hap<T>>> {
        self.query(&State::new(TimeSpan::from_integers(0, 1)))
    }

    /// Number of steps per cycle, when known
    pub fn steps(&self) -> Option<Fraction> {
        self.steps
    }

    pub fn set_steps(mut self, steps: Option<Fraction>) -> Self {
        self.steps = steps;
        self
    }

    // ============= Leaf Constructors =============

    /// One event per cycle carrying `value`
    pub fn pure(value: T) -> Self {
        Self::new(move |state| {
            Ok(state
                .span
                .span_cycles()
                .into_iter()
                .map(|part| Hap::new(Some(part.begin.whole_cycle()), part, value.clone()))
                .collect())
        })
        .set_steps(Some(Fraction::ONE))
    }

    /// No events, ever
    pub fn silence() -> Self {
        Self::new(|_| Ok(Vec::new()))
    }

    /// Continuous pattern sampling `f` at the start of each query
    pub fn signal(f: impl Fn(Fraction) -> T + Send + Sync + 'static) -> Self {
        Self::new(move |state| Ok(vec![Hap::new(None, state.span, f(state.span.begin))]))
    }

    // ============= Core Transformations =============

    /// Transform the values in a pattern
    pub fn fmap<U: Clone + Send + Sync + 'static>(
        self,
        f: impl Fn(T) -> U + Send + Sync + 'static,
    ) -> Pattern<U> {
        let steps = self.steps;
        Pattern::new(move |state| {
            Ok(self
                .query(state)?
                .into_iter()
                .map(|hap| hap.with_value(&f))
                .collect())
        })
        .set_steps(steps)
    }

    /// Transform values with a fallible function; the first error aborts the query
    pub fn try_fmap<U: Clone + Send + Sync + 'static>(
        self,
        f: impl Fn(T) -> PatternResult<U> + Send + Sync + 'static,
    ) -> Pattern<U> {
        let steps = self.steps;
        Pattern::new(move |state| {
            self.query(state)?
                .into_iter()
                .map(|hap| hap.try_with_value(&f))
                .collect()
        })
        .set_steps(steps)
    }

    /// Map values, dropping haps for which `f` returns `None`
    pub fn filter_map_values<U: Clone + Send + Sync + 'static>(
        self,
        f: impl Fn(T) -> Option<U> + Send + Sync + 'static,
    ) -> Pattern<U> {
        let steps = self.steps;
        Pattern::new(move |state| {
            Ok(self
                .query(state)?
                .into_iter()
                .filter_map(|hap| {
                    let Hap {
                        whole,
                        part,
                        value,
                        context,
                    } = hap;
                    f(value).map(|value| Hap::new(whole, part, value).set_context(context))
                })
                .collect())
        })
        .set_steps(steps)
    }

    /// Process every hap returned by a query
    pub fn with_hap(self, f: impl Fn(Hap<T>) -> Hap<T> + Send + Sync + 'static) -> Self {
        let steps = self.steps;
        Pattern::new(move |state| Ok(self.query(state)?.into_iter().map(&f).collect()))
            .set_steps(steps)
    }

    /// Process the whole hap list of a query at once
    pub fn with_haps(
        self,
        f: impl Fn(Vec<Hap<T>>, &State) -> PatternResult<Vec<Hap<T>>> + Send + Sync + 'static,
    ) -> Self {
        let steps = self.steps;
        Pattern::new(move |state| f(self.query(state)?, state)).set_steps(steps)
    }

    /// Transform the query span before it reaches this pattern
    pub fn with_query_span(
        self,
        f: impl Fn(TimeSpan) -> PatternResult<TimeSpan> + Send + Sync + 'static,
    ) -> Self {
        let steps = self.steps;
        Pattern::new(move |state| self.query(&state.with_span(&f)?)).set_steps(steps)
    }

    pub fn with_query_time(
        self,
        f: impl Fn(Fraction) -> PatternResult<Fraction> + Send + Sync + 'static,
    ) -> Self {
        self.with_query_span(move |span| span.with_time(&f))
    }

    /// Transform the spans of every returned hap
    pub fn with_hap_span(
        self,
        f: impl Fn(TimeSpan) -> PatternResult<TimeSpan> + Send + Sync + 'static,
    ) -> Self {
        let steps = self.steps;
        Pattern::new(move |state| {
            self.query(state)?
                .into_iter()
                .map(|hap| hap.with_span(&f))
                .collect()
        })
        .set_steps(steps)
    }

    pub fn with_hap_time(
        self,
        f: impl Fn(Fraction) -> PatternResult<Fraction> + Send + Sync + 'static,
    ) -> Self {
        self.with_hap_span(move |span| span.with_time(&f))
    }

    /// Split each query at cycle boundaries and query the pieces separately
    pub fn split_queries(self) -> Self {
        let steps = self.steps;
        Pattern::new(move |state| {
            let mut haps = Vec::new();
            for span in state.span.span_cycles() {
                haps.extend(self.query(&state.set_span(span))?);
            }
            Ok(haps)
        })
        .set_steps(steps)
    }

    pub fn filter_haps(self, pred: impl Fn(&Hap<T>) -> bool + Send + Sync + 'static) -> Self {
        let steps = self.steps;
        Pattern::new(move |state| {
            Ok(self
                .query(state)?
                .into_iter()
                .filter(|hap| pred(hap))
                .collect())
        })
        .set_steps(steps)
    }

    pub fn filter_values(self, pred: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.filter_haps(move |hap| pred(&hap.value))
    }

    /// Keep only fragments that contain their event's start
    pub fn onsets_only(self) -> Self {
        self.filter_haps(|hap| hap.has_onset())
    }

    /// Drop continuous (whole-less) haps
    pub fn discrete_only(self) -> Self {
        self.filter_haps(|hap| hap.is_discrete())
    }

    // ============= Context =============

    /// Merge `context` into every hap (the hap's own keys win)
    pub fn set_context(self, context: Context) -> Self {
        self.with_hap(move |mut hap| {
            hap.context = context.combine(&hap.context);
            hap
        })
    }

    pub fn with_tag(self, tag: &str) -> Self {
        let context = Context {
            tags: vec![tag.to_string()],
            ..Context::default()
        };
        self.set_context(context)
    }

    pub fn with_location(self, start: usize, end: usize) -> Self {
        let context = Context {
            locations: vec![SourceLocation { start, end }],
            ..Context::default()
        };
        self.set_context(context)
    }
}

// ============= Pattern Combinators =============

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    /// Stack patterns on top of each other (play simultaneously).
    ///
    /// Output order is child order, then each child's own order.
    pub fn stack(patterns: Vec<Pattern<T>>) -> Pattern<T> {
        if patterns.is_empty() {
            return Pattern::silence();
        }
        Pattern::new(move |state| {
            let mut haps = Vec::new();
            for pattern in &patterns {
                haps.extend(pattern.query(state)?);
            }
            Ok(haps)
        })
    }

    /// Play `other` on top of this pattern
    pub fn overlay(self, other: Pattern<T>) -> Pattern<T> {
        Pattern::stack(vec![self, other])
    }

    /// Alternate between patterns, one whole cycle each
    pub fn slowcat(mut patterns: Vec<Pattern<T>>) -> Pattern<T> {
        match patterns.len() {
            0 => return Pattern::silence(),
            1 => return patterns.remove(0),
            _ => {}
        }

        let len = patterns.len() as i64;
        let patterns = Arc::new(patterns);
        Pattern::new(move |state| {
            let cycle = state.span.begin.sam();
            let index = cycle.numerator().rem_euclid(len) as usize;
            // Each child advances through its own cycles instead of skipping
            let offset = cycle.checked_sub(Fraction::from_integer(cycle.numerator().div_euclid(len)))?;

            let inner = state.with_span(|span| span.with_time(|t| t.checked_sub(offset)))?;
            patterns[index]
                .query(&inner)?
                .into_iter()
                .map(|hap| hap.with_span(|span| span.with_time(|t| t.checked_add(offset))))
                .collect()
        })
        .split_queries()
    }

    /// Alias for `slowcat`
    pub fn cat(patterns: Vec<Pattern<T>>) -> Pattern<T> {
        Pattern::slowcat(patterns)
    }

    /// Concatenate patterns within one cycle, each taking an equal slice
    pub fn fastcat(patterns: Vec<Pattern<T>>) -> Pattern<T> {
        if patterns.is_empty() {
            return Pattern::silence();
        }
        let len = Fraction::from_integer(patterns.len() as i64);
        Pattern::slowcat(patterns)
            .fast_unchecked(len)
            .set_steps(Some(len))
    }

    /// Alias for `fastcat`
    pub fn sequence(patterns: Vec<Pattern<T>>) -> Pattern<T> {
        Pattern::fastcat(patterns)
    }

    /// Concatenate patterns within one cycle, each slice proportional to its weight
    pub fn timecat(weighted: Vec<(Fraction, Pattern<T>)>) -> PatternResult<Pattern<T>> {
        if let Some((weight, _)) = weighted.iter().find(|(w, _)| *w <= Fraction::ZERO) {
            return Err(PatternError::argument(
                "timecat",
                format!("weights must be positive, got {}", weight),
            ));
        }
        let total = weighted
            .iter()
            .fold(Fraction::ZERO, |acc, (weight, _)| acc + *weight);
        if total.is_zero() {
            return Ok(Pattern::silence());
        }

        let mut begin = Fraction::ZERO;
        let mut layers = Vec::with_capacity(weighted.len());
        for (weight, pattern) in weighted {
            let end = begin + weight;
            layers.push(pattern.compress(begin / total, end / total)?);
            begin = end;
        }
        Ok(Pattern::stack(layers).set_steps(Some(total)))
    }
}

// ============= Time Transformations =============

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    /// Speed up a pattern by a positive factor
    pub fn fast(self, factor: Fraction) -> PatternResult<Self> {
        if factor <= Fraction::ZERO {
            return Err(PatternError::argument(
                "fast",
                format!("factor must be positive, got {}", factor),
            ));
        }
        Ok(self.fast_unchecked(factor))
    }

    /// Slow down a pattern by a positive factor
    pub fn slow(self, factor: Fraction) -> PatternResult<Self> {
        if factor <= Fraction::ZERO {
            return Err(PatternError::argument(
                "slow",
                format!("factor must be positive, got {}", factor),
            ));
        }
        Ok(self.fast_unchecked(factor.recip()?))
    }

    /// `factor` must already be known to be positive
    pub(crate) fn fast_unchecked(self, factor: Fraction) -> Self {
        let steps = self.steps;
        self.with_query_time(move |t| t.checked_mul(factor))
            .with_hap_time(move |t| t.checked_div(factor))
            .set_steps(steps)
    }

    /// Shift pattern backward in time
    pub fn early(self, offset: Fraction) -> Self {
        self.with_query_time(move |t| t.checked_add(offset))
            .with_hap_time(move |t| t.checked_sub(offset))
    }

    /// Shift pattern forward in time
    pub fn late(self, offset: Fraction) -> Self {
        self.early(-offset)
    }

    /// Reverse each cycle
    pub fn rev(self) -> Self {
        let steps = self.steps;
        Pattern::new(move |state| {
            let cycle = state.span.begin.sam();
            let next_cycle = state.span.begin.next_sam();
            let reflect = |span: TimeSpan| -> PatternResult<TimeSpan> {
                Ok(TimeSpan::new(
                    cycle.checked_add(next_cycle.checked_sub(span.end)?)?,
                    cycle.checked_add(next_cycle.checked_sub(span.begin)?)?,
                ))
            };

            let haps = self.query(&state.set_span(reflect(state.span)?))?;
            haps.into_iter().map(|hap| hap.with_span(reflect)).collect()
        })
        .split_queries()
        .set_steps(steps)
    }

    /// Speed up each cycle by `factor`, leaving a gap for the rest of the cycle
    pub fn fast_gap(self, factor: Fraction) -> PatternResult<Self> {
        if factor <= Fraction::ZERO {
            return Err(PatternError::argument(
                "fast_gap",
                format!("factor must be positive, got {}", factor),
            ));
        }
        let steps = self.steps;
        Ok(Pattern::new(move |state| {
            let cycle = state.span.begin.sam();
            let squeeze = |t: Fraction| -> PatternResult<Fraction> {
                Ok(t.checked_sub(cycle)?.checked_mul(factor)?.min(Fraction::ONE))
            };
            let unsqueeze = |t: Fraction| -> PatternResult<Fraction> {
                cycle.checked_add(t.checked_sub(cycle)?.checked_div(factor)?.min(Fraction::ONE))
            };
            let begin_pos = squeeze(state.span.begin)?;
            let end_pos = squeeze(state.span.end)?;
            if begin_pos >= Fraction::ONE {
                return Ok(Vec::new());
            }

            let inner = state.set_span(TimeSpan::new(
                cycle.checked_add(begin_pos)?,
                cycle.checked_add(end_pos)?,
            ));
            self.query(&inner)?
                .into_iter()
                .map(|hap| -> PatternResult<Hap<T>> {
                    let begin = hap.part.begin;
                    let end = hap.part.end;
                    let part = TimeSpan::new(unsqueeze(begin)?, unsqueeze(end)?);
                    let whole = match hap.whole {
                        Some(whole) => Some(TimeSpan::new(
                            part.begin
                                .checked_sub(begin.checked_sub(whole.begin)?.checked_div(factor)?)?,
                            part.end
                                .checked_add(whole.end.checked_sub(end)?.checked_div(factor)?)?,
                        )),
                        None => None,
                    };
                    Ok(Hap {
                        whole,
                        part,
                        value: hap.value,
                        context: hap.context,
                    })
                })
                .collect()
        })
        .split_queries()
        .set_steps(steps))
    }

    /// Squeeze each cycle into `[begin, end)` of the same cycle
    pub fn compress(self, begin: Fraction, end: Fraction) -> PatternResult<Self> {
        if begin > end || begin < Fraction::ZERO || end > Fraction::ONE {
            return Err(PatternError::argument(
                "compress",
                format!("span {} -> {} must lie within one cycle", begin, end),
            ));
        }
        if begin == end {
            return Ok(Pattern::silence());
        }
        Ok(self.fast_gap((end - begin).recip()?)?.late(begin))
    }
}
