//! # Tessel - Pattern Algebra for Live Coding
//!
//! Tessel is a TidalCycles-style pattern engine. A pattern is a pure function
//! from a query span of rational time to the events ("haps") active in it.
//! Time is counted in cycles and kept exact, so subdivisions like 1/3 never
//! drift.
//!
//! ## Core Features
//!
//! - **Exact Time**: reduced `i64` fractions with overflow reported as errors
//! - **Combinators**: sequencing, stacking, time scaling, reversal, compression
//! - **Deterministic Randomness**: degrade, choose and `sometimes` are pure
//!   functions of a seed and the event's position
//! - **Structure**: Euclidean rhythms, `struct`, masks and polymeters
//! - **Generators**: Cantor, Sierpinski, dragon curve, L-systems, cellular
//!   automata, IFS and chaotic maps, Perlin noise signals
//! - **Morphing**: tension curves driving crossfades, density changes and
//!   filter sweeps between patterns
//!
//! ## Quick Start
//!
//! ```rust
//! use tessel::pattern::{Fraction, Pattern};
//!
//! let p = Pattern::fastcat(vec![Pattern::pure("bd"), Pattern::pure("sn")]);
//! let haps = p.first_cycle().unwrap();
//! assert_eq!(haps.len(), 2);
//! assert_eq!(haps[1].part.begin, Fraction::new(1, 2));
//! ```
//!
//! ### Euclidean Rhythm
//!
//! ```rust
//! use tessel::pattern::Pattern;
//!
//! // The tresillo: 3 onsets spread over 8 steps
//! let kick = Pattern::pure("bd").euclid_struct(3, 8, 0).unwrap();
//! assert_eq!(kick.first_cycle().unwrap().len(), 3);
//! ```
//!
//! ### Morphing
//!
//! ```rust
//! use tessel::morph::TensionCurve;
//! use tessel::pattern::{Fraction, Pattern};
//! use tessel::value::Value;
//!
//! let a = Pattern::pure(Value::from("pad"));
//! let b = Pattern::pure(Value::from("lead"));
//! let blend = a.morph(b, TensionCurve::Golden, Fraction::from_integer(8)).unwrap();
//! assert_eq!(blend.first_cycle().unwrap().len(), 2);
//! ```
//!
//! ## Architecture
//!
//! ### Main Modules
//!
//! - [`pattern`] - Rational time, spans, haps and the core combinators (start here!)
//! - [`pattern_ops`] - Randomness and conditional transformations
//! - [`pattern_structure`] - Euclidean rhythms, applicative combination, polymeter
//! - [`pattern_signal`] - Continuous signals and noise
//! - [`fractal`] - Fractal and chaotic sequence generators
//! - [`morph`] - Tension curves, morphing and `evolve`
//! - [`value`] - Dynamic control values for `Pattern<Value>`
//! - [`config`] - TOML configuration and generator size limits
//!
//! ### Query Flow
//!
//! 1. **Combinators** wrap query functions; nothing is evaluated eagerly
//! 2. **Queries** pass a [`pattern::State`] holding the span and named controls
//! 3. **Haps** come back with a `whole` (logical extent) and a `part` (visible fragment)
//! 4. **Errors** from any layer propagate as [`error::PatternError`]

pub mod config;
pub mod error;
pub mod fractal;
pub mod morph;
pub mod noise;
pub mod pattern;
pub mod pattern_display;
pub mod pattern_ops;
pub mod pattern_signal;
pub mod pattern_structure;
pub mod value;

pub use config::{Config, Limits};
pub use error::{PatternError, PatternResult};
pub use morph::TensionCurve;
pub use pattern::{Context, Fraction, Hap, Pattern, State, TimeSpan};
pub use value::Value;
