//! Morphing between patterns and automaton evolution

use tessel::config::Limits;
use tessel::fractal::values_to_pattern;
use tessel::morph::{tension_at, TensionCurve};
use tessel::pattern::{Fraction, Hap, Pattern};
use tessel::value::Value;

fn cycle<T: Clone + Send + Sync + 'static>(p: &Pattern<T>, c: i64) -> Vec<Hap<T>> {
    p.query_span(Fraction::from_integer(c), Fraction::from_integer(c + 1))
        .unwrap()
}

fn gain(hap: &Hap<Value>) -> f64 {
    hap.value.param("gain").and_then(Value::as_f64).unwrap()
}

fn drums() -> Pattern<Value> {
    Pattern::pure(Value::from("bd")).euclid_struct(3, 8, 0).unwrap()
}

#[test]
fn test_every_named_curve_resolves() {
    for name in TensionCurve::names() {
        let curve = TensionCurve::from_name(name);
        assert_eq!(curve.name(), name);
        for i in 0..=20 {
            let v = curve.apply(i as f64 / 20.0).unwrap();
            assert!((0.0..=1.0).contains(&v), "{} out of range at step {}", name, i);
        }
    }
}

#[test]
fn test_morph_gains_complement() {
    let pad = Pattern::pure(Value::from("pad"));
    let p = drums()
        .morph(pad, TensionCurve::Golden, Fraction::from_integer(8))
        .unwrap();

    for c in 0..8 {
        let haps = cycle(&p, c);
        assert_eq!(haps.len(), 4, "3 drum hits and one pad per cycle");
        let source = gain(&haps[0]);
        let target = gain(&haps[3]);
        assert!((source + target - 1.0).abs() < 1e-12);
        let expected = tension_at(&TensionCurve::Golden, Fraction::from_integer(c), Fraction::from_integer(8))
            .unwrap();
        assert!((target - expected).abs() < 1e-12);
    }
}

#[test]
fn test_morph_deterministic_and_split() {
    let p = drums()
        .morph(Pattern::pure(Value::from("pad")), TensionCurve::Lorenz, Fraction::from_integer(3))
        .unwrap();
    let span = (Fraction::ZERO, Fraction::from_integer(2));

    let first = p.query_span(span.0, span.1).unwrap();
    assert_eq!(first, p.query_span(span.0, span.1).unwrap());

    let mut pieces = cycle(&p, 0);
    pieces.extend(cycle(&p, 1));
    assert_eq!(first, pieces);
}

#[test]
fn test_morph_keeps_existing_gain() {
    let quiet = Pattern::pure(Value::from("bd")).gain(0.5);
    let p = quiet
        .morph(Pattern::silence(), TensionCurve::Linear, Fraction::from_integer(2))
        .unwrap();
    let haps = cycle(&p, 1);
    assert_eq!(haps.len(), 1);
    assert!((gain(&haps[0]) - 0.25).abs() < 1e-12);
}

#[test]
fn test_density_morph_speeds_up() {
    let p = values_to_pattern(vec![1, 2, 3, 4])
        .density_morph(8.0, TensionCurve::Linear, Fraction::from_integer(2))
        .unwrap();
    let onset_count = |c| cycle(&p, c).iter().filter(|h| h.has_onset()).count();
    assert_eq!(onset_count(0), 4);
    assert_eq!(onset_count(1), 6);
}

#[test]
fn test_evolve_identity_rule_holds_steady() {
    let p = values_to_pattern(vec!['a', 'b', 'c', 'd'])
        .mask(values_to_pattern(vec![true, false, true, false]))
        .evolve(204, 5, &Limits::default());
    let p = p.unwrap();
    for c in 0..5 {
        let values: Vec<char> = cycle(&p, c).into_iter().map(|h| h.value).collect();
        assert_eq!(values, vec!['a', 'c']);
    }
}

#[test]
fn test_evolve_full_row_dies_under_rule_30() {
    let p = values_to_pattern(vec![0u8; 8])
        .evolve(30, 4, &Limits::default())
        .unwrap();
    assert_eq!(cycle(&p, 0).len(), 8);
    assert!(cycle(&p, 1).is_empty());
    assert_eq!(cycle(&p, 4).len(), 8);
}
