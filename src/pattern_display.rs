//! Pattern display and debugging utilities: Tidal-style event listings, ASCII
//! grids and JSON records for external schedulers

use crate::config::Config;
use crate::error::PatternResult;
use crate::pattern::{Fraction, Hap, Pattern};
use serde::Serialize;
use std::fmt::{Display, Write};

fn cycle_haps<T: Clone + Send + Sync + 'static>(
    pattern: &Pattern<T>,
    cycle: usize,
) -> PatternResult<Vec<Hap<T>>> {
    let begin = Fraction::from_integer(cycle as i64);
    let mut haps = pattern.query_span(begin, begin + Fraction::ONE)?;
    haps.sort_by_key(|hap| hap.part.begin);
    Ok(haps)
}

/// Display a pattern in TidalCycles format, one `(begin -> end): value` line
/// per event with times relative to the cycle
pub fn display_pattern<T: Display + Clone + Send + Sync + 'static>(
    pattern: &Pattern<T>,
    cycles: usize,
) -> PatternResult<String> {
    let mut output = String::new();
    for cycle in 0..cycles {
        let offset = Fraction::from_integer(cycle as i64);
        for hap in cycle_haps(pattern, cycle)? {
            let _ = writeln!(
                output,
                "({} -> {}): {}",
                hap.part.begin - offset,
                hap.part.end - offset,
                hap.value
            );
        }
    }
    Ok(output)
}

/// Render a pattern as ASCII art, one row per cycle. Each event paints the
/// first character of its value over the cells it covers.
pub fn pattern_to_ascii<T: Display + Clone + Send + Sync + 'static>(
    pattern: &Pattern<T>,
    cycles: usize,
    resolution: usize,
) -> PatternResult<String> {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Pattern visualization ({cycles} cycles, {resolution} steps/cycle):"
    );
    let _ = writeln!(output, "{}", "-".repeat(resolution + 3));

    let cells = Fraction::from_integer(resolution as i64);
    for cycle in 0..cycles {
        let offset = Fraction::from_integer(cycle as i64);
        let mut grid = vec!['.'; resolution];
        for hap in cycle_haps(pattern, cycle)? {
            let start = ((hap.part.begin - offset) * cells).floor().numerator().max(0) as usize;
            let end = ((hap.part.end - offset) * cells).ceil().numerator().max(0) as usize;
            let glyph = if hap.has_onset() {
                hap.value.to_string().chars().next().unwrap_or('?')
            } else {
                '-'
            };
            for slot in grid.iter_mut().take(end.min(resolution)).skip(start) {
                *slot = glyph;
            }
        }
        let _ = writeln!(output, "{cycle}:{}", grid.into_iter().collect::<String>());
    }
    Ok(output)
}

/// Describe pattern events in text format
pub fn describe_pattern<T: Display + Clone + Send + Sync + 'static>(
    pattern: &Pattern<T>,
    cycles: usize,
) -> PatternResult<String> {
    let mut output = String::new();
    let _ = writeln!(output, "Pattern events for {cycles} cycle(s):");

    for cycle in 0..cycles {
        let _ = writeln!(output, "Cycle {cycle}:");
        let haps = cycle_haps(pattern, cycle)?;
        if haps.is_empty() {
            output.push_str("  (silence)\n");
            continue;
        }
        for hap in &haps {
            let whole = match hap.whole {
                Some(whole) => whole.to_string(),
                None => "~".to_string(),
            };
            let _ = writeln!(
                output,
                "  [{}] whole {} ({:.3}): {}",
                hap.part,
                whole,
                hap.part.duration().to_float(),
                hap.value
            );
        }
    }
    Ok(output)
}

/// True when any two events of the first cycle overlap
pub fn verify_polyphony<T: Clone + Send + Sync + 'static>(pattern: &Pattern<T>) -> PatternResult<bool> {
    let haps = pattern.first_cycle()?;
    for (i, a) in haps.iter().enumerate() {
        for b in &haps[i + 1..] {
            if a.part.begin < b.part.end && b.part.begin < a.part.end {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// One event as handed to an external scheduler
#[derive(Debug, Clone, Serialize)]
pub struct HapRecord<T> {
    pub part: String,
    pub whole: Option<String>,
    pub onset: bool,
    pub value: T,
    /// Wall-clock time at which this fragment starts (`part.begin`) at the
    /// configured tempo
    pub deadline_seconds: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl<T> HapRecord<T> {
    pub fn from_hap(hap: Hap<T>, config: &Config) -> Self {
        let onset = hap.has_onset();
        let begin = hap.part.begin;
        HapRecord {
            part: hap.part.to_string(),
            whole: hap.whole.map(|whole| whole.to_string()),
            onset,
            value: hap.value,
            deadline_seconds: config.deadline(begin),
            tags: hap.context.tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern_signal::saw;

    fn seq(values: &[&'static str]) -> Pattern<&'static str> {
        Pattern::fastcat(values.iter().map(|v| Pattern::pure(*v)).collect())
    }

    #[test]
    fn test_pattern_visualization() {
        let ascii = pattern_to_ascii(&seq(&["bd", "sn", "hh", "cp"]), 2, 16).unwrap();
        assert!(ascii.contains("0:bbbbsssshhhhcccc"));
        assert!(ascii.contains("1:bbbbsssshhhhcccc"));
    }

    #[test]
    fn test_visualization_marks_fragments() {
        let p = Pattern::pure("x").late(Fraction::new(1, 2));
        let ascii = pattern_to_ascii(&p, 1, 4).unwrap();
        assert!(ascii.contains("0:--xx"));
    }

    #[test]
    fn test_display_pattern_exact_times() {
        let out = display_pattern(&seq(&["bd", "sn", "hh"]), 1).unwrap();
        assert_eq!(out, "(0 -> 1/3): bd\n(1/3 -> 2/3): sn\n(2/3 -> 1): hh\n");
    }

    #[test]
    fn test_pattern_description() {
        let desc = describe_pattern(&seq(&["bd", "sn"]), 2).unwrap();
        assert!(desc.contains("Cycle 1:"));
        assert!(desc.contains("bd"));
        assert!(desc.contains("sn"));

        let silent = describe_pattern(&Pattern::<i32>::silence(), 1).unwrap();
        assert!(silent.contains("(silence)"));

        let continuous = describe_pattern(&saw(), 1).unwrap();
        assert!(continuous.contains("whole ~"));
    }

    #[test]
    fn test_polyphony_detection() {
        assert!(!verify_polyphony(&seq(&["bd", "sn", "hh", "cp"])).unwrap());
        let poly = Pattern::stack(vec![seq(&["bd", "bd"]), seq(&["hh", "hh"])]);
        assert!(verify_polyphony(&poly).unwrap());
    }

    #[test]
    fn test_hap_record_deadline() {
        let config = Config::default();
        let haps = seq(&["a", "b"]).with_tag("drums").first_cycle().unwrap();
        let record = HapRecord::from_hap(haps[1].clone(), &config);
        assert_eq!(record.part, "1/2 -> 1");
        assert!(record.onset);
        assert_eq!(record.deadline_seconds, config.deadline(Fraction::new(1, 2)));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"value\":\"b\""));
        assert!(json.contains("drums"));
    }

    #[test]
    fn test_fragment_deadline_is_part_begin() {
        let config = Config::default();
        let haps = Pattern::pure("pad").late(Fraction::new(1, 2)).first_cycle().unwrap();
        let tail = haps.iter().find(|h| !h.has_onset()).unwrap();
        let record = HapRecord::from_hap(tail.clone(), &config);
        assert!(!record.onset);
        assert_eq!(record.whole.as_deref(), Some("-1/2 -> 1/2"));
        assert_eq!(record.deadline_seconds, 0.0);
    }
}
