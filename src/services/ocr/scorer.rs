use regex::Regex;
use std::sync::LazyLock;

use super::parser::{parse_exp_percent, validate_exp_percentage};
use crate::models::config::{CorrectionConfig, ScoringConfig};
use crate::models::ocr_result::{Decision, RecognitionResult, ScoredCandidate};

/// Expected percentage shape, e.g. "4.9798" or "75.1234%"
static SHAPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{1,3}[.,][0-9]{2,4}%?$").unwrap());

const EXPECTED_CHARS: &str = "0123456789.,% ";

/// Single-digit rewrites tried against the fill estimate, in priority order
const SUBSTITUTIONS: [(char, char); 7] = [
    ('9', '5'),
    ('5', '9'),
    ('6', '8'),
    ('8', '6'),
    ('9', '8'),
    ('1', '7'),
    ('7', '1'),
];

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Candidate scorer and selector
pub struct CandidateScorer {
    scoring: ScoringConfig,
    correction: CorrectionConfig,
}

impl CandidateScorer {
    pub fn new(scoring: ScoringConfig, correction: CorrectionConfig) -> Self {
        Self { scoring, correction }
    }

    /// Quality score of a raw string (higher is better, never negative)
    pub fn score(&self, raw: &str) -> i32 {
        let s = &self.scoring;
        let clean = raw.trim();
        if clean.is_empty() {
            return 0;
        }

        let digits = clean.chars().filter(|c| c.is_ascii_digit()).count() as i32;
        let mut score = digits * s.per_digit;

        if clean.contains('.') || clean.contains(',') {
            score += s.decimal_bonus;
        }
        if SHAPE_RE.is_match(clean) {
            score += s.shape_bonus;
        }
        if clean.contains('%') {
            score += s.percent_bonus;
        }

        let unexpected = clean.chars().filter(|c| !EXPECTED_CHARS.contains(*c)).count() as i32;
        score -= unexpected * s.unexpected_char_penalty;

        let literal = clean.replace('%', "").replace(',', ".");
        if literal
            .trim()
            .parse::<f64>()
            .map(validate_exp_percentage)
            .unwrap_or(false)
        {
            score += s.plausible_bonus;
        }

        score.max(0)
    }

    /// Parse and score one recognition result
    pub fn candidate(&self, result: &RecognitionResult) -> ScoredCandidate {
        ScoredCandidate {
            raw_text: result.raw_text.clone(),
            parsed_value: parse_exp_percent(&result.raw_text),
            score: self.score(&result.raw_text),
            label: result.source_mask_label.clone(),
        }
    }

    /// Pick the winner and cross-check it against the fill estimate
    pub fn select(&self, candidates: &[ScoredCandidate], fill: Option<f64>) -> Decision {
        let mut best: Option<(&ScoredCandidate, f64)> = None;
        for candidate in candidates {
            let Some(value) = candidate.parsed_value else {
                continue;
            };
            if best.map_or(true, |(b, _)| candidate.score > b.score) {
                best = Some((candidate, value));
            }
        }

        let Some((winner, value)) = best else {
            return Decision::empty(Self::longest_raw(candidates));
        };

        tracing::debug!(label = %winner.label, raw = %winner.raw_text, score = winner.score, value, "selected candidate");

        let value = match fill {
            Some(fill) => self.correct(&winner.raw_text, value, fill * 100.0),
            None => value,
        };

        Decision {
            value: Some(value),
            raw_text: winner.raw_text.clone(),
        }
    }

    /// Fill-based correction; `target` is the fill-implied percentage
    pub fn correct(&self, raw: &str, value: f64, target: f64) -> f64 {
        let c = &self.correction;
        if target < c.credible_min || target > c.credible_max {
            return value;
        }

        // Step 1: Best single-digit substitution
        let mut corrected = value;
        if let Some((substituted, text)) = self.best_substitution(raw, target) {
            let gain = (value - target).abs() - (substituted - target).abs();
            if gain >= c.substitution_min_gain {
                tracing::debug!(raw, text = %text, from = value, to = substituted, target, "accepted digit substitution");
                corrected = substituted;
            }
        }

        // Step 2: Snap implausibly low readings to the bar
        if corrected < target - c.below_margin {
            tracing::debug!(value = corrected, target, "snapping to fill estimate");
            corrected = round4(target);
        }

        corrected
    }

    fn best_substitution(&self, raw: &str, target: f64) -> Option<(f64, String)> {
        let chars: Vec<char> = raw.chars().collect();
        let mut best: Option<(f64, String)> = None;

        for (i, &ch) in chars.iter().enumerate() {
            for &(from, to) in &SUBSTITUTIONS {
                if ch != from {
                    continue;
                }
                let mut variant = chars.clone();
                variant[i] = to;
                let text: String = variant.into_iter().collect();

                if let Some(v) = parse_exp_percent(&text) {
                    let closer = best
                        .as_ref()
                        .map_or(true, |(b, _)| (v - target).abs() < (b - target).abs());
                    if closer {
                        best = Some((v, text));
                    }
                }
            }
        }

        best
    }

    fn longest_raw(candidates: &[ScoredCandidate]) -> String {
        let mut longest = "";
        for candidate in candidates {
            if candidate.raw_text.chars().count() > longest.chars().count() {
                longest = &candidate.raw_text;
            }
        }
        longest.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> CandidateScorer {
        CandidateScorer::new(ScoringConfig::default(), CorrectionConfig::default())
    }

    fn candidate(raw: &str, label: &str) -> ScoredCandidate {
        scorer().candidate(&RecognitionResult {
            raw_text: raw.to_string(),
            source_mask_label: label.to_string(),
        })
    }

    #[test]
    fn test_score_prefers_decimal_point() {
        let s = scorer();

        // 6 digits + decimal + shape + % + plausible
        assert_eq!(s.score("50.1234%"), 60 + 200 + 80 + 20 + 30);
        // 6 digits, no separator, not plausible
        assert_eq!(s.score("501234"), 60);
        assert!(s.score("4.9798") > s.score("49798"));
    }

    #[test]
    fn test_score_penalizes_unexpected_chars_and_floors_at_zero() {
        let s = scorer();

        // 3 digits + decimal - one stray letter
        assert_eq!(s.score("12.5x"), 30 + 200 - 15);
        assert_eq!(s.score("5abc"), 0);
        assert_eq!(s.score("abc"), 0);
        assert_eq!(s.score(""), 0);
    }

    #[test]
    fn test_select_highest_score_wins() {
        let candidates = vec![
            candidate("501234", "otsu_5.0"),
            candidate("50.1234%", "warm_5.0"),
            candidate("50.12", "gold_5.0"),
        ];
        let decision = scorer().select(&candidates, None);

        assert_eq!(decision.value, Some(50.1234));
        assert_eq!(decision.raw_text, "50.1234%");
    }

    #[test]
    fn test_select_tie_keeps_first_seen() {
        let candidates = vec![candidate("12.34", "a"), candidate("43.21", "b")];
        assert_eq!(candidates[0].score, candidates[1].score);

        let decision = scorer().select(&candidates, None);
        assert_eq!(decision.raw_text, "12.34");
    }

    #[test]
    fn test_select_is_deterministic() {
        let candidates = vec![
            candidate("7.1234", "a"),
            candidate("71234", "b"),
            candidate("", "c"),
            candidate("9.5%", "d"),
        ];
        let first = scorer().select(&candidates, Some(0.3));
        for _ in 0..5 {
            assert_eq!(scorer().select(&candidates, Some(0.3)), first);
        }
    }

    #[test]
    fn test_unparsed_candidates_never_rank() {
        let mut unparsable = candidate("%%%%", "x");
        unparsable.score = 10_000;
        let candidates = vec![unparsable, candidate("3.5", "y")];

        assert_eq!(scorer().select(&candidates, None).value, Some(3.5));
    }

    #[test]
    fn test_snap_to_fill_when_far_below() {
        let candidates = vec![candidate("2", "warm_5.0")];
        let decision = scorer().select(&candidates, Some(0.5));

        assert_eq!(decision.value, Some(50.0));
        assert_eq!(decision.raw_text, "2", "Raw text stays the recognized one");
    }

    #[test]
    fn test_no_snap_outside_credible_range() {
        let candidates = vec![candidate("0.5", "a")];

        // Fill of 100% is not trusted
        assert_eq!(scorer().select(&candidates, Some(1.0)).value, Some(0.5));
        // Fill of 2% is not trusted
        assert_eq!(scorer().select(&candidates, Some(0.02)).value, Some(0.5));
    }

    #[test]
    fn test_no_snap_within_margin() {
        let candidates = vec![candidate("42.0000", "a")];
        assert_eq!(scorer().select(&candidates, Some(0.5)).value, Some(42.0));
    }

    #[test]
    fn test_digit_substitution_toward_fill() {
        let candidates = vec![candidate("49.1234", "a")];
        let decision = scorer().select(&candidates, Some(0.45));

        assert_eq!(decision.value, Some(45.1234));
        assert_eq!(decision.raw_text, "49.1234");
    }

    #[test]
    fn test_digit_substitution_requires_minimum_gain() {
        // 8 -> 6 moves 30.58 to 30.56, only 0.02 closer to 30.4
        let s = scorer();
        assert_eq!(s.correct("30.58", 30.58, 30.4), 30.58);
    }

    #[test]
    fn test_non_ascii_digits_fall_back_to_raw() {
        let raw = "\u{0664}\u{0669}.\u{0661}\u{0662}%";
        let s = scorer();
        let candidates = vec![candidate(raw, "warm_6.0")];
        let decision = s.select(&candidates, Some(0.45));

        assert_eq!(decision.value, None);
        assert_eq!(decision.raw_text, raw);
        assert_eq!(s.correct(raw, 12.0, 45.0), 45.0, "No substitution applies, far-below value snaps");
    }

    #[test]
    fn test_fallback_longest_raw() {
        let candidates = vec![candidate("", "a"), candidate("ab", "b"), candidate("%%%", "c"), candidate("xyz", "d")];
        let decision = scorer().select(&candidates, Some(0.5));

        assert_eq!(decision.value, None);
        assert_eq!(decision.raw_text, "%%%", "First of the longest raws");
    }

    #[test]
    fn test_fallback_all_empty() {
        let candidates = vec![candidate("", "a"), candidate("", "b")];
        assert_eq!(scorer().select(&candidates, None), Decision::empty(""));
    }
}
