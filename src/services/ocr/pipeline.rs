use image::RgbImage;
use std::sync::Arc;

use super::engine::{PageSegMode, RecognizeOptions, TextRecognizer};
use super::fill::FillEstimator;
use super::masks::{self, Mask, MaskGenerator, EXP_STRATEGIES, TEXT_COLOR_STRATEGIES, TEXT_FALLBACK_STRATEGIES};
use super::parser::{parse_hp, parse_level};
use super::scorer::CandidateScorer;
use crate::models::config::{SweepConfig, WorkerConfig};
use crate::models::ocr_result::{Decision, RecognitionResult, ScoredCandidate, TextReading};
use crate::models::protocol::OcrKind;
use crate::services::diagnostics::DiagnosticSink;

const EXP_WHITELIST: &str = "0123456789.,%";
const NAMELEVEL_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789Lv ";
const LEVEL_WHITELIST: &str = "0123456789Lv. ";
const CHARNAME_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 ";
const HP_WHITELIST: &str = "0123456789/";

/// Region -> masks -> recognizer -> parser/scorer, one request at a time
pub struct OcrPipeline {
    recognizer: Arc<dyn TextRecognizer>,
    masks: MaskGenerator,
    fill: FillEstimator,
    scorer: CandidateScorer,
    sweep: SweepConfig,
}

impl OcrPipeline {
    pub fn new(config: &WorkerConfig, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            recognizer,
            masks: MaskGenerator::new(config.masks.clone()),
            fill: FillEstimator::new(config.fill.clone()),
            scorer: CandidateScorer::new(config.scoring.clone(), config.correction.clone()),
            sweep: config.sweep.clone(),
        }
    }

    /// Full EXP sweep: every mask and its inverse, in every queued mode
    pub fn read_exp(&self, region: &RgbImage, sink: &dyn DiagnosticSink) -> Decision {
        sink.record_region("input", region);

        let fill = self.fill.estimate(region);
        let masks = self.masks.generate(region, EXP_STRATEGIES);
        let candidates = self.sweep_exp(&masks, sink);

        let decision = self.scorer.select(&candidates, fill);
        tracing::debug!(
            masks = masks.len(),
            candidates = candidates.len(),
            parsed = candidates.iter().filter(|c| c.parsed_value.is_some()).count(),
            fill = ?fill,
            value = ?decision.value,
            "exp sweep finished"
        );
        decision
    }

    fn sweep_exp(&self, masks: &[Mask], sink: &dyn DiagnosticSink) -> Vec<ScoredCandidate> {
        let mut candidates: Vec<ScoredCandidate> = Vec::new();

        for mask in masks {
            sink.record_mask(&mask.label, &mask.image);
            let inverse = mask.inverse();

            for &mode in mask.modes {
                let options = RecognizeOptions::line(EXP_WHITELIST).with_mode(mode);

                for m in [mask, &inverse] {
                    let label = match mode {
                        PageSegMode::SingleWord => format!("{}_psm8", m.label),
                        _ => m.label.clone(),
                    };
                    let result = RecognitionResult {
                        raw_text: self.recognizer.recognize_line(&m.image, &options),
                        source_mask_label: label,
                    };
                    let candidate = self.scorer.candidate(&result);
                    tracing::debug!(
                        label = %candidate.label,
                        raw = %candidate.raw_text,
                        score = candidate.score,
                        value = ?candidate.parsed_value,
                        "candidate"
                    );

                    let reached = candidate.parsed_value.is_some()
                        && self
                            .sweep
                            .early_exit_score
                            .is_some_and(|threshold| candidate.score >= threshold);
                    candidates.push(candidate);
                    if reached {
                        tracing::debug!("early exit threshold reached");
                        return candidates;
                    }
                }
            }
        }

        candidates
    }

    /// Non-empty readings of every text mask and its inverse, in sweep order;
    /// stops after the first reading accepted by `done`
    fn sweep_text<F>(&self, region: &RgbImage, whitelist: &str, sink: &dyn DiagnosticSink, done: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        sink.record_region("input", region);

        let options = RecognizeOptions::line(whitelist);
        let mut readings = Vec::new();

        // Color masks scale by scale, then the grayscale fallbacks
        let masks = self
            .masks
            .generate_scale_major(region, TEXT_COLOR_STRATEGIES)
            .into_iter()
            .chain(self.masks.generate_scale_major(region, TEXT_FALLBACK_STRATEGIES));

        for mask in masks {
            sink.record_mask(&mask.label, &mask.image);
            let inverse = mask.inverse();

            for m in [&mask, &inverse] {
                let raw = self.recognizer.recognize_line(&m.image, &options);
                if raw.is_empty() {
                    continue;
                }
                let finished = done(&raw);
                readings.push(raw);
                if finished {
                    return readings;
                }
            }
        }

        readings
    }

    /// Recognize a non-percentage kind
    pub fn read_text(&self, kind: &OcrKind, region: &RgbImage, sink: &dyn DiagnosticSink) -> TextReading {
        match kind {
            OcrKind::NameLevel => {
                let readings = self.sweep_text(region, NAMELEVEL_WHITELIST, sink, |_| false);
                TextReading {
                    raw_text: first_max_by_key(readings, |r| r.chars().count()),
                    value: None,
                }
            }
            OcrKind::Level => {
                let readings = self.sweep_text(region, LEVEL_WHITELIST, sink, |_| false);
                let digit_count = |r: &String| r.chars().filter(|c| c.is_ascii_digit()).count();
                let readings: Vec<String> = readings.into_iter().filter(|r| digit_count(r) > 0).collect();
                let raw = first_max_by_key(readings, digit_count);
                TextReading {
                    value: parse_level(&raw).map(|level| level.to_string()),
                    raw_text: raw,
                }
            }
            OcrKind::CharName => {
                let readings = self.sweep_text(region, CHARNAME_WHITELIST, sink, |_| false);
                let readings = readings.into_iter().map(|r| r.trim().to_string()).collect();
                TextReading {
                    raw_text: first_max_by_key(readings, |r| r.chars().filter(|c| c.is_alphanumeric()).count()),
                    value: None,
                }
            }
            OcrKind::EnemyHp => {
                let readings = self.sweep_text(region, HP_WHITELIST, sink, |r| r.contains('/'));
                let raw = readings
                    .iter()
                    .find(|r| r.contains('/'))
                    .cloned()
                    .unwrap_or_default();
                TextReading {
                    value: parse_hp(&raw),
                    raw_text: raw,
                }
            }
            OcrKind::Lauftext => self.read_plain(region, PageSegMode::Block, sink),
            OcrKind::Exp | OcrKind::Other(_) => self.read_plain(region, PageSegMode::SingleLine, sink),
        }
    }

    fn read_plain(&self, region: &RgbImage, mode: PageSegMode, sink: &dyn DiagnosticSink) -> TextReading {
        sink.record_region("input", region);
        let gray = masks::plain_gray(region);
        sink.record_mask("gray", &gray);

        let options = RecognizeOptions {
            whitelist: None,
            mode,
        };
        TextReading {
            raw_text: self.recognizer.recognize_line(&gray, &options),
            value: None,
        }
    }
}

/// First element with the greatest key, or an empty string
fn first_max_by_key<F>(items: Vec<String>, key: F) -> String
where
    F: Fn(&String) -> usize,
{
    let mut best: Option<(usize, String)> = None;
    for item in items {
        let k = key(&item);
        if best.as_ref().map_or(true, |(bk, _)| k > *bk) {
            best = Some((k, item));
        }
    }
    best.map(|(_, item)| item).unwrap_or_default()
}
