use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static FLOAT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").unwrap());
static HP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9][0-9.,]*)\s*[/|]\s*([0-9][0-9.,]*)").unwrap());

/// Pairs a recognizer confuses with each other
const CONFUSABLE_PAIRS: [(char, char); 3] = [('7', '1'), ('5', '9'), ('6', '8')];

/// Validate EXP percentage is within range (0.0-100.0)
pub fn validate_exp_percentage(percentage: f64) -> bool {
    (0.0..=100.0).contains(&percentage)
}

/// Validate level is within acceptable range (1-999)
pub fn validate_level(level: u32) -> bool {
    (1..=999).contains(&level)
}

/// Strip whitespace, unify the separator, map letter look-alikes onto digits
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            ',' => '.',
            'O' | 'o' => '0',
            'l' | 'I' | '|' => '1',
            other => other,
        })
        .collect()
}

fn is_confusable(before: char, after: char) -> bool {
    before != after
        && CONFUSABLE_PAIRS
            .iter()
            .any(|&(a, b)| (before == a && after == b) || (before == b && after == a))
}

/// Rewrite the digit after the integer/fraction boundary when it forms a
/// confusable pair with the digit before it. Strings without a usable
/// separator are reduced to their digits.
pub fn fix_confusions(text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    if chars.len() < 5 {
        return text.to_string();
    }

    // With separator: the digits either side of it
    if let Some(dot) = chars.iter().position(|&c| c == '.') {
        if dot > 0
            && dot + 1 < chars.len()
            && chars[dot - 1].is_ascii_digit()
            && chars[dot + 1].is_ascii_digit()
        {
            if is_confusable(chars[dot - 1], chars[dot + 1]) {
                chars[dot + 1] = chars[dot - 1];
            }
            return chars.into_iter().collect();
        }
    }

    // Without separator: infer the boundary from the run length
    let mut digits: Vec<char> = chars.iter().copied().filter(|c| c.is_ascii_digit()).collect();
    let boundary = match digits.len() {
        5 => 0,
        6 => 1,
        7 => 2,
        _ => return text.to_string(),
    };
    if is_confusable(digits[boundary], digits[boundary + 1]) {
        digits[boundary + 1] = digits[boundary];
    }
    digits.into_iter().collect()
}

fn push_in_range(values: &mut Vec<f64>, text: &str) {
    if let Ok(v) = text.parse::<f64>() {
        if validate_exp_percentage(v) {
            values.push(v);
        }
    }
}

/// Every in-range interpretation of a recognized string, in production order
pub fn parse_exp_candidates(raw: &str) -> Vec<f64> {
    let mut values = Vec::new();
    if raw.trim().is_empty() {
        return values;
    }

    // Step 1: Normalize and correct
    let text = fix_confusions(&normalize(raw)).replace('%', "");

    // Step 2: Interpret each numeric token
    for m in FLOAT_RE.find_iter(&text) {
        let token = m.as_str();

        if token.contains('.') {
            push_in_range(&mut values, token);
            continue;
        }

        // Missing separator: try every plausible placement
        let n = token.len();
        if n >= 4 {
            push_in_range(&mut values, &format!("{}.{}", &token[..1], &token[1..]));
        }
        if n >= 3 {
            push_in_range(&mut values, &format!("{}.{}", &token[..2], &token[2..]));
        }
        if n >= 4 {
            push_in_range(&mut values, &format!("{}.{}", &token[..3], &token[3..]));
        }
        if (5..=7).contains(&n) {
            if let Ok(fixed) = token.parse::<u64>() {
                let v = fixed as f64 / 10_000.0;
                if validate_exp_percentage(v) {
                    values.push(v);
                }
            }
        }
        push_in_range(&mut values, token);
    }

    values
}

/// Majority value at 4-decimal resolution; ties go to the earliest produced
pub fn vote(values: &[f64]) -> Option<f64> {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for v in values {
        *counts.entry((v * 10_000.0).round() as i64).or_insert(0) += 1;
    }

    let mut best: Option<(f64, usize)> = None;
    for &v in values {
        let count = counts[&((v * 10_000.0).round() as i64)];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((v, count));
        }
    }
    best.map(|(v, _)| v)
}

/// Parse an EXP percentage from recognized text
/// Returns the majority interpretation in range 0.0 - 100.0
pub fn parse_exp_percent(raw: &str) -> Option<f64> {
    vote(&parse_exp_candidates(raw))
}

/// Parse level from recognized text ("Lv.126", "126")
pub fn parse_level(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || digits.len() > 3 {
        return None;
    }
    digits.parse().ok().filter(|&level| validate_level(level))
}

/// Parse "current/max" hit points, normalized to `cur/max`
pub fn parse_hp(text: &str) -> Option<String> {
    let caps = HP_RE.captures(text)?;
    Some(format!("{}/{}", &caps[1], &caps[2]))
}
