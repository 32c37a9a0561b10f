//! Numeric candidate extraction
//!
//! Scans flattened document text for numeric tokens and normalizes them to
//! `Decimal`. Accepted token grammar:
//!
//! - optional sign (`-`, `+`, U+2212), kept only after whitespace, `(`, `:`, `=`
//!   or at the start of the text
//! - digit groups separated by `,` `.` or a space (regular, NBSP, narrow NBSP)
//! - optional decimal part introduced by `,` or `.`
//! - trailing unit suffixes (`1234.56kg`) are ignored
//!
//! Dates (`DD/MM/YYYY`, `DD.MM.YYYY`, `YYYY-MM-DD`) are recognized first; each
//! component becomes its own `DateLike` candidate and the span is masked so its
//! digits are not read again as ordinary numbers.
//!
//! Extraction never fails: text without numbers yields an empty list.

use dqv_common::config::SeparatorPolicy;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::{FormatTag, NumericCandidate, PositionHint};

static DATE_ISO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]{4})-([0-9]{1,2})-([0-9]{1,2})").expect("ISO date pattern is valid")
});

static DATE_SLASH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]{1,2})/([0-9]{1,2})/([0-9]{4})").expect("slash date pattern is valid")
});

static DATE_DOTTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]{1,2})\.([0-9]{1,2})\.([0-9]{4})").expect("dotted date pattern is valid")
});

static NUMBER_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+\x{2212}]?[0-9]+(?:[.,\x{00A0}\x{202F} ][0-9]+)*")
        .expect("number pattern is valid")
});

const SPACE_SEPARATORS: [char; 3] = [' ', '\u{00A0}', '\u{202F}'];

const CURRENCY_SYMBOLS: [char; 5] = ['$', '€', '£', '¥', '₹'];

const CURRENCY_CODES: [&str; 15] = [
    "USD", "EUR", "GBP", "JPY", "CHF", "CNY", "INR", "SGD", "AED", "AUD", "CAD", "MYR", "IDR",
    "SAR", "QAR",
];

/// Extracts ordered numeric candidates from text
#[derive(Debug, Clone, Copy)]
pub struct NumberExtractor {
    separator_policy: SeparatorPolicy,
}

impl Default for NumberExtractor {
    fn default() -> Self {
        Self::new(SeparatorPolicy::Thousands)
    }
}

/// Byte span of a recognized date and of its three components
struct DateSpan {
    start: usize,
    end: usize,
    parts: [(usize, usize); 3],
}

impl NumberExtractor {
    pub fn new(separator_policy: SeparatorPolicy) -> Self {
        Self { separator_policy }
    }

    /// Extract every numeric candidate in reading order
    pub fn extract(&self, text: &str) -> Vec<NumericCandidate> {
        if text.is_empty() {
            return Vec::new();
        }

        let line_starts = line_starts(text);
        let dates = find_dates(text);
        let mut candidates = Vec::new();

        for date in &dates {
            for &(start, end) in &date.parts {
                let raw = &text[start..end];
                if let Ok(value) = Decimal::from_str(raw) {
                    candidates.push(NumericCandidate {
                        raw_text: raw.to_string(),
                        parsed_value: value,
                        position_hint: Some(position(&line_starts, start)),
                        format_tag: FormatTag::DateLike,
                    });
                }
            }
        }

        // Same byte length as `text`: date characters are all ASCII
        let masked: String = text
            .char_indices()
            .map(|(i, c)| {
                if dates.iter().any(|d| i >= d.start && i < d.end) {
                    '#'
                } else {
                    c
                }
            })
            .collect();

        for m in NUMBER_TOKEN.find_iter(&masked) {
            self.read_token(text, m.start(), m.end(), &line_starts, &mut candidates);
        }

        candidates.sort_by_key(|c| c.position_hint.map(|p| p.offset).unwrap_or(usize::MAX));
        candidates
    }

    /// Parse a bare numeric string (`1.234,56`, `-12`, `1 500`) under this
    /// extractor's separator policy
    pub fn parse_number(&self, raw: &str) -> Option<Decimal> {
        let raw = raw.trim();
        let (negative, body) = split_sign(raw);
        let (normalized, _) = normalize(body, self.separator_policy)?;
        let value = Decimal::from_str(&normalized).ok()?;
        Some(if negative { -value } else { value })
    }

    fn read_token(
        &self,
        text: &str,
        start: usize,
        end: usize,
        line_starts: &[usize],
        out: &mut Vec<NumericCandidate>,
    ) {
        let mut token_start = start;
        let mut body_start = start;
        let mut negative = false;

        if let Some(c) = text[start..].chars().next().filter(|c| is_sign(*c)) {
            body_start = start + c.len_utf8();
            let keep = match text[..start].chars().next_back() {
                None => true,
                Some(prev) => prev.is_whitespace() || matches!(prev, '(' | ':' | '='),
            };
            if keep {
                negative = c != '+';
            } else {
                token_start = body_start;
            }
        }

        // Identifiers such as `PO2024` or `A4` are not quantities
        if let Some(prev) = text[..token_start].chars().next_back() {
            if prev.is_alphabetic() && !ends_with_currency_code(&text[..token_start]) {
                return;
            }
        }

        let segments = split_segments(text, body_start, end);
        if segments.len() > 1 && !valid_space_grouping(text, &segments) {
            for (i, &(seg_start, seg_end)) in segments.iter().enumerate() {
                let (seg_token_start, seg_negative) = if i == 0 {
                    (token_start, negative)
                } else {
                    (seg_start, false)
                };
                self.push_token(
                    text,
                    seg_token_start,
                    seg_start,
                    seg_end,
                    seg_negative,
                    line_starts,
                    out,
                );
            }
        } else {
            self.push_token(text, token_start, body_start, end, negative, line_starts, out);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_token(
        &self,
        text: &str,
        token_start: usize,
        body_start: usize,
        end: usize,
        negative: bool,
        line_starts: &[usize],
        out: &mut Vec<NumericCandidate>,
    ) {
        let body = &text[body_start..end];
        let parsed = normalize(body, self.separator_policy)
            .and_then(|(normalized, grouped)| Some((Decimal::from_str(&normalized).ok()?, grouped)));

        match parsed {
            Some((value, grouped)) => {
                let format_tag = if currency_adjacent(text, token_start, end) {
                    FormatTag::CurrencyLike
                } else if grouped {
                    FormatTag::ThousandsSeparated
                } else {
                    FormatTag::Plain
                };
                out.push(NumericCandidate {
                    raw_text: text[token_start..end].to_string(),
                    parsed_value: if negative { -value } else { value },
                    position_hint: Some(position(line_starts, token_start)),
                    format_tag,
                });
            }
            None => {
                // Unreadable grouping (`10,20,30`): every digit run stands alone
                for (run_start, run_end) in digit_runs(body) {
                    let (run_start, run_end) = (body_start + run_start, body_start + run_end);
                    let raw = &text[run_start..run_end];
                    if let Ok(value) = Decimal::from_str(raw) {
                        out.push(NumericCandidate {
                            raw_text: raw.to_string(),
                            parsed_value: value,
                            position_hint: Some(position(line_starts, run_start)),
                            format_tag: FormatTag::Plain,
                        });
                    }
                }
            }
        }
    }
}

fn is_sign(c: char) -> bool {
    matches!(c, '-' | '+' | '\u{2212}')
}

fn is_space_separator(c: char) -> bool {
    SPACE_SEPARATORS.contains(&c)
}

fn split_sign(raw: &str) -> (bool, &str) {
    match raw.chars().next() {
        Some(c) if is_sign(c) => (c != '+', &raw[c.len_utf8()..]),
        _ => (false, raw),
    }
}

/// Byte offsets at which each line begins
fn line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

fn position(line_starts: &[usize], offset: usize) -> PositionHint {
    PositionHint {
        offset,
        line: line_starts.partition_point(|&s| s <= offset),
    }
}

fn find_dates(text: &str) -> Vec<DateSpan> {
    let mut spans: Vec<DateSpan> = Vec::new();
    let patterns: [(&Regex, bool); 3] = [
        (&*DATE_ISO, true),
        (&*DATE_SLASH, false),
        (&*DATE_DOTTED, false),
    ];

    for (pattern, year_first) in patterns {
        for caps in pattern.captures_iter(text) {
            let (Some(whole), Some(a), Some(b), Some(c)) =
                (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
            else {
                continue;
            };

            if !digit_bounded(text, whole.start(), whole.end()) {
                continue;
            }
            if spans
                .iter()
                .any(|s| s.start < whole.end() && whole.start() < s.end)
            {
                continue;
            }

            let plausible = if year_first {
                plausible_ymd(a.as_str(), b.as_str(), c.as_str())
            } else {
                plausible_dmy(a.as_str(), b.as_str(), c.as_str())
            };
            if !plausible {
                continue;
            }

            spans.push(DateSpan {
                start: whole.start(),
                end: whole.end(),
                parts: [
                    (a.start(), a.end()),
                    (b.start(), b.end()),
                    (c.start(), c.end()),
                ],
            });
        }
    }

    spans
}

fn digit_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
}

fn plausible_year(year: u32) -> bool {
    (1900..=2199).contains(&year)
}

/// Day and month in either order (DD/MM or MM/DD)
fn plausible_dmy(first: &str, second: &str, year: &str) -> bool {
    let (Ok(first), Ok(second), Ok(year)) = (
        first.parse::<u32>(),
        second.parse::<u32>(),
        year.parse::<u32>(),
    ) else {
        return false;
    };
    plausible_year(year)
        && (1..=31).contains(&first)
        && (1..=31).contains(&second)
        && (first <= 12 || second <= 12)
}

fn plausible_ymd(year: &str, month: &str, day: &str) -> bool {
    let (Ok(year), Ok(month), Ok(day)) =
        (year.parse::<u32>(), month.parse::<u32>(), day.parse::<u32>())
    else {
        return false;
    };
    plausible_year(year) && (1..=12).contains(&month) && (1..=31).contains(&day)
}

/// Split `text[start..end]` on space separators into byte ranges
fn split_segments(text: &str, start: usize, end: usize) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut seg_start = start;
    for (i, c) in text[start..end].char_indices() {
        if is_space_separator(c) {
            segments.push((seg_start, start + i));
            seg_start = start + i + c.len_utf8();
        }
    }
    segments.push((seg_start, end));
    segments
}

/// `1 234 567,89`: a leading group of 1-3 digits, then groups of exactly 3,
/// the last of which may carry a decimal part
fn valid_space_grouping(text: &str, segments: &[(usize, usize)]) -> bool {
    let last = segments.len() - 1;
    segments.iter().enumerate().all(|(i, &(s, e))| {
        let seg = &text[s..e];
        if i == 0 {
            (1..=3).contains(&seg.len()) && seg.bytes().all(|b| b.is_ascii_digit())
        } else if i < last {
            seg.len() == 3 && seg.bytes().all(|b| b.is_ascii_digit())
        } else {
            let bytes = seg.as_bytes();
            bytes.len() >= 3
                && bytes[..3].iter().all(u8::is_ascii_digit)
                && (bytes.len() == 3
                    || (matches!(bytes[3], b'.' | b',')
                        && bytes.len() > 4
                        && bytes[4..].iter().all(u8::is_ascii_digit)))
        }
    })
}

fn valid_grouping<'a>(mut groups: impl Iterator<Item = &'a str>) -> bool {
    let Some(first) = groups.next() else {
        return false;
    };
    (1..=3).contains(&first.len()) && groups.all(|g| g.len() == 3)
}

/// Normalize a numeric body to `digits[.digits]`, reporting whether grouping
/// separators were present
///
/// - both `.` and `,`: the one occurring last is the decimal separator
/// - one kind repeated: thousands grouping
/// - a lone `.`: decimal point
/// - a lone `,` followed by exactly three digits after 1-3 leading digits is
///   ambiguous and follows `policy`; any other lone `,` is a decimal comma
fn normalize(body: &str, policy: SeparatorPolicy) -> Option<(String, bool)> {
    let space_grouped = body.contains(is_space_separator);
    let compact: String = body.chars().filter(|c| !is_space_separator(*c)).collect();

    if compact.is_empty()
        || !compact
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    {
        return None;
    }

    let dots = compact.matches('.').count();
    let commas = compact.matches(',').count();

    let (integer, fraction, group_sep): (&str, &str, Option<char>) = match (dots, commas) {
        (0, 0) => (&compact, "", None),
        (1, 0) => {
            let (i, f) = compact.split_once('.')?;
            (i, f, None)
        }
        (_, 0) => (&compact, "", Some('.')),
        (0, 1) => {
            let (i, f) = compact.split_once(',')?;
            let ambiguous = f.len() == 3 && (1..=3).contains(&i.len()) && !i.starts_with('0');
            if ambiguous && policy == SeparatorPolicy::Thousands {
                (&compact, "", Some(','))
            } else {
                (i, f, None)
            }
        }
        (0, _) => (&compact, "", Some(',')),
        _ => {
            let last_dot = compact.rfind('.')?;
            let last_comma = compact.rfind(',')?;
            let (decimal_at, decimal_sep, group_sep) = if last_dot > last_comma {
                (last_dot, '.', ',')
            } else {
                (last_comma, ',', '.')
            };
            let integer = &compact[..decimal_at];
            if integer.contains(decimal_sep) {
                return None;
            }
            (integer, &compact[decimal_at + 1..], Some(group_sep))
        }
    };

    let digits = match group_sep {
        Some(sep) => {
            if !valid_grouping(integer.split(sep)) {
                return None;
            }
            integer.replace(sep, "")
        }
        None => integer.to_string(),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let grouped = space_grouped || group_sep.is_some();
    let normalized = if fraction.is_empty() {
        digits
    } else {
        format!("{}.{}", digits, fraction)
    };
    Some((normalized, grouped))
}

fn digit_runs(body: &str) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, b) in body.bytes().enumerate() {
        match (b.is_ascii_digit(), run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = run_start {
        runs.push((s, body.len()));
    }
    runs
}

fn trailing_alpha_run(text: &str) -> &str {
    let start = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphabetic())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[start..]
}

fn leading_alpha_run(text: &str) -> &str {
    let end = text
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..end]
}

fn ends_with_currency_code(text: &str) -> bool {
    CURRENCY_CODES.contains(&trailing_alpha_run(text))
}

/// Currency symbol or ISO code directly before or after the token
fn currency_adjacent(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].trim_end_matches(is_space_separator);
    let after = text[end..].trim_start_matches(is_space_separator);

    before
        .chars()
        .next_back()
        .is_some_and(|c| CURRENCY_SYMBOLS.contains(&c))
        || ends_with_currency_code(before)
        || after
            .chars()
            .next()
            .is_some_and(|c| CURRENCY_SYMBOLS.contains(&c))
        || CURRENCY_CODES.contains(&leading_alpha_run(after))
}
