//! Deterministic tolerance matching
//!
//! A candidate matches the declared quantity `Q` when
//! `|value - Q| <= max(absolute_tolerance, relative_tolerance * |Q|)`.
//! Pure: the verdict depends only on the declared quantity, the candidates and
//! the matching configuration.

use dqv_common::config::{MatchingConfig, TieBreakPolicy};
use rust_decimal::Decimal;

use crate::models::{DeterministicVerdict, FormatTag, NumericCandidate};

#[derive(Debug, Clone)]
pub struct ToleranceMatcher {
    config: MatchingConfig,
}

impl Default for ToleranceMatcher {
    fn default() -> Self {
        Self::new(MatchingConfig::default())
    }
}

impl ToleranceMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Effective tolerance for a declared quantity
    ///
    /// Saturates at `Decimal::MAX` when the relative term overflows.
    pub fn tolerance_for(&self, declared: Decimal) -> Decimal {
        let relative = self
            .config
            .relative_tolerance
            .checked_mul(declared.abs())
            .unwrap_or(Decimal::MAX);
        self.config.absolute_tolerance.max(relative)
    }

    /// A difference too large to represent is never within tolerance
    fn within(value: Decimal, declared: Decimal, tolerance: Decimal) -> bool {
        value
            .checked_sub(declared)
            .is_some_and(|delta| delta.abs() <= tolerance)
    }

    /// Judge the candidates against the declared quantity
    ///
    /// `labeled_value` is carried into the verdict unchanged; it does not take
    /// part in matching.
    pub fn evaluate(
        &self,
        declared: Decimal,
        candidates: Vec<NumericCandidate>,
        labeled_value: Option<Decimal>,
    ) -> DeterministicVerdict {
        let tolerance = self.tolerance_for(declared);

        let best = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| self.is_eligible(c))
            .filter(|(_, c)| Self::within(c.parsed_value, declared, tolerance))
            .min_by_key(|(index, c)| self.preference(*index, c))
            .map(|(_, c)| c.parsed_value);

        DeterministicVerdict {
            matched: best.is_some(),
            matched_value: best,
            candidates,
            tolerance_used: tolerance,
            labeled_value,
        }
    }

    fn is_eligible(&self, candidate: &NumericCandidate) -> bool {
        !(self.config.exclude_date_like && candidate.format_tag == FormatTag::DateLike)
    }

    /// Sort key among matching candidates; lowest wins
    fn preference(&self, index: usize, candidate: &NumericCandidate) -> (usize, usize) {
        let plain_rank = usize::from(candidate.format_tag != FormatTag::Plain);
        match self.config.tie_break {
            TieBreakPolicy::ReadingOrder => (index, plain_rank),
            TieBreakPolicy::PlainFirst => (plain_rank, index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PositionHint;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn candidate(value: &str, offset: usize, tag: FormatTag) -> NumericCandidate {
        NumericCandidate {
            raw_text: value.to_string(),
            parsed_value: dec(value),
            position_hint: Some(PositionHint { offset, line: 1 }),
            format_tag: tag,
        }
    }

    #[test]
    fn test_exact_match() {
        let verdict = ToleranceMatcher::default().evaluate(
            dec("1234.56"),
            vec![
                candidate("1234.56", 17, FormatTag::Plain),
                candidate("2024", 32, FormatTag::Plain),
            ],
            None,
        );
        assert!(verdict.matched);
        assert_eq!(verdict.matched_value, Some(dec("1234.56")));
        assert_eq!(verdict.tolerance_used, dec("0.01"));
        assert_eq!(verdict.candidates.len(), 2);
    }

    #[test]
    fn test_within_and_outside_absolute_tolerance() {
        let matcher = ToleranceMatcher::default();
        let inside = matcher.evaluate(
            dec("100"),
            vec![candidate("100.01", 0, FormatTag::Plain)],
            None,
        );
        assert!(inside.matched);

        let outside = matcher.evaluate(
            dec("100"),
            vec![candidate("100.02", 0, FormatTag::Plain)],
            None,
        );
        assert!(!outside.matched);
        assert_eq!(outside.matched_value, None);
    }

    #[test]
    fn test_no_match_keeps_candidates() {
        let verdict = ToleranceMatcher::default().evaluate(
            dec("1234.56"),
            vec![candidate("9999.99", 11, FormatTag::Plain)],
            None,
        );
        assert!(!verdict.matched);
        assert_eq!(verdict.candidates.len(), 1);
        assert_eq!(verdict.candidates[0].parsed_value, dec("9999.99"));
    }

    #[test]
    fn test_relative_tolerance_dominates_for_large_quantities() {
        let matcher = ToleranceMatcher::new(MatchingConfig {
            relative_tolerance: dec("0.001"),
            ..MatchingConfig::default()
        });
        assert_eq!(matcher.tolerance_for(dec("50000")), dec("50"));
        assert_eq!(matcher.tolerance_for(dec("-5")), dec("0.01"));

        let verdict = matcher.evaluate(
            dec("50000"),
            vec![candidate("50040", 0, FormatTag::Plain)],
            None,
        );
        assert!(verdict.matched);
    }

    #[test]
    fn test_date_components_excluded_by_default() {
        let candidates = vec![
            candidate("12", 0, FormatTag::DateLike),
            candidate("5", 3, FormatTag::DateLike),
            candidate("2024", 6, FormatTag::DateLike),
        ];
        let verdict = ToleranceMatcher::default().evaluate(dec("2024"), candidates.clone(), None);
        assert!(!verdict.matched);
        assert_eq!(verdict.candidates.len(), 3);

        let including_dates = ToleranceMatcher::new(MatchingConfig {
            exclude_date_like: false,
            ..MatchingConfig::default()
        });
        let verdict = including_dates.evaluate(dec("2024"), candidates, None);
        assert!(verdict.matched);
    }

    #[test]
    fn test_tie_break_policies() {
        let candidates = vec![
            candidate("500.00", 0, FormatTag::CurrencyLike),
            candidate("500.004", 20, FormatTag::Plain),
        ];

        let reading_order = ToleranceMatcher::default().evaluate(dec("500"), candidates.clone(), None);
        assert_eq!(reading_order.matched_value, Some(dec("500.00")));

        let plain_first = ToleranceMatcher::new(MatchingConfig {
            tie_break: TieBreakPolicy::PlainFirst,
            ..MatchingConfig::default()
        });
        let verdict = plain_first.evaluate(dec("500"), candidates, None);
        assert_eq!(verdict.matched_value, Some(dec("500.004")));
    }

    #[test]
    fn test_labeled_value_is_carried_not_matched() {
        let verdict = ToleranceMatcher::default().evaluate(
            dec("10"),
            vec![candidate("12", 0, FormatTag::Plain)],
            Some(dec("10")),
        );
        assert!(!verdict.matched);
        assert_eq!(verdict.labeled_value, Some(dec("10")));
    }

    #[test]
    fn test_empty_candidates_never_match() {
        let verdict = ToleranceMatcher::default().evaluate(dec("0"), Vec::new(), None);
        assert!(!verdict.matched);
        assert!(verdict.candidates.is_empty());
    }

    #[test]
    fn test_extreme_quantities_do_not_overflow() {
        let matcher = ToleranceMatcher::default();

        let verdict = matcher.evaluate(Decimal::MAX, vec![candidate("-1", 9, FormatTag::Plain)], None);
        assert!(!verdict.matched);
        assert_eq!(verdict.candidates.len(), 1);

        let verdict = matcher.evaluate(
            Decimal::MIN,
            vec![
                candidate("1234.56", 0, FormatTag::Plain),
                candidate("-79228162514264337593543950335", 10, FormatTag::Plain),
            ],
            None,
        );
        assert!(verdict.matched);
        assert_eq!(verdict.matched_value, Some(Decimal::MIN));
    }

    #[test]
    fn test_relative_tolerance_saturates() {
        let matcher = ToleranceMatcher::new(MatchingConfig {
            relative_tolerance: dec("2"),
            ..MatchingConfig::default()
        });
        assert_eq!(matcher.tolerance_for(Decimal::MAX), Decimal::MAX);
        assert_eq!(matcher.tolerance_for(dec("10")), dec("20"));

        let verdict = matcher.evaluate(Decimal::MAX, vec![candidate("-1", 0, FormatTag::Plain)], None);
        assert!(!verdict.matched);
    }

    fn any_decimal() -> impl Strategy<Value = Decimal> {
        (any::<u32>(), any::<u32>(), any::<u32>(), any::<bool>(), 0u32..=28)
            .prop_map(|(lo, mid, hi, negative, scale)| Decimal::from_parts(lo, mid, hi, negative, scale))
    }

    fn small_decimal() -> impl Strategy<Value = Decimal> {
        (-1_000_000_000i64..1_000_000_000, 0u32..=4).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
    }

    fn any_tag() -> impl Strategy<Value = FormatTag> {
        prop_oneof![
            Just(FormatTag::Plain),
            Just(FormatTag::ThousandsSeparated),
            Just(FormatTag::CurrencyLike),
            Just(FormatTag::DateLike),
        ]
    }

    fn candidates_from(values: Vec<(Decimal, FormatTag)>) -> Vec<NumericCandidate> {
        values
            .into_iter()
            .enumerate()
            .map(|(i, (value, tag))| NumericCandidate {
                raw_text: value.to_string(),
                parsed_value: value,
                position_hint: Some(PositionHint { offset: i * 10, line: 1 }),
                format_tag: tag,
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_any_quantity_yields_a_verdict(
            declared in any_decimal(),
            values in proptest::collection::vec((any_decimal(), any_tag()), 0..8),
        ) {
            let matcher = ToleranceMatcher::default();
            let candidates = candidates_from(values);

            let first = matcher.evaluate(declared, candidates.clone(), None);
            let second = matcher.evaluate(declared, candidates.clone(), None);

            prop_assert_eq!(&first, &second);
            prop_assert_eq!(&first.candidates, &candidates);
            prop_assert_eq!(first.matched, first.matched_value.is_some());
        }

        #[test]
        fn prop_in_tolerance_candidate_always_matches(
            declared in small_decimal(),
            before in proptest::collection::vec((small_decimal(), any_tag()), 0..6),
            after in proptest::collection::vec((small_decimal(), any_tag()), 0..6),
            step in -100i64..=100,
        ) {
            let matcher = ToleranceMatcher::default();
            let tolerance = matcher.tolerance_for(declared);
            // `step` percent of the tolerance either side of the declared quantity
            let injected = declared + tolerance * Decimal::new(step, 2);

            let mut values = before;
            values.push((injected, FormatTag::Plain));
            values.extend(after);
            let candidates = candidates_from(values);

            let expected = candidates
                .iter()
                .filter(|c| c.format_tag != FormatTag::DateLike)
                .map(|c| c.parsed_value)
                .find(|v| (*v - declared).abs() <= tolerance);

            let verdict = matcher.evaluate(declared, candidates, None);

            prop_assert!(verdict.matched);
            prop_assert!(expected.is_some());
            prop_assert_eq!(verdict.matched_value, expected);
        }
    }
}
