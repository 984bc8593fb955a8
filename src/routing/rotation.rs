//! Fallback rotation across an ordered candidate pool

use serde::{Deserialize, Serialize};
use std::fmt;

use super::country::is_allowed;
use crate::models::FallbackCandidate;

/// Index of the last candidate shown to a browser, `-1` when none has been
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RotationCursor(pub i64);

impl RotationCursor {
    pub const NONE: RotationCursor = RotationCursor(-1);

    /// Parse a persisted cursor; anything unreadable starts the rotation over
    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .parse::<i64>()
            .map(RotationCursor)
            .unwrap_or(Self::NONE)
    }

    pub fn is_none(&self) -> bool {
        self.0 < 0
    }
}

impl Default for RotationCursor {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for RotationCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one rotation step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation<'a> {
    pub next: Option<&'a FallbackCandidate>,
    pub next_index: RotationCursor,
}

impl Rotation<'static> {
    const EXHAUSTED: Rotation<'static> = Rotation {
        next: None,
        next_index: RotationCursor::NONE,
    };
}

/// Pick the next candidate after `last` that is allowed in `visitor_country`.
///
/// Candidates are stable-sorted by `display_order` first. The scan wraps
/// around the pool once and returns `{ None, -1 }` if nothing is allowed.
pub fn next_candidate<'a>(
    candidates: &'a [FallbackCandidate],
    visitor_country: &str,
    last: RotationCursor,
) -> Rotation<'a> {
    next_candidate_by(candidates, last, |candidate| {
        is_allowed(&candidate.allowed_countries, visitor_country)
    })
}

/// Same scan as [`next_candidate`] with a caller-supplied admission check.
///
/// `admit` is called at most once per candidate.
pub fn next_candidate_by<'a, F>(
    candidates: &'a [FallbackCandidate],
    last: RotationCursor,
    mut admit: F,
) -> Rotation<'a>
where
    F: FnMut(&FallbackCandidate) -> bool,
{
    if candidates.is_empty() {
        return Rotation::EXHAUSTED;
    }

    let mut ordered: Vec<&FallbackCandidate> = candidates.iter().collect();
    ordered.sort_by_key(|c| c.display_order);

    let len = ordered.len() as i64;
    let start = last.0.clamp(-1, len - 1);

    for step in 1..=len {
        let idx = (start + step).rem_euclid(len);
        let candidate = ordered[idx as usize];
        if admit(candidate) {
            return Rotation {
                next: Some(candidate),
                next_index: RotationCursor(idx),
            };
        }
    }

    Rotation::EXHAUSTED
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, countries: &[&str], order: i64) -> FallbackCandidate {
        FallbackCandidate {
            id,
            url: format!("https://example.com/{id}"),
            allowed_countries: countries.iter().map(|c| c.to_string()).collect(),
            display_order: order,
            is_active: true,
            created_at: 0,
        }
    }

    fn scenario_pool() -> Vec<FallbackCandidate> {
        vec![
            candidate(1, &["US"], 0),
            candidate(2, &["worldwide"], 1),
            candidate(3, &["FR"], 2),
        ]
    }

    #[test]
    fn test_empty_pool_is_exhausted() {
        let rotation = next_candidate(&[], "France", RotationCursor(3));
        assert!(rotation.next.is_none());
        assert_eq!(rotation.next_index, RotationCursor::NONE);
    }

    #[test]
    fn test_wildcard_found_before_later_candidates() {
        let pool = scenario_pool();
        let rotation = next_candidate(&pool, "France", RotationCursor::NONE);
        assert_eq!(rotation.next.map(|c| c.id), Some(2));
        assert_eq!(rotation.next_index, RotationCursor(1));
    }

    #[test]
    fn test_wraps_around_to_the_only_allowed_candidate() {
        let pool = scenario_pool();
        let rotation = next_candidate(&pool, "Germany", RotationCursor(1));
        assert_eq!(rotation.next.map(|c| c.id), Some(2));
        assert_eq!(rotation.next_index, RotationCursor(1));
    }

    #[test]
    fn test_single_disallowed_candidate_is_exhausted() {
        let pool = vec![candidate(9, &["US"], 0)];
        let rotation = next_candidate(&pool, "Canada", RotationCursor::NONE);
        assert!(rotation.next.is_none());
        assert_eq!(rotation.next_index, RotationCursor::NONE);
    }

    #[test]
    fn test_full_cycle_visits_every_candidate_in_display_order() {
        // Deliberately out of order on input
        let pool = vec![
            candidate(30, &[], 2),
            candidate(10, &["ALL"], 0),
            candidate(40, &[], 3),
            candidate(20, &[], 1),
        ];

        let mut cursor = RotationCursor::NONE;
        let mut seen = Vec::new();
        for _ in 0..pool.len() {
            let rotation = next_candidate(&pool, "Brazil", cursor);
            seen.push(rotation.next.map(|c| c.id).unwrap());
            cursor = rotation.next_index;
        }
        assert_eq!(seen, vec![10, 20, 30, 40]);

        // Then starts over
        let again = next_candidate(&pool, "Brazil", cursor);
        assert_eq!(again.next.map(|c| c.id), Some(10));
    }

    #[test]
    fn test_sole_allowed_candidate_regardless_of_cursor() {
        let pool = vec![
            candidate(1, &["US"], 0),
            candidate(2, &["Japan"], 1),
            candidate(3, &["US"], 2),
            candidate(4, &["US"], 3),
        ];
        for last in -1..6 {
            let rotation = next_candidate(&pool, "japan", RotationCursor(last));
            assert_eq!(rotation.next.map(|c| c.id), Some(2), "cursor {last}");
            assert_eq!(rotation.next_index, RotationCursor(1));
        }
    }

    #[test]
    fn test_nothing_allowed_regardless_of_cursor() {
        let pool = vec![candidate(1, &["US"], 0), candidate(2, &["Japan"], 1)];
        for last in [-5, -1, 0, 1, 7] {
            let rotation = next_candidate(&pool, "Peru", RotationCursor(last));
            assert_eq!(rotation, Rotation::EXHAUSTED);
        }
    }

    #[test]
    fn test_stale_cursor_is_clamped() {
        let pool = scenario_pool();
        // Clamped to 2, so the scan starts back at index 0
        let rotation = next_candidate(&pool, "US", RotationCursor(42));
        assert_eq!(rotation.next.map(|c| c.id), Some(1));
        assert_eq!(rotation.next_index, RotationCursor(0));

        let rotation = next_candidate(&pool, "US", RotationCursor(-17));
        assert_eq!(rotation.next_index, RotationCursor(0));
    }

    #[test]
    fn test_inspects_each_candidate_at_most_once() {
        let pool: Vec<_> = (0..7).map(|i| candidate(i, &["Nowhere"], i)).collect();
        let mut inspected = 0;
        let rotation = next_candidate_by(&pool, RotationCursor(6), |_| {
            inspected += 1;
            false
        });
        assert!(rotation.next.is_none());
        assert_eq!(inspected, pool.len());
    }

    #[test]
    fn test_does_not_repeat_while_alternatives_exist() {
        let pool = vec![candidate(1, &[], 0), candidate(2, &[], 1)];
        let first = next_candidate(&pool, "Chad", RotationCursor::NONE);
        let second = next_candidate(&pool, "Chad", first.next_index);
        assert_ne!(first.next.map(|c| c.id), second.next.map(|c| c.id));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let pool = vec![candidate(5, &[], 1), candidate(6, &[], 1), candidate(7, &[], 0)];
        let mut cursor = RotationCursor::NONE;
        let mut seen = Vec::new();
        for _ in 0..3 {
            let rotation = next_candidate(&pool, "Chad", cursor);
            seen.push(rotation.next.unwrap().id);
            cursor = rotation.next_index;
        }
        assert_eq!(seen, vec![7, 5, 6]);
    }

    #[test]
    fn test_cursor_parsing() {
        assert_eq!(RotationCursor::parse("3"), RotationCursor(3));
        assert_eq!(RotationCursor::parse(" -1 "), RotationCursor::NONE);
        assert_eq!(RotationCursor::parse("garbage"), RotationCursor::NONE);
        assert_eq!(RotationCursor(12).to_string(), "12");
    }
}
