//! Property-based tests for cubecomp
//!
//! These tests verify:
//! - Move and algorithm inversion invariants
//! - Event name round-trips
//! - Time parsing and aggregation invariants
//! - Rotation state invariants
//! - Sidebar block replacement

use proptest::prelude::*;

// =============================================================================
// Inversion Property Tests
// =============================================================================

use cubecomp::coll::{invert_algorithm, invert_move};

/// Strategy for generating single move tokens in outer-block notation
fn move_strategy() -> impl Strategy<Value = String> {
    let faces = prop_oneof![
        Just("R"),
        Just("U"),
        Just("F"),
        Just("L"),
        Just("D"),
        Just("B"),
        Just("M"),
        Just("r"),
        Just("Rw"),
        Just("x"),
    ];
    let suffixes = prop_oneof![Just(""), Just("'"), Just("2")];
    (faces, suffixes).prop_map(|(f, s)| format!("{f}{s}"))
}

fn algorithm_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(move_strategy(), 1..25).prop_map(|moves| moves.join(" "))
}

proptest! {
    /// Inverting twice gives the original algorithm back
    #[test]
    fn inversion_is_an_involution(alg in algorithm_strategy()) {
        prop_assert_eq!(invert_algorithm(&invert_algorithm(&alg)), alg);
    }

    /// The inverse has the same number of moves, in reverse order
    #[test]
    fn inversion_reverses_order(alg in algorithm_strategy()) {
        let inverted = invert_algorithm(&alg);
        let original: Vec<&str> = alg.split_whitespace().collect();
        let reversed: Vec<&str> = inverted.split_whitespace().collect();
        prop_assert_eq!(original.len(), reversed.len());
        for (a, b) in original.iter().zip(reversed.iter().rev()) {
            prop_assert_eq!(invert_move(a), b.to_string());
        }
    }

    /// Half turns are self-inverse; quarter turns flip direction
    #[test]
    fn single_move_inverse(token in move_strategy()) {
        let inverse = invert_move(&token);
        if token.ends_with('2') {
            prop_assert_eq!(&inverse, &token);
        } else {
            prop_assert_ne!(&inverse, &token);
        }
        prop_assert_eq!(invert_move(&inverse), token);
    }
}

// =============================================================================
// Event Property Tests
// =============================================================================

use cubecomp::types::Event;
use strum::IntoEnumIterator;

fn event_strategy() -> impl Strategy<Value = Event> {
    prop::sample::select(Event::iter().collect::<Vec<_>>())
}

proptest! {
    /// Event: to_string -> parse round-trip is identity, in any letter case
    #[test]
    fn event_roundtrip(event in event_strategy(), upper in any::<bool>()) {
        let name = if upper {
            event.to_string().to_uppercase()
        } else {
            event.to_string().to_lowercase()
        };
        let parsed: Event = name.parse().expect("Should parse");
        prop_assert_eq!(event, parsed);
    }

    /// Every event has at least one solve and a stable code
    #[test]
    fn event_code_is_lowercase(event in event_strategy()) {
        prop_assert!(event.solve_count() >= 1);
        let code = event.code();
        prop_assert_eq!(code.clone(), code.to_lowercase());
        prop_assert!(!code.contains(' '));
    }
}

// =============================================================================
// Scoring Property Tests
// =============================================================================

use cubecomp::scoring::{Attempt, Outcome, aggregate, format_hundredths};
use cubecomp::types::EventFormat;

proptest! {
    /// Formatting then parsing a time gives the same hundredths
    #[test]
    fn time_format_roundtrip(hundredths in 1u32..=360_000) {
        let text = format_hundredths(hundredths);
        let parsed = Attempt::parse(&text, Event::ThreeByThree).expect("Should parse");
        prop_assert_eq!(parsed, Attempt::Value(hundredths));
    }

    /// An Ao5 with successful solves lies between its best and worst solve
    #[test]
    fn ao5_is_bounded(values in prop::collection::vec(1u32..100_000, 5)) {
        let attempts: Vec<Attempt> = values.iter().map(|v| Attempt::Value(*v)).collect();
        let min = *values.iter().min().unwrap();
        let max = *values.iter().max().unwrap();
        match aggregate(EventFormat::Ao5, &attempts).unwrap() {
            Outcome::Value(avg) => {
                prop_assert!(avg >= min);
                prop_assert!(avg <= max);
            }
            Outcome::Dnf => prop_assert!(false, "all-success Ao5 must not be DNF"),
        }
    }

    /// Two or more failed solves always DNF an Ao5
    #[test]
    fn ao5_two_failures_dnf(
        values in prop::collection::vec(1u32..100_000, 3),
        first in 0usize..5,
        second in 0usize..5,
    ) {
        prop_assume!(first != second);
        let mut attempts = vec![Attempt::Dnf; 5];
        let mut remaining = values.into_iter();
        for (i, slot) in attempts.iter_mut().enumerate() {
            if i != first && i != second {
                *slot = Attempt::Value(remaining.next().unwrap());
            }
        }
        prop_assert_eq!(aggregate(EventFormat::Ao5, &attempts).unwrap(), Outcome::Dnf);
    }

    /// Best of 3 picks the smallest successful solve
    #[test]
    fn bo3_is_minimum(values in prop::collection::vec(1u32..100_000, 3)) {
        let attempts: Vec<Attempt> = values.iter().map(|v| Attempt::Value(*v)).collect();
        let min = *values.iter().min().unwrap();
        prop_assert_eq!(aggregate(EventFormat::Bo3, &attempts).unwrap(), Outcome::Value(min));
    }
}

// =============================================================================
// Cycle State Property Tests
// =============================================================================

use cubecomp::cycle_state::{CycleState, RotationSizes};

fn sizes_strategy() -> impl Strategy<Value = RotationSizes> {
    (1usize..10, 2usize..10, 1usize..50).prop_map(|(weekly, bonus, coll)| RotationSizes {
        weekly,
        bonus,
        coll,
    })
}

proptest! {
    /// Indices stay inside their pools, bonus events differ, numbers count up
    #[test]
    fn rotation_invariants(sizes in sizes_strategy(), rounds in 1usize..30) {
        let mut state = CycleState::default();
        for round in 0..rounds {
            let next = state.advance(sizes, round as u64).unwrap();
            prop_assert_eq!(next.competition_number, state.competition_number + 1);
            prop_assert!(next.weekly_event < sizes.weekly);
            prop_assert!(next.bonus_event_a < sizes.bonus);
            prop_assert!(next.bonus_event_b < sizes.bonus);
            prop_assert_ne!(next.bonus_event_a, next.bonus_event_b);
            prop_assert!(next.coll_index < sizes.coll);
            state = next.with_post(format!("post{round}"));
        }
    }
}

// =============================================================================
// Sidebar Property Tests
// =============================================================================

use cubecomp::sidebar::{BLOCK_END, BLOCK_START, SidebarInfo, update_sidebar};

/// Moderator text, optionally with a single stray marker spliced in
fn moderator_text() -> impl Strategy<Value = String> {
    let stray = prop_oneof![Just(""), Just(BLOCK_START), Just(BLOCK_END)];
    ("[a-zA-Z0-9 .,\n]{0,80}", stray, any::<prop::sample::Index>()).prop_map(
        |(text, marker, at)| {
            let at = at.index(text.len() + 1);
            format!("{}{}{}", &text[..at], marker, &text[at..])
        },
    )
}

proptest! {
    /// Moderator text around the block survives any number of updates
    #[test]
    fn sidebar_keeps_surrounding_text(
        before in moderator_text(),
        number in 1u32..500,
    ) {
        let info = SidebarInfo {
            competition_number: number,
            post_url: None,
            weekly: Event::Lse,
            bonus: (Event::Kilominx, Event::Clock),
            coll_case: None,
        };
        let once = update_sidebar(&before, &info);
        let twice = update_sidebar(&once, &info);
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(
            once.matches(BLOCK_START).count(),
            before.matches(BLOCK_START).count() + 1
        );
        prop_assert_eq!(
            once.matches(BLOCK_END).count(),
            before.matches(BLOCK_END).count() + 1
        );
        prop_assert!(once.starts_with(before.trim_end()));
    }
}
