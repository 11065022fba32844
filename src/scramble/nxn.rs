//! Random-move scramblers for cube puzzles (2x2 through 7x7) and the 3x3
//! subset events (2GEN, LSE, F2L, FMC, blindfolded).
//!
//! A move never repeats a layer already turned since the last axis change,
//! so `R L R` and `R R'` never appear, and at most two moves in a row share
//! an axis.

use rand::Rng;
use rand::seq::SliceRandom;

use super::SUFFIXES;

/// One turnable layer: which axis it turns on and how it is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layer {
    axis: u8,
    notation: &'static str,
}

const fn layer(axis: u8, notation: &'static str) -> Layer {
    Layer { axis, notation }
}

const FACES_2X2: &[Layer] = &[layer(0, "R"), layer(1, "U"), layer(2, "F")];

const FACES_3X3: &[Layer] = &[
    layer(0, "R"),
    layer(0, "L"),
    layer(1, "U"),
    layer(1, "D"),
    layer(2, "F"),
    layer(2, "B"),
];

const FACES_BIG: &[Layer] = &[
    layer(0, "R"),
    layer(0, "L"),
    layer(0, "Rw"),
    layer(1, "U"),
    layer(1, "D"),
    layer(1, "Uw"),
    layer(2, "F"),
    layer(2, "B"),
    layer(2, "Fw"),
];

const FACES_HUGE: &[Layer] = &[
    layer(0, "R"),
    layer(0, "L"),
    layer(0, "Rw"),
    layer(0, "Lw"),
    layer(0, "3Rw"),
    layer(1, "U"),
    layer(1, "D"),
    layer(1, "Uw"),
    layer(1, "Dw"),
    layer(1, "3Uw"),
    layer(2, "F"),
    layer(2, "B"),
    layer(2, "Fw"),
    layer(2, "Bw"),
    layer(2, "3Fw"),
];

const FACES_2GEN: &[Layer] = &[layer(0, "R"), layer(1, "U")];

/// Longest run of consecutive moves on one axis
const MAX_AXIS_RUN: usize = 2;

/// Axis-aware random move sequence over a fixed layer set
fn random_moves<R: Rng + ?Sized>(rng: &mut R, layers: &[Layer], length: usize) -> Vec<Layer> {
    let mut moves = Vec::with_capacity(length);
    let mut current_axis: Option<u8> = None;
    let mut used_on_axis: Vec<&'static str> = Vec::new();

    while moves.len() < length {
        let Some(&candidate) = layers.choose(rng) else {
            break;
        };
        if current_axis == Some(candidate.axis) {
            if used_on_axis.len() >= MAX_AXIS_RUN || used_on_axis.contains(&candidate.notation) {
                continue;
            }
            used_on_axis.push(candidate.notation);
        } else {
            current_axis = Some(candidate.axis);
            used_on_axis.clear();
            used_on_axis.push(candidate.notation);
        }
        moves.push(candidate);
    }
    moves
}

fn render<R: Rng + ?Sized>(rng: &mut R, moves: &[Layer]) -> String {
    moves
        .iter()
        .map(|m| {
            let suffix = SUFFIXES.choose(rng).copied().unwrap_or("");
            format!("{}{}", m.notation, suffix)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Random-move scramble for an NxN cube.
///
/// Sizes outside 2..=7 are clamped into range.
pub fn cube<R: Rng + ?Sized>(rng: &mut R, size: u8) -> String {
    let (layers, length) = match size.clamp(2, 7) {
        2 => (FACES_2X2, 11),
        3 => (FACES_3X3, 20),
        4 => (FACES_BIG, 44),
        5 => (FACES_BIG, 60),
        6 => (FACES_HUGE, 80),
        _ => (FACES_HUGE, 100),
    };
    let moves = random_moves(rng, layers, length);
    render(rng, &moves)
}

/// `<R, U>` scramble
pub fn two_gen<R: Rng + ?Sized>(rng: &mut R) -> String {
    let moves = random_moves(rng, FACES_2GEN, 25);
    render(rng, &moves)
}

/// `<M, U>` scramble; the two layers simply alternate
pub fn last_six_edges<R: Rng + ?Sized>(rng: &mut R) -> String {
    let start = rng.gen_bool(0.5);
    (0..20)
        .map(|i| {
            let face = if (i % 2 == 0) == start { "M" } else { "U" };
            let suffix = SUFFIXES.choose(rng).copied().unwrap_or("");
            format!("{face}{suffix}")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scramble that leaves the cross solved.
///
/// Built from conjugates `X U* X'` of side faces, which never disturb the
/// D-layer edges.
pub fn first_two_layers<R: Rng + ?Sized>(rng: &mut R) -> String {
    const SIDES: &[&str] = &["R", "R'", "L", "L'", "F", "F'", "B", "B'"];
    let mut parts = Vec::with_capacity(9);
    let mut last_side = "";
    while parts.len() < 8 {
        let Some(&side) = SIDES.choose(rng) else {
            break;
        };
        if side == last_side {
            continue;
        }
        last_side = side;
        let turn = SUFFIXES.choose(rng).copied().unwrap_or("");
        parts.push(format!(
            "{side} U{turn} {}",
            crate::coll::invert_move(side)
        ));
    }
    let auf = SUFFIXES.choose(rng).copied().unwrap_or("");
    parts.push(format!("U{auf}"));
    parts.join(" ")
}

/// FMC scramble: a 3x3 scramble wrapped in `R' U' F` on both ends
pub fn fewest_moves<R: Rng + ?Sized>(rng: &mut R) -> String {
    const PADDING: &str = "R' U' F";
    loop {
        let moves = random_moves(rng, FACES_3X3, 20);
        let (Some(first), Some(last)) = (moves.first(), moves.last()) else {
            continue;
        };
        // F axis cannot follow the leading F; R axis cannot precede the trailing R'
        if first.axis == 2 || last.axis == 0 {
            continue;
        }
        return format!("{PADDING} {} {PADDING}", render(rng, &moves));
    }
}

/// Blindfolded scramble: a cube scramble plus a random orientation
pub fn blindfolded<R: Rng + ?Sized>(rng: &mut R, size: u8) -> String {
    let mut scramble = cube(rng, size);
    let mut orientation = Vec::with_capacity(2);
    for wide in ["Rw", "Uw"] {
        if rng.gen_bool(0.5) {
            let suffix = SUFFIXES.choose(rng).copied().unwrap_or("");
            orientation.push(format!("{wide}{suffix}"));
        }
    }
    if !orientation.is_empty() {
        scramble.push(' ');
        scramble.push_str(&orientation.join(" "));
    }
    scramble
}
