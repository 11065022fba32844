//! Scramblers for the non-cube puzzles: Pyraminx, Skewb, Megaminx,
//! Kilominx, Square-1 and Clock.

use rand::Rng;
use rand::seq::SliceRandom;

/// Picks `length` faces so that no face follows itself
fn no_repeat<R: Rng + ?Sized>(rng: &mut R, faces: &[&'static str], length: usize) -> Vec<&'static str> {
    let mut moves: Vec<&'static str> = Vec::with_capacity(length);
    while moves.len() < length {
        let Some(&face) = faces.choose(rng) else {
            break;
        };
        if moves.last() == Some(&face) {
            continue;
        }
        moves.push(face);
    }
    moves
}

fn with_direction<R: Rng + ?Sized>(rng: &mut R, face: &str) -> String {
    if rng.gen_bool(0.5) {
        face.to_string()
    } else {
        format!("{face}'")
    }
}

/// 11 face turns plus up to four tip turns
pub fn pyraminx<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut tokens: Vec<String> = no_repeat(rng, &["U", "L", "R", "B"], 11)
        .into_iter()
        .map(|face| with_direction(rng, face))
        .collect();
    for tip in ["u", "l", "r", "b"] {
        match rng.gen_range(0..3) {
            0 => {}
            1 => tokens.push(tip.to_string()),
            _ => tokens.push(format!("{tip}'")),
        }
    }
    tokens.join(" ")
}

pub fn skewb<R: Rng + ?Sized>(rng: &mut R) -> String {
    no_repeat(rng, &["R", "U", "L", "B"], 9)
        .into_iter()
        .map(|face| with_direction(rng, face))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pochmann-style lines: alternating `R±±`/`D±±`, each line closed by `U` or `U'`
fn minx_lines<R: Rng + ?Sized>(rng: &mut R, lines: usize, turns_per_line: usize) -> String {
    (0..lines)
        .map(|_| {
            let mut line: Vec<String> = (0..turns_per_line)
                .map(|i| {
                    let face = if i % 2 == 0 { "R" } else { "D" };
                    let dir = if rng.gen_bool(0.5) { "++" } else { "--" };
                    format!("{face}{dir}")
                })
                .collect();
            line.push(if rng.gen_bool(0.5) { "U".to_string() } else { "U'".to_string() });
            line.join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn megaminx<R: Rng + ?Sized>(rng: &mut R) -> String {
    minx_lines(rng, 7, 10)
}

pub fn kilominx<R: Rng + ?Sized>(rng: &mut R) -> String {
    minx_lines(rng, 4, 10)
}

/// A Square-1 layer as twelve 30° slots; a corner fills two adjacent slots
/// with the same piece id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sq1Layer([u8; 12]);

impl Sq1Layer {
    fn solved(first_piece: u8) -> Self {
        let mut slots = [0u8; 12];
        let mut piece = first_piece;
        let mut i = 0;
        // corner, corner, edge repeated: cuts land on 0 and 6
        while i < 12 {
            slots[i] = piece;
            slots[i + 1] = piece;
            piece += 1;
            slots[i + 2] = piece;
            piece += 1;
            i += 3;
        }
        Self(slots)
    }

    fn twisted(&self, amount: i32) -> Self {
        let mut slots = self.0;
        slots.rotate_left(amount.rem_euclid(12) as usize);
        Self(slots)
    }

    /// The slice is only possible if no corner straddles either cut
    fn can_slice(&self) -> bool {
        self.0[11] != self.0[0] && self.0[5] != self.0[6]
    }
}

/// Random-move Square-1 scramble that tracks layer shapes, so every `/` is
/// a legal slice.
pub fn square_one<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut top = Sq1Layer::solved(0);
    let mut bottom = Sq1Layer::solved(100);
    let mut tuples = Vec::with_capacity(12);

    while tuples.len() < 12 {
        let up = rng.gen_range(-5..=6);
        let down = rng.gen_range(-5..=6);
        if up == 0 && down == 0 {
            continue;
        }
        let next_top = top.twisted(up);
        let next_bottom = bottom.twisted(down);
        if !next_top.can_slice() || !next_bottom.can_slice() {
            continue;
        }
        top = next_top;
        bottom = next_bottom;
        let mut upper = [0u8; 6];
        upper.copy_from_slice(&top.0[6..12]);
        top.0[6..12].copy_from_slice(&bottom.0[6..12]);
        bottom.0[6..12].copy_from_slice(&upper);
        tuples.push(format!("({up},{down}) /"));
    }
    tuples.join(" ")
}

fn clock_turn(amount: i32) -> String {
    if amount >= 0 {
        format!("{amount}+")
    } else {
        format!("{}-", -amount)
    }
}

/// WCA clock notation: front pin setups, `y2`, back pin setups, final pins
pub fn clock<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut tokens = Vec::with_capacity(20);
    for pins in ["UR", "DR", "DL", "UL", "U", "R", "D", "L", "ALL"] {
        tokens.push(format!("{pins}{}", clock_turn(rng.gen_range(-5..=6))));
    }
    tokens.push("y2".to_string());
    for pins in ["U", "R", "D", "L", "ALL"] {
        tokens.push(format!("{pins}{}", clock_turn(rng.gen_range(-5..=6))));
    }
    for pin in ["UR", "DR", "DL", "UL"] {
        if rng.gen_bool(0.5) {
            tokens.push(pin.to_string());
        }
    }
    tokens.join(" ")
}
