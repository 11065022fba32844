//! Scramble generation for every competition event.
//!
//! All scramblers take the RNG by reference so a seeded RNG reproduces a
//! whole competition's scrambles.

pub mod nxn;
pub mod puzzles;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::coll::CollTable;
use crate::error::{CubeCompError, Result};
use crate::types::Event;

/// Turn suffixes: clockwise, counter-clockwise, half turn
pub(crate) const SUFFIXES: &[&str] = &["", "'", "2"];

/// Generates a single scramble for `event`.
///
/// `coll_case` is required for [`Event::Coll`] and ignored otherwise.
pub fn scramble_event<R: Rng + ?Sized>(
    event: Event,
    rng: &mut R,
    coll_table: &CollTable,
    coll_case: Option<&str>,
) -> Result<String> {
    let scramble = match event {
        Event::TwoByTwo => nxn::cube(rng, 2),
        Event::ThreeByThree | Event::OneHanded => nxn::cube(rng, 3),
        Event::FourByFour => nxn::cube(rng, 4),
        Event::FiveByFive => nxn::cube(rng, 5),
        Event::SixBySix => nxn::cube(rng, 6),
        Event::SevenBySeven => nxn::cube(rng, 7),
        Event::ThreeBld => nxn::blindfolded(rng, 3),
        Event::FourBld => nxn::blindfolded(rng, 4),
        Event::FiveBld => nxn::blindfolded(rng, 5),
        Event::TwoGen => nxn::two_gen(rng),
        Event::Lse => nxn::last_six_edges(rng),
        Event::F2l => nxn::first_two_layers(rng),
        Event::Fmc => nxn::fewest_moves(rng),
        Event::Pyraminx => puzzles::pyraminx(rng),
        Event::Megaminx => puzzles::megaminx(rng),
        Event::Kilominx => puzzles::kilominx(rng),
        Event::Skewb => puzzles::skewb(rng),
        Event::Square1 => puzzles::square_one(rng),
        Event::Clock => puzzles::clock(rng),
        Event::RelayOfThree => relay(rng, &[3, 3, 3]),
        Event::Relay234 => relay(rng, &[2, 3, 4]),
        Event::Coll => {
            let case = coll_case
                .ok_or_else(|| CubeCompError::state("no COLL case selected for this competition"))?;
            let setup = coll_table.setup_scramble(case, rng)?;
            // random pre-AUF so the five scrambles don't all look alike
            match ["", "U", "U'", "U2"].choose(rng).copied().unwrap_or("") {
                "" => setup,
                auf => format!("{setup} {auf}"),
            }
        }
    };
    Ok(scramble)
}

/// One scramble per solve of `event`
pub fn scrambles_for<R: Rng + ?Sized>(
    event: Event,
    rng: &mut R,
    coll_table: &CollTable,
    coll_case: Option<&str>,
) -> Result<Vec<String>> {
    (0..event.solve_count())
        .map(|_| scramble_event(event, rng, coll_table, coll_case))
        .collect()
}

/// Numbered cube scrambles on separate lines, solved back to back
fn relay<R: Rng + ?Sized>(rng: &mut R, sizes: &[u8]) -> String {
    sizes
        .iter()
        .map(|&size| format!("{size}x{size}: {}", nxn::cube(rng, size)))
        .collect::<Vec<_>>()
        .join("\n")
}
