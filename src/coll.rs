//! COLL case table and setup-scramble generation.
//!
//! Each case maps to the algorithms that solve it. A setup scramble is one of
//! those algorithms, picked at random and inverted: applied to a solved cube
//! it produces the case.
//!
//! Case keys are a set letter plus a number:
//!
//! | Set | OLL shape | Cases |
//! |-----|-----------|-------|
//! | A   | Antisune  | A1-A6 |
//! | B   | H         | B1-B4 |
//! | C   | L         | C1-C6 |
//! | D   | Pi        | D1-D6 |
//! | E   | Sune      | E1-E6 |
//! | F   | T         | F1-F6 |
//! | G   | U         | G1-G6 |

use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::OnceLock;

use crate::error::{CubeCompError, Result};

const BUILTIN_CASES: &[(&str, &[&str])] = &[
    ("A1", &["R U2 R' U' R U' R'", "L' U' L U' L' U2 L"]),
    ("A2", &["R' U' R U' R' U2 R2 U R' U R U2 R'"]),
    ("A3", &["R U2 R' U' R U' R' U' F' R U R' U' R' F R2 U' R'"]),
    ("A4", &["R' U2 R U R' U R2 U' L' U R' U' L"]),
    ("A5", &["R2 D R' U R D' R' U R' U' R U' R'", "F' L F L' U2 L' U2 L"]),
    ("A6", &["R2 D R' U2 R D' R' U2 R'"]),
    ("B1", &["R U2 R' U' R U R' U' R U' R'", "F R U R' U' R U R' U' R U R' U' F'"]),
    ("B2", &["F R U' R' U R U2 R' U' R U R' U' F'"]),
    ("B3", &["R U R' U R U L' U R' U' L"]),
    ("B4", &["R' F' R U2 R U2 R' F U' R U' R'"]),
    ("C1", &["R U2 R2 U' R2 U' R2 U2 R"]),
    ("C2", &["R' U2 R' D' R U2 R' D R2"]),
    ("C3", &["R U2 R D R' U2 R D' R2"]),
    ("C4", &["F R' F' r U R U' r'", "x R' U R D' R' U' R D x'"]),
    ("C5", &["F' r U R' U' r' F R"]),
    ("C6", &["R' U' R U R' F2 R U2 R' U2 R' F2 R2"]),
    ("D1", &["R U2 R2 U' R2 U' R2 U2 R"]),
    ("D2", &["F R U R' U' R U R' U' F'"]),
    ("D3", &["R' F2 R U2 R U2 R' F2 U' R U' R'"]),
    ("D4", &["R U2 R' U' R U R' U2 R' F R F'"]),
    ("D5", &["F U R U' R' U R U' R2 F' R U R U' R'"]),
    ("D6", &["R' F R U F U' R U R' U' F'"]),
    ("E1", &["R U R' U R U2 R'", "L' U2 L U L' U L"]),
    ("E2", &["L' U2 L U2 L F' L' F"]),
    ("E3", &["R U R' U' R' F R2 U R' U' R U R' U' F'"]),
    ("E4", &["R U R' U R' F R F' R U2 R'"]),
    ("E5", &["F R' F' R U2 R U2 R'"]),
    ("E6", &["R U' L' U R' U' L"]),
    ("F1", &["R U R' U R U2 R' U R U2 R D R' U2 R D' R2"]),
    ("F2", &["R' U R U2 L' R' U R U' L"]),
    ("F3", &["F R U R' U' R U' R' U2 R U2 R' F'"]),
    ("F4", &["r U R' U' r' F R F'", "x' R U R' D R U' R' D' x"]),
    ("F5", &["l' U' L U R U' r' F"]),
    ("F6", &["R' F' R U R U' R' F"]),
    ("G1", &["R2 D R' U2 R D' R' U2 R'"]),
    ("G2", &["R2 D' R U2 R' D R U2 R"]),
    ("G3", &["R2 D' R U R' D R U R U' R' U' R"]),
    ("G4", &["F R U' R' U' R U2 R' U' F'"]),
    ("G5", &["R' U' R F R2 D' R U R' D R2 U' F'"]),
    ("G6", &["R' F R U' R' U' R U R' F' R U R' U' R' F R F' R"]),
];

/// Inverts a single move token.
///
/// `R` becomes `R'`, `R'` becomes `R`, and half turns like `R2` are their own
/// inverse. A `2'` suffix is normalised to `2`.
pub fn invert_move(token: &str) -> String {
    if let Some(base) = token.strip_suffix('\'') {
        base.to_string()
    } else if token.ends_with('2') {
        token.to_string()
    } else {
        format!("{token}'")
    }
}

/// Inverts a whitespace-separated move sequence: reverse the order, invert
/// each move.
pub fn invert_algorithm(alg: &str) -> String {
    alg.split_whitespace()
        .rev()
        .map(invert_move)
        .collect::<Vec<_>>()
        .join(" ")
}

/// One named COLL case and its known algorithms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollCase {
    pub key: String,
    pub algorithms: Vec<String>,
}

/// Ordered table of COLL cases.
///
/// Order matters: the weekly rotation walks the table by index.
#[derive(Debug, Clone, Default)]
pub struct CollTable {
    cases: Vec<CollCase>,
}

impl CollTable {
    /// The built-in table, loaded once
    pub fn builtin() -> &'static CollTable {
        static TABLE: OnceLock<CollTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            Self::from_entries(
                BUILTIN_CASES
                    .iter()
                    .map(|(key, algs)| (*key, algs.iter().copied())),
            )
        })
    }

    /// Build a table from `(key, algorithms)` pairs, keeping their order
    pub fn from_entries<K, I, A>(entries: impl IntoIterator<Item = (K, I)>) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let cases = entries
            .into_iter()
            .map(|(key, algs)| CollCase {
                key: key.into(),
                algorithms: algs.into_iter().map(Into::into).collect(),
            })
            .collect();
        Self { cases }
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Case keys in table order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cases.iter().map(|c| c.key.as_str())
    }

    /// Case at a rotation index, wrapping around the end of the table
    pub fn case_at(&self, index: usize) -> Option<&CollCase> {
        if self.cases.is_empty() {
            return None;
        }
        self.cases.get(index % self.cases.len())
    }

    /// Known algorithms for a case key
    pub fn algorithms(&self, key: &str) -> Result<&[String]> {
        self.cases
            .iter()
            .find(|c| c.key.eq_ignore_ascii_case(key))
            .map(|c| c.algorithms.as_slice())
            .ok_or_else(|| CubeCompError::UnknownCase(key.to_string()))
    }

    /// Picks one of the case's algorithms uniformly at random and inverts it.
    ///
    /// Fails with [`CubeCompError::EmptySelection`] when the case has no
    /// algorithms.
    pub fn setup_scramble<R: Rng + ?Sized>(&self, key: &str, rng: &mut R) -> Result<String> {
        let algorithm = self
            .algorithms(key)?
            .choose(rng)
            .ok_or_else(|| CubeCompError::EmptySelection {
                case: key.to_string(),
            })?;
        Ok(invert_algorithm(algorithm))
    }
}

/// Setup scramble for a case of the built-in table
pub fn setup_scramble<R: Rng + ?Sized>(key: &str, rng: &mut R) -> Result<String> {
    CollTable::builtin().setup_scramble(key, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_invert_single_moves() {
        assert_eq!(invert_move("R"), "R'");
        assert_eq!(invert_move("R'"), "R");
        assert_eq!(invert_move("R2"), "R2");
        assert_eq!(invert_move("R2'"), "R2");
        assert_eq!(invert_move("Rw"), "Rw'");
        assert_eq!(invert_move("r'"), "r");
    }

    #[test]
    fn test_invert_sequence_reverses_and_inverts() {
        assert_eq!(invert_algorithm("R U R' U R U2 R'"), "R U2 R' U' R U' R'");
        assert_eq!(invert_algorithm("  F  R U'  "), "U R' F'");
        assert_eq!(invert_algorithm(""), "");
    }

    #[test]
    fn test_builtin_table_shape() {
        let table = CollTable::builtin();
        assert_eq!(table.len(), 40);
        assert!(table.algorithms("B1").is_ok());
        assert!(table.algorithms("d6").is_ok());
        assert_eq!(table.keys().next(), Some("A1"));
        assert!(table.keys().all(|k| !table.algorithms(k).unwrap().is_empty()));
    }

    #[test]
    fn test_case_at_wraps() {
        let table = CollTable::builtin();
        assert_eq!(table.case_at(0).unwrap().key, "A1");
        assert_eq!(table.case_at(40).unwrap().key, "A1");
        assert_eq!(table.case_at(41).unwrap().key, "A2");
        assert!(CollTable::default().case_at(3).is_none());
    }

    #[test]
    fn test_setup_scramble_is_an_inverted_known_algorithm() {
        let table = CollTable::builtin();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let setup = table.setup_scramble("E1", &mut rng).unwrap();
            let solution = invert_algorithm(&setup);
            assert!(table.algorithms("E1").unwrap().contains(&solution));
        }
    }

    #[test]
    fn test_setup_scramble_is_deterministic_for_a_seed() {
        let a = setup_scramble("A1", &mut StdRng::seed_from_u64(42)).unwrap();
        let b = setup_scramble("A1", &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_case_fails_with_empty_selection() {
        let table = CollTable::from_entries([("Z9", Vec::<String>::new())]);
        let err = table
            .setup_scramble("Z9", &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(err, CubeCompError::EmptySelection { ref case } if case == "Z9"));
    }

    #[test]
    fn test_unknown_case() {
        let err = setup_scramble("Q1", &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, CubeCompError::UnknownCase(_)));
    }
}
