//! Alignment of scored microenvironment pairs.
//!
//! All three strategies filter to entries at or below the score cutoff
//! (scores are normalized; negative is better) and emit a one-to-one
//! selection. Ties in `greedy`/`onlybest` break by insertion order,
//! which is the pair order yielded by iterating fileA x fileB.

use std::collections::{HashMap, HashSet};

use pathfinding::kuhn_munkres::kuhn_munkres_min;
use pathfinding::matrix::Matrix;

use pocketfeature_core::{PocketError, Result};
use pocketfeature_io::matrixvalues::{Indexer, MatrixValues};

/// Alignment strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentMethod {
    /// Mutual-best pairs only
    OnlyBest,
    /// Best-score-first greedy selection
    Greedy,
    /// Hungarian assignment over the dense cost matrix
    Munkres,
}

impl AlignmentMethod {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "onlybest" => Ok(Self::OnlyBest),
            "greedy" => Ok(Self::Greedy),
            "munkres" => Ok(Self::Munkres),
            other => Err(PocketError::input(format!(
                "unknown alignment method: {other}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OnlyBest => "onlybest",
            Self::Greedy => "greedy",
            Self::Munkres => "munkres",
        }
    }
}

/// A one-to-one selection of scored pairs.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Accepted pairs and their normalized scores, in selection order
    pub matrix: MatrixValues,
}

impl Alignment {
    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    /// Total alignment score (sum of selected scores)
    pub fn total(&self) -> f64 {
        self.matrix.total()
    }

    /// Selected `(nameA, nameB)` pairs in order
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.matrix
            .iter()
            .filter(|(k, _)| k.len() == 2)
            .map(|(k, _)| (k[0].clone(), k[1].clone()))
            .collect()
    }
}

type Entry = ((String, String), f64);

/// Align a scalar score matrix under a cutoff.
pub fn align(scores: &MatrixValues, cutoff: f64, method: AlignmentMethod) -> Result<Alignment> {
    let filtered = filter_scores(scores, cutoff)?;
    let accepted = match method {
        AlignmentMethod::Greedy => greedy_align(&filtered),
        AlignmentMethod::OnlyBest => only_best_align(&filtered),
        AlignmentMethod::Munkres => munkres_align(&filtered),
    };
    let matrix = MatrixValues::from_entries(
        accepted
            .into_iter()
            .map(|((a, b), score)| (vec![a, b], vec![score])),
        &[],
    );
    Ok(Alignment { matrix })
}

/// Keep entries with `score <= cutoff`, preserving insertion order.
fn filter_scores(scores: &MatrixValues, cutoff: f64) -> Result<Vec<Entry>> {
    let mut filtered = Vec::new();
    for (key, values) in scores.iter() {
        if key.len() != 2 {
            return Err(PocketError::internal(format!(
                "expected 2-dimensional score keys, got {}",
                key.len()
            )));
        }
        let score = values.first().copied().unwrap_or(f64::INFINITY);
        if score <= cutoff {
            filtered.push(((key[0].clone(), key[1].clone()), score));
        }
    }
    Ok(filtered)
}

/// Best-score-first greedy selection.
fn greedy_align(entries: &[Entry]) -> Vec<Entry> {
    let mut ordered: Vec<&Entry> = entries.iter().collect();
    // stable sort: ties keep insertion order
    ordered.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let mut chosen_a: HashSet<&str> = HashSet::new();
    let mut chosen_b: HashSet<&str> = HashSet::new();
    let mut accepted = Vec::new();
    for ((a, b), score) in ordered {
        if chosen_a.contains(a.as_str()) || chosen_b.contains(b.as_str()) {
            continue;
        }
        chosen_a.insert(a);
        chosen_b.insert(b);
        accepted.push(((a.clone(), b.clone()), *score));
    }
    accepted
}

/// Mutual-best selection: a pair is kept iff it is the best entry for
/// both of its endpoints. Strict comparison means the first of equal
/// scores wins, so ties break by insertion order.
fn only_best_align(entries: &[Entry]) -> Vec<Entry> {
    let mut order_a: Vec<&str> = Vec::new();
    let mut best_a: HashMap<&str, (&str, f64)> = HashMap::new();
    let mut best_b: HashMap<&str, (&str, f64)> = HashMap::new();
    for ((a, b), score) in entries {
        let better_a = match best_a.get(a.as_str()) {
            Some((_, best)) => *score < *best,
            None => {
                order_a.push(a);
                true
            }
        };
        if better_a {
            best_a.insert(a, (b, *score));
        }
        let better_b = match best_b.get(b.as_str()) {
            Some((_, best)) => *score < *best,
            None => true,
        };
        if better_b {
            best_b.insert(b, (a, *score));
        }
    }

    let mut accepted: Vec<Entry> = Vec::new();
    for a in order_a {
        let Some(&(b, score)) = best_a.get(a) else {
            continue;
        };
        if best_b.get(b).is_some_and(|&(back, _)| back == a) {
            accepted.push(((a.to_string(), b.to_string()), score));
        }
    }
    // order the aligned points by score
    accepted.sort_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(std::cmp::Ordering::Equal));
    accepted
}

/// Costs are scaled to integer micro-units for the assignment solver
const COST_SCALE: f64 = 1e6;
/// Cost for missing entries; large enough to never be chosen over a
/// real pair, small enough that row sums cannot overflow
const MISSING_COST: i64 = 1_000_000_000_000;

/// Hungarian assignment over the dense cost matrix.
///
/// Missing entries cost effectively +inf so the solver picks real
/// pairs; assignments that still land on a missing entry are dropped
/// afterwards, as are (already filtered) pairs above the cutoff.
fn munkres_align(entries: &[Entry]) -> Vec<Entry> {
    if entries.is_empty() {
        return Vec::new();
    }
    let mut rows = Indexer::new();
    let mut cols = Indexer::new();
    let mut present: HashMap<(usize, usize), f64> = HashMap::new();
    let mut minimum = f64::INFINITY;
    for ((a, b), score) in entries {
        let r = rows.add(a);
        let c = cols.add(b);
        present.insert((r, c), *score);
        minimum = minimum.min(*score);
    }

    // rows <= columns, transposing if needed
    let transposed = rows.len() > cols.len();
    let (n_rows, n_cols) = if transposed {
        (cols.len(), rows.len())
    } else {
        (rows.len(), cols.len())
    };

    // shift by the matrix minimum so all real costs are >= 0
    let cost_of = |r: usize, c: usize| -> i64 {
        let key = if transposed { (c, r) } else { (r, c) };
        match present.get(&key) {
            Some(score) => ((score - minimum) * COST_SCALE).round() as i64,
            None => MISSING_COST,
        }
    };
    let weights: Vec<Vec<i64>> = (0..n_rows)
        .map(|r| (0..n_cols).map(|c| cost_of(r, c)).collect())
        .collect();
    let matrix = match Matrix::from_rows(weights) {
        Ok(matrix) => matrix,
        Err(_) => return Vec::new(),
    };
    let (_, assignment) = kuhn_munkres_min(&matrix);

    let mut accepted = Vec::new();
    for (r, c) in assignment.iter().enumerate() {
        let (row_id, col_id) = if transposed { (*c, r) } else { (r, *c) };
        if let Some(score) = present.get(&(row_id, col_id)) {
            let a = rows.key(row_id).expect("row key").to_string();
            let b = cols.key(col_id).expect("column key").to_string();
            accepted.push(((a, b), *score));
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(entries: &[((&str, &str), f64)]) -> MatrixValues {
        MatrixValues::from_entries(
            entries
                .iter()
                .map(|((a, b), v)| (vec![a.to_string(), b.to_string()], vec![*v])),
            &[],
        )
    }

    fn pairs(alignment: &Alignment) -> Vec<(String, String)> {
        alignment.pairs()
    }

    fn one_to_one(alignment: &Alignment) {
        let mut seen_a = HashSet::new();
        let mut seen_b = HashSet::new();
        for (a, b) in alignment.pairs() {
            assert!(seen_a.insert(a), "left endpoint selected twice");
            assert!(seen_b.insert(b), "right endpoint selected twice");
        }
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let scores = matrix(&[(("a", "x"), -0.15), (("b", "y"), -0.1499)]);
        for method in [
            AlignmentMethod::Greedy,
            AlignmentMethod::OnlyBest,
            AlignmentMethod::Munkres,
        ] {
            let alignment = align(&scores, -0.15, method).unwrap();
            assert_eq!(
                pairs(&alignment),
                vec![("a".to_string(), "x".to_string())],
                "{method:?}"
            );
        }
    }

    #[test]
    fn test_greedy_prefers_best_scores() {
        let scores = matrix(&[
            (("a", "x"), -0.3),
            (("a", "y"), -0.9),
            (("b", "x"), -0.8),
            (("b", "y"), -0.5),
        ]);
        let alignment = align(&scores, -0.15, AlignmentMethod::Greedy).unwrap();
        assert_eq!(
            pairs(&alignment),
            vec![
                ("a".to_string(), "y".to_string()),
                ("b".to_string(), "x".to_string()),
            ]
        );
        one_to_one(&alignment);
        assert!((alignment.total() - (-1.7)).abs() < 1e-12);
    }

    #[test]
    fn test_greedy_tie_breaks_by_insertion_order() {
        let scores = matrix(&[(("a", "x"), -0.5), (("b", "x"), -0.5)]);
        let alignment = align(&scores, 0.0, AlignmentMethod::Greedy).unwrap();
        assert_eq!(pairs(&alignment), vec![("a".to_string(), "x".to_string())]);
    }

    #[test]
    fn test_only_best_requires_mutual_best() {
        // y's best is a, but a's best is x: (a, y) must not be selected
        let scores = matrix(&[
            (("a", "x"), -0.9),
            (("a", "y"), -0.6),
            (("b", "y"), -0.5),
        ]);
        let alignment = align(&scores, -0.15, AlignmentMethod::OnlyBest).unwrap();
        assert_eq!(pairs(&alignment), vec![("a".to_string(), "x".to_string())]);
        one_to_one(&alignment);
    }

    #[test]
    fn test_only_best_selects_disjoint_mutual_pairs() {
        let scores = matrix(&[
            (("a", "x"), -0.9),
            (("a", "y"), -0.2),
            (("b", "x"), -0.3),
            (("b", "y"), -0.7),
        ]);
        let alignment = align(&scores, -0.15, AlignmentMethod::OnlyBest).unwrap();
        // ordered by score
        assert_eq!(
            pairs(&alignment),
            vec![
                ("a".to_string(), "x".to_string()),
                ("b".to_string(), "y".to_string()),
            ]
        );
    }

    #[test]
    fn test_munkres_finds_optimal_assignment() {
        // greedy picks (a,x) then is stuck with (b,y): total -1.0
        // optimal is (a,y)+(b,x): total -1.4
        let scores = matrix(&[
            (("a", "x"), -0.8),
            (("a", "y"), -0.7),
            (("b", "x"), -0.7),
            (("b", "y"), -0.2),
        ]);
        let munkres = align(&scores, -0.15, AlignmentMethod::Munkres).unwrap();
        let greedy = align(&scores, -0.15, AlignmentMethod::Greedy).unwrap();
        let onlybest = align(&scores, -0.15, AlignmentMethod::OnlyBest).unwrap();
        one_to_one(&munkres);
        assert!((munkres.total() - (-1.4)).abs() < 1e-9);
        assert!(munkres.total() <= greedy.total() + 1e-9);
        assert!(munkres.total() <= onlybest.total() + 1e-9);
    }

    #[test]
    fn test_munkres_rectangular_and_missing() {
        // more left names than right: forces a transpose internally
        let scores = matrix(&[
            (("a", "x"), -0.5),
            (("b", "x"), -0.6),
            (("c", "x"), -0.7),
        ]);
        let alignment = align(&scores, -0.15, AlignmentMethod::Munkres).unwrap();
        assert_eq!(alignment.len(), 1);
        assert_eq!(pairs(&alignment), vec![("c".to_string(), "x".to_string())]);
    }

    #[test]
    fn test_empty_filter_yields_empty_alignment() {
        let scores = matrix(&[(("a", "x"), 0.9)]);
        for method in [
            AlignmentMethod::Greedy,
            AlignmentMethod::OnlyBest,
            AlignmentMethod::Munkres,
        ] {
            let alignment = align(&scores, -0.15, method).unwrap();
            assert!(alignment.is_empty());
            assert_eq!(alignment.total(), 0.0);
        }
    }
}
