//! Z2 boundary-matrix reduction and Betti numbers.

use serde::{Deserialize, Serialize};

use crate::complex::RipsComplex;

/// Betti numbers up to dimension 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BettiNumbers {
    /// Connected components.
    pub b0: usize,
    /// Independent one-dimensional cycles.
    pub b1: usize,
}

/// One Z2 column packed into u64 words.
#[derive(Debug, Clone)]
struct Column {
    words: Vec<u64>,
}

impl Column {
    fn new(width: usize, rows: &[usize]) -> Self {
        let mut words = vec![0u64; width];
        for &row in rows {
            words[row / 64] ^= 1u64 << (row % 64);
        }
        Self { words }
    }

    /// Highest set row, the pivot of the reduction.
    fn low(&self) -> Option<usize> {
        for (bucket, word) in self.words.iter().enumerate().rev() {
            if *word != 0 {
                return Some(bucket * 64 + 63 - word.leading_zeros() as usize);
            }
        }
        None
    }

    fn add(&mut self, other: &Column) {
        for (word, other_word) in self.words.iter_mut().zip(other.words.iter()) {
            *word ^= other_word;
        }
    }
}

/// Left-to-right column reduction; returns the Z2 rank.
///
/// Each column is reduced against earlier columns sharing its pivot row
/// until its pivot is unclaimed or the column vanishes. Non-vanishing
/// reduced columns count toward the rank.
fn reduce_rank(num_rows: usize, boundary: &[Vec<usize>]) -> usize {
    if num_rows == 0 || boundary.is_empty() {
        return 0;
    }
    let width = num_rows.div_ceil(64);
    let mut reduced: Vec<Column> = Vec::with_capacity(boundary.len());
    let mut pivot_owner: Vec<Option<usize>> = vec![None; num_rows];
    let mut rank = 0;

    for rows in boundary {
        let mut column = Column::new(width, rows);
        while let Some(low) = column.low() {
            match pivot_owner[low] {
                Some(owner) => {
                    let owner_column = reduced[owner].clone();
                    column.add(&owner_column);
                }
                None => {
                    pivot_owner[low] = Some(reduced.len());
                    rank += 1;
                    break;
                }
            }
        }
        reduced.push(column);
    }
    rank
}

/// Computes Betti-0 and Betti-1 of a Rips complex.
///
/// `b0 = V - rank ∂1` and `b1 = (E - rank ∂1) - rank ∂2`, with both
/// boundary matrices reduced over Z2.
pub fn betti_numbers(complex: &RipsComplex) -> BettiNumbers {
    let edge_boundary: Vec<Vec<usize>> = complex
        .edges
        .iter()
        .map(|&(i, j)| vec![i, j])
        .collect();
    let rank_d1 = reduce_rank(complex.vertices, &edge_boundary);

    let triangle_boundary: Vec<Vec<usize>> = complex
        .triangles
        .iter()
        .map(|&(i, j, k)| {
            // The three edges exist whenever the triangle does.
            let mut rows: Vec<usize> = [(i, j), (i, k), (j, k)]
                .iter()
                .filter_map(|&(a, b)| complex.edge_index(a, b))
                .collect();
            rows.sort_unstable();
            rows
        })
        .collect();
    let rank_d2 = reduce_rank(complex.edges.len(), &triangle_boundary);

    BettiNumbers {
        b0: complex.vertices - rank_d1,
        b1: complex.edges.len() - rank_d1 - rank_d2,
    }
}
