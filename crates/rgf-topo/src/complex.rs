//! Vietoris-Rips complexes from point clouds.
//!
//! Edges and triangles are enough for Betti-0 and Betti-1, which is all the
//! invariant gate reports.

use rgf_core::errors::{ErrorInfo, RgfError};
use serde::{Deserialize, Serialize};

fn topology_error(code: &str, message: impl Into<String>) -> RgfError {
    RgfError::Topology(ErrorInfo::new(code, message.into()))
}

/// A Rips complex up to dimension 2.
///
/// Simplices are stored with vertex indices ascending and listed in
/// lexicographic order, so two builds over the same cloud are identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RipsComplex {
    /// Number of vertices (every input point is a vertex).
    pub vertices: usize,
    /// Edges `(i, j)` with `i < j` and `dist(i, j) <= radius`.
    pub edges: Vec<(usize, usize)>,
    /// Triangles `(i, j, k)` whose three edges are all present.
    pub triangles: Vec<(usize, usize, usize)>,
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

impl RipsComplex {
    /// Builds the complex over `points` at the given radius scale.
    pub fn build(points: &[Vec<f64>], radius: f64) -> Result<Self, RgfError> {
        if points.is_empty() {
            return Err(topology_error("bad-config", "point cloud is empty"));
        }
        if !radius.is_finite() || radius <= 0.0 {
            return Err(topology_error("bad-config", "radius must be positive"));
        }
        let dim = points[0].len();
        for (idx, point) in points.iter().enumerate() {
            if point.len() != dim {
                return Err(topology_error(
                    "shape-mismatch",
                    format!("point {idx} has dim {}, expected {dim}", point.len()),
                ));
            }
            if point.iter().any(|x| !x.is_finite()) {
                return Err(topology_error(
                    "bad-config",
                    format!("point {idx} has a non-finite coordinate"),
                ));
            }
        }

        let n = points.len();
        let threshold = radius * radius;
        let mut adjacency = vec![false; n * n];
        let mut edges = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if squared_distance(&points[i], &points[j]) <= threshold {
                    adjacency[i * n + j] = true;
                    edges.push((i, j));
                }
            }
        }

        let mut triangles = Vec::new();
        for &(i, j) in &edges {
            for k in (j + 1)..n {
                if adjacency[i * n + k] && adjacency[j * n + k] {
                    triangles.push((i, j, k));
                }
            }
        }

        Ok(Self {
            vertices: n,
            edges,
            triangles,
        })
    }

    /// Index of edge `(i, j)` in the edge list, if present.
    pub fn edge_index(&self, i: usize, j: usize) -> Option<usize> {
        let key = if i < j { (i, j) } else { (j, i) };
        self.edges.binary_search(&key).ok()
    }
}
