//! Sparse matrix assembly and the skyline Cholesky factorization
//!
//! Stiffness matrices are assembled as triplets and compressed to CSR. The
//! reduced stiffness is factorized once in skyline (variable band) storage
//! and the factor is then reused for every right-hand side.

use std::collections::VecDeque;

use nalgebra::{DMatrix, DVector, SMatrix};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Pivot below this fraction of the original diagonal marks a singular system
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Sparse matrix builder using COO format
/// More efficient for incremental assembly
#[derive(Debug, Clone)]
pub struct SparseMatrixBuilder {
    size: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl SparseMatrixBuilder {
    /// Create a new sparse matrix builder
    pub fn new(size: usize) -> Self {
        Self {
            size,
            entries: Vec::with_capacity(size * 60),
        }
    }

    /// Add a value to the matrix (accumulates if already exists)
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if value != 0.0 {
            self.entries.push((row, col, value));
        }
    }

    /// Scatter an element matrix into the global matrix through its DOF map
    pub fn add_element_matrix<const N: usize>(&mut self, dofs: &[usize; N], k_elem: &SMatrix<f64, N, N>) {
        for (i, &di) in dofs.iter().enumerate() {
            for (j, &dj) in dofs.iter().enumerate() {
                self.add(di, dj, k_elem[(i, j)]);
            }
        }
    }

    /// Convert to CSR format; duplicate entries are summed
    pub fn to_csr(&self) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(self.size, self.size);
        for &(row, col, val) in &self.entries {
            coo.push(row, col, val);
        }
        CsrMatrix::from(&coo)
    }

}

/// y = A x for a CSR matrix
pub fn sparse_matvec(a: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    let mut y = DVector::zeros(a.nrows());
    for (i, row) in a.row_iter().enumerate() {
        y[i] = row
            .col_indices()
            .iter()
            .zip(row.values())
            .map(|(&j, &v)| v * x[j])
            .sum();
    }
    y
}

/// Extract the sub-matrix of `a` on the given rows and columns
///
/// `row_map[i]` / `col_map[j]` give the position of full index i / j in the
/// result, or `None` when it is dropped.
pub fn extract_submatrix(
    a: &CsrMatrix<f64>,
    row_map: &[Option<usize>],
    col_map: &[Option<usize>],
    nrows: usize,
    ncols: usize,
) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(nrows, ncols);
    for (i, j, &v) in a.triplet_iter() {
        if let (Some(r), Some(c)) = (row_map[i], col_map[j]) {
            coo.push(r, c, v);
        }
    }
    CsrMatrix::from(&coo)
}

/// Failure to factorize: the pivot at `index` was not sufficiently positive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorizationError {
    pub index: usize,
    pub pivot: f64,
}

/// Cholesky factor L (A = L Lᵀ) of a symmetric positive definite matrix in
/// skyline storage
///
/// Row `i` stores L from column `first[i]` up to the diagonal. Fill-in stays
/// inside the profile, so a bandwidth-reducing DOF ordering pays off
/// directly in memory and time.
#[derive(Debug, Clone)]
pub struct SkylineCholesky {
    size: usize,
    first: Vec<usize>,
    rows: Vec<Vec<f64>>,
    min_pivot: f64,
    max_pivot: f64,
}

impl SkylineCholesky {
    /// Factorize the lower triangle of a symmetric CSR matrix
    pub fn factorize(a: &CsrMatrix<f64>) -> Result<Self, FactorizationError> {
        let size = a.nrows();

        let mut first: Vec<usize> = (0..size).collect();
        for (row, col, _) in a.triplet_iter() {
            if col < row && col < first[row] {
                first[row] = col;
            }
        }

        let mut rows: Vec<Vec<f64>> = (0..size).map(|i| vec![0.0; i - first[i] + 1]).collect();
        for (row, col, &val) in a.triplet_iter() {
            if col <= row {
                rows[row][col - first[row]] += val;
            }
        }

        let mut min_pivot = f64::INFINITY;
        let mut max_pivot: f64 = 0.0;

        for i in 0..size {
            let fi = first[i];
            let (done, rest) = rows.split_at_mut(i);
            let row_i = &mut rest[0];
            let a_ii = row_i[i - fi];

            for j in fi..i {
                let fj = first[j];
                let row_j = &done[j];
                let start = fi.max(fj);
                let dot: f64 = row_i[start - fi..j - fi]
                    .iter()
                    .zip(&row_j[start - fj..j - fj])
                    .map(|(a, b)| a * b)
                    .sum();
                row_i[j - fi] = (row_i[j - fi] - dot) / row_j[j - fj];
            }

            let sum_sq: f64 = row_i[..i - fi].iter().map(|v| v * v).sum();
            let pivot = a_ii - sum_sq;
            if !(pivot > PIVOT_TOLERANCE * a_ii.abs()) {
                return Err(FactorizationError { index: i, pivot });
            }
            min_pivot = min_pivot.min(pivot);
            max_pivot = max_pivot.max(pivot);
            row_i[i - fi] = pivot.sqrt();
        }

        Ok(Self {
            size,
            first,
            rows,
            min_pivot,
            max_pivot,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of stored entries of L
    pub fn profile(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Ratio of the largest to the smallest squared pivot, a cheap
    /// conditioning indicator
    pub fn pivot_ratio(&self) -> f64 {
        if self.size == 0 {
            return 1.0;
        }
        self.max_pivot / self.min_pivot
    }

    #[inline]
    fn diag(&self, i: usize) -> f64 {
        self.rows[i][i - self.first[i]]
    }

    /// Solve L Lᵀ x = b
    pub fn solve(&self, b: &DVector<f64>) -> DVector<f64> {
        let mut x = b.clone();

        // Forward substitution: L y = b
        for i in 0..self.size {
            let fi = self.first[i];
            let sum: f64 = self.rows[i][..i - fi]
                .iter()
                .zip(x.as_slice()[fi..i].iter())
                .map(|(l, y)| l * y)
                .sum();
            x[i] = (x[i] - sum) / self.diag(i);
        }

        // Backward substitution: Lᵀ x = y
        for i in (0..self.size).rev() {
            x[i] /= self.diag(i);
            let xi = x[i];
            let fi = self.first[i];
            for (k, l) in self.rows[i][..i - fi].iter().enumerate() {
                x[fi + k] -= l * xi;
            }
        }

        x
    }

    /// Solve for every column of `b`
    pub fn solve_many(&self, b: &DMatrix<f64>) -> DMatrix<f64> {
        let mut x = DMatrix::zeros(b.nrows(), b.ncols());
        for (c, col) in b.column_iter().enumerate() {
            x.set_column(c, &self.solve(&col.into_owned()));
        }
        x
    }
}

/// Reverse Cuthill-McKee ordering of a graph given as adjacency lists
///
/// Ties are broken by degree and then by index, so the ordering is a pure
/// function of the graph.
pub fn reverse_cuthill_mckee(adjacency: &[Vec<usize>]) -> Vec<usize> {
    let n = adjacency.len();
    let degrees: Vec<usize> = adjacency.iter().map(Vec::len).collect();

    let mut adj: Vec<Vec<usize>> = adjacency.to_vec();
    for neighbors in &mut adj {
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors.sort_by_key(|&i| (degrees[i], i));
    }

    let mut visited = vec![false; n];
    let mut result = Vec::with_capacity(n);
    let mut queue = VecDeque::new();

    while result.len() < n {
        // Start each component from its lowest-degree unvisited vertex
        let Some(start) = (0..n).filter(|&i| !visited[i]).min_by_key(|&i| (degrees[i], i)) else {
            break;
        };
        visited[start] = true;
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            result.push(node);
            for &neighbor in &adj[node] {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
    }

    result.reverse();
    result
}
