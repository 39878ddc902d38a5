//! Dense real linear solves for the spline-interpolation system and the
//! least-squares normal equations.

use faer::Mat;
use thiserror::Error;

pub type DenseMatrix = Mat<f64>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinearSolveError {
    #[error("LU factorization requires a square matrix, got {rows}x{cols}")]
    NonSquareMatrix { rows: usize, cols: usize },
    #[error("LU factorization requires a non-empty matrix")]
    EmptyMatrix,
    #[error("matrix is singular at pivot index {pivot_index}")]
    SingularMatrix { pivot_index: usize },
    #[error("right-hand side length mismatch: expected {expected}, got {actual}")]
    RhsLengthMismatch { expected: usize, actual: usize },
}

/// Row-pivoted LU factors of a square matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct LuFactors {
    lu: DenseMatrix,
    pivots: Vec<usize>,
    pivot_floor: f64,
}

impl LuFactors {
    pub fn dimension(&self) -> usize {
        self.lu.nrows()
    }

    pub fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>, LinearSolveError> {
        let dimension = self.dimension();
        if rhs.len() != dimension {
            return Err(LinearSolveError::RhsLengthMismatch {
                expected: dimension,
                actual: rhs.len(),
            });
        }

        let mut forward = vec![0.0; dimension];
        for row in 0..dimension {
            let mut value = rhs[self.pivots[row]];
            for col in 0..row {
                value -= self.lu[(row, col)] * forward[col];
            }
            forward[row] = value;
        }

        let mut solution = vec![0.0; dimension];
        for row in (0..dimension).rev() {
            let mut value = forward[row];
            for col in (row + 1)..dimension {
                value -= self.lu[(row, col)] * solution[col];
            }

            let diagonal = self.lu[(row, row)];
            if diagonal.abs() <= self.pivot_floor {
                return Err(LinearSolveError::SingularMatrix { pivot_index: row });
            }
            solution[row] = value / diagonal;
        }

        Ok(solution)
    }

    pub fn invert(&self) -> Result<DenseMatrix, LinearSolveError> {
        let dimension = self.dimension();
        let mut inverse = DenseMatrix::zeros(dimension, dimension);
        let mut basis = vec![0.0; dimension];

        for col in 0..dimension {
            basis.fill(0.0);
            basis[col] = 1.0;

            let column = self.solve(&basis)?;
            for row in 0..dimension {
                inverse[(row, col)] = column[row];
            }
        }

        Ok(inverse)
    }
}

pub fn lu_factorize(matrix: &DenseMatrix) -> Result<LuFactors, LinearSolveError> {
    let rows = matrix.nrows();
    let cols = matrix.ncols();
    if rows != cols {
        return Err(LinearSolveError::NonSquareMatrix { rows, cols });
    }
    if rows == 0 {
        return Err(LinearSolveError::EmptyMatrix);
    }

    let dimension = rows;
    let norm = matrix_infinity_norm(matrix);
    let pivot_floor = f64::EPSILON * norm.max(1.0) * dimension as f64;

    let mut lu = matrix.clone();
    let mut pivots: Vec<usize> = (0..dimension).collect();

    for pivot_col in 0..dimension {
        let mut pivot_row = pivot_col;
        let mut pivot_magnitude = lu[(pivot_col, pivot_col)].abs();
        for row in (pivot_col + 1)..dimension {
            let magnitude = lu[(row, pivot_col)].abs();
            if magnitude > pivot_magnitude {
                pivot_magnitude = magnitude;
                pivot_row = row;
            }
        }

        if pivot_magnitude <= pivot_floor {
            return Err(LinearSolveError::SingularMatrix {
                pivot_index: pivot_col,
            });
        }

        if pivot_row != pivot_col {
            for col in 0..dimension {
                let swapped = lu[(pivot_col, col)];
                lu[(pivot_col, col)] = lu[(pivot_row, col)];
                lu[(pivot_row, col)] = swapped;
            }
            pivots.swap(pivot_col, pivot_row);
        }

        let pivot_value = lu[(pivot_col, pivot_col)];
        for row in (pivot_col + 1)..dimension {
            let factor = lu[(row, pivot_col)] / pivot_value;
            lu[(row, pivot_col)] = factor;
            for col in (pivot_col + 1)..dimension {
                let update = factor * lu[(pivot_col, col)];
                lu[(row, col)] -= update;
            }
        }
    }

    Ok(LuFactors {
        lu,
        pivots,
        pivot_floor,
    })
}

fn matrix_infinity_norm(matrix: &DenseMatrix) -> f64 {
    let mut norm: f64 = 0.0;
    for row in 0..matrix.nrows() {
        let mut row_sum = 0.0;
        for col in 0..matrix.ncols() {
            row_sum += matrix[(row, col)].abs();
        }
        norm = norm.max(row_sum);
    }
    norm
}
