use log::debug;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{Error, Result};

/// A concrete realization of a solved performance estimation problem.
///
/// Column `i` of [`Certificate::coordinates`] holds the coordinates of leaf
/// point `i`. The inner products of those columns reproduce the solved
/// Gram matrix, so the vectors form a worst-case instance. They are unique
/// only up to an orthogonal transformation.
#[derive(Debug, Clone)]
pub struct Certificate {
    gram: Array2<f64>,
    values: Array1<f64>,
    coordinates: Array2<f64>,
    min_eigenvalue: f64,
}

impl Certificate {
    /// The Gram matrix returned by the solver.
    pub fn gram(&self) -> &Array2<f64> {
        &self.gram
    }

    /// The function-value vector returned by the solver.
    pub fn function_values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn coordinates(&self) -> &Array2<f64> {
        &self.coordinates
    }

    /// Dimension of the reconstructed space.
    pub fn dimension(&self) -> usize {
        self.coordinates.nrows()
    }

    /// Smallest eigenvalue of the Gram matrix before clipping.
    pub fn min_eigenvalue(&self) -> f64 {
        self.min_eigenvalue
    }

    pub fn point(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        if index < self.coordinates.ncols() {
            Some(self.coordinates.column(index))
        } else {
            None
        }
    }

    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }
}

/// Factors a solved Gram matrix into explicit coordinates.
///
/// `G = QΛQᵀ` is clipped to `Λ⁺`, `X = √Λ⁺ Qᵀ` is reduced by QR to an upper
/// triangular `R` with a non-negative diagonal, and `RᵀR = XᵀX ≈ G`.
/// Eigenvalues in `[-psd_tolerance, 0)` are treated as solver noise.
pub(crate) fn reconstruct(
    gram: Array2<f64>,
    values: Array1<f64>,
    psd_tolerance: f64,
) -> Result<Certificate> {
    let n = gram.nrows();
    if n == 0 {
        return Ok(Certificate {
            gram,
            values,
            coordinates: Array2::zeros((0, 0)),
            min_eigenvalue: 0.0,
        });
    }

    let symmetric = DMatrix::from_fn(n, n, |i, j| 0.5 * (gram[[i, j]] + gram[[j, i]]));
    let eigen = SymmetricEigen::new(symmetric);
    let min_eigenvalue = eigen
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    if !min_eigenvalue.is_finite() {
        return Err(Error::LinearAlgebra(
            "eigendecomposition of the Gram matrix produced non-finite values".to_string(),
        ));
    }
    if min_eigenvalue < -psd_tolerance {
        return Err(Error::NonPsdGram {
            min_eigenvalue,
            tolerance: psd_tolerance,
        });
    }
    if min_eigenvalue < 0.0 {
        debug!(
            "Clipping Gram matrix eigenvalues down to {:.3e} to zero",
            min_eigenvalue
        );
    }

    let mut factor = eigen.eigenvectors.transpose();
    for (i, &lambda) in eigen.eigenvalues.iter().enumerate() {
        let root = lambda.max(0.0).sqrt();
        for j in 0..n {
            factor[(i, j)] *= root;
        }
    }

    let mut r = factor.qr().r();
    for i in 0..r.nrows() {
        if r[(i, i)] < 0.0 {
            for j in 0..r.ncols() {
                r[(i, j)] = -r[(i, j)];
            }
        }
    }

    let coordinates = Array2::from_shape_fn((r.nrows(), r.ncols()), |(i, j)| r[(i, j)]);
    Ok(Certificate {
        gram,
        values,
        coordinates,
        min_eigenvalue,
    })
}
