use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};
use crate::shape::Shape;

/// A dense, row-major f32 tensor.
///
/// Holds contiguous data with an associated shape. Operations that require
/// computation are dispatched to a `ComputeBackend`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

impl Tensor {
    /// Create a new tensor from f32 data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor { shape, data }
    }

    /// Fallible constructor for data that comes from outside the process.
    pub fn try_new(data: Vec<f32>, shape: Shape) -> Result<Self> {
        let tensor = Tensor { shape, data };
        tensor.validate()?;
        Ok(tensor)
    }

    /// Create a zero-filled tensor with the given shape.
    pub fn zeros(shape: Shape) -> Self {
        let n = shape.numel();
        Tensor {
            shape,
            data: vec![0.0; n],
        }
    }

    /// Create a tensor with entries drawn uniformly from `[-limit, limit)`.
    pub fn uniform<R: Rng + ?Sized>(shape: Shape, limit: f32, rng: &mut R) -> Self {
        let n = shape.numel();
        let data = if limit > 0.0 {
            (0..n).map(|_| rng.gen_range(-limit..limit)).collect()
        } else {
            vec![0.0; n]
        };
        Tensor { shape, data }
    }

    /// Glorot/Xavier uniform initialisation for a `[rows, cols]` matrix.
    pub fn glorot<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (rows + cols).max(1) as f32).sqrt();
        Tensor::uniform(Shape::matrix(rows, cols), limit, rng)
    }

    /// Checks that the data length agrees with the shape. Deserialized
    /// tensors bypass `new`, so loaders call this before use.
    pub fn validate(&self) -> Result<()> {
        if self.data.len() != self.shape.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.dims().to_vec(),
                got: vec![self.data.len()],
            });
        }
        Ok(())
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Number of rows of a 2D tensor (or the length of a 1D tensor).
    pub fn rows(&self) -> usize {
        if self.shape.ndim() == 0 {
            1
        } else {
            self.shape.dim(0)
        }
    }

    /// Number of columns of a 2D tensor (1 for vectors).
    pub fn cols(&self) -> usize {
        if self.shape.ndim() < 2 {
            1
        } else {
            self.shape.dim(1)
        }
    }

    /// Borrow row `row` of a 2D tensor.
    pub fn row(&self, row: usize) -> Result<&[f32]> {
        let rows = self.rows();
        if row >= rows {
            return Err(TensorError::RowOutOfBounds { row, rows });
        }
        let cols = self.cols();
        Ok(&self.data[row * cols..(row + 1) * cols])
    }

    /// Overwrite row `row` of a 2D tensor.
    pub fn set_row(&mut self, row: usize, values: &[f32]) -> Result<()> {
        let rows = self.rows();
        if row >= rows {
            return Err(TensorError::RowOutOfBounds { row, rows });
        }
        let cols = self.cols();
        if values.len() != cols {
            return Err(TensorError::ShapeMismatch {
                expected: vec![cols],
                got: vec![values.len()],
            });
        }
        self.data[row * cols..(row + 1) * cols].copy_from_slice(values);
        Ok(())
    }

    /// Matrix-vector product `self @ x` for a 2D tensor.
    pub fn matvec(&self, x: &[f32], backend: &dyn ComputeBackend) -> Result<Vec<f32>> {
        self.require_matrix()?;
        backend.matvec(&self.data, x, self.rows(), self.cols())
    }

    /// Transposed product `self^T @ x` for a 2D tensor.
    pub fn matvec_transposed(&self, x: &[f32], backend: &dyn ComputeBackend) -> Result<Vec<f32>> {
        self.require_matrix()?;
        backend.matvec_transposed(&self.data, x, self.rows(), self.cols())
    }

    fn require_matrix(&self) -> Result<()> {
        if self.shape.ndim() != 2 {
            return Err(TensorError::Other(format!(
                "expected a 2D tensor, got shape {}",
                self.shape
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBackend;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_new_tensor() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::matrix(2, 3));
        assert_eq!(t.rows(), 2);
        assert_eq!(t.cols(), 3);
        assert_eq!(t.row(1).unwrap(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    #[should_panic]
    fn test_new_shape_mismatch_panics() {
        let _t = Tensor::new(vec![1.0, 2.0], Shape::vector(3));
    }

    #[test]
    fn test_try_new_rejects_mismatch() {
        assert!(Tensor::try_new(vec![1.0, 2.0], Shape::vector(3)).is_err());
        assert!(Tensor::try_new(vec![1.0, 2.0, 3.0], Shape::vector(3)).is_ok());
    }

    #[test]
    fn test_row_out_of_bounds() {
        let t = Tensor::zeros(Shape::matrix(2, 2));
        assert!(matches!(
            t.row(2),
            Err(TensorError::RowOutOfBounds { row: 2, rows: 2 })
        ));
    }

    #[test]
    fn test_set_row() {
        let mut t = Tensor::zeros(Shape::matrix(2, 2));
        t.set_row(1, &[7.0, 8.0]).unwrap();
        assert_eq!(t.data(), &[0.0, 0.0, 7.0, 8.0]);
        assert!(t.set_row(0, &[1.0]).is_err());
    }

    #[test]
    fn test_glorot_within_limit() {
        let mut rng = StdRng::seed_from_u64(7);
        let t = Tensor::glorot(4, 8, &mut rng);
        let limit = (6.0f32 / 12.0).sqrt();
        assert!(t.data().iter().all(|v| v.abs() <= limit));
        assert!(t.data().iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_matvec_via_backend() {
        let backend = CpuBackend::new();
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], Shape::matrix(2, 2));
        assert_eq!(t.matvec(&[1.0, 1.0], &backend).unwrap(), vec![3.0, 7.0]);
        assert_eq!(
            t.matvec_transposed(&[1.0, 1.0], &backend).unwrap(),
            vec![4.0, 6.0]
        );
    }

    #[test]
    fn test_matvec_requires_matrix() {
        let backend = CpuBackend::new();
        let t = Tensor::zeros(Shape::vector(3));
        assert!(t.matvec(&[1.0], &backend).is_err());
    }
}
