use std::fmt::Debug;

use crate::error::Result;

/// Trait for pluggable compute backends.
///
/// All operations work on row-major f32 slices. Data is passed in as slices
/// and returned as owned vectors, except for the accumulating kernels which
/// write into a caller-owned buffer.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Matrix-vector product: y = W @ x.
    ///
    /// - `w`: row-major data of shape [rows, cols]
    /// - `x`: vector of length `cols`
    /// - Returns: vector of length `rows`
    fn matvec(&self, w: &[f32], x: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>>;

    /// Transposed matrix-vector product: y = W^T @ x.
    ///
    /// - `w`: row-major data of shape [rows, cols]
    /// - `x`: vector of length `rows`
    /// - Returns: vector of length `cols`
    fn matvec_transposed(
        &self,
        w: &[f32],
        x: &[f32],
        rows: usize,
        cols: usize,
    ) -> Result<Vec<f32>>;

    /// Element-wise addition: result[i] = a[i] + b[i].
    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>>;

    /// Hyperbolic tangent activation.
    fn tanh(&self, x: &[f32]) -> Result<Vec<f32>>;

    /// Softmax over chunks of `width` elements.
    ///
    /// For each chunk: result[i] = exp(x[i] - max(x)) / sum(exp(x[j] - max(x)))
    fn softmax(&self, x: &[f32], width: usize) -> Result<Vec<f32>>;

    /// Outer-product accumulation: acc[i, j] += a[i] * b[j].
    ///
    /// `acc` is row-major with shape [a.len(), b.len()].
    fn add_outer(&self, acc: &mut [f32], a: &[f32], b: &[f32]) -> Result<()>;
}
