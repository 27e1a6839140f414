use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};

/// Pure-Rust CPU compute backend.
///
/// Implements all operations with straightforward loops optimized for
/// correctness rather than peak performance.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn check_same_len(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(TensorError::ShapeMismatch {
            expected: vec![a.len()],
            got: vec![b.len()],
        });
    }
    Ok(())
}

impl ComputeBackend for CpuBackend {
    fn matvec(&self, w: &[f32], x: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>> {
        if w.len() != rows * cols || x.len() != cols {
            return Err(TensorError::MatvecMismatch {
                rows,
                cols,
                len: x.len(),
            });
        }

        let mut y = vec![0.0f32; rows];
        for (i, yi) in y.iter_mut().enumerate() {
            let row = &w[i * cols..(i + 1) * cols];
            *yi = row.iter().zip(x).map(|(a, b)| a * b).sum();
        }
        Ok(y)
    }

    fn matvec_transposed(
        &self,
        w: &[f32],
        x: &[f32],
        rows: usize,
        cols: usize,
    ) -> Result<Vec<f32>> {
        if w.len() != rows * cols || x.len() != rows {
            return Err(TensorError::MatvecMismatch {
                rows: cols,
                cols: rows,
                len: x.len(),
            });
        }

        let mut y = vec![0.0f32; cols];
        for (i, &xi) in x.iter().enumerate() {
            if xi == 0.0 {
                continue;
            }
            let row = &w[i * cols..(i + 1) * cols];
            for (yj, &wij) in y.iter_mut().zip(row) {
                *yj += wij * xi;
            }
        }
        Ok(y)
    }

    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        check_same_len(a, b)?;
        Ok(a.iter().zip(b.iter()).map(|(x, y)| x + y).collect())
    }

    fn tanh(&self, x: &[f32]) -> Result<Vec<f32>> {
        Ok(x.iter().map(|v| v.tanh()).collect())
    }

    fn softmax(&self, x: &[f32], width: usize) -> Result<Vec<f32>> {
        if width == 0 {
            return Err(TensorError::Other(
                "softmax: width must be > 0".to_string(),
            ));
        }
        if x.len() % width != 0 {
            return Err(TensorError::Other(format!(
                "softmax: x.len()={} is not a multiple of width={}",
                x.len(),
                width
            )));
        }

        let mut result = vec![0.0f32; x.len()];
        for (chunk, out) in x.chunks_exact(width).zip(result.chunks_exact_mut(width)) {
            // Find max for numerical stability
            let max_val = chunk.iter().copied().fold(f32::NEG_INFINITY, f32::max);

            let mut sum = 0.0f32;
            for (o, &v) in out.iter_mut().zip(chunk) {
                *o = (v - max_val).exp();
                sum += *o;
            }
            for o in out.iter_mut() {
                *o /= sum;
            }
        }

        Ok(result)
    }

    fn add_outer(&self, acc: &mut [f32], a: &[f32], b: &[f32]) -> Result<()> {
        if acc.len() != a.len() * b.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![a.len(), b.len()],
                got: vec![acc.len()],
            });
        }
        if b.is_empty() {
            return Ok(());
        }
        for (row, &ai) in acc.chunks_exact_mut(b.len()).zip(a) {
            if ai == 0.0 {
                continue;
            }
            for (r, &bj) in row.iter_mut().zip(b) {
                *r += ai * bj;
            }
        }
        Ok(())
    }
}
