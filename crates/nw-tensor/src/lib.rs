//! `nw-tensor` - dense tensors with a pluggable compute backend.
//!
//! This crate provides:
//! - A row-major f32 `Tensor` that serializes with serde
//! - A `ComputeBackend` trait covering the kernels a recurrent model needs
//! - A reference `CpuBackend` implementation
//! - Shape utilities

pub mod backend;
pub mod cpu;
pub mod error;
pub mod shape;
pub mod tensor;

pub use backend::ComputeBackend;
pub use cpu::CpuBackend;
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use tensor::Tensor;
