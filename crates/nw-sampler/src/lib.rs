pub mod categorical;
pub mod error;
pub mod sampler;
pub mod temperature;

pub use categorical::draw;
pub use error::SampleError;
pub use sampler::{Sampler, SamplerChain, TokenProb};
pub use temperature::TemperatureSampler;
