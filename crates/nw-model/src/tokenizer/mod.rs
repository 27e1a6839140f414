pub mod vocab;

pub use vocab::Vocabulary;
