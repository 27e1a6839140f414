/// A trained next-word predictor.
///
/// Implementations map a fixed-length window of token ids (left-padded with
/// the padding id) to a probability distribution over the vocabulary. A model
/// is immutable once built; retraining produces a new value.
pub trait LanguageModel: Send + Sync {
    /// Run the forward pass for one window.
    ///
    /// `window.len()` must equal `sequence_length()`. The returned vector has
    /// `vocab_size()` entries summing to 1.
    fn predict(&self, window: &[u32]) -> crate::Result<Vec<f32>>;

    /// Number of outcomes in the output distribution.
    fn vocab_size(&self) -> usize;

    /// Window length the model consumes per forward pass.
    fn sequence_length(&self) -> usize;

    /// Short architecture label reported by status endpoints.
    fn kind(&self) -> &str;
}
