use super::weights::Gradients;
use super::{ForwardTrace, RecurrentModel};
use crate::error::{ModelError, Result};

/// Probability floor applied before taking the log.
const PROB_FLOOR: f32 = 1e-7;

/// Cross-entropy of `target` under `probs`.
pub(crate) fn cross_entropy(probs: &[f32], target: u32) -> f32 {
    let p = probs.get(target as usize).copied().unwrap_or(0.0);
    -p.max(PROB_FLOOR).ln()
}

impl RecurrentModel {
    /// Backpropagate the cross-entropy of `target` through time and add the
    /// parameter gradients into `grads`. Returns the sample loss.
    pub(crate) fn accumulate_gradients(
        &self,
        trace: &ForwardTrace,
        target: u32,
        grads: &mut Gradients,
    ) -> Result<f32> {
        let cfg = &self.config;
        if target as usize >= cfg.vocab_size {
            return Err(ModelError::TokenOutOfRange {
                id: target,
                vocab_size: cfg.vocab_size,
            });
        }

        let backend = self.backend.as_ref();
        let w = &self.weights;
        let loss = cross_entropy(&trace.probs, target);

        // Softmax + cross-entropy: dL/dlogits = p - onehot(target).
        let mut d_logits = trace.probs.clone();
        d_logits[target as usize] -= 1.0;

        let last = trace.hidden.last().ok_or_else(|| {
            ModelError::Other("forward trace has no hidden state".to_string())
        })?;
        backend.add_outer(&mut grads.w_hy, &d_logits, last)?;
        for (g, d) in grads.b_y.iter_mut().zip(&d_logits) {
            *g += d;
        }

        let mut d_h = w.w_hy.matvec_transposed(&d_logits, backend)?;

        for (t, step) in trace.steps.iter().enumerate().rev() {
            // Masked steps copy the state forward, so the gradient passes
            // through unchanged.
            let Some(id) = step else { continue };

            let h_t = &trace.hidden[t + 1];
            let h_prev = &trace.hidden[t];

            // tanh'(a) = 1 - h^2
            let d_a: Vec<f32> = d_h
                .iter()
                .zip(h_t)
                .map(|(d, h)| d * (1.0 - h * h))
                .collect();

            let x = w.embedding.row(*id as usize)?;
            backend.add_outer(&mut grads.w_xh, &d_a, x)?;
            backend.add_outer(&mut grads.w_hh, &d_a, h_prev)?;
            for (g, d) in grads.b_h.iter_mut().zip(&d_a) {
                *g += d;
            }

            d_h = w.w_hh.matvec_transposed(&d_a, backend)?;
        }

        Ok(loss)
    }
}
