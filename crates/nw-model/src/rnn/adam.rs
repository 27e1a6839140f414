/// Adam optimiser over a fixed list of flat parameter buffers.
///
/// m = β1*m + (1-β1)*g
/// v = β2*v + (1-β2)*g²
/// θ = θ - lr_t * m / (√v + ε), with lr_t carrying the bias correction.
#[derive(Debug, Clone)]
pub(crate) struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    step: i32,
    moments: Vec<(Vec<f32>, Vec<f32>)>,
}

impl Adam {
    pub fn new(learning_rate: f32, sizes: &[usize]) -> Self {
        Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            step: 0,
            moments: sizes
                .iter()
                .map(|&n| (vec![0.0; n], vec![0.0; n]))
                .collect(),
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    /// Apply one update. `params` and `grads` must follow the slot order the
    /// optimiser was created with.
    pub fn step<const N: usize>(&mut self, params: [&mut [f32]; N], grads: [&[f32]; N]) {
        self.step += 1;
        let bias1 = 1.0 - self.beta1.powi(self.step);
        let bias2 = 1.0 - self.beta2.powi(self.step);
        let lr_t = self.learning_rate * bias2.sqrt() / bias1;

        for ((param, grad), (m, v)) in params.into_iter().zip(grads).zip(&mut self.moments) {
            for i in 0..param.len() {
                let g = grad[i];
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;
                param[i] -= lr_t * m[i] / (v[i].sqrt() + self.epsilon);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut adam = Adam::new(0.1, &[2]);
        let mut p = vec![1.0f32, -1.0];
        adam.step([p.as_mut_slice()], [&[0.5f32, -2.0][..]]);
        // After bias correction the first update is lr * sign(g).
        assert!((p[0] - 0.9).abs() < 1e-4);
        assert!((p[1] + 0.9).abs() < 1e-4);
    }

    #[test]
    fn test_minimises_quadratic() {
        let mut adam = Adam::new(0.05, &[1]);
        let mut x = vec![3.0f32];
        for _ in 0..500 {
            let g = [2.0 * x[0]];
            adam.step([x.as_mut_slice()], [&g[..]]);
        }
        assert!(x[0].abs() < 0.05);
    }

    #[test]
    fn test_learning_rate_setter() {
        let mut adam = Adam::new(0.01, &[]);
        adam.set_learning_rate(0.005);
        assert_eq!(adam.learning_rate(), 0.005);
    }
}
