use rand::Rng;

use crate::Activation;

/// Half-width of the uniform range used for initial weights.
pub const INIT_RANGE: f64 = 0.05;

/// Shape of one layer: its real units plus an optional trailing bias unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layer {
    units: usize,
    has_bias: bool,
}

impl Layer {
    #[inline]
    pub fn new(units: usize, has_bias: bool) -> Self {
        Self { units, has_bias }
    }

    /// Number of non-bias units.
    #[inline]
    pub fn units(&self) -> usize {
        self.units
    }

    #[inline]
    pub fn has_bias(&self) -> bool {
        self.has_bias
    }

    /// Total slots, including the bias unit if present.
    #[inline]
    pub fn width(&self) -> usize {
        self.units + usize::from(self.has_bias)
    }

    /// Index of the bias unit, which is always the last slot.
    #[inline]
    pub fn bias_index(&self) -> Option<usize> {
        self.has_bias.then_some(self.units)
    }
}

/// Fully-connected weights from one layer into the next.
#[derive(Debug, Clone)]
pub struct Dense {
    in_width: usize,
    out_units: usize,
    /// Row-major matrix with shape (in_width, out_units).
    ///
    /// Row `k` is the outgoing-weight vector of source unit `k` (bias row last).
    weights: Vec<f64>,
}

impl Dense {
    /// Zero-initialized weights.
    #[inline]
    pub fn new(in_width: usize, out_units: usize) -> Self {
        Self {
            in_width,
            out_units,
            weights: vec![0.0; in_width * out_units],
        }
    }

    pub fn new_with_rng<R: Rng + ?Sized>(in_width: usize, out_units: usize, rng: &mut R) -> Self {
        let weights = (0..in_width * out_units)
            .map(|_| rng.gen_range(-INIT_RANGE..=INIT_RANGE))
            .collect();
        Self {
            in_width,
            out_units,
            weights,
        }
    }

    /// Source slots, bias included.
    #[inline]
    pub fn in_width(&self) -> usize {
        self.in_width
    }

    /// Non-bias destination units.
    #[inline]
    pub fn out_units(&self) -> usize {
        self.out_units
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    pub fn weights_mut(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    /// Outgoing weights of source unit `src`.
    #[inline]
    pub fn outgoing(&self, src: usize) -> &[f64] {
        let start = src * self.out_units;
        &self.weights[start..start + self.out_units]
    }

    #[inline]
    pub fn weight(&self, src: usize, dst: usize) -> f64 {
        self.weights[src * self.out_units + dst]
    }

    #[inline]
    pub fn set_weight(&mut self, src: usize, dst: usize, value: f64) {
        self.weights[src * self.out_units + dst] = value;
    }

    /// Forward pass into the next layer.
    ///
    /// Computes, for every destination `j`:
    /// - `weighted_sums[j] = Σ_k inputs[k] * w[k][j]` (bias slot included in `inputs`)
    /// - `outputs[j] = activation(weighted_sums[j])`
    ///
    /// Shape contract:
    /// - `inputs.len() == self.in_width`
    /// - `weighted_sums.len() == outputs.len() == self.out_units`
    #[inline]
    pub fn forward(
        &self,
        inputs: &[f64],
        activation: Activation,
        weighted_sums: &mut [f64],
        outputs: &mut [f64],
    ) {
        debug_assert_eq!(inputs.len(), self.in_width);
        debug_assert_eq!(weighted_sums.len(), self.out_units);
        debug_assert_eq!(outputs.len(), self.out_units);

        weighted_sums.fill(0.0);
        for (k, &x) in inputs.iter().enumerate() {
            let row = self.outgoing(k);
            for (sum, &w) in weighted_sums.iter_mut().zip(row) {
                *sum = w.mul_add(x, *sum);
            }
        }
        for (out, &z) in outputs.iter_mut().zip(weighted_sums.iter()) {
            *out = activation.forward(z);
        }
    }

    /// Back-propagates destination errors onto the non-bias source units.
    ///
    /// `errors[u] = f'(weighted_sums[u]) * Σ_m w[u][m] * next_errors[m]`
    ///
    /// Only `errors.len()` source rows are visited, so passing the non-bias prefix of the
    /// source layer keeps the bias unit out of the error computation.
    ///
    /// Shape contract:
    /// - `next_errors.len() == self.out_units`
    /// - `weighted_sums.len() == errors.len() <= self.in_width`
    #[inline]
    pub fn backward(
        &self,
        next_errors: &[f64],
        weighted_sums: &[f64],
        activation: Activation,
        errors: &mut [f64],
    ) {
        debug_assert_eq!(next_errors.len(), self.out_units);
        debug_assert_eq!(weighted_sums.len(), errors.len());
        debug_assert!(errors.len() <= self.in_width);

        for (u, err) in errors.iter_mut().enumerate() {
            let mut acc = 0.0_f64;
            for (&w, &e) in self.outgoing(u).iter().zip(next_errors) {
                acc = w.mul_add(e, acc);
            }
            *err = activation.derivative(weighted_sums[u]) * acc;
        }
    }

    /// `w[k][m] += lr * inputs[k] * next_errors[m]` for every source `k` (bias included).
    #[inline]
    pub fn sgd_step(&mut self, inputs: &[f64], next_errors: &[f64], lr: f64) {
        debug_assert_eq!(inputs.len(), self.in_width);
        debug_assert_eq!(next_errors.len(), self.out_units);

        let out_units = self.out_units;
        for (row, &x) in self.weights.chunks_exact_mut(out_units).zip(inputs) {
            let scale = lr * x;
            for (w, &e) in row.iter_mut().zip(next_errors) {
                *w = scale.mul_add(e, *w);
            }
        }
    }
}
