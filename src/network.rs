use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Activation, Dense, Error, Layer, Result, Unit};

#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    /// `dense[i]` connects `layers[i]` to `layers[i + 1]`.
    dense: Vec<Dense>,
    activation: Activation,
}

/// Forward-pass buffers for a `Network`.
///
/// `outputs` and `weighted_sums` are contiguous and indexed by (layer, unit) through
/// `offsets`. Bias slots hold a pinned output of `1.0`.
#[derive(Debug, Clone)]
pub struct Scratch {
    offsets: Vec<usize>,
    outputs: Vec<f64>,
    weighted_sums: Vec<f64>,
}

/// Backward-pass error terms (δ), laid out like `Scratch`.
///
/// Entries for input and bias units stay at zero.
#[derive(Debug, Clone)]
pub struct Deltas {
    offsets: Vec<usize>,
    errors: Vec<f64>,
}

/// Reusable buffers for training a specific `Network`.
#[derive(Debug, Clone)]
pub struct Trainer {
    pub scratch: Scratch,
    pub deltas: Deltas,
}

impl Network {
    pub fn new_with_seed(
        units_per_layer: &[usize],
        activation: Activation,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::new_with_rng(units_per_layer, activation, &mut rng)
    }

    /// Builds the topology: a trailing bias unit on every layer except the output layer,
    /// and one outgoing weight per (source unit, non-bias destination unit) pair.
    pub fn new_with_rng<R: Rng + ?Sized>(
        units_per_layer: &[usize],
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        if units_per_layer.len() < 2 {
            return Err(Error::InvalidConfig(format!(
                "units_per_layer must include input and output layers, got {} layer(s)",
                units_per_layer.len()
            )));
        }
        if let Some(idx) = units_per_layer.iter().position(|&n| n == 0) {
            return Err(Error::InvalidConfig(format!(
                "layer {idx} has zero units; all layer sizes must be > 0"
            )));
        }

        let last = units_per_layer.len() - 1;
        let layers: Vec<Layer> = units_per_layer
            .iter()
            .enumerate()
            .map(|(i, &units)| Layer::new(units, i != last))
            .collect();

        let dense = layers
            .windows(2)
            .map(|pair| Dense::new_with_rng(pair[0].width(), pair[1].units(), rng))
            .collect();

        Ok(Self {
            layers,
            dense,
            activation,
        })
    }

    /// Assembles a network from explicit weights.
    ///
    /// `dense[i]` must be shaped `(layers[i].width(), layers[i + 1].units())`.
    pub fn from_parts(
        units_per_layer: &[usize],
        activation: Activation,
        dense: Vec<Dense>,
    ) -> Result<Self> {
        let mut net = Self::new_with_seed(units_per_layer, activation, 0)?;
        if dense.len() != net.dense.len() {
            return Err(Error::InvalidShape(format!(
                "expected {} weight matrices, got {}",
                net.dense.len(),
                dense.len()
            )));
        }
        for (i, (given, expected)) in dense.iter().zip(&net.dense).enumerate() {
            if given.in_width() != expected.in_width() || given.out_units() != expected.out_units()
            {
                return Err(Error::InvalidShape(format!(
                    "weights {i} have shape ({}, {}), expected ({}, {})",
                    given.in_width(),
                    given.out_units(),
                    expected.in_width(),
                    expected.out_units()
                )));
            }
        }
        net.dense = dense;
        Ok(net)
    }

    /// Width of the input vector (non-bias input units).
    #[inline]
    pub fn input_units(&self) -> usize {
        self.layers[0].units()
    }

    /// Number of output units, i.e. the number of classes.
    #[inline]
    pub fn output_units(&self) -> usize {
        self.layers[self.layers.len() - 1].units()
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[inline]
    pub fn layer(&self, idx: usize) -> Option<&Layer> {
        self.layers.get(idx)
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Weights leaving layer `idx`; `None` for the output layer.
    #[inline]
    pub fn dense(&self, idx: usize) -> Option<&Dense> {
        self.dense.get(idx)
    }

    #[inline]
    pub fn dense_mut(&mut self, idx: usize) -> Option<&mut Dense> {
        self.dense.get_mut(idx)
    }

    /// Weight from unit `src` of layer `layer` to unit `dst` of layer `layer + 1`.
    pub fn weight(&self, layer: usize, src: usize, dst: usize) -> Option<f64> {
        let dense = self.dense.get(layer)?;
        (src < dense.in_width() && dst < dense.out_units()).then(|| dense.weight(src, dst))
    }

    pub fn set_weight(&mut self, layer: usize, src: usize, dst: usize, value: f64) -> Result<()> {
        let dense = self.dense.get_mut(layer).ok_or_else(|| {
            Error::InvalidShape(format!("layer {layer} has no outgoing weights"))
        })?;
        if src >= dense.in_width() || dst >= dense.out_units() {
            return Err(Error::InvalidShape(format!(
                "weight ({src}, {dst}) out of range for layer {layer} with shape ({}, {})",
                dense.in_width(),
                dense.out_units()
            )));
        }
        dense.set_weight(src, dst, value);
        Ok(())
    }

    /// Total number of weights, bias weights included.
    pub fn num_weights(&self) -> usize {
        self.dense.iter().map(|d| d.weights().len()).sum()
    }

    pub fn scratch(&self) -> Scratch {
        Scratch::new(self)
    }

    pub fn deltas(&self) -> Deltas {
        Deltas::new(self)
    }

    #[inline]
    pub fn trainer(&self) -> Trainer {
        Trainer::new(self)
    }

    /// Forward pass for a single sample.
    ///
    /// Writes outputs and weighted sums of every non-input unit into `scratch` and returns
    /// the output layer.
    ///
    /// Shape contract:
    /// - `input.len() == self.input_units()`
    /// - `scratch` must be built for this `Network`
    pub fn forward<'a>(&self, input: &[f64], scratch: &'a mut Scratch) -> &'a [f64] {
        assert_eq!(
            input.len(),
            self.input_units(),
            "input len {} does not match network input_units {}",
            input.len(),
            self.input_units()
        );
        assert!(
            scratch.fits(self),
            "scratch was not built for this network topology"
        );

        scratch.outputs[..input.len()].copy_from_slice(input);

        for (idx, dense) in self.dense.iter().enumerate() {
            let units = self.layers[idx + 1].units();
            let split = scratch.offsets[idx + 1];

            // Previous layer is read in full (bias included); only the real units of the
            // current layer are written.
            let (left, right) = scratch.outputs.split_at_mut(split);
            let prev = &left[scratch.offsets[idx]..];
            let outputs = &mut right[..units];
            let sums = &mut scratch.weighted_sums[split..split + units];
            dense.forward(prev, self.activation, sums, outputs);
        }

        scratch.output()
    }

    /// Computes error terms for one labelled sample.
    ///
    /// You must call `forward` first using the same `scratch`. Returns the sample's
    /// squared-error loss `0.5 * Σ (target - output)²`.
    pub fn backward(&self, label: usize, scratch: &Scratch, deltas: &mut Deltas) -> f64 {
        assert!(
            label < self.output_units(),
            "label {label} out of range for {} output units",
            self.output_units()
        );
        assert!(scratch.fits(self), "scratch was not built for this network topology");
        assert!(deltas.fits(self), "deltas were not built for this network topology");

        let last = self.layers.len() - 1;
        let out_range = scratch.range(last);
        let outputs = &scratch.outputs[out_range.clone()];
        let sums = &scratch.weighted_sums[out_range.clone()];
        let errors = &mut deltas.errors[out_range];

        let mut loss = 0.0_f64;
        for k in 0..outputs.len() {
            let target = if k == label { 1.0 } else { 0.0 };
            let diff = target - outputs[k];
            errors[k] = self.activation.derivative(sums[k]) * diff;
            loss = (0.5 * diff).mul_add(diff, loss);
        }

        // Hidden layers, from the last one down to layer 1. The input layer never gets an
        // error term.
        for idx in (1..last).rev() {
            let units = self.layers[idx].units();
            let start = deltas.offsets[idx];
            let split = deltas.offsets[idx + 1];
            let next_units = self.layers[idx + 1].units();

            let (left, right) = deltas.errors.split_at_mut(split);
            let errors = &mut left[start..start + units];
            let next_errors = &right[..next_units];
            let sums = &scratch.weighted_sums[start..start + units];
            self.dense[idx].backward(next_errors, sums, self.activation, errors);
        }

        loss
    }

    /// Applies `w += lr * output * next_error` to every weight, using the errors computed
    /// by the preceding `backward`.
    #[inline]
    pub fn sgd_step(&mut self, scratch: &Scratch, deltas: &Deltas, lr: f64) {
        assert!(
            lr.is_finite() && lr > 0.0,
            "learning rate must be finite and > 0"
        );
        assert!(scratch.fits(self), "scratch was not built for this network topology");
        assert!(deltas.fits(self), "deltas were not built for this network topology");

        for (idx, dense) in self.dense.iter_mut().enumerate() {
            let inputs = &scratch.outputs[scratch.range(idx)];
            let next = scratch.offsets[idx + 1];
            let next_errors = &deltas.errors[next..next + self.layers[idx + 1].units()];
            dense.sgd_step(inputs, next_errors, lr);
        }
    }

    /// One online SGD update for a single sample. Returns the sample loss.
    pub fn train_step(
        &mut self,
        input: &[f64],
        label: usize,
        lr: f64,
        trainer: &mut Trainer,
    ) -> f64 {
        self.forward(input, &mut trainer.scratch);
        let loss = self.backward(label, &trainer.scratch, &mut trainer.deltas);
        self.sgd_step(&trainer.scratch, &trainer.deltas, lr);
        loss
    }

    /// Index of the largest output after the forward pass in `scratch` (lowest index wins
    /// ties).
    pub fn classify_with(&self, input: &[f64], scratch: &mut Scratch) -> Result<usize> {
        self.check_input(input)?;
        if !scratch.fits(self) {
            return Err(Error::InvalidShape(
                "scratch was not built for this network topology".to_owned(),
            ));
        }
        Ok(argmax(self.forward(input, scratch)))
    }

    /// Shape-checked classification; allocates a fresh `Scratch`.
    pub fn classify(&self, input: &[f64]) -> Result<usize> {
        let mut scratch = self.scratch();
        self.classify_with(input, &mut scratch)
    }

    pub(crate) fn check_input(&self, input: &[f64]) -> Result<()> {
        if input.len() != self.input_units() {
            return Err(Error::InvalidShape(format!(
                "input len {} does not match network input_units {}",
                input.len(),
                self.input_units()
            )));
        }
        Ok(())
    }
}

#[inline]
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

fn layer_offsets(net: &Network) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(net.layers.len() + 1);
    let mut acc = 0;
    offsets.push(acc);
    for layer in &net.layers {
        acc += layer.width();
        offsets.push(acc);
    }
    offsets
}

impl Trainer {
    pub fn new(net: &Network) -> Self {
        Self {
            scratch: Scratch::new(net),
            deltas: Deltas::new(net),
        }
    }

    /// Snapshot of unit `index` in layer `layer` as of the last pass through this trainer.
    pub fn unit<'n>(&self, net: &'n Network, layer: usize, index: usize) -> Option<Unit<'n>> {
        let shape = net.layers.get(layer)?;
        if index >= shape.width() || !self.scratch.fits(net) {
            return None;
        }
        let slot = self.scratch.offsets[layer] + index;
        let outgoing_weights = net.dense.get(layer).map_or(&[][..], |d| d.outgoing(index));
        Some(Unit {
            output: self.scratch.outputs[slot],
            weighted_sum: self.scratch.weighted_sums[slot],
            error: self.deltas.errors[slot],
            outgoing_weights,
            is_bias: shape.bias_index() == Some(index),
        })
    }
}

impl Scratch {
    pub fn new(net: &Network) -> Self {
        let offsets = layer_offsets(net);
        let total = offsets[offsets.len() - 1];
        let mut outputs = vec![0.0; total];
        for (layer, &start) in net.layers.iter().zip(&offsets) {
            if let Some(bias) = layer.bias_index() {
                outputs[start + bias] = 1.0;
            }
        }
        Self {
            offsets,
            outputs,
            weighted_sums: vec![0.0; total],
        }
    }

    #[inline]
    fn range(&self, layer: usize) -> Range<usize> {
        self.offsets[layer]..self.offsets[layer + 1]
    }

    fn fits(&self, net: &Network) -> bool {
        self.offsets.len() == net.layers.len() + 1
            && net
                .layers
                .iter()
                .enumerate()
                .all(|(i, l)| self.offsets[i + 1] - self.offsets[i] == l.width())
    }

    /// Output layer values from the most recent forward pass.
    #[inline]
    pub fn output(&self) -> &[f64] {
        &self.outputs[self.range(self.offsets.len() - 2)]
    }

    /// All slots of `layer`, bias included.
    #[inline]
    pub fn outputs(&self, layer: usize) -> &[f64] {
        &self.outputs[self.range(layer)]
    }

    #[inline]
    pub fn weighted_sums(&self, layer: usize) -> &[f64] {
        &self.weighted_sums[self.range(layer)]
    }
}

impl Deltas {
    pub fn new(net: &Network) -> Self {
        let offsets = layer_offsets(net);
        let total = offsets[offsets.len() - 1];
        Self {
            offsets,
            errors: vec![0.0; total],
        }
    }

    fn fits(&self, net: &Network) -> bool {
        self.offsets.len() == net.layers.len() + 1
            && net
                .layers
                .iter()
                .enumerate()
                .all(|(i, l)| self.offsets[i + 1] - self.offsets[i] == l.width())
    }

    /// Error terms of `layer`, bias slot included (always zero).
    #[inline]
    pub fn errors(&self, layer: usize) -> &[f64] {
        &self.errors[self.offsets[layer]..self.offsets[layer + 1]]
    }
}
