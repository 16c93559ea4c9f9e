/// Read-only view of a single unit after the most recent forward/backward pass.
///
/// The scalar fields are copied out of a `Trainer`'s buffers; `outgoing_weights` borrows
/// from the `Network`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unit<'a> {
    pub output: f64,
    /// Pre-activation value; zero for input and bias units.
    pub weighted_sum: f64,
    /// Backprop δ; always zero for input, bias and not-yet-trained units.
    pub error: f64,
    /// Indexed by destination unit in the next layer; empty for output units.
    pub outgoing_weights: &'a [f64],
    pub is_bias: bool,
}

impl Unit<'_> {
    #[inline]
    pub fn outgoing_weight(&self, dst: usize) -> Option<f64> {
        self.outgoing_weights.get(dst).copied()
    }

    #[inline]
    pub fn fan_out(&self) -> usize {
        self.outgoing_weights.len()
    }
}
