//! Network builder.
//!
//! `NetworkBuilder` spells out a topology layer by layer. Layer sizes count real units only;
//! bias units are added by the network itself.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Activation, Error, Network, Result};

#[derive(Debug, Clone)]
/// Builder for a `Network`.
///
/// Example:
///
/// ```rust
/// use stochastic_mlp::{Activation, NetworkBuilder};
///
/// # fn main() -> stochastic_mlp::Result<()> {
/// let net = NetworkBuilder::new(256)?
///     .add_layer(10)?
///     .add_layer(10)?
///     .activation(Activation::Sigmoid)
///     .build_with_seed(0)?;
/// assert_eq!(net.num_layers(), 3);
/// # Ok(())
/// # }
/// ```
pub struct NetworkBuilder {
    units_per_layer: Vec<usize>,
    activation: Activation,
}

impl NetworkBuilder {
    /// Start building a network that accepts inputs of length `input_units`.
    pub fn new(input_units: usize) -> Result<Self> {
        if input_units == 0 {
            return Err(Error::InvalidConfig("input_units must be > 0".to_owned()));
        }
        Ok(Self {
            units_per_layer: vec![input_units],
            activation: Activation::default(),
        })
    }

    /// Convenience constructor from a sizes list, input layer first.
    pub fn from_sizes(sizes: &[usize], activation: Activation) -> Result<Self> {
        let Some((&input, rest)) = sizes.split_first() else {
            return Err(Error::InvalidConfig(
                "sizes must include input and output layers".to_owned(),
            ));
        };
        let mut b = Self::new(input)?.activation(activation);
        for &units in rest {
            b = b.add_layer(units)?;
        }
        Ok(b)
    }

    /// Append a hidden or output layer with `units` non-bias units.
    pub fn add_layer(mut self, units: usize) -> Result<Self> {
        if units == 0 {
            return Err(Error::InvalidConfig("layer units must be > 0".to_owned()));
        }
        self.units_per_layer.push(units);
        Ok(self)
    }

    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Build using a deterministic seed.
    pub fn build_with_seed(self, seed: u64) -> Result<Network> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.build_with_rng(&mut rng)
    }

    /// Build using the provided RNG.
    pub fn build_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Network> {
        if self.units_per_layer.len() < 2 {
            return Err(Error::InvalidConfig(
                "network must have at least one layer after the input".to_owned(),
            ));
        }
        Network::new_with_rng(&self.units_per_layer, self.activation, rng)
    }
}
