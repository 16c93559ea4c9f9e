//! Run configuration.
//!
//! A `RunConfig` collects everything the command line needs to reproduce a training run:
//! topology, activation, hyperparameters, the bitstream length used as the fixed-point
//! export scale, the seed and the test split. It is read from JSON; missing fields take
//! their defaults and unknown fields are rejected.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::stochastic::DEFAULT_BITSTREAM_LENGTH;
use crate::{Activation, Error, Network, Result, TrainConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Input layer first, output layer last.
    pub units_per_layer: Vec<usize>,
    pub activation: Activation,
    pub learning_rate: f64,
    pub epochs: usize,
    pub bitstream_length: usize,
    pub seed: u64,
    /// Leading fraction of the shuffled data held out for evaluation.
    pub test_fraction: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        let train = TrainConfig::default();
        Self {
            units_per_layer: vec![256, 10, 10],
            activation: Activation::Sigmoid,
            learning_rate: train.learning_rate,
            epochs: train.epochs,
            bitstream_length: DEFAULT_BITSTREAM_LENGTH,
            seed: 0,
            test_fraction: 0.2,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.units_per_layer.len() < 2 {
            return Err(Error::InvalidConfig(
                "units_per_layer must include input and output layers".to_owned(),
            ));
        }
        if self.units_per_layer.contains(&0) {
            return Err(Error::InvalidConfig(
                "all layer sizes must be > 0".to_owned(),
            ));
        }
        if self.bitstream_length < 2 {
            return Err(Error::InvalidConfig(format!(
                "bitstream_length must be >= 2, got {}",
                self.bitstream_length
            )));
        }
        if !(self.test_fraction.is_finite() && (0.0..1.0).contains(&self.test_fraction)) {
            return Err(Error::InvalidConfig(format!(
                "test_fraction must be in [0, 1), got {}",
                self.test_fraction
            )));
        }
        self.train_config().validate()
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| Error::InvalidConfig(format!("bad run config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let cfg = Self::from_json_str(&data)?;
        log::debug!("loaded run config from {}: {cfg:?}", path.display());
        Ok(cfg)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("cannot serialize run config: {e}")))
    }

    #[inline]
    pub fn input_units(&self) -> usize {
        self.units_per_layer.first().copied().unwrap_or(0)
    }

    #[inline]
    pub fn output_units(&self) -> usize {
        self.units_per_layer.last().copied().unwrap_or(0)
    }

    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            learning_rate: self.learning_rate,
            epochs: self.epochs,
        }
    }

    /// Fresh network with weights drawn from `seed`.
    pub fn build_network(&self) -> Result<Network> {
        Network::new_with_seed(&self.units_per_layer, self.activation, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_digit_network() {
        let cfg = RunConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.input_units(), 256);
        assert_eq!(cfg.output_units(), 10);
        assert_eq!(cfg.learning_rate, 0.1);
        assert_eq!(cfg.epochs, 125);
        assert_eq!(cfg.bitstream_length, 1024);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = RunConfig::from_json_str(
            r#"{ "units_per_layer": [2, 8, 2], "activation": "relu", "epochs": 10 }"#,
        )
        .unwrap();
        assert_eq!(cfg.units_per_layer, vec![2, 8, 2]);
        assert_eq!(cfg.activation, Activation::ReLU);
        assert_eq!(cfg.epochs, 10);
        assert_eq!(cfg.test_fraction, 0.2);

        let net = cfg.build_network().unwrap();
        assert_eq!(net.input_units(), 2);
        assert_eq!(net.activation(), Activation::ReLU);
    }

    #[test]
    fn rejects_unknown_fields_and_bad_values() {
        assert!(RunConfig::from_json_str(r#"{ "epoch": 3 }"#).is_err());
        assert!(RunConfig::from_json_str(r#"{ "activation": "tanh" }"#).is_err());
        assert!(RunConfig::from_json_str(r#"{ "units_per_layer": [4] }"#).is_err());
        assert!(RunConfig::from_json_str(r#"{ "units_per_layer": [4, 0, 2] }"#).is_err());
        assert!(RunConfig::from_json_str(r#"{ "learning_rate": 0.0 }"#).is_err());
        assert!(RunConfig::from_json_str(r#"{ "test_fraction": 1.0 }"#).is_err());
        assert!(RunConfig::from_json_str(r#"{ "bitstream_length": 1 }"#).is_err());
    }

    #[test]
    fn json_round_trip() {
        let cfg = RunConfig {
            seed: 42,
            ..RunConfig::default()
        };
        let back = RunConfig::from_json_str(&cfg.to_json_pretty().unwrap()).unwrap();
        assert_eq!(back, cfg);
    }
}
