//! Activation functions.
//!
//! Every non-input unit computes a weighted sum `z` over the previous layer and then applies
//! the network's activation: `output = activation(z)`.
//!
//! The weighted sum is cached in `Scratch` during the forward pass, and backprop evaluates
//! the derivative on that cached `z` (not on the post-activation output).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Element-wise activation function, applied uniformly to all non-input layers.
pub enum Activation {
    #[default]
    #[serde(rename = "sigmoid")]
    Sigmoid,
    #[serde(rename = "relu")]
    ReLU,
}

impl Activation {
    #[inline]
    pub fn forward(self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => sigmoid(x),
            Activation::ReLU => x.max(0.0),
        }
    }

    /// Derivative of the activation evaluated at the cached weighted sum `x`.
    #[inline]
    pub fn derivative(self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            Activation::ReLU => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::Sigmoid => "sigmoid",
            Activation::ReLU => "relu",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sigmoid" => Ok(Activation::Sigmoid),
            "relu" => Ok(Activation::ReLU),
            _ => Err(Error::UnsupportedActivation(s.to_owned())),
        }
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    // Numerically stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_basic_values() {
        let y0 = Activation::Sigmoid.forward(0.0);
        assert!((y0 - 0.5).abs() < 1e-12);

        let y_pos = Activation::Sigmoid.forward(10.0);
        let y_neg = Activation::Sigmoid.forward(-10.0);
        assert!(y_pos > 0.999);
        assert!(y_neg < 0.001);
        assert!((y_pos + y_neg - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sigmoid_derivative_uses_weighted_sum() {
        assert!((Activation::Sigmoid.derivative(0.0) - 0.25).abs() < 1e-12);

        let x = 0.7;
        let s = Activation::Sigmoid.forward(x);
        assert!((Activation::Sigmoid.derivative(x) - s * (1.0 - s)).abs() < 1e-12);
    }

    #[test]
    fn relu_shape_and_derivative() {
        assert_eq!(Activation::ReLU.forward(-2.0), 0.0);
        assert_eq!(Activation::ReLU.forward(3.0), 3.0);

        assert_eq!(Activation::ReLU.derivative(-1.0), 0.0);
        assert_eq!(Activation::ReLU.derivative(0.0), 0.0);
        assert_eq!(Activation::ReLU.derivative(2.5), 1.0);
    }

    #[test]
    fn parses_names_and_rejects_unknown() {
        assert_eq!("sigmoid".parse::<Activation>().unwrap(), Activation::Sigmoid);
        assert_eq!(" ReLU ".parse::<Activation>().unwrap(), Activation::ReLU);

        let err = "tanh".parse::<Activation>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedActivation(ref name) if name == "tanh"));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Activation::ReLU).unwrap();
        assert_eq!(json, "\"relu\"");
        let act: Activation = serde_json::from_str("\"sigmoid\"").unwrap();
        assert_eq!(act, Activation::Sigmoid);
    }
}
