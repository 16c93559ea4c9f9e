//! Feed-forward classifier training with hardware-oriented weight export.
//!
//! `stochastic-mlp` trains a fully-connected network with online backpropagation and writes
//! the learned weights out for two embedded targets: C firmware literals and a 12-bit
//! fixed-point memory image. A stochastic-computing emulator sits alongside to measure how
//! much precision a given bitstream length buys before it is committed to hardware.
//!
//! # Topology
//!
//! - Every layer except the output layer carries a trailing bias unit whose output is
//!   pinned to `1.0`.
//! - Every unit of layer `i` (bias included) has one outgoing weight per non-bias unit of
//!   layer `i + 1`. Weights are stored per layer as row-major `(source, destination)`
//!   matrices in [`Dense`].
//! - One activation ([`Activation::Sigmoid`] or [`Activation::ReLU`]) applies to every
//!   non-input layer.
//!
//! # Panics vs `Result`
//!
//! - Low-level hot path (panics on misuse): [`Network::forward`], [`Network::backward`],
//!   [`Network::sgd_step`], [`Network::train_step`]. Shape mismatches are programmer error.
//! - Shape-checked API: [`Network::train`], [`Network::evaluate`], [`Network::classify`],
//!   the exporters. These return [`Result`].
//!
//! # Quick start
//!
//! ```rust
//! use stochastic_mlp::{Activation, Dataset, Network, TrainConfig, WeightExporter};
//!
//! # fn main() -> stochastic_mlp::Result<()> {
//! let xs = vec![vec![0.1, 0.2], vec![0.2, 0.1], vec![0.8, 0.9], vec![0.9, 0.8]];
//! let data = Dataset::from_rows(&xs, &[0, 0, 1, 1])?;
//!
//! let mut net = Network::new_with_seed(&[2, 4, 2], Activation::Sigmoid, 0)?;
//! net.train(&data, TrainConfig { learning_rate: 0.5, epochs: 200 })?;
//! let _class = net.classify(&[0.85, 0.85])?;
//!
//! let image = WeightExporter::default().memory_image_string(&net)?;
//! assert!(image.starts_with("// Weights from layer 0 to layer 1"));
//! # Ok(())
//! # }
//! ```
//!
//! # Allocation-free training (advanced)
//!
//! Drive the loop yourself by allocating a [`Trainer`] once and reusing it:
//!
//! ```rust
//! use stochastic_mlp::{Activation, Network};
//!
//! # fn main() -> stochastic_mlp::Result<()> {
//! let mut net = Network::new_with_seed(&[3, 8, 2], Activation::ReLU, 0)?;
//! let mut trainer = net.trainer();
//! let loss = net.train_step(&[0.1, -0.2, 0.3], 1, 0.05, &mut trainer);
//! assert!(loss >= 0.0);
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod builder;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod layer;
pub mod network;
pub mod stochastic;
pub mod train;
pub mod unit;

pub use activation::Activation;
pub use builder::NetworkBuilder;
pub use config::RunConfig;
pub use data::{Dataset, Instance};
pub use error::{Error, Result};
pub use export::{ExportTarget, FixedPoint, Overflow, WeightExporter};
pub use layer::{Dense, Layer};
pub use network::{Deltas, Network, Scratch, Trainer};
pub use stochastic::{Bitstream, StochasticArithmetic, StudyPoint};
pub use train::{EvalReport, TrainConfig, TrainReport};
pub use unit::Unit;
