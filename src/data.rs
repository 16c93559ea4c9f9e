//! Contiguous dataset helpers.
//!
//! The training loop operates on slices to avoid per-step allocations. `Dataset` stores
//! validated, row-major feature vectors next to their class labels.
//!
//! The line format understood by [`parse_line`] is whitespace-separated numbers: the
//! feature values followed by one one-hot column per class (the semeion handwritten
//! digits layout is 256 features and 10 classes).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::{Error, Result};

/// A single labelled sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub input: Vec<f64>,
    pub label: usize,
}

impl Instance {
    pub fn new(input: Vec<f64>, label: usize) -> Self {
        Self { input, label }
    }
}

/// A supervised classification dataset.
///
/// Stored as a contiguous buffer with row-major layout:
/// - `inputs.len() == len * input_dim`
/// - `labels.len() == len`
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    inputs: Vec<f64>,
    labels: Vec<usize>,
    input_dim: usize,
}

impl Dataset {
    /// Build a dataset from a flat buffer with shape `(len, input_dim)`.
    pub fn from_flat(inputs: Vec<f64>, labels: Vec<usize>, input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidData("input_dim must be > 0".to_owned()));
        }
        if inputs.len() != labels.len() * input_dim {
            return Err(Error::InvalidData(format!(
                "inputs length {} does not match len * input_dim ({} * {})",
                inputs.len(),
                labels.len(),
                input_dim
            )));
        }
        Ok(Self {
            inputs,
            labels,
            input_dim,
        })
    }

    /// Build a dataset from per-sample rows.
    ///
    /// This is a convenience constructor (it copies into contiguous storage).
    pub fn from_rows(inputs: &[Vec<f64>], labels: &[usize]) -> Result<Self> {
        if inputs.len() != labels.len() {
            return Err(Error::InvalidData(format!(
                "inputs/labels length mismatch: {} vs {}",
                inputs.len(),
                labels.len()
            )));
        }
        let input_dim = inputs.first().map(Vec::len).unwrap_or(0);
        if input_dim == 0 {
            return Err(Error::InvalidData(
                "dataset must have at least one non-empty input row".to_owned(),
            ));
        }

        let mut flat = Vec::with_capacity(inputs.len() * input_dim);
        for (i, row) in inputs.iter().enumerate() {
            if row.len() != input_dim {
                return Err(Error::InvalidData(format!(
                    "input row {i} has len {}, expected {input_dim}",
                    row.len()
                )));
            }
            flat.extend_from_slice(row);
        }

        Ok(Self {
            inputs: flat,
            labels: labels.to_vec(),
            input_dim,
        })
    }

    pub fn from_instances(instances: &[Instance]) -> Result<Self> {
        let rows: Vec<Vec<f64>> = instances.iter().map(|i| i.input.clone()).collect();
        let labels: Vec<usize> = instances.iter().map(|i| i.label).collect();
        Self::from_rows(&rows, &labels)
    }

    /// Parse every non-blank line of `reader` with [`parse_line`].
    pub fn from_reader<R: BufRead>(reader: R, num_inputs: usize, num_classes: usize) -> Result<Self> {
        let mut inputs = Vec::new();
        let mut labels = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let instance = parse_line(&line, num_inputs, num_classes)
                .map_err(|e| Error::InvalidData(format!("line {}: {e}", lineno + 1)))?;
            inputs.extend_from_slice(&instance.input);
            labels.push(instance.label);
        }
        log::debug!("parsed {} instances", labels.len());
        Self::from_flat(inputs, labels, num_inputs)
    }

    pub fn load<P: AsRef<Path>>(path: P, num_inputs: usize, num_classes: usize) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file), num_inputs, num_classes)
    }

    #[inline]
    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    /// Returns true if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[inline]
    /// Returns the per-sample input dimension.
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    #[inline]
    /// Returns the `idx`-th input row (shape: `(input_dim,)`).
    ///
    /// Panics if `idx >= len`.
    pub fn input(&self, idx: usize) -> &[f64] {
        let start = idx * self.input_dim;
        &self.inputs[start..start + self.input_dim]
    }

    #[inline]
    /// Panics if `idx >= len`.
    pub fn label(&self, idx: usize) -> usize {
        self.labels[idx]
    }

    #[inline]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[f64], usize)> + '_ {
        self.inputs
            .chunks_exact(self.input_dim)
            .zip(self.labels.iter().copied())
    }

    /// Largest label plus one, or 0 for an empty dataset.
    pub fn num_classes(&self) -> usize {
        self.labels.iter().max().map_or(0, |&m| m + 1)
    }

    /// Permute the samples in place.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);

        let mut inputs = Vec::with_capacity(self.inputs.len());
        let mut labels = Vec::with_capacity(self.labels.len());
        for idx in order {
            inputs.extend_from_slice(self.input(idx));
            labels.push(self.labels[idx]);
        }
        self.inputs = inputs;
        self.labels = labels;
    }

    /// Split into `(train, test)`.
    ///
    /// The first `floor(len * test_fraction)` samples become the test set, the remainder
    /// the training set. Shuffle first if the source is ordered by class.
    pub fn split(&self, test_fraction: f64) -> Result<(Dataset, Dataset)> {
        if !(test_fraction.is_finite() && (0.0..1.0).contains(&test_fraction)) {
            return Err(Error::InvalidConfig(format!(
                "test_fraction must be in [0, 1), got {test_fraction}"
            )));
        }
        let cutoff = (self.len() as f64 * test_fraction).floor() as usize;
        let at = cutoff * self.input_dim;

        let test = Dataset {
            inputs: self.inputs[..at].to_vec(),
            labels: self.labels[..cutoff].to_vec(),
            input_dim: self.input_dim,
        };
        let train = Dataset {
            inputs: self.inputs[at..].to_vec(),
            labels: self.labels[cutoff..].to_vec(),
            input_dim: self.input_dim,
        };
        Ok((train, test))
    }

    pub fn to_instances(&self) -> Vec<Instance> {
        self.iter()
            .map(|(input, label)| Instance::new(input.to_vec(), label))
            .collect()
    }
}

/// Parse one whitespace-separated line: `num_inputs` feature values followed by
/// `num_classes` one-hot label columns.
pub fn parse_line(line: &str, num_inputs: usize, num_classes: usize) -> Result<Instance> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < num_inputs + num_classes {
        return Err(Error::InvalidData(format!(
            "expected {} fields, found {}",
            num_inputs + num_classes,
            fields.len()
        )));
    }

    let parse = |s: &str| {
        s.parse::<f64>()
            .map_err(|e| Error::InvalidData(format!("bad number `{s}`: {e}")))
    };

    let input = fields[..num_inputs]
        .iter()
        .map(|&s| parse(s))
        .collect::<Result<Vec<f64>>>()?;

    let mut label = None;
    for (class, &s) in fields[num_inputs..num_inputs + num_classes].iter().enumerate() {
        if parse(s)? == 1.0 {
            label = Some(class);
            break;
        }
    }
    let label = label.ok_or_else(|| Error::InvalidData("no one-hot label column is set".to_owned()))?;

    Ok(Instance { input, label })
}
