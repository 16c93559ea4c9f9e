use crate::{Dataset, Error, Instance, Network, Result, Trainer};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainConfig {
    pub learning_rate: f64,
    pub epochs: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 125,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".to_owned()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub epochs: usize,
    /// Weight updates applied, `epochs * len`.
    pub steps: usize,
    /// Mean per-sample squared-error loss over the final epoch.
    pub final_loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalReport {
    pub correct: usize,
    pub total: usize,
}

impl EvalReport {
    /// Fraction of correctly classified samples; `0.0` for an empty set.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

impl Network {
    /// Train with online SGD: one weight update per sample, `cfg.epochs` passes over `data`.
    ///
    /// Buffers are allocated once up front; the per-sample loop does not allocate.
    pub fn train(&mut self, data: &Dataset, cfg: TrainConfig) -> Result<TrainReport> {
        cfg.validate()?;
        self.check_dataset(data)?;

        log::info!(
            "training {:?} ({}) on {} instances: {} epochs, learning rate {}",
            self.layers().iter().map(|l| l.units()).collect::<Vec<_>>(),
            self.activation(),
            data.len(),
            cfg.epochs,
            cfg.learning_rate
        );

        let mut trainer = Trainer::new(self);
        let mut epoch_loss = 0.0_f64;

        for epoch in 0..cfg.epochs {
            epoch_loss = 0.0;
            for (input, label) in data.iter() {
                epoch_loss += self.train_step(input, label, cfg.learning_rate, &mut trainer);
            }
            log::debug!(
                "epoch {}/{}: mean loss {:.6}",
                epoch + 1,
                cfg.epochs,
                epoch_loss / data.len() as f64
            );
        }

        let report = TrainReport {
            epochs: cfg.epochs,
            steps: cfg.epochs * data.len(),
            final_loss: epoch_loss / data.len() as f64,
        };
        log::info!(
            "training finished after {} steps, final loss {:.6}",
            report.steps,
            report.final_loss
        );
        Ok(report)
    }

    /// Same as [`Network::train`] for a slice of instances.
    pub fn train_instances(
        &mut self,
        instances: &[Instance],
        cfg: TrainConfig,
    ) -> Result<TrainReport> {
        let data = Dataset::from_instances(instances)?;
        self.train(&data, cfg)
    }

    /// Classify every sample and count matches against its label.
    pub fn evaluate(&self, data: &Dataset) -> Result<EvalReport> {
        self.check_dataset(data)?;

        let mut scratch = self.scratch();
        let mut correct = 0;
        for (input, label) in data.iter() {
            let predicted = self.classify_with(input, &mut scratch)?;
            if predicted == label {
                correct += 1;
            } else {
                log::trace!("misclassified: expected {label}, got {predicted}");
            }
        }

        let report = EvalReport {
            correct,
            total: data.len(),
        };
        log::info!(
            "correctly classified {}/{} ({:.4})",
            report.correct,
            report.total,
            report.accuracy()
        );
        Ok(report)
    }

    /// Predicted class for every sample in `data`.
    pub fn predict(&self, data: &Dataset) -> Result<Vec<usize>> {
        self.check_dataset(data)?;
        let mut scratch = self.scratch();
        data.iter()
            .map(|(input, _)| self.classify_with(input, &mut scratch))
            .collect()
    }

    fn check_dataset(&self, data: &Dataset) -> Result<()> {
        if data.is_empty() {
            return Err(Error::InvalidData("dataset must not be empty".to_owned()));
        }
        if data.input_dim() != self.input_units() {
            return Err(Error::InvalidShape(format!(
                "dataset input_dim {} does not match network input_units {}",
                data.input_dim(),
                self.input_units()
            )));
        }
        if let Some((idx, &label)) = data
            .labels()
            .iter()
            .enumerate()
            .find(|&(_, &l)| l >= self.output_units())
        {
            return Err(Error::InvalidData(format!(
                "label {label} of sample {idx} is out of range for {} output units",
                self.output_units()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Activation;

    fn tiny() -> Dataset {
        Dataset::from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0]], &[0, 1]).unwrap()
    }

    #[test]
    fn rejects_bad_hyperparameters() {
        let mut net = Network::new_with_seed(&[2, 2, 2], Activation::Sigmoid, 0).unwrap();
        let data = tiny();

        let zero_epochs = TrainConfig {
            epochs: 0,
            ..TrainConfig::default()
        };
        assert!(matches!(net.train(&data, zero_epochs), Err(Error::InvalidConfig(_))));

        for lr in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            let cfg = TrainConfig {
                learning_rate: lr,
                epochs: 1,
            };
            assert!(net.train(&data, cfg).is_err(), "lr {lr} accepted");
        }
    }

    #[test]
    fn rejects_mismatched_data() {
        let mut net = Network::new_with_seed(&[3, 2, 2], Activation::Sigmoid, 0).unwrap();
        let cfg = TrainConfig::default();
        assert!(matches!(net.train(&tiny(), cfg), Err(Error::InvalidShape(_))));

        let mut net = Network::new_with_seed(&[2, 2, 2], Activation::Sigmoid, 0).unwrap();
        let bad_label = Dataset::from_rows(&[vec![0.0, 1.0]], &[2]).unwrap();
        assert!(matches!(net.train(&bad_label, cfg), Err(Error::InvalidData(_))));

        let empty = Dataset::from_flat(vec![], vec![], 2).unwrap();
        assert!(net.evaluate(&empty).is_err());
    }

    #[test]
    fn trains_from_instances() {
        let instances = vec![
            Instance::new(vec![0.0, 1.0], 0),
            Instance::new(vec![1.0, 0.0], 1),
        ];
        let mut net = Network::new_with_seed(&[2, 4, 2], Activation::Sigmoid, 2).unwrap();
        let report = net
            .train_instances(
                &instances,
                TrainConfig {
                    learning_rate: 1.0,
                    epochs: 2000,
                },
            )
            .unwrap();
        assert_eq!(report.steps, 4000);

        let data = Dataset::from_instances(&instances).unwrap();
        assert_eq!(net.evaluate(&data).unwrap().accuracy(), 1.0);
    }

    #[test]
    fn train_instances_rejects_empty_and_ragged_input() {
        let mut net = Network::new_with_seed(&[2, 2, 2], Activation::Sigmoid, 0).unwrap();
        let before = net.dense(0).unwrap().weights().to_vec();
        let cfg = TrainConfig::default();

        assert!(matches!(
            net.train_instances(&[], cfg),
            Err(Error::InvalidData(_))
        ));
        let ragged = vec![
            Instance::new(vec![0.0, 1.0], 0),
            Instance::new(vec![1.0], 1),
        ];
        assert!(matches!(
            net.train_instances(&ragged, cfg),
            Err(Error::InvalidData(_))
        ));
        assert_eq!(net.dense(0).unwrap().weights(), &before[..]);
    }

    #[test]
    fn failed_validation_leaves_weights_untouched() {
        let mut net = Network::new_with_seed(&[2, 2, 2], Activation::Sigmoid, 4).unwrap();
        let before = net.dense(0).unwrap().weights().to_vec();
        let bad_label = Dataset::from_rows(&[vec![0.0, 1.0], vec![1.0, 1.0]], &[0, 5]).unwrap();
        assert!(net.train(&bad_label, TrainConfig::default()).is_err());
        assert_eq!(net.dense(0).unwrap().weights(), &before[..]);
    }

    #[test]
    fn report_counts_steps() {
        let mut net = Network::new_with_seed(&[2, 2, 2], Activation::Sigmoid, 0).unwrap();
        let report = net
            .train(
                &tiny(),
                TrainConfig {
                    learning_rate: 0.5,
                    epochs: 7,
                },
            )
            .unwrap();
        assert_eq!(report.epochs, 7);
        assert_eq!(report.steps, 14);
        assert!(report.final_loss.is_finite() && report.final_loss > 0.0);
    }

    #[test]
    fn accuracy_of_empty_report_is_zero() {
        let r = EvalReport {
            correct: 0,
            total: 0,
        };
        assert_eq!(r.accuracy(), 0.0);
        let r = EvalReport {
            correct: 3,
            total: 4,
        };
        assert_eq!(r.accuracy(), 0.75);
    }
}
