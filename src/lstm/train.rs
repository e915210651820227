/*!
Fitting a [`ForecastLstm`] to a set of sequence windows
*/
use super::{window_tensors, ForecastLstm};
use crate::data::window::SequenceWindows;
use crate::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tch::nn::{self, OptimizerConfig, VarStore};
use tch::{Device, Tensor};

/// Optimisation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Maximum number of passes over the windows
    pub epochs: usize,
    /// Windows per optimisation step
    pub batch_size: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Epochs without improvement of the training loss before stopping
    pub patience: usize,
    /// Seed for weight initialisation and shuffling
    pub seed: u64,
    /// Show a progress bar on the terminal
    pub progress: bool,
}

impl Default for TrainerConfig {
    fn default() -> TrainerConfig {
        TrainerConfig {
            epochs: 100,
            batch_size: 32,
            learning_rate: 0.001,
            patience: 10,
            seed: 42,
            progress: true,
        }
    }
}

/// What happened during training
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    /// Number of epochs actually run
    pub epochs_run: usize,
    /// The epoch whose parameters were kept, counting from zero
    pub best_epoch: usize,
    /// The mean training loss of that epoch
    pub best_loss: f64,
    /// The mean training loss of every epoch run
    pub losses: Vec<f64>,
    /// Whether training ended before the epoch limit
    pub stopped_early: bool,
}

/// The verdict of [`EarlyStopping`] on an epoch
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Patience {
    /// The loss improved on the best so far
    Improved,
    /// No improvement, but patience remains
    Waiting,
    /// Patience ran out
    Exhausted,
}

/// Stop when a monitored loss has not strictly improved for `patience` consecutive epochs
#[derive(Debug, Clone, PartialEq)]
pub struct EarlyStopping {
    /// Allowed epochs without improvement
    pub patience: usize,
    /// The best loss seen so far
    pub best: f64,
    /// The epoch the best loss was seen in
    pub best_epoch: usize,
    /// Epochs since the last improvement
    pub wait: usize,
}

impl EarlyStopping {
    /// Start monitoring
    pub fn new(patience: usize) -> EarlyStopping {
        EarlyStopping {
            patience,
            best: f64::INFINITY,
            best_epoch: 0,
            wait: 0,
        }
    }

    /// Record an epoch's loss
    pub fn update(&mut self, epoch: usize, loss: f64) -> Patience {
        if loss < self.best {
            self.best = loss;
            self.best_epoch = epoch;
            self.wait = 0;
            return Patience::Improved;
        }
        self.wait += 1;
        if self.wait >= self.patience {
            Patience::Exhausted
        } else {
            Patience::Waiting
        }
    }
}

/// A deep copy of every variable in a `VarStore`
fn snapshot(vs: &VarStore) -> HashMap<String, Tensor> {
    tch::no_grad(|| {
        vs.variables()
            .into_iter()
            .map(|(name, var)| (name, var.detach().copy()))
            .collect()
    })
}

/// Overwrite the variables of a `VarStore` with a snapshot
fn restore(vs: &VarStore, saved: &HashMap<String, Tensor>) {
    tch::no_grad(|| {
        for (name, mut var) in vs.variables() {
            if let Some(value) = saved.get(&name) {
                var.copy_(value);
            }
        }
    })
}

/// Fits a model on all of the windows it is given. There is no validation split.
#[derive(Debug, Clone)]
pub struct Trainer {
    /// The settings in use
    pub config: TrainerConfig,
    /// Where tensors live
    pub device: Device,
}

impl Trainer {
    /// Create a trainer
    pub fn new(config: TrainerConfig, device: Device) -> Trainer {
        Trainer { config, device }
    }

    /// Train `model`, whose variables live in `vs`, leaving the best epoch's parameters in place
    pub fn fit(
        &self,
        model: &ForecastLstm,
        vs: &VarStore,
        windows: &SequenceWindows,
    ) -> Result<TrainingSummary> {
        let mut opt = nn::Adam::default().build(vs, self.config.learning_rate)?;
        let (xs, ys) = window_tensors(windows, self.device);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut order: Vec<i64> = (0..windows.len() as i64).collect();
        let batch_size = self.config.batch_size.max(1);

        let epochs_progress = if self.config.progress {
            ProgressBar::new(self.config.epochs as u64)
        } else {
            ProgressBar::hidden()
        };
        epochs_progress
            .set_style(ProgressStyle::default_bar().template("[{msg:<15}] {wide_bar} {pos:>4}/{len:4}"));
        epochs_progress.set_message("no loss");

        let mut stopping = EarlyStopping::new(self.config.patience);
        let mut best = snapshot(vs);
        let mut losses = Vec::with_capacity(self.config.epochs);
        let mut stopped_early = false;

        for epoch in 0..self.config.epochs {
            order.shuffle(&mut rng);
            let mut sum_loss = 0.0;
            let mut seen = 0;
            for batch in order.chunks(batch_size) {
                let index = Tensor::from_slice(batch).to_device(self.device);
                let input_batch = xs.index_select(0, &index);
                let output_batch = ys.index_select(0, &index);
                let loss = model.loss(&input_batch, &output_batch, true);
                opt.backward_step(&loss);
                // Weight by batch size, so a short final batch counts for less
                sum_loss += f64::try_from(&loss)? * batch.len() as f64;
                seen += batch.len();
            }
            let epoch_loss = sum_loss / seen.max(1) as f64;
            losses.push(epoch_loss);
            debug!("Epoch {}: training loss = {:.6}", epoch, epoch_loss);
            epochs_progress.set_message(&format!("loss = {:.5}", epoch_loss));
            epochs_progress.inc(1);

            match stopping.update(epoch, epoch_loss) {
                Patience::Improved => best = snapshot(vs),
                Patience::Waiting => {}
                Patience::Exhausted => {
                    warn!(
                        "Early stopping at epoch {}: no improvement for {} epochs",
                        epoch, stopping.patience
                    );
                    stopped_early = true;
                    break;
                }
            }
        }
        epochs_progress.finish_and_clear();

        if !losses.is_empty() {
            restore(vs, &best);
            info!(
                "Kept parameters of epoch {} (training loss {:.6})",
                stopping.best_epoch, stopping.best
            );
        }
        Ok(TrainingSummary {
            epochs_run: losses.len(),
            best_epoch: stopping.best_epoch,
            best_loss: stopping.best,
            losses,
            stopped_early,
        })
    }
}
