/*!
The forecasting network: two stacked LSTM layers with dropout and a linear read-out
*/

use crate::data::window::SequenceWindows;
use crate::{Error, GpuFloat, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tch::nn::{self, Linear, Module, RNNConfig, VarStore, LSTM, RNN};
use tch::{Device, Tensor};

pub mod train;

pub use train::{EarlyStopping, Trainer, TrainerConfig, TrainingSummary};

/// The LSTM forecasting model.
///
/// Input windows have shape `[batch, sequence, 1]`; the output is one scaled next value per
/// window, shape `[batch, 1]`.
#[derive(Debug)]
pub struct ForecastLstm {
    /// The descriptor this model was built from
    pub desc: ModelDesc,
    /// The number of values in each input window
    pub sequence_length: usize,
    /// First LSTM layer, whose whole output sequence feeds the second
    pub lstm_layer_1: LSTM,
    /// Second LSTM layer, of which only the last step is kept
    pub lstm_layer_2: LSTM,
    /// This model's linear layer
    pub linear_layer: Linear,
}

impl ForecastLstm {
    /// Run the network. Dropout is only active when `train` is set.
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let (hidden, _) = self.lstm_layer_1.seq(xs);
        let hidden = hidden.dropout(self.desc.dropout, train);
        let (hidden, _) = self.lstm_layer_2.seq(&hidden);
        let last = hidden.select(1, -1).dropout(self.desc.dropout, train);
        self.linear_layer.forward(&last)
    }

    /// Mean squared error of the predictions for `xs` against `ys`
    pub fn loss(&self, xs: &Tensor, ys: &Tensor, train: bool) -> Tensor {
        self.forward_t(xs, train).mse_loss(ys, tch::Reduction::Mean)
    }

    /// Predict the value following each of a batch of windows
    pub fn predict(&self, windows: &[GpuFloat], device: Device) -> Result<Vec<GpuFloat>> {
        self.check_window_inputs(windows.len())?;
        let xs = window_tensor(windows, self.sequence_length, device);
        let ys = tch::no_grad(|| self.forward_t(&xs, false));
        Ok(Vec::<GpuFloat>::try_from(ys.view([-1]).to_device(Device::Cpu))?)
    }

    /// Roll the model forward `horizon` steps from `seed`, appending each prediction to the window
    pub fn forecast(
        &self,
        seed: &[GpuFloat],
        horizon: usize,
        device: Device,
    ) -> Result<Vec<GpuFloat>> {
        let mut window = seed.to_vec();
        let mut predictions = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let next = self.predict(&window, device)?[0];
            predictions.push(next);
            window.remove(0);
            window.push(next);
        }
        Ok(predictions)
    }

    /// Check `len` input values split into whole windows
    fn check_window_inputs(&self, len: usize) -> Result<()> {
        if self.sequence_length == 0 || len == 0 || len % self.sequence_length != 0 {
            return Err(Error::Config(format!(
                "{} input values do not form windows of {}",
                len, self.sequence_length
            )));
        }
        Ok(())
    }
}

/// Pack windowed inputs `[n * sequence_length]` into a `[n, sequence_length, 1]` tensor
pub fn window_tensor(inputs: &[GpuFloat], sequence_length: usize, device: Device) -> Tensor {
    let n = inputs.len() / sequence_length;
    Tensor::from_slice(inputs)
        .view([n as i64, sequence_length as i64, 1])
        .to_device(device)
}

/// Pack all windows and their labels into `(inputs, labels)` tensors
pub fn window_tensors(windows: &SequenceWindows, device: Device) -> (Tensor, Tensor) {
    let xs = window_tensor(windows.inputs(), windows.sequence_length(), device);
    let ys = Tensor::from_slice(windows.labels())
        .view([windows.len() as i64, 1])
        .to_device(device);
    (xs, ys)
}

/// A descriptor for an instance of the ForecastLstm model.
/// The window length is given separately, when building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelDesc {
    /// The width of both LSTM layers
    pub hidden: usize,
    /// Dropout rate after each LSTM layer
    pub dropout: f64,
}

impl Default for ModelDesc {
    fn default() -> ModelDesc {
        ModelDesc {
            hidden: 50,
            dropout: 0.2,
        }
    }
}

impl ModelDesc {
    /// Build a `ForecastLstm` reading windows of `sequence_length` values over a given `VarStore`
    pub fn build(&self, vs: &VarStore, sequence_length: usize) -> ForecastLstm {
        let config = RNNConfig {
            batch_first: true,
            ..Default::default()
        };
        let root = vs.root();
        let lstm_layer_1 = nn::lstm(&root / "lstm1", 1, self.hidden as i64, config);
        let lstm_layer_2 = nn::lstm(&root / "lstm2", self.hidden as i64, self.hidden as i64, config);
        let linear_layer = nn::linear(&root / "linear", self.hidden as i64, 1, Default::default());
        ForecastLstm {
            desc: self.clone(),
            sequence_length,
            lstm_layer_1,
            lstm_layer_2,
            linear_layer,
        }
    }

    /// Rebuild a model saved with `VarStore::save`
    pub fn load(
        &self,
        path: &Path,
        sequence_length: usize,
        device: Device,
    ) -> Result<(VarStore, ForecastLstm)> {
        let mut vs = VarStore::new(device);
        let model = self.build(&vs, sequence_length);
        vs.load(path)?;
        Ok((vs, model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny(vs: &VarStore) -> ForecastLstm {
        ModelDesc {
            hidden: 4,
            dropout: 0.2,
        }
        .build(vs, 5)
    }

    #[test]
    fn output_has_one_value_per_window() {
        let vs = VarStore::new(Device::Cpu);
        let model = tiny(&vs);
        let inputs: Vec<GpuFloat> = (0..15).map(|i| i as GpuFloat / 15.0).collect();
        let xs = window_tensor(&inputs, 5, Device::Cpu);
        assert_eq!(xs.size(), vec![3, 5, 1]);
        assert_eq!(model.forward_t(&xs, true).size(), vec![3, 1]);
        assert_eq!(model.predict(&inputs, Device::Cpu).unwrap().len(), 3);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let vs = VarStore::new(Device::Cpu);
        let model = tiny(&vs);
        let window = [0.1, 0.2, 0.3, 0.4, 0.5];
        let a = model.predict(&window, Device::Cpu).unwrap();
        let b = model.predict(&window, Device::Cpu).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn forecast_rolls_the_window() {
        let vs = VarStore::new(Device::Cpu);
        let model = tiny(&vs);
        let seed = [0.5; 5];
        let path = model.forecast(&seed, 3, Device::Cpu).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], model.predict(&seed, Device::Cpu).unwrap()[0]);
        let second = [0.5, 0.5, 0.5, 0.5, path[0]];
        assert_eq!(path[1], model.predict(&second, Device::Cpu).unwrap()[0]);
    }

    #[test]
    fn ragged_input_is_rejected() {
        let vs = VarStore::new(Device::Cpu);
        let model = tiny(&vs);
        assert!(matches!(
            model.predict(&[0.1; 7], Device::Cpu),
            Err(Error::Config(_))
        ));
    }
}
