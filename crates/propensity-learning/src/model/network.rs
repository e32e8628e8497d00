//! Network variant: a feed-forward network with ReLU hidden layers.
//!
//! Built and trained with burn on the CPU `NdArray` backend. The output layer
//! is a single linear unit producing a logit; the probability is its sigmoid.
//! Training minimises binary cross-entropy on the logits with Adam over
//! shuffled mini-batches. Weights start Glorot-uniform from the fit seed,
//! biases at zero.

use super::{FitContext, PropensityModel};
use crate::config::NetworkParams;
use crate::error::TrainingError;
use crate::metrics::{accuracy, binarize, roc_auc};
use crate::types::EpochMetrics;
use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::module::{AutodiffModule, Param};
use burn::nn::loss::BinaryCrossEntropyLossConfig;
use burn::nn::{Initializer, Linear, LinearConfig, Relu};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::distributions::{Distribution, Uniform};
use rand::prelude::*;
use rand::rngs::StdRng;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

type InferenceBackend = NdArray;
type TrainingBackend = Autodiff<InferenceBackend>;

/// ReLU hidden layers followed by one logit unit.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
    activation: Relu,
}

impl<B: Backend> Mlp<B> {
    fn new(n_inputs: usize, hidden_layers: &[usize], rng: &mut StdRng, device: &B::Device) -> Self {
        let mut fan_in = n_inputs;
        let mut hidden = Vec::with_capacity(hidden_layers.len());
        for &width in hidden_layers {
            hidden.push(glorot_linear(fan_in, width, rng, device));
            fan_in = width;
        }

        Self {
            hidden,
            output: glorot_linear(fan_in, 1, rng, device),
            activation: Relu::new(),
        }
    }

    /// Output logits, shape `[rows, 1]`.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self
            .hidden
            .iter()
            .fold(input, |x, layer| self.activation.forward(layer.forward(x)));
        self.output.forward(x)
    }
}

/// Dense layer with Glorot-uniform weights drawn from `rng` and zero bias.
fn glorot_linear<B: Backend>(
    fan_in: usize,
    fan_out: usize,
    rng: &mut StdRng,
    device: &B::Device,
) -> Linear<B> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    let dist = Uniform::new_inclusive(-limit, limit);
    let weights: Vec<f32> = (0..fan_in * fan_out)
        .map(|_| dist.sample(&mut *rng) as f32)
        .collect();

    let mut layer = LinearConfig::new(fan_in, fan_out)
        .with_initializer(Initializer::Zeros)
        .init(device);
    let weight = Tensor::<B, 2>::from_data(TensorData::new(weights, [fan_in, fan_out]), device);
    layer.weight = Param::from_tensor(weight.require_grad());
    layer
}

/// Selected rows of `features` as an `f32` tensor.
fn rows_tensor<B: Backend>(
    features: ArrayView2<f64>,
    rows: &[usize],
    device: &B::Device,
) -> Tensor<B, 2> {
    let values: Vec<f32> = rows
        .iter()
        .flat_map(|&r| features.row(r).into_iter().map(|&v| v as f32))
        .collect();
    Tensor::from_data(TensorData::new(values, [rows.len(), features.ncols()]), device)
}

fn targets_tensor<B: Backend>(
    targets: ArrayView1<f64>,
    rows: &[usize],
    device: &B::Device,
) -> Tensor<B, 1, Int> {
    let values: Vec<i64> = rows.iter().map(|&r| i64::from(targets[r] > 0.0)).collect();
    Tensor::from_data(TensorData::new(values, [rows.len()]), device)
}

fn probabilities<B: Backend>(
    module: &Mlp<B>,
    features: ArrayView2<f64>,
    device: &B::Device,
) -> Array1<f64> {
    if features.nrows() == 0 {
        return Array1::zeros(0);
    }
    let rows: Vec<usize> = (0..features.nrows()).collect();
    let logits = module.forward(rows_tensor(features, &rows, device));
    sigmoid(logits)
        .into_data()
        .iter::<f32>()
        .map(f64::from)
        .collect()
}

/// A fitted feed-forward network.
pub struct NetworkModel {
    module: Mutex<Mlp<InferenceBackend>>,
    layer_sizes: Vec<usize>,
}

impl NetworkModel {
    fn from_module(module: Mlp<InferenceBackend>, layer_sizes: Vec<usize>) -> Self {
        Self {
            module: Mutex::new(module),
            layer_sizes,
        }
    }

    /// Units per layer, input first and the single output unit last.
    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    fn module(&self) -> std::sync::MutexGuard<'_, Mlp<InferenceBackend>> {
        self.module.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clone for NetworkModel {
    fn clone(&self) -> Self {
        Self::from_module(self.module().clone(), self.layer_sizes.clone())
    }
}

impl std::fmt::Debug for NetworkModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkModel")
            .field("layer_sizes", &self.layer_sizes)
            .finish()
    }
}

impl PropensityModel for NetworkModel {
    type Params = NetworkParams;

    fn fit(
        features: ArrayView2<f64>,
        labels: ArrayView1<f64>,
        params: &NetworkParams,
        ctx: &mut FitContext<'_>,
    ) -> Result<Self, TrainingError> {
        params.validate()?;

        let mut rng = match ctx.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let device = NdArrayDevice::default();
        let targets = binarize(labels);
        let n_rows = features.nrows();

        let mut module: Mlp<TrainingBackend> =
            Mlp::new(features.ncols(), &params.hidden_layers, &mut rng, &device);
        let mut optimizer = AdamConfig::new()
            .with_beta_1(params.beta1 as f32)
            .with_beta_2(params.beta2 as f32)
            .with_epsilon(params.epsilon as f32)
            .init();
        let loss_fn = BinaryCrossEntropyLossConfig::new()
            .with_logits(true)
            .init::<TrainingBackend>(&device);
        let mut order: Vec<usize> = (0..n_rows).collect();

        for epoch in 1..=params.epochs {
            order.shuffle(&mut rng);

            let mut total_loss = 0.0;
            for batch in order.chunks(params.batch_size) {
                let x = rows_tensor::<TrainingBackend>(features, batch, &device);
                let y = targets_tensor::<TrainingBackend>(targets.view(), batch, &device);
                let logits = module.forward(x).reshape([batch.len()]);
                let loss = loss_fn.forward(logits, y);

                total_loss += loss.clone().into_scalar().elem::<f64>() * batch.len() as f64;

                let grads = GradientsParams::from_grads(loss.backward(), &module);
                module = optimizer.step(params.learning_rate, module, grads);
            }

            let loss = total_loss / n_rows as f64;
            if !loss.is_finite() {
                return Err(TrainingError::Diverged { epoch });
            }

            let probs = probabilities(&module.valid(), features, &device);
            let metrics = EpochMetrics {
                epoch,
                loss,
                accuracy: accuracy(probs.view(), targets.view()),
                auc: roc_auc(probs.view(), targets.view()),
            };
            debug!(
                "Epoch {}/{}: loss {:.4}, accuracy {:.4}, auc {}",
                epoch,
                params.epochs,
                metrics.loss,
                metrics.accuracy,
                metrics.auc.map_or("n/a".to_string(), |a| format!("{a:.4}"))
            );
            ctx.record(metrics);
        }

        let mut layer_sizes = Vec::with_capacity(params.hidden_layers.len() + 2);
        layer_sizes.push(features.ncols());
        layer_sizes.extend_from_slice(&params.hidden_layers);
        layer_sizes.push(1);

        Ok(Self::from_module(module.valid(), layer_sizes))
    }

    fn predict_proba(&self, features: ArrayView2<f64>) -> Array1<f64> {
        probabilities(&*self.module(), features, &NdArrayDevice::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_params() -> NetworkParams {
        NetworkParams {
            hidden_layers: vec![16, 16],
            epochs: 200,
            learning_rate: 0.01,
            ..NetworkParams::default()
        }
    }

    #[test]
    fn test_default_architecture() {
        let mut rng = StdRng::seed_from_u64(0);
        let device = NdArrayDevice::default();
        let mlp: Mlp<InferenceBackend> = Mlp::new(9, &[128, 128, 128], &mut rng, &device);

        assert_eq!(mlp.hidden.len(), 3);
        assert_eq!(mlp.hidden[0].weight.val().dims(), [9, 128]);
        assert_eq!(mlp.output.weight.val().dims(), [128, 1]);

        let bias = mlp.output.bias.as_ref().map(|b| b.val().into_data());
        assert!(bias.is_some_and(|b| b.iter::<f32>().all(|v| v == 0.0)));
    }

    #[test]
    fn test_fit_separates_classes() {
        let x = array![[0.0, 5.0], [1.0, 1.0], [0.0, 4.0], [1.0, 0.0]];
        let y = array![1.0, 0.0, 1.0, 0.0];

        let mut ctx = FitContext::new(Some(17));
        let model = NetworkModel::fit(x.view(), y.view(), &small_params(), &mut ctx).unwrap();
        let p = model.predict_proba(x.view());

        assert!(p[0] > 0.5 && p[2] > 0.5);
        assert!(p[1] < 0.5 && p[3] < 0.5);
        assert!(p.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(model.layer_sizes(), &[2, 16, 16, 1]);
        assert_eq!(ctx.history().len(), 200);
        assert!(ctx.history().last().unwrap().loss < ctx.history()[0].loss);
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let x = array![[0.0, 5.0], [1.0, 1.0], [0.0, 4.0], [1.0, 0.0]];
        let y = array![1.0, 0.0, 1.0, 0.0];
        let params = NetworkParams {
            hidden_layers: vec![8],
            epochs: 5,
            ..NetworkParams::default()
        };

        let fit = || {
            NetworkModel::fit(x.view(), y.view(), &params, &mut FitContext::new(Some(3))).unwrap()
        };
        let (a, b) = (fit(), fit());
        assert_eq!(a.predict_proba(x.view()), b.predict_proba(x.view()));
        assert_eq!(a.clone().predict_proba(x.view()), a.predict_proba(x.view()));
    }

    #[test]
    fn test_zero_batch_size_is_an_error() {
        let x = array![[0.0], [1.0]];
        let y = array![1.0, 0.0];
        let params = NetworkParams {
            batch_size: 0,
            ..NetworkParams::default()
        };

        let result = NetworkModel::fit(x.view(), y.view(), &params, &mut FitContext::new(None));
        assert!(matches!(result, Err(TrainingError::InvalidParams(_))));
    }
}
