//! Dense autoencoder for reconstruction-error anomaly scoring
//!
//! # Architecture
//!
//! Input (d) → 32 → 16 → bottleneck (k) → 16 → 32 → Output (d)
//!
//! Hidden layers use ReLU, the output layer is linear. Widths come from
//! [`AutoencoderConfig`]; the decoder mirrors the encoder.
//!
//! # Algorithm
//!
//! Training: mini-batch Adam minimizing mean squared reconstruction error.
//! Mean absolute error is tracked per epoch for monitoring only.
//! Inference: per-record MSE between input and reconstruction; high error = anomaly.
//!
//! # Reproducibility
//!
//! Initialization and batch shuffling are seeded, and this implementation
//! accumulates gradients sequentially, so repeated fits on one machine match.
//! Reproducibility across platforms or with a different summation order is
//! best-effort only: floating-point addition is not associative, and tests
//! compare reconstruction errors within a tolerance.
//!
//! # References
//!
//! Goodfellow, I., Bengio, Y., & Courville, A. (2016).
//! Deep Learning. MIT Press. Chapter 14: Autoencoders.
//!
//! Kingma, D. P., & Ba, J. (2015). Adam: A Method for Stochastic Optimization. ICLR.

use crate::config::AutoencoderConfig;
use crate::error::{check_matrix, DetectorError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Activation {
    Relu,
    Linear,
}

impl Activation {
    fn apply(self, z: f64) -> f64 {
        match self {
            Activation::Relu => z.max(0.0),
            Activation::Linear => z,
        }
    }

    fn derivative(self, z: f64) -> f64 {
        match self {
            Activation::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Linear => 1.0,
        }
    }
}

/// Fully connected layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DenseLayer {
    /// Weights, `outputs x inputs`
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
    activation: Activation,
}

impl DenseLayer {
    /// He-uniform init for ReLU layers, Glorot-uniform for the linear output
    fn new(inputs: usize, outputs: usize, activation: Activation, rng: &mut StdRng) -> Self {
        let limit = match activation {
            Activation::Relu => (6.0 / inputs as f64).sqrt(),
            Activation::Linear => (6.0 / (inputs + outputs) as f64).sqrt(),
        };

        let weights = (0..outputs)
            .map(|_| (0..inputs).map(|_| rng.gen_range(-limit..limit)).collect())
            .collect();

        DenseLayer {
            weights,
            bias: vec![0.0; outputs],
            activation,
        }
    }

    fn outputs(&self) -> usize {
        self.bias.len()
    }

    fn pre_activation(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, &b)| b + row.iter().zip(input).map(|(&w, &x)| w * x).sum::<f64>())
            .collect()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.pre_activation(input)
            .into_iter()
            .map(|z| self.activation.apply(z))
            .collect()
    }
}

/// Parameter-shaped buffers (gradients, Adam moments)
#[derive(Debug, Clone)]
struct ParamBuffers {
    weights: Vec<Vec<Vec<f64>>>,
    bias: Vec<Vec<f64>>,
}

impl ParamBuffers {
    fn zeros(layers: &[DenseLayer]) -> Self {
        ParamBuffers {
            weights: layers
                .iter()
                .map(|l| l.weights.iter().map(|row| vec![0.0; row.len()]).collect())
                .collect(),
            bias: layers.iter().map(|l| vec![0.0; l.outputs()]).collect(),
        }
    }

    fn reset(&mut self) {
        for layer in &mut self.weights {
            for row in layer {
                row.fill(0.0);
            }
        }
        for b in &mut self.bias {
            b.fill(0.0);
        }
    }
}

/// Adam optimizer state
struct Adam {
    learning_rate: f64,
    step: i32,
    m: ParamBuffers,
    v: ParamBuffers,
}

impl Adam {
    fn new(layers: &[DenseLayer], learning_rate: f64) -> Self {
        Adam {
            learning_rate,
            step: 0,
            m: ParamBuffers::zeros(layers),
            v: ParamBuffers::zeros(layers),
        }
    }

    fn update(&mut self, layers: &mut [DenseLayer], grads: &ParamBuffers) {
        self.step += 1;
        let lr = self.learning_rate;
        let bc1 = 1.0 - ADAM_BETA1.powi(self.step);
        let bc2 = 1.0 - ADAM_BETA2.powi(self.step);

        let adam_step = |p: &mut f64, g: f64, m: &mut f64, v: &mut f64| {
            *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
            *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
            let m_hat = *m / bc1;
            let v_hat = *v / bc2;
            *p -= lr * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
        };

        for (l, layer) in layers.iter_mut().enumerate() {
            for (j, row) in layer.weights.iter_mut().enumerate() {
                for (k, w) in row.iter_mut().enumerate() {
                    adam_step(
                        w,
                        grads.weights[l][j][k],
                        &mut self.m.weights[l][j][k],
                        &mut self.v.weights[l][j][k],
                    );
                }
            }
            for (j, b) in layer.bias.iter_mut().enumerate() {
                adam_step(
                    b,
                    grads.bias[l][j],
                    &mut self.m.bias[l][j],
                    &mut self.v.bias[l][j],
                );
            }
        }
    }
}

/// Per-epoch training curves
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Training MSE
    pub loss: Vec<f64>,
    /// Training MAE (monitoring only)
    pub mae: Vec<f64>,
    /// Validation MSE (empty without a validation split)
    pub val_loss: Vec<f64>,
    pub val_mae: Vec<f64>,
}

impl TrainingHistory {
    pub fn epochs(&self) -> usize {
        self.loss.len()
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.loss.last().copied()
    }

    pub fn final_val_loss(&self) -> Option<f64> {
        self.val_loss.last().copied()
    }
}

/// Encoder/decoder network scored by reconstruction error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Autoencoder {
    layers: Vec<DenseLayer>,
    input_dim: usize,
    /// Number of leading layers that form the encoder
    encoder_depth: usize,
    config: AutoencoderConfig,
    fitted: bool,
}

impl Autoencoder {
    /// Build a network with seeded random initialization
    pub fn new(input_dim: usize, config: &AutoencoderConfig) -> Result<Self> {
        if input_dim == 0 {
            return Err(DetectorError::Shape {
                model: "autoencoder",
                rows: 0,
                cols: 0,
            });
        }
        if config.encoding_dim == 0 || config.hidden_dims.contains(&0) {
            return Err(DetectorError::InvalidConfig(
                "autoencoder layer widths must be >= 1".to_string(),
            ));
        }

        let mut widths = vec![input_dim];
        widths.extend(&config.hidden_dims);
        widths.push(config.encoding_dim);
        widths.extend(config.hidden_dims.iter().rev());
        widths.push(input_dim);

        let mut rng = StdRng::seed_from_u64(config.random_state);
        let n_layers = widths.len() - 1;
        let layers = widths
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let activation = if i + 1 == n_layers {
                    Activation::Linear
                } else {
                    Activation::Relu
                };
                DenseLayer::new(w[0], w[1], activation, &mut rng)
            })
            .collect();

        Ok(Autoencoder {
            layers,
            input_dim,
            encoder_depth: config.hidden_dims.len() + 1,
            config: config.clone(),
            fitted: false,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn encoding_dim(&self) -> usize {
        self.config.encoding_dim
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Widths from input to output, e.g. `[8, 32, 16, 10, 16, 32, 8]`
    pub fn layer_widths(&self) -> Vec<usize> {
        std::iter::once(self.input_dim)
            .chain(self.layers.iter().map(DenseLayer::outputs))
            .collect()
    }

    /// Bottleneck representation of `input`
    pub fn encode(&self, input: &[f64]) -> Vec<f64> {
        self.layers[..self.encoder_depth]
            .iter()
            .fold(input.to_vec(), |x, layer| layer.forward(&x))
    }

    /// Forward pass: input → bottleneck → output
    pub fn reconstruct(&self, input: &[f64]) -> Vec<f64> {
        self.layers
            .iter()
            .fold(input.to_vec(), |x, layer| layer.forward(&x))
    }

    /// Calculate reconstruction error (MSE)
    ///
    /// Inputs large enough to overflow the forward pass report `+inf`, never
    /// NaN, so they stay above any calibrated threshold.
    pub fn reconstruction_error(&self, input: &[f64]) -> f64 {
        let output = self.reconstruct(input);
        let sum: f64 = input
            .iter()
            .zip(&output)
            .map(|(&x, &y)| (x - y).powi(2))
            .sum();
        let mse = sum / input.len() as f64;
        if mse.is_nan() {
            f64::INFINITY
        } else {
            mse
        }
    }

    /// Per-record reconstruction errors
    pub fn reconstruction_errors(&self, samples: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.check_input(samples)?;
        Ok(samples.iter().map(|s| self.reconstruction_error(s)).collect())
    }

    /// Flag records whose reconstruction error exceeds `threshold`
    pub fn predict(&self, samples: &[Vec<f64>], threshold: f64) -> Result<Vec<bool>> {
        Ok(self
            .reconstruction_errors(samples)?
            .into_iter()
            .map(|e| e > threshold)
            .collect())
    }

    fn check_input(&self, samples: &[Vec<f64>]) -> Result<()> {
        let cols = check_matrix("autoencoder", samples)?;
        if cols != self.input_dim {
            return Err(DetectorError::DimensionMismatch {
                model: "autoencoder",
                expected: self.input_dim,
                actual: cols,
            });
        }
        Ok(())
    }

    /// Train on `samples` for the configured number of epochs
    ///
    /// The trailing `validation_split` fraction of rows is held out and only
    /// evaluated, never trained on.
    pub fn fit(&mut self, samples: &[Vec<f64>]) -> Result<TrainingHistory> {
        self.check_input(samples)?;

        let n = samples.len();
        let n_val = ((n as f64) * self.config.validation_split) as usize;
        let n_val = n_val.min(n - 1);
        let (train, val) = samples.split_at(n - n_val);

        let batch_size = self.config.batch_size.max(1);
        let mut rng = StdRng::seed_from_u64(self.config.random_state.wrapping_add(1));
        let mut adam = Adam::new(&self.layers, self.config.learning_rate);
        let mut grads = ParamBuffers::zeros(&self.layers);
        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut history = TrainingHistory::default();
        let denom = (train.len() * self.input_dim) as f64;

        for epoch in 0..self.config.epochs {
            order.shuffle(&mut rng);
            let mut sum_sq = 0.0;
            let mut sum_abs = 0.0;

            for batch in order.chunks(batch_size) {
                grads.reset();
                for &i in batch {
                    let (sq, abs) = self.accumulate_gradients(&train[i], batch.len(), &mut grads);
                    sum_sq += sq;
                    sum_abs += abs;
                }
                adam.update(&mut self.layers, &grads);
            }

            let loss = sum_sq / denom;
            let mae = sum_abs / denom;
            history.loss.push(loss);
            history.mae.push(mae);

            if val.is_empty() {
                tracing::debug!(epoch, loss, mae, "autoencoder epoch");
            } else {
                let (val_loss, val_mae) = self.evaluate(val);
                history.val_loss.push(val_loss);
                history.val_mae.push(val_mae);
                tracing::debug!(epoch, loss, mae, val_loss, val_mae, "autoencoder epoch");
            }
        }

        self.fitted = true;
        Ok(history)
    }

    /// Mean squared and mean absolute error over `samples`
    fn evaluate(&self, samples: &[Vec<f64>]) -> (f64, f64) {
        let mut sum_sq = 0.0;
        let mut sum_abs = 0.0;
        for sample in samples {
            for (&x, &y) in sample.iter().zip(&self.reconstruct(sample)) {
                sum_sq += (x - y).powi(2);
                sum_abs += (x - y).abs();
            }
        }
        let denom = (samples.len() * self.input_dim) as f64;
        (sum_sq / denom, sum_abs / denom)
    }

    /// Backpropagate one sample's batch-mean MSE into `grads`
    ///
    /// Returns the sample's summed squared and absolute errors.
    fn accumulate_gradients(
        &self,
        sample: &[f64],
        batch_len: usize,
        grads: &mut ParamBuffers,
    ) -> (f64, f64) {
        let n_layers = self.layers.len();

        // Forward pass, keeping pre-activations and activations
        let mut zs: Vec<Vec<f64>> = Vec::with_capacity(n_layers);
        let mut acts: Vec<Vec<f64>> = Vec::with_capacity(n_layers + 1);
        acts.push(sample.to_vec());
        for (l, layer) in self.layers.iter().enumerate() {
            let z = layer.pre_activation(&acts[l]);
            let a = z.iter().map(|&v| layer.activation.apply(v)).collect();
            zs.push(z);
            acts.push(a);
        }

        let output = &acts[n_layers];
        let mut sum_sq = 0.0;
        let mut sum_abs = 0.0;
        for (&y, &x) in output.iter().zip(sample) {
            sum_sq += (y - x).powi(2);
            sum_abs += (y - x).abs();
        }

        // dL/dy for L = mean over batch of per-sample mean squared error
        let scale = 2.0 / (batch_len * self.input_dim) as f64;
        let out_activation = self.layers[n_layers - 1].activation;
        let mut delta: Vec<f64> = output
            .iter()
            .zip(sample)
            .zip(&zs[n_layers - 1])
            .map(|((&y, &x), &z)| scale * (y - x) * out_activation.derivative(z))
            .collect();

        for l in (0..n_layers).rev() {
            let input = &acts[l];
            for (j, &d) in delta.iter().enumerate() {
                grads.bias[l][j] += d;
                for (g, &a) in grads.weights[l][j].iter_mut().zip(input) {
                    *g += d * a;
                }
            }

            if l > 0 {
                let prev_activation = self.layers[l - 1].activation;
                let mut next = vec![0.0; input.len()];
                for (row, &d) in self.layers[l].weights.iter().zip(&delta) {
                    for (acc, &w) in next.iter_mut().zip(row) {
                        *acc += w * d;
                    }
                }
                for (acc, &z) in next.iter_mut().zip(&zs[l - 1]) {
                    *acc *= prev_activation.derivative(z);
                }
                delta = next;
            }
        }

        (sum_sq, sum_abs)
    }
}
