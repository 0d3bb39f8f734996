//! The optimization loop behind a session: repeatedly nudges a canvas tensor
//! so its feature statistics match the style targets while its deep
//! activations stay close to the content target.

use crate::{
    session::{ProgressStat, ProgressUpdate, TransferProgress},
    vgg::{FeatureMaps, Layer, Vgg},
};
use burn::{
    module::{Module, Param},
    nn::loss::{MseLoss, Reduction},
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, backend::Backend, ElementConversion, Tensor},
};

/// Per-layer weighting of the style loss.
///
/// The default weights emphasize the shallow layers; they are configuration
/// constants, not derived values.
#[derive(Clone, Debug)]
pub struct StyleWeights {
    weights: Vec<(Layer, f32)>,
}

impl Default for StyleWeights {
    fn default() -> Self {
        Self {
            weights: vec![
                (Layer::Conv1_1, 0.75),
                (Layer::Conv2_1, 0.5),
                (Layer::Conv3_1, 0.25),
                (Layer::Conv4_1, 0.25),
                (Layer::Conv5_1, 0.25),
            ],
        }
    }
}

impl StyleWeights {
    pub fn new(weights: Vec<(Layer, f32)>) -> Self {
        Self { weights }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Layer, f32)> + '_ {
        self.weights.iter().copied()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub(crate) fn min_weight(&self) -> f32 {
        self.weights
            .iter()
            .map(|(_, w)| *w)
            .fold(f32::INFINITY, f32::min)
    }
}

// The subset of `Parameters` the loop itself consumes
#[derive(Debug)]
pub(crate) struct TransferParams {
    pub(crate) iterations: u32,
    pub(crate) content_weight: f32,
    pub(crate) style_weight: f32,
    pub(crate) learning_rate: f64,
    pub(crate) content_layer: Layer,
    pub(crate) style_weights: StyleWeights,
}

/// The single mutable piece of the optimization: the image being painted.
/// Wrapping it as a one-parameter module lets the framework's optimizer
/// drive it like any other network.
#[derive(Module, Debug)]
struct Canvas<B: Backend> {
    pixels: Param<Tensor<B, 4>>,
}

/// Gram matrix of a `[N, C, H, W]` feature map: the inner products of its
/// flattened channel maps, a texture descriptor invariant to spatial
/// arrangement.
pub(crate) fn gram_matrix<B: Backend>(features: &Tensor<B, 4>) -> Tensor<B, 2> {
    let [batch, channels, height, width] = features.dims();
    let flat = features
        .clone()
        .reshape([batch * channels, height * width]);
    flat.clone().matmul(flat.transpose())
}

pub(crate) fn content_loss<B: Backend>(
    pred: &FeatureMaps<B>,
    target: &FeatureMaps<B>,
    layer: Layer,
) -> Tensor<B, 1> {
    MseLoss::new().forward(
        pred.get(layer).clone(),
        target.get(layer).clone(),
        Reduction::Mean,
    )
}

pub(crate) fn style_loss<B: Backend>(
    pred: &FeatureMaps<B>,
    target: &FeatureMaps<B>,
    weights: &StyleWeights,
) -> Tensor<B, 1> {
    let device = pred.get(Layer::Conv1_1).device();
    let mut loss = Tensor::zeros([1], &device);

    for (layer, weight) in weights.iter() {
        let pred_features = pred.get(layer);
        let [batch, channels, height, width] = pred_features.dims();

        let layer_loss = MseLoss::new()
            .forward(
                gram_matrix(pred_features),
                gram_matrix(target.get(layer)),
                Reduction::Mean,
            )
            .mul_scalar(weight)
            // normalize for map size so deep, small maps are comparable
            .div_scalar((batch * channels * height * width) as f32);

        loss = loss + layer_loss;
    }

    loss
}

/// Runs the fixed-count optimization. Iteration count is the sole
/// termination condition; there is no convergence check.
pub(crate) fn run<B: AutodiffBackend>(
    vgg: &Vgg<B>,
    content: Tensor<B, 4>,
    style: Tensor<B, 4>,
    params: &TransferParams,
    mut progress: Option<Box<dyn TransferProgress + '_>>,
) -> Tensor<B, 4> {
    // the targets never change, extract them once up front
    let content_features = vgg.features(content.clone()).detach();
    let style_features = vgg.features(style).detach();

    let mut canvas = Canvas {
        pixels: Param::from_tensor(content),
    };
    let mut optim = AdamConfig::new().init::<B, Canvas<B>>();

    for iteration in 0..params.iterations {
        let features = vgg.features(canvas.pixels.val());

        let content_loss = content_loss(&features, &content_features, params.content_layer);
        let style_loss = style_loss(&features, &style_features, &params.style_weights);

        let total = content_loss.clone().mul_scalar(params.content_weight)
            + style_loss.clone().mul_scalar(params.style_weight);

        let grads = total.backward();
        let grads = GradientsParams::from_grads(grads, &canvas);
        canvas = optim.step(params.learning_rate, canvas, grads);

        if let Some(progress) = progress.as_deref_mut() {
            progress.update(ProgressUpdate {
                iteration: ProgressStat {
                    current: iteration as usize + 1,
                    total: params.iterations as usize,
                },
                content_loss: content_loss.into_scalar().elem::<f32>(),
                style_loss: style_loss.into_scalar().elem::<f32>(),
            });
        }
    }

    canvas.pixels.val().detach()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{vgg::VggVariant, CpuBackend};
    use burn::{backend::ndarray::NdArrayDevice, tensor::Distribution};

    fn to_values(tensor: Tensor<CpuBackend, 2>) -> Vec<f32> {
        tensor
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap()
    }

    #[test]
    fn gram_matrix_is_symmetric() {
        CpuBackend::seed(7);
        let device = NdArrayDevice::Cpu;

        let features = Tensor::<CpuBackend, 4>::random(
            [1, 6, 5, 4],
            Distribution::Uniform(-1.0, 1.0),
            &device,
        );

        let gram = gram_matrix(&features);
        assert_eq!(gram.dims(), [6, 6]);

        let values = to_values(gram.clone());
        let transposed = to_values(gram.transpose());

        for (a, b) in values.iter().zip(transposed.iter()) {
            assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
        }
    }

    #[test]
    fn style_loss_of_identical_maps_is_zero() {
        CpuBackend::seed(11);
        let device = NdArrayDevice::Cpu;
        let vgg = Vgg::<CpuBackend>::new(VggVariant::Vgg16, &device);

        let image = Tensor::<CpuBackend, 4>::random(
            [1, 3, 16, 16],
            Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let maps = vgg.features(image);

        let loss = style_loss(&maps, &maps, &StyleWeights::default())
            .into_scalar()
            .elem::<f32>();
        assert!(loss.abs() < 1e-6, "loss was {}", loss);
    }

    #[test]
    fn content_loss_of_identical_maps_is_zero() {
        CpuBackend::seed(13);
        let device = NdArrayDevice::Cpu;
        let vgg = Vgg::<CpuBackend>::new(VggVariant::Vgg16, &device);

        let image = Tensor::<CpuBackend, 4>::random(
            [1, 3, 16, 16],
            Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let maps = vgg.features(image);

        let loss = content_loss(&maps, &maps, Layer::Conv5_1)
            .into_scalar()
            .elem::<f32>();
        assert!(loss.abs() < 1e-6, "loss was {}", loss);
    }
}
