//! The frozen convolutional feature extractor.
//!
//! A trimmed VGG conv stack, built up to `conv5_1` (the deepest activation
//! any loss reads); the classifier head and trailing convolutions of the
//! original networks are never instantiated. Activations are captured
//! pre-activation, i.e. the raw convolution outputs before ReLU.

use crate::Error;
use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::{activation::relu, backend::Backend, Tensor},
};
use std::path::Path;

/// Four pooling stages sit in front of `conv5_1`, so anything smaller than
/// 2^4 collapses to nothing before reaching it.
pub(crate) const MIN_INPUT_DIM: u32 = 16;

/// The supported extractor variants.
///
/// The variants differ only in how many convolutions sit in the third and
/// fourth blocks (3 for vgg16, 4 for vgg19); the capture points are the same.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VggVariant {
    Vgg16,
    Vgg19,
}

impl Default for VggVariant {
    fn default() -> Self {
        Self::Vgg16
    }
}

impl VggVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vgg16 => "vgg16",
            Self::Vgg19 => "vgg19",
        }
    }

    // convolutions per block, truncated after conv5_1
    fn convs_per_block(self) -> [usize; 5] {
        match self {
            Self::Vgg16 => [2, 2, 3, 3, 1],
            Self::Vgg19 => [2, 2, 4, 4, 1],
        }
    }
}

/// A named activation of the extractor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    Conv1_1,
    Conv2_1,
    Conv3_1,
    Conv4_1,
    Conv4_2,
    Conv5_1,
}

impl Layer {
    pub fn name(self) -> &'static str {
        match self {
            Self::Conv1_1 => "conv1_1",
            Self::Conv2_1 => "conv2_1",
            Self::Conv3_1 => "conv3_1",
            Self::Conv4_1 => "conv4_1",
            Self::Conv4_2 => "conv4_2",
            Self::Conv5_1 => "conv5_1",
        }
    }
}

/// The named activations produced by one forward pass.
pub struct FeatureMaps<B: Backend> {
    conv1_1: Tensor<B, 4>,
    conv2_1: Tensor<B, 4>,
    conv3_1: Tensor<B, 4>,
    conv4_1: Tensor<B, 4>,
    conv4_2: Tensor<B, 4>,
    conv5_1: Tensor<B, 4>,
}

impl<B: Backend> FeatureMaps<B> {
    pub fn get(&self, layer: Layer) -> &Tensor<B, 4> {
        match layer {
            Layer::Conv1_1 => &self.conv1_1,
            Layer::Conv2_1 => &self.conv2_1,
            Layer::Conv3_1 => &self.conv3_1,
            Layer::Conv4_1 => &self.conv4_1,
            Layer::Conv4_2 => &self.conv4_2,
            Layer::Conv5_1 => &self.conv5_1,
        }
    }

    /// Cuts the maps out of the autodiff graph. Applied to the content and
    /// style targets, which are constants of the optimization.
    pub(crate) fn detach(self) -> Self {
        Self {
            conv1_1: self.conv1_1.detach(),
            conv2_1: self.conv2_1.detach(),
            conv3_1: self.conv3_1.detach(),
            conv4_1: self.conv4_1.detach(),
            conv4_2: self.conv4_2.detach(),
            conv5_1: self.conv5_1.detach(),
        }
    }
}

/// The frozen extractor network. All parameters are created with gradient
/// tracking disabled; only the canvas tensor fed through `features` learns.
#[derive(Module, Debug)]
pub struct Vgg<B: Backend> {
    block1: Vec<Conv2d<B>>,
    block2: Vec<Conv2d<B>>,
    block3: Vec<Conv2d<B>>,
    block4: Vec<Conv2d<B>>,
    block5: Vec<Conv2d<B>>,
    pool: MaxPool2d,
}

impl<B: Backend> Vgg<B> {
    /// Creates an extractor with randomly initialized weights.
    ///
    /// Without a weights record the output is abstract texture rather than a
    /// faithful style transfer; random initialization exists for smoke tests
    /// and benchmarks.
    pub fn new(variant: VggVariant, device: &B::Device) -> Self {
        let conv = |input, output| {
            Conv2dConfig::new([input, output], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device)
        };
        let block = |count: usize, input, output| {
            let mut convs = Vec::with_capacity(count);
            convs.push(conv(input, output));
            for _ in 1..count {
                convs.push(conv(output, output));
            }
            convs
        };

        let counts = variant.convs_per_block();

        Self {
            block1: block(counts[0], 3, 64),
            block2: block(counts[1], 64, 128),
            block3: block(counts[2], 128, 256),
            block4: block(counts[3], 256, 512),
            block5: block(counts[4], 512, 512),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
        .no_grad()
    }

    /// Creates an extractor and loads pretrained weights from a named
    /// MessagePack record file.
    pub fn load(variant: VggVariant, weights: &Path, device: &B::Device) -> Result<Self, Error> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let vgg = Self::new(variant, device).load_file(weights.to_path_buf(), &recorder, device)?;
        Ok(vgg.no_grad())
    }

    /// Forwards an image tensor through the network, recording the output at
    /// each named layer.
    pub fn features(&self, image: Tensor<B, 4>) -> FeatureMaps<B> {
        let (x, conv1_1, _) = run_block(&self.block1, false, image);
        let (x, conv2_1, _) = run_block(&self.block2, false, self.pool.forward(x));
        let (x, conv3_1, _) = run_block(&self.block3, false, self.pool.forward(x));
        let (x, conv4_1, conv4_2) = run_block(&self.block4, true, self.pool.forward(x));
        let (_, conv5_1, _) = run_block(&self.block5, false, self.pool.forward(x));

        FeatureMaps {
            conv1_1,
            conv2_1,
            conv3_1,
            conv4_1,
            conv4_2: conv4_2.expect("block 4 always has a second convolution"),
            conv5_1,
        }
    }
}

// Runs one conv block, returning the activated block output plus the
// pre-activation outputs tapped by the capture layers.
fn run_block<B: Backend>(
    convs: &[Conv2d<B>],
    tap_second: bool,
    input: Tensor<B, 4>,
) -> (Tensor<B, 4>, Tensor<B, 4>, Option<Tensor<B, 4>>) {
    let mut first = None;
    let mut second = None;

    let mut x = input;
    for (i, conv) in convs.iter().enumerate() {
        let pre = conv.forward(x);
        match i {
            0 => first = Some(pre.clone()),
            1 if tap_second => second = Some(pre.clone()),
            _ => {}
        }
        x = relu(pre);
    }

    let first = first.expect("conv blocks are never empty");
    (x, first, second)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::CpuBackend;
    use burn::backend::ndarray::NdArrayDevice;

    #[test]
    fn layer_names() {
        assert_eq!(Layer::Conv1_1.name(), "conv1_1");
        assert_eq!(Layer::Conv4_2.name(), "conv4_2");
        assert_eq!(Layer::Conv5_1.name(), "conv5_1");
    }

    #[test]
    fn feature_shapes_follow_the_pooling_schedule() {
        let device = NdArrayDevice::Cpu;
        let vgg = Vgg::<CpuBackend>::new(VggVariant::Vgg16, &device);

        let image = Tensor::<CpuBackend, 4>::zeros([1, 3, 32, 16], &device);
        let maps = vgg.features(image);

        assert_eq!(maps.get(Layer::Conv1_1).dims(), [1, 64, 32, 16]);
        assert_eq!(maps.get(Layer::Conv2_1).dims(), [1, 128, 16, 8]);
        assert_eq!(maps.get(Layer::Conv3_1).dims(), [1, 256, 8, 4]);
        assert_eq!(maps.get(Layer::Conv4_1).dims(), [1, 512, 4, 2]);
        assert_eq!(maps.get(Layer::Conv4_2).dims(), [1, 512, 4, 2]);
        assert_eq!(maps.get(Layer::Conv5_1).dims(), [1, 512, 2, 1]);
    }

    #[test]
    fn vgg19_carries_the_deeper_blocks() {
        let device = NdArrayDevice::Cpu;
        let vgg = Vgg::<CpuBackend>::new(VggVariant::Vgg19, &device);

        assert_eq!(vgg.block3.len(), 4);
        assert_eq!(vgg.block4.len(), 4);
        assert_eq!(vgg.block5.len(), 1);
    }
}
