#![deny(unsafe_code)]
#![warn(
    clippy::all,
    clippy::doc_markdown,
    clippy::dbg_macro,
    clippy::enum_glob_use,
    clippy::explicit_into_iter_loop,
    clippy::filter_map_next,
    clippy::inefficient_to_string,
    clippy::lossy_float_literal,
    clippy::macro_use_imports,
    clippy::map_flatten,
    clippy::map_unwrap_or,
    clippy::match_same_arms,
    clippy::needless_borrow,
    clippy::needless_continue,
    clippy::semicolon_if_nothing_returned,
    clippy::string_add,
    clippy::todo,
    clippy::unimplemented,
    clippy::unnested_or_patterns,
    clippy::verbose_file_reads,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms
)]

//! `style-transfer` is a light API for neural style transfer: it optimizes a
//! copy of a content image so that its deep-feature statistics match a style
//! image's statistics under a frozen convolutional feature extractor.
//!
//! First, you build a `Session` via a `SessionBuilder`, which follows the
//! builder pattern. Calling `build` on the `SessionBuilder` loads all of the
//! input images and checks for various errors.
//!
//! `Session` has a `run()` method that drives a fixed count of optimizer
//! steps over the image tensor and returns the result as a `StylizedImage`,
//! which you can save, stream, or inspect.
//!
//! ## Features
//!
//! 1. Single image style transfer
//! 2. Batch style transfer of a directory against one style image
//! 3. Bulk image upscaling
//!
//! ## Usage
//!
//! ```no_run
//! // Create a new session with default parameters
//! let session = style_transfer::Session::<style_transfer::CpuBackend>::builder()
//!     // Specify the input images
//!     .content(&"imgs/portrait.jpg")
//!     .style(&"imgs/starry_night.jpg")
//!     // Point at a pretrained extractor record
//!     .weights("weights/vgg16.mpk")
//!     // Build the session
//!     .build().expect("failed to build session");
//!
//! // Optimize the image
//! let stylized = session.run(None).expect("transfer failed");
//!
//! // Save the stylized image to disk
//! stylized.save("portrait_ST.png").expect("failed to save image");
//! ```
mod errors;
mod imgtensor;
mod transfer;
mod utils;
use utils::*;
mod vgg;
pub mod batch;
pub mod session;
pub mod upscale;

pub use image;
use std::path::{Path, PathBuf};

pub use batch::{stylize_directory, BatchProgress, BatchUpdate};
pub use errors::Error;
pub use session::{
    ProgressStat, ProgressUpdate, Session, SessionBuilder, TransferProgress,
};
pub use transfer::StyleWeights;
pub use upscale::upscale_directory;
pub use utils::{load_dynamic_image, ImageSource};
pub use vgg::{FeatureMaps, Layer, Vgg, VggVariant};

use burn::tensor::backend::AutodiffBackend;

/// The CPU backend, always available and fully deterministic under a fixed
/// seed.
pub type CpuBackend = burn::backend::Autodiff<burn::backend::NdArray<f32>>;

/// The accelerated backend compiled in via the `wgpu` feature.
#[cfg(feature = "wgpu")]
pub type DefaultBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// Without the `wgpu` feature the default backend is the CPU one.
#[cfg(not(feature = "wgpu"))]
pub type DefaultBackend = CpuBackend;

/// Resolves a device index for the default backend.
///
/// With the `wgpu` feature this selects the indexed discrete GPU; otherwise
/// the index is ignored and everything runs on the CPU, which is also the
/// fallback when no accelerated device exists.
#[cfg(feature = "wgpu")]
pub fn default_device(index: usize) -> burn::backend::wgpu::WgpuDevice {
    burn::backend::wgpu::WgpuDevice::DiscreteGpu(index)
}

#[cfg(not(feature = "wgpu"))]
#[allow(unused_variables)]
pub fn default_device(index: usize) -> burn::backend::ndarray::NdArrayDevice {
    burn::backend::ndarray::NdArrayDevice::Cpu
}

/// Simple dimensions struct
#[derive(Copy, Clone)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub struct Dims {
    pub width: u32,
    pub height: u32,
}

impl Dims {
    pub fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// The knobs of the optimization, shared by single and batch runs.
#[derive(Clone, Debug)]
pub struct Parameters {
    /// Number of optimizer steps; the sole termination condition
    pub iterations: u32,
    /// Weight of the content loss in the total loss
    pub content_weight: f32,
    /// Weight of the style loss in the total loss
    pub style_weight: f32,
    /// Step size of the optimizer
    pub learning_rate: f64,
    /// The layer whose activations the content loss compares
    pub content_layer: Layer,
    /// Per-layer weighting of the style loss
    pub style_weights: StyleWeights,
    /// The extractor variant to build
    pub variant: VggVariant,
    /// Pretrained weights record for the extractor; random init if absent
    pub weights: Option<PathBuf>,
    /// Seed for the backend's random generator
    pub seed: Option<u64>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            iterations: 1000,
            content_weight: 1.0,
            style_weight: 1000.0,
            learning_rate: 0.01,
            content_layer: Layer::Conv5_1,
            style_weights: StyleWeights::default(),
            variant: VggVariant::default(),
            weights: None,
            seed: None,
        }
    }
}

impl Parameters {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.iterations == 0 {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 1.0,
                max: u32::MAX as f32,
                value: 0.0,
                name: "iterations",
            }));
        }

        if !self.content_weight.is_finite() || self.content_weight < 0.0 {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 0.0,
                max: f32::INFINITY,
                value: self.content_weight,
                name: "content-weight",
            }));
        }

        if !self.style_weight.is_finite() || self.style_weight < 0.0 {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 0.0,
                max: f32::INFINITY,
                value: self.style_weight,
                name: "style-weight",
            }));
        }

        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 0.0,
                max: f32::INFINITY,
                value: self.learning_rate as f32,
                name: "learning-rate",
            }));
        }

        if !self.style_weights.is_empty() && self.style_weights.min_weight() < 0.0 {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 0.0,
                max: f32::INFINITY,
                value: self.style_weights.min_weight(),
                name: "style-weights",
            }));
        }

        Ok(())
    }

    pub(crate) fn to_transfer_params(&self) -> transfer::TransferParams {
        transfer::TransferParams {
            iterations: self.iterations,
            content_weight: self.content_weight,
            style_weight: self.style_weight,
            learning_rate: self.learning_rate,
            content_layer: self.content_layer,
            style_weights: self.style_weights.clone(),
        }
    }
}

/// An image produced by a `Session::run()`
pub struct StylizedImage {
    pub(crate) image: image::RgbImage,
}

impl StylizedImage {
    /// Saves the stylized image to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(parent_path) = path.parent() {
            std::fs::create_dir_all(parent_path)?;
        }

        self.image.save(path)?;
        Ok(())
    }

    /// Writes the stylized image to the specified stream
    pub fn write<W: std::io::Write>(
        self,
        writer: &mut W,
        fmt: image::ImageOutputFormat,
    ) -> Result<(), Error> {
        let dyn_img = self.into_image();
        Ok(dyn_img.write_to(writer, fmt)?)
    }

    /// Returns the stylized output image
    pub fn into_image(self) -> image::DynamicImage {
        image::DynamicImage::ImageRgb8(self.image)
    }
}

impl AsRef<image::RgbImage> for StylizedImage {
    fn as_ref(&self) -> &image::RgbImage {
        &self.image
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_parameters_are_valid() {
        assert!(Parameters::default().validate().is_ok());
    }

    #[test]
    fn zero_iterations_are_rejected() {
        let params = Parameters {
            iterations: 0,
            ..Parameters::default()
        };
        assert!(matches!(
            params.validate(),
            Err(Error::InvalidRange(_))
        ));
    }

    #[test]
    fn negative_weights_are_rejected() {
        let params = Parameters {
            style_weight: -3.0,
            ..Parameters::default()
        };
        assert!(matches!(
            params.validate(),
            Err(Error::InvalidRange(_))
        ));

        let params = Parameters {
            style_weights: StyleWeights::new(vec![(Layer::Conv1_1, -0.5)]),
            ..Parameters::default()
        };
        assert!(matches!(
            params.validate(),
            Err(Error::InvalidRange(_))
        ));
    }

    #[test]
    fn non_positive_learning_rates_are_rejected() {
        let params = Parameters {
            learning_rate: 0.0,
            ..Parameters::default()
        };
        assert!(matches!(
            params.validate(),
            Err(Error::InvalidRange(_))
        ));
    }
}
