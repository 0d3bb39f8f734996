use crate::*;

/// Style transfer session.
///
/// Calling `run()` will optimize a copy of the content image toward the
/// style image's feature statistics and return it, consuming the session in
/// the process. You can provide a `TransferProgress` implementation to get
/// an update per iteration with the current loss values.
///
/// # Example
/// ```no_run
/// let session = style_transfer::Session::<style_transfer::CpuBackend>::builder()
///     .content(&"imgs/portrait.jpg")
///     .style(&"imgs/starry_night.jpg")
///     .iterations(500)
///     .build().expect("failed to build session");
///
/// let stylized = session.run(None).expect("transfer failed");
/// stylized.save("portrait_ST.png").expect("failed to save image");
/// ```
pub struct Session<B: AutodiffBackend> {
    vgg: Vgg<B>,
    content: image::RgbImage,
    style: image::RgbImage,
    params: Parameters,
    device: B::Device,
}

impl<B: AutodiffBackend> Session<B> {
    /// Creates a new session with default parameters.
    pub fn builder<'a>() -> SessionBuilder<'a, B> {
        SessionBuilder::default()
    }

    /// Runs the optimization and outputs the stylized image.
    pub fn run(
        self,
        progress: Option<Box<dyn TransferProgress + '_>>,
    ) -> Result<StylizedImage, Error> {
        let content = imgtensor::to_tensor::<B>(&self.content, &self.device);
        let style = imgtensor::to_tensor::<B>(&self.style, &self.device);

        let result = transfer::run(
            &self.vgg,
            content,
            style,
            &self.params.to_transfer_params(),
            progress,
        );

        Ok(StylizedImage {
            image: imgtensor::from_tensor(result)?,
        })
    }
}

/// Builds a session by setting parameters and adding input images, calling
/// `build` will load and check all of the provided inputs to verify the
/// optimization can produce valid output
pub struct SessionBuilder<'a, B: AutodiffBackend> {
    content: Option<ImageSource<'a>>,
    style: Option<ImageSource<'a>>,
    network: Option<Vgg<B>>,
    device: B::Device,
    params: Parameters,
}

impl<'a, B: AutodiffBackend> Default for SessionBuilder<'a, B> {
    fn default() -> Self {
        Self {
            content: None,
            style: None,
            network: None,
            device: B::Device::default(),
            params: Parameters::default(),
        }
    }
}

impl<'a, B: AutodiffBackend> SessionBuilder<'a, B> {
    /// Creates a new `SessionBuilder`, can also be created via
    /// `Session::builder()`
    pub fn new() -> Self {
        Self::default()
    }

    /// The image whose subject matter is preserved.
    pub fn content<I: Into<ImageSource<'a>>>(mut self, content: I) -> Self {
        self.content = Some(content.into());
        self
    }

    /// The image whose texture is transferred. It is resized to the content
    /// image's dimensions before feature extraction.
    pub fn style<I: Into<ImageSource<'a>>>(mut self, style: I) -> Self {
        self.style = Some(style.into());
        self
    }

    /// How many optimizer steps to run.
    ///
    /// Iteration count is the sole termination condition; there is no
    /// convergence check.
    ///
    /// Default: 1000
    pub fn iterations(mut self, count: u32) -> Self {
        self.params.iterations = count;
        self
    }

    /// Weight of the content loss in the total loss.
    ///
    /// Default: 1.0
    pub fn content_weight(mut self, weight: f32) -> Self {
        self.params.content_weight = weight;
        self
    }

    /// Weight of the style loss in the total loss.
    ///
    /// Default: 1000.0
    pub fn style_weight(mut self, weight: f32) -> Self {
        self.params.style_weight = weight;
        self
    }

    /// Step size of the optimizer.
    ///
    /// Default: 0.01
    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.params.learning_rate = rate;
        self
    }

    /// The layer whose activations the content loss compares.
    ///
    /// Default: `Layer::Conv5_1`
    pub fn content_layer(mut self, layer: Layer) -> Self {
        self.params.content_layer = layer;
        self
    }

    /// Per-layer weighting of the style loss.
    pub fn style_weights(mut self, weights: StyleWeights) -> Self {
        self.params.style_weights = weights;
        self
    }

    /// The extractor variant to build.
    ///
    /// Default: `VggVariant::Vgg16`
    pub fn model(mut self, variant: VggVariant) -> Self {
        self.params.variant = variant;
        self
    }

    /// Path to a pretrained weights record for the extractor. Without one
    /// the extractor is randomly initialized, which makes for abstract
    /// texture rather than a faithful style transfer.
    pub fn weights<P: Into<std::path::PathBuf>>(mut self, path: P) -> Self {
        self.params.weights = Some(path.into());
        self
    }

    /// Reuses an already constructed extractor instead of building one,
    /// which a batch run does to share the network across images.
    pub fn network(mut self, vgg: Vgg<B>) -> Self {
        self.network = Some(vgg);
        self
    }

    /// Seeds the backend's random generator before the extractor is
    /// initialized. With the CPU backend this makes runs reproducible.
    pub fn seed(mut self, value: u64) -> Self {
        self.params.seed = Some(value);
        self
    }

    /// The device tensors are placed on.
    ///
    /// Default: the backend's default device.
    pub fn device(mut self, device: B::Device) -> Self {
        self.device = device;
        self
    }

    /// Creates a `Session`, or returns an error if invalid parameters or
    /// input images were specified.
    pub fn build(self) -> Result<Session<B>, Error> {
        self.params.validate()?;

        let content_src = self.content.ok_or(Error::MissingInput("content"))?;
        let style_src = self.style.ok_or(Error::MissingInput("style"))?;

        let content = load_image(content_src, None)?;
        let dims = imgtensor::dims_of(&content);
        if dims.width < vgg::MIN_INPUT_DIM || dims.height < vgg::MIN_INPUT_DIM {
            return Err(Error::ImageTooSmall(dims.width, dims.height));
        }

        // the style image always follows the content image's dimensions
        let style = load_image(style_src, Some(dims))?;

        if let Some(seed) = self.params.seed {
            B::seed(seed);
        }

        let vgg = match self.network {
            Some(vgg) => vgg,
            None => match &self.params.weights {
                Some(path) => Vgg::load(self.params.variant, path, &self.device)?,
                None => Vgg::new(self.params.variant, &self.device),
            },
        };

        Ok(Session {
            vgg,
            content,
            style,
            params: self.params,
            device: self.device,
        })
    }
}

/// Helper struct for passing progress information to external callers
#[derive(Clone, Copy)]
pub struct ProgressStat {
    /// The current amount of work that has been done
    pub current: usize,
    /// The total amount of work to do
    pub total: usize,
}

/// The current state of the optimization
pub struct ProgressUpdate {
    /// The progress through the iteration loop
    pub iteration: ProgressStat,
    /// The content loss at this iteration, before weighting
    pub content_loss: f32,
    /// The style loss at this iteration, before weighting
    pub style_loss: f32,
}

/// Allows the optimizer to update external callers with the current
/// progress of the style transfer
pub trait TransferProgress {
    fn update(&mut self, info: ProgressUpdate);
}

impl<G> TransferProgress for G
where
    G: FnMut(ProgressUpdate) + Send,
{
    fn update(&mut self, info: ProgressUpdate) {
        self(info)
    }
}
