//! Applies the optimization driver to every image of a directory against a
//! single style image.

use crate::*;
use std::path::{Path, PathBuf};

/// Suffix appended to the stem of every stylized output file.
pub const OUTPUT_SUFFIX: &str = "_ST";

/// The current state of a batch run
pub struct BatchUpdate<'a> {
    /// The content image currently being stylized
    pub path: &'a Path,
    /// The progress through the directory
    pub image: ProgressStat,
    /// The progress through the current image's iteration loop
    pub iteration: ProgressStat,
    /// The content loss at this iteration, before weighting
    pub content_loss: f32,
    /// The style loss at this iteration, before weighting
    pub style_loss: f32,
}

/// Allows a batch run to update external callers with its progress
pub trait BatchProgress {
    fn update(&mut self, info: BatchUpdate<'_>);
}

impl<G> BatchProgress for G
where
    G: FnMut(BatchUpdate<'_>) + Send,
{
    fn update(&mut self, info: BatchUpdate<'_>) {
        self(info)
    }
}

// Forwards per-iteration updates of one image, stamped with the position in
// the directory.
struct FileProgress<'a, 'b> {
    inner: &'a mut (dyn BatchProgress + 'b),
    path: &'a Path,
    image: ProgressStat,
}

impl TransferProgress for FileProgress<'_, '_> {
    fn update(&mut self, info: ProgressUpdate) {
        self.inner.update(BatchUpdate {
            path: self.path,
            image: self.image,
            iteration: info.iteration,
            content_loss: info.content_loss,
            style_loss: info.style_loss,
        });
    }
}

/// Stylizes every image file in `content_dir` against the style image,
/// writing each result as `{original_stem}_ST.png` into `output_dir`
/// (created if missing). Returns the written paths, in directory order.
///
/// The extractor is built once and shared across the whole batch. There is
/// no per-item isolation: the first failing image aborts the remaining
/// batch.
pub fn stylize_directory<B: AutodiffBackend>(
    content_dir: &Path,
    style: &Path,
    output_dir: &Path,
    params: &Parameters,
    device: &B::Device,
    mut progress: Option<Box<dyn BatchProgress + '_>>,
) -> Result<Vec<PathBuf>, Error> {
    params.validate()?;

    let files = list_images(content_dir)?;
    std::fs::create_dir_all(output_dir)?;

    if let Some(seed) = params.seed {
        B::seed(seed);
    }

    let vgg = match &params.weights {
        Some(path) => Vgg::load(params.variant, path, device)?,
        None => Vgg::new(params.variant, device),
    };

    let total = files.len();
    let mut written = Vec::with_capacity(total);

    for (index, path) in files.iter().enumerate() {
        let session = Session::<B>::builder()
            .content(path)
            .style(&style)
            .network(vgg.clone())
            .device(device.clone())
            .iterations(params.iterations)
            .content_weight(params.content_weight)
            .style_weight(params.style_weight)
            .learning_rate(params.learning_rate)
            .content_layer(params.content_layer)
            .style_weights(params.style_weights.clone())
            .build()?;

        let file_progress = progress.as_deref_mut().map(|inner| {
            Box::new(FileProgress {
                inner,
                path,
                image: ProgressStat {
                    current: index + 1,
                    total,
                },
            }) as Box<dyn TransferProgress + '_>
        });

        let stylized = session.run(file_progress)?;

        let output = output_dir.join(output_name(path));
        stylized.save(&output)?;
        written.push(output);
    }

    Ok(written)
}

/// `{original_stem}_ST.png`, the derived name of a stylized output.
pub fn output_name(content: &Path) -> PathBuf {
    let stem = content
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("image");
    PathBuf::from(format!("{}{}.png", stem, OUTPUT_SUFFIX))
}

#[cfg(test)]
mod test {
    use super::output_name;
    use std::path::Path;

    #[test]
    fn output_names_strip_the_extension() {
        assert_eq!(
            output_name(Path::new("in/portrait.jpeg")),
            Path::new("portrait_ST.png")
        );
        assert_eq!(output_name(Path::new("a.png")), Path::new("a_ST.png"));
    }
}
