//! Bulk image upscaling, a standalone utility with no relation to the
//! optimization machinery.

use crate::*;
use std::path::{Path, PathBuf};

/// Resizes every image file in `input_dir` by `factor` with Catmull-Rom
/// interpolation and saves it under the same filename in `output_dir`
/// (created if missing). Returns the written paths, in directory order.
pub fn upscale_directory(
    input_dir: &Path,
    output_dir: &Path,
    factor: f32,
) -> Result<Vec<PathBuf>, Error> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(Error::InvalidRange(errors::InvalidRange {
            min: 0.0,
            max: f32::INFINITY,
            value: factor,
            name: "scale-factor",
        }));
    }

    let files = list_images(input_dir)?;
    std::fs::create_dir_all(output_dir)?;

    let mut written = Vec::with_capacity(files.len());
    for path in files {
        let img = image::open(&path)?.to_rgb();
        let (width, height) = img.dimensions();

        let new_width = ((f64::from(width) * f64::from(factor)) as u32).max(1);
        let new_height = ((f64::from(height) * f64::from(factor)) as u32).max(1);

        let upscaled = image::imageops::resize(
            &img,
            new_width,
            new_height,
            image::imageops::CatmullRom,
        );

        let output = match path.file_name() {
            Some(name) => output_dir.join(name),
            None => continue,
        };
        upscaled.save(&output)?;
        written.push(output);
    }

    Ok(written)
}

#[cfg(test)]
mod test {
    use super::upscale_directory;
    use crate::Error;
    use std::path::Path;

    #[test]
    fn rejects_bad_scale_factors() {
        for factor in [0.0, -1.5, f32::NAN, f32::INFINITY] {
            let result = upscale_directory(Path::new("in"), Path::new("out"), factor);
            assert!(matches!(result, Err(Error::InvalidRange(_))));
        }
    }
}
