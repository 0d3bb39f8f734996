use std::{fmt, path::PathBuf};

#[derive(Debug)]
pub struct InvalidRange {
    pub(crate) min: f32,
    pub(crate) max: f32,
    pub(crate) value: f32,
    pub(crate) name: &'static str,
}

impl fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parameter '{}' - value '{}' is outside the range of {}-{}",
            self.name, self.value, self.min, self.max
        )
    }
}

#[derive(Debug)]
pub struct ShapeMismatch {
    pub(crate) expected: &'static str,
    pub(crate) got: Vec<usize>,
}

impl fmt::Display for ShapeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected a tensor of shape {}, got {:?}",
            self.expected, self.got
        )
    }
}

#[derive(Debug)]
pub enum Error {
    /// An error in the image library occurred, eg failed to load/save
    Image(image::ImageError),
    /// An input parameter had an invalid range specified
    InvalidRange(InvalidRange),
    /// A tensor did not have the shape the conversion requires
    ShapeMismatch(ShapeMismatch),
    /// The extractor weights record could not be loaded
    Weights(burn::record::RecorderError),
    /// Io is notoriously error free with no problems, but we cover it just in case!
    Io(std::io::Error),
    /// The user specified an image format we don't support as the output
    UnsupportedOutputFormat(String),
    /// The input directory contained no image files to process
    NoImages(PathBuf),
    /// A session was built without one of its two input images
    MissingInput(&'static str),
    /// Input images must be large enough to survive the extractor's pooling
    /// stages; holds the offending dimensions
    ImageTooSmall(u32, u32),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Image(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(ie) => write!(f, "{}", ie),
            Self::InvalidRange(ir) => write!(f, "{}", ir),
            Self::ShapeMismatch(sm) => write!(f, "{}", sm),
            Self::Weights(re) => write!(f, "failed to load extractor weights: {}", re),
            Self::Io(io) => write!(f, "{}", io),
            Self::UnsupportedOutputFormat(fmt) => {
                write!(f, "the output format '{}' is not supported", fmt)
            }
            Self::NoImages(dir) => write!(
                f,
                "no png/jpg/jpeg images were found in '{}'",
                dir.display()
            ),
            Self::MissingInput(which) => {
                write!(f, "a {} image must be provided to build a session", which)
            }
            Self::ImageTooSmall(w, h) => write!(
                f,
                "input images must be at least {px}x{px} to pass through the extractor, got {}x{}",
                w,
                h,
                px = crate::vgg::MIN_INPUT_DIM,
            ),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(ie: image::ImageError) -> Self {
        Self::Image(ie)
    }
}

impl From<std::io::Error> for Error {
    fn from(io: std::io::Error) -> Self {
        Self::Io(io)
    }
}

impl From<burn::record::RecorderError> for Error {
    fn from(re: burn::record::RecorderError) -> Self {
        Self::Weights(re)
    }
}
