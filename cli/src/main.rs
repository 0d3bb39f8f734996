use structopt::StructOpt;

use std::path::{Path, PathBuf};
use style_transfer::{self as ts, Error};

fn parse_variant(input: &str) -> Result<ts::VggVariant, String> {
    match input {
        "vgg16" => Ok(ts::VggVariant::Vgg16),
        "vgg19" => Ok(ts::VggVariant::Vgg19),
        other => Err(format!(
            "extractor model `{}` not one of: 'vgg16', 'vgg19'",
            other
        )),
    }
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
struct Single {
    /// The image whose subject matter is preserved
    #[structopt(long, parse(from_os_str))]
    content: PathBuf,
    /// The image whose texture is transferred
    #[structopt(long, parse(from_os_str))]
    style: PathBuf,
    /// The path to save the stylized image to, the file extension of the
    /// path determines the image format used. Defaults to
    /// `{content_stem}_ST.png` next to the content image
    #[structopt(long = "out", short, parse(from_os_str))]
    output_path: Option<PathBuf>,
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
struct Batch {
    /// Directory whose png/jpg/jpeg images are all stylized
    #[structopt(long, parse(from_os_str))]
    content_dir: PathBuf,
    /// The image whose texture is transferred
    #[structopt(long, parse(from_os_str))]
    style: PathBuf,
    /// The directory stylized images are written to, created if missing
    #[structopt(long, default_value = "./style_transferred", parse(from_os_str))]
    out_dir: PathBuf,
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
struct Upscale {
    /// Directory whose png/jpg/jpeg images are all resized
    #[structopt(long, parse(from_os_str))]
    input_dir: PathBuf,
    /// The directory resized images are written to, created if missing
    #[structopt(long, parse(from_os_str))]
    output_dir: PathBuf,
    /// Uniform scale factor applied to both dimensions
    #[structopt(long)]
    scale: f32,
}

#[derive(StructOpt)]
enum Subcommand {
    /// Transfers the style of one image onto one content image
    #[structopt(name = "single")]
    Single(Single),
    /// Transfers one style onto every image of a directory
    #[structopt(name = "batch")]
    Batch(Batch),
    /// Bulk-resizes the images of a directory by a constant factor
    #[structopt(name = "upscale")]
    Upscale(Upscale),
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
struct Tweaks {
    /// The number of optimizer steps to run; a run always performs exactly
    /// this many, there is no convergence check
    #[structopt(long, default_value = "1000")]
    iterations: u32,
    /// Weight of the content preservation term in the total loss
    #[structopt(long, default_value = "1.0")]
    content_weight: f32,
    /// Weight of the style term in the total loss
    #[structopt(long, default_value = "1000.0")]
    style_weight: f32,
    /// Step size of the optimizer
    #[structopt(long, default_value = "0.01")]
    learning_rate: f64,
    /// The extractor variant, one of: 'vgg16', 'vgg19'
    #[structopt(
        long,
        default_value = "vgg16",
        parse(try_from_str = parse_variant)
    )]
    model: ts::VggVariant,
    /// Path to a pretrained extractor weights record. Without one the
    /// extractor is randomly initialized, which makes for abstract texture
    /// rather than a faithful style transfer
    #[structopt(long, parse(from_os_str))]
    weights: Option<PathBuf>,
    /// A seed value for the backend's random generator to give
    /// deterministic results on the CPU backend
    #[structopt(long)]
    seed: Option<u64>,
    /// Disables the progress bars
    #[structopt(long)]
    no_progress: bool,
}

#[derive(StructOpt)]
#[structopt(
    name = "style-transfer",
    about = "Transfers the style of one image onto others",
    rename_all = "kebab-case"
)]
struct Opt {
    /// The index of the accelerated device to run on. Ignored, with a CPU
    /// fallback, when no accelerated backend is compiled in or available
    #[structopt(short = "d", long = "device", default_value = "0")]
    device: usize,
    #[structopt(flatten)]
    tweaks: Tweaks,
    #[structopt(subcommand)]
    cmd: Subcommand,
}

fn main() {
    if let Err(e) = real_main() {
        if atty::is(atty::Stream::Stderr) {
            eprintln!("\x1b[31merror\x1b[0m: {}", e);
        } else {
            eprintln!("error: {}", e);
        }

        std::process::exit(1);
    }
}

fn real_main() -> Result<(), Error> {
    let args = Opt::from_args();

    let params = ts::Parameters {
        iterations: args.tweaks.iterations,
        content_weight: args.tweaks.content_weight,
        style_weight: args.tweaks.style_weight,
        learning_rate: args.tweaks.learning_rate,
        variant: args.tweaks.model,
        weights: args.tweaks.weights.clone(),
        seed: args.tweaks.seed,
        ..ts::Parameters::default()
    };

    let device = ts::default_device(args.device);

    match &args.cmd {
        Subcommand::Single(single) => {
            let output_path = match &single.output_path {
                Some(path) => {
                    // Check that the extension supplied by the user is one we support
                    match path.extension().and_then(|ext| ext.to_str()) {
                        Some("png") | Some("jpg") | Some("bmp") | None => {}
                        Some(other) => {
                            return Err(Error::UnsupportedOutputFormat(other.to_owned()))
                        }
                    }
                    path.clone()
                }
                None => derive_output_path(&single.content),
            };

            let mut sb = ts::Session::<ts::DefaultBackend>::builder()
                .content(&single.content)
                .style(&single.style)
                .device(device)
                .iterations(params.iterations)
                .content_weight(params.content_weight)
                .style_weight(params.style_weight)
                .learning_rate(params.learning_rate)
                .model(params.variant);

            if let Some(ref weights) = params.weights {
                sb = sb.weights(weights);
            }

            if let Some(seed) = params.seed {
                sb = sb.seed(seed);
            }

            let session = sb.build()?;

            let progress: Option<Box<dyn ts::TransferProgress>> = if !args.tweaks.no_progress {
                Some(Box::new(TransferBar::new()))
            } else {
                None
            };

            let stylized = session.run(progress)?;
            stylized.save(&output_path)?;
            println!("{}", output_path.display());
        }
        Subcommand::Batch(batch) => {
            let progress: Option<Box<dyn ts::BatchProgress>> = if !args.tweaks.no_progress {
                Some(Box::new(BatchBar::new()))
            } else {
                None
            };

            let written = ts::stylize_directory::<ts::DefaultBackend>(
                &batch.content_dir,
                &batch.style,
                &batch.out_dir,
                &params,
                &device,
                progress,
            )?;

            println!("stylized {} images into {}", written.len(), batch.out_dir.display());
        }
        Subcommand::Upscale(upscale) => {
            let written =
                ts::upscale_directory(&upscale.input_dir, &upscale.output_dir, upscale.scale)?;

            println!(
                "upscaled {} images into {}",
                written.len(),
                upscale.output_dir.display()
            );
        }
    }

    Ok(())
}

// `{content_stem}_ST.png` next to the content image
fn derive_output_path(content: &Path) -> PathBuf {
    let stem = content
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("image");
    content.with_file_name(format!("{}_ST.png", stem))
}

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

struct TransferBar {
    iter_pb: ProgressBar,
    iter_len: usize,
}

impl TransferBar {
    fn new() -> Self {
        let sty = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .progress_chars("##-");

        let iter_pb = ProgressBar::new(100);
        iter_pb.set_style(sty);

        Self {
            iter_pb,
            iter_len: 100,
        }
    }
}

impl Drop for TransferBar {
    fn drop(&mut self) {
        self.iter_pb.finish();
    }
}

impl ts::TransferProgress for TransferBar {
    fn update(&mut self, update: ts::ProgressUpdate) {
        if update.iteration.total != self.iter_len {
            self.iter_len = update.iteration.total;
            self.iter_pb.set_length(self.iter_len as u64);
        }

        self.iter_pb.set_position(update.iteration.current as u64);
        self.iter_pb.set_message(&format!(
            "content loss {:.2e}, style loss {:.2e}",
            update.content_loss, update.style_loss
        ));
    }
}

struct BatchBar {
    file_pb: ProgressBar,
    iter_pb: ProgressBar,

    file_len: usize,
    iter_len: usize,
}

impl BatchBar {
    fn new() -> Self {
        let multi_pb = MultiProgress::new();

        let sty = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .progress_chars("##-");
        let file_pb = multi_pb.add(ProgressBar::new(100));
        file_pb.set_style(sty);

        let sty = ProgressStyle::default_bar()
            .template("          {bar:40.cyan/blue} {pos}/{len} {msg}")
            .progress_chars("##-");
        let iter_pb = multi_pb.add(ProgressBar::new(100));
        iter_pb.set_style(sty);

        std::thread::spawn(move || {
            let _ = multi_pb.join();
        });

        Self {
            file_pb,
            iter_pb,
            file_len: 100,
            iter_len: 100,
        }
    }
}

impl Drop for BatchBar {
    fn drop(&mut self) {
        self.file_pb.finish();
        self.iter_pb.finish();
    }
}

impl ts::BatchProgress for BatchBar {
    fn update(&mut self, update: ts::BatchUpdate<'_>) {
        if update.image.total != self.file_len {
            self.file_len = update.image.total;
            self.file_pb.set_length(self.file_len as u64);
        }

        if update.iteration.total != self.iter_len {
            self.iter_len = update.iteration.total;
            self.iter_pb.set_length(self.iter_len as u64);
        }

        self.file_pb.set_position(update.image.current as u64);
        if let Some(name) = update.path.file_name().and_then(|name| name.to_str()) {
            self.file_pb.set_message(name);
        }

        self.iter_pb.set_position(update.iteration.current as u64);
        self.iter_pb.set_message(&format!(
            "content loss {:.2e}, style loss {:.2e}",
            update.content_loss, update.style_loss
        ));
    }
}
