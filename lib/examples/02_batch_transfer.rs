use std::path::Path;
use style_transfer as ts;

fn main() -> Result<(), ts::Error> {
    let params = ts::Parameters {
        iterations: 500,
        weights: Some("weights/vgg16.mpk".into()),
        ..ts::Parameters::default()
    };

    // every image in the directory is stylized against the same style image,
    // the extractor is only built once
    let written = ts::stylize_directory::<ts::DefaultBackend>(
        Path::new("imgs/renders"),
        Path::new("imgs/starry_night.jpg"),
        Path::new("out/stylized"),
        &params,
        &ts::default_device(0),
        None,
    )?;

    println!("stylized {} images", written.len());
    Ok(())
}
