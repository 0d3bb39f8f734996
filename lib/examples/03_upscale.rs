use std::path::Path;
use style_transfer as ts;

fn main() -> Result<(), ts::Error> {
    // enlarge every image in the directory by 1.75x
    let written = ts::upscale_directory(Path::new("imgs/renders"), Path::new("out/upscaled"), 1.75)?;

    println!("upscaled {} images", written.len());
    Ok(())
}
