use std::path::PathBuf;
use style_transfer::{self as ts, CpuBackend};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("style-transfer-tests").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn gradient_image(size: u32) -> ts::image::RgbImage {
    ts::image::RgbImage::from_fn(size, size, |x, y| {
        ts::image::Rgb([(x * 15) as u8, (y * 15) as u8, ((x + y) * 7) as u8])
    })
}

fn checker_image(size: u32) -> ts::image::RgbImage {
    ts::image::RgbImage::from_fn(size, size, |x, y| {
        if (x / 2 + y / 2) % 2 == 0 {
            ts::image::Rgb([230, 40, 40])
        } else {
            ts::image::Rgb([40, 40, 230])
        }
    })
}

#[test]
fn zero_style_weight_reproduces_the_content_image() {
    let dir = scratch("zero-style-weight");
    let content_path = dir.join("content.png");
    let style_path = dir.join("style.png");

    let content = gradient_image(16);
    content.save(&content_path).unwrap();
    checker_image(16).save(&style_path).unwrap();

    let mut content_losses = Vec::new();
    let stylized = ts::Session::<CpuBackend>::builder()
        .content(&content_path)
        .style(&style_path)
        .iterations(5)
        .style_weight(0.0)
        .seed(3)
        .build()
        .unwrap()
        .run(Some(Box::new(|info: ts::ProgressUpdate| {
            content_losses.push(info.content_loss);
        })))
        .unwrap();

    // starting from a copy of the content there is nothing to optimize
    assert_eq!(content_losses.len(), 5);
    for loss in content_losses {
        assert!(loss.abs() < 1e-3, "content loss drifted to {}", loss);
    }

    let result = stylized.as_ref();
    assert_eq!(result.dimensions(), content.dimensions());
    for (a, b) in content.pixels().zip(result.pixels()) {
        for channel in 0..3 {
            let diff = i16::from(a[channel]) - i16::from(b[channel]);
            assert!(diff.abs() <= 1, "pixel drifted by {}", diff);
        }
    }
}

#[test]
fn zero_content_weight_decreases_style_loss() {
    let dir = scratch("zero-content-weight");
    let content_path = dir.join("content.png");
    let style_path = dir.join("style.png");

    gradient_image(16).save(&content_path).unwrap();
    checker_image(16).save(&style_path).unwrap();

    let mut style_losses = Vec::new();
    ts::Session::<CpuBackend>::builder()
        .content(&content_path)
        .style(&style_path)
        .iterations(30)
        .content_weight(0.0)
        .seed(5)
        .build()
        .unwrap()
        .run(Some(Box::new(|info: ts::ProgressUpdate| {
            style_losses.push(info.style_loss);
        })))
        .unwrap();

    assert_eq!(style_losses.len(), 30);
    let first = style_losses[0];
    let last = *style_losses.last().unwrap();

    assert!(first.is_finite() && last.is_finite());
    assert!(first > 0.0, "the inputs differ, so the style loss must too");
    assert!(
        last < first,
        "style loss did not decrease: first {}, last {}",
        first,
        last
    );
}

#[test]
fn fixed_seed_runs_are_reproducible() {
    let dir = scratch("determinism");
    let content_path = dir.join("content.png");
    let style_path = dir.join("style.png");

    gradient_image(16).save(&content_path).unwrap();
    checker_image(16).save(&style_path).unwrap();

    let run = || {
        ts::Session::<CpuBackend>::builder()
            .content(&content_path)
            .style(&style_path)
            .iterations(8)
            .seed(42)
            .build()
            .unwrap()
            .run(None)
            .unwrap()
    };

    let a = run();
    let b = run();

    assert_eq!(a.as_ref().as_raw(), b.as_ref().as_raw());
}

#[test]
fn batch_runs_produce_one_suffixed_output_per_image() {
    let dir = scratch("batch");
    let content_dir = dir.join("content");
    let output_dir = dir.join("out");
    std::fs::create_dir_all(&content_dir).unwrap();

    for name in ["first.png", "second.jpg", "third.jpeg"] {
        gradient_image(16).save(content_dir.join(name)).unwrap();
    }
    // non-image files are skipped, not stylized
    std::fs::write(content_dir.join("notes.txt"), "skip me").unwrap();

    let style_path = dir.join("style.png");
    checker_image(16).save(&style_path).unwrap();

    let params = ts::Parameters {
        iterations: 2,
        seed: Some(9),
        ..ts::Parameters::default()
    };

    let written = ts::stylize_directory::<CpuBackend>(
        &content_dir,
        &style_path,
        &output_dir,
        &params,
        &Default::default(),
        None,
    )
    .unwrap();

    assert_eq!(written.len(), 3);
    for stem in ["first", "second", "third"] {
        let expected = output_dir.join(format!("{}_ST.png", stem));
        assert!(expected.is_file(), "missing {}", expected.display());
    }
}

#[test]
fn batch_progress_reports_every_file() {
    let dir = scratch("batch-progress");
    let content_dir = dir.join("content");
    let output_dir = dir.join("out");
    std::fs::create_dir_all(&content_dir).unwrap();

    gradient_image(16).save(content_dir.join("a.png")).unwrap();
    gradient_image(16).save(content_dir.join("b.png")).unwrap();

    let style_path = dir.join("style.png");
    checker_image(16).save(&style_path).unwrap();

    let params = ts::Parameters {
        iterations: 3,
        seed: Some(1),
        ..ts::Parameters::default()
    };

    let mut seen = Vec::new();
    ts::stylize_directory::<CpuBackend>(
        &content_dir,
        &style_path,
        &output_dir,
        &params,
        &Default::default(),
        Some(Box::new(|info: ts::BatchUpdate<'_>| {
            seen.push((info.image.current, info.iteration.current));
        })),
    )
    .unwrap();

    // 2 files x 3 iterations
    assert_eq!(seen.len(), 6);
    assert_eq!(seen.first(), Some(&(1, 1)));
    assert_eq!(seen.last(), Some(&(2, 3)));
}

#[test]
fn empty_content_directory_is_an_error() {
    let dir = scratch("batch-empty");
    let content_dir = dir.join("content");
    std::fs::create_dir_all(&content_dir).unwrap();

    let style_path = dir.join("style.png");
    checker_image(16).save(&style_path).unwrap();

    let result = ts::stylize_directory::<CpuBackend>(
        &content_dir,
        &style_path,
        &dir.join("out"),
        &ts::Parameters::default(),
        &Default::default(),
        None,
    );

    assert!(matches!(result, Err(ts::Error::NoImages(_))));
}

#[test]
fn upscaling_doubles_the_dimensions() {
    let dir = scratch("upscale");
    let input_dir = dir.join("in");
    let output_dir = dir.join("out");
    std::fs::create_dir_all(&input_dir).unwrap();

    gradient_image(100).save(input_dir.join("img.png")).unwrap();

    let written = ts::upscale_directory(&input_dir, &output_dir, 2.0).unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].file_name().unwrap(), "img.png");

    let upscaled = ts::image::open(&written[0]).unwrap();
    use ts::image::GenericImageView;
    assert_eq!(upscaled.dimensions(), (200, 200));
}

#[test]
fn tiny_content_images_are_rejected() {
    let dir = scratch("too-small");
    let content_path = dir.join("content.png");
    let style_path = dir.join("style.png");

    gradient_image(8).save(&content_path).unwrap();
    checker_image(16).save(&style_path).unwrap();

    let result = ts::Session::<CpuBackend>::builder()
        .content(&content_path)
        .style(&style_path)
        .build();

    assert!(matches!(result, Err(ts::Error::ImageTooSmall(8, 8))));
}
